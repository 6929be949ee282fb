//! # Persistent Storage Layer
//!
//! This module defines [`RegistryStore`], the narrow persistence interface
//! the updater depends on, and [`Storage`], its Sled-backed implementation.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `registries` | big-endian `u64` id | JSON-encoded [`Registry`] |
//!
//! Big-endian keys keep Sled's lexicographic iteration in id order, so
//! [`Storage::get_all`] returns records sorted by id.
//!
//! ## References
//!
//! - Sled documentation: <https://sled.rs/>

use crate::models::{Registry, RegistryError, RegistryId, Result};
use std::path::Path;
use std::sync::Arc;

/// Tree name for storing registry records.
const REGISTRY_TREE: &str = "registries";

/// Persistence operations required by [`crate::RegistryUpdater`].
///
/// Implementations must return [`RegistryError::NotFound`] from
/// [`get_by_id`](RegistryStore::get_by_id) for unknown identifiers and a
/// storage-class error (see [`RegistryError::is_storage`]) for anything
/// else that goes wrong.
pub trait RegistryStore: Send + Sync {
    /// Loads one record.
    fn get_by_id(&self, id: RegistryId) -> Result<Registry>;

    /// Loads a snapshot of every record.
    fn get_all(&self) -> Result<Vec<Registry>>;

    /// Replaces the whole record stored under `id`.
    fn replace_by_id(&self, id: RegistryId, registry: &Registry) -> Result<()>;
}

impl<S: RegistryStore + ?Sized> RegistryStore for Arc<S> {
    fn get_by_id(&self, id: RegistryId) -> Result<Registry> {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> Result<Vec<Registry>> {
        (**self).get_all()
    }

    fn replace_by_id(&self, id: RegistryId, registry: &Registry) -> Result<()> {
        (**self).replace_by_id(id, registry)
    }
}

/// Wrapper around a Sled database holding registry records.
///
/// # Thread Safety
///
/// The underlying Sled database is thread-safe and cheap to clone. Cloned
/// handles share the same tree.
///
/// # Example
///
/// ```rust
/// use dockhand_registry::storage::{RegistryStore, Storage};
/// use dockhand_registry::Registry;
///
/// let storage = Storage::temporary().unwrap();
///
/// let created = storage
///     .create(Registry {
///         name: "hub".to_string(),
///         url: "docker.io".to_string(),
///         ..Registry::default()
///     })
///     .unwrap();
///
/// let loaded = storage.get_by_id(created.id).unwrap();
/// assert_eq!(loaded.url, "docker.io");
/// ```
#[derive(Clone)]
pub struct Storage {
    /// The underlying Sled database.
    db: sled::Db,

    /// Tree for storing serialized records.
    registries: sled::Tree,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Database` if the path is unusable or the
    /// database is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let registries = db.open_tree(REGISTRY_TREE)?;

        Ok(Storage { db, registries })
    }

    /// Creates a temporary in-memory storage.
    ///
    /// The data is lost when the last handle is dropped.
    pub fn temporary() -> Result<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        let registries = db.open_tree(REGISTRY_TREE)?;

        Ok(Storage { db, registries })
    }

    /// Stores a new record under the next free identifier.
    ///
    /// The `id` of the supplied record is ignored. Returns the record as
    /// stored.
    pub fn create(&self, mut registry: Registry) -> Result<Registry> {
        // generate_id starts at 0, which is not a valid identifier
        registry.id = self.db.generate_id()? + 1;
        while self.contains(registry.id)? {
            registry.id = self.db.generate_id()? + 1;
        }

        self.insert(&registry)?;
        Ok(registry)
    }

    /// Stores a record under its own identifier.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::AlreadyExists` if the identifier is taken and
    /// `RegistryError::ReservedId` for identifier `0`.
    pub fn insert(&self, registry: &Registry) -> Result<()> {
        if registry.id == 0 {
            return Err(RegistryError::ReservedId);
        }

        let bytes = serde_json::to_vec(registry)?;
        self.registries
            .compare_and_swap(key(registry.id), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| RegistryError::AlreadyExists(registry.id))
    }

    /// Checks if a record is stored under `id`.
    pub fn contains(&self, id: RegistryId) -> Result<bool> {
        Ok(self.registries.contains_key(key(id))?)
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    /// Flushes all pending writes to disk.
    ///
    /// # Returns
    ///
    /// The number of bytes flushed.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl RegistryStore for Storage {
    fn get_by_id(&self, id: RegistryId) -> Result<Registry> {
        match self.registries.get(key(id))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(RegistryError::NotFound(id)),
        }
    }

    fn get_all(&self) -> Result<Vec<Registry>> {
        let mut registries = Vec::with_capacity(self.registries.len());

        for result in self.registries.iter() {
            let (key, value) = result?;
            if key.len() != KEY_SIZE {
                return Err(RegistryError::CorruptKey);
            }
            registries.push(serde_json::from_slice(&value)?);
        }

        Ok(registries)
    }

    fn replace_by_id(&self, id: RegistryId, registry: &Registry) -> Result<()> {
        let bytes = serde_json::to_vec(registry)?;
        self.registries.insert(key(id), bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("registries_count", &self.len())
            .finish()
    }
}

const KEY_SIZE: usize = std::mem::size_of::<RegistryId>();

fn key(id: RegistryId) -> [u8; KEY_SIZE] {
    id.to_be_bytes()
}
