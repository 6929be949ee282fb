//! # Registry Updater - Partial Updates
//!
//! [`RegistryUpdater`] applies a sparse [`UpdateRequest`] to one stored
//! [`Registry`] and writes the merged record back as a whole.
//!
//! ## Update Flow
//!
//! 1. Load the target record (`NotFound` if absent)
//! 2. Apply `name`
//! 3. Apply `url` after scanning every other record for a colliding
//!    effective URL (`UrlConflict` if one exists)
//! 4. Apply `authentication`; disabling it clears both credentials
//! 5. Replace the user and team policy maps when supplied
//! 6. Persist the merged record in one write
//!
//! Changes live only in memory until step 6. A failure at any step leaves
//! the stored record untouched.
//!
//! ## Concurrency
//!
//! ```text
//!   update(A, url=X) ──┐                     ┌── url lock ──┐
//!                      ├─▶ url lock ─▶ record lock(A) ─▶ load ─▶ scan ─▶ write
//!   update(B, url=X) ──┘        (waits)
//!
//!   update(A, name=N) ─────────────▶ record lock(A) ─▶ load ─▶ write
//! ```
//!
//! Every update holds the lock of its record from load to write. Updates
//! that change a URL also hold a single updater-wide lock for the same
//! span, acquired first, so the uniqueness scan and the write that relies
//! on it cannot interleave with another URL change.
//!
//! A record lock lives in the lock map only while some update holds or
//! waits for it. [`RegistryUpdater::import`] takes the URL lock for the
//! whole batch.

use crate::matching::{find_conflict, has_same_url};
use crate::models::{Registry, RegistryError, RegistryId, Result, UpdateRequest};
use crate::storage::{RegistryStore, Storage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type LockMap = Mutex<HashMap<RegistryId, Arc<Mutex<()>>>>;

/// Applies partial updates to registry records held by a [`RegistryStore`].
///
/// # Example
///
/// ```rust
/// use dockhand_registry::storage::Storage;
/// use dockhand_registry::{Registry, RegistryUpdater, UpdateRequest};
///
/// let storage = Storage::temporary().unwrap();
/// let created = storage
///     .create(Registry {
///         url: "http://a".to_string(),
///         authentication: true,
///         username: "u".to_string(),
///         password: "p".to_string(),
///         ..Registry::default()
///     })
///     .unwrap();
///
/// let updater = RegistryUpdater::new(storage);
/// let updated = updater
///     .update(created.id, UpdateRequest::default().with_authentication(false))
///     .unwrap();
///
/// assert!(!updated.authentication);
/// assert!(updated.username.is_empty() && updated.password.is_empty());
/// assert_eq!(updated.url, "http://a");
/// ```
pub struct RegistryUpdater<S> {
    /// Backing store.
    store: S,

    /// Held by every URL-changing update from load to write.
    url_lock: Mutex<()>,

    /// One lock per record with an update in flight.
    record_locks: LockMap,
}

impl<S: RegistryStore> RegistryUpdater<S> {
    /// Creates an updater over `store`.
    ///
    /// All writers of existing records should go through one updater;
    /// locks are not shared between instances.
    pub fn new(store: S) -> Self {
        RegistryUpdater {
            store,
            url_lock: Mutex::new(()),
            record_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies `request` to the record `id` and persists the result.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotFound` if no record has this identifier
    /// - `RegistryError::UrlConflict` if another record already uses the
    ///   requested effective URL
    /// - a storage-class error if any store call fails
    pub fn update(&self, id: RegistryId, request: UpdateRequest) -> Result<Registry> {
        self.update_with_cancel(id, request, &CancellationToken::new())
    }

    /// Same as [`update`](Self::update), abandoning the update with
    /// `RegistryError::Cancelled` once `cancel` is cancelled.
    ///
    /// The token is checked before each store call. Once the final write has
    /// started the update runs to completion.
    pub fn update_with_cancel(
        &self,
        id: RegistryId,
        request: UpdateRequest,
        cancel: &CancellationToken,
    ) -> Result<Registry> {
        let _url_guard = request.url.as_ref().map(|_| lock(&self.url_lock));
        let record_lock = self.record_lock(id);
        let _record_guard = record_lock.acquire();

        checkpoint(cancel)?;
        let mut registry = self.store.get_by_id(id)?;
        if request.is_empty() {
            debug!("Empty update for registry {}, rewriting it as stored", id);
        } else {
            debug!("Updating registry {} ({})", id, registry.url);
        }

        if let Some(name) = request.name {
            registry.name = name;
        }

        if let Some(url) = request.url {
            checkpoint(cancel)?;
            let registries = self.store.get_all()?;

            if let Some(existing) = find_conflict(&registry, &url, &registries) {
                warn!(
                    "Refusing URL change of registry {}: {} already used by registry {}",
                    id, url, existing.id
                );
                return Err(RegistryError::UrlConflict {
                    url,
                    existing: existing.id,
                });
            }

            registry.url = url;
        }

        if let Some(enabled) = request.authentication {
            apply_authentication(&mut registry, enabled, request.username, request.password);
        }

        if let Some(policies) = request.user_access_policies {
            registry.user_access_policies = policies;
        }

        if let Some(policies) = request.team_access_policies {
            registry.team_access_policies = policies;
        }

        checkpoint(cancel)?;
        self.store.replace_by_id(id, &registry)?;

        info!("Updated registry {}", id);
        Ok(registry)
    }

    fn record_lock(&self, id: RegistryId) -> RecordLock<'_> {
        let mut locks = lock(&self.record_locks);
        RecordLock {
            mutex: Arc::clone(locks.entry(id).or_default()),
            _eviction: Eviction {
                locks: &self.record_locks,
                id,
            },
        }
    }
}

impl<S> RegistryUpdater<S> {
    /// Number of records with an update currently holding or waiting for
    /// their lock.
    pub fn tracked_records(&self) -> usize {
        lock(&self.record_locks).len()
    }
}

impl RegistryUpdater<Storage> {
    /// Seeds the store with `registries`, keeping their identifiers.
    ///
    /// The whole batch is checked against the stored records and against
    /// itself before anything is written: identifiers must be positive and
    /// unused, effective URLs must be unique. Holds the URL lock
    /// throughout, so no URL-changing update can interleave. Returns the
    /// number of inserted records.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ReservedId` for identifier `0`
    /// - `RegistryError::AlreadyExists` for a taken or repeated identifier
    /// - `RegistryError::UrlConflict` for a taken or repeated effective URL
    /// - a storage-class error if any store call fails
    pub fn import(&self, registries: &[Registry]) -> Result<usize> {
        let _url_guard = lock(&self.url_lock);

        let mut known = self.store.get_all()?;
        for registry in registries {
            if registry.id == 0 {
                return Err(RegistryError::ReservedId);
            }
            if known.iter().any(|other| other.id == registry.id) {
                return Err(RegistryError::AlreadyExists(registry.id));
            }
            if let Some(existing) = known.iter().find(|other| has_same_url(other, registry)) {
                warn!(
                    "Refusing import of registry {}: {} already used by registry {}",
                    registry.id, registry.url, existing.id
                );
                return Err(RegistryError::UrlConflict {
                    url: registry.url.clone(),
                    existing: existing.id,
                });
            }
            known.push(registry.clone());
        }

        for registry in registries {
            self.store.insert(registry)?;
            debug!("Imported registry {} ({})", registry.id, registry.url);
        }
        self.store.flush()?;

        info!("Imported {} registries", registries.len());
        Ok(registries.len())
    }
}

impl<S> std::fmt::Debug for RegistryUpdater<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryUpdater")
            .field("tracked_records", &self.tracked_records())
            .finish()
    }
}

/// A holder's share of one record lock.
struct RecordLock<'a> {
    mutex: Arc<Mutex<()>>,

    // Fields drop in order, so this runs after `mutex` is released.
    _eviction: Eviction<'a>,
}

impl RecordLock<'_> {
    fn acquire(&self) -> MutexGuard<'_, ()> {
        lock(&self.mutex)
    }
}

/// Removes the map entry once only the map refers to it.
///
/// New shares are handed out under the map lock, so a count of one seen
/// under that lock cannot grow behind our back.
struct Eviction<'a> {
    locks: &'a LockMap,
    id: RegistryId,
}

impl Drop for Eviction<'_> {
    fn drop(&mut self) {
        let mut locks = lock(self.locks);
        if locks
            .get(&self.id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

fn apply_authentication(
    registry: &mut Registry,
    enabled: bool,
    username: Option<String>,
    password: Option<String>,
) {
    if !enabled {
        registry.authentication = false;
        registry.username.clear();
        registry.password.clear();
        return;
    }

    registry.authentication = true;
    if let Some(username) = username {
        registry.username = username;
    }
    if let Some(password) = password {
        registry.password = password;
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RegistryError::Cancelled);
    }
    Ok(())
}

// The guarded data is `()`, so a poisoned lock carries no broken state.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
