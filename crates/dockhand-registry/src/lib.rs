//! # Dockhand Registry - Container Registry Records
//!
//! This crate owns the persisted registry records of Dockhand and the one
//! non-trivial operation on them: the partial update.
//!
//! ## Purpose
//!
//! 1. **Data Model** - [`Registry`] records and the sparse [`UpdateRequest`]
//!    whose absent fields mean "leave unchanged".
//!
//! 2. **Effective URL Matching** - Uniqueness of registry URLs, with GitLab
//!    project paths as a secondary discriminator.
//!
//! 3. **Partial Updates** - [`RegistryUpdater`] merges supplied fields,
//!    refuses URL collisions, clears credentials when authentication is
//!    disabled and writes the record back in one piece.
//!
//! 4. **Persistent Storage** - The [`storage::RegistryStore`] interface and
//!    its Sled-backed implementation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       REGISTRY UPDATER                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   UpdateRequest ──▶ merge ──▶ URL check ──▶ auth reset ──▶ write │
//! │                                   │                        │    │
//! │                                   ▼                        ▼    │
//! │                       ┌─────────────────────────────────────┐   │
//! │                       │  RegistryStore (Sled)               │   │
//! │                       │  get_by_id · get_all · replace_by_id│   │
//! │                       └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use dockhand_registry::storage::Storage;
//! use dockhand_registry::{Registry, RegistryError, RegistryUpdater, UpdateRequest};
//!
//! let storage = Storage::temporary().unwrap();
//! let hub = storage
//!     .create(Registry { url: "http://x".to_string(), ..Registry::default() })
//!     .unwrap();
//! let mirror = storage
//!     .create(Registry { url: "http://y".to_string(), ..Registry::default() })
//!     .unwrap();
//!
//! let updater = RegistryUpdater::new(storage);
//!
//! // Renaming is always allowed
//! let renamed = updater
//!     .update(mirror.id, UpdateRequest::default().with_name("mirror"))
//!     .unwrap();
//! assert_eq!(renamed.name, "mirror");
//!
//! // Taking another registry's URL is not
//! let err = updater
//!     .update(mirror.id, UpdateRequest::default().with_url("http://x"))
//!     .unwrap_err();
//! assert!(matches!(err, RegistryError::UrlConflict { existing, .. } if existing == hub.id));
//! ```

pub mod matching;
pub mod models;
pub mod storage;
pub mod updater;

pub use models::{
    AccessPolicy, GitlabSettings, Registry, RegistryError, RegistryId, RegistryType, Result,
    TeamAccessPolicies, UpdateRequest, UserAccessPolicies,
};
pub use tokio_util::sync::CancellationToken;
pub use updater::RegistryUpdater;
