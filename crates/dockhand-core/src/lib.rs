//! # Dockhand Core
//!
//! Transport-facing facade over the registry updater. A transport hands in
//! a raw path identifier and a raw JSON body; Dockhand Core hands back a
//! status code and a JSON body.
//!
//! ## Request Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       DOCKHAND CORE                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  "3", {"url": ..}                                               │
//! │        │                                                        │
//! │        ▼                                                        │
//! │  ┌─────────────┐   400    ┌──────────────────┐                  │
//! │  │ parse id /  │────────▶ │                  │                  │
//! │  │ payload     │          │                  │                  │
//! │  └──────┬──────┘          │                  │                  │
//! │         ▼                 │     Response     │                  │
//! │  ┌─────────────┐ 404/409  │  status + JSON   │                  │
//! │  │ blocking    │────────▶ │                  │                  │
//! │  │ task:       │   500    │                  │                  │
//! │  │ updater     │────────▶ │                  │                  │
//! │  └─────────────┘   200    └──────────────────┘                  │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Codes
//!
//! | Outcome | Status |
//! |---------|--------|
//! | Updated record | 200 |
//! | Malformed identifier or payload | 400 |
//! | Unknown registry | 404 |
//! | URL used by another registry | 409 |
//! | Storage failure, timeout | 500 |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dockhand_core::{DockhandConfig, RegistryService};
//!
//! let service = RegistryService::open(&DockhandConfig::default())?;
//! let response = service.handle_update("1", br#"{"authentication": false}"#).await;
//! write_json(response.status, &response.body);
//! ```

mod config;
mod error;
mod response;
mod service;

pub use config::{DockhandConfig, LoggingConfig, ServiceConfig, StorageConfig};
pub use error::{ErrorKind, ServiceError};
pub use response::{ErrorBody, Response};
pub use service::{parse_id, parse_payload, RegistryService};

// Re-export registry types for convenience
pub use dockhand_registry::{Registry, RegistryId, RegistryType, UpdateRequest};

/// Result type for Dockhand Core operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
