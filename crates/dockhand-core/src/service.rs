//! The registry service facade.
//!
//! This module is the boundary between a transport (HTTP handler, CLI) and
//! the synchronous [`RegistryUpdater`]. The [`RegistryService`] struct
//! parses raw identifiers and payloads, runs each request on its own
//! blocking task, enforces the request timeout and maps outcomes to
//! [`Response`]s.

use crate::{
    config::{DockhandConfig, ServiceConfig},
    error::ServiceError,
    response::Response,
    Result,
};

use dockhand_registry::storage::{RegistryStore, Storage};
use dockhand_registry::{Registry, RegistryError, RegistryId, RegistryUpdater, UpdateRequest};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Transport-facing entry point for registry operations.
///
/// Cloning is cheap; clones share the updater and its locks, so a single
/// service (and its clones) must be the only writer of existing records.
///
/// # Example
///
/// ```rust,ignore
/// let service = RegistryService::open(&DockhandConfig::default())?;
///
/// // PUT /registries/:id
/// let response = service.handle_update("3", br#"{"name": "mirror"}"#).await;
/// assert_eq!(response.status, 200);
/// ```
pub struct RegistryService<S = Storage> {
    /// Updater shared with in-flight blocking tasks.
    updater: Arc<RegistryUpdater<S>>,

    /// Request handling settings.
    config: ServiceConfig,
}

impl<S> Clone for RegistryService<S> {
    fn clone(&self) -> Self {
        Self {
            updater: Arc::clone(&self.updater),
            config: self.config.clone(),
        }
    }
}

impl RegistryService<Storage> {
    /// Opens the configured storage and builds a service over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry database cannot be opened.
    pub fn open(config: &DockhandConfig) -> Result<Self> {
        let storage = if config.storage.temporary {
            Storage::temporary()?
        } else {
            Storage::open(&config.storage.db_path)?
        };

        info!(
            "Registry service opened {} records (timeout: {:?})",
            storage.len(),
            config.service.request_timeout()
        );

        Ok(Self::with_store(storage, config.service.clone()))
    }

    /// Seeds the store with `registries`, keeping their identifiers.
    ///
    /// The batch is validated as a whole (see [`RegistryUpdater::import`]);
    /// a refused batch writes nothing. Returns the number of inserted
    /// records.
    pub async fn import(&self, registries: Vec<Registry>) -> Result<usize> {
        let updater = Arc::clone(&self.updater);

        let count = tokio::task::spawn_blocking(move || updater.import(&registries))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))??;

        Ok(count)
    }
}

impl<S: RegistryStore + 'static> RegistryService<S> {
    /// Builds a service over an existing store.
    pub fn with_store(store: S, config: ServiceConfig) -> Self {
        Self {
            updater: Arc::new(RegistryUpdater::new(store)),
            config,
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        self.updater.store()
    }

    /// Handles an update addressed by a raw path identifier and a raw JSON
    /// body, producing the response to send back.
    pub async fn handle_update(&self, raw_id: &str, payload: &[u8]) -> Response {
        let result = self.update_raw(raw_id, payload).await;
        match &result {
            Err(ServiceError::Registry(err)) if err.is_storage() => {
                error!("Registry update {} hit a storage failure: {}", raw_id, err);
            }
            Err(err) => {
                warn!("Registry update {} failed ({}): {}", raw_id, err.status_code(), err);
            }
            Ok(_) => {}
        }
        Response::from(result)
    }

    /// Parses `raw_id` and `payload`, then applies the update.
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` and `InvalidPayload` for malformed input, plus
    /// everything [`update`](Self::update) returns.
    pub async fn update_raw(&self, raw_id: &str, payload: &[u8]) -> Result<Registry> {
        let id = parse_id(raw_id)?;
        let request = parse_payload(payload)?;
        self.update(id, request).await
    }

    /// Applies `request` to registry `id` on a dedicated blocking task.
    ///
    /// If the returned future is dropped or the request timeout elapses,
    /// the update is cancelled at its next store call and nothing is
    /// written.
    pub async fn update(&self, id: RegistryId, request: UpdateRequest) -> Result<Registry> {
        debug!("Update requested for registry {}", id);

        self.run(move |updater, cancel| updater.update_with_cancel(id, request, cancel))
            .await
    }

    /// Loads one registry.
    pub async fn get(&self, raw_id: &str) -> Result<Registry> {
        let id = parse_id(raw_id)?;
        self.run(move |updater, _| updater.store().get_by_id(id)).await
    }

    /// Loads every registry.
    pub async fn list(&self) -> Result<Vec<Registry>> {
        self.run(|updater, _| updater.store().get_all()).await
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RegistryUpdater<S>, &CancellationToken) -> dockhand_registry::Result<T> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();

        let updater = Arc::clone(&self.updater);
        let task_cancel = cancel.clone();
        let mut task = tokio::task::spawn_blocking(move || op(&updater, &task_cancel));

        let joined = match self.config.request_timeout() {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    // The task stops at its next checkpoint or finishes a
                    // write that already started.
                    cancel.cancel();
                    match task.await {
                        Ok(Err(RegistryError::Cancelled)) => {
                            return Err(ServiceError::Timeout(limit))
                        }
                        other => other,
                    }
                }
            },
            None => task.await,
        };

        let outcome = joined.map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok(outcome?)
    }
}

impl<S> std::fmt::Debug for RegistryService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryService")
            .field("config", &self.config)
            .finish()
    }
}

/// Parses a path identifier. Only positive decimal integers are accepted.
pub fn parse_id(raw: &str) -> Result<RegistryId> {
    match raw.trim().parse::<RegistryId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ServiceError::InvalidIdentifier(raw.to_string())),
    }
}

/// Decodes an update payload.
pub fn parse_payload(payload: &[u8]) -> Result<UpdateRequest> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_id_accepts_positive_integers() {
        assert_eq!(parse_id("1").unwrap(), 1);
        assert_eq!(parse_id(" 42 ").unwrap(), 42);
    }

    #[test]
    fn test_parse_id_rejects_malformed() {
        for raw in ["", "0", "-1", "abc", "1.5", "99999999999999999999999"] {
            let err = parse_id(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_parse_payload() {
        let request = parse_payload(br#"{"name": "n", "authentication": false}"#).unwrap();
        assert_eq!(request.name.as_deref(), Some("n"));
        assert_eq!(request.authentication, Some(false));

        assert_eq!(parse_payload(b"{}").unwrap(), UpdateRequest::default());
    }

    #[test]
    fn test_parse_payload_rejects_bad_shapes() {
        for raw in [&b"{"[..], b"null", br#"{"name": 5}"#, br#"{"authentication": "yes"}"#] {
            let err = parse_payload(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest);
        }
    }
}
