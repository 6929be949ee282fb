//! # Core Data Models for Registry Records
//!
//! This module defines the types shared by the storage layer and the
//! updater: the persisted [`Registry`] record, the sparse [`UpdateRequest`]
//! used for partial updates, and the crate-wide [`RegistryError`].
//!
//! ## Invariants
//!
//! - **URL uniqueness**: no two records share the same effective URL. The
//!   effective URL is the plain URL for every registry type except GitLab,
//!   where the project path is part of the key (see [`crate::matching`]).
//! - **Credentials**: a record with `authentication == false` carries an
//!   empty username and password.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Identifier of a registry record.
///
/// Identifiers are positive; `0` is never assigned by the store.
pub type RegistryId = u64;

/// Identifier of a user referenced by an access policy.
pub type UserId = u64;

/// Identifier of a team referenced by an access policy.
pub type TeamId = u64;

/// Access granted to a single user or team on a registry.
///
/// The role is opaque to this crate; it is stored and replaced as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Role granted by the policy.
    #[serde(default)]
    pub role_id: u64,
}

/// Per-user access policies, keyed by user identifier.
pub type UserAccessPolicies = BTreeMap<UserId, AccessPolicy>;

/// Per-team access policies, keyed by team identifier.
pub type TeamAccessPolicies = BTreeMap<TeamId, AccessPolicy>;

/// Kind of container registry a record points at.
///
/// Only [`RegistryType::Gitlab`] changes behaviour in this crate: its
/// project path takes part in URL uniqueness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryType {
    /// Quay.io or a self-hosted Quay.
    Quay,

    /// Azure Container Registry.
    Azure,

    /// Any registry speaking the plain Docker registry API.
    #[default]
    Custom,

    /// GitLab container registry, scoped to a project.
    Gitlab,

    /// ProGet feed.
    Proget,

    /// Docker Hub.
    Dockerhub,

    /// Amazon Elastic Container Registry.
    Ecr,
}

impl RegistryType {
    /// Returns true for registry types whose identity includes a project path.
    pub fn is_gitlab(self) -> bool {
        matches!(self, RegistryType::Gitlab)
    }
}

/// GitLab-specific settings of a registry.
///
/// Only meaningful when the registry type is [`RegistryType::Gitlab`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitlabSettings {
    /// Numeric GitLab project identifier.
    #[serde(default)]
    pub project_id: u64,

    /// Base URL of the GitLab instance.
    #[serde(default)]
    pub instance_url: String,

    /// Namespace path of the project, e.g. `group/project`.
    #[serde(default)]
    pub project_path: String,
}

/// A persisted container registry record.
///
/// # Example
///
/// ```rust
/// use dockhand_registry::{Registry, RegistryType};
///
/// let registry = Registry {
///     id: 1,
///     name: "internal".to_string(),
///     url: "registry.internal:5000".to_string(),
///     registry_type: RegistryType::Custom,
///     ..Registry::default()
/// };
///
/// assert!(!registry.authentication);
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Unique identifier, immutable after creation.
    pub id: RegistryId,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Registry URL. Unique across records (see module docs).
    #[serde(default)]
    pub url: String,

    /// Registry flavour.
    #[serde(default, rename = "type")]
    pub registry_type: RegistryType,

    /// Whether the registry requires credentials.
    #[serde(default)]
    pub authentication: bool,

    /// Username, empty unless `authentication` is set.
    #[serde(default)]
    pub username: String,

    /// Password, empty unless `authentication` is set.
    #[serde(default)]
    pub password: String,

    /// GitLab project settings.
    #[serde(default)]
    pub gitlab: GitlabSettings,

    /// Access policies granted to individual users.
    #[serde(default)]
    pub user_access_policies: UserAccessPolicies,

    /// Access policies granted to teams.
    #[serde(default)]
    pub team_access_policies: TeamAccessPolicies,
}

impl Registry {
    /// Returns a copy of the record with the password blanked out.
    ///
    /// Used wherever records leave the process for display.
    pub fn redacted(&self) -> Registry {
        let mut copy = self.clone();
        if !copy.password.is_empty() {
            copy.password = REDACTED.to_string();
        }
        copy
    }
}

const REDACTED: &str = "********";

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { REDACTED };

        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("registry_type", &self.registry_type)
            .field("authentication", &self.authentication)
            .field("username", &self.username)
            .field("password", &password)
            .field("gitlab", &self.gitlab)
            .field("user_access_policies", &self.user_access_policies)
            .field("team_access_policies", &self.team_access_policies)
            .finish()
    }
}

/// A sparse set of proposed changes to a [`Registry`].
///
/// Every field is optional. `None` means "leave unchanged"; `Some("")` is a
/// real value and overwrites the stored one. A JSON `null` decodes to `None`.
///
/// # Example
///
/// ```rust
/// use dockhand_registry::UpdateRequest;
///
/// let request = UpdateRequest::default()
///     .with_name("mirror")
///     .with_authentication(false);
///
/// assert!(request.url.is_none());
/// assert_eq!(request.authentication, Some(false));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// New URL, subject to the uniqueness check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Enables or disables authentication. Disabling clears credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<bool>,

    /// New username, only applied together with `authentication: true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// New password, only applied together with `authentication: true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Replacement for the whole user policy map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_access_policies: Option<UserAccessPolicies>,

    /// Replacement for the whole team policy map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_access_policies: Option<TeamAccessPolicies>,
}

impl UpdateRequest {
    /// Sets the proposed name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the proposed URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the proposed authentication flag.
    pub fn with_authentication(mut self, enabled: bool) -> Self {
        self.authentication = Some(enabled);
        self
    }

    /// Sets the proposed credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the replacement user policy map.
    pub fn with_user_access_policies(mut self, policies: UserAccessPolicies) -> Self {
        self.user_access_policies = Some(policies);
        self
    }

    /// Sets the replacement team policy map.
    pub fn with_team_access_policies(mut self, policies: TeamAccessPolicies) -> Self {
        self.team_access_policies = Some(policies);
        self
    }

    /// Returns true if no field is supplied.
    pub fn is_empty(&self) -> bool {
        self == &UpdateRequest::default()
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The underlying database failed.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No registry exists with this identifier.
    #[error("Registry not found: {0}")]
    NotFound(RegistryId),

    /// Another registry already uses the requested URL.
    #[error("Another registry with the same URL already exists: {url}")]
    UrlConflict {
        /// The URL that was refused.
        url: String,
        /// Identifier of the registry already holding it.
        existing: RegistryId,
    },

    /// A registry with this identifier is already stored.
    #[error("Registry already exists: {0}")]
    AlreadyExists(RegistryId),

    /// Identifier `0` cannot be stored.
    #[error("Registry identifier 0 is reserved")]
    ReservedId,

    /// The stored key does not decode to an identifier.
    #[error("Corrupt registry key")]
    CorruptKey,

    /// The caller gave up before the update was persisted.
    #[error("Update cancelled before it was persisted")]
    Cancelled,
}

impl RegistryError {
    /// Returns true for failures of the backing store itself.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            RegistryError::Database(_) | RegistryError::Serialization(_) | RegistryError::CorruptKey
        )
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
