//! # Effective URL Matching
//!
//! Two registries collide when they share an *effective URL*. For most
//! registry types that is just the URL. GitLab registries live under one
//! host per instance, so their project path acts as a secondary
//! discriminator:
//!
//! | Left | Right | Equal when |
//! |------|-------|------------|
//! | other | other | URLs equal |
//! | gitlab | gitlab | URLs equal and project paths equal |
//! | gitlab | other | URLs equal |
//!
//! All comparisons are byte-exact; no URL normalisation happens here.

use crate::models::Registry;

/// The uniqueness key of a registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveUrl<'a> {
    /// Registry URL.
    pub url: &'a str,

    /// Project path, present only for GitLab registries.
    pub project_path: Option<&'a str>,
}

impl<'a> EffectiveUrl<'a> {
    /// Effective URL of a stored record.
    pub fn of(registry: &'a Registry) -> Self {
        Self::with_url(registry, &registry.url)
    }

    /// Effective URL `registry` would have if its URL became `url`.
    ///
    /// The type and project path come from the record as stored.
    pub fn with_url(registry: &'a Registry, url: &'a str) -> Self {
        let project_path = registry
            .registry_type
            .is_gitlab()
            .then_some(registry.gitlab.project_path.as_str());

        EffectiveUrl { url, project_path }
    }

    /// Returns true if the two keys identify the same registry location.
    pub fn matches(&self, other: &EffectiveUrl<'_>) -> bool {
        match (self.project_path, other.project_path) {
            (Some(left), Some(right)) => self.url == other.url && left == right,
            _ => self.url == other.url,
        }
    }
}

/// Returns true if two stored records share an effective URL.
pub fn has_same_url(left: &Registry, right: &Registry) -> bool {
    EffectiveUrl::of(left).matches(&EffectiveUrl::of(right))
}

/// Finds the first record other than `target` that would collide with
/// `target` once its URL became `candidate_url`.
pub fn find_conflict<'r>(
    target: &Registry,
    candidate_url: &str,
    registries: &'r [Registry],
) -> Option<&'r Registry> {
    let candidate = EffectiveUrl::with_url(target, candidate_url);

    registries
        .iter()
        .filter(|other| other.id != target.id)
        .find(|other| EffectiveUrl::of(other).matches(&candidate))
}
