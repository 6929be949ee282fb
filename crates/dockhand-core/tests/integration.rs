//! # Dockhand Integration Tests
//!
//! End-to-end tests driving [`RegistryService`] over an on-disk database,
//! from raw identifier and payload to status code and JSON body.
//!
//! ## Coverage
//!
//! | Outcome | Test |
//! |---------|------|
//! | Disable authentication | `test_disable_authentication_end_to_end` |
//! | Malformed identifier | `test_bad_identifier_is_400` |
//! | Malformed payload | `test_bad_payload_is_400` |
//! | Unknown registry | `test_unknown_registry_is_404` |
//! | URL conflict | `test_url_conflict_is_409` |
//! | GitLab project paths | `test_gitlab_project_paths_discriminate` |
//! | Persistence | `test_update_survives_reopen` |
//! | Import uniqueness | `test_import_rejects_duplicate_urls` |

use dockhand_core::{DockhandConfig, ErrorBody, RegistryService, Response};
use dockhand_registry::{GitlabSettings, Registry, RegistryType};
use tempfile::TempDir;

/// Creates a configuration pointing at a temporary database.
fn test_config(temp_dir: &TempDir) -> DockhandConfig {
    let mut config = DockhandConfig::default();
    config.storage.db_path = temp_dir.path().join("test_registry.db");
    config
}

fn registry(id: u64, url: &str) -> Registry {
    Registry {
        id,
        name: format!("registry-{}", id),
        url: url.to_string(),
        ..Registry::default()
    }
}

fn gitlab(id: u64, url: &str, path: &str) -> Registry {
    Registry {
        registry_type: RegistryType::Gitlab,
        gitlab: GitlabSettings {
            project_path: path.to_string(),
            ..GitlabSettings::default()
        },
        ..registry(id, url)
    }
}

async fn seeded(temp_dir: &TempDir, registries: Vec<Registry>) -> RegistryService {
    let service = RegistryService::open(&test_config(temp_dir)).unwrap();
    service.import(registries).await.unwrap();
    service
}

fn error_body(response: &Response) -> ErrorBody {
    serde_json::from_value(response.body.clone()).unwrap()
}

// =============================================================================
// SUCCESSFUL UPDATES
// =============================================================================

#[tokio::test]
async fn test_disable_authentication_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(
        &temp_dir,
        vec![Registry {
            authentication: true,
            username: "u".to_string(),
            password: "p".to_string(),
            ..registry(1, "http://a")
        }],
    )
    .await;

    let response = service
        .handle_update("1", br#"{"authentication": false}"#)
        .await;

    assert_eq!(response.status, 200);
    let updated: Registry = serde_json::from_value(response.body).unwrap();
    assert!(!updated.authentication);
    assert_eq!(updated.username, "");
    assert_eq!(updated.password, "");
    assert_eq!(updated.url, "http://a");
    assert_eq!(updated.name, "registry-1");

    assert_eq!(service.get("1").await.unwrap(), updated);
}

#[tokio::test]
async fn test_empty_payload_returns_record_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let original = registry(1, "http://a");
    let service = seeded(&temp_dir, vec![original.clone()]).await;

    let response = service.handle_update("1", b"{}").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, serde_json::to_value(&original).unwrap());
}

#[tokio::test]
async fn test_policies_replace_whole_map() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(&temp_dir, vec![registry(1, "http://a")]).await;

    let response = service
        .handle_update(
            "1",
            br#"{"user_access_policies": {"4": {"role_id": 1}}, "team_access_policies": {}}"#,
        )
        .await;

    assert_eq!(response.status, 200);
    let updated: Registry = serde_json::from_value(response.body).unwrap();
    assert_eq!(updated.user_access_policies.len(), 1);
    assert_eq!(updated.user_access_policies[&4].role_id, 1);
    assert!(updated.team_access_policies.is_empty());
}

// =============================================================================
// CALLER ERRORS
// =============================================================================

#[tokio::test]
async fn test_bad_identifier_is_400() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(&temp_dir, vec![registry(1, "http://a")]).await;

    for raw in ["abc", "0", "-3", ""] {
        let response = service.handle_update(raw, br#"{"name": "x"}"#).await;
        assert_eq!(response.status, 400, "identifier {:?}", raw);
        assert_eq!(
            error_body(&response).message,
            "Invalid registry identifier route variable"
        );
    }
}

#[tokio::test]
async fn test_bad_payload_is_400() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(&temp_dir, vec![registry(1, "http://a")]).await;

    let response = service.handle_update("1", b"{\"name\": ").await;

    assert_eq!(response.status, 400);
    assert_eq!(error_body(&response).message, "Invalid request payload");
    assert_eq!(service.get("1").await.unwrap().name, "registry-1");
}

#[tokio::test]
async fn test_unknown_registry_is_404() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(&temp_dir, vec![registry(1, "http://a")]).await;

    let response = service.handle_update("9999", br#"{"name": "x"}"#).await;

    assert_eq!(response.status, 404);
    assert_eq!(service.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_url_conflict_is_409() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(
        &temp_dir,
        vec![registry(1, "http://x"), registry(2, "http://y")],
    )
    .await;

    let response = service
        .handle_update("2", br#"{"name": "renamed", "url": "http://x"}"#)
        .await;

    assert_eq!(response.status, 409);
    assert_eq!(
        error_body(&response).message,
        "Another registry with the same URL already exists"
    );
    assert_eq!(service.get("2").await.unwrap(), registry(2, "http://y"));
}

#[tokio::test]
async fn test_gitlab_project_paths_discriminate() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(
        &temp_dir,
        vec![gitlab(1, "http://g", "p1"), gitlab(2, "http://g", "p2")],
    )
    .await;

    let response = service.handle_update("2", br#"{"url": "http://g"}"#).await;

    assert_eq!(response.status, 200);
}

// =============================================================================
// STORAGE
// =============================================================================

#[tokio::test]
async fn test_update_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let service = seeded(&temp_dir, vec![registry(1, "http://a")]).await;
        let response = service.handle_update("1", br#"{"url": "http://moved"}"#).await;
        assert_eq!(response.status, 200);
        service.store().flush().unwrap();
    }

    let service = RegistryService::open(&test_config(&temp_dir)).unwrap();
    assert_eq!(service.get("1").await.unwrap().url, "http://moved");
}

#[tokio::test]
async fn test_import_rejects_duplicate_ids() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(&temp_dir, vec![registry(1, "http://a")]).await;

    let err = service
        .import(vec![registry(1, "http://b")])
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 409);
    assert_eq!(service.get("1").await.unwrap().url, "http://a");
}

#[tokio::test]
async fn test_import_rejects_duplicate_urls() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(&temp_dir, vec![registry(1, "http://a")]).await;

    let err = service
        .import(vec![registry(2, "http://b"), registry(3, "http://b")])
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let err = service
        .import(vec![registry(4, "http://a")])
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(
        err.message(),
        "Another registry with the same URL already exists"
    );

    let urls: Vec<_> = service.list().await.unwrap().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["http://a"]);
}

#[tokio::test]
async fn test_import_allows_gitlab_projects_on_one_url() {
    let temp_dir = TempDir::new().unwrap();
    let service = seeded(&temp_dir, vec![gitlab(1, "http://g", "group/one")]).await;

    let count = service
        .import(vec![gitlab(2, "http://g", "group/two")])
        .await
        .unwrap();
    assert_eq!(count, 1);

    let err = service
        .import(vec![gitlab(3, "http://g", "group/one")])
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
}
