//! Configuration document tests: JsonConfigStore + Supervisor

use procwatch_core::application::{Registry, Supervisor, SupervisorSettings};
use procwatch_core::domain::{LifecycleState, SupervisorConfig, TargetConfig};
use procwatch_core::port::os_adapter::mocks::MockOsAdapter;
use procwatch_core::port::{ConfigStore, ConfigStoreError, SystemTimeProvider};
use procwatch_core::AppError;
use procwatch_infra_config::JsonConfigStore;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DOCUMENT: &str = r#"{
  "targets": [
    { "id": "api", "name": "API", "kind": "spawned", "executable": "/opt/api/bin/api",
      "args": ["--port", "8080"], "auto_restart": true, "shutdown_timeout_secs": 5 },
    { "id": "db", "name": "Database", "kind": "service", "service_name": "postgresql" }
  ]
}"#;

async fn boot(dir: &Path) -> (Arc<Supervisor>, Arc<JsonConfigStore>) {
    let path = dir.join("config.json");
    std::fs::write(&path, DOCUMENT).unwrap();

    let store = Arc::new(JsonConfigStore::new(&path));
    let config = store.load().await.unwrap();
    let registry = Arc::new(Registry::from_config(&config, 60).unwrap());
    let sup = Supervisor::new(
        registry,
        Arc::new(MockOsAdapter::new()),
        store.clone(),
        Arc::new(SystemTimeProvider),
        SupervisorSettings::new(dir.join("logs")),
    );
    (sup, store)
}

/// Test 1: boot from disk keeps document order and fields
#[tokio::test]
async fn test_boot_from_document() {
    let dir = TempDir::new().unwrap();
    let (sup, _) = boot(dir.path()).await;

    let statuses = sup.list_statuses();
    let ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["api", "db"]);
    assert!(statuses[0].auto_restart);
    assert!(statuses[1].is_service);
    assert!(statuses.iter().all(|s| s.state == LifecycleState::Stopped));
}

/// Test 2: auto-restart toggles survive a reload
#[tokio::test]
async fn test_auto_restart_toggle_is_persisted() {
    let dir = TempDir::new().unwrap();
    let (sup, store) = boot(dir.path()).await;

    sup.set_auto_restart("api", false).await.unwrap();

    let reloaded = store.load().await.unwrap();
    assert!(!reloaded.targets[0].auto_restart);
    assert_eq!(reloaded.targets[0].shutdown_timeout_secs, 5);
}

/// Test 3: replace adds targets and writes the new document
#[tokio::test]
async fn test_replace_adds_target() {
    let dir = TempDir::new().unwrap();
    let (sup, store) = boot(dir.path()).await;

    let mut config = sup.config();
    config
        .targets
        .push(TargetConfig::spawned("worker", "Worker", "/opt/worker/bin/run", vec![]));
    sup.replace_config(config).await.unwrap();

    assert_eq!(sup.status("worker").unwrap().state, LifecycleState::Stopped);
    assert_eq!(store.load().await.unwrap().targets.len(), 3);
    assert!(!dir.path().join("config.json.tmp").exists());
}

/// Test 4: removing a running target is refused and nothing changes
#[tokio::test]
async fn test_replace_refuses_removing_running_target() {
    let dir = TempDir::new().unwrap();
    let (sup, store) = boot(dir.path()).await;
    sup.start("api").await.unwrap();

    let config = SupervisorConfig {
        targets: vec![TargetConfig::service("db", "Database", "postgresql")],
    };
    let err = sup.replace_config(config).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    assert_eq!(sup.list_statuses().len(), 2);
    assert_eq!(store.load().await.unwrap().targets.len(), 2);
    assert_eq!(sup.status("api").unwrap().state, LifecycleState::Running);
}

/// Test 5: a hand-edited document with shell metacharacters is rejected at load
#[tokio::test]
async fn test_load_rejects_dangerous_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"targets":[{"id":"x","name":"X","kind":"spawned","executable":"/bin/sh","args":["-c","rm -rf / | true"]}]}"#,
    )
    .unwrap();

    let err = JsonConfigStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, ConfigStoreError::Invalid(_)));
}
