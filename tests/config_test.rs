//! 配置系统集成测试
//!
//! 测试配置文件加载、校验，以及宿主重新加载时配置的传递

use std::sync::{Arc, Mutex};

use art_modules::{
    CoreConfig, CoreError, DisableOrder, HostState, LifecycleState, Module, ModuleDescriptor,
    ModuleHost,
};
use serde_json::json;
use tempfile::TempDir;

/// 测试 YAML 配置加载
#[tokio::test]
async fn test_load_yaml_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("modules.yaml");
    tokio::fs::write(
        &path,
        r#"
logging:
  level: debug
  json_format: true
modules:
  resolver_timeout_ms: 5000
  disable_order: registration
  settings:
    storage:
      path: /var/lib/art
"#,
    )
    .await
    .unwrap();

    let config = CoreConfig::from_file(&path).await.unwrap();
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
    assert_eq!(config.modules.resolver_timeout_ms, 5000);
    assert_eq!(config.modules.disable_order, DisableOrder::Registration);
    assert_eq!(
        config.module_settings("storage"),
        Some(&json!({ "path": "/var/lib/art" }))
    );
    assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
}

/// 测试 JSON 配置加载，未指定的字段使用默认值
#[tokio::test]
async fn test_load_json_config_with_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("modules.json");
    tokio::fs::write(&path, r#"{ "modules": { "settings": { "rules": [1, 2] } } }"#)
        .await
        .unwrap();

    let config = CoreConfig::from_file(&path).await.unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.modules.resolver_timeout_ms, 30000);
    assert_eq!(config.modules.disable_order, DisableOrder::ReverseDependency);
    assert_eq!(config.module_settings("rules"), Some(&json!([1, 2])));
}

/// 测试无效配置被拒绝
#[tokio::test]
async fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();

    let zero_timeout = temp_dir.path().join("zero.yaml");
    tokio::fs::write(&zero_timeout, "modules:\n  resolver_timeout_ms: 0\n")
        .await
        .unwrap();
    assert!(matches!(
        CoreConfig::from_file(&zero_timeout).await,
        Err(CoreError::InvalidConfigValue { .. })
    ));

    let malformed = temp_dir.path().join("bad.json");
    tokio::fs::write(&malformed, "{ not json").await.unwrap();
    assert!(matches!(
        CoreConfig::from_file(&malformed).await,
        Err(CoreError::Json(_))
    ));

    let missing = temp_dir.path().join("missing.yaml");
    assert!(matches!(
        CoreConfig::from_file(&missing).await,
        Err(CoreError::ConfigLoadFailed(_))
    ));
}

// ============================================================================
// 宿主重新加载
// ============================================================================

struct Root;
impl Module for Root {}

struct Storage {
    seen: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl Module for Storage {
    fn configure(&self, settings: &serde_json::Value) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(settings.clone());
        Ok(())
    }
}

fn write_settings(path: &std::path::Path, storage_path: &str) {
    std::fs::write(
        path,
        format!("modules:\n  settings:\n    storage:\n      path: {}\n", storage_path),
    )
    .unwrap();
}

/// 测试重新加载时重新读取配置文件并传给模块
#[tokio::test]
async fn test_host_reload_rereads_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("modules.yaml");
    write_settings(&path, "/data/v1");

    let mut host = ModuleHost::from_config_file(&path).await.unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    host.orchestrator()
        .register_instance(
            ModuleDescriptor::of::<Storage>("storage"),
            Arc::new(Storage {
                seen: Arc::clone(&seen),
            }),
        )
        .await
        .unwrap();

    let root = ModuleDescriptor::of::<Root>("root").bootstrap_module();
    let report = host
        .start(root, |_| Ok(Arc::new(Root) as Arc<dyn Module>))
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(host.state().await, HostState::Running);
    assert_eq!(host.orchestrator().state("storage").await, LifecycleState::Enabled);

    write_settings(&path, "/data/v2");
    let report = host.reload().await.unwrap();
    assert!(report.is_success());
    assert_eq!(
        seen.lock().unwrap().last(),
        Some(&json!({ "path": "/data/v2" }))
    );
    assert_eq!(
        host.scope().module_settings("storage"),
        Some(json!({ "path": "/data/v2" }))
    );

    host.shutdown().await.unwrap();
    assert_eq!(host.orchestrator().state("storage").await, LifecycleState::Disabled);
}

/// 测试配置文件损坏时重新加载失败且保留原配置
#[tokio::test]
async fn test_host_reload_keeps_config_on_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("modules.yaml");
    write_settings(&path, "/data/v1");

    let mut host = ModuleHost::from_config_file(&path).await.unwrap();
    let root = ModuleDescriptor::of::<Root>("root").bootstrap_module();
    host.start(root, |_| Ok(Arc::new(Root) as Arc<dyn Module>))
        .await
        .unwrap();

    std::fs::write(&path, "modules:\n  resolver_timeout_ms: 0\n").unwrap();
    assert!(host.reload().await.is_err());
    assert_eq!(
        host.scope().module_settings("storage"),
        Some(json!({ "path": "/data/v1" }))
    );
}
