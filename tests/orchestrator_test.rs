//! # 模块编排集成测试
//!
//! 测试模块系统的完整生命周期流程，包括：
//! - 根模块引导 → 批量引导 → 加载 → 启用 → 禁用
//! - 依赖先于依赖方推进，禁用顺序相反
//! - 错误传播（钩子失败、依赖失败、循环依赖、重复注册）
//! - 全局阶段单调前进与迟到注册的追赶
//! - 重新加载与模块配置项

use std::sync::{Arc, Mutex};

use art_modules::{
    CoreConfig, CoreError, DisableOrder, GlobalPhase, LifecycleState, MemorySink, Module,
    ModuleDescriptor, ModuleOrchestrator, Scope,
};
use serde_json::json;

// ============================================================================
// 测试辅助结构
// ============================================================================

type Journal = Arc<Mutex<Vec<String>>>;

/// 记录钩子调用顺序的模块
struct Recorder {
    id: String,
    journal: Journal,
    fail_on: Option<&'static str>,
    settings: Arc<Mutex<Option<serde_json::Value>>>,
}

impl Recorder {
    fn new(id: &str, journal: &Journal) -> Self {
        Self {
            id: id.to_string(),
            journal: Arc::clone(journal),
            fail_on: None,
            settings: Arc::new(Mutex::new(None)),
        }
    }

    fn failing(mut self, hook: &'static str) -> Self {
        self.fail_on = Some(hook);
        self
    }

    fn hook(&self, name: &'static str) -> anyhow::Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.id, name));
        if self.fail_on == Some(name) {
            anyhow::bail!("{} 在 {} 失败", self.id, name);
        }
        Ok(())
    }
}

impl Module for Recorder {
    fn on_bootstrap(&self, _scope: &Scope) -> anyhow::Result<()> {
        self.hook("bootstrap")
    }

    fn on_load(&self, _scope: &Scope) -> anyhow::Result<()> {
        self.hook("load")
    }

    fn on_enable(&self, _scope: &Scope) -> anyhow::Result<()> {
        self.hook("enable")
    }

    fn on_disable(&self, _scope: &Scope) -> anyhow::Result<()> {
        self.hook("disable")
    }

    fn on_reload(&self, _scope: &Scope) -> anyhow::Result<()> {
        self.hook("reload")
    }

    fn configure(&self, settings: &serde_json::Value) -> anyhow::Result<()> {
        *self.settings.lock().unwrap() = Some(settings.clone());
        Ok(())
    }
}

struct Root;
struct Storage;
struct Rules;
struct Scheduler;
struct Intruder;
struct Core;
struct Addon;

/// 测试环境
struct Fixture {
    orchestrator: ModuleOrchestrator,
    sink: Arc<MemorySink>,
    journal: Journal,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    fn with_config(config: CoreConfig) -> Self {
        let sink = Arc::new(MemorySink::new());
        let orchestrator = ModuleOrchestrator::with_sink(Arc::new(Scope::new(config)), sink.clone());
        Self {
            orchestrator,
            sink,
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn recorder(&self, id: &str) -> Recorder {
        Recorder::new(id, &self.journal)
    }

    async fn add(&self, descriptor: ModuleDescriptor) -> art_modules::Result<()> {
        let recorder = self.recorder(descriptor.identifier());
        self.orchestrator
            .register_instance(descriptor, Arc::new(recorder))
            .await
            .map(|_| ())
    }

    fn calls(&self, hook: &str) -> Vec<String> {
        let suffix = format!(":{}", hook);
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter_map(|entry| entry.strip_suffix(&suffix).map(str::to_string))
            .collect()
    }

    async fn state(&self, id: &str) -> LifecycleState {
        self.orchestrator.state(id).await
    }
}

fn storage() -> ModuleDescriptor {
    ModuleDescriptor::of::<Storage>("storage")
}

fn rules() -> ModuleDescriptor {
    ModuleDescriptor::of::<Rules>("rules").depends_on("storage")
}

fn scheduler() -> ModuleDescriptor {
    ModuleDescriptor::of::<Scheduler>("scheduler")
        .depends_on("rules")
        .depends_on("storage")
}

// ============================================================================
// 完整生命周期
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle_from_root() {
    let fixture = Fixture::new();
    // 依赖方先注册，依赖后注册
    fixture.add(scheduler()).await.unwrap();
    fixture.add(rules()).await.unwrap();
    fixture.add(storage()).await.unwrap();

    let root = ModuleDescriptor::of::<Root>("root").bootstrap_module();
    let root_recorder = fixture.recorder("root");
    let report = fixture
        .orchestrator
        .bootstrap(root, move |_| Ok(Arc::new(root_recorder) as Arc<dyn Module>))
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(fixture.orchestrator.phase().await, GlobalPhase::Bootstrapped);
    assert_eq!(fixture.calls("bootstrap")[0], "root");

    fixture.orchestrator.load_all().await.unwrap();
    let report = fixture.orchestrator.enable_all().await.unwrap();
    assert!(report.is_success());
    assert_eq!(fixture.orchestrator.phase().await, GlobalPhase::Enabled);

    // 依赖总是先于依赖方启用
    let enabled = fixture.calls("enable");
    let position = |id: &str| enabled.iter().position(|e| e == id).unwrap();
    assert!(position("storage") < position("rules"));
    assert!(position("rules") < position("scheduler"));

    for id in ["root", "storage", "rules", "scheduler"] {
        assert_eq!(fixture.state(id).await, LifecycleState::Enabled);
    }

    let report = fixture.orchestrator.disable_all().await.unwrap();
    assert!(report.is_success());
    assert_eq!(fixture.orchestrator.phase().await, GlobalPhase::Disabled);

    // 禁用顺序与依赖顺序相反
    let disabled = fixture.calls("disable");
    let position = |id: &str| disabled.iter().position(|e| e == id).unwrap();
    assert!(position("scheduler") < position("rules"));
    assert!(position("rules") < position("storage"));
}

#[tokio::test]
async fn test_every_hook_runs_once() {
    let fixture = Fixture::new();
    fixture.add(storage()).await.unwrap();
    fixture.add(rules()).await.unwrap();

    fixture.orchestrator.enable_module("rules").await.unwrap();
    fixture.orchestrator.enable_module("rules").await.unwrap();
    fixture.orchestrator.enable_all().await.unwrap();

    assert_eq!(fixture.calls("bootstrap").len(), 2);
    assert_eq!(fixture.calls("load").len(), 2);
    assert_eq!(fixture.calls("enable").len(), 2);
}

#[tokio::test]
async fn test_transitions_are_recorded_in_order() {
    let fixture = Fixture::new();
    fixture.add(storage()).await.unwrap();
    fixture.orchestrator.enable_all().await.unwrap();

    let states: Vec<LifecycleState> = fixture
        .sink
        .history_of("storage")
        .into_iter()
        .map(|t| t.state)
        .collect();
    assert_eq!(
        states,
        vec![
            LifecycleState::Registered,
            LifecycleState::Bootstrapped,
            LifecycleState::Loaded,
            LifecycleState::Enabled,
        ]
    );

    let history = fixture.sink.history_of("storage");
    assert_eq!(history[0].previous, None);
    assert_eq!(history[3].previous, Some(LifecycleState::Loaded));
}

// ============================================================================
// 错误传播
// ============================================================================

#[tokio::test]
async fn test_failure_propagates_through_chain() {
    let fixture = Fixture::new();
    let failing = fixture.recorder("storage").failing("enable");
    fixture
        .orchestrator
        .register_instance(storage(), Arc::new(failing))
        .await
        .unwrap();
    fixture.add(rules()).await.unwrap();
    fixture.add(scheduler()).await.unwrap();

    let report = fixture.orchestrator.enable_all().await.unwrap();
    assert!(!report.is_success());

    assert_eq!(fixture.state("storage").await, LifecycleState::Error);
    assert_eq!(fixture.state("rules").await, LifecycleState::DependencyError);
    assert_eq!(fixture.state("scheduler").await, LifecycleState::DependencyError);

    // 失败的模块在之后的批量操作中不再推进
    assert!(fixture.orchestrator.disable_all().await.is_ok());
    assert_eq!(fixture.state("storage").await, LifecycleState::Error);
    assert!(!fixture.calls("disable").contains(&"storage".to_string()));
}

#[tokio::test]
async fn test_dependency_not_reaching_phase_is_dependency_error() {
    let fixture = Fixture::new();
    fixture.add(storage()).await.unwrap();
    fixture.add(rules()).await.unwrap();

    fixture.orchestrator.enable_module("storage").await.unwrap();
    fixture.orchestrator.disable_module("storage").await.unwrap();
    assert_eq!(fixture.state("storage").await, LifecycleState::Disabled);

    let err = fixture.orchestrator.enable_module("rules").await.unwrap_err();
    match err {
        CoreError::DependencyFailed {
            dependency, source, ..
        } => {
            assert_eq!(dependency, "storage");
            assert!(matches!(*source, CoreError::ModuleUnavailable { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fixture.state("rules").await, LifecycleState::DependencyError);
}

#[tokio::test]
async fn test_missing_dependency_without_resolver() {
    let fixture = Fixture::new();
    fixture.add(rules()).await.unwrap();

    let err = fixture.orchestrator.load_module("rules").await.unwrap_err();
    match err {
        CoreError::MissingDependencies { missing, .. } => assert_eq!(missing, vec!["storage"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fixture.state("rules").await, LifecycleState::MissingDependencies);
    assert!(fixture.calls("load").is_empty());
}

#[tokio::test]
async fn test_cycle_is_reported_on_registering_module() {
    let fixture = Fixture::new();
    fixture
        .add(ModuleDescriptor::of::<Storage>("x").depends_on("y"))
        .await
        .unwrap();

    let err = fixture
        .add(ModuleDescriptor::of::<Rules>("y").depends_on("x"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("y --> x --> y"));

    assert_eq!(fixture.state("x").await, LifecycleState::Registered);
    assert_eq!(fixture.state("y").await, LifecycleState::CyclicDependencies);
    assert_eq!(
        fixture.sink.modules_entering(LifecycleState::CyclicDependencies),
        vec!["y"]
    );
}

#[tokio::test]
async fn test_duplicate_identifier_keeps_first_module() {
    let fixture = Fixture::new();
    fixture.add(storage()).await.unwrap();

    let err = fixture
        .add(ModuleDescriptor::of::<Intruder>("storage"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateModule { .. }));

    let module = fixture.orchestrator.get("storage").await.unwrap();
    assert_eq!(module.descriptor.declaring_type().short_name(), "Storage");
    assert_eq!(module.state, LifecycleState::Registered);
    assert_eq!(
        fixture.sink.modules_entering(LifecycleState::DuplicateModule),
        vec!["storage"]
    );
}

#[tokio::test]
async fn test_same_type_registration_is_noop() {
    let fixture = Fixture::new();
    fixture.add(storage()).await.unwrap();
    fixture.orchestrator.enable_module("storage").await.unwrap();

    let module = fixture
        .orchestrator
        .register_instance(storage(), Arc::new(fixture.recorder("storage")))
        .await
        .unwrap();
    assert_eq!(module.state, LifecycleState::Enabled);
    assert_eq!(fixture.sink.history_of("storage").len(), 4);
}

#[tokio::test]
async fn test_error_state_is_not_advanced() {
    let fixture = Fixture::new();
    let failing = fixture.recorder("storage").failing("load");
    fixture
        .orchestrator
        .register_instance(storage(), Arc::new(failing))
        .await
        .unwrap();
    assert!(fixture.orchestrator.load_module("storage").await.is_err());
    assert_eq!(fixture.state("storage").await, LifecycleState::Error);

    for _ in 0..2 {
        fixture.orchestrator.load_module("storage").await.unwrap();
        fixture.orchestrator.enable_module("storage").await.unwrap();
    }
    assert_eq!(fixture.state("storage").await, LifecycleState::Error);
    assert_eq!(fixture.calls("load").len(), 1);
    assert!(fixture.calls("enable").is_empty());
}

#[tokio::test]
async fn test_retry_after_error_renews_module() {
    let fixture = Fixture::new();
    fixture.add(rules()).await.unwrap();
    assert!(fixture.orchestrator.enable_module("rules").await.is_err());
    assert_eq!(fixture.state("rules").await, LifecycleState::MissingDependencies);

    fixture.add(storage()).await.unwrap();
    let module = fixture.orchestrator.retry_module("rules").await.unwrap();
    assert_eq!(module.state, LifecycleState::Registered);

    fixture.orchestrator.enable_module("rules").await.unwrap();
    assert_eq!(fixture.state("rules").await, LifecycleState::Enabled);
}

// ============================================================================
// 全局阶段
// ============================================================================

#[tokio::test]
async fn test_phase_only_moves_forward() {
    let fixture = Fixture::new();
    fixture.add(storage()).await.unwrap();
    fixture.add(rules()).await.unwrap();
    fixture.orchestrator.enable_all().await.unwrap();

    let ids = ["storage", "rules"];
    let mut states = Vec::new();
    for id in ids {
        states.push(fixture.state(id).await);
    }
    let transitions = fixture.sink.history().len();
    let hooks = fixture.journal.lock().unwrap().len();

    for result in [
        fixture.orchestrator.bootstrap_all().await,
        fixture.orchestrator.load_all().await,
        fixture.orchestrator.enable_all().await,
    ] {
        assert!(matches!(result, Err(CoreError::Bootstrap(_))));
    }

    // 被拒绝的批量阶段不触碰任何模块
    for (id, before) in ids.iter().zip(&states) {
        assert_eq!(fixture.state(id).await, *before, "{id}");
    }
    assert_eq!(fixture.sink.history().len(), transitions);
    assert_eq!(fixture.journal.lock().unwrap().len(), hooks);
    assert_eq!(fixture.orchestrator.phase().await, GlobalPhase::Enabled);

    fixture.orchestrator.disable_all().await.unwrap();
    let transitions = fixture.sink.history().len();
    assert!(fixture.orchestrator.disable_all().await.is_err());
    assert_eq!(fixture.sink.history().len(), transitions);
    assert_eq!(fixture.orchestrator.phase().await, GlobalPhase::Disabled);
}

/// 无论注册顺序如何，被依赖的模块总是先启用
#[tokio::test]
async fn test_dependency_enabled_first_in_either_registration_order() {
    let core = || ModuleDescriptor::of::<Core>("core");
    let addon = || ModuleDescriptor::of::<Addon>("addon").depends_on("core");
    let orders: [[fn() -> ModuleDescriptor; 2]; 2] = [[core, addon], [addon, core]];

    for (case, order) in orders.iter().enumerate() {
        let fixture = Fixture::new();
        for descriptor in order {
            fixture.add(descriptor()).await.unwrap();
        }
        let report = fixture.orchestrator.enable_all().await.unwrap();
        assert!(report.is_success(), "case {case}");

        for id in ["core", "addon"] {
            assert_eq!(fixture.state(id).await, LifecycleState::Enabled, "case {case}: {id}");
        }

        let entered = fixture.sink.modules_entering(LifecycleState::Enabled);
        let position = |ids: &[String], id: &str| ids.iter().position(|e| e == id).unwrap();
        assert!(position(&entered, "core") < position(&entered, "addon"), "case {case}");

        let enabled = fixture.calls("enable");
        assert_eq!(enabled.len(), 2, "case {case}");
        assert!(position(&enabled, "core") < position(&enabled, "addon"), "case {case}");
    }
}

#[tokio::test]
async fn test_bootstrap_rejects_non_root_module() {
    let fixture = Fixture::new();
    let recorder = fixture.recorder("storage");
    let err = fixture
        .orchestrator
        .bootstrap(storage(), move |_| Ok(Arc::new(recorder) as Arc<dyn Module>))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::BootstrapFailed(_)));
    assert_eq!(err.state(), Some(LifecycleState::InvalidModule));
    assert_eq!(fixture.orchestrator.phase().await, GlobalPhase::PreBootstrap);
}

#[tokio::test]
async fn test_failed_root_disables_everything() {
    let fixture = Fixture::new();
    fixture.add(storage()).await.unwrap();

    let root = ModuleDescriptor::of::<Root>("root").bootstrap_module();
    let recorder = fixture.recorder("root").failing("bootstrap");
    let err = fixture
        .orchestrator
        .bootstrap(root, move |_| Ok(Arc::new(recorder) as Arc<dyn Module>))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::BootstrapFailed(_)));
    assert_eq!(fixture.state("root").await, LifecycleState::Error);
    assert_eq!(fixture.orchestrator.phase().await, GlobalPhase::Disabled);
}

#[tokio::test]
async fn test_late_registration_catches_up() {
    let fixture = Fixture::new();
    fixture.add(storage()).await.unwrap();
    fixture.orchestrator.load_all().await.unwrap();

    fixture.add(rules()).await.unwrap();
    assert_eq!(fixture.state("rules").await, LifecycleState::Loaded);

    fixture.orchestrator.enable_all().await.unwrap();
    fixture.add(scheduler()).await.unwrap();
    assert_eq!(fixture.state("scheduler").await, LifecycleState::Enabled);
}

#[tokio::test]
async fn test_registration_after_disable_only_loads() {
    let fixture = Fixture::new();
    fixture.orchestrator.enable_all().await.unwrap();
    fixture.orchestrator.disable_all().await.unwrap();

    fixture.add(storage()).await.unwrap();
    assert_eq!(fixture.state("storage").await, LifecycleState::Loaded);
}

#[tokio::test]
async fn test_disable_in_registration_order() {
    let config = CoreConfig::builder()
        .disable_order(DisableOrder::Registration)
        .build();
    let fixture = Fixture::with_config(config);
    fixture.add(storage()).await.unwrap();
    fixture.add(rules()).await.unwrap();
    fixture.orchestrator.enable_all().await.unwrap();

    fixture.orchestrator.disable_all().await.unwrap();
    assert_eq!(fixture.calls("disable"), vec!["storage", "rules"]);
}

// ============================================================================
// 重新加载
// ============================================================================

#[tokio::test]
async fn test_reload_applies_latest_settings() {
    let fixture = Fixture::new();
    let recorder = fixture.recorder("storage");
    let settings = Arc::clone(&recorder.settings);
    fixture
        .orchestrator
        .register_instance(storage(), Arc::new(recorder))
        .await
        .unwrap();
    fixture.add(rules()).await.unwrap();
    fixture.orchestrator.enable_module("storage").await.unwrap();

    let config = CoreConfig::builder()
        .module_settings("storage", json!({ "path": "/var/lib/art" }))
        .build();
    fixture.orchestrator.scope().update_config(config);

    let report = fixture.orchestrator.reload_all().await.unwrap();
    assert_eq!(report.completed, vec!["storage"]);
    assert_eq!(report.skipped, vec!["rules"]);
    assert_eq!(
        *settings.lock().unwrap(),
        Some(json!({ "path": "/var/lib/art" }))
    );
    assert_eq!(fixture.calls("reload"), vec!["storage"]);
}

#[tokio::test]
async fn test_failed_reload_keeps_state() {
    let fixture = Fixture::new();
    let recorder = fixture.recorder("storage").failing("reload");
    fixture
        .orchestrator
        .register_instance(storage(), Arc::new(recorder))
        .await
        .unwrap();
    fixture.orchestrator.enable_module("storage").await.unwrap();

    assert!(fixture.orchestrator.reload_module("storage").await.is_err());
    assert_eq!(fixture.state("storage").await, LifecycleState::Enabled);

    assert!(matches!(
        fixture.orchestrator.reload_module("unknown").await,
        Err(CoreError::ModuleNotFound(_))
    ));
}
