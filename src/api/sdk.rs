//! ModuleHost SDK
//!
//! 模块系统的主要对外接口。把配置、日志、作用域和编排器组装在一起，
//! 并提供完整的启动、重新加载和关闭流程：
//!
//! - `start()`：引导根模块，然后加载、启用所有模块
//! - `reload()`：重新读取配置文件，然后重新加载所有已启用的模块
//! - `shutdown()`：禁用所有模块
//!
//! # 示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use art_modules::{CoreConfig, Module, ModuleDescriptor, ModuleHost};
//!
//! struct Root;
//! impl Module for Root {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CoreConfig::builder().log_level("info").build();
//!     let mut host = ModuleHost::new(config);
//!     host.init_logging()?;
//!
//!     let root = ModuleDescriptor::of::<Root>("root").bootstrap_module();
//!     let report = host
//!         .start(root, |_scope| Ok(Arc::new(Root) as Arc<dyn Module>))
//!         .await?;
//!     assert!(report.is_success());
//!
//!     host.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::config::CoreConfig;
use crate::core::scope::Scope;
use crate::module::descriptor::ModuleDescriptor;
use crate::module::events::TransitionSink;
use crate::module::instance::Module;
use crate::module::lifecycle::GlobalPhase;
use crate::module::orchestrator::{ModuleOrchestrator, PhaseReport};
use crate::utils::logger::{LogGuard, Logger, LoggerConfig};
use crate::utils::{CoreError, Result};

// ============================================================================
// 宿主状态
// ============================================================================

/// 宿主状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// 已创建，尚未启动
    Initialized,
    /// 运行中
    Running,
    /// 正在关闭
    ShuttingDown,
    /// 已关闭
    Shutdown,
}

impl HostState {
    /// 检查是否可以启动
    pub fn can_start(&self) -> bool {
        matches!(self, HostState::Initialized)
    }

    /// 检查是否可以关闭
    pub fn can_shutdown(&self) -> bool {
        matches!(self, HostState::Running)
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        matches!(self, HostState::Running)
    }
}

/// 宿主状态快照
#[derive(Debug, Clone)]
pub struct HostStatus {
    /// 宿主状态
    pub state: HostState,
    /// 全局阶段
    pub phase: GlobalPhase,
    /// 已注册模块数量
    pub module_count: usize,
    /// 各生命周期状态的模块数量
    pub states: BTreeMap<String, usize>,
    /// 运行时长（秒）
    pub uptime_secs: u64,
}

// ============================================================================
// ModuleHost 主结构体
// ============================================================================

/// 模块宿主
///
/// # 生命周期
///
/// 1. `new()` - 创建作用域和编排器
/// 2. `start()` - 引导根模块并启用所有模块
/// 3. `reload()` - 按需重新加载
/// 4. `shutdown()` - 禁用所有模块
pub struct ModuleHost {
    /// 共享作用域
    scope: Arc<Scope>,

    /// 模块编排器
    orchestrator: ModuleOrchestrator,

    /// 宿主状态
    state: Arc<RwLock<HostState>>,

    /// 日志守卫
    log_guard: Option<LogGuard>,

    /// 启动时间
    started_at: Option<Instant>,
}

impl ModuleHost {
    // ========================================================================
    // 初始化
    // ========================================================================

    /// 创建宿主
    pub fn new(config: CoreConfig) -> Self {
        let scope = Arc::new(Scope::new(config));
        let orchestrator = ModuleOrchestrator::new(Arc::clone(&scope));
        Self::assemble(scope, orchestrator)
    }

    /// 创建宿主，并把状态变更发送到指定的接收器
    pub fn with_sink(config: CoreConfig, sink: Arc<dyn TransitionSink>) -> Self {
        let scope = Arc::new(Scope::new(config));
        let orchestrator = ModuleOrchestrator::with_sink(Arc::clone(&scope), sink);
        Self::assemble(scope, orchestrator)
    }

    /// 从配置文件创建宿主
    ///
    /// # Errors
    ///
    /// 配置文件无法读取、解析或校验失败时返回错误
    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = CoreConfig::from_file(path.as_ref()).await?;
        Ok(Self::new(config))
    }

    fn assemble(scope: Arc<Scope>, orchestrator: ModuleOrchestrator) -> Self {
        debug!(version = crate::VERSION, "模块宿主已创建");
        Self {
            scope,
            orchestrator,
            state: Arc::new(RwLock::new(HostState::Initialized)),
            log_guard: None,
            started_at: None,
        }
    }

    /// 按当前配置初始化日志系统
    ///
    /// 守卫由宿主持有；日志系统已被初始化时返回 `InitFailed`。
    pub fn init_logging(&mut self) -> Result<()> {
        let config = LoggerConfig::from_log_config(&self.scope.config().logging);
        self.log_guard = Some(Logger::init(config)?);
        Ok(())
    }

    /// 模块编排器
    pub fn orchestrator(&self) -> &ModuleOrchestrator {
        &self.orchestrator
    }

    /// 共享作用域
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// 宿主状态
    pub async fn state(&self) -> HostState {
        *self.state.read().await
    }

    // ========================================================================
    // 生命周期
    // ========================================================================

    /// 启动模块系统
    ///
    /// 依次执行引导、加载和启用，返回合并后的报告。单个模块的失败记录在报告中，
    /// 不会中断启动。
    ///
    /// # Errors
    ///
    /// - `InitFailed`：宿主已经启动过
    /// - `BootstrapFailed`：根模块无法引导
    pub async fn start<F>(&mut self, root: ModuleDescriptor, factory: F) -> Result<PhaseReport>
    where
        F: FnOnce(&Scope) -> anyhow::Result<Arc<dyn Module>> + Send,
    {
        let mut state = self.state.write().await;
        if !state.can_start() {
            return Err(CoreError::InitFailed(format!(
                "宿主当前状态 {:?} 不允许启动",
                *state
            )));
        }

        info!(module_id = %root.identifier(), "启动模块系统 v{}", crate::VERSION);

        let mut report = match self.orchestrator.bootstrap(root, factory).await {
            Ok(report) => report,
            Err(e) => {
                *state = HostState::Shutdown;
                return Err(e);
            }
        };
        report.merge(self.orchestrator.load_all().await?);
        report.merge(self.orchestrator.enable_all().await?);

        *state = HostState::Running;
        self.started_at = Some(Instant::now());

        if report.is_success() {
            info!("模块系统已启动");
        } else {
            warn!(failed = ?report.failed_modules(), "模块系统已启动，部分模块失败");
        }
        Ok(report)
    }

    /// 重新加载
    ///
    /// 配置来自文件时先重新读取文件并替换作用域中的配置，然后重新加载所有已启用的模块。
    ///
    /// # Errors
    ///
    /// 宿主未运行，或配置文件读取失败时返回错误；此时作用域中的配置保持不变。
    pub async fn reload(&self) -> Result<PhaseReport> {
        if !self.state().await.is_running() {
            return Err(CoreError::InitFailed("宿主未运行，无法重新加载".to_string()));
        }

        if let Some(path) = self.scope.config().config_path.clone() {
            let config = CoreConfig::from_file(&path).await?;
            self.scope.update_config(config);
            debug!(path = %path.display(), "配置已重新读取");
        }

        self.orchestrator.reload_all().await
    }

    /// 关闭模块系统
    ///
    /// 宿主未运行时静默返回空报告。
    pub async fn shutdown(&mut self) -> Result<PhaseReport> {
        let mut state = self.state.write().await;
        if !state.can_shutdown() {
            return Ok(PhaseReport::default());
        }

        info!("正在关闭模块系统...");
        *state = HostState::ShuttingDown;

        self.orchestrator.wait_for_resolutions().await;
        let report = self.orchestrator.disable_all().await;

        *state = HostState::Shutdown;
        info!("模块系统已关闭");
        report
    }

    // ========================================================================
    // 状态查询
    // ========================================================================

    /// 状态快照
    pub async fn status(&self) -> HostStatus {
        let modules = self.orchestrator.modules().await;
        let mut states = BTreeMap::new();
        for module in &modules {
            *states.entry(module.state.to_string()).or_insert(0) += 1;
        }

        HostStatus {
            state: self.state().await,
            phase: self.orchestrator.phase().await,
            module_count: modules.len(),
            states,
            uptime_secs: self
                .started_at
                .map(|t| t.elapsed().as_secs())
                .unwrap_or(0),
        }
    }
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("orchestrator", &self.orchestrator)
            .field("logging", &self.log_guard.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::lifecycle::LifecycleState;

    struct Root;
    impl Module for Root {}

    struct Broken;
    impl Module for Broken {
        fn on_bootstrap(&self, _scope: &Scope) -> anyhow::Result<()> {
            anyhow::bail!("无法引导")
        }
    }

    fn root() -> ModuleDescriptor {
        ModuleDescriptor::of::<Root>("root").bootstrap_module()
    }

    #[test]
    fn test_host_state_transitions() {
        assert!(HostState::Initialized.can_start());
        assert!(!HostState::Running.can_start());
        assert!(HostState::Running.can_shutdown());
        assert!(!HostState::Shutdown.can_shutdown());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut host = ModuleHost::new(CoreConfig::default());
        let report = host
            .start(root(), |_| Ok(Arc::new(Root) as Arc<dyn Module>))
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(host.state().await, HostState::Running);
        assert_eq!(host.orchestrator().phase().await, GlobalPhase::Enabled);
        assert_eq!(host.orchestrator().state("root").await, LifecycleState::Enabled);

        let status = host.status().await;
        assert_eq!(status.module_count, 1);
        assert_eq!(status.states.get("ENABLED"), Some(&1));

        host.shutdown().await.unwrap();
        assert_eq!(host.state().await, HostState::Shutdown);
        assert_eq!(host.orchestrator().state("root").await, LifecycleState::Disabled);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut host = ModuleHost::new(CoreConfig::default());
        host.start(root(), |_| Ok(Arc::new(Root) as Arc<dyn Module>))
            .await
            .unwrap();

        let result = host
            .start(root(), |_| Ok(Arc::new(Root) as Arc<dyn Module>))
            .await;
        assert!(matches!(result, Err(CoreError::InitFailed(_))));
    }

    #[tokio::test]
    async fn test_failed_root_shuts_host_down() {
        let mut host = ModuleHost::new(CoreConfig::default());
        let descriptor = ModuleDescriptor::of::<Broken>("root").bootstrap_module();
        let result = host
            .start(descriptor, |_| Ok(Arc::new(Broken) as Arc<dyn Module>))
            .await;

        assert!(matches!(result, Err(CoreError::BootstrapFailed(_))));
        assert_eq!(host.state().await, HostState::Shutdown);
    }

    #[tokio::test]
    async fn test_reload_requires_running() {
        let host = ModuleHost::new(CoreConfig::default());
        assert!(host.reload().await.is_err());
    }
}
