//! 模块编排器
//!
//! [`ModuleOrchestrator`] 驱动所有模块完成生命周期：
//!
//! ```text
//! REGISTERED → BOOTSTRAPPED → LOADED → ENABLED → DISABLED
//! ```
//!
//! 加载或启用一个模块时，会先按声明顺序递归推进它的依赖；任一依赖失败，
//! 该模块进入 `DEPENDENCY_ERROR`。缺少依赖的模块进入 `MISSING_DEPENDENCIES`，
//! 并在后台交给依赖解析器处理。
//!
//! 全局阶段只会单调前进。在某个全局阶段之后注册的模块会被立即追赶到该阶段。
//!
//! # 示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use art_modules::core::Scope;
//! use art_modules::module::{LifecycleState, Module, ModuleDescriptor, ModuleOrchestrator};
//!
//! struct Storage;
//! impl Module for Storage {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = ModuleOrchestrator::new(Arc::new(Scope::default()));
//!     orchestrator
//!         .register_instance(ModuleDescriptor::of::<Storage>("storage"), Arc::new(Storage))
//!         .await?;
//!
//!     let report = orchestrator.enable_all().await?;
//!     assert!(report.is_success());
//!     assert_eq!(orchestrator.state("storage").await, LifecycleState::Enabled);
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::core::config::DisableOrder;
use crate::core::scope::Scope;
use crate::module::dependency::DependencyGraph;
use crate::module::descriptor::ModuleDescriptor;
use crate::module::events::{TracingSink, TransitionSink};
use crate::module::instance::{describe, factory_of, DeclaredModule, Module};
use crate::module::lifecycle::{GlobalPhase, LifecyclePhase, LifecycleState};
use crate::module::registry::{ModuleRegistry, Registered, RegisteredModule};
use crate::module::resolver::{
    DependencyResolver, ModuleResolution, ResolutionRequest, ResolutionResult,
};
use crate::utils::{CoreError, Result};

// ============================================================================
// 批量操作报告
// ============================================================================

/// 单个模块的失败
#[derive(Debug)]
pub struct ModuleFailure {
    /// 模块标识符
    pub identifier: String,
    /// 失败原因
    pub error: CoreError,
}

/// 批量操作报告
///
/// 单个模块的失败不会中断批量操作，而是汇总在这里。
#[derive(Debug, Default)]
pub struct PhaseReport {
    /// 完成该阶段的模块
    pub completed: Vec<String>,
    /// 状态不允许、被跳过的模块
    pub skipped: Vec<String>,
    /// 失败的模块
    pub failures: Vec<ModuleFailure>,
}

impl PhaseReport {
    /// 是否没有任何失败
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// 失败模块的标识符
    pub fn failed_modules(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.identifier.as_str()).collect()
    }

    /// 合并另一份报告
    pub fn merge(&mut self, other: PhaseReport) {
        self.completed.extend(other.completed);
        self.skipped.extend(other.skipped);
        self.failures.extend(other.failures);
    }

    fn record(&mut self, identifier: String, outcome: Result<bool>) {
        match outcome {
            Ok(true) => self.completed.push(identifier),
            Ok(false) => self.skipped.push(identifier),
            Err(error) => self.failures.push(ModuleFailure { identifier, error }),
        }
    }
}

// ============================================================================
// 编排器
// ============================================================================

/// 模块编排器
///
/// 克隆得到的编排器共享同一个注册表和全局阶段。
#[derive(Clone)]
pub struct ModuleOrchestrator {
    /// 模块注册表
    registry: ModuleRegistry,

    /// 传给所有钩子的作用域
    scope: Arc<Scope>,

    /// 全局阶段
    phase: Arc<RwLock<GlobalPhase>>,

    /// 依赖解析器
    resolver: Arc<RwLock<Option<Arc<dyn DependencyResolver>>>>,

    /// 注册互斥：循环检测和写入注册表必须原子完成
    registration: Arc<Mutex<()>>,

    /// 批量操作互斥（注册后的追赶也持有它）
    sweep: Arc<Mutex<()>>,

    /// 后台依赖解析任务
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ModuleOrchestrator {
    /// 创建编排器，状态变更写入 tracing 日志
    pub fn new(scope: Arc<Scope>) -> Self {
        Self::with_sink(scope, Arc::new(TracingSink))
    }

    /// 使用指定的状态变更接收器创建编排器
    pub fn with_sink(scope: Arc<Scope>, sink: Arc<dyn TransitionSink>) -> Self {
        Self {
            registry: ModuleRegistry::new(sink),
            scope,
            phase: Arc::new(RwLock::new(GlobalPhase::PreBootstrap)),
            resolver: Arc::new(RwLock::new(None)),
            registration: Arc::new(Mutex::new(())),
            sweep: Arc::new(Mutex::new(())),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 设置依赖解析器
    pub async fn set_resolver(&self, resolver: Option<Arc<dyn DependencyResolver>>) {
        *self.resolver.write().await = resolver;
    }

    /// 模块注册表
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// 作用域
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// 当前全局阶段
    pub async fn phase(&self) -> GlobalPhase {
        *self.phase.read().await
    }

    /// 获取模块
    pub async fn get(&self, module_id: &str) -> Option<RegisteredModule> {
        self.registry.get(module_id).await
    }

    /// 获取模块状态，未注册时为 `UNKNOWN`
    pub async fn state(&self, module_id: &str) -> LifecycleState {
        self.registry.state(module_id).await
    }

    /// 所有模块（注册顺序）
    pub async fn modules(&self) -> Vec<RegisteredModule> {
        self.registry.all().await
    }

    /// 指定状态的模块
    pub async fn modules_in_state(&self, state: LifecycleState) -> Vec<RegisteredModule> {
        self.registry.find_by_state(state).await
    }

    /// 直接依赖该模块的模块
    pub async fn dependents(&self, module_id: &str) -> Vec<String> {
        let descriptors = self.registry.descriptors().await;
        DependencyGraph::from_descriptors(&descriptors).get_dependents(module_id)
    }

    // ==================== 注册 ====================

    /// 注册声明式模块类型
    ///
    /// # Errors
    ///
    /// - 清单无效或实例化失败时返回 `InvalidModule`
    /// - 其余见 [`register_module`](Self::register_module)
    pub async fn register<M: DeclaredModule>(&self) -> Result<RegisteredModule> {
        let descriptor = describe::<M>().map_err(|e| {
            error!(
                declaring_type = std::any::type_name::<M>(),
                error = %e,
                "无法提取模块元数据"
            );
            e
        })?;
        let factory = factory_of::<M>();
        self.register_module(descriptor, move |scope: &Scope| factory(scope))
            .await
    }

    /// 注册已经构造好的模块实例
    pub async fn register_instance(
        &self,
        descriptor: ModuleDescriptor,
        instance: Arc<dyn Module>,
    ) -> Result<RegisteredModule> {
        self.register_module(descriptor, move |_: &Scope| Ok(instance))
            .await
    }

    /// 注册模块
    ///
    /// 同一标识符、同一声明类型重复注册时原样返回已有条目；已有条目处于错误状态时，
    /// 视为显式重新注册：使用新实例重置为 `REGISTERED` 并重新检测循环。
    /// 注册成功后，模块会被追赶到当前全局阶段。
    ///
    /// # Errors
    ///
    /// - `DuplicateModule`：标识符已被其他类型注册
    /// - `InvalidModule`：描述符无效或工厂失败
    /// - `CyclicDependencies`：注册会形成循环依赖
    /// - 追赶过程中产生的生命周期错误
    #[instrument(skip(self, descriptor, factory), fields(module_id = %descriptor.identifier()))]
    pub async fn register_module<F>(
        &self,
        descriptor: ModuleDescriptor,
        factory: F,
    ) -> Result<RegisteredModule>
    where
        F: FnOnce(&Scope) -> anyhow::Result<Arc<dyn Module>> + Send,
    {
        let module_id = descriptor.identifier().to_string();
        let registered = {
            let _guard = self.registration.lock().await;
            self.admit(descriptor, factory).await?
        };

        if !registered.is_changed() {
            debug!("模块已注册，忽略重复注册");
            return Ok(registered.into_module());
        }

        info!(
            version = %registered.module().descriptor.version(),
            "模块已注册"
        );
        self.catch_up(&module_id).await?;
        self.wake_delayed(&module_id).await;

        Ok(self
            .registry
            .get(&module_id)
            .await
            .unwrap_or_else(|| registered.into_module()))
    }

    /// 重新尝试处于错误或等待状态的模块
    ///
    /// 错误状态的模块使用原有实例重置为 `REGISTERED`（重新检测循环），
    /// 然后追赶到当前全局阶段。
    ///
    /// # Errors
    ///
    /// - `ModuleNotFound`：模块未注册
    /// - `InvalidModule`：模块没有可用的实例
    #[instrument(skip(self), fields(module_id = %module_id))]
    pub async fn retry_module(&self, module_id: &str) -> Result<RegisteredModule> {
        let module = self
            .registry
            .get(module_id)
            .await
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))?;

        if module.state.is_error() {
            if module.instance.is_none() {
                return Err(CoreError::InvalidModule {
                    module: Some(module.descriptor),
                    reason: "模块没有可用的实例，需要使用工厂重新注册".to_string(),
                });
            }
            let _guard = self.registration.lock().await;
            self.admit_instance(module.descriptor.clone(), None).await?;
        }

        self.catch_up(module_id).await?;
        self.registry
            .get(module_id)
            .await
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))
    }

    /// 校验、实例化并写入注册表
    async fn admit<F>(&self, descriptor: ModuleDescriptor, factory: F) -> Result<Registered>
    where
        F: FnOnce(&Scope) -> anyhow::Result<Arc<dyn Module>> + Send,
    {
        if let Err(e) = descriptor.validate() {
            error!(error = %e, "模块描述符无效");
            return Err(e);
        }

        if let Some(existing) = self.registry.get(descriptor.identifier()).await {
            if existing.descriptor.declaring_type() != descriptor.declaring_type() {
                // 由注册表生成 DuplicateModule 错误并记录
                return self.registry.register(descriptor, None).await;
            }
            if !existing.state.is_error() {
                return Ok(Registered::Existing(existing));
            }
        }

        let created = panic::catch_unwind(AssertUnwindSafe(|| factory(self.scope.as_ref())));
        let instance = match created {
            Ok(Ok(instance)) => instance,
            Ok(Err(e)) => return Err(self.reject_invalid(descriptor, format!("{:#}", e)).await),
            Err(payload) => {
                let reason = format!("构造模块时发生 panic: {}", panic_message(payload.as_ref()));
                return Err(self.reject_invalid(descriptor, reason).await);
            }
        };

        self.admit_instance(descriptor, Some(instance)).await
    }

    async fn reject_invalid(&self, descriptor: ModuleDescriptor, reason: String) -> CoreError {
        let err = CoreError::InvalidModule {
            module: Some(descriptor.clone()),
            reason,
        };
        if let Err(e) = self
            .registry
            .register_with_state(
                descriptor,
                None,
                LifecycleState::InvalidModule,
                Some(err.to_string()),
            )
            .await
        {
            return e;
        }
        err
    }

    /// 循环检测后写入注册表
    ///
    /// 循环只记录在当前模块上，其他模块的状态不受影响。
    async fn admit_instance(
        &self,
        descriptor: ModuleDescriptor,
        instance: Option<Arc<dyn Module>>,
    ) -> Result<Registered> {
        let module_id = descriptor.identifier().to_string();
        let mut descriptors = self.registry.descriptors().await;
        descriptors.retain(|d| d.identifier() != module_id);
        descriptors.push(descriptor.clone());

        let graph = DependencyGraph::from_descriptors(&descriptors);
        if let Some(cycle) = graph.first_cycle_containing(&module_id) {
            let err = CoreError::CyclicDependencies {
                module: descriptor.clone(),
                cycle,
            };
            self.registry
                .register_with_state(
                    descriptor,
                    instance,
                    LifecycleState::CyclicDependencies,
                    Some(err.to_string()),
                )
                .await?;
            return Err(err);
        }

        self.registry
            .register_with_state(descriptor, instance, LifecycleState::Registered, None)
            .await
    }

    /// 把模块追赶到当前全局阶段
    ///
    /// 批量阶段进行中时先等待它结束：批量阶段只遍历开始时已注册的模块，
    /// 结束后再按新的全局阶段追赶。
    async fn catch_up(&self, module_id: &str) -> Result<()> {
        let _sweep = self.sweep.lock().await;
        let phase = self.phase().await;
        match phase.catch_up_phase() {
            Some(target) => {
                trace!(module_id, global_phase = %phase, "追赶全局阶段");
                self.drive(module_id, target).await
            }
            None => Ok(()),
        }
    }

    /// 新模块注册后，重新推进依赖它的等待中模块
    async fn wake_delayed(&self, module_id: &str) {
        for waiting in self.registry.find_by_state(LifecycleState::Delayed).await {
            if !waiting
                .descriptor
                .dependencies()
                .iter()
                .any(|d| d == module_id)
            {
                continue;
            }
            if let Err(e) = self.catch_up(waiting.identifier()).await {
                warn!(
                    module_id = %waiting.identifier(),
                    dependency = module_id,
                    error = %e,
                    "等待中的模块推进失败"
                );
            }
        }
    }

    // ==================== 单模块阶段 ====================

    /// 引导单个模块
    #[instrument(skip(self), fields(module_id = %module_id))]
    pub async fn bootstrap_module(&self, module_id: &str) -> Result<()> {
        self.drive(module_id, LifecyclePhase::Bootstrap).await
    }

    /// 加载单个模块（必要时先引导，并先加载其依赖）
    #[instrument(skip(self), fields(module_id = %module_id))]
    pub async fn load_module(&self, module_id: &str) -> Result<()> {
        self.drive(module_id, LifecyclePhase::Load).await
    }

    /// 启用单个模块（必要时先加载，并先启用其依赖）
    #[instrument(skip(self), fields(module_id = %module_id))]
    pub async fn enable_module(&self, module_id: &str) -> Result<()> {
        self.drive(module_id, LifecyclePhase::Enable).await
    }

    /// 禁用单个模块
    ///
    /// 只禁用该模块本身；仍在启用状态的依赖方会收到警告日志。
    #[instrument(skip(self), fields(module_id = %module_id))]
    pub async fn disable_module(&self, module_id: &str) -> Result<()> {
        let module = self
            .registry
            .get(module_id)
            .await
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))?;
        if !module.state.can_disable() {
            trace!(state = %module.state, "当前状态不允许禁用，忽略");
            return Ok(());
        }

        for dependent in self.dependents(module_id).await {
            if self.registry.state(&dependent).await == LifecycleState::Enabled {
                warn!(dependent = %dependent, "禁用的模块仍被已启用的模块依赖");
            }
        }

        self.run_hook(module_id, LifecyclePhase::Disable).await
    }

    /// 重新加载单个模块
    ///
    /// 只对已启用的模块生效：先应用最新的模块配置项，再调用 `on_reload`。
    /// 失败只会返回错误，不改变模块状态。
    #[instrument(skip(self), fields(module_id = %module_id))]
    pub async fn reload_module(&self, module_id: &str) -> Result<()> {
        let state = self.registry.state(module_id).await;
        if state == LifecycleState::Unknown {
            return Err(CoreError::ModuleNotFound(module_id.to_string()));
        }
        if !state.can_reload() {
            trace!(state = %state, "当前状态不允许重新加载，忽略");
            return Ok(());
        }
        self.run_hook(module_id, LifecyclePhase::Reload).await
    }

    fn drive<'a>(&'a self, module_id: &'a str, phase: LifecyclePhase) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut path = Vec::new();
            self.advance(module_id, phase, &mut path).await
        }
        .boxed()
    }

    /// 把模块推进到指定阶段
    ///
    /// `path` 是当前递归链上的模块，用于在依赖图被并发修改时截断循环。
    fn advance<'a>(
        &'a self,
        module_id: &'a str,
        phase: LifecyclePhase,
        path: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let module = self
                .registry
                .get(module_id)
                .await
                .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))?;

            if path.iter().any(|p| p == module_id) {
                let mut cycle = path.clone();
                cycle.push(module_id.to_string());
                return Err(CoreError::CyclicDependencies {
                    module: module.descriptor,
                    cycle,
                });
            }

            if !phase.permits(module.state) {
                trace!(module_id, state = %module.state, %phase, "当前状态不允许该阶段，忽略");
                return Ok(());
            }

            match phase {
                LifecyclePhase::Load => {
                    self.advance(module_id, LifecyclePhase::Bootstrap, path).await?;
                    self.satisfy_dependencies(&module.descriptor, phase, path).await?;
                }
                LifecyclePhase::Enable => {
                    self.advance(module_id, LifecyclePhase::Load, path).await?;
                    self.satisfy_dependencies(&module.descriptor, phase, path).await?;
                }
                _ => {}
            }

            self.run_hook(module_id, phase).await
        }
        .boxed()
    }

    /// 检查并按声明顺序推进依赖
    async fn satisfy_dependencies(
        &self,
        descriptor: &ModuleDescriptor,
        phase: LifecyclePhase,
        path: &mut Vec<String>,
    ) -> Result<()> {
        let module_id = descriptor.identifier();

        let missing = self.registry.missing_dependencies(descriptor).await;
        if !missing.is_empty() {
            let err = CoreError::MissingDependencies {
                module: descriptor.clone(),
                missing: missing.clone(),
            };
            self.registry
                .update_state(
                    module_id,
                    LifecycleState::MissingDependencies,
                    Some(err.to_string()),
                )
                .await?;
            self.request_resolution(descriptor.clone(), missing).await;
            return Err(err);
        }

        path.push(module_id.to_string());
        for dependency in descriptor.dependencies() {
            let failure = match self.advance(dependency, phase, path).await {
                Err(e) => Some(e),
                Ok(()) => {
                    let state = self.registry.state(dependency).await;
                    (!state.has_reached(phase)).then(|| CoreError::ModuleUnavailable {
                        identifier: dependency.clone(),
                        state,
                        phase,
                    })
                }
            };

            if let Some(source) = failure {
                path.pop();
                let err = CoreError::DependencyFailed {
                    module: descriptor.clone(),
                    dependency: dependency.clone(),
                    source: Box::new(source),
                };
                self.registry
                    .update_state(
                        module_id,
                        LifecycleState::DependencyError,
                        Some(err.to_string()),
                    )
                    .await?;
                return Err(err);
            }
        }
        path.pop();

        Ok(())
    }

    /// 调用模块钩子并更新状态
    async fn run_hook(&self, module_id: &str, phase: LifecyclePhase) -> Result<()> {
        let module = self
            .registry
            .get(module_id)
            .await
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))?;
        if !phase.permits(module.state) {
            return Ok(());
        }

        let outcome = match &module.instance {
            Some(instance) => self.invoke(instance.as_ref(), module_id, phase),
            None => Ok(()),
        };

        match outcome {
            Ok(()) => {
                if let Some(target) = phase.target_state() {
                    self.registry.update_state(module_id, target, None).await?;
                } else {
                    debug!(module_id, %phase, "模块钩子执行完成");
                }
                Ok(())
            }
            Err(source) => {
                let err = CoreError::HookFailed {
                    module: module.descriptor,
                    phase,
                    source,
                };
                if phase == LifecyclePhase::Reload {
                    error!(module_id, error = %err, "模块重新加载失败");
                } else {
                    self.registry
                        .update_state(module_id, LifecycleState::Error, Some(err.to_string()))
                        .await?;
                }
                Err(err)
            }
        }
    }

    /// 同步执行钩子，panic 视为失败
    fn invoke(
        &self,
        instance: &dyn Module,
        module_id: &str,
        phase: LifecyclePhase,
    ) -> anyhow::Result<()> {
        let scope = self.scope.as_ref();
        let call = || match phase {
            LifecyclePhase::Bootstrap => instance.on_bootstrap(scope),
            LifecyclePhase::Load => instance.on_load(scope),
            LifecyclePhase::Enable => instance.on_enable(scope),
            LifecyclePhase::Disable => instance.on_disable(scope),
            LifecyclePhase::Reload => {
                if let Some(settings) = scope.module_settings(module_id) {
                    instance.configure(&settings)?;
                }
                instance.on_reload(scope)
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(result) => result,
            Err(payload) => Err(anyhow::anyhow!(
                "{} 发生 panic: {}",
                phase.hook_name(),
                panic_message(payload.as_ref())
            )),
        }
    }

    // ==================== 依赖解析 ====================

    /// 在后台解析缺失的依赖，不等待结果
    async fn request_resolution(&self, descriptor: ModuleDescriptor, missing: Vec<String>) {
        let Some(resolver) = self.resolver.read().await.clone() else {
            debug!(module_id = %descriptor.identifier(), "未配置依赖解析器");
            return;
        };

        let timeout = Duration::from_millis(self.scope.config().modules.resolver_timeout_ms);
        let request = ResolutionRequest {
            descriptor,
            missing,
        };
        let handle = self.clone();
        let task = tokio::spawn(async move {
            handle.resolve_in_background(resolver, request, timeout).await;
        });
        self.pending.lock().await.push(task);
    }

    async fn resolve_in_background(
        &self,
        resolver: Arc<dyn DependencyResolver>,
        request: ResolutionRequest,
        timeout: Duration,
    ) {
        let module_id = request.descriptor.identifier().to_string();
        debug!(module_id = %module_id, missing = ?request.missing, "开始解析缺失的依赖");

        let resolution = match tokio::time::timeout(timeout, resolver.resolve(&request, self)).await
        {
            Ok(resolution) => resolution,
            Err(_) => ModuleResolution::not_found(format!(
                "依赖解析超时 ({} ms)",
                timeout.as_millis()
            )),
        };
        let message = resolution.message.clone().unwrap_or_default();

        match resolution.result {
            ResolutionResult::Success => {
                info!(module_id = %module_id, "依赖解析成功，重新注册模块");
                if let Err(e) = self.retry_module(&module_id).await {
                    warn!(module_id = %module_id, error = %e, "依赖解析后模块仍未能就绪");
                }
            }
            ResolutionResult::Delayed => {
                if self.registry.state(&module_id).await == LifecycleState::MissingDependencies {
                    if let Err(e) = self
                        .registry
                        .update_state(&module_id, LifecycleState::Delayed, Some(message))
                        .await
                    {
                        warn!(module_id = %module_id, error = %e, "无法标记模块为等待状态");
                    }
                }
            }
            ResolutionResult::NotFound => {
                warn!(module_id = %module_id, reason = %message, "未找到缺失的依赖");
            }
            ResolutionResult::Failed => {
                error!(
                    module_id = %module_id,
                    reason = %message,
                    cause = ?resolution.cause,
                    "依赖解析失败"
                );
            }
        }
    }

    /// 等待所有后台依赖解析完成（包括解析过程中新发起的解析）
    pub async fn wait_for_resolutions(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.pending.lock().await);
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "依赖解析任务异常结束");
                }
            }
        }
    }

    // ==================== 全局阶段 ====================

    /// 引导整个模块系统
    ///
    /// 注册并引导根模块，进入 `BOOTSTRAPPED_ROOT_MODULE`，然后引导所有模块。
    /// 根模块失败时会禁用所有模块并返回 `BootstrapFailed`。
    ///
    /// # Errors
    ///
    /// - `Bootstrap`：模块系统已经引导过
    /// - `BootstrapFailed`：根模块无效、注册失败或引导失败
    pub async fn bootstrap<F>(&self, root: ModuleDescriptor, factory: F) -> Result<PhaseReport>
    where
        F: FnOnce(&Scope) -> anyhow::Result<Arc<dyn Module>> + Send,
    {
        let phase = self.phase().await;
        if phase != GlobalPhase::PreBootstrap {
            return Err(CoreError::Bootstrap(format!(
                "模块系统已经引导过（当前阶段 {}）",
                phase
            )));
        }
        if !root.is_bootstrap_module() {
            return Err(CoreError::BootstrapFailed(Box::new(CoreError::InvalidModule {
                module: Some(root),
                reason: "根模块必须声明为引导模块".to_string(),
            })));
        }

        let root_id = root.identifier().to_string();
        info!(module_id = %root_id, "开始引导模块系统");

        let root_result = match self.register_module(root, factory).await {
            Ok(_) => self.bootstrap_module(&root_id).await,
            Err(e) => Err(e),
        };
        let root_result = match root_result {
            Ok(()) => {
                let state = self.registry.state(&root_id).await;
                if state.has_reached(LifecyclePhase::Bootstrap) {
                    Ok(())
                } else {
                    Err(CoreError::ModuleUnavailable {
                        identifier: root_id.clone(),
                        state,
                        phase: LifecyclePhase::Bootstrap,
                    })
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = root_result {
            error!(module_id = %root_id, error = %e, "根模块引导失败，禁用所有模块");
            if let Err(disable_err) = self.disable_all().await {
                warn!(error = %disable_err, "禁用模块失败");
            }
            return Err(CoreError::BootstrapFailed(Box::new(e)));
        }

        self.set_phase(GlobalPhase::BootstrappedRootModule).await;
        self.bootstrap_all().await
    }

    /// 引导所有模块
    ///
    /// # Errors
    ///
    /// 全局阶段已达到 `BOOTSTRAPPED` 时返回 `Bootstrap`
    pub async fn bootstrap_all(&self) -> Result<PhaseReport> {
        self.sweep_forward(LifecyclePhase::Bootstrap, GlobalPhase::Bootstrapped)
            .await
    }

    /// 加载所有模块
    ///
    /// # Errors
    ///
    /// 全局阶段已达到 `LOADED` 时返回 `Bootstrap`
    pub async fn load_all(&self) -> Result<PhaseReport> {
        self.sweep_forward(LifecyclePhase::Load, GlobalPhase::Loaded)
            .await
    }

    /// 启用所有模块
    ///
    /// # Errors
    ///
    /// 全局阶段已达到 `ENABLED` 时返回 `Bootstrap`
    pub async fn enable_all(&self) -> Result<PhaseReport> {
        self.sweep_forward(LifecyclePhase::Enable, GlobalPhase::Enabled)
            .await
    }

    /// 禁用所有模块
    ///
    /// 默认依赖方先于依赖被禁用，可通过 `modules.disable_order` 改为注册顺序。
    ///
    /// # Errors
    ///
    /// 全局阶段已是 `DISABLED` 时返回 `Bootstrap`
    pub async fn disable_all(&self) -> Result<PhaseReport> {
        let _guard = self.sweep.lock().await;
        self.ensure_before(GlobalPhase::Disabled).await?;

        let descriptors = self.registry.descriptors().await;
        let order = match self.scope.config().modules.disable_order {
            DisableOrder::ReverseDependency => {
                DependencyGraph::from_descriptors(&descriptors).deactivation_order()
            }
            DisableOrder::Registration => descriptors
                .iter()
                .map(|d| d.identifier().to_string())
                .collect(),
        };

        let mut report = PhaseReport::default();
        for module_id in order {
            let outcome = match self.disable_module(&module_id).await {
                Ok(()) => Ok(self.registry.state(&module_id).await == LifecycleState::Disabled),
                Err(e) => Err(e),
            };
            report.record(module_id, outcome);
        }

        self.set_phase(GlobalPhase::Disabled).await;
        self.log_report(GlobalPhase::Disabled, &report);
        Ok(report)
    }

    /// 重新加载所有已启用的模块
    pub async fn reload_all(&self) -> Result<PhaseReport> {
        let mut report = PhaseReport::default();
        for module_id in self.registry.identifiers().await {
            let outcome = if self.registry.state(&module_id).await.can_reload() {
                self.reload_module(&module_id).await.map(|()| true)
            } else {
                Ok(false)
            };
            report.record(module_id, outcome);
        }
        info!(
            completed = report.completed.len(),
            failed = report.failures.len(),
            "模块重新加载完成"
        );
        Ok(report)
    }

    async fn sweep_forward(
        &self,
        phase: LifecyclePhase,
        target: GlobalPhase,
    ) -> Result<PhaseReport> {
        let _guard = self.sweep.lock().await;
        self.ensure_before(target).await?;

        let mut report = PhaseReport::default();
        for module_id in self.registry.identifiers().await {
            let outcome = match self.drive(&module_id, phase).await {
                Ok(()) => Ok(self.registry.state(&module_id).await.has_reached(phase)),
                Err(e) => Err(e),
            };
            report.record(module_id, outcome);
        }

        self.set_phase(target).await;
        self.log_report(target, &report);
        Ok(report)
    }

    async fn ensure_before(&self, target: GlobalPhase) -> Result<()> {
        let current = self.phase().await;
        if current >= target {
            return Err(CoreError::Bootstrap(format!(
                "全局阶段已是 {}，无法再进入 {}",
                current, target
            )));
        }
        Ok(())
    }

    async fn set_phase(&self, target: GlobalPhase) {
        let mut phase = self.phase.write().await;
        let previous = *phase;
        if target > previous {
            debug!(from = %previous, to = %target, "全局阶段前进");
            *phase = target;
        }
    }

    fn log_report(&self, phase: GlobalPhase, report: &PhaseReport) {
        if report.is_success() {
            info!(
                global_phase = %phase,
                completed = report.completed.len(),
                skipped = report.skipped.len(),
                "批量阶段完成"
            );
        } else {
            warn!(
                global_phase = %phase,
                completed = report.completed.len(),
                skipped = report.skipped.len(),
                failed = ?report.failed_modules(),
                "批量阶段完成，部分模块失败"
            );
        }
    }
}

impl std::fmt::Debug for ModuleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleOrchestrator")
            .field("registry", &self.registry)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}
