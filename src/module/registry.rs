//! 模块注册表
//!
//! 保存所有已注册的模块（描述符、实例、当前状态），按注册顺序排列。
//! 每一次状态变更都会交给 [`TransitionSink`] 记录。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::module::descriptor::ModuleDescriptor;
use crate::module::events::{StateTransition, TracingSink, TransitionSink};
use crate::module::instance::Module;
use crate::module::lifecycle::LifecycleState;
use crate::utils::{CoreError, Result};

/// 已注册的模块
#[derive(Clone)]
pub struct RegisteredModule {
    /// 模块描述符
    pub descriptor: ModuleDescriptor,
    /// 模块实例（实例化失败时为 `None`）
    pub instance: Option<Arc<dyn Module>>,
    /// 当前状态
    pub state: LifecycleState,
    /// 最近一次进入错误状态的原因
    pub last_error: Option<String>,
    /// 注册时间
    pub registered_at: DateTime<Utc>,
    /// 加载时间
    pub loaded_at: Option<DateTime<Utc>>,
    /// 启用时间
    pub enabled_at: Option<DateTime<Utc>>,
    /// 最近一次状态变更时间
    pub updated_at: DateTime<Utc>,
}

impl RegisteredModule {
    fn new(
        descriptor: ModuleDescriptor,
        instance: Option<Arc<dyn Module>>,
        state: LifecycleState,
        reason: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            descriptor,
            instance,
            state,
            last_error: reason.filter(|_| state.is_error()),
            registered_at: now,
            loaded_at: None,
            enabled_at: None,
            updated_at: now,
        }
    }

    /// 模块标识符
    pub fn identifier(&self) -> &str {
        self.descriptor.identifier()
    }
}

impl std::fmt::Debug for RegisteredModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModule")
            .field("descriptor", &self.descriptor)
            .field("has_instance", &self.instance.is_some())
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// 注册结果
#[derive(Debug, Clone)]
pub enum Registered {
    /// 新注册的模块
    New(RegisteredModule),
    /// 已存在的同类型模块，未做任何改变
    Existing(RegisteredModule),
    /// 处于错误状态的同类型模块被重新注册
    Renewed(RegisteredModule),
}

impl Registered {
    /// 注册表中的模块
    pub fn module(&self) -> &RegisteredModule {
        match self {
            Registered::New(m) | Registered::Existing(m) | Registered::Renewed(m) => m,
        }
    }

    /// 取出注册表中的模块
    pub fn into_module(self) -> RegisteredModule {
        match self {
            Registered::New(m) | Registered::Existing(m) | Registered::Renewed(m) => m,
        }
    }

    /// 注册表是否发生了变化
    pub fn is_changed(&self) -> bool {
        !matches!(self, Registered::Existing(_))
    }
}

/// 模块注册表
///
/// 克隆得到的注册表与原注册表共享同一份数据。
#[derive(Clone)]
pub struct ModuleRegistry {
    /// 已注册的模块：module_id -> RegisteredModule（注册顺序）
    modules: Arc<RwLock<IndexMap<String, RegisteredModule>>>,

    /// 状态变更接收器
    sink: Arc<dyn TransitionSink>,
}

impl ModuleRegistry {
    /// 创建注册表
    pub fn new(sink: Arc<dyn TransitionSink>) -> Self {
        Self {
            modules: Arc::new(RwLock::new(IndexMap::new())),
            sink,
        }
    }

    /// 注册模块，初始状态为 `REGISTERED`
    ///
    /// # Errors
    ///
    /// 标识符已被其他声明类型注册时返回 `DuplicateModule`，已有条目保持不变
    pub async fn register(
        &self,
        descriptor: ModuleDescriptor,
        instance: Option<Arc<dyn Module>>,
    ) -> Result<Registered> {
        self.register_with_state(descriptor, instance, LifecycleState::Registered, None)
            .await
    }

    /// 以指定初始状态注册模块
    ///
    /// - 标识符未注册：插入新条目
    /// - 同类型且不在错误状态：原样返回已有条目
    /// - 同类型且处于错误状态：重置为 `state`，有新实例时替换实例
    ///
    /// # Errors
    ///
    /// 标识符已被其他声明类型注册时返回 `DuplicateModule`
    pub async fn register_with_state(
        &self,
        descriptor: ModuleDescriptor,
        instance: Option<Arc<dyn Module>>,
        state: LifecycleState,
        reason: Option<String>,
    ) -> Result<Registered> {
        let mut modules = self.modules.write().await;
        let identifier = descriptor.identifier().to_string();

        if !modules.contains_key(&identifier) {
            let entry = RegisteredModule::new(descriptor, instance, state, reason.clone());
            modules.insert(identifier, entry.clone());
            drop(modules);

            self.emit(&entry.descriptor, None, state, reason);
            return Ok(Registered::New(entry));
        }
        let existing = modules
            .get_mut(&identifier)
            .ok_or_else(|| CoreError::ModuleNotFound(identifier.clone()))?;

        if existing.descriptor.declaring_type() != descriptor.declaring_type() {
            let existing_type = existing.descriptor.declaring_type();
            drop(modules);

            let err = CoreError::DuplicateModule {
                module: descriptor,
                existing: existing_type,
            };
            if let Some(module) = err.module() {
                self.emit(
                    module,
                    None,
                    LifecycleState::DuplicateModule,
                    Some(err.to_string()),
                );
            }
            return Err(err);
        }

        if !existing.state.is_error() {
            return Ok(Registered::Existing(existing.clone()));
        }

        let previous = existing.state;
        existing.descriptor = descriptor;
        if instance.is_some() {
            existing.instance = instance;
        }
        existing.state = state;
        existing.last_error = reason.clone().filter(|_| state.is_error());
        existing.loaded_at = None;
        existing.enabled_at = None;
        existing.updated_at = Utc::now();
        let entry = existing.clone();
        drop(modules);

        self.emit(&entry.descriptor, Some(previous), state, reason);
        Ok(Registered::Renewed(entry))
    }

    /// 获取模块（快照）
    pub async fn get(&self, module_id: &str) -> Option<RegisteredModule> {
        self.modules.read().await.get(module_id).cloned()
    }

    /// 获取模块状态
    ///
    /// 未注册的模块返回 `UNKNOWN`。
    pub async fn state(&self, module_id: &str) -> LifecycleState {
        self.modules
            .read()
            .await
            .get(module_id)
            .map(|m| m.state)
            .unwrap_or(LifecycleState::Unknown)
    }

    /// 所有模块（注册顺序快照）
    pub async fn all(&self) -> Vec<RegisteredModule> {
        self.modules.read().await.values().cloned().collect()
    }

    /// 所有模块的描述符（注册顺序）
    pub async fn descriptors(&self) -> Vec<ModuleDescriptor> {
        self.modules
            .read()
            .await
            .values()
            .map(|m| m.descriptor.clone())
            .collect()
    }

    /// 所有模块标识符（注册顺序）
    pub async fn identifiers(&self) -> Vec<String> {
        self.modules.read().await.keys().cloned().collect()
    }

    /// 查找指定状态的模块
    pub async fn find_by_state(&self, state: LifecycleState) -> Vec<RegisteredModule> {
        self.modules
            .read()
            .await
            .values()
            .filter(|m| m.state == state)
            .cloned()
            .collect()
    }

    /// 是否已注册
    pub async fn contains(&self, module_id: &str) -> bool {
        self.modules.read().await.contains_key(module_id)
    }

    /// 已注册模块数量
    pub async fn count(&self) -> usize {
        self.modules.read().await.len()
    }

    /// 返回描述符中尚未注册的依赖（声明顺序）
    ///
    /// 依赖只要已注册就算存在，无论处于什么状态。
    pub async fn missing_dependencies(&self, descriptor: &ModuleDescriptor) -> Vec<String> {
        let modules = self.modules.read().await;
        descriptor
            .dependencies()
            .iter()
            .filter(|d| !modules.contains_key(d.as_str()))
            .cloned()
            .collect()
    }

    /// 更新模块状态，返回变更前的状态
    ///
    /// 状态未变化时不会记录变更。
    ///
    /// # Errors
    ///
    /// 模块未注册时返回 `ModuleNotFound`
    pub async fn update_state(
        &self,
        module_id: &str,
        state: LifecycleState,
        reason: Option<String>,
    ) -> Result<LifecycleState> {
        let mut modules = self.modules.write().await;
        let module = modules
            .get_mut(module_id)
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))?;

        let previous = module.state;
        if previous == state {
            return Ok(previous);
        }

        let now = Utc::now();
        module.state = state;
        module.updated_at = now;
        match state {
            LifecycleState::Loaded => module.loaded_at = Some(now),
            LifecycleState::Enabled => module.enabled_at = Some(now),
            s if s.is_error() => module.last_error = reason.clone(),
            _ => {}
        }
        let descriptor = module.descriptor.clone();
        drop(modules);

        self.emit(&descriptor, Some(previous), state, reason);
        Ok(previous)
    }

    fn emit(
        &self,
        descriptor: &ModuleDescriptor,
        previous: Option<LifecycleState>,
        state: LifecycleState,
        reason: Option<String>,
    ) {
        let mut transition = StateTransition::new(
            descriptor.identifier(),
            descriptor.declaring_type(),
            previous,
            state,
        );
        if let Some(reason) = reason {
            transition = transition.with_message(reason);
        }
        self.sink.record(&transition);
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry").finish_non_exhaustive()
    }
}
