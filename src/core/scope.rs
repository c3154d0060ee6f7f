//! 模块作用域
//!
//! [`Scope`] 是传递给每个生命周期钩子的共享上下文，包含：
//!
//! - 当前的 [`CoreConfig`]（可在运行时整体替换，用于重新加载）
//! - 按类型注册的共享服务（例如规则存储、计划任务执行器）

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::config::CoreConfig;

type Provider = Arc<dyn Any + Send + Sync>;

/// 模块作用域
///
/// 钩子是同步执行的，因此这里使用标准库的读写锁，锁不会跨越 `await` 持有。
pub struct Scope {
    config: RwLock<Arc<CoreConfig>>,
    providers: RwLock<HashMap<TypeId, Provider>>,
}

impl Scope {
    /// 创建作用域
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// 当前配置
    pub fn config(&self) -> Arc<CoreConfig> {
        match self.config.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// 替换配置，返回旧配置
    pub fn update_config(&self, config: CoreConfig) -> Arc<CoreConfig> {
        let mut guard = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, Arc::new(config))
    }

    /// 获取模块的配置项
    pub fn module_settings(&self, module_id: &str) -> Option<serde_json::Value> {
        self.config().module_settings(module_id).cloned()
    }

    /// 注册共享服务，返回被替换的旧实例
    pub fn provide<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
        self.provide_arc(Arc::new(value))
    }

    /// 注册已包装在 `Arc` 中的共享服务
    pub fn provide_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Option<Arc<T>> {
        let mut providers = match self.providers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        providers
            .insert(TypeId::of::<T>(), value)
            .and_then(|old| old.downcast::<T>().ok())
    }

    /// 获取共享服务
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let providers = match self.providers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        providers
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|provider| provider.downcast::<T>().ok())
    }

    /// 是否注册了某类共享服务
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        let providers = match self.providers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        providers.contains_key(&TypeId::of::<T>())
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provider_count = self.providers.read().map(|p| p.len()).unwrap_or_default();
        f.debug_struct("Scope")
            .field("config", &self.config())
            .field("providers", &provider_count)
            .finish()
    }
}
