//! 模块实例
//!
//! [`Module`] 定义了模块可以实现的生命周期钩子。所有钩子都是可选的，默认实现什么都不做。
//! 钩子返回错误（或发生 panic）时，模块进入 `ERROR` 状态。
//!
//! [`DeclaredModule`] 把清单和构造函数绑定到具体类型上，使模块可以通过
//! `orchestrator.register::<M>()` 直接注册。

use std::sync::Arc;

use crate::core::scope::Scope;
use crate::module::descriptor::{DeclaringType, ModuleDescriptor};
use crate::module::manifest::ModuleManifest;
use crate::utils::Result;

/// 模块生命周期钩子
#[allow(unused_variables)]
pub trait Module: Send + Sync + 'static {
    /// 引导阶段
    fn on_bootstrap(&self, scope: &Scope) -> anyhow::Result<()> {
        Ok(())
    }

    /// 加载阶段
    fn on_load(&self, scope: &Scope) -> anyhow::Result<()> {
        Ok(())
    }

    /// 启用阶段
    fn on_enable(&self, scope: &Scope) -> anyhow::Result<()> {
        Ok(())
    }

    /// 禁用阶段
    fn on_disable(&self, scope: &Scope) -> anyhow::Result<()> {
        Ok(())
    }

    /// 重新加载阶段，在 [`configure`](Self::configure) 之后调用
    fn on_reload(&self, scope: &Scope) -> anyhow::Result<()> {
        Ok(())
    }

    /// 应用模块配置项
    ///
    /// 重新加载时，配置中 `modules.settings.<id>` 的值会先传给这里。
    fn configure(&self, settings: &serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 带声明元数据的模块类型
pub trait DeclaredModule: Module + Sized {
    /// 模块清单
    fn manifest() -> ModuleManifest;

    /// 构造模块实例
    fn create(scope: &Scope) -> anyhow::Result<Self>;
}

/// 提取模块类型的描述符
///
/// # Errors
///
/// 清单无效时返回 `InvalidModule`
pub fn describe<M: DeclaredModule>() -> Result<ModuleDescriptor> {
    M::manifest().into_descriptor(DeclaringType::of::<M>())
}

/// 可重复调用的模块工厂
pub type ModuleFactory = Arc<dyn Fn(&Scope) -> anyhow::Result<Arc<dyn Module>> + Send + Sync>;

/// 为模块类型创建工厂
pub fn factory_of<M: DeclaredModule>() -> ModuleFactory {
    Arc::new(|scope: &Scope| {
        let module: Arc<dyn Module> = Arc::new(M::create(scope)?);
        Ok(module)
    })
}
