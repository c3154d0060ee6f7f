//! # Art Modules - 规则引擎模块系统
//!
//! 规则引擎的模块系统编排器，负责管理各个功能模块的完整生命周期：
//!
//! - **模块注册**: 按标识符注册模块，检测重复注册和循环依赖
//! - **生命周期管理**: 引导、加载、启用、禁用和重新加载，依赖总是先于依赖方推进
//! - **依赖解析**: 缺少的依赖交给可插拔的解析器在后台处理
//! - **全局阶段**: 单调前进的系统阶段，迟到注册的模块会被追赶到当前阶段
//! - **配置与日志**: 统一的 YAML/JSON 配置加载和结构化日志
//!
//! ## 快速开始
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
//!     let mut host = ModuleHost::new(CoreConfig::default());
//!
//!     // 引导根模块并启用所有模块
//!     let root = ModuleDescriptor::of::<Root>("root").bootstrap_module();
//!     host.start(root, |_| Ok(Arc::new(Root) as Arc<dyn Module>)).await?;
//!
//!     host.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 模块描述符、生命周期、依赖图、注册表和编排器
//! - `utils` - 错误类型和日志系统
//! - `core` - 配置和模块作用域
//! - `api` - 公共 API 接口

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod core;
pub mod module;
pub mod utils;

// 重导出常用类型，方便使用
pub use module::{
    CatalogResolver, DeclaredModule, DeclaringType, DependencyGraph, DependencyResolver,
    GlobalPhase, LifecyclePhase, LifecycleState, MemorySink, Module, ModuleDescriptor,
    ModuleManifest, ModuleOrchestrator, ModuleRegistry, ModuleResolution, PhaseReport,
    RegisteredModule, ResolutionRequest, ResolutionResult, StateTransition, TransitionSink,
};

pub use utils::logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};
pub use utils::{error_code, CoreError, Result};

pub use api::sdk::{HostState, HostStatus, ModuleHost};
pub use core::config::{CoreConfig, CoreConfigBuilder, DisableOrder, LogConfig, ModuleConfig};
pub use core::scope::Scope;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
