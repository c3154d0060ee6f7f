//! 模块系统
//!
//! 包含模块系统的核心组件：
//! - 模块描述符与清单
//! - 生命周期状态与全局阶段
//! - 依赖图与依赖解析
//! - 模块注册表与编排器

pub mod dependency;
pub mod descriptor;
pub mod events;
pub mod instance;
pub mod lifecycle;
pub mod manifest;
pub mod orchestrator;
pub mod registry;
pub mod resolver;

// 重导出常用类型
pub use dependency::{render_cycle, DependencyGraph, CYCLE_SEPARATOR};
pub use descriptor::{DeclaringType, ModuleDescriptor};
pub use events::{MemorySink, StateTransition, TracingSink, TransitionSink};
pub use instance::{describe, factory_of, DeclaredModule, Module, ModuleFactory};
pub use lifecycle::{GlobalPhase, LifecyclePhase, LifecycleState, StateClass};
pub use manifest::{ModuleManifest, MODULE_PREFIX};
pub use orchestrator::{ModuleFailure, ModuleOrchestrator, PhaseReport};
pub use registry::{ModuleRegistry, Registered, RegisteredModule};
pub use resolver::{
    CatalogResolver, DependencyResolver, ModuleResolution, ResolutionRequest, ResolutionResult,
};
