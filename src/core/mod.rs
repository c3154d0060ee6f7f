//! 核心模块
//!
//! 包含模块系统配置和传递给模块钩子的作用域。

pub mod config;
pub mod scope;

pub use config::{CoreConfig, CoreConfigBuilder, DisableOrder, LogConfig, ModuleConfig};
pub use scope::Scope;
