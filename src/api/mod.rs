//! API 模块
//!
//! 包含对外提供的 SDK 接口。
//!
//! # 模块概览
//!
//! - `sdk`: ModuleHost 主接口，组装配置、日志和模块编排器

pub mod sdk;

// 重导出主要类型
pub use sdk::{HostState, HostStatus, ModuleHost};
