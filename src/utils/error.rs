//! 模块系统错误类型定义
//!
//! 本模块定义了模块系统中使用的所有错误类型。与模块相关的错误都携带出错模块的描述符，
//! 并可以通过 [`CoreError::state`] 映射到模块最终所处的生命周期状态。

use crate::module::dependency::render_cycle;
use crate::module::descriptor::{DeclaringType, ModuleDescriptor};
use crate::module::lifecycle::{LifecyclePhase, LifecycleState};
use thiserror::Error;

/// 模块系统核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 模块注册错误 ====================

    /// 标识符已被其他类型注册
    #[error(
        "模块 \"{}\" 已被注册为 {existing}，无法再注册为 {}",
        .module.identifier(),
        .module.declaring_type()
    )]
    DuplicateModule {
        module: ModuleDescriptor,
        existing: DeclaringType,
    },

    /// 无效的模块（元数据提取或实例化失败）
    #[error(
        "无效的模块 \"{}\": {reason}",
        .module.as_ref().map(|m| m.identifier()).unwrap_or("<unknown>")
    )]
    InvalidModule {
        module: Option<ModuleDescriptor>,
        reason: String,
    },

    /// 无效的模块元数据
    #[error("无效的模块元数据: {0}")]
    InvalidMetadata(String),

    /// 循环依赖
    #[error("模块 \"{}\" 存在循环依赖: {}", .module.identifier(), render_cycle(.cycle))]
    CyclicDependencies {
        module: ModuleDescriptor,
        cycle: Vec<String>,
    },

    // ==================== 模块生命周期错误 ====================

    /// 缺少依赖
    #[error("模块 \"{}\" 缺少以下依赖: {}", .module.identifier(), .missing.join(", "))]
    MissingDependencies {
        module: ModuleDescriptor,
        missing: Vec<String>,
    },

    /// 依赖模块失败
    #[error("模块 \"{}\" 的依赖 \"{dependency}\" 未能就绪: {source}", .module.identifier())]
    DependencyFailed {
        module: ModuleDescriptor,
        dependency: String,
        #[source]
        source: Box<CoreError>,
    },

    /// 模块处于无法推进的状态
    #[error("模块 \"{identifier}\" 当前状态为 {state}，无法完成 {phase}")]
    ModuleUnavailable {
        identifier: String,
        state: LifecycleState,
        phase: LifecyclePhase,
    },

    /// 生命周期钩子执行失败
    #[error("模块 \"{}\" 执行 {} 失败: {source}", .module.identifier(), .phase.hook_name())]
    HookFailed {
        module: ModuleDescriptor,
        phase: LifecyclePhase,
        #[source]
        source: anyhow::Error,
    },

    /// 模块未找到
    #[error("模块未找到: '{0}'")]
    ModuleNotFound(String),

    // ==================== 引导错误 ====================

    /// 全局阶段不允许该操作
    #[error("引导错误: {0}")]
    Bootstrap(String),

    /// 根模块引导失败
    #[error("模块系统引导失败: {0}")]
    BootstrapFailed(#[source] Box<CoreError>),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 版本解析错误
    #[error("版本解析错误: {0}")]
    VersionParse(#[from] semver::Error),

    // ==================== 通用错误 ====================

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 模块系统操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
pub mod error_code {
    // 核心错误 (CORE-xxx)
    pub const CORE_INTERNAL: &str = "CORE-001";
    pub const CORE_INIT_FAILED: &str = "CORE-002";
    pub const CORE_BOOTSTRAP: &str = "CORE-003";
    pub const CORE_IO: &str = "CORE-004";

    // 模块错误 (MODULE-xxx)
    pub const MODULE_NOT_FOUND: &str = "MODULE-001";
    pub const MODULE_DUPLICATE: &str = "MODULE-002";
    pub const MODULE_INVALID: &str = "MODULE-003";
    pub const MODULE_CYCLIC_DEPENDENCY: &str = "MODULE-004";
    pub const MODULE_MISSING_DEPENDENCY: &str = "MODULE-005";
    pub const MODULE_DEPENDENCY_ERROR: &str = "MODULE-006";
    pub const MODULE_HOOK_FAILED: &str = "MODULE-007";
    pub const MODULE_UNAVAILABLE: &str = "MODULE-008";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";
    pub const CONFIG_PARSE: &str = "CONFIG-003";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::DuplicateModule { .. } => error_code::MODULE_DUPLICATE,
            CoreError::InvalidModule { .. } | CoreError::InvalidMetadata(_) => {
                error_code::MODULE_INVALID
            }
            CoreError::CyclicDependencies { .. } => error_code::MODULE_CYCLIC_DEPENDENCY,
            CoreError::MissingDependencies { .. } => error_code::MODULE_MISSING_DEPENDENCY,
            CoreError::DependencyFailed { .. } => error_code::MODULE_DEPENDENCY_ERROR,
            CoreError::ModuleUnavailable { .. } => error_code::MODULE_UNAVAILABLE,
            CoreError::HookFailed { .. } => error_code::MODULE_HOOK_FAILED,
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::Bootstrap(_) | CoreError::BootstrapFailed(_) => error_code::CORE_BOOTSTRAP,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            CoreError::Json(_) | CoreError::Yaml(_) | CoreError::VersionParse(_) => {
                error_code::CONFIG_PARSE
            }
            CoreError::Io(_) => error_code::CORE_IO,
            CoreError::InitFailed(_) => error_code::CORE_INIT_FAILED,
            CoreError::Internal(_) | CoreError::Other(_) => error_code::CORE_INTERNAL,
        }
    }

    /// 该错误对应的模块状态
    ///
    /// 与模块无关的错误返回 `None`。
    pub fn state(&self) -> Option<LifecycleState> {
        match self {
            CoreError::DuplicateModule { .. } => Some(LifecycleState::DuplicateModule),
            CoreError::InvalidModule { .. } | CoreError::InvalidMetadata(_) => {
                Some(LifecycleState::InvalidModule)
            }
            CoreError::CyclicDependencies { .. } => Some(LifecycleState::CyclicDependencies),
            CoreError::MissingDependencies { .. } => Some(LifecycleState::MissingDependencies),
            CoreError::DependencyFailed { .. } => Some(LifecycleState::DependencyError),
            CoreError::HookFailed { .. } => Some(LifecycleState::Error),
            CoreError::BootstrapFailed(source) => source.state(),
            _ => None,
        }
    }

    /// 出错模块的描述符
    pub fn module(&self) -> Option<&ModuleDescriptor> {
        match self {
            CoreError::DuplicateModule { module, .. }
            | CoreError::CyclicDependencies { module, .. }
            | CoreError::MissingDependencies { module, .. }
            | CoreError::DependencyFailed { module, .. }
            | CoreError::HookFailed { module, .. } => Some(module),
            CoreError::InvalidModule { module, .. } => module.as_ref(),
            CoreError::BootstrapFailed(source) => source.module(),
            _ => None,
        }
    }
}
