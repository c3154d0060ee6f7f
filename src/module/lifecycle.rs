//! 模块生命周期状态
//!
//! 定义单个模块的生命周期状态 [`LifecycleState`]、作用于模块的阶段 [`LifecyclePhase`]，
//! 以及整个模块系统的全局阶段 [`GlobalPhase`]。
//!
//! 每个状态属于且仅属于以下一类：
//!
//! - **终止错误**：模块不会再被推进，除非显式重新注册
//! - **推进中**：模块仍可进入后续阶段
//! - **已稳定**：模块已启用或已禁用

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// 模块状态
// ============================================================================

/// 模块生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// 未知（尚未注册）
    #[default]
    Unknown,
    /// 已注册
    Registered,
    /// 已引导
    Bootstrapped,
    /// 已加载
    Loaded,
    /// 已启用
    Enabled,
    /// 已禁用
    Disabled,
    /// 等待依赖解析
    Delayed,
    /// 生命周期钩子执行失败
    Error,
    /// 缺少依赖
    MissingDependencies,
    /// 存在循环依赖
    CyclicDependencies,
    /// 依赖模块失败
    DependencyError,
    /// 标识符已被其他类型占用
    DuplicateModule,
    /// 无效的模块
    InvalidModule,
}

/// 状态分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// 终止错误
    TerminalError,
    /// 推进中
    Progressing,
    /// 已稳定
    Settled,
}

impl LifecycleState {
    /// 全部状态
    pub const ALL: [LifecycleState; 13] = [
        LifecycleState::Unknown,
        LifecycleState::Registered,
        LifecycleState::Bootstrapped,
        LifecycleState::Loaded,
        LifecycleState::Enabled,
        LifecycleState::Disabled,
        LifecycleState::Delayed,
        LifecycleState::Error,
        LifecycleState::MissingDependencies,
        LifecycleState::CyclicDependencies,
        LifecycleState::DependencyError,
        LifecycleState::DuplicateModule,
        LifecycleState::InvalidModule,
    ];

    /// 获取状态分类
    ///
    /// `Unknown`（未注册）属于错误状态；`Delayed` 视为推进中：模块在等待依赖，之后仍可被推进。
    pub fn class(&self) -> StateClass {
        match self {
            LifecycleState::Unknown
            | LifecycleState::Error
            | LifecycleState::MissingDependencies
            | LifecycleState::CyclicDependencies
            | LifecycleState::DependencyError
            | LifecycleState::DuplicateModule
            | LifecycleState::InvalidModule => StateClass::TerminalError,
            LifecycleState::Enabled | LifecycleState::Disabled => StateClass::Settled,
            LifecycleState::Registered
            | LifecycleState::Bootstrapped
            | LifecycleState::Loaded
            | LifecycleState::Delayed => StateClass::Progressing,
        }
    }

    /// 是否为错误状态
    pub fn is_error(&self) -> bool {
        self.class() == StateClass::TerminalError
    }

    /// 是否为推进中状态
    pub fn is_progressing(&self) -> bool {
        self.class() == StateClass::Progressing
    }

    /// 是否为稳定状态
    pub fn is_settled(&self) -> bool {
        self.class() == StateClass::Settled
    }

    /// 是否可以引导
    pub fn can_bootstrap(&self) -> bool {
        matches!(self, LifecycleState::Registered | LifecycleState::Delayed)
    }

    /// 是否可以加载
    pub fn can_load(&self) -> bool {
        !self.is_error()
            && !matches!(
                self,
                LifecycleState::Loaded | LifecycleState::Enabled | LifecycleState::Disabled
            )
    }

    /// 是否可以启用
    pub fn can_enable(&self) -> bool {
        !self.is_error() && !matches!(self, LifecycleState::Enabled | LifecycleState::Disabled)
    }

    /// 是否可以重新加载
    pub fn can_reload(&self) -> bool {
        *self == LifecycleState::Enabled
    }

    /// 是否可以禁用
    pub fn can_disable(&self) -> bool {
        !self.is_error() && *self != LifecycleState::Disabled
    }

    /// 是否已完成（或越过）指定阶段
    ///
    /// 用于判断依赖模块是否已经就绪。`Disabled` 不算完成任何前进阶段。
    pub fn has_reached(&self, phase: LifecyclePhase) -> bool {
        match phase {
            LifecyclePhase::Bootstrap => matches!(
                self,
                LifecycleState::Bootstrapped | LifecycleState::Loaded | LifecycleState::Enabled
            ),
            LifecyclePhase::Load => {
                matches!(self, LifecycleState::Loaded | LifecycleState::Enabled)
            }
            LifecyclePhase::Enable | LifecyclePhase::Reload => *self == LifecycleState::Enabled,
            LifecyclePhase::Disable => *self == LifecycleState::Disabled,
        }
    }

    /// 状态名称（大写形式，用于日志）
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unknown => "UNKNOWN",
            LifecycleState::Registered => "REGISTERED",
            LifecycleState::Bootstrapped => "BOOTSTRAPPED",
            LifecycleState::Loaded => "LOADED",
            LifecycleState::Enabled => "ENABLED",
            LifecycleState::Disabled => "DISABLED",
            LifecycleState::Delayed => "DELAYED",
            LifecycleState::Error => "ERROR",
            LifecycleState::MissingDependencies => "MISSING_DEPENDENCIES",
            LifecycleState::CyclicDependencies => "CYCLIC_DEPENDENCIES",
            LifecycleState::DependencyError => "DEPENDENCY_ERROR",
            LifecycleState::DuplicateModule => "DUPLICATE_MODULE",
            LifecycleState::InvalidModule => "INVALID_MODULE",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 模块阶段
// ============================================================================

/// 作用于单个模块的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// 引导
    Bootstrap,
    /// 加载
    Load,
    /// 启用
    Enable,
    /// 禁用
    Disable,
    /// 重新加载
    Reload,
}

impl LifecyclePhase {
    /// 当前状态是否允许执行该阶段
    pub fn permits(&self, state: LifecycleState) -> bool {
        match self {
            LifecyclePhase::Bootstrap => state.can_bootstrap(),
            LifecyclePhase::Load => state.can_load(),
            LifecyclePhase::Enable => state.can_enable(),
            LifecyclePhase::Disable => state.can_disable(),
            LifecyclePhase::Reload => state.can_reload(),
        }
    }

    /// 阶段成功后模块进入的状态
    ///
    /// 重新加载不改变状态，返回 `None`。
    pub fn target_state(&self) -> Option<LifecycleState> {
        match self {
            LifecyclePhase::Bootstrap => Some(LifecycleState::Bootstrapped),
            LifecyclePhase::Load => Some(LifecycleState::Loaded),
            LifecyclePhase::Enable => Some(LifecycleState::Enabled),
            LifecyclePhase::Disable => Some(LifecycleState::Disabled),
            LifecyclePhase::Reload => None,
        }
    }

    /// 对应的钩子名称
    pub fn hook_name(&self) -> &'static str {
        match self {
            LifecyclePhase::Bootstrap => "on_bootstrap",
            LifecyclePhase::Load => "on_load",
            LifecyclePhase::Enable => "on_enable",
            LifecyclePhase::Disable => "on_disable",
            LifecyclePhase::Reload => "on_reload",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Bootstrap => "bootstrap",
            LifecyclePhase::Load => "load",
            LifecyclePhase::Enable => "enable",
            LifecyclePhase::Disable => "disable",
            LifecyclePhase::Reload => "reload",
        };
        f.write_str(name)
    }
}

// ============================================================================
// 全局阶段
// ============================================================================

/// 模块系统的全局阶段
///
/// 只会单调前进。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlobalPhase {
    /// 尚未引导
    #[default]
    PreBootstrap,
    /// 根模块已引导
    BootstrappedRootModule,
    /// 全部模块已引导
    Bootstrapped,
    /// 全部模块已加载
    Loaded,
    /// 全部模块已启用
    Enabled,
    /// 全部模块已禁用
    Disabled,
}

impl GlobalPhase {
    /// 是否已完成全局引导
    pub fn is_bootstrapped(&self) -> bool {
        *self >= GlobalPhase::Bootstrapped
    }

    /// 是否已完成全局加载
    pub fn is_loaded(&self) -> bool {
        *self >= GlobalPhase::Loaded
    }

    /// 是否已完成全局启用
    pub fn is_enabled(&self) -> bool {
        *self >= GlobalPhase::Enabled
    }

    /// 是否已全局禁用
    pub fn is_disabled(&self) -> bool {
        *self == GlobalPhase::Disabled
    }

    /// 在该全局阶段注册的新模块需要追赶到的阶段
    pub fn catch_up_phase(&self) -> Option<LifecyclePhase> {
        match self {
            GlobalPhase::PreBootstrap => None,
            GlobalPhase::BootstrappedRootModule | GlobalPhase::Bootstrapped => {
                Some(LifecyclePhase::Bootstrap)
            }
            GlobalPhase::Loaded | GlobalPhase::Disabled => Some(LifecyclePhase::Load),
            GlobalPhase::Enabled => Some(LifecyclePhase::Enable),
        }
    }

    /// 阶段名称
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalPhase::PreBootstrap => "PRE_BOOTSTRAP",
            GlobalPhase::BootstrappedRootModule => "BOOTSTRAPPED_ROOT_MODULE",
            GlobalPhase::Bootstrapped => "BOOTSTRAPPED",
            GlobalPhase::Loaded => "LOADED",
            GlobalPhase::Enabled => "ENABLED",
            GlobalPhase::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for GlobalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
