//! 模块状态变更记录
//!
//! 注册表每次改变模块状态都会生成一条 [`StateTransition`]，交给注入的 [`TransitionSink`]。
//! 默认的 [`TracingSink`] 写入 tracing 日志，错误状态使用 `error` 级别。

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::module::descriptor::DeclaringType;
use crate::module::lifecycle::LifecycleState;

/// 一次模块状态变更
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// 模块标识符
    pub identifier: String,
    /// 模块声明类型
    pub declaring_type: DeclaringType,
    /// 变更前状态（首次注册时为 `None`）
    pub previous: Option<LifecycleState>,
    /// 变更后状态
    pub state: LifecycleState,
    /// 附带信息（错误状态时为原因）
    pub messages: Vec<String>,
    /// 变更时间
    pub at: DateTime<Utc>,
}

impl StateTransition {
    /// 创建状态变更记录
    pub fn new(
        identifier: impl Into<String>,
        declaring_type: DeclaringType,
        previous: Option<LifecycleState>,
        state: LifecycleState,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            declaring_type,
            previous,
            state,
            messages: Vec::new(),
            at: Utc::now(),
        }
    }

    /// 附加信息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }
}

impl std::fmt::Display for StateTransition {
    /// `[STATE] id - Type: 信息`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} - {}",
            self.state,
            self.identifier,
            self.declaring_type.short_name()
        )?;
        if !self.messages.is_empty() {
            write!(f, ": {}", self.messages.join("; "))?;
        }
        Ok(())
    }
}

/// 状态变更接收器
pub trait TransitionSink: Send + Sync {
    /// 记录一次状态变更
    fn record(&self, transition: &StateTransition);
}

/// 写入 tracing 日志的接收器
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TransitionSink for TracingSink {
    fn record(&self, transition: &StateTransition) {
        let previous = transition.previous.map(|s| s.as_str()).unwrap_or("-");
        let reason = transition.messages.join("; ");

        if transition.state.is_error() {
            error!(
                module_id = %transition.identifier,
                declaring_type = transition.declaring_type.name(),
                previous,
                state = %transition.state,
                reason = %reason,
                "{}", transition
            );
        } else {
            debug!(
                module_id = %transition.identifier,
                declaring_type = transition.declaring_type.name(),
                previous,
                state = %transition.state,
                "{}", transition
            );
        }
    }
}

/// 在内存中保留全部状态变更的接收器
///
/// 用于诊断和测试。
#[derive(Debug, Default)]
pub struct MemorySink {
    transitions: Mutex<Vec<StateTransition>>,
}

impl MemorySink {
    /// 创建接收器
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部状态变更（按发生顺序）
    pub fn history(&self) -> Vec<StateTransition> {
        match self.transitions.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 指定模块的状态变更
    pub fn history_of(&self, identifier: &str) -> Vec<StateTransition> {
        self.history()
            .into_iter()
            .filter(|t| t.identifier == identifier)
            .collect()
    }

    /// 按发生顺序列出进入指定状态的模块
    pub fn modules_entering(&self, state: LifecycleState) -> Vec<String> {
        self.history()
            .into_iter()
            .filter(|t| t.state == state)
            .map(|t| t.identifier)
            .collect()
    }
}

impl TransitionSink for MemorySink {
    fn record(&self, transition: &StateTransition) {
        TracingSink.record(transition);
        match self.transitions.lock() {
            Ok(mut guard) => guard.push(transition.clone()),
            Err(poisoned) => poisoned.into_inner().push(transition.clone()),
        }
    }
}
