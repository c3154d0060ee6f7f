//! 模块系统配置
//!
//! 定义模块系统的配置结构和加载逻辑。配置文件可以是 YAML 或 JSON，按扩展名区分。
//!
//! ```yaml
//! logging:
//!   level: debug
//! modules:
//!   resolver_timeout_ms: 5000
//!   disable_order: registration
//!   settings:
//!     storage:
//!       path: /var/lib/art
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::utils::{CoreError, Result};

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// 保留日志文件数
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

fn default_max_files() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
            max_files: default_max_files(),
        }
    }
}

/// 批量禁用时的模块顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisableOrder {
    /// 依赖方先于依赖被禁用
    #[default]
    ReverseDependency,
    /// 按注册顺序禁用
    Registration,
}

/// 模块管理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// 依赖解析超时时间（毫秒），超时视为未找到
    #[serde(default = "default_resolver_timeout_ms")]
    pub resolver_timeout_ms: u64,

    /// 批量禁用顺序
    #[serde(default)]
    pub disable_order: DisableOrder,

    /// 各模块的配置项（模块 ID -> 配置）
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
}

fn default_resolver_timeout_ms() -> u64 {
    30000
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            resolver_timeout_ms: default_resolver_timeout_ms(),
            disable_order: DisableOrder::default(),
            settings: HashMap::new(),
        }
    }
}

/// 模块系统配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 模块管理配置
    #[serde(default)]
    pub modules: ModuleConfig,
}

impl CoreConfig {
    /// 创建配置构建器
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// 从文件加载配置
    ///
    /// 扩展名为 `json` 时按 JSON 解析，否则按 YAML 解析。
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!("无法读取 {}: {}", path.display(), e))
        })?;

        let mut config: CoreConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.validate()?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// 从 YAML 字符串加载配置
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: CoreConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.modules.resolver_timeout_ms == 0 {
            return Err(CoreError::InvalidConfigValue {
                key: "modules.resolver_timeout_ms".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 获取模块配置项
    pub fn module_settings(&self, module_id: &str) -> Option<&serde_json::Value> {
        self.modules.settings.get(module_id)
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: CoreConfig) {
        // 只覆盖非默认值的配置
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if other.modules.resolver_timeout_ms != default_resolver_timeout_ms() {
            self.modules.resolver_timeout_ms = other.modules.resolver_timeout_ms;
        }
        if other.modules.disable_order != DisableOrder::default() {
            self.modules.disable_order = other.modules.disable_order;
        }
        self.modules.settings.extend(other.modules.settings);
        if other.config_path.is_some() {
            self.config_path = other.config_path;
        }
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// 设置配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 设置依赖解析超时时间
    pub fn resolver_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.modules.resolver_timeout_ms = timeout_ms;
        self
    }

    /// 设置批量禁用顺序
    pub fn disable_order(mut self, order: DisableOrder) -> Self {
        self.config.modules.disable_order = order;
        self
    }

    /// 设置模块配置项
    pub fn module_settings(mut self, module_id: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.modules.settings.insert(module_id.into(), value);
        self
    }

    /// 构建配置
    pub fn build(self) -> CoreConfig {
        self.config
    }
}
