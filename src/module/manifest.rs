//! 模块清单
//!
//! [`ModuleManifest`] 是模块的声明式元数据，可以在代码中构建，也可以从 `module.yaml` 解析：
//!
//! ```yaml
//! id: scheduler
//! version: 1.2.0
//! description:
//!   - 定时触发规则
//! dependencies:
//!   - module:storage
//!   - events
//! bootstrap: false
//! ```
//!
//! 清单经校验后与声明类型一起转换为 [`ModuleDescriptor`]。

use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::module::descriptor::{DeclaringType, ModuleDescriptor};
use crate::utils::{CoreError, Result};

/// 依赖标识符可带的前缀
pub const MODULE_PREFIX: &str = "module:";

fn default_version() -> String {
    "1.0.0".to_string()
}

/// 模块清单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// 模块标识符
    pub id: String,

    /// 版本号（semver）
    #[serde(default = "default_version")]
    pub version: String,

    /// 模块描述
    #[serde(default)]
    pub description: Vec<String>,

    /// 依赖的模块标识符
    #[serde(default, alias = "depends")]
    pub dependencies: Vec<String>,

    /// 是否为引导模块
    #[serde(default)]
    pub bootstrap: bool,
}

impl ModuleManifest {
    /// 创建清单
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            description: Vec::new(),
            dependencies: Vec::new(),
            bootstrap: false,
        }
    }

    /// 追加依赖
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// 设置版本号
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 追加一行描述
    pub fn describe(mut self, line: impl Into<String>) -> Self {
        self.description.push(line.into());
        self
    }

    /// 标记为引导模块
    pub fn bootstrap(mut self) -> Self {
        self.bootstrap = true;
        self
    }

    /// 从文件解析清单
    ///
    /// # Errors
    ///
    /// - 文件不存在或无法读取时返回 IO 错误
    /// - 文件内容不符合 YAML 格式时返回 YAML 错误
    /// - 清单验证失败时返回 `InvalidMetadata` 错误
    pub async fn parse_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_str(&content)
    }

    /// 从 YAML 字符串解析清单
    pub fn parse_str(content: &str) -> Result<Self> {
        let manifest: ModuleManifest = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// 验证清单
    ///
    /// 所有问题会被收集到一个 `InvalidMetadata` 错误中。
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.id.trim().is_empty() {
            errors.push("模块 ID 不能为空".to_string());
        } else if self.id.trim() != self.id {
            errors.push(format!("模块 ID '{}' 不能以空白开头或结尾", self.id));
        }

        if Version::parse(&self.version).is_err() {
            errors.push(format!(
                "无效的版本号格式 '{}', 请使用 semver 格式 (如 1.0.0)",
                self.version
            ));
        }

        let dependencies = self.normalized_dependencies();
        for (index, dep) in dependencies.iter().enumerate() {
            if dep.trim().is_empty() {
                errors.push(format!("第 {} 个依赖的模块 ID 不能为空", index + 1));
            } else if dependencies[..index].contains(dep) {
                errors.push(format!("依赖 '{}' 重复声明", dep));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidMetadata(errors.join("; ")))
        }
    }

    /// 去掉 `module:` 前缀后的依赖列表
    pub fn normalized_dependencies(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|d| d.strip_prefix(MODULE_PREFIX).unwrap_or(d).trim().to_string())
            .collect()
    }

    /// 转换为描述符
    ///
    /// # Errors
    ///
    /// 清单无效时返回 `InvalidModule`
    pub fn into_descriptor(self, declaring_type: DeclaringType) -> Result<ModuleDescriptor> {
        let invalid = |reason: String| CoreError::InvalidModule {
            module: None,
            reason: format!("{} ({}): {}", self.id, declaring_type, reason),
        };

        self.validate().map_err(|e| invalid(e.to_string()))?;
        let version = Version::parse(&self.version).map_err(|e| invalid(e.to_string()))?;

        let mut descriptor = ModuleDescriptor::new(self.id.clone(), declaring_type)
            .with_dependencies(self.normalized_dependencies())
            .with_version(version)
            .with_description(self.description.clone());
        if self.bootstrap {
            descriptor = descriptor.bootstrap_module();
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct Scheduler;

    #[test]
    fn test_parse_manifest() {
        let yaml = r#"
id: scheduler
version: 1.2.0
description:
  - 定时触发规则
depends:
  - module:storage
  - events
"#;
        let manifest = ModuleManifest::parse_str(yaml).unwrap();
        assert_eq!(manifest.id, "scheduler");
        assert_eq!(manifest.normalized_dependencies(), vec!["storage", "events"]);

        let descriptor = manifest
            .into_descriptor(DeclaringType::of::<Scheduler>())
            .unwrap();
        assert_eq!(descriptor.identifier(), "scheduler");
        assert_eq!(descriptor.dependencies(), &["storage", "events"]);
        assert_eq!(descriptor.version(), &Version::new(1, 2, 0));
        assert!(!descriptor.is_bootstrap_module());
    }

    #[test]
    fn test_defaults() {
        let manifest = ModuleManifest::parse_str("id: core\nbootstrap: true\n").unwrap();
        assert_eq!(manifest.version, "1.0.0");
        assert!(manifest.dependencies.is_empty());

        let descriptor = manifest
            .into_descriptor(DeclaringType::of::<Scheduler>())
            .unwrap();
        assert!(descriptor.is_bootstrap_module());
    }

    #[test]
    fn test_validation_collects_errors() {
        let manifest = ModuleManifest::new("")
            .version("not-a-version")
            .depends_on("a")
            .depends_on("module:a");

        let err = manifest.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("模块 ID 不能为空"));
        assert!(message.contains("not-a-version"));
        assert!(message.contains("重复声明"));
    }

    #[test]
    fn test_invalid_manifest_becomes_invalid_module() {
        let err = ModuleManifest::new(" padded ")
            .into_descriptor(DeclaringType::of::<Scheduler>())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidModule { module: None, .. }));
    }

    #[tokio::test]
    async fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id: storage\nversion: 0.3.1").unwrap();

        let manifest = ModuleManifest::parse_file(file.path()).await.unwrap();
        assert_eq!(manifest.id, "storage");
        assert_eq!(manifest.version, "0.3.1");
    }
}
