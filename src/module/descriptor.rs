//! 模块描述符
//!
//! [`ModuleDescriptor`] 是模块的不可变元数据：标识符、声明类型、依赖列表和引导标记。
//! 描述符在注册前构建完成，注册后不再改变。

use crate::utils::{CoreError, Result};
use semver::Version;
use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// 模块的声明类型
///
/// 用于区分同一标识符是否来自同一个实现类型。
#[derive(Clone, Copy)]
pub struct DeclaringType {
    id: TypeId,
    name: &'static str,
}

impl DeclaringType {
    /// 获取类型 `T` 的声明类型
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// 类型名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 不带路径的短名称
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for DeclaringType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeclaringType {}

impl Hash for DeclaringType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DeclaringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeclaringType({})", self.name)
    }
}

impl fmt::Display for DeclaringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 模块描述符
///
/// 相等性和哈希只取决于标识符。
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    identifier: String,
    declaring_type: DeclaringType,
    dependencies: Vec<String>,
    bootstrap_module: bool,
    version: Version,
    description: Vec<String>,
}

impl ModuleDescriptor {
    /// 创建描述符
    ///
    /// 版本默认为 `1.0.0`，没有依赖，且不是引导模块。
    pub fn new(identifier: impl Into<String>, declaring_type: DeclaringType) -> Self {
        Self {
            identifier: identifier.into(),
            declaring_type,
            dependencies: Vec::new(),
            bootstrap_module: false,
            version: Version::new(1, 0, 0),
            description: Vec::new(),
        }
    }

    /// 以类型 `T` 作为声明类型创建描述符
    pub fn of<T: 'static>(identifier: impl Into<String>) -> Self {
        Self::new(identifier, DeclaringType::of::<T>())
    }

    /// 追加一个依赖
    pub fn depends_on(mut self, identifier: impl Into<String>) -> Self {
        self.dependencies.push(identifier.into());
        self
    }

    /// 追加多个依赖（保持声明顺序）
    pub fn with_dependencies<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(identifiers.into_iter().map(Into::into));
        self
    }

    /// 标记为引导模块
    pub fn bootstrap_module(mut self) -> Self {
        self.bootstrap_module = true;
        self
    }

    /// 设置版本
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// 设置描述
    pub fn with_description<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description = lines.into_iter().map(Into::into).collect();
        self
    }

    /// 模块标识符
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// 声明类型
    pub fn declaring_type(&self) -> DeclaringType {
        self.declaring_type
    }

    /// 依赖的模块标识符（声明顺序）
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// 是否为引导模块
    pub fn is_bootstrap_module(&self) -> bool {
        self.bootstrap_module
    }

    /// 模块版本
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// 模块描述
    pub fn description(&self) -> &[String] {
        &self.description
    }

    /// 校验描述符
    ///
    /// # Errors
    ///
    /// 标识符为空或依赖标识符为空时返回 `CoreError::InvalidModule`
    pub fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(CoreError::InvalidModule {
                module: Some(self.clone()),
                reason: "模块标识符不能为空".to_string(),
            });
        }
        if self.dependencies.iter().any(|d| d.trim().is_empty()) {
            return Err(CoreError::InvalidModule {
                module: Some(self.clone()),
                reason: "依赖标识符不能为空".to_string(),
            });
        }
        Ok(())
    }
}

impl PartialEq for ModuleDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for ModuleDescriptor {}

impl Hash for ModuleDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.identifier, self.declaring_type.short_name())
    }
}
