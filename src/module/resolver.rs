//! 依赖解析
//!
//! 模块缺少依赖时，编排器会在后台调用注入的 [`DependencyResolver`]，而不会等待它完成。
//! 解析器负责把缺失的模块注册进来；解析成功后，编排器会对原模块发起一次全新的
//! 重新注册（见 [`ModuleOrchestrator::retry_module`]）。
//!
//! [`CatalogResolver`] 是一个现成的实现：它持有一组已知但尚未注册的模块，
//! 按需把它们（连同它们自己的依赖）注册到编排器中。

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::core::scope::Scope;
use crate::module::descriptor::ModuleDescriptor;
use crate::module::instance::{describe, factory_of, DeclaredModule, ModuleFactory};
use crate::module::orchestrator::ModuleOrchestrator;
use crate::utils::{CoreError, Result};

/// 解析结果类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionResult {
    /// 依赖已注册
    Success,
    /// 依赖稍后才能提供
    Delayed,
    /// 找不到依赖
    NotFound,
    /// 解析失败
    Failed,
}

/// 依赖解析结果
#[derive(Debug)]
pub struct ModuleResolution {
    /// 结果类别
    pub result: ResolutionResult,
    /// 附带信息
    pub message: Option<String>,
    /// 失败原因
    pub cause: Option<anyhow::Error>,
}

impl ModuleResolution {
    /// 解析成功
    pub fn success() -> Self {
        Self {
            result: ResolutionResult::Success,
            message: None,
            cause: None,
        }
    }

    /// 稍后提供
    pub fn delayed(message: impl Into<String>) -> Self {
        Self {
            result: ResolutionResult::Delayed,
            message: Some(message.into()),
            cause: None,
        }
    }

    /// 未找到
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            result: ResolutionResult::NotFound,
            message: Some(message.into()),
            cause: None,
        }
    }

    /// 解析失败
    pub fn failed(message: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            result: ResolutionResult::Failed,
            message: Some(message.into()),
            cause: Some(cause.into()),
        }
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.result == ResolutionResult::Success
    }
}

/// 一次依赖解析请求
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    /// 缺少依赖的模块
    pub descriptor: ModuleDescriptor,
    /// 缺失的依赖标识符（声明顺序）
    pub missing: Vec<String>,
}

/// 依赖解析器
///
/// 返回 `Success` 之前，缺失的模块必须已经注册到编排器中。
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// 解析缺失的依赖
    async fn resolve(
        &self,
        request: &ResolutionRequest,
        orchestrator: &ModuleOrchestrator,
    ) -> ModuleResolution;
}

#[derive(Clone)]
struct CatalogEntry {
    descriptor: ModuleDescriptor,
    factory: ModuleFactory,
}

/// 基于模块目录的依赖解析器
#[derive(Default)]
pub struct CatalogResolver {
    entries: RwLock<IndexMap<String, CatalogEntry>>,
}

impl CatalogResolver {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一个可按需注册的模块
    pub fn add(&self, descriptor: ModuleDescriptor, factory: ModuleFactory) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            descriptor.identifier().to_string(),
            CatalogEntry {
                descriptor,
                factory,
            },
        );
    }

    /// 加入一个声明式模块类型
    pub fn add_declared<M: DeclaredModule>(&self) -> Result<()> {
        self.add(describe::<M>()?, factory_of::<M>());
        Ok(())
    }

    /// 目录中是否有该模块
    pub fn contains(&self, module_id: &str) -> bool {
        self.entry(module_id).is_some()
    }

    fn entry(&self, module_id: &str) -> Option<CatalogEntry> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(module_id).cloned()
    }

    /// 计算需要注册的模块（依赖在前），以及目录中找不到的标识符
    async fn plan(
        &self,
        missing: &[String],
        orchestrator: &ModuleOrchestrator,
    ) -> (Vec<CatalogEntry>, Vec<String>) {
        let mut order = Vec::new();
        let mut not_found = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(String, bool)> =
            missing.iter().rev().map(|id| (id.clone(), false)).collect();

        while let Some((module_id, expanded)) = stack.pop() {
            if expanded {
                if let Some(entry) = self.entry(&module_id) {
                    order.push(entry);
                }
                continue;
            }
            if !visited.insert(module_id.clone()) || orchestrator.registry().contains(&module_id).await {
                continue;
            }
            match self.entry(&module_id) {
                Some(entry) => {
                    stack.push((module_id, true));
                    for dep in entry.descriptor.dependencies().iter().rev() {
                        stack.push((dep.clone(), false));
                    }
                }
                None => not_found.push(module_id),
            }
        }

        (order, not_found)
    }
}

#[async_trait]
impl DependencyResolver for CatalogResolver {
    async fn resolve(
        &self,
        request: &ResolutionRequest,
        orchestrator: &ModuleOrchestrator,
    ) -> ModuleResolution {
        let (order, not_found) = self.plan(&request.missing, orchestrator).await;
        if !not_found.is_empty() {
            warn!(
                module_id = %request.descriptor.identifier(),
                missing = ?not_found,
                "模块目录中找不到依赖"
            );
            return ModuleResolution::not_found(format!(
                "模块目录中找不到: {}",
                not_found.join(", ")
            ));
        }

        let mut failures: Vec<CoreError> = Vec::new();
        for entry in order {
            debug!(
                module_id = %entry.descriptor.identifier(),
                requested_by = %request.descriptor.identifier(),
                "从模块目录注册依赖"
            );
            let factory = entry.factory.clone();
            if let Err(e) = orchestrator
                .register_module(entry.descriptor, move |scope: &Scope| factory(scope))
                .await
            {
                failures.push(e);
            }
        }

        match failures.into_iter().next() {
            None => ModuleResolution::success(),
            Some(first) => ModuleResolution::failed(
                format!("无法注册模块 \"{}\" 的依赖", request.descriptor.identifier()),
                first,
            ),
        }
    }
}
