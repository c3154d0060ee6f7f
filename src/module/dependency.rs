//! 模块依赖关系图
//!
//! 本模块提供模块依赖关系的图结构，用于：
//!
//! - 注册时的循环依赖检测（[`DependencyGraph::first_cycle_containing`]）
//! - 依赖方的查找
//! - 批量启用 / 禁用时的模块顺序
//!
//! 图中的节点保持注册顺序，每个节点的依赖保持声明顺序，因此所有遍历结果都是确定的。
//!
//! # 示例
//!
//! ```rust
//! use art_modules::module::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_dependency("a", "b");
//! graph.add_dependency("b", "a");
//!
//! let cycle = graph.first_cycle_containing("a").unwrap();
//! assert_eq!(cycle, vec!["a", "b", "a"]);
//! ```

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::module::descriptor::ModuleDescriptor;

/// 循环路径的分隔符
pub const CYCLE_SEPARATOR: &str = " --> ";

/// 将循环路径渲染为 `a --> b --> a`
pub fn render_cycle(cycle: &[String]) -> String {
    cycle.join(CYCLE_SEPARATOR)
}

/// 模块依赖关系图
///
/// 只有通过 [`add_module`](Self::add_module) 或作为依赖方加入的模块才算作图中的模块；
/// 仅被依赖、尚未声明的标识符不算。
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// 正向边：模块 ID -> 该模块依赖的模块列表（声明顺序）
    edges: IndexMap<String, Vec<String>>,
    /// 反向边：模块 ID -> 依赖该模块的模块列表
    reverse_edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// 创建一个空的依赖图
    pub fn new() -> Self {
        Self::default()
    }

    /// 根据描述符构建依赖图（按迭代顺序加入）
    pub fn from_descriptors<'a, I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = &'a ModuleDescriptor>,
    {
        let mut graph = Self::new();
        for descriptor in descriptors {
            graph.add_module(descriptor.identifier());
            for dependency in descriptor.dependencies() {
                graph.add_dependency(descriptor.identifier(), dependency);
            }
        }
        graph
    }

    /// 添加模块节点
    ///
    /// 如果模块已存在，则不会重复添加。
    pub fn add_module(&mut self, module_id: &str) {
        if !self.edges.contains_key(module_id) {
            self.edges.insert(module_id.to_string(), Vec::new());
        }
    }

    /// 添加依赖关系：`module_id` 依赖 `dependency_id`
    ///
    /// 依赖方会被自动加入图中，重复的依赖会被忽略。
    pub fn add_dependency(&mut self, module_id: &str, dependency_id: &str) {
        let deps = self.edges.entry(module_id.to_string()).or_default();
        if !deps.iter().any(|d| d == dependency_id) {
            deps.push(dependency_id.to_string());
        }

        let dependents = self
            .reverse_edges
            .entry(dependency_id.to_string())
            .or_default();
        if !dependents.iter().any(|d| d == module_id) {
            dependents.push(module_id.to_string());
        }
    }

    /// 是否包含模块
    pub fn contains_module(&self, module_id: &str) -> bool {
        self.edges.contains_key(module_id)
    }

    /// 获取依赖该模块的模块列表
    pub fn get_dependents(&self, module_id: &str) -> Vec<String> {
        self.reverse_edges
            .get(module_id)
            .map(|dependents| {
                dependents
                    .iter()
                    .filter(|d| self.contains_module(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 经过指定模块的第一条循环
    ///
    /// 循环从 `module_id` 开始并回到 `module_id`，例如 `[a, b, c, a]`。依赖按声明顺序遍历，
    /// 每个节点最多展开一次，复杂度为 O(V + E)。
    pub fn first_cycle_containing(&self, module_id: &str) -> Option<Vec<String>> {
        if !self.contains_module(module_id) {
            return None;
        }

        let mut path = vec![module_id.to_string()];
        let mut explored = HashSet::new();
        explored.insert(module_id.to_string());
        self.search_cycle(module_id, module_id, &mut path, &mut explored)
    }

    /// 深度优先搜索回到 `start` 的边
    ///
    /// 已展开过的节点不会再次展开：它能到达的节点都已检查过。
    fn search_cycle(
        &self,
        start: &str,
        current: &str,
        path: &mut Vec<String>,
        explored: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        let neighbors = self.edges.get(current)?;

        for neighbor in neighbors {
            if neighbor == start {
                let mut cycle = path.clone();
                cycle.push(start.to_string());
                return Some(cycle);
            }
            if !explored.insert(neighbor.clone()) {
                continue;
            }

            path.push(neighbor.clone());
            if let Some(cycle) = self.search_cycle(start, neighbor, path, explored) {
                return Some(cycle);
            }
            path.pop();
        }
        None
    }

    /// 激活顺序：依赖总在依赖方之前
    ///
    /// 按注册顺序做后序遍历；遇到循环时不会死循环，循环内的顺序按发现顺序决定。
    pub fn activation_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.edges.len());
        let mut visited = HashSet::new();

        for module_id in self.edges.keys() {
            self.visit_post_order(module_id, &mut visited, &mut order);
        }

        order
    }

    /// 停用顺序：依赖方总在依赖之前
    pub fn deactivation_order(&self) -> Vec<String> {
        let mut order = self.activation_order();
        order.reverse();
        order
    }

    fn visit_post_order(
        &self,
        module_id: &str,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(module_id.to_string()) {
            return;
        }
        let Some(deps) = self.edges.get(module_id) else {
            return;
        };
        for dep in deps {
            self.visit_post_order(dep, visited, order);
        }
        order.push(module_id.to_string());
    }
}
