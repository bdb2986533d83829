//! BOM 圖：arena + 索引的鄰接表
//!
//! 節點與邊分別存放在 Vec 中，以索引互相引用，避免父子物件互相持有。
//! 建立時即檢查循環引用並計算低階碼。

use chrono::NaiveDate;
use mrp_core::{BomLine, Item, MrpError, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// 節點索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

/// 邊索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeIndex(usize);

#[derive(Debug, Clone)]
struct BomNode {
    item_id: String,
    /// 以此物料為父件的邊
    children: Vec<EdgeIndex>,
    /// 以此物料為子件的邊
    parents: Vec<EdgeIndex>,
}

#[derive(Debug, Clone)]
struct BomEdge {
    parent: NodeIndex,
    component: NodeIndex,
    line: BomLine,
}

/// 子件用量
#[derive(Debug, Clone, Copy)]
pub struct ComponentUsage<'a> {
    pub component_id: &'a str,
    /// 含損耗用量 = 用量 × (1 + 損耗率)
    pub quantity: Decimal,
    pub line: &'a BomLine,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// BOM 圖
#[derive(Debug, Clone, Default)]
pub struct BomGraph {
    nodes: Vec<BomNode>,
    edges: Vec<BomEdge>,
    index: HashMap<String, NodeIndex>,
    low_level_codes: Vec<u32>,
}

impl BomGraph {
    /// 由物料主檔與 BOM 行建立圖
    ///
    /// 父件或子件不在物料主檔中 → `UnknownItem`；存在循環 → `CyclicBom`。
    pub fn build(items: &[Item], lines: &[BomLine]) -> Result<Self> {
        let mut graph = Self::default();

        let mut item_ids: Vec<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
        item_ids.sort_unstable();
        item_ids.dedup();
        for item_id in item_ids {
            graph.add_node(item_id);
        }

        for line in lines {
            let parent = graph
                .node(&line.parent_id)
                .ok_or_else(|| MrpError::unknown_item(&line.parent_id, "BOM 父件"))?;
            let component = graph
                .node(&line.component_id)
                .ok_or_else(|| MrpError::unknown_item(&line.component_id, "BOM 子件"))?;
            graph.add_edge(parent, component, line.clone());
        }

        graph.detect_cycles()?;
        graph.low_level_codes = graph.compute_low_level_codes();

        tracing::debug!(
            "BOM 圖建立完成：{} 個物料，{} 條 BOM 行，最大低階碼 {}",
            graph.nodes.len(),
            graph.edges.len(),
            graph.max_level()
        );

        Ok(graph)
    }

    fn add_node(&mut self, item_id: &str) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len());
        self.nodes.push(BomNode {
            item_id: item_id.to_string(),
            children: Vec::new(),
            parents: Vec::new(),
        });
        self.index.insert(item_id.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, parent: NodeIndex, component: NodeIndex, line: BomLine) {
        let idx = EdgeIndex(self.edges.len());
        self.edges.push(BomEdge {
            parent,
            component,
            line,
        });
        self.nodes[parent.0].children.push(idx);
        self.nodes[component.0].parents.push(idx);
    }

    /// 查找節點
    pub fn node(&self, item_id: &str) -> Option<NodeIndex> {
        self.index.get(item_id).copied()
    }

    pub fn item_id(&self, node: NodeIndex) -> &str {
        &self.nodes[node.0].item_id
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.index.contains_key(item_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn require(&self, item_id: &str) -> Result<NodeIndex> {
        self.node(item_id)
            .ok_or_else(|| MrpError::unknown_item(item_id, "BOM 查詢"))
    }

    fn child_nodes(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes[node.0]
            .children
            .iter()
            .map(move |e| self.edges[e.0].component)
    }

    /// 直接子件（含損耗用量）
    pub fn components_of(&self, item_id: &str) -> Result<Vec<ComponentUsage<'_>>> {
        let node = self.require(item_id)?;
        Ok(self.nodes[node.0]
            .children
            .iter()
            .map(|e| self.usage(&self.edges[e.0]))
            .collect())
    }

    /// 指定日期生效的直接子件
    pub fn effective_components_of(
        &self,
        item_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ComponentUsage<'_>>> {
        Ok(self
            .components_of(item_id)?
            .into_iter()
            .filter(|usage| usage.line.is_effective_on(date))
            .collect())
    }

    fn usage<'a>(&'a self, edge: &'a BomEdge) -> ComponentUsage<'a> {
        ComponentUsage {
            component_id: self.item_id(edge.component),
            quantity: edge.line.effective_quantity(),
            line: &edge.line,
        }
    }

    /// 直接父件（去重、排序）
    pub fn parents_of(&self, item_id: &str) -> Result<Vec<&str>> {
        let node = self.require(item_id)?;
        let parents: BTreeSet<&str> = self.nodes[node.0]
            .parents
            .iter()
            .map(|e| self.item_id(self.edges[e.0].parent))
            .collect();
        Ok(parents.into_iter().collect())
    }

    /// 所有子孫物料（不含起點本身，除非可由其他起點到達）
    pub fn descendants_of<'a, I>(&self, item_ids: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut visited = vec![false; self.nodes.len()];
        let mut queue: VecDeque<NodeIndex> = item_ids
            .into_iter()
            .filter_map(|id| self.node(id))
            .collect();
        let mut result = BTreeSet::new();

        while let Some(node) = queue.pop_front() {
            for child in self.child_nodes(node) {
                if !visited[child.0] {
                    visited[child.0] = true;
                    result.insert(self.item_id(child).to_string());
                    queue.push_back(child);
                }
            }
        }

        result
    }

    /// 低階碼
    pub fn low_level_code(&self, item_id: &str) -> Option<u32> {
        self.node(item_id).map(|n| self.low_level_codes[n.0])
    }

    pub fn max_level(&self) -> u32 {
        self.low_level_codes.iter().copied().max().unwrap_or(0)
    }

    /// 依低階碼分層的物料（每層依物料ID排序）
    pub fn levels(&self) -> Vec<Vec<String>> {
        if self.nodes.is_empty() {
            return Vec::new();
        }
        let mut levels = vec![Vec::new(); self.max_level() as usize + 1];
        for (idx, node) in self.nodes.iter().enumerate() {
            levels[self.low_level_codes[idx] as usize].push(node.item_id.clone());
        }
        for level in &mut levels {
            level.sort();
        }
        levels
    }

    /// 深度優先搜尋：遇到仍在目前路徑上的節點即為循環
    fn detect_cycles(&self) -> Result<()> {
        let mut colors = vec![Color::White; self.nodes.len()];
        let mut path = Vec::new();

        for start in 0..self.nodes.len() {
            if colors[start] == Color::White {
                self.visit(NodeIndex(start), &mut colors, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit(&self, node: NodeIndex, colors: &mut [Color], path: &mut Vec<NodeIndex>) -> Result<()> {
        colors[node.0] = Color::Gray;
        path.push(node);

        for child in self.child_nodes(node) {
            match colors[child.0] {
                Color::Gray => {
                    let from = path.iter().position(|&n| n == child).unwrap_or(0);
                    let mut cycle: Vec<String> = path[from..]
                        .iter()
                        .map(|&n| self.item_id(n).to_string())
                        .collect();
                    cycle.push(self.item_id(child).to_string());
                    tracing::warn!("偵測到 BOM 循環: {}", cycle.join(" → "));
                    return Err(MrpError::CyclicBom { path: cycle });
                }
                Color::White => self.visit(child, colors, path)?,
                Color::Black => {}
            }
        }

        path.pop();
        colors[node.0] = Color::Black;
        Ok(())
    }

    /// 最長路徑：低階碼 = max(父件低階碼) + 1，根節點為 0
    fn compute_low_level_codes(&self) -> Vec<u32> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.parents.len()).collect();
        let mut queue: VecDeque<NodeIndex> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .map(NodeIndex)
            .collect();
        let mut codes = vec![0u32; self.nodes.len()];

        while let Some(node) = queue.pop_front() {
            for edge in &self.nodes[node.0].children {
                let child = self.edges[edge.0].component;
                codes[child.0] = codes[child.0].max(codes[node.0] + 1);
                in_degree[child.0] -= 1;
                if in_degree[child.0] == 0 {
                    queue.push_back(child);
                }
            }
        }

        codes
    }
}
