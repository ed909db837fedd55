//! 四叉树空间索引
//!
//! 以矩形为桶的空间索引，用于捕捉点与选择查询。
//! 元素通过调用方提供的 `T -> Rect` 投影函数定位；零尺寸矩形（点）同样有效。
//! 一个元素会被放入所有与其矩形相交的子节点，查询时去重。

use crate::rect::Rect;
use serde::{Deserialize, Serialize};

/// 四叉树分裂参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadTreeOptions {
    /// 叶节点在分裂前可容纳的最大元素数
    pub max_items: usize,
    /// 最大深度（根节点深度为 0）
    pub max_depth: usize,
}

impl Default for QuadTreeOptions {
    fn default() -> Self {
        Self {
            max_items: 8,
            max_depth: 8,
        }
    }
}

/// 四叉树统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadTreeStats {
    pub total_nodes: usize,
    pub leaf_nodes: usize,
    pub max_depth: usize,
    pub total_items: usize,
}

#[derive(Debug)]
enum Node {
    Leaf { bounds: Rect, indices: Vec<usize> },
    Branch { bounds: Rect, children: Box<[Node; 4]> },
}

impl Node {
    fn leaf(bounds: Rect) -> Self {
        Node::Leaf {
            bounds,
            indices: Vec::new(),
        }
    }

    fn bounds(&self) -> &Rect {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => bounds,
        }
    }

    fn insert(&mut self, index: usize, rects: &[Rect], depth: usize, options: &QuadTreeOptions) {
        let rect = rects[index];
        if !self.bounds().intersects(&rect) {
            return;
        }

        match self {
            Node::Branch { children, .. } => {
                for child in children.iter_mut() {
                    child.insert(index, rects, depth + 1, options);
                }
            }
            Node::Leaf { bounds, indices } => {
                indices.push(index);
                if indices.len() > options.max_items && depth < options.max_depth {
                    let [a, b, c, d] = bounds.quadrants();
                    let mut children =
                        Box::new([Node::leaf(a), Node::leaf(b), Node::leaf(c), Node::leaf(d)]);
                    for &i in indices.iter() {
                        for child in children.iter_mut() {
                            child.insert(i, rects, depth + 1, options);
                        }
                    }
                    *self = Node::Branch {
                        bounds: *bounds,
                        children,
                    };
                }
            }
        }
    }

    fn query(&self, query: &Rect, rects: &[Rect], seen: &mut [bool]) {
        if !self.bounds().intersects(query) {
            return;
        }

        match self {
            Node::Leaf { indices, .. } => {
                for &i in indices {
                    if !seen[i] && rects[i].intersects(query) {
                        seen[i] = true;
                    }
                }
            }
            Node::Branch { children, .. } => {
                for child in children.iter() {
                    child.query(query, rects, seen);
                }
            }
        }
    }

    fn collect_stats(&self, depth: usize, stats: &mut QuadTreeStats) {
        stats.total_nodes += 1;
        stats.max_depth = stats.max_depth.max(depth);
        match self {
            Node::Leaf { indices, .. } => {
                stats.leaf_nodes += 1;
                stats.total_items += indices.len();
            }
            Node::Branch { children, .. } => {
                for child in children.iter() {
                    child.collect_stats(depth + 1, stats);
                }
            }
        }
    }
}

/// 投影函数
pub type RectSelector<T> = Box<dyn Fn(&T) -> Rect + Send + Sync>;

/// 四叉树
///
/// 只支持添加与查询；内容变化时整体重建。
pub struct QuadTree<T> {
    root: Node,
    items: Vec<T>,
    rects: Vec<Rect>,
    /// 完全落在根矩形之外的元素，查询时线性扫描
    outside: Vec<usize>,
    selector: RectSelector<T>,
    options: QuadTreeOptions,
}

impl<T> QuadTree<T> {
    /// 创建新的四叉树
    pub fn new(bounds: Rect, selector: impl Fn(&T) -> Rect + Send + Sync + 'static) -> Self {
        Self::with_options(bounds, selector, QuadTreeOptions::default())
    }

    /// 使用指定分裂参数创建
    pub fn with_options(
        bounds: Rect,
        selector: impl Fn(&T) -> Rect + Send + Sync + 'static,
        options: QuadTreeOptions,
    ) -> Self {
        Self {
            root: Node::leaf(bounds),
            items: Vec::new(),
            rects: Vec::new(),
            outside: Vec::new(),
            selector: Box::new(selector),
            options,
        }
    }

    /// 根矩形
    pub fn bounds(&self) -> &Rect {
        self.root.bounds()
    }

    /// 添加元素
    pub fn add_item(&mut self, item: T) {
        let rect = (self.selector)(&item);
        let index = self.items.len();
        self.items.push(item);
        self.rects.push(rect);

        if self.root.bounds().intersects(&rect) {
            self.root.insert(index, &self.rects, 0, &self.options);
        } else {
            tracing::warn!(
                "quad tree item at ({}, {}) lies outside root bounds {:?}",
                rect.x,
                rect.y,
                self.root.bounds()
            );
            self.outside.push(index);
        }
    }

    /// 返回所有矩形与查询矩形相交（含边界）的元素，顺序按插入顺序
    pub fn get_contained_items(&self, query: &Rect) -> Vec<&T> {
        let mut seen = vec![false; self.items.len()];
        self.root.query(query, &self.rects, &mut seen);
        for &i in &self.outside {
            if self.rects[i].intersects(query) {
                seen[i] = true;
            }
        }

        seen.iter()
            .zip(&self.items)
            .filter_map(|(&hit, item)| hit.then_some(item))
            .collect()
    }

    /// 所有元素
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 清空所有元素，保留根矩形与投影函数
    pub fn clear(&mut self) {
        let bounds = *self.root.bounds();
        self.root = Node::leaf(bounds);
        self.items.clear();
        self.rects.clear();
        self.outside.clear();
    }

    /// 统计信息（`total_items` 计入重复存放在多个节点中的元素）
    pub fn stats(&self) -> QuadTreeStats {
        let mut stats = QuadTreeStats::default();
        self.root.collect_stats(0, &mut stats);
        stats.total_items += self.outside.len();
        stats
    }
}

impl<T> Extend<T> for QuadTree<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.add_item(item);
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for QuadTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadTree")
            .field("bounds", self.root.bounds())
            .field("items", &self.items)
            .field("options", &self.options)
            .finish()
    }
}
