//! 内核配置
//!
//! 可由宿主程序调整的参数。文件加载由宿主负责，这里只提供
//! 可序列化的结构与默认值。精度与容差常量见 [`crate::math`]。

use crate::primitive::DEFAULT_ARC_SEGMENTS;
use geokernel_collections::QuadTreeOptions;
use serde::{Deserialize, Serialize};

/// 内核可调参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// 完整椭圆的采样段数
    pub arc_segments: usize,
    /// 捕捉点四叉树叶节点容量
    pub quadtree_max_items: usize,
    /// 捕捉点四叉树最大深度
    pub quadtree_max_depth: usize,
}

impl KernelConfig {
    /// 使用指定的椭圆采样段数
    pub fn with_arc_segments(mut self, segments: usize) -> Self {
        self.arc_segments = segments.max(1);
        self
    }

    /// 捕捉点四叉树参数
    pub fn quadtree_options(&self) -> QuadTreeOptions {
        QuadTreeOptions {
            max_items: self.quadtree_max_items,
            max_depth: self.quadtree_max_depth,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            arc_segments: DEFAULT_ARC_SEGMENTS,
            quadtree_max_items: 8,
            quadtree_max_depth: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.arc_segments, 360);
        assert_eq!(config.quadtree_options(), QuadTreeOptions::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: KernelConfig = serde_json::from_str(r#"{ "arc_segments": 72 }"#).unwrap();
        assert_eq!(config.arc_segments, 72);
        assert_eq!(config.quadtree_max_depth, 8);

        let json = serde_json::to_string(&config).unwrap();
        let back: KernelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_arc_segments_floor() {
        assert_eq!(KernelConfig::default().with_arc_segments(0).arc_segments, 1);
    }
}
