//! GeoKernel 基础容器
//!
//! - [`ReadOnlyTree`]: 不可变、结构共享的有序映射，承载图层与实体集合
//! - [`QuadTree`]: 以矩形为桶的空间索引，用于捕捉点与选择查询
//!
//! # 示例
//!
//! ```rust
//! use geokernel_collections::prelude::*;
//!
//! let v1 = ReadOnlyTree::new().insert("0", 1);
//! let v2 = v1.insert("walls", 2);
//! assert_eq!(v1.len(), 1);
//! assert_eq!(v2.len(), 2);
//! ```

pub mod quadtree;
pub mod readonly_tree;
pub mod rect;

pub use quadtree::{QuadTree, QuadTreeOptions, QuadTreeStats};
pub use readonly_tree::ReadOnlyTree;
pub use rect::Rect;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::quadtree::{QuadTree, QuadTreeOptions};
    pub use crate::readonly_tree::ReadOnlyTree;
    pub use crate::rect::Rect;
}
