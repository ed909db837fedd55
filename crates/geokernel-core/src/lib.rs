//! GeoKernel 核心几何内核
//!
//! 提供CAD图元、图元求交、链重建、闭合区域布尔运算以及持久化的图纸模型。
//!
//! # 架构设计
//!
//! - [`Primitive`](primitive::Primitive): 计算用的基本图元（直线、椭圆弧、点、文字、三次贝塞尔）
//! - [`Entity`](entity::Entity): 图纸中保存的实体，可分解为图元
//! - [`Drawing`](drawing::Drawing): 不可变图纸，编辑返回新版本
//!
//! # 示例
//!
//! ```rust
//! use geokernel_core::prelude::*;
//!
//! let a = Primitive::Line(PrimitiveLine::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 0.0)));
//! let b = Primitive::Line(PrimitiveLine::new(Point3::new(0.0, 2.0, 0.0), Point3::new(2.0, 0.0, 0.0)));
//!
//! let points = intersection_points(&a, &b, true);
//! assert_eq!(points.len(), 1);
//! ```

pub mod bezier;
pub mod boolean;
pub mod chain;
pub mod config;
pub mod drawing;
pub mod ellipse;
pub mod entity;
pub mod error;
pub mod intersection;
pub mod math;
pub mod polyline;
pub mod primitive;
pub mod properties;
pub mod snap;
pub mod transform;

pub use error::GeometryError;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::bezier::PrimitiveBezier;
    pub use crate::boolean::{intersect, subtract, union};
    pub use crate::chain::{get_line_strips_from_primitives, get_polylines_from_primitives};
    pub use crate::config::KernelConfig;
    pub use crate::drawing::{Drawing, DrawingError, Layer};
    pub use crate::ellipse::PrimitiveEllipse;
    pub use crate::entity::{Entity, EntityId, Geometry};
    pub use crate::error::GeometryError;
    pub use crate::intersection::intersection_points;
    pub use crate::math::{BoundingBox, Point3, Vector3};
    pub use crate::polyline::{Polyline, Vertex, VertexDirection};
    pub use crate::primitive::{Primitive, PrimitiveKind, PrimitiveLine, PrimitivePoint, PrimitiveText};
    pub use crate::properties::Color;
    pub use crate::snap::{build_snap_index, CancellationToken, SnapPointKind};
    pub use crate::transform::Transform;
}
