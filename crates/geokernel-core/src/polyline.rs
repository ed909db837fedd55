//! 多段线
//!
//! 多段线由有序顶点组成，每个顶点的圆心角描述其到下一个顶点之间的弧段：
//! 圆心角为 0 表示直线段，否则为按 [`VertexDirection`] 扫过的圆弧。

use crate::chain::polygon_contains;
use crate::ellipse::PrimitiveEllipse;
use crate::error::GeometryError;
use crate::math::{BoundingBox, Point3};
use crate::primitive::{Primitive, PrimitiveLine};
use serde::{Deserialize, Serialize};

/// 弧段的扫掠方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VertexDirection {
    Clockwise,
    #[default]
    CounterClockwise,
}

impl VertexDirection {
    pub fn reversed(self) -> Self {
        match self {
            VertexDirection::Clockwise => VertexDirection::CounterClockwise,
            VertexDirection::CounterClockwise => VertexDirection::Clockwise,
        }
    }
}

/// 多段线顶点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub location: Point3,
    /// 到下一个顶点的圆心角（度），0 表示直线
    pub included_angle: f64,
    pub direction: VertexDirection,
}

impl Vertex {
    pub fn new(location: Point3, included_angle: f64, direction: VertexDirection) -> Self {
        Self {
            location,
            included_angle,
            direction,
        }
    }

    /// 直线顶点
    pub fn line(location: Point3) -> Self {
        Self::new(location, 0.0, VertexDirection::CounterClockwise)
    }

    pub fn is_line(&self) -> bool {
        self.included_angle == 0.0
    }

    pub fn is_arc(&self) -> bool {
        !self.is_line()
    }

    /// 由当前顶点与下一个顶点生成图元
    ///
    /// 圆弧无法构造时退化为直线。
    pub fn primitive_to(&self, next: &Vertex) -> Primitive {
        if self.is_line() {
            return Primitive::Line(PrimitiveLine::new(self.location, next.location));
        }

        match PrimitiveEllipse::arc_from_points_and_included_angle(
            &self.location,
            &next.location,
            self.included_angle,
            self.direction,
        ) {
            Ok(arc) => Primitive::Ellipse(arc),
            Err(err) => {
                tracing::debug!("Falling back to a straight segment: {err}");
                Primitive::Line(PrimitiveLine::new(self.location, next.location))
            }
        }
    }
}

/// 多段线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    vertices: Vec<Vertex>,
}

impl Polyline {
    /// 创建多段线，至少需要 2 个顶点
    pub fn new(vertices: Vec<Vertex>) -> Result<Self, GeometryError> {
        if vertices.len() < 2 {
            return Err(GeometryError::NotEnoughVertices(vertices.len()));
        }
        Ok(Self { vertices })
    }

    /// 从点列表创建（所有顶点都是直线连接）
    pub fn from_points(points: impl IntoIterator<Item = Point3>) -> Result<Self, GeometryError> {
        Self::new(points.into_iter().map(Vertex::line).collect())
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// 线段数量
    pub fn segment_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// 首尾顶点重合
    pub fn is_closed(&self) -> bool {
        match (self.vertices.first(), self.vertices.last()) {
            (Some(first), Some(last)) => first.location == last.location,
            _ => false,
        }
    }

    /// 分解为直线与圆弧
    pub fn primitives(&self) -> Vec<Primitive> {
        self.vertices
            .windows(2)
            .map(|pair| pair[0].primitive_to(&pair[1]))
            .collect()
    }

    /// 闭合多段线是否包含该点
    pub fn contains_point(&self, point: &Point3) -> bool {
        self.is_closed() && polygon_contains(&self.primitives(), point)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.primitives()
            .iter()
            .map(Primitive::bounding_box)
            .fold(BoundingBox::empty(), |acc, b| acc.union(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::points_close_eps;

    fn square() -> Polyline {
        Polyline::from_points([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_requires_two_vertices() {
        let err = Polyline::new(vec![Vertex::line(Point3::origin())]);
        assert_eq!(err, Err(GeometryError::NotEnoughVertices(1)));
    }

    #[test]
    fn test_line_round_trip_is_exact() {
        let p1 = Point3::new(0.1, 0.2, 0.0);
        let p2 = Point3::new(3.7, -1.3, 0.0);
        let pl = Polyline::from_points([p1, p2]).unwrap();
        let prims = pl.primitives();
        assert_eq!(prims.len(), 1);
        assert_eq!(prims[0], Primitive::Line(PrimitiveLine::new(p1, p2)));
        assert!(!pl.is_closed());
    }

    #[test]
    fn test_arc_vertex_builds_arc() {
        let pl = Polyline::new(vec![
            Vertex::new(Point3::new(1.0, 0.0, 0.0), 180.0, VertexDirection::CounterClockwise),
            Vertex::line(Point3::new(-1.0, 0.0, 0.0)),
        ])
        .unwrap();
        let prims = pl.primitives();
        let Primitive::Ellipse(arc) = &prims[0] else {
            panic!("expected an arc, got {:?}", prims[0]);
        };
        assert!(points_close_eps(&arc.mid_point(), &Point3::new(0.0, 1.0, 0.0), 1e-9));
    }

    #[test]
    fn test_arc_vertex_between_coincident_points_becomes_line() {
        let p = Point3::new(1.0, 1.0, 0.0);
        let vertex = Vertex::new(p, 90.0, VertexDirection::CounterClockwise);
        let primitive = vertex.primitive_to(&Vertex::line(p));
        assert_eq!(primitive, Primitive::Line(PrimitiveLine::new(p, p)));
    }

    #[test]
    fn test_contains_point() {
        let sq = square();
        assert!(sq.is_closed());
        assert!(sq.contains_point(&Point3::new(1.0, 1.0, 0.0)));
        assert!(!sq.contains_point(&Point3::new(3.0, 1.0, 0.0)));
    }

    #[test]
    fn test_bounding_box() {
        let bbox = square().bounding_box();
        assert_eq!(bbox.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bbox.max, Point3::new(2.0, 2.0, 0.0));
    }
}
