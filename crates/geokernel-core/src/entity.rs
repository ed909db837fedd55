//! 实体标识和管理
//!
//! 实体是图纸中的绘图对象，可以分解为一个或多个图元（[`Primitive`]）。
//! 采用生成式ID设计，支持撤销/重做时的实体复用。

use crate::bezier::PrimitiveBezier;
use crate::chain::polygon_contains;
use crate::ellipse::PrimitiveEllipse;
use crate::math::{
    close_to, correct_angle_degrees, points_close_eps, right_vector_from_normal, BoundingBox,
    Point3, Vector3, COINCIDENCE_EPSILON, THREE_SIXTY,
};
use crate::polyline::Polyline;
use crate::primitive::{Primitive, PrimitiveLine, PrimitivePoint, PrimitiveText};
use crate::properties::Color;
use crate::snap::{SnapPoint, SnapPointKind};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// 全局实体ID生成器
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// 实体唯一标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    /// 唯一ID
    pub id: u64,
    /// 代数（用于撤销/重做时区分同一ID的不同版本）
    pub generation: u32,
}

impl EntityId {
    /// 创建新的实体ID
    pub fn new() -> Self {
        Self {
            id: ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed),
            generation: 0,
        }
    }

    /// 从指定值创建（用于文件加载）
    pub fn from_raw(id: u64, generation: u32) -> Self {
        Self { id, generation }
    }

    /// 空ID（无效）
    pub const NULL: EntityId = EntityId {
        id: 0,
        generation: 0,
    };

    /// 检查是否为空ID
    pub fn is_null(&self) -> bool {
        self.id == 0
    }

    /// 同一ID的下一代
    pub fn next_generation(&self) -> Self {
        Self {
            id: self.id,
            generation: self.generation + 1,
        }
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.id, self.generation)
    }
}

/// 实体几何
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Line {
        p1: Point3,
        p2: Point3,
    },
    Circle {
        center: Point3,
        radius: f64,
        normal: Vector3,
    },
    /// 圆弧，角度从法向量推导的“右”方向起算
    Arc {
        center: Point3,
        radius: f64,
        normal: Vector3,
        start_angle: f64,
        end_angle: f64,
    },
    Ellipse {
        center: Point3,
        major_axis: Vector3,
        normal: Vector3,
        minor_axis_ratio: f64,
        start_angle: f64,
        end_angle: f64,
    },
    Location {
        point: Point3,
    },
    Text {
        value: String,
        location: Point3,
        height: f64,
        normal: Vector3,
        rotation: f64,
    },
    /// 由首尾相接的三次贝塞尔曲线组成的样条
    Spline {
        curves: Vec<PrimitiveBezier>,
    },
    Polyline(Polyline),
}

impl Geometry {
    /// 获取几何类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Line { .. } => "Line",
            Geometry::Circle { .. } => "Circle",
            Geometry::Arc { .. } => "Arc",
            Geometry::Ellipse { .. } => "Ellipse",
            Geometry::Location { .. } => "Location",
            Geometry::Text { .. } => "Text",
            Geometry::Spline { .. } => "Spline",
            Geometry::Polyline(_) => "Polyline",
        }
    }
}

/// CAD实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// 唯一标识符
    pub id: EntityId,

    pub color: Option<Color>,

    /// 几何类型和数据
    pub geometry: Geometry,
}

impl Entity {
    /// 创建新实体
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: EntityId::new(),
            color: None,
            geometry,
        }
    }

    /// 使用指定的颜色
    pub fn with_color(mut self, color: Option<Color>) -> Self {
        self.color = color;
        self
    }

    /// 使用指定的ID
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    /// 分解为图元，图元继承实体颜色
    pub fn primitives(&self) -> Vec<Primitive> {
        let primitives = match &self.geometry {
            Geometry::Line { p1, p2 } => vec![Primitive::Line(PrimitiveLine::new(*p1, *p2))],
            Geometry::Circle {
                center,
                radius,
                normal,
            } => vec![Primitive::Ellipse(PrimitiveEllipse::circle(*center, *radius, *normal))],
            Geometry::Arc {
                center,
                radius,
                normal,
                start_angle,
                end_angle,
            } => vec![Primitive::Ellipse(PrimitiveEllipse::arc(
                *center,
                *radius,
                *start_angle,
                *end_angle,
                *normal,
            ))],
            Geometry::Ellipse {
                center,
                major_axis,
                normal,
                minor_axis_ratio,
                start_angle,
                end_angle,
            } => vec![Primitive::Ellipse(PrimitiveEllipse::new(
                *center,
                *major_axis,
                *normal,
                *minor_axis_ratio,
                *start_angle,
                *end_angle,
            ))],
            Geometry::Location { point } => vec![Primitive::Point(PrimitivePoint::new(*point))],
            Geometry::Text {
                value,
                location,
                height,
                normal,
                rotation,
            } => vec![Primitive::Text(PrimitiveText::new(
                value.clone(),
                *location,
                *height,
                *normal,
                *rotation,
            ))],
            Geometry::Spline { curves } => curves.iter().cloned().map(Primitive::Bezier).collect(),
            Geometry::Polyline(polyline) => polyline.primitives(),
        };

        primitives
            .into_iter()
            .map(|p| p.with_color(self.color))
            .collect()
    }

    /// 对象捕捉点
    pub fn snap_points(&self) -> Vec<SnapPoint> {
        let mut points = Vec::new();
        match &self.geometry {
            Geometry::Line { p1, p2 } => {
                points.push(SnapPoint::new(*p1, SnapPointKind::EndPoint));
                points.push(SnapPoint::new(*p2, SnapPointKind::EndPoint));
                points.push(SnapPoint::new(nalgebra::center(p1, p2), SnapPointKind::MidPoint));
            }
            Geometry::Circle { .. } | Geometry::Arc { .. } | Geometry::Ellipse { .. } => {
                for primitive in self.primitives() {
                    if let Primitive::Ellipse(e) = primitive {
                        ellipse_snap_points(&e, &mut points);
                    }
                }
            }
            Geometry::Location { point } => {
                points.push(SnapPoint::new(*point, SnapPointKind::EndPoint));
            }
            Geometry::Text { location, .. } => {
                points.push(SnapPoint::new(*location, SnapPointKind::EndPoint));
            }
            Geometry::Spline { curves } => {
                if let Some(first) = curves.first() {
                    points.push(SnapPoint::new(first.p1, SnapPointKind::EndPoint));
                }
                points.extend(curves.iter().map(|c| SnapPoint::new(c.p4, SnapPointKind::EndPoint)));
            }
            Geometry::Polyline(polyline) => {
                points.extend(
                    polyline
                        .vertices()
                        .iter()
                        .map(|v| SnapPoint::new(v.location, SnapPointKind::EndPoint)),
                );
                points.extend(
                    polyline
                        .primitives()
                        .iter()
                        .map(|p| SnapPoint::new(p.mid_point(), SnapPointKind::MidPoint)),
                );
            }
        }
        points
    }

    /// 获取包围盒
    pub fn bounding_box(&self) -> BoundingBox {
        self.primitives()
            .iter()
            .map(Primitive::bounding_box)
            .fold(BoundingBox::empty(), |acc, b| acc.union(&b))
    }

    /// 是否为闭合区域（可参与布尔运算）
    pub fn is_closed_region(&self) -> bool {
        match &self.geometry {
            Geometry::Circle { .. } => true,
            Geometry::Ellipse {
                start_angle,
                end_angle,
                ..
            } => close_to(0.0, *start_angle) && close_to(THREE_SIXTY, *end_angle),
            Geometry::Polyline(polyline) => polyline.is_closed(),
            _ => false,
        }
    }

    /// 闭合区域是否包含该点（射线法）
    pub fn encloses_point(&self, point: &Point3) -> bool {
        self.is_closed_region() && polygon_contains(&self.primitives(), point)
    }

    /// 几何上是否等价（忽略ID与颜色）
    pub fn equivalent_to(&self, other: &Entity) -> bool {
        if self.geometry.type_name() != other.geometry.type_name() {
            return false;
        }
        let mine = self.primitives();
        let theirs = other.primitives();
        let close = |a: &Point3, b: &Point3| points_close_eps(a, b, COINCIDENCE_EPSILON);
        mine.len() == theirs.len()
            && mine.iter().zip(&theirs).all(|(a, b)| {
                a.kind() == b.kind()
                    && close(&a.start_point(), &b.start_point())
                    && close(&a.end_point(), &b.end_point())
                    && close(&a.mid_point(), &b.mid_point())
            })
    }
}

fn ellipse_snap_points(ellipse: &PrimitiveEllipse, points: &mut Vec<SnapPoint>) {
    points.push(SnapPoint::new(ellipse.center, SnapPointKind::Center));
    if ellipse.is_closed() {
        for angle in [0.0, 90.0, 180.0, 270.0] {
            points.push(SnapPoint::new(ellipse.get_point(angle), SnapPointKind::Quadrant));
        }
    } else {
        points.push(SnapPoint::new(ellipse.start_point(), SnapPointKind::EndPoint));
        points.push(SnapPoint::new(ellipse.end_point(), SnapPointKind::EndPoint));
        points.push(SnapPoint::new(ellipse.mid_point(), SnapPointKind::MidPoint));
    }
}

impl Primitive {
    /// 转换为实体
    ///
    /// 椭圆的轴比恰为 1 时：闭合为圆，否则为圆弧；其余为椭圆。
    pub fn to_entity(&self) -> Entity {
        let geometry = match self {
            Primitive::Line(line) => Geometry::Line {
                p1: line.p1,
                p2: line.p2,
            },
            Primitive::Ellipse(e) if e.minor_axis_ratio == 1.0 && e.is_closed() => Geometry::Circle {
                center: e.center,
                radius: e.major_radius(),
                normal: e.normal,
            },
            Primitive::Ellipse(e) if e.minor_axis_ratio == 1.0 => {
                // 圆弧角度从法向量的“右”方向起算，长轴方向不同时需要补偿
                let offset = major_axis_offset_degrees(e);
                Geometry::Arc {
                    center: e.center,
                    radius: e.major_radius(),
                    normal: e.normal,
                    start_angle: shift_angle(e.start_angle, offset),
                    end_angle: shift_angle(e.end_angle, offset),
                }
            }
            Primitive::Ellipse(e) => Geometry::Ellipse {
                center: e.center,
                major_axis: e.major_axis,
                normal: e.normal,
                minor_axis_ratio: e.minor_axis_ratio,
                start_angle: e.start_angle,
                end_angle: e.end_angle,
            },
            Primitive::Point(p) => Geometry::Location { point: p.location },
            Primitive::Text(t) => Geometry::Text {
                value: t.value.clone(),
                location: t.location,
                height: t.height,
                normal: t.normal,
                rotation: t.rotation,
            },
            Primitive::Bezier(b) => Geometry::Spline {
                curves: vec![b.clone().with_color(None)],
            },
        };

        Entity::new(geometry).with_color(self.color())
    }
}

/// 长轴相对于法向量“右”方向的角度
fn major_axis_offset_degrees(ellipse: &PrimitiveEllipse) -> f64 {
    let normal = ellipse.normal.normalize();
    let right = right_vector_from_normal(&normal);
    let up = normal.cross(&right);
    ellipse
        .major_axis
        .dot(&up)
        .atan2(ellipse.major_axis.dot(&right))
        .to_degrees()
}

fn shift_angle(angle: f64, offset: f64) -> f64 {
    if offset == 0.0 {
        angle
    } else {
        correct_angle_degrees(angle + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::points_close;
    use crate::polyline::Vertex;

    #[test]
    fn test_entity_id_generation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert!(!id1.is_null());
        assert!(EntityId::NULL.is_null());
        assert_eq!(id1.next_generation().id, id1.id);
        assert!(id1 < id1.next_generation());
    }

    #[test]
    fn test_primitive_to_entity_classification() {
        let circle = Primitive::Ellipse(PrimitiveEllipse::circle(Point3::origin(), 2.0, Vector3::z()));
        assert!(matches!(circle.to_entity().geometry, Geometry::Circle { radius, .. } if radius == 2.0));

        let arc = Primitive::Ellipse(PrimitiveEllipse::arc(Point3::origin(), 2.0, 10.0, 80.0, Vector3::z()));
        let Geometry::Arc { start_angle, end_angle, .. } = arc.to_entity().geometry else {
            panic!("expected an arc");
        };
        assert_eq!((start_angle, end_angle), (10.0, 80.0));

        let nearly_circle = Primitive::Ellipse(PrimitiveEllipse::ellipse_2d(Point3::origin(), 2.0, 1.999_999_999));
        assert!(matches!(nearly_circle.to_entity().geometry, Geometry::Ellipse { .. }));

        let line = Primitive::Line(PrimitiveLine::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)));
        assert!(matches!(line.to_entity().geometry, Geometry::Line { .. }));
    }

    #[test]
    fn test_rotated_arc_keeps_its_end_points() {
        let major = Vector3::new(0.0, 2.0, 0.0);
        let arc = PrimitiveEllipse::new(Point3::origin(), major, Vector3::z(), 1.0, 0.0, 90.0);
        let entity = Primitive::Ellipse(arc.clone()).to_entity();
        let converted = &entity.primitives()[0];
        assert!(points_close_eps(&converted.start_point(), &arc.start_point(), 1e-9));
        assert!(points_close_eps(&converted.end_point(), &arc.end_point(), 1e-9));
    }

    #[test]
    fn test_primitives_inherit_color() {
        let entity = Entity::new(Geometry::Circle {
            center: Point3::origin(),
            radius: 1.0,
            normal: Vector3::z(),
        })
        .with_color(Some(Color::RED));
        assert_eq!(entity.primitives()[0].color(), Some(Color::RED));
    }

    #[test]
    fn test_circle_snap_points() {
        let entity = Entity::new(Geometry::Circle {
            center: Point3::origin(),
            radius: 1.0,
            normal: Vector3::z(),
        });
        let snaps = entity.snap_points();
        assert_eq!(snaps.len(), 5);
        assert_eq!(snaps[0].kind, SnapPointKind::Center);
        assert!(snaps.iter().any(|s| points_close(&s.point, &Point3::new(0.0, 1.0, 0.0))));
    }

    #[test]
    fn test_encloses_point() {
        let circle = Entity::new(Geometry::Circle {
            center: Point3::origin(),
            radius: 1.0,
            normal: Vector3::z(),
        });
        assert!(circle.encloses_point(&Point3::new(0.2, 0.1, 0.0)));
        assert!(!circle.encloses_point(&Point3::new(2.0, 0.1, 0.0)));

        let line = Entity::new(Geometry::Line {
            p1: Point3::origin(),
            p2: Point3::new(1.0, 0.0, 0.0),
        });
        assert!(!line.is_closed_region());
        assert!(!line.encloses_point(&Point3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_polyline_region() {
        let polyline = Polyline::new(vec![
            Vertex::line(Point3::new(0.0, 0.0, 0.0)),
            Vertex::line(Point3::new(4.0, 0.0, 0.0)),
            Vertex::line(Point3::new(0.0, 3.0, 0.0)),
            Vertex::line(Point3::new(0.0, 0.0, 0.0)),
        ])
        .unwrap();
        let entity = Entity::new(Geometry::Polyline(polyline));
        assert!(entity.is_closed_region());
        assert!(entity.encloses_point(&Point3::new(1.0, 1.0, 0.0)));
        assert!(!entity.encloses_point(&Point3::new(3.0, 2.0, 0.0)));

        let bbox = entity.bounding_box();
        assert!(close_to(4.0, bbox.max.x));
        assert!(close_to(3.0, bbox.max.y));
    }

    #[test]
    fn test_equivalent_ignores_id() {
        let geometry = Geometry::Line {
            p1: Point3::origin(),
            p2: Point3::new(1.0, 1.0, 0.0),
        };
        let a = Entity::new(geometry.clone());
        let b = Entity::new(geometry);
        assert_ne!(a.id, b.id);
        assert!(a.equivalent_to(&b));
    }
}
