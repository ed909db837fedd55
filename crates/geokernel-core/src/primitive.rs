//! 几何图元定义
//!
//! 图元是渲染与求交使用的基本几何形状，与更高层的实体（[`crate::entity`]）区分：
//! 一个实体可以分解为若干图元。
//!
//! 支持的图元：
//! - 线段 (Line)
//! - 椭圆/圆弧/圆 (Ellipse)
//! - 点 (Point)
//! - 文本框 (Text)
//! - 三次贝塞尔曲线 (Bezier)

use crate::bezier::PrimitiveBezier;
use crate::ellipse::PrimitiveEllipse;
use crate::math::{
    between, close_to, points_close_eps, vector_angle_degrees, vectors_close_eps, BoundingBox,
    Point3, Vector3, EPSILON, MIN_CONNECTOR_LENGTH_SQUARED,
};
use crate::properties::Color;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};

/// 每个字符宽度约为字高的 77%
const TEXT_WIDTH_FACTOR: f64 = 0.77;

/// 默认的完整椭圆采样段数
pub const DEFAULT_ARC_SEGMENTS: usize = 360;

/// 图元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Line,
    Ellipse,
    Point,
    Text,
    Bezier,
}

/// 线段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveLine {
    pub p1: Point3,
    pub p2: Point3,
    pub color: Option<Color>,
}

impl PrimitiveLine {
    pub fn new(p1: Point3, p2: Point3) -> Self {
        Self { p1, p2, color: None }
    }

    /// 设置颜色
    pub fn with_color(mut self, color: Option<Color>) -> Self {
        self.color = color;
        self
    }

    pub fn length_squared(&self) -> f64 {
        (self.p2 - self.p1).norm_squared()
    }

    pub fn length(&self) -> f64 {
        (self.p2 - self.p1).norm()
    }

    /// 长度近似为零
    pub fn is_point(&self) -> bool {
        self.length_squared() <= EPSILON
    }

    pub fn mid_point(&self) -> Point3 {
        nalgebra::center(&self.p1, &self.p2)
    }

    /// XY平面上的斜率；竖直线返回 NaN
    pub fn slope(&self) -> f64 {
        let denom = self.p2.x - self.p1.x;
        if denom == 0.0 {
            f64::NAN
        } else {
            (self.p2.y - self.p1.y) / denom
        }
    }

    /// 垂线斜率；水平线返回 NaN，竖直线返回 0
    pub fn perpendicular_slope(&self) -> f64 {
        let slope = self.slope();
        if slope.is_nan() {
            0.0
        } else if slope == 0.0 {
            f64::NAN
        } else {
            -1.0 / slope
        }
    }

    /// 线段（或其所在直线）上距 `point` 最近的点
    pub fn closest_point(&self, point: &Point3, within_bounds: bool) -> Point3 {
        let wv = self.p2 - self.p1;
        let l2 = wv.norm_squared();
        if l2.abs() < EPSILON {
            return self.p1;
        }
        let mut t = (point - self.p1).dot(&wv) / l2;
        if within_bounds {
            t = t.clamp(-EPSILON, 1.0 + EPSILON);
        }
        self.p1 + wv * t
    }

    /// 两条直线的三维交点（最近点法）
    ///
    /// 求两条无限直线间最短连线的参数 `mua`、`mub`；
    /// 线段退化、两线平行、或最短连线长度超过阈值时返回 `None`。
    /// `within_segment` 为真时两个参数都必须位于 `[0, 1]`。
    pub fn intersection_point(&self, other: &PrimitiveLine, within_segment: bool) -> Option<Point3> {
        let (p1, p2, p3, p4) = (self.p1, self.p2, other.p1, other.p2);
        let p13 = p1 - p3;
        let p43 = p4 - p3;
        if p43.norm_squared() < EPSILON {
            return None;
        }
        let p21 = p2 - p1;
        if p21.norm_squared() < EPSILON {
            return None;
        }

        let d1343 = p13.dot(&p43);
        let d4321 = p43.dot(&p21);
        let d1321 = p13.dot(&p21);
        let d4343 = p43.dot(&p43);
        let d2121 = p21.dot(&p21);

        let denom = d2121 * d4343 - d4321 * d4321;
        if denom.abs() < EPSILON {
            return None;
        }

        let mua = (d1343 * d4321 - d1321 * d4343) / denom;
        let mub = (d1343 + d4321 * mua) / d4343;

        if within_segment && (!between(0.0, 1.0, mua) || !between(0.0, 1.0, mub)) {
            return None;
        }

        let a = p1 + p21 * mua;
        let b = p3 + p43 * mub;
        if (a - b).norm_squared() > MIN_CONNECTOR_LENGTH_SQUARED {
            return None;
        }

        Some(nalgebra::center(&a, &b))
    }

    /// 点是否位于线段（或直线）上
    pub fn is_point_on(&self, point: &Point3, epsilon: f64, within_segment: bool) -> bool {
        if *point == self.p1 {
            return true;
        }
        let line_vector = self.p2 - self.p1;
        let point_vector = point - self.p1;
        vectors_close_eps(&line_vector.normalize(), &point_vector.normalize(), epsilon)
            && (!within_segment
                || between(0.0, line_vector.norm_squared(), point_vector.norm_squared()))
    }

    pub fn transform(&self, transform: &Transform) -> Self {
        Self {
            p1: transform.transform_point(&self.p1),
            p2: transform.transform_point(&self.p2),
            color: self.color,
        }
    }

    pub fn move_by(&self, offset: &Vector3) -> Self {
        Self {
            p1: self.p1 + offset,
            p2: self.p2 + offset,
            color: self.color,
        }
    }
}

/// 点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitivePoint {
    pub location: Point3,
    pub color: Option<Color>,
}

impl PrimitivePoint {
    pub fn new(location: Point3) -> Self {
        Self {
            location,
            color: None,
        }
    }
}

/// 文本框
///
/// 几何上只关心其外接矩形：宽度按字符数估算。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveText {
    pub value: String,
    pub location: Point3,
    pub height: f64,
    pub normal: Vector3,
    /// 旋转角（度）
    pub rotation: f64,
    pub color: Option<Color>,
}

impl PrimitiveText {
    pub fn new(value: impl Into<String>, location: Point3, height: f64, normal: Vector3, rotation: f64) -> Self {
        Self {
            value: value.into(),
            location,
            height,
            normal,
            rotation,
            color: None,
        }
    }

    pub fn width(&self) -> f64 {
        self.value.chars().count() as f64 * self.height * TEXT_WIDTH_FACTOR
    }

    /// 基线方向（单位向量）
    fn right(&self) -> Vector3 {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        Vector3::new(cos, sin, 0.0)
    }

    /// 字高方向（单位向量）
    fn up(&self) -> Vector3 {
        self.normal.cross(&self.right()).normalize()
    }

    /// 外接矩形的四个角，首尾闭合
    pub fn corners(&self) -> [Point3; 5] {
        let right = self.right() * self.width();
        let up = self.up() * self.height;
        let l = self.location;
        [l, l + right, l + right + up, l + up, l]
    }

    /// 点是否位于文本框内（同一平面）
    pub fn contains(&self, point: &Point3) -> bool {
        let v = point - self.location;
        let normal = self.normal.normalize();
        if !close_to(0.0, v.dot(&normal)) {
            return false;
        }
        between(0.0, self.width(), v.dot(&self.right())) && between(0.0, self.height, v.dot(&self.up()))
    }

    pub fn transform(&self, transform: &Transform) -> Self {
        let right = transform.transform_vector(&self.right());
        let up = transform.transform_vector(&(self.up() * self.height));
        Self {
            value: self.value.clone(),
            location: transform.transform_point(&self.location),
            height: up.norm(),
            normal: transform.transform_vector(&self.normal).normalize(),
            rotation: vector_angle_degrees(&right),
            color: self.color,
        }
    }
}

/// 几何图元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Line(PrimitiveLine),
    Ellipse(PrimitiveEllipse),
    Point(PrimitivePoint),
    Text(PrimitiveText),
    Bezier(PrimitiveBezier),
}

impl Primitive {
    /// 获取图元类型
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Line(_) => PrimitiveKind::Line,
            Primitive::Ellipse(_) => PrimitiveKind::Ellipse,
            Primitive::Point(_) => PrimitiveKind::Point,
            Primitive::Text(_) => PrimitiveKind::Text,
            Primitive::Bezier(_) => PrimitiveKind::Bezier,
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self {
            Primitive::Line(l) => l.color,
            Primitive::Ellipse(e) => e.color,
            Primitive::Point(p) => p.color,
            Primitive::Text(t) => t.color,
            Primitive::Bezier(b) => b.color,
        }
    }

    /// 设置颜色
    pub fn with_color(mut self, color: Option<Color>) -> Self {
        match &mut self {
            Primitive::Line(l) => l.color = color,
            Primitive::Ellipse(e) => e.color = color,
            Primitive::Point(p) => p.color = color,
            Primitive::Text(t) => t.color = color,
            Primitive::Bezier(b) => b.color = color,
        }
        self
    }

    /// 起点；文本为插入点
    pub fn start_point(&self) -> Point3 {
        match self {
            Primitive::Line(l) => l.p1,
            Primitive::Ellipse(e) => e.start_point(),
            Primitive::Point(p) => p.location,
            Primitive::Text(t) => t.location,
            Primitive::Bezier(b) => b.p1,
        }
    }

    /// 终点；文本为基线末端
    pub fn end_point(&self) -> Point3 {
        match self {
            Primitive::Line(l) => l.p2,
            Primitive::Ellipse(e) => e.end_point(),
            Primitive::Point(p) => p.location,
            Primitive::Text(t) => t.corners()[1],
            Primitive::Bezier(b) => b.p4,
        }
    }

    /// 中点；文本为外接矩形中心，贝塞尔曲线取 `t = 0.5`
    pub fn mid_point(&self) -> Point3 {
        match self {
            Primitive::Line(l) => l.mid_point(),
            Primitive::Ellipse(e) => e.mid_point(),
            Primitive::Point(p) => p.location,
            Primitive::Text(t) => {
                let c = t.corners();
                nalgebra::center(&c[0], &c[2])
            }
            Primitive::Bezier(b) => b.point_at(0.5),
        }
    }

    /// 足以近似/包围图元形状的顶点（圆弧按 360 段采样）
    pub fn interesting_points(&self) -> Vec<Point3> {
        self.interesting_points_with(DEFAULT_ARC_SEGMENTS)
    }

    /// 同 [`interesting_points`](Self::interesting_points)，指定完整椭圆的采样段数
    pub fn interesting_points_with(&self, arc_segments: usize) -> Vec<Point3> {
        match self {
            Primitive::Line(l) => vec![l.p1, l.p2],
            Primitive::Ellipse(e) => e.interesting_points(arc_segments),
            Primitive::Point(p) => vec![p.location],
            Primitive::Text(t) => t.corners().to_vec(),
            Primitive::Bezier(b) => vec![b.p1, b.p2, b.p3, b.p4],
        }
    }

    /// 包围盒（由关键点计算）
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.interesting_points())
    }

    /// 平移
    pub fn move_by(&self, offset: &Vector3) -> Primitive {
        match self {
            Primitive::Line(l) => Primitive::Line(l.move_by(offset)),
            Primitive::Ellipse(e) => Primitive::Ellipse(e.move_by(offset)),
            Primitive::Point(p) => Primitive::Point(PrimitivePoint {
                location: p.location + offset,
                color: p.color,
            }),
            Primitive::Text(t) => Primitive::Text(PrimitiveText {
                location: t.location + offset,
                ..t.clone()
            }),
            Primitive::Bezier(b) => Primitive::Bezier(b.move_by(offset)),
        }
    }

    /// 应用 4×4 仿射变换
    pub fn transform(&self, transform: &Transform) -> Primitive {
        match self {
            Primitive::Line(l) => Primitive::Line(l.transform(transform)),
            Primitive::Ellipse(e) => Primitive::Ellipse(e.transform(transform)),
            Primitive::Point(p) => Primitive::Point(PrimitivePoint {
                location: transform.transform_point(&p.location),
                color: p.color,
            }),
            Primitive::Text(t) => Primitive::Text(t.transform(transform)),
            Primitive::Bezier(b) => Primitive::Bezier(b.transform(transform)),
        }
    }

    /// 点是否位于图元上
    pub fn is_point_on_primitive(&self, point: &Point3, epsilon: f64) -> bool {
        match self {
            Primitive::Line(l) => l.is_point_on(point, epsilon, true),
            Primitive::Ellipse(e) => e.is_point_on(point, epsilon),
            Primitive::Point(p) => points_close_eps(&p.location, point, epsilon),
            Primitive::Text(t) => t.contains(point),
            Primitive::Bezier(b) => b.parameter_for_point(point).is_some(),
        }
    }
}

impl From<PrimitiveLine> for Primitive {
    fn from(line: PrimitiveLine) -> Self {
        Primitive::Line(line)
    }
}

impl From<PrimitiveEllipse> for Primitive {
    fn from(ellipse: PrimitiveEllipse) -> Self {
        Primitive::Ellipse(ellipse)
    }
}

impl From<PrimitivePoint> for Primitive {
    fn from(point: PrimitivePoint) -> Self {
        Primitive::Point(point)
    }
}

impl From<PrimitiveText> for Primitive {
    fn from(text: PrimitiveText) -> Self {
        Primitive::Text(text)
    }
}

impl From<PrimitiveBezier> for Primitive {
    fn from(bezier: PrimitiveBezier) -> Self {
        Primitive::Bezier(bezier)
    }
}

/// 所有图元关键点中最大的 X 坐标
pub(crate) fn max_x(primitives: &[Primitive]) -> Option<f64> {
    primitives
        .iter()
        .flat_map(|p| p.interesting_points())
        .map(|p| p.x)
        .reduce(f64::max)
}
