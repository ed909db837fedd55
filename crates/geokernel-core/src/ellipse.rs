//! 椭圆与圆弧图元
//!
//! 圆、圆弧、椭圆、椭圆弧统一由 [`PrimitiveEllipse`] 表示：
//! - 圆：`minor_axis_ratio == 1`，角度范围 `[0, 360]`
//! - 圆弧：`minor_axis_ratio == 1`，角度范围为部分区间
//!
//! 角度单位为度，从长轴方向起逆时针（绕法向量）度量。
//! `end_angle` 可以小于 `start_angle`，表示圆弧跨过 0°。

use crate::bezier::PrimitiveBezier;
use crate::error::GeometryError;
use crate::math::{
    between, close_to, close_to_eps, correct_angle_degrees, is_close_to_zero, points_close,
    right_vector_from_normal, vector_angle_degrees, vectors_close_eps, Point3, Vector3, EPSILON,
    ONE_EIGHTY, THREE_SIXTY,
};
use crate::polyline::VertexDirection;
use crate::primitive::PrimitiveLine;
use crate::properties::Color;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};

/// 用四段三次贝塞尔曲线逼近四分之一椭圆的控制点系数
pub const BEZIER_CONSTANT: f64 = 0.551915024494;

/// 椭圆（弧）图元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveEllipse {
    pub center: Point3,
    /// 长轴向量（长度即长半轴）
    pub major_axis: Vector3,
    pub normal: Vector3,
    /// 短半轴与长半轴之比
    pub minor_axis_ratio: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub color: Option<Color>,
}

impl PrimitiveEllipse {
    /// 创建椭圆（弧）
    pub fn new(
        center: Point3,
        major_axis: Vector3,
        normal: Vector3,
        minor_axis_ratio: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> Self {
        Self {
            center,
            major_axis,
            normal,
            minor_axis_ratio,
            start_angle,
            end_angle,
            color: None,
        }
    }

    /// 创建圆
    pub fn circle(center: Point3, radius: f64, normal: Vector3) -> Self {
        Self::arc(center, radius, 0.0, THREE_SIXTY, normal)
    }

    /// 创建圆弧
    pub fn arc(center: Point3, radius: f64, start_angle: f64, end_angle: f64, normal: Vector3) -> Self {
        let major_axis = right_vector_from_normal(&normal) * radius;
        Self::new(center, major_axis, normal, 1.0, start_angle, end_angle)
    }

    /// 创建XY平面上长轴水平的完整椭圆
    pub fn ellipse_2d(center: Point3, a: f64, b: f64) -> Self {
        Self::new(center, Vector3::new(a, 0.0, 0.0), Vector3::z(), b / a, 0.0, THREE_SIXTY)
    }

    /// 设置颜色
    pub fn with_color(mut self, color: Option<Color>) -> Self {
        self.color = color;
        self
    }

    /// 设置角度范围
    pub fn with_angles(mut self, start_angle: f64, end_angle: f64) -> Self {
        self.start_angle = start_angle;
        self.end_angle = end_angle;
        self
    }

    /// 长半轴
    pub fn major_radius(&self) -> f64 {
        self.major_axis.norm()
    }

    /// 短半轴
    pub fn minor_radius(&self) -> f64 {
        self.major_radius() * self.minor_axis_ratio
    }

    /// 短轴向量（位于平面内，垂直于长轴）
    pub fn minor_axis(&self) -> Vector3 {
        self.normal.cross(&self.major_axis).normalize() * self.minor_radius()
    }

    /// 角度范围是否为完整的 `[0, 360]`
    pub fn is_closed(&self) -> bool {
        close_to(0.0, self.start_angle) && close_to(THREE_SIXTY, self.end_angle)
    }

    pub fn is_circular(&self) -> bool {
        close_to(1.0, self.minor_axis_ratio)
    }

    pub fn is_circle(&self) -> bool {
        self.is_circular() && self.is_closed()
    }

    /// 长半轴或短半轴为零
    pub fn is_degenerate(&self) -> bool {
        self.major_radius() < EPSILON || self.minor_radius().abs() < EPSILON
    }

    /// 扫过的角度，范围 `(0, 360]`
    pub fn included_angle(&self) -> f64 {
        let mut end = self.end_angle;
        if end < self.start_angle {
            end += THREE_SIXTY;
        }
        end - self.start_angle
    }

    /// 把XY平面上的单位圆映射为本椭圆的变换
    pub fn from_unit_circle(&self) -> Transform {
        let right = self.major_axis.normalize();
        let up = self.normal.cross(&right).normalize();
        let radius_x = self.major_radius();
        Transform::from_unit_circle_projection(
            &self.normal.normalize(),
            &right,
            &up,
            &self.center,
            radius_x,
            radius_x * self.minor_axis_ratio,
            1.0,
        )
    }

    /// [`from_unit_circle`](Self::from_unit_circle) 的逆变换；退化椭圆返回 `None`
    pub fn to_unit_circle(&self) -> Option<Transform> {
        if self.is_degenerate() || is_close_to_zero(&self.normal) {
            return None;
        }
        self.from_unit_circle().inverse()
    }

    /// 角度是否位于 `[start_angle, end_angle]` 内（处理跨越 0° 的情况）
    pub fn is_angle_contained(&self, angle: f64) -> bool {
        let angle = correct_angle_degrees(angle);
        let start = self.start_angle;
        let end = self.end_angle;
        if end < start {
            between(start, THREE_SIXTY, angle) || between(0.0, end, angle)
        } else {
            between(start, end, angle) || between(start, end, angle + THREE_SIXTY)
        }
    }

    /// 点在单位圆坐标系中的方向角
    pub fn get_angle(&self, point: &Point3) -> Option<f64> {
        let unit = self.to_unit_circle()?.transform_point(point);
        Some(vector_angle_degrees(&unit.coords))
    }

    /// 指定角度处的点
    pub fn get_point(&self, angle: f64) -> Point3 {
        let (sin, cos) = angle.to_radians().sin_cos();
        self.from_unit_circle()
            .transform_point(&Point3::new(cos, sin, 0.0))
    }

    pub fn start_point(&self) -> Point3 {
        self.get_point(self.start_angle)
    }

    pub fn end_point(&self) -> Point3 {
        self.get_point(self.end_angle)
    }

    pub fn mid_point(&self) -> Point3 {
        self.get_point(self.start_angle + self.included_angle() * 0.5)
    }

    /// 按角度步进的折线顶点，完整椭圆使用 `max_segments` 段
    pub fn interesting_points(&self, max_segments: usize) -> Vec<Point3> {
        let max_segments = max_segments.max(1);
        let sweep = self.included_angle();
        let delta = THREE_SIXTY / max_segments as f64;
        let vertex_count = ((sweep / THREE_SIXTY) * max_segments as f64).ceil() as usize;

        let transform = self.from_unit_circle();
        let mut points = Vec::with_capacity(vertex_count + 1);
        for i in 0..vertex_count {
            let (sin, cos) = (self.start_angle + delta * i as f64).to_radians().sin_cos();
            points.push(transform.transform_point(&Point3::new(cos, sin, 0.0)));
        }
        points.push(self.get_point(self.start_angle + sweep));
        points
    }

    /// 应用仿射变换
    ///
    /// 长轴与短轴分别变换，法向量与轴比由变换后的轴重新计算。
    pub fn transform(&self, transform: &Transform) -> Self {
        let major = transform.transform_vector(&self.major_axis);
        let minor = transform.transform_vector(&self.minor_axis());
        let major_length = major.norm();
        let ratio = if major_length < EPSILON {
            self.minor_axis_ratio
        } else {
            minor.norm() / major_length
        };
        let normal = major.cross(&minor);
        let normal = if is_close_to_zero(&normal) {
            transform.transform_vector(&self.normal).normalize()
        } else {
            normal.normalize()
        };

        Self {
            center: transform.transform_point(&self.center),
            major_axis: major,
            normal,
            minor_axis_ratio: ratio,
            start_angle: self.start_angle,
            end_angle: self.end_angle,
            color: self.color,
        }
    }

    /// 平移
    pub fn move_by(&self, offset: &Vector3) -> Self {
        Self {
            center: self.center + offset,
            ..self.clone()
        }
    }

    /// 点是否位于椭圆（弧）上
    pub fn is_point_on(&self, point: &Point3, epsilon: f64) -> bool {
        let Some(to_unit) = self.to_unit_circle() else {
            return false;
        };
        let unit = to_unit.transform_point(point);
        close_to(0.0, unit.z)
            && close_to_eps(1.0, unit.x * unit.x + unit.y * unit.y, epsilon)
            && self.is_angle_contained(vector_angle_degrees(&unit.coords))
    }

    /// 以四段贝塞尔曲线表示（忽略角度范围）
    pub fn as_bezier_curves(&self) -> [PrimitiveBezier; 4] {
        let c = self.center;
        let major = self.major_axis;
        let minor = self.minor_axis();
        let major_scaled = major * BEZIER_CONSTANT;
        let minor_scaled = minor * BEZIER_CONSTANT;
        [
            PrimitiveBezier::new(c + major, c + major + minor_scaled, c + minor + major_scaled, c + minor),
            PrimitiveBezier::new(c + minor, c + minor - major_scaled, c - major + minor_scaled, c - major),
            PrimitiveBezier::new(c - major, c - major - minor_scaled, c - minor - major_scaled, c - minor),
            PrimitiveBezier::new(c - minor, c - minor + major_scaled, c + major - minor_scaled, c + major),
        ]
    }

    /// 过三点的圆；三点共线时返回 `None`
    ///
    /// 若计算出的法向量与 `ideal_normal` 相反，则采用 `ideal_normal`。
    pub fn three_point_circle(
        a: &Point3,
        b: &Point3,
        c: &Point3,
        ideal_normal: Option<&Vector3>,
    ) -> Option<Self> {
        let v1 = a - b;
        let v2 = c - b;
        let normal = v1.cross(&v2);
        if is_close_to_zero(&normal) {
            return None;
        }
        let mut normal = normal.normalize();

        // 两条弦的中垂线交点即圆心
        let m1 = v1.cross(&normal);
        let m2 = v2.cross(&normal);
        let b1 = nalgebra::center(a, b);
        let b2 = nalgebra::center(c, b);
        let bisector1 = PrimitiveLine::new(b1, b1 + m1);
        let bisector2 = PrimitiveLine::new(b2, b2 + m2);
        let center = bisector1.intersection_point(&bisector2, false)?;

        if let Some(ideal) = ideal_normal {
            if vectors_close_eps(ideal, &(-normal), EPSILON) {
                normal = *ideal;
            }
        }

        Some(Self::circle(center, (a - center).norm(), normal))
    }

    /// 以 `a` 和 `c` 为端点并经过 `b` 的圆弧；三点共线时返回 `None`
    pub fn three_point_arc(
        a: &Point3,
        b: &Point3,
        c: &Point3,
        ideal_normal: Option<&Vector3>,
    ) -> Option<Self> {
        let circle = Self::three_point_circle(a, b, c, ideal_normal)?;
        let mut start = circle.get_angle(a)?;
        let mid = circle.get_angle(b)?;
        let mut end = circle.get_angle(c)?;

        let mut real_mid = mid;
        while real_mid < start {
            real_mid += THREE_SIXTY;
        }
        let mut real_end = end;
        while real_end < start {
            real_end += THREE_SIXTY;
        }
        if real_mid > real_end {
            std::mem::swap(&mut start, &mut end);
        }

        Some(circle.with_angles(start, end))
    }

    /// 由两个端点、圆心角和方向构造XY平面上的圆弧
    pub fn arc_from_points_and_included_angle(
        p1: &Point3,
        p2: &Point3,
        included_angle: f64,
        direction: VertexDirection,
    ) -> Result<Self, GeometryError> {
        if p1.z != p2.z {
            return Err(GeometryError::NonPlanarArc);
        }
        if !(0.0..THREE_SIXTY).contains(&included_angle) {
            return Err(GeometryError::IncludedAngleOutOfRange(included_angle));
        }
        // 端点重合或圆心角为零时半径无定义
        if points_close(p1, p2) || close_to(included_angle, 0.0) {
            return Err(GeometryError::DegenerateArc);
        }

        // 弦长一半与半径构成直角三角形：r = (c/2) / sin(θ/2)
        let half_angle = included_angle.to_radians() / 2.0;
        let half_chord = (p2 - p1).norm() / 2.0;
        let radius = half_chord / half_angle.sin();

        // 弦中点沿垂线偏移 x 到达弧上的点
        let midpoint = nalgebra::center(p1, p2);
        let mut offset = radius - (radius * radius - half_chord * half_chord).max(0.0).sqrt();
        if included_angle >= ONE_EIGHTY {
            offset = radius + radius - offset;
        }

        let chord = p2 - p1;
        let offset_vector = Vector3::new(-chord.y, chord.x, chord.z).normalize() * offset;
        let z = Vector3::z();

        let first = Self::three_point_arc(p1, &(midpoint + offset_vector), p2, Some(&z))
            .ok_or(GeometryError::DegenerateArc)?;
        let start = first.start_point();
        let starts_at_p1 = (start - p1).norm_squared() <= (start - p2).norm_squared();
        if starts_at_p1 ^ (direction != VertexDirection::CounterClockwise) {
            return Ok(first);
        }

        Self::three_point_arc(p1, &(midpoint - offset_vector), p2, Some(&z))
            .ok_or(GeometryError::DegenerateArc)
    }
}
