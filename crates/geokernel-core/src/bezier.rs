//! 三次贝塞尔曲线图元

use crate::ellipse::PrimitiveEllipse;
use crate::error::GeometryError;
use crate::math::{
    between, close_to_eps, cube_root, points_close, BoundingBox, Point3, Vector3, BEZIER_EPSILON,
    EPSILON,
};
use crate::primitive::{Primitive, PrimitiveLine};
use crate::properties::Color;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 简单图元近似的最大细分层数（最多 2^7 段）
const MAX_SPLIT_DEPTH: u32 = 7;

/// 三次贝塞尔曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveBezier {
    pub p1: Point3,
    pub p2: Point3,
    pub p3: Point3,
    pub p4: Point3,
    pub color: Option<Color>,
}

impl PrimitiveBezier {
    pub fn new(p1: Point3, p2: Point3, p3: Point3, p4: Point3) -> Self {
        Self {
            p1,
            p2,
            p3,
            p4,
            color: None,
        }
    }

    /// 设置颜色
    pub fn with_color(mut self, color: Option<Color>) -> Self {
        self.color = color;
        self
    }

    /// 参数 `t` 处的点
    pub fn point_at(&self, t: f64) -> Point3 {
        let s = 1.0 - t;
        let coords = self.p1.coords * (s * s * s)
            + self.p2.coords * (3.0 * s * s * t)
            + self.p3.coords * (3.0 * s * t * t)
            + self.p4.coords * (t * t * t);
        Point3::from(coords)
    }

    /// 按 de Casteljau 算法在 `t` 处一分为二
    pub fn split(&self, t: f64) -> Result<(Self, Self), GeometryError> {
        if !(0.0..=1.0).contains(&t) {
            return Err(GeometryError::ParameterOutOfRange(t));
        }

        let lerp = |a: &Point3, b: &Point3| a + (b - a) * t;
        let mid = self.point_at(t);
        let mid_control = lerp(&self.p2, &self.p3);

        let a2 = lerp(&self.p1, &self.p2);
        let a3 = lerp(&a2, &mid_control);
        let b3 = lerp(&self.p3, &self.p4);
        let b2 = lerp(&mid_control, &b3);

        Ok((
            Self::new(self.p1, a2, a3, mid).with_color(self.color),
            Self::new(mid, b2, b3, self.p4).with_color(self.color),
        ))
    }

    /// 求 `y(t) = 0` 的实根（Cardano 公式），不限制在 `[0, 1]`
    pub fn find_y_roots(&self) -> Vec<f64> {
        let (pa, pb, pc, pd) = (self.p1.y, self.p2.y, self.p3.y, self.p4.y);

        let d = -pa + 3.0 * pb - 3.0 * pc + pd;
        if d.abs() < EPSILON {
            // 退化为二次（或一次）方程
            let qa = 3.0 * pa - 6.0 * pb + 3.0 * pc;
            let qb = -3.0 * pa + 3.0 * pb;
            let qc = pa;
            if qa.abs() < EPSILON {
                return if qb.abs() < EPSILON {
                    Vec::new()
                } else {
                    vec![-qc / qb]
                };
            }
            let disc = qb * qb - 4.0 * qa * qc;
            if disc < 0.0 {
                return Vec::new();
            }
            let sq = disc.sqrt();
            return vec![(-qb + sq) / (2.0 * qa), (-qb - sq) / (2.0 * qa)];
        }

        let a = (3.0 * pa - 6.0 * pb + 3.0 * pc) / d;
        let b = (-3.0 * pa + 3.0 * pb) / d;
        let c = pa / d;

        let p = (3.0 * b - a * a) / 3.0;
        let p3 = p / 3.0;
        let q = (2.0 * a * a * a - 9.0 * a * b + 27.0 * c) / 27.0;
        let q2 = q / 2.0;
        let discriminant = q2 * q2 + p3 * p3 * p3;

        if discriminant < 0.0 {
            // 三个实根
            let mp3 = -p / 3.0;
            let r = (mp3 * mp3 * mp3).sqrt();
            let cos_phi = (-q / (2.0 * r)).clamp(-1.0, 1.0);
            let phi = cos_phi.acos();
            let t1 = 2.0 * cube_root(r);
            let tau = std::f64::consts::TAU;
            vec![
                t1 * (phi / 3.0).cos() - a / 3.0,
                t1 * ((phi + tau) / 3.0).cos() - a / 3.0,
                t1 * ((phi + 2.0 * tau) / 3.0).cos() - a / 3.0,
            ]
        } else if discriminant == 0.0 {
            // 三个实根，其中两个相同
            let u1 = if q2 < 0.0 { cube_root(-q2) } else { -cube_root(q2) };
            vec![2.0 * u1 - a / 3.0, -u1 - a / 3.0]
        } else {
            // 一个实根
            let sd = discriminant.sqrt();
            let u1 = cube_root(sd - q2);
            let v1 = cube_root(sd + q2);
            vec![u1 - v1 - a / 3.0]
        }
    }

    /// 曲线经过 `point` 时对应的参数，不经过则返回 `None`
    pub fn parameter_for_point(&self, point: &Point3) -> Option<f64> {
        let ys = [self.p2.y, self.p3.y, self.p4.y];
        if ys.iter().all(|&y| close_to_eps(self.p1.y, y, EPSILON)) {
            // 水平曲线 y(t) 恒定，改为求 x(t) = point.x
            if !close_to_eps(self.p1.y, point.y, BEZIER_EPSILON) {
                return None;
            }
            let shifted = self.swap_xy().move_by(&Vector3::new(0.0, -point.x, 0.0));
            return shifted
                .find_y_roots()
                .into_iter()
                .find(|&t| between(0.0, 1.0, t))
                .map(|t| t.clamp(0.0, 1.0))
                .or_else(|| points_close(&self.p1, point).then_some(0.0));
        }

        let shifted = self.move_by(&Vector3::new(0.0, -point.y, 0.0));
        shifted
            .find_y_roots()
            .into_iter()
            .filter(|&t| between(0.0, 1.0, t))
            .map(|t| t.clamp(0.0, 1.0))
            .find(|&t| close_to_eps(self.point_at(t).x, point.x, BEZIER_EPSILON))
    }

    /// 交换 x 与 y 坐标
    fn swap_xy(&self) -> Self {
        let swap = |p: &Point3| Point3::new(p.y, p.x, p.z);
        Self::new(swap(&self.p1), swap(&self.p2), swap(&self.p3), swap(&self.p4))
    }

    /// 平移
    pub fn move_by(&self, offset: &Vector3) -> Self {
        Self {
            p1: self.p1 + offset,
            p2: self.p2 + offset,
            p3: self.p3 + offset,
            p4: self.p4 + offset,
            color: self.color,
        }
    }

    /// 应用仿射变换（控制点变换即可）
    pub fn transform(&self, transform: &Transform) -> Self {
        Self {
            p1: transform.transform_point(&self.p1),
            p2: transform.transform_point(&self.p2),
            p3: transform.transform_point(&self.p3),
            p4: transform.transform_point(&self.p4),
            color: self.color,
        }
    }

    /// 控制点包围盒（包含曲线本身）
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points([self.p1, self.p2, self.p3, self.p4])
    }

    /// 用直线与圆弧逼近曲线，求交时使用
    ///
    /// 每个区间取中点：三点近似共线则用直线，否则用三点圆弧；
    /// 四分之一处和四分之三处的点都落在候选图元上时接受，否则继续二分。
    pub fn as_simple_primitives(&self) -> Vec<Primitive> {
        let mut result = Vec::new();
        let mut intervals = VecDeque::from([(0.0_f64, 1.0_f64, 0_u32)]);
        let z = Vector3::z();

        while let Some((start, end, depth)) = intervals.pop_front() {
            let spread = end - start;
            let mid = start + spread * 0.5;
            let p_start = self.point_at(start);
            let p_mid = self.point_at(mid);
            let p_end = self.point_at(end);

            let line = PrimitiveLine::new(p_start, p_end);
            let candidate = if line.is_point_on(&p_mid, BEZIER_EPSILON, true) {
                Primitive::Line(line)
            } else {
                match PrimitiveEllipse::three_point_arc(&p_start, &p_mid, &p_end, Some(&z)) {
                    Some(arc) => Primitive::Ellipse(arc),
                    None => Primitive::Line(line),
                }
            };

            let first_quarter = self.point_at(start + spread * 0.25);
            let third_quarter = self.point_at(start + spread * 0.75);
            if depth >= MAX_SPLIT_DEPTH
                || (candidate.is_point_on_primitive(&first_quarter, BEZIER_EPSILON)
                    && candidate.is_point_on_primitive(&third_quarter, BEZIER_EPSILON))
            {
                result.push(candidate.with_color(self.color));
            } else {
                intervals.push_back((start, mid, depth + 1));
                intervals.push_back((mid, end, depth + 1));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch() -> PrimitiveBezier {
        PrimitiveBezier::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        )
    }

    #[test]
    fn test_point_at_endpoints() {
        let b = arch();
        assert_eq!(b.point_at(0.0), b.p1);
        assert_eq!(b.point_at(1.0), b.p4);
        assert!(points_close(&b.point_at(0.5), &Point3::new(0.5, 0.75, 0.0)));
    }

    #[test]
    fn test_split_preserves_curve() {
        let b = arch();
        let (left, right) = b.split(0.5).unwrap();
        assert_eq!(left.p4, right.p1);
        assert!(points_close(&left.p4, &b.point_at(0.5)));
        assert!(points_close(&left.point_at(0.5), &b.point_at(0.25)));
        assert!(points_close(&right.point_at(0.5), &b.point_at(0.75)));
        assert_eq!(b.split(1.5), Err(GeometryError::ParameterOutOfRange(1.5)));
    }

    #[test]
    fn test_find_y_roots_symmetric() {
        let b = PrimitiveBezier::new(
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(3.0, -1.0, 0.0),
        );
        // y(t) 在两处穿过 0
        let roots: Vec<f64> = b.find_y_roots().into_iter().filter(|t| (0.0..=1.0).contains(t)).collect();
        assert_eq!(roots.len(), 2);
        for t in roots {
            assert!(b.point_at(t).y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_parameter_for_point() {
        let b = arch();
        let p = b.point_at(0.3);
        let t = b.parameter_for_point(&p).unwrap();
        assert!((t - 0.3).abs() < 1e-6);
        assert!(b.parameter_for_point(&Point3::new(5.0, 5.0, 0.0)).is_none());
    }

    #[test]
    fn test_parameter_for_point_on_horizontal_curve() {
        let b = PrimitiveBezier::new(
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(3.0, 2.0, 0.0),
        );
        assert_eq!(b.parameter_for_point(&b.p1), Some(0.0));
        let t = b.parameter_for_point(&Point3::new(1.5, 2.0, 0.0)).unwrap();
        assert!((t - 0.5).abs() < 1e-9);
        assert!(b.parameter_for_point(&Point3::new(1.5, 2.1, 0.0)).is_none());
        assert!(b.parameter_for_point(&Point3::new(4.0, 2.0, 0.0)).is_none());
        assert!(Primitive::Bezier(b.clone()).is_point_on_primitive(&b.p4, EPSILON));
    }

    #[test]
    fn test_simple_primitives_cover_endpoints() {
        let b = arch();
        let parts = b.as_simple_primitives();
        assert!(parts.len() > 1);

        let ends: Vec<Point3> = parts
            .iter()
            .flat_map(|p| [p.start_point(), p.end_point()])
            .collect();
        let near = |target: &Point3| ends.iter().any(|e| (e - target).norm() < 1e-9);
        assert!(near(&b.p1));
        assert!(near(&b.p4));
    }

    #[test]
    fn test_straight_curve_is_single_line() {
        let b = PrimitiveBezier::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        );
        let parts = b.as_simple_primitives();
        assert_eq!(parts.len(), 1);
        assert!(matches!(parts[0], Primitive::Line(_)));
    }
}
