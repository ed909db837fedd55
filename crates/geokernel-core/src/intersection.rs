//! 图元求交
//!
//! [`intersection_points`] 是所有两两求交的唯一入口，按图元类型对分派到解析求解器：
//!
//! | 组合 | 方法 |
//! |------|------|
//! | 直线-直线 | 三维最近点法 |
//! | 直线-椭圆 | 变换到单位圆坐标系后解二次方程，或求直线与椭圆平面的交点 |
//! | 椭圆-椭圆 | 共面时在第一个椭圆的单位圆坐标系中求解；不共面时先求两平面的交线 |
//! | 点-任意 | 点在图元上的判定 |
//! | 贝塞尔-任意 | 先分解为直线与圆弧 |
//!
//! 文本不参与求交。`within_bounds` 为真时只保留同时位于两个图元有限范围内的交点，
//! 否则直线视为无限长、椭圆弧视为完整椭圆。

use crate::bezier::PrimitiveBezier;
use crate::ellipse::PrimitiveEllipse;
use crate::math::{
    between, close_to, close_to_eps, dedup_points, is_close_to_zero, points_close, round_point,
    trig_table, vector_angle_degrees, Point3, Rounded, Vector3, COINCIDENCE_EPSILON, EPSILON,
};
use crate::primitive::{Primitive, PrimitiveLine};
use crate::transform::Transform;

/// 通用椭圆扫描找到变号区间后的二分次数
const BISECTION_STEPS: usize = 60;

/// 计算两个图元的交点
///
/// 结果已去重，顺序不作保证。退化输入（零长度直线按点处理，零半径椭圆无交点）
/// 返回空集而不是错误。
pub fn intersection_points(a: &Primitive, b: &Primitive, within_bounds: bool) -> Vec<Point3> {
    let points = match (a, b) {
        (Primitive::Text(_), _) | (_, Primitive::Text(_)) => Vec::new(),
        (Primitive::Bezier(bezier), other) | (other, Primitive::Bezier(bezier)) => {
            bezier_intersections(bezier, other, within_bounds)
        }
        (Primitive::Line(line), other) | (other, Primitive::Line(line)) if line.is_point() => {
            point_intersections(&line.p1, other, within_bounds)
        }
        (Primitive::Point(point), other) | (other, Primitive::Point(point)) => {
            point_intersections(&point.location, other, within_bounds)
        }
        (Primitive::Line(first), Primitive::Line(second)) => {
            first.intersection_point(second, within_bounds).into_iter().collect()
        }
        (Primitive::Line(line), Primitive::Ellipse(ellipse))
        | (Primitive::Ellipse(ellipse), Primitive::Line(line)) => {
            line_ellipse_intersections(line, ellipse, within_bounds)
        }
        (Primitive::Ellipse(first), Primitive::Ellipse(second)) => {
            ellipse_ellipse_intersections(first, second, within_bounds)
        }
    };

    dedup_points(points)
}

/// 贝塞尔曲线按分段近似求交
///
/// 近似段始终限制在自身范围内，`within_bounds` 只影响另一个图元。
fn bezier_intersections(bezier: &PrimitiveBezier, other: &Primitive, within_bounds: bool) -> Vec<Point3> {
    bezier
        .as_simple_primitives()
        .iter()
        .flat_map(|part| {
            if within_bounds {
                intersection_points(part, other, true)
            } else {
                intersection_points(part, other, false)
                    .into_iter()
                    .filter(|p| lies_within_part(part, p))
                    .collect()
            }
        })
        .collect()
}

/// 已知位于近似段所在直线（完整椭圆）上的点是否落在该段范围内
fn lies_within_part(part: &Primitive, point: &Point3) -> bool {
    match part {
        Primitive::Line(line) => {
            let direction = line.p2 - line.p1;
            let length_squared = direction.norm_squared();
            if length_squared < EPSILON {
                return points_close(&line.p1, point);
            }
            let t = (point - line.p1).dot(&direction) / length_squared;
            t >= -COINCIDENCE_EPSILON && t <= 1.0 + COINCIDENCE_EPSILON
        }
        Primitive::Ellipse(ellipse) => ellipse
            .get_angle(point)
            .is_some_and(|angle| ellipse.is_angle_contained(angle)),
        Primitive::Point(_) | Primitive::Text(_) | Primitive::Bezier(_) => true,
    }
}

/// 点与任意图元：点在图元上时返回该点
fn point_intersections(point: &Point3, other: &Primitive, within_bounds: bool) -> Vec<Point3> {
    let on = match other {
        Primitive::Line(line) if line.is_point() => points_close(&line.p1, point),
        Primitive::Line(line) => line.is_point_on(point, EPSILON, within_bounds),
        Primitive::Ellipse(ellipse) => is_point_on_ellipse(ellipse, point, within_bounds),
        Primitive::Point(p) => points_close(&p.location, point),
        Primitive::Text(_) => false,
        Primitive::Bezier(bezier) => bezier.parameter_for_point(point).is_some(),
    };

    if on {
        vec![*point]
    } else {
        Vec::new()
    }
}

fn is_point_on_ellipse(ellipse: &PrimitiveEllipse, point: &Point3, within_bounds: bool) -> bool {
    let Some(to_unit) = ellipse.to_unit_circle() else {
        return false;
    };
    let unit = to_unit.transform_point(point);
    close_to(0.0, unit.z)
        && close_to(1.0, unit.x * unit.x + unit.y * unit.y)
        && (!within_bounds || ellipse.is_angle_contained(vector_angle_degrees(&unit.coords)))
}

/// 直线与椭圆
pub fn line_ellipse_intersections(
    line: &PrimitiveLine,
    ellipse: &PrimitiveEllipse,
    within_bounds: bool,
) -> Vec<Point3> {
    let Some(to_unit) = ellipse.to_unit_circle() else {
        return Vec::new();
    };
    let from_unit = ellipse.from_unit_circle();
    let normal = ellipse.normal.normalize();
    let direction = line.p2 - line.p1;

    let coplanar = close_to_eps(0.0, direction.normalize().dot(&normal), COINCIDENCE_EPSILON)
        && close_to_eps(0.0, (line.p1 - ellipse.center).dot(&normal), COINCIDENCE_EPSILON);

    if coplanar {
        let p1 = to_unit.transform_point(&line.p1);
        let p2 = to_unit.transform_point(&line.p2);
        unit_circle_line_points(&p1, &p2)
            .into_iter()
            .filter(|p| {
                !within_bounds
                    || (between(p1.x, p2.x, p.x)
                        && between(p1.y, p2.y, p.y)
                        && ellipse.is_angle_contained(vector_angle_degrees(&p.coords)))
            })
            .map(|p| from_unit.transform_point(&p))
            .collect()
    } else {
        // 直线穿过椭圆平面的唯一交点
        let denom = direction.dot(&normal);
        if denom.abs() < EPSILON {
            return Vec::new();
        }
        let d = (ellipse.center - line.p1).dot(&normal) / denom;
        if within_bounds && !between(0.0, 1.0, d) {
            return Vec::new();
        }

        let point = line.p1 + direction * d;
        let unit = to_unit.transform_point(&point);
        let on_ellipse = close_to(1.0, unit.coords.norm())
            && (!within_bounds || ellipse.is_angle_contained(vector_angle_degrees(&unit.coords)));
        if on_ellipse {
            vec![point]
        } else {
            Vec::new()
        }
    }
}

/// XY平面上无限直线与单位圆的交点（0、1 或 2 个）
fn unit_circle_line_points(p1: &Point3, p2: &Point3) -> Vec<Point3> {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let dr2 = dx * dx + dy * dy;
    if dr2 < EPSILON {
        return Vec::new();
    }

    let d = p1.x * p2.y - p2.x * p1.y;
    let det = dr2 - d * d;

    if close_to(0.0, det) {
        // 相切
        return vec![Point3::new(d * dy / dr2, -d * dx / dr2, 0.0)];
    }
    if det < 0.0 {
        return Vec::new();
    }

    let sqrt_det = det.sqrt();
    let sgn = if dy < 0.0 { -1.0 } else { 1.0 };
    vec![
        Point3::new(
            (d * dy + sgn * dx * sqrt_det) / dr2,
            (-d * dx + dy.abs() * sqrt_det) / dr2,
            0.0,
        ),
        Point3::new(
            (d * dy - sgn * dx * sqrt_det) / dr2,
            (-d * dx - dy.abs() * sqrt_det) / dr2,
            0.0,
        ),
    ]
}

/// 椭圆与椭圆
pub fn ellipse_ellipse_intersections(
    first: &PrimitiveEllipse,
    second: &PrimitiveEllipse,
    within_bounds: bool,
) -> Vec<Point3> {
    if first.to_unit_circle().is_none() || second.to_unit_circle().is_none() {
        return Vec::new();
    }

    let n1 = first.normal.normalize();
    let n2 = second.normal.normalize();

    let candidates = if is_close_to_zero(&n1.cross(&n2)) {
        let same_plane = first.center == second.center
            || close_to_eps(0.0, (second.center - first.center).dot(&n1), COINCIDENCE_EPSILON);
        if !same_plane {
            return Vec::new();
        }
        coplanar_ellipse_points(first, second)
    } else {
        skew_plane_ellipse_points(first, second)
    };

    let points = candidates
        .into_iter()
        .filter(|p| p.iter().all(|c| c.is_finite()))
        .map(|p| round_point(&p))
        .filter(|p| {
            !within_bounds || (angle_contained_at(first, p) && angle_contained_at(second, p))
        });

    dedup_points(points)
}

fn angle_contained_at(ellipse: &PrimitiveEllipse, point: &Point3) -> bool {
    ellipse
        .get_angle(point)
        .is_some_and(|angle| ellipse.is_angle_contained(angle))
}

/// 两个共面椭圆：在第一个椭圆的单位圆坐标系中求解
fn coplanar_ellipse_points(first: &PrimitiveEllipse, second: &PrimitiveEllipse) -> Vec<Point3> {
    let Some(to_unit) = first.to_unit_circle() else {
        return Vec::new();
    };
    let from_unit = first.from_unit_circle();

    // 第二个椭圆在单位圆坐标系中的中心与一对共轭半径
    let center = to_unit.transform_point(&second.center);
    let u = to_unit.transform_point(&(second.center + second.major_axis)) - center;
    let v = to_unit.transform_point(&(second.center + second.minor_axis())) - center;

    let a = Rounded::new(u.norm());
    let b = Rounded::new(v.norm());
    let orthogonal = close_to_eps(0.0, u.dot(&v), COINCIDENCE_EPSILON);

    if orthogonal && a == b {
        return circle_unit_circle_points(&center, a)
            .into_iter()
            .map(|p| from_unit.transform_point(&p))
            .collect();
    }

    if orthogonal {
        // 旋转使第二个椭圆的长轴与 X 轴对齐
        let theta = vector_angle_degrees(&u);
        let (sin, cos) = theta.to_radians().sin_cos();
        let h = Rounded::new(center.x * cos + center.y * sin);
        let k = Rounded::new(-center.x * sin + center.y * cos);

        if h.abs().value() < EPSILON || k.abs().value() < EPSILON {
            let back = from_unit.then(&Transform::rotation_about_z(theta));
            return aligned_ellipse_unit_circle_points(a, b, h, k)
                .into_iter()
                .map(|p| back.transform_point(&p))
                .collect();
        }
    }

    general_ellipse_unit_circle_points(&center.coords, &u, &v)
        .into_iter()
        .map(|p| from_unit.transform_point(&p))
        .collect()
}

/// 单位圆与半径为 `radius`、中心为 `center` 的圆
fn circle_unit_circle_points(center: &Point3, radius: Rounded) -> Vec<Point3> {
    let cx = Rounded::new(center.coords.norm());
    if cx.value() < EPSILON {
        // 同心圆
        return Vec::new();
    }
    if cx.value() > (radius + 1.0).value() + EPSILON {
        return Vec::new();
    }

    // 旋转使圆心位于 +X 轴上
    let phi = vector_angle_degrees(&center.coords);
    let x = (radius * radius - cx * cx - 1.0) / (-2.0 * cx);
    let Some(y) = unit_circle_other_coordinate(x) else {
        return Vec::new();
    };

    let rotation = Transform::rotation_about_z(phi);
    [Point3::new(x.value(), y.value(), 0.0), Point3::new(x.value(), -y.value(), 0.0)]
        .iter()
        .map(|p| rotation.transform_point(p))
        .collect()
}

/// 单位圆上已知一个坐标时另一个坐标的绝对值；相切时的微小负数按 0 处理
fn unit_circle_other_coordinate(known: Rounded) -> Option<Rounded> {
    let remainder = 1.0 - known * known;
    if close_to(0.0, remainder.value()) {
        Some(Rounded::new(0.0))
    } else if remainder.value() < 0.0 {
        None
    } else {
        Some(remainder.sqrt())
    }
}

/// 实系数二次方程的实根
fn quadratic_roots(a: Rounded, b: Rounded, c: Rounded) -> Vec<Rounded> {
    if a.abs().value() < EPSILON {
        if b.abs().value() < EPSILON {
            return Vec::new();
        }
        return vec![-c / b];
    }

    let discriminant = b * b - 4.0 * a * c;
    if close_to(0.0, discriminant.value()) {
        return vec![-b / (2.0 * a)];
    }
    if discriminant.value() < 0.0 {
        return Vec::new();
    }

    let sq = discriminant.sqrt();
    vec![(-b + sq) / (2.0 * a), (-b - sq) / (2.0 * a)]
}

/// 单位圆与轴对齐椭圆 `((x-h)/a)² + ((y-k)/b)² = 1`，要求 `h ≈ 0` 或 `k ≈ 0`
fn aligned_ellipse_unit_circle_points(a: Rounded, b: Rounded, h: Rounded, k: Rounded) -> Vec<Point3> {
    let a2 = a * a;
    let b2 = b * b;
    let mut points = Vec::new();

    if h.abs().value() < EPSILON {
        // (a² - b²)y² - 2a²k·y + (a²k² + b² - a²b²) = 0
        let qa = a2 - b2;
        let qb = -2.0 * a2 * k;
        let qc = a2 * k * k + b2 - a2 * b2;
        for y in quadratic_roots(qa, qb, qc) {
            if let Some(x) = unit_circle_other_coordinate(y) {
                points.push(Point3::new(x.value(), y.value(), 0.0));
                points.push(Point3::new(-x.value(), y.value(), 0.0));
            }
        }
    } else {
        // (a² - b²)x² + 2b²h·x - (b²h² + a² - a²b²) = 0
        let qa = a2 - b2;
        let qb = 2.0 * b2 * h;
        let qc = -(b2 * h * h + a2 - a2 * b2);
        for x in quadratic_roots(qa, qb, qc) {
            if let Some(y) = unit_circle_other_coordinate(x) {
                points.push(Point3::new(x.value(), y.value(), 0.0));
                points.push(Point3::new(x.value(), -y.value(), 0.0));
            }
        }
    }

    points
}

/// 单位圆与以共轭半径 `u`、`v` 描述的一般椭圆
///
/// 以 1° 步长扫描椭圆 `c + cos(t)·u + sin(t)·v`，在“单位圆内/外”状态变化的区间内二分求精。
/// 不与单位圆交叉的切点会被漏掉。
fn general_ellipse_unit_circle_points(center: &Vector3, u: &Vector3, v: &Vector3) -> Vec<Point3> {
    let point_at = |cos: f64, sin: f64| center + u * cos + v * sin;
    let inside = |cos: f64, sin: f64| {
        let p = point_at(cos, sin);
        p.x * p.x + p.y * p.y - 1.0
    };
    let at_degrees = |degrees: f64| {
        let (sin, cos) = degrees.to_radians().sin_cos();
        inside(cos, sin)
    };

    let (sin_table, cos_table) = trig_table();
    let mut points = Vec::new();

    for i in 0..360 {
        let j = (i + 1) % 360;
        let current = inside(cos_table[i], sin_table[i]);
        let next = inside(cos_table[j], sin_table[j]);

        if current == 0.0 {
            points.push(Point3::from(point_at(cos_table[i], sin_table[i])));
            continue;
        }
        if (current < 0.0) == (next < 0.0) || next == 0.0 {
            continue;
        }

        let mut lo = i as f64;
        let mut hi = lo + 1.0;
        for _ in 0..BISECTION_STEPS {
            let mid = (lo + hi) * 0.5;
            if (at_degrees(mid) < 0.0) == (current < 0.0) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let (sin, cos) = ((lo + hi) * 0.5).to_radians().sin_cos();
        points.push(Point3::from(point_at(cos, sin)));
    }

    points
}

/// 两个不平行平面上的椭圆
///
/// 两平面交于一条直线，分别与两个椭圆求交后只保留同时位于两个完整椭圆上的点。
fn skew_plane_ellipse_points(first: &PrimitiveEllipse, second: &PrimitiveEllipse) -> Vec<Point3> {
    let n1 = first.normal.normalize();
    let n2 = second.normal.normalize();
    let d1 = n1.dot(&first.center.coords);
    let d2 = n2.dot(&second.center.coords);
    let n1n1 = n1.dot(&n1);
    let n2n2 = n2.dot(&n2);
    let n1n2 = n1.dot(&n2);

    let denom = n1n1 * n2n2 - n1n2 * n1n2;
    if denom.abs() < EPSILON {
        return Vec::new();
    }
    let origin = (n1 * (d1 * n2n2 - d2 * n1n2) + n2 * (d2 * n1n1 - d1 * n1n2)) / denom;
    let origin = Point3::from(origin);
    let plane_line = PrimitiveLine::new(origin, origin + n1.cross(&n2));

    let mut candidates = line_ellipse_intersections(&plane_line, first, false);
    candidates.extend(line_ellipse_intersections(&plane_line, second, false));

    candidates
        .into_iter()
        .map(|p| round_point(&p))
        .filter(|p| lies_on_full_ellipse(first, p) && lies_on_full_ellipse(second, p))
        .collect()
}

fn lies_on_full_ellipse(ellipse: &PrimitiveEllipse, point: &Point3) -> bool {
    let Some(to_unit) = ellipse.to_unit_circle() else {
        return false;
    };
    let unit = to_unit.transform_point(point);
    close_to_eps(0.0, unit.z, COINCIDENCE_EPSILON)
        && close_to_eps(1.0, unit.x * unit.x + unit.y * unit.y, COINCIDENCE_EPSILON)
}
