//! 数学基础类型与数值容差
//!
//! 基于 nalgebra 提供的向量和点类型的别名，以及内核中所有的
//! 精度常量、近似比较与角度规范化工具。

use geokernel_collections::Rect;
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::OnceLock;

/// 3D点类型
pub type Point3 = na::Point3<f64>;

/// 3D向量类型
pub type Vector3 = na::Vector3<f64>;

/// 3D齐次变换矩阵
pub type Matrix4 = na::Matrix4<f64>;

/// 中间结果四舍五入保留的小数位数
pub const PRECISION: i32 = 12;

/// 数值容差，用于几何比较
pub const EPSILON: f64 = 1e-12;

/// 贝塞尔曲线近似容差
pub const BEZIER_EPSILON: f64 = 1.0 / 1024.0;

/// 两条直线最近点连线长度平方的上限，超过即视为不相交
pub const MIN_CONNECTOR_LENGTH_SQUARED: f64 = 1e-10;

/// 端点重合、共面判定等跨图元比较使用的容差
pub const COINCIDENCE_EPSILON: f64 = 1e-9;

pub const ONE_EIGHTY: f64 = 180.0;
pub const THREE_SIXTY: f64 = 360.0;

/// `value` 是否落在 `[min(a,b) - ε, max(a,b) + ε]` 内
#[inline]
pub fn between(a: f64, b: f64, value: f64) -> bool {
    let min = a.min(b) - EPSILON;
    let max = a.max(b) + EPSILON;
    value >= min && value <= max
}

/// 判断两个浮点数在给定容差内是否近似相等
#[inline]
pub fn close_to_eps(expected: f64, actual: f64, epsilon: f64) -> bool {
    between(expected - epsilon, expected + epsilon, actual)
}

/// 判断两个浮点数是否近似相等
#[inline]
pub fn close_to(expected: f64, actual: f64) -> bool {
    close_to_eps(expected, actual, EPSILON)
}

/// 判断两个点在给定容差内是否近似相等
#[inline]
pub fn points_close_eps(a: &Point3, b: &Point3, epsilon: f64) -> bool {
    close_to_eps(a.x, b.x, epsilon) && close_to_eps(a.y, b.y, epsilon) && close_to_eps(a.z, b.z, epsilon)
}

/// 判断两个点是否近似相等
#[inline]
pub fn points_close(a: &Point3, b: &Point3) -> bool {
    points_close_eps(a, b, EPSILON)
}

/// 判断两个向量在给定容差内是否近似相等
#[inline]
pub fn vectors_close_eps(a: &Vector3, b: &Vector3, epsilon: f64) -> bool {
    close_to_eps(a.x, b.x, epsilon) && close_to_eps(a.y, b.y, epsilon) && close_to_eps(a.z, b.z, epsilon)
}

/// 向量是否近似为零向量
#[inline]
pub fn is_close_to_zero(v: &Vector3) -> bool {
    vectors_close_eps(v, &Vector3::zeros(), EPSILON)
}

/// 将角度（度）规范化到 `[0, 360)`
pub fn correct_angle_degrees(angle: f64) -> f64 {
    let corrected = angle.rem_euclid(THREE_SIXTY);
    // rem_euclid 对极小的负数可能返回 360
    if corrected >= THREE_SIXTY {
        0.0
    } else {
        corrected
    }
}

/// 向量在 XY 平面上的方向角（度），范围 `[0, 360)`
pub fn vector_angle_degrees(v: &Vector3) -> f64 {
    correct_angle_degrees(v.y.atan2(v.x).to_degrees())
}

/// 四舍五入到 [`PRECISION`] 位小数
pub fn round_to_precision(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(PRECISION);
    let scaled = value * scale;
    if !scaled.is_finite() {
        // 数值过大，已无小数部分可舍入
        return value;
    }
    scaled.round() / scale
}

/// 将点的各分量四舍五入
pub fn round_point(p: &Point3) -> Point3 {
    Point3::new(
        round_to_precision(p.x),
        round_to_precision(p.y),
        round_to_precision(p.z),
    )
}

/// 立方根（保留符号）
pub fn cube_root(v: f64) -> f64 {
    v.cbrt()
}

/// 由平面法向量推导该平面内的“右”方向
pub fn right_vector_from_normal(normal: &Vector3) -> Vector3 {
    if *normal == Vector3::x() {
        return Vector3::z();
    }
    let up = normal.cross(&Vector3::x());
    up.cross(normal).normalize()
}

/// 将点集按近似相等去重，保持首次出现的顺序
pub fn dedup_points(points: impl IntoIterator<Item = Point3>) -> Vec<Point3> {
    let mut result: Vec<Point3> = Vec::new();
    for p in points {
        if !result.iter().any(|q| points_close(q, &p)) {
            result.push(p);
        }
    }
    result
}

/// 整度数的正弦/余弦表，首次使用时初始化
pub fn trig_table() -> &'static ([f64; 360], [f64; 360]) {
    static TABLE: OnceLock<([f64; 360], [f64; 360])> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut sin = [0.0; 360];
        let mut cos = [0.0; 360];
        for i in 0..360 {
            let rad = (i as f64).to_radians();
            sin[i] = rad.sin();
            cos[i] = rad.cos();
        }
        (sin, cos)
    })
}

/// 每次运算后都四舍五入到 [`PRECISION`] 位的数值
///
/// 用于椭圆求交的中间计算，抑制浮点噪声以便后续去重。
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Rounded(f64);

impl Rounded {
    pub fn new(value: f64) -> Self {
        Self(round_to_precision(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn sqrt(self) -> Self {
        Self::new(self.0.sqrt())
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

impl From<f64> for Rounded {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Rounded> for f64 {
    fn from(value: Rounded) -> Self {
        value.0
    }
}

macro_rules! rounded_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for Rounded {
            type Output = Rounded;

            fn $method(self, rhs: Rounded) -> Rounded {
                Rounded::new(self.0 $op rhs.0)
            }
        }

        impl $trait<f64> for Rounded {
            type Output = Rounded;

            fn $method(self, rhs: f64) -> Rounded {
                Rounded::new(self.0 $op round_to_precision(rhs))
            }
        }

        impl $trait<Rounded> for f64 {
            type Output = Rounded;

            fn $method(self, rhs: Rounded) -> Rounded {
                Rounded::new(round_to_precision(self) $op rhs.0)
            }
        }
    };
}

rounded_binop!(Add, add, +);
rounded_binop!(Sub, sub, -);
rounded_binop!(Mul, mul, *);
rounded_binop!(Div, div, /);

impl Neg for Rounded {
    type Output = Rounded;

    fn neg(self) -> Rounded {
        Rounded(-self.0)
    }
}

/// 3D轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    /// 创建新的包围盒
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// 创建空的包围盒（无效状态）
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// 是否为空（未包含任何点）
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// 从点集创建包围盒
    pub fn from_points(points: impl IntoIterator<Item = Point3>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.expand_to_include(&p);
        }
        bbox
    }

    /// 扩展包围盒以包含指定点
    pub fn expand_to_include(&mut self, point: &Point3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// 合并两个包围盒
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// 检查是否包含指定点（含容差）
    pub fn contains(&self, point: &Point3) -> bool {
        between(self.min.x, self.max.x, point.x)
            && between(self.min.y, self.max.y, point.y)
            && between(self.min.z, self.max.z, point.z)
    }

    /// 尺寸
    pub fn size(&self) -> Vector3 {
        self.max - self.min
    }

    /// 获取中心点
    pub fn center(&self) -> Point3 {
        na::center(&self.min, &self.max)
    }

    /// 投影到XY平面上的矩形
    pub fn to_rect(&self) -> Rect {
        Rect::from_corners(self.min.x, self.min.y, self.max.x, self.max.y)
    }
}
