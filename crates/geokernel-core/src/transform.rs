//! 3D仿射变换
//!
//! 以 4×4 齐次矩阵表示，支持平移、绕Z轴旋转、缩放以及
//! 单位圆投影（把XY平面上的单位圆映射到任意椭圆）。

use crate::math::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// 3D仿射变换
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    matrix: Matrix4,
}

impl Transform {
    /// 创建单位变换
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// 创建平移变换
    pub fn translation(offset: Vector3) -> Self {
        Self {
            matrix: Matrix4::new_translation(&offset),
        }
    }

    /// 创建绕Z轴的旋转变换（角度，逆时针为正）
    #[rustfmt::skip]
    pub fn rotation_about_z(angle_degrees: f64) -> Self {
        let theta = angle_degrees.to_radians();
        let (sin, cos) = theta.sin_cos();
        Self {
            matrix: Matrix4::new(
                cos, -sin, 0.0, 0.0,
                sin, cos, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ),
        }
    }

    /// 创建缩放变换（绕原点）
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz)),
        }
    }

    /// 单位圆投影
    ///
    /// 各列依次为 `right * sx`、`up * sy`、`normal * sz` 和 `center`。
    #[rustfmt::skip]
    pub fn from_unit_circle_projection(
        normal: &Vector3,
        right: &Vector3,
        up: &Vector3,
        center: &Point3,
        sx: f64,
        sy: f64,
        sz: f64,
    ) -> Self {
        Self {
            matrix: Matrix4::new(
                right.x * sx, up.x * sy, normal.x * sz, center.x,
                right.y * sx, up.y * sy, normal.y * sz, center.y,
                right.z * sx, up.z * sy, normal.z * sz, center.z,
                0.0, 0.0, 0.0, 1.0,
            ),
        }
    }

    /// 组合两个变换（self 在后，other 在前）
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// 变换一个点
    pub fn transform_point(&self, point: &Point3) -> Point3 {
        self.matrix.transform_point(point)
    }

    /// 变换一个向量（不受平移影响）
    pub fn transform_vector(&self, vector: &Vector3) -> Vector3 {
        self.matrix.transform_vector(vector)
    }

    /// 获取逆变换；奇异矩阵（如零半径椭圆）返回 `None`
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|m| Self { matrix: m })
    }

    /// 获取变换矩阵
    pub fn matrix(&self) -> &Matrix4 {
        &self.matrix
    }

    /// 从矩阵创建变换
    pub fn from_matrix(matrix: Matrix4) -> Self {
        Self { matrix }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            matrix: self.matrix * rhs.matrix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{close_to, points_close};

    #[test]
    fn test_translation() {
        let t = Transform::translation(Vector3::new(10.0, 20.0, 0.0));
        let result = t.transform_point(&Point3::new(5.0, 5.0, 1.0));
        assert_eq!(result, Point3::new(15.0, 25.0, 1.0));

        let v = t.transform_vector(&Vector3::x());
        assert_eq!(v, Vector3::x());
    }

    #[test]
    fn test_rotation() {
        let t = Transform::rotation_about_z(90.0);
        let result = t.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(close_to(result.x, 0.0));
        assert!(close_to(result.y, 1.0));
    }

    #[test]
    fn test_unit_circle_projection_round_trip() {
        let t = Transform::from_unit_circle_projection(
            &Vector3::z(),
            &Vector3::x(),
            &Vector3::y(),
            &Point3::new(3.0, 4.0, 0.0),
            2.0,
            1.0,
            1.0,
        );
        let p = t.transform_point(&Point3::new(0.0, 1.0, 0.0));
        assert!(points_close(&p, &Point3::new(3.0, 5.0, 0.0)));

        let inverse = t.inverse().unwrap();
        let back = inverse.transform_point(&Point3::new(5.0, 4.0, 0.0));
        assert!(points_close(&back, &Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        assert!(Transform::scale(0.0, 1.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_composition_order() {
        let t = Transform::translation(Vector3::new(1.0, 0.0, 0.0)) * Transform::scale(2.0, 2.0, 2.0);
        let p = t.transform_point(&Point3::new(1.0, 1.0, 0.0));
        assert_eq!(p, Point3::new(3.0, 2.0, 0.0));
        assert_eq!(t, Transform::translation(Vector3::new(1.0, 0.0, 0.0)).then(&Transform::scale(2.0, 2.0, 2.0)));
    }
}
