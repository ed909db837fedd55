//! 闭合区域的布尔运算
//!
//! 所有输入实体的图元两两求交，在交点处切分；每一段取中点，用射线法判断它是否位于其他实体内部，
//! 按运算类型决定去留，最后把保留的线段重建为多段线。
//!
//! 射线与边界共线或恰好穿过顶点时判断不可靠，边界重合的区域可能得到错误结果。

use crate::chain::{get_polylines_from_segments, polygon_contains};
use crate::ellipse::PrimitiveEllipse;
use crate::entity::{Entity, Geometry};
use crate::error::GeometryError;
use crate::intersection::intersection_points;
use crate::math::{
    close_to_eps, correct_angle_degrees, points_close_eps, Point3, COINCIDENCE_EPSILON,
    THREE_SIXTY,
};
use crate::primitive::{Primitive, PrimitiveLine};

/// 布尔运算类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BooleanOperation {
    Union,
    Intersect,
    Subtract,
}

/// 并集
pub fn union(entities: &[Entity]) -> Result<Vec<Entity>, GeometryError> {
    combine(entities, BooleanOperation::Union)
}

/// 交集
pub fn intersect(entities: &[Entity]) -> Result<Vec<Entity>, GeometryError> {
    combine(entities, BooleanOperation::Intersect)
}

/// 从 `base` 中减去 `subtrahends`
pub fn subtract(base: &Entity, subtrahends: &[Entity]) -> Result<Vec<Entity>, GeometryError> {
    let entities: Vec<Entity> = std::iter::once(base.clone())
        .chain(subtrahends.iter().cloned())
        .collect();
    combine(&entities, BooleanOperation::Subtract)
}

fn combine(entities: &[Entity], operation: BooleanOperation) -> Result<Vec<Entity>, GeometryError> {
    let Some(first) = entities.first() else {
        return Err(GeometryError::NotEnoughEntities);
    };
    if let Some(open) = entities.iter().find(|e| !e.is_closed_region()) {
        return Err(GeometryError::NotClosed(open.geometry.type_name()));
    }
    if entities.len() == 1 {
        return Ok(vec![first.clone()]);
    }

    let boundaries: Vec<Vec<Primitive>> = entities.iter().map(Entity::primitives).collect();
    let mut kept_segments = Vec::new();
    let mut result = Vec::new();
    let mut dropped = 0usize;

    for (index, boundary) in boundaries.iter().enumerate() {
        for primitive in boundary {
            let cuts: Vec<Point3> = boundaries
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .flat_map(|(_, others)| others.iter())
                .flat_map(|other| intersection_points(primitive, other, true))
                .collect();
            let parts = get_segment_parts(primitive, &cuts);
            let unsplit = parts.len() == 1;

            for part in parts {
                let mid = part.mid_point();
                let enclosed: Vec<bool> = boundaries
                    .iter()
                    .enumerate()
                    .map(|(other, others)| other != index && polygon_contains(others, &mid))
                    .collect();

                if !keep_segment(operation, index, &enclosed) {
                    dropped += 1;
                    continue;
                }

                match &part {
                    Primitive::Ellipse(e) if unsplit && e.is_closed() => {
                        result.push(part.to_entity().with_color(first.color));
                    }
                    _ => kept_segments.push(part),
                }
            }
        }
    }

    tracing::debug!(
        ?operation,
        entities = entities.len(),
        kept = kept_segments.len(),
        dropped,
        "Classified boolean segments"
    );

    for polyline in get_polylines_from_segments(&kept_segments)? {
        result.push(Entity::new(Geometry::Polyline(polyline)).with_color(first.color));
    }
    Ok(result)
}

/// `enclosed[j]` 表示该段是否位于第 `j` 个实体内部（自身恒为 false）
fn keep_segment(operation: BooleanOperation, index: usize, enclosed: &[bool]) -> bool {
    let others = || enclosed.iter().enumerate().filter(move |(j, _)| *j != index);
    match operation {
        BooleanOperation::Union => !enclosed.iter().any(|&e| e),
        BooleanOperation::Intersect => others().all(|(_, &e)| e),
        BooleanOperation::Subtract if index == 0 => !enclosed.iter().any(|&e| e),
        BooleanOperation::Subtract => {
            enclosed[0] && !others().any(|(j, &e)| j != 0 && e)
        }
    }
}

/// 在给定点处切分图元
///
/// 直线按到起点的距离排序；椭圆按相对起始角的角度排序，整椭圆首尾相接。
/// 长度为零的部分被丢弃，其他类型的图元原样返回。
pub fn get_segment_parts(primitive: &Primitive, cuts: &[Point3]) -> Vec<Primitive> {
    match primitive {
        Primitive::Line(line) => split_line(line, cuts)
            .into_iter()
            .map(|l| Primitive::Line(l.with_color(line.color)))
            .collect(),
        Primitive::Ellipse(ellipse) => split_ellipse(ellipse, cuts)
            .into_iter()
            .map(Primitive::Ellipse)
            .collect(),
        _ => vec![primitive.clone()],
    }
}

fn split_line(line: &PrimitiveLine, cuts: &[Point3]) -> Vec<PrimitiveLine> {
    let mut points: Vec<Point3> = cuts.to_vec();
    points.sort_by(|a, b| {
        (a - line.p1)
            .norm_squared()
            .total_cmp(&(b - line.p1).norm_squared())
    });

    let mut parts = Vec::with_capacity(points.len() + 1);
    let mut last = line.p1;
    for point in points.into_iter().chain(std::iter::once(line.p2)) {
        if points_close_eps(&last, &point, COINCIDENCE_EPSILON) {
            continue;
        }
        parts.push(PrimitiveLine::new(last, point));
        last = point;
    }

    if parts.is_empty() {
        return vec![line.clone()];
    }
    // 最后一段的终点保持原始端点
    if let Some(tail) = parts.last_mut() {
        tail.p2 = line.p2;
    }
    parts
}

fn split_ellipse(ellipse: &PrimitiveEllipse, cuts: &[Point3]) -> Vec<PrimitiveEllipse> {
    let start = ellipse.start_angle;
    let sweep = ellipse.included_angle();
    let same_angle = |a: f64, b: f64| close_to_eps(a, b, COINCIDENCE_EPSILON);

    let mut offsets: Vec<f64> = cuts
        .iter()
        .filter_map(|p| ellipse.get_angle(p))
        .map(|angle| correct_angle_degrees(angle - start))
        .collect();
    offsets.sort_by(f64::total_cmp);
    offsets.dedup_by(|a, b| same_angle(*a, *b));

    let arc = |from: f64, to: f64| {
        ellipse
            .clone()
            .with_angles(correct_angle_degrees(start + from), correct_angle_degrees(start + to))
    };

    if ellipse.is_closed() {
        // 0° 与 360° 附近的切点是同一个点
        if let (Some(&first), Some(&last)) = (offsets.first(), offsets.last()) {
            if offsets.len() > 1 && same_angle(first + THREE_SIXTY, last) {
                offsets.pop();
            }
        }
        // 整椭圆在第一个切点处断开，首尾相接
        if offsets.len() < 2 {
            return vec![ellipse.clone()];
        }
        let mut parts: Vec<PrimitiveEllipse> = offsets
            .windows(2)
            .map(|pair| arc(pair[0], pair[1]))
            .collect();
        if let (Some(&first), Some(&last)) = (offsets.first(), offsets.last()) {
            parts.push(arc(last, first + THREE_SIXTY));
        }
        return parts;
    }

    let mut parts = Vec::with_capacity(offsets.len() + 1);
    let mut last = 0.0;
    for offset in offsets
        .into_iter()
        .filter(|&o| o > 0.0 && o < sweep)
        .chain(std::iter::once(sweep))
    {
        if same_angle(last, offset) {
            continue;
        }
        parts.push(arc(last, offset));
        last = offset;
    }

    if parts.is_empty() {
        return vec![ellipse.clone()];
    }
    // 保持原始端点角度
    if let Some(first) = parts.first_mut() {
        first.start_angle = ellipse.start_angle;
    }
    if let Some(tail) = parts.last_mut() {
        tail.end_angle = ellipse.end_angle;
    }
    parts
}
