//! 链重建
//!
//! 把无序的图元集合连接成首尾相接的链，再转换为多段线。

use crate::error::GeometryError;
use crate::intersection::intersection_points;
use crate::math::{points_close_eps, Point3, Vector3, COINCIDENCE_EPSILON, ONE_EIGHTY};
use crate::polyline::{Polyline, Vertex, VertexDirection};
use crate::primitive::{max_x, Primitive, PrimitiveLine};
use std::collections::VecDeque;

const OPERATION: &str = "polyline reconstruction";

fn touches(a: &Point3, b: &Point3) -> bool {
    points_close_eps(a, b, COINCIDENCE_EPSILON)
}

/// 把图元贪心地连接为最长的链
///
/// 每条链从剩余图元中的第一个开始，先向尾部、再向头部延伸，
/// 直到没有剩余图元与链端点重合。图元本身的方向不作调整。
pub fn get_line_strips_from_primitives(primitives: &[Primitive]) -> Vec<Vec<Primitive>> {
    let mut remaining: Vec<Primitive> = primitives.to_vec();
    remaining.reverse();
    let mut strips = Vec::new();

    while let Some(seed) = remaining.pop() {
        let mut head = seed.start_point();
        let mut tail = seed.end_point();
        let mut strip = VecDeque::from([seed]);

        while !touches(&head, &tail) {
            let Some((index, far)) = find_connected(&remaining, &tail) else {
                break;
            };
            strip.push_back(remaining.remove(index));
            tail = far;
        }

        while !touches(&head, &tail) {
            let Some((index, far)) = find_connected(&remaining, &head) else {
                break;
            };
            strip.push_front(remaining.remove(index));
            head = far;
        }

        strips.push(strip.into_iter().collect());
    }

    tracing::debug!(
        primitives = primitives.len(),
        strips = strips.len(),
        "Built line strips"
    );
    strips
}

/// 查找有端点与 `point` 重合的图元，返回其下标以及另一端点
///
/// `remaining` 按输入顺序逆序存放，从后往前查找即优先匹配先输入的图元。
fn find_connected(remaining: &[Primitive], point: &Point3) -> Option<(usize, Point3)> {
    remaining.iter().enumerate().rev().find_map(|(i, p)| {
        let (start, end) = (p.start_point(), p.end_point());
        if touches(&start, point) {
            Some((i, end))
        } else if touches(&end, point) {
            Some((i, start))
        } else {
            None
        }
    })
}

/// 把每条链转换为多段线
///
/// 直线贡献一个直线顶点；圆弧贡献一个带圆心角的顶点，逆着弧方向遍历时为顺时针；
/// 链结束后追加一个圆心角为 0 的终点顶点。只含一个整圆的链输出为两个 180° 的弧段。
pub fn get_polylines_from_primitives(strips: &[Vec<Primitive>]) -> Result<Vec<Polyline>, GeometryError> {
    strips
        .iter()
        .filter(|strip| !strip.is_empty())
        .map(|strip| polyline_from_strip(strip))
        .collect()
}

/// [`get_line_strips_from_primitives`] 与 [`get_polylines_from_primitives`] 的组合
pub fn get_polylines_from_segments(primitives: &[Primitive]) -> Result<Vec<Polyline>, GeometryError> {
    get_polylines_from_primitives(&get_line_strips_from_primitives(primitives))
}

fn polyline_from_strip(strip: &[Primitive]) -> Result<Polyline, GeometryError> {
    if let [Primitive::Ellipse(ellipse)] = strip {
        if ellipse.is_closed() {
            if !ellipse.is_circular() {
                return Err(GeometryError::UnsupportedPrimitive {
                    kind: strip[0].kind(),
                    operation: OPERATION,
                });
            }
            let direction = xy_direction(&ellipse.normal, true);
            let start = ellipse.start_point();
            let opposite = ellipse.get_point(ellipse.start_angle + ONE_EIGHTY);
            return Polyline::new(vec![
                Vertex::new(start, ONE_EIGHTY, direction),
                Vertex::new(opposite, ONE_EIGHTY, direction),
                Vertex::line(start),
            ]);
        }
    }

    let mut vertices: Vec<Vertex> = Vec::with_capacity(strip.len() + 1);
    let mut last = first_near_point(strip);

    for primitive in strip {
        let start = primitive.start_point();
        let end = primitive.end_point();
        let forward = touches(&start, &last);
        let (near, far) = if forward { (start, end) } else { (end, start) };

        let vertex = match primitive {
            Primitive::Line(_) => Vertex::line(near),
            Primitive::Ellipse(e) => {
                Vertex::new(near, e.included_angle(), xy_direction(&e.normal, forward))
            }
            Primitive::Point(_) | Primitive::Text(_) | Primitive::Bezier(_) => {
                return Err(GeometryError::UnsupportedPrimitive {
                    kind: primitive.kind(),
                    operation: OPERATION,
                });
            }
        };
        add_vertex(&mut vertices, vertex);
        last = far;
    }

    // 闭合链的终点与起点取相同坐标
    if let Some(first) = vertices.first() {
        if touches(&first.location, &last) {
            last = first.location;
        }
    }
    add_vertex(&mut vertices, Vertex::line(last));

    Polyline::new(vertices)
}

/// 第一个图元中不与第二个图元相连的端点
fn first_near_point(strip: &[Primitive]) -> Point3 {
    let first = &strip[0];
    let start = first.start_point();
    let end = first.end_point();
    let Some(next) = strip.get(1) else {
        return start;
    };

    let connected = |p: &Point3| touches(p, &next.start_point()) || touches(p, &next.end_point());
    if connected(&start) && !connected(&end) {
        end
    } else {
        start
    }
}

/// 与上一个顶点坐标完全相同时替换上一个顶点
///
/// 上一个顶点描述的是零长度线段，后一个顶点的圆心角与方向才是有效的。
fn add_vertex(vertices: &mut Vec<Vertex>, vertex: Vertex) {
    match vertices.last_mut() {
        Some(last) if last.location == vertex.location => *last = vertex,
        _ => vertices.push(vertex),
    }
}

/// 弧在XY平面上的扫掠方向
fn xy_direction(normal: &Vector3, forward: bool) -> VertexDirection {
    let direction = if normal.z < 0.0 {
        VertexDirection::Clockwise
    } else {
        VertexDirection::CounterClockwise
    };
    if forward {
        direction
    } else {
        direction.reversed()
    }
}

/// 射线法判断点是否位于由图元围成的区域内
///
/// 从点向 +X 方向发射射线，越过所有图元的最大 X 坐标，交点数为奇数即在内部。
/// 射线与边界共线或恰好经过顶点时结果不可靠。
pub fn polygon_contains(primitives: &[Primitive], point: &Point3) -> bool {
    let Some(max_x) = max_x(primitives) else {
        return false;
    };
    let reach = ((max_x - point.x).abs() * 1.1).max(1.0);
    let ray = Primitive::Line(PrimitiveLine::new(*point, point + Vector3::new(reach, 0.0, 0.0)));

    let crossings: usize = primitives
        .iter()
        .map(|p| intersection_points(&ray, p, true).len())
        .sum();
    crossings % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ellipse::PrimitiveEllipse;
    use crate::math::points_close;
    use crate::primitive::PrimitivePoint;

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Primitive {
        Primitive::Line(PrimitiveLine::new(Point3::new(x1, y1, 0.0), Point3::new(x2, y2, 0.0)))
    }

    #[test]
    fn test_strips_link_reversed_segments() {
        let prims = vec![
            line(0.0, 0.0, 1.0, 0.0),
            line(2.0, 1.0, 1.0, 0.0),
            line(5.0, 5.0, 6.0, 5.0),
            line(2.0, 1.0, 3.0, 1.0),
        ];
        let strips = get_line_strips_from_primitives(&prims);
        assert_eq!(strips.len(), 2);
        assert_eq!(strips[0].len(), 3);
        assert_eq!(strips[1].len(), 1);
    }

    #[test]
    fn test_strip_seeded_in_the_middle_extends_both_ways() {
        let prims = vec![
            line(1.0, 0.0, 2.0, 0.0),
            line(0.0, 0.0, 1.0, 0.0),
            line(2.0, 0.0, 3.0, 0.0),
        ];
        let strips = get_line_strips_from_primitives(&prims);
        assert_eq!(strips.len(), 1);
        assert_eq!(strips[0][0], prims[1]);
        assert_eq!(strips[0][2], prims[2]);
    }

    #[test]
    fn test_single_line_round_trip() {
        let p1 = Point3::new(1.25, -3.5, 0.0);
        let p2 = Point3::new(7.0, 0.125, 0.0);
        let polylines = get_polylines_from_segments(&[Primitive::Line(PrimitiveLine::new(p1, p2))]).unwrap();
        assert_eq!(polylines.len(), 1);
        let prims = polylines[0].primitives();
        assert_eq!(prims, vec![Primitive::Line(PrimitiveLine::new(p1, p2))]);
    }

    #[test]
    fn test_vertex_count_is_segments_plus_one() {
        let prims = vec![
            line(0.0, 0.0, 1.0, 0.0),
            line(1.0, 1.0, 1.0, 0.0),
            line(1.0, 1.0, 0.0, 2.0),
        ];
        let polylines = get_polylines_from_segments(&prims).unwrap();
        let vertices = polylines[0].vertices();
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[0].location, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(vertices[3].location, Point3::new(0.0, 2.0, 0.0));
        assert_eq!(vertices[3].included_angle, 0.0);
    }

    #[test]
    fn test_arc_direction_follows_traversal() {
        let arc = PrimitiveEllipse::arc(Point3::origin(), 1.0, 0.0, 90.0, Vector3::z());
        // 直线终点连接到圆弧终点，圆弧被逆向遍历
        let prims = vec![line(1.0, 2.0, 0.0, 1.0), Primitive::Ellipse(arc)];
        let polylines = get_polylines_from_segments(&prims).unwrap();
        let vertices = polylines[0].vertices();
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[1].included_angle, 90.0);
        assert_eq!(vertices[1].direction, VertexDirection::Clockwise);
        assert!(points_close(&vertices[2].location, &Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_closed_square_is_closed() {
        let prims = vec![
            line(0.0, 0.0, 1.0, 0.0),
            line(1.0, 0.0, 1.0, 1.0),
            line(0.0, 1.0, 1.0, 1.0),
            line(0.0, 0.0, 0.0, 1.0),
        ];
        let polylines = get_polylines_from_segments(&prims).unwrap();
        assert_eq!(polylines.len(), 1);
        assert_eq!(polylines[0].vertices().len(), 5);
        assert!(polylines[0].is_closed());
        assert!(polylines[0].contains_point(&Point3::new(0.5, 0.5, 0.0)));
    }

    #[test]
    fn test_circle_becomes_two_half_arcs() {
        let circle = Primitive::Ellipse(PrimitiveEllipse::circle(Point3::origin(), 2.0, Vector3::z()));
        let polylines = get_polylines_from_segments(&[circle]).unwrap();
        let pl = &polylines[0];
        assert_eq!(pl.vertices().len(), 3);
        assert!(pl.is_closed());
        assert!(pl.contains_point(&Point3::new(0.5, 0.5, 0.0)));
        assert!(!pl.contains_point(&Point3::new(2.5, 0.5, 0.0)));
    }

    #[test]
    fn test_unsupported_primitives() {
        let point = Primitive::Point(PrimitivePoint::new(Point3::origin()));
        assert!(matches!(
            get_polylines_from_segments(&[point]),
            Err(GeometryError::UnsupportedPrimitive { .. })
        ));

        let ellipse = Primitive::Ellipse(PrimitiveEllipse::ellipse_2d(Point3::origin(), 2.0, 1.0));
        assert!(matches!(
            get_polylines_from_segments(&[ellipse]),
            Err(GeometryError::UnsupportedPrimitive { .. })
        ));
    }

    #[test]
    fn test_zero_length_line_keeps_following_arc() {
        let arc = PrimitiveEllipse::arc(Point3::origin(), 1.0, 0.0, 180.0, Vector3::z());
        let joint = arc.start_point();
        let strip = vec![
            Primitive::Line(PrimitiveLine::new(Point3::new(3.0, 0.0, 0.0), joint)),
            Primitive::Line(PrimitiveLine::new(joint, joint)),
            Primitive::Ellipse(arc.clone()),
        ];
        let polylines = get_polylines_from_primitives(&[strip]).unwrap();
        let vertices = polylines[0].vertices();
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[1].location, joint);
        assert_eq!(vertices[1].included_angle, 180.0);
        assert_eq!(vertices[1].direction, VertexDirection::CounterClockwise);
        assert!(points_close(&vertices[2].location, &arc.end_point()));
    }

    #[test]
    fn test_polygon_contains() {
        let triangle = vec![
            line(0.0, 0.0, 4.0, 0.0),
            line(4.0, 0.0, 0.0, 3.0),
            line(0.0, 3.0, 0.0, 0.0),
        ];
        assert!(polygon_contains(&triangle, &Point3::new(1.0, 1.0, 0.0)));
        assert!(!polygon_contains(&triangle, &Point3::new(3.0, 2.0, 0.0)));
        assert!(!polygon_contains(&[], &Point3::origin()));
    }
}
