//! 对象捕捉
//!
//! 捕捉点由实体的特征点和图元之间的交点组成，投影到屏幕坐标后存入四叉树，
//! 供光标附近的查询使用。图纸变化时整体重建。

use crate::config::KernelConfig;
use crate::drawing::Drawing;
use crate::entity::Entity;
use crate::error::GeometryError;
use crate::intersection::intersection_points;
use crate::math::Point3;
use crate::primitive::Primitive;
use crate::transform::Transform;
use geokernel_collections::{QuadTree, Rect};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 捕捉点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapPointKind {
    EndPoint,
    MidPoint,
    Center,
    Quadrant,
    Intersection,
}

/// 世界坐标中的捕捉点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapPoint {
    pub point: Point3,
    pub kind: SnapPointKind,
}

impl SnapPoint {
    pub fn new(point: Point3, kind: SnapPointKind) -> Self {
        Self { point, kind }
    }
}

/// 同时带有世界坐标与屏幕坐标的捕捉点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedSnapPoint {
    pub world: Point3,
    pub screen: Point3,
    pub kind: SnapPointKind,
}

impl TransformedSnapPoint {
    fn project(snap: SnapPoint, display_transform: &Transform) -> Self {
        Self {
            world: snap.point,
            screen: display_transform.transform_point(&snap.point),
            kind: snap.kind,
        }
    }
}

/// 协作式取消标记
///
/// 克隆共享同一个标志；一旦取消不可恢复。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// 构建捕捉点索引
///
/// 只处理可见图层。实体特征点并行计算；所有图元两两求交，
/// 每完成一个外层图元检查一次 `cancel`，取消时返回 [`GeometryError::Cancelled`]。
/// 四叉树根矩形为 `(0, 0, width, height)` 的屏幕区域。
pub fn build_snap_index(
    drawing: &Drawing,
    display_transform: &Transform,
    width: f64,
    height: f64,
    config: &KernelConfig,
    cancel: &CancellationToken,
) -> Result<QuadTree<TransformedSnapPoint>, GeometryError> {
    let entities: Vec<&Entity> = drawing.visible_entities().collect();

    let mut points: Vec<TransformedSnapPoint> = entities
        .par_iter()
        .flat_map_iter(|entity| entity.snap_points())
        .map(|snap| TransformedSnapPoint::project(snap, display_transform))
        .collect();
    let feature_points = points.len();

    let primitives: Vec<Primitive> = entities.iter().flat_map(|e| e.primitives()).collect();
    for (i, a) in primitives.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::debug!(completed = i, total = primitives.len(), "Snap index build cancelled");
            return Err(GeometryError::Cancelled);
        }
        for b in &primitives[i + 1..] {
            points.extend(intersection_points(a, b, true).into_iter().map(|p| {
                TransformedSnapPoint::project(
                    SnapPoint::new(p, SnapPointKind::Intersection),
                    display_transform,
                )
            }));
        }
    }

    tracing::debug!(
        entities = entities.len(),
        feature_points,
        intersections = points.len() - feature_points,
        "Built snap index"
    );

    let mut index = QuadTree::with_options(
        Rect::new(0.0, 0.0, width, height),
        |p: &TransformedSnapPoint| Rect::from_point(p.screen.x, p.screen.y),
        config.quadtree_options(),
    );
    index.extend(points);
    Ok(index)
}

/// 屏幕坐标 `(x, y)` 周围 `radius` 范围内最近的捕捉点
pub fn nearest_snap_point(
    index: &QuadTree<TransformedSnapPoint>,
    x: f64,
    y: f64,
    radius: f64,
) -> Option<&TransformedSnapPoint> {
    let query = Rect::new(x - radius, y - radius, radius * 2.0, radius * 2.0);
    let distance = |p: &TransformedSnapPoint| (p.screen.x - x).powi(2) + (p.screen.y - y).powi(2);
    index
        .get_contained_items(&query)
        .into_iter()
        .filter(|p| distance(p) <= radius * radius)
        .min_by(|a, b| distance(a).total_cmp(&distance(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::Layer;
    use crate::entity::Geometry;
    use crate::math::{points_close_eps, Vector3};

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Entity {
        Entity::new(Geometry::Line {
            p1: Point3::new(x1, y1, 0.0),
            p2: Point3::new(x2, y2, 0.0),
        })
    }

    fn crossing_lines() -> Drawing {
        Drawing::new()
            .add_entity(line(0.0, 0.0, 10.0, 10.0))
            .unwrap()
            .add_entity(line(0.0, 10.0, 10.0, 0.0))
            .unwrap()
    }

    #[test]
    fn test_index_contains_features_and_intersections() {
        let index = build_snap_index(
            &crossing_lines(),
            &Transform::identity(),
            100.0,
            100.0,
            &KernelConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        // 2 x (2 端点 + 1 中点) + 1 交点
        assert_eq!(index.len(), 7);
        let crossings: Vec<_> = index
            .items()
            .filter(|p| p.kind == SnapPointKind::Intersection)
            .collect();
        assert_eq!(crossings.len(), 1);
        assert!(points_close_eps(&crossings[0].world, &Point3::new(5.0, 5.0, 0.0), 1e-9));
    }

    #[test]
    fn test_screen_projection_and_query() {
        let display = Transform::translation(Vector3::new(20.0, 30.0, 0.0));
        let index = build_snap_index(
            &crossing_lines(),
            &display,
            100.0,
            100.0,
            &KernelConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        let hit = nearest_snap_point(&index, 21.0, 31.0, 3.0).unwrap();
        assert_eq!(hit.kind, SnapPointKind::EndPoint);
        assert_eq!(hit.world, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(hit.screen, Point3::new(20.0, 30.0, 0.0));
        assert!(nearest_snap_point(&index, 90.0, 90.0, 3.0).is_none());
    }

    #[test]
    fn test_hidden_layers_are_skipped() {
        let drawing = Drawing::new()
            .add_layer(Layer::new("hidden").with_visible(false))
            .unwrap()
            .add_entity_to_layer(line(0.0, 0.0, 1.0, 0.0), "hidden")
            .unwrap();
        let index = build_snap_index(
            &drawing,
            &Transform::identity(),
            10.0,
            10.0,
            &KernelConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_cancelled_build() {
        let cancel = CancellationToken::new();
        cancel.clone().cancel();
        assert!(cancel.is_cancelled());

        let result = build_snap_index(
            &crossing_lines(),
            &Transform::identity(),
            100.0,
            100.0,
            &KernelConfig::default(),
            &cancel,
        );
        assert_eq!(result.unwrap_err(), GeometryError::Cancelled);
    }
}
