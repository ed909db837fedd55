//! 图纸模型
//!
//! 图层与实体都保存在 [`ReadOnlyTree`] 中。所有编辑方法都返回新的 [`Drawing`]，
//! 原值保持不变，未修改的图层与实体在新旧版本之间共享。

use crate::chain::get_polylines_from_segments;
use crate::config::KernelConfig;
use crate::entity::{Entity, EntityId, Geometry};
use crate::error::GeometryError;
use crate::math::BoundingBox;
use crate::properties::Color;
use geokernel_collections::ReadOnlyTree;

/// 默认图层名称
pub const DEFAULT_LAYER: &str = "0";

/// 图层
#[derive(Debug, Clone)]
pub struct Layer {
    /// 图层名称，在图纸内唯一
    pub name: String,

    /// 图层颜色
    pub color: Color,

    /// 是否可见
    pub visible: bool,

    /// 图层上的实体
    pub entities: ReadOnlyTree<EntityId, Entity>,
}

impl Layer {
    /// 创建新图层
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Color::WHITE,
            visible: true,
            entities: ReadOnlyTree::new(),
        }
    }

    /// 设置颜色
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// 设置可见性
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// 添加实体后的新图层
    pub fn with_entity(&self, entity: Entity) -> Self {
        Self {
            entities: self.entities.insert(entity.id, entity),
            ..self.clone()
        }
    }

    /// 删除实体后的新图层
    pub fn without_entity(&self, id: EntityId) -> Self {
        Self {
            entities: self.entities.delete(&id),
            ..self.clone()
        }
    }
}

/// 图纸
#[derive(Debug, Clone)]
pub struct Drawing {
    layers: ReadOnlyTree<String, Layer>,
    current_layer: String,
}

impl Drawing {
    /// 只含图层 "0" 的空图纸
    pub fn new() -> Self {
        Self {
            layers: ReadOnlyTree::new().insert(DEFAULT_LAYER.to_string(), Layer::new(DEFAULT_LAYER)),
            current_layer: DEFAULT_LAYER.to_string(),
        }
    }

    /// 当前图层名称
    pub fn current_layer_name(&self) -> &str {
        &self.current_layer
    }

    /// 当前图层
    pub fn current_layer(&self) -> Option<&Layer> {
        self.layers.get(self.current_layer.as_str())
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// 按名称排序的所有图层
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// 添加图层
    pub fn add_layer(&self, layer: Layer) -> Result<Self, DrawingError> {
        if self.layers.contains_key(layer.name.as_str()) {
            return Err(DrawingError::LayerAlreadyExists(layer.name));
        }
        tracing::debug!(layer = %layer.name, "Adding layer");
        Ok(self.with_layers(self.layers.insert(layer.name.clone(), layer)))
    }

    /// 替换同名图层
    pub fn update_layer(&self, layer: Layer) -> Result<Self, DrawingError> {
        if !self.layers.contains_key(layer.name.as_str()) {
            return Err(DrawingError::LayerNotFound(layer.name));
        }
        Ok(self.with_layers(self.layers.insert(layer.name.clone(), layer)))
    }

    /// 删除图层
    ///
    /// 不能删除图层 0 和当前图层。
    pub fn remove_layer(&self, name: &str) -> Result<Self, DrawingError> {
        if name == DEFAULT_LAYER {
            return Err(DrawingError::CannotDeleteLayerZero);
        }
        if name == self.current_layer {
            return Err(DrawingError::CannotDeleteCurrentLayer);
        }
        if !self.layers.contains_key(name) {
            return Err(DrawingError::LayerNotFound(name.to_string()));
        }
        tracing::debug!(layer = name, "Removing layer");
        Ok(self.with_layers(self.layers.delete(name)))
    }

    /// 设置当前图层
    pub fn set_current_layer(&self, name: &str) -> Result<Self, DrawingError> {
        if !self.layers.contains_key(name) {
            return Err(DrawingError::LayerNotFound(name.to_string()));
        }
        Ok(Self {
            layers: self.layers.clone(),
            current_layer: name.to_string(),
        })
    }

    /// 把实体添加到当前图层
    pub fn add_entity(&self, entity: Entity) -> Result<Self, DrawingError> {
        let layer = self.current_layer.clone();
        self.add_entity_to_layer(entity, &layer)
    }

    /// 把实体添加到指定图层
    pub fn add_entity_to_layer(&self, entity: Entity, layer: &str) -> Result<Self, DrawingError> {
        let target = self
            .layers
            .get(layer)
            .ok_or_else(|| DrawingError::LayerNotFound(layer.to_string()))?;
        tracing::trace!(id = %entity.id, layer, "Adding entity");
        let updated = target.with_entity(entity);
        Ok(self.with_layers(self.layers.insert(layer.to_string(), updated)))
    }

    /// 删除实体
    pub fn remove_entity(&self, id: EntityId) -> Result<Self, DrawingError> {
        let layer = self
            .containing_layer(id)
            .ok_or(DrawingError::EntityNotFound(id))?;
        let updated = layer.without_entity(id);
        Ok(self.with_layers(self.layers.insert(updated.name.clone(), updated)))
    }

    /// 在原实体所在图层中用新实体替换它
    pub fn replace_entity(&self, id: EntityId, entity: Entity) -> Result<Self, DrawingError> {
        let layer = self
            .containing_layer(id)
            .ok_or(DrawingError::EntityNotFound(id))?;
        let updated = layer.without_entity(id).with_entity(entity);
        Ok(self.with_layers(self.layers.insert(updated.name.clone(), updated)))
    }

    /// 包含该实体的图层
    pub fn containing_layer(&self, id: EntityId) -> Option<&Layer> {
        self.layers.values().find(|l| l.entities.contains_key(&id))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.layers.values().find_map(|l| l.entities.get(&id))
    }

    /// 所有图层上的实体，按图层名称、实体ID排序
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.layers.values().flat_map(|l| l.entities.values())
    }

    /// 可见图层上的实体
    pub fn visible_entities(&self) -> impl Iterator<Item = &Entity> {
        self.layers
            .values()
            .filter(|l| l.visible)
            .flat_map(|l| l.entities.values())
    }

    pub fn entity_count(&self) -> usize {
        self.layers.values().map(|l| l.entities.len()).sum()
    }

    /// 把若干实体合并为多段线
    ///
    /// 删除给定实体，将它们的图元重建为多段线后添加到 `layer`。
    /// 返回新图纸与新增多段线的ID。
    pub fn combine_entities_into_polyline(
        &self,
        ids: &[EntityId],
        layer: &str,
    ) -> Result<(Self, Vec<EntityId>), DrawingError> {
        if !self.layers.contains_key(layer) {
            return Err(DrawingError::LayerNotFound(layer.to_string()));
        }

        let mut primitives = Vec::new();
        let mut drawing = self.clone();
        for &id in ids {
            let entity = self.entity(id).ok_or(DrawingError::EntityNotFound(id))?;
            primitives.extend(entity.primitives());
            drawing = drawing.remove_entity(id)?;
        }

        let polylines = get_polylines_from_segments(&primitives)?;
        let mut added = Vec::with_capacity(polylines.len());
        for polyline in polylines {
            let entity = Entity::new(Geometry::Polyline(polyline));
            added.push(entity.id);
            drawing = drawing.add_entity_to_layer(entity, layer)?;
        }

        tracing::debug!(
            combined = ids.len(),
            polylines = added.len(),
            layer,
            "Combined entities into polylines"
        );
        Ok((drawing, added))
    }

    /// 所有实体的包围盒，图纸为空时返回空包围盒
    pub fn extents(&self) -> BoundingBox {
        self.extents_with(&KernelConfig::default())
    }

    /// 同 [`extents`](Self::extents)，圆弧按 `config.arc_segments` 采样
    pub fn extents_with(&self, config: &KernelConfig) -> BoundingBox {
        let points = self
            .entities()
            .flat_map(Entity::primitives)
            .flat_map(|p| p.interesting_points_with(config.arc_segments));
        BoundingBox::from_points(points)
    }

    fn with_layers(&self, layers: ReadOnlyTree<String, Layer>) -> Self {
        Self {
            layers,
            current_layer: self.current_layer.clone(),
        }
    }
}

impl Default for Drawing {
    fn default() -> Self {
        Self::new()
    }
}

/// 图纸编辑错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DrawingError {
    #[error("Cannot delete layer 0")]
    CannotDeleteLayerZero,

    #[error("Cannot delete current layer")]
    CannotDeleteCurrentLayer,

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Layer already exists: {0}")]
    LayerAlreadyExists(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
