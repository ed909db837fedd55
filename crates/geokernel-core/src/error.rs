//! 几何内核错误类型

use crate::primitive::PrimitiveKind;

/// 几何运算错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("{operation} does not support {kind:?} primitives")]
    UnsupportedPrimitive {
        kind: PrimitiveKind,
        operation: &'static str,
    },

    #[error("Only planar arcs are supported (endpoints must share a Z value)")]
    NonPlanarArc,

    #[error("Included angle must be in [0, 360): {0}")]
    IncludedAngleOutOfRange(f64),

    #[error("Could not construct an arc through the given points")]
    DegenerateArc,

    #[error("A polyline requires at least 2 vertices, got {0}")]
    NotEnoughVertices(usize),

    #[error("At least one entity is required")]
    NotEnoughEntities,

    #[error("Entity is not a closed region: {0}")]
    NotClosed(&'static str),

    #[error("Curve parameter must be in [0, 1]: {0}")]
    ParameterOutOfRange(f64),

    #[error("Operation was cancelled")]
    Cancelled,
}
