//! Enumerations shared by accessors, buffer views and primitives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GltfError;

/// Storage type of an accessor component (GL enum values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub const fn gl_enum(self) -> u32 {
        match self {
            ComponentType::Byte => 5120,
            ComponentType::UnsignedByte => 5121,
            ComponentType::Short => 5122,
            ComponentType::UnsignedShort => 5123,
            ComponentType::UnsignedInt => 5125,
            ComponentType::Float => 5126,
        }
    }

    /// Size of one component in bytes.
    pub const fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ComponentType::Float)
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            ComponentType::Byte | ComponentType::Short | ComponentType::Float
        )
    }

    /// Largest representable integer, used as the normalization divisor.
    pub const fn max_integer(self) -> u32 {
        match self {
            ComponentType::Byte => i8::MAX as u32,
            ComponentType::UnsignedByte => u8::MAX as u32,
            ComponentType::Short => i16::MAX as u32,
            ComponentType::UnsignedShort => u16::MAX as u32,
            ComponentType::UnsignedInt => u32::MAX,
            ComponentType::Float => 1,
        }
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = GltfError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            5120 => Ok(ComponentType::Byte),
            5121 => Ok(ComponentType::UnsignedByte),
            5122 => Ok(ComponentType::Short),
            5123 => Ok(ComponentType::UnsignedShort),
            5125 => Ok(ComponentType::UnsignedInt),
            5126 => Ok(ComponentType::Float),
            other => Err(GltfError::invalid_input(format!(
                "unknown component type {}",
                other
            ))),
        }
    }
}

impl From<ComponentType> for u32 {
    fn from(value: ComponentType) -> Self {
        value.gl_enum()
    }
}

/// Element shape of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub const fn components(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 | AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AccessorType::Scalar => "SCALAR",
            AccessorType::Vec2 => "VEC2",
            AccessorType::Vec3 => "VEC3",
            AccessorType::Vec4 => "VEC4",
            AccessorType::Mat2 => "MAT2",
            AccessorType::Mat3 => "MAT3",
            AccessorType::Mat4 => "MAT4",
        }
    }

    /// Vector type with `n` components (1 maps to SCALAR).
    pub fn vector(n: usize) -> Option<Self> {
        match n {
            1 => Some(AccessorType::Scalar),
            2 => Some(AccessorType::Vec2),
            3 => Some(AccessorType::Vec3),
            4 => Some(AccessorType::Vec4),
            _ => None,
        }
    }
}

impl fmt::Display for AccessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Size of one accessor element in bytes, including the column padding glTF
/// requires for matrices of 1- and 2-byte components.
pub const fn element_size(accessor_type: AccessorType, component_type: ComponentType) -> usize {
    let size = component_type.size();
    match (accessor_type, size) {
        (AccessorType::Mat2, 1) => 8,
        (AccessorType::Mat3, 1) => 12,
        (AccessorType::Mat3, 2) => 24,
        _ => accessor_type.components() * size,
    }
}

/// Byte size of a component type; the component-size table.
pub const fn component_size(component_type: ComponentType) -> usize {
    component_type.size()
}

/// Topology of a primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    pub fn is_default(&self) -> bool {
        *self == PrimitiveMode::Triangles
    }
}

impl TryFrom<u32> for PrimitiveMode {
    type Error = GltfError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PrimitiveMode::Points),
            1 => Ok(PrimitiveMode::Lines),
            2 => Ok(PrimitiveMode::LineLoop),
            3 => Ok(PrimitiveMode::LineStrip),
            4 => Ok(PrimitiveMode::Triangles),
            5 => Ok(PrimitiveMode::TriangleStrip),
            6 => Ok(PrimitiveMode::TriangleFan),
            other => Err(GltfError::invalid_input(format!(
                "unknown primitive mode {}",
                other
            ))),
        }
    }
}

impl From<PrimitiveMode> for u32 {
    fn from(value: PrimitiveMode) -> Self {
        match value {
            PrimitiveMode::Points => 0,
            PrimitiveMode::Lines => 1,
            PrimitiveMode::LineLoop => 2,
            PrimitiveMode::LineStrip => 3,
            PrimitiveMode::Triangles => 4,
            PrimitiveMode::TriangleStrip => 5,
            PrimitiveMode::TriangleFan => 6,
        }
    }
}

/// Intended GPU binding of a buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BufferTarget {
    ArrayBuffer,
    ElementArrayBuffer,
}

impl TryFrom<u32> for BufferTarget {
    type Error = GltfError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            34962 => Ok(BufferTarget::ArrayBuffer),
            34963 => Ok(BufferTarget::ElementArrayBuffer),
            other => Err(GltfError::invalid_input(format!(
                "unknown buffer view target {}",
                other
            ))),
        }
    }
}

impl From<BufferTarget> for u32 {
    fn from(value: BufferTarget) -> Self {
        match value {
            BufferTarget::ArrayBuffer => 34962,
            BufferTarget::ElementArrayBuffer => 34963,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_json() {
        let json = serde_json::to_string(&ComponentType::Float).unwrap();
        assert_eq!(json, "5126");
        let ct: ComponentType = serde_json::from_str("5123").unwrap();
        assert_eq!(ct, ComponentType::UnsignedShort);
        assert!(serde_json::from_str::<ComponentType>("5124").is_err());
    }

    #[test]
    fn test_accessor_type_json() {
        assert_eq!(serde_json::to_string(&AccessorType::Vec3).unwrap(), "\"VEC3\"");
        let ty: AccessorType = serde_json::from_str("\"MAT4\"").unwrap();
        assert_eq!(ty, AccessorType::Mat4);
    }

    #[test]
    fn test_element_size_matrix_padding() {
        assert_eq!(element_size(AccessorType::Vec3, ComponentType::Float), 12);
        assert_eq!(element_size(AccessorType::Mat2, ComponentType::Byte), 8);
        assert_eq!(element_size(AccessorType::Mat3, ComponentType::Short), 24);
        assert_eq!(element_size(AccessorType::Mat4, ComponentType::UnsignedByte), 16);
    }

    #[test]
    fn test_primitive_mode_default() {
        assert_eq!(PrimitiveMode::default(), PrimitiveMode::Triangles);
        assert_eq!(u32::from(PrimitiveMode::Points), 0);
    }
}
