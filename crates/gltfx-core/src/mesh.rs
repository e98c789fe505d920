//! Meshes and primitives.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extension::Extensions;
use crate::types::PrimitiveMode;

pub const POSITION: &str = "POSITION";
pub const NORMAL: &str = "NORMAL";
pub const TANGENT: &str = "TANGENT";

/// Attribute name to accessor index, in insertion order.
pub type AttributeMap = IndexMap<String, u32>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<f32>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

/// Geometry drawn with one material.
///
/// While a compression extension owns the geometry, `attributes` and
/// `indices` may be empty or refer to accessors without a buffer view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Primitive {
    #[serde(default)]
    pub attributes: AttributeMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<u32>,
    #[serde(default, skip_serializing_if = "PrimitiveMode::is_default")]
    pub mode: PrimitiveMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<AttributeMap>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Primitive {
    pub fn new(mode: PrimitiveMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    /// First unused `{prefix}{n}` attribute name, e.g. `_FEATURE_ID_0`.
    pub fn next_attribute_name(&self, prefix: &str) -> String {
        (0..)
            .map(|n| format!("{}{}", prefix, n))
            .find(|name| !self.attributes.contains_key(name))
            .unwrap_or_else(|| prefix.to_string())
    }
}

/// Semantic prefix of an attribute name: `TEXCOORD_1` -> `TEXCOORD`.
pub fn semantic_prefix(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((prefix, set)) if !prefix.is_empty() && set.chars().all(|c| c.is_ascii_digit()) => {
            prefix
        }
        _ => name,
    }
}
