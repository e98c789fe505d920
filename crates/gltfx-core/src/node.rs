//! Scene-graph nodes and their transform defaults.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::extension::Extensions;

/// Column-major 4x4 identity.
pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

pub const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const UNIT_SCALE: [f32; 3] = [1.0, 1.0, 1.0];
pub const ZERO_TRANSLATION: [f32; 3] = [0.0, 0.0, 0.0];

/// A node in the scene forest.
///
/// Deserialization starts from [`Node::default`], so absent transform fields
/// come back as identity. Serialization omits every field equal to its
/// default and never emits `matrix` together with TRS: a non-identity matrix
/// is written alone, otherwise the non-default TRS components are.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    pub name: Option<String>,
    pub camera: Option<u32>,
    pub children: Vec<u32>,
    pub skin: Option<u32>,
    pub mesh: Option<u32>,
    pub matrix: [f32; 16],
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub weights: Vec<f32>,
    pub extensions: Extensions,
    pub extras: Option<Value>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: None,
            camera: None,
            children: Vec::new(),
            skin: None,
            mesh: None,
            matrix: IDENTITY_MATRIX,
            translation: ZERO_TRANSLATION,
            rotation: IDENTITY_ROTATION,
            scale: UNIT_SCALE,
            weights: Vec::new(),
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera: Option<u32>,
    #[serde(skip_serializing_if = "<[u32]>::is_empty")]
    children: &'a [u32],
    #[serde(skip_serializing_if = "Option::is_none")]
    skin: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    matrix: Option<&'a [f32; 16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation: Option<&'a [f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<&'a [f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<&'a [f32; 3]>,
    #[serde(skip_serializing_if = "<[f32]>::is_empty")]
    weights: &'a [f32],
    #[serde(skip_serializing_if = "Extensions::is_empty")]
    extensions: &'a Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    extras: Option<&'a Value>,
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let use_matrix = self.matrix != IDENTITY_MATRIX;
        let trs = |is_default: bool| !use_matrix && !is_default;
        NodeOut {
            name: self.name.as_deref(),
            camera: self.camera,
            children: &self.children,
            skin: self.skin,
            mesh: self.mesh,
            matrix: use_matrix.then_some(&self.matrix),
            translation: trs(self.translation == ZERO_TRANSLATION).then_some(&self.translation),
            rotation: trs(self.rotation == IDENTITY_ROTATION).then_some(&self.rotation),
            scale: trs(self.scale == UNIT_SCALE).then_some(&self.scale),
            weights: &self.weights,
            extensions: &self.extensions,
            extras: self.extras.as_ref(),
        }
        .serialize(serializer)
    }
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mesh(mesh: u32) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::default()
        }
    }

    pub fn has_matrix(&self) -> bool {
        self.matrix != IDENTITY_MATRIX
    }

    /// Local transform as a column-major matrix, T * R * S unless a matrix is set.
    pub fn local_matrix(&self) -> [f32; 16] {
        if self.has_matrix() {
            return self.matrix;
        }
        let [x, y, z, w] = self.rotation;
        let [sx, sy, sz] = self.scale;
        let [tx, ty, tz] = self.translation;
        [
            (1.0 - 2.0 * (y * y + z * z)) * sx,
            (2.0 * (x * y + z * w)) * sx,
            (2.0 * (x * z - y * w)) * sx,
            0.0,
            (2.0 * (x * y - z * w)) * sy,
            (1.0 - 2.0 * (x * x + z * z)) * sy,
            (2.0 * (y * z + x * w)) * sy,
            0.0,
            (2.0 * (x * z + y * w)) * sz,
            (2.0 * (y * z - x * w)) * sz,
            (1.0 - 2.0 * (x * x + y * y)) * sz,
            0.0,
            tx,
            ty,
            tz,
            1.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_node_encodes_to_empty_object() {
        assert_eq!(serde_json::to_string(&Node::default()).unwrap(), "{}");
    }

    #[test]
    fn test_partial_node_gets_defaults() {
        let node: Node = serde_json::from_str(r#"{"translation":[1,2,3]}"#).unwrap();
        assert_eq!(node.translation, [1.0, 2.0, 3.0]);
        assert_eq!(node.rotation, IDENTITY_ROTATION);
        assert_eq!(node.scale, UNIT_SCALE);
        assert_eq!(node.matrix, IDENTITY_MATRIX);
    }

    #[test]
    fn test_matrix_suppresses_trs() {
        let mut node = Node::default();
        node.matrix[12] = 5.0;
        node.scale = [2.0, 2.0, 2.0];
        let value = serde_json::to_value(&node).unwrap();
        assert!(value.get("matrix").is_some());
        assert!(value.get("scale").is_none());
    }

    #[test]
    fn test_only_non_default_trs_emitted() {
        let node = Node {
            scale: [2.0, 1.0, 1.0],
            mesh: Some(0),
            ..Node::default()
        };
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({"mesh": 0, "scale": [2.0, 1.0, 1.0]})
        );
    }

    #[test]
    fn test_local_matrix_from_trs() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let node = Node {
            translation: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, half, half],
            ..Node::default()
        };
        let m = node.local_matrix();
        // 90 degrees about Z maps +X to +Y.
        assert!((m[0]).abs() < 1e-6);
        assert!((m[1] - 1.0).abs() < 1e-6);
        assert!((m[4] + 1.0).abs() < 1e-6);
        assert_eq!(&m[12..15], &[1.0, 2.0, 3.0]);
    }
}
