//! `EXT_mesh_features` and `EXT_instance_features`: feature-ID sets per
//! primitive and per instanced node.
//!
//! A set identifies features either through a `_FEATURE_ID_n` vertex (or
//! instance) attribute, through channels of a texture, or implicitly through
//! a property table alone.

use std::collections::HashSet;

use gltfx_core::builder::append_vertex_accessor;
use gltfx_core::bytes;
use gltfx_core::mesh::POSITION;
use gltfx_core::{
    Accessor, AccessorReader, AccessorType, ComponentType, Document, GltfError, NamedExtension, Primitive, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::instancing::{self, MeshGpuInstancing};
use crate::structural_metadata;

pub const MESH_FEATURES: &str = "EXT_mesh_features";
pub const INSTANCE_FEATURES: &str = "EXT_instance_features";

/// Prefix of feature-ID attributes; the set index follows.
pub const FEATURE_ID_PREFIX: &str = "_FEATURE_ID_";

fn default_channels() -> Vec<u8> {
    vec![0]
}

fn is_default_channels(channels: &[u8]) -> bool {
    channels == [0]
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureIdTexture {
    pub index: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
    #[serde(default = "default_channels", skip_serializing_if = "is_default_channels")]
    pub channels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureId {
    pub feature_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub null_feature_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Set index `n` of the `_FEATURE_ID_n` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<FeatureIdTexture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_table: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl FeatureId {
    pub fn new(feature_count: u32) -> Self {
        Self {
            feature_count,
            null_feature_id: None,
            label: None,
            attribute: None,
            texture: None,
            property_table: None,
            extras: None,
        }
    }

    /// Rejects a zero feature count, a set referencing both an attribute
    /// and a texture, a set referencing nothing, and bad texture channels.
    pub fn validate(&self) -> Result<()> {
        if self.feature_count == 0 {
            return Err(GltfError::invalid_input("featureCount must be positive"));
        }
        match (self.attribute, &self.texture, self.property_table) {
            (Some(_), Some(_), _) => {
                return Err(GltfError::invalid_input(
                    "a feature-ID set cannot use both an attribute and a texture",
                ))
            }
            (None, None, None) => {
                return Err(GltfError::invalid_input(
                    "a feature-ID set needs an attribute, a texture or a property table",
                ))
            }
            _ => {}
        }
        if let Some(texture) = &self.texture {
            if texture.channels.is_empty() || texture.channels.len() > 4 {
                return Err(GltfError::invalid_input(format!(
                    "feature-ID texture needs 1 to 4 channels, got {}",
                    texture.channels.len()
                )));
            }
            if let Some(&bad) = texture.channels.iter().find(|&&c| c > 3) {
                return Err(GltfError::invalid_input(format!("texture channel {} is not in 0..=3", bad)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshFeatures {
    pub feature_ids: Vec<FeatureId>,
}

impl NamedExtension for MeshFeatures {
    const NAME: &'static str = MESH_FEATURES;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceFeatures {
    pub feature_ids: Vec<FeatureId>,
}

impl NamedExtension for InstanceFeatures {
    const NAME: &'static str = INSTANCE_FEATURES;
}

fn feature_attribute_name(set: u32) -> String {
    format!("{}{}", FEATURE_ID_PREFIX, set)
}

/// Smallest `n` such that `_FEATURE_ID_n` is not in `names`.
fn next_set<'a>(names: impl Iterator<Item = &'a String>) -> u32 {
    let taken: HashSet<&str> = names.map(String::as_str).collect();
    (0..)
        .find(|&n| !taken.contains(feature_attribute_name(n).as_str()))
        .unwrap_or_default()
}

fn append_ids(doc: &mut Document, ids: &[u32]) -> Result<u32> {
    if ids.is_empty() {
        return Err(GltfError::invalid_input("no feature IDs given"));
    }
    let narrow = ids
        .iter()
        .map(|&id| {
            u16::try_from(id)
                .map_err(|_| GltfError::invalid_input(format!("feature ID {} does not fit in 16 bits", id)))
        })
        .collect::<Result<Vec<u16>>>()?;
    let accessor = Accessor::new(ComponentType::UnsignedShort, AccessorType::Scalar, ids.len());
    append_vertex_accessor(doc, &bytes::to_bytes(&narrow), accessor)
}

fn primitive_ref(doc: &Document, mesh: u32, primitive: usize) -> Result<&Primitive> {
    let primitives = &gltfx_core::error::get_checked(&doc.meshes, mesh, "mesh")?.primitives;
    primitives
        .get(primitive)
        .ok_or_else(|| GltfError::index_out_of_range("primitive", primitive, primitives.len()))
}

fn declare(doc: &mut Document, name: &str, feature: &FeatureId) {
    doc.mark_extension_used(name, false);
    if feature.property_table.is_some() {
        doc.mark_extension_used(structural_metadata::EXTENSION_NAME, false);
    }
}

/// Stores per-vertex feature IDs of a primitive as a new `_FEATURE_ID_n`
/// attribute and appends `feature`, wired to it, to the primitive's
/// feature-ID sets. Returns the set index `n`.
pub fn add_mesh_feature_ids(
    doc: &mut Document,
    mesh: u32,
    primitive: usize,
    ids: &[u32],
    mut feature: FeatureId,
) -> Result<u32> {
    let prim = primitive_ref(doc, mesh, primitive)?;
    if let Some(position) = prim.attribute(POSITION) {
        let vertices = doc.accessor(position)?.count;
        if vertices != ids.len() {
            return Err(GltfError::invalid_input(format!(
                "{} feature IDs for {} vertices",
                ids.len(),
                vertices
            )));
        }
    }
    let set = next_set(prim.attributes.keys());
    feature.attribute = Some(set);
    feature.texture = None;
    feature.validate()?;

    let accessor = append_ids(doc, ids)?;
    let prim = &mut doc.mesh_mut(mesh)?.primitives[primitive];
    prim.attributes.insert(feature_attribute_name(set), accessor);
    let mut ext = prim.extensions.read::<MeshFeatures>()?.unwrap_or_default();
    ext.feature_ids.push(feature.clone());
    prim.extensions.insert(ext);
    declare(doc, MESH_FEATURES, &feature);
    tracing::debug!(mesh, primitive, set, count = ids.len(), "added mesh feature IDs");
    Ok(set)
}

/// Appends a feature-ID set that does not store per-vertex IDs (texture or
/// property-table only) to a primitive.
pub fn add_mesh_feature_set(doc: &mut Document, mesh: u32, primitive: usize, feature: FeatureId) -> Result<()> {
    feature.validate()?;
    primitive_ref(doc, mesh, primitive)?;
    let prim = &mut doc.mesh_mut(mesh)?.primitives[primitive];
    if let Some(set) = feature.attribute {
        if prim.attribute(&feature_attribute_name(set)).is_none() {
            return Err(GltfError::invalid_input(format!(
                "primitive has no attribute {}",
                feature_attribute_name(set)
            )));
        }
    }
    let mut ext = prim.extensions.read::<MeshFeatures>()?.unwrap_or_default();
    ext.feature_ids.push(feature.clone());
    prim.extensions.insert(ext);
    declare(doc, MESH_FEATURES, &feature);
    Ok(())
}

/// Stores per-instance feature IDs on a node that already carries
/// `EXT_mesh_gpu_instancing`. Returns the set index `n`.
pub fn add_instance_feature_ids(doc: &mut Document, node: u32, ids: &[u32], mut feature: FeatureId) -> Result<u32> {
    let instances = instancing::instance_count(doc, node)?.ok_or_else(|| {
        GltfError::invalid_input(format!("node {} has no {}", node, instancing::EXTENSION_NAME))
    })?;
    if instances != ids.len() {
        return Err(GltfError::invalid_input(format!(
            "{} feature IDs for {} instances",
            ids.len(),
            instances
        )));
    }
    let mut gpu = doc
        .node_mut(node)?
        .extensions
        .read::<MeshGpuInstancing>()?
        .unwrap_or_default();
    let set = next_set(gpu.attributes.keys());
    feature.attribute = Some(set);
    feature.texture = None;
    feature.validate()?;

    let accessor = append_ids(doc, ids)?;
    gpu.attributes.insert(feature_attribute_name(set), accessor);
    let node_ref = doc.node_mut(node)?;
    node_ref.extensions.insert(gpu);
    let mut ext = node_ref.extensions.read::<InstanceFeatures>()?.unwrap_or_default();
    ext.feature_ids.push(feature.clone());
    node_ref.extensions.insert(ext);
    declare(doc, INSTANCE_FEATURES, &feature);
    Ok(set)
}

/// Reads the per-vertex IDs of feature-ID set `index` of a primitive.
pub fn read_feature_ids(doc: &Document, mesh: u32, primitive: usize, index: usize) -> Result<Vec<u32>> {
    let prim = primitive_ref(doc, mesh, primitive)?;
    let ext = prim
        .extensions
        .read::<MeshFeatures>()?
        .ok_or_else(|| GltfError::invalid_input(format!("primitive has no {}", MESH_FEATURES)))?;
    let len = ext.feature_ids.len();
    let feature = ext
        .feature_ids
        .get(index)
        .ok_or_else(|| GltfError::index_out_of_range("feature-ID set", index, len))?;
    let set = feature
        .attribute
        .ok_or_else(|| GltfError::invalid_input("feature-ID set has no attribute"))?;
    let name = feature_attribute_name(set);
    let accessor = prim
        .attribute(&name)
        .ok_or_else(|| GltfError::schema(format!("primitive has no attribute {}", name)))?;
    AccessorReader::new(doc).read_u32(accessor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instancing::{add_instances, Instances};
    use gltfx_core::{append_attribute, Column, Mesh, Node, Primitive, PrimitiveMode};
    use serde_json::json;

    fn triangle_doc() -> Document {
        let mut doc = Document::new();
        let positions = Column::Vec3F32(vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let position = append_attribute(&mut doc, &positions).unwrap();
        let mut prim = Primitive::new(PrimitiveMode::Triangles);
        prim.attributes.insert(POSITION.to_string(), position);
        doc.push_mesh(Mesh {
            primitives: vec![prim],
            ..Mesh::default()
        })
        .unwrap();
        doc
    }

    #[test]
    fn test_validation() {
        assert!(FeatureId::new(0).validate().is_err());
        assert!(FeatureId::new(3).validate().is_err());
        let mut both = FeatureId::new(3);
        both.attribute = Some(0);
        both.texture = Some(FeatureIdTexture {
            index: 0,
            tex_coord: 0,
            channels: vec![0],
        });
        assert!(both.validate().is_err());
        both.attribute = None;
        assert!(both.validate().is_ok());
        both.texture = Some(FeatureIdTexture {
            index: 0,
            tex_coord: 0,
            channels: vec![0, 4],
        });
        assert!(both.validate().is_err());
        let mut table_only = FeatureId::new(2);
        table_only.property_table = Some(0);
        assert!(table_only.validate().is_ok());
    }

    #[test]
    fn test_json_defaults() {
        let feature: FeatureId = serde_json::from_value(json!({
            "featureCount": 4,
            "texture": { "index": 1 }
        }))
        .unwrap();
        assert_eq!(feature.texture.as_ref().unwrap().channels, vec![0]);
        assert_eq!(
            serde_json::to_value(&feature).unwrap(),
            json!({ "featureCount": 4, "texture": { "index": 1 } })
        );
    }

    #[test]
    fn test_mesh_feature_ids_roundtrip() {
        let mut doc = triangle_doc();
        let mut feature = FeatureId::new(2);
        feature.property_table = Some(0);
        let set = add_mesh_feature_ids(&mut doc, 0, 0, &[0, 1, 1], feature).unwrap();
        assert_eq!(set, 0);
        let prim = &doc.meshes[0].primitives[0];
        let accessor = prim.attribute("_FEATURE_ID_0").unwrap();
        assert_eq!(doc.accessors[accessor as usize].component_type, ComponentType::UnsignedShort);
        assert!(doc.is_extension_used(MESH_FEATURES));
        assert!(doc.is_extension_used(structural_metadata::EXTENSION_NAME));
        assert_eq!(read_feature_ids(&doc, 0, 0, 0).unwrap(), vec![0, 1, 1]);

        let second = add_mesh_feature_ids(&mut doc, 0, 0, &[2, 2, 2], FeatureId::new(3)).unwrap();
        assert_eq!(second, 1);
        assert_eq!(read_feature_ids(&doc, 0, 0, 1).unwrap(), vec![2, 2, 2]);
    }

    #[test]
    fn test_mesh_feature_id_errors() {
        let mut doc = triangle_doc();
        assert!(add_mesh_feature_ids(&mut doc, 0, 0, &[0, 1], FeatureId::new(2)).is_err());
        assert!(add_mesh_feature_ids(&mut doc, 0, 0, &[0, 1, 70_000], FeatureId::new(2)).is_err());
        assert!(add_mesh_feature_ids(&mut doc, 0, 1, &[0, 1, 2], FeatureId::new(2)).is_err());
        assert!(!doc.is_extension_used(MESH_FEATURES));
    }

    #[test]
    fn test_instance_feature_ids() {
        let mut doc = Document::new();
        let node = doc.push_node(Node::new()).unwrap();
        assert!(add_instance_feature_ids(&mut doc, node, &[0], FeatureId::new(1)).is_err());

        let instances = Instances {
            translations: vec![[0.0; 3]; 3],
            rotations: vec![[0.0, 0.0, 0.0, 1.0]; 3],
            scales: vec![[1.0; 3]; 3],
        };
        add_instances(&mut doc, node, &instances).unwrap();
        let set = add_instance_feature_ids(&mut doc, node, &[5, 6, 7], FeatureId::new(8)).unwrap();
        assert_eq!(set, 0);

        let gpu = doc.nodes[0].extensions.read::<MeshGpuInstancing>().unwrap().unwrap();
        let accessor = gpu.attributes["_FEATURE_ID_0"];
        assert_eq!(AccessorReader::new(&doc).read_u32(accessor).unwrap(), vec![5, 6, 7]);
        instancing::validate(&doc, &gpu).unwrap();
        let features = doc.nodes[0].extensions.read::<InstanceFeatures>().unwrap().unwrap();
        assert_eq!(features.feature_ids[0].attribute, Some(0));
        assert!(doc.is_extension_used(INSTANCE_FEATURES));
    }
}
