//! `KHR_draco_mesh_compression` adapter.
//!
//! The Draco bitstream itself is produced and consumed by a [`DracoEngine`];
//! this module moves geometry between primitives and the engine:
//!
//! - [`decode_all`] expands every compressed primitive into plain accessors.
//! - [`encode_all`] hands every triangle primitive to the engine and leaves
//!   accessors without a buffer view in place of the original attributes.

use gltfx_core::builder::{append_bytes, append_indices, append_vertex_accessor, index_component_type};
use gltfx_core::bytes;
use gltfx_core::mesh::semantic_prefix;
use gltfx_core::{
    Accessor, AccessorReader, AccessorType, ComponentType, Document, GltfError, NamedExtension, PrimitiveMode,
    Result,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EXTENSION_NAME: &str = "KHR_draco_mesh_compression";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoMeshCompression {
    pub buffer_view: u32,
    /// Attribute semantic to Draco attribute unique id.
    #[serde(default)]
    pub attributes: IndexMap<String, u32>,
}

impl NamedExtension for DracoMeshCompression {
    const NAME: &'static str = EXTENSION_NAME;
}

/// Errors reported by a [`DracoEngine`].
#[derive(Error, Debug)]
pub enum DracoEngineError {
    #[error("Draco decode error: {0}")]
    Decode(String),

    #[error("Draco encode error: {0}")]
    Encode(String),

    #[error("Unsupported Draco geometry: {0}")]
    Unsupported(String),
}

impl From<DracoEngineError> for GltfError {
    fn from(err: DracoEngineError) -> Self {
        GltfError::codec(err.to_string())
    }
}

/// One attribute of decoded or to-be-encoded geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DracoAttribute {
    pub unique_id: u32,
    /// glTF semantic the attribute is bound to, e.g. `TEXCOORD_0`.
    pub name: String,
    pub components: usize,
    /// `count * components` values, integer attributes widened to `f32`.
    pub values: Vec<f32>,
}

impl DracoAttribute {
    pub fn count(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.values.len() / self.components
        }
    }
}

/// Indexed triangle geometry exchanged with the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DracoMesh {
    pub attributes: Vec<DracoAttribute>,
    pub indices: Vec<u32>,
}

impl DracoMesh {
    pub fn attribute(&self, unique_id: u32) -> Option<&DracoAttribute> {
        self.attributes.iter().find(|a| a.unique_id == unique_id)
    }
}

/// Quantization bits and effort passed to the engine on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DracoOptions {
    pub position: u32,
    pub normal: u32,
    pub color: u32,
    pub texcoord: u32,
    pub generic: u32,
    /// 0 (fastest) to 10 (smallest).
    pub compression_level: u32,
}

impl Default for DracoOptions {
    fn default() -> Self {
        Self {
            position: 14,
            normal: 10,
            color: 8,
            texcoord: 12,
            generic: 8,
            compression_level: 7,
        }
    }
}

impl DracoOptions {
    pub fn bits_for(&self, name: &str) -> u32 {
        match semantic_prefix(name) {
            "POSITION" => self.position,
            "NORMAL" | "TANGENT" => self.normal,
            "COLOR" => self.color,
            "TEXCOORD" => self.texcoord,
            _ => self.generic,
        }
    }
}

/// The external Draco mesh codec.
pub trait DracoEngine {
    fn decode(&self, data: &[u8]) -> std::result::Result<DracoMesh, DracoEngineError>;

    fn encode(&self, mesh: &DracoMesh, options: &DracoOptions) -> std::result::Result<Vec<u8>, DracoEngineError>;
}

/// Accessor layout a decoded attribute must have. Semantics outside the
/// table keep the engine's component count as float data.
fn attribute_layout(name: &str, components: usize) -> Result<(AccessorType, ComponentType)> {
    let expected = match name {
        "POSITION" | "NORMAL" => Some((AccessorType::Vec3, ComponentType::Float)),
        "TEXCOORD_0" | "TEXCOORD_1" => Some((AccessorType::Vec2, ComponentType::Float)),
        "COLOR_0" | "TANGENT" | "WEIGHTS_0" => Some((AccessorType::Vec4, ComponentType::Float)),
        "JOINTS_0" => Some((AccessorType::Vec4, ComponentType::UnsignedShort)),
        _ => None,
    };
    match expected {
        Some((accessor_type, component_type)) if accessor_type.components() == components => {
            Ok((accessor_type, component_type))
        }
        Some((accessor_type, _)) => Err(GltfError::codec(format!(
            "Draco attribute {} has {} components, expected {}",
            name, components, accessor_type
        ))),
        None => AccessorType::vector(components)
            .map(|accessor_type| (accessor_type, ComponentType::Float))
            .ok_or_else(|| {
                GltfError::codec(format!("Draco attribute {} has {} components", name, components))
            }),
    }
}

fn bounds(values: &[f32], components: usize) -> (Vec<f64>, Vec<f64>) {
    let mut min = vec![f64::INFINITY; components];
    let mut max = vec![f64::NEG_INFINITY; components];
    for row in values.chunks_exact(components) {
        for (k, &v) in row.iter().enumerate() {
            min[k] = min[k].min(f64::from(v));
            max[k] = max[k].max(f64::from(v));
        }
    }
    (min, max)
}

fn write_attribute(doc: &mut Document, attribute: &DracoAttribute) -> Result<u32> {
    let (accessor_type, component_type) = attribute_layout(&attribute.name, attribute.components)?;
    if attribute.values.len() % attribute.components != 0 {
        return Err(GltfError::codec(format!(
            "Draco attribute {} has {} values for {} components",
            attribute.name,
            attribute.values.len(),
            attribute.components
        )));
    }
    let count = attribute.count();
    let mut accessor = Accessor::new(component_type, accessor_type, count);
    let data = if component_type == ComponentType::UnsignedShort {
        let joints = attribute
            .values
            .iter()
            .map(|&v| {
                if v.fract() == 0.0 && (0.0..=f32::from(u16::MAX)).contains(&v) {
                    Ok(v as u16)
                } else {
                    Err(GltfError::codec(format!("joint index {} is not a u16", v)))
                }
            })
            .collect::<Result<Vec<u16>>>()?;
        bytes::to_bytes(&joints)
    } else {
        if count > 0 {
            let (min, max) = bounds(&attribute.values, attribute.components);
            accessor.min = min;
            accessor.max = max;
        }
        bytes::f32_to_bytes(&attribute.values)
    };
    append_vertex_accessor(doc, &data, accessor)
}

/// Decodes every Draco-compressed primitive with `engine` and removes the
/// extension. Returns the number of primitives decoded.
pub fn decode_all(doc: &mut Document, engine: &dyn DracoEngine) -> Result<usize> {
    let mut decoded = 0;
    for mesh in 0..doc.meshes.len() {
        for p in 0..doc.meshes[mesh].primitives.len() {
            let Some(ext) = doc.meshes[mesh].primitives[p].extensions.read::<DracoMeshCompression>()? else {
                continue;
            };
            let geometry = engine.decode(doc.view_data(ext.buffer_view)?)?;

            let mut attributes = Vec::with_capacity(ext.attributes.len());
            for (name, &id) in &ext.attributes {
                let attribute = geometry.attribute(id).ok_or_else(|| {
                    GltfError::codec(format!("Draco stream has no attribute {} for {}", id, name))
                })?;
                let bound = DracoAttribute {
                    name: name.clone(),
                    ..attribute.clone()
                };
                attributes.push((name.clone(), write_attribute(doc, &bound)?));
            }
            let indices = if geometry.indices.is_empty() {
                None
            } else {
                Some(append_indices(doc, &geometry.indices)?)
            };

            let prim = &mut doc.meshes[mesh].primitives[p];
            for (name, accessor) in attributes {
                prim.attributes.insert(name, accessor);
            }
            if indices.is_some() {
                prim.indices = indices;
            }
            prim.extensions.remove(EXTENSION_NAME);
            tracing::debug!(
                mesh,
                primitive = p,
                indices = geometry.indices.len(),
                "decoded Draco primitive"
            );
            decoded += 1;
        }
    }
    doc.unmark_extension(EXTENSION_NAME);
    Ok(decoded)
}

/// Reads one primitive attribute as engine input.
fn collect_attribute(doc: &Document, name: &str, index: u32, unique_id: u32) -> Result<DracoAttribute> {
    let accessor = doc.accessor(index)?;
    let components = accessor.accessor_type.components();
    let reader = AccessorReader::new(doc);
    let values = if semantic_prefix(name) == "JOINTS" {
        reader.read_u32(index)?.into_iter().map(|j| j as f32).collect()
    } else {
        reader.read_f32(index)?
    };
    Ok(DracoAttribute {
        unique_id,
        name: name.to_string(),
        components,
        values,
    })
}

/// Placeholder accessor describing data that only exists in the Draco stream.
fn sentinel(doc: &mut Document, attribute: &DracoAttribute, source: &Accessor) -> Result<u32> {
    let (accessor_type, component_type) = attribute_layout(&attribute.name, attribute.components)?;
    let mut accessor = Accessor::new(component_type, accessor_type, attribute.count());
    if source.component_type.is_float() {
        accessor.min = source.min.clone();
        accessor.max = source.max.clone();
    }
    doc.push_accessor(accessor)
}

/// Compresses every uncompressed triangle primitive with `engine`. Returns
/// the number of primitives encoded.
pub fn encode_all(doc: &mut Document, engine: &dyn DracoEngine, options: &DracoOptions) -> Result<usize> {
    let mut encoded = 0;
    for mesh in 0..doc.meshes.len() {
        for p in 0..doc.meshes[mesh].primitives.len() {
            let prim = &doc.meshes[mesh].primitives[p];
            if prim.mode != PrimitiveMode::Triangles
                || prim.attributes.is_empty()
                || prim.extensions.contains(EXTENSION_NAME)
            {
                continue;
            }
            let prim = prim.clone();

            let mut geometry = DracoMesh::default();
            for (id, (name, &index)) in prim.attributes.iter().enumerate() {
                let id = u32::try_from(id).map_err(|_| GltfError::invalid_input("too many attributes"))?;
                geometry.attributes.push(collect_attribute(doc, name, index, id)?);
            }
            geometry.indices = match prim.indices {
                Some(index) => AccessorReader::new(doc).read_u32(index)?,
                None => {
                    let count = geometry.attributes.first().map_or(0, DracoAttribute::count);
                    (0..count as u32).collect()
                }
            };

            let data = engine.encode(&geometry, options)?;
            let view = append_bytes(doc, &data, None, None)?;

            let mut ext = DracoMeshCompression {
                buffer_view: view,
                attributes: IndexMap::new(),
            };
            let mut attributes = IndexMap::new();
            for attribute in &geometry.attributes {
                let source = doc.accessor(prim.attributes[&attribute.name])?.clone();
                attributes.insert(attribute.name.clone(), sentinel(doc, attribute, &source)?);
                ext.attributes.insert(attribute.name.clone(), attribute.unique_id);
            }
            let max_index = geometry.indices.iter().copied().max().unwrap_or(0);
            let indices = doc.push_accessor(Accessor::new(
                index_component_type(max_index),
                AccessorType::Scalar,
                geometry.indices.len(),
            ))?;

            let target = &mut doc.meshes[mesh].primitives[p];
            target.attributes = attributes;
            target.indices = Some(indices);
            target.extensions.insert(ext);
            tracing::debug!(mesh, primitive = p, bytes = data.len(), "encoded Draco primitive");
            encoded += 1;
        }
    }
    if encoded > 0 {
        doc.mark_extension_used(EXTENSION_NAME, true);
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltfx_core::{append_attribute, Column, Mesh, Primitive};

    /// Stores the geometry as JSON in place of a Draco bitstream.
    struct JsonEngine;

    impl DracoEngine for JsonEngine {
        fn decode(&self, data: &[u8]) -> std::result::Result<DracoMesh, DracoEngineError> {
            serde_json::from_slice(data).map_err(|e| DracoEngineError::Decode(e.to_string()))
        }

        fn encode(&self, mesh: &DracoMesh, _: &DracoOptions) -> std::result::Result<Vec<u8>, DracoEngineError> {
            serde_json::to_vec(mesh).map_err(|e| DracoEngineError::Encode(e.to_string()))
        }
    }

    struct FailingEngine;

    impl DracoEngine for FailingEngine {
        fn decode(&self, _: &[u8]) -> std::result::Result<DracoMesh, DracoEngineError> {
            Err(DracoEngineError::Decode("corrupt header".to_string()))
        }

        fn encode(&self, _: &DracoMesh, _: &DracoOptions) -> std::result::Result<Vec<u8>, DracoEngineError> {
            Err(DracoEngineError::Unsupported("no faces".to_string()))
        }
    }

    fn triangle_doc() -> Document {
        let mut doc = Document::new();
        let position = append_attribute(
            &mut doc,
            &Column::Vec3F32(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
        )
        .unwrap();
        let uv = append_attribute(&mut doc, &Column::Vec2F32(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])).unwrap();
        let indices = append_indices(&mut doc, &[0, 1, 2]).unwrap();
        let mut prim = Primitive::new(PrimitiveMode::Triangles);
        prim.attributes.insert("POSITION".to_string(), position);
        prim.attributes.insert("TEXCOORD_0".to_string(), uv);
        prim.indices = Some(indices);
        doc.push_mesh(Mesh {
            primitives: vec![prim],
            ..Mesh::default()
        })
        .unwrap();
        doc
    }

    #[test]
    fn test_encode_then_decode() {
        let mut doc = triangle_doc();
        assert_eq!(encode_all(&mut doc, &JsonEngine, &DracoOptions::default()).unwrap(), 1);
        assert!(doc.is_extension_required(EXTENSION_NAME));

        let prim = &doc.meshes[0].primitives[0];
        let ext = prim.extensions.read::<DracoMeshCompression>().unwrap().unwrap();
        assert_eq!(ext.attributes["POSITION"], 0);
        assert_eq!(ext.attributes["TEXCOORD_0"], 1);
        let position = prim.attribute("POSITION").unwrap();
        assert!(doc.accessors[position as usize].buffer_view.is_none());
        assert_eq!(doc.accessors[position as usize].max, vec![1.0, 1.0, 0.0]);
        assert!(doc.accessors[prim.indices.unwrap() as usize].buffer_view.is_none());

        // Encoding again leaves compressed primitives alone.
        assert_eq!(encode_all(&mut doc, &JsonEngine, &DracoOptions::default()).unwrap(), 0);

        assert_eq!(decode_all(&mut doc, &JsonEngine).unwrap(), 1);
        assert!(!doc.is_extension_used(EXTENSION_NAME));
        let prim = &doc.meshes[0].primitives[0];
        let reader = AccessorReader::new(&doc);
        assert_eq!(
            reader.read_f32(prim.attribute("POSITION").unwrap()).unwrap(),
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
        let indices = prim.indices.unwrap();
        assert_eq!(doc.accessors[indices as usize].component_type, ComponentType::UnsignedByte);
        assert_eq!(reader.read_u32(indices).unwrap(), vec![0, 1, 2]);
        doc.validate_layout().unwrap();
    }

    #[test]
    fn test_decode_enforces_layout_table() {
        let mut doc = triangle_doc();
        let geometry = DracoMesh {
            attributes: vec![
                DracoAttribute {
                    unique_id: 4,
                    name: String::new(),
                    components: 2,
                    values: vec![0.0; 6],
                },
                DracoAttribute {
                    unique_id: 7,
                    name: String::new(),
                    components: 4,
                    values: vec![0.0, 1.0, 2.0, 3.0],
                },
            ],
            indices: vec![0, 1, 2],
        };
        let view = append_bytes(&mut doc, &serde_json::to_vec(&geometry).unwrap(), None, None).unwrap();
        let mut ext = DracoMeshCompression {
            buffer_view: view,
            attributes: IndexMap::new(),
        };
        ext.attributes.insert("JOINTS_0".to_string(), 7);
        doc.meshes[0].primitives[0].extensions.insert(ext.clone());
        assert_eq!(decode_all(&mut doc, &JsonEngine).unwrap(), 1);
        let joints = doc.meshes[0].primitives[0].attribute("JOINTS_0").unwrap();
        assert_eq!(doc.accessors[joints as usize].component_type, ComponentType::UnsignedShort);
        assert_eq!(AccessorReader::new(&doc).read_u32(joints).unwrap(), vec![0, 1, 2, 3]);

        ext.attributes.clear();
        ext.attributes.insert("NORMAL".to_string(), 4);
        doc.meshes[0].primitives[0].extensions.insert(ext);
        assert!(matches!(
            decode_all(&mut doc, &JsonEngine),
            Err(GltfError::CodecFailure(_))
        ));
    }

    #[test]
    fn test_engine_and_view_errors() {
        let mut doc = triangle_doc();
        assert!(matches!(
            encode_all(&mut doc, &FailingEngine, &DracoOptions::default()),
            Err(GltfError::CodecFailure(_))
        ));

        let mut doc = triangle_doc();
        doc.meshes[0].primitives[0].extensions.insert(DracoMeshCompression {
            buffer_view: 99,
            attributes: IndexMap::new(),
        });
        assert!(matches!(
            decode_all(&mut doc, &JsonEngine),
            Err(GltfError::IndexOutOfRange { .. })
        ));

        doc.meshes[0].primitives[0].extensions.insert(DracoMeshCompression {
            buffer_view: 0,
            attributes: IndexMap::new(),
        });
        assert!(matches!(
            decode_all(&mut doc, &FailingEngine),
            Err(GltfError::CodecFailure(_))
        ));
    }

    #[test]
    fn test_options() {
        let options = DracoOptions::default();
        assert_eq!(options.bits_for("POSITION"), 14);
        assert_eq!(options.bits_for("TEXCOORD_3"), 12);
        assert_eq!(options.bits_for("_BATCHID"), 8);
        let parsed: DracoOptions = serde_json::from_str(r#"{"compression_level":10}"#).unwrap();
        assert_eq!(parsed.compression_level, 10);
        assert_eq!(parsed.position, 14);
    }
}
