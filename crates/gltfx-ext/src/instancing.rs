//! `EXT_mesh_gpu_instancing`: per-instance transforms on a node.

use gltfx_core::builder::append_bytes;
use gltfx_core::bytes;
use gltfx_core::{Accessor, AccessorReader, AccessorType, ComponentType, Document, GltfError, NamedExtension, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EXTENSION_NAME: &str = "EXT_mesh_gpu_instancing";

pub const TRANSLATION: &str = "TRANSLATION";
pub const ROTATION: &str = "ROTATION";
pub const SCALE: &str = "SCALE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshGpuInstancing {
    pub attributes: IndexMap<String, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl NamedExtension for MeshGpuInstancing {
    const NAME: &'static str = EXTENSION_NAME;
}

/// Per-instance transforms; all three vectors have one entry per instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instances {
    pub translations: Vec<[f32; 3]>,
    pub rotations: Vec<[f32; 4]>,
    pub scales: Vec<[f32; 3]>,
}

impl Instances {
    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }
}

/// Writes the transforms into one buffer view (translations, then
/// rotations, then scales), creates one accessor per attribute and attaches
/// the extension to `node`. Custom attributes already on the node are kept.
pub fn add_instances(doc: &mut Document, node: u32, instances: &Instances) -> Result<MeshGpuInstancing> {
    let n = instances.len();
    if n == 0 {
        return Err(GltfError::invalid_input("no instances given"));
    }
    if instances.rotations.len() != n || instances.scales.len() != n {
        return Err(GltfError::invalid_input(format!(
            "instance arrays differ in length: {} translations, {} rotations, {} scales",
            n,
            instances.rotations.len(),
            instances.scales.len()
        )));
    }
    doc.node_mut(node)?;

    let flat = |rows: &[[f32; 3]]| rows.iter().flatten().copied().collect::<Vec<f32>>();
    let mut data = bytes::f32_to_bytes(&flat(&instances.translations));
    data.extend_from_slice(&bytes::f32_to_bytes(
        &instances.rotations.iter().flatten().copied().collect::<Vec<f32>>(),
    ));
    data.extend_from_slice(&bytes::f32_to_bytes(&flat(&instances.scales)));
    let view = append_bytes(doc, &data, None, None)?;

    let mut ext = MeshGpuInstancing::default();
    for (name, accessor_type, offset) in [
        (TRANSLATION, AccessorType::Vec3, 0),
        (ROTATION, AccessorType::Vec4, 12 * n),
        (SCALE, AccessorType::Vec3, 28 * n),
    ] {
        let accessor = Accessor {
            buffer_view: Some(view),
            byte_offset: offset,
            ..Accessor::new(ComponentType::Float, accessor_type, n)
        };
        ext.attributes.insert(name.to_string(), doc.push_accessor(accessor)?);
    }

    let node = doc.node_mut(node)?;
    if let Some(existing) = node.extensions.read::<MeshGpuInstancing>()? {
        for (name, accessor) in existing.attributes {
            ext.attributes.entry(name).or_insert(accessor);
        }
        ext.extras = existing.extras;
    }
    node.extensions.insert(ext.clone());
    doc.mark_extension_used(EXTENSION_NAME, false);
    tracing::debug!(instances = n, view, "added GPU instances");
    Ok(ext)
}

/// Checks that every attribute has the same count, that the standard
/// attributes have their required layout, and that custom names start
/// with `_`.
pub fn validate(doc: &Document, ext: &MeshGpuInstancing) -> Result<()> {
    let mut count = None;
    for (name, &index) in &ext.attributes {
        let accessor = doc.accessor(index)?;
        let layout_ok = match name.as_str() {
            TRANSLATION | SCALE => {
                accessor.accessor_type == AccessorType::Vec3 && accessor.component_type == ComponentType::Float
            }
            ROTATION => accessor.accessor_type == AccessorType::Vec4,
            custom if custom.starts_with('_') => true,
            custom => {
                return Err(GltfError::schema(format!(
                    "instance attribute {:?} must start with '_'",
                    custom
                )))
            }
        };
        if !layout_ok {
            return Err(GltfError::schema(format!(
                "instance attribute {} has layout {:?} {:?}",
                name, accessor.accessor_type, accessor.component_type
            )));
        }
        match count {
            None => count = Some(accessor.count),
            Some(expected) if expected != accessor.count => {
                return Err(GltfError::invalid_input(format!(
                    "instance attribute {} has {} elements, expected {}",
                    name, accessor.count, expected
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Number of instances declared on `node`, or `None` without the extension.
pub fn instance_count(doc: &Document, node: u32) -> Result<Option<usize>> {
    let node = gltfx_core::error::get_checked(&doc.nodes, node, "node")?;
    let Some(ext) = node.extensions.read::<MeshGpuInstancing>()? else {
        return Ok(None);
    };
    match ext.attributes.values().next() {
        Some(&index) => Ok(Some(doc.accessor(index)?.count)),
        None => Ok(Some(0)),
    }
}

pub(crate) fn rows<const N: usize>(values: Vec<f32>) -> Vec<[f32; N]> {
    values
        .chunks_exact(N)
        .map(|c| {
            let mut row = [0.0; N];
            row.copy_from_slice(c);
            row
        })
        .collect()
}

/// Reads the transforms of `node`; absent attributes come back as identity.
pub fn read_instances(doc: &Document, node: u32) -> Result<Instances> {
    let ext = gltfx_core::error::get_checked(&doc.nodes, node, "node")?
        .extensions
        .read::<MeshGpuInstancing>()?
        .ok_or_else(|| GltfError::invalid_input(format!("node {} has no {}", node, EXTENSION_NAME)))?;
    validate(doc, &ext)?;
    let n = instance_count(doc, node)?.unwrap_or(0);
    let reader = AccessorReader::new(doc);
    let read = |name: &str| ext.attributes.get(name).map(|&index| reader.read_f32(index)).transpose();

    Ok(Instances {
        translations: read(TRANSLATION)?.map_or_else(|| vec![[0.0; 3]; n], rows),
        rotations: read(ROTATION)?.map_or_else(|| vec![[0.0, 0.0, 0.0, 1.0]; n], rows),
        scales: read(SCALE)?.map_or_else(|| vec![[1.0; 3]; n], rows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltfx_core::Node;

    fn sample() -> Instances {
        Instances {
            translations: vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            rotations: vec![[0.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0]],
            scales: vec![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]],
        }
    }

    #[test]
    fn test_layout_and_offsets() {
        let mut doc = Document::new();
        let node = doc.push_node(Node::new()).unwrap();
        let ext = add_instances(&mut doc, node, &sample()).unwrap();

        let offsets: Vec<usize> = ext
            .attributes
            .values()
            .map(|&i| doc.accessors[i as usize].byte_offset)
            .collect();
        assert_eq!(offsets, vec![0, 24, 56]);
        assert_eq!(doc.buffer_views[0].byte_length, 80);
        assert!(doc.is_extension_used(EXTENSION_NAME));
        assert!(!doc.is_extension_required(EXTENSION_NAME));
        validate(&doc, &ext).unwrap();
        doc.validate_layout().unwrap();
    }

    #[test]
    fn test_read_back() {
        let mut doc = Document::new();
        let node = doc.push_node(Node::new()).unwrap();
        add_instances(&mut doc, node, &sample()).unwrap();
        assert_eq!(read_instances(&doc, node).unwrap(), sample());
        assert_eq!(instance_count(&doc, node).unwrap(), Some(2));
    }

    #[test]
    fn test_mismatched_lengths() {
        let mut doc = Document::new();
        let node = doc.push_node(Node::new()).unwrap();
        let mut instances = sample();
        instances.scales.pop();
        assert!(matches!(
            add_instances(&mut doc, node, &instances),
            Err(GltfError::InvalidInput(_))
        ));
        assert!(add_instances(&mut doc, node, &Instances::default()).is_err());
    }

    #[test]
    fn test_validator_rules() {
        let mut doc = Document::new();
        let node = doc.push_node(Node::new()).unwrap();
        let mut ext = add_instances(&mut doc, node, &sample()).unwrap();

        let mut custom = ext.clone();
        custom.attributes.insert("ID".to_string(), ext.attributes[TRANSLATION]);
        assert!(validate(&doc, &custom).is_err());

        let short = doc
            .push_accessor(Accessor::new(ComponentType::Float, AccessorType::Scalar, 1))
            .unwrap();
        ext.attributes.insert("_ID".to_string(), short);
        assert!(matches!(validate(&doc, &ext), Err(GltfError::InvalidInput(_))));

        ext.attributes.shift_remove("_ID");
        ext.attributes.insert(SCALE.to_string(), ext.attributes[ROTATION]);
        assert!(matches!(validate(&doc, &ext), Err(GltfError::SchemaViolation(_))));
    }
}
