//! `KHR_mesh_quantization`: float vertex attributes stored as normalized
//! 8- or 16-bit integers.
//!
//! Each quantized primitive carries a record of the bit width and the float
//! range of every attribute it rewrote, so [`dequantize_all`] needs nothing
//! else to restore floats.

use gltfx_core::builder::append_vertex_accessor;
use gltfx_core::bytes;
use gltfx_core::mesh::semantic_prefix;
use gltfx_core::{Accessor, AccessorReader, ComponentType, Document, GltfError, NamedExtension, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const EXTENSION_NAME: &str = "KHR_mesh_quantization";

/// Bit width per attribute semantic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationConfig {
    pub position: u32,
    pub normal: u32,
    pub tangent: u32,
    pub texcoord: u32,
    pub color: u32,
    pub weights: u32,
    pub generic: u32,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            position: 12,
            normal: 10,
            tangent: 10,
            texcoord: 12,
            color: 8,
            weights: 8,
            generic: 8,
        }
    }
}

impl QuantizationConfig {
    /// Bits for attribute `name`; `None` for joint indices, which are never quantized.
    pub fn bits_for(&self, name: &str) -> Option<u32> {
        let bits = match semantic_prefix(name) {
            "POSITION" => self.position,
            "NORMAL" => self.normal,
            "TANGENT" => self.tangent,
            "TEXCOORD" => self.texcoord,
            "COLOR" => self.color,
            "WEIGHTS" => self.weights,
            "JOINTS" => return None,
            _ => self.generic,
        };
        Some(bits)
    }

    pub fn validate(&self) -> Result<()> {
        for (key, bits) in [
            ("position", self.position),
            ("normal", self.normal),
            ("tangent", self.tangent),
            ("texcoord", self.texcoord),
            ("color", self.color),
            ("weights", self.weights),
            ("generic", self.generic),
        ] {
            if !(1..=16).contains(&bits) {
                return Err(GltfError::invalid_input(format!(
                    "{} bits must be in 1..=16, got {}",
                    key, bits
                )));
            }
        }
        Ok(())
    }
}

/// Bit width and float range of one quantized attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedAttribute {
    pub bits: u32,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

/// Per-primitive quantization record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshQuantization {
    #[serde(default)]
    pub attributes: IndexMap<String, QuantizedAttribute>,
}

impl NamedExtension for MeshQuantization {
    const NAME: &'static str = EXTENSION_NAME;
}

fn max_value(bits: u32) -> f64 {
    ((1u32 << bits) - 1) as f64
}

fn float_bounds(values: &[f32], components: usize) -> (Vec<f64>, Vec<f64>) {
    let mut min = vec![f64::INFINITY; components];
    let mut max = vec![f64::NEG_INFINITY; components];
    for element in values.chunks_exact(components) {
        for (k, &v) in element.iter().enumerate() {
            min[k] = min[k].min(f64::from(v));
            max[k] = max[k].max(f64::from(v));
        }
    }
    (min, max)
}

/// Quantizes the components of one accessor, returning raw integers.
fn quantize_values(values: &[f32], components: usize, bits: u32, min: &[f64], max: &[f64]) -> Vec<u32> {
    let levels = max_value(bits);
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let k = i % components;
            let range = max[k] - min[k];
            if range <= 0.0 {
                return 0;
            }
            ((f64::from(v) - min[k]) / range * levels).round().clamp(0.0, levels) as u32
        })
        .collect()
}

/// Rewrites one float attribute as a normalized integer accessor.
fn quantize_accessor(doc: &mut Document, index: u32, bits: u32) -> Result<(u32, QuantizedAttribute)> {
    let source = doc.accessor(index)?.clone();
    let components = source.accessor_type.components();
    let values = AccessorReader::new(doc).read_f32(index)?;
    let (min, max) = if source.min.len() == components && source.max.len() == components {
        (source.min.clone(), source.max.clone())
    } else {
        float_bounds(&values, components)
    };
    let raw = quantize_values(&values, components, bits, &min, &max);

    let (component_type, data) = if bits <= 8 {
        let narrow: Vec<u8> = raw.iter().map(|&r| r as u8).collect();
        (ComponentType::UnsignedByte, narrow)
    } else {
        let wide: Vec<u16> = raw.iter().map(|&r| r as u16).collect();
        (ComponentType::UnsignedShort, bytes::to_bytes(&wide))
    };
    let (raw_min, raw_max) = integer_bounds(&raw, components);
    let accessor = Accessor {
        name: source.name.clone(),
        normalized: true,
        min: raw_min,
        max: raw_max,
        ..Accessor::new(component_type, source.accessor_type, source.count)
    };
    let quantized = append_vertex_accessor(doc, &data, accessor)?;
    Ok((quantized, QuantizedAttribute { bits, min, max }))
}

fn integer_bounds(raw: &[u32], components: usize) -> (Vec<f64>, Vec<f64>) {
    if raw.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let mut min = vec![f64::MAX; components];
    let mut max = vec![f64::MIN; components];
    for element in raw.chunks_exact(components) {
        for (k, &r) in element.iter().enumerate() {
            min[k] = min[k].min(f64::from(r));
            max[k] = max[k].max(f64::from(r));
        }
    }
    (min, max)
}

/// Quantizes every float attribute (except joints) of every primitive not
/// already quantized. Returns the number of attributes rewritten.
pub fn quantize_all(doc: &mut Document, config: &QuantizationConfig) -> Result<usize> {
    config.validate()?;
    let mut rewritten = 0;
    for mesh in 0..doc.meshes.len() {
        for p in 0..doc.meshes[mesh].primitives.len() {
            let prim = &doc.meshes[mesh].primitives[p];
            if prim.extensions.contains(EXTENSION_NAME) {
                continue;
            }
            let attributes: Vec<(String, u32)> = prim.attributes.iter().map(|(n, &a)| (n.clone(), a)).collect();

            let mut record = MeshQuantization::default();
            let mut replaced = Vec::new();
            for (name, index) in attributes {
                let Some(bits) = config.bits_for(&name) else {
                    continue;
                };
                if !doc.accessor(index)?.component_type.is_float() {
                    continue;
                }
                let (quantized, attribute) = quantize_accessor(doc, index, bits)?;
                tracing::debug!(mesh, primitive = p, attribute = %name, bits, "quantized attribute");
                replaced.push((name.clone(), quantized));
                record.attributes.insert(name, attribute);
            }
            if record.attributes.is_empty() {
                continue;
            }
            rewritten += record.attributes.len();
            let prim = &mut doc.meshes[mesh].primitives[p];
            for (name, quantized) in replaced {
                prim.attributes.insert(name, quantized);
            }
            prim.extensions.insert(record);
        }
    }
    if rewritten > 0 {
        doc.mark_extension_used(EXTENSION_NAME, true);
    }
    Ok(rewritten)
}

/// Restores float attributes of every quantized primitive and removes the
/// extension. Returns the number of attributes rewritten.
pub fn dequantize_all(doc: &mut Document) -> Result<usize> {
    let mut rewritten = 0;
    for mesh in 0..doc.meshes.len() {
        for p in 0..doc.meshes[mesh].primitives.len() {
            let prim = &doc.meshes[mesh].primitives[p];
            let Some(record) = prim.extensions.read::<MeshQuantization>()? else {
                continue;
            };
            let sources = record
                .attributes
                .keys()
                .map(|name| {
                    prim.attribute(name).ok_or_else(|| {
                        GltfError::schema(format!("quantized attribute {} is missing from the primitive", name))
                    })
                })
                .collect::<Result<Vec<u32>>>()?;

            let mut replaced = Vec::with_capacity(sources.len());
            for ((name, attribute), index) in record.attributes.iter().zip(sources) {
                replaced.push((name.clone(), dequantize_accessor(doc, index, attribute)?));
            }
            rewritten += replaced.len();
            let prim = &mut doc.meshes[mesh].primitives[p];
            for (name, restored) in replaced {
                prim.attributes.insert(name, restored);
            }
            prim.extensions.remove(EXTENSION_NAME);
        }
    }
    doc.unmark_extension(EXTENSION_NAME);
    Ok(rewritten)
}

fn dequantize_accessor(doc: &mut Document, index: u32, attribute: &QuantizedAttribute) -> Result<u32> {
    let source = doc.accessor(index)?.clone();
    let components = source.accessor_type.components();
    if attribute.min.len() != components || attribute.max.len() != components {
        return Err(GltfError::schema(format!(
            "quantization record has {} bounds for {} components",
            attribute.min.len(),
            components
        )));
    }
    if !(1..=16).contains(&attribute.bits) {
        return Err(GltfError::schema(format!("invalid quantization bits {}", attribute.bits)));
    }
    let raw = AccessorReader::new(doc).read_u32(index)?;
    let levels = max_value(attribute.bits);
    let values: Vec<f32> = raw
        .iter()
        .enumerate()
        .map(|(i, &r)| {
            let k = i % components;
            (attribute.min[k] + f64::from(r) / levels * (attribute.max[k] - attribute.min[k])) as f32
        })
        .collect();
    let (min, max) = float_bounds(&values, components);
    let accessor = Accessor {
        name: source.name.clone(),
        min: if values.is_empty() { Vec::new() } else { min },
        max: if values.is_empty() { Vec::new() } else { max },
        ..Accessor::new(ComponentType::Float, source.accessor_type, source.count)
    };
    append_vertex_accessor(doc, &bytes::f32_to_bytes(&values), accessor)
}
