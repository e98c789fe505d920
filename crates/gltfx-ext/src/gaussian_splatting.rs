//! `KHR_gaussian_splatting`: point primitives carrying splat position,
//! color, scale and rotation.
//!
//! Colors, scales and rotations may be stored as normalized integers. With
//! [`SplatOptions::compress`] the four columns are interleaved into a single
//! meshopt-compressed buffer view.

use gltfx_core::builder::{append_bytes, append_vertex_accessor, VIEW_ALIGNMENT};
use gltfx_core::bytes::{self, LeScalar};
use gltfx_core::{
    Accessor, AccessorReader, AccessorType, BufferTarget, ComponentType, Document, GltfError, Mesh,
    NamedExtension, Primitive, PrimitiveMode, Result,
};
use indexmap::IndexMap;
use num_traits::Bounded;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::instancing::rows;
use crate::meshopt::{self, Filter, Mode};
use crate::quantization;

pub const EXTENSION_NAME: &str = "KHR_gaussian_splatting";

pub const POSITION: &str = "POSITION";
pub const COLOR: &str = "COLOR_0";
pub const SCALE: &str = "_SCALE";
pub const ROTATION: &str = "_ROTATION";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaussianSplatting {
    #[serde(default)]
    pub attributes: IndexMap<String, u32>,
    /// Buffer view holding spherical-harmonics coefficients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sh_coefficients: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl NamedExtension for GaussianSplatting {
    const NAME: &'static str = EXTENSION_NAME;
}

/// Storage of one splat column. Integer encodings are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplatEncoding {
    Float,
    UnsignedByte,
    Byte,
    UnsignedShort,
    Short,
}

impl SplatEncoding {
    pub const fn component_type(self) -> ComponentType {
        match self {
            SplatEncoding::Float => ComponentType::Float,
            SplatEncoding::UnsignedByte => ComponentType::UnsignedByte,
            SplatEncoding::Byte => ComponentType::Byte,
            SplatEncoding::UnsignedShort => ComponentType::UnsignedShort,
            SplatEncoding::Short => ComponentType::Short,
        }
    }

    /// Little-endian bytes of `values` in this encoding.
    fn encode(self, values: &[f32]) -> Vec<u8> {
        match self {
            SplatEncoding::Float => bytes::f32_to_bytes(values),
            SplatEncoding::UnsignedByte => normalize::<u8>(values, 0.0),
            SplatEncoding::Byte => normalize::<i8>(values, -1.0),
            SplatEncoding::UnsignedShort => normalize::<u16>(values, 0.0),
            SplatEncoding::Short => normalize::<i16>(values, -1.0),
        }
    }
}

fn normalize<T: LeScalar + Bounded>(values: &[f32], lower: f32) -> Vec<u8> {
    let max = num_traits::cast::<T, f32>(T::max_value()).unwrap_or(1.0);
    let quantized: Vec<T> = values
        .iter()
        .map(|&v| num_traits::cast::<f32, T>((v.clamp(lower, 1.0) * max).round()).unwrap_or_default())
        .collect();
    bytes::to_bytes(&quantized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplatOptions {
    pub color: SplatEncoding,
    pub scale: SplatEncoding,
    pub rotation: SplatEncoding,
    /// Interleave the columns into one meshopt-compressed view.
    pub compress: bool,
}

impl Default for SplatOptions {
    fn default() -> Self {
        Self {
            color: SplatEncoding::UnsignedByte,
            scale: SplatEncoding::UnsignedShort,
            rotation: SplatEncoding::Short,
            compress: false,
        }
    }
}

/// Splat columns, one entry per splat in each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Splats {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub scales: Vec<[f32; 3]>,
    /// Unit quaternions.
    pub rotations: Vec<[f32; 4]>,
}

impl Splats {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn check(&self) -> Result<()> {
        let n = self.len();
        if n == 0 {
            return Err(GltfError::invalid_input("no splats given"));
        }
        if self.colors.len() != n || self.scales.len() != n || self.rotations.len() != n {
            return Err(GltfError::invalid_input(format!(
                "splat columns differ in length: {} positions, {} colors, {} scales, {} rotations",
                n,
                self.colors.len(),
                self.scales.len(),
                self.rotations.len()
            )));
        }
        Ok(())
    }
}

struct EncodedColumn {
    name: &'static str,
    accessor: Accessor,
    data: Vec<u8>,
}

fn column(name: &'static str, values: Vec<f32>, accessor_type: AccessorType, encoding: SplatEncoding) -> EncodedColumn {
    let count = values.len() / accessor_type.components();
    let mut accessor = Accessor::new(encoding.component_type(), accessor_type, count);
    accessor.normalized = encoding != SplatEncoding::Float;
    EncodedColumn {
        name,
        accessor,
        data: encoding.encode(&values),
    }
}

fn encode_columns(splats: &Splats, options: &SplatOptions) -> Vec<EncodedColumn> {
    let flat3 = |v: &[[f32; 3]]| v.iter().flatten().copied().collect::<Vec<f32>>();
    let flat4 = |v: &[[f32; 4]]| v.iter().flatten().copied().collect::<Vec<f32>>();

    let mut position = column(POSITION, flat3(&splats.positions), AccessorType::Vec3, SplatEncoding::Float);
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for p in &splats.positions {
        for k in 0..3 {
            min[k] = min[k].min(f64::from(p[k]));
            max[k] = max[k].max(f64::from(p[k]));
        }
    }
    position.accessor.min = min.to_vec();
    position.accessor.max = max.to_vec();

    vec![
        position,
        column(COLOR, flat4(&splats.colors), AccessorType::Vec4, options.color),
        column(SCALE, flat3(&splats.scales), AccessorType::Vec3, options.scale),
        column(ROTATION, flat4(&splats.rotations), AccessorType::Vec4, options.rotation),
    ]
}

/// Writes `splats` as a new mesh with one point primitive and returns the
/// mesh index. `sh_coefficients`, when given, is stored as raw floats in its
/// own buffer view.
pub fn add_splats(
    doc: &mut Document,
    splats: &Splats,
    options: &SplatOptions,
    sh_coefficients: Option<&[f32]>,
) -> Result<u32> {
    splats.check()?;
    let columns = encode_columns(splats, options);

    let mut ext = GaussianSplatting::default();
    if options.compress {
        for (name, accessor) in write_interleaved(doc, columns)? {
            ext.attributes.insert(name.to_string(), accessor);
        }
        doc.mark_extension_used(quantization::EXTENSION_NAME, true);
    } else {
        for col in columns {
            ext.attributes
                .insert(col.name.to_string(), append_vertex_accessor(doc, &col.data, col.accessor)?);
        }
    }
    if let Some(coefficients) = sh_coefficients {
        ext.sh_coefficients = Some(append_bytes(doc, &bytes::f32_to_bytes(coefficients), None, None)?);
    }

    let mut prim = Primitive::new(PrimitiveMode::Points);
    prim.attributes = ext.attributes.clone();
    prim.extensions.insert(ext);
    let mesh = doc.push_mesh(Mesh {
        primitives: vec![prim],
        ..Mesh::default()
    })?;
    doc.mark_extension_used(EXTENSION_NAME, false);
    tracing::debug!(splats = splats.len(), compress = options.compress, mesh, "added Gaussian splats");
    Ok(mesh)
}

/// Interleaves the columns, each element starting on a 4-byte boundary, and
/// writes them as one compressed attribute stream.
fn write_interleaved(doc: &mut Document, columns: Vec<EncodedColumn>) -> Result<Vec<(&'static str, u32)>> {
    let count = columns.first().map_or(0, |c| c.accessor.count);
    let mut offsets = Vec::with_capacity(columns.len());
    let mut stride = 0;
    for col in &columns {
        offsets.push(stride);
        stride += bytes::align_up(col.accessor.element_size(), VIEW_ALIGNMENT);
    }

    let mut data = vec![0u8; count * stride];
    for (col, &offset) in columns.iter().zip(&offsets) {
        let size = col.accessor.element_size();
        for (i, element) in col.data.chunks_exact(size).enumerate() {
            let at = i * stride + offset;
            data[at..at + size].copy_from_slice(element);
        }
    }
    let view = meshopt::write_compressed_view(
        doc,
        &data,
        count,
        stride,
        Mode::Attributes,
        Filter::None,
        Some(BufferTarget::ArrayBuffer),
    )?;

    let mut written = Vec::with_capacity(columns.len());
    for (col, offset) in columns.into_iter().zip(offsets) {
        let accessor = Accessor {
            buffer_view: Some(view),
            byte_offset: offset,
            ..col.accessor
        };
        written.push((col.name, doc.push_accessor(accessor)?));
    }
    Ok(written)
}

/// Reads the splats of a primitive carrying the extension, converting
/// normalized integers back to floats. Compressed views must be decoded
/// first with [`meshopt::decode_all`].
pub fn read_splats(doc: &Document, mesh: u32, primitive: usize) -> Result<Splats> {
    let primitives = &gltfx_core::error::get_checked(&doc.meshes, mesh, "mesh")?.primitives;
    let prim = primitives
        .get(primitive)
        .ok_or_else(|| GltfError::index_out_of_range("primitive", primitive, primitives.len()))?;
    let ext = prim
        .extensions
        .read::<GaussianSplatting>()?
        .ok_or_else(|| GltfError::invalid_input(format!("primitive has no {}", EXTENSION_NAME)))?;
    let reader = AccessorReader::new(doc);
    let read = |name: &str| -> Result<Vec<f32>> {
        let index = ext
            .attributes
            .get(name)
            .or_else(|| prim.attributes.get(name))
            .copied()
            .ok_or_else(|| GltfError::schema(format!("splat attribute {} is missing", name)))?;
        reader.read_f32(index)
    };

    let splats = Splats {
        positions: rows(read(POSITION)?),
        colors: rows(read(COLOR)?),
        scales: rows(read(SCALE)?),
        rotations: rows(read(ROTATION)?),
    };
    splats.check()?;
    Ok(splats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Splats {
        Splats {
            positions: vec![[0.0, 1.0, 2.0], [-3.5, 4.25, 0.5], [10.0, -10.0, 0.0]],
            colors: vec![[1.0, 0.0, 0.5, 1.0], [0.2, 0.4, 0.6, 0.8], [0.0, 0.0, 0.0, 0.0]],
            scales: vec![[0.1, 0.2, 0.3], [1.0, 1.0, 1.0], [0.0, 0.5, 0.25]],
            rotations: vec![[0.0, 0.0, 0.0, 1.0], [0.5, -0.5, 0.5, -0.5], [0.0, 1.0, 0.0, 0.0]],
        }
    }

    fn assert_close<const N: usize>(got: &[[f32; N]], want: &[[f32; N]], tolerance: f32) {
        assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(want) {
            for k in 0..N {
                assert!((g[k] - w[k]).abs() <= tolerance, "{:?} vs {:?}", g, w);
            }
        }
    }

    #[test]
    fn test_default_layout() {
        let mut doc = Document::new();
        let mesh = add_splats(&mut doc, &sample(), &SplatOptions::default(), None).unwrap();
        let prim = &doc.meshes[mesh as usize].primitives[0];
        assert_eq!(prim.mode, PrimitiveMode::Points);

        let layout: Vec<(ComponentType, bool)> = [POSITION, COLOR, SCALE, ROTATION]
            .iter()
            .map(|name| {
                let accessor = &doc.accessors[prim.attribute(name).unwrap() as usize];
                (accessor.component_type, accessor.normalized)
            })
            .collect();
        assert_eq!(
            layout,
            vec![
                (ComponentType::Float, false),
                (ComponentType::UnsignedByte, true),
                (ComponentType::UnsignedShort, true),
                (ComponentType::Short, true),
            ]
        );
        assert!(doc.is_extension_used(EXTENSION_NAME));
        assert!(!doc.is_extension_used(meshopt::EXTENSION_NAME));
        doc.validate_layout().unwrap();
    }

    #[test]
    fn test_read_back_within_quantization_step() {
        let mut doc = Document::new();
        let coefficients = [0.25f32; 9];
        let mesh = add_splats(&mut doc, &sample(), &SplatOptions::default(), Some(&coefficients)).unwrap();
        let splats = read_splats(&doc, mesh, 0).unwrap();
        let want = sample();
        assert_eq!(splats.positions, want.positions);
        assert_close(&splats.colors, &want.colors, 0.5 / 255.0 + 1.0e-6);
        assert_close(&splats.scales, &want.scales, 0.5 / 65535.0 + 1.0e-6);
        assert_close(&splats.rotations, &want.rotations, 0.5 / 32767.0 + 1.0e-6);

        let ext = doc.meshes[mesh as usize].primitives[0]
            .extensions
            .read::<GaussianSplatting>()
            .unwrap()
            .unwrap();
        let sh = ext.sh_coefficients.unwrap();
        assert_eq!(bytes::bytes_to_f32(doc.view_data(sh).unwrap()).unwrap(), coefficients.to_vec());
    }

    #[test]
    fn test_compressed_matches_plain() {
        let mut plain = Document::new();
        add_splats(&mut plain, &sample(), &SplatOptions::default(), None).unwrap();
        let expected = read_splats(&plain, 0, 0).unwrap();

        let mut doc = Document::new();
        let options = SplatOptions {
            compress: true,
            ..SplatOptions::default()
        };
        let mesh = add_splats(&mut doc, &sample(), &options, None).unwrap();
        assert!(doc.is_extension_required(meshopt::EXTENSION_NAME));
        assert!(doc.is_extension_required(quantization::EXTENSION_NAME));
        let position = doc.meshes[mesh as usize].primitives[0].attribute(POSITION).unwrap();
        let view = doc.accessors[position as usize].buffer_view.unwrap();
        assert_eq!(doc.buffer_views[view as usize].byte_stride, Some(32));

        assert_eq!(meshopt::decode_all(&mut doc).unwrap(), 1);
        assert_eq!(read_splats(&doc, mesh, 0).unwrap(), expected);
    }

    #[test]
    fn test_float_encoding_and_errors() {
        let mut doc = Document::new();
        let options = SplatOptions {
            color: SplatEncoding::Float,
            scale: SplatEncoding::Float,
            rotation: SplatEncoding::Float,
            compress: false,
        };
        let mesh = add_splats(&mut doc, &sample(), &options, None).unwrap();
        assert_eq!(read_splats(&doc, mesh, 0).unwrap(), sample());

        let mut short = sample();
        short.rotations.pop();
        assert!(matches!(
            add_splats(&mut doc, &short, &options, None),
            Err(GltfError::InvalidInput(_))
        ));
        assert!(read_splats(&doc, mesh, 1).is_err());
    }
}
