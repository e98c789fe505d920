//! `EXT_meshopt_compression`: buffer-view level compression.
//!
//! A compressed view keeps its normal `buffer`/`byteOffset`/`byteLength`,
//! which usually point into a *fallback* buffer holding no bytes, and carries
//! an extension that locates the compressed stream:
//!
//! ```json
//! "extensions": { "EXT_meshopt_compression": {
//!     "buffer": 0, "byteOffset": 64, "byteLength": 97,
//!     "byteStride": 12, "count": 10, "mode": "ATTRIBUTES", "filter": "NONE"
//! } }
//! ```
//!
//! [`decode_all`] materializes every compressed view into its own buffer and
//! removes the extension. [`write_compressed_view`], [`compress_buffer_view`]
//! and [`compress_accessor`] go the other way.

pub mod filter;
pub mod index_codec;
pub mod vertex_codec;

use byteorder::{ByteOrder, LittleEndian};
use gltfx_core::builder::VIEW_ALIGNMENT;
use gltfx_core::bytes::{self, BIN_PADDING};
use gltfx_core::{
    Accessor, AccessorReader, AccessorType, Buffer, BufferTarget, BufferView, ComponentType, Document,
    GltfError, NamedExtension, Result,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use filter::Filter;

pub const EXTENSION_NAME: &str = "EXT_meshopt_compression";

/// Largest vertex stride the attribute codec accepts.
pub const MAX_ATTRIBUTE_STRIDE: usize = vertex_codec::MAX_STRIDE;

/// Bitstream and parameter errors of the meshopt codecs.
#[derive(Error, Debug)]
pub enum MeshoptError {
    #[error("invalid vertex stride {0}: must be a multiple of 4 up to 256")]
    InvalidStride(usize),

    #[error("expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("compressed stream is truncated")]
    Truncated,

    #[error("unexpected stream header 0x{0:02x}")]
    BadHeader(u8),

    #[error("unsupported bitstream version {0}")]
    UnsupportedVersion(u8),

    #[error("{0} bytes left over after decoding")]
    TrailingData(usize),

    #[error("index count {0} is not a multiple of 3")]
    InvalidIndexCount(usize),

    #[error("filter {filter:?} cannot decode stride {stride}")]
    FilterStride { filter: Filter, stride: usize },

    #[error("invalid input for the {0} filter")]
    FilterInput(&'static str),

    #[error("mode {mode:?} cannot use stride {stride}")]
    ModeStride { mode: Mode, stride: usize },

    #[error("TRIANGLES streams cannot be filtered")]
    FilteredTriangles,
}

impl From<MeshoptError> for GltfError {
    fn from(err: MeshoptError) -> Self {
        GltfError::codec(format!("meshopt: {}", err))
    }
}

// ============================================================================
// Extension objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Attributes,
    Triangles,
    Indices,
}

impl Mode {
    /// Checks the stride rules of the mode and that TRIANGLES is unfiltered.
    pub fn check(self, stride: usize, filter: Filter) -> std::result::Result<(), MeshoptError> {
        let ok = match self {
            Mode::Attributes => stride > 0 && stride % 4 == 0 && stride <= MAX_ATTRIBUTE_STRIDE,
            Mode::Triangles | Mode::Indices => stride == 2 || stride == 4,
        };
        if !ok {
            return Err(MeshoptError::ModeStride { mode: self, stride });
        }
        if self == Mode::Triangles && !filter.is_none() {
            return Err(MeshoptError::FilteredTriangles);
        }
        filter.check_stride(stride)
    }
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

/// The extension object on a compressed buffer view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedView {
    pub buffer: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: usize,
    pub count: usize,
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Filter::is_none")]
    pub filter: Filter,
}

/// The extension object on a buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackBuffer {
    #[serde(default)]
    pub fallback: bool,
}

/// `EXT_meshopt_compression` appears on both buffer views and buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeshoptExtension {
    View(CompressedView),
    Buffer(FallbackBuffer),
}

impl NamedExtension for MeshoptExtension {
    const NAME: &'static str = EXTENSION_NAME;
}

/// Settings for [`compress_buffer_view`] and [`compress_accessor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshoptOptions {
    pub mode: Mode,
    pub filter: Filter,
    /// Bits kept by the filter encoder; ignored for [`Filter::None`].
    pub filter_bits: u32,
}

impl Default for MeshoptOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Attributes,
            filter: Filter::None,
            filter_bits: 16,
        }
    }
}

// ============================================================================
// Byte-level encode/decode
// ============================================================================

fn read_indices(data: &[u8], stride: usize) -> Vec<u32> {
    if stride == 2 {
        let mut narrow = vec![0u16; data.len() / 2];
        LittleEndian::read_u16_into(&data[..narrow.len() * 2], &mut narrow);
        narrow.into_iter().map(u32::from).collect()
    } else {
        let mut wide = vec![0u32; data.len() / 4];
        LittleEndian::read_u32_into(&data[..wide.len() * 4], &mut wide);
        wide
    }
}

fn write_indices(indices: &[u32], stride: usize) -> Vec<u8> {
    let mut out = vec![0u8; indices.len() * stride];
    if stride == 2 {
        let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
        LittleEndian::write_u16_into(&narrow, &mut out);
    } else {
        LittleEndian::write_u32_into(indices, &mut out);
    }
    out
}

/// Compresses `count` elements of `stride` bytes with the codec of `mode`.
pub fn encode(data: &[u8], count: usize, stride: usize, mode: Mode) -> Result<Vec<u8>> {
    mode.check(stride, Filter::None)?;
    let expected = bytes::checked_size(count, stride)?;
    if data.len() != expected {
        return Err(MeshoptError::SizeMismatch {
            expected,
            actual: data.len(),
        }
        .into());
    }
    let encoded = match mode {
        Mode::Attributes => vertex_codec::encode_vertex_buffer(data, count, stride)?,
        Mode::Triangles => index_codec::encode_triangles(&read_indices(data, stride))?,
        Mode::Indices => index_codec::encode_sequence(&read_indices(data, stride)),
    };
    tracing::debug!(?mode, count, stride, raw = data.len(), compressed = encoded.len(), "meshopt encode");
    Ok(encoded)
}

/// Decompresses a stream and runs the filter's decode pass.
pub fn decode(data: &[u8], count: usize, stride: usize, mode: Mode, filter: Filter) -> Result<Vec<u8>> {
    mode.check(stride, filter)?;
    bytes::checked_size(count, stride)?;
    let mut out = match mode {
        Mode::Attributes => vertex_codec::decode_vertex_buffer(data, count, stride)?,
        Mode::Triangles => write_indices(&index_codec::decode_triangles(data, count)?, stride),
        Mode::Indices => write_indices(&index_codec::decode_sequence(data, count)?, stride),
    };
    filter::decode_filter(filter, &mut out, count, stride)?;
    Ok(out)
}

// ============================================================================
// Document-level decode
// ============================================================================

fn compressed_view(view: &BufferView) -> Result<Option<CompressedView>> {
    match view.extensions.read::<MeshoptExtension>()? {
        Some(MeshoptExtension::View(ext)) => Ok(Some(ext)),
        Some(MeshoptExtension::Buffer(_)) => Err(GltfError::extension_parse(
            EXTENSION_NAME,
            "buffer view carries the buffer form of the extension",
        )),
        None => Ok(None),
    }
}

/// Decompresses every compressed buffer view in place, drops the extension
/// from views and buffers, and removes its declaration. Returns the number
/// of views decoded.
pub fn decode_all(doc: &mut Document) -> Result<usize> {
    let mut work = Vec::new();
    for (i, view) in doc.buffer_views.iter().enumerate() {
        if let Some(ext) = compressed_view(view)? {
            work.push((i, ext));
        }
    }

    for (i, ext) in &work {
        let view = &doc.buffer_views[*i];
        let decoded_len = bytes::checked_size(ext.count, ext.byte_stride)?;
        if decoded_len > view.byte_length {
            return Err(GltfError::BufferOverflow(format!(
                "view {} holds {} bytes but decodes to {}",
                i, view.byte_length, decoded_len
            )));
        }
        let (target, offset) = (view.buffer, view.byte_offset);
        let destination = bytes::checked_range(offset, decoded_len)?;

        let source = doc.buffer(ext.buffer)?;
        let range = bytes::checked_range(ext.byte_offset, ext.byte_length)?;
        let compressed = source.data.get(range.clone()).ok_or_else(|| {
            GltfError::BufferOverflow(format!(
                "compressed stream of view {} spans {:?} past buffer {} with {} loaded bytes",
                i,
                range,
                ext.buffer,
                source.data.len()
            ))
        })?;
        let decoded = decode(compressed, ext.count, ext.byte_stride, ext.mode, ext.filter)?;
        if decoded.len() != decoded_len {
            return Err(MeshoptError::SizeMismatch {
                expected: decoded_len,
                actual: decoded.len(),
            }
            .into());
        }

        let buffer = doc.buffer_mut(target)?;
        let padding = bytes::padding_len(destination.end, VIEW_ALIGNMENT);
        let needed = bytes::checked_range(destination.end, padding)?.end.max(buffer.byte_length);
        if buffer.data.len() < needed {
            buffer.data.try_reserve_exact(needed - buffer.data.len()).map_err(|err| {
                GltfError::BufferOverflow(format!("cannot grow buffer {} to {} bytes: {}", target, needed, err))
            })?;
            buffer.data.resize(needed, BIN_PADDING);
        }
        buffer.byte_length = buffer.byte_length.max(needed);
        buffer.data[destination].copy_from_slice(&decoded);
        doc.buffer_views[*i].extensions.remove(EXTENSION_NAME);
        tracing::debug!(view = i, bytes = decoded.len(), mode = ?ext.mode, "decoded meshopt view");
    }

    for buffer in &mut doc.buffers {
        buffer.extensions.remove(EXTENSION_NAME);
    }
    doc.unmark_extension(EXTENSION_NAME);
    Ok(work.len())
}

// ============================================================================
// Document-level encode
// ============================================================================

/// Index of the fallback buffer, created on first use after the main buffer.
fn fallback_buffer(doc: &mut Document) -> Result<u32> {
    doc.main_buffer_mut()?;
    if let Some(i) = doc.buffers.iter().position(Buffer::is_fallback) {
        return Document::index(i).ok_or_else(|| GltfError::invalid_input("too many buffers"));
    }
    let mut buffer = Buffer::default();
    buffer
        .extensions
        .insert(MeshoptExtension::Buffer(FallbackBuffer { fallback: true }));
    doc.push_buffer(buffer)
}

/// Appends `compressed` to the main buffer without creating a view.
fn append_stream(doc: &mut Document, compressed: &[u8]) -> Result<usize> {
    let main = doc.main_buffer_mut()?;
    let offset = main.append(compressed, VIEW_ALIGNMENT, BIN_PADDING);
    main.pad_end(VIEW_ALIGNMENT, BIN_PADDING);
    Ok(offset)
}

/// Writes `data` (already in its filtered layout) as a compressed view
/// backed by the fallback buffer. The extension is declared used and
/// required, since the fallback buffer holds no bytes.
pub fn write_compressed_view(
    doc: &mut Document,
    data: &[u8],
    count: usize,
    stride: usize,
    mode: Mode,
    filter: Filter,
    target: Option<BufferTarget>,
) -> Result<u32> {
    mode.check(stride, filter)?;
    let compressed = encode(data, count, stride, mode)?;
    let stream_offset = append_stream(doc, &compressed)?;

    let fallback = fallback_buffer(doc)?;
    let buffer = doc.buffer_mut(fallback)?;
    let byte_offset = bytes::align_up(buffer.byte_length, VIEW_ALIGNMENT);
    buffer.byte_length = bytes::align_up(byte_offset + data.len(), VIEW_ALIGNMENT);

    let mut view = BufferView {
        byte_stride: (mode == Mode::Attributes).then_some(stride),
        target,
        ..BufferView::new(fallback, byte_offset, data.len())
    };
    view.extensions.insert(MeshoptExtension::View(CompressedView {
        buffer: 0,
        byte_offset: stream_offset,
        byte_length: compressed.len(),
        byte_stride: stride,
        count,
        mode,
        filter,
    }));
    doc.mark_extension_used(EXTENSION_NAME, true);
    doc.push_buffer_view(view)
}

/// Compresses an existing view whose bytes stay where they are; decoders may
/// use either copy, so the extension is declared used but not required.
pub fn compress_buffer_view(doc: &mut Document, view_index: u32, options: &MeshoptOptions) -> Result<()> {
    if !options.filter.is_none() {
        return Err(GltfError::invalid_input(
            "in-place view compression cannot apply a filter; use compress_accessor",
        ));
    }
    let view = doc.buffer_view(view_index)?;
    let stride = match (options.mode, view.byte_stride) {
        (Mode::Attributes, Some(stride)) => stride,
        (Mode::Attributes, None) => {
            return Err(GltfError::invalid_input(format!(
                "attribute view {} has no byteStride",
                view_index
            )))
        }
        (_, _) => index_stride(doc, view_index)?,
    };
    let data = doc.view_data(view_index)?.to_vec();
    if data.len() % stride != 0 {
        return Err(GltfError::invalid_input(format!(
            "view {} length {} is not a multiple of stride {}",
            view_index,
            data.len(),
            stride
        )));
    }
    let count = data.len() / stride;
    let compressed = encode(&data, count, stride, options.mode)?;
    let stream_offset = append_stream(doc, &compressed)?;
    doc.buffer_view_mut(view_index)?
        .extensions
        .insert(MeshoptExtension::View(CompressedView {
            buffer: 0,
            byte_offset: stream_offset,
            byte_length: compressed.len(),
            byte_stride: stride,
            count,
            mode: options.mode,
            filter: Filter::None,
        }));
    doc.mark_extension_used(EXTENSION_NAME, false);
    Ok(())
}

/// Component size of the index accessors that read `view_index`.
fn index_stride(doc: &Document, view_index: u32) -> Result<usize> {
    let sizes: Vec<usize> = doc
        .accessors
        .iter()
        .filter(|a| a.buffer_view == Some(view_index))
        .map(|a| a.component_type.size())
        .collect();
    match sizes.first() {
        Some(&size) if (size == 2 || size == 4) && sizes.iter().all(|&s| s == size) => Ok(size),
        _ => Err(GltfError::invalid_input(format!(
            "view {} is not read by 16- or 32-bit index accessors only",
            view_index
        ))),
    }
}

/// Re-encodes an accessor into a new compressed view, applying the
/// options' filter, and repoints the accessor at it.
///
/// | filter | accepted accessor | result |
/// |---|---|---|
/// | NONE | any | same layout, elements padded to 4 bytes |
/// | OCTAHEDRAL | VEC3/VEC4 float | i8 (bits <= 8) or i16, normalized |
/// | QUATERNION | VEC4 float | i16 VEC4, normalized |
/// | EXPONENTIAL | float | float |
///
/// Index modes widen 8-bit indices to 16 bits.
pub fn compress_accessor(doc: &mut Document, accessor_index: u32, options: &MeshoptOptions) -> Result<()> {
    let accessor = doc.accessor(accessor_index)?.clone();
    let reader = AccessorReader::new(doc);
    let count = accessor.count;
    let mut updated = accessor.clone();

    let (data, stride) = match (options.mode, options.filter) {
        (Mode::Triangles | Mode::Indices, Filter::None) => {
            let indices = reader.read_u32(accessor_index)?;
            let (stride, ct) = if accessor.component_type == ComponentType::UnsignedInt {
                (4, ComponentType::UnsignedInt)
            } else {
                (2, ComponentType::UnsignedShort)
            };
            updated.component_type = ct;
            (write_indices(&indices, stride), stride)
        }
        (Mode::Triangles | Mode::Indices, _) => return Err(MeshoptError::FilteredTriangles.into()),
        (Mode::Attributes, Filter::None) => {
            let element = accessor.element_size();
            let stride = bytes::align_up(element, 4);
            let raw = reader.element_bytes(accessor_index)?;
            let mut padded = vec![0u8; count * stride];
            for (dst, src) in padded.chunks_exact_mut(stride).zip(raw.chunks_exact(element)) {
                dst[..element].copy_from_slice(src);
            }
            (padded, stride)
        }
        (Mode::Attributes, Filter::Octahedral) => {
            let components = accessor.accessor_type.components();
            if !accessor.component_type.is_float() || !(components == 3 || components == 4) {
                return Err(MeshoptError::FilterInput("octahedral").into());
            }
            let values = reader.read_f32(accessor_index)?;
            let lanes: Vec<f32> = values
                .chunks_exact(components)
                .flat_map(|v| [v[0], v[1], v[2], if components == 4 { v[3] } else { 0.0 }])
                .collect();
            let stride = if options.filter_bits <= 8 { 4 } else { 8 };
            updated.component_type = if stride == 4 {
                ComponentType::Byte
            } else {
                ComponentType::Short
            };
            updated.normalized = true;
            (filter::encode_octahedral(&lanes, stride, options.filter_bits)?, stride)
        }
        (Mode::Attributes, Filter::Quaternion) => {
            if !accessor.component_type.is_float() || accessor.accessor_type != AccessorType::Vec4 {
                return Err(MeshoptError::FilterInput("quaternion").into());
            }
            let values = reader.read_f32(accessor_index)?;
            updated.component_type = ComponentType::Short;
            updated.normalized = true;
            (filter::encode_quaternion(&values, options.filter_bits)?, 8)
        }
        (Mode::Attributes, Filter::Exponential) => {
            if !accessor.component_type.is_float() || accessor.accessor_type.components() > 4 {
                return Err(MeshoptError::FilterInput("exponential").into());
            }
            let values = reader.read_f32(accessor_index)?;
            (
                filter::encode_exponential(&values, options.filter_bits)?,
                accessor.element_size(),
            )
        }
    };

    if matches!(options.filter, Filter::Octahedral | Filter::Quaternion) {
        let (min, max) = component_bounds(&data, stride, &updated);
        updated.min = min;
        updated.max = max;
        doc.mark_extension_used("KHR_mesh_quantization", true);
    }

    let target = match options.mode {
        Mode::Attributes => BufferTarget::ArrayBuffer,
        _ => BufferTarget::ElementArrayBuffer,
    };
    let view = write_compressed_view(doc, &data, count, stride, options.mode, options.filter, Some(target))?;
    updated.buffer_view = Some(view);
    updated.byte_offset = 0;
    updated.sparse = None;
    *doc.accessor_mut(accessor_index)? = updated;
    Ok(())
}

/// Per-component bounds of filtered 16- or 8-bit lanes, as required for
/// POSITION-like accessors; empty unless the original accessor had bounds.
fn component_bounds(data: &[u8], stride: usize, accessor: &Accessor) -> (Vec<f64>, Vec<f64>) {
    if accessor.min.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let components = accessor.accessor_type.components();
    let size = accessor.component_type.size();
    let mut min = vec![f64::MAX; components];
    let mut max = vec![f64::MIN; components];
    for element in data.chunks_exact(stride) {
        for k in 0..components {
            let value = if size == 1 {
                f64::from(element[k] as i8)
            } else {
                f64::from(i16::from_le_bytes([element[2 * k], element[2 * k + 1]]))
            };
            min[k] = min[k].min(value);
            max[k] = max[k].max(value);
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltfx_core::builder::append_vertex_accessor;
    use gltfx_core::{append_attribute, append_indices, Column};
    use proptest::prelude::*;

    #[test]
    fn test_ten_vertices_roundtrip() {
        let data: Vec<u8> = (0..120u32).map(|i| (i * 13 + 7) as u8).collect();
        let encoded = encode(&data, 10, 12, Mode::Attributes).unwrap();
        let decoded = decode(&encoded, 10, 12, Mode::Attributes, Filter::None).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_mode_rules() {
        assert!(Mode::Attributes.check(6, Filter::None).is_err());
        assert!(Mode::Attributes.check(260, Filter::None).is_err());
        assert!(Mode::Triangles.check(4, Filter::Exponential).is_err());
        assert!(Mode::Indices.check(8, Filter::None).is_err());
        assert!(Mode::Indices.check(2, Filter::None).is_ok());
    }

    #[test]
    fn test_extension_forms_parse() {
        let view: MeshoptExtension = serde_json::from_str(
            r#"{"buffer":0,"byteLength":10,"byteStride":12,"count":10,"mode":"ATTRIBUTES"}"#,
        )
        .unwrap();
        assert!(matches!(view, MeshoptExtension::View(ref v) if v.filter == Filter::None));
        let buffer: MeshoptExtension = serde_json::from_str(r#"{"fallback":true}"#).unwrap();
        assert_eq!(buffer, MeshoptExtension::Buffer(FallbackBuffer { fallback: true }));
    }

    #[test]
    fn test_write_then_decode_all() {
        let mut doc = Document::new();
        let data: Vec<u8> = (0..96u32).map(|i| (i / 3) as u8).collect();
        let view = write_compressed_view(&mut doc, &data, 8, 12, Mode::Attributes, Filter::None, None).unwrap();
        assert_eq!(doc.buffers.len(), 2);
        assert!(doc.buffers[1].is_fallback());
        assert!(doc.is_extension_required(EXTENSION_NAME));
        doc.validate_layout().unwrap();

        assert_eq!(decode_all(&mut doc).unwrap(), 1);
        assert_eq!(doc.view_data(view).unwrap(), &data[..]);
        assert!(!doc.is_extension_used(EXTENSION_NAME));
        assert!(doc.buffers[1].extensions.is_empty());
    }

    #[test]
    fn test_decode_all_rejects_overflowing_offsets() {
        let data: Vec<u8> = (0..96u32).map(|i| (i / 3) as u8).collect();
        let corruptions: [fn(&mut CompressedView, &mut BufferView); 3] = [
            |ext, _| ext.byte_offset = usize::MAX - 2,
            |ext, _| ext.count = usize::MAX / 2,
            |_, view| view.byte_offset = usize::MAX - 4,
        ];
        for corrupt in corruptions {
            let mut doc = Document::new();
            let view = write_compressed_view(&mut doc, &data, 8, 12, Mode::Attributes, Filter::None, None).unwrap();
            let target = &mut doc.buffer_views[view as usize];
            let Some(MeshoptExtension::View(mut ext)) = target.extensions.read::<MeshoptExtension>().unwrap() else {
                panic!("view {} is not compressed", view);
            };
            corrupt(&mut ext, target);
            target.extensions.insert(MeshoptExtension::View(ext));
            assert!(matches!(decode_all(&mut doc), Err(GltfError::BufferOverflow(_))));
        }
    }

    #[test]
    fn test_compress_indices_in_place() {
        let mut doc = Document::new();
        let indices: Vec<u32> = (0..300).map(|i| i % 290).collect();
        let accessor = append_indices(&mut doc, &indices).unwrap();
        let view = doc.accessors[accessor as usize].buffer_view.unwrap();
        let options = MeshoptOptions {
            mode: Mode::Triangles,
            ..MeshoptOptions::default()
        };
        compress_buffer_view(&mut doc, view, &options).unwrap();
        assert!(!doc.is_extension_required(EXTENSION_NAME));

        // Scribble over the raw copy; decoding must restore it.
        let original = doc.view_data(view).unwrap().to_vec();
        let start = doc.buffer_views[view as usize].byte_offset;
        doc.buffers[0].data[start..start + 4].fill(0xEE);
        decode_all(&mut doc).unwrap();
        let restored = doc.view_data(view).unwrap().to_vec();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_compress_normals_octahedral() {
        let mut doc = Document::new();
        let normals = Column::Vec3F32(vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]]);
        let accessor = append_attribute(&mut doc, &normals).unwrap();
        let options = MeshoptOptions {
            filter: Filter::Octahedral,
            ..MeshoptOptions::default()
        };
        compress_accessor(&mut doc, accessor, &options).unwrap();
        assert_eq!(doc.accessors[accessor as usize].component_type, ComponentType::Short);
        assert!(doc.is_extension_required("KHR_mesh_quantization"));

        decode_all(&mut doc).unwrap();
        let values = AccessorReader::new(&doc).read_f32(accessor).unwrap();
        let expected = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, -1.0, 0.0];
        for (got, want) in values.iter().zip(expected) {
            assert!((got - want).abs() < 1.0e-4);
        }
    }

    #[test]
    fn test_compress_padded_attribute() {
        let mut doc = Document::new();
        let raw: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
        let accessor = append_vertex_accessor(
            &mut doc,
            &raw,
            Accessor::new(ComponentType::UnsignedByte, AccessorType::Vec3, 2),
        )
        .unwrap();
        compress_accessor(&mut doc, accessor, &MeshoptOptions::default()).unwrap();
        decode_all(&mut doc).unwrap();
        let bytes = AccessorReader::new(&doc).element_bytes(accessor).unwrap();
        assert_eq!(bytes, raw);
    }

    proptest! {
        #[test]
        fn prop_attribute_roundtrip(
            stride in (1usize..=16).prop_map(|s| s * 4),
            seed in proptest::collection::vec(any::<u8>(), 0..600),
        ) {
            let count = seed.len() / stride;
            let data = &seed[..count * stride];
            let encoded = encode(data, count, stride, Mode::Attributes).unwrap();
            prop_assert_eq!(decode(&encoded, count, stride, Mode::Attributes, Filter::None).unwrap(), data);
        }

        #[test]
        fn prop_sequence_roundtrip(indices in proptest::collection::vec(0u32..70000, 0..200)) {
            let data = write_indices(&indices, 4);
            let encoded = encode(&data, indices.len(), 4, Mode::Indices).unwrap();
            prop_assert_eq!(decode(&encoded, indices.len(), 4, Mode::Indices, Filter::None).unwrap(), data);
        }

        #[test]
        fn prop_triangles_roundtrip_exactly(indices in proptest::collection::vec(0u32..500, 0..100)) {
            let n = indices.len() / 3 * 3;
            let data = write_indices(&indices[..n], 2);
            let encoded = encode(&data, n, 2, Mode::Triangles).unwrap();
            prop_assert_eq!(decode(&encoded, n, 2, Mode::Triangles, Filter::None).unwrap(), data);
        }
    }
}
