//! Accessor builder shared by every writer.
//!
//! All functions append to the main buffer (`buffers[0]`), keep its end
//! padded to 4 bytes, and return the index of the new view or accessor.
//! Nothing is ever inserted before existing data, so previously returned
//! offsets stay valid.
//!
//! # Example
//!
//! ```ignore
//! let mut doc = Document::new();
//! let positions = Column::Vec3F32(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
//! let accessor = append_attribute(&mut doc, &positions)?;
//! doc.meshes[0].primitives[0].attributes.insert("POSITION".into(), accessor);
//! ```

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::bytes::{self, LeScalar, BIN_PADDING};
use crate::document::{Accessor, BufferView, Document};
use crate::error::{GltfError, Result};
use crate::types::{element_size, AccessorType, BufferTarget, ComponentType};

/// Alignment of every view start and of the main buffer's end.
pub const VIEW_ALIGNMENT: usize = 4;

/// Largest string table an indexed string column can address.
pub const MAX_INDEXED_STRINGS: usize = u16::MAX as usize;

// ============================================================================
// Columns
// ============================================================================

/// A homogeneous column of per-element values.
///
/// 64-bit float columns are narrowed to `f32` since glTF accessors have no
/// double component type. `I32`, `I64` and `U64` are stored with the
/// narrowest glTF component type that holds every value. The `Ragged*`
/// variants hold one row per element; every row must have the same width
/// of 1, 2, 3, 4, 9 or 16 components to become an accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    String(Vec<String>),
    Bool(Vec<bool>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Vec2F32(Vec<[f32; 2]>),
    Vec3F32(Vec<[f32; 3]>),
    Vec4F32(Vec<[f32; 4]>),
    Vec2F64(Vec<[f64; 2]>),
    Vec3F64(Vec<[f64; 3]>),
    Vec4F64(Vec<[f64; 4]>),
    Mat2F32(Vec<[f32; 4]>),
    Mat3F32(Vec<[f32; 9]>),
    Mat4F32(Vec<[f32; 16]>),
    Mat2F64(Vec<[f64; 4]>),
    Mat3F64(Vec<[f64; 9]>),
    Mat4F64(Vec<[f64; 16]>),
    RaggedI8(Vec<Vec<i8>>),
    RaggedU8(Vec<Vec<u8>>),
    RaggedI16(Vec<Vec<i16>>),
    RaggedU16(Vec<Vec<u16>>),
    RaggedI32(Vec<Vec<i32>>),
    RaggedU32(Vec<Vec<u32>>),
    RaggedI64(Vec<Vec<i64>>),
    RaggedU64(Vec<Vec<u64>>),
    RaggedF32(Vec<Vec<f32>>),
    RaggedF64(Vec<Vec<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::String(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::I8(v) => v.len(),
            Column::U8(v) => v.len(),
            Column::I16(v) => v.len(),
            Column::U16(v) => v.len(),
            Column::I32(v) => v.len(),
            Column::U32(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::U64(v) => v.len(),
            Column::F32(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::Vec2F32(v) => v.len(),
            Column::Vec3F32(v) => v.len(),
            Column::Vec4F32(v) => v.len(),
            Column::Vec2F64(v) => v.len(),
            Column::Vec3F64(v) => v.len(),
            Column::Vec4F64(v) => v.len(),
            Column::Mat2F32(v) => v.len(),
            Column::Mat3F32(v) => v.len(),
            Column::Mat4F32(v) => v.len(),
            Column::Mat2F64(v) => v.len(),
            Column::Mat3F64(v) => v.len(),
            Column::Mat4F64(v) => v.len(),
            Column::RaggedI8(v) => v.len(),
            Column::RaggedU8(v) => v.len(),
            Column::RaggedI16(v) => v.len(),
            Column::RaggedU16(v) => v.len(),
            Column::RaggedI32(v) => v.len(),
            Column::RaggedU32(v) => v.len(),
            Column::RaggedI64(v) => v.len(),
            Column::RaggedU64(v) => v.len(),
            Column::RaggedF32(v) => v.len(),
            Column::RaggedF64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Infers a column from dynamically typed JSON values.
    ///
    /// The first element picks the variant: strings, booleans, numbers or
    /// numeric arrays. Numbers become `I64` when all are integers that fit
    /// an `i64`, `U64` when all are non-negative integers, and `F64`
    /// otherwise. Arrays of length 2, 3, 4, 9 or 16 become vectors or
    /// matrices; any other width, or rows of differing widths, become
    /// `RaggedF64`. Every other element must have the same kind.
    pub fn infer(values: &[Value]) -> Result<Column> {
        let first = values
            .first()
            .ok_or_else(|| GltfError::invalid_input("cannot infer the type of an empty column"))?;
        let mismatch = |i: usize| {
            GltfError::TypeInference(format!(
                "element {} does not match the type of element 0 ({})",
                i, first
            ))
        };
        match first {
            Value::String(_) => values
                .iter()
                .enumerate()
                .map(|(i, v)| v.as_str().map(str::to_string).ok_or_else(|| mismatch(i)))
                .collect::<Result<_>>()
                .map(Column::String),
            Value::Bool(_) => values
                .iter()
                .enumerate()
                .map(|(i, v)| v.as_bool().ok_or_else(|| mismatch(i)))
                .collect::<Result<_>>()
                .map(Column::Bool),
            Value::Number(_) => {
                if let Some(i) = values.iter().position(|v| !v.is_number()) {
                    return Err(mismatch(i));
                }
                if let Some(ints) = values.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
                    return Ok(Column::I64(ints));
                }
                if let Some(uints) = values.iter().map(Value::as_u64).collect::<Option<Vec<_>>>() {
                    return Ok(Column::U64(uints));
                }
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| v.as_f64().ok_or_else(|| mismatch(i)))
                    .collect::<Result<_>>()
                    .map(Column::F64)
            }
            Value::Array(items) => {
                let width = items.len();
                let rows = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| -> Result<Vec<f64>> {
                        let row = v.as_array().ok_or_else(|| mismatch(i))?;
                        row.iter().map(|c| c.as_f64().ok_or_else(|| mismatch(i))).collect()
                    })
                    .collect::<Result<Vec<Vec<f64>>>>()?;
                if rows.iter().any(|row| row.len() != width) {
                    return Ok(Column::RaggedF64(rows));
                }
                match width {
                    2 => Ok(Column::Vec2F64(fixed_rows(&rows))),
                    3 => Ok(Column::Vec3F64(fixed_rows(&rows))),
                    4 => Ok(Column::Vec4F64(fixed_rows(&rows))),
                    9 => Ok(Column::Mat3F64(fixed_rows(&rows))),
                    16 => Ok(Column::Mat4F64(fixed_rows(&rows))),
                    _ => Ok(Column::RaggedF64(rows)),
                }
            }
            other => Err(GltfError::TypeInference(format!(
                "unsupported column element {}",
                other
            ))),
        }
    }
}

fn fixed_rows<const N: usize>(rows: &[Vec<f64>]) -> Vec<[f64; N]> {
    rows.iter()
        .map(|row| {
            let mut out = [0.0; N];
            out.copy_from_slice(row);
            out
        })
        .collect()
}

/// Bytes plus per-component bounds of an encoded column.
struct Packed {
    bytes: Vec<u8>,
    min: Vec<f64>,
    max: Vec<f64>,
}

impl Packed {
    fn unbounded(bytes: Vec<u8>) -> Self {
        Packed {
            bytes,
            min: Vec::new(),
            max: Vec::new(),
        }
    }
}

/// Packs `width`-component elements stored back to back in `values`.
fn pack_flat<T: LeScalar>(values: &[T], width: usize) -> Packed {
    let mut min = vec![f64::INFINITY; width];
    let mut max = vec![f64::NEG_INFINITY; width];
    for (i, value) in values.iter().enumerate() {
        let v = value.to_f64().unwrap_or(0.0);
        let c = i % width;
        min[c] = min[c].min(v);
        max[c] = max[c].max(v);
    }
    Packed {
        bytes: bytes::to_bytes(values),
        min,
        max,
    }
}

fn pack_rows<T: LeScalar, const N: usize>(rows: &[[T; N]]) -> Packed {
    let flat: Vec<T> = rows.iter().flatten().copied().collect();
    pack_flat(&flat, N)
}

fn pack_scalars<T: LeScalar>(values: &[T]) -> Packed {
    pack_flat(values, 1)
}

fn narrow<const N: usize>(rows: &[[f64; N]]) -> Vec<[f32; N]> {
    rows.iter().map(|row| row.map(|v| v as f32)).collect()
}

fn cast_all<T: LeScalar>(wide: &[i128]) -> Vec<T> {
    wide.iter()
        .map(|&v| num_traits::cast::<i128, T>(v).unwrap_or_default())
        .collect()
}

/// Stores integers with the narrowest glTF component type holding all of
/// them. Signed sources prefer BYTE and SHORT, unsigned sources
/// UNSIGNED_BYTE and UNSIGNED_SHORT; both fall back to UNSIGNED_INT when
/// every value is non-negative.
fn pack_integers<S: LeScalar + Into<i128>>(values: &[S], width: usize, signed: bool) -> Result<(ComponentType, Packed)> {
    let wide: Vec<i128> = values.iter().map(|&v| v.into()).collect();
    let min = wide.iter().copied().min().unwrap_or(0);
    let max = wide.iter().copied().max().unwrap_or(0);
    let fits = |lo: i128, hi: i128| min >= lo && max <= hi;
    if signed && fits(i8::MIN.into(), i8::MAX.into()) {
        Ok((ComponentType::Byte, pack_flat(&cast_all::<i8>(&wide), width)))
    } else if signed && fits(i16::MIN.into(), i16::MAX.into()) {
        Ok((ComponentType::Short, pack_flat(&cast_all::<i16>(&wide), width)))
    } else if !signed && fits(0, u8::MAX.into()) {
        Ok((ComponentType::UnsignedByte, pack_flat(&cast_all::<u8>(&wide), width)))
    } else if !signed && fits(0, u16::MAX.into()) {
        Ok((ComponentType::UnsignedShort, pack_flat(&cast_all::<u16>(&wide), width)))
    } else if fits(0, u32::MAX.into()) {
        Ok((ComponentType::UnsignedInt, pack_flat(&cast_all::<u32>(&wide), width)))
    } else {
        Err(GltfError::TypeInference(format!(
            "integers in [{}, {}] fit no glTF component type",
            min, max
        )))
    }
}

/// Accessor type of `width`-component elements.
fn accessor_type_of_width(width: usize) -> Result<AccessorType> {
    match width {
        1 => Ok(AccessorType::Scalar),
        2 => Ok(AccessorType::Vec2),
        3 => Ok(AccessorType::Vec3),
        4 => Ok(AccessorType::Vec4),
        9 => Ok(AccessorType::Mat3),
        16 => Ok(AccessorType::Mat4),
        n => Err(GltfError::TypeInference(format!(
            "rows of {} components have no accessor type",
            n
        ))),
    }
}

/// Flattens rows that all share one width.
fn flatten_rows<T: Copy>(rows: &[Vec<T>]) -> Result<(usize, Vec<T>)> {
    let width = rows.first().map_or(0, Vec::len);
    if let Some(i) = rows.iter().position(|row| row.len() != width) {
        return Err(GltfError::TypeInference(format!(
            "row {} has {} components but row 0 has {}; ragged rows have no accessor type",
            i,
            rows[i].len(),
            width
        )));
    }
    Ok((width, rows.iter().flatten().copied().collect()))
}

fn pack_ragged_integers<S: LeScalar + Into<i128>>(
    rows: &[Vec<S>],
    signed: bool,
) -> Result<(AccessorType, ComponentType, Packed)> {
    let (width, flat) = flatten_rows(rows)?;
    let accessor_type = accessor_type_of_width(width)?;
    let (component_type, packed) = pack_integers(&flat, width, signed)?;
    Ok((accessor_type, component_type, packed))
}

fn pack_ragged_floats<S: Copy + Into<f64>>(rows: &[Vec<S>]) -> Result<(AccessorType, ComponentType, Packed)> {
    let (width, flat) = flatten_rows(rows)?;
    let accessor_type = accessor_type_of_width(width)?;
    let narrowed: Vec<f32> = flat.into_iter().map(|v| Into::<f64>::into(v) as f32).collect();
    Ok((accessor_type, ComponentType::Float, pack_flat(&narrowed, width)))
}

/// Encodes a column into its accessor layout and bytes.
fn pack_column(column: &Column) -> Result<(AccessorType, ComponentType, Packed)> {
    use AccessorType as A;
    use ComponentType as C;
    let scalar = |(component, packed): (ComponentType, Packed)| (A::Scalar, component, packed);
    Ok(match column {
        Column::String(_) => {
            return Err(GltfError::invalid_input("string columns are packed as indexed strings"))
        }
        Column::Bool(values) => (
            A::Scalar,
            C::UnsignedByte,
            Packed::unbounded(values.iter().map(|&b| u8::from(b)).collect()),
        ),
        Column::I8(v) => (A::Scalar, C::Byte, pack_scalars(v)),
        Column::U8(v) => (A::Scalar, C::UnsignedByte, pack_scalars(v)),
        Column::I16(v) => (A::Scalar, C::Short, pack_scalars(v)),
        Column::U16(v) => (A::Scalar, C::UnsignedShort, pack_scalars(v)),
        Column::U32(v) => (A::Scalar, C::UnsignedInt, pack_scalars(v)),
        Column::I32(v) => scalar(pack_integers(v, 1, true)?),
        Column::I64(v) => scalar(pack_integers(v, 1, true)?),
        Column::U64(v) => scalar(pack_integers(v, 1, false)?),
        Column::F32(v) => (A::Scalar, C::Float, pack_scalars(v)),
        Column::F64(v) => (
            A::Scalar,
            C::Float,
            pack_scalars(&v.iter().map(|&x| x as f32).collect::<Vec<_>>()),
        ),
        Column::Vec2F32(v) => (A::Vec2, C::Float, pack_rows(v)),
        Column::Vec3F32(v) => (A::Vec3, C::Float, pack_rows(v)),
        Column::Vec4F32(v) => (A::Vec4, C::Float, pack_rows(v)),
        Column::Vec2F64(v) => (A::Vec2, C::Float, pack_rows(&narrow(v))),
        Column::Vec3F64(v) => (A::Vec3, C::Float, pack_rows(&narrow(v))),
        Column::Vec4F64(v) => (A::Vec4, C::Float, pack_rows(&narrow(v))),
        Column::Mat2F32(v) => (A::Mat2, C::Float, pack_rows(v)),
        Column::Mat3F32(v) => (A::Mat3, C::Float, pack_rows(v)),
        Column::Mat4F32(v) => (A::Mat4, C::Float, pack_rows(v)),
        Column::Mat2F64(v) => (A::Mat2, C::Float, pack_rows(&narrow(v))),
        Column::Mat3F64(v) => (A::Mat3, C::Float, pack_rows(&narrow(v))),
        Column::Mat4F64(v) => (A::Mat4, C::Float, pack_rows(&narrow(v))),
        Column::RaggedI8(rows) => pack_ragged_integers(rows, true)?,
        Column::RaggedU8(rows) => pack_ragged_integers(rows, false)?,
        Column::RaggedI16(rows) => pack_ragged_integers(rows, true)?,
        Column::RaggedU16(rows) => pack_ragged_integers(rows, false)?,
        Column::RaggedI32(rows) => pack_ragged_integers(rows, true)?,
        Column::RaggedU32(rows) => pack_ragged_integers(rows, false)?,
        Column::RaggedI64(rows) => pack_ragged_integers(rows, true)?,
        Column::RaggedU64(rows) => pack_ragged_integers(rows, false)?,
        Column::RaggedF32(rows) => pack_ragged_floats(rows)?,
        Column::RaggedF64(rows) => pack_ragged_floats(rows)?,
    })
}

// ============================================================================
// Strings
// ============================================================================

/// Deduplicates `strings` into a table in first-seen order and returns one
/// u16 index per input string.
pub fn pack_indexed_strings<S: AsRef<str>>(strings: &[S]) -> Result<(Vec<u16>, Vec<String>)> {
    let mut table: Vec<String> = Vec::new();
    let mut lookup: HashMap<&str, u16> = HashMap::new();
    let mut indices = Vec::with_capacity(strings.len());
    for s in strings {
        let s = s.as_ref();
        let index = match lookup.get(s) {
            Some(&index) => index,
            None => {
                if table.len() >= MAX_INDEXED_STRINGS {
                    return Err(GltfError::schema(format!(
                        "more than {} distinct strings in an indexed string column",
                        MAX_INDEXED_STRINGS
                    )));
                }
                let index = table.len() as u16;
                table.push(s.to_string());
                lookup.insert(s, index);
                index
            }
        };
        indices.push(index);
    }
    Ok((indices, table))
}

/// Concatenated UTF-8 bytes and the `len + 1` u32 offsets into them.
pub fn pack_offset_strings<S: AsRef<str>>(strings: &[S]) -> Result<(Vec<u8>, Vec<u32>)> {
    let mut values = Vec::new();
    let mut offsets = Vec::with_capacity(strings.len() + 1);
    offsets.push(0u32);
    for s in strings {
        values.extend_from_slice(s.as_ref().as_bytes());
        let end = u32::try_from(values.len()).map_err(|_| {
            GltfError::invalid_input("string column exceeds the u32 offset range")
        })?;
        offsets.push(end);
    }
    Ok((values, offsets))
}

/// Inverse of [`pack_offset_strings`]. The last offset must equal the
/// length of `values`.
pub fn unpack_offset_strings(values: &[u8], offsets: &[u32]) -> Result<Vec<String>> {
    if let Some(&last) = offsets.last() {
        if last as usize != values.len() {
            return Err(GltfError::schema(format!(
                "string offsets end at {} but the values hold {} bytes",
                last,
                values.len()
            )));
        }
    }
    offsets
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0] as usize, pair[1] as usize);
            if start > end || end > values.len() {
                return Err(GltfError::BufferOverflow(format!(
                    "string offsets [{}, {}) outside {} value bytes",
                    start,
                    end,
                    values.len()
                )));
            }
            String::from_utf8(values[start..end].to_vec())
                .map_err(|e| GltfError::invalid_input(format!("string is not UTF-8: {}", e)))
        })
        .collect()
}

// ============================================================================
// Appending
// ============================================================================

/// Appends `bytes` to the main buffer as a new buffer view.
pub fn append_bytes(
    doc: &mut Document,
    bytes: &[u8],
    target: Option<BufferTarget>,
    byte_stride: Option<usize>,
) -> Result<u32> {
    append_bytes_aligned(doc, bytes, VIEW_ALIGNMENT, BIN_PADDING, target, byte_stride)
}

/// Appends `bytes` starting at a multiple of `alignment`, padding with `fill`.
pub fn append_bytes_aligned(
    doc: &mut Document,
    bytes: &[u8],
    alignment: usize,
    fill: u8,
    target: Option<BufferTarget>,
    byte_stride: Option<usize>,
) -> Result<u32> {
    let buffer = doc.main_buffer_mut()?;
    let byte_offset = buffer.append(bytes, alignment.max(VIEW_ALIGNMENT), fill);
    buffer.pad_end(alignment.max(VIEW_ALIGNMENT), fill);
    tracing::debug!(
        byte_offset,
        byte_length = bytes.len(),
        buffer_length = buffer.byte_length,
        "appended buffer view"
    );
    let view = BufferView {
        byte_stride,
        target,
        ..BufferView::new(0, byte_offset, bytes.len())
    };
    doc.push_buffer_view(view)
}

/// Appends `bytes` as a new view and pushes `accessor` pointing at it.
pub fn append_accessor(
    doc: &mut Document,
    bytes: &[u8],
    mut accessor: Accessor,
    target: Option<BufferTarget>,
) -> Result<u32> {
    let expected = accessor.count * accessor.element_size();
    if bytes.len() != expected {
        return Err(GltfError::invalid_input(format!(
            "{} {:?} elements need {} bytes, got {}",
            accessor.count,
            accessor.accessor_type,
            expected,
            bytes.len()
        )));
    }
    let view = append_bytes(doc, bytes, target, None)?;
    accessor.buffer_view = Some(view);
    accessor.byte_offset = 0;
    doc.push_accessor(accessor)
}

/// Like [`append_accessor`] for vertex attributes: elements whose size is not
/// a multiple of 4 are padded and the view gets an explicit stride.
pub fn append_vertex_accessor(doc: &mut Document, bytes: &[u8], mut accessor: Accessor) -> Result<u32> {
    let element = element_size(accessor.accessor_type, accessor.component_type);
    if bytes.len() != accessor.count * element {
        return Err(GltfError::invalid_input(format!(
            "{} elements of {} bytes need {} bytes, got {}",
            accessor.count,
            element,
            accessor.count * element,
            bytes.len()
        )));
    }
    let stride = bytes::align_up(element, VIEW_ALIGNMENT);
    if stride == element {
        return append_accessor(doc, bytes, accessor, Some(BufferTarget::ArrayBuffer));
    }
    let mut padded = vec![0u8; accessor.count * stride];
    for (dst, src) in padded.chunks_exact_mut(stride).zip(bytes.chunks_exact(element)) {
        dst[..element].copy_from_slice(src);
    }
    let view = append_bytes(doc, &padded, Some(BufferTarget::ArrayBuffer), Some(stride))?;
    accessor.buffer_view = Some(view);
    accessor.byte_offset = 0;
    doc.push_accessor(accessor)
}

/// Appends a column as a new accessor and returns its index.
///
/// Numeric columns get per-component `min`/`max`; boolean columns are
/// stored as 0/1 bytes without bounds; string columns are stored as u16
/// indices into a string table kept in the accessor's `extras.strings`.
pub fn append_attribute(doc: &mut Document, column: &Column) -> Result<u32> {
    if column.is_empty() {
        return Err(GltfError::invalid_input("cannot append an empty column"));
    }
    let (accessor_type, component_type, packed, extras) = match column {
        Column::String(strings) => {
            let (indices, table) = pack_indexed_strings(strings)?;
            (
                AccessorType::Scalar,
                ComponentType::UnsignedShort,
                Packed::unbounded(bytes::to_bytes(&indices)),
                Some(json!({ "strings": table })),
            )
        }
        other => {
            let (accessor_type, component_type, packed) = pack_column(other)?;
            (accessor_type, component_type, packed, None)
        }
    };
    let mut accessor = Accessor::new(component_type, accessor_type, column.len());
    accessor.min = packed.min;
    accessor.max = packed.max;
    accessor.extras = extras;
    append_accessor(doc, &packed.bytes, accessor, Some(BufferTarget::ArrayBuffer))
}

/// Smallest index component type that holds `max_index`.
pub fn index_component_type(max_index: u32) -> ComponentType {
    if max_index <= u8::MAX as u32 {
        ComponentType::UnsignedByte
    } else if max_index <= u16::MAX as u32 {
        ComponentType::UnsignedShort
    } else {
        ComponentType::UnsignedInt
    }
}

/// Appends an index accessor using the narrowest sufficient width.
pub fn append_indices(doc: &mut Document, indices: &[u32]) -> Result<u32> {
    if indices.is_empty() {
        return Err(GltfError::invalid_input("cannot append an empty index list"));
    }
    let max_index = indices.iter().copied().max().unwrap_or(0);
    let component_type = index_component_type(max_index);
    let data = match component_type {
        ComponentType::UnsignedByte => indices.iter().map(|&i| i as u8).collect(),
        ComponentType::UnsignedShort => {
            bytes::to_bytes(&indices.iter().map(|&i| i as u16).collect::<Vec<_>>())
        }
        _ => bytes::to_bytes(indices),
    };
    let accessor = Accessor::new(component_type, AccessorType::Scalar, indices.len());
    append_accessor(doc, &data, accessor, Some(BufferTarget::ElementArrayBuffer))
}
