//! Accessor read path: de-strided element bytes and typed values.

use crate::bytes::{self, LeScalar};
use crate::document::{accessor_span, Accessor, Document};
use crate::error::{GltfError, Result};
use crate::types::{AccessorType, ComponentType};

/// Reads accessor data out of a document's loaded buffers.
#[derive(Debug, Clone, Copy)]
pub struct AccessorReader<'a> {
    doc: &'a Document,
}

impl<'a> AccessorReader<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    /// Packed element bytes (`count * element_size`), with the view stride
    /// removed and sparse substitution applied. An accessor without a view
    /// reads as zeros.
    pub fn element_bytes(&self, index: u32) -> Result<Vec<u8>> {
        let accessor = self.doc.accessor(index)?;
        let element = accessor.element_size();
        let packed = bytes::checked_size(accessor.count, element)?;
        let mut out = match accessor.buffer_view {
            None => vec![0u8; packed],
            Some(view_index) => {
                let view = self.doc.buffer_view(view_index)?;
                let data = self.doc.view_data(view_index)?;
                check_alignment(accessor, view.byte_offset, index)?;
                let span = accessor_span(accessor, view)?;
                let range = bytes::checked_range(accessor.byte_offset, span)?;
                let data = data.get(range).ok_or_else(|| {
                    GltfError::BufferOverflow(format!(
                        "accessor {} needs {} bytes at offset {} but view {} has {}",
                        index,
                        span,
                        accessor.byte_offset,
                        view_index,
                        data.len()
                    ))
                })?;
                let stride = view.effective_stride(element);
                let mut out = Vec::with_capacity(packed);
                for i in 0..accessor.count {
                    let start = i * stride;
                    out.extend_from_slice(&data[start..start + element]);
                }
                out
            }
        };
        if let Some(sparse) = &accessor.sparse {
            let indices_view = self.doc.view_data(sparse.indices.buffer_view)?;
            let values_view = self.doc.view_data(sparse.values.buffer_view)?;
            let index_size = sparse.indices.component_type.size();
            let index_range =
                bytes::checked_range(sparse.indices.byte_offset, bytes::checked_size(sparse.count, index_size)?)?;
            let value_range =
                bytes::checked_range(sparse.values.byte_offset, bytes::checked_size(sparse.count, element)?)?;
            let indices = indices_view
                .get(index_range)
                .ok_or_else(|| GltfError::BufferOverflow(format!("sparse indices of accessor {}", index)))?;
            let values = values_view
                .get(value_range)
                .ok_or_else(|| GltfError::BufferOverflow(format!("sparse values of accessor {}", index)))?;
            for (k, value) in values.chunks_exact(element).enumerate() {
                let target = read_index(indices, k, sparse.indices.component_type)? as usize;
                if target >= accessor.count {
                    return Err(GltfError::index_out_of_range("sparse element", target, accessor.count));
                }
                out[target * element..(target + 1) * element].copy_from_slice(value);
            }
        }
        Ok(out)
    }

    /// All components as `f32`, applying normalized integer conversion.
    ///
    /// Matrix column padding is skipped, so the result always has
    /// `count * components` entries.
    pub fn read_f32(&self, index: u32) -> Result<Vec<f32>> {
        let accessor = self.doc.accessor(index)?;
        let raw = self.element_bytes(index)?;
        let ct = accessor.component_type;
        let normalized = accessor.normalized;
        component_offsets(accessor)
            .map(|offset| -> Result<f32> {
                Ok(match ct {
                    ComponentType::Float => bytes::read::<f32>(&raw, offset)?,
                    ComponentType::Byte => int_to_f32(bytes::read::<i8>(&raw, offset)? as f32, ct, normalized),
                    ComponentType::UnsignedByte => int_to_f32(bytes::read::<u8>(&raw, offset)? as f32, ct, normalized),
                    ComponentType::Short => int_to_f32(bytes::read::<i16>(&raw, offset)? as f32, ct, normalized),
                    ComponentType::UnsignedShort => int_to_f32(bytes::read::<u16>(&raw, offset)? as f32, ct, normalized),
                    ComponentType::UnsignedInt => int_to_f32(bytes::read::<u32>(&raw, offset)? as f32, ct, normalized),
                })
            })
            .collect()
    }

    /// All components widened to `u32`; integer accessors only.
    pub fn read_u32(&self, index: u32) -> Result<Vec<u32>> {
        let accessor = self.doc.accessor(index)?;
        let ct = accessor.component_type;
        if ct.is_float() {
            return Err(GltfError::invalid_input(format!(
                "accessor {} holds floats, not integers",
                index
            )));
        }
        let raw = self.element_bytes(index)?;
        component_offsets(accessor)
            .map(|offset| read_index(&raw[offset..], 0, ct))
            .collect()
    }

    /// Components as `T`, which must have the accessor's component size.
    pub fn read_typed<T: LeScalar>(&self, index: u32) -> Result<Vec<T>> {
        let accessor = self.doc.accessor(index)?;
        if accessor.component_type.size() != T::SIZE {
            return Err(GltfError::invalid_input(format!(
                "accessor {} has {}-byte components, requested {}",
                index,
                accessor.component_type.size(),
                T::SIZE
            )));
        }
        let raw = self.element_bytes(index)?;
        component_offsets(accessor)
            .map(|offset| bytes::read::<T>(&raw, offset))
            .collect()
    }
}

/// Byte offset of every component within packed element bytes.
fn component_offsets(accessor: &Accessor) -> impl Iterator<Item = usize> {
    let size = accessor.component_type.size();
    let element = accessor.element_size();
    let (columns, rows) = match accessor.accessor_type {
        AccessorType::Mat2 => (2, 2),
        AccessorType::Mat3 => (3, 3),
        AccessorType::Mat4 => (4, 4),
        other => (1, other.components()),
    };
    let column_stride = element / columns;
    (0..accessor.count).flat_map(move |i| {
        (0..columns).flat_map(move |c| (0..rows).map(move |r| i * element + c * column_stride + r * size))
    })
}

fn check_alignment(accessor: &Accessor, view_offset: usize, index: u32) -> Result<()> {
    let size = accessor.component_type.size();
    if accessor.byte_offset % size != 0 || view_offset % size != 0 {
        return Err(GltfError::AlignmentViolation(format!(
            "accessor {} at offset {} (view offset {}) is not aligned to {} bytes",
            index, accessor.byte_offset, view_offset, size
        )));
    }
    Ok(())
}

fn read_index(data: &[u8], k: usize, ct: ComponentType) -> Result<u32> {
    let offset = k * ct.size();
    match ct {
        ComponentType::UnsignedByte => bytes::read::<u8>(data, offset).map(u32::from),
        ComponentType::Byte => bytes::read::<i8>(data, offset).map(|v| v as u32),
        ComponentType::UnsignedShort => bytes::read::<u16>(data, offset).map(u32::from),
        ComponentType::Short => bytes::read::<i16>(data, offset).map(|v| v as u32),
        ComponentType::UnsignedInt => bytes::read::<u32>(data, offset),
        ComponentType::Float => Err(GltfError::invalid_input("float component used as an index")),
    }
}

/// Normalized integer to float: `raw / max` (unsigned) or `max(raw / max, -1)` (signed).
pub fn int_to_f32(raw: f32, ct: ComponentType, normalized: bool) -> f32 {
    if !normalized || ct.is_float() {
        return raw;
    }
    let value = raw / ct.max_integer() as f32;
    if ct.is_signed() {
        value.max(-1.0)
    } else {
        value
    }
}
