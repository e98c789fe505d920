//! Meshopt vertex buffer codec, bitstream version 0.
//!
//! ```text
//! 0xA0 | block* | tail
//! ```
//!
//! Vertices are split into blocks of up to 256. Within a block every byte
//! lane `k < stride` is delta coded against the same lane of the previous
//! vertex, zigzag mapped, and packed in groups of 16 bytes. Each group has a
//! 2-bit mode in a header that precedes the group payloads:
//!
//! | mode | payload |
//! |------|---------|
//! | 0 | nothing, all deltas are zero |
//! | 1 | 16 x 2 bits, value 3 escapes to a trailing byte |
//! | 2 | 16 x 4 bits, value 15 escapes to a trailing byte |
//! | 3 | 16 raw bytes |
//!
//! The tail holds the first vertex (the initial delta baseline), left-padded
//! with zeros to at least 32 bytes.

use super::MeshoptError;

pub const VERTEX_HEADER: u8 = 0xA0;

const BYTE_GROUP_SIZE: usize = 16;
const BLOCK_SIZE_BYTES: usize = 8192;
const BLOCK_MAX_SIZE: usize = 256;
const TAIL_MIN_SIZE: usize = 32;
pub const MAX_STRIDE: usize = 256;

fn block_size(stride: usize) -> usize {
    let size = (BLOCK_SIZE_BYTES / stride) & !(BYTE_GROUP_SIZE - 1);
    size.min(BLOCK_MAX_SIZE)
}

fn tail_size(stride: usize) -> usize {
    stride.max(TAIL_MIN_SIZE)
}

fn check_stride(stride: usize) -> Result<(), MeshoptError> {
    if stride == 0 || stride > MAX_STRIDE || stride % 4 != 0 {
        return Err(MeshoptError::InvalidStride(stride));
    }
    Ok(())
}

#[inline]
fn zigzag8(v: u8) -> u8 {
    ((v as i8 >> 7) as u8) ^ (v << 1)
}

#[inline]
fn unzigzag8(v: u8) -> u8 {
    (v >> 1) ^ (0u8.wrapping_sub(v & 1))
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes `count` vertices of `stride` bytes each.
pub fn encode_vertex_buffer(vertices: &[u8], count: usize, stride: usize) -> Result<Vec<u8>, MeshoptError> {
    check_stride(stride)?;
    if vertices.len() != count * stride {
        return Err(MeshoptError::SizeMismatch {
            expected: count * stride,
            actual: vertices.len(),
        });
    }

    let mut out = Vec::with_capacity(1 + vertices.len() + tail_size(stride));
    out.push(VERTEX_HEADER);

    let mut first_vertex = [0u8; MAX_STRIDE];
    if count > 0 {
        first_vertex[..stride].copy_from_slice(&vertices[..stride]);
    }
    let mut last_vertex = first_vertex;

    let block = block_size(stride);
    let mut offset = 0;
    while offset < count {
        let size = block.min(count - offset);
        let data = &vertices[offset * stride..(offset + size) * stride];
        encode_block(&mut out, data, size, stride, &mut last_vertex);
        offset += size;
    }

    if stride < TAIL_MIN_SIZE {
        out.resize(out.len() + TAIL_MIN_SIZE - stride, 0);
    }
    out.extend_from_slice(&first_vertex[..stride]);
    Ok(out)
}

fn encode_block(out: &mut Vec<u8>, data: &[u8], count: usize, stride: usize, last_vertex: &mut [u8; MAX_STRIDE]) {
    let padded = (count + BYTE_GROUP_SIZE - 1) & !(BYTE_GROUP_SIZE - 1);
    let mut deltas = [0u8; BLOCK_MAX_SIZE];
    for k in 0..stride {
        let mut previous = last_vertex[k];
        for i in 0..count {
            let value = data[i * stride + k];
            deltas[i] = zigzag8(value.wrapping_sub(previous));
            previous = value;
        }
        deltas[count..padded].fill(0);
        encode_bytes(out, &deltas[..padded]);
    }
    last_vertex[..stride].copy_from_slice(&data[(count - 1) * stride..count * stride]);
}

/// Encoded size of one group at `bits` per value, `None` if the mode cannot represent it.
fn group_size(group: &[u8], bits: u32) -> Option<usize> {
    match bits {
        0 => group.iter().all(|&b| b == 0).then_some(0),
        8 => Some(BYTE_GROUP_SIZE),
        _ => {
            let sentinel = (1u8 << bits) - 1;
            let escapes = group.iter().filter(|&&b| b >= sentinel).count();
            Some(BYTE_GROUP_SIZE * bits as usize / 8 + escapes)
        }
    }
}

fn encode_bytes(out: &mut Vec<u8>, buffer: &[u8]) {
    let groups = buffer.len() / BYTE_GROUP_SIZE;
    let header_start = out.len();
    out.resize(header_start + (groups + 3) / 4, 0);

    for (g, group) in buffer.chunks_exact(BYTE_GROUP_SIZE).enumerate() {
        let mut best_mode = 3u8;
        let mut best_size = BYTE_GROUP_SIZE;
        for (mode, bits) in [(0u8, 0u32), (1, 2), (2, 4)] {
            if let Some(size) = group_size(group, bits) {
                if size < best_size {
                    best_mode = mode;
                    best_size = size;
                }
            }
        }
        out[header_start + g / 4] |= best_mode << ((g % 4) * 2);
        encode_group(out, group, best_mode);
    }
}

fn encode_group(out: &mut Vec<u8>, group: &[u8], mode: u8) {
    match mode {
        0 => {}
        3 => out.extend_from_slice(group),
        _ => {
            let bits = if mode == 1 { 2 } else { 4 };
            let sentinel = (1u8 << bits) - 1;
            let per_byte = 8 / bits;
            for chunk in group.chunks_exact(per_byte) {
                let mut byte = 0u8;
                for &value in chunk {
                    byte = (byte << bits) | value.min(sentinel);
                }
                out.push(byte);
            }
            out.extend(group.iter().copied().filter(|&b| b >= sentinel));
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes `count` vertices of `stride` bytes; the input must be consumed exactly.
pub fn decode_vertex_buffer(data: &[u8], count: usize, stride: usize) -> Result<Vec<u8>, MeshoptError> {
    check_stride(stride)?;
    let tail = tail_size(stride);
    if data.len() < 1 + tail {
        return Err(MeshoptError::Truncated);
    }
    if data[0] & 0xF0 != VERTEX_HEADER {
        return Err(MeshoptError::BadHeader(data[0]));
    }
    let version = data[0] & 0x0F;
    if version != 0 {
        return Err(MeshoptError::UnsupportedVersion(version));
    }

    let mut last_vertex = [0u8; MAX_STRIDE];
    last_vertex[..stride].copy_from_slice(&data[data.len() - stride..]);

    let body = &data[..data.len() - tail];
    let mut cursor = 1;
    let mut out = vec![0u8; count * stride];
    let block = block_size(stride);
    let mut deltas = [0u8; BLOCK_MAX_SIZE];

    let mut offset = 0;
    while offset < count {
        let size = block.min(count - offset);
        let padded = (size + BYTE_GROUP_SIZE - 1) & !(BYTE_GROUP_SIZE - 1);
        let dst = &mut out[offset * stride..(offset + size) * stride];
        for k in 0..stride {
            cursor = decode_bytes(body, cursor, &mut deltas[..padded])?;
            let mut previous = last_vertex[k];
            for i in 0..size {
                let value = unzigzag8(deltas[i]).wrapping_add(previous);
                dst[i * stride + k] = value;
                previous = value;
            }
        }
        last_vertex[..stride].copy_from_slice(&dst[(size - 1) * stride..]);
        offset += size;
    }

    if cursor != body.len() {
        return Err(MeshoptError::TrailingData(body.len() - cursor));
    }
    Ok(out)
}

fn decode_bytes(data: &[u8], mut cursor: usize, buffer: &mut [u8]) -> Result<usize, MeshoptError> {
    let groups = buffer.len() / BYTE_GROUP_SIZE;
    let header_len = (groups + 3) / 4;
    let header = data.get(cursor..cursor + header_len).ok_or(MeshoptError::Truncated)?;
    cursor += header_len;

    for (g, group) in buffer.chunks_exact_mut(BYTE_GROUP_SIZE).enumerate() {
        let mode = (header[g / 4] >> ((g % 4) * 2)) & 3;
        cursor = decode_group(data, cursor, group, mode)?;
    }
    Ok(cursor)
}

fn decode_group(data: &[u8], mut cursor: usize, group: &mut [u8], mode: u8) -> Result<usize, MeshoptError> {
    match mode {
        0 => group.fill(0),
        3 => {
            let raw = data.get(cursor..cursor + BYTE_GROUP_SIZE).ok_or(MeshoptError::Truncated)?;
            group.copy_from_slice(raw);
            cursor += BYTE_GROUP_SIZE;
        }
        _ => {
            let bits = if mode == 1 { 2 } else { 4 };
            let sentinel = (1u8 << bits) - 1;
            let packed_len = BYTE_GROUP_SIZE * bits / 8;
            let packed = data.get(cursor..cursor + packed_len).ok_or(MeshoptError::Truncated)?;
            let mut extra = cursor + packed_len;
            let per_byte = 8 / bits;
            for (i, value) in group.iter_mut().enumerate() {
                let byte = packed[i / per_byte];
                let shift = 8 - bits * (i % per_byte + 1);
                let code = (byte >> shift) & sentinel;
                *value = if code == sentinel {
                    let escaped = *data.get(extra).ok_or(MeshoptError::Truncated)?;
                    extra += 1;
                    escaped
                } else {
                    code
                };
            }
            cursor = extra;
        }
    }
    Ok(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag() {
        for v in 0..=255u8 {
            assert_eq!(unzigzag8(zigzag8(v)), v);
        }
        assert_eq!(zigzag8(0), 0);
        assert_eq!(zigzag8(0xFF), 1); // -1
        assert_eq!(zigzag8(1), 2);
    }

    #[test]
    fn test_ten_vertices_stride_12() {
        let vertices: Vec<u8> = (0..120u32).map(|i| (i * 7 % 251) as u8).collect();
        let encoded = encode_vertex_buffer(&vertices, 10, 12).unwrap();
        assert_eq!(encoded[0], VERTEX_HEADER);
        assert_eq!(decode_vertex_buffer(&encoded, 10, 12).unwrap(), vertices);
    }

    #[test]
    fn test_constant_stream_compresses() {
        let vertices = vec![42u8; 16 * 1000];
        let encoded = encode_vertex_buffer(&vertices, 1000, 16).unwrap();
        assert!(encoded.len() < vertices.len() / 4);
        assert_eq!(decode_vertex_buffer(&encoded, 1000, 16).unwrap(), vertices);
    }

    #[test]
    fn test_multiple_blocks_and_wide_stride() {
        let vertices: Vec<u8> = (0..256 * 70).map(|i| (i as u32).wrapping_mul(2654435761) as u8).collect();
        let encoded = encode_vertex_buffer(&vertices, 70, 256).unwrap();
        assert_eq!(decode_vertex_buffer(&encoded, 70, 256).unwrap(), vertices);
    }

    #[test]
    fn test_empty_buffer() {
        let encoded = encode_vertex_buffer(&[], 0, 8).unwrap();
        assert_eq!(encoded.len(), 1 + TAIL_MIN_SIZE);
        assert!(decode_vertex_buffer(&encoded, 0, 8).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            encode_vertex_buffer(&[0; 6], 1, 6),
            Err(MeshoptError::InvalidStride(6))
        ));
        let vertices = vec![1u8; 40];
        let mut encoded = encode_vertex_buffer(&vertices, 10, 4).unwrap();
        assert!(decode_vertex_buffer(&encoded[..encoded.len() - 1], 10, 4).is_err());
        assert!(decode_vertex_buffer(&encoded, 10, 8).is_err());
        encoded[0] = 0xA1;
        assert!(matches!(
            decode_vertex_buffer(&encoded, 10, 4),
            Err(MeshoptError::UnsupportedVersion(1))
        ));
    }
}
