//! GLB binary container framing.
//!
//! ```text
//! header:   u32 magic = 'glTF', u32 version = 2, u32 total_length
//! chunks:   { u32 length; u32 type; u8 payload[length] }*
//! ```
//!
//! The first chunk is JSON (space padded), the optional second is BIN (zero
//! padded). Unknown chunk types are skipped on read.

use byteorder::{ByteOrder, LittleEndian};
use gltfx_core::bytes::{pad_to, BIN_PADDING, JSON_PADDING};
use gltfx_core::{GltfError, Result};

pub const GLB_MAGIC: u32 = 0x46546C67; // "glTF"
pub const GLB_VERSION: u32 = 2;
pub const GLB_CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
pub const GLB_CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

pub const HEADER_LEN: usize = 12;
pub const CHUNK_HEADER_LEN: usize = 8;

/// Borrowed chunk payloads of a GLB file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbChunks<'a> {
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

/// True if `data` starts with the GLB magic.
pub fn is_glb(data: &[u8]) -> bool {
    data.len() >= 4 && LittleEndian::read_u32(&data[0..4]) == GLB_MAGIC
}

fn invalid(message: impl std::fmt::Display) -> GltfError {
    GltfError::invalid_input(format!("invalid GLB: {}", message))
}

/// Splits a GLB file into its JSON and BIN payloads.
pub fn parse(data: &[u8]) -> Result<GlbChunks<'_>> {
    if data.len() < HEADER_LEN {
        return Err(invalid("file too small for header"));
    }
    let magic = LittleEndian::read_u32(&data[0..4]);
    let version = LittleEndian::read_u32(&data[4..8]);
    let length = LittleEndian::read_u32(&data[8..12]) as usize;

    if magic != GLB_MAGIC {
        return Err(invalid("bad magic"));
    }
    if version != GLB_VERSION {
        return Err(invalid(format!("unsupported version {}", version)));
    }
    if length > data.len() {
        return Err(invalid(format!(
            "header declares {} bytes but file has {}",
            length,
            data.len()
        )));
    }

    let mut offset = HEADER_LEN;
    let mut json = None;
    let mut bin = None;
    while offset + CHUNK_HEADER_LEN <= length {
        let chunk_length = LittleEndian::read_u32(&data[offset..offset + 4]) as usize;
        let chunk_type = LittleEndian::read_u32(&data[offset + 4..offset + 8]);
        offset += CHUNK_HEADER_LEN;
        if offset + chunk_length > length {
            return Err(invalid("chunk extends past end of file"));
        }
        let payload = &data[offset..offset + chunk_length];
        offset += chunk_length;

        match chunk_type {
            GLB_CHUNK_JSON if json.is_none() => json = Some(payload),
            GLB_CHUNK_BIN if json.is_some() && bin.is_none() => bin = Some(payload),
            GLB_CHUNK_JSON | GLB_CHUNK_BIN => {
                return Err(invalid("unexpected or repeated JSON/BIN chunk"));
            }
            other => {
                tracing::warn!(chunk_type = other, chunk_length, "skipping unknown GLB chunk");
            }
        }
    }

    let json = json.ok_or_else(|| invalid("missing JSON chunk"))?;
    Ok(GlbChunks { json, bin })
}

/// Frames a JSON payload and optional BIN payload, padding both to 4 bytes.
pub fn write(json: &[u8], bin: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut json = json.to_vec();
    pad_to(&mut json, 4, JSON_PADDING);
    let bin = bin.map(|bin| {
        let mut bin = bin.to_vec();
        pad_to(&mut bin, 4, BIN_PADDING);
        bin
    });

    let total = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json.len()
        + bin.as_ref().map_or(0, |b| CHUNK_HEADER_LEN + b.len());
    let total_u32 =
        u32::try_from(total).map_err(|_| invalid(format!("{} bytes exceeds the 4 GiB limit", total)))?;

    let mut out = Vec::with_capacity(total);
    push_u32(&mut out, GLB_MAGIC);
    push_u32(&mut out, GLB_VERSION);
    push_u32(&mut out, total_u32);

    push_u32(&mut out, json.len() as u32);
    push_u32(&mut out, GLB_CHUNK_JSON);
    out.extend_from_slice(&json);

    if let Some(bin) = bin {
        push_u32(&mut out, bin.len() as u32);
        push_u32(&mut out, GLB_CHUNK_BIN);
        out.extend_from_slice(&bin);
    }
    Ok(out)
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forty_byte_file() {
        let glb = write(br#"{"a":1}"#, Some(&[1, 2, 3])).unwrap();
        assert_eq!(glb.len(), 40);
        assert_eq!(LittleEndian::read_u32(&glb[8..12]), 40);
        assert_eq!(LittleEndian::read_u32(&glb[12..16]), 8);
        assert_eq!(glb[27], 0x20);
        assert_eq!(LittleEndian::read_u32(&glb[28..32]), 4);
        assert_eq!(LittleEndian::read_u32(&glb[32..36]), GLB_CHUNK_BIN);
        assert_eq!(&glb[36..40], &[1, 2, 3, 0]);

        let chunks = parse(&glb).unwrap();
        assert_eq!(chunks.json, br#"{"a":1} "#);
        assert_eq!(chunks.bin, Some(&[1u8, 2, 3, 0][..]));
    }

    #[test]
    fn test_json_only() {
        let glb = write(b"{}", None).unwrap();
        assert_eq!(glb.len(), 24);
        let chunks = parse(&glb).unwrap();
        assert!(chunks.bin.is_none());
        assert!(is_glb(&glb));
        assert!(!is_glb(b"{}"));
    }

    #[test]
    fn test_unknown_chunk_skipped() {
        let mut glb = write(b"{}  ", Some(&[9, 9, 9, 9])).unwrap();
        // Append an unknown chunk and fix up the total length.
        glb.extend_from_slice(&4u32.to_le_bytes());
        glb.extend_from_slice(&0x12345678u32.to_le_bytes());
        glb.extend_from_slice(&[0; 4]);
        let total = glb.len() as u32;
        glb[8..12].copy_from_slice(&total.to_le_bytes());
        let chunks = parse(&glb).unwrap();
        assert_eq!(chunks.bin, Some(&[9u8, 9, 9, 9][..]));
    }

    #[test]
    fn test_rejects_bad_header() {
        let mut glb = write(b"{}", None).unwrap();
        glb[4] = 1;
        assert!(parse(&glb).is_err());
        glb[4] = 2;
        glb[0] = b'x';
        assert!(parse(&glb).is_err());
        assert!(parse(&glb[..10]).is_err());
    }

    #[test]
    fn test_truncated_chunk() {
        let glb = write(b"{}", Some(&[1, 2, 3, 4])).unwrap();
        let mut cut = glb[..glb.len() - 2].to_vec();
        let total = cut.len() as u32;
        cut[8..12].copy_from_slice(&total.to_le_bytes());
        assert!(parse(&cut).is_err());
    }
}
