//! `data:` URIs with base64 payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gltfx_core::{GltfError, Result};

pub const OCTET_STREAM: &str = "application/octet-stream";

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// `data:{mime};base64,{payload}`
pub fn encode(data: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// Decodes a base64 data URI; other encodings are rejected.
pub fn decode(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| GltfError::invalid_input("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| GltfError::invalid_input("data URI has no payload separator"))?;
    if !header.ends_with(";base64") {
        return Err(GltfError::invalid_input(format!(
            "unsupported data URI encoding '{}'",
            header
        )));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| GltfError::invalid_input(format!("invalid base64 in data URI: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let uri = encode(&[0, 1, 2, 250], OCTET_STREAM);
        assert_eq!(uri, "data:application/octet-stream;base64,AAEC+g==");
        assert!(is_data_uri(&uri));
        assert_eq!(decode(&uri).unwrap(), vec![0, 1, 2, 250]);
    }

    #[test]
    fn test_rejects_non_base64() {
        assert!(decode("data:text/plain,hello").is_err());
        assert!(decode("file.bin").is_err());
        assert!(decode("data:application/octet-stream;base64,@@@").is_err());
    }
}
