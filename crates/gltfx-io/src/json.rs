//! glTF JSON encoding and decoding.
//!
//! Decoding is two-phase: serde parses the document with every extension
//! kept as raw JSON, then the registry resolves the names it knows.
//! Encoding is plain serde; default-valued fields are omitted by the model's
//! `skip_serializing_if` predicates, and raw extensions are emitted verbatim.

use gltfx_core::{Document, ExtensionNotice, ExtensionRegistry, Result};

/// Parses a document, leaving every extension raw.
pub fn from_slice(data: &[u8]) -> Result<Document> {
    Ok(serde_json::from_slice(data)?)
}

/// Parses a document and decodes the extensions `registry` has decoders for.
pub fn from_slice_with(
    data: &[u8],
    registry: &ExtensionRegistry,
) -> Result<(Document, Vec<ExtensionNotice>)> {
    let mut doc = from_slice(data)?;
    let notices = registry.resolve_document(&mut doc);
    Ok((doc, notices))
}

/// Compact JSON bytes.
pub fn to_vec(doc: &Document) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(doc)?)
}

pub fn to_vec_pretty(doc: &Document) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(doc)?)
}

pub fn to_string(doc: &Document) -> Result<String> {
    Ok(serde_json::to_string(doc)?)
}
