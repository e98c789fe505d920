//! glTF/GLB writer.
//!
//! Three output forms are supported:
//!
//! - **GLB**: `buffers[0]` (no URI) becomes the BIN chunk
//! - **glTF + .bin**: the main buffer is written through a [`WriteHandler`]
//! - **glTF (embedded)**: every loaded buffer becomes a base64 data URI
//!
//! In every form, other in-memory buffers without a URI are embedded as data
//! URIs, and buffers with an external URI and loaded bytes are handed to the
//! write handler once each.
//!
//! # Example
//!
//! ```ignore
//! use gltfx_io::GltfWriter;
//!
//! GltfWriter::new(&doc).write_glb("out.glb")?;
//! GltfWriter::new(&doc).pretty(true).write_gltf("out.gltf")?; // + out.bin
//! ```

use std::fs;
use std::path::Path;

use gltfx_core::{Buffer, Document, GltfError, Result};
use serde_json::Value;

use crate::data_uri::{self, OCTET_STREAM};
use crate::glb;
use crate::handler::{DirectoryWriteHandler, WriteHandler};

/// Serializes a document to GLB or glTF JSON.
#[derive(Debug, Clone, Copy)]
pub struct GltfWriter<'a> {
    doc: &'a Document,
    pretty: bool,
}

/// Where a buffer's bytes go in a given output form.
enum Placement<'d> {
    /// Keep the JSON entry as is.
    Keep,
    /// GLB BIN chunk.
    Bin(&'d [u8]),
    /// Set the URI and write the bytes through the handler.
    External(String, &'d [u8]),
    /// Replace the URI with a data URI.
    Embed(&'d [u8]),
}

/// Loaded bytes of a buffer, `None` when nothing is held in memory.
fn loaded_bytes(index: usize, buffer: &Buffer) -> Result<Option<&[u8]>> {
    if buffer.byte_length == 0 {
        return Ok(None);
    }
    if buffer.data.is_empty() {
        return Ok(None);
    }
    if buffer.data.len() < buffer.byte_length {
        return Err(GltfError::BufferOverflow(format!(
            "buffer {} declares {} bytes but holds {}",
            index,
            buffer.byte_length,
            buffer.data.len()
        )));
    }
    Ok(Some(&buffer.data[..buffer.byte_length]))
}

impl<'a> GltfWriter<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc, pretty: false }
    }

    /// Pretty-print JSON output (ignored for the GLB JSON chunk).
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// GLB bytes; external buffers go through `handler`.
    pub fn to_glb(&self, handler: &mut dyn WriteHandler) -> Result<Vec<u8>> {
        let mut bin = None;
        let mut patches = Vec::new();
        for (i, buffer) in self.doc.buffers.iter().enumerate() {
            let placement = match (i, &buffer.uri) {
                _ if buffer.is_fallback() => Placement::Keep,
                (0, None) => match loaded_bytes(i, buffer)? {
                    Some(bytes) => Placement::Bin(bytes),
                    None => self.require_empty(i, buffer)?,
                },
                _ => self.default_placement(i, buffer)?,
            };
            match placement {
                Placement::Bin(bytes) => bin = Some(bytes),
                other => self.apply(i, other, &mut patches, handler)?,
            }
        }
        let json = self.encode_json(&patches, false)?;
        tracing::debug!(
            json_bytes = json.len(),
            bin_bytes = bin.map_or(0, <[u8]>::len),
            "framing GLB"
        );
        glb::write(&json, bin)
    }

    /// glTF JSON whose main buffer is written as `bin_uri` through `handler`.
    pub fn to_gltf(&self, bin_uri: &str, handler: &mut dyn WriteHandler) -> Result<Vec<u8>> {
        let mut patches = Vec::new();
        for (i, buffer) in self.doc.buffers.iter().enumerate() {
            let placement = match (i, &buffer.uri) {
                _ if buffer.is_fallback() => Placement::Keep,
                (0, None) => match loaded_bytes(i, buffer)? {
                    Some(bytes) => Placement::External(bin_uri.to_string(), bytes),
                    None => self.require_empty(i, buffer)?,
                },
                _ => self.default_placement(i, buffer)?,
            };
            self.apply(i, placement, &mut patches, handler)?;
        }
        self.encode_json(&patches, self.pretty)
    }

    /// Self-contained glTF JSON with every loaded buffer as a data URI.
    pub fn to_gltf_embedded(&self) -> Result<Vec<u8>> {
        let mut patches = Vec::new();
        for (i, buffer) in self.doc.buffers.iter().enumerate() {
            if buffer.is_fallback() {
                continue;
            }
            match loaded_bytes(i, buffer)? {
                Some(bytes) => patches.push((i, data_uri::encode(bytes, OCTET_STREAM))),
                None if buffer.uri.is_none() => {
                    self.require_empty(i, buffer)?;
                }
                None => {}
            }
        }
        self.encode_json(&patches, self.pretty)
    }

    pub fn write_glb<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut handler = DirectoryWriteHandler::new(parent_dir(path));
        let bytes = self.to_glb(&mut handler)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Writes `path` plus `<stem>.bin` next to it.
    pub fn write_gltf<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| GltfError::invalid_input(format!("bad output path {}", path.display())))?;
        let bin_uri = format!("{}.bin", stem);
        let mut handler = DirectoryWriteHandler::new(parent_dir(path));
        let bytes = self.to_gltf(&bin_uri, &mut handler)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn write_gltf_embedded<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_gltf_embedded()?)?;
        Ok(())
    }

    fn require_empty(&self, i: usize, buffer: &Buffer) -> Result<Placement<'a>> {
        if buffer.byte_length > 0 {
            return Err(GltfError::invalid_input(format!(
                "buffer {} declares {} bytes but none are loaded",
                i, buffer.byte_length
            )));
        }
        Ok(Placement::Keep)
    }

    fn default_placement(&self, i: usize, buffer: &'a Buffer) -> Result<Placement<'a>> {
        Ok(match (&buffer.uri, loaded_bytes(i, buffer)?) {
            (Some(uri), _) if data_uri::is_data_uri(uri) => Placement::Keep,
            (Some(uri), Some(bytes)) => Placement::External(uri.clone(), bytes),
            (Some(_), None) => Placement::Keep,
            (None, Some(bytes)) => Placement::Embed(bytes),
            (None, None) => self.require_empty(i, buffer)?,
        })
    }

    fn apply(
        &self,
        i: usize,
        placement: Placement<'_>,
        patches: &mut Vec<(usize, String)>,
        handler: &mut dyn WriteHandler,
    ) -> Result<()> {
        match placement {
            Placement::Keep | Placement::Bin(_) => {}
            Placement::External(uri, bytes) => {
                handler.write_resource(&uri, bytes)?;
                if self.doc.buffers[i].uri.as_deref() != Some(uri.as_str()) {
                    patches.push((i, uri));
                }
            }
            Placement::Embed(bytes) => patches.push((i, data_uri::encode(bytes, OCTET_STREAM))),
        }
        Ok(())
    }

    /// Serializes the document with the given buffer URIs substituted.
    fn encode_json(&self, patches: &[(usize, String)], pretty: bool) -> Result<Vec<u8>> {
        if patches.is_empty() {
            return Ok(if pretty {
                serde_json::to_vec_pretty(self.doc)?
            } else {
                serde_json::to_vec(self.doc)?
            });
        }
        let mut value = serde_json::to_value(self.doc)?;
        for (i, uri) in patches {
            let entry = value
                .get_mut("buffers")
                .and_then(|buffers| buffers.get_mut(*i))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| GltfError::index_out_of_range("buffer", *i, self.doc.buffers.len()))?;
            entry.insert("uri".to_string(), Value::String(uri.clone()));
        }
        Ok(if pretty {
            serde_json::to_vec_pretty(&value)?
        } else {
            serde_json::to_vec(&value)?
        })
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{MemoryWriteHandler, NoExternalResources};
    use crate::reader::GltfReader;
    use gltfx_core::Buffer;

    fn doc_with_buffers() -> Document {
        let mut doc = Document::new();
        doc.buffers.push(Buffer::from_data(vec![1, 2, 3, 4]));
        doc.buffers.push(Buffer::from_data(vec![9, 8]));
        doc.buffers.push(Buffer {
            uri: Some("extra.bin".into()),
            ..Buffer::from_data(vec![7; 4])
        });
        doc
    }

    #[test]
    fn test_glb_places_buffers() {
        let doc = doc_with_buffers();
        let mut handler = MemoryWriteHandler::new();
        let glb_bytes = GltfWriter::new(&doc).to_glb(&mut handler).unwrap();
        assert_eq!(handler.resources.len(), 1);
        assert_eq!(handler.resources["extra.bin"], vec![7; 4]);

        let chunks = glb::parse(&glb_bytes).unwrap();
        assert_eq!(chunks.bin, Some(&[1u8, 2, 3, 4][..]));
        let json: Value = serde_json::from_slice(chunks.json).unwrap();
        assert!(json["buffers"][0].get("uri").is_none());
        assert!(json["buffers"][1]["uri"].as_str().unwrap().starts_with("data:"));

        let back = GltfReader::new().read(&glb_bytes, &mut handler).unwrap().document;
        assert_eq!(back.buffers[1].data, vec![9, 8]);
        assert_eq!(back.buffers[2].data, vec![7; 4]);
        assert_eq!(back.buffers[0].uri, None);
    }

    #[test]
    fn test_gltf_with_external_bin() {
        let doc = doc_with_buffers();
        let mut handler = MemoryWriteHandler::new();
        let json = GltfWriter::new(&doc).to_gltf("model.bin", &mut handler).unwrap();
        assert_eq!(handler.resources["model.bin"], vec![1, 2, 3, 4]);
        let back = GltfReader::new().read(&json, &mut handler).unwrap().document;
        assert_eq!(back.buffers[0].uri.as_deref(), Some("model.bin"));
        assert_eq!(back.buffers[0].data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_embedded_is_self_contained() {
        let doc = doc_with_buffers();
        let json = GltfWriter::new(&doc).pretty(true).to_gltf_embedded().unwrap();
        let back = GltfReader::new().read(&json, &mut NoExternalResources).unwrap().document;
        for (a, b) in doc.buffers.iter().zip(&back.buffers) {
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn test_unloaded_main_buffer_rejected() {
        let mut doc = Document::new();
        doc.buffers.push(Buffer {
            byte_length: 8,
            ..Buffer::default()
        });
        let mut handler = MemoryWriteHandler::new();
        assert!(GltfWriter::new(&doc).to_glb(&mut handler).is_err());
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let doc = doc_with_buffers();
        let path = dir.path().join("scene.gltf");
        GltfWriter::new(&doc).write_gltf(&path).unwrap();
        assert!(dir.path().join("scene.bin").exists());
        assert!(dir.path().join("extra.bin").exists());
        let back = GltfReader::new().open(&path).unwrap().document;
        assert_eq!(back.buffers[0].data, vec![1, 2, 3, 4]);

        let glb_path = dir.path().join("scene.glb");
        GltfWriter::new(&doc).write_glb(&glb_path).unwrap();
        let back = GltfReader::new().open(&glb_path).unwrap().document;
        assert_eq!(back.buffers[2].data, vec![7; 4]);
    }
}
