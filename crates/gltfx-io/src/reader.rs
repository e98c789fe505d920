//! glTF/GLB reader.
//!
//! # Example
//!
//! ```ignore
//! use gltfx_io::GltfReader;
//!
//! let registry = gltfx_ext::default_registry();
//! let result = GltfReader::with_registry(registry).open("model.glb")?;
//! for notice in &result.notices {
//!     eprintln!("kept raw: {}", notice);
//! }
//! ```

use std::fs;
use std::path::Path;

use gltfx_core::{Document, ExtensionNotice, ExtensionRegistry, GltfError, Result};

use crate::data_uri;
use crate::glb;
use crate::handler::{DirectoryReadHandler, ReadHandler};
use crate::json;

/// A decoded document plus the extension decodes that were downgraded to raw.
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub document: Document,
    pub notices: Vec<ExtensionNotice>,
}

/// Reads `.gltf` and `.glb` input, loading every buffer into memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfReader<'r> {
    registry: Option<&'r ExtensionRegistry>,
}

impl<'r> GltfReader<'r> {
    /// Reader that leaves every extension as raw JSON.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: &'r ExtensionRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// Opens a file; the container is detected by its magic bytes and
    /// relative buffer URIs are resolved next to the file.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<ReadResult> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut handler = DirectoryReadHandler::new(base);
        self.read(&data, &mut handler)
    }

    pub fn read(&self, data: &[u8], handler: &mut dyn ReadHandler) -> Result<ReadResult> {
        if glb::is_glb(data) {
            self.read_glb(data, handler)
        } else {
            self.read_gltf(data, handler)
        }
    }

    pub fn read_glb(&self, data: &[u8], handler: &mut dyn ReadHandler) -> Result<ReadResult> {
        let chunks = glb::parse(data)?;
        self.decode(chunks.json, chunks.bin, handler)
    }

    pub fn read_gltf(&self, data: &[u8], handler: &mut dyn ReadHandler) -> Result<ReadResult> {
        self.decode(data, None, handler)
    }

    fn decode(
        &self,
        json_bytes: &[u8],
        bin: Option<&[u8]>,
        handler: &mut dyn ReadHandler,
    ) -> Result<ReadResult> {
        let (mut document, notices) = match self.registry {
            Some(registry) => json::from_slice_with(json_bytes, registry)?,
            None => (json::from_slice(json_bytes)?, Vec::new()),
        };
        load_buffers(&mut document, bin, handler)?;
        tracing::debug!(
            buffers = document.buffers.len(),
            accessors = document.accessors.len(),
            meshes = document.meshes.len(),
            notices = notices.len(),
            "decoded document"
        );
        Ok(ReadResult { document, notices })
    }
}

/// Fills `Buffer::data` from the BIN chunk, data URIs or the handler.
fn load_buffers(doc: &mut Document, bin: Option<&[u8]>, handler: &mut dyn ReadHandler) -> Result<()> {
    if bin.is_some() && doc.buffers.first().map_or(true, |b| b.uri.is_some()) {
        return Err(GltfError::invalid_input(
            "GLB has a BIN chunk but buffers[0] is missing or has a URI",
        ));
    }
    for (i, buffer) in doc.buffers.iter_mut().enumerate() {
        let mut data = match (&buffer.uri, bin) {
            (None, Some(bin)) if i == 0 => bin.to_vec(),
            (None, _) if buffer.byte_length == 0 => Vec::new(),
            // Filled by meshopt decompression.
            (None, _) if buffer.is_fallback() => continue,
            (None, _) => {
                return Err(GltfError::invalid_input(format!(
                    "buffer {} has no URI and no BIN chunk backs it",
                    i
                )))
            }
            (Some(uri), _) if data_uri::is_data_uri(uri) => data_uri::decode(uri)?,
            (Some(uri), _) => handler.read_resource(uri)?,
        };
        if data.len() < buffer.byte_length {
            return Err(GltfError::BufferOverflow(format!(
                "buffer {} declares {} bytes but only {} were loaded",
                i,
                buffer.byte_length,
                data.len()
            )));
        }
        // The BIN chunk may carry up to 3 bytes of padding.
        data.truncate(buffer.byte_length);
        buffer.data = data;
    }
    Ok(())
}
