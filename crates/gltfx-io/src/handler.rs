//! Resource handlers for buffers that live outside the glTF/GLB file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use gltfx_core::{GltfError, Result};

/// Receives external resources produced by a writer.
pub trait WriteHandler {
    fn write_resource(&mut self, uri: &str, data: &[u8]) -> Result<()>;
}

/// Supplies external resources referenced by a document.
pub trait ReadHandler {
    fn read_resource(&mut self, uri: &str) -> Result<Vec<u8>>;
}

/// Resolves a relative URI below `root`, rejecting absolute paths and `..`.
fn resolve(root: &Path, uri: &str) -> Result<PathBuf> {
    let relative = Path::new(uri);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(GltfError::invalid_input(format!(
            "resource URI '{}' must be relative and stay inside the output directory",
            uri
        )));
    }
    Ok(root.join(relative))
}

/// Writes resources into a directory, typically the output file's parent.
#[derive(Debug, Clone)]
pub struct DirectoryWriteHandler {
    root: PathBuf,
}

impl DirectoryWriteHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WriteHandler for DirectoryWriteHandler {
    fn write_resource(&mut self, uri: &str, data: &[u8]) -> Result<()> {
        let path = resolve(&self.root, uri)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        tracing::debug!(path = %path.display(), bytes = data.len(), "writing resource");
        fs::write(&path, data)?;
        Ok(())
    }
}

/// Reads resources relative to a directory.
#[derive(Debug, Clone)]
pub struct DirectoryReadHandler {
    root: PathBuf,
}

impl DirectoryReadHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ReadHandler for DirectoryReadHandler {
    fn read_resource(&mut self, uri: &str) -> Result<Vec<u8>> {
        let path = resolve(&self.root, uri)?;
        tracing::debug!(path = %path.display(), "reading resource");
        Ok(fs::read(&path)?)
    }
}

/// Keeps resources in memory; serves as both write and read side.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriteHandler {
    pub resources: BTreeMap<String, Vec<u8>>,
}

impl MemoryWriteHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WriteHandler for MemoryWriteHandler {
    fn write_resource(&mut self, uri: &str, data: &[u8]) -> Result<()> {
        self.resources.insert(uri.to_string(), data.to_vec());
        Ok(())
    }
}

impl ReadHandler for MemoryWriteHandler {
    fn read_resource(&mut self, uri: &str) -> Result<Vec<u8>> {
        self.resources.get(uri).cloned().ok_or_else(|| {
            GltfError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no resource named '{}'", uri),
            ))
        })
    }
}

/// Read handler for inputs that must be self-contained.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalResources;

impl ReadHandler for NoExternalResources {
    fn read_resource(&mut self, uri: &str) -> Result<Vec<u8>> {
        Err(GltfError::invalid_input(format!(
            "external resource '{}' cannot be resolved",
            uri
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DirectoryWriteHandler::new(dir.path());
        writer.write_resource("sub/data.bin", &[1, 2, 3]).unwrap();
        let mut reader = DirectoryReadHandler::new(dir.path());
        assert_eq!(reader.read_resource("sub/data.bin").unwrap(), vec![1, 2, 3]);
        assert!(matches!(reader.read_resource("missing.bin"), Err(GltfError::Io(_))));
    }

    #[test]
    fn test_rejects_escaping_uris() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DirectoryWriteHandler::new(dir.path());
        assert!(writer.write_resource("../evil.bin", &[0]).is_err());
        assert!(writer.write_resource("/abs.bin", &[0]).is_err());
    }

    #[test]
    fn test_memory_handler() {
        let mut handler = MemoryWriteHandler::new();
        handler.write_resource("a.bin", &[7]).unwrap();
        assert_eq!(handler.read_resource("a.bin").unwrap(), vec![7]);
        assert!(handler.read_resource("b.bin").is_err());
    }
}
