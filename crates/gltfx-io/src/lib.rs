//! gltfx I/O
//!
//! Reading and writing glTF 2.0 documents as `.gltf` JSON (with external or
//! embedded buffers) and as GLB binary containers.
//!
//! # Example
//!
//! ```ignore
//! use gltfx_io::{GltfReader, GltfWriter};
//!
//! let doc = GltfReader::new().open("in.gltf")?.document;
//! GltfWriter::new(&doc).write_glb("out.glb")?;
//! ```

pub mod data_uri;
pub mod glb;
pub mod handler;
pub mod json;
pub mod reader;
pub mod writer;

pub use handler::{
    DirectoryReadHandler, DirectoryWriteHandler, MemoryWriteHandler, NoExternalResources,
    ReadHandler, WriteHandler,
};
pub use reader::{GltfReader, ReadResult};
pub use writer::GltfWriter;
