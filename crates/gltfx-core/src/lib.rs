//! gltfx core library
//!
//! In-memory glTF 2.0 document model, little-endian binary primitives, the
//! polymorphic extension field with its decoder registry, and the accessor
//! builder and reader every extension codec grows the main buffer through.

// =============================================================================
// Binary layer
// =============================================================================

pub mod bytes;
pub mod error;
pub mod types;

// =============================================================================
// Document model
// =============================================================================

pub mod animation;
pub mod camera;
pub mod document;
pub mod extension;
pub mod material;
pub mod mesh;
pub mod node;

// =============================================================================
// Accessor builder and read path
// =============================================================================

pub mod builder;
pub mod reader;

// Re-export commonly used types
pub use builder::{append_attribute, append_bytes, append_indices, Column};
pub use document::{Accessor, Asset, Buffer, BufferView, Document, Scene};
pub use error::{GltfError, Result};
pub use extension::{
    Extension, ExtensionNotice, ExtensionRegistry, ExtensionValue, Extensions, NamedExtension,
};
pub use mesh::{Mesh, Primitive};
pub use node::Node;
pub use reader::AccessorReader;
pub use types::{element_size, AccessorType, BufferTarget, ComponentType, PrimitiveMode};
