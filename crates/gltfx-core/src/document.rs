//! The in-memory glTF document.
//!
//! A [`Document`] owns every top-level array; objects refer to each other by
//! dense `u32` indices. `buffers[0]` is the main buffer: writers only ever
//! append to it, so a buffer view's offset never changes once created.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::animation::{Animation, Skin};
use crate::bytes;
use crate::camera::Camera;
use crate::error::{get_checked, get_checked_mut, GltfError, Result};
use crate::extension::Extensions;
use crate::material::{Image, Material, Sampler, Texture};
use crate::mesh::Mesh;
use crate::node::Node;
use crate::types::{element_size, AccessorType, BufferTarget, ComponentType};

pub const DEFAULT_VERSION: &str = "2.0";
pub const DEFAULT_GENERATOR: &str = "gltfx";

fn is_zero(value: &usize) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// Asset, Scene
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            copyright: None,
            generator: None,
            version: default_version(),
            min_version: None,
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<u32>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

// ============================================================================
// Buffers and views
// ============================================================================

/// A block of binary data.
///
/// `data` is not serialized; readers fill it from the GLB BIN chunk, a data
/// URI or an external file. `byte_length` is kept equal to `data.len()` by
/// every append.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub byte_length: usize,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Buffer {
    pub fn from_data(data: Vec<u8>) -> Self {
        Self {
            byte_length: data.len(),
            data,
            ..Self::default()
        }
    }

    /// True when the bytes the JSON declares are held in memory.
    pub fn is_loaded(&self) -> bool {
        self.data.len() >= self.byte_length
    }

    /// Appends `bytes` starting at a multiple of `alignment`; returns the start offset.
    pub fn append(&mut self, bytes: &[u8], alignment: usize, fill: u8) -> usize {
        bytes::pad_to(&mut self.data, alignment, fill);
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        self.byte_length = self.data.len();
        offset
    }

    /// Pads the end of the buffer to `alignment`.
    pub fn pad_end(&mut self, alignment: usize, fill: u8) {
        bytes::pad_to(&mut self.data, alignment, fill);
        self.byte_length = self.data.len();
    }

    /// True for a meshopt fallback buffer, whose bytes are only produced by
    /// decompressing the views that target it.
    pub fn is_fallback(&self) -> bool {
        self.extensions
            .get(MESHOPT_EXTENSION)
            .and_then(|value| value.to_json().ok())
            .and_then(|json| json.get("fallback").and_then(Value::as_bool))
            .unwrap_or(false)
    }
}

/// Buffer-level meshopt extension name, see [`Buffer::is_fallback`].
pub const MESHOPT_EXTENSION: &str = "EXT_meshopt_compression";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub buffer: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    pub byte_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<BufferTarget>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl BufferView {
    pub fn new(buffer: u32, byte_offset: usize, byte_length: usize) -> Self {
        Self {
            buffer,
            byte_offset,
            byte_length,
            ..Self::default()
        }
    }

    /// Stride to use for elements of `element_size` bytes (0 or absent means packed).
    pub fn effective_stride(&self, element_size: usize) -> usize {
        match self.byte_stride {
            Some(stride) if stride > 0 => stride,
            _ => element_size,
        }
    }
}

// ============================================================================
// Accessors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<u32>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: AccessorType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub min: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub max: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<AccessorSparse>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Accessor {
    pub fn new(component_type: ComponentType, accessor_type: AccessorType, count: usize) -> Self {
        Self {
            name: None,
            buffer_view: None,
            byte_offset: 0,
            component_type,
            normalized: false,
            count,
            accessor_type,
            min: Vec::new(),
            max: Vec::new(),
            sparse: None,
            extensions: Extensions::new(),
            extras: None,
        }
    }

    pub fn element_size(&self) -> usize {
        element_size(self.accessor_type, self.component_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorSparse {
    pub count: usize,
    pub indices: SparseIndices,
    pub values: SparseValues,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndices {
    pub buffer_view: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseValues {
    pub buffer_view: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
    #[serde(default)]
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<Sampler>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<Animation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skins: Vec<Skin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cameras: Vec<Camera>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

/// Calls `$f` on every `Extensions` map in the document.
macro_rules! visit_extensions {
    ($doc:expr, $f:ident $(, $m:tt)?) => {{
        let doc = $doc;
        $f(&$($m)? doc.extensions);
        $f(&$($m)? doc.asset.extensions);
        for scene in &$($m)? doc.scenes {
            $f(&$($m)? scene.extensions);
        }
        for node in &$($m)? doc.nodes {
            $f(&$($m)? node.extensions);
        }
        for mesh in &$($m)? doc.meshes {
            $f(&$($m)? mesh.extensions);
            for primitive in &$($m)? mesh.primitives {
                $f(&$($m)? primitive.extensions);
            }
        }
        for accessor in &$($m)? doc.accessors {
            $f(&$($m)? accessor.extensions);
            if let Some(sparse) = &$($m)? accessor.sparse {
                $f(&$($m)? sparse.extensions);
                $f(&$($m)? sparse.indices.extensions);
                $f(&$($m)? sparse.values.extensions);
            }
        }
        for view in &$($m)? doc.buffer_views {
            $f(&$($m)? view.extensions);
        }
        for buffer in &$($m)? doc.buffers {
            $f(&$($m)? buffer.extensions);
        }
        for material in &$($m)? doc.materials {
            $f(&$($m)? material.extensions);
            let pbr = &$($m)? material.pbr_metallic_roughness;
            $f(&$($m)? pbr.extensions);
            if let Some(info) = &$($m)? pbr.base_color_texture {
                $f(&$($m)? info.extensions);
            }
            if let Some(info) = &$($m)? pbr.metallic_roughness_texture {
                $f(&$($m)? info.extensions);
            }
            if let Some(info) = &$($m)? material.normal_texture {
                $f(&$($m)? info.extensions);
            }
            if let Some(info) = &$($m)? material.occlusion_texture {
                $f(&$($m)? info.extensions);
            }
            if let Some(info) = &$($m)? material.emissive_texture {
                $f(&$($m)? info.extensions);
            }
        }
        for texture in &$($m)? doc.textures {
            $f(&$($m)? texture.extensions);
        }
        for image in &$($m)? doc.images {
            $f(&$($m)? image.extensions);
        }
        for sampler in &$($m)? doc.samplers {
            $f(&$($m)? sampler.extensions);
        }
        for animation in &$($m)? doc.animations {
            $f(&$($m)? animation.extensions);
            for channel in &$($m)? animation.channels {
                $f(&$($m)? channel.extensions);
                $f(&$($m)? channel.target.extensions);
            }
            for sampler in &$($m)? animation.samplers {
                $f(&$($m)? sampler.extensions);
            }
        }
        for skin in &$($m)? doc.skins {
            $f(&$($m)? skin.extensions);
        }
        for camera in &$($m)? doc.cameras {
            $f(&$($m)? camera.extensions);
            if let Some(p) = &$($m)? camera.perspective {
                $f(&$($m)? p.extensions);
            }
            if let Some(o) = &$($m)? camera.orthographic {
                $f(&$($m)? o.extensions);
            }
        }
    }};
}

impl Document {
    /// Empty document with `asset.version = "2.0"`.
    pub fn new() -> Self {
        Self {
            asset: Asset {
                generator: Some(DEFAULT_GENERATOR.to_string()),
                ..Asset::default()
            },
            ..Self::default()
        }
    }

    /// Index with explicit presence; `None` if `value` does not fit a glTF index.
    pub fn index(value: usize) -> Option<u32> {
        u32::try_from(value).ok()
    }

    fn next_index(len: usize, kind: &'static str) -> Result<u32> {
        Self::index(len).ok_or_else(|| GltfError::invalid_input(format!("too many {}s", kind)))
    }

    pub fn push_accessor(&mut self, accessor: Accessor) -> Result<u32> {
        let index = Self::next_index(self.accessors.len(), "accessor")?;
        self.accessors.push(accessor);
        Ok(index)
    }

    pub fn push_buffer_view(&mut self, view: BufferView) -> Result<u32> {
        let index = Self::next_index(self.buffer_views.len(), "buffer view")?;
        self.buffer_views.push(view);
        Ok(index)
    }

    pub fn push_buffer(&mut self, buffer: Buffer) -> Result<u32> {
        let index = Self::next_index(self.buffers.len(), "buffer")?;
        self.buffers.push(buffer);
        Ok(index)
    }

    pub fn push_mesh(&mut self, mesh: Mesh) -> Result<u32> {
        let index = Self::next_index(self.meshes.len(), "mesh")?;
        self.meshes.push(mesh);
        Ok(index)
    }

    pub fn push_node(&mut self, node: Node) -> Result<u32> {
        let index = Self::next_index(self.nodes.len(), "node")?;
        self.nodes.push(node);
        Ok(index)
    }

    pub fn accessor(&self, index: u32) -> Result<&Accessor> {
        get_checked(&self.accessors, index, "accessor")
    }

    pub fn accessor_mut(&mut self, index: u32) -> Result<&mut Accessor> {
        get_checked_mut(&mut self.accessors, index, "accessor")
    }

    pub fn buffer_view(&self, index: u32) -> Result<&BufferView> {
        get_checked(&self.buffer_views, index, "buffer view")
    }

    pub fn buffer_view_mut(&mut self, index: u32) -> Result<&mut BufferView> {
        get_checked_mut(&mut self.buffer_views, index, "buffer view")
    }

    pub fn buffer(&self, index: u32) -> Result<&Buffer> {
        get_checked(&self.buffers, index, "buffer")
    }

    pub fn buffer_mut(&mut self, index: u32) -> Result<&mut Buffer> {
        get_checked_mut(&mut self.buffers, index, "buffer")
    }

    pub fn mesh_mut(&mut self, index: u32) -> Result<&mut Mesh> {
        get_checked_mut(&mut self.meshes, index, "mesh")
    }

    pub fn node_mut(&mut self, index: u32) -> Result<&mut Node> {
        get_checked_mut(&mut self.nodes, index, "node")
    }

    /// Bytes of a buffer view, bounds-checked against its buffer.
    pub fn view_data(&self, index: u32) -> Result<&[u8]> {
        let view = self.buffer_view(index)?;
        let buffer = self.buffer(view.buffer)?;
        let end = bytes::checked_range(view.byte_offset, view.byte_length)?.end;
        if end > buffer.data.len() {
            return Err(GltfError::BufferOverflow(format!(
                "buffer view {} ends at {} but buffer {} holds {} bytes",
                index,
                end,
                view.buffer,
                buffer.data.len()
            )));
        }
        Ok(&buffer.data[view.byte_offset..end])
    }

    /// The append-only main buffer, `buffers[0]`, created on first use.
    pub fn main_buffer_mut(&mut self) -> Result<&mut Buffer> {
        if self.buffers.is_empty() {
            tracing::debug!("creating main buffer");
            self.buffers.push(Buffer::default());
        }
        let buffer = &mut self.buffers[0];
        if !buffer.is_loaded() {
            return Err(GltfError::invalid_input(format!(
                "main buffer declares {} bytes but only {} are loaded",
                buffer.byte_length,
                buffer.data.len()
            )));
        }
        Ok(buffer)
    }

    // ------------------------------------------------------------------------
    // Extension declarations
    // ------------------------------------------------------------------------

    /// Adds `name` to `extensionsUsed` (and `extensionsRequired` if `required`). Idempotent.
    pub fn mark_extension_used(&mut self, name: &str, required: bool) {
        if !self.extensions_used.iter().any(|n| n == name) {
            self.extensions_used.push(name.to_string());
        }
        if required && !self.extensions_required.iter().any(|n| n == name) {
            self.extensions_required.push(name.to_string());
        }
    }

    /// Removes `name` from both declaration lists.
    pub fn unmark_extension(&mut self, name: &str) {
        self.extensions_used.retain(|n| n != name);
        self.extensions_required.retain(|n| n != name);
    }

    pub fn is_extension_used(&self, name: &str) -> bool {
        self.extensions_used.iter().any(|n| n == name)
    }

    pub fn is_extension_required(&self, name: &str) -> bool {
        self.extensions_required.iter().any(|n| n == name)
    }

    /// Declares every extension name that keys an `extensions` map anywhere.
    pub fn sync_extensions_used(&mut self) {
        let mut names = Vec::new();
        self.for_each_extensions(|ext| {
            for name in ext.names() {
                if !names.iter().any(|n: &String| n == name) {
                    names.push(name.to_string());
                }
            }
        });
        for name in names {
            self.mark_extension_used(&name, false);
        }
    }

    pub fn for_each_extensions<F: FnMut(&Extensions)>(&self, mut f: F) {
        visit_extensions!(self, f);
    }

    pub fn for_each_extensions_mut<F: FnMut(&mut Extensions)>(&mut self, mut f: F) {
        visit_extensions!(self, f, mut);
    }

    // ------------------------------------------------------------------------
    // Layout validation
    // ------------------------------------------------------------------------

    /// Checks that every view fits its buffer at a 4-byte aligned offset and
    /// that every accessor fits its view.
    pub fn validate_layout(&self) -> Result<()> {
        for (i, view) in self.buffer_views.iter().enumerate() {
            let buffer = self.buffer(view.buffer)?;
            if view.byte_offset % 4 != 0 {
                return Err(GltfError::AlignmentViolation(format!(
                    "buffer view {} starts at offset {}",
                    i, view.byte_offset
                )));
            }
            let end = bytes::checked_range(view.byte_offset, view.byte_length)?.end;
            if end > buffer.byte_length {
                return Err(GltfError::BufferOverflow(format!(
                    "buffer view {} spans [{}, {}) past buffer {} of {} bytes",
                    i,
                    view.byte_offset,
                    end,
                    view.buffer,
                    buffer.byte_length
                )));
            }
        }
        for (i, accessor) in self.accessors.iter().enumerate() {
            let Some(view_index) = accessor.buffer_view else {
                continue;
            };
            let view = self.buffer_view(view_index)?;
            let span = accessor_span(accessor, view)?;
            if bytes::checked_range(accessor.byte_offset, span)?.end > view.byte_length {
                return Err(GltfError::BufferOverflow(format!(
                    "accessor {} needs {} bytes at offset {} but view {} has {}",
                    i, span, accessor.byte_offset, view_index, view.byte_length
                )));
            }
        }
        Ok(())
    }
}

/// Bytes from the first element's start to the last element's end.
pub fn accessor_span(accessor: &Accessor, view: &BufferView) -> Result<usize> {
    if accessor.count == 0 {
        return Ok(0);
    }
    let element = accessor.element_size();
    let strided = bytes::checked_size(accessor.count - 1, view.effective_stride(element))?;
    Ok(bytes::checked_range(strided, element)?.end)
}
