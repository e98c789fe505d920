//! Leaf material extensions and `CESIUM_primitive_outline`.
//!
//! Each type omits fields equal to their default when serialized, so a
//! default-constructed extension encodes as `{}`.

use gltfx_core::builder::append_indices;
use gltfx_core::error::get_checked_mut;
use gltfx_core::material::{NormalTextureInfo, TextureInfo};
use gltfx_core::{Document, ExtensionRegistry, GltfError, NamedExtension, Result};
use serde::{Deserialize, Serialize};

fn is_zero(value: &f32) -> bool {
    *value == 0.0
}

fn is_one(value: &f32) -> bool {
    *value == 1.0
}

fn one() -> f32 {
    1.0
}

fn is_black(value: &[f32; 3]) -> bool {
    *value == [0.0; 3]
}

fn white() -> [f32; 3] {
    [1.0; 3]
}

fn is_white(value: &[f32; 3]) -> bool {
    *value == [1.0; 3]
}

macro_rules! named {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl NamedExtension for $ty {
                const NAME: &'static str = $name;
            }
        )*

        /// Registers every extension of this module.
        pub fn register(registry: &ExtensionRegistry) {
            $(registry.register_type::<$ty>();)*
        }
    };
}

named! {
    Clearcoat => "KHR_materials_clearcoat",
    Sheen => "KHR_materials_sheen",
    Transmission => "KHR_materials_transmission",
    Volume => "KHR_materials_volume",
    Iridescence => "KHR_materials_iridescence",
    Specular => "KHR_materials_specular",
    Ior => "KHR_materials_ior",
    EmissiveStrength => "KHR_materials_emissive_strength",
    Unlit => "KHR_materials_unlit",
    PrimitiveOutline => "CESIUM_primitive_outline",
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clearcoat {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub clearcoat_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub clearcoat_roughness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_roughness_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_normal_texture: Option<NormalTextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheen {
    #[serde(default, skip_serializing_if = "is_black")]
    pub sheen_color_factor: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_color_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sheen_roughness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_roughness_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transmission {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub transmission_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub thickness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_texture: Option<TextureInfo>,
    /// `None` is an infinite distance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation_distance: Option<f32>,
    #[serde(default = "white", skip_serializing_if = "is_white")]
    pub attenuation_color: [f32; 3],
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            thickness_factor: 0.0,
            thickness_texture: None,
            attenuation_distance: None,
            attenuation_color: white(),
        }
    }
}

pub const DEFAULT_IRIDESCENCE_IOR: f32 = 1.3;
pub const DEFAULT_IRIDESCENCE_THICKNESS_MIN: f32 = 100.0;
pub const DEFAULT_IRIDESCENCE_THICKNESS_MAX: f32 = 400.0;

fn default_iridescence_ior() -> f32 {
    DEFAULT_IRIDESCENCE_IOR
}

fn is_default_iridescence_ior(value: &f32) -> bool {
    *value == DEFAULT_IRIDESCENCE_IOR
}

fn default_thickness_min() -> f32 {
    DEFAULT_IRIDESCENCE_THICKNESS_MIN
}

fn is_default_thickness_min(value: &f32) -> bool {
    *value == DEFAULT_IRIDESCENCE_THICKNESS_MIN
}

fn default_thickness_max() -> f32 {
    DEFAULT_IRIDESCENCE_THICKNESS_MAX
}

fn is_default_thickness_max(value: &f32) -> bool {
    *value == DEFAULT_IRIDESCENCE_THICKNESS_MAX
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iridescence {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub iridescence_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_texture: Option<TextureInfo>,
    #[serde(default = "default_iridescence_ior", skip_serializing_if = "is_default_iridescence_ior")]
    pub iridescence_ior: f32,
    #[serde(default = "default_thickness_min", skip_serializing_if = "is_default_thickness_min")]
    pub iridescence_thickness_minimum: f32,
    #[serde(default = "default_thickness_max", skip_serializing_if = "is_default_thickness_max")]
    pub iridescence_thickness_maximum: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_thickness_texture: Option<TextureInfo>,
}

impl Default for Iridescence {
    fn default() -> Self {
        Self {
            iridescence_factor: 0.0,
            iridescence_texture: None,
            iridescence_ior: DEFAULT_IRIDESCENCE_IOR,
            iridescence_thickness_minimum: DEFAULT_IRIDESCENCE_THICKNESS_MIN,
            iridescence_thickness_maximum: DEFAULT_IRIDESCENCE_THICKNESS_MAX,
            iridescence_thickness_texture: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specular {
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub specular_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_texture: Option<TextureInfo>,
    #[serde(default = "white", skip_serializing_if = "is_white")]
    pub specular_color_factor: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_color_texture: Option<TextureInfo>,
}

impl Default for Specular {
    fn default() -> Self {
        Self {
            specular_factor: 1.0,
            specular_texture: None,
            specular_color_factor: white(),
            specular_color_texture: None,
        }
    }
}

pub const DEFAULT_IOR: f32 = 1.5;

fn default_ior() -> f32 {
    DEFAULT_IOR
}

fn is_default_ior(value: &f32) -> bool {
    *value == DEFAULT_IOR
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ior {
    #[serde(default = "default_ior", skip_serializing_if = "is_default_ior")]
    pub ior: f32,
}

impl Default for Ior {
    fn default() -> Self {
        Self { ior: DEFAULT_IOR }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissiveStrength {
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub emissive_strength: f32,
}

impl Default for EmissiveStrength {
    fn default() -> Self {
        Self { emissive_strength: 1.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unlit {}

/// Outline edges of a primitive: an accessor of vertex index pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveOutline {
    pub indices: u32,
}

/// Attaches `ext` to material `material` and declares it used.
pub fn set_material_extension<T: NamedExtension>(doc: &mut Document, material: u32, ext: T) -> Result<()> {
    get_checked_mut(&mut doc.materials, material, "material")?
        .extensions
        .insert(ext);
    doc.mark_extension_used(T::NAME, false);
    Ok(())
}

/// Writes outline `edges` (pairs of vertex indices) for a primitive.
pub fn add_primitive_outline(doc: &mut Document, mesh: u32, primitive: usize, edges: &[[u32; 2]]) -> Result<u32> {
    let flat: Vec<u32> = edges.iter().flatten().copied().collect();
    let primitives = &get_checked_mut(&mut doc.meshes, mesh, "mesh")?.primitives;
    if primitive >= primitives.len() {
        return Err(GltfError::index_out_of_range("primitive", primitive, primitives.len()));
    }
    let indices = append_indices(doc, &flat)?;
    doc.mesh_mut(mesh)?.primitives[primitive]
        .extensions
        .insert(PrimitiveOutline { indices });
    doc.mark_extension_used(PrimitiveOutline::NAME, false);
    Ok(indices)
}
