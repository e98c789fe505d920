//! Materials, textures, images and samplers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extension::Extensions;

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_one(value: &f32) -> bool {
    *value == 1.0
}

fn one() -> f32 {
    1.0
}

// ============================================================================
// Material
// ============================================================================

pub const DEFAULT_ALPHA_CUTOFF: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    fn is_default(&self) -> bool {
        *self == AlphaMode::Opaque
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "PbrMetallicRoughness::is_default")]
    pub pbr_metallic_roughness: PbrMetallicRoughness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<NormalTextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "is_black")]
    pub emissive_factor: [f32; 3],
    #[serde(default, skip_serializing_if = "AlphaMode::is_default")]
    pub alpha_mode: AlphaMode,
    #[serde(
        default = "default_alpha_cutoff",
        skip_serializing_if = "is_default_alpha_cutoff"
    )]
    pub alpha_cutoff: f32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub double_sided: bool,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

fn is_black(value: &[f32; 3]) -> bool {
    *value == [0.0; 3]
}

fn default_alpha_cutoff() -> f32 {
    DEFAULT_ALPHA_CUTOFF
}

fn is_default_alpha_cutoff(value: &f32) -> bool {
    *value == DEFAULT_ALPHA_CUTOFF
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            pbr_metallic_roughness: PbrMetallicRoughness::default(),
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0; 3],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: DEFAULT_ALPHA_CUTOFF,
            double_sided: false,
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default = "white", skip_serializing_if = "is_white")]
    pub base_color_factor: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub metallic_factor: f32,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub roughness_factor: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

fn is_white(value: &[f32; 4]) -> bool {
    *value == [1.0; 4]
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: white(),
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

impl PbrMetallicRoughness {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// Texture references
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl TextureInfo {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            tex_coord: 0,
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTextureInfo {
    pub index: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub scale: f32,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcclusionTextureInfo {
    pub index: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub strength: f32,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

// ============================================================================
// Texture, Image, Sampler
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<u32>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<u32>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

/// `REPEAT`
pub const WRAP_REPEAT: u32 = 10497;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    #[serde(default = "wrap_repeat", skip_serializing_if = "is_repeat")]
    pub wrap_s: u32,
    #[serde(default = "wrap_repeat", skip_serializing_if = "is_repeat")]
    pub wrap_t: u32,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

fn wrap_repeat() -> u32 {
    WRAP_REPEAT
}

fn is_repeat(value: &u32) -> bool {
    *value == WRAP_REPEAT
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            name: None,
            mag_filter: None,
            min_filter: None,
            wrap_s: WRAP_REPEAT,
            wrap_t: WRAP_REPEAT,
            extensions: Extensions::new(),
            extras: None,
        }
    }
}
