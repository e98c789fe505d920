//! gltfx extension codecs
//!
//! Writers and readers for the 3D Tiles and KHR extensions that store data in
//! the main buffer: structural metadata, mesh and instance features,
//! quantization, Draco and meshopt compression, Gaussian splats, GPU
//! instancing, plus the leaf material extensions that only round-trip JSON.
//!
//! Every codec grows the document through [`gltfx_core::builder`], so all of
//! them share the append-only layout of `buffers[0]`.

use std::sync::OnceLock;

use gltfx_core::ExtensionRegistry;

// =============================================================================
// 3D Tiles metadata
// =============================================================================

pub mod mesh_features;
pub mod structural_metadata;

// =============================================================================
// Geometry compression
// =============================================================================

pub mod draco;
pub mod meshopt;
pub mod quantization;

// =============================================================================
// Point clouds and instancing
// =============================================================================

pub mod gaussian_splatting;
pub mod instancing;

// =============================================================================
// Leaf extensions
// =============================================================================

pub mod materials;

// Re-export commonly used types
pub use draco::{DracoEngine, DracoOptions};
pub use mesh_features::FeatureId;
pub use meshopt::{Filter, MeshoptError, MeshoptOptions, Mode};
pub use quantization::QuantizationConfig;
pub use structural_metadata::{PropertyTable, PropertyValues, Schema, StructuralMetadata};

/// Registers the decoder of every extension this crate understands.
pub fn register_all(registry: &ExtensionRegistry) {
    structural_metadata::register(registry);
    registry.register_type::<mesh_features::MeshFeatures>();
    registry.register_type::<mesh_features::InstanceFeatures>();
    registry.register_type::<quantization::MeshQuantization>();
    registry.register_type::<draco::DracoMeshCompression>();
    registry.register_type::<meshopt::MeshoptExtension>();
    registry.register_type::<gaussian_splatting::GaussianSplatting>();
    registry.register_type::<instancing::MeshGpuInstancing>();
    materials::register(registry);
}

/// Shared registry with every extension of this crate registered.
pub fn default_registry() -> &'static ExtensionRegistry {
    static REGISTRY: OnceLock<ExtensionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = ExtensionRegistry::new();
        register_all(&registry);
        tracing::debug!(count = registry.names().len(), "initialized extension registry");
        registry
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_names() {
        let registry = default_registry();
        for name in [
            "EXT_structural_metadata",
            "EXT_mesh_features",
            "EXT_instance_features",
            "KHR_mesh_quantization",
            "KHR_draco_mesh_compression",
            "EXT_meshopt_compression",
            "KHR_gaussian_splatting",
            "EXT_mesh_gpu_instancing",
            "KHR_materials_clearcoat",
            "CESIUM_primitive_outline",
        ] {
            assert!(registry.is_registered(name), "{} missing", name);
        }
    }

    #[test]
    fn test_register_all_is_idempotent() {
        let registry = ExtensionRegistry::new();
        register_all(&registry);
        let count = registry.names().len();
        register_all(&registry);
        assert_eq!(registry.names().len(), count);
    }
}
