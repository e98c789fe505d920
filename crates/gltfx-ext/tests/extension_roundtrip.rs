//! Extension data surviving a GLB write and read.

use gltfx_core::mesh::POSITION;
use gltfx_core::{append_attribute, AccessorReader, Column, Document, Mesh, Node, Primitive, PrimitiveMode};
use gltfx_ext::instancing::{self, Instances};
use gltfx_ext::mesh_features::{self, FeatureId};
use gltfx_ext::meshopt::{self, MeshoptOptions};
use gltfx_ext::quantization::{self, QuantizationConfig};
use gltfx_ext::structural_metadata::{
    self, add_property_table, read_property_table, ElementType, MetadataEncodeOptions, NumericData,
    PropertyColumn, PropertyComponentType, PropertySpec, PropertyValues,
};
use gltfx_ext::{default_registry, Filter, Mode};
use gltfx_io::{GltfReader, GltfWriter, MemoryWriteHandler, NoExternalResources};

fn point_cloud(positions: Vec<[f32; 3]>) -> Document {
    let mut doc = Document::new();
    let accessor = append_attribute(&mut doc, &Column::Vec3F32(positions)).unwrap();
    let mut prim = Primitive::new(PrimitiveMode::Points);
    prim.attributes.insert(POSITION.to_string(), accessor);
    let mesh = doc
        .push_mesh(Mesh {
            primitives: vec![prim],
            ..Mesh::default()
        })
        .unwrap();
    doc.push_node(Node::with_mesh(mesh)).unwrap();
    doc
}

fn through_glb(doc: &Document) -> Document {
    let bytes = GltfWriter::new(doc).to_glb(&mut MemoryWriteHandler::new()).unwrap();
    let result = GltfReader::with_registry(default_registry())
        .read(&bytes, &mut NoExternalResources)
        .unwrap();
    assert!(result.notices.is_empty(), "{:?}", result.notices);
    result.document
}

#[test]
fn test_metadata_and_features_survive_glb() {
    let mut doc = point_cloud(vec![[0.0; 3], [1.0; 3], [2.0; 3]]);
    structural_metadata::define_class(
        &mut doc,
        "building",
        &[
            PropertySpec::numeric("height", ElementType::Scalar, PropertyComponentType::Float32),
            PropertySpec::new("name", ElementType::String),
            PropertySpec::new("occupied", ElementType::Boolean),
        ],
    )
    .unwrap();
    let columns = [
        PropertyColumn::new(
            "height",
            PropertyValues::Numeric(NumericData::F32(vec![10.5, 20.0, 3.25])),
        ),
        PropertyColumn::new(
            "name",
            PropertyValues::String(vec!["hall".to_string(), "tower".to_string(), "".to_string()]),
        ),
        PropertyColumn::new("occupied", PropertyValues::Boolean(vec![true, false, true])),
    ];
    let table = add_property_table(&mut doc, "building", &columns, &MetadataEncodeOptions::default())
        .unwrap()
        .unwrap();
    let feature = FeatureId {
        property_table: Some(table),
        ..FeatureId::new(3)
    };
    mesh_features::add_mesh_feature_ids(&mut doc, 0, 0, &[0, 1, 2], feature).unwrap();
    doc.validate_layout().unwrap();

    let back = through_glb(&doc);
    let values = read_property_table(&back, table).unwrap();
    for column in &columns {
        assert_eq!(values[&column.name], column.values);
    }
    assert_eq!(mesh_features::read_feature_ids(&back, 0, 0, 0).unwrap(), vec![0, 1, 2]);
    assert!(back.is_extension_used(structural_metadata::EXTENSION_NAME));
    assert!(back.is_extension_used(mesh_features::MESH_FEATURES));
}

#[test]
fn test_quantized_glb_dequantizes_after_reload() {
    let positions = vec![[-1.0, 0.0, 2.0], [0.25, 0.5, 0.75], [3.0, -2.0, 1.0]];
    let mut doc = point_cloud(positions.clone());
    let config = QuantizationConfig {
        position: 14,
        ..QuantizationConfig::default()
    };
    quantization::quantize_all(&mut doc, &config).unwrap();

    let mut back = through_glb(&doc);
    assert!(back.is_extension_required(quantization::EXTENSION_NAME));
    assert_eq!(quantization::dequantize_all(&mut back).unwrap(), 1);

    let index = back.meshes[0].primitives[0].attribute(POSITION).unwrap();
    let values = AccessorReader::new(&back).read_f32(index).unwrap();
    let step = 5.0 / 16383.0;
    for (got, want) in values.iter().zip(positions.iter().flatten()) {
        assert!((got - want).abs() <= step, "{} vs {}", got, want);
    }
}

#[test]
fn test_meshopt_views_decode_after_reload() {
    let positions: Vec<[f32; 3]> = (0..64).map(|i| [i as f32, (i * 2) as f32, 0.5]).collect();
    let mut doc = point_cloud(positions.clone());
    let indices: Vec<u32> = (0..21).flat_map(|t| [3 * t, 3 * t + 1, 3 * t + 2]).collect();
    let index_view = meshopt::write_compressed_view(
        &mut doc,
        &gltfx_core::bytes::to_bytes(&indices),
        indices.len(),
        4,
        Mode::Triangles,
        Filter::None,
        None,
    )
    .unwrap();
    meshopt::compress_accessor(&mut doc, 0, &MeshoptOptions::default()).unwrap();

    let mut back = through_glb(&doc);
    assert!(back.buffers[1].is_fallback());
    assert_eq!(meshopt::decode_all(&mut back).unwrap(), 2);
    assert!(!back.is_extension_used(meshopt::EXTENSION_NAME));

    let values = AccessorReader::new(&back).read_f32(0).unwrap();
    let expected: Vec<f32> = positions.iter().flatten().copied().collect();
    assert_eq!(values, expected);
    let decoded = gltfx_core::bytes::from_bytes::<u32>(back.view_data(index_view).unwrap()).unwrap();
    assert_eq!(decoded, indices);
}

#[test]
fn test_instances_survive_glb() {
    let mut doc = point_cloud(vec![[0.0; 3]]);
    let instances = Instances {
        translations: vec![[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 3.0]],
        rotations: vec![[0.0, 0.0, 0.0, 1.0]; 3],
        scales: vec![[1.0; 3], [0.5; 3], [2.0; 3]],
    };
    instancing::add_instances(&mut doc, 0, &instances).unwrap();
    mesh_features::add_instance_feature_ids(&mut doc, 0, &[7, 8, 9], FeatureId::new(10)).unwrap();

    let back = through_glb(&doc);
    assert_eq!(instancing::read_instances(&back, 0).unwrap(), instances);
    assert_eq!(instancing::instance_count(&back, 0).unwrap(), Some(3));
}
