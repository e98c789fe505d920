//! Document round-trips through every output form.

use gltfx_core::mesh::POSITION;
use gltfx_core::{
    append_attribute, append_indices, Column, Document, Mesh, Node, Primitive, PrimitiveMode,
};
use gltfx_io::{glb, GltfReader, GltfWriter, MemoryWriteHandler, NoExternalResources};
use proptest::prelude::*;

fn triangle_document() -> Document {
    let mut doc = Document::new();
    let positions = append_attribute(
        &mut doc,
        &Column::Vec3F32(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
    )
    .unwrap();
    let indices = append_indices(&mut doc, &[0, 1, 2]).unwrap();
    let mut primitive = Primitive::new(PrimitiveMode::Triangles);
    primitive.attributes.insert(POSITION.to_string(), positions);
    primitive.indices = Some(indices);
    let mesh = doc
        .push_mesh(Mesh {
            primitives: vec![primitive],
            ..Mesh::default()
        })
        .unwrap();
    let node = doc.push_node(Node::with_mesh(mesh)).unwrap();
    doc.scenes.push(gltfx_core::Scene {
        nodes: vec![node],
        ..Default::default()
    });
    doc.scene = Some(0);
    doc
}

#[test]
fn test_glb_roundtrip() {
    let doc = triangle_document();
    let mut handler = MemoryWriteHandler::new();
    let bytes = GltfWriter::new(&doc).to_glb(&mut handler).unwrap();
    assert!(glb::is_glb(&bytes));
    assert_eq!(bytes.len() % 4, 0);
    assert!(handler.resources.is_empty());

    let back = GltfReader::new().read(&bytes, &mut NoExternalResources).unwrap();
    assert!(back.notices.is_empty());
    assert_eq!(back.document, doc);
}

#[test]
fn test_external_bin_roundtrip() {
    let doc = triangle_document();
    let mut handler = MemoryWriteHandler::new();
    let json = GltfWriter::new(&doc)
        .pretty(true)
        .to_gltf("triangle.bin", &mut handler)
        .unwrap();
    assert_eq!(handler.resources["triangle.bin"], doc.buffers[0].data);

    let mut back = GltfReader::new().read(&json, &mut handler).unwrap().document;
    assert_eq!(back.buffers[0].uri.as_deref(), Some("triangle.bin"));
    back.buffers[0].uri = None;
    assert_eq!(back, doc);
}

#[test]
fn test_embedded_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triangle.gltf");
    let doc = triangle_document();
    GltfWriter::new(&doc).write_gltf_embedded(&path).unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let back = GltfReader::new().open(&path).unwrap().document;
    assert!(back.buffers[0].uri.as_deref().unwrap().starts_with("data:"));
    assert_eq!(back.buffers[0].data, doc.buffers[0].data);
    assert_eq!(back.accessors, doc.accessors);
}

#[test]
fn test_glb_to_gltf_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let doc = triangle_document();
    let glb_path = dir.path().join("a.glb");
    GltfWriter::new(&doc).write_glb(&glb_path).unwrap();
    let loaded = GltfReader::new().open(&glb_path).unwrap().document;

    let gltf_path = dir.path().join("b.gltf");
    GltfWriter::new(&loaded).write_gltf(&gltf_path).unwrap();
    let mut again = GltfReader::new().open(&gltf_path).unwrap().document;
    again.buffers[0].uri = None;
    assert_eq!(again, doc);
}

proptest! {
    #[test]
    fn prop_glb_preserves_buffer_bytes(values in proptest::collection::vec(any::<u8>(), 1..64)) {
        let mut doc = Document::new();
        append_attribute(&mut doc, &Column::U8(values)).unwrap();
        let mut handler = MemoryWriteHandler::new();
        let bytes = GltfWriter::new(&doc).to_glb(&mut handler).unwrap();
        let back = GltfReader::new().read(&bytes, &mut NoExternalResources).unwrap().document;
        prop_assert_eq!(back, doc);
    }
}
