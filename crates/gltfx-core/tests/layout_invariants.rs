//! Buffer layout invariants after sequences of builder operations.

use gltfx_core::builder::{append_accessor, append_bytes_aligned, append_vertex_accessor};
use gltfx_core::bytes::{self, JSON_PADDING};
use gltfx_core::{
    append_attribute, append_indices, Accessor, AccessorReader, AccessorType, Column,
    ComponentType, Document,
};
use proptest::prelude::*;

fn column_strategy() -> impl Strategy<Value = Column> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 1..20).prop_map(Column::U8),
        proptest::collection::vec(any::<i16>(), 1..20).prop_map(Column::I16),
        proptest::collection::vec(-1000.0f32..1000.0, 1..20).prop_map(Column::F32),
        proptest::collection::vec(proptest::array::uniform3(-10.0f32..10.0), 1..20)
            .prop_map(Column::Vec3F32),
        proptest::collection::vec(any::<bool>(), 1..20).prop_map(Column::Bool),
    ]
}

proptest! {
    #[test]
    fn prop_appends_keep_layout_valid(columns in proptest::collection::vec(column_strategy(), 1..8)) {
        let mut doc = Document::new();
        for column in &columns {
            append_attribute(&mut doc, column).unwrap();
        }
        doc.validate_layout().unwrap();
        prop_assert_eq!(doc.buffers.len(), 1);
        prop_assert_eq!(doc.buffers[0].byte_length % 4, 0);
        prop_assert_eq!(doc.accessors.len(), columns.len());
        for view in &doc.buffer_views {
            prop_assert_eq!(view.byte_offset % 4, 0);
        }
    }
}

#[test]
fn test_offsets_never_move() {
    let mut doc = Document::new();
    let first = append_attribute(&mut doc, &Column::U16(vec![1, 2, 3])).unwrap();
    let before = doc.buffer_views[0].clone();
    append_indices(&mut doc, &[0, 1, 2, 2, 1, 0]).unwrap();
    append_bytes_aligned(&mut doc, b"{}", 8, JSON_PADDING, None, None).unwrap();
    append_attribute(&mut doc, &Column::Mat4F32(vec![[0.0; 16]])).unwrap();
    assert_eq!(doc.buffer_views[0], before);
    assert_eq!(AccessorReader::new(&doc).read_u32(first).unwrap(), vec![1, 2, 3]);
    assert_eq!(doc.buffer_views[2].byte_offset % 8, 0);
    doc.validate_layout().unwrap();
}

#[test]
fn test_raw_accessor_roundtrip() {
    let mut doc = Document::new();
    let mut accessor = Accessor::new(ComponentType::Short, AccessorType::Vec4, 2);
    accessor.normalized = true;
    let raw = bytes::to_bytes(&[32767i16, 0, -32767, 0, 0, 32767, 0, -32767]);
    let index = append_accessor(&mut doc, &raw, accessor, None).unwrap();
    let values = AccessorReader::new(&doc).read_f32(index).unwrap();
    assert_eq!(values, vec![1.0, 0.0, -1.0, 0.0, 0.0, 1.0, 0.0, -1.0]);
}

#[test]
fn test_padded_vertex_accessor_reads_back() {
    let mut doc = Document::new();
    let accessor = Accessor::new(ComponentType::UnsignedByte, AccessorType::Vec3, 3);
    let index = append_vertex_accessor(&mut doc, &[1, 2, 3, 4, 5, 6, 7, 8, 9], accessor).unwrap();
    assert_eq!(doc.buffer_views[0].byte_stride, Some(4));
    assert_eq!(
        AccessorReader::new(&doc).read_u32(index).unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8, 9]
    );
}
