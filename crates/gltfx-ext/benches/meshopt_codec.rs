//! Meshopt codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gltfx_ext::meshopt::{self, Filter, Mode};

const VERTICES: usize = 16_384;

/// A smooth grid of positions, normals and UVs in a 32-byte stride.
fn vertex_grid() -> Vec<u8> {
    let side = (VERTICES as f32).sqrt() as usize;
    let mut data = Vec::with_capacity(VERTICES * 32);
    for i in 0..VERTICES {
        let (x, z) = ((i % side) as f32, (i / side) as f32);
        let y = (x * 0.1).sin() * (z * 0.1).cos();
        for v in [x, y, z, 0.0, 1.0, 0.0, x / side as f32, z / side as f32] {
            data.extend_from_slice(&v.to_le_bytes());
        }
    }
    data
}

fn grid_triangles() -> Vec<u8> {
    let side = (VERTICES as f32).sqrt() as u32;
    let mut indices = Vec::new();
    for z in 0..side - 1 {
        for x in 0..side - 1 {
            let i = z * side + x;
            indices.extend_from_slice(&[i, i + side, i + 1, i + 1, i + side, i + side + 1]);
        }
    }
    indices.iter().flat_map(|i| i.to_le_bytes()).collect()
}

fn vertex_codec(c: &mut Criterion) {
    let data = vertex_grid();
    let encoded = meshopt::encode(&data, VERTICES, 32, Mode::Attributes).unwrap_or_default();
    c.bench_function("vertex_encode", |b| {
        b.iter(|| meshopt::encode(black_box(&data), VERTICES, 32, Mode::Attributes))
    });
    c.bench_function("vertex_decode", |b| {
        b.iter(|| meshopt::decode(black_box(&encoded), VERTICES, 32, Mode::Attributes, Filter::None))
    });
}

fn index_codec(c: &mut Criterion) {
    let data = grid_triangles();
    let count = data.len() / 4;
    let encoded = meshopt::encode(&data, count, 4, Mode::Triangles).unwrap_or_default();
    c.bench_function("triangle_encode", |b| {
        b.iter(|| meshopt::encode(black_box(&data), count, 4, Mode::Triangles))
    });
    c.bench_function("triangle_decode", |b| {
        b.iter(|| meshopt::decode(black_box(&encoded), count, 4, Mode::Triangles, Filter::None))
    });
}

criterion_group!(benches, vertex_codec, index_codec);
criterion_main!(benches);
