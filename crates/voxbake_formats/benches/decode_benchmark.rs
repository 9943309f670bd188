//! Benchmark for container decoding.
//!
//! TARGET: a 64^3 half-filled model decodes in under 10ms per format
//!
//! Run with: cargo bench --package voxbake_formats --features fixtures --bench decode_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use voxbake_core::{Rgba, Voxel};
use voxbake_formats::fixtures::{QbBuilder, QbtBuilder, QbtNode, VengiBuilder, VoxBuilder};
use voxbake_formats::{qbt, qubicle, vengi, vox, DecoderRegistry};

const EDGE: u8 = 64;

/// Checkerboard-ish terrain: every cell below a wavy height line is solid.
fn solid(x: u8, y: u8, z: u8) -> bool {
    let height = 24 + (x / 4 + y / 8) % 16;
    z < height && (x ^ y ^ z) % 7 != 0
}

fn cells() -> impl Iterator<Item = [u8; 3]> {
    (0..EDGE).flat_map(|x| {
        (0..EDGE).flat_map(move |y| (0..EDGE).filter(move |&z| solid(x, y, z)).map(move |z| [x, y, z]))
    })
}

fn color_for(cell: [u8; 3]) -> u8 {
    1 + (cell[0] / 8 + cell[1] / 8) % 32
}

fn benchmark_vox(c: &mut Criterion) {
    let voxels: Vec<Voxel> = cells()
        .map(|[x, y, z]| Voxel::new(x, y, z, color_for([x, y, z])))
        .collect();
    let edge = u32::from(EDGE);
    let bytes = VoxBuilder::new().model([edge; 3], &voxels).build();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(voxels.len() as u64));
    group.bench_function("vox_64", |b| b.iter(|| black_box(vox::decode(black_box(&bytes)).unwrap())));
    group.finish();
}

fn benchmark_vengi(c: &mut Criterion) {
    let max = i32::from(EDGE) - 1;
    let voxel_cells: Vec<([i32; 3], u8)> = cells()
        .map(|[x, y, z]| ([i32::from(x), i32::from(z), i32::from(y)], color_for([x, y, z])))
        .collect();
    let bytes = VengiBuilder::new(6)
        .begin_node("root", "Root", [0.0; 3])
        .begin_node("terrain", "Model", [0.0; 3])
        .data([0; 3], [max; 3], &voxel_cells)
        .end_node()
        .end_node()
        .build();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(voxel_cells.len() as u64));
    group.bench_function("vengi_64", |b| b.iter(|| black_box(vengi::decode(black_box(&bytes)).unwrap())));
    group.finish();
}

fn benchmark_qubicle(c: &mut Criterion) {
    let colored: Vec<([u32; 3], Rgba)> = cells()
        .map(|[x, y, z]| {
            let shade = color_for([x, y, z]) * 7;
            ([u32::from(x), u32::from(z), u32::from(y)], Rgba::new(shade, 64, 255 - shade, 255))
        })
        .collect();
    let edge = u32::from(EDGE);
    let raw = QbBuilder::new().matrix("terrain", [edge; 3], [0; 3], &colored).build();
    let rle = QbBuilder::new()
        .compressed(true)
        .matrix("terrain", [edge; 3], [0; 3], &colored)
        .build();
    let tree = QbtBuilder::new()
        .root(QbtNode::matrix("terrain", [0; 3], [edge; 3], &colored))
        .build();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(colored.len() as u64));
    group.bench_function("qb_raw_64", |b| b.iter(|| black_box(qubicle::decode(black_box(&raw)).unwrap())));
    group.bench_function("qb_rle_64", |b| b.iter(|| black_box(qubicle::decode(black_box(&rle)).unwrap())));
    group.bench_function("qbt_64", |b| b.iter(|| black_box(qbt::decode(black_box(&tree)).unwrap())));
    group.finish();
}

fn benchmark_registry_probe(c: &mut Criterion) {
    let registry = DecoderRegistry::with_defaults();
    let bytes = VoxBuilder::new().model([1, 1, 1], &[Voxel::new(0, 0, 0, 1)]).build();

    c.bench_function("registry_probe_and_decode", |b| {
        b.iter(|| black_box(registry.decode(black_box(&bytes), None).unwrap()));
    });
}

criterion_group!(
    benches,
    benchmark_vox,
    benchmark_vengi,
    benchmark_qubicle,
    benchmark_registry_probe,
);
criterion_main!(benches);
