//! Benchmark for greedy meshing and atlas baking.
//!
//! TARGET: a 128^3 terrain model meshes and bakes in under 50ms
//!
//! Run with: cargo bench --package voxbake_rendering --bench mesher_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use voxbake_core::{Palette, Voxel, VoxelModel};
use voxbake_rendering::{pack, GreedyMesher, PackSettings};

/// Rolling-hills model with a few colors per column.
fn terrain(edge: u8) -> VoxelModel {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut model = VoxelModel::new([u32::from(edge); 3]);
    for x in 0..edge {
        for y in 0..edge {
            let height = edge / 4 + rng.gen_range(0..edge / 4);
            for z in 0..height {
                let color = if z + 1 == height { 2 } else { 1 + z % 8 };
                model.voxels.push(Voxel::new(x, y, z, color));
            }
        }
    }
    model
}

/// Checkerboard, the worst case for merging.
fn checkerboard(edge: u8) -> VoxelModel {
    let mut model = VoxelModel::new([u32::from(edge); 3]);
    for x in 0..edge {
        for y in 0..edge {
            for z in 0..edge {
                if (x + y + z) % 2 == 0 {
                    model.voxels.push(Voxel::new(x, y, z, 1));
                }
            }
        }
    }
    model
}

fn benchmark_mesh(c: &mut Criterion) {
    let palette = Palette::builtin_default();
    let mut group = c.benchmark_group("greedy_mesh");

    for (name, model) in [("terrain_128", terrain(128)), ("checkerboard_32", checkerboard(32))] {
        group.throughput(Throughput::Elements(model.voxels.len() as u64));
        group.bench_function(name, |b| {
            let mut mesher = GreedyMesher::new();
            b.iter(|| black_box(mesher.mesh(black_box(&model), &palette, 48)));
        });
    }

    group.finish();
}

fn benchmark_pack(c: &mut Criterion) {
    let palette = Palette::builtin_default();
    let model = terrain(128);
    let quads = GreedyMesher::new().mesh(&model, &palette, 48);
    let settings = PackSettings::default();

    let mut group = c.benchmark_group("atlas_pack");
    group.sample_size(20);
    group.throughput(Throughput::Elements(quads.len() as u64));
    group.bench_function("terrain_128", |b| {
        b.iter(|| black_box(pack(black_box(&quads), model.size, &settings).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, benchmark_mesh, benchmark_pack);
criterion_main!(benches);
