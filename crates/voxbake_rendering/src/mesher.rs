//! Greedy meshing for sparse voxel models.
//!
//! ## Algorithm
//!
//! 1. Scatter the model into a dense volume of color indices (0 = air)
//! 2. For each axis and direction, sweep slices perpendicular to the axis
//! 3. Build a 2D mask of faces whose neighbor along the direction is air
//! 4. Greedily merge visible cells into rectangles, row-major, sampling
//!    each cell's color into the quad's pixel buffer
//!
//! Merging follows visibility only. Colors differ freely inside a quad
//! because every quad carries its own pixels.

use tracing::{debug, trace};
use voxbake_core::{Palette, Rgba, VoxelModel};

use crate::quad::{tangent_axes, FaceDirection, Quad};

/// Greedy meshing engine.
///
/// Holds the dense volume and slice mask between calls. Both only ever
/// grow, so meshing many models reuses the same allocations.
#[derive(Debug, Default)]
pub struct GreedyMesher {
    /// Color index per cell, `x + y * sx + z * sx * sy`.
    volume: Vec<u8>,
    /// Color index per visible face of the current slice, `u + v * su`.
    mask: Vec<u8>,
    size: [usize; 3],
}

impl GreedyMesher {
    /// Creates a mesher with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Meshes one model.
    ///
    /// Voxels outside the declared size are dropped. A `max_quad_size` of 0
    /// is treated as 1.
    pub fn mesh(&mut self, model: &VoxelModel, palette: &Palette, max_quad_size: u32) -> Vec<Quad> {
        let max_quad_size = max_quad_size.max(1) as usize;
        if model.is_empty() {
            debug!(name = ?model.name, "empty model, nothing to mesh");
            return Vec::new();
        }

        let solid = self.fill_volume(model);
        if solid == 0 {
            debug!(name = ?model.name, "model holds only air");
            return Vec::new();
        }

        let mut quads = Vec::new();
        for axis in 0..3 {
            for direction in FaceDirection::ALL {
                for slice in 0..self.size[axis] {
                    self.build_mask(axis, direction, slice);
                    self.extract(axis, direction, slice, palette, max_quad_size, &mut quads);
                }
            }
        }

        trace!(name = ?model.name, solid, quads = quads.len(), "meshed model");
        quads
    }

    /// Scatters voxels into the dense volume and returns how many landed.
    ///
    /// Extents are clamped to [`voxbake_core::MAX_MODEL_EXTENT`] since `size` is a public
    /// field and may bypass [`VoxelModel::new`].
    fn fill_volume(&mut self, model: &VoxelModel) -> usize {
        self.size = VoxelModel::clamp_size(model.size).map(|s| s as usize);
        let [sx, sy, sz] = self.size;
        let cells = sx
            .checked_mul(sy)
            .and_then(|n| n.checked_mul(sz))
            .unwrap_or(0);
        self.volume.clear();
        self.volume.resize(cells, 0);

        let mut placed = 0usize;
        let mut dropped = 0usize;
        for voxel in &model.voxels {
            let [x, y, z] = voxel.position().map(usize::from);
            if x >= sx || y >= sy || z >= sz {
                dropped += 1;
                continue;
            }
            if voxel.color_index == 0 {
                continue;
            }
            let cell = &mut self.volume[x + y * sx + z * sx * sy];
            if *cell == 0 {
                placed += 1;
            }
            *cell = voxel.color_index;
        }
        if dropped > 0 {
            debug!(count = dropped, name = ?model.name, "voxels outside model bounds dropped");
        }
        placed
    }

    #[inline]
    fn at(&self, p: [usize; 3]) -> u8 {
        let [sx, sy, _] = self.size;
        self.volume[p[0] + p[1] * sx + p[2] * sx * sy]
    }

    /// Builds the visibility mask of one slice.
    fn build_mask(&mut self, axis: usize, direction: FaceDirection, slice: usize) {
        let (u_axis, v_axis) = tangent_axes(axis);
        let (su, sv) = (self.size[u_axis], self.size[v_axis]);
        self.mask.clear();
        self.mask.resize(su * sv, 0);

        let neighbor = match direction {
            FaceDirection::Positive => Some(slice + 1).filter(|&n| n < self.size[axis]),
            FaceDirection::Negative => slice.checked_sub(1),
        };

        for v in 0..sv {
            for u in 0..su {
                let mut p = [0usize; 3];
                p[axis] = slice;
                p[u_axis] = u;
                p[v_axis] = v;
                let color = self.at(p);
                if color == 0 {
                    continue;
                }
                let covered = match neighbor {
                    Some(n) => {
                        let mut q = p;
                        q[axis] = n;
                        self.at(q) != 0
                    }
                    None => false,
                };
                if !covered {
                    self.mask[u + v * su] = color;
                }
            }
        }
    }

    /// Greedily merges the current mask into quads.
    fn extract(
        &mut self,
        axis: usize,
        direction: FaceDirection,
        slice: usize,
        palette: &Palette,
        max_quad_size: usize,
        quads: &mut Vec<Quad>,
    ) {
        let (u_axis, v_axis) = tangent_axes(axis);
        let (su, sv) = (self.size[u_axis], self.size[v_axis]);
        let depth = (slice + usize::from(direction.is_positive())) as u32;

        for v in 0..sv {
            let mut u = 0;
            while u < su {
                if self.mask[u + v * su] == 0 {
                    u += 1;
                    continue;
                }

                let mut width = 1;
                while width < max_quad_size && u + width < su && self.mask[u + width + v * su] != 0 {
                    width += 1;
                }

                let mut height = 1;
                'grow: while height < max_quad_size && v + height < sv {
                    let row = (v + height) * su;
                    if self.mask[row + u..row + u + width].contains(&0) {
                        break 'grow;
                    }
                    height += 1;
                }

                let mut pixels = Vec::with_capacity(width * height);
                for dv in 0..height {
                    let row = (v + dv) * su;
                    for cell in &mut self.mask[row + u..row + u + width] {
                        pixels.push(sample(palette, *cell));
                        *cell = 0;
                    }
                }

                quads.push(Quad::new(
                    axis,
                    direction,
                    depth,
                    [u as u32, v as u32],
                    [width as u32, height as u32],
                    pixels,
                ));
                u += width;
            }
        }
    }
}

#[inline]
fn sample(palette: &Palette, index: u8) -> Rgba {
    palette.sample(usize::from(index))
}

/// Meshes one model with a throwaway [`GreedyMesher`].
#[must_use]
pub fn mesh(model: &VoxelModel, palette: &Palette, max_quad_size: u32) -> Vec<Quad> {
    GreedyMesher::new().mesh(model, palette, max_quad_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbake_core::Voxel;

    fn cube(n: u8) -> VoxelModel {
        let mut model = VoxelModel::new([u32::from(n); 3]);
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    model.voxels.push(Voxel::new(x, y, z, 1 + (x + y + z) % 3));
                }
            }
        }
        model
    }

    #[test]
    fn test_empty_model() {
        let palette = Palette::builtin_default();
        assert!(mesh(&VoxelModel::new([4, 4, 4]), &palette, 16).is_empty());
        assert!(mesh(&VoxelModel::new([0, 4, 4]), &palette, 16).is_empty());
    }

    #[test]
    fn test_oversized_declared_extent_is_clamped() {
        let mut model = VoxelModel::new([1, 1, 1]);
        model.size = [u32::MAX, 2, u32::MAX];
        model.voxels.push(Voxel::new(255, 0, 0, 4));
        let mut mesher = GreedyMesher::new();
        let quads = mesher.mesh(&model, &Palette::builtin_default(), 16);
        assert_eq!(quads.len(), 6);
        assert_eq!(mesher.size, [256, 2, 256]);
        assert_eq!(mesher.volume.len(), 256 * 2 * 256);
    }

    #[test]
    fn test_single_voxel_has_six_faces() {
        let mut model = VoxelModel::new([1, 1, 1]);
        model.voxels.push(Voxel::new(0, 0, 0, 5));
        let palette = Palette::builtin_default();
        let quads = mesh(&model, &palette, 16);
        assert_eq!(quads.len(), 6);
        for quad in &quads {
            assert_eq!(quad.pixels, vec![palette.color(5)]);
        }
    }

    #[test]
    fn test_solid_cube_is_six_quads() {
        let palette = Palette::builtin_default();
        let quads = mesh(&cube(8), &palette, 16);
        assert_eq!(quads.len(), 6);
        for quad in &quads {
            assert_eq!((quad.width, quad.height), (8, 8));
            // Merged quads keep per-voxel colors.
            assert_eq!(quad.pixels.len(), 64);
            assert_ne!(quad.pixels[0], quad.pixels[1]);
        }
    }

    #[test]
    fn test_max_quad_size_splits_faces() {
        let palette = Palette::builtin_default();
        let quads = mesh(&cube(8), &palette, 3);
        // Each 8x8 face splits into 3 x 3 tiles (3 + 3 + 2 per side).
        assert_eq!(quads.len(), 6 * 9);
        assert!(quads.iter().all(|q| q.width <= 3 && q.height <= 3));

        let unit = mesh(&cube(2), &palette, 0);
        assert_eq!(unit.len(), 6 * 4);
    }

    #[test]
    fn test_out_of_bounds_voxels_are_dropped() {
        let mut model = VoxelModel::new([2, 2, 2]);
        model.voxels.push(Voxel::new(0, 0, 0, 1));
        model.voxels.push(Voxel::new(5, 0, 0, 1));
        let quads = mesh(&model, &Palette::builtin_default(), 16);
        assert_eq!(quads.len(), 6);
    }

    #[test]
    fn test_air_index_never_sampled() {
        let mut model = VoxelModel::new([1, 1, 1]);
        model.voxels.push(Voxel::new(0, 0, 0, 0));
        assert!(mesh(&model, &Palette::builtin_default(), 16).is_empty());
    }

    #[test]
    fn test_unset_palette_entries_still_sample() {
        let mut model = VoxelModel::new([1, 1, 1]);
        model.voxels.push(Voxel::new(0, 0, 0, 200));
        let quads = mesh(&model, &Palette::new(), 16);
        assert!(quads.iter().all(|q| q.pixels == vec![Rgba::TRANSPARENT]));
    }

    #[test]
    fn test_scratch_reused_across_models() {
        let palette = Palette::builtin_default();
        let mut mesher = GreedyMesher::new();
        assert_eq!(mesher.mesh(&cube(6), &palette, 16).len(), 6);
        let mut small = VoxelModel::new([3, 1, 1]);
        small.voxels.push(Voxel::new(2, 0, 0, 1));
        // Leftovers from the larger model must not leak into this one.
        assert_eq!(mesher.mesh(&small, &palette, 16).len(), 6);
    }

    #[test]
    fn test_positive_faces_sit_one_past_the_slice() {
        let mut model = VoxelModel::new([1, 1, 3]);
        model.voxels.push(Voxel::new(0, 0, 1, 1));
        let quads = mesh(&model, &Palette::builtin_default(), 16);
        let top = quads
            .iter()
            .find(|q| q.axis == 2 && q.direction == FaceDirection::Positive)
            .unwrap();
        assert_eq!(top.corners[0], [0, 0, 2]);
        let bottom = quads
            .iter()
            .find(|q| q.axis == 2 && q.direction == FaceDirection::Negative)
            .unwrap();
        assert_eq!(bottom.corners[0], [0, 0, 1]);
    }
}
