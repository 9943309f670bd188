//! Mesh buffer emission.
//!
//! Turns quads plus their atlas placements into indexed triangle buffers
//! in output space (right-handed, Y up), scaled and centered on the
//! model's bounding box.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::atlas::{pack_blocks, uv_rect, AtlasImage, PackResult, UvRect};
use crate::quad::Quad;
use crate::winding::{quad_indices, size_to_output, to_output, triangle_normal, FrontFace};

// =============================================================================
// VERTEX FORMAT
// =============================================================================

/// Interleaved vertex for GPU upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BakedVertex {
    /// Output-space position.
    pub position: [f32; 3],
    /// Unit normal.
    pub normal: [f32; 3],
    /// Atlas coordinates, `v = 0` at the top.
    pub uv: [f32; 2],
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// Box containing nothing; extending it with a point yields that point.
    pub const EMPTY: Self = Self {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// True when no point has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|a| self.min[a] > self.max[a])
    }

    /// Grows the box to include `p`.
    pub fn extend(&mut self, p: [f32; 3]) {
        for a in 0..3 {
            self.min[a] = self.min[a].min(p[a]);
            self.max[a] = self.max[a].max(p[a]);
        }
    }

    /// Returns the center of the box.
    #[must_use]
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Edge lengths.
    #[must_use]
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

// =============================================================================
// MESH OUTPUT
// =============================================================================

/// Indexed triangle mesh with one UV and one normal per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffers {
    /// Output-space positions.
    pub positions: Vec<[f32; 3]>,
    /// Triangle list, three indices per triangle.
    pub indices: Vec<u32>,
    /// Atlas coordinates.
    pub uvs: Vec<[f32; 2]>,
    /// Unit normals.
    pub normals: Vec<[f32; 3]>,
    /// Bounds of `positions`.
    pub bounds: Aabb,
}

impl MeshBuffers {
    /// Check if mesh is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Get vertex count
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get triangle count
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaves the attribute streams.
    #[must_use]
    pub fn interleaved(&self) -> Vec<BakedVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((&position, &normal), &uv)| BakedVertex { position, normal, uv })
            .collect()
    }

    /// Recomputes area-weighted vertex normals from the triangles.
    pub fn recalculate_normals(&mut self, front_face: FrontFace) {
        let mut normals = vec![[0.0f32; 3]; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
            let n = triangle_normal(self.positions[a], self.positions[b], self.positions[c], front_face);
            for i in [a, b, c] {
                for axis in 0..3 {
                    normals[i][axis] += n[axis];
                }
            }
        }
        for n in &mut normals {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if len > 0.0 {
                *n = [n[0] / len, n[1] / len, n[2] / len];
            }
        }
        self.normals = normals;
    }

    /// Recomputes `bounds` from the positions.
    pub fn recalculate_bounds(&mut self) {
        let mut bounds = Aabb::EMPTY;
        for &p in &self.positions {
            bounds.extend(p);
        }
        self.bounds = bounds;
    }
}

// =============================================================================
// PACKING
// =============================================================================

/// Atlas and emission settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackSettings {
    /// First atlas side tried.
    pub atlas_base_size: u32,
    /// Largest atlas side allowed.
    pub atlas_max_size: u32,
    /// Output units per voxel.
    pub scale: f32,
    /// Front-face convention of the consumer.
    pub front_face: FrontFace,
}

impl Default for PackSettings {
    fn default() -> Self {
        Self {
            atlas_base_size: 512,
            atlas_max_size: 4096,
            scale: 0.1,
            front_face: FrontFace::Clockwise,
        }
    }
}

/// Bakes quads into an atlas and mesh buffers.
///
/// `model_size` is the grid size of the model the quads came from; the
/// mesh is centered on that box.
///
/// # Errors
///
/// Any [`PackError`](crate::atlas::PackError) from placing the blocks.
pub fn pack(quads: &[Quad], model_size: [u32; 3], settings: &PackSettings) -> PackResult<(AtlasImage, MeshBuffers)> {
    let blocks: Vec<(u32, u32)> = quads.iter().map(|q| (q.width, q.height)).collect();
    let layout = pack_blocks(&blocks, settings.atlas_base_size, settings.atlas_max_size)?;

    let mut atlas = AtlasImage::new(layout.width, layout.height);
    let mut rects: Vec<UvRect> = Vec::with_capacity(quads.len());
    for (quad, &(x, y)) in quads.iter().zip(&layout.placements) {
        atlas.blit(x, y, quad.width, &quad.pixels);
        rects.push(uv_rect(x, y, quad.width, quad.height, &atlas));
    }

    let mesh = emit(quads, &rects, model_size, settings);
    debug!(
        quads = quads.len(),
        vertices = mesh.vertex_count(),
        atlas_width = atlas.width,
        atlas_height = atlas.height,
        "baked quads"
    );
    Ok((atlas, mesh))
}

/// Emits mesh buffers for quads whose UV rects are already known.
#[must_use]
pub fn emit(quads: &[Quad], rects: &[UvRect], model_size: [u32; 3], settings: &PackSettings) -> MeshBuffers {
    let scale = settings.scale;
    let half = size_to_output(model_size.map(|s| s as f32 * 0.5));
    // Grid center (sx/2, sy/2, sz/2) maps to (sx/2, sz/2, -sy/2).
    let center = [half[0] * scale, half[1] * scale, -half[2] * scale];

    let mut mesh = MeshBuffers {
        positions: Vec::with_capacity(quads.len() * 4),
        indices: Vec::with_capacity(quads.len() * 6),
        uvs: Vec::with_capacity(quads.len() * 4),
        ..MeshBuffers::default()
    };

    for (quad, rect) in quads.iter().zip(rects) {
        let base = mesh.positions.len() as u32;
        for corner in quad.corners {
            let p = to_output(corner.map(|c| c as f32));
            mesh.positions.push([
                p[0] * scale - center[0],
                p[1] * scale - center[1],
                p[2] * scale - center[2],
            ]);
        }
        mesh.uvs.extend_from_slice(&rect.corners());
        mesh.indices
            .extend(quad_indices(quad.direction, settings.front_face).map(|i| base + i));
    }

    mesh.recalculate_normals(settings.front_face);
    mesh.recalculate_bounds();
    mesh
}
