//! # VOXBAKE Rendering
//!
//! Turns decoded voxel models into textured triangle meshes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BAKE PIPELINE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VoxelModel → GreedyMesher → Quad[] → Skyline Packer        │
//! │                                  ↓           ↓              │
//! │                            MeshBuffers   AtlasImage         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//!
//! - Quads live in grid space (right-handed, Z up); buffers are emitted in
//!   output space (right-handed, Y up)
//! - Every quad carries one pixel per covered voxel, so merging never
//!   loses color detail
//! - Atlas row 0 is the top row, matching `v = 0`

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod atlas;
pub mod buffers;
pub mod mesher;
pub mod quad;
pub mod winding;

pub use atlas::{pack_blocks, AtlasImage, BlockLayout, PackError, PackResult, UvRect};
pub use buffers::{emit, pack, Aabb, BakedVertex, MeshBuffers, PackSettings};
pub use mesher::{mesh, GreedyMesher};
pub use quad::{FaceDirection, Quad};
pub use winding::{quad_indices, to_output, FrontFace};
