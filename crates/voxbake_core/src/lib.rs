//! # VOXBAKE Core
//!
//! Canonical in-memory voxel scene shared by every decoder and consumed by
//! the mesher.
//!
//! ## Data Model
//!
//! ```text
//! VoxelScene
//! ├── format / version      - container the scene came from
//! ├── palette               - 256 entries, index 0 = air
//! └── models[]
//!     ├── size / position   - grid extents, world offset of the min corner
//!     ├── voxels[]          - sparse (x, y, z, color_index)
//!     └── palette?          - model-local override
//! ```
//!
//! ## Axes
//!
//! Scenes are stored right-handed with **Z up**. Decoders for Y-up
//! containers rotate into this frame before handing the scene out.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod color;
pub mod model;
pub mod palette;

pub use color::Rgba;
pub use model::{ContainerFormat, Voxel, VoxelModel, VoxelScene, MAX_MODEL_EXTENT};
pub use palette::{MaterialType, Palette, PaletteEntry, DEFAULT_PALETTE, PALETTE_SIZE};
