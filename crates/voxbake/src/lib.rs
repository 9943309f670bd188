//! # VOXBAKE
//!
//! Bakes voxel containers into textured triangle meshes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          BAKER                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  bytes → DecoderRegistry → VoxelScene                       │
//! │                               ↓ (rayon, one mesher/worker)  │
//! │                   GreedyMesher → pack → BakedModel[]        │
//! │                                              ↓              │
//! │                               OBJ + MTL + PNG (export)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use voxbake::{BakeConfig, Baker};
//!
//! let baker = Baker::new(BakeConfig::default())?;
//! let scene = baker.bake_file("castle.vox")?;
//! for model in &scene.models {
//!     println!("{}: {} triangles", model.name, model.mesh.triangle_count());
//! }
//! # Ok::<(), voxbake::BakeError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod export;
pub mod pipeline;

pub use config::{BakeConfig, ConfigError};
pub use export::{export_scene, write_atlas_png, write_obj, ExportedModel};
pub use pipeline::{bake_file, bake_scene, BakeError, BakeResult, BakedModel, BakedScene, Baker, MaterialHint};
