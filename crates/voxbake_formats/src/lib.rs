//! # VOXBAKE Formats
//!
//! Decoders turning voxel container bytes into a [`VoxelScene`].
//!
//! ## Supported Containers
//!
//! ```text
//! ┌────────────┬────────────┬──────────────────────────────────────┐
//! │ Extension  │ Magic      │ Notes                                │
//! ├────────────┼────────────┼──────────────────────────────────────┤
//! │ .vox       │ "VOX "     │ chunk tree, optional scene graph     │
//! │ .vengi     │ "VENG"     │ deflated node tree, best effort      │
//! │ .qb        │ 01 01 00 00│ RGBA grids, optional RLE             │
//! │ .qbt       │ "QB 2"     │ zlib grids in a node tree            │
//! └────────────┴────────────┴──────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use voxbake_formats::DecoderRegistry;
//!
//! let scene = DecoderRegistry::with_defaults().decode_file("castle.vox")?;
//! ```
//!
//! Every decoder hands out scenes in the canonical right-handed, Z-up frame.
//!
//! [`VoxelScene`]: voxbake_core::VoxelScene

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

mod axes;
pub mod error;
pub mod qbt;
pub mod qubicle;
pub mod reader;
pub mod registry;
pub mod vengi;
pub mod vox;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use error::{DecodeError, DecodeResult};
pub use reader::ByteReader;
pub use registry::{
    decode, DecoderRegistry, QubicleDecoder, QubicleTreeDecoder, VengiDecoder, VoxDecoder,
    VoxelDecoder,
};
