//! Voxels, models and scenes.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::palette::Palette;

/// Largest model extent per axis; voxel coordinates are `u8`.
pub const MAX_MODEL_EXTENT: u32 = 256;

/// Container family a scene was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// MagicaVoxel `.vox` chunked tree.
    MagicaVoxel,
    /// vengi `.vengi` compressed node tree.
    Vengi,
    /// Qubicle `.qb` legacy grid.
    Qubicle,
    /// Qubicle Binary Tree `.qbt`.
    QubicleTree,
}

impl ContainerFormat {
    /// Every supported format.
    pub const ALL: [Self; 4] = [Self::MagicaVoxel, Self::Vengi, Self::Qubicle, Self::QubicleTree];

    /// Canonical file extension (lowercase, no dot).
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::MagicaVoxel => "vox",
            Self::Vengi => "vengi",
            Self::Qubicle => "qb",
            Self::QubicleTree => "qbt",
        }
    }

    /// Resolves a file extension, case-insensitively, with or without a leading dot.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(extension))
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MagicaVoxel => "MagicaVoxel",
            Self::Vengi => "vengi",
            Self::Qubicle => "Qubicle",
            Self::QubicleTree => "Qubicle Binary Tree",
        };
        f.write_str(name)
    }
}

/// Single solid voxel in model-local grid coordinates.
///
/// Air is the absence of a voxel, so `color_index` is never 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Voxel {
    /// X position.
    pub x: u8,
    /// Y position.
    pub y: u8,
    /// Z position (up).
    pub z: u8,
    /// Palette index, 1-based.
    pub color_index: u8,
}

impl Voxel {
    /// Creates a voxel.
    #[inline]
    #[must_use]
    pub const fn new(x: u8, y: u8, z: u8, color_index: u8) -> Self {
        Self { x, y, z, color_index }
    }

    /// Position as an array.
    #[inline]
    #[must_use]
    pub const fn position(self) -> [u8; 3] {
        [self.x, self.y, self.z]
    }
}

/// One voxel model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoxelModel {
    /// Name from the container, when it carries one.
    pub name: Option<String>,
    /// Grid extents along X, Y, Z.
    pub size: [u32; 3],
    /// World-space offset of the model's minimum corner.
    pub position: [i32; 3],
    /// Sparse solid voxels.
    pub voxels: Vec<Voxel>,
    /// Model-local palette replacing the scene palette.
    pub palette: Option<Palette>,
}

impl VoxelModel {
    /// Creates an empty model of the given size.
    ///
    /// Each axis is clamped to [`MAX_MODEL_EXTENT`]; cells beyond it cannot
    /// be addressed by a voxel anyway.
    #[must_use]
    pub fn new(size: [u32; 3]) -> Self {
        Self {
            size: Self::clamp_size(size),
            ..Self::default()
        }
    }

    /// Clamps declared extents to [`MAX_MODEL_EXTENT`].
    #[inline]
    #[must_use]
    pub fn clamp_size(size: [u32; 3]) -> [u32; 3] {
        size.map(|s| s.min(MAX_MODEL_EXTENT))
    }

    /// True when the model has no voxels or a zero extent.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty() || self.size.contains(&0)
    }

    /// Number of grid cells (solid or not).
    #[inline]
    #[must_use]
    pub fn volume(&self) -> usize {
        self.size.iter().fold(1usize, |acc, &s| acc.saturating_mul(s as usize))
    }

    /// World-space center of the model's bounding box.
    #[must_use]
    pub fn center(&self) -> [f32; 3] {
        [
            self.position[0] as f32 + self.size[0] as f32 / 2.0,
            self.position[1] as f32 + self.size[1] as f32 / 2.0,
            self.position[2] as f32 + self.size[2] as f32 / 2.0,
        ]
    }

    /// Palette the model's voxels index into.
    #[inline]
    #[must_use]
    pub fn effective_palette<'a>(&'a self, scene_palette: &'a Palette) -> &'a Palette {
        self.palette.as_ref().unwrap_or(scene_palette)
    }

    /// True when a voxel lies inside the declared extents.
    #[inline]
    #[must_use]
    pub fn contains(&self, voxel: Voxel) -> bool {
        u32::from(voxel.x) < self.size[0]
            && u32::from(voxel.y) < self.size[1]
            && u32::from(voxel.z) < self.size[2]
    }
}

/// Decoded scene. Built once per decode call and owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelScene {
    /// Container the scene came from.
    pub format: ContainerFormat,
    /// Container version tag.
    pub version: u32,
    /// Models in file order.
    pub models: Vec<VoxelModel>,
    /// Scene palette.
    pub palette: Palette,
}

impl VoxelScene {
    /// Creates an empty scene with the built-in default palette.
    #[must_use]
    pub fn new(format: ContainerFormat, version: u32) -> Self {
        Self {
            format,
            version,
            models: Vec::new(),
            palette: Palette::builtin_default(),
        }
    }

    /// Total voxel count across models.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.models.iter().map(|m| m.voxels.len()).sum()
    }
}
