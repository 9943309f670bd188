//! Rotation of Y-up container grids into the canonical Z-up frame.

use voxbake_core::Voxel;

/// Handedness of a Y-up container grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GridOrientation {
    /// `x` right, `y` up, `z` into the screen.
    LeftHanded,
    /// `x` right, `y` up, `z` towards the viewer.
    RightHanded,
}

/// A Y-up grid placed in its container's world space.
#[derive(Debug, Clone, Copy)]
pub(crate) struct YUpGrid {
    /// Extents along the container's x, y, z.
    pub size: [u32; 3],
    /// Container-space position of the grid's min corner.
    pub position: [i32; 3],
    pub orientation: GridOrientation,
}

impl YUpGrid {
    /// Canonical extents: the container's up axis becomes Z.
    pub fn canonical_size(&self) -> [u32; 3] {
        [self.size[0], self.size[2], self.size[1]]
    }

    /// Canonical world position of the rotated grid's min corner.
    pub fn canonical_position(&self) -> [i32; 3] {
        let [px, py, pz] = self.position;
        match self.orientation {
            GridOrientation::LeftHanded => [px, pz, py],
            GridOrientation::RightHanded => {
                let depth = i32::try_from(self.size[2]).unwrap_or(i32::MAX);
                [px, pz.saturating_add(depth - 1).saturating_neg(), py]
            }
        }
    }

    /// Maps a cell into canonical local coordinates.
    ///
    /// Returns `None` when the rotated coordinate does not fit a voxel.
    pub fn canonical_voxel(&self, cell: [u32; 3], color_index: u8) -> Option<Voxel> {
        let [x, y, z] = cell;
        Some(Voxel::new(
            u8::try_from(x).ok()?,
            self.canonical_depth(z)?,
            u8::try_from(y).ok()?,
            color_index,
        ))
    }

    /// Canonical `y` of a container depth slice, `None` when it does not fit
    /// a voxel coordinate.
    pub fn canonical_depth(&self, z: u32) -> Option<u8> {
        let depth = match self.orientation {
            GridOrientation::LeftHanded => z,
            GridOrientation::RightHanded => self.size[2].checked_sub(z.checked_add(1)?)?,
        };
        u8::try_from(depth).ok()
    }
}
