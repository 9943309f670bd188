//! Merged faces produced by the greedy mesher.

use voxbake_core::Rgba;

/// Side of a voxel a face looks out of, along its axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceDirection {
    /// Facing toward decreasing coordinates.
    Negative,
    /// Facing toward increasing coordinates.
    Positive,
}

impl FaceDirection {
    /// Both directions, negative first.
    pub const ALL: [Self; 2] = [Self::Negative, Self::Positive];

    /// `-1` or `+1`.
    #[inline]
    #[must_use]
    pub const fn sign(self) -> i32 {
        match self {
            Self::Negative => -1,
            Self::Positive => 1,
        }
    }

    /// True for [`FaceDirection::Positive`].
    #[inline]
    #[must_use]
    pub const fn is_positive(self) -> bool {
        matches!(self, Self::Positive)
    }
}

/// Tangent axes of a face whose normal runs along `axis`.
///
/// Cyclic, so `U x V` is always `+axis`.
#[inline]
#[must_use]
pub const fn tangent_axes(axis: usize) -> (usize, usize) {
    ((axis + 1) % 3, (axis + 2) % 3)
}

/// One merged rectangular face.
///
/// Corners are in model-local grid space, ordered origin, `+U`, `+V`,
/// `+U+V`. `pixels` is row-major with `width` columns along `U` and
/// `height` rows along `V`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    /// Corner positions.
    pub corners: [[u32; 3]; 4],
    /// Axis of the face normal (0 = x, 1 = y, 2 = z).
    pub axis: usize,
    /// Which way the face looks along `axis`.
    pub direction: FaceDirection,
    /// Cells along `U`.
    pub width: u32,
    /// Cells along `V`.
    pub height: u32,
    /// One color per covered cell.
    pub pixels: Vec<Rgba>,
}

impl Quad {
    /// Builds a quad on the plane `axis = depth`, covering
    /// `width x height` cells from `(u, v)`.
    #[must_use]
    pub fn new(
        axis: usize,
        direction: FaceDirection,
        depth: u32,
        origin: [u32; 2],
        size: [u32; 2],
        pixels: Vec<Rgba>,
    ) -> Self {
        let (u_axis, v_axis) = tangent_axes(axis);
        let corner = |du: u32, dv: u32| {
            let mut p = [0u32; 3];
            p[axis] = depth;
            p[u_axis] = origin[0] + du;
            p[v_axis] = origin[1] + dv;
            p
        };
        Self {
            corners: [
                corner(0, 0),
                corner(size[0], 0),
                corner(0, size[1]),
                corner(size[0], size[1]),
            ],
            axis,
            direction,
            width: size[0],
            height: size[1],
            pixels,
        }
    }

    /// Number of unit faces merged into this quad.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> u32 {
        self.width * self.height
    }

    /// Outward unit normal in grid space.
    #[must_use]
    pub fn normal(&self) -> [f32; 3] {
        let mut n = [0.0; 3];
        n[self.axis] = self.direction.sign() as f32;
        n
    }

    /// Color of the cell at column `u`, row `v`.
    #[must_use]
    pub fn pixel(&self, u: u32, v: u32) -> Option<Rgba> {
        if u >= self.width || v >= self.height {
            return None;
        }
        self.pixels.get((v * self.width + u) as usize).copied()
    }

    /// Voxel cells whose face this quad covers.
    pub fn cells(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        let (u_axis, v_axis) = tangent_axes(self.axis);
        let origin = self.corners[0];
        let depth = if self.direction.is_positive() {
            origin[self.axis] - 1
        } else {
            origin[self.axis]
        };
        (0..self.height).flat_map(move |dv| {
            (0..self.width).map(move |du| {
                let mut cell = [0u32; 3];
                cell[self.axis] = depth;
                cell[u_axis] = origin[u_axis] + du;
                cell[v_axis] = origin[v_axis] + dv;
                cell
            })
        })
    }
}
