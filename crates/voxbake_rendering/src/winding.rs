//! Winding rules and the grid to output mapping.
//!
//! ```text
//! grid   (right-handed, Z up)      output (right-handed, Y up)
//!
//!     z                                y
//!     │  y                             │
//!     │ ╱          (x, y, z)           │
//!     │╱           ─────────►          │
//!     └──── x      (x, z, -y)          └──── x
//!                                     ╱
//!                                    z
//! ```
//!
//! The mapping is a proper rotation, so a triangle's orientation survives
//! it unchanged. Because the tangent axes are cyclic, corner triangle
//! `(0, 1, 2)` of every quad winds counter-clockwise seen from `+axis`.

use serde::{Deserialize, Serialize};

use crate::quad::FaceDirection;

/// Which winding the consumer treats as front facing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontFace {
    /// Clockwise triangles are front faces.
    #[default]
    Clockwise,
    /// Counter-clockwise triangles are front faces.
    CounterClockwise,
}

impl FrontFace {
    /// Sign turning a right-handed triangle cross product into the
    /// front-side normal.
    #[inline]
    #[must_use]
    pub const fn normal_sign(self) -> f32 {
        match self {
            Self::Clockwise => -1.0,
            Self::CounterClockwise => 1.0,
        }
    }
}

/// Corner indices of the two triangles of a quad, relative to its first
/// vertex, for a face looking along `direction`.
#[must_use]
pub const fn quad_indices(direction: FaceDirection, front_face: FrontFace) -> [u32; 6] {
    // Counter-clockwise seen from +axis.
    const FORWARD: [u32; 6] = [0, 1, 2, 1, 3, 2];
    const REVERSED: [u32; 6] = [0, 2, 1, 1, 2, 3];
    match (direction, front_face) {
        (FaceDirection::Positive, FrontFace::Clockwise)
        | (FaceDirection::Negative, FrontFace::CounterClockwise) => REVERSED,
        (FaceDirection::Negative, FrontFace::Clockwise)
        | (FaceDirection::Positive, FrontFace::CounterClockwise) => FORWARD,
    }
}

/// Maps a grid-space point into output space.
#[inline]
#[must_use]
pub fn to_output(p: [f32; 3]) -> [f32; 3] {
    [p[0], p[2], -p[1]]
}

/// Maps a grid-space size into output space (always positive).
#[inline]
#[must_use]
pub fn size_to_output(size: [f32; 3]) -> [f32; 3] {
    [size[0], size[2], size[1]]
}

/// Right-handed cross product.
#[inline]
#[must_use]
pub fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Front-side normal (unnormalized, twice the area) of a triangle.
#[must_use]
pub fn triangle_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3], front_face: FrontFace) -> [f32; 3] {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = cross(ab, ac);
    let s = front_face.normal_sign();
    [n[0] * s, n[1] * s, n[2] * s]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quad::Quad;
    use voxbake_core::Rgba;

    fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    fn corners(quad: &Quad) -> [[f32; 3]; 4] {
        quad.corners.map(|c| to_output(c.map(|v| v as f32)))
    }

    #[test]
    fn test_mapping_is_a_rotation() {
        let x = to_output([1.0, 0.0, 0.0]);
        let y = to_output([0.0, 1.0, 0.0]);
        let z = to_output([0.0, 0.0, 1.0]);
        // det = x . (y x z) = +1
        assert!((dot(x, cross(y, z)) - 1.0).abs() < f32::EPSILON);
        assert_eq!(z, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_front_normals_match_face_direction() {
        for front_face in [FrontFace::Clockwise, FrontFace::CounterClockwise] {
            for axis in 0..3 {
                for direction in FaceDirection::ALL {
                    let quad = Quad::new(axis, direction, 1, [0, 0], [1, 1], vec![Rgba::SENTINEL]);
                    let p = corners(&quad);
                    let expected = to_output(quad.normal());
                    let indices = quad_indices(direction, front_face);
                    for tri in indices.chunks(3) {
                        let n = triangle_normal(
                            p[tri[0] as usize],
                            p[tri[1] as usize],
                            p[tri[2] as usize],
                            front_face,
                        );
                        assert!(dot(n, expected) > 0.0, "{front_face:?} axis {axis} {direction:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_clockwise_is_default() {
        assert_eq!(FrontFace::default(), FrontFace::Clockwise);
        assert_eq!(
            quad_indices(FaceDirection::Positive, FrontFace::Clockwise),
            [0, 2, 1, 1, 2, 3]
        );
        assert_eq!(
            quad_indices(FaceDirection::Negative, FrontFace::Clockwise),
            [0, 1, 2, 1, 3, 2]
        );
    }
}
