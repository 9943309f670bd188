//! 8-bit RGBA color.

use bytemuck::{Pod, Zeroable};

/// Color entry with 8 bits per channel.
///
/// Layout matches the byte order used by every supported container and by
/// the atlas image, so slices of `Rgba` cast straight to `&[u8]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgba {
    /// Red component (0-255).
    pub r: u8,
    /// Green component (0-255).
    pub g: u8,
    /// Blue component (0-255).
    pub b: u8,
    /// Alpha component (0-255).
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black. Palette index 0 holds this.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Opaque magenta, painted wherever a color index cannot be resolved.
    pub const SENTINEL: Self = Self::new(255, 0, 255, 255);

    /// Creates a color from its channels.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates from packed little-endian RGBA (`r` in the low byte).
    #[inline]
    #[must_use]
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            r: (packed & 0xFF) as u8,
            g: ((packed >> 8) & 0xFF) as u8,
            b: ((packed >> 16) & 0xFF) as u8,
            a: ((packed >> 24) & 0xFF) as u8,
        }
    }

    /// Packs back into little-endian RGBA.
    #[inline]
    #[must_use]
    pub const fn to_packed(self) -> u32 {
        (self.r as u32) | ((self.g as u32) << 8) | ((self.b as u32) << 16) | ((self.a as u32) << 24)
    }

    /// Returns the same color with a different alpha.
    #[inline]
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// True when every channel is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.to_packed() == 0
    }

    /// Returns as normalized float array [r, g, b, a].
    #[inline]
    #[must_use]
    pub fn as_float(self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_round_trip() {
        let color = Rgba::from_packed(0xFF11_2233);
        assert_eq!(color, Rgba::new(0x33, 0x22, 0x11, 0xFF));
        assert_eq!(color.to_packed(), 0xFF11_2233);
    }

    #[test]
    fn test_byte_layout() {
        let colors = [Rgba::new(1, 2, 3, 4), Rgba::new(5, 6, 7, 8)];
        let bytes: &[u8] = bytemuck::cast_slice(&colors);
        assert_eq!(bytes, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_zero() {
        assert!(Rgba::TRANSPARENT.is_zero());
        assert!(!Rgba::SENTINEL.is_zero());
        assert!(!Rgba::new(0, 0, 0, 1).is_zero());
    }
}
