//! 256-entry palettes with per-entry material metadata.
//!
//! Entries are addressed directly by voxel color index. Index 0 is the
//! reserved "air" slot and is never sampled as a real color.

use std::collections::BTreeMap;

use crate::color::Rgba;

/// Number of entries in every palette.
pub const PALETTE_SIZE: usize = 256;

/// MagicaVoxel default palette, packed little-endian RGBA, indexed by color index.
#[allow(clippy::unreadable_literal)]
pub static DEFAULT_PALETTE: [u32; PALETTE_SIZE] = [
    0x00000000, 0xffffffff, 0xffccffff, 0xff99ffff, 0xff66ffff, 0xff33ffff, 0xff00ffff, 0xffffccff,
    0xffccccff, 0xff99ccff, 0xff66ccff, 0xff33ccff, 0xff00ccff, 0xffff99ff, 0xffcc99ff, 0xff9999ff,
    0xff6699ff, 0xff3399ff, 0xff0099ff, 0xffff66ff, 0xffcc66ff, 0xff9966ff, 0xff6666ff, 0xff3366ff,
    0xff0066ff, 0xffff33ff, 0xffcc33ff, 0xff9933ff, 0xff6633ff, 0xff3333ff, 0xff0033ff, 0xffff00ff,
    0xffcc00ff, 0xff9900ff, 0xff6600ff, 0xff3300ff, 0xff0000ff, 0xffffffcc, 0xffccffcc, 0xff99ffcc,
    0xff66ffcc, 0xff33ffcc, 0xff00ffcc, 0xffffcccc, 0xffcccccc, 0xff99cccc, 0xff66cccc, 0xff33cccc,
    0xff00cccc, 0xffff99cc, 0xffcc99cc, 0xff9999cc, 0xff6699cc, 0xff3399cc, 0xff0099cc, 0xffff66cc,
    0xffcc66cc, 0xff9966cc, 0xff6666cc, 0xff3366cc, 0xff0066cc, 0xffff33cc, 0xffcc33cc, 0xff9933cc,
    0xff6633cc, 0xff3333cc, 0xff0033cc, 0xffff00cc, 0xffcc00cc, 0xff9900cc, 0xff6600cc, 0xff3300cc,
    0xff0000cc, 0xffffff99, 0xffccff99, 0xff99ff99, 0xff66ff99, 0xff33ff99, 0xff00ff99, 0xffffcc99,
    0xffcccc99, 0xff99cc99, 0xff66cc99, 0xff33cc99, 0xff00cc99, 0xffff9999, 0xffcc9999, 0xff999999,
    0xff669999, 0xff339999, 0xff009999, 0xffff6699, 0xffcc6699, 0xff996699, 0xff666699, 0xff336699,
    0xff006699, 0xffff3399, 0xffcc3399, 0xff993399, 0xff663399, 0xff333399, 0xff003399, 0xffff0099,
    0xffcc0099, 0xff990099, 0xff660099, 0xff330099, 0xff000099, 0xffffff66, 0xffccff66, 0xff99ff66,
    0xff66ff66, 0xff33ff66, 0xff00ff66, 0xffffcc66, 0xffcccc66, 0xff99cc66, 0xff66cc66, 0xff33cc66,
    0xff00cc66, 0xffff9966, 0xffcc9966, 0xff999966, 0xff669966, 0xff339966, 0xff009966, 0xffff6666,
    0xffcc6666, 0xff996666, 0xff666666, 0xff336666, 0xff006666, 0xffff3366, 0xffcc3366, 0xff993366,
    0xff663366, 0xff333366, 0xff003366, 0xffff0066, 0xffcc0066, 0xff990066, 0xff660066, 0xff330066,
    0xff000066, 0xffffff33, 0xffccff33, 0xff99ff33, 0xff66ff33, 0xff33ff33, 0xff00ff33, 0xffffcc33,
    0xffcccc33, 0xff99cc33, 0xff66cc33, 0xff33cc33, 0xff00cc33, 0xffff9933, 0xffcc9933, 0xff999933,
    0xff669933, 0xff339933, 0xff009933, 0xffff6633, 0xffcc6633, 0xff996633, 0xff666633, 0xff336633,
    0xff006633, 0xffff3333, 0xffcc3333, 0xff993333, 0xff663333, 0xff333333, 0xff003333, 0xffff0033,
    0xffcc0033, 0xff990033, 0xff660033, 0xff330033, 0xff000033, 0xffffff00, 0xffccff00, 0xff99ff00,
    0xff66ff00, 0xff33ff00, 0xff00ff00, 0xffffcc00, 0xffcccc00, 0xff99cc00, 0xff66cc00, 0xff33cc00,
    0xff00cc00, 0xffff9900, 0xffcc9900, 0xff999900, 0xff669900, 0xff339900, 0xff009900, 0xffff6600,
    0xffcc6600, 0xff996600, 0xff666600, 0xff336600, 0xff006600, 0xffff3300, 0xffcc3300, 0xff993300,
    0xff663300, 0xff333300, 0xff003300, 0xffff0000, 0xffcc0000, 0xff990000, 0xff660000, 0xff330000,
    0xff0000ee, 0xff0000dd, 0xff0000bb, 0xff0000aa, 0xff000088, 0xff000077, 0xff000055, 0xff000044,
    0xff000022, 0xff000011, 0xff00ee00, 0xff00dd00, 0xff00bb00, 0xff00aa00, 0xff008800, 0xff007700,
    0xff005500, 0xff004400, 0xff002200, 0xff001100, 0xffee0000, 0xffdd0000, 0xffbb0000, 0xffaa0000,
    0xff880000, 0xff770000, 0xff550000, 0xff440000, 0xff220000, 0xff110000, 0xffeeeeee, 0xffdddddd,
    0xffbbbbbb, 0xffaaaaaa, 0xff888888, 0xff777777, 0xff555555, 0xff444444, 0xff222222, 0xff111111,
];

/// Surface material kind attached to a palette entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MaterialType {
    /// No material information.
    #[default]
    None,
    /// Plain diffuse surface.
    Diffuse,
    /// Metallic surface.
    Metal,
    /// Transparent glass.
    Glass,
    /// Light-emitting surface.
    Emit,
    /// Blended transparency.
    Blend,
    /// Participating media.
    Media,
    /// Cloud volume.
    Cloud,
    /// Tag the decoder did not recognize.
    Other(i32),
}

impl MaterialType {
    /// Maps a vengi material type id.
    #[must_use]
    pub const fn from_vengi_id(id: i32) -> Self {
        match id {
            0 => Self::None,
            1 => Self::Diffuse,
            2 => Self::Metal,
            3 => Self::Glass,
            other => Self::Other(other),
        }
    }

    /// Maps a MagicaVoxel `_type` attribute value.
    #[must_use]
    pub fn from_vox_tag(tag: &str) -> Self {
        match tag {
            "_diffuse" => Self::Diffuse,
            "_metal" => Self::Metal,
            "_glass" => Self::Glass,
            "_emit" => Self::Emit,
            "_blend" => Self::Blend,
            "_media" => Self::Media,
            "_cloud" => Self::Cloud,
            _ => Self::Other(-1),
        }
    }
}

/// One palette slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaletteEntry {
    /// Display color.
    pub color: Rgba,
    /// Optional color name.
    pub name: Option<String>,
    /// Material kind.
    pub material: MaterialType,
    /// Free-form numeric material properties (roughness, ior, ...).
    pub properties: BTreeMap<String, f32>,
}

impl PaletteEntry {
    /// Creates an entry holding only a color.
    #[inline]
    #[must_use]
    pub fn from_color(color: Rgba) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }
}

/// Fixed-size color table.
///
/// Always exactly [`PALETTE_SIZE`] entries; slots a file does not declare
/// stay zero-filled (alpha 0).
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    /// Creates an all-zero palette.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![PaletteEntry::default(); PALETTE_SIZE],
        }
    }

    /// Creates the built-in default palette.
    #[must_use]
    pub fn builtin_default() -> Self {
        Self::from_colors(DEFAULT_PALETTE.iter().map(|&packed| Rgba::from_packed(packed)))
    }

    /// Builds a palette from up to 256 colors starting at index 0.
    ///
    /// Missing entries stay zero; extra entries are ignored.
    #[must_use]
    pub fn from_colors<I: IntoIterator<Item = Rgba>>(colors: I) -> Self {
        let mut palette = Self::new();
        for (entry, color) in palette.entries.iter_mut().zip(colors) {
            entry.color = color;
        }
        palette
    }

    /// Always 256.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true; present for API symmetry with `len`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a color index.
    #[inline]
    #[must_use]
    pub fn entry(&self, index: u8) -> &PaletteEntry {
        &self.entries[usize::from(index)]
    }

    /// Mutable entry at a color index.
    #[inline]
    pub fn entry_mut(&mut self, index: u8) -> &mut PaletteEntry {
        &mut self.entries[usize::from(index)]
    }

    /// Raw color at a color index, including the air slot.
    #[inline]
    #[must_use]
    pub fn color(&self, index: u8) -> Rgba {
        self.entries[usize::from(index)].color
    }

    /// Overwrites the color at a color index.
    #[inline]
    pub fn set_color(&mut self, index: u8, color: Rgba) {
        self.entries[usize::from(index)].color = color;
    }

    /// Color for a voxel's color index as it should appear in a texture.
    ///
    /// Index 0 is air and has no color; it resolves to [`Rgba::SENTINEL`]
    /// like any other index the palette cannot serve.
    #[inline]
    #[must_use]
    pub fn sample(&self, index: usize) -> Rgba {
        match self.entries.get(index) {
            Some(entry) if index != 0 => entry.color,
            _ => Rgba::SENTINEL,
        }
    }

    /// Iterates entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = &PaletteEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette() {
        let palette = Palette::builtin_default();
        assert_eq!(palette.len(), PALETTE_SIZE);
        // Index 0 should be transparent
        assert_eq!(palette.color(0), Rgba::TRANSPARENT);
        // Index 1 should be white
        assert_eq!(palette.color(1), Rgba::new(255, 255, 255, 255));
        assert!(palette.iter().skip(1).all(|e| e.color.a == 255));
    }

    #[test]
    fn test_short_color_list_is_zero_filled() {
        let palette = Palette::from_colors([Rgba::TRANSPARENT, Rgba::new(9, 8, 7, 255)]);
        assert_eq!(palette.len(), PALETTE_SIZE);
        assert_eq!(palette.color(1), Rgba::new(9, 8, 7, 255));
        assert!(palette.color(2).is_zero());
        assert!(palette.color(255).is_zero());
    }

    #[test]
    fn test_sample_never_returns_air() {
        let palette = Palette::builtin_default();
        assert_eq!(palette.sample(0), Rgba::SENTINEL);
        assert_eq!(palette.sample(256), Rgba::SENTINEL);
        assert_eq!(palette.sample(1), palette.color(1));
    }

    #[test]
    fn test_material_tags() {
        assert_eq!(MaterialType::from_vox_tag("_metal"), MaterialType::Metal);
        assert_eq!(MaterialType::from_vox_tag("_unknown"), MaterialType::Other(-1));
        assert_eq!(MaterialType::from_vengi_id(3), MaterialType::Glass);
        assert_eq!(MaterialType::from_vengi_id(9), MaterialType::Other(9));
    }
}
