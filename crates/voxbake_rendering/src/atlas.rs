//! Texture atlas packing.
//!
//! ## Skyline Bottom-Left
//!
//! ```text
//!  y=0 ┌──────┬────┬─────────────┐   row 0 is the top of the image
//!      │  A   │ B  │             │
//!      │      ├────┘  skyline    │   each block rests on the lowest
//!      ├──────┘        ▼         │   stretch of skyline it fits on,
//!      │ ─────────────────────── │   leftmost on ties
//!      └─────────────────────────┘
//! ```
//!
//! Blocks are inserted tallest first. The atlas starts square, doubles
//! its shorter side until everything fits, then trims its height to the
//! smallest power of two that holds the used rows.

use thiserror::Error;
use tracing::{debug, trace};
use voxbake_core::Rgba;

/// Packing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// The blocks need a bigger atlas than allowed.
    #[error("atlas of {needed_width}x{needed_height} needed, maximum is {max}")]
    AtlasOverflow {
        /// Width that would have been tried next.
        needed_width: u32,
        /// Height that would have been tried next.
        needed_height: u32,
        /// Configured maximum side.
        max: u32,
    },

    /// A block has no area.
    #[error("block {index} has zero width or height")]
    EmptyBlock {
        /// Position of the block in the input.
        index: usize,
    },
}

/// Result type for packing.
pub type PackResult<T> = Result<T, PackError>;

/// Normalized atlas rectangle, `v = 0` at the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    /// Top-left corner.
    pub min: [f32; 2],
    /// Bottom-right corner.
    pub max: [f32; 2],
}

impl UvRect {
    /// UVs for quad corners origin, `+U`, `+V`, `+U+V`.
    #[must_use]
    pub const fn corners(&self) -> [[f32; 2]; 4] {
        [
            self.min,
            [self.max[0], self.min[1]],
            [self.min[0], self.max[1]],
            self.max,
        ]
    }

    /// Width times height in UV units.
    #[must_use]
    pub fn area(&self) -> f32 {
        (self.max[0] - self.min[0]) * (self.max[1] - self.min[1])
    }
}

/// Packed RGBA image, row 0 on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major pixels.
    pub pixels: Vec<Rgba>,
}

impl AtlasImage {
    /// Creates a transparent image.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width as usize * height as usize],
        }
    }

    /// Pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// Copies a `width x height` row-major block to `(x, y)`.
    pub fn blit(&mut self, x: u32, y: u32, width: u32, pixels: &[Rgba]) {
        if width == 0 {
            return;
        }
        for (row, src) in pixels.chunks(width as usize).enumerate() {
            let start = ((y + row as u32) * self.width + x) as usize;
            self.pixels[start..start + src.len()].copy_from_slice(src);
        }
    }

    /// Raw RGBA8 bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Horizontal run of the skyline: `[x, x + width)` is filled down to `y`.
#[derive(Debug, Clone, Copy)]
struct Segment {
    x: u32,
    y: u32,
    width: u32,
}

/// Skyline bin for one candidate atlas size.
#[derive(Debug)]
struct Skyline {
    width: u32,
    height: u32,
    segments: Vec<Segment>,
    used_height: u32,
}

impl Skyline {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            segments: vec![Segment { x: 0, y: 0, width }],
            used_height: 0,
        }
    }

    /// Lowest `y` a block could rest at when its left edge sits on
    /// segment `index`.
    fn fit(&self, index: usize, width: u32, height: u32) -> Option<u32> {
        let x = self.segments[index].x;
        if x + width > self.width {
            return None;
        }
        let mut y = 0;
        let mut remaining = width;
        let mut i = index;
        while remaining > 0 {
            let segment = self.segments.get(i)?;
            y = y.max(segment.y);
            if y + height > self.height {
                return None;
            }
            remaining = remaining.saturating_sub(segment.width);
            i += 1;
        }
        Some(y)
    }

    fn insert(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        let mut best: Option<(usize, u32, u32)> = None;
        for index in 0..self.segments.len() {
            let Some(y) = self.fit(index, width, height) else {
                continue;
            };
            let x = self.segments[index].x;
            if best.map_or(true, |(_, by, bx)| (y, x) < (by, bx)) {
                best = Some((index, y, x));
            }
        }
        let (index, y, x) = best?;
        self.raise(index, x, y + height, width);
        self.used_height = self.used_height.max(y + height);
        Some((x, y))
    }

    fn raise(&mut self, index: usize, x: u32, y: u32, width: u32) {
        self.segments.insert(index, Segment { x, y, width });
        let right = x + width;

        let i = index + 1;
        while i < self.segments.len() {
            let segment = self.segments[i];
            if segment.x >= right {
                break;
            }
            let overlap = right - segment.x;
            if segment.width <= overlap {
                self.segments.remove(i);
            } else {
                self.segments[i].x += overlap;
                self.segments[i].width -= overlap;
                break;
            }
        }

        let mut i = 0;
        while i + 1 < self.segments.len() {
            if self.segments[i].y == self.segments[i + 1].y {
                self.segments[i].width += self.segments[i + 1].width;
                self.segments.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }
}

/// Outcome of [`pack_blocks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    /// Atlas width.
    pub width: u32,
    /// Atlas height after trimming.
    pub height: u32,
    /// Top-left pixel of each block, in input order.
    pub placements: Vec<(u32, u32)>,
}

/// Places `(width, height)` blocks into the smallest atlas the growth
/// rule reaches.
///
/// # Errors
///
/// `EmptyBlock` for a zero-sized block, `AtlasOverflow` when the blocks do
/// not fit in `max_size x max_size`.
pub fn pack_blocks(blocks: &[(u32, u32)], base_size: u32, max_size: u32) -> PackResult<BlockLayout> {
    if let Some(index) = blocks.iter().position(|&(w, h)| w == 0 || h == 0) {
        return Err(PackError::EmptyBlock { index });
    }
    if blocks.is_empty() {
        return Ok(BlockLayout {
            width: 1,
            height: 1,
            placements: Vec::new(),
        });
    }

    let largest = blocks.iter().map(|&(w, h)| w.max(h)).max().unwrap_or(1);
    let start = base_size.max(largest).max(1).next_power_of_two();
    if start > max_size {
        return Err(PackError::AtlasOverflow {
            needed_width: start,
            needed_height: start,
            max: max_size,
        });
    }

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|&a, &b| {
        let (aw, ah) = blocks[a];
        let (bw, bh) = blocks[b];
        bh.cmp(&ah).then(bw.cmp(&aw))
    });
    let area: u64 = blocks.iter().map(|&(w, h)| u64::from(w) * u64::from(h)).sum();

    let (mut width, mut height) = (start, start);
    loop {
        // No point trying sizes smaller than the total block area.
        if u64::from(width) * u64::from(height) >= area {
            if let Some((placements, used_height)) = try_pack(blocks, &order, width, height) {
                let trimmed = used_height.max(1).next_power_of_two().min(height);
                debug!(
                    blocks = blocks.len(),
                    width,
                    height = trimmed,
                    "packed atlas"
                );
                return Ok(BlockLayout {
                    width,
                    height: trimmed,
                    placements,
                });
            }
        }

        let (next_width, next_height) = if width <= height {
            (width * 2, height)
        } else {
            (width, height * 2)
        };
        if next_width > max_size || next_height > max_size {
            return Err(PackError::AtlasOverflow {
                needed_width: next_width,
                needed_height: next_height,
                max: max_size,
            });
        }
        trace!(width = next_width, height = next_height, "growing atlas");
        width = next_width;
        height = next_height;
    }
}

fn try_pack(blocks: &[(u32, u32)], order: &[usize], width: u32, height: u32) -> Option<(Vec<(u32, u32)>, u32)> {
    let mut skyline = Skyline::new(width, height);
    let mut placements = vec![(0, 0); blocks.len()];
    for &index in order {
        let (w, h) = blocks[index];
        placements[index] = skyline.insert(w, h)?;
    }
    Some((placements, skyline.used_height))
}

/// Converts a pixel rectangle into normalized UVs.
#[must_use]
pub fn uv_rect(x: u32, y: u32, width: u32, height: u32, atlas: &AtlasImage) -> UvRect {
    let (aw, ah) = (atlas.width as f32, atlas.height as f32);
    UvRect {
        min: [x as f32 / aw, y as f32 / ah],
        max: [(x + width) as f32 / aw, (y + height) as f32 / ah],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> bool {
        a.0 < b.0 + b.2 && b.0 < a.0 + a.2 && a.1 < b.1 + b.3 && b.1 < a.1 + a.3
    }

    #[test]
    fn test_blocks_never_overlap() {
        let blocks: Vec<(u32, u32)> = (1..40).map(|i| (1 + i % 7, 1 + (i * 3) % 11)).collect();
        let layout = pack_blocks(&blocks, 16, 256).unwrap();
        let rects: Vec<_> = layout
            .placements
            .iter()
            .zip(&blocks)
            .map(|(&(x, y), &(w, h))| (x, y, w, h))
            .collect();
        for (i, a) in rects.iter().enumerate() {
            assert!(a.0 + a.2 <= layout.width && a.1 + a.3 <= layout.height);
            for b in &rects[i + 1..] {
                assert!(!overlaps(*a, *b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_height_is_trimmed() {
        let layout = pack_blocks(&[(4, 3), (4, 3)], 16, 64).unwrap();
        assert_eq!(layout.width, 16);
        assert_eq!(layout.height, 4);
        assert_eq!(layout.placements, vec![(0, 0), (4, 0)]);
    }

    #[test]
    fn test_grows_shorter_side_first() {
        // 3 blocks of 8x8 overflow a 8x8 start.
        let layout = pack_blocks(&[(8, 8), (8, 8), (8, 8)], 8, 64).unwrap();
        assert_eq!(layout.width, 16);
        assert_eq!(layout.height, 16);
    }

    #[test]
    fn test_base_size_grows_to_largest_block() {
        let layout = pack_blocks(&[(20, 2)], 8, 64).unwrap();
        assert_eq!(layout.width, 32);
        assert_eq!(layout.height, 2);
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = pack_blocks(&[(16, 16); 5], 16, 32).unwrap_err();
        assert!(matches!(err, PackError::AtlasOverflow { max: 32, .. }));
        let err = pack_blocks(&[(65, 1)], 16, 64).unwrap_err();
        assert!(matches!(err, PackError::AtlasOverflow { needed_width: 128, .. }));
    }

    #[test]
    fn test_empty_block_is_rejected() {
        assert_eq!(
            pack_blocks(&[(1, 1), (0, 3)], 16, 64),
            Err(PackError::EmptyBlock { index: 1 })
        );
    }

    #[test]
    fn test_blit_and_uvs() {
        let mut atlas = AtlasImage::new(4, 2);
        let red = Rgba::new(255, 0, 0, 255);
        atlas.blit(2, 0, 2, &[red, red, red, red]);
        assert_eq!(atlas.pixel(3, 1), Some(red));
        assert_eq!(atlas.pixel(1, 1), Some(Rgba::TRANSPARENT));
        let uv = uv_rect(2, 0, 2, 2, &atlas);
        assert_eq!(uv.min, [0.5, 0.0]);
        assert_eq!(uv.max, [1.0, 1.0]);
        assert_eq!(uv.corners()[1], [1.0, 0.0]);
        assert_eq!(atlas.as_bytes().len(), 32);
    }
}
