//! Qubicle `.qb` Decoder
//!
//! ```text
//! Header (6 x u32):
//!   version (1.1.0.0) | color format | z-axis orientation |
//!   compressed | visibility mask encoded | matrix count
//! Matrix:
//!   name (u8 len) | size (3 x u32) | position (3 x i32) | cells
//! Cells:
//!   raw:        u32 per cell, z / y / x order
//!   compressed: per z slice, CODEFLAG count color | color ... | NEXTSLICEFLAG
//! ```
//!
//! Qubicle files carry colors, not indices. A palette is built on the fly
//! from the distinct colors in the file.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use voxbake_core::{ContainerFormat, Palette, Rgba, VoxelModel, VoxelScene, MAX_MODEL_EXTENT};

use crate::axes::{GridOrientation, YUpGrid};
use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;

/// The only version ever written: 1.1.0.0.
pub const QB_VERSION: [u8; 4] = [1, 1, 0, 0];

/// Run-length marker: a count and a color follow.
const CODEFLAG: u32 = 2;

/// Run-length marker: the current z slice is complete.
const NEXTSLICEFLAG: u32 = 6;

/// Channel order of packed cell colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelOrder {
    Rgba,
    Bgra,
}

impl ChannelOrder {
    pub(crate) fn unpack(self, raw: u32) -> Rgba {
        let [c0, c1, c2, a] = raw.to_le_bytes();
        match self {
            Self::Rgba => Rgba::new(c0, c1, c2, a),
            Self::Bgra => Rgba::new(c2, c1, c0, a),
        }
    }
}

/// Running color -> index map shared by every matrix of a file.
///
/// The first 255 distinct colors get indices 1..=255; later colors alias
/// to index 1.
#[derive(Debug)]
pub(crate) struct ColorMap {
    indices: HashMap<Rgba, u8>,
    palette: Palette,
    next: u16,
    overflowed: usize,
}

impl ColorMap {
    pub(crate) fn new() -> Self {
        Self {
            indices: HashMap::new(),
            palette: Palette::new(),
            next: 1,
            overflowed: 0,
        }
    }

    pub(crate) fn index_of(&mut self, color: Rgba) -> u8 {
        if let Some(&index) = self.indices.get(&color) {
            return index;
        }
        match u8::try_from(self.next) {
            Ok(index) => {
                self.palette.set_color(index, color);
                self.indices.insert(color, index);
                self.next += 1;
                index
            }
            Err(_) => {
                self.overflowed += 1;
                1
            }
        }
    }

    pub(crate) fn into_palette(self) -> Palette {
        if self.overflowed > 0 {
            warn!(
                extra_colors = self.overflowed,
                "more than 255 distinct colors, extras mapped to index 1"
            );
        }
        self.palette
    }
}

/// Per-file settings from the header.
#[derive(Debug, Clone, Copy)]
struct Header {
    channels: ChannelOrder,
    orientation: GridOrientation,
    compressed: bool,
    visibility_mask: bool,
    matrix_count: u32,
}

/// Decodes a `.qb` file.
///
/// # Errors
///
/// Returns `InvalidHeader` when the version prefix is wrong and
/// `TruncatedStream` for any damage after it; partial files are rejected.
pub fn decode(bytes: &[u8]) -> DecodeResult<VoxelScene> {
    let mut reader = ByteReader::new(bytes);
    let version = reader.peek(4).unwrap_or(bytes);
    if version != QB_VERSION {
        return Err(DecodeError::invalid_header(ContainerFormat::Qubicle, "1.1.0.0", version));
    }
    reader.skip(4)?;

    let header = Header {
        channels: if reader.read_u32()? == 1 {
            ChannelOrder::Bgra
        } else {
            ChannelOrder::Rgba
        },
        orientation: if reader.read_u32()? == 1 {
            GridOrientation::RightHanded
        } else {
            GridOrientation::LeftHanded
        },
        compressed: reader.read_u32()? != 0,
        visibility_mask: reader.read_u32()? != 0,
        matrix_count: reader.read_u32()?,
    };

    let mut colors = ColorMap::new();
    let mut models = Vec::new();
    for _ in 0..header.matrix_count {
        models.push(read_matrix(&mut reader, &header, &mut colors)?);
    }

    let scene = VoxelScene {
        format: ContainerFormat::Qubicle,
        version: u32::from_le_bytes(QB_VERSION),
        models,
        palette: colors.into_palette(),
    };
    info!(
        models = scene.models.len(),
        voxels = scene.voxel_count(),
        "decoded Qubicle scene"
    );
    Ok(scene)
}

fn read_matrix(
    reader: &mut ByteReader<'_>,
    header: &Header,
    colors: &mut ColorMap,
) -> DecodeResult<VoxelModel> {
    let name_len = reader.read_u8()?;
    let name = reader.read_string(usize::from(name_len))?;
    let size = [reader.read_u32()?, reader.read_u32()?, reader.read_u32()?];
    let position = [reader.read_i32()?, reader.read_i32()?, reader.read_i32()?];

    let grid = YUpGrid {
        size,
        position,
        orientation: header.orientation,
    };
    let mut model = VoxelModel::new(grid.canonical_size());
    model.position = grid.canonical_position();
    model.name = (!name.is_empty()).then_some(name);

    let mut dropped = 0u64;
    let mut place = |cell: [u32; 3], raw: u32, model: &mut VoxelModel| {
        let mut color = header.channels.unpack(raw);
        if color.a == 0 {
            return;
        }
        if header.visibility_mask {
            color = color.with_alpha(u8::MAX);
        }
        // Dropped cells must not claim a palette slot.
        match grid.canonical_voxel(cell, 0) {
            Some(mut voxel) => {
                voxel.color_index = colors.index_of(color);
                model.voxels.push(voxel);
            }
            None => dropped += 1,
        }
    };

    if header.compressed {
        let row_len = u64::from(size[0]);
        let slice_len = row_len * u64::from(size[1]);
        let addressable = u64::from(MAX_MODEL_EXTENT);
        let mut overflow = 0u64;
        let mut skipped = 0u64;
        for z in 0..size[2] {
            let in_range = grid.canonical_depth(z).is_some();
            let mut index = 0u64;
            loop {
                let data = reader.read_u32()?;
                if data == NEXTSLICEFLAG {
                    break;
                }
                let (count, raw) = if data == CODEFLAG {
                    (u64::from(reader.read_u32()?), reader.read_u32()?)
                } else {
                    (1, data)
                };
                let fits = count.min(slice_len.saturating_sub(index));
                overflow += count - fits;
                let end = index + fits;

                // Only the first 256 columns of the first 256 rows can hold
                // a voxel; the rest of the run is skipped without a visit.
                let mut visited = 0u64;
                let mut i = index;
                while in_range && i < end {
                    let y = i / row_len;
                    if y >= addressable {
                        break;
                    }
                    let row_end = ((y + 1) * row_len).min(end);
                    let first = i - y * row_len;
                    let last = (row_end - y * row_len).min(addressable);
                    for x in first..last {
                        place([x as u32, y as u32, z], raw, &mut model);
                    }
                    visited += last.saturating_sub(first);
                    i = row_end;
                }
                skipped += fits - visited;
                index = end;
            }
        }
        if overflow > 0 {
            warn!(cells = overflow, matrix = ?model.name, "run-length data overflowed its slice");
        }
        if skipped > 0 {
            debug!(cells = skipped, matrix = ?model.name, "run-length cells beyond coordinate range skipped");
        }
    } else {
        let cells = u64::from(size[0])
            .saturating_mul(u64::from(size[1]))
            .saturating_mul(u64::from(size[2]));
        if cells.saturating_mul(4) > reader.remaining() as u64 {
            return Err(DecodeError::TruncatedStream {
                needed: usize::try_from(cells.saturating_mul(4)).unwrap_or(usize::MAX),
                remaining: reader.remaining(),
                offset: reader.offset(),
            });
        }
        for z in 0..size[2] {
            for y in 0..size[1] {
                for x in 0..size[0] {
                    place([x, y, z], reader.read_u32()?, &mut model);
                }
            }
        }
    }

    if dropped > 0 {
        warn!(count = dropped, "Qubicle voxels beyond coordinate range dropped");
    }
    Ok(model)
}
