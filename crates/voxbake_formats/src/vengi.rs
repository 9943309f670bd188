//! vengi `.vengi` Decoder
//!
//! ```text
//! "VENG" | zlib header (2) | raw deflate stream:
//!     version (u32)
//!     NODE ... | PALC ...            top-level chunks until EOF
//!
//! NODE: name, type, [uuid], [id, ref], visible, locked, color, [position]
//!     DATA | NODE | PALC | PROP | PALI | ANIM | IKCO | PALN ... ENDN
//! ```
//!
//! vengi is Y-up. Grids are rotated into the canonical Z-up frame with
//! `(x, y, z) -> (x, -z, y)`.
//!
//! The format is decoded best effort: once the header is valid, whatever
//! was decoded before a structural error is returned.

use std::io::Read;

use flate2::read::DeflateDecoder;
use tracing::{debug, info, trace, warn};
use voxbake_core::{ContainerFormat, MaterialType, Palette, VoxelModel, VoxelScene};

use crate::axes::{GridOrientation, YUpGrid};
use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;

/// vengi file magic number.
pub const VENGI_MAGIC: [u8; 4] = *b"VENG";

/// Length of the zlib header between the magic and the deflate stream.
const ZLIB_HEADER_LEN: usize = 2;

/// Decodes a `.vengi` file.
///
/// # Errors
///
/// Returns `InvalidHeader` when the magic is wrong and
/// `DecompressionFailure` when nothing at all can be inflated. Structural
/// damage after that point yields the partial scene instead of an error.
pub fn decode(bytes: &[u8]) -> DecodeResult<VoxelScene> {
    let magic = bytes.get(..4).unwrap_or(bytes);
    if magic != VENGI_MAGIC {
        return Err(DecodeError::invalid_header(ContainerFormat::Vengi, "VENG", magic));
    }
    let payload = bytes.get(4 + ZLIB_HEADER_LEN..).unwrap_or_default();
    let data = inflate(payload)?;

    let mut reader = ByteReader::new(&data);
    let version = match reader.read_u32() {
        Ok(version) => version,
        Err(err) => {
            warn!(%err, "vengi stream has no version, returning empty scene");
            return Ok(VoxelScene::new(ContainerFormat::Vengi, 0));
        }
    };

    let mut context = DecodeContext::new(version);
    if let Err(err) = context.read_top_level(&mut reader) {
        warn!(
            %err,
            models = context.scene.models.len(),
            "vengi stream stopped early, keeping partial scene"
        );
    }

    info!(
        version,
        models = context.scene.models.len(),
        voxels = context.scene.voxel_count(),
        "decoded vengi scene"
    );
    Ok(context.scene)
}

/// Inflates the raw deflate payload.
///
/// Bytes recovered before a mid-stream failure are kept.
fn inflate(payload: &[u8]) -> DecodeResult<Vec<u8>> {
    let mut data = Vec::new();
    match DeflateDecoder::new(payload).read_to_end(&mut data) {
        Ok(_) => Ok(data),
        Err(err) if data.is_empty() => Err(DecodeError::DecompressionFailure(err)),
        Err(err) => {
            warn!(%err, recovered = data.len(), "vengi payload truncated, decoding what inflated");
            Ok(data)
        }
    }
}

/// Per-decode state threaded through the node recursion.
struct DecodeContext {
    version: u32,
    scene: VoxelScene,
    /// One-shot palette from a node-level `PALC`, consumed by the next `DATA`.
    pending_palette: Option<Palette>,
}

impl DecodeContext {
    fn new(version: u32) -> Self {
        Self {
            version,
            scene: VoxelScene::new(ContainerFormat::Vengi, version),
            pending_palette: None,
        }
    }

    fn read_top_level(&mut self, reader: &mut ByteReader<'_>) -> DecodeResult<()> {
        while reader.remaining() >= 4 {
            let offset = reader.offset();
            let tag = reader.read_tag()?;
            match &tag {
                b"NODE" => self.read_node(reader, [0; 3])?,
                b"PALC" => self.scene.palette = read_palette(reader)?,
                _ => return Err(DecodeError::unresolved_chunk(tag, offset)),
            }
        }
        Ok(())
    }

    fn read_node(&mut self, reader: &mut ByteReader<'_>, parent_offset: [i32; 3]) -> DecodeResult<()> {
        let name = read_pascal_string(reader)?;
        let kind = read_pascal_string(reader)?;
        if self.version >= 6 {
            reader.skip(16)?; // uuid
        }
        if self.version >= 2 {
            let _file_node_id = reader.read_i32()?;
            let _reference_node_id = reader.read_i32()?;
        }
        let _visible = reader.read_bool()?;
        let _locked = reader.read_bool()?;
        let _color = reader.read_u32()?;

        let mut offset = parent_offset;
        if self.version >= 3 {
            for axis in &mut offset {
                *axis = axis.saturating_add(reader.read_f32()?.round() as i32);
            }
        }
        trace!(%name, %kind, ?offset, "vengi node");

        loop {
            let chunk_offset = reader.offset();
            let tag = reader.read_tag()?;
            match &tag {
                b"ENDN" => return Ok(()),
                b"NODE" => self.read_node(reader, offset)?,
                b"DATA" => self.read_data(reader, offset, &name)?,
                b"PALC" => self.pending_palette = Some(read_palette(reader)?),
                b"PROP" => read_properties(reader)?,
                b"PALI" => {
                    let identifier = read_pascal_string(reader)?;
                    trace!(%identifier, "vengi palette identifier");
                }
                b"ANIM" => self.skip_animation(reader)?,
                b"IKCO" => skip_ik_constraint(reader)?,
                b"PALN" => {
                    let count = reader.read_count_i32()?;
                    reader.skip(count.saturating_mul(4))?;
                }
                _ => {
                    warn!(
                        tag = %String::from_utf8_lossy(&tag),
                        node = %name,
                        "unknown vengi chunk, abandoning node"
                    );
                    return Err(DecodeError::unresolved_chunk(tag, chunk_offset));
                }
            }
        }
    }

    fn read_data(&mut self, reader: &mut ByteReader<'_>, offset: [i32; 3], name: &str) -> DecodeResult<()> {
        let palette = self.pending_palette.take();

        let mut min = [0i32; 3];
        let mut max = [0i32; 3];
        for axis in &mut min {
            *axis = reader.read_i32()?;
        }
        for axis in &mut max {
            *axis = reader.read_i32()?;
        }
        let extent = |a: usize| i64::from(max[a]) - i64::from(min[a]) + 1;
        if (0..3).any(|a| extent(a) <= 0 || extent(a) > i64::from(u32::MAX)) {
            debug!(?min, ?max, "empty vengi volume, ignoring");
            return Ok(());
        }
        let size = [extent(0) as u32, extent(1) as u32, extent(2) as u32];

        let grid = YUpGrid {
            size,
            position: [
                offset[0].saturating_add(min[0]),
                offset[1].saturating_add(min[1]),
                offset[2].saturating_add(min[2]),
            ],
            orientation: GridOrientation::RightHanded,
        };

        let mut model = VoxelModel::new(grid.canonical_size());
        model.position = grid.canonical_position();
        model.name = (!name.is_empty()).then(|| name.to_string());
        model.palette = palette;

        let mut saturated = 0usize;
        let mut dropped = 0usize;
        for x in 0..size[0] {
            for y in 0..size[1] {
                for z in 0..size[2] {
                    if reader.read_bool()? {
                        continue; // air
                    }
                    let color = reader.read_u8()?;
                    if self.version >= 4 {
                        let _normal = reader.read_u8()?;
                    }
                    let color_index = color.checked_add(1).unwrap_or_else(|| {
                        saturated += 1;
                        u8::MAX
                    });
                    match grid.canonical_voxel([x, y, z], color_index) {
                        Some(voxel) => model.voxels.push(voxel),
                        None => dropped += 1,
                    }
                }
            }
        }
        if saturated > 0 {
            warn!(count = saturated, "vengi color index 255 clamped");
        }
        if dropped > 0 {
            warn!(count = dropped, "vengi voxels beyond coordinate range dropped");
        }

        self.scene.models.push(model);
        Ok(())
    }

    fn skip_animation(&self, reader: &mut ByteReader<'_>) -> DecodeResult<()> {
        let _name = read_pascal_string(reader)?;
        loop {
            let offset = reader.offset();
            let tag = reader.read_tag()?;
            match &tag {
                b"ENDA" => return Ok(()),
                b"KEYF" => {
                    let _frame = reader.read_i32()?;
                    let _long_rotation = reader.read_bool()?;
                    let _interpolation = read_pascal_string(reader)?;
                    reader.skip(16 * 4)?; // local matrix
                    if self.version <= 2 {
                        reader.skip(3 * 4)?; // pivot
                    }
                }
                _ => return Err(DecodeError::unresolved_chunk(tag, offset)),
            }
        }
    }
}

/// Reads a `PALC` block.
///
/// Color `c` of the block lands on color index `c + 1`, matching the
/// `+1` applied to voxel color bytes.
fn read_palette(reader: &mut ByteReader<'_>) -> DecodeResult<Palette> {
    let _name = read_pascal_string(reader)?;
    let count = reader.read_count_i32()?;
    let mut palette = Palette::new();
    let slot = |i: usize| u8::try_from(i + 1).ok();

    for i in 0..count {
        let color = reader.read_rgba()?;
        if let Some(index) = slot(i) {
            palette.set_color(index, color);
        }
    }
    reader.skip(count.saturating_mul(4))?; // emit colors
    reader.skip(count)?; // sort indices
    for i in 0..count {
        let name = read_pascal_string(reader)?;
        if let Some(index) = slot(i).filter(|_| !name.is_empty()) {
            palette.entry_mut(index).name = Some(name);
        }
    }
    let _duplicated_count = reader.read_u32()?;
    for i in 0..count {
        let material = MaterialType::from_vengi_id(reader.read_i32()?);
        let properties = reader.read_u8()?;
        let mut entry = slot(i).map(|index| palette.entry_mut(index));
        if let Some(entry) = entry.as_mut() {
            entry.material = material;
        }
        for _ in 0..properties {
            let key = read_pascal_string(reader)?;
            let value = reader.read_f32()?;
            if let Some(entry) = entry.as_mut() {
                entry.properties.insert(key, value);
            }
        }
    }
    if count > 255 {
        warn!(count, "vengi palette larger than 255 colors, extra entries ignored");
    }
    Ok(palette)
}

fn read_properties(reader: &mut ByteReader<'_>) -> DecodeResult<()> {
    let count = reader.read_u32()?;
    for _ in 0..count {
        let key = read_pascal_string(reader)?;
        let value = read_pascal_string(reader)?;
        trace!(%key, %value, "vengi node property");
    }
    Ok(())
}

fn skip_ik_constraint(reader: &mut ByteReader<'_>) -> DecodeResult<()> {
    let _effector = reader.read_i32()?;
    let _roll_min = reader.read_f32()?;
    let _roll_max = reader.read_f32()?;
    let _visible = reader.read_bool()?;
    let _anchor = reader.read_bool()?;
    let swing_limits = reader.read_count_i32()?;
    reader.skip(swing_limits.saturating_mul(3 * 4))
}

fn read_pascal_string(reader: &mut ByteReader<'_>) -> DecodeResult<String> {
    let len = reader.read_u16()?;
    reader.read_string(usize::from(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{encode_vox, VengiBuilder};
    use voxbake_core::{Rgba, Voxel};

    fn single_voxel_file(version: u32) -> Vec<u8> {
        VengiBuilder::new(version)
            .begin_node("root", "Root", [0.0; 3])
            .begin_node("model", "Model", [0.0; 3])
            .data([0, 0, 0], [1, 2, 3], &[([1, 2, 3], 41)])
            .end_node()
            .end_node()
            .build()
    }

    #[test]
    fn test_single_voxel_rotates_into_z_up() {
        for version in [1, 3, 4, 6] {
            let scene = decode(&single_voxel_file(version)).unwrap();
            assert_eq!(scene.version, version);
            assert_eq!(scene.models.len(), 1, "version {version}");
            let model = &scene.models[0];
            // vengi size (2, 3, 4) -> canonical (2, 4, 3)
            assert_eq!(model.size, [2, 4, 3]);
            // vengi (1, 2, 3) -> canonical (1, 4 - 1 - 3, 2)
            assert_eq!(model.voxels, vec![Voxel::new(1, 0, 2, 42)]);
            assert_eq!(model.position, [0, -3, 0]);
            assert_eq!(model.name.as_deref(), Some("model"));
        }
    }

    #[test]
    fn test_round_trip_through_vox() {
        let scene = decode(&single_voxel_file(6)).unwrap();
        let again = crate::vox::decode(&encode_vox(&scene)).unwrap();
        assert_eq!(again.models[0].voxels, scene.models[0].voxels);
    }

    #[test]
    fn test_node_positions_accumulate() {
        let bytes = VengiBuilder::new(6)
            .begin_node("root", "Root", [10.0, 20.0, 30.0])
            .begin_node("child", "Model", [1.4, -2.6, 0.0])
            .data([5, 0, 0], [5, 0, 0], &[([5, 0, 0], 0)])
            .end_node()
            .end_node()
            .build();
        let scene = decode(&bytes).unwrap();
        // Offset (11, 17, 30) + min (5, 0, 0) -> vengi (16, 17, 30).
        assert_eq!(scene.models[0].position, [16, -30, 17]);
    }

    #[test]
    fn test_bad_magic_fails() {
        let mut bytes = single_voxel_file(6);
        bytes[3] = b'X';
        assert!(matches!(decode(&bytes), Err(DecodeError::InvalidHeader { .. })));
    }

    #[test]
    fn test_garbage_payload_fails_decompression() {
        let bytes = [b"VENG".as_slice(), &[0x78, 0x9C], &[0xFF; 16]].concat();
        assert!(matches!(decode(&bytes), Err(DecodeError::DecompressionFailure(_))));
    }

    #[test]
    fn test_unknown_subchunk_keeps_earlier_models() {
        let bytes = VengiBuilder::new(6)
            .begin_node("root", "Root", [0.0; 3])
            .begin_node("a", "Model", [0.0; 3])
            .data([0, 0, 0], [0, 0, 0], &[([0, 0, 0], 3)])
            .end_node()
            .begin_node("b", "Model", [0.0; 3])
            .raw(b"WHAT", &[1, 2, 3, 4])
            .data([0, 0, 0], [0, 0, 0], &[([0, 0, 0], 4)])
            .end_node()
            .end_node()
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models.len(), 1);
        assert_eq!(scene.models[0].name.as_deref(), Some("a"));
    }

    #[test]
    fn test_truncated_stream_keeps_partial_scene() {
        let full = VengiBuilder::new(6)
            .begin_node("root", "Root", [0.0; 3])
            .begin_node("a", "Model", [0.0; 3])
            .data([0, 0, 0], [0, 0, 0], &[([0, 0, 0], 3)])
            .end_node()
            .begin_node("b", "Model", [0.0; 3])
            .data([0, 0, 0], [3, 3, 3], &[([1, 1, 1], 4)])
            .end_node()
            .end_node();
        let body = full.body();
        let cut = VengiBuilder::compress(&body[..body.len() - 20]);
        let scene = decode(&cut).unwrap();
        assert_eq!(scene.models.len(), 1);
    }

    #[test]
    fn test_node_palette_override_is_one_shot() {
        let mut palette = Palette::new();
        palette.set_color(1, Rgba::new(200, 100, 50, 255));
        let bytes = VengiBuilder::new(6)
            .begin_node("root", "Root", [0.0; 3])
            .begin_node("a", "Model", [0.0; 3])
            .palette(&palette, 4)
            .data([0, 0, 0], [0, 0, 0], &[([0, 0, 0], 0)])
            .end_node()
            .begin_node("b", "Model", [0.0; 3])
            .data([0, 0, 0], [0, 0, 0], &[([0, 0, 0], 0)])
            .end_node()
            .end_node()
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models.len(), 2);
        let first = scene.models[0].palette.as_ref().unwrap();
        assert_eq!(first.color(1), Rgba::new(200, 100, 50, 255));
        assert!(scene.models[1].palette.is_none());
        assert_eq!(scene.palette, Palette::builtin_default());
    }

    #[test]
    fn test_top_level_palette_replaces_scene_palette() {
        let mut palette = Palette::new();
        palette.set_color(2, Rgba::new(1, 2, 3, 255));
        palette.entry_mut(2).name = Some("rust".into());
        let bytes = VengiBuilder::new(6)
            .palette(&palette, 3)
            .begin_node("root", "Root", [0.0; 3])
            .end_node()
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.palette.color(2), Rgba::new(1, 2, 3, 255));
        assert_eq!(scene.palette.entry(2).name.as_deref(), Some("rust"));
        assert_eq!(scene.palette.entry(2).material, MaterialType::Diffuse);
    }

    #[test]
    fn test_skippable_chunks_are_consumed() {
        let bytes = VengiBuilder::new(6)
            .begin_node("root", "Root", [0.0; 3])
            .property("author", "someone")
            .identifier("nippon")
            .animation("walk", 2)
            .ik_constraint(3)
            .normals(5)
            .data([0, 0, 0], [0, 0, 0], &[([0, 0, 0], 9)])
            .end_node()
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models.len(), 1);
        assert_eq!(scene.models[0].voxels[0].color_index, 10);
    }

    #[test]
    fn test_color_byte_255_is_clamped() {
        let bytes = VengiBuilder::new(6)
            .begin_node("root", "Root", [0.0; 3])
            .data([0, 0, 0], [0, 0, 0], &[([0, 0, 0], 255)])
            .end_node()
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models[0].voxels[0].color_index, 255);
    }
}
