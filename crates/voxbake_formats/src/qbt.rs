//! Qubicle Binary Tree `.qbt` Decoder
//!
//! ```text
//! "QB 2" | major (u8) | minor (u8) | global scale (3 x f32)
//! ["COLORMAP" | count (u32) | count x RGBA]
//! ["DATATREE"]
//! Node: type (u32) | data size (u32) | data
//!   0 matrix:   name | position | local scale | pivot | size | zlib cells
//!   1 model:    child count | children
//!   2 compound: matrix fields | child count | children
//! ```
//!
//! Cells are `x`, then `z`, then `y` ordered, four bytes each; the last
//! byte is a visibility mask and 0 means empty.

use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::{debug, info, warn};
use voxbake_core::{ContainerFormat, Rgba, VoxelModel, VoxelScene};

use crate::axes::{GridOrientation, YUpGrid};
use crate::error::{DecodeError, DecodeResult};
use crate::qubicle::ColorMap;
use crate::reader::ByteReader;

/// QBT file magic number.
pub const QBT_MAGIC: [u8; 4] = *b"QB 2";

const COLORMAP_SECTION: &[u8; 8] = b"COLORMAP";
const DATATREE_SECTION: &[u8; 8] = b"DATATREE";

/// Nesting deeper than this is treated as damage.
const MAX_DEPTH: usize = 64;

/// Node type ids.
const NODE_MATRIX: u32 = 0;
const NODE_MODEL: u32 = 1;
const NODE_COMPOUND: u32 = 2;

/// Decodes a `.qbt` file.
///
/// The scene version is `major << 8 | minor`.
///
/// # Errors
///
/// Returns `InvalidHeader` when the magic is wrong, `DecompressionFailure`
/// when a matrix payload cannot be inflated and `TruncatedStream` for any
/// other damage. Partial files are rejected.
pub fn decode(bytes: &[u8]) -> DecodeResult<VoxelScene> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.peek(4).unwrap_or(bytes);
    if magic != QBT_MAGIC {
        return Err(DecodeError::invalid_header(ContainerFormat::QubicleTree, "QB 2", magic));
    }
    reader.skip(4)?;
    let major = reader.read_u8()?;
    let minor = reader.read_u8()?;
    let _global_scale = [reader.read_f32()?, reader.read_f32()?, reader.read_f32()?];

    let mut tree = TreeDecoder {
        color_table: Vec::new(),
        colors: ColorMap::new(),
        models: Vec::new(),
    };

    if reader.peek(8) == Some(COLORMAP_SECTION.as_slice()) {
        reader.skip(8)?;
        let count = reader.read_u32()? as usize;
        tree.color_table.reserve(reader.capacity_hint(count, 4));
        for _ in 0..count {
            tree.color_table.push(reader.read_rgba()?);
        }
    }
    if reader.peek(8) == Some(DATATREE_SECTION.as_slice()) {
        reader.skip(8)?;
    }
    tree.read_node(&mut reader, [0; 3], 0)?;

    let scene = VoxelScene {
        format: ContainerFormat::QubicleTree,
        version: (u32::from(major) << 8) | u32::from(minor),
        models: tree.models,
        palette: tree.colors.into_palette(),
    };
    info!(
        major,
        minor,
        models = scene.models.len(),
        voxels = scene.voxel_count(),
        "decoded Qubicle tree scene"
    );
    Ok(scene)
}

struct TreeDecoder {
    /// File-level color map; when present, cells hold indices into it.
    color_table: Vec<Rgba>,
    colors: ColorMap,
    models: Vec<VoxelModel>,
}

impl TreeDecoder {
    fn read_node(&mut self, reader: &mut ByteReader<'_>, parent: [i32; 3], depth: usize) -> DecodeResult<()> {
        let node_type = reader.read_u32()?;
        let data_size = reader.read_u32()? as usize;
        let mut data = reader.sub_reader(data_size)?;
        if depth >= MAX_DEPTH {
            warn!(depth, "Qubicle tree nested too deep, skipping subtree");
            return Ok(());
        }

        match node_type {
            NODE_MATRIX => {
                self.read_matrix(&mut data, parent)?;
            }
            NODE_MODEL => self.read_children(&mut data, parent, depth)?,
            NODE_COMPOUND => {
                let position = self.read_matrix(&mut data, parent)?;
                self.read_children(&mut data, position, depth)?;
            }
            other => debug!(node_type = other, "skipping unknown Qubicle tree node"),
        }
        Ok(())
    }

    fn read_children(&mut self, data: &mut ByteReader<'_>, parent: [i32; 3], depth: usize) -> DecodeResult<()> {
        let count = data.read_u32()?;
        for _ in 0..count {
            self.read_node(data, parent, depth + 1)?;
        }
        Ok(())
    }

    /// Reads one matrix and returns its absolute container-space position.
    fn read_matrix(&mut self, data: &mut ByteReader<'_>, parent: [i32; 3]) -> DecodeResult<[i32; 3]> {
        let name_len = data.read_u32()? as usize;
        let name = data.read_string(name_len)?;
        let mut position = [0i32; 3];
        for (axis, offset) in position.iter_mut().zip(parent) {
            *axis = data.read_i32()?.saturating_add(offset);
        }
        let _local_scale = [data.read_u32()?, data.read_u32()?, data.read_u32()?];
        let _pivot = [data.read_f32()?, data.read_f32()?, data.read_f32()?];
        let size = [data.read_u32()?, data.read_u32()?, data.read_u32()?];
        let compressed_size = data.read_u32()? as usize;
        let compressed = data.read_bytes(compressed_size)?;

        let cell_count = u64::from(size[0])
            .saturating_mul(u64::from(size[1]))
            .saturating_mul(u64::from(size[2]));
        let expected = cell_count.saturating_mul(4);
        let mut cells = Vec::new();
        ZlibDecoder::new(compressed)
            .take(expected)
            .read_to_end(&mut cells)
            .map_err(DecodeError::DecompressionFailure)?;

        let grid = YUpGrid {
            size,
            position,
            orientation: GridOrientation::RightHanded,
        };
        let mut model = VoxelModel::new(grid.canonical_size());
        model.position = grid.canonical_position();
        model.name = (!name.is_empty()).then_some(name);

        let mut cells = ByteReader::new(&cells);
        let mut dropped = 0usize;
        for x in 0..size[0] {
            for z in 0..size[2] {
                for y in 0..size[1] {
                    let [c0, c1, c2, mask] = cells.read_array()?;
                    if mask == 0 {
                        continue;
                    }
                    let color = if self.color_table.is_empty() {
                        Rgba::new(c0, c1, c2, u8::MAX)
                    } else {
                        self.color_table
                            .get(usize::from(c0))
                            .map_or(Rgba::SENTINEL, |c| c.with_alpha(u8::MAX))
                    };
                    match grid.canonical_voxel([x, y, z], 0) {
                        Some(mut voxel) => {
                            voxel.color_index = self.colors.index_of(color);
                            model.voxels.push(voxel);
                        }
                        None => dropped += 1,
                    }
                }
            }
        }
        if dropped > 0 {
            warn!(count = dropped, "Qubicle tree voxels beyond coordinate range dropped");
        }

        self.models.push(model);
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{encode_vox, QbtBuilder, QbtNode};
    use voxbake_core::Voxel;

    const BLUE: Rgba = Rgba::new(0, 0, 255, 255);

    #[test]
    fn test_single_matrix_round_trip() {
        let bytes = QbtBuilder::new()
            .root(QbtNode::matrix("cube", [1, 2, 3], [2, 3, 4], &[([1, 2, 3], BLUE)]))
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.version, 0x0100);
        let model = &scene.models[0];
        assert_eq!(model.size, [2, 4, 3]);
        assert_eq!(model.voxels, vec![Voxel::new(1, 0, 2, 1)]);
        assert_eq!(model.position, [1, -6, 2]);
        assert_eq!(scene.palette.color(1), BLUE);

        let again = crate::vox::decode(&encode_vox(&scene)).unwrap();
        assert_eq!(again.models[0].voxels, model.voxels);
    }

    #[test]
    fn test_model_node_collects_children() {
        let bytes = QbtBuilder::new()
            .root(QbtNode::model(vec![
                QbtNode::matrix("a", [0, 0, 0], [1, 1, 1], &[([0, 0, 0], BLUE)]),
                QbtNode::matrix("b", [3, 0, 0], [1, 1, 1], &[([0, 0, 0], BLUE)]),
            ]))
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models.len(), 2);
        assert_eq!(scene.models[1].position, [3, 0, 0]);
        assert_eq!(scene.models[1].name.as_deref(), Some("b"));
    }

    #[test]
    fn test_compound_offsets_children() {
        let bytes = QbtBuilder::new()
            .root(QbtNode::compound(
                "body",
                [10, 0, 0],
                [1, 1, 1],
                &[([0, 0, 0], BLUE)],
                vec![QbtNode::matrix("arm", [1, 2, 0], [1, 1, 1], &[([0, 0, 0], BLUE)])],
            ))
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models.len(), 2);
        assert_eq!(scene.models[1].position, [11, 0, 2]);
    }

    #[test]
    fn test_color_map_indices() {
        let bytes = QbtBuilder::new()
            .color_map(&[Rgba::new(9, 9, 9, 255), Rgba::new(7, 7, 7, 255)])
            .root(QbtNode::indexed_matrix("m", [1, 1, 1], &[([0, 0, 0], 1)]))
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.palette.color(1), Rgba::new(7, 7, 7, 255));
    }

    #[test]
    fn test_dropped_cells_claim_no_palette_slot() {
        let green = Rgba::new(0, 255, 0, 255);
        let bytes = QbtBuilder::new()
            .root(QbtNode::matrix("m", [0, 0, 0], [300, 1, 1], &[([0, 0, 0], BLUE), ([299, 0, 0], green)]))
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models[0].size, [256, 1, 1]);
        assert_eq!(scene.models[0].voxels.len(), 1);
        assert_eq!(scene.palette.color(1), BLUE);
        assert!(scene.palette.color(2).is_zero());
    }

    #[test]
    fn test_corrupt_payload_fails() {
        let bytes = QbtBuilder::new()
            .root(QbtNode::raw_matrix("m", [1, 1, 1], vec![0xFF; 6]))
            .build();
        assert!(matches!(decode(&bytes), Err(DecodeError::DecompressionFailure(_))));
    }

    #[test]
    fn test_truncated_tree_fails() {
        let bytes = QbtBuilder::new()
            .root(QbtNode::matrix("m", [0, 0, 0], [2, 2, 2], &[([0, 0, 0], BLUE)]))
            .build();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1]),
            Err(DecodeError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_bad_magic_fails() {
        assert!(matches!(decode(b"QB 1xxxxxx"), Err(DecodeError::InvalidHeader { .. })));
    }
}
