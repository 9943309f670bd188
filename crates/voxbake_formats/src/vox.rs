//! MagicaVoxel `.vox` Decoder
//!
//! ## VOX Format Reference
//!
//! ```text
//! VOX File Structure:
//! ├── "VOX " (4 bytes) - Magic number
//! ├── Version (4 bytes) - 150 or 200
//! └── MAIN Chunk (children follow in the flat stream)
//!     ├── SIZE / XYZI      - one pair per model
//!     ├── RGBA             - palette (optional)
//!     ├── MATL             - per-color material (optional)
//!     └── nTRN/nGRP/nSHP   - scene graph (optional)
//!
//! Chunk: id (4) | content size (u32) | children size (u32) | content
//! ```
//!
//! Scene-graph nodes are collected while streaming and resolved into
//! model positions once every chunk has been read.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, trace, warn};
use voxbake_core::{ContainerFormat, MaterialType, Palette, Voxel, VoxelModel, VoxelScene};

use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;

/// VOX file magic number.
pub const VOX_MAGIC: [u8; 4] = *b"VOX ";

/// Versions written by MagicaVoxel releases we know about.
const KNOWN_VERSIONS: [u32; 2] = [150, 200];

/// Deepest transform/group nesting followed before a branch is dropped.
const MAX_GRAPH_DEPTH: usize = 256;

/// Attribute dictionary attached to scene-graph nodes and materials.
type Dict = HashMap<String, String>;

/// Scene-graph node as declared in the file.
#[derive(Debug, Clone, PartialEq)]
enum SceneNode {
    /// `nTRN`: translation applied to one child.
    Transform {
        child: i32,
        translation: [i32; 3],
        name: Option<String>,
    },
    /// `nGRP`: ordered children.
    Group { children: Vec<i32> },
    /// `nSHP`: reference to a model by index.
    Shape { model: Option<i32> },
}

/// Material attributes from a `MATL` chunk.
#[derive(Debug, Clone)]
struct Material {
    index: u8,
    kind: MaterialType,
    properties: BTreeMap<String, f32>,
}

/// Decoder state accumulated while streaming chunks.
#[derive(Debug, Default)]
struct VoxState {
    models: Vec<VoxelModel>,
    palette: Option<Palette>,
    materials: Vec<Material>,
    nodes: HashMap<i32, SceneNode>,
    /// Node ids in file order, for deterministic resolution.
    node_order: Vec<i32>,
}

/// Decodes a `.vox` file.
///
/// # Errors
///
/// Returns `InvalidHeader` when the magic is wrong and `TruncatedStream` /
/// `InvalidLength` for any structural damage. Partial `.vox` scenes are
/// never returned.
pub fn decode(bytes: &[u8]) -> DecodeResult<VoxelScene> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.peek(4).unwrap_or(bytes);
    if magic != VOX_MAGIC {
        return Err(DecodeError::invalid_header(ContainerFormat::MagicaVoxel, "VOX ", magic));
    }
    reader.skip(4)?;

    let version = reader.read_u32()?;
    if !KNOWN_VERSIONS.contains(&version) {
        warn!(version, "unknown VOX version, parsing anyway");
    }

    let mut state = VoxState::default();
    while !reader.is_empty() {
        let id = reader.read_tag()?;
        let content_size = reader.read_u32()? as usize;
        // Children are plain chunks that follow in the stream.
        let _children_size = reader.read_u32()?;
        let content = reader.sub_reader(content_size)?;
        state.read_chunk(id, content)?;
    }

    let scene = state.finish(version);
    info!(
        version,
        models = scene.models.len(),
        voxels = scene.voxel_count(),
        "decoded VOX scene"
    );
    Ok(scene)
}

impl VoxState {
    fn read_chunk(&mut self, id: [u8; 4], mut content: ByteReader<'_>) -> DecodeResult<()> {
        trace!(chunk = %String::from_utf8_lossy(&id), size = content.remaining(), "VOX chunk");
        match &id {
            b"MAIN" => Ok(()),
            b"SIZE" => {
                let x = content.read_u32()?;
                let y = content.read_u32()?;
                let z = content.read_u32()?;
                let model = VoxelModel::new([x, y, z]);
                if model.size != [x, y, z] {
                    warn!(size = ?[x, y, z], clamped = ?model.size, "VOX model size clamped");
                }
                self.models.push(model);
                Ok(())
            }
            b"XYZI" => self.read_voxels(&mut content),
            b"RGBA" => {
                self.palette = Some(read_palette(&mut content)?);
                Ok(())
            }
            b"MATL" => self.read_material(&mut content),
            b"nTRN" => self.read_transform(&mut content),
            b"nGRP" => {
                let id = content.read_i32()?;
                let _attributes = read_dict(&mut content)?;
                let count = content.read_count_i32()?;
                let mut children = Vec::with_capacity(content.capacity_hint(count, 4));
                for _ in 0..count {
                    children.push(content.read_i32()?);
                }
                self.insert_node(id, SceneNode::Group { children });
                Ok(())
            }
            b"nSHP" => {
                let id = content.read_i32()?;
                let _attributes = read_dict(&mut content)?;
                let count = content.read_count_i32()?;
                let mut model = None;
                for _ in 0..count {
                    let model_id = content.read_i32()?;
                    let _model_attributes = read_dict(&mut content)?;
                    model.get_or_insert(model_id);
                }
                self.insert_node(id, SceneNode::Shape { model });
                Ok(())
            }
            _ => {
                debug!(chunk = %String::from_utf8_lossy(&id), "skipping unknown VOX chunk");
                Ok(())
            }
        }
    }

    fn read_voxels(&mut self, content: &mut ByteReader<'_>) -> DecodeResult<()> {
        let Some(model) = self.models.last_mut() else {
            warn!("XYZI chunk without a preceding SIZE chunk, skipping");
            return Ok(());
        };
        let count = content.read_u32()? as usize;
        model.voxels.reserve(content.capacity_hint(count, 4));
        for _ in 0..count {
            let [x, y, z, color_index] = content.read_array()?;
            if color_index != 0 {
                model.voxels.push(Voxel::new(x, y, z, color_index));
            }
        }
        Ok(())
    }

    fn read_material(&mut self, content: &mut ByteReader<'_>) -> DecodeResult<()> {
        let id = content.read_i32()?;
        let attributes = read_dict(content)?;
        let Ok(index) = u8::try_from(id) else {
            debug!(id, "material id outside palette range, ignoring");
            return Ok(());
        };
        let kind = attributes
            .get("_type")
            .map_or(MaterialType::None, |tag| MaterialType::from_vox_tag(tag));
        let properties = attributes
            .iter()
            .filter_map(|(key, value)| {
                let value = value.trim().parse::<f32>().ok()?;
                Some((key.trim_start_matches('_').to_string(), value))
            })
            .collect();
        self.materials.push(Material {
            index,
            kind,
            properties,
        });
        Ok(())
    }

    fn read_transform(&mut self, content: &mut ByteReader<'_>) -> DecodeResult<()> {
        let id = content.read_i32()?;
        let attributes = read_dict(content)?;
        let child = content.read_i32()?;
        let _reserved = content.read_i32()?;
        let _layer = content.read_i32()?;
        let frames = content.read_count_i32()?;

        // First frame wins; later frames are animation.
        let mut translation = [0; 3];
        for frame in 0..frames {
            let frame_attributes = read_dict(content)?;
            if frame == 0 {
                if let Some(t) = frame_attributes.get("_t") {
                    translation = parse_translation(t);
                }
            }
        }

        let name = attributes.get("_name").filter(|n| !n.is_empty()).cloned();
        self.insert_node(
            id,
            SceneNode::Transform {
                child,
                translation,
                name,
            },
        );
        Ok(())
    }

    fn insert_node(&mut self, id: i32, node: SceneNode) {
        if self.nodes.insert(id, node).is_some() {
            debug!(id, "duplicate scene node id, last one wins");
        } else {
            self.node_order.push(id);
        }
    }

    fn finish(mut self, version: u32) -> VoxelScene {
        let mut palette = self.palette.take().unwrap_or_default();
        if palette.color(1).is_zero() {
            debug!("VOX palette missing or blank, using the default palette");
            palette = Palette::builtin_default();
        }
        for material in &self.materials {
            let entry = palette.entry_mut(material.index);
            entry.material = material.kind;
            entry.properties.clone_from(&material.properties);
        }

        // Without a scene graph every model sits centered on the origin.
        for model in &mut self.models {
            model.position = centered_position([0; 3], model.size);
        }
        self.resolve_scene_graph();

        VoxelScene {
            format: ContainerFormat::MagicaVoxel,
            version,
            models: self.models,
            palette,
        }
    }

    /// Walks every root transform and assigns accumulated translations to
    /// the models referenced by the shapes underneath.
    fn resolve_scene_graph(&mut self) {
        let mut referenced = HashSet::new();
        for node in self.nodes.values() {
            match node {
                SceneNode::Transform { child, .. } => {
                    referenced.insert(*child);
                }
                SceneNode::Group { children } => referenced.extend(children.iter().copied()),
                SceneNode::Shape { .. } => {}
            }
        }

        let roots: Vec<i32> = self
            .node_order
            .iter()
            .copied()
            .filter(|id| {
                !referenced.contains(id)
                    && matches!(self.nodes.get(id), Some(SceneNode::Transform { .. }))
            })
            .collect();

        let mut expanded = HashSet::new();
        for root in roots {
            self.place_from(root, &mut expanded);
        }
    }

    /// Depth-first walk from one root.
    ///
    /// Every node is expanded at most once across the whole graph, so
    /// cycles and shared subtrees cost one visit. The first path to reach a
    /// shape places its model.
    fn place_from(&mut self, root: i32, expanded: &mut HashSet<i32>) {
        let mut stack: Vec<(i32, [i32; 3], Option<String>, usize)> = vec![(root, [0; 3], None, 0)];
        while let Some((id, translation, name, depth)) = stack.pop() {
            if !expanded.insert(id) {
                debug!(id, "VOX scene node reached again, ignoring");
                continue;
            }
            if depth > MAX_GRAPH_DEPTH {
                warn!(id, depth, "VOX scene graph too deep, ignoring subtree");
                continue;
            }
            match self.nodes.get(&id) {
                Some(SceneNode::Transform {
                    child,
                    translation: local,
                    name: own_name,
                }) => {
                    let total = [
                        translation[0].saturating_add(local[0]),
                        translation[1].saturating_add(local[1]),
                        translation[2].saturating_add(local[2]),
                    ];
                    stack.push((*child, total, own_name.clone().or(name), depth + 1));
                }
                Some(SceneNode::Group { children }) => {
                    stack.extend(children.iter().rev().map(|&child| (child, translation, None, depth + 1)));
                }
                Some(SceneNode::Shape { model: Some(model_id) }) => {
                    let model_id = *model_id;
                    match usize::try_from(model_id).ok().and_then(|i| self.models.get_mut(i)) {
                        Some(model) => {
                            model.position = centered_position(translation, model.size);
                            if name.is_some() {
                                model.name = name;
                            }
                        }
                        None => debug!(model_id, "shape references a missing model"),
                    }
                }
                Some(SceneNode::Shape { model: None }) => {}
                None => debug!(id, "dangling VOX scene node reference"),
            }
        }
    }
}

/// `_t` marks the model's center; positions are stored at the min corner.
fn centered_position(translation: [i32; 3], size: [u32; 3]) -> [i32; 3] {
    let half = |s: u32| i32::try_from(s / 2).unwrap_or(i32::MAX);
    [
        translation[0].saturating_sub(half(size[0])),
        translation[1].saturating_sub(half(size[1])),
        translation[2].saturating_sub(half(size[2])),
    ]
}

fn parse_translation(value: &str) -> [i32; 3] {
    let mut out = [0; 3];
    let mut parts = value.split_whitespace();
    for axis in &mut out {
        match parts.next().map(str::parse::<i32>) {
            Some(Ok(v)) => *axis = v,
            _ => {
                debug!(value, "malformed _t attribute");
                return [0; 3];
            }
        }
    }
    out
}

/// 256 RGBA entries; file entry `i` is color index `i + 1`.
fn read_palette(content: &mut ByteReader<'_>) -> DecodeResult<Palette> {
    let mut palette = Palette::new();
    for index in 1..=255u8 {
        palette.set_color(index, content.read_rgba()?);
    }
    // The 256th file entry has no color index to land on.
    Ok(palette)
}

fn read_vox_string(reader: &mut ByteReader<'_>) -> DecodeResult<String> {
    let len = reader.read_count_i32()?;
    reader.read_string(len)
}

fn read_dict(reader: &mut ByteReader<'_>) -> DecodeResult<Dict> {
    let count = reader.read_count_i32()?;
    let mut dict = Dict::with_capacity(reader.capacity_hint(count, 8));
    for _ in 0..count {
        let key = read_vox_string(reader)?;
        let value = read_vox_string(reader)?;
        dict.insert(key, value);
    }
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{encode_vox, VoxBuilder};
    use voxbake_core::Rgba;

    #[test]
    fn test_single_voxel_round_trip() {
        let bytes = VoxBuilder::new()
            .model([4, 5, 6], &[Voxel::new(1, 2, 3, 77)])
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.format, ContainerFormat::MagicaVoxel);
        assert_eq!(scene.version, 150);
        assert_eq!(scene.models.len(), 1);
        assert_eq!(scene.models[0].size, [4, 5, 6]);
        assert_eq!(scene.models[0].voxels, vec![Voxel::new(1, 2, 3, 77)]);

        let again = decode(&encode_vox(&scene)).unwrap();
        assert_eq!(again.models[0].voxels, scene.models[0].voxels);
        assert_eq!(again.palette.color(77), scene.palette.color(77));
    }

    #[test]
    fn test_bad_magic_fails() {
        let mut bytes = VoxBuilder::new().model([1, 1, 1], &[Voxel::new(0, 0, 0, 1)]).build();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(DecodeError::InvalidHeader { .. })));
        assert!(matches!(decode(b"VO"), Err(DecodeError::InvalidHeader { .. })));
    }

    #[test]
    fn test_truncated_file_fails() {
        let bytes = VoxBuilder::new()
            .model([2, 2, 2], &[Voxel::new(0, 0, 0, 1), Voxel::new(1, 1, 1, 2)])
            .build();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 3]),
            Err(DecodeError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_unknown_chunk_is_skipped() {
        let bytes = VoxBuilder::new()
            .chunk(b"ZZZZ", &[0xAB; 37])
            .model([3, 3, 3], &[Voxel::new(2, 2, 2, 5)])
            .chunk(b"rOBJ", &[1, 2, 3])
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models.len(), 1);
        assert_eq!(scene.models[0].voxels, vec![Voxel::new(2, 2, 2, 5)]);
    }

    #[test]
    fn test_xyzi_without_size_is_skipped() {
        let bytes = VoxBuilder::new()
            .voxels_only(&[Voxel::new(0, 0, 0, 1)])
            .model([1, 1, 1], &[Voxel::new(0, 0, 0, 9)])
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models.len(), 1);
        assert_eq!(scene.models[0].voxels[0].color_index, 9);
    }

    #[test]
    fn test_blank_palette_falls_back_to_default() {
        let bytes = VoxBuilder::new()
            .model([1, 1, 1], &[Voxel::new(0, 0, 0, 1)])
            .palette(&Palette::new())
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.palette, Palette::builtin_default());
    }

    #[test]
    fn test_custom_palette_shifts_by_one() {
        let mut palette = Palette::new();
        palette.set_color(1, Rgba::new(10, 20, 30, 255));
        palette.set_color(255, Rgba::new(1, 2, 3, 4));
        let bytes = VoxBuilder::new()
            .model([1, 1, 1], &[Voxel::new(0, 0, 0, 1)])
            .palette(&palette)
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.palette.color(1), Rgba::new(10, 20, 30, 255));
        assert_eq!(scene.palette.color(255), Rgba::new(1, 2, 3, 4));
        assert_eq!(scene.palette.color(0), Rgba::TRANSPARENT);
    }

    #[test]
    fn test_scene_graph_accumulates_translation() {
        // root nTRN(0) -> nGRP(1) -> nTRN(2, t) -> nSHP(3) -> model 0
        let bytes = VoxBuilder::new()
            .model([4, 4, 4], &[Voxel::new(0, 0, 0, 1)])
            .transform(0, 1, [10, 0, 0], None)
            .group(1, &[2])
            .transform(2, 3, [5, -7, 3], Some("hull"))
            .shape(3, 0)
            .build();
        let scene = decode(&bytes).unwrap();
        let model = &scene.models[0];
        // Translation marks the model center.
        assert_eq!(model.position, [15 - 2, -7 - 2, 3 - 2]);
        assert_eq!(model.center(), [15.0, -7.0, 3.0]);
        assert_eq!(model.name.as_deref(), Some("hull"));
    }

    #[test]
    fn test_scene_graph_cycle_is_ignored() {
        let bytes = VoxBuilder::new()
            .model([2, 2, 2], &[Voxel::new(0, 0, 0, 1)])
            .transform(0, 1, [0, 0, 0], None)
            .group(1, &[2])
            .transform(2, 1, [4, 4, 4], None)
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models[0].position, [-1, -1, -1]);
    }

    #[test]
    fn test_oversized_model_size_is_clamped() {
        let bytes = VoxBuilder::new()
            .model([u32::MAX; 3], &[Voxel::new(0, 0, 0, 1), Voxel::new(255, 255, 255, 2)])
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models[0].size, [256, 256, 256]);
        assert_eq!(scene.models[0].voxels.len(), 2);
    }

    #[test]
    fn test_deep_scene_graph_is_cut_off() {
        // nTRN(0) -> nGRP(1) -> nTRN(2) -> ... -> nSHP at the bottom
        let levels = 2_000;
        let mut builder = VoxBuilder::new().model([2, 2, 2], &[Voxel::new(0, 0, 0, 1)]);
        for level in 0..levels {
            let id = 2 * level;
            builder = builder.transform(id, id + 1, [1, 0, 0], None).group(id + 1, &[id + 2]);
        }
        let bytes = builder.shape(2 * levels, 0).build();
        let scene = decode(&bytes).unwrap();
        // The shape is never reached, so the model keeps its default spot.
        assert_eq!(scene.models[0].position, [-1, -1, -1]);
    }

    #[test]
    fn test_nesting_within_depth_limit_is_followed() {
        let levels = 100;
        let mut builder = VoxBuilder::new().model([2, 2, 2], &[Voxel::new(0, 0, 0, 1)]);
        for level in 0..levels {
            let id = 2 * level;
            builder = builder.transform(id, id + 1, [1, 0, 0], None).group(id + 1, &[id + 2]);
        }
        let bytes = builder.shape(2 * levels, 0).build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models[0].position, [levels - 1, -1, -1]);
    }

    #[test]
    fn test_shared_children_are_walked_once() {
        // Every group lists its child twice: 2^40 paths, 40 nodes.
        let levels = 40;
        let mut builder = VoxBuilder::new()
            .model([2, 2, 2], &[Voxel::new(0, 0, 0, 1)])
            .transform(0, 1, [0, 0, 0], None);
        for id in 1..=levels {
            builder = builder.group(id, &[id + 1, id + 1]);
        }
        let bytes = builder
            .transform(levels + 1, levels + 2, [6, 6, 6], Some("leaf"))
            .shape(levels + 2, 0)
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models[0].position, [5, 5, 5]);
        assert_eq!(scene.models[0].name.as_deref(), Some("leaf"));
    }

    #[test]
    fn test_only_first_frame_translation_is_used() {
        let mut content = Vec::new();
        let push_i32 = |buf: &mut Vec<u8>, v: i32| buf.extend_from_slice(&v.to_le_bytes());
        let push_str = |buf: &mut Vec<u8>, s: &str| {
            buf.extend_from_slice(&(s.len() as i32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        };
        push_i32(&mut content, 0); // node id
        push_i32(&mut content, 0); // empty attributes
        push_i32(&mut content, 1); // child
        push_i32(&mut content, -1); // reserved
        push_i32(&mut content, 0); // layer
        push_i32(&mut content, 2); // frames
        for t in ["1 2 3", "100 100 100"] {
            push_i32(&mut content, 1);
            push_str(&mut content, "_t");
            push_str(&mut content, t);
        }
        let bytes = VoxBuilder::new()
            .model([2, 2, 2], &[Voxel::new(0, 0, 0, 1)])
            .chunk(b"nTRN", &content)
            .shape(1, 0)
            .build();
        let scene = decode(&bytes).unwrap();
        assert_eq!(scene.models[0].position, [0, 1, 2]);
    }

    #[test]
    fn test_material_chunk_sets_entry_metadata() {
        let bytes = VoxBuilder::new()
            .model([1, 1, 1], &[Voxel::new(0, 0, 0, 8)])
            .material(8, &[("_type", "_metal"), ("_rough", "0.25"), ("_note", "shiny")])
            .build();
        let scene = decode(&bytes).unwrap();
        let entry = scene.palette.entry(8);
        assert_eq!(entry.material, MaterialType::Metal);
        assert_eq!(entry.properties.get("rough"), Some(&0.25));
        assert!(!entry.properties.contains_key("note"));
    }

    #[test]
    fn test_parse_translation() {
        assert_eq!(parse_translation("1 -2 3"), [1, -2, 3]);
        assert_eq!(parse_translation("1 x 3"), [0, 0, 0]);
        assert_eq!(parse_translation(""), [0, 0, 0]);
    }
}
