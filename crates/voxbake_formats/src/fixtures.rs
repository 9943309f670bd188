//! # Fixture Encoders
//!
//! Minimal writers for every supported container, used by tests and
//! benchmarks across the workspace. They emit just enough structure to
//! exercise the decoders; they are not general-purpose exporters.
//!
//! Enabled by the `fixtures` feature and always compiled under `cfg(test)`.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use voxbake_core::{Palette, Rgba, Voxel, VoxelScene};

fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("writing to a Vec cannot fail");
    encoder.finish().expect("writing to a Vec cannot fail")
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_f32(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_rgba(buf: &mut Vec<u8>, color: Rgba) {
    buf.extend_from_slice(&[color.r, color.g, color.b, color.a]);
}

// =============================================================================
// MAGICAVOXEL
// =============================================================================

/// Builds `.vox` files chunk by chunk.
#[derive(Debug, Clone)]
pub struct VoxBuilder {
    version: u32,
    chunks: Vec<u8>,
}

impl Default for VoxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VoxBuilder {
    /// Starts a version 150 file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: 150,
            chunks: Vec::new(),
        }
    }

    /// Overrides the version field.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Appends a raw chunk.
    #[must_use]
    pub fn chunk(mut self, id: &[u8; 4], content: &[u8]) -> Self {
        self.chunks.extend_from_slice(id);
        push_u32(&mut self.chunks, content.len() as u32);
        push_u32(&mut self.chunks, 0);
        self.chunks.extend_from_slice(content);
        self
    }

    /// Appends a `SIZE` + `XYZI` pair.
    #[must_use]
    pub fn model(self, size: [u32; 3], voxels: &[Voxel]) -> Self {
        let mut content = Vec::new();
        for s in size {
            push_u32(&mut content, s);
        }
        self.chunk(b"SIZE", &content).voxels_only(voxels)
    }

    /// Appends an `XYZI` chunk on its own.
    #[must_use]
    pub fn voxels_only(self, voxels: &[Voxel]) -> Self {
        let mut content = Vec::new();
        push_u32(&mut content, voxels.len() as u32);
        for v in voxels {
            content.extend_from_slice(&[v.x, v.y, v.z, v.color_index]);
        }
        self.chunk(b"XYZI", &content)
    }

    /// Appends an `RGBA` chunk holding indices 1..=255 of `palette`.
    #[must_use]
    pub fn palette(self, palette: &Palette) -> Self {
        let mut content = Vec::with_capacity(256 * 4);
        for index in 1..=255u8 {
            push_rgba(&mut content, palette.color(index));
        }
        push_rgba(&mut content, Rgba::TRANSPARENT);
        self.chunk(b"RGBA", &content)
    }

    /// Appends an `nTRN` chunk with a single frame.
    #[must_use]
    pub fn transform(self, id: i32, child: i32, translation: [i32; 3], name: Option<&str>) -> Self {
        let mut content = Vec::new();
        push_i32(&mut content, id);
        match name {
            Some(name) => write_dict(&mut content, &[("_name", name)]),
            None => write_dict(&mut content, &[]),
        }
        push_i32(&mut content, child);
        push_i32(&mut content, -1);
        push_i32(&mut content, 0);
        push_i32(&mut content, 1);
        let t = format!("{} {} {}", translation[0], translation[1], translation[2]);
        write_dict(&mut content, &[("_t", &t)]);
        self.chunk(b"nTRN", &content)
    }

    /// Appends an `nGRP` chunk.
    #[must_use]
    pub fn group(self, id: i32, children: &[i32]) -> Self {
        let mut content = Vec::new();
        push_i32(&mut content, id);
        write_dict(&mut content, &[]);
        push_i32(&mut content, children.len() as i32);
        for &child in children {
            push_i32(&mut content, child);
        }
        self.chunk(b"nGRP", &content)
    }

    /// Appends an `nSHP` chunk referencing one model.
    #[must_use]
    pub fn shape(self, id: i32, model: i32) -> Self {
        let mut content = Vec::new();
        push_i32(&mut content, id);
        write_dict(&mut content, &[]);
        push_i32(&mut content, 1);
        push_i32(&mut content, model);
        write_dict(&mut content, &[]);
        self.chunk(b"nSHP", &content)
    }

    /// Appends a `MATL` chunk.
    #[must_use]
    pub fn material(self, id: i32, attributes: &[(&str, &str)]) -> Self {
        let mut content = Vec::new();
        push_i32(&mut content, id);
        write_dict(&mut content, attributes);
        self.chunk(b"MATL", &content)
    }

    /// Finishes the file.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(20 + self.chunks.len());
        out.extend_from_slice(b"VOX ");
        push_u32(&mut out, self.version);
        out.extend_from_slice(b"MAIN");
        push_u32(&mut out, 0);
        push_u32(&mut out, self.chunks.len() as u32);
        out.extend_from_slice(&self.chunks);
        out
    }
}

fn write_vox_string(buf: &mut Vec<u8>, value: &str) {
    push_i32(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

fn write_dict(buf: &mut Vec<u8>, pairs: &[(&str, &str)]) {
    push_i32(buf, pairs.len() as i32);
    for (key, value) in pairs {
        write_vox_string(buf, key);
        write_vox_string(buf, value);
    }
}

/// Re-encodes a scene as `.vox`.
///
/// Writes every model, the scene palette and a scene graph placing each
/// model at its position. Model-local palettes are not written.
#[must_use]
pub fn encode_vox(scene: &VoxelScene) -> Vec<u8> {
    let mut builder = VoxBuilder::new().palette(&scene.palette);
    for model in &scene.models {
        builder = builder.model(model.size, &model.voxels);
    }

    let children: Vec<i32> = (0..scene.models.len() as i32).map(|i| 2 + 2 * i).collect();
    builder = builder.transform(0, 1, [0; 3], None).group(1, &children);
    for (i, model) in scene.models.iter().enumerate() {
        let center = [
            model.position[0] + (model.size[0] / 2) as i32,
            model.position[1] + (model.size[1] / 2) as i32,
            model.position[2] + (model.size[2] / 2) as i32,
        ];
        let id = children[i];
        builder = builder
            .transform(id, id + 1, center, model.name.as_deref())
            .shape(id + 1, i as i32);
    }
    builder.build()
}

// =============================================================================
// VENGI
// =============================================================================

/// Builds `.vengi` files. The body is written uncompressed and deflated in
/// [`VengiBuilder::build`].
#[derive(Debug, Clone)]
pub struct VengiBuilder {
    version: u32,
    body: Vec<u8>,
}

impl VengiBuilder {
    /// Starts a file of the given version.
    #[must_use]
    pub fn new(version: u32) -> Self {
        let mut body = Vec::new();
        push_u32(&mut body, version);
        Self { version, body }
    }

    fn pascal(&mut self, value: &str) {
        self.body.extend_from_slice(&(value.len() as u16).to_le_bytes());
        self.body.extend_from_slice(value.as_bytes());
    }

    /// Opens a `NODE`.
    #[must_use]
    pub fn begin_node(mut self, name: &str, kind: &str, position: [f32; 3]) -> Self {
        self.body.extend_from_slice(b"NODE");
        self.pascal(name);
        self.pascal(kind);
        if self.version >= 6 {
            self.body.extend_from_slice(&[0; 16]);
        }
        if self.version >= 2 {
            push_i32(&mut self.body, 0);
            push_i32(&mut self.body, -1);
        }
        self.body.extend_from_slice(&[1, 0]);
        push_u32(&mut self.body, 0);
        if self.version >= 3 {
            for p in position {
                push_f32(&mut self.body, p);
            }
        }
        self
    }

    /// Closes the current node.
    #[must_use]
    pub fn end_node(mut self) -> Self {
        self.body.extend_from_slice(b"ENDN");
        self
    }

    /// Appends a `DATA` block covering `min..=max`. Cells hold absolute
    /// coordinates and raw color bytes; every other cell is air.
    #[must_use]
    pub fn data(mut self, min: [i32; 3], max: [i32; 3], cells: &[([i32; 3], u8)]) -> Self {
        self.body.extend_from_slice(b"DATA");
        for v in min.into_iter().chain(max) {
            push_i32(&mut self.body, v);
        }
        let lookup: HashMap<[i32; 3], u8> = cells.iter().copied().collect();
        for x in min[0]..=max[0] {
            for y in min[1]..=max[1] {
                for z in min[2]..=max[2] {
                    match lookup.get(&[x, y, z]) {
                        Some(&color) => {
                            self.body.extend_from_slice(&[0, color]);
                            if self.version >= 4 {
                                self.body.push(0);
                            }
                        }
                        None => self.body.push(1),
                    }
                }
            }
        }
        self
    }

    /// Appends a `PALC` block with colors 1..=count of `palette`.
    #[must_use]
    pub fn palette(mut self, palette: &Palette, count: u8) -> Self {
        self.body.extend_from_slice(b"PALC");
        self.pascal("fixture");
        push_i32(&mut self.body, i32::from(count));
        let indices = 1..=count;
        for i in indices.clone() {
            push_rgba(&mut self.body, palette.color(i));
        }
        for _ in indices.clone() {
            push_u32(&mut self.body, 0);
        }
        for i in indices.clone() {
            self.body.push(i - 1);
        }
        for i in indices.clone() {
            let name = palette.entry(i).name.clone().unwrap_or_default();
            self.pascal(&name);
        }
        push_u32(&mut self.body, u32::from(count));
        for _ in indices {
            push_i32(&mut self.body, 1);
            self.body.push(1);
            self.pascal("roughness");
            push_f32(&mut self.body, 0.5);
        }
        self
    }

    /// Appends a `PROP` block with one pair.
    #[must_use]
    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.body.extend_from_slice(b"PROP");
        push_u32(&mut self.body, 1);
        self.pascal(key);
        self.pascal(value);
        self
    }

    /// Appends a `PALI` block.
    #[must_use]
    pub fn identifier(mut self, name: &str) -> Self {
        self.body.extend_from_slice(b"PALI");
        self.pascal(name);
        self
    }

    /// Appends an `ANIM` block with identity keyframes.
    #[must_use]
    pub fn animation(mut self, name: &str, keyframes: u32) -> Self {
        self.body.extend_from_slice(b"ANIM");
        self.pascal(name);
        for frame in 0..keyframes {
            self.body.extend_from_slice(b"KEYF");
            push_u32(&mut self.body, frame);
            self.body.push(0);
            self.pascal("Linear");
            for i in 0..16 {
                push_f32(&mut self.body, if i % 5 == 0 { 1.0 } else { 0.0 });
            }
            if self.version <= 2 {
                for _ in 0..3 {
                    push_f32(&mut self.body, 0.0);
                }
            }
        }
        self.body.extend_from_slice(b"ENDA");
        self
    }

    /// Appends an `IKCO` block.
    #[must_use]
    pub fn ik_constraint(mut self, swing_limits: u32) -> Self {
        self.body.extend_from_slice(b"IKCO");
        push_i32(&mut self.body, 0);
        push_f32(&mut self.body, 0.0);
        push_f32(&mut self.body, 1.0);
        self.body.extend_from_slice(&[1, 0]);
        push_u32(&mut self.body, swing_limits);
        self.body.resize(self.body.len() + swing_limits as usize * 12, 0);
        self
    }

    /// Appends a `PALN` block.
    #[must_use]
    pub fn normals(mut self, count: u32) -> Self {
        self.body.extend_from_slice(b"PALN");
        push_u32(&mut self.body, count);
        self.body.resize(self.body.len() + count as usize * 4, 0);
        self
    }

    /// Appends a raw tag and payload.
    #[must_use]
    pub fn raw(mut self, tag: &[u8; 4], payload: &[u8]) -> Self {
        self.body.extend_from_slice(tag);
        self.body.extend_from_slice(payload);
        self
    }

    /// Uncompressed body (version onwards).
    #[must_use]
    pub fn body(&self) -> Vec<u8> {
        self.body.clone()
    }

    /// Wraps an uncompressed body into a file.
    #[must_use]
    pub fn compress(body: &[u8]) -> Vec<u8> {
        let mut out = b"VENG".to_vec();
        out.extend_from_slice(&zlib(body));
        out
    }

    /// Finishes the file.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        Self::compress(&self.body)
    }
}

// =============================================================================
// QUBICLE
// =============================================================================

#[derive(Debug, Clone)]
struct QbMatrix {
    name: String,
    size: [u32; 3],
    position: [i32; 3],
    /// z / y / x ordered cells.
    cells: Vec<Rgba>,
}

/// Builds `.qb` files.
#[derive(Debug, Clone, Default)]
pub struct QbBuilder {
    bgra: bool,
    right_handed: bool,
    compressed: bool,
    visibility_mask: bool,
    matrices: Vec<QbMatrix>,
}

impl QbBuilder {
    /// Starts an RGBA, left-handed, uncompressed file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes colors as BGRA.
    #[must_use]
    pub fn bgra(mut self) -> Self {
        self.bgra = true;
        self
    }

    /// Flags the z axis as right-handed.
    #[must_use]
    pub fn right_handed(mut self) -> Self {
        self.right_handed = true;
        self
    }

    /// Selects run-length compressed matrices.
    #[must_use]
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Flags alpha as a visibility mask.
    #[must_use]
    pub fn visibility_mask(mut self) -> Self {
        self.visibility_mask = true;
        self
    }

    /// Adds a matrix; unspecified cells are empty.
    #[must_use]
    pub fn matrix(mut self, name: &str, size: [u32; 3], position: [i32; 3], cells: &[([u32; 3], Rgba)]) -> Self {
        let [sx, sy, sz] = size.map(|s| s as usize);
        let mut grid = vec![Rgba::TRANSPARENT; sx * sy * sz];
        for &([x, y, z], color) in cells {
            grid[x as usize + y as usize * sx + z as usize * sx * sy] = color;
        }
        self.matrices.push(QbMatrix {
            name: name.to_string(),
            size,
            position,
            cells: grid,
        });
        self
    }

    fn pack(&self, color: Rgba) -> u32 {
        if self.bgra {
            u32::from_le_bytes([color.b, color.g, color.r, color.a])
        } else {
            u32::from_le_bytes([color.r, color.g, color.b, color.a])
        }
    }

    /// Finishes the file.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut out = vec![1, 1, 0, 0];
        push_u32(&mut out, u32::from(self.bgra));
        push_u32(&mut out, u32::from(self.right_handed));
        push_u32(&mut out, u32::from(self.compressed));
        push_u32(&mut out, u32::from(self.visibility_mask));
        push_u32(&mut out, self.matrices.len() as u32);

        for matrix in &self.matrices {
            out.push(matrix.name.len() as u8);
            out.extend_from_slice(matrix.name.as_bytes());
            for s in matrix.size {
                push_u32(&mut out, s);
            }
            for p in matrix.position {
                push_i32(&mut out, p);
            }
            let packed: Vec<u32> = matrix.cells.iter().map(|&c| self.pack(c)).collect();
            if self.compressed {
                let slice = (matrix.size[0] * matrix.size[1]) as usize;
                for cells in packed.chunks(slice.max(1)) {
                    write_rle_slice(&mut out, cells);
                }
            } else {
                for raw in packed {
                    push_u32(&mut out, raw);
                }
            }
        }
        out
    }
}

fn write_rle_slice(out: &mut Vec<u8>, cells: &[u32]) {
    let mut i = 0;
    while i < cells.len() {
        let raw = cells[i];
        let run = cells[i..].iter().take_while(|&&c| c == raw).count();
        if run > 1 || raw == 2 || raw == 6 {
            push_u32(out, 2);
            push_u32(out, run as u32);
        }
        push_u32(out, raw);
        i += run;
    }
    push_u32(out, 6);
}

/// Qubicle Binary Tree node.
#[derive(Debug, Clone)]
pub enum QbtNode {
    /// Leaf matrix.
    Matrix(QbtMatrix),
    /// Plain grouping node.
    Model(Vec<QbtNode>),
    /// Matrix with children.
    Compound(QbtMatrix, Vec<QbtNode>),
}

/// Matrix fields shared by matrix and compound nodes.
#[derive(Debug, Clone)]
pub struct QbtMatrix {
    name: String,
    position: [i32; 3],
    size: [u32; 3],
    /// Already-compressed cell payload.
    payload: Vec<u8>,
}

impl QbtMatrix {
    fn new(name: &str, position: [i32; 3], size: [u32; 3], cells: impl Fn(&mut [u8], usize)) -> Self {
        let [sx, sy, sz] = size.map(|s| s as usize);
        let mut raw = vec![0u8; sx * sy * sz * 4];
        cells(&mut raw, sy);
        Self {
            name: name.to_string(),
            position,
            size,
            payload: zlib(&raw),
        }
    }
}

/// Offset of cell `(x, y, z)` in x / z / y order.
fn qbt_offset(cell: [u32; 3], size: [u32; 3]) -> usize {
    let [x, y, z] = cell.map(|c| c as usize);
    let [_, sy, sz] = size.map(|s| s as usize);
    ((x * sz + z) * sy + y) * 4
}

impl QbtNode {
    /// Matrix with RGB cells.
    #[must_use]
    pub fn matrix(name: &str, position: [i32; 3], size: [u32; 3], cells: &[([u32; 3], Rgba)]) -> Self {
        Self::Matrix(QbtMatrix::new(name, position, size, |raw, _| {
            for &(cell, color) in cells {
                let at = qbt_offset(cell, size);
                raw[at..at + 4].copy_from_slice(&[color.r, color.g, color.b, 1]);
            }
        }))
    }

    /// Matrix whose cells index the file color map.
    #[must_use]
    pub fn indexed_matrix(name: &str, size: [u32; 3], cells: &[([u32; 3], u8)]) -> Self {
        Self::Matrix(QbtMatrix::new(name, [0; 3], size, |raw, _| {
            for &(cell, index) in cells {
                let at = qbt_offset(cell, size);
                raw[at..at + 4].copy_from_slice(&[index, 0, 0, 1]);
            }
        }))
    }

    /// Matrix with a verbatim (possibly corrupt) compressed payload.
    #[must_use]
    pub fn raw_matrix(name: &str, size: [u32; 3], payload: Vec<u8>) -> Self {
        Self::Matrix(QbtMatrix {
            name: name.to_string(),
            position: [0; 3],
            size,
            payload,
        })
    }

    /// Grouping node.
    #[must_use]
    pub fn model(children: Vec<QbtNode>) -> Self {
        Self::Model(children)
    }

    /// Matrix with children placed relative to it.
    #[must_use]
    pub fn compound(
        name: &str,
        position: [i32; 3],
        size: [u32; 3],
        cells: &[([u32; 3], Rgba)],
        children: Vec<QbtNode>,
    ) -> Self {
        match Self::matrix(name, position, size, cells) {
            Self::Matrix(matrix) => Self::Compound(matrix, children),
            other => other,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        let mut data = Vec::new();
        let node_type = match self {
            Self::Matrix(matrix) => {
                write_qbt_matrix(&mut data, matrix);
                0
            }
            Self::Model(children) => {
                write_qbt_children(&mut data, children);
                1
            }
            Self::Compound(matrix, children) => {
                write_qbt_matrix(&mut data, matrix);
                write_qbt_children(&mut data, children);
                2
            }
        };
        push_u32(out, node_type);
        push_u32(out, data.len() as u32);
        out.extend_from_slice(&data);
    }
}

fn write_qbt_matrix(data: &mut Vec<u8>, matrix: &QbtMatrix) {
    push_u32(data, matrix.name.len() as u32);
    data.extend_from_slice(matrix.name.as_bytes());
    for p in matrix.position {
        push_i32(data, p);
    }
    for _ in 0..3 {
        push_u32(data, 1);
    }
    for _ in 0..3 {
        push_f32(data, 0.0);
    }
    for s in matrix.size {
        push_u32(data, s);
    }
    push_u32(data, matrix.payload.len() as u32);
    data.extend_from_slice(&matrix.payload);
}

fn write_qbt_children(data: &mut Vec<u8>, children: &[QbtNode]) {
    push_u32(data, children.len() as u32);
    for child in children {
        child.write(data);
    }
}

/// Builds `.qbt` files.
#[derive(Debug, Clone, Default)]
pub struct QbtBuilder {
    color_map: Vec<Rgba>,
    root: Option<QbtNode>,
}

impl QbtBuilder {
    /// Starts an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a `COLORMAP` section.
    #[must_use]
    pub fn color_map(mut self, colors: &[Rgba]) -> Self {
        self.color_map = colors.to_vec();
        self
    }

    /// Sets the root node.
    #[must_use]
    pub fn root(mut self, node: QbtNode) -> Self {
        self.root = Some(node);
        self
    }

    /// Finishes the file.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut out = b"QB 2".to_vec();
        out.extend_from_slice(&[1, 0]);
        for _ in 0..3 {
            push_f32(&mut out, 1.0);
        }
        if !self.color_map.is_empty() {
            out.extend_from_slice(b"COLORMAP");
            push_u32(&mut out, self.color_map.len() as u32);
            for &color in &self.color_map {
                push_rgba(&mut out, color);
            }
        }
        out.extend_from_slice(b"DATATREE");
        match &self.root {
            Some(node) => node.write(&mut out),
            None => QbtNode::Model(Vec::new()).write(&mut out),
        }
        out
    }
}
