//! File exporters: PNG atlases and Wavefront OBJ/MTL.
//!
//! OBJ places `v = 0` at the bottom of the texture and treats
//! counter-clockwise triangles as front-facing. Both are converted on
//! write, so the files look the same in any OBJ viewer regardless of the
//! winding the scene was baked with.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use voxbake_rendering::{AtlasImage, FrontFace};

use crate::pipeline::{BakeResult, BakedModel, BakedScene};

/// Files written for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedModel {
    /// Wavefront geometry.
    pub obj: PathBuf,
    /// Material library.
    pub mtl: PathBuf,
    /// Texture atlas.
    pub png: PathBuf,
}

/// Writes an atlas as an 8-bit RGBA PNG.
///
/// # Errors
///
/// `Image` when encoding or writing fails.
pub fn write_atlas_png<P: AsRef<Path>>(atlas: &AtlasImage, path: P) -> BakeResult<()> {
    image::save_buffer_with_format(
        path.as_ref(),
        atlas.as_bytes(),
        atlas.width,
        atlas.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )?;
    Ok(())
}

/// Writes `<stem>.obj`, `<stem>.mtl` and `<stem>.png` into `dir`.
///
/// `front_face` is the winding the model was baked with.
///
/// # Errors
///
/// `Io` or `Image` when a file cannot be written.
pub fn write_obj<P: AsRef<Path>>(
    model: &BakedModel,
    dir: P,
    stem: &str,
    front_face: FrontFace,
) -> BakeResult<ExportedModel> {
    let dir = dir.as_ref();
    let files = ExportedModel {
        obj: dir.join(format!("{stem}.obj")),
        mtl: dir.join(format!("{stem}.mtl")),
        png: dir.join(format!("{stem}.png")),
    };

    write_atlas_png(&model.atlas, &files.png)?;
    write_mtl(model, &files.mtl, stem)?;
    write_geometry(model, &files.obj, stem, front_face)?;

    debug!(model = %model.name, path = %files.obj.display(), "exported model");
    Ok(files)
}

/// Exports every model of a scene into `dir`, creating it if needed.
///
/// File stems are the model names made filesystem-safe; duplicates get an
/// index suffix.
///
/// # Errors
///
/// `Io` or `Image` when a file cannot be written.
pub fn export_scene<P: AsRef<Path>>(
    scene: &BakedScene,
    dir: P,
    front_face: FrontFace,
) -> BakeResult<Vec<ExportedModel>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut used = HashSet::new();
    let mut exported = Vec::with_capacity(scene.models.len());
    for (index, model) in scene.models.iter().enumerate() {
        let stem = unique_stem(&file_stem(&model.name), index, &mut used);
        exported.push(write_obj(model, dir, &stem, front_face)?);
    }
    Ok(exported)
}

/// Claims `base`, or `base_<index>`, `base_<index>_1`, ... when taken.
fn unique_stem(base: &str, index: usize, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let suffixed = format!("{base}_{index}");
    let mut candidate = suffixed.clone();
    let mut attempt = 0usize;
    while !used.insert(candidate.clone()) {
        attempt += 1;
        candidate = format!("{suffixed}_{attempt}");
    }
    candidate
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "model".to_string()
    } else {
        stem
    }
}

fn write_mtl(model: &BakedModel, path: &Path, stem: &str) -> BakeResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "newmtl {stem}")?;
    writeln!(out, "Ka 1.000 1.000 1.000")?;
    writeln!(out, "Kd 1.000 1.000 1.000")?;
    writeln!(out, "Ks 0.000 0.000 0.000")?;
    writeln!(out, "Ns {:.3}", model.material.glossiness * 1000.0)?;
    writeln!(out, "illum 1")?;
    writeln!(out, "map_Kd {stem}.png")?;
    out.flush()?;
    Ok(())
}

fn write_geometry(model: &BakedModel, path: &Path, stem: &str, front_face: FrontFace) -> BakeResult<()> {
    let mesh = &model.mesh;
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "# {}", model.name)?;
    writeln!(out, "mtllib {stem}.mtl")?;
    writeln!(out, "o {stem}")?;

    for p in &mesh.positions {
        writeln!(out, "v {:.6} {:.6} {:.6}", p[0], p[1], p[2])?;
    }
    for uv in &mesh.uvs {
        writeln!(out, "vt {:.6} {:.6}", uv[0], 1.0 - uv[1])?;
    }
    for n in &mesh.normals {
        writeln!(out, "vn {:.6} {:.6} {:.6}", n[0], n[1], n[2])?;
    }

    writeln!(out, "usemtl {stem}")?;
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] + 1, tri[1] + 1, tri[2] + 1];
        let (b, c) = match front_face {
            FrontFace::CounterClockwise => (b, c),
            FrontFace::Clockwise => (c, b),
        };
        writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
    }
    out.flush()?;
    Ok(())
}
