//! `voxbake` command line.
//!
//! ```text
//! voxbake model.vox -o out/ -c bake.toml --max-quad-size 32 -v
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use voxbake::{export_scene, BakeConfig, BakeResult, Baker};

#[derive(Debug, Parser)]
#[command(name = "voxbake", version, about = "Bake voxel models into textured meshes")]
struct Args {
    /// Input container (.vox, .vengi, .qb, .qbt)
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Longest quad edge in voxels
    #[arg(long)]
    max_quad_size: Option<u32>,

    /// Largest atlas side, a power of two
    #[arg(long)]
    atlas_max_size: Option<u32>,

    /// Output units per voxel
    #[arg(long)]
    scale: Option<f32>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> BakeResult<()> {
    let mut config = match &args.config {
        Some(path) => BakeConfig::load(path)?,
        None => BakeConfig::default(),
    };
    if let Some(size) = args.max_quad_size {
        config.max_quad_size = size;
    }
    if let Some(size) = args.atlas_max_size {
        config.atlas_max_size = size;
        config.atlas_base_size = config.atlas_base_size.min(size);
    }
    if let Some(scale) = args.scale {
        config.scale = scale;
    }

    let baker = Baker::new(config)?;
    let scene = baker.bake_file(&args.input)?;
    let files = export_scene(&scene, &args.output, config.front_face)?;

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        models = files.len(),
        triangles = scene.triangle_count(),
        "done"
    );
    Ok(())
}
