//! Decode → mesh → bake orchestration.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};
use voxbake_core::{ContainerFormat, Palette, VoxelModel, VoxelScene};
use voxbake_formats::{DecodeError, DecoderRegistry};
use voxbake_rendering::{pack, to_output, AtlasImage, GreedyMesher, MeshBuffers, PackError, PackSettings};

use crate::config::{BakeConfig, ConfigError};

/// Pipeline failures.
#[derive(Debug, Error)]
pub enum BakeError {
    /// The container could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A model's quads did not fit the atlas.
    #[error("failed to bake model '{model}': {source}")]
    Pack {
        /// Name of the model.
        model: String,
        /// Packer failure.
        #[source]
        source: PackError,
    },

    /// Writing output failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the atlas image failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for the pipeline.
pub type BakeResult<T> = Result<T, BakeError>;

/// Material parameters for consumers. Voxel art is matte and must not be
/// filtered, or neighbouring atlas blocks bleed into each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialHint {
    /// Specular glossiness in `[0, 1]`.
    pub glossiness: f32,
    /// Sample the atlas with nearest-neighbour filtering.
    pub point_filtered: bool,
}

impl Default for MaterialHint {
    fn default() -> Self {
        Self {
            glossiness: 0.0,
            point_filtered: true,
        }
    }
}

/// One baked model.
#[derive(Debug, Clone)]
pub struct BakedModel {
    /// Model name, or `model_<index>` when the container has none.
    pub name: String,
    /// Triangle mesh, centered on the origin.
    pub mesh: MeshBuffers,
    /// Texture atlas the mesh UVs point into.
    pub atlas: AtlasImage,
    /// Material parameters.
    pub material: MaterialHint,
    /// Model center in output space, scaled.
    pub placement: [f32; 3],
    /// Per-model palette override.
    pub palette: Option<Palette>,
}

/// A baked scene, models in container order.
#[derive(Debug, Clone)]
pub struct BakedScene {
    /// Source container.
    pub format: ContainerFormat,
    /// Container version tag.
    pub version: u32,
    /// Baked models. Models without geometry are skipped.
    pub models: Vec<BakedModel>,
    /// Scene palette.
    pub palette: Palette,
}

impl BakedScene {
    /// Total triangle count across models.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.models.iter().map(|m| m.mesh.triangle_count()).sum()
    }
}

/// Mesher scratch buffers shared between bake runs.
#[derive(Default)]
struct MesherPool {
    idle: Mutex<Vec<GreedyMesher>>,
}

impl MesherPool {
    fn checkout(&self) -> PooledMesher<'_> {
        let mesher = self.idle.lock().pop().unwrap_or_default();
        PooledMesher { pool: self, mesher }
    }
}

/// Returns its mesher to the pool on drop.
struct PooledMesher<'a> {
    pool: &'a MesherPool,
    mesher: GreedyMesher,
}

impl Deref for PooledMesher<'_> {
    type Target = GreedyMesher;

    fn deref(&self) -> &GreedyMesher {
        &self.mesher
    }
}

impl DerefMut for PooledMesher<'_> {
    fn deref_mut(&mut self) -> &mut GreedyMesher {
        &mut self.mesher
    }
}

impl Drop for PooledMesher<'_> {
    fn drop(&mut self) {
        self.pool.idle.lock().push(std::mem::take(&mut self.mesher));
    }
}

/// Bakes voxel containers into textured meshes.
///
/// A `Baker` is reusable; mesher scratch memory survives between scenes.
pub struct Baker {
    config: BakeConfig,
    registry: DecoderRegistry,
    meshers: MesherPool,
}

impl Baker {
    /// Creates a baker with the built-in decoders.
    ///
    /// # Errors
    ///
    /// `Config` when the configuration fails validation.
    pub fn new(config: BakeConfig) -> BakeResult<Self> {
        Self::with_registry(config, DecoderRegistry::with_defaults())
    }

    /// Creates a baker with a custom decoder set.
    ///
    /// # Errors
    ///
    /// `Config` when the configuration fails validation.
    pub fn with_registry(config: BakeConfig, registry: DecoderRegistry) -> BakeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            meshers: MesherPool::default(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BakeConfig {
        &self.config
    }

    /// Decodes and bakes a file, picking the decoder by extension first.
    ///
    /// # Errors
    ///
    /// `Decode` for unreadable or malformed input, `Pack` when a model
    /// overflows the atlas.
    pub fn bake_file<P: AsRef<Path>>(&self, path: P) -> BakeResult<BakedScene> {
        let path = path.as_ref();
        let scene = self.registry.decode_file(path)?;
        info!(
            path = %path.display(),
            format = %scene.format,
            models = scene.models.len(),
            voxels = scene.voxel_count(),
            "decoded scene"
        );
        self.bake_scene(&scene)
    }

    /// Decodes and bakes in-memory bytes.
    ///
    /// # Errors
    ///
    /// As [`Self::bake_file`].
    pub fn bake_bytes(&self, bytes: &[u8], extension: Option<&str>) -> BakeResult<BakedScene> {
        let scene = self.registry.decode(bytes, extension)?;
        self.bake_scene(&scene)
    }

    /// Meshes and packs every model of a decoded scene.
    ///
    /// Output order equals model order whether or not models are baked in
    /// parallel.
    ///
    /// # Errors
    ///
    /// `Pack` for the first model (in model order) that overflows the atlas.
    pub fn bake_scene(&self, scene: &VoxelScene) -> BakeResult<BakedScene> {
        let start = Instant::now();
        let settings = self.config.pack_settings();

        let results: Vec<BakeResult<Option<BakedModel>>> = if self.config.parallel {
            scene
                .models
                .par_iter()
                .enumerate()
                .map_init(
                    || self.meshers.checkout(),
                    |mesher, (index, model)| self.bake_model(mesher, index, model, &scene.palette, &settings),
                )
                .collect()
        } else {
            let mut mesher = self.meshers.checkout();
            scene
                .models
                .iter()
                .enumerate()
                .map(|(index, model)| self.bake_model(&mut mesher, index, model, &scene.palette, &settings))
                .collect()
        };

        let models = results
            .into_iter()
            .filter_map(Result::transpose)
            .collect::<BakeResult<Vec<_>>>()?;

        let baked = BakedScene {
            format: scene.format,
            version: scene.version,
            models,
            palette: scene.palette.clone(),
        };
        info!(
            models = baked.models.len(),
            skipped = scene.models.len() - baked.models.len(),
            triangles = baked.triangle_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "baked scene"
        );
        Ok(baked)
    }

    fn bake_model(
        &self,
        mesher: &mut GreedyMesher,
        index: usize,
        model: &VoxelModel,
        scene_palette: &Palette,
        settings: &PackSettings,
    ) -> BakeResult<Option<BakedModel>> {
        let name = model.name.clone().unwrap_or_else(|| format!("model_{index}"));
        let quads = mesher.mesh(model, model.effective_palette(scene_palette), self.config.max_quad_size);
        if quads.is_empty() {
            debug!(model = %name, "model has no geometry, skipping");
            return Ok(None);
        }

        let (atlas, mesh) = pack(&quads, model.size, settings).map_err(|source| BakeError::Pack {
            model: name.clone(),
            source,
        })?;

        let placement = to_output(model.center()).map(|c| c * self.config.scale);
        info!(
            model = %name,
            quads = quads.len(),
            triangles = mesh.triangle_count(),
            atlas_width = atlas.width,
            atlas_height = atlas.height,
            "baked model"
        );

        Ok(Some(BakedModel {
            name,
            mesh,
            atlas,
            material: MaterialHint::default(),
            placement,
            palette: model.palette.clone(),
        }))
    }
}

/// Bakes a decoded scene with a one-off [`Baker`].
///
/// # Errors
///
/// `Config` for an invalid configuration, otherwise as [`Baker::bake_scene`].
pub fn bake_scene(scene: &VoxelScene, config: &BakeConfig) -> BakeResult<BakedScene> {
    Baker::new(*config)?.bake_scene(scene)
}

/// Decodes and bakes a file with a one-off [`Baker`].
///
/// # Errors
///
/// `Config` for an invalid configuration, otherwise as [`Baker::bake_file`].
pub fn bake_file<P: AsRef<Path>>(path: P, config: &BakeConfig) -> BakeResult<BakedScene> {
    Baker::new(*config)?.bake_file(path)
}
