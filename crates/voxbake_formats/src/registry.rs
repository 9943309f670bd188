//! Decoder registry.
//!
//! Picks a decoder by file extension, falling back to probing each
//! registered decoder's magic bytes.

use std::path::Path;

use tracing::debug;
use voxbake_core::{ContainerFormat, VoxelScene};

use crate::error::{DecodeError, DecodeResult};
use crate::{qbt, qubicle, vengi, vox};

/// A container decoder.
pub trait VoxelDecoder: Send + Sync {
    /// Format this decoder reads.
    fn format(&self) -> ContainerFormat;

    /// File extensions claimed by this decoder, lowercase and without a dot.
    fn extensions(&self) -> &'static [&'static str];

    /// True when `bytes` start with this format's magic.
    fn probe(&self, bytes: &[u8]) -> bool;

    /// Decodes a whole file.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`] the format reports.
    fn decode(&self, bytes: &[u8]) -> DecodeResult<VoxelScene>;
}

/// MagicaVoxel `.vox`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoxDecoder;

/// vengi `.vengi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VengiDecoder;

/// Qubicle `.qb`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QubicleDecoder;

/// Qubicle Binary Tree `.qbt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QubicleTreeDecoder;

impl VoxelDecoder for VoxDecoder {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::MagicaVoxel
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["vox"]
    }

    fn probe(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&vox::VOX_MAGIC)
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<VoxelScene> {
        vox::decode(bytes)
    }
}

impl VoxelDecoder for VengiDecoder {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Vengi
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["vengi"]
    }

    fn probe(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&vengi::VENGI_MAGIC)
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<VoxelScene> {
        vengi::decode(bytes)
    }
}

impl VoxelDecoder for QubicleDecoder {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Qubicle
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["qb"]
    }

    fn probe(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&qubicle::QB_VERSION)
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<VoxelScene> {
        qubicle::decode(bytes)
    }
}

impl VoxelDecoder for QubicleTreeDecoder {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::QubicleTree
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["qbt"]
    }

    fn probe(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&qbt::QBT_MAGIC)
    }

    fn decode(&self, bytes: &[u8]) -> DecodeResult<VoxelScene> {
        qbt::decode(bytes)
    }
}

/// Ordered list of decoders.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn VoxelDecoder>>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DecoderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// Creates a registry holding every built-in decoder.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(VoxDecoder));
        registry.register(Box::new(VengiDecoder));
        registry.register(Box::new(QubicleDecoder));
        registry.register(Box::new(QubicleTreeDecoder));
        registry
    }

    /// Adds a decoder. Later registrations for the same format win.
    pub fn register(&mut self, decoder: Box<dyn VoxelDecoder>) {
        self.decoders.retain(|d| d.format() != decoder.format());
        self.decoders.push(decoder);
    }

    /// Formats with a registered decoder.
    pub fn formats(&self) -> impl Iterator<Item = ContainerFormat> + '_ {
        self.decoders.iter().map(|d| d.format())
    }

    /// Decoder for a format.
    #[must_use]
    pub fn find(&self, format: ContainerFormat) -> Option<&dyn VoxelDecoder> {
        self.decoders
            .iter()
            .find(|d| d.format() == format)
            .map(|decoder| decoder.as_ref())
    }

    /// Decoder claiming a file extension, ignoring case and a leading dot.
    #[must_use]
    pub fn find_by_extension(&self, extension: &str) -> Option<&dyn VoxelDecoder> {
        let extension = extension.trim_start_matches('.');
        self.decoders
            .iter()
            .find(|d| d.extensions().iter().any(|e| e.eq_ignore_ascii_case(extension)))
            .map(|decoder| decoder.as_ref())
    }

    /// First decoder whose magic matches.
    #[must_use]
    pub fn probe(&self, bytes: &[u8]) -> Option<&dyn VoxelDecoder> {
        self.decoders.iter().find(|d| d.probe(bytes)).map(|decoder| decoder.as_ref())
    }

    /// Decodes bytes, choosing the decoder by extension hint first.
    ///
    /// A recognized extension commits to its decoder; a header mismatch is
    /// then reported rather than retried with another format.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` when nothing matches, otherwise whatever the
    /// chosen decoder reports.
    pub fn decode(&self, bytes: &[u8], extension: Option<&str>) -> DecodeResult<VoxelScene> {
        let by_extension = extension.and_then(|ext| self.find_by_extension(ext));
        let decoder = match by_extension {
            Some(decoder) => decoder,
            None => self.probe(bytes).ok_or_else(|| {
                DecodeError::UnsupportedFormat(extension.map_or_else(
                    || "unrecognized magic".to_string(),
                    |ext| format!("unrecognized extension '{ext}'"),
                ))
            })?,
        };
        debug!(format = %decoder.format(), len = bytes.len(), "decoding container");
        decoder.decode(bytes)
    }

    /// Reads a whole file and decodes it.
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, otherwise as [`Self::decode`].
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> DecodeResult<VoxelScene> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.decode(&bytes, extension)
    }
}

/// Decodes bytes with the built-in decoders, probing magic only.
///
/// # Errors
///
/// As [`DecoderRegistry::decode`].
pub fn decode(bytes: &[u8]) -> DecodeResult<VoxelScene> {
    DecoderRegistry::with_defaults().decode(bytes, None)
}
