//! Asset loading: environment maps and glTF meshes.
//!
//! Loaders are plain blocking functions; the viewer runs them off the render
//! thread and hands the results back as completion messages. Every failure is
//! returned as an [`AssetError`] so the caller can decide on a fallback.

mod draco;
mod environment;
mod mesh;
mod ply;

use std::path::{Path, PathBuf};

use assetview_scene::EnvironmentMap;

pub use draco::{DRACO_TOOL, DracoToolDecoder};
pub use environment::{load_cubemap, load_panorama};
pub use mesh::{CompressedMeshDecoder, DRACO_EXTENSION, MeshAsset, MeshLoader, MeshPrimitive};

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("cubemap face {path} is {width}x{height}, expected {expected}x{expected}")]
    CubemapFace {
        path: String,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error("invalid glTF manifest {path}: {source}")]
    Manifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to import glTF {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("{path} requires {extension} but no decoder is bound to {decoder_dir}")]
    UnsupportedCompression {
        path: String,
        extension: String,
        decoder_dir: String,
    },
    #[error("decoder {0} does not exist")]
    DecoderMissing(String),
    #[error("failed to run {tool}: {source}")]
    DecoderTool {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("invalid buffer data in {path}: {reason}")]
    Buffer { path: String, reason: String },
    #[error("{0} contains no triangle meshes")]
    NoMeshes(String),
    #[error("primitive in {0} has no POSITION attribute")]
    MissingPositions(String),
}

/// Where the viewer's loaders get their data from.
///
/// Implementations must be shareable with loader threads.
pub trait AssetSource: Send + Sync + 'static {
    fn load_panorama(&self, path: &Path) -> Result<EnvironmentMap, AssetError>;
    fn load_cubemap(&self, faces: &[PathBuf; 6]) -> Result<EnvironmentMap, AssetError>;
    fn load_mesh(&self, path: &Path) -> Result<MeshAsset, AssetError>;
}

/// Filesystem-backed source resolving relative paths under a deployment root.
pub struct FsAssetSource {
    root: PathBuf,
    meshes: MeshLoader,
}

impl FsAssetSource {
    /// `decoder_dir` is resolved under `root` like every other asset path.
    pub fn new(root: impl Into<PathBuf>, decoder_dir: impl AsRef<Path>) -> Self {
        let root = root.into();
        let meshes = MeshLoader::new(root.join(decoder_dir));
        Self { root, meshes }
    }

    /// Bind a decoder for compressed mesh primitives.
    pub fn with_compressed_decoder(mut self, decoder: Box<dyn CompressedMeshDecoder>) -> Self {
        self.meshes = self.meshes.with_compressed_decoder(decoder);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl AssetSource for FsAssetSource {
    fn load_panorama(&self, path: &Path) -> Result<EnvironmentMap, AssetError> {
        load_panorama(&self.resolve(path))
    }

    fn load_cubemap(&self, faces: &[PathBuf; 6]) -> Result<EnvironmentMap, AssetError> {
        let resolved = faces.clone().map(|face| self.resolve(&face));
        load_cubemap(&resolved)
    }

    fn load_mesh(&self, path: &Path) -> Result<MeshAsset, AssetError> {
        self.meshes.load(&self.resolve(path))
    }
}

pub(crate) fn display(path: &Path) -> String {
    path.display().to_string()
}
