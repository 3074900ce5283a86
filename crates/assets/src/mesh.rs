use std::path::{Path, PathBuf};

use assetview_common::Transform;
use assetview_scene::{Geometry, Material, StandardMaterial};
use glam::Mat4;
use serde::Deserialize;

use crate::{AssetError, display};

/// glTF extension name for Draco-compressed primitives.
pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// One drawable primitive of a loaded asset, flattened to its world transform.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPrimitive {
    pub name: String,
    pub transform: Transform,
    pub geometry: Geometry,
    pub material: Material,
}

/// A loaded mesh asset ready to be inserted into the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAsset {
    pub name: String,
    pub primitives: Vec<MeshPrimitive>,
}

impl MeshAsset {
    pub fn triangle_count(&self) -> usize {
        self.primitives
            .iter()
            .map(|p| p.geometry.triangle_count())
            .sum()
    }
}

/// Decoder for compressed mesh payloads.
///
/// The loader never interprets compressed geometry itself; it hands the whole
/// document to the bound decoder together with the decoder-asset directory.
pub trait CompressedMeshDecoder: Send + Sync {
    /// Extension this decoder handles.
    fn extension(&self) -> &str {
        DRACO_EXTENSION
    }

    fn decode(&self, path: &Path, decoder_dir: &Path) -> Result<MeshAsset, AssetError>;
}

/// The parts of a glTF document's JSON the loader inspects before importing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GltfManifest {
    #[serde(default)]
    extensions_required: Vec<String>,
}

impl GltfManifest {
    fn parse(path: &Path, bytes: &[u8]) -> Result<Self, AssetError> {
        let json = if bytes.starts_with(b"glTF") {
            gltf::Glb::from_slice(bytes)
                .map_err(|source| AssetError::Gltf {
                    path: display(path),
                    source,
                })?
                .json
                .into_owned()
        } else {
            bytes.to_vec()
        };
        serde_json::from_slice(&json).map_err(|source| AssetError::Manifest {
            path: display(path),
            source,
        })
    }

    fn requires(&self, extension: &str) -> bool {
        self.extensions_required.iter().any(|e| e == extension)
    }
}

/// glTF mesh loader bound to a fixed decoder-asset directory.
pub struct MeshLoader {
    decoder_dir: PathBuf,
    compressed: Option<Box<dyn CompressedMeshDecoder>>,
}

impl MeshLoader {
    pub fn new(decoder_dir: impl Into<PathBuf>) -> Self {
        Self {
            decoder_dir: decoder_dir.into(),
            compressed: None,
        }
    }

    pub fn with_compressed_decoder(mut self, decoder: Box<dyn CompressedMeshDecoder>) -> Self {
        self.compressed = Some(decoder);
        self
    }

    pub fn decoder_dir(&self) -> &Path {
        &self.decoder_dir
    }

    /// Load a glTF or GLB file.
    ///
    /// Documents that require a compression extension are delegated to the bound
    /// decoder; everything else is imported directly.
    pub fn load(&self, path: &Path) -> Result<MeshAsset, AssetError> {
        let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
            path: display(path),
            source,
        })?;
        let manifest = GltfManifest::parse(path, &bytes)?;

        if manifest.requires(DRACO_EXTENSION) {
            return self.decode_compressed(path, DRACO_EXTENSION);
        }
        import(path)
    }

    fn decode_compressed(&self, path: &Path, extension: &str) -> Result<MeshAsset, AssetError> {
        if !self.decoder_dir.is_dir() {
            return Err(AssetError::DecoderMissing(display(&self.decoder_dir)));
        }
        match &self.compressed {
            Some(decoder) if decoder.extension() == extension => {
                tracing::debug!(
                    path = %path.display(),
                    decoder_dir = %self.decoder_dir.display(),
                    "delegating compressed mesh"
                );
                decoder.decode(path, &self.decoder_dir)
            }
            _ => Err(AssetError::UnsupportedCompression {
                path: display(path),
                extension: extension.to_string(),
                decoder_dir: display(&self.decoder_dir),
            }),
        }
    }
}

fn import(path: &Path) -> Result<MeshAsset, AssetError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: display(path),
        source,
    })?;

    let mut primitives = Vec::new();
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        for node in scene.nodes() {
            collect(path, node, Mat4::IDENTITY, &buffers, &mut primitives)?;
        }
    }
    if primitives.is_empty() {
        return Err(AssetError::NoMeshes(display(path)));
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".into());
    tracing::debug!(%name, primitives = primitives.len(), "imported glTF");
    Ok(MeshAsset { name, primitives })
}

fn collect(
    path: &Path,
    node: gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshPrimitive>,
) -> Result<(), AssetError> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or("mesh");
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or_else(|| AssetError::MissingPositions(display(path)))?
                .collect();
            let normals = reader.read_normals().map(|n| n.collect());
            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let pbr = primitive.material().pbr_metallic_roughness();
            let material = Material::Standard(StandardMaterial {
                base_color: pbr.base_color_factor(),
                metallic: pbr.metallic_factor(),
                roughness: pbr.roughness_factor(),
                ..StandardMaterial::default()
            });

            out.push(MeshPrimitive {
                name: format!("{mesh_name}_{}", primitive.index()),
                transform: Transform::from_matrix(world),
                geometry: Geometry::new(positions, normals, indices),
                material,
            });
        }
    }

    for child in node.children() {
        collect(path, child, world, buffers, out)?;
    }
    Ok(())
}
