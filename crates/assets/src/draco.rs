//! `KHR_draco_mesh_compression` primitives decoded by the Draco command-line
//! decoder shipped in the decoder-asset directory.
//!
//! The compressed payload of each primitive is cut out of its glTF buffer view,
//! handed to `draco_decoder -i <in.drc> -o <out.ply>`, and the decoded PLY is
//! read back as plain geometry. This module never interprets the Draco
//! bitstream itself.

use std::path::{Path, PathBuf};
use std::process::Command;

use assetview_common::Transform;
use assetview_scene::{Geometry, Material, StandardMaterial};
use base64::Engine as _;
use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;

use crate::mesh::{CompressedMeshDecoder, MeshAsset, MeshPrimitive};
use crate::{AssetError, display, ply};

/// File name of the decoder executable inside the decoder directory.
pub const DRACO_TOOL: &str = "draco_decoder";

const TRIANGLES: u32 = 4;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    scene: Option<usize>,
    #[serde(default)]
    scenes: Vec<SceneDef>,
    #[serde(default)]
    nodes: Vec<NodeDef>,
    #[serde(default)]
    meshes: Vec<MeshDef>,
    #[serde(default)]
    materials: Vec<MaterialDef>,
    #[serde(default)]
    buffer_views: Vec<BufferViewDef>,
    #[serde(default)]
    buffers: Vec<BufferDef>,
}

#[derive(Debug, Default, Deserialize)]
struct SceneDef {
    #[serde(default)]
    nodes: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeDef {
    mesh: Option<usize>,
    #[serde(default)]
    children: Vec<usize>,
    matrix: Option<[f32; 16]>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
}

impl NodeDef {
    fn local_matrix(&self) -> Mat4 {
        match self.matrix {
            Some(m) => Mat4::from_cols_array(&m),
            None => Mat4::from_scale_rotation_translation(
                self.scale.map_or(Vec3::ONE, Vec3::from),
                self.rotation.map_or(Quat::IDENTITY, Quat::from_array),
                self.translation.map_or(Vec3::ZERO, Vec3::from),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MeshDef {
    name: Option<String>,
    #[serde(default)]
    primitives: Vec<PrimitiveDef>,
}

#[derive(Debug, Deserialize)]
struct PrimitiveDef {
    material: Option<usize>,
    #[serde(default = "triangles")]
    mode: u32,
    #[serde(default)]
    extensions: PrimitiveExtensions,
}

fn triangles() -> u32 {
    TRIANGLES
}

#[derive(Debug, Default, Deserialize)]
struct PrimitiveExtensions {
    #[serde(rename = "KHR_draco_mesh_compression")]
    draco: Option<DracoPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DracoPayload {
    buffer_view: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaterialDef {
    #[serde(default)]
    pbr_metallic_roughness: PbrDef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PbrDef {
    #[serde(default = "opaque_white")]
    base_color_factor: [f32; 4],
    #[serde(default = "one")]
    metallic_factor: f32,
    #[serde(default = "one")]
    roughness_factor: f32,
}

impl Default for PbrDef {
    fn default() -> Self {
        Self {
            base_color_factor: opaque_white(),
            metallic_factor: 1.0,
            roughness_factor: 1.0,
        }
    }
}

fn opaque_white() -> [f32; 4] {
    [1.0; 4]
}

fn one() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferViewDef {
    buffer: usize,
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferDef {
    uri: Option<String>,
    byte_length: usize,
}

/// Runs the Draco command-line decoder found in the decoder directory.
#[derive(Debug, Clone)]
pub struct DracoToolDecoder {
    tool: String,
}

impl Default for DracoToolDecoder {
    fn default() -> Self {
        Self {
            tool: format!("{DRACO_TOOL}{}", std::env::consts::EXE_SUFFIX),
        }
    }
}

impl DracoToolDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool_path(&self, decoder_dir: &Path) -> PathBuf {
        decoder_dir.join(&self.tool)
    }

    fn run(&self, tool: &Path, payload: &[u8], scratch: &Path, n: usize) -> Result<ply::PlyMesh, AssetError> {
        let input = scratch.join(format!("primitive-{n}.drc"));
        let output = scratch.join(format!("primitive-{n}.ply"));
        std::fs::write(&input, payload).map_err(|source| AssetError::Read {
            path: display(&input),
            source,
        })?;

        let result = Command::new(tool)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .output()
            .map_err(|source| AssetError::DecoderTool {
                tool: display(tool),
                source,
            })?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AssetError::Decode {
                path: display(&input),
                reason: format!("{} exited with {}: {}", display(tool), result.status, stderr.trim()),
            });
        }

        let bytes = std::fs::read(&output).map_err(|source| AssetError::Read {
            path: display(&output),
            source,
        })?;
        ply::parse(&bytes).map_err(|reason| AssetError::Decode {
            path: display(&output),
            reason,
        })
    }
}

impl CompressedMeshDecoder for DracoToolDecoder {
    fn decode(&self, path: &Path, decoder_dir: &Path) -> Result<MeshAsset, AssetError> {
        let tool = self.tool_path(decoder_dir);
        if !tool.is_file() {
            return Err(AssetError::DecoderMissing(display(&tool)));
        }

        let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
            path: display(path),
            source,
        })?;
        let (json, bin) = split_glb(path, &bytes)?;
        let document: Document =
            serde_json::from_slice(&json).map_err(|source| AssetError::Manifest {
                path: display(path),
                source,
            })?;
        let buffers = load_buffers(path, &document, bin)?;

        let scratch = tempfile::tempdir().map_err(|source| AssetError::Read {
            path: display(&std::env::temp_dir()),
            source,
        })?;
        let mut walk = Walk {
            decoder: self,
            tool: &tool,
            scratch: scratch.path(),
            path,
            document: &document,
            buffers: &buffers,
            out: Vec::new(),
        };

        let scene = document.scene.or((!document.scenes.is_empty()).then_some(0));
        let roots = match scene {
            Some(scene) => document
                .scenes
                .get(scene)
                .map(|s| s.nodes.clone())
                .ok_or_else(|| invalid(path, format!("scene {scene} does not exist")))?,
            None => Vec::new(),
        };
        for root in roots {
            walk.node(root, Mat4::IDENTITY, 0)?;
        }

        let primitives = walk.out;
        if primitives.is_empty() {
            return Err(AssetError::NoMeshes(display(path)));
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".into());
        tracing::debug!(%name, primitives = primitives.len(), "decoded Draco asset");
        Ok(MeshAsset { name, primitives })
    }
}

/// Walk state for one document.
struct Walk<'a> {
    decoder: &'a DracoToolDecoder,
    tool: &'a Path,
    scratch: &'a Path,
    path: &'a Path,
    document: &'a Document,
    buffers: &'a [Vec<u8>],
    out: Vec<MeshPrimitive>,
}

impl<'a> Walk<'a> {
    fn node(&mut self, index: usize, parent: Mat4, depth: usize) -> Result<(), AssetError> {
        let document = self.document;
        if depth > document.nodes.len() {
            return Err(invalid(self.path, "node hierarchy contains a cycle".into()));
        }
        let node = document
            .nodes
            .get(index)
            .ok_or_else(|| invalid(self.path, format!("node {index} does not exist")))?;
        let world = parent * node.local_matrix();

        if let Some(mesh_index) = node.mesh {
            let mesh = document
                .meshes
                .get(mesh_index)
                .ok_or_else(|| invalid(self.path, format!("mesh {mesh_index} does not exist")))?;
            let mesh_name = mesh.name.as_deref().unwrap_or("mesh");
            for (i, primitive) in mesh.primitives.iter().enumerate() {
                if primitive.mode != TRIANGLES {
                    continue;
                }
                let Some(payload) = &primitive.extensions.draco else {
                    tracing::warn!(mesh = mesh_name, primitive = i, "uncompressed primitive skipped");
                    continue;
                };
                let data = self.view(payload.buffer_view)?;
                let decoded = self.decoder.run(self.tool, data, self.scratch, self.out.len())?;
                self.out.push(MeshPrimitive {
                    name: format!("{mesh_name}_{i}"),
                    transform: Transform::from_matrix(world),
                    geometry: Geometry::new(decoded.positions, decoded.normals, decoded.indices),
                    material: self.material(primitive.material),
                });
            }
        }

        for &child in &node.children {
            self.node(child, world, depth + 1)?;
        }
        Ok(())
    }

    fn view(&self, index: usize) -> Result<&'a [u8], AssetError> {
        let buffers = self.buffers;
        let view = self
            .document
            .buffer_views
            .get(index)
            .ok_or_else(|| invalid(self.path, format!("buffer view {index} does not exist")))?;
        let buffer = buffers
            .get(view.buffer)
            .ok_or_else(|| invalid(self.path, format!("buffer {} does not exist", view.buffer)))?;
        buffer
            .get(view.byte_offset..view.byte_offset + view.byte_length)
            .ok_or_else(|| invalid(self.path, format!("buffer view {index} exceeds its buffer")))
    }

    fn material(&self, index: Option<usize>) -> Material {
        let pbr = index
            .and_then(|i| self.document.materials.get(i))
            .map(|m| &m.pbr_metallic_roughness);
        match pbr {
            Some(pbr) => Material::Standard(StandardMaterial {
                base_color: pbr.base_color_factor,
                metallic: pbr.metallic_factor,
                roughness: pbr.roughness_factor,
                ..StandardMaterial::default()
            }),
            None => Material::default(),
        }
    }
}

fn invalid(path: &Path, reason: String) -> AssetError {
    AssetError::Buffer {
        path: display(path),
        reason,
    }
}

/// JSON chunk plus the binary chunk for GLB files; the whole file otherwise.
fn split_glb(path: &Path, bytes: &[u8]) -> Result<(Vec<u8>, Option<Vec<u8>>), AssetError> {
    if !bytes.starts_with(b"glTF") {
        return Ok((bytes.to_vec(), None));
    }
    let glb = gltf::Glb::from_slice(bytes).map_err(|source| AssetError::Gltf {
        path: display(path),
        source,
    })?;
    Ok((glb.json.into_owned(), glb.bin.map(|b| b.into_owned())))
}

fn load_buffers(path: &Path, document: &Document, mut bin: Option<Vec<u8>>) -> Result<Vec<Vec<u8>>, AssetError> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    document
        .buffers
        .iter()
        .enumerate()
        .map(|(i, buffer)| {
            let data = match buffer.uri.as_deref() {
                None => bin
                    .take()
                    .ok_or_else(|| invalid(path, format!("buffer {i} has no uri and no GLB chunk")))?,
                Some(uri) if uri.starts_with("data:") => {
                    let (_, encoded) = uri
                        .split_once(";base64,")
                        .ok_or_else(|| invalid(path, format!("buffer {i} data uri is not base64")))?;
                    base64::engine::general_purpose::STANDARD
                        .decode(encoded)
                        .map_err(|e| invalid(path, format!("buffer {i}: {e}")))?
                }
                Some(uri) => {
                    let file = base.join(uri);
                    std::fs::read(&file).map_err(|source| AssetError::Read {
                        path: display(&file),
                        source,
                    })?
                }
            };
            if data.len() < buffer.byte_length {
                return Err(invalid(
                    path,
                    format!("buffer {i} holds {} bytes, expected {}", data.len(), buffer.byte_length),
                ));
            }
            Ok(data)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MeshLoader;
    use base64::Engine as _;

    const PAYLOAD: &[u8] = b"DRACO\x02\x02\x01\x01compressed-door";

    fn decoded_triangle() -> String {
        "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
property float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n\
0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n"
            .into()
    }

    /// Draco-compressed document with the payload embedded as a data uri.
    fn write_document(dir: &Path) -> PathBuf {
        let encoded = base64::engine::general_purpose::STANDARD.encode(PAYLOAD);
        let json = format!(
            r#"{{
            "asset": {{ "version": "2.0" }},
            "extensionsUsed": ["KHR_draco_mesh_compression"],
            "extensionsRequired": ["KHR_draco_mesh_compression"],
            "scene": 0,
            "scenes": [ {{ "nodes": [0] }} ],
            "nodes": [ {{ "children": [1], "translation": [0.0, 2.0, 0.0] }}, {{ "mesh": 0 }} ],
            "meshes": [ {{ "name": "door", "primitives": [ {{
                "attributes": {{ "POSITION": 0 }},
                "material": 0,
                "extensions": {{ "KHR_draco_mesh_compression": {{ "bufferView": 0, "attributes": {{ "POSITION": 0 }} }} }}
            }} ] }} ],
            "materials": [ {{ "pbrMetallicRoughness": {{ "baseColorFactor": [0.5, 0.4, 0.3, 1.0], "metallicFactor": 0.0 }} }} ],
            "accessors": [ {{ "componentType": 5126, "count": 3, "type": "VEC3" }} ],
            "buffers": [ {{ "uri": "data:application/octet-stream;base64,{encoded}", "byteLength": {len} }} ],
            "bufferViews": [ {{ "buffer": 0, "byteOffset": 0, "byteLength": {len} }} ]
        }}"#,
            len = PAYLOAD.len()
        );
        let path = dir.join("doorPDraco.gltf");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[cfg(unix)]
    fn install_tool(dir: &Path, script: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::create_dir_all(dir).unwrap();
        let tool = dir.join(DRACO_TOOL);
        std::fs::write(&tool, script).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Stand-in decoder: records its input and writes a fixed PLY.
    #[cfg(unix)]
    fn install_recording_tool(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("decoded.ply"), decoded_triangle()).unwrap();
        install_tool(
            dir,
            "#!/bin/sh\nhere=$(dirname \"$0\")\ncp \"$2\" \"$here/received.drc\"\ncp \"$here/decoded.ply\" \"$4\"\n",
        );
    }

    #[cfg(unix)]
    #[test]
    fn decodes_compressed_document_through_tool() {
        let dir = tempfile::tempdir().unwrap();
        let decoder_dir = dir.path().join("draco");
        install_recording_tool(&decoder_dir);
        let path = write_document(dir.path());

        let asset = MeshLoader::new(&decoder_dir)
            .with_compressed_decoder(Box::new(DracoToolDecoder::new()))
            .load(&path)
            .unwrap();

        assert_eq!(asset.name, "doorPDraco");
        assert_eq!(asset.triangle_count(), 1);
        let prim = &asset.primitives[0];
        assert_eq!(prim.name, "door_0");
        assert_eq!(prim.transform.position, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(prim.geometry.normals.len(), 3);
        assert_eq!(prim.material.base_color(), [0.5, 0.4, 0.3, 1.0]);
        assert_eq!(std::fs::read(decoder_dir.join("received.drc")).unwrap(), PAYLOAD);
    }

    #[cfg(unix)]
    #[test]
    fn payload_read_from_external_buffer_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let decoder_dir = dir.path().join("draco");
        install_recording_tool(&decoder_dir);

        let mut bin = b"padding!".to_vec();
        bin.extend_from_slice(PAYLOAD);
        std::fs::write(dir.path().join("door.bin"), &bin).unwrap();
        let json = format!(
            r#"{{ "asset": {{ "version": "2.0" }},
            "scenes": [ {{ "nodes": [0] }} ],
            "nodes": [ {{ "mesh": 0 }} ],
            "meshes": [ {{ "primitives": [ {{ "attributes": {{}},
                "extensions": {{ "KHR_draco_mesh_compression": {{ "bufferView": 0 }} }} }} ] }} ],
            "buffers": [ {{ "uri": "door.bin", "byteLength": {total} }} ],
            "bufferViews": [ {{ "buffer": 0, "byteOffset": 8, "byteLength": {len} }} ] }}"#,
            total = bin.len(),
            len = PAYLOAD.len()
        );
        let path = dir.path().join("door.gltf");
        std::fs::write(&path, json).unwrap();

        let asset = DracoToolDecoder::new().decode(&path, &decoder_dir).unwrap();
        assert_eq!(asset.triangle_count(), 1);
        assert_eq!(asset.primitives[0].material, Material::default());
        assert_eq!(std::fs::read(decoder_dir.join("received.drc")).unwrap(), PAYLOAD);
    }

    #[cfg(unix)]
    #[test]
    fn tool_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let decoder_dir = dir.path().join("draco");
        install_tool(&decoder_dir, "#!/bin/sh\necho 'Failed to decode the input file' >&2\nexit 255\n");
        let path = write_document(dir.path());

        let err = DracoToolDecoder::new().decode(&path, &decoder_dir).unwrap_err();
        match err {
            AssetError::Decode { reason, .. } => assert!(reason.contains("Failed to decode")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_document(dir.path());
        let err = DracoToolDecoder::new()
            .decode(&path, &dir.path().join("draco"))
            .unwrap_err();
        assert!(matches!(err, AssetError::DecoderMissing(_)));
    }

    #[test]
    fn local_matrix_prefers_explicit_matrix() {
        let mut node = NodeDef {
            translation: Some([1.0, 2.0, 3.0]),
            ..NodeDef::default()
        };
        assert_eq!(node.local_matrix().w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
        node.matrix = Some(Mat4::from_translation(Vec3::X).to_cols_array());
        assert_eq!(node.local_matrix().w_axis.truncate(), Vec3::X);
    }
}
