//! Fixed viewer setup: asset locations, camera, orbit bounds, lights and
//! panel controls. Only the deployment root is chosen at runtime.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use assetview_assets::{DracoToolDecoder, FsAssetSource};
use assetview_scene::LightKind;
use glam::Vec3;

pub const MESH_PATH: &str = "uploads/doorPDraco.gltf";
pub const PANORAMA_PATH: &str = "uploads/HDR1.hdr";
pub const CUBEMAP_DIR: &str = "envmap";
/// Face order: +x, -x, +y, -y, +z, -z.
pub const CUBEMAP_FACES: [&str; 6] = ["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"];
pub const DECODER_DIR: &str = "draco/";

pub const CAMERA_FOV_DEGREES: f32 = 10.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 100.0;
pub const CAMERA_POSITION: Vec3 = Vec3::new(15.0, 5.0, 15.0);
pub const CAMERA_TARGET: Vec3 = Vec3::ZERO;

pub const ORBIT_DAMPING_FACTOR: f32 = 0.05;
pub const ORBIT_MIN_DISTANCE: f32 = 1.0;
pub const ORBIT_MAX_DISTANCE: f32 = 30.0;
pub const ORBIT_MIN_POLAR_ANGLE: f32 = PI * 0.2;
pub const ORBIT_MAX_POLAR_ANGLE: f32 = PI * 0.5;

pub const PANEL_TITLE: &str = "Scene";
pub const PANEL_FOLDER: &str = "Lights";
pub const PANEL_WIDTH: f32 = 400.0;
pub const PARAM_STEP: f32 = 0.0001;

pub const ENV_MAP_INTENSITY: f32 = 0.38;
pub const ENV_MAP_LABEL: &str = "EnvMap Intensity";
pub const ENV_MAP_MIN: f32 = 0.0;
pub const ENV_MAP_MAX: f32 = 20.0;

/// A light placed at mount, with its panel control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: LightKind,
    pub color: u32,
    pub intensity: f32,
    pub position: Vec3,
    pub min: f32,
    pub max: f32,
}

pub const LIGHTS: [LightSpec; 3] = [
    LightSpec {
        name: "ambient",
        label: "DL Intensity",
        kind: LightKind::Ambient,
        color: 0xffffff,
        intensity: 1.5,
        position: Vec3::ZERO,
        min: 1.0,
        max: 10.0,
    },
    LightSpec {
        name: "point-1",
        label: "Point Light 1",
        kind: LightKind::Point,
        color: 0xfcfffa,
        intensity: 5.0,
        position: Vec3::new(5.0, 5.0, 1.0),
        min: 1.0,
        max: 10.0,
    },
    LightSpec {
        name: "point-2",
        label: "Point Light 2",
        kind: LightKind::Point,
        color: 0xffffff,
        intensity: 6.0,
        position: Vec3::new(-6.0, 5.0, 8.0),
        min: 0.01,
        max: 10.0,
    },
];

/// Runtime viewer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Deployment root every asset path is resolved under.
    pub asset_root: PathBuf,
    /// Clear to a transparent background.
    pub alpha: bool,
    pub antialias: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ViewerConfig {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            alpha: true,
            antialias: true,
        }
    }

    pub fn mesh_path(&self) -> &Path {
        Path::new(MESH_PATH)
    }

    pub fn panorama_path(&self) -> &Path {
        Path::new(PANORAMA_PATH)
    }

    pub fn cubemap_paths(&self) -> [PathBuf; 6] {
        CUBEMAP_FACES.map(|face| Path::new(CUBEMAP_DIR).join(face))
    }

    /// Filesystem source rooted at [`asset_root`](Self::asset_root), decoding
    /// compressed meshes with the Draco tool in the decoder directory.
    pub fn asset_source(&self) -> FsAssetSource {
        FsAssetSource::new(&self.asset_root, DECODER_DIR)
            .with_compressed_decoder(Box::new(DracoToolDecoder::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubemap_faces_are_ordered_under_envmap() {
        let paths = ViewerConfig::default().cubemap_paths();
        assert_eq!(paths[0], Path::new("envmap/px.png"));
        assert_eq!(paths[5], Path::new("envmap/nz.png"));
    }

    #[test]
    fn asset_source_resolves_under_root() {
        let config = ViewerConfig::new("/srv/site");
        let source = config.asset_source();
        assert_eq!(
            source.resolve(config.mesh_path()),
            Path::new("/srv/site/uploads/doorPDraco.gltf")
        );
    }

    #[cfg(unix)]
    #[test]
    fn asset_source_decodes_compressed_door() {
        use assetview_assets::{AssetSource, DRACO_TOOL};
        use std::os::unix::fs::PermissionsExt;

        let site = tempfile::tempdir().unwrap();
        let root = site.path();
        let decoder_dir = root.join(DECODER_DIR);
        std::fs::create_dir_all(&decoder_dir).unwrap();
        std::fs::write(
            decoder_dir.join("door.ply"),
            "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\n\
property float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n\
0 0 0\n1 0 0\n1 2 0\n0 2 0\n4 0 1 2 3\n",
        )
        .unwrap();
        let tool = decoder_dir.join(DRACO_TOOL);
        std::fs::write(&tool, "#!/bin/sh\ncp \"$(dirname \"$0\")/door.ply\" \"$4\"\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        std::fs::create_dir_all(root.join("uploads")).unwrap();
        std::fs::write(root.join("uploads/door.bin"), b"DRACOpayload").unwrap();
        std::fs::write(
            root.join(MESH_PATH),
            r#"{ "asset": { "version": "2.0" },
                "extensionsRequired": ["KHR_draco_mesh_compression"],
                "scenes": [ { "nodes": [0] } ],
                "nodes": [ { "mesh": 0 } ],
                "meshes": [ { "primitives": [ { "attributes": {},
                    "extensions": { "KHR_draco_mesh_compression": { "bufferView": 0 } } } ] } ],
                "buffers": [ { "uri": "door.bin", "byteLength": 12 } ],
                "bufferViews": [ { "buffer": 0, "byteLength": 12 } ] }"#,
        )
        .unwrap();

        let config = ViewerConfig::new(root);
        let asset = config.asset_source().load_mesh(config.mesh_path()).unwrap();
        assert_eq!(asset.name, "doorPDraco");
        assert_eq!(asset.triangle_count(), 2);
    }

    #[test]
    fn light_bounds_contain_defaults() {
        for light in LIGHTS {
            assert!(light.min <= light.intensity && light.intensity <= light.max, "{}", light.name);
        }
        assert!((ENV_MAP_MIN..=ENV_MAP_MAX).contains(&ENV_MAP_INTENSITY));
    }
}
