use std::fmt::Write as _;

use assetview_common::SurfaceSize;
use assetview_scene::{LightKind, PerspectiveCamera, SceneGraph};

/// Errors from rendering a frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render surface has been disposed")]
    Disposed,
    #[error("render surface lost: {0}")]
    SurfaceLost(String),
}

/// A render surface plus the means to draw a scene into it.
///
/// The viewer owns exactly one backend per mount and drives it from the
/// render loop; the backend never mutates the scene.
pub trait RenderBackend {
    /// Resize the drawable surface.
    fn set_size(&mut self, size: SurfaceSize);

    /// Current drawable size.
    fn size(&self) -> SurfaceSize;

    /// Draw one frame of `scene` through `camera`.
    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera)
    -> Result<(), RenderError>;

    /// Release every resource held by the backend.
    fn dispose(&mut self);
}

/// Headless backend that renders frames as text.
///
/// Useful for the desktop app's headless mode, logging, and testing the
/// viewer lifecycle.
#[derive(Debug)]
pub struct DebugTextRenderer {
    size: SurfaceSize,
    frames: u64,
    last_frame: Option<String>,
    disposed: bool,
}

impl DebugTextRenderer {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            size,
            frames: 0,
            last_frame: None,
            disposed: false,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&str> {
        self.last_frame.as_deref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Text description of what a frame would contain.
    pub fn describe(scene: &SceneGraph, camera: &PerspectiveCamera, size: SurfaceSize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Frame {size} ===");
        let _ = writeln!(
            out,
            "Camera: eye=({:.2}, {:.2}, {:.2}) target=({:.2}, {:.2}, {:.2}) fov={:.0} aspect={:.4}",
            camera.position.x,
            camera.position.y,
            camera.position.z,
            camera.target.x,
            camera.target.y,
            camera.target.z,
            camera.fov_degrees,
            camera.aspect,
        );
        match scene.environment() {
            Some(env) => {
                let _ = writeln!(out, "Environment: {} ({})", env.label, env.source());
            }
            None => out.push_str("Environment: none\n"),
        }
        for (id, position, light) in scene.lights() {
            let kind = match light.kind {
                LightKind::Ambient => "ambient",
                LightKind::Point => "point",
            };
            let _ = writeln!(
                out,
                "  light [{}] {kind} intensity={:.4} pos=({:.2}, {:.2}, {:.2})",
                id.short(),
                light.intensity,
                position.x,
                position.y,
                position.z,
            );
        }
        let meshes = scene.meshes();
        let _ = writeln!(out, "Meshes: {}", meshes.len());
        for (id, _, mesh) in meshes {
            let name = scene.get(id).map(|n| n.name.as_str()).unwrap_or("?");
            let _ = writeln!(
                out,
                "  mesh [{}] {name} triangles={}{}",
                id.short(),
                mesh.geometry.triangle_count(),
                if mesh.placeholder { " placeholder" } else { "" },
            );
        }
        out
    }
}

impl RenderBackend for DebugTextRenderer {
    fn set_size(&mut self, size: SurfaceSize) {
        self.size = size;
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn render(
        &mut self,
        scene: &SceneGraph,
        camera: &PerspectiveCamera,
    ) -> Result<(), RenderError> {
        if self.disposed {
            return Err(RenderError::Disposed);
        }
        self.frames += 1;
        self.last_frame = Some(Self::describe(scene, camera, self.size));
        Ok(())
    }

    fn dispose(&mut self) {
        tracing::debug!(frames = self.frames, "text renderer disposed");
        self.disposed = true;
        self.last_frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetview_common::{Color, Transform};
    use assetview_scene::{Geometry, Light, Material, MeshNode, Node, NodeKind};
    use std::sync::Arc;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(10.0, 800.0 / 600.0, 0.1, 100.0)
    }

    #[test]
    fn empty_scene_frame() {
        let mut r = DebugTextRenderer::new(SurfaceSize::new(800, 600));
        r.render(&SceneGraph::new(), &camera()).unwrap();
        let frame = r.last_frame().unwrap();
        assert!(frame.contains("800x600"));
        assert!(frame.contains("Environment: none"));
        assert!(frame.contains("Meshes: 0"));
        assert_eq!(r.frames_rendered(), 1);
    }

    #[test]
    fn frame_lists_lights_and_meshes() {
        let mut scene = SceneGraph::new();
        scene.add(Node::new(
            "ambient",
            Transform::default(),
            NodeKind::Light(Light::ambient(Color::WHITE, 1.5)),
        ));
        scene.add(Node::new(
            "door",
            Transform::default(),
            NodeKind::Mesh(MeshNode {
                geometry: Arc::new(Geometry::placeholder_cube()),
                material: Material::default(),
                placeholder: true,
            }),
        ));
        let mut r = DebugTextRenderer::new(SurfaceSize::new(10, 10));
        r.render(&scene, &camera()).unwrap();
        let frame = r.last_frame().unwrap();
        assert!(frame.contains("ambient intensity=1.5000"));
        assert!(frame.contains("door triangles=12 placeholder"));
    }

    #[test]
    fn disposed_renderer_refuses_frames() {
        let mut r = DebugTextRenderer::new(SurfaceSize::new(10, 10));
        r.dispose();
        assert!(r.is_disposed());
        assert!(matches!(
            r.render(&SceneGraph::new(), &camera()),
            Err(RenderError::Disposed)
        ));
    }

    #[test]
    fn resize_updates_size() {
        let mut r = DebugTextRenderer::new(SurfaceSize::new(10, 10));
        r.set_size(SurfaceSize::new(400, 300));
        assert_eq!(r.size(), SurfaceSize::new(400, 300));
    }
}
