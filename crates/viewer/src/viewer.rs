use std::sync::Arc;

use assetview_assets::{AssetSource, MeshAsset};
use assetview_common::{Color, NodeId, SurfaceSize, Transform};
use assetview_input::action::PointerAction;
use assetview_input::orbit::OrbitControls;
use assetview_panel::{
    OnChange, PanelError, ParamBinding, ParamTarget, ParameterPanel, SceneParams,
};
use assetview_render::{RenderBackend, RenderError};
use assetview_scene::{
    Environment, Geometry, Light, LightKind, Material, MeshNode, Node, NodeKind,
    PerspectiveCamera, SceneGraph, StandardMaterial,
};

use crate::config::{self, ViewerConfig};
use crate::lifecycle::{LivenessToken, MountLifecycleState};
use crate::loader::{self, LoadCompletion, LoadResult, LoadSink};
use crate::region::{Element, MountRegion};
use crate::render_loop::RenderLoop;

/// Errors from viewer lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("mount region must be non-empty, got {0}")]
    InvalidMountSize(SurfaceSize),
    #[error("viewer is already mounted")]
    AlreadyMounted,
    #[error("viewer was torn down; construct a new one to mount again")]
    TornDown,
    #[error("viewer is not mounted")]
    NotMounted,
    #[error(transparent)]
    Panel(#[from] PanelError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// What [`Viewer::apply_completion`] did with a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The loaded data is now part of the scene.
    Applied,
    /// The load failed; the scene shows its fallback.
    Fallback,
    /// The owning scene is gone; nothing was touched.
    Discarded,
}

/// Everything a mounted viewer owns about its scene.
#[derive(Debug)]
pub struct SceneHandle {
    pub graph: SceneGraph,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub params: SceneParams,
    /// Light nodes in placement order.
    pub lights: Vec<NodeId>,
    /// Group holding the displayed asset, once a mesh load has resolved.
    pub asset: Option<NodeId>,
}

impl SceneHandle {
    fn assemble(size: SurfaceSize) -> Self {
        let aspect = size.aspect().unwrap_or(1.0);
        let mut camera = PerspectiveCamera::new(
            config::CAMERA_FOV_DEGREES,
            aspect,
            config::CAMERA_NEAR,
            config::CAMERA_FAR,
        );
        camera.position = config::CAMERA_POSITION;
        camera.look_at(config::CAMERA_TARGET);

        let mut controls = OrbitControls::new(config::CAMERA_TARGET)
            .with_damping(config::ORBIT_DAMPING_FACTOR)
            .with_distance_range(config::ORBIT_MIN_DISTANCE, config::ORBIT_MAX_DISTANCE)
            .with_polar_range(config::ORBIT_MIN_POLAR_ANGLE, config::ORBIT_MAX_POLAR_ANGLE);
        controls.attach();

        let mut graph = SceneGraph::new();
        let lights = config::LIGHTS
            .iter()
            .map(|def| {
                let color = Color::from_hex(def.color);
                let light = match def.kind {
                    LightKind::Ambient => Light::ambient(color, def.intensity),
                    LightKind::Point => Light::point(color, def.intensity),
                };
                graph.add(Node::new(
                    def.name,
                    Transform::from_position(def.position),
                    NodeKind::Light(light),
                ))
            })
            .collect();

        Self {
            graph,
            camera,
            controls,
            params: SceneParams {
                env_map_intensity: config::ENV_MAP_INTENSITY,
            },
            lights,
            asset: None,
        }
    }

    /// Insert a loaded asset as a group under the root, replacing any previous one.
    fn insert_asset(&mut self, asset: MeshAsset) -> NodeId {
        self.clear_asset();
        let group = self.graph.add(Node::group(asset.name.as_str()));
        for primitive in asset.primitives {
            let node = Node::new(
                primitive.name,
                primitive.transform,
                NodeKind::Mesh(MeshNode {
                    geometry: Arc::new(primitive.geometry),
                    material: primitive.material,
                    placeholder: false,
                }),
            );
            if let Err(err) = self.graph.add_child(group, node) {
                tracing::warn!(%err, "failed to attach primitive");
            }
        }
        self.asset = Some(group);
        group
    }

    fn insert_placeholder(&mut self) -> NodeId {
        self.clear_asset();
        let id = self.graph.add(Node::new(
            "placeholder",
            Transform::default(),
            NodeKind::Mesh(MeshNode {
                geometry: Arc::new(Geometry::placeholder_cube()),
                material: Material::Standard(StandardMaterial {
                    base_color: [0.6, 0.6, 0.6, 1.0],
                    metallic: 0.0,
                    ..StandardMaterial::default()
                }),
                placeholder: true,
            }),
        ));
        self.asset = Some(id);
        id
    }

    fn clear_asset(&mut self) {
        if let Some(previous) = self.asset.take() {
            self.graph.remove(previous);
        }
    }
}

/// Scene lifecycle controller for one mount.
///
/// Generic over the render backend and the mount region so the same lifecycle
/// drives a window with a GPU surface or an in-memory region in tests.
pub struct Viewer<R: RenderBackend, M: MountRegion> {
    config: ViewerConfig,
    region: M,
    renderer: R,
    state: MountLifecycleState,
    scene: Option<SceneHandle>,
    panel: Option<ParameterPanel>,
    liveness: LivenessToken,
    render_loop: RenderLoop,
    resize_registered: bool,
}

impl<R: RenderBackend, M: MountRegion> Viewer<R, M> {
    pub fn new(config: ViewerConfig, region: M, renderer: R) -> Self {
        Self {
            config,
            region,
            renderer,
            state: MountLifecycleState::Unmounted,
            scene: None,
            panel: None,
            liveness: LivenessToken::new(),
            render_loop: RenderLoop::new(),
            resize_registered: false,
        }
    }

    /// Bind to the mount region: assemble the scene, attach the render surface
    /// and panel, register for resizes, start the loaders and the render loop.
    ///
    /// Loader results arrive later through `sink`; the render loop and panel
    /// are usable immediately.
    pub fn mount(
        &mut self,
        source: Arc<dyn AssetSource>,
        sink: Arc<dyn LoadSink>,
    ) -> Result<(), ViewerError> {
        match self.state {
            MountLifecycleState::Unmounted => {}
            MountLifecycleState::Mounted => return Err(ViewerError::AlreadyMounted),
            MountLifecycleState::TearingDown => return Err(ViewerError::TornDown),
        }
        let size = self.region.size();
        if size.is_empty() {
            return Err(ViewerError::InvalidMountSize(size));
        }

        let mut scene = SceneHandle::assemble(size);
        self.renderer.set_size(size);
        self.region.append_child(Element::RenderSurface);

        let panel = match bind_panel(&scene) {
            Ok(panel) => panel,
            Err(err) => {
                self.region.remove_child(Element::RenderSurface);
                return Err(err.into());
            }
        };
        scene.graph.drain_events();
        self.region.append_child(Element::ParameterPanel);

        self.scene = Some(scene);
        self.panel = Some(panel);
        self.resize_registered = true;
        self.state = MountLifecycleState::Mounted;
        tracing::info!(%size, root = %self.config.asset_root.display(), "viewer mounted");

        let started = loader::spawn_loads(&self.config, source, sink, &self.liveness);
        tracing::debug!(started, "loaders started");

        self.render_loop.start();
        Ok(())
    }

    /// Run one render-loop tick: advance the controls, draw, reschedule.
    /// Returns false when the loop is not running.
    pub fn tick(&mut self) -> Result<bool, ViewerError> {
        if self.state != MountLifecycleState::Mounted || !self.render_loop.is_running() {
            return Ok(false);
        }
        let Some(scene) = self.scene.as_mut() else {
            return Ok(false);
        };
        let _span = tracing::trace_span!("tick", ticks = self.render_loop.ticks()).entered();
        for event in scene.graph.drain_events() {
            tracing::trace!(?event, "scene changed");
        }
        scene.controls.update(&mut scene.camera);
        self.renderer.render(&scene.graph, &scene.camera)?;
        self.render_loop.reschedule();
        Ok(true)
    }

    /// Window resize handler: copy the region's size to the render surface and
    /// camera. Returns whether anything changed.
    pub fn on_window_resize(&mut self) -> bool {
        if !self.resize_registered {
            return false;
        }
        let Some(scene) = self.scene.as_mut() else {
            return false;
        };
        let size = self.region.size();
        let Some(aspect) = size.aspect().filter(|_| !size.is_empty()) else {
            tracing::debug!(%size, "ignoring resize to empty region");
            return false;
        };
        self.renderer.set_size(size);
        scene.camera.aspect = aspect;
        scene.camera.update_projection_matrix();
        tracing::debug!(%size, aspect, "resized");
        true
    }

    /// Apply a finished load to the scene, unless the scene that requested it
    /// is gone.
    pub fn apply_completion(&mut self, completion: LoadCompletion) -> ApplyOutcome {
        let kind = completion.kind();
        let live = completion.token.is_alive() && completion.token.same_scene(&self.liveness);
        let scene = match self.scene.as_mut() {
            Some(scene) if live && self.state == MountLifecycleState::Mounted => scene,
            _ => {
                tracing::debug!(%kind, "discarding completion for torn-down scene");
                return ApplyOutcome::Discarded;
            }
        };
        let path = loader::describe(&self.config, kind);

        match completion.result {
            LoadResult::Panorama(Ok(map)) | LoadResult::Cubemap(Ok(map)) => {
                let label = path.display().to_string();
                tracing::info!(%kind, %label, "environment applied");
                scene.graph.set_environment(Environment::new(label, map));
                ApplyOutcome::Applied
            }
            LoadResult::Panorama(Err(err)) | LoadResult::Cubemap(Err(err)) => {
                tracing::warn!(%kind, path = %path.display(), %err, "environment load failed; keeping current environment");
                ApplyOutcome::Fallback
            }
            LoadResult::Mesh(Ok(asset)) => {
                let triangles = asset.triangle_count();
                let name = asset.name.clone();
                scene.insert_asset(asset);
                tracing::info!(%name, triangles, "mesh inserted");
                ApplyOutcome::Applied
            }
            LoadResult::Mesh(Err(err)) => {
                tracing::warn!(path = %path.display(), %err, "mesh load failed; showing placeholder");
                scene.insert_placeholder();
                ApplyOutcome::Fallback
            }
        }
    }

    /// Drive a panel control as if the user moved it. Returns the value written.
    pub fn set_parameter(&mut self, label: &str, value: f32) -> Result<f32, ViewerError> {
        let (Some(scene), Some(panel)) = (self.scene.as_mut(), self.panel.as_mut()) else {
            return Err(ViewerError::NotMounted);
        };
        Ok(panel.set(label, value, &mut scene.graph, &mut scene.params)?)
    }

    /// Draw the parameter panel and apply whatever the user changed.
    /// Returns the number of controls applied.
    pub fn draw_panel(&mut self, ctx: &egui::Context) -> usize {
        let changes = match (&self.scene, &self.panel) {
            (Some(scene), Some(panel)) => panel.ui(ctx, &scene.graph, &scene.params),
            _ => return 0,
        };
        let mut applied = 0;
        for (label, value) in changes {
            match self.set_parameter(&label, value) {
                Ok(_) => applied += 1,
                Err(err) => tracing::warn!(%label, %err, "parameter change rejected"),
            }
        }
        applied
    }

    /// Forward pointer input to the orbit controls.
    pub fn handle_pointer(&mut self, action: PointerAction) {
        let height = self.renderer.size().height;
        if let Some(scene) = self.scene.as_mut() {
            scene.controls.handle(action, &scene.camera, height);
        }
    }

    /// Tear down: cancel the render loop, drop the resize handler, invalidate
    /// pending loads, destroy the panel, detach the surface, release the
    /// renderer and the scene. Calling it again does nothing.
    pub fn unmount(&mut self) {
        if self.state != MountLifecycleState::Mounted {
            return;
        }
        self.state = MountLifecycleState::TearingDown;

        self.render_loop.cancel();
        self.resize_registered = false;
        self.liveness.invalidate();

        if let Some(scene) = self.scene.as_mut() {
            scene.controls.dispose();
        }
        if let Some(panel) = self.panel.as_mut() {
            panel.destroy();
        }
        self.region.remove_child(Element::ParameterPanel);
        self.region.remove_child(Element::RenderSurface);

        self.renderer.dispose();
        self.panel = None;
        self.scene = None;
        tracing::info!(ticks = self.render_loop.ticks(), "viewer unmounted");
    }

    pub fn state(&self) -> MountLifecycleState {
        self.state
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn region(&self) -> &M {
        &self.region
    }

    /// Mutable access to the region, e.g. to update its size before
    /// [`on_window_resize`](Self::on_window_resize).
    pub fn region_mut(&mut self) -> &mut M {
        &mut self.region
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn scene(&self) -> Option<&SceneHandle> {
        self.scene.as_ref()
    }

    pub fn panel(&self) -> Option<&ParameterPanel> {
        self.panel.as_ref()
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    /// Token handed to this mount's loaders.
    pub fn liveness(&self) -> LivenessToken {
        self.liveness.clone()
    }

    pub fn is_resize_registered(&self) -> bool {
        self.resize_registered
    }
}

impl<R: RenderBackend, M: MountRegion> Drop for Viewer<R, M> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn bind_panel(scene: &SceneHandle) -> Result<ParameterPanel, PanelError> {
    let mut panel = ParameterPanel::new(config::PANEL_TITLE, config::PANEL_FOLDER, config::PANEL_WIDTH);
    for (def, id) in config::LIGHTS.iter().zip(&scene.lights) {
        panel.bind(
            ParamBinding::new(def.label, ParamTarget::LightIntensity(*id), def.min, def.max)
                .step(config::PARAM_STEP),
            &scene.graph,
        )?;
    }
    panel.bind(
        ParamBinding::new(
            config::ENV_MAP_LABEL,
            ParamTarget::EnvMapIntensity,
            config::ENV_MAP_MIN,
            config::ENV_MAP_MAX,
        )
        .step(config::PARAM_STEP)
        .on_change(OnChange::ApplyEnvMapIntensity),
        &scene.graph,
    )?;
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ChannelSink;
    use crate::region::HeadlessRegion;
    use assetview_assets::{AssetError, MeshPrimitive};
    use assetview_render::DebugTextRenderer;
    use assetview_scene::{EnvironmentMap, EnvironmentSource, FloatImage};
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    /// Serves tiny in-memory assets; the mesh load can be made to fail.
    struct StubSource {
        mesh_fails: bool,
    }

    fn image(value: f32) -> FloatImage {
        FloatImage::new(1, 1, vec![[value; 3]])
    }

    fn door() -> MeshAsset {
        MeshAsset {
            name: "door".into(),
            primitives: vec![MeshPrimitive {
                name: "panel".into(),
                transform: Transform::default(),
                geometry: Geometry::placeholder_cube(),
                material: Material::default(),
            }],
        }
    }

    impl AssetSource for StubSource {
        fn load_panorama(&self, _path: &Path) -> Result<EnvironmentMap, AssetError> {
            Ok(EnvironmentMap::equirectangular(image(2.0)))
        }

        fn load_cubemap(&self, _faces: &[PathBuf; 6]) -> Result<EnvironmentMap, AssetError> {
            Ok(EnvironmentMap::cube(std::array::from_fn(|_| image(1.0))))
        }

        fn load_mesh(&self, path: &Path) -> Result<MeshAsset, AssetError> {
            if self.mesh_fails {
                Err(AssetError::NoMeshes(path.display().to_string()))
            } else {
                Ok(door())
            }
        }
    }

    type TestViewer = Viewer<DebugTextRenderer, HeadlessRegion>;

    fn mounted(width: u32, height: u32, mesh_fails: bool) -> (TestViewer, Receiver<LoadCompletion>) {
        let mut viewer = Viewer::new(
            ViewerConfig::default(),
            HeadlessRegion::new(width, height),
            DebugTextRenderer::new(SurfaceSize::default()),
        );
        let (sink, rx) = ChannelSink::new();
        viewer
            .mount(Arc::new(StubSource { mesh_fails }), Arc::new(sink))
            .unwrap();
        (viewer, rx)
    }

    /// Collect the three completions and return them keyed by kind.
    fn completions(rx: &Receiver<LoadCompletion>) -> [LoadCompletion; 3] {
        let mut all: Vec<LoadCompletion> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        all.sort_by_key(|c| c.kind() as u8);
        let mesh = all.pop().unwrap();
        let cube = all.pop().unwrap();
        let pano = all.pop().unwrap();
        [pano, cube, mesh]
    }

    fn last_frame(viewer: &TestViewer) -> String {
        viewer.renderer().last_frame().unwrap().to_string()
    }

    #[test]
    fn mount_attaches_surface_and_panel() {
        let (viewer, _rx) = mounted(800, 600, false);
        assert_eq!(viewer.state(), MountLifecycleState::Mounted);
        assert!(viewer.region().contains(Element::RenderSurface));
        assert!(viewer.region().contains(Element::ParameterPanel));
        assert!(viewer.is_resize_registered());
        assert!(viewer.render_loop().is_running());

        let scene = viewer.scene().unwrap();
        assert_eq!(scene.lights.len(), 3);
        assert_eq!(scene.graph.mesh_count(), 0);
        assert_eq!(scene.camera.position, config::CAMERA_POSITION);
        assert!(scene.controls.is_attached());
        assert_eq!(viewer.panel().unwrap().bindings().len(), 4);
    }

    #[test]
    fn scenario_a_mount_sizes_camera_and_surface() {
        let (viewer, _rx) = mounted(800, 600, false);
        let camera = &viewer.scene().unwrap().camera;
        assert_eq!(camera.aspect, 800.0 / 600.0);
        assert_eq!(viewer.renderer().size(), SurfaceSize::new(800, 600));
    }

    #[test]
    fn scenario_b_resize_updates_camera_and_surface() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        viewer.region_mut().set_size(400, 300);
        assert!(viewer.on_window_resize());
        assert_eq!(viewer.scene().unwrap().camera.aspect, 400.0 / 300.0);
        assert_eq!(viewer.renderer().size(), SurfaceSize::new(400, 300));
    }

    #[test]
    fn resize_consistency_across_sizes() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        for (w, h) in [(1, 1), (1920, 1080), (333, 777), (4096, 17)] {
            viewer.region_mut().set_size(w, h);
            assert!(viewer.on_window_resize());
            assert_eq!(viewer.renderer().size(), SurfaceSize::new(w, h));
            assert_eq!(viewer.scene().unwrap().camera.aspect, w as f32 / h as f32);
        }
    }

    #[test]
    fn resize_to_empty_region_is_ignored() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        viewer.region_mut().set_size(0, 600);
        assert!(!viewer.on_window_resize());
        assert_eq!(viewer.renderer().size(), SurfaceSize::new(800, 600));
    }

    #[test]
    fn zero_sized_mount_is_rejected() {
        let mut viewer = Viewer::new(
            ViewerConfig::default(),
            HeadlessRegion::new(0, 600),
            DebugTextRenderer::new(SurfaceSize::default()),
        );
        let (sink, _rx) = ChannelSink::new();
        let err = viewer
            .mount(Arc::new(StubSource { mesh_fails: false }), Arc::new(sink))
            .unwrap_err();
        assert!(matches!(err, ViewerError::InvalidMountSize(_)));
        assert_eq!(viewer.state(), MountLifecycleState::Unmounted);
        assert!(viewer.region().children().is_empty());
    }

    #[test]
    fn teardown_detaches_everything_and_stops_resizes() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        viewer.unmount();
        assert_eq!(viewer.state(), MountLifecycleState::TearingDown);
        assert!(viewer.region().children().is_empty());
        assert!(!viewer.render_loop().is_running());
        assert!(!viewer.is_resize_registered());
        assert!(!viewer.liveness().is_alive());
        assert!(viewer.renderer().is_disposed());
        assert!(viewer.scene().is_none());

        viewer.region_mut().set_size(400, 300);
        assert!(!viewer.on_window_resize());
        assert_eq!(viewer.renderer().size(), SurfaceSize::new(800, 600));
        assert!(!viewer.tick().unwrap());

        // Second teardown is a no-op.
        viewer.unmount();
        assert_eq!(viewer.state(), MountLifecycleState::TearingDown);
    }

    #[test]
    fn torn_down_viewer_cannot_remount() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        viewer.unmount();
        let (sink, _rx2) = ChannelSink::new();
        let err = viewer
            .mount(Arc::new(StubSource { mesh_fails: false }), Arc::new(sink))
            .unwrap_err();
        assert!(matches!(err, ViewerError::TornDown));
    }

    #[test]
    fn later_environment_wins() {
        let (mut viewer, rx) = mounted(800, 600, false);
        let [pano, cube, _mesh] = completions(&rx);

        assert_eq!(viewer.apply_completion(pano), ApplyOutcome::Applied);
        assert_eq!(viewer.apply_completion(cube), ApplyOutcome::Applied);
        let env = viewer.scene().unwrap().graph.environment().unwrap();
        assert_eq!(env.source(), EnvironmentSource::Cube);
    }

    #[test]
    fn later_environment_wins_in_either_order() {
        let (mut viewer, rx) = mounted(800, 600, false);
        let [pano, cube, _mesh] = completions(&rx);

        viewer.apply_completion(cube);
        viewer.apply_completion(pano);
        let env = viewer.scene().unwrap().graph.environment().unwrap();
        assert_eq!(env.source(), EnvironmentSource::Equirectangular);
        assert_eq!(env.label, config::PANORAMA_PATH);
    }

    #[test]
    fn failed_environment_keeps_previous() {
        let (mut viewer, rx) = mounted(800, 600, false);
        let [_pano, cube, _mesh] = completions(&rx);
        viewer.apply_completion(cube);

        let failed = LoadCompletion::new(
            viewer.liveness(),
            LoadResult::Panorama(Err(AssetError::NoMeshes("HDR1.hdr".into()))),
        );
        assert_eq!(viewer.apply_completion(failed), ApplyOutcome::Fallback);
        let env = viewer.scene().unwrap().graph.environment().unwrap();
        assert_eq!(env.source(), EnvironmentSource::Cube);
    }

    #[test]
    fn mesh_visible_on_next_tick() {
        let (mut viewer, rx) = mounted(800, 600, false);
        assert!(viewer.tick().unwrap());
        assert!(last_frame(&viewer).contains("Meshes: 0"));

        let [_pano, _cube, mesh] = completions(&rx);
        assert_eq!(viewer.apply_completion(mesh), ApplyOutcome::Applied);
        assert!(viewer.tick().unwrap());
        let frame = last_frame(&viewer);
        assert!(frame.contains("Meshes: 1"));
        assert!(frame.contains("panel triangles=12"));
        assert!(!frame.contains("placeholder"));
    }

    #[test]
    fn failed_mesh_shows_placeholder() {
        let (mut viewer, rx) = mounted(800, 600, true);
        let [_pano, _cube, mesh] = completions(&rx);
        assert_eq!(viewer.apply_completion(mesh), ApplyOutcome::Fallback);
        viewer.tick().unwrap();
        assert!(last_frame(&viewer).contains("placeholder triangles=12 placeholder"));
    }

    #[test]
    fn parameters_are_clamped() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        assert_eq!(viewer.set_parameter("Point Light 1", 50.0).unwrap(), 10.0);
        assert_eq!(viewer.set_parameter("Point Light 2", -1.0).unwrap(), 0.01);
        assert_eq!(viewer.set_parameter("DL Intensity", 0.0).unwrap(), 1.0);
        assert_eq!(viewer.set_parameter("EnvMap Intensity", 25.0).unwrap(), 20.0);

        let scene = viewer.scene().unwrap();
        let point = scene.graph.get(scene.lights[1]).unwrap().as_light().unwrap();
        assert_eq!(point.intensity, 10.0);
        assert_eq!(scene.params.env_map_intensity, 20.0);
    }

    #[test]
    fn scenario_c_env_intensity_reaches_every_material() {
        let (mut viewer, rx) = mounted(800, 600, false);
        let [_pano, _cube, mesh] = completions(&rx);
        viewer.apply_completion(mesh);

        viewer.set_parameter("EnvMap Intensity", 5.0).unwrap();
        let mut seen = Vec::new();
        viewer.scene().unwrap().graph.traverse(|_, node| {
            if let Some(mesh) = node.as_mesh() {
                seen.push(mesh.material.env_map_intensity());
            }
        });
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|v| *v == Some(5.0)));
    }

    #[test]
    fn scenario_d_completion_after_teardown_is_discarded() {
        let (mut viewer, rx) = mounted(800, 600, false);
        viewer.unmount();

        for completion in completions(&rx) {
            assert_eq!(viewer.apply_completion(completion), ApplyOutcome::Discarded);
        }
        assert!(viewer.scene().is_none());
        assert!(!viewer.region().contains(Element::RenderSurface));
    }

    #[test]
    fn completion_from_another_mount_is_discarded() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        let foreign = LoadCompletion::new(LivenessToken::new(), LoadResult::Mesh(Ok(door())));
        assert_eq!(viewer.apply_completion(foreign), ApplyOutcome::Discarded);
        assert_eq!(viewer.scene().unwrap().graph.mesh_count(), 0);
    }

    #[test]
    fn parameters_rejected_after_teardown() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        viewer.unmount();
        assert!(matches!(
            viewer.set_parameter("Point Light 1", 2.0),
            Err(ViewerError::NotMounted)
        ));
    }

    #[test]
    fn pointer_input_moves_camera_over_ticks() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        let start = viewer.scene().unwrap().camera.position;
        viewer.handle_pointer(PointerAction::Rotate { dx: 120.0, dy: 0.0 });
        viewer.tick().unwrap();
        assert_ne!(viewer.scene().unwrap().camera.position, start);
    }

    #[test]
    fn scene_events_drained_every_tick() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        for i in 0..10_000 {
            let value = (i % 20) as f32;
            viewer.set_parameter("EnvMap Intensity", value).unwrap();
            viewer.set_parameter("Point Light 1", 1.0 + (i % 9) as f32).unwrap();
            viewer.tick().unwrap();
            assert!(viewer.scene().unwrap().graph.events().is_empty());
        }
    }

    #[test]
    fn ticks_count_frames() {
        let (mut viewer, _rx) = mounted(800, 600, false);
        for _ in 0..3 {
            assert!(viewer.tick().unwrap());
        }
        assert_eq!(viewer.renderer().frames_rendered(), 3);
        assert_eq!(viewer.render_loop().ticks(), 3);
    }
}
