mod gpu;
mod window;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use assetview_common::SurfaceSize;
use assetview_render::DebugTextRenderer;
use assetview_viewer::{
    ChannelSink, HeadlessRegion, LoadCompletion, LoadSink, Viewer, ViewerConfig,
};
use clap::Parser;
use egui::Context as EguiContext;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::gpu::GpuBackend;
use crate::window::{PointerTracker, ProxySink, WindowRegion};

/// How long headless mode waits for the loaders before rendering.
const HEADLESS_LOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "assetview-desktop", about = "3D asset viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Deployment root holding uploads/, envmap/ and draco/
    #[arg(long, default_value = ".")]
    asset_root: PathBuf,

    /// Initial window width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Render N frames without a window and print the last one
    #[arg(long, value_name = "N")]
    headless_frames: Option<u32>,
}

type WindowViewer = Viewer<GpuBackend, WindowRegion>;

struct App {
    config: ViewerConfig,
    initial_size: PhysicalSize<u32>,
    sink: Arc<dyn LoadSink>,
    window: Option<Arc<Window>>,
    viewer: Option<WindowViewer>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    pointer: PointerTracker,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: ViewerConfig, initial_size: PhysicalSize<u32>, sink: Arc<dyn LoadSink>) -> Self {
        Self {
            config,
            initial_size,
            sink,
            window: None,
            viewer: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            pointer: PointerTracker::default(),
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Asset Viewer")
            .with_transparent(self.config.alpha)
            .with_inner_size(self.initial_size);
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let backend = GpuBackend::new(window.clone(), &self.config)?;
        let region = WindowRegion::new(window.clone());
        let mut viewer = Viewer::new(self.config.clone(), region, backend);
        viewer.mount(Arc::new(self.config.asset_source()), Arc::clone(&self.sink))?;

        self.egui_winit = Some(egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        ));
        self.window = Some(window);
        self.viewer = Some(viewer);
        Ok(())
    }

    fn redraw(&mut self) {
        let (Some(window), Some(viewer), Some(egui_winit)) =
            (&self.window, &mut self.viewer, &mut self.egui_winit)
        else {
            return;
        };

        let running = match viewer.tick() {
            Ok(running) => running,
            Err(err) => {
                tracing::warn!(%err, "frame skipped");
                true
            }
        };
        if !running {
            return;
        }

        let raw_input = egui_winit.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            viewer.draw_panel(ctx);
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        viewer.renderer_mut().finish_frame(
            &paint_jobs,
            &full_output.textures_delta,
            full_output.pixels_per_point,
        );

        if viewer.render_loop().is_running() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<LoadCompletion> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            tracing::error!("startup failed: {err:#}");
            self.error = Some(err);
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, completion: LoadCompletion) {
        if let Some(viewer) = &mut self.viewer {
            let outcome = viewer.apply_completion(completion);
            tracing::debug!(?outcome, "completion applied");
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let over_ui = match (&mut self.egui_winit, &self.window) {
            (Some(egui_winit), Some(window)) => egui_winit.on_window_event(window, &event).consumed,
            _ => false,
        };
        let Some(viewer) = &mut self.viewer else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                viewer.unmount();
                event_loop.exit();
            }
            WindowEvent::Resized(_) => {
                viewer.on_window_resize();
            }
            WindowEvent::MouseInput { button, state, .. } => {
                self.pointer
                    .button(button, state == ElementState::Pressed, over_ui);
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(action) = self.pointer.moved(position.x, position.y, over_ui) {
                    viewer.handle_pointer(action);
                }
            }
            WindowEvent::CursorLeft { .. } => self.pointer.left(),
            WindowEvent::MouseWheel { delta, .. } if !over_ui => {
                viewer.handle_pointer(PointerTracker::wheel(delta));
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let (Some(window), Some(viewer)) = (&self.window, &self.viewer) {
            if viewer.render_loop().is_running() {
                window.request_redraw();
            }
        }
    }
}

/// Mount against an in-memory region, wait for the loaders, render `frames`
/// frames as text and print the last one.
fn run_headless(config: ViewerConfig, width: u32, height: u32, frames: u32) -> Result<()> {
    let (sink, rx) = ChannelSink::new();
    let mut viewer = Viewer::new(
        config.clone(),
        HeadlessRegion::new(width, height),
        DebugTextRenderer::new(SurfaceSize::default()),
    );
    viewer.mount(Arc::new(config.asset_source()), Arc::new(sink))?;

    for _ in 0..3 {
        match rx.recv_timeout(HEADLESS_LOAD_TIMEOUT) {
            Ok(completion) => {
                let kind = completion.kind();
                let outcome = viewer.apply_completion(completion);
                tracing::info!(%kind, ?outcome, "load resolved");
            }
            Err(err) => {
                tracing::warn!(%err, "gave up waiting for loaders");
                break;
            }
        }
    }

    for _ in 0..frames {
        viewer.tick()?;
    }
    match viewer.renderer().last_frame() {
        Some(frame) => print!("{frame}"),
        None => println!("no frames rendered"),
    }
    viewer.unmount();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("assetview-desktop starting");
    let config = ViewerConfig::new(cli.asset_root);

    if let Some(frames) = cli.headless_frames {
        return run_headless(config, cli.width, cli.height, frames);
    }

    let event_loop = EventLoop::<LoadCompletion>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let sink: Arc<dyn LoadSink> = Arc::new(ProxySink::new(event_loop.create_proxy()));

    let mut app = App::new(config, PhysicalSize::new(cli.width, cli.height), sink);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
