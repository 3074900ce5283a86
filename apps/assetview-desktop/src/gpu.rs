use std::sync::Arc;

use anyhow::{Context, anyhow};
use assetview_common::SurfaceSize;
use assetview_render::{RenderBackend, RenderError};
use assetview_render_wgpu::WgpuRenderer;
use assetview_scene::{PerspectiveCamera, SceneGraph};
use assetview_viewer::ViewerConfig;
use winit::window::Window;

/// Window surface plus the wgpu renderer drawing into it.
///
/// [`RenderBackend::render`] draws the scene into a freshly acquired frame and
/// holds it; [`finish_frame`](Self::finish_frame) draws the egui overlay on
/// top and presents.
pub struct GpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_renderer: egui_wgpu::Renderer,
    pending: Option<wgpu::SurfaceTexture>,
    size: SurfaceSize,
    transparent: bool,
    disposed: bool,
}

impl GpuBackend {
    pub fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no compatible GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("assetview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let inner = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = if viewer.alpha {
            [
                wgpu::CompositeAlphaMode::PreMultiplied,
                wgpu::CompositeAlphaMode::PostMultiplied,
            ]
            .into_iter()
            .find(|mode| caps.alpha_modes.contains(mode))
        } else {
            None
        }
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: inner.width.max(1),
            height: inner.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let size = SurfaceSize::new(inner.width, inner.height);
        let renderer = WgpuRenderer::new(&device, format, size, viewer.antialias);
        let egui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1, false);

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            ?format,
            ?alpha_mode,
            "GPU initialized"
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            renderer,
            egui_renderer,
            pending: None,
            size,
            transparent: viewer.alpha,
            disposed: false,
        })
    }

    /// Draw the egui overlay onto the pending frame and present it.
    pub fn finish_frame(
        &mut self,
        paint_jobs: &[egui::ClippedPrimitive],
        textures: &egui::TexturesDelta,
        pixels_per_point: f32,
    ) {
        for (id, image_delta) in &textures.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }

        if let Some(output) = self.pending.take() {
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let screen = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.config.width, self.config.height],
                pixels_per_point,
            };
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("egui_encoder"),
                });
            self.egui_renderer.update_buffers(
                &self.device,
                &self.queue,
                &mut encoder,
                paint_jobs,
                &screen,
            );
            {
                let mut pass = encoder
                    .begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("egui_pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        ..Default::default()
                    })
                    .forget_lifetime();
                self.egui_renderer.render(&mut pass, paint_jobs, &screen);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
            output.present();
        }

        for id in &textures.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

impl RenderBackend for GpuBackend {
    fn set_size(&mut self, size: SurfaceSize) {
        self.size = size;
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer.resize(&self.device, size);
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
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceLost(err.to_string()));
            }
            Err(err) => return Err(RenderError::SurfaceLost(err.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.renderer.render(
            &self.device,
            &self.queue,
            &view,
            scene,
            camera,
            self.transparent,
        );
        self.pending = Some(output);
        Ok(())
    }

    fn dispose(&mut self) {
        self.pending = None;
        self.renderer.release();
        self.disposed = true;
        tracing::debug!("GPU backend disposed");
    }
}
