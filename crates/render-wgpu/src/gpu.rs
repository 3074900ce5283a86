use crate::shaders;
use assetview_common::{NodeId, SurfaceSize};
use assetview_scene::{
    EnvironmentMap, Geometry, LightKind, Material, MeshNode, PerspectiveCamera, SceneGraph,
};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Point lights beyond this count are ignored by the shader.
pub const MAX_POINT_LIGHTS: usize = 4;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    ambient: [f32; 4],
    /// rgb: average environment radiance, w: 1 when an environment is set.
    environment: [f32; 4],
    light_count: [u32; 4],
    light_pos: [[f32; 4]; MAX_POINT_LIGHTS],
    light_color: [[f32; 4]; MAX_POINT_LIGHTS],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct MeshUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    base_color: [f32; 4],
    params: [f32; 4],
}

impl MeshUniforms {
    fn new(model: Mat4, material: &Material) -> Self {
        let params = match material {
            Material::Standard(m) => [m.metallic, m.roughness, m.env_map_intensity, 0.0],
            Material::Basic { .. } => [0.0, 1.0, 0.0, 1.0],
        };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            base_color: material.base_color(),
            params,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

fn vertices(geometry: &Geometry) -> Vec<Vertex> {
    geometry
        .positions
        .iter()
        .zip(&geometry.normals)
        .map(|(&position, &normal)| Vertex { position, normal })
        .collect()
}

/// GPU copy of one mesh node.
struct GpuMesh {
    geometry: Arc<Geometry>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// wgpu-based scene renderer.
pub struct WgpuRenderer {
    pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    mesh_layout: wgpu::BindGroupLayout,
    meshes: HashMap<NodeId, GpuMesh>,
    depth_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
    sample_count: u32,
    surface_format: wgpu::TextureFormat,
    environment: Option<(Arc<EnvironmentMap>, [f32; 3])>,
}

impl WgpuRenderer {
    /// `antialias` enables 4x multisampling.
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        size: SurfaceSize,
        antialias: bool,
    ) -> Self {
        let sample_count = if antialias { 4 } else { 1 };

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame_uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_layout = uniform_layout(device, "frame_bind_group_layout");
        let mesh_layout = uniform_layout(device, "mesh_bind_group_layout");

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &mesh_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::MESH_SHADER.into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mesh_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x3,
                        1 => Float32x3,
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // glTF assets are frequently double sided.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });

        let (depth_view, msaa_view) =
            Self::create_attachments(device, surface_format, size, sample_count);

        Self {
            pipeline,
            frame_buffer,
            frame_bind_group,
            mesh_layout,
            meshes: HashMap::new(),
            depth_view,
            msaa_view,
            sample_count,
            surface_format,
            environment: None,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: SurfaceSize) {
        let (depth_view, msaa_view) =
            Self::create_attachments(device, self.surface_format, size, self.sample_count);
        self.depth_view = depth_view;
        self.msaa_view = msaa_view;
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn uploaded_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Mirror the scene's mesh nodes on the GPU: upload new or replaced
    /// geometry and free buffers for nodes that are gone.
    pub fn sync(&mut self, device: &wgpu::Device, scene: &SceneGraph) {
        let current = scene.meshes();
        self.meshes
            .retain(|id, _| current.iter().any(|(live, _, _)| live == id));

        for (id, model, mesh) in current {
            let stale = self
                .meshes
                .get(&id)
                .is_none_or(|gpu| !Arc::ptr_eq(&gpu.geometry, &mesh.geometry));
            if stale {
                let gpu = self.upload(device, id, model, mesh);
                self.meshes.insert(id, gpu);
            }
        }
    }

    fn upload(&self, device: &wgpu::Device, id: NodeId, model: Mat4, mesh: &MeshNode) -> GpuMesh {
        tracing::debug!(
            node = %id.short(),
            vertices = mesh.geometry.vertex_count(),
            triangles = mesh.geometry.triangle_count(),
            "uploading mesh"
        );
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertex_buffer"),
            contents: bytemuck::cast_slice(&vertices(&mesh.geometry)),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_index_buffer"),
            contents: bytemuck::cast_slice(&mesh.geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_uniforms"),
            contents: bytemuck::bytes_of(&MeshUniforms::new(model, &mesh.material)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh_bind_group"),
            layout: &self.mesh_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        GpuMesh {
            geometry: Arc::clone(&mesh.geometry),
            vertex_buffer,
            index_buffer,
            index_count: mesh.geometry.indices.len() as u32,
            uniform_buffer,
            bind_group,
        }
    }

    /// Free every GPU mesh.
    pub fn release(&mut self) {
        self.meshes.clear();
        self.environment = None;
    }

    fn environment_radiance(&mut self, scene: &SceneGraph) -> Option<[f32; 3]> {
        let env = scene.environment()?;
        match &self.environment {
            Some((map, radiance)) if Arc::ptr_eq(map, &env.map) => Some(*radiance),
            _ => {
                let radiance = env.map.average_radiance();
                tracing::debug!(label = %env.label, ?radiance, "environment radiance updated");
                self.environment = Some((Arc::clone(&env.map), radiance));
                Some(radiance)
            }
        }
    }

    fn frame_uniforms(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> FrameUniforms {
        let mut frame = FrameUniforms::zeroed();
        frame.view_proj = camera.view_projection().to_cols_array_2d();
        frame.camera_pos = camera.position.extend(1.0).to_array();

        let mut ambient = Vec3::ZERO;
        let mut points = 0usize;
        for (_, position, light) in scene.lights() {
            match light.kind {
                LightKind::Ambient => {
                    ambient += Vec3::from(light.color.scaled(light.intensity).to_array());
                }
                LightKind::Point if points < MAX_POINT_LIGHTS => {
                    frame.light_pos[points] = position.extend(1.0).to_array();
                    let [r, g, b] = light.color.to_array();
                    frame.light_color[points] = [r, g, b, light.intensity];
                    points += 1;
                }
                LightKind::Point => {}
            }
        }
        frame.ambient = ambient.extend(0.0).to_array();
        frame.light_count = [points as u32, 0, 0, 0];

        if let Some([r, g, b]) = self.environment_radiance(scene) {
            frame.environment = [r, g, b, 1.0];
        }
        frame
    }

    /// Render one frame of `scene` into `target`. With `transparent` the
    /// background is cleared to zero alpha.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        scene: &SceneGraph,
        camera: &PerspectiveCamera,
        transparent: bool,
    ) {
        self.sync(device, scene);

        let frame = self.frame_uniforms(scene, camera);
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let draws: Vec<&GpuMesh> = scene
            .meshes()
            .into_iter()
            .filter_map(|(id, model, mesh)| {
                let gpu = self.meshes.get(&id)?;
                queue.write_buffer(
                    &gpu.uniform_buffer,
                    0,
                    bytemuck::bytes_of(&MeshUniforms::new(model, &mesh.material)),
                );
                Some(gpu)
            })
            .collect();

        let clear = if transparent {
            wgpu::Color::TRANSPARENT
        } else {
            wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.15,
                a: 1.0,
            }
        };
        let (view, resolve_target) = match &self.msaa_view {
            Some(msaa) => (msaa, Some(target)),
            None => (target, None),
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("scene_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            for gpu in draws {
                pass.set_bind_group(1, &gpu.bind_group, &[]);
                pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..gpu.index_count, 0, 0..1);
            }
        }
        queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_attachments(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        size: SurfaceSize,
        sample_count: u32,
    ) -> (wgpu::TextureView, Option<wgpu::TextureView>) {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let msaa = (sample_count > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("msaa_color_texture"),
                    size: extent,
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: surface_format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&Default::default())
        });
        (depth.create_view(&Default::default()), msaa)
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_match_wgsl_sizes() {
        // Frame: mat4 + 4 vec4 + two vec4 arrays of MAX_POINT_LIGHTS.
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 64 + 4 * 16 + 2 * 16 * 4);
        assert_eq!(std::mem::size_of::<MeshUniforms>(), 64 * 2 + 16 * 2);
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn basic_material_is_flagged_unlit() {
        let u = MeshUniforms::new(
            Mat4::IDENTITY,
            &Material::Basic {
                color: [1.0, 0.0, 0.0, 1.0],
            },
        );
        assert_eq!(u.params[3], 1.0);
        let standard = MeshUniforms::new(Mat4::IDENTITY, &Material::default());
        assert_eq!(standard.params, [1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn vertices_interleave_positions_and_normals() {
        let cube = Geometry::placeholder_cube();
        let verts = vertices(&cube);
        assert_eq!(verts.len(), cube.vertex_count());
        assert_eq!(verts[0].position, cube.positions[0]);
        assert_eq!(verts[0].normal, cube.normals[0]);
    }
}
