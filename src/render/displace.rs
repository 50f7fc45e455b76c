//! Depth-displacement renderer.
//!
//! Owns the shader pipelines, the displaced grid mesh and the reference
//! overlay. The mesh is destroyed and rebuilt whenever a new color/depth
//! pair arrives; it exists only while both sources are loaded.

use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::camera::OrbitCamera;
use crate::events::PreparedImageCpu;
use crate::params::RenderParams;

/// Segments per axis of the displacement grid. Fine enough that the relief
/// shows no visible faceting.
pub const GRID_SEGMENTS: u32 = 360;

/// World-space width of the displaced plane; height follows the source
/// aspect ratio.
pub const PLANE_WIDTH: f32 = 10.0;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Pixel format for offscreen capture targets.
pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniforms {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    // x: depth scale, y: dof strength, z: focus distance, w: unused
    params: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct OverlayUniforms {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct OverlayVertex {
    position: [f32; 3],
    color: [f32; 3],
}

/// World size of the displaced plane for a source image, width fixed and
/// height scaled by the image aspect.
pub fn plane_dimensions(image_width: u32, image_height: u32) -> (f32, f32) {
    let height = PLANE_WIDTH * image_height.max(1) as f32 / image_width.max(1) as f32;
    (PLANE_WIDTH, height)
}

/// CPU reference of the shader's blur factor, used by tests to pin the
/// depth-of-field semantics. A sample exactly on the focus plane is never
/// blurred, for any strength.
pub fn blur_factor(depth_sample: f32, focus_distance: f32, dof_strength: f32) -> f32 {
    let depth_diff = (depth_sample - focus_distance).abs();
    if depth_diff <= 0.0 || dof_strength <= 0.0 {
        return 0.0;
    }
    let exponent = 0.25 - 0.05 * dof_strength;
    (depth_diff.powf(exponent) * dof_strength).clamp(0.0, 1.0)
}

/// Build a subdivided plane centered on the origin, facing +Z.
pub fn build_grid(width: f32, height: f32, segments: u32) -> (Vec<GridVertex>, Vec<u32>) {
    let n = segments.max(1);
    let verts_per_side = n + 1;
    let mut vertices = Vec::with_capacity((verts_per_side * verts_per_side) as usize);
    for row in 0..verts_per_side {
        for col in 0..verts_per_side {
            let u = col as f32 / n as f32;
            let v = row as f32 / n as f32;
            vertices.push(GridVertex {
                position: [(u - 0.5) * width, (0.5 - v) * height, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [u, v],
            });
        }
    }

    let mut indices = Vec::with_capacity((n * n * 6) as usize);
    for row in 0..n {
        for col in 0..n {
            let top_left = row * verts_per_side + col;
            let top_right = top_left + 1;
            let bottom_left = top_left + verts_per_side;
            let bottom_right = bottom_left + 1;
            indices.extend_from_slice(&[
                top_left,
                bottom_left,
                top_right,
                top_right,
                bottom_left,
                bottom_right,
            ]);
        }
    }
    (vertices, indices)
}

fn overlay_geometry() -> Vec<OverlayVertex> {
    let mut verts = Vec::new();
    let mut line = |from: [f32; 3], to: [f32; 3], color: [f32; 3]| {
        verts.push(OverlayVertex {
            position: from,
            color,
        });
        verts.push(OverlayVertex {
            position: to,
            color,
        });
    };

    // World axes, 5 units long.
    line([0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [1.0, 0.2, 0.2]);
    line([0.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.2, 1.0, 0.2]);
    line([0.0, 0.0, 0.0], [0.0, 0.0, 5.0], [0.2, 0.4, 1.0]);

    // Origin marker: a small red cross at the look-at target.
    let r = 0.1;
    let red = [1.0, 0.0, 0.0];
    line([-r, 0.0, 0.0], [r, 0.0, 0.0], red);
    line([0.0, -r, 0.0], [0.0, r, 0.0], red);
    line([0.0, 0.0, -r], [0.0, 0.0, r], red);

    verts
}

/// Render destination; the surface and the capture target usually differ in
/// pixel format, so each gets its own pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Surface,
    Capture,
}

struct PipelinePair {
    surface: wgpu::RenderPipeline,
    capture: wgpu::RenderPipeline,
}

impl PipelinePair {
    fn for_target(&self, target: TargetKind) -> &wgpu::RenderPipeline {
        match target {
            TargetKind::Surface => &self.surface,
            TargetKind::Capture => &self.capture,
        }
    }
}

struct GridMesh {
    vertex_buf: wgpu::Buffer,
    index_buf: wgpu::Buffer,
    index_count: u32,
}

struct DepthTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

pub struct DisplacementRenderer {
    scene_layout: wgpu::BindGroupLayout,
    scene_pipelines: PipelinePair,
    scene_uniforms: wgpu::Buffer,
    scene_bind: Option<wgpu::BindGroup>,
    mesh: Option<GridMesh>,

    overlay_pipelines: PipelinePair,
    overlay_uniforms: wgpu::Buffer,
    overlay_bind: wgpu::BindGroup,
    overlay_vbuf: wgpu::Buffer,
    overlay_vertex_count: u32,

    sampler: wgpu::Sampler,
    depth_surface: Option<DepthTarget>,
    depth_capture: Option<DepthTarget>,
}

impl DisplacementRenderer {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("displace-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("displace.wgsl").into()),
        });
        let overlay_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("overlay-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("overlay.wgsl").into()),
        });

        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let overlay_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let grid_vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GridVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
        };
        let overlay_vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<OverlayVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
        };

        let scene_pipe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-pipe-layout"),
            bind_group_layouts: &[&scene_layout],
            push_constant_ranges: &[],
        });
        let overlay_pipe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("overlay-pipe-layout"),
            bind_group_layouts: &[&overlay_layout],
            push_constant_ranges: &[],
        });

        let make_scene_pipeline = |format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("displace-pipeline"),
                layout: Some(&scene_pipe_layout),
                vertex: wgpu::VertexState {
                    module: &scene_shader,
                    entry_point: Some("vs_main"),
                    buffers: std::slice::from_ref(&grid_vertex_layout),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &scene_shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let make_overlay_pipeline = |format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("overlay-pipeline"),
                layout: Some(&overlay_pipe_layout),
                vertex: wgpu::VertexState {
                    module: &overlay_shader,
                    entry_point: Some("vs_main"),
                    buffers: std::slice::from_ref(&overlay_vertex_layout),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &overlay_shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::LineList,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let scene_pipelines = PipelinePair {
            surface: make_scene_pipeline(surface_format),
            capture: make_scene_pipeline(CAPTURE_FORMAT),
        };
        let overlay_pipelines = PipelinePair {
            surface: make_overlay_pipeline(surface_format),
            capture: make_overlay_pipeline(CAPTURE_FORMAT),
        };

        let scene_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene-uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let overlay_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("overlay-uniforms"),
            size: std::mem::size_of::<OverlayUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let overlay_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay-bind"),
            layout: &overlay_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: overlay_uniforms.as_entire_binding(),
            }],
        });

        let overlay_verts = overlay_geometry();
        let overlay_vbuf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("overlay-vertices"),
            contents: bytemuck::cast_slice(&overlay_verts),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("source-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            scene_layout,
            scene_pipelines,
            scene_uniforms,
            scene_bind: None,
            mesh: None,
            overlay_pipelines,
            overlay_uniforms,
            overlay_bind,
            overlay_vbuf,
            overlay_vertex_count: overlay_verts.len() as u32,
            sampler,
            depth_surface: None,
            depth_capture: None,
        }
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// Replace the displaced surface with a new color/depth pair. The old
    /// mesh and textures are dropped wholesale.
    pub fn set_sources(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color: &PreparedImageCpu,
        depth: &PreparedImageCpu,
    ) {
        // Color in sRGB, depth linear: the displacement reads raw red values.
        let color_view = upload_texture(
            device,
            queue,
            color,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            "color-source",
        );
        let depth_view = upload_texture(
            device,
            queue,
            depth,
            wgpu::TextureFormat::Rgba8Unorm,
            "depth-source",
        );

        let (width, height) = plane_dimensions(color.width, color.height);
        let (vertices, indices) = build_grid(width, height, GRID_SEGMENTS);
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grid-vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grid-indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.scene_bind = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene-bind"),
            layout: &self.scene_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.scene_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
        self.mesh = Some(GridMesh {
            vertex_buf,
            index_buf,
            index_count: indices.len() as u32,
        });
    }

    /// Draw the current scene into `view`. Uniforms are written first, so
    /// everything in this frame sees one consistent parameter set.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        size: (u32, u32),
        target: TargetKind,
        camera: &OrbitCamera,
        params: &RenderParams,
        draw_overlay: bool,
    ) {
        let aspect = size.0 as f32 / size.1.max(1) as f32;
        let view_proj = camera.projection_matrix(aspect) * camera.view_matrix();
        let model = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, params.resting_z()));

        queue.write_buffer(
            &self.scene_uniforms,
            0,
            bytemuck::bytes_of(&SceneUniforms {
                view_proj: view_proj.to_cols_array_2d(),
                model: model.to_cols_array_2d(),
                params: [
                    params.depth_scale(),
                    params.dof_strength,
                    params.focus_distance,
                    0.0,
                ],
            }),
        );
        queue.write_buffer(
            &self.overlay_uniforms,
            0,
            bytemuck::bytes_of(&OverlayUniforms {
                view_proj: view_proj.to_cols_array_2d(),
            }),
        );

        let depth_view = self.depth_view_for(device, size, target);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let (Some(mesh), Some(bind)) = (self.mesh.as_ref(), self.scene_bind.as_ref()) {
            pass.set_pipeline(self.scene_pipelines.for_target(target));
            pass.set_bind_group(0, bind, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
            pass.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }

        if draw_overlay {
            pass.set_pipeline(self.overlay_pipelines.for_target(target));
            pass.set_bind_group(0, &self.overlay_bind, &[]);
            pass.set_vertex_buffer(0, self.overlay_vbuf.slice(..));
            pass.draw(0..self.overlay_vertex_count, 0..1);
        }
    }

    fn depth_view_for(
        &mut self,
        device: &wgpu::Device,
        size: (u32, u32),
        target: TargetKind,
    ) -> wgpu::TextureView {
        let slot = match target {
            TargetKind::Surface => &mut self.depth_surface,
            TargetKind::Capture => &mut self.depth_capture,
        };
        if let Some(existing) = slot.as_ref()
            && existing.size == size
        {
            return existing.view.clone();
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene-depth"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        *slot = Some(DepthTarget {
            view: view.clone(),
            size,
        });
        view
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &PreparedImageCpu,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        &image.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_counts_and_corners() {
        let (vertices, indices) = build_grid(10.0, 5.0, 4);
        assert_eq!(vertices.len(), 25);
        assert_eq!(indices.len(), 4 * 4 * 6);

        let first = &vertices[0];
        assert_eq!(first.uv, [0.0, 0.0]);
        assert_eq!(first.position, [-5.0, 2.5, 0.0]);
        let last = vertices.last().unwrap();
        assert_eq!(last.uv, [1.0, 1.0]);
        assert_eq!(last.position, [5.0, -2.5, 0.0]);

        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn plane_height_follows_aspect() {
        let (w, h) = plane_dimensions(2000, 1000);
        assert_eq!(w, PLANE_WIDTH);
        assert!((h - 5.0).abs() < 1e-6);

        let (_, square) = plane_dimensions(512, 512);
        assert!((square - PLANE_WIDTH).abs() < 1e-6);
    }

    #[test]
    fn blur_factor_zero_on_focus_plane() {
        for dof in [0.0, 0.25, 0.5, 1.0] {
            assert_eq!(blur_factor(0.5, 0.5, dof), 0.0);
        }
    }

    #[test]
    fn blur_factor_bounded_and_off_at_zero_strength() {
        assert_eq!(blur_factor(0.9, 0.1, 0.0), 0.0);
        for depth in [0.0, 0.1, 0.5, 0.9, 1.0] {
            let f = blur_factor(depth, 0.5, 1.0);
            assert!((0.0..=1.0).contains(&f), "factor out of range: {f}");
        }
        // Farther from focus blurs at least as much.
        assert!(blur_factor(1.0, 0.0, 0.5) >= blur_factor(0.4, 0.0, 0.5));
    }
}
