use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};

use glam::Vec4;
use lumen_common::ViewportSize;
use lumen_render::device::{
    Attachment, BlendEquation, BlendFactor, Capability, ClearMask, CompareFunction, Face, FramebufferId,
    FramebufferStatus, MeshId, ProgramId, SamplerId, SamplerParameter, ShaderStage, TextureFormat, TextureId,
    VertexArrayId, Winding,
};
use lumen_render::{GraphicsDevice, ImageData, UniformValue, Vertex};
use wgpu::util::DeviceExt;

use crate::convert::{self, SamplerParams};
use crate::mipmap::{level_view, MipmapBlitter};
use crate::reflect::{self, ProgramLayout};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// `lumen_render::Vertex` as seen by the built-in vertex stages.
const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: std::mem::offset_of!(Vertex, position) as wgpu::BufferAddress,
        shader_location: 0,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Unorm8x4,
        offset: std::mem::offset_of!(Vertex, color) as wgpu::BufferAddress,
        shader_location: 1,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: std::mem::offset_of!(Vertex, tex_coord) as wgpu::BufferAddress,
        shader_location: 2,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: std::mem::offset_of!(Vertex, normal) as wgpu::BufferAddress,
        shader_location: 3,
    },
];

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("failed to open the graphics device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to read back the default target: {0}")]
    Readback(String),
}

#[derive(Default)]
struct ProgramState {
    stages: HashMap<ShaderStage, naga::Module>,
    linked: Option<LinkedProgram>,
}

struct UniformBlock {
    data: Vec<u8>,
    buffer: wgpu::Buffer,
}

struct LinkedProgram {
    layout: ProgramLayout,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    blocks: BTreeMap<u32, UniformBlock>,
    /// Texture name to the unit set through its `Int` uniform.
    texture_units: HashMap<String, u32>,
}

impl LinkedProgram {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        if self.layout.textures.contains_key(name) {
            match value {
                UniformValue::Int(unit) if unit >= 0 => {
                    self.texture_units.insert(name.to_string(), unit as u32);
                }
                _ => tracing::debug!(uniform = name, ?value, "texture uniforms take a unit index"),
            }
            return;
        }
        let Some(slot) = self.layout.uniforms.get(name) else {
            tracing::trace!(uniform = name, "not an active uniform");
            return;
        };
        let Some(bytes) = reflect::encode(slot.kind, value) else {
            tracing::debug!(uniform = name, ?value, expected = ?slot.kind, "uniform type mismatch");
            return;
        };
        let start = slot.offset as usize;
        if let Some(target) = self
            .blocks
            .get_mut(&slot.binding)
            .and_then(|block| block.data.get_mut(start..start + bytes.len()))
        {
            target.copy_from_slice(&bytes);
        }
    }
}

struct TextureState {
    format: TextureFormat,
    texture: wgpu::Texture,
    width: u32,
    height: u32,
    levels: u32,
    /// Levels holding defined contents; sampling views stop here.
    ready_levels: u32,
}

struct MeshState {
    vertices: wgpu::Buffer,
    elements: wgpu::Buffer,
    element_count: u32,
    stride: u32,
}

#[derive(Default, Clone, Copy)]
struct FramebufferState {
    color: Option<TextureId>,
    depth: Option<TextureId>,
}

#[derive(Debug, Clone, Copy)]
struct FixedFunction {
    cull_enabled: bool,
    cull_face: Face,
    front_face: Winding,
    depth_test: bool,
    depth_func: CompareFunction,
    blend_enabled: bool,
    blend_equation: BlendEquation,
    blend_source: BlendFactor,
    blend_destination: BlendFactor,
    blend_color: Vec4,
    color_mask: [bool; 4],
    depth_mask: bool,
    viewport: Option<(i32, i32, u32, u32)>,
    clear_color: Vec4,
    clear_depth: f32,
}

impl Default for FixedFunction {
    fn default() -> Self {
        Self {
            cull_enabled: false,
            cull_face: Face::Back,
            front_face: Winding::Ccw,
            depth_test: false,
            depth_func: CompareFunction::Less,
            blend_enabled: false,
            blend_equation: BlendEquation::FuncAdd,
            blend_source: BlendFactor::One,
            blend_destination: BlendFactor::Zero,
            blend_color: Vec4::ZERO,
            color_mask: [true; 4],
            depth_mask: true,
            viewport: None,
            clear_color: Vec4::ZERO,
            clear_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Geometry {
    Mesh { stride: u32 },
    Generated,
}

/// Everything a wgpu render pipeline bakes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    geometry: Geometry,
    color: Option<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
    cull: Option<Face>,
    front: Winding,
    depth_test: Option<CompareFunction>,
    depth_write: bool,
    blend: Option<(BlendEquation, BlendFactor, BlendFactor)>,
    color_mask: [bool; 4],
}

/// Attachments of the bound framebuffer, or of the default target.
struct Target {
    color: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
    depth: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
    size: (u32, u32),
}

#[derive(Clone, Copy)]
enum DrawCall {
    Mesh(MeshId),
    Arrays { first: u32, count: u32 },
}

/// Headless wgpu implementation of [`GraphicsDevice`].
///
/// The default target is an offscreen RGBA8 color texture plus a depth
/// texture of the size given at creation; [`WgpuDevice::read_pixels`] copies
/// it back. Every clear and draw is submitted immediately so the GL-style
/// state changes between calls apply in order.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: ViewportSize,
    target_color: wgpu::Texture,
    target_depth: wgpu::Texture,
    border_clamp: bool,
    next_name: u32,
    programs: HashMap<ProgramId, ProgramState>,
    textures: HashMap<TextureId, Option<TextureState>>,
    samplers: HashMap<SamplerId, (SamplerParams, wgpu::Sampler)>,
    meshes: HashMap<MeshId, MeshState>,
    vertex_arrays: HashSet<VertexArrayId>,
    framebuffers: HashMap<FramebufferId, FramebufferState>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    current_program: Option<ProgramId>,
    bound_textures: BTreeMap<u32, TextureId>,
    bound_samplers: BTreeMap<u32, SamplerId>,
    bound_vertex_array: Option<VertexArrayId>,
    bound_framebuffer: Option<FramebufferId>,
    state: FixedFunction,
    fallback_texture: wgpu::Texture,
    default_sampler: wgpu::Sampler,
    blitter: MipmapBlitter,
    draw_calls: usize,
}

impl WgpuDevice {
    /// Open the default adapter without a surface.
    pub fn headless(size: ViewportSize) -> Result<Self, BackendError> {
        pollster::block_on(Self::request(size))
    }

    async fn request(size: ViewportSize) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(BackendError::NoAdapter)?;
        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "graphics adapter selected");

        let features = adapter.features() & wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lumen_device"),
                    required_features: features,
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    ..Default::default()
                },
                None,
            )
            .await?;
        Ok(Self::from_device(device, queue, size, !features.is_empty()))
    }

    /// Wrap an already opened device. `border_clamp` reports whether
    /// `ADDRESS_MODE_CLAMP_TO_BORDER` was enabled on it.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, size: ViewportSize, border_clamp: bool) -> Self {
        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            tracing::error!(%error, "graphics device error");
        }));

        let size = ViewportSize::new(size.width.max(1), size.height.max(1));
        let target_color = create_texture(
            &device,
            "default_color_target",
            COLOR_FORMAT,
            (size.width, size.height),
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let target_depth = create_texture(
            &device,
            "default_depth_target",
            DEPTH_FORMAT,
            (size.width, size.height),
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let fallback_texture = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("fallback_white_texture"),
                size: extent(1, 1),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: COLOR_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255; 4],
        );
        let default_sampler = device.create_sampler(&SamplerParams::default().descriptor(border_clamp));
        let blitter = MipmapBlitter::new(&device, COLOR_FORMAT);

        Self {
            device,
            queue,
            size,
            target_color,
            target_depth,
            border_clamp,
            next_name: 0,
            programs: HashMap::new(),
            textures: HashMap::new(),
            samplers: HashMap::new(),
            meshes: HashMap::new(),
            vertex_arrays: HashSet::new(),
            framebuffers: HashMap::new(),
            pipelines: HashMap::new(),
            current_program: None,
            bound_textures: BTreeMap::new(),
            bound_samplers: BTreeMap::new(),
            bound_vertex_array: None,
            bound_framebuffer: None,
            state: FixedFunction::default(),
            fallback_texture,
            default_sampler,
            blitter,
            draw_calls: 0,
        }
    }

    pub fn size(&self) -> ViewportSize {
        self.size
    }

    /// Draw calls submitted since creation.
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Objects created through the trait and not yet deleted.
    pub fn live_object_count(&self) -> usize {
        self.programs.len()
            + self.textures.len()
            + self.samplers.len()
            + self.meshes.len()
            + self.vertex_arrays.len()
            + self.framebuffers.len()
    }

    /// Copy the default color target back to memory, rows bottom-up like
    /// every other [`ImageData`].
    pub fn read_pixels(&self) -> Result<ImageData, BackendError> {
        let (width, height) = (self.size.width, self.size.height);
        let unpadded = width * 4;
        let padded = unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target_color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|error| BackendError::Readback(error.to_string()))?
            .map_err(|error| BackendError::Readback(error.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded as usize).take(height as usize).rev() {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();
        ImageData::new(width, height, pixels).map_err(|error| BackendError::Readback(error.to_string()))
    }

    fn allocate(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn texture_state(&self, id: TextureId) -> Option<&TextureState> {
        self.textures.get(&id).and_then(Option::as_ref)
    }

    fn allocate_texture(&mut self, texture: TextureId, format: TextureFormat, levels: u32, width: u32, height: u32) -> bool {
        let Some(slot) = self.textures.get_mut(&texture) else {
            tracing::debug!(texture = texture.0, "storage for unknown texture");
            return false;
        };
        let usage = match format {
            TextureFormat::Rgba8 => {
                wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC
            }
            TextureFormat::Depth24 => wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        };
        let (width, height) = (width.max(1), height.max(1));
        let levels = levels.clamp(1, ViewportSize::new(width, height).mip_levels());
        let created = create_texture(
            &self.device,
            "lumen_texture",
            convert::texture_format(format),
            (width, height),
            levels,
            usage,
        );
        *slot = Some(TextureState {
            format,
            texture: created,
            width,
            height,
            levels,
            ready_levels: 1,
        });
        true
    }

    fn current_target(&self) -> Option<Target> {
        let Some(id) = self.bound_framebuffer else {
            return Some(Target {
                color: Some((level_view(&self.target_color, 0), COLOR_FORMAT)),
                depth: Some((level_view(&self.target_depth, 0), DEPTH_FORMAT)),
                size: (self.size.width, self.size.height),
            });
        };
        let framebuffer = self.framebuffers.get(&id)?;
        let attachment = |texture: Option<TextureId>, format: TextureFormat| {
            texture
                .and_then(|texture| self.texture_state(texture))
                .filter(|state| state.format == format)
        };
        let color = attachment(framebuffer.color, TextureFormat::Rgba8);
        let depth = attachment(framebuffer.depth, TextureFormat::Depth24);
        let size = color.or(depth).map(|state| (state.width, state.height))?;
        Some(Target {
            color: color.map(|state| (level_view(&state.texture, 0), convert::texture_format(state.format))),
            depth: depth.map(|state| (level_view(&state.texture, 0), convert::texture_format(state.format))),
            size,
        })
    }

    fn pipeline_key(&self, program: ProgramId, geometry: Geometry, target: &Target) -> PipelineKey {
        let state = &self.state;
        PipelineKey {
            program,
            geometry,
            color: target.color.as_ref().map(|(_, format)| *format),
            depth: target.depth.as_ref().map(|(_, format)| *format),
            cull: state.cull_enabled.then_some(state.cull_face),
            front: state.front_face,
            depth_test: state.depth_test.then_some(state.depth_func),
            depth_write: state.depth_test && state.depth_mask,
            blend: state
                .blend_enabled
                .then_some((state.blend_equation, state.blend_source, state.blend_destination)),
            color_mask: state.color_mask,
        }
    }

    fn create_pipeline(&self, key: &PipelineKey) -> Result<wgpu::RenderPipeline, String> {
        let linked = self
            .programs
            .get(&key.program)
            .and_then(|program| program.linked.as_ref())
            .ok_or_else(|| "program is not linked".to_string())?;

        let buffers: Vec<wgpu::VertexBufferLayout> = match key.geometry {
            Geometry::Mesh { stride } => vec![wgpu::VertexBufferLayout {
                array_stride: stride as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &MESH_ATTRIBUTES,
            }],
            Geometry::Generated => Vec::new(),
        };
        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color
            .map(|format| wgpu::ColorTargetState {
                format,
                blend: key.blend.map(|(equation, source, destination)| {
                    let component = convert::blend_component(equation, source, destination);
                    wgpu::BlendState {
                        color: component,
                        alpha: component,
                    }
                }),
                write_mask: convert::color_writes(key.color_mask),
            })
            .into_iter()
            .map(Some)
            .collect();
        let depth_stencil = key.depth.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: key.depth_write,
            depth_compare: key.depth_test.map(convert::compare).unwrap_or(wgpu::CompareFunction::Always),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lumen_pipeline"),
            layout: Some(&linked.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &linked.vertex,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &linked.fragment,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: convert::front_face(key.front),
                cull_mode: key.cull.and_then(convert::cull_mode),
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(pipeline),
        }
    }

    fn bind_group(&self, linked: &LinkedProgram) -> wgpu::BindGroup {
        let unit_of = |texture: &str| linked.texture_units.get(texture).copied().unwrap_or(0);

        let views: Vec<(u32, wgpu::TextureView)> = linked
            .layout
            .textures
            .iter()
            .map(|(name, &binding)| {
                let view = self
                    .bound_textures
                    .get(&unit_of(name))
                    .and_then(|&id| self.texture_state(id))
                    .filter(|state| state.format == TextureFormat::Rgba8)
                    .map(|state| {
                        state.texture.create_view(&wgpu::TextureViewDescriptor {
                            mip_level_count: Some(state.ready_levels),
                            ..Default::default()
                        })
                    })
                    .unwrap_or_else(|| self.fallback_texture.create_view(&wgpu::TextureViewDescriptor::default()));
                (binding, view)
            })
            .collect();
        let samplers: Vec<(u32, &wgpu::Sampler)> = linked
            .layout
            .samplers
            .iter()
            .map(|(name, &binding)| {
                let texture = name.strip_suffix("_sampler").unwrap_or(name);
                let sampler = self
                    .bound_samplers
                    .get(&unit_of(texture))
                    .and_then(|id| self.samplers.get(id))
                    .map(|(_, sampler)| sampler)
                    .unwrap_or(&self.default_sampler);
                (binding, sampler)
            })
            .collect();

        let mut entries: Vec<wgpu::BindGroupEntry> = linked
            .blocks
            .iter()
            .map(|(&binding, block)| wgpu::BindGroupEntry {
                binding,
                resource: block.buffer.as_entire_binding(),
            })
            .collect();
        entries.extend(views.iter().map(|(binding, view)| wgpu::BindGroupEntry {
            binding: *binding,
            resource: wgpu::BindingResource::TextureView(view),
        }));
        entries.extend(samplers.iter().map(|(binding, sampler)| wgpu::BindGroupEntry {
            binding: *binding,
            resource: wgpu::BindingResource::Sampler(sampler),
        }));

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_bind_group"),
            layout: &linked.bind_group_layout,
            entries: &entries,
        })
    }

    fn draw(&mut self, call: DrawCall) {
        let Some(program) = self.current_program else {
            tracing::debug!("draw without a program in use");
            return;
        };
        if self.state.cull_enabled && self.state.cull_face == Face::FrontAndBack {
            return;
        }
        let geometry = match call {
            DrawCall::Mesh(mesh) => match self.meshes.get(&mesh) {
                Some(state) => Geometry::Mesh { stride: state.stride },
                None => {
                    tracing::debug!(mesh = mesh.0, "draw of unknown mesh");
                    return;
                }
            },
            DrawCall::Arrays { .. } => Geometry::Generated,
        };
        let Some(target) = self.current_target() else {
            tracing::debug!("draw skipped: framebuffer has no usable attachment");
            return;
        };
        let Some([x, y, width, height]) = viewport_rect(self.state.viewport, target.size) else {
            return;
        };

        let key = self.pipeline_key(program, geometry, &target);
        if !self.pipelines.contains_key(&key) {
            match self.create_pipeline(&key) {
                Ok(pipeline) => {
                    self.pipelines.insert(key, pipeline);
                }
                Err(message) => {
                    tracing::error!(program = program.0, %message, "pipeline creation failed");
                    return;
                }
            }
        }
        let (Some(pipeline), Some(linked)) = (
            self.pipelines.get(&key),
            self.programs.get(&program).and_then(|state| state.linked.as_ref()),
        ) else {
            return;
        };

        for block in linked.blocks.values() {
            self.queue.write_buffer(&block.buffer, 0, &block.data);
        }
        let bind_group = self.bind_group(linked);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("draw_encoder"),
        });
        {
            let color_attachments = color_attachments(&target, None);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("draw_pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment(&target, None),
                ..Default::default()
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_viewport(x, y, width, height, 0.0, 1.0);
            pass.set_blend_constant(convert::color(self.state.blend_color));
            match call {
                DrawCall::Mesh(mesh) => {
                    let Some(mesh) = self.meshes.get(&mesh) else {
                        return;
                    };
                    pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                    pass.set_index_buffer(mesh.elements.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..mesh.element_count, 0, 0..1);
                }
                DrawCall::Arrays { first, count } => pass.draw(first..first + count, 0..1),
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.draw_calls += 1;
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
    (width, height): (u32, u32),
    levels: u32,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(width, height),
        mip_level_count: levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn color_attachments(target: &Target, clear: Option<Vec4>) -> Vec<Option<wgpu::RenderPassColorAttachment<'_>>> {
    target
        .color
        .as_ref()
        .map(|(view, _)| wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: clear.map_or(wgpu::LoadOp::Load, |color| wgpu::LoadOp::Clear(convert::color(color))),
                store: wgpu::StoreOp::Store,
            },
        })
        .into_iter()
        .map(Some)
        .collect()
}

fn depth_attachment(target: &Target, clear: Option<f32>) -> Option<wgpu::RenderPassDepthStencilAttachment<'_>> {
    target.depth.as_ref().map(|(view, _)| wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    })
}

/// GL viewports count rows from the bottom; wgpu's from the top. The result
/// is clipped to the target, `None` when nothing remains.
fn viewport_rect(viewport: Option<(i32, i32, u32, u32)>, (target_width, target_height): (u32, u32)) -> Option<[f32; 4]> {
    let (x, y, width, height) = viewport.unwrap_or((0, 0, target_width, target_height));
    let left = i64::from(x).max(0);
    let right = (i64::from(x) + i64::from(width)).min(i64::from(target_width));
    let bottom = i64::from(y).max(0);
    let top = (i64::from(y) + i64::from(height)).min(i64::from(target_height));
    if right <= left || top <= bottom {
        return None;
    }
    Some([
        left as f32,
        (i64::from(target_height) - top) as f32,
        (right - left) as f32,
        (top - bottom) as f32,
    ])
}

fn link(
    device: &wgpu::Device,
    layout: ProgramLayout,
    vertex: naga::Module,
    fragment: naga::Module,
) -> Result<LinkedProgram, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("vertex_stage"),
        source: wgpu::ShaderSource::Naga(Cow::Owned(vertex)),
    });
    let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fragment_stage"),
        source: wgpu::ShaderSource::Naga(Cow::Owned(fragment)),
    });

    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = layout
        .blocks
        .keys()
        .map(|&binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();
    entries.extend(layout.textures.values().map(|&binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }));
    entries.extend(layout.samplers.values().map(|&binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }));

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("program_bind_group_layout"),
        entries: &entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("program_pipeline_layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let blocks = layout
        .blocks
        .iter()
        .map(|(&binding, &span)| {
            let size = span.max(16).next_multiple_of(16);
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("uniform_block"),
                size: size as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let data = vec![0; size as usize];
            (binding, UniformBlock { data, buffer })
        })
        .collect();

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(error.to_string());
    }
    Ok(LinkedProgram {
        layout,
        vertex,
        fragment,
        bind_group_layout,
        pipeline_layout,
        blocks,
        texture_units: HashMap::new(),
    })
}

impl GraphicsDevice for WgpuDevice {
    fn create_program(&mut self) -> ProgramId {
        let id = ProgramId(self.allocate());
        self.programs.insert(id, ProgramState::default());
        id
    }

    fn compile_and_attach(&mut self, program: ProgramId, stage: ShaderStage, source: &str) -> Result<(), String> {
        let module = reflect::parse_stage(stage, source)?;
        let state = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| format!("invalid program {}", program.0))?;
        state.stages.insert(stage, module);
        Ok(())
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), String> {
        let state = self
            .programs
            .get(&program)
            .ok_or_else(|| format!("invalid program {}", program.0))?;
        let (Some(vertex), Some(fragment)) = (
            state.stages.get(&ShaderStage::Vertex),
            state.stages.get(&ShaderStage::Fragment),
        ) else {
            return Err("link error: program needs a vertex and a fragment stage".to_string());
        };
        let layout = ProgramLayout::reflect(&[vertex, fragment])?;
        let linked = link(&self.device, layout, vertex.clone(), fragment.clone())?;

        self.pipelines.retain(|key, _| key.program != program);
        if let Some(state) = self.programs.get_mut(&program) {
            state.linked = Some(linked);
        }
        tracing::debug!(program = program.0, "program linked");
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        match self.programs.get_mut(&program).and_then(|state| state.linked.as_mut()) {
            Some(linked) => linked.set_uniform(name, value),
            None => tracing::debug!(program = program.0, uniform = name, "uniform on an unlinked program"),
        }
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        self.pipelines.retain(|key, _| key.program != program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn create_texture(&mut self) -> TextureId {
        let id = TextureId(self.allocate());
        self.textures.insert(id, None);
        id
    }

    fn texture_storage(&mut self, texture: TextureId, format: TextureFormat, levels: u32, width: u32, height: u32) {
        self.allocate_texture(texture, format, levels, width, height);
    }

    fn texture_image(&mut self, texture: TextureId, format: TextureFormat, width: u32, height: u32, pixels: Option<&[u8]>) {
        let levels = match format {
            TextureFormat::Rgba8 => ViewportSize::new(width, height).mip_levels(),
            TextureFormat::Depth24 => 1,
        };
        if !self.allocate_texture(texture, format, levels, width, height) {
            return;
        }
        let Some(pixels) = pixels else {
            return;
        };
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        let Some(state) = self.texture_state(texture) else {
            return;
        };
        if format != TextureFormat::Rgba8 || pixels.len() != expected {
            tracing::debug!(texture = texture.0, ?format, len = pixels.len(), "texture upload skipped");
            return;
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &state.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent(width, height),
        );
    }

    fn generate_mipmap(&mut self, texture: TextureId) {
        let Some(Some(state)) = self.textures.get_mut(&texture) else {
            tracing::debug!(texture = texture.0, "mipmap generation for a texture without storage");
            return;
        };
        if state.format != TextureFormat::Rgba8 {
            return;
        }
        self.blitter.generate(&self.device, &self.queue, &state.texture, state.levels);
        state.ready_levels = state.levels;
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) => self.bound_textures.insert(unit, id),
            None => self.bound_textures.remove(&unit),
        };
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn create_sampler(&mut self) -> SamplerId {
        let id = SamplerId(self.allocate());
        let params = SamplerParams::default();
        let sampler = self.device.create_sampler(&params.descriptor(self.border_clamp));
        self.samplers.insert(id, (params, sampler));
        id
    }

    fn sampler_parameter(&mut self, sampler: SamplerId, parameter: SamplerParameter) {
        let Some((params, object)) = self.samplers.get_mut(&sampler) else {
            tracing::debug!(sampler = sampler.0, "parameter for unknown sampler");
            return;
        };
        params.apply(parameter);
        *object = self.device.create_sampler(&params.descriptor(self.border_clamp));
    }

    fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerId>) {
        match sampler {
            Some(id) => self.bound_samplers.insert(unit, id),
            None => self.bound_samplers.remove(&unit),
        };
    }

    fn delete_sampler(&mut self, sampler: SamplerId) {
        self.samplers.remove(&sampler);
        self.bound_samplers.retain(|_, bound| *bound != sampler);
    }

    fn create_mesh(&mut self, vertex_bytes: &[u8], stride: usize, elements: &[u32]) -> MeshId {
        let id = MeshId(self.allocate());
        let vertices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: vertex_bytes,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let elements_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_elements"),
            contents: bytemuck::cast_slice(elements),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes.insert(
            id,
            MeshState {
                vertices,
                elements: elements_buffer,
                element_count: elements.len() as u32,
                stride: stride as u32,
            },
        );
        id
    }

    fn draw_mesh(&mut self, mesh: MeshId) {
        self.draw(DrawCall::Mesh(mesh));
    }

    fn delete_mesh(&mut self, mesh: MeshId) {
        self.meshes.remove(&mesh);
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = VertexArrayId(self.allocate());
        self.vertex_arrays.insert(id);
        id
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.bound_vertex_array = vertex_array;
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        if self.bound_vertex_array.is_none() {
            tracing::debug!("draw_arrays without a vertex array");
            return;
        }
        self.draw(DrawCall::Arrays { first, count });
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array);
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = FramebufferId(self.allocate());
        self.framebuffers.insert(id, FramebufferState::default());
        id
    }

    fn framebuffer_texture(&mut self, framebuffer: FramebufferId, attachment: Attachment, texture: TextureId) {
        if let Some(state) = self.framebuffers.get_mut(&framebuffer) {
            match attachment {
                Attachment::Color0 => state.color = Some(texture),
                Attachment::Depth => state.depth = Some(texture),
            }
        }
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(state) = self.framebuffers.get(&framebuffer).copied() else {
            return FramebufferStatus::MissingAttachment;
        };
        if state.color.is_none() && state.depth.is_none() {
            return FramebufferStatus::MissingAttachment;
        }
        let attached = |texture: Option<TextureId>, format: TextureFormat| {
            texture.map(|id| self.texture_state(id).filter(|s| s.format == format).map(|s| (s.width, s.height)))
        };
        let color = attached(state.color, TextureFormat::Rgba8);
        let depth = attached(state.depth, TextureFormat::Depth24);
        match (color, depth) {
            (Some(None), _) | (_, Some(None)) => FramebufferStatus::IncompleteAttachment,
            (Some(Some(a)), Some(Some(b))) if a != b => FramebufferStatus::IncompleteAttachment,
            _ => FramebufferStatus::Complete,
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer;
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::CullFace => self.state.cull_enabled = enabled,
            Capability::DepthTest => self.state.depth_test = enabled,
            Capability::Blend => self.state.blend_enabled = enabled,
        }
    }

    fn cull_face(&mut self, face: Face) {
        self.state.cull_face = face;
    }

    fn front_face(&mut self, winding: Winding) {
        self.state.front_face = winding;
    }

    fn depth_func(&mut self, function: CompareFunction) {
        self.state.depth_func = function;
    }

    fn blend_equation(&mut self, equation: BlendEquation) {
        self.state.blend_equation = equation;
    }

    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor) {
        self.state.blend_source = source;
        self.state.blend_destination = destination;
    }

    fn blend_color(&mut self, color: Vec4) {
        self.state.blend_color = color;
    }

    fn color_mask(&mut self, mask: [bool; 4]) {
        self.state.color_mask = mask;
    }

    fn depth_mask(&mut self, enabled: bool) {
        self.state.depth_mask = enabled;
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.state.viewport = Some((x, y, width, height));
    }

    fn clear_color(&mut self, color: Vec4) {
        self.state.clear_color = color;
    }

    fn clear_depth(&mut self, depth: f32) {
        self.state.clear_depth = depth;
    }

    /// Clears the whole attachment; the viewport does not scissor it.
    fn clear(&mut self, mask: ClearMask) {
        let Some(target) = self.current_target() else {
            tracing::debug!("clear skipped: framebuffer has no usable attachment");
            return;
        };
        let clear_color = (mask.color && self.state.color_mask.contains(&true)).then_some(self.state.clear_color);
        let clear_depth = (mask.depth && self.state.depth_mask).then_some(self.state.clear_depth);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("clear_encoder"),
        });
        {
            let color_attachments = color_attachments(&target, clear_color);
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment(&target, clear_depth),
                ..Default::default()
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
