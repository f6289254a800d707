//! In-memory [`GraphicsDevice`] that records every call.
//!
//! Tracks the fixed-function state a driver would hold, plus every live GPU
//! object, so callers can check what a frame did and that every resource is
//! released exactly once. This is the test double; real frames go through the
//! wgpu backend in `lumen-render-wgpu`. The CLI can still select it to trace
//! the command stream of a frame.

use crate::device::{
    Attachment, BlendEquation, BlendFactor, Capability, ClearMask, CompareFunction, Face,
    FramebufferId, FramebufferStatus, GraphicsDevice, MeshId, ProgramId, SamplerId,
    SamplerParameter, ShaderStage, TextureFormat, TextureId, UniformValue, VertexArrayId, Winding,
};
use glam::Vec4;
use std::collections::{BTreeMap, BTreeSet};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateProgram(ProgramId),
    CompileAndAttach { program: ProgramId, stage: ShaderStage, ok: bool },
    LinkProgram { program: ProgramId, ok: bool },
    UseProgram(ProgramId),
    SetUniform { program: ProgramId, name: String, value: UniformValue },
    DeleteProgram(ProgramId),
    CreateTexture(TextureId),
    TextureStorage { texture: TextureId, format: TextureFormat, levels: u32, width: u32, height: u32 },
    TextureImage { texture: TextureId, format: TextureFormat, width: u32, height: u32, has_pixels: bool },
    GenerateMipmap(TextureId),
    BindTexture { unit: u32, texture: Option<TextureId> },
    DeleteTexture(TextureId),
    CreateSampler(SamplerId),
    SamplerParameter { sampler: SamplerId, parameter: SamplerParameter },
    BindSampler { unit: u32, sampler: Option<SamplerId> },
    DeleteSampler(SamplerId),
    CreateMesh { mesh: MeshId, vertex_count: usize, element_count: usize },
    DrawMesh(MeshId),
    DeleteMesh(MeshId),
    CreateVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    DrawArrays { first: u32, count: u32 },
    DeleteVertexArray(VertexArrayId),
    CreateFramebuffer(FramebufferId),
    FramebufferTexture { framebuffer: FramebufferId, attachment: Attachment, texture: TextureId },
    FramebufferStatus { framebuffer: FramebufferId, status: FramebufferStatus },
    BindFramebuffer(Option<FramebufferId>),
    DeleteFramebuffer(FramebufferId),
    SetCapability { capability: Capability, enabled: bool },
    CullFace(Face),
    FrontFace(Winding),
    DepthFunc(CompareFunction),
    BlendEquation(BlendEquation),
    BlendFunc { source: BlendFactor, destination: BlendFactor },
    BlendColor(Vec4),
    ColorMask([bool; 4]),
    DepthMask(bool),
    Viewport { x: i32, y: i32, width: u32, height: u32 },
    ClearColor(Vec4),
    ClearDepth(f32),
    Clear(ClearMask),
}

impl DeviceCommand {
    pub fn is_draw(&self) -> bool {
        matches!(self, DeviceCommand::DrawMesh(_) | DeviceCommand::DrawArrays { .. })
    }
}

/// Current fixed-function and binding state, starting from GL defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub cull_face_enabled: bool,
    pub depth_test_enabled: bool,
    pub blend_enabled: bool,
    pub cull_face: Face,
    pub front_face: Winding,
    pub depth_func: CompareFunction,
    pub blend_equation: BlendEquation,
    pub blend_source: BlendFactor,
    pub blend_destination: BlendFactor,
    pub blend_color: Vec4,
    pub color_mask: [bool; 4],
    pub depth_mask: bool,
    pub viewport: (i32, i32, u32, u32),
    pub clear_color: Vec4,
    pub clear_depth: f32,
    pub program: Option<ProgramId>,
    pub framebuffer: Option<FramebufferId>,
    pub vertex_array: Option<VertexArrayId>,
    pub textures: BTreeMap<u32, TextureId>,
    pub samplers: BTreeMap<u32, SamplerId>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            cull_face_enabled: false,
            depth_test_enabled: false,
            blend_enabled: false,
            cull_face: Face::Back,
            front_face: Winding::Ccw,
            depth_func: CompareFunction::Less,
            blend_equation: BlendEquation::FuncAdd,
            blend_source: BlendFactor::One,
            blend_destination: BlendFactor::Zero,
            blend_color: Vec4::ZERO,
            color_mask: [true; 4],
            depth_mask: true,
            viewport: (0, 0, 0, 0),
            clear_color: Vec4::ZERO,
            clear_depth: 1.0,
            program: None,
            framebuffer: None,
            vertex_array: None,
            textures: BTreeMap::new(),
            samplers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramRecord {
    pub stages: Vec<ShaderStage>,
    pub linked: bool,
    pub uniforms: BTreeMap<String, UniformValue>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureRecord {
    pub format: Option<TextureFormat>,
    pub width: u32,
    pub height: u32,
    pub levels: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshRecord {
    pub vertex_count: usize,
    pub element_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramebufferRecord {
    pub color: Option<TextureId>,
    pub depth: Option<TextureId>,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_name: u32,
    commands: Vec<DeviceCommand>,
    state: DeviceState,
    programs: BTreeMap<ProgramId, ProgramRecord>,
    textures: BTreeMap<TextureId, TextureRecord>,
    samplers: BTreeMap<SamplerId, Vec<SamplerParameter>>,
    meshes: BTreeMap<MeshId, MeshRecord>,
    vertex_arrays: BTreeSet<VertexArrayId>,
    framebuffers: BTreeMap<FramebufferId, FramebufferRecord>,
    invalid_deletes: usize,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Return the recorded calls and start a fresh log. Object and state
    /// tracking are kept.
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn program(&self, id: ProgramId) -> Option<&ProgramRecord> {
        self.programs.get(&id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureRecord> {
        self.textures.get(&id)
    }

    pub fn sampler_parameters(&self, id: SamplerId) -> Option<&[SamplerParameter]> {
        self.samplers.get(&id).map(Vec::as_slice)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshRecord> {
        self.meshes.get(&id)
    }

    pub fn framebuffer(&self, id: FramebufferId) -> Option<&FramebufferRecord> {
        self.framebuffers.get(&id)
    }

    /// Last value written to a uniform of a live program.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.programs.get(&program)?.uniforms.get(name).copied()
    }

    /// Number of GPU objects not yet deleted.
    pub fn live_object_count(&self) -> usize {
        self.programs.len()
            + self.textures.len()
            + self.samplers.len()
            + self.meshes.len()
            + self.vertex_arrays.len()
            + self.framebuffers.len()
    }

    /// Deletes of names that were never created or were already deleted.
    pub fn invalid_deletes(&self) -> usize {
        self.invalid_deletes
    }

    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    fn allocate(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn record(&mut self, command: DeviceCommand) {
        self.commands.push(command);
    }

    fn note_delete(&mut self, existed: bool) {
        if !existed {
            self.invalid_deletes += 1;
        }
    }

    fn attachment_complete(&self, texture: Option<TextureId>, expected: TextureFormat) -> bool {
        texture
            .and_then(|id| self.textures.get(&id))
            .is_some_and(|t| t.format == Some(expected) && t.width > 0 && t.height > 0)
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_program(&mut self) -> ProgramId {
        let id = ProgramId(self.allocate());
        self.programs.insert(id, ProgramRecord::default());
        self.record(DeviceCommand::CreateProgram(id));
        id
    }

    fn compile_and_attach(&mut self, program: ProgramId, stage: ShaderStage, source: &str) -> Result<(), String> {
        let result = if source.trim().is_empty() {
            Err("0:1: error: empty shader source".to_string())
        } else if !source.contains("main") {
            Err("0:1: error: missing entry point 'main'".to_string())
        } else {
            match self.programs.get_mut(&program) {
                Some(record) => {
                    record.stages.push(stage);
                    Ok(())
                }
                None => Err(format!("invalid program {}", program.0)),
            }
        };
        self.record(DeviceCommand::CompileAndAttach {
            program,
            stage,
            ok: result.is_ok(),
        });
        result
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), String> {
        let result = match self.programs.get_mut(&program) {
            Some(record) => {
                let has = |stage: ShaderStage| record.stages.contains(&stage);
                if has(ShaderStage::Vertex) && has(ShaderStage::Fragment) {
                    record.linked = true;
                    Ok(())
                } else {
                    Err("link error: program needs a vertex and a fragment stage".to_string())
                }
            }
            None => Err(format!("invalid program {}", program.0)),
        };
        self.record(DeviceCommand::LinkProgram {
            program,
            ok: result.is_ok(),
        });
        result
    }

    fn use_program(&mut self, program: ProgramId) {
        self.state.program = Some(program);
        self.record(DeviceCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        if let Some(record) = self.programs.get_mut(&program) {
            record.uniforms.insert(name.to_string(), value);
        }
        self.record(DeviceCommand::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn delete_program(&mut self, program: ProgramId) {
        let existed = self.programs.remove(&program).is_some();
        if self.state.program == Some(program) {
            self.state.program = None;
        }
        self.note_delete(existed);
        self.record(DeviceCommand::DeleteProgram(program));
    }

    fn create_texture(&mut self) -> TextureId {
        let id = TextureId(self.allocate());
        self.textures.insert(id, TextureRecord::default());
        self.record(DeviceCommand::CreateTexture(id));
        id
    }

    fn texture_storage(&mut self, texture: TextureId, format: TextureFormat, levels: u32, width: u32, height: u32) {
        if let Some(record) = self.textures.get_mut(&texture) {
            *record = TextureRecord {
                format: Some(format),
                width,
                height,
                levels,
            };
        }
        self.record(DeviceCommand::TextureStorage {
            texture,
            format,
            levels,
            width,
            height,
        });
    }

    fn texture_image(&mut self, texture: TextureId, format: TextureFormat, width: u32, height: u32, pixels: Option<&[u8]>) {
        if let Some(record) = self.textures.get_mut(&texture) {
            *record = TextureRecord {
                format: Some(format),
                width,
                height,
                levels: 1,
            };
        }
        self.record(DeviceCommand::TextureImage {
            texture,
            format,
            width,
            height,
            has_pixels: pixels.is_some(),
        });
    }

    fn generate_mipmap(&mut self, texture: TextureId) {
        if let Some(record) = self.textures.get_mut(&texture) {
            record.levels = lumen_common::ViewportSize::new(record.width, record.height).mip_levels();
        }
        self.record(DeviceCommand::GenerateMipmap(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) => self.state.textures.insert(unit, id),
            None => self.state.textures.remove(&unit),
        };
        self.record(DeviceCommand::BindTexture { unit, texture });
    }

    fn delete_texture(&mut self, texture: TextureId) {
        let existed = self.textures.remove(&texture).is_some();
        self.state.textures.retain(|_, bound| *bound != texture);
        self.note_delete(existed);
        self.record(DeviceCommand::DeleteTexture(texture));
    }

    fn create_sampler(&mut self) -> SamplerId {
        let id = SamplerId(self.allocate());
        self.samplers.insert(id, Vec::new());
        self.record(DeviceCommand::CreateSampler(id));
        id
    }

    fn sampler_parameter(&mut self, sampler: SamplerId, parameter: SamplerParameter) {
        if let Some(params) = self.samplers.get_mut(&sampler) {
            params.push(parameter);
        }
        self.record(DeviceCommand::SamplerParameter { sampler, parameter });
    }

    fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerId>) {
        match sampler {
            Some(id) => self.state.samplers.insert(unit, id),
            None => self.state.samplers.remove(&unit),
        };
        self.record(DeviceCommand::BindSampler { unit, sampler });
    }

    fn delete_sampler(&mut self, sampler: SamplerId) {
        let existed = self.samplers.remove(&sampler).is_some();
        self.state.samplers.retain(|_, bound| *bound != sampler);
        self.note_delete(existed);
        self.record(DeviceCommand::DeleteSampler(sampler));
    }

    fn create_mesh(&mut self, vertex_bytes: &[u8], stride: usize, elements: &[u32]) -> MeshId {
        let id = MeshId(self.allocate());
        let vertex_count = if stride == 0 { 0 } else { vertex_bytes.len() / stride };
        let record = MeshRecord {
            vertex_count,
            element_count: elements.len(),
        };
        self.meshes.insert(id, record);
        self.record(DeviceCommand::CreateMesh {
            mesh: id,
            vertex_count,
            element_count: elements.len(),
        });
        id
    }

    fn draw_mesh(&mut self, mesh: MeshId) {
        self.record(DeviceCommand::DrawMesh(mesh));
    }

    fn delete_mesh(&mut self, mesh: MeshId) {
        let existed = self.meshes.remove(&mesh).is_some();
        self.note_delete(existed);
        self.record(DeviceCommand::DeleteMesh(mesh));
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = VertexArrayId(self.allocate());
        self.vertex_arrays.insert(id);
        self.record(DeviceCommand::CreateVertexArray(id));
        id
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.state.vertex_array = vertex_array;
        self.record(DeviceCommand::BindVertexArray(vertex_array));
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        self.record(DeviceCommand::DrawArrays { first, count });
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        let existed = self.vertex_arrays.remove(&vertex_array);
        if self.state.vertex_array == Some(vertex_array) {
            self.state.vertex_array = None;
        }
        self.note_delete(existed);
        self.record(DeviceCommand::DeleteVertexArray(vertex_array));
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = FramebufferId(self.allocate());
        self.framebuffers.insert(id, FramebufferRecord::default());
        self.record(DeviceCommand::CreateFramebuffer(id));
        id
    }

    fn framebuffer_texture(&mut self, framebuffer: FramebufferId, attachment: Attachment, texture: TextureId) {
        if let Some(record) = self.framebuffers.get_mut(&framebuffer) {
            match attachment {
                Attachment::Color0 => record.color = Some(texture),
                Attachment::Depth => record.depth = Some(texture),
            }
        }
        self.record(DeviceCommand::FramebufferTexture {
            framebuffer,
            attachment,
            texture,
        });
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus {
        let status = match self.framebuffers.get(&framebuffer).copied() {
            None => FramebufferStatus::MissingAttachment,
            Some(record) if record.color.is_none() && record.depth.is_none() => {
                FramebufferStatus::MissingAttachment
            }
            Some(record) => {
                let color_ok = record.color.is_none()
                    || self.attachment_complete(record.color, TextureFormat::Rgba8);
                let depth_ok = record.depth.is_none()
                    || self.attachment_complete(record.depth, TextureFormat::Depth24);
                if color_ok && depth_ok {
                    FramebufferStatus::Complete
                } else {
                    FramebufferStatus::IncompleteAttachment
                }
            }
        };
        self.record(DeviceCommand::FramebufferStatus { framebuffer, status });
        status
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.state.framebuffer = framebuffer;
        self.record(DeviceCommand::BindFramebuffer(framebuffer));
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        let existed = self.framebuffers.remove(&framebuffer).is_some();
        if self.state.framebuffer == Some(framebuffer) {
            self.state.framebuffer = None;
        }
        self.note_delete(existed);
        self.record(DeviceCommand::DeleteFramebuffer(framebuffer));
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::CullFace => self.state.cull_face_enabled = enabled,
            Capability::DepthTest => self.state.depth_test_enabled = enabled,
            Capability::Blend => self.state.blend_enabled = enabled,
        }
        self.record(DeviceCommand::SetCapability { capability, enabled });
    }

    fn cull_face(&mut self, face: Face) {
        self.state.cull_face = face;
        self.record(DeviceCommand::CullFace(face));
    }

    fn front_face(&mut self, winding: Winding) {
        self.state.front_face = winding;
        self.record(DeviceCommand::FrontFace(winding));
    }

    fn depth_func(&mut self, function: CompareFunction) {
        self.state.depth_func = function;
        self.record(DeviceCommand::DepthFunc(function));
    }

    fn blend_equation(&mut self, equation: BlendEquation) {
        self.state.blend_equation = equation;
        self.record(DeviceCommand::BlendEquation(equation));
    }

    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor) {
        self.state.blend_source = source;
        self.state.blend_destination = destination;
        self.record(DeviceCommand::BlendFunc { source, destination });
    }

    fn blend_color(&mut self, color: Vec4) {
        self.state.blend_color = color;
        self.record(DeviceCommand::BlendColor(color));
    }

    fn color_mask(&mut self, mask: [bool; 4]) {
        self.state.color_mask = mask;
        self.record(DeviceCommand::ColorMask(mask));
    }

    fn depth_mask(&mut self, enabled: bool) {
        self.state.depth_mask = enabled;
        self.record(DeviceCommand::DepthMask(enabled));
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.state.viewport = (x, y, width, height);
        self.record(DeviceCommand::Viewport { x, y, width, height });
    }

    fn clear_color(&mut self, color: Vec4) {
        self.state.clear_color = color;
        self.record(DeviceCommand::ClearColor(color));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.state.clear_depth = depth;
        self.record(DeviceCommand::ClearDepth(depth));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.record(DeviceCommand::Clear(mask));
    }
}
