use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

macro_rules! gpu_name {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

gpu_name!(
    /// Linked (or linkable) shader program.
    ProgramId,
    TextureId,
    SamplerId,
    /// Indexed mesh: vertex buffer, element buffer and the vertex array describing them.
    MeshId,
    /// Attribute-less vertex array used for generated geometry.
    VertexArrayId,
    FramebufferId,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    Rgba8,
    Depth24,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::Depth24 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CullFace,
    DepthTest,
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Face {
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Winding {
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    Lequal,
    Greater,
    Notequal,
    Gequal,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlendEquation {
    FuncAdd,
    FuncSubtract,
    FuncReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextureWrap {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// One sampler parameter write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplerParameter {
    MinFilter(TextureFilter),
    MagFilter(TextureFilter),
    WrapS(TextureWrap),
    WrapT(TextureWrap),
    MaxAnisotropy(f32),
    BorderColor(Vec4),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color0,
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    MissingAttachment,
}

/// Buffers cleared by [`GraphicsDevice::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR_AND_DEPTH: ClearMask = ClearMask {
        color: true,
        depth: true,
    };
}

/// A value uploaded to a named shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

macro_rules! uniform_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    UniformValue::$variant(value)
                }
            }
        )*
    };
}

uniform_from!(
    f32 => Float,
    i32 => Int,
    u32 => UInt,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat4 => Mat4,
);

/// OpenGL-style immediate graphics API consumed by the engine.
///
/// Implementations own the driver context. Object names handed out by the
/// `create_*` calls stay valid until the matching `delete_*` call; the engine
/// wrappers guarantee each name is deleted exactly once.
pub trait GraphicsDevice {
    fn create_program(&mut self) -> ProgramId;
    /// Compile `source` for `stage` and attach it. The error carries the info log.
    ///
    /// Sources are GLSL 450 in the Vulkan dialect (see [`crate::shaders`]).
    fn compile_and_attach(&mut self, program: ProgramId, stage: ShaderStage, source: &str) -> Result<(), String>;
    fn link_program(&mut self, program: ProgramId) -> Result<(), String>;
    fn use_program(&mut self, program: ProgramId);
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue);
    fn delete_program(&mut self, program: ProgramId);

    fn create_texture(&mut self) -> TextureId;
    /// Allocate immutable storage for `levels` mip levels.
    fn texture_storage(&mut self, texture: TextureId, format: TextureFormat, levels: u32, width: u32, height: u32);
    /// Upload level 0. `pixels` of `None` allocates without data.
    fn texture_image(&mut self, texture: TextureId, format: TextureFormat, width: u32, height: u32, pixels: Option<&[u8]>);
    fn generate_mipmap(&mut self, texture: TextureId);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);
    fn delete_texture(&mut self, texture: TextureId);

    fn create_sampler(&mut self) -> SamplerId;
    fn sampler_parameter(&mut self, sampler: SamplerId, parameter: SamplerParameter);
    fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerId>);
    fn delete_sampler(&mut self, sampler: SamplerId);

    /// Upload interleaved vertex bytes of `stride` bytes each, plus triangle-list element indices.
    fn create_mesh(&mut self, vertex_bytes: &[u8], stride: usize, elements: &[u32]) -> MeshId;
    fn draw_mesh(&mut self, mesh: MeshId);
    fn delete_mesh(&mut self, mesh: MeshId);

    fn create_vertex_array(&mut self) -> VertexArrayId;
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);
    /// Non-indexed triangle draw from the bound vertex array.
    fn draw_arrays(&mut self, first: u32, count: u32);
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    fn create_framebuffer(&mut self) -> FramebufferId;
    fn framebuffer_texture(&mut self, framebuffer: FramebufferId, attachment: Attachment, texture: TextureId);
    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus;
    /// `None` binds the default target.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    fn set_capability(&mut self, capability: Capability, enabled: bool);
    fn cull_face(&mut self, face: Face);
    fn front_face(&mut self, winding: Winding);
    fn depth_func(&mut self, function: CompareFunction);
    fn blend_equation(&mut self, equation: BlendEquation);
    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor);
    fn blend_color(&mut self, color: Vec4);
    fn color_mask(&mut self, mask: [bool; 4]);
    fn depth_mask(&mut self, enabled: bool);

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear_color(&mut self, color: Vec4);
    fn clear_depth(&mut self, depth: f32);
    fn clear(&mut self, mask: ClearMask);
}
