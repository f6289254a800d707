//! wgpu backend for the lumen graphics device.
//!
//! [`WgpuDevice`] implements [`lumen_render::GraphicsDevice`] without a
//! window: frames land in an offscreen target that can be read back. Shader
//! stages are GLSL 450 (Vulkan dialect) compiled through naga.
//!
//! # Invariants
//! - Uniform, texture and sampler names resolve through reflection of the
//!   linked stages; writes to names the program does not declare are ignored.
//! - Render pipelines are cached per program and fixed-function state, and
//!   dropped when their program is relinked or deleted.
//! - GL conventions are kept at the trait boundary: viewports count from the
//!   bottom-left and read-back rows run bottom-up.

mod convert;
mod gpu;
mod mipmap;
pub mod reflect;
mod shaders;

pub use gpu::{BackendError, WgpuDevice};

pub fn crate_info() -> &'static str {
    "lumen-render-wgpu v0.1.0"
}
