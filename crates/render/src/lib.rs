//! Forward rendering over a scene world.
//!
//! # Invariants
//! - The renderer only reads the world; it never mutates entities.
//! - Every GPU object has exactly one owning wrapper, released by a consuming
//!   `destroy` call.
//! - All device access goes through [`GraphicsDevice`]; [`RecordingDevice`]
//!   implements it in memory for tests and tooling, `lumen-render-wgpu` on
//!   the GPU.

mod config;
pub mod device;
mod forward_renderer;
mod library;
pub mod lights;
mod material;
mod mesh;
pub mod mesh_utils;
mod pipeline_state;
pub mod recording;
mod sampler;
mod shader;
pub mod shaders;
mod source;
mod texture;

pub use config::{RenderError, RendererConfig};
pub use device::{GraphicsDevice, UniformValue};
pub use forward_renderer::{
    sky_transform, sort_back_to_front, ForwardRenderer, FrameOutcome, FrameStats, RenderCommand,
    RendererState, ALWAYS_BEHIND,
};
pub use library::AssetLibrary;
pub use lights::{LightData, SkyLight, MAX_LIGHTS};
pub use material::{Material, MaterialDescriptor, UniformBinder, MATERIAL_TEXTURE_UNIT};
pub use mesh::{Mesh, Vertex};
pub use pipeline_state::{Blending, DepthTesting, FaceCulling, PipelineState};
pub use recording::{DeviceCommand, RecordingDevice};
pub use sampler::{Sampler, SamplerDescriptor};
pub use shader::ShaderProgram;
pub use source::{AssetSource, InMemoryAssetSource};
pub use texture::{ImageData, Texture2D};

pub fn crate_info() -> &'static str {
    "lumen-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
