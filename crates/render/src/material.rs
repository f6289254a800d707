//! Materials: a shader program, fixed-function state and an ordered list of
//! uniform binders.
//!
//! # Invariants
//! - `setup` applies the pipeline state, activates the program, then runs the
//!   binders in the order they were added.
//! - A texture binder with no texture or no sampler skips that bind.

use crate::device::{GraphicsDevice, ProgramId, SamplerId, TextureId};
use crate::pipeline_state::PipelineState;
use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Texture unit used by textured materials.
pub const MATERIAL_TEXTURE_UNIT: u32 = 0;

/// One layer of per-material uniform writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformBinder {
    /// Writes `tint`.
    Tint(Vec4),
    /// Writes `alphaThreshold`.
    AlphaThreshold(f32),
    /// Binds a texture and sampler to `unit` and points `tex` at it.
    Texture {
        texture: Option<TextureId>,
        sampler: Option<SamplerId>,
        unit: u32,
    },
}

impl UniformBinder {
    pub fn bind(&self, device: &mut dyn GraphicsDevice, program: ProgramId) {
        match *self {
            UniformBinder::Tint(tint) => device.set_uniform(program, "tint", tint.into()),
            UniformBinder::AlphaThreshold(threshold) => {
                device.set_uniform(program, "alphaThreshold", threshold.into())
            }
            UniformBinder::Texture {
                texture,
                sampler,
                unit,
            } => {
                if let Some(texture) = texture {
                    device.bind_texture(unit, Some(texture));
                    device.set_uniform(program, "tex", (unit as i32).into());
                }
                if let Some(sampler) = sampler {
                    device.bind_sampler(unit, Some(sampler));
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub program: ProgramId,
    pub pipeline_state: PipelineState,
    pub transparent: bool,
    binders: Vec<UniformBinder>,
}

impl Material {
    pub fn new(program: ProgramId) -> Self {
        Self {
            program,
            pipeline_state: PipelineState::default(),
            transparent: false,
            binders: Vec::new(),
        }
    }

    /// A material that multiplies its output by `tint`.
    pub fn tinted(program: ProgramId, tint: Vec4) -> Self {
        Self::new(program).with_binder(UniformBinder::Tint(tint))
    }

    /// A tinted material sampling `texture` through `sampler` on the material
    /// texture unit, discarding fragments below `alpha_threshold`.
    pub fn textured(
        program: ProgramId,
        tint: Vec4,
        alpha_threshold: f32,
        texture: Option<TextureId>,
        sampler: Option<SamplerId>,
    ) -> Self {
        Self::tinted(program, tint)
            .with_binder(UniformBinder::AlphaThreshold(alpha_threshold))
            .with_binder(UniformBinder::Texture {
                texture,
                sampler,
                unit: MATERIAL_TEXTURE_UNIT,
            })
    }

    pub fn with_pipeline_state(mut self, pipeline_state: PipelineState) -> Self {
        self.pipeline_state = pipeline_state;
        self
    }

    pub fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn with_binder(mut self, binder: UniformBinder) -> Self {
        self.binders.push(binder);
        self
    }

    pub fn push_binder(&mut self, binder: UniformBinder) {
        self.binders.push(binder);
    }

    pub fn binders(&self) -> &[UniformBinder] {
        &self.binders
    }

    /// True if any texture binder binds `texture`.
    pub fn uses_texture(&self, texture: TextureId) -> bool {
        self.binders
            .iter()
            .any(|binder| matches!(binder, UniformBinder::Texture { texture: Some(t), .. } if *t == texture))
    }

    pub fn uses_sampler(&self, sampler: SamplerId) -> bool {
        self.binders
            .iter()
            .any(|binder| matches!(binder, UniformBinder::Texture { sampler: Some(s), .. } if *s == sampler))
    }

    pub fn tint(&self) -> Option<Vec4> {
        self.binders.iter().find_map(|b| match b {
            UniformBinder::Tint(tint) => Some(*tint),
            _ => None,
        })
    }

    pub fn setup(&self, device: &mut dyn GraphicsDevice) {
        self.pipeline_state.apply(device);
        device.use_program(self.program);
        for binder in &self.binders {
            binder.bind(device, self.program);
        }
    }
}

fn default_tint() -> Vec4 {
    Vec4::ONE
}

/// Serializable material description; resources are referenced by name and
/// resolved by the asset library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MaterialDescriptor {
    Material {
        shader: String,
        #[serde(default, rename = "pipelineState")]
        pipeline_state: PipelineState,
        #[serde(default)]
        transparent: bool,
    },
    Tinted {
        shader: String,
        #[serde(default, rename = "pipelineState")]
        pipeline_state: PipelineState,
        #[serde(default)]
        transparent: bool,
        #[serde(default = "default_tint")]
        tint: Vec4,
    },
    Textured {
        shader: String,
        #[serde(default, rename = "pipelineState")]
        pipeline_state: PipelineState,
        #[serde(default)]
        transparent: bool,
        #[serde(default = "default_tint")]
        tint: Vec4,
        #[serde(default, rename = "alphaThreshold")]
        alpha_threshold: f32,
        #[serde(default)]
        texture: Option<String>,
        #[serde(default)]
        sampler: Option<String>,
    },
}

impl MaterialDescriptor {
    pub fn shader(&self) -> &str {
        match self {
            MaterialDescriptor::Material { shader, .. }
            | MaterialDescriptor::Tinted { shader, .. }
            | MaterialDescriptor::Textured { shader, .. } => shader,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UniformValue;
    use crate::recording::{DeviceCommand, RecordingDevice};

    fn uniform_names(commands: &[DeviceCommand]) -> Vec<&str> {
        commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::SetUniform { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn setup_applies_state_then_program_then_binders() {
        let mut device = RecordingDevice::new();
        let program = device.create_program();
        let texture = device.create_texture();
        let sampler = device.create_sampler();
        device.take_commands();

        let material = Material::textured(program, Vec4::ONE, 0.5, Some(texture), Some(sampler));
        material.setup(&mut device);
        let commands = device.take_commands();

        let use_at = commands
            .iter()
            .position(|c| *c == DeviceCommand::UseProgram(program))
            .unwrap();
        let last_mask = commands
            .iter()
            .rposition(|c| matches!(c, DeviceCommand::DepthMask(_)))
            .unwrap();
        assert!(last_mask < use_at);
        assert_eq!(uniform_names(&commands[use_at..]), vec!["tint", "alphaThreshold", "tex"]);
        assert_eq!(device.state().textures.get(&MATERIAL_TEXTURE_UNIT), Some(&texture));
        assert_eq!(device.state().samplers.get(&MATERIAL_TEXTURE_UNIT), Some(&sampler));
        assert_eq!(device.uniform(program, "alphaThreshold"), Some(UniformValue::Float(0.5)));
    }

    #[test]
    fn textured_without_texture_or_sampler_skips_binds() {
        let mut device = RecordingDevice::new();
        let program = device.create_program();
        device.take_commands();

        let material = Material::textured(program, Vec4::new(1.0, 0.0, 0.0, 1.0), 0.1, None, None);
        material.setup(&mut device);
        let commands = device.take_commands();

        assert!(!commands.iter().any(|c| matches!(
            c,
            DeviceCommand::BindTexture { .. } | DeviceCommand::BindSampler { .. }
        )));
        assert_eq!(uniform_names(&commands), vec!["tint", "alphaThreshold"]);
        assert_eq!(device.uniform(program, "tint"), Some(UniformValue::Vec4(Vec4::new(1.0, 0.0, 0.0, 1.0))));
    }

    #[test]
    fn plain_material_only_sets_state_and_program() {
        let mut device = RecordingDevice::new();
        let program = device.create_program();
        device.take_commands();
        Material::new(program).setup(&mut device);
        let commands = device.take_commands();
        assert!(uniform_names(&commands).is_empty());
        assert_eq!(device.state().program, Some(program));
    }

    #[test]
    fn tint_lookup() {
        let p = ProgramId(1);
        assert_eq!(Material::new(p).tint(), None);
        assert_eq!(Material::tinted(p, Vec4::splat(0.5)).tint(), Some(Vec4::splat(0.5)));
    }

    #[test]
    fn descriptor_parses_textured_document() {
        let json = r#"{
            "type": "textured",
            "shader": "textured",
            "transparent": true,
            "pipelineState": {"blending": {"enabled": true}},
            "alphaThreshold": 0.3,
            "texture": "glass",
            "sampler": "default"
        }"#;
        let desc: MaterialDescriptor = serde_json::from_str(json).unwrap();
        match &desc {
            MaterialDescriptor::Textured {
                transparent,
                tint,
                alpha_threshold,
                texture,
                pipeline_state,
                ..
            } => {
                assert!(*transparent);
                assert_eq!(*tint, Vec4::ONE);
                assert!((alpha_threshold - 0.3).abs() < 1e-6);
                assert_eq!(texture.as_deref(), Some("glass"));
                assert!(pipeline_state.blending.enabled);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(desc.shader(), "textured");
    }
}
