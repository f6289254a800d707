use crate::device::{BlendEquation, BlendFactor, Capability, CompareFunction, Face, GraphicsDevice, Winding};
use glam::Vec4;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaceCulling {
    pub enabled: bool,
    pub culled_face: Face,
    pub front_face: Winding,
}

impl Default for FaceCulling {
    fn default() -> Self {
        Self {
            enabled: false,
            culled_face: Face::Back,
            front_face: Winding::Ccw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepthTesting {
    pub enabled: bool,
    pub function: CompareFunction,
}

impl Default for DepthTesting {
    fn default() -> Self {
        Self {
            enabled: false,
            function: CompareFunction::Lequal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Blending {
    pub enabled: bool,
    pub equation: BlendEquation,
    pub source_factor: BlendFactor,
    pub destination_factor: BlendFactor,
    pub constant_color: Vec4,
}

impl Default for Blending {
    fn default() -> Self {
        Self {
            enabled: false,
            equation: BlendEquation::FuncAdd,
            source_factor: BlendFactor::SrcAlpha,
            destination_factor: BlendFactor::OneMinusSrcAlpha,
            constant_color: Vec4::ZERO,
        }
    }
}

/// Fixed-function state a material needs before drawing.
///
/// `apply` writes every field on every call, so the device ends up in the
/// same state no matter what ran before.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineState {
    pub face_culling: FaceCulling,
    pub depth_testing: DepthTesting,
    pub blending: Blending,
    pub color_mask: [bool; 4],
    pub depth_mask: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            face_culling: FaceCulling::default(),
            depth_testing: DepthTesting::default(),
            blending: Blending::default(),
            color_mask: [true; 4],
            depth_mask: true,
        }
    }
}

impl PipelineState {
    /// Opaque geometry: back-face culling and depth testing on.
    pub fn opaque() -> Self {
        Self {
            face_culling: FaceCulling {
                enabled: true,
                ..FaceCulling::default()
            },
            depth_testing: DepthTesting {
                enabled: true,
                ..DepthTesting::default()
            },
            ..Self::default()
        }
    }

    /// Alpha-blended geometry that is depth tested but does not write depth.
    pub fn transparent() -> Self {
        Self {
            blending: Blending {
                enabled: true,
                ..Blending::default()
            },
            depth_mask: false,
            ..Self::opaque()
        }
    }

    pub fn apply(&self, device: &mut dyn GraphicsDevice) {
        let culling = &self.face_culling;
        device.set_capability(Capability::CullFace, culling.enabled);
        device.cull_face(culling.culled_face);
        device.front_face(culling.front_face);

        let depth = &self.depth_testing;
        device.set_capability(Capability::DepthTest, depth.enabled);
        device.depth_func(depth.function);

        let blending = &self.blending;
        device.set_capability(Capability::Blend, blending.enabled);
        device.blend_equation(blending.equation);
        device.blend_func(blending.source_factor, blending.destination_factor);
        device.blend_color(blending.constant_color);

        device.color_mask(self.color_mask);
        device.depth_mask(self.depth_mask);
    }
}
