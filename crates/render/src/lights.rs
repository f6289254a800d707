//! Per-draw lighting uniforms.
//!
//! # Invariants
//! - At most [`MAX_LIGHTS`] lights are uploaded; extra lights are dropped in
//!   scene order.
//! - The ambient sky triad is uploaded on every call, even with no lights.

use crate::device::{GraphicsDevice, ProgramId};
use glam::{Mat4, Vec2, Vec3};
use lumen_ecs::{LightComponent, LightType};
use lumen_kernel::World;
use serde::{Deserialize, Serialize};

pub const MAX_LIGHTS: usize = 8;

/// Ambient light: a sky, horizon and ground color blended by normal direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyLight {
    pub top: Vec3,
    pub horizon: Vec3,
    pub bottom: Vec3,
}

impl Default for SkyLight {
    fn default() -> Self {
        Self {
            top: Vec3::new(0.35, 0.45, 0.6),
            horizon: Vec3::new(0.25, 0.25, 0.25),
            bottom: Vec3::new(0.1, 0.08, 0.05),
        }
    }
}

/// A light resolved to world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightData {
    pub light_type: LightType,
    pub color: Vec3,
    pub position: Vec3,
    pub direction: Vec3,
    pub attenuation: Vec3,
    pub cone_angles: Vec2,
}

impl LightData {
    pub fn from_component(light: &LightComponent, local_to_world: &Mat4) -> Self {
        Self {
            light_type: light.light_type,
            color: light.color.normalize_or_zero(),
            position: local_to_world.transform_point3(Vec3::ZERO),
            direction: local_to_world.transform_vector3(light.direction).normalize_or_zero(),
            attenuation: light.attenuation,
            cone_angles: light.cone_angles,
        }
    }

    fn upload(&self, device: &mut dyn GraphicsDevice, program: ProgramId, index: usize) {
        let name = |field: &str| format!("lights[{index}].{field}");
        device.set_uniform(program, &name("type"), self.light_type.code().into());
        device.set_uniform(program, &name("color"), self.color.into());
        match self.light_type {
            LightType::Directional => {
                device.set_uniform(program, &name("direction"), self.direction.into());
            }
            LightType::Point => {
                device.set_uniform(program, &name("position"), self.position.into());
                device.set_uniform(program, &name("attenuation"), self.attenuation.into());
            }
            LightType::Spot => {
                device.set_uniform(program, &name("position"), self.position.into());
                device.set_uniform(program, &name("direction"), self.direction.into());
                device.set_uniform(program, &name("attenuation"), self.attenuation.into());
                device.set_uniform(program, &name("cone_angles"), self.cone_angles.into());
            }
        }
    }
}

/// Gather up to [`MAX_LIGHTS`] lights from the world, one per entity.
pub fn collect_lights(world: &World) -> Vec<LightData> {
    let mut lights = Vec::new();
    let mut dropped = 0usize;
    for entity in world.entities() {
        let Some(light) = entity.get_component::<LightComponent>() else {
            continue;
        };
        if lights.len() == MAX_LIGHTS {
            dropped += 1;
            continue;
        }
        if let Some(matrix) = world.local_to_world_matrix(entity.id()) {
            lights.push(LightData::from_component(light, &matrix));
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, max = MAX_LIGHTS, "light limit reached");
    }
    lights
}

/// Write `light_count`, each light's fields, and the sky triad to `program`.
pub fn upload_lights(device: &mut dyn GraphicsDevice, program: ProgramId, lights: &[LightData], sky: &SkyLight) {
    let lights = &lights[..lights.len().min(MAX_LIGHTS)];
    device.set_uniform(program, "light_count", (lights.len() as i32).into());
    for (index, light) in lights.iter().enumerate() {
        light.upload(device, program, index);
    }
    device.set_uniform(program, "sky.top", sky.top.into());
    device.set_uniform(program, "sky.horizon", sky.horizon.into());
    device.set_uniform(program, "sky.bottom", sky.bottom.into());
}
