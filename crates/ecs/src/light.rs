use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    Directional,
    #[default]
    Point,
    Spot,
}

impl LightType {
    /// Integer code shaders switch on.
    pub fn code(self) -> i32 {
        match self {
            Self::Directional => 0,
            Self::Point => 1,
            Self::Spot => 2,
        }
    }
}

/// Light capability. Position comes from the owning entity; `direction` is
/// in the entity's local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightComponent {
    pub light_type: LightType,
    pub color: Vec3,
    /// Used by directional and spot lights.
    pub direction: Vec3,
    /// Inner and outer cone angles in radians (spot only).
    pub cone_angles: Vec2,
    /// Constant, linear and quadratic falloff terms (point and spot).
    pub attenuation: Vec3,
}

impl Default for LightComponent {
    fn default() -> Self {
        Self {
            light_type: LightType::Point,
            color: Vec3::ONE,
            direction: Vec3::new(-1.0, 0.0, 0.0),
            cone_angles: Vec2::new(15f32.to_radians(), 30f32.to_radians()),
            attenuation: Vec3::new(0.0, 0.0, 1.0),
        }
    }
}

impl LightComponent {
    pub fn directional(color: Vec3, direction: Vec3) -> Self {
        Self {
            light_type: LightType::Directional,
            color,
            direction,
            ..Self::default()
        }
    }

    pub fn point(color: Vec3, attenuation: Vec3) -> Self {
        Self {
            light_type: LightType::Point,
            color,
            attenuation,
            ..Self::default()
        }
    }

    pub fn spot(color: Vec3, direction: Vec3, attenuation: Vec3, cone_angles: Vec2) -> Self {
        Self {
            light_type: LightType::Spot,
            color,
            direction,
            attenuation,
            cone_angles,
        }
    }
}
