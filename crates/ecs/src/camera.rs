use glam::{Mat4, Vec3};
use lumen_common::ViewportSize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    #[default]
    Perspective,
    Orthographic,
}

/// Camera capability. The owning entity's world matrix places the camera:
/// it sits at the local origin, looks down local -Z, with local +Y up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraComponent {
    pub camera_type: CameraType,
    pub near: f32,
    pub far: f32,
    /// Vertical field of view in radians. Scene documents give it in degrees.
    #[serde(rename = "fovY", with = "degrees")]
    pub fov_y: f32,
    /// Full height of the orthographic view volume.
    pub ortho_height: f32,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            camera_type: CameraType::Perspective,
            near: 0.01,
            far: 100.0,
            fov_y: 90f32.to_radians(),
            ortho_height: 1.0,
        }
    }
}

impl CameraComponent {
    /// World-space position of the eye.
    pub fn eye(local_to_world: &Mat4) -> Vec3 {
        local_to_world.transform_point3(Vec3::ZERO)
    }

    /// Un-normalized world-space forward vector (local -Z, translation ignored).
    pub fn forward(local_to_world: &Mat4) -> Vec3 {
        local_to_world.transform_vector3(Vec3::NEG_Z)
    }

    pub fn view_matrix(&self, local_to_world: &Mat4) -> Mat4 {
        let eye = Self::eye(local_to_world);
        let center = local_to_world.transform_point3(Vec3::NEG_Z);
        let up = local_to_world.transform_vector3(Vec3::Y);
        Mat4::look_at_rh(eye, center, up)
    }

    pub fn projection_matrix(&self, viewport: ViewportSize) -> Mat4 {
        let aspect = viewport.aspect_ratio();
        match self.camera_type {
            CameraType::Orthographic => {
                // Depth spans the camera's near..far like the perspective
                // case, not a fixed [-1, 1] view-space slab.
                let half_height = self.ortho_height / 2.0;
                let half_width = half_height * aspect;
                Mat4::orthographic_rh_gl(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
            CameraType::Perspective => {
                Mat4::perspective_rh_gl(self.fov_y, aspect, self.near, self.far)
            }
        }
    }
}

mod degrees {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(radians: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(radians.to_degrees())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        f32::deserialize(deserializer).map(f32::to_radians)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn ortho(height: f32) -> CameraComponent {
        CameraComponent {
            camera_type: CameraType::Orthographic,
            ortho_height: height,
            ..CameraComponent::default()
        }
    }

    #[test]
    fn defaults() {
        let cam = CameraComponent::default();
        assert_eq!(cam.camera_type, CameraType::Perspective);
        assert_eq!(cam.near, 0.01);
        assert_eq!(cam.far, 100.0);
        assert!((cam.fov_y - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn orthographic_maps_half_height_to_clip_edges() {
        let proj = ortho(2.0).projection_matrix(ViewportSize::new(100, 100));
        let top = proj * Vec4::new(0.0, 1.0, -1.0, 1.0);
        let bottom = proj * Vec4::new(0.0, -1.0, -1.0, 1.0);
        assert!((top.y / top.w - 1.0).abs() < 1e-5);
        assert!((bottom.y / bottom.w + 1.0).abs() < 1e-5);
    }

    #[test]
    fn orthographic_depth_uses_near_and_far() {
        let cam = CameraComponent {
            near: 0.5,
            far: 50.0,
            ..ortho(2.0)
        };
        let proj = cam.projection_matrix(ViewportSize::new(100, 100));
        let ndc_z = |z: f32| {
            let clip = proj * Vec4::new(0.0, 0.0, z, 1.0);
            clip.z / clip.w
        };
        assert!((ndc_z(-0.5) + 1.0).abs() < 1e-5);
        assert!((ndc_z(-50.0) - 1.0).abs() < 1e-5);
        // Far beyond a unit slab but inside near..far: still visible.
        assert!(ndc_z(-25.0).abs() < 1.0);
        assert!(ndc_z(-60.0) > 1.0);
        assert!(ndc_z(-0.1) < -1.0);
    }

    #[test]
    fn orthographic_width_follows_aspect() {
        let proj = ortho(2.0).projection_matrix(ViewportSize::new(200, 100));
        let right = proj * Vec4::new(2.0, 0.0, -1.0, 1.0);
        assert!((right.x / right.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn view_matrix_of_identity_camera_is_identity() {
        let view = CameraComponent::default().view_matrix(&Mat4::IDENTITY);
        assert!(view.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn view_matrix_moves_world_opposite_to_camera() {
        let m = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let view = CameraComponent::default().view_matrix(&m);
        let p = view.transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5));
    }

    #[test]
    fn forward_ignores_translation() {
        let m = Mat4::from_translation(Vec3::new(3.0, 4.0, 5.0)) * Mat4::from_scale(Vec3::splat(2.0));
        assert!(CameraComponent::forward(&m).abs_diff_eq(Vec3::new(0.0, 0.0, -2.0), 1e-6));
        assert!(CameraComponent::eye(&m).abs_diff_eq(Vec3::new(3.0, 4.0, 5.0), 1e-6));
    }

    #[test]
    fn perspective_puts_near_plane_at_minus_one() {
        let cam = CameraComponent {
            near: 1.0,
            far: 10.0,
            ..CameraComponent::default()
        };
        let proj = cam.projection_matrix(ViewportSize::new(640, 480));
        let p = proj * Vec4::new(0.0, 0.0, -1.0, 1.0);
        assert!((p.z / p.w + 1.0).abs() < 1e-5);
    }

    #[test]
    fn fov_round_trips_through_degrees() {
        let cam: CameraComponent = serde_json::from_str(r#"{ "fovY": 60.0 }"#).unwrap();
        assert!((cam.fov_y - 60f32.to_radians()).abs() < 1e-6);
        let json = serde_json::to_value(cam).unwrap();
        assert!((json["fovY"].as_f64().unwrap() - 60.0).abs() < 1e-4);
    }
}
