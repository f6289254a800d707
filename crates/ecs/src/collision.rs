use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Sphere collider in the owning entity's local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionComponent {
    pub center: Vec3,
    pub radius: f32,
}

impl Default for CollisionComponent {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 1.0,
        }
    }
}

/// A world-space sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Strict overlap: spheres that only touch do not overlap.
    pub fn overlaps(&self, other: &BoundingSphere) -> bool {
        self.center.distance(other.center) < self.radius + other.radius
    }
}

impl CollisionComponent {
    /// Place the collider in world space. The radius grows with the largest
    /// axis scale of the owner's world matrix.
    pub fn world_sphere(&self, local_to_world: &Mat4) -> BoundingSphere {
        let (scale, _, _) = local_to_world.to_scale_rotation_translation();
        BoundingSphere {
            center: local_to_world.transform_point3(self.center),
            radius: self.radius * scale.abs().max_element(),
        }
    }

    /// Whether two colliders overlap once placed by their owners' world matrices.
    pub fn overlaps(&self, own_world: &Mat4, other: &CollisionComponent, other_world: &Mat4) -> bool {
        self.world_sphere(own_world)
            .overlaps(&other.world_sphere(other_world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_sphere_follows_translation_and_scale() {
        let c = CollisionComponent {
            center: Vec3::new(1.0, 0.0, 0.0),
            radius: 0.5,
        };
        let m = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)) * Mat4::from_scale(Vec3::splat(3.0));
        let s = c.world_sphere(&m);
        assert!(s.center.abs_diff_eq(Vec3::new(3.0, 2.0, 0.0), 1e-5));
        assert!((s.radius - 1.5).abs() < 1e-5);
    }

    #[test]
    fn overlap_is_strict() {
        let a = BoundingSphere { center: Vec3::ZERO, radius: 1.0 };
        let b = BoundingSphere { center: Vec3::new(2.0, 0.0, 0.0), radius: 1.0 };
        let c = BoundingSphere { center: Vec3::new(1.5, 0.0, 0.0), radius: 1.0 };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }

    #[test]
    fn colliders_overlap_in_world_space() {
        let c = CollisionComponent::default();
        let a = Mat4::IDENTITY;
        let near = Mat4::from_translation(Vec3::new(1.5, 0.0, 0.0));
        let touching = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        assert!(c.overlaps(&a, &c, &near));
        assert!(!c.overlaps(&a, &c, &touching));
    }
}
