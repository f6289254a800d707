//! Component model for the lumen scene graph.
//!
//! Every capability an entity can carry is one variant of [`Component`].
//! Typed lookup goes through [`ComponentKind`], which compares stable
//! [`ComponentTag`]s instead of relying on runtime type identification.
//!
//! # Invariants
//! - Each component variant has exactly one tag, and each tag one variant.
//! - A type-mismatched lookup yields `None`, never a panic.

mod camera;
mod collision;
mod component;
mod light;
mod mesh_renderer;

pub use camera::{CameraComponent, CameraType};
pub use collision::{BoundingSphere, CollisionComponent};
pub use component::{Component, ComponentKind, ComponentTag};
pub use light::{LightComponent, LightType};
pub use mesh_renderer::{MaterialHandle, MeshHandle, MeshRendererComponent};

pub fn crate_info() -> &'static str {
    "lumen-ecs v0.1.0"
}
