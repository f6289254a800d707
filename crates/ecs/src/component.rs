use crate::{CameraComponent, CollisionComponent, LightComponent, MeshRendererComponent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable type tag of a component variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentTag {
    Camera,
    Light,
    MeshRenderer,
    Collision,
}

impl ComponentTag {
    /// Name used by scene documents to identify the component type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::Light => "Light",
            Self::MeshRenderer => "Mesh Renderer",
            Self::Collision => "Collision",
        }
    }
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A capability attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Component {
    Camera(CameraComponent),
    Light(LightComponent),
    #[serde(rename = "Mesh Renderer")]
    MeshRenderer(MeshRendererComponent),
    Collision(CollisionComponent),
}

impl Component {
    pub fn tag(&self) -> ComponentTag {
        match self {
            Self::Camera(_) => ComponentTag::Camera,
            Self::Light(_) => ComponentTag::Light,
            Self::MeshRenderer(_) => ComponentTag::MeshRenderer,
            Self::Collision(_) => ComponentTag::Collision,
        }
    }

    /// Borrow the payload as `T` if the tags match.
    pub fn downcast_ref<T: ComponentKind>(&self) -> Option<&T> {
        T::from_component(self)
    }

    pub fn downcast_mut<T: ComponentKind>(&mut self) -> Option<&mut T> {
        T::from_component_mut(self)
    }
}

/// A concrete component type with a fixed tag.
///
/// Implemented for every payload type of [`Component`]; lookups by type are
/// tag comparisons followed by a pattern match.
pub trait ComponentKind: Into<Component> + Sized {
    const TAG: ComponentTag;

    fn from_component(component: &Component) -> Option<&Self>;

    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;

    /// Take the payload back out, returning the component unchanged on a mismatch.
    fn from_owned(component: Component) -> Result<Self, Component>;
}

macro_rules! component_kind {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Component {
            fn from(value: $ty) -> Self {
                Component::$variant(value)
            }
        }

        impl ComponentKind for $ty {
            const TAG: ComponentTag = ComponentTag::$variant;

            fn from_component(component: &Component) -> Option<&Self> {
                match component {
                    Component::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                match component {
                    Component::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_owned(component: Component) -> Result<Self, Component> {
                match component {
                    Component::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

component_kind!(CameraComponent, Camera);
component_kind!(LightComponent, Light);
component_kind!(MeshRendererComponent, MeshRenderer);
component_kind!(CollisionComponent, Collision);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MaterialHandle, MeshHandle};
    use lumen_assets::AssetId;

    #[test]
    fn tags_match_variants() {
        let camera: Component = CameraComponent::default().into();
        assert_eq!(camera.tag(), ComponentTag::Camera);
        assert_eq!(camera.tag(), CameraComponent::TAG);

        let light: Component = LightComponent::default().into();
        assert_eq!(light.tag(), LightComponent::TAG);
    }

    #[test]
    fn mismatched_downcast_is_none() {
        let light: Component = LightComponent::default().into();
        assert!(light.downcast_ref::<CameraComponent>().is_none());
        assert!(light.downcast_ref::<LightComponent>().is_some());
    }

    #[test]
    fn downcast_mut_edits_payload() {
        let mut c: Component = CollisionComponent::default().into();
        c.downcast_mut::<CollisionComponent>().unwrap().radius = 4.0;
        assert_eq!(c.downcast_ref::<CollisionComponent>().unwrap().radius, 4.0);
    }

    #[test]
    fn from_owned_returns_original_on_mismatch() {
        let c: Component = CameraComponent::default().into();
        let back = LightComponent::from_owned(c.clone()).unwrap_err();
        assert_eq!(back, c);
        assert!(CameraComponent::from_owned(c).is_ok());
    }

    #[test]
    fn components_deserialize_by_type_name() {
        let json = r#"[
            { "type": "Camera", "cameraType": "orthographic", "orthoHeight": 4.0 },
            { "type": "Mesh Renderer", "mesh": 3, "material": 7 },
            { "type": "Light", "lightType": "spot" }
        ]"#;
        let parsed: Vec<Component> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed[0].tag(), ComponentTag::Camera);
        assert_eq!(
            parsed[0].downcast_ref::<CameraComponent>().unwrap().ortho_height,
            4.0
        );
        assert_eq!(
            parsed[1].downcast_ref::<MeshRendererComponent>().unwrap(),
            &MeshRendererComponent {
                mesh: MeshHandle(AssetId(3)),
                material: MaterialHandle(AssetId(7)),
            }
        );
        assert_eq!(parsed[2].tag(), ComponentTag::Light);
    }

    #[test]
    fn tag_names() {
        assert_eq!(ComponentTag::MeshRenderer.to_string(), "Mesh Renderer");
        assert_eq!(ComponentTag::Camera.name(), "Camera");
    }
}
