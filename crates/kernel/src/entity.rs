use lumen_common::Transform;
use lumen_ecs::{Component, ComponentKind};
use slotmap::new_key_type;

new_key_type! {
    /// Arena slot of an entity. Only meaningful inside the world that issued it.
    pub(crate) struct EntityKey;
}

/// Process-unique tag of one [`crate::World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(pub(crate) u32);

/// Generation-checked id of an entity. It carries the world that issued it,
/// so it never resolves in any other world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    world: WorldId,
    key: EntityKey,
}

impl EntityId {
    pub(crate) fn new(world: WorldId, key: EntityKey) -> Self {
        Self { world, key }
    }

    pub fn world(&self) -> WorldId {
        self.world
    }

    pub(crate) fn key(&self) -> EntityKey {
        self.key
    }
}

/// Id of one component instance. It remembers its owner, so the
/// back-reference from a component to its entity is a plain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    owner: EntityId,
    serial: u32,
}

impl ComponentId {
    pub fn owner(&self) -> EntityId {
        self.owner
    }
}

#[derive(Debug)]
struct ComponentSlot {
    id: ComponentId,
    component: Component,
}

/// A node in the scene graph.
///
/// Created only by [`crate::World::add`]; not `Clone`, since duplicating an
/// entity would duplicate ownership of its components.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    pub name: String,
    pub tag: String,
    parent: Option<EntityId>,
    /// Transform relative to the parent (or to the world for roots).
    pub local_transform: Transform,
    components: Vec<ComponentSlot>,
    next_serial: u32,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
            tag: String::new(),
            parent: None,
            local_transform: Transform::default(),
            components: Vec::new(),
            next_serial: 0,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Parent link. May be stale if the parent was removed; the world treats
    /// a stale parent as no parent.
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub(crate) fn set_parent_link(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
    }

    /// Attach a component and return its id. The entity becomes its owner.
    pub fn add_component<T: ComponentKind>(&mut self, component: T) -> ComponentId {
        let id = ComponentId {
            owner: self.id,
            serial: self.next_serial,
        };
        self.next_serial += 1;
        self.components.push(ComponentSlot {
            id,
            component: component.into(),
        });
        id
    }

    /// First component of type `T`, in attachment order.
    pub fn get_component<T: ComponentKind>(&self) -> Option<&T> {
        self.components
            .iter()
            .find(|slot| slot.component.tag() == T::TAG)
            .and_then(|slot| T::from_component(&slot.component))
    }

    pub fn get_component_mut<T: ComponentKind>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find(|slot| slot.component.tag() == T::TAG)
            .and_then(|slot| T::from_component_mut(&mut slot.component))
    }

    /// Id of the first component of type `T`.
    pub fn component_id<T: ComponentKind>(&self) -> Option<ComponentId> {
        self.components
            .iter()
            .find(|slot| slot.component.tag() == T::TAG)
            .map(|slot| slot.id)
    }

    pub fn has_component<T: ComponentKind>(&self) -> bool {
        self.component_id::<T>().is_some()
    }

    /// Component at an ordinal position, whatever its type.
    pub fn component_at(&self, index: usize) -> Option<&Component> {
        self.components.get(index).map(|slot| &slot.component)
    }

    pub fn component_at_mut(&mut self, index: usize) -> Option<&mut Component> {
        self.components.get_mut(index).map(|slot| &mut slot.component)
    }

    /// Look up a specific component instance.
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| &slot.component)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components
            .iter_mut()
            .find(|slot| slot.id == id)
            .map(|slot| &mut slot.component)
    }

    /// Destroy the first component of type `T`. Returns false if none existed.
    pub fn delete_component<T: ComponentKind>(&mut self) -> bool {
        match self.components.iter().position(|slot| slot.component.tag() == T::TAG) {
            Some(index) => self.delete_component_at(index),
            None => false,
        }
    }

    /// Destroy the component at `index`. Returns false if out of range.
    pub fn delete_component_at(&mut self, index: usize) -> bool {
        if index < self.components.len() {
            self.components.remove(index);
            true
        } else {
            false
        }
    }

    /// Destroy one specific component instance.
    pub fn delete_component_by_id(&mut self, id: ComponentId) -> bool {
        match self.components.iter().position(|slot| slot.id == id) {
            Some(index) => self.delete_component_at(index),
            None => false,
        }
    }

    /// Components in attachment order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components.iter().map(|slot| (slot.id, &slot.component))
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_ecs::{CameraComponent, CollisionComponent, ComponentTag, LightComponent};
    use slotmap::SlotMap;

    fn entity() -> Entity {
        let mut keys: SlotMap<EntityKey, ()> = SlotMap::with_key();
        Entity::new(EntityId::new(WorldId(0), keys.insert(())))
    }

    #[test]
    fn add_then_get_returns_same_instance() {
        let mut e = entity();
        let id = e.add_component(CameraComponent::default());
        assert_eq!(id.owner(), e.id());
        assert_eq!(e.component_id::<CameraComponent>(), Some(id));
        assert!(e.get_component::<CameraComponent>().is_some());
    }

    #[test]
    fn delete_by_type_makes_lookup_absent() {
        let mut e = entity();
        e.add_component(CameraComponent::default());
        assert!(e.delete_component::<CameraComponent>());
        assert!(e.get_component::<CameraComponent>().is_none());
        assert!(!e.delete_component::<CameraComponent>());
    }

    #[test]
    fn get_returns_first_of_type() {
        let mut e = entity();
        e.add_component(LightComponent::default());
        let first = e.add_component(CollisionComponent { radius: 1.0, ..Default::default() });
        e.add_component(CollisionComponent { radius: 2.0, ..Default::default() });
        assert_eq!(e.get_component::<CollisionComponent>().unwrap().radius, 1.0);
        assert_eq!(e.component_id::<CollisionComponent>(), Some(first));
    }

    #[test]
    fn missing_type_is_none() {
        let mut e = entity();
        e.add_component(LightComponent::default());
        assert!(e.get_component::<CameraComponent>().is_none());
        assert!(e.component_id::<CameraComponent>().is_none());
    }

    #[test]
    fn ordinal_lookup_and_delete() {
        let mut e = entity();
        e.add_component(LightComponent::default());
        e.add_component(CameraComponent::default());
        assert_eq!(e.component_at(1).unwrap().tag(), ComponentTag::Camera);
        assert!(e.component_at(2).is_none());

        assert!(e.delete_component_at(0));
        assert_eq!(e.component_at(0).unwrap().tag(), ComponentTag::Camera);
        assert!(!e.delete_component_at(5));
    }

    #[test]
    fn delete_specific_instance() {
        let mut e = entity();
        let a = e.add_component(CollisionComponent { radius: 1.0, ..Default::default() });
        let b = e.add_component(CollisionComponent { radius: 2.0, ..Default::default() });
        assert!(e.delete_component_by_id(b));
        assert!(e.component(b).is_none());
        assert!(e.component(a).is_some());
        assert!(!e.delete_component_by_id(b));
    }

    #[test]
    fn component_ids_are_not_reused() {
        let mut e = entity();
        let a = e.add_component(LightComponent::default());
        e.delete_component_by_id(a);
        let b = e.add_component(LightComponent::default());
        assert_ne!(a, b);
        assert!(e.component(a).is_none());
    }

    #[test]
    fn get_component_mut_edits_in_place() {
        let mut e = entity();
        e.add_component(CameraComponent::default());
        e.get_component_mut::<CameraComponent>().unwrap().far = 500.0;
        assert_eq!(e.get_component::<CameraComponent>().unwrap().far, 500.0);
    }
}
