use crate::entity::{Entity, EntityId, EntityKey, WorldId};
use glam::Mat4;
use slotmap::SlotMap;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_WORLD_ID: AtomicU32 = AtomicU32::new(1);

/// An event record produced by every structural change to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    /// A new entity became live.
    Added(EntityId),
    /// A live entity was queued for destruction.
    MarkedForRemoval(EntityId),
    /// A queued entity was removed from the live set and destroyed.
    Destroyed(EntityId),
    /// Every entity was destroyed at once.
    Cleared { count: usize },
}

/// Errors from hierarchy edits.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("entity {0:?} not found")]
    EntityNotFound(EntityId),
    #[error("entity {0:?} cannot be its own parent")]
    SelfParent(EntityId),
    #[error("parenting {child:?} under {parent:?} would form a cycle")]
    ParentCycle { child: EntityId, parent: EntityId },
}

/// Exclusive owner of every live entity in a scene.
///
/// Entities live in a generation-checked arena. Removal is two-phase: callers
/// mark entities while walking the live set, then flush the queue at a sync
/// point between frames.
///
/// Every world takes a fresh [`WorldId`]; ids issued by another world are
/// treated as unknown by every lookup and edit.
#[derive(Debug)]
pub struct World {
    id: WorldId,
    entities: SlotMap<EntityKey, Entity>,
    marked_for_removal: Vec<EntityId>,
    event_log: Vec<WorldEvent>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            id: WorldId(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed)),
            entities: SlotMap::with_key(),
            marked_for_removal: Vec::new(),
            event_log: Vec::new(),
        }
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Create a new live root entity and return its id.
    pub fn add(&mut self) -> EntityId {
        let world = self.id;
        let key = self
            .entities
            .insert_with_key(|key| Entity::new(EntityId::new(world, key)));
        let id = EntityId::new(world, key);
        self.event_log.push(WorldEvent::Added(id));
        id
    }

    /// Create a new live root entity with a name.
    pub fn add_named(&mut self, name: impl Into<String>) -> EntityId {
        let id = self.add();
        if let Some(entity) = self.get_mut(id) {
            entity.name = name.into();
        }
        id
    }

    /// Arena key of `id`, if this world issued it.
    fn key(&self, id: EntityId) -> Option<EntityKey> {
        (id.world() == self.id).then(|| id.key())
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.key(id).and_then(|key| self.entities.get(key))
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.key(id).and_then(|key| self.entities.get_mut(key))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.key(id).is_some_and(|key| self.entities.contains_key(key))
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live entities in arena order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.values().map(Entity::id).collect()
    }

    /// Queue a live entity for destruction. Returns true only if it was newly
    /// queued; unknown or already-queued entities are left alone.
    pub fn mark_for_removal(&mut self, id: EntityId) -> bool {
        if !self.contains(id) || self.marked_for_removal.contains(&id) {
            return false;
        }
        self.marked_for_removal.push(id);
        self.event_log.push(WorldEvent::MarkedForRemoval(id));
        true
    }

    pub fn is_marked_for_removal(&self, id: EntityId) -> bool {
        self.marked_for_removal.contains(&id)
    }

    pub fn pending_removal(&self) -> &[EntityId] {
        &self.marked_for_removal
    }

    /// Remove and destroy every queued entity (and with it, its components).
    /// Returns how many entities were destroyed.
    pub fn delete_marked_entities(&mut self) -> usize {
        let mut destroyed = 0;
        for id in std::mem::take(&mut self.marked_for_removal) {
            if self.entities.remove(id.key()).is_some() {
                self.event_log.push(WorldEvent::Destroyed(id));
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            tracing::debug!(destroyed, remaining = self.entities.len(), "flushed removal queue");
        }
        destroyed
    }

    /// Destroy every entity and drop any pending removals.
    pub fn clear(&mut self) {
        let count = self.entities.len();
        self.entities.clear();
        self.marked_for_removal.clear();
        self.event_log.push(WorldEvent::Cleared { count });
    }

    /// Re-parent `child`. `None` makes it a root.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<(), WorldError> {
        if !self.contains(child) {
            return Err(WorldError::EntityNotFound(child));
        }
        if let Some(parent) = parent {
            if parent == child {
                return Err(WorldError::SelfParent(child));
            }
            if !self.contains(parent) {
                return Err(WorldError::EntityNotFound(parent));
            }
            if self.ancestors(parent).any(|ancestor| ancestor == child) {
                return Err(WorldError::ParentCycle { child, parent });
            }
        }
        if let Some(entity) = self.get_mut(child) {
            entity.set_parent_link(parent);
        }
        Ok(())
    }

    /// Parent of `id` if it is still live.
    pub fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.get(id)
            .and_then(Entity::parent)
            .filter(|parent| self.contains(*parent))
    }

    /// Live ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        std::iter::successors(self.parent_of(id), move |current| self.parent_of(*current))
    }

    /// Live direct children of `id`, in arena order.
    pub fn children_of(&self, id: EntityId) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.parent() == Some(id))
            .map(Entity::id)
            .collect()
    }

    /// Compose local matrices up the parent chain: `root.local * ... * self.local`.
    /// A missing or stale parent counts as identity. `None` if `id` is not live.
    pub fn local_to_world_matrix(&self, id: EntityId) -> Option<Mat4> {
        let mut matrix = self.get(id)?.local_transform.to_mat4();
        for ancestor in self.ancestors(id).filter_map(|ancestor| self.get(ancestor)) {
            matrix = ancestor.local_transform.to_mat4() * matrix;
        }
        Some(matrix)
    }

    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities.values().find(|e| e.name == name).map(Entity::id)
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.tag == tag)
            .map(Entity::id)
            .collect()
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use lumen_common::Transform;
    use lumen_ecs::{CameraComponent, LightComponent};

    fn with_transform(world: &mut World, transform: Transform) -> EntityId {
        let id = world.add();
        world.get_mut(id).unwrap().local_transform = transform;
        id
    }

    #[test]
    fn world_starts_empty() {
        let w = World::new();
        assert!(w.is_empty());
        assert!(w.events().is_empty());
    }

    #[test]
    fn add_returns_live_entity() {
        let mut w = World::new();
        let id = w.add_named("car");
        assert!(w.contains(id));
        assert_eq!(w.get(id).unwrap().name, "car");
        assert_eq!(w.get(id).unwrap().id(), id);
        assert_eq!(w.find_by_name("car"), Some(id));
    }

    #[test]
    fn root_world_matrix_equals_local() {
        let mut w = World::new();
        let t = Transform::from_degrees(Vec3::new(1.0, 2.0, 3.0), Vec3::new(10.0, 20.0, 30.0), Vec3::splat(2.0));
        let id = with_transform(&mut w, t);
        assert_eq!(w.local_to_world_matrix(id), Some(t.to_mat4()));
    }

    #[test]
    fn chain_composes_parent_first() {
        let mut w = World::new();
        let a = Transform::from_degrees(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 45.0, 0.0), Vec3::ONE);
        let b = Transform::from_degrees(Vec3::new(0.0, 2.0, 0.0), Vec3::new(30.0, 0.0, 0.0), Vec3::splat(0.5));
        let c = Transform::from_degrees(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, 60.0), Vec3::splat(3.0));
        let parent = with_transform(&mut w, a);
        let child = with_transform(&mut w, b);
        let grandchild = with_transform(&mut w, c);
        w.set_parent(child, Some(parent)).unwrap();
        w.set_parent(grandchild, Some(child)).unwrap();

        let expected = a.to_mat4() * b.to_mat4() * c.to_mat4();
        assert!(w.local_to_world_matrix(grandchild).unwrap().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn removed_parent_counts_as_identity() {
        let mut w = World::new();
        let parent = with_transform(&mut w, Transform::from_position(Vec3::X));
        let child = with_transform(&mut w, Transform::from_position(Vec3::Y));
        w.set_parent(child, Some(parent)).unwrap();
        w.mark_for_removal(parent);
        w.delete_marked_entities();

        assert_eq!(w.parent_of(child), None);
        assert_eq!(
            w.local_to_world_matrix(child),
            Some(Transform::from_position(Vec3::Y).to_mat4())
        );
    }

    #[test]
    fn mark_and_flush_removes_exactly_that_entity() {
        let mut w = World::new();
        let keep = w.add();
        let doomed = w.add();
        w.get_mut(doomed).unwrap().add_component(CameraComponent::default());

        assert!(w.mark_for_removal(doomed));
        // Still live until the flush.
        assert!(w.contains(doomed));
        assert_eq!(w.delete_marked_entities(), 1);

        assert_eq!(w.entity_ids(), vec![keep]);
        assert!(w.get(doomed).is_none());
        assert_eq!(w.delete_marked_entities(), 0);
        assert_eq!(w.entity_ids(), vec![keep]);
    }

    #[test]
    fn marking_is_idempotent() {
        let mut w = World::new();
        let id = w.add();
        assert!(w.mark_for_removal(id));
        assert!(!w.mark_for_removal(id));
        assert_eq!(w.pending_removal(), &[id]);
        assert_eq!(w.delete_marked_entities(), 1);
    }

    #[test]
    fn marking_destroyed_entity_is_noop() {
        let mut w = World::new();
        let stale = w.add();
        w.mark_for_removal(stale);
        w.delete_marked_entities();

        assert!(!w.mark_for_removal(stale));
        assert!(w.pending_removal().is_empty());
    }

    #[test]
    fn flush_with_empty_queue_is_safe() {
        let mut w = World::new();
        assert_eq!(w.delete_marked_entities(), 0);
    }

    #[test]
    fn marking_during_iteration_defers_destruction() {
        let mut w = World::new();
        for i in 0..6 {
            let id = w.add();
            w.get_mut(id).unwrap().tag = if i % 2 == 0 { "obstacle" } else { "road" }.into();
        }
        let doomed: Vec<EntityId> = w
            .entities()
            .filter(|e| e.tag == "obstacle")
            .map(|e| e.id())
            .collect();
        for id in doomed {
            w.mark_for_removal(id);
        }
        assert_eq!(w.len(), 6);
        w.delete_marked_entities();
        assert_eq!(w.len(), 3);
        assert!(w.find_by_tag("obstacle").is_empty());
        assert_eq!(w.find_by_tag("road").len(), 3);
    }

    #[test]
    fn clear_destroys_everything() {
        let mut w = World::new();
        let a = w.add();
        w.add();
        w.mark_for_removal(a);
        w.clear();
        assert!(w.is_empty());
        assert!(w.pending_removal().is_empty());
        assert_eq!(w.events().last(), Some(&WorldEvent::Cleared { count: 2 }));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut w = World::new();
        let a = w.add();
        let b = w.add();
        let c = w.add();
        w.set_parent(b, Some(a)).unwrap();
        w.set_parent(c, Some(b)).unwrap();

        assert_eq!(w.set_parent(a, Some(c)), Err(WorldError::ParentCycle { child: a, parent: c }));
        assert_eq!(w.set_parent(a, Some(a)), Err(WorldError::SelfParent(a)));
        assert_eq!(w.parent_of(a), None);
    }

    #[test]
    fn reparenting_to_root() {
        let mut w = World::new();
        let a = w.add();
        let b = w.add();
        w.set_parent(b, Some(a)).unwrap();
        assert_eq!(w.children_of(a), vec![b]);
        w.set_parent(b, None).unwrap();
        assert!(w.children_of(a).is_empty());
        assert_eq!(w.ancestors(b).count(), 0);
    }

    #[test]
    fn set_parent_on_missing_entity_fails() {
        let mut w = World::new();
        let a = w.add();
        let b = w.add();
        w.mark_for_removal(b);
        w.delete_marked_entities();
        assert_eq!(w.set_parent(a, Some(b)), Err(WorldError::EntityNotFound(b)));
        assert_eq!(w.set_parent(b, None), Err(WorldError::EntityNotFound(b)));
    }

    #[test]
    fn events_are_recorded() {
        let mut w = World::new();
        let id = w.add();
        w.mark_for_removal(id);
        w.delete_marked_entities();
        assert_eq!(
            w.drain_events(),
            vec![
                WorldEvent::Added(id),
                WorldEvent::MarkedForRemoval(id),
                WorldEvent::Destroyed(id),
            ]
        );
        assert!(w.events().is_empty());
    }

    #[test]
    fn stale_ids_do_not_alias_new_entities() {
        let mut w = World::new();
        let old = w.add();
        w.get_mut(old).unwrap().add_component(LightComponent::default());
        w.mark_for_removal(old);
        w.delete_marked_entities();
        let new = w.add();
        assert_ne!(old, new);
        assert!(w.get(old).is_none());
        assert_eq!(w.get(new).unwrap().component_count(), 0);
    }

    #[test]
    fn worlds_get_distinct_ids() {
        assert_ne!(World::new().id(), World::new().id());
    }

    #[test]
    fn foreign_ids_do_not_resolve() {
        let mut a = World::new();
        let mut b = World::new();
        let foreign = a.add_named("a-root");
        let own = b.add_named("b-root");
        assert_eq!(foreign.world(), a.id());

        assert!(!b.contains(foreign));
        assert!(b.get(foreign).is_none());
        assert!(b.get_mut(foreign).is_none());
        assert!(b.local_to_world_matrix(foreign).is_none());
        assert!(b.children_of(foreign).is_empty());
        assert_eq!(b.get(own).unwrap().name, "b-root");
    }

    #[test]
    fn marking_a_foreign_id_leaves_this_world_alone() {
        let mut a = World::new();
        let mut b = World::new();
        let foreign = a.add();
        let own = b.add();

        assert!(!b.mark_for_removal(foreign));
        assert!(b.pending_removal().is_empty());
        assert_eq!(b.delete_marked_entities(), 0);
        assert!(b.contains(own));
        assert!(a.contains(foreign));
    }

    #[test]
    fn parenting_across_worlds_is_rejected() {
        let mut a = World::new();
        let mut b = World::new();
        let foreign = a.add();
        let own = b.add();

        assert_eq!(b.set_parent(own, Some(foreign)), Err(WorldError::EntityNotFound(foreign)));
        assert_eq!(b.set_parent(foreign, None), Err(WorldError::EntityNotFound(foreign)));
        assert_eq!(b.parent_of(own), None);
    }
}
