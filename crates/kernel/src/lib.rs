//! Scene graph kernel: the world, its entities, and their hierarchy.
//!
//! # Invariants
//! - The world is the only owner of entities; entities are the only owners of
//!   their components.
//! - Entity and component references are generation-checked ids, so a removed
//!   entity can never be reached through a stale id. Ids carry the world that
//!   issued them and resolve nowhere else.
//! - Parent links form a forest; `World::set_parent` refuses cycles.
//! - Removal is deferred: `mark_for_removal` queues, `delete_marked_entities`
//!   destroys. Nothing is destroyed while callers iterate the live set.

pub mod entity;
pub mod world;

pub use entity::{ComponentId, Entity, EntityId, WorldId};
pub use world::{World, WorldError, WorldEvent};

pub fn crate_info() -> &'static str {
    "lumen-kernel v0.1.0"
}
