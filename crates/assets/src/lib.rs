//! Asset stores: name-keyed, exclusively owning containers.
//!
//! Scene loaders resolve string keys to `AssetId`s once; the renderer and the
//! component model only ever carry ids. A store owns its assets outright, so
//! an asset lives exactly as long as its entry.
//!
//! # Invariants
//! - Names are unique within a store.
//! - Ids are never reused by the same store, so a stale id misses instead of
//!   aliasing a newer asset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of an asset inside one `AssetStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u32);

/// Errors from asset store operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("an asset named {0:?} is already registered")]
    DuplicateName(String),
    #[error("asset not found: {0:?}")]
    NotFound(String),
    #[error("asset {name:?} is still used by {user:?}")]
    InUse { name: String, user: String },
}

#[derive(Debug)]
struct Entry<T> {
    name: String,
    asset: T,
}

/// Name-keyed store owning every asset of one kind.
#[derive(Debug)]
pub struct AssetStore<T> {
    entries: BTreeMap<AssetId, Entry<T>>,
    names: BTreeMap<String, AssetId>,
    next_id: u32,
}

impl<T> Default for AssetStore<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            names: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> AssetStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset under a unique name and return its id.
    pub fn insert(&mut self, name: impl Into<String>, asset: T) -> Result<AssetId, AssetError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(AssetError::DuplicateName(name));
        }
        let id = AssetId(self.next_id);
        self.next_id += 1;
        tracing::debug!(asset = %name, id = id.0, "registered asset");
        self.names.insert(name.clone(), id);
        self.entries.insert(id, Entry { name, asset });
        Ok(id)
    }

    pub fn get(&self, id: AssetId) -> Option<&T> {
        self.entries.get(&id).map(|e| &e.asset)
    }

    pub fn get_mut(&mut self, id: AssetId) -> Option<&mut T> {
        self.entries.get_mut(&id).map(|e| &mut e.asset)
    }

    /// Resolve a name to its id.
    pub fn id_of(&self, name: &str) -> Option<AssetId> {
        self.names.get(name).copied()
    }

    /// Resolve a name, failing with `AssetError::NotFound` on a miss.
    pub fn require(&self, name: &str) -> Result<AssetId, AssetError> {
        self.id_of(name)
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn name_of(&self, id: AssetId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }

    /// Remove an asset and hand ownership back to the caller.
    pub fn remove(&mut self, id: AssetId) -> Option<T> {
        let entry = self.entries.remove(&id)?;
        self.names.remove(&entry.name);
        Some(entry.asset)
    }

    /// Remove every asset, yielding them in id order.
    pub fn drain(&mut self) -> impl Iterator<Item = (String, T)> {
        self.names.clear();
        std::mem::take(&mut self.entries)
            .into_values()
            .map(|e| (e.name, e.asset))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetId, &str, &T)> {
        self.entries
            .iter()
            .map(|(id, e)| (*id, e.name.as_str(), &e.asset))
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn crate_info() -> &'static str {
    "lumen-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut store = AssetStore::new();
        let id = store.insert("cube", 24u32).unwrap();
        assert_eq!(store.get(id), Some(&24));
        assert_eq!(store.id_of("cube"), Some(id));
        assert_eq!(store.get_by_name("cube"), Some(&24));
        assert_eq!(store.name_of(id), Some("cube"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut store = AssetStore::new();
        store.insert("cube", 1u32).unwrap();
        let err = store.insert("cube", 2u32).unwrap_err();
        assert_eq!(err, AssetError::DuplicateName("cube".into()));
        assert_eq!(store.get_by_name("cube"), Some(&1));
    }

    #[test]
    fn require_reports_missing_names() {
        let store: AssetStore<u32> = AssetStore::new();
        assert_eq!(store.require("sky"), Err(AssetError::NotFound("sky".into())));
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut store = AssetStore::new();
        let a = store.insert("a", 'a').unwrap();
        assert_eq!(store.remove(a), Some('a'));
        let b = store.insert("a", 'b').unwrap();
        assert_ne!(a, b);
        assert!(store.get(a).is_none());
        assert_eq!(store.get(b), Some(&'b'));
    }

    #[test]
    fn drain_empties_the_store() {
        let mut store = AssetStore::new();
        store.insert("x", 1).unwrap();
        store.insert("y", 2).unwrap();
        let drained: Vec<(String, i32)> = store.drain().collect();
        assert_eq!(drained, vec![("x".to_string(), 1), ("y".to_string(), 2)]);
        assert!(store.is_empty());
        assert!(store.id_of("x").is_none());
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut store = AssetStore::new();
        let id = store.insert("counter", 0).unwrap();
        *store.get_mut(id).unwrap() += 5;
        assert_eq!(store.get(id), Some(&5));
    }
}
