//! Arena of active capsule instances.
//!
//! Capsules live in a dense `Vec` so per-frame passes can iterate (and
//! fan out over) a plain slice. Handles stay valid across removals of
//! other capsules; removal swaps the last capsule into the freed slot, so
//! slot order is insertion order only until the first removal.

use rustc_hash::FxHashMap;

use super::OcclusionCapsule;

/// Stable handle to a capsule registered in a [`CapsuleSet`].
///
/// Handles are never reissued by the set that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapsuleId(u64);

impl CapsuleId {
    /// Raw handle value.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Registry of active occlusion capsules.
#[derive(Debug, Default, Clone)]
pub struct CapsuleSet {
    capsules: Vec<OcclusionCapsule>,
    ids: Vec<CapsuleId>,
    slots: FxHashMap<CapsuleId, usize>,
    next_id: u64,
}

impl CapsuleSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capsule and return its handle.
    pub fn insert(&mut self, capsule: OcclusionCapsule) -> CapsuleId {
        let id = CapsuleId(self.next_id);
        self.next_id += 1;
        let _ = self.slots.insert(id, self.capsules.len());
        self.capsules.push(capsule);
        self.ids.push(id);
        id
    }

    /// Unregister a capsule. Returns `None` if the handle is not active.
    pub fn remove(&mut self, id: CapsuleId) -> Option<OcclusionCapsule> {
        let slot = self.slots.remove(&id)?;
        let removed = self.capsules.swap_remove(slot);
        let _ = self.ids.swap_remove(slot);
        if let Some(&moved) = self.ids.get(slot) {
            let _ = self.slots.insert(moved, slot);
        }
        Some(removed)
    }

    /// Whether the handle refers to an active capsule.
    #[must_use]
    pub fn contains(&self, id: CapsuleId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Look up a capsule.
    #[must_use]
    pub fn get(&self, id: CapsuleId) -> Option<&OcclusionCapsule> {
        self.slots.get(&id).map(|&slot| &self.capsules[slot])
    }

    /// Look up a capsule for modification.
    pub fn get_mut(&mut self, id: CapsuleId) -> Option<&mut OcclusionCapsule> {
        let slot = *self.slots.get(&id)?;
        self.capsules.get_mut(slot)
    }

    /// Number of active capsules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capsules.len()
    }

    /// Whether no capsules are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capsules.is_empty()
    }

    /// Unregister everything. Outstanding handles become inactive.
    pub fn clear(&mut self) {
        self.capsules.clear();
        self.ids.clear();
        self.slots.clear();
    }

    /// Capsules in slot order.
    #[must_use]
    pub fn as_slice(&self) -> &[OcclusionCapsule] {
        &self.capsules
    }

    /// Handles in slot order (parallel to [`Self::as_slice`]).
    #[must_use]
    pub fn ids(&self) -> &[CapsuleId] {
        &self.ids
    }

    /// Iterate `(handle, capsule)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (CapsuleId, &OcclusionCapsule)> {
        self.ids.iter().copied().zip(self.capsules.iter())
    }
}
