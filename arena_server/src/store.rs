//! Slot-indexed entity storage.
//!
//! Entities keep the slot they were inserted into for the whole session;
//! destroyed entities stay in place so ids held by clients never dangle.

use std::collections::HashMap;

use arena_shared::ids::EntityId;

use crate::entity::Entity;

#[derive(Debug, Default)]
pub struct EntityStore {
    slots: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl EntityStore {
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        self.index.insert(id, self.slots.len());
        self.slots.push(entity);
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_of(&self, id: EntityId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slot_of(id).map(|slot| &self.slots[slot])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slot_of(id).map(|slot| &mut self.slots[slot])
    }

    pub fn at(&self, slot: usize) -> &Entity {
        &self.slots[slot]
    }

    pub fn at_mut(&mut self, slot: usize) -> &mut Entity {
        &mut self.slots[slot]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter()
    }

    /// Mutable access to two distinct slots at once.
    ///
    /// Panics if `a == b`.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut Entity, &mut Entity) {
        assert_ne!(a, b, "pair_mut needs two distinct slots");
        if a < b {
            let (lo, hi) = self.slots.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }
}
