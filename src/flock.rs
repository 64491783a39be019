//! Flock registry - mutually-exclusive creature groups.
//!
//! Flocks are owned by the world (a resource keyed by [`FlockId`]) rather
//! than a process-wide registry, so membership state cannot leak across
//! worlds. Health redistribution on transfer lives in the interaction
//! system; this module only tracks membership.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SimError, SimResult};

/// Handle to a flock within one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlockId(pub u32);

/// At most this many flocks may exist per world.
pub const MAX_FLOCKS: usize = 10;

/// World-owned flock membership table.
#[derive(Resource, Debug, Clone, Default)]
pub struct FlockRegistry {
    flocks: BTreeMap<FlockId, Vec<Entity>>,
    next_id: u32,
}

impl FlockRegistry {
    /// Create a new empty flock.
    pub fn create(&mut self) -> SimResult<FlockId> {
        if self.flocks.len() >= MAX_FLOCKS {
            return Err(SimError::FlockLimit);
        }
        let id = FlockId(self.next_id);
        self.next_id += 1;
        self.flocks.insert(id, Vec::new());
        Ok(id)
    }

    pub fn exists(&self, id: FlockId) -> bool {
        self.flocks.contains_key(&id)
    }

    /// Members in enrollment order.
    pub fn members(&self, id: FlockId) -> &[Entity] {
        self.flocks.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn member_count(&self, id: FlockId) -> usize {
        self.members(id).len()
    }

    /// Add a creature to a flock.
    pub fn enroll(&mut self, id: FlockId, creature: Entity) -> SimResult<()> {
        let members = self.flocks.get_mut(&id).ok_or(SimError::UnknownFlock(id))?;
        if !members.contains(&creature) {
            members.push(creature);
        }
        Ok(())
    }

    /// Remove a creature from a flock. Unknown flocks and non-members are a
    /// no-op.
    pub fn withdraw(&mut self, id: FlockId, creature: Entity) {
        if let Some(members) = self.flocks.get_mut(&id) {
            members.retain(|m| *m != creature);
        }
    }

    /// Flock a creature currently belongs to, if any.
    pub fn flock_of(&self, creature: Entity) -> Option<FlockId> {
        self.flocks
            .iter()
            .find(|(_, members)| members.contains(&creature))
            .map(|(id, _)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_exclusive_per_registry_walk() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();

        let mut reg = FlockRegistry::default();
        let f1 = reg.create().unwrap();
        let f2 = reg.create().unwrap();
        reg.enroll(f1, a).unwrap();
        reg.enroll(f1, b).unwrap();
        assert_eq!(reg.member_count(f1), 2);
        assert_eq!(reg.flock_of(b), Some(f1));

        reg.withdraw(f1, b);
        reg.enroll(f2, b).unwrap();
        assert_eq!(reg.flock_of(b), Some(f2));
        assert_eq!(reg.member_count(f1), 1);
    }

    #[test]
    fn flock_cap_is_enforced() {
        let mut reg = FlockRegistry::default();
        for _ in 0..MAX_FLOCKS {
            reg.create().unwrap();
        }
        assert!(matches!(reg.create(), Err(SimError::FlockLimit)));
    }

    #[test]
    fn double_enroll_is_idempotent() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let mut reg = FlockRegistry::default();
        let f = reg.create().unwrap();
        reg.enroll(f, a).unwrap();
        reg.enroll(f, a).unwrap();
        assert_eq!(reg.member_count(f), 1);
    }
}
