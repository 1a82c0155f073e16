//! Versioned world state
//!
//! One immutable [`WorldState`] value per point in simulated time. Every
//! setter returns a new value, shares untouched entities with the old one and
//! bumps [`WorldState::revision`]; consumers compare revisions to skip work
//! they already did.

use std::sync::Arc;

use super::arena::Arena;
use super::entities::{Projectile, ProjectileId, Unit, UnitId};
use crate::error::SimError;
use crate::Millis;

#[derive(Clone, Debug, Default)]
pub struct WorldState {
    current_time: Millis,
    next_event_time: Option<Millis>,
    iteration_count: u64,
    revision: u64,
    units: Arena<Unit>,
    projectiles: Arena<Projectile>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    // === Reads ===

    pub fn current_time(&self) -> Millis {
        self.current_time
    }

    pub fn next_event_time(&self) -> Option<Millis> {
        self.next_event_time
    }

    pub fn iteration_count(&self) -> u64 {
        self.iteration_count
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn unit(&self, id: UnitId) -> Option<&Arc<Unit>> {
        self.units.get(id)
    }

    /// Live units in slot order.
    pub fn units(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.units.values()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn projectile(&self, id: ProjectileId) -> Option<&Arc<Projectile>> {
        self.projectiles.get(id)
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Arc<Projectile>> {
        self.projectiles.values()
    }

    /// True when `other` still holds the same allocation for `id`.
    pub fn shares_unit(&self, other: &WorldState, id: UnitId) -> bool {
        self.units.shares(&other.units, id)
    }

    // === Writes ===

    fn bumped(mut self) -> Self {
        self.revision += 1;
        self
    }

    /// Advance the clock. Moving backwards is rejected.
    pub fn with_current_time(&self, time: Millis) -> Result<Self, SimError> {
        if time < self.current_time {
            return Err(SimError::TimeWentBackwards {
                current: self.current_time,
                requested: time,
            });
        }
        Ok(Self {
            current_time: time,
            ..self.clone()
        }
        .bumped())
    }

    pub fn with_next_event_time(&self, time: Option<Millis>) -> Self {
        Self {
            next_event_time: time,
            ..self.clone()
        }
        .bumped()
    }

    pub fn with_iteration_count(&self, count: u64) -> Self {
        Self {
            iteration_count: count,
            ..self.clone()
        }
        .bumped()
    }

    /// Set only the revision counter. The one write that doesn't bump it.
    pub fn with_revision(&self, revision: u64) -> Self {
        Self {
            revision,
            ..self.clone()
        }
    }

    /// Replace an existing unit, keyed by `unit.id`.
    pub fn with_unit(&self, unit: Unit) -> Result<Self, SimError> {
        let id = unit.id;
        let mut next = self.clone();
        if !next.units.replace(id, unit) {
            return Err(SimError::UnitNotFound(id.to_string()));
        }
        Ok(next.bumped())
    }

    /// Add a unit built from its freshly allocated id.
    pub fn insert_unit(&self, build: impl FnOnce(UnitId) -> Unit) -> (Self, UnitId) {
        let mut next = self.clone();
        let id = next.units.insert_with(build);
        (next.bumped(), id)
    }

    pub fn insert_projectile(
        &self,
        build: impl FnOnce(ProjectileId) -> Projectile,
    ) -> (Self, ProjectileId) {
        let mut next = self.clone();
        let id = next.projectiles.insert_with(build);
        (next.bumped(), id)
    }

    pub fn with_projectile(&self, projectile: Projectile) -> Result<Self, SimError> {
        let id = projectile.id;
        let mut next = self.clone();
        if !next.projectiles.replace(id, projectile) {
            return Err(SimError::UnitNotFound(format!("projectile {}", id)));
        }
        Ok(next.bumped())
    }

    /// Drop a projectile. Removing one that already landed is a no-op that
    /// still returns the same revision.
    pub fn remove_projectile(&self, id: ProjectileId) -> Self {
        let mut next = self.clone();
        match next.projectiles.remove(id) {
            Some(_) => next.bumped(),
            None => next,
        }
    }
}
