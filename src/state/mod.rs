//! World state
//!
//! Immutable, versioned snapshot of every unit and projectile in a run, plus
//! the transforms and accessors used to derive the next snapshot.

pub mod accessor;
pub mod arena;
pub mod entities;
pub mod transform;
pub mod world;

pub use accessor::{SpellAccessor, SpellView, UnitAccessor};
pub use arena::{Arena, Index};
pub use entities::{
    unit_flags, Aura, CastingState, Pool, Projectile, ProjectileId, Spell, Unit, UnitId, UnitKind,
};
pub use transform::{Bounded, Expiry};
pub use world::WorldState;
