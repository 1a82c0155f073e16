//! World entities
//!
//! Units, their spells and auras, and in-flight projectiles. Every field that
//! counts or expires is exposed through a [`Bounded`] or [`Expiry`] transform
//! that returns the next version of the entity instead of mutating it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::arena::Index;
use super::transform::{Bounded, Expiry};
use crate::data::{SpellId, SpellInfo};
use crate::modifier::Modifier;
use crate::Millis;

pub type UnitId = Index<Unit>;
pub type ProjectileId = Index<Projectile>;

/// Expiry value for auras without a duration.
pub const NEVER: Millis = Millis::MAX;

/// Combat-log unit flag bits.
pub mod unit_flags {
    pub const AFFILIATION_MINE: u32 = 0x0000_0001;
    pub const AFFILIATION_OUTSIDER: u32 = 0x0000_0008;
    pub const REACTION_FRIENDLY: u32 = 0x0000_0010;
    pub const REACTION_HOSTILE: u32 = 0x0000_0040;
    pub const CONTROL_PLAYER: u32 = 0x0000_0100;
    pub const CONTROL_NPC: u32 = 0x0000_0200;
    pub const TYPE_PLAYER: u32 = 0x0000_0400;
    pub const TYPE_NPC: u32 = 0x0000_0800;
    pub const TYPE_PET: u32 = 0x0000_1000;

    pub const PLAYER: u32 = AFFILIATION_MINE | REACTION_FRIENDLY | CONTROL_PLAYER | TYPE_PLAYER;
    pub const PET: u32 = AFFILIATION_MINE | REACTION_FRIENDLY | CONTROL_PLAYER | TYPE_PET;
    pub const ENEMY: u32 = AFFILIATION_OUTSIDER | REACTION_HOSTILE | CONTROL_NPC | TYPE_NPC;
}

/// What kind of actor a unit is. Determines flags and GUID shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Player,
    Pet,
    Enemy,
}

/// A current/max resource pool (health, focus, mana...).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Pool {
    pub current: f64,
    pub max: f64,
}

impl Pool {
    pub fn full(max: f64) -> Self {
        Self { current: max, max }
    }

    pub fn pct(&self) -> f64 {
        if self.max > 0.0 {
            self.current / self.max
        } else {
            0.0
        }
    }

    /// Clamped view over `current` in `[0, max]`.
    pub fn bounded(&self) -> Bounded<f64, impl Fn(f64, Millis) -> Pool> {
        let max = self.max;
        Bounded::new(self.current, 0.0, max, move |current, _| Pool { current, max })
    }
}

/// A unit's instance of a spell.
#[derive(Clone, Debug)]
pub struct Spell {
    pub info: Arc<SpellInfo>,
    pub charges: u32,
    pub cooldown_expiry: Millis,
    pub charge_expiry: Millis,
    /// Composed from profile bundles at run start; run in order
    pub modifiers: Vec<Arc<Modifier>>,
}

impl Spell {
    /// Fresh spell with full charges and no cooldown running.
    pub fn new(info: Arc<SpellInfo>) -> Self {
        let charges = info.max_charges.max(1);
        Self {
            info,
            charges,
            cooldown_expiry: 0,
            charge_expiry: 0,
            modifiers: Vec::new(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Vec<Arc<Modifier>>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn id(&self) -> SpellId {
        self.info.id
    }

    /// Derived readiness; never stored.
    pub fn is_ready(&self, now: Millis) -> bool {
        self.charges > 0 && now >= self.cooldown_expiry
    }

    pub fn cooldown_remaining(&self, now: Millis) -> Millis {
        self.cooldown_expiry.saturating_sub(now)
    }

    pub fn charges(&self) -> Bounded<u32, impl Fn(u32, Millis) -> Spell + '_> {
        Bounded::new(self.charges, 0, self.info.max_charges.max(1), move |charges, _| Spell {
            charges,
            ..self.clone()
        })
    }

    pub fn cooldown(&self) -> Expiry<impl Fn(Millis, Millis) -> Spell + '_> {
        Expiry::new(self.cooldown_expiry, move |cooldown_expiry, _| Spell {
            cooldown_expiry,
            ..self.clone()
        })
    }

    pub fn charge_timer(&self) -> Expiry<impl Fn(Millis, Millis) -> Spell + '_> {
        Expiry::new(self.charge_expiry, move |charge_expiry, _| Spell {
            charge_expiry,
            ..self.clone()
        })
    }
}

/// An active buff or debuff on a unit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Aura {
    pub spell_id: SpellId,
    pub caster: UnitId,
    pub stacks: u32,
    pub max_stacks: u32,
    pub applied_at: Millis,
    /// [`NEVER`] for auras without a duration
    pub expires_at: Millis,
}

impl Aura {
    pub fn new(
        spell_id: SpellId,
        caster: UnitId,
        max_stacks: u32,
        duration: Millis,
        now: Millis,
    ) -> Self {
        Self {
            spell_id,
            caster,
            stacks: 1,
            max_stacks: max_stacks.max(1),
            applied_at: now,
            expires_at: if duration == 0 { NEVER } else { now + duration },
        }
    }

    pub fn stacks(&self) -> Bounded<u32, impl Fn(u32, Millis) -> Aura + '_> {
        Bounded::new(self.stacks, 0, self.max_stacks, move |stacks, _| Aura {
            stacks,
            ..self.clone()
        })
    }

    pub fn expiry(&self) -> Expiry<impl Fn(Millis, Millis) -> Aura + '_> {
        Expiry::new(self.expires_at, move |expires_at, _| Aura {
            expires_at,
            ..self.clone()
        })
    }

    pub fn remaining(&self, now: Millis) -> Millis {
        self.expires_at.saturating_sub(now)
    }

    pub fn is_permanent(&self) -> bool {
        self.expires_at == NEVER
    }
}

/// Transient cast-in-progress state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CastingState {
    pub spell_id: SpellId,
    pub target: Option<UnitId>,
    pub started_at: Millis,
    pub ends_at: Millis,
}

impl CastingState {
    pub fn remaining(&self, now: Millis) -> Millis {
        self.ends_at.saturating_sub(now)
    }
}

/// A simulated actor.
#[derive(Clone, Debug)]
pub struct Unit {
    pub id: UnitId,
    pub guid: String,
    pub name: String,
    pub kind: UnitKind,
    pub flags: u32,
    pub raid_flags: u32,
    pub health: Pool,
    pub power: Pool,
    /// Power regenerated per second
    pub power_regen: f64,
    /// Crit chance in percent
    pub crit_chance: f64,
    pub spells: BTreeMap<SpellId, Spell>,
    pub auras: BTreeMap<SpellId, Aura>,
    pub casting: Option<CastingState>,
    pub gcd_expiry: Millis,
    /// Default target for casts that don't name one
    pub target: Option<UnitId>,
}

impl Unit {
    pub fn new(id: UnitId, name: impl Into<String>, kind: UnitKind, max_health: f64) -> Self {
        let (guid, flags) = match kind {
            UnitKind::Player => (
                format!("Player-1-{:08X}", id.slot()),
                unit_flags::PLAYER,
            ),
            UnitKind::Pet => (
                format!("Pet-0-0-0-0-0-{:010X}", id.slot()),
                unit_flags::PET,
            ),
            UnitKind::Enemy => (
                format!("Creature-0-0-0-0-{}-{:010X}", 31146 + id.slot(), id.slot()),
                unit_flags::ENEMY,
            ),
        };
        Self {
            id,
            guid,
            name: name.into(),
            kind,
            flags,
            raid_flags: 0,
            health: Pool::full(max_health),
            power: Pool::full(0.0),
            power_regen: 0.0,
            crit_chance: 0.0,
            spells: BTreeMap::new(),
            auras: BTreeMap::new(),
            casting: None,
            gcd_expiry: 0,
            target: None,
        }
    }

    pub fn with_power(mut self, max: f64, regen_per_second: f64) -> Self {
        self.power = Pool::full(max);
        self.power_regen = regen_per_second;
        self
    }

    pub fn is_player(&self) -> bool {
        self.kind == UnitKind::Player
    }

    pub fn is_hostile(&self) -> bool {
        self.flags & unit_flags::REACTION_HOSTILE != 0
    }

    pub fn is_alive(&self) -> bool {
        self.health.current > 0.0
    }

    pub fn is_casting(&self) -> bool {
        self.casting.is_some()
    }

    /// Eligible for a rotation step: alive, not casting, GCD elapsed.
    pub fn can_act(&self, now: Millis) -> bool {
        self.is_alive() && !self.is_casting() && now >= self.gcd_expiry
    }

    /// Earliest time this unit may act again.
    pub fn next_action_time(&self, now: Millis) -> Millis {
        let cast_end = self.casting.map(|c| c.ends_at).unwrap_or(now);
        cast_end.max(self.gcd_expiry).max(now)
    }

    pub fn spell(&self, id: SpellId) -> Option<&Spell> {
        self.spells.get(&id)
    }

    pub fn aura(&self, id: SpellId) -> Option<&Aura> {
        self.auras.get(&id)
    }

    pub fn aura_stacks(&self, id: SpellId) -> u32 {
        self.auras.get(&id).map(|a| a.stacks).unwrap_or(0)
    }

    pub fn with_spell(&self, spell: Spell) -> Unit {
        let mut next = self.clone();
        next.spells.insert(spell.id(), spell);
        next
    }

    pub fn with_aura(&self, aura: Aura) -> Unit {
        let mut next = self.clone();
        next.auras.insert(aura.spell_id, aura);
        next
    }

    pub fn without_aura(&self, id: SpellId) -> Unit {
        let mut next = self.clone();
        next.auras.remove(&id);
        next
    }

    pub fn with_casting(&self, casting: Option<CastingState>) -> Unit {
        Unit {
            casting,
            ..self.clone()
        }
    }

    pub fn health(&self) -> Bounded<f64, impl Fn(f64, Millis) -> Unit + '_> {
        Bounded::new(self.health.current, 0.0, self.health.max, move |current, _| Unit {
            health: Pool {
                current,
                max: self.health.max,
            },
            ..self.clone()
        })
    }

    pub fn power(&self) -> Bounded<f64, impl Fn(f64, Millis) -> Unit + '_> {
        Bounded::new(self.power.current, 0.0, self.power.max, move |current, _| Unit {
            power: Pool {
                current,
                max: self.power.max,
            },
            ..self.clone()
        })
    }

    pub fn gcd(&self) -> Expiry<impl Fn(Millis, Millis) -> Unit + '_> {
        Expiry::new(self.gcd_expiry, move |gcd_expiry, _| Unit {
            gcd_expiry,
            ..self.clone()
        })
    }
}

/// An in-flight spell effect.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Projectile {
    pub id: ProjectileId,
    pub caster: UnitId,
    pub target: UnitId,
    pub spell_id: SpellId,
    pub launch_time: Millis,
    pub impact_time: Millis,
    pub damage: f64,
    pub critical: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> Arc<SpellInfo> {
        Arc::new(SpellInfo::new(1, "Barbed Shot").with_charges(2, 12_000))
    }

    #[test]
    fn test_spell_readiness_is_derived() {
        let spell = Spell::new(info()).cooldown().trigger(12_000, 0);
        assert!(!spell.is_ready(0));
        assert!(!spell.is_ready(11_999));
        assert!(spell.is_ready(12_000));
    }

    #[test]
    fn test_spell_charges_clamp() {
        let spell = Spell::new(info());
        assert_eq!(spell.charges, 2);
        let spent = spell.charges().decrement(5, 0);
        assert_eq!(spent.charges, 0);
        assert!(!spent.is_ready(0), "no charges means not ready");
        assert_eq!(spent.charges().increment(9, 0).charges, 2);
    }

    #[test]
    fn test_unit_health_clamps() {
        let unit = Unit::new(UnitId::new(0, 0), "Dummy", UnitKind::Enemy, 100.0);
        assert_eq!(unit.health().decrement(250.0, 0).health.current, 0.0);
        let hurt = unit.health().decrement(40.0, 0);
        assert_eq!(hurt.health().increment(100.0, 0).health.current, 100.0);
    }

    #[test]
    fn test_permanent_aura() {
        let aura = Aura::new(SpellId(5), UnitId::new(0, 0), 3, 0, 1_000);
        assert!(aura.is_permanent());
        let timed = Aura::new(SpellId(5), UnitId::new(0, 0), 3, 8_000, 1_000);
        assert_eq!(timed.expires_at, 9_000);
        assert_eq!(timed.stacks().increment(10, 0).stacks, 3);
    }

    #[test]
    fn test_unit_kind_flags() {
        let player = Unit::new(UnitId::new(0, 0), "Hunter", UnitKind::Player, 1.0);
        let enemy = Unit::new(UnitId::new(1, 0), "Dummy", UnitKind::Enemy, 1.0);
        assert!(player.is_player() && !player.is_hostile());
        assert!(enemy.is_hostile());
        assert_ne!(player.guid, enemy.guid);
    }
}
