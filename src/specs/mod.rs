//! Spec modules
//!
//! A spec bundles everything class-specific the engine doesn't hard-code:
//! combat-log handlers that react to its spells, the profile bundles that
//! attach modifiers to them, and its built-in rotations.
//!
//! Handlers subscribe in the `Core` phase below the mutation priority, so
//! they see each event before state changes and emit follow-ups through the
//! handler context.

pub mod beast_mastery;

use std::sync::Arc;

use crate::combat::bus::EventBus;
use crate::profile::{ProfileBundle, ProfileComposer};
use crate::rotation::Rotation;
use crate::state::UnitKind;

/// Priority spec handlers register at.
pub const SPEC_HANDLER_PRIORITY: i32 = 10;

pub trait SpecModule: Send + Sync {
    /// Module id used in sim configs, e.g. `beast-mastery`
    fn id(&self) -> &str;

    fn register_handlers(&self, bus: &mut EventBus);

    fn bundles(&self) -> Vec<ProfileBundle>;

    /// Bundle ids applied to player characters that don't list any
    fn default_profiles(&self) -> Vec<String>;

    /// Built-in rotation by name
    fn rotation(&self, name: &str) -> Option<Arc<dyn Rotation>>;

    /// Rotation used by units of `kind` whose character doesn't name one
    fn default_rotation(&self, kind: UnitKind) -> Option<&'static str>;
}

/// Every shipped spec module.
pub fn all() -> Vec<Arc<dyn SpecModule>> {
    vec![Arc::new(beast_mastery::BeastMastery)]
}

pub fn lookup(id: &str) -> Option<Arc<dyn SpecModule>> {
    all().into_iter().find(|spec| spec.id() == id)
}

/// Composer with every bundle `spec` ships.
pub fn composer_for(spec: &dyn SpecModule) -> ProfileComposer {
    let mut composer = ProfileComposer::new();
    for bundle in spec.bundles() {
        composer.register(bundle);
    }
    composer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id() {
        assert!(lookup("beast-mastery").is_some());
        assert!(lookup("frost").is_none());
    }

    #[test]
    fn test_default_profiles_compose() {
        let spec = lookup("beast-mastery").unwrap();
        let composer = composer_for(spec.as_ref());
        assert!(composer.compose_ids(&spec.default_profiles()).is_ok());
    }
}
