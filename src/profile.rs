//! Profile bundles
//!
//! A bundle is a named set of per-spell modifier overrides tagged with the
//! dimension it belongs to. Composing a list of bundles merges them from the
//! least to the most specific dimension:
//!
//! `shared` < `race` < `class` < `spec` < `player`
//!
//! Composed profiles are cached by their normalized id list, so the same set
//! of bundles in any order is only merged once.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::data::SpellId;
use crate::error::SimError;
use crate::modifier::Modifier;

/// Layer a bundle belongs to. Declaration order is the normalized sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Player,
    Spec,
    Class,
    Race,
    Shared,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Player,
        Dimension::Spec,
        Dimension::Class,
        Dimension::Race,
        Dimension::Shared,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Dimension::Player => "player-",
            Dimension::Spec => "spec-",
            Dimension::Class => "class-",
            Dimension::Race => "race-",
            Dimension::Shared => "shared-",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BundleId {
    pub dimension: Dimension,
    pub name: String,
}

impl BundleId {
    pub fn new(dimension: Dimension, name: impl Into<String>) -> Self {
        Self {
            dimension,
            name: name.into(),
        }
    }
}

impl FromStr for BundleId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .iter()
            .find_map(|&dimension| {
                s.strip_prefix(dimension.prefix())
                    .filter(|name| !name.is_empty())
                    .map(|name| BundleId::new(dimension, name))
            })
            .ok_or_else(|| SimError::InvalidBundleId(s.to_string()))
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.dimension.prefix(), self.name)
    }
}

/// Deduplicate and sort ids into the cache signature.
pub fn normalize_profile_ids(ids: &[BundleId]) -> Vec<BundleId> {
    let mut normalized = ids.to_vec();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Modifier changes a bundle makes to one spell.
#[derive(Clone, Debug, Default)]
pub struct SpellOverride {
    pub modifiers: Vec<Arc<Modifier>>,
    /// Discard modifiers contributed by less specific bundles
    pub replace: bool,
}

#[derive(Clone, Debug)]
pub struct ProfileBundle {
    pub id: BundleId,
    pub spells: BTreeMap<SpellId, SpellOverride>,
}

impl ProfileBundle {
    pub fn new(id: BundleId) -> Self {
        Self {
            id,
            spells: BTreeMap::new(),
        }
    }

    pub fn with_modifier(mut self, spell: SpellId, modifier: Modifier) -> Self {
        self.spells
            .entry(spell)
            .or_default()
            .modifiers
            .push(Arc::new(modifier));
        self
    }

    /// Replace everything lower layers attached to `spell`.
    pub fn replacing(mut self, spell: SpellId, modifiers: Vec<Modifier>) -> Self {
        self.spells.insert(
            spell,
            SpellOverride {
                modifiers: modifiers.into_iter().map(Arc::new).collect(),
                replace: true,
            },
        );
        self
    }
}

/// Result of merging a set of bundles.
#[derive(Debug, Default)]
pub struct ComposedProfile {
    /// Normalized signature this profile was built from
    pub bundles: Vec<BundleId>,
    pub spells: BTreeMap<SpellId, Vec<Arc<Modifier>>>,
}

impl ComposedProfile {
    pub fn modifiers_for(&self, spell: SpellId) -> &[Arc<Modifier>] {
        self.spells.get(&spell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn modifier_names(&self, spell: SpellId) -> Vec<&str> {
        self.modifiers_for(spell).iter().map(|m| m.name.as_str()).collect()
    }
}

#[derive(Debug, Default)]
pub struct ProfileComposer {
    bundles: HashMap<BundleId, Arc<ProfileBundle>>,
    cache: Mutex<HashMap<Vec<BundleId>, Arc<ComposedProfile>>>,
}

impl ProfileComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a bundle invalidates every cached profile.
    pub fn register(&mut self, bundle: ProfileBundle) {
        self.bundles.insert(bundle.id.clone(), Arc::new(bundle));
        self.cache
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn contains(&self, id: &BundleId) -> bool {
        self.bundles.contains_key(id)
    }

    pub fn cache_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Parse string ids (`spec-beast-mastery`, ...) and compose them.
    pub fn compose_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Arc<ComposedProfile>, SimError> {
        let parsed = ids
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<BundleId>, _>>()?;
        self.compose(&parsed)
    }

    pub fn compose(&self, ids: &[BundleId]) -> Result<Arc<ComposedProfile>, SimError> {
        let signature = normalize_profile_ids(ids);
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hit) = cache.get(&signature) {
            return Ok(Arc::clone(hit));
        }

        let mut layers = signature
            .iter()
            .map(|id| {
                self.bundles
                    .get(id)
                    .ok_or_else(|| SimError::ProfileBundleNotFound(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Least specific first; same dimension by name.
        layers.sort_by(|a, b| {
            b.id.dimension
                .cmp(&a.id.dimension)
                .then_with(|| a.id.name.cmp(&b.id.name))
        });

        let mut spells: BTreeMap<SpellId, Vec<Arc<Modifier>>> = BTreeMap::new();
        for bundle in layers {
            for (spell, over) in &bundle.spells {
                let list = spells.entry(*spell).or_default();
                if over.replace {
                    list.clear();
                }
                for modifier in &over.modifiers {
                    match list.iter().position(|m| m.name == modifier.name) {
                        Some(pos) => list[pos] = Arc::clone(modifier),
                        None => list.push(Arc::clone(modifier)),
                    }
                }
            }
        }

        debug!(
            "Composed profile [{}] ({} spells)",
            signature
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            spells.len()
        );
        let composed = Arc::new(ComposedProfile {
            bundles: signature.clone(),
            spells,
        });
        cache.insert(signature, Arc::clone(&composed));
        Ok(composed)
    }
}
