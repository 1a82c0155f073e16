//! Generational arena with entity-level copy-on-write
//!
//! Entities live behind `Arc`, so cloning an arena clones a vector of pointers
//! and replacing one entity leaves every other entity shared with the
//! previous world snapshot. Removing an entity bumps its slot generation; an
//! old [`Index`] for that slot stops resolving instead of aliasing whatever is
//! stored there next.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Typed generational index into an [`Arena<T>`].
#[derive(Serialize, Deserialize)]
pub struct Index<T> {
    slot: u32,
    generation: u32,
    #[serde(skip)]
    marker: PhantomData<fn() -> T>,
}

impl<T> Index<T> {
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self {
            slot,
            generation,
            marker: PhantomData,
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// Manual impls: derives would require `T: Clone`/`T: PartialEq`/... for the marker.
impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Index<T> {}

impl<T> PartialOrd for Index<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Index<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.slot, self.generation).cmp(&(other.slot, other.generation))
    }
}

impl<T> std::hash::Hash for Index<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.slot, self.generation)
    }
}

impl<T> fmt::Display for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            value: self.value.clone(),
        }
    }
}

/// Slot-ordered store of `Arc<T>` entities.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Clone for Arena<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            free: self.free.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reserve the index the next `insert` will return.
    pub fn next_index(&self) -> Index<T> {
        match self.free.last() {
            Some(&slot) => Index::new(slot, self.slots[slot as usize].generation),
            None => Index::new(self.slots.len() as u32, 0),
        }
    }

    /// Insert a value built from its own index.
    pub fn insert_with(&mut self, build: impl FnOnce(Index<T>) -> T) -> Index<T> {
        let index = self.next_index();
        let value = Arc::new(build(index));
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize].value = Some(value);
        } else {
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
        }
        self.len += 1;
        index
    }

    pub fn get(&self, index: Index<T>) -> Option<&Arc<T>> {
        self.slots
            .get(index.slot as usize)
            .filter(|slot| slot.generation == index.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn contains(&self, index: Index<T>) -> bool {
        self.get(index).is_some()
    }

    /// Swap in a new version of an existing entity. Returns `false` if the
    /// index is stale.
    pub fn replace(&mut self, index: Index<T>, value: T) -> bool {
        match self.slots.get_mut(index.slot as usize) {
            Some(slot) if slot.generation == index.generation && slot.value.is_some() => {
                slot.value = Some(Arc::new(value));
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, index: Index<T>) -> Option<Arc<T>> {
        let slot = self.slots.get_mut(index.slot as usize)?;
        if slot.generation != index.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index.slot);
        self.len -= 1;
        Some(value)
    }

    /// Iterate live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Index<T>, &Arc<T>)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (Index::new(i as u32, slot.generation), v))
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<T>> {
        self.iter().map(|(_, v)| v)
    }

    /// True when both arenas hold the very same entity allocation at `index`.
    pub fn shares(&self, other: &Arena<T>, index: Index<T>) -> bool {
        match (self.get(index), other.get(index)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
