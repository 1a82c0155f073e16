//! Bounded and Expiry transforms
//!
//! Two pure primitives used by every cooldown, charge, aura and resource field.
//! Neither ever mutates its input: each operation computes the next value and
//! hands it to an `update(new_value, time)` closure that builds the owning
//! entity's next version.
//!
//! ```ignore
//! let spell = spell.charges().decrement(1, now);
//! let spell = spell.cooldown().trigger(12_000, now);
//! ```

use crate::Millis;

/// Numeric types that can back a [`Bounded`] counter.
///
/// Addition and subtraction saturate instead of overflowing so that clamping
/// works for arbitrarily large inputs.
pub trait Clampable: Copy + PartialOrd {
    fn saturating_plus(self, other: Self) -> Self;
    fn saturating_minus(self, other: Self) -> Self;
}

impl Clampable for u32 {
    fn saturating_plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }
    fn saturating_minus(self, other: Self) -> Self {
        self.saturating_sub(other)
    }
}

impl Clampable for i64 {
    fn saturating_plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }
    fn saturating_minus(self, other: Self) -> Self {
        self.saturating_sub(other)
    }
}

impl Clampable for f64 {
    fn saturating_plus(self, other: Self) -> Self {
        self + other
    }
    fn saturating_minus(self, other: Self) -> Self {
        self - other
    }
}

fn clamp<T: Clampable>(value: T, min: T, max: T) -> T {
    // NaN compares false both ways and falls through to `min`.
    if value > max {
        max
    } else if value >= min {
        value
    } else {
        min
    }
}

/// Clamped counter in `[min, max]`.
pub struct Bounded<T, F> {
    pub current: T,
    pub min: T,
    pub max: T,
    update: F,
}

impl<T, E, F> Bounded<T, F>
where
    T: Clampable,
    F: Fn(T, Millis) -> E,
{
    pub fn new(current: T, min: T, max: T, update: F) -> Self {
        Self {
            current,
            min,
            max,
            update,
        }
    }

    pub fn increment(&self, amount: T, time: Millis) -> E {
        let next = clamp(self.current.saturating_plus(amount), self.min, self.max);
        (self.update)(next, time)
    }

    pub fn decrement(&self, amount: T, time: Millis) -> E {
        let next = clamp(self.current.saturating_minus(amount), self.min, self.max);
        (self.update)(next, time)
    }

    pub fn set(&self, value: T, time: Millis) -> E {
        (self.update)(clamp(value, self.min, self.max), time)
    }

    /// Add a delta, which may be negative for signed `T`, and clamp.
    pub fn modify(&self, delta: T, time: Millis) -> E {
        let next = clamp(self.current.saturating_plus(delta), self.min, self.max);
        (self.update)(next, time)
    }

    pub fn is_at_max(&self) -> bool {
        self.current >= self.max
    }
}

/// Absolute-timestamp expiry (cooldowns, charge timers, aura durations).
pub struct Expiry<F> {
    pub current: Millis,
    update: F,
}

impl<E, F> Expiry<F>
where
    F: Fn(Millis, Millis) -> E,
{
    pub fn new(current: Millis, update: F) -> Self {
        Self { current, update }
    }

    /// Start the timer: expires at `time + duration`.
    pub fn trigger(&self, duration: Millis, time: Millis) -> E {
        (self.update)(time.saturating_add(duration), time)
    }

    /// Restart the timer from `time`; identical to [`Expiry::trigger`].
    pub fn refresh(&self, duration: Millis, time: Millis) -> E {
        self.trigger(duration, time)
    }

    /// Expire immediately.
    pub fn reset(&self, time: Millis) -> E {
        (self.update)(time, time)
    }

    /// Shorten the remaining time. Never moves the expiry before `time`.
    pub fn reduce(&self, amount: Millis, time: Millis) -> E {
        let next = self.current.saturating_sub(amount).max(time);
        (self.update)(next, time)
    }

    /// Shift the expiry by a signed delta.
    pub fn modify(&self, delta: i64, time: Millis) -> E {
        let next = if delta >= 0 {
            self.current.saturating_add(delta as u64)
        } else {
            self.current.saturating_sub(delta.unsigned_abs())
        };
        (self.update)(next, time)
    }

    pub fn is_expired(&self, time: Millis) -> bool {
        time >= self.current
    }

    pub fn remaining(&self, time: Millis) -> Millis {
        self.current.saturating_sub(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counter(current: i64, min: i64, max: i64) -> Bounded<i64, impl Fn(i64, Millis) -> i64> {
        Bounded::new(current, min, max, |v, _| v)
    }

    fn timer(current: Millis) -> Expiry<impl Fn(Millis, Millis) -> Millis> {
        Expiry::new(current, |v, _| v)
    }

    #[test]
    fn test_bounded_clamps_both_ends() {
        assert_eq!(counter(1, 0, 2).increment(5, 0), 2);
        assert_eq!(counter(1, 0, 2).decrement(5, 0), 0);
        assert_eq!(counter(1, 0, 2).set(-3, 0), 0);
        assert_eq!(counter(1, 0, 2).set(1, 0), 1);
    }

    #[test]
    fn test_bounded_modify_adds_signed_delta() {
        assert_eq!(counter(5, 0, 10).modify(-3, 0), 2);
        assert_eq!(counter(5, 0, 10).modify(3, 0), 8);
        assert_eq!(counter(5, 0, 10).modify(-9, 0), 0);
        assert_eq!(counter(5, 0, 10).modify(i64::MAX, 0), 10);

        let power = Bounded::new(40.0, 0.0, 100.0, |v, _| v);
        assert_eq!(power.modify(-15.5, 0), 24.5);
        assert_eq!(power.modify(75.0, 0), 100.0);
    }

    #[test]
    fn test_bounded_u32_underflow_saturates() {
        let charges = Bounded::new(0u32, 0, 3, |v, _| v);
        assert_eq!(charges.decrement(u32::MAX, 0), 0);
        assert_eq!(charges.increment(u32::MAX, 0), 3);
    }

    #[test]
    fn test_bounded_passes_time_to_update() {
        let b = Bounded::new(1u32, 0, 2, |v, t| (v, t));
        assert_eq!(b.increment(1, 500), (2, 500));
    }

    #[test]
    fn test_expiry_operations() {
        assert_eq!(timer(0).trigger(12_000, 1_000), 13_000);
        assert_eq!(timer(5_000).reset(2_000), 2_000);
        assert_eq!(timer(10_000).reduce(3_000, 2_000), 7_000);
        assert_eq!(timer(10_000).reduce(9_000, 2_000), 2_000);
        assert_eq!(timer(10_000).modify(-500, 0), 9_500);
        assert_eq!(timer(10_000).modify(500, 0), 10_500);
        assert_eq!(timer(100).modify(-500, 0), 0);
    }

    proptest! {
        #[test]
        fn prop_bounded_stays_in_range(
            current in -1_000i64..1_000,
            amount in any::<i64>(),
            min in -500i64..0,
            max in 0i64..500,
        ) {
            let start = current.clamp(min, max);
            let b = counter(start, min, max);
            for v in [b.increment(amount, 0), b.decrement(amount, 0), b.set(amount, 0), b.modify(amount, 0)] {
                prop_assert!(v >= min && v <= max);
            }
        }

        #[test]
        fn prop_refresh_is_exact(current in any::<u32>(), duration in 0u64..1_000_000, now in 0u64..1_000_000) {
            prop_assert_eq!(timer(current as Millis).refresh(duration, now), now + duration);
        }

        #[test]
        fn prop_reduce_never_before_now(current in 0u64..10_000_000, amount in any::<u64>(), now in 0u64..10_000_000) {
            prop_assert!(timer(current).reduce(amount, now) >= now);
        }
    }
}
