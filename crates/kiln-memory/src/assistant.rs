//! Strategy that tells a [`ResourcePool`](crate::pool::ResourcePool) how to
//! build, match, and account for its items.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::MemoryError;

/// Creation, matching, and accounting for items of type `T` requested with
/// specs `S`.
///
/// Methods take `&self` and may be called from many threads at once;
/// implementations keep their statistics behind atomics or a lock.
pub trait Assistant<T, S>: Send + Sync {
    /// Build a fresh item satisfying `specs`.
    fn create(&self, specs: &S) -> Result<T, MemoryError>;

    /// Whether an idle `item` may serve a request for `specs`.
    ///
    /// `remaining_tolerance` is the number of further candidates the lookup
    /// may still examine after this one; implementations may accept looser
    /// matches as it approaches zero. This is a predicate: it must not update
    /// statistics.
    fn evaluate(&self, item: &T, specs: &S, remaining_tolerance: usize) -> bool;

    /// `item` left the idle set: either a lookup matched it against `specs`,
    /// or a sweep destroyed it (`specs` is `None`).
    fn register_get(&self, item: &T, specs: Option<&S>);

    /// `item` is about to join the idle set.
    fn register_return(&self, item: &T);

    /// `false` once the idle set is judged wasteful and should be swept.
    fn is_clear(&self) -> bool;

    /// Prepare a returned item for reuse.
    fn recycle(&self, _item: &mut T) {}

    /// Items for which this returns `true` are dropped on return instead of
    /// pooled.
    fn is_vacant(&self, _item: &T) -> bool {
        false
    }
}

/// Size-tolerant match used by the size-tracking assistants.
///
/// An exact fit always passes. Oversized items pass while the surplus stays
/// within `requested / (remaining_tolerance + 1)`: strict while the lookup has
/// budget left, up to twice the requested size on the last attempt.
#[inline]
pub fn fits_with_slack(available: usize, requested: usize, remaining_tolerance: usize) -> bool {
    available >= requested
        && available - requested <= requested / remaining_tolerance.saturating_add(1)
}

type CreateFn<T, S> = dyn Fn(&S) -> Result<T, MemoryError> + Send + Sync;
type EvaluateFn<T, S> = dyn Fn(&T, &S) -> bool + Send + Sync;

/// Assistant for pools with no size model: an idle counter with a high-water
/// mark. The pool is swept once more than `clear_count` items sit idle.
pub struct CountingAssistant<T, S> {
    create: Box<CreateFn<T, S>>,
    evaluate: Box<EvaluateFn<T, S>>,
    clear_count: usize,
    idle: AtomicUsize,
    high_water: AtomicUsize,
    _marker: PhantomData<fn(&S) -> T>,
}

impl<T, S> CountingAssistant<T, S> {
    /// Build from a constructor and a match predicate.
    pub fn new(
        clear_count: usize,
        create: impl Fn(&S) -> Result<T, MemoryError> + Send + Sync + 'static,
        evaluate: impl Fn(&T, &S) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            create: Box::new(create),
            evaluate: Box::new(evaluate),
            clear_count,
            idle: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Items currently counted as idle.
    pub fn idle(&self) -> usize {
        self.idle.load(Ordering::Relaxed)
    }

    /// Largest idle count ever observed.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    /// Sweep threshold.
    pub fn clear_count(&self) -> usize {
        self.clear_count
    }
}

impl<T, S> Assistant<T, S> for CountingAssistant<T, S> {
    fn create(&self, specs: &S) -> Result<T, MemoryError> {
        (self.create)(specs)
    }

    fn evaluate(&self, item: &T, specs: &S, _remaining_tolerance: usize) -> bool {
        (self.evaluate)(item, specs)
    }

    fn register_get(&self, _item: &T, _specs: Option<&S>) {
        // Err means the count is already zero.
        let _ = self
            .idle
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    fn register_return(&self, _item: &T) {
        let now = self.idle.fetch_add(1, Ordering::Relaxed) + 1;
        self.high_water.fetch_max(now, Ordering::Relaxed);
    }

    fn is_clear(&self) -> bool {
        self.idle.load(Ordering::Relaxed) <= self.clear_count
    }
}

impl<T, S> std::fmt::Debug for CountingAssistant<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingAssistant")
            .field("clear_count", &self.clear_count)
            .field("idle", &self.idle())
            .field("high_water", &self.high_water())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(clear_count: usize) -> CountingAssistant<String, usize> {
        CountingAssistant::new(
            clear_count,
            |cap: &usize| Ok(String::with_capacity(*cap)),
            |s: &String, cap: &usize| s.capacity() >= *cap,
        )
    }

    #[test]
    fn counts_idle_and_high_water() {
        let a = counting(2);
        let s = a.create(&8).unwrap();
        a.register_return(&s);
        a.register_return(&s);
        assert!(a.is_clear());
        a.register_return(&s);
        assert!(!a.is_clear());
        a.register_get(&s, Some(&8));
        assert_eq!(a.idle(), 2);
        assert_eq!(a.high_water(), 3);
    }

    #[test]
    fn slack_widens_as_budget_runs_out() {
        assert!(fits_with_slack(10, 10, 5));
        assert!(!fits_with_slack(9, 10, 0));
        assert!(!fits_with_slack(16, 10, 1));
        assert!(fits_with_slack(15, 10, 1));
        assert!(fits_with_slack(20, 10, 0));
        assert!(!fits_with_slack(21, 10, 0));
        assert!(fits_with_slack(10, 10, usize::MAX));
    }

    #[test]
    fn get_never_underflows() {
        let a = counting(0);
        let s = String::new();
        a.register_get(&s, None);
        assert_eq!(a.idle(), 0);
        assert!(a.is_clear());
    }

    #[test]
    fn delegates_to_closures() {
        let a = counting(4);
        let s = a.create(&32).unwrap();
        assert!(a.evaluate(&s, &16, 0));
        assert!(!a.evaluate(&String::new(), &16, 3));
    }
}
