//! Generic cache of reusable items with a pluggable [`Assistant`].
//!
//! Two lock-free bags back every pool: idle items, and spare handle shells
//! (the boxed slot a [`PoolHandle`] carries its value in). Each operation is
//! individually thread-safe; a lookup's pop → evaluate → push-back sequence is
//! not atomic, so under contention a lookup may miss an item another thread is
//! examining. Rejected items are always pushed back, so nothing is lost.
//!
//! There is no per-item TTL or LRU. The only shrink mechanism is a whole-pool
//! sweep, triggered when the assistant reports the idle set as not clear.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;

use crate::assistant::Assistant;
use crate::config::PoolConfig;
use crate::error::MemoryError;
use crate::handle::{PoolHandle, Retention, Shell};
use crate::stats::{AtomicPoolStats, PoolStats};

pub(crate) struct Shared<T, S, A> {
    idle: SegQueue<T>,
    shells: SegQueue<Box<Shell<T>>>,
    assistant: A,
    config: PoolConfig,
    stats: AtomicPoolStats,
    outstanding: AtomicUsize,
    _specs: PhantomData<fn(&S)>,
}

impl<T, S, A: Assistant<T, S>> Shared<T, S, A> {
    fn put(&self, mut item: T) {
        if self.assistant.is_vacant(&item) {
            self.stats.record_discard();
            return;
        }
        self.assistant.recycle(&mut item);
        // Registered before the push so a racing lookup can never unregister
        // an item the assistant has not counted yet.
        self.assistant.register_return(&item);
        self.idle.push(item);
        self.stats.record_return();

        if !self.assistant.is_clear() {
            self.sweep();
        }
    }

    fn sweep(&self) {
        let mut evicted = 0u64;
        while let Some(item) = self.idle.pop() {
            self.assistant.register_get(&item, None);
            drop(item);
            evicted += 1;
        }
        self.clear_wrappers();
        self.stats.record_sweep(evicted);
        tracing::debug!(evicted, "pool swept");
    }

    fn clear_wrappers(&self) {
        while self.shells.pop().is_some() {}
    }

    pub(crate) fn release(&self, mut shell: Box<Shell<T>>, retention: Retention) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        if let Some(value) = shell.value.take() {
            self.put(value);
        }
        if retention == Retention::Temporary {
            self.shells.push(shell);
        }
    }

    pub(crate) fn detach(&self, shell: Box<Shell<T>>) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        self.shells.push(shell);
    }
}

impl<T, S, A> Drop for Shared<T, S, A> {
    fn drop(&mut self) {
        let outstanding = *self.outstanding.get_mut();
        if outstanding > 0 {
            tracing::debug!(
                outstanding,
                "pool dropped with handles still checked out; their values will be dropped"
            );
        }
    }
}

/// A thread-safe pool of `T` values requested by specs `S`.
///
/// Cloning the pool is cheap and yields another reference to the same bags.
pub struct ResourcePool<T, S, A: Assistant<T, S>> {
    shared: Arc<Shared<T, S, A>>,
}

impl<T, S, A: Assistant<T, S>> Clone for ResourcePool<T, S, A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, S, A: Assistant<T, S>> ResourcePool<T, S, A> {
    /// Create an empty pool with default settings.
    pub fn new(assistant: A) -> Self {
        Self::with_config(assistant, PoolConfig::default())
    }

    /// Create an empty pool. Only `config.tolerance` is read here; the
    /// eviction settings belong to whichever assistant uses them.
    ///
    /// `config` is checked only in debug builds; call
    /// [`PoolConfig::validate`] first when it comes from outside.
    pub fn with_config(assistant: A, config: PoolConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid pool config: {config:?}");
        Self {
            shared: Arc::new(Shared {
                idle: SegQueue::new(),
                shells: SegQueue::new(),
                assistant,
                config,
                stats: AtomicPoolStats::new(),
                outstanding: AtomicUsize::new(0),
                _specs: PhantomData,
            }),
        }
    }

    /// Check out an item matching `specs`, creating one if no idle item
    /// passes within `tolerance` attempts.
    ///
    /// Fails only if the assistant cannot create a new item.
    pub fn get(&self, specs: &S, tolerance: usize) -> Result<PoolHandle<T, S, A>, MemoryError> {
        if let Some(handle) = self.try_get(specs, tolerance) {
            return Ok(handle);
        }
        let item = self.shared.assistant.create(specs)?;
        self.shared.stats.record_created();
        Ok(self.wrap(item))
    }

    /// [`get`](Self::get) with the configured tolerance.
    pub fn get_default(&self, specs: &S) -> Result<PoolHandle<T, S, A>, MemoryError> {
        self.get(specs, self.shared.config.tolerance)
    }

    /// Examine up to `min(tolerance, idle_count())` idle items and check out
    /// the first one the assistant accepts.
    ///
    /// Rejected candidates go back to the idle bag, possibly in a different
    /// order. Returns `None` once the budget is spent or the bag runs dry.
    pub fn try_get(&self, specs: &S, tolerance: usize) -> Option<PoolHandle<T, S, A>> {
        let shared = &*self.shared;
        let budget = tolerance.min(shared.idle.len());

        for attempt in 0..budget {
            let Some(item) = shared.idle.pop() else {
                break;
            };
            let remaining = budget - attempt - 1;
            if shared.assistant.evaluate(&item, specs, remaining) {
                shared.assistant.register_get(&item, Some(specs));
                shared.stats.record_hit();
                tracing::trace!(attempt, "pool hit");
                return Some(self.wrap(item));
            }
            shared.stats.record_rejection();
            shared.idle.push(item);
        }

        shared.stats.record_miss();
        tracing::trace!(budget, "pool miss");
        None
    }

    /// Return an item to the idle bag.
    ///
    /// Sweeps the whole pool afterwards if the assistant reports it is no
    /// longer clear.
    pub fn put(&self, item: T) {
        self.shared.put(item);
    }

    /// Destroy every idle item, then every spare shell.
    pub fn clear(&self) {
        self.shared.sweep();
    }

    /// Drop every spare shell.
    pub fn clear_wrappers(&self) {
        self.shared.clear_wrappers();
    }

    /// Pre-populate the pool so that at least `count` items sit idle.
    ///
    /// Returns how many items were created. Warming past the assistant's
    /// eviction limits triggers a sweep like any other return.
    pub fn warm(&self, specs: &S, count: usize) -> Result<usize, MemoryError> {
        let to_add = count.saturating_sub(self.idle_count());
        for _ in 0..to_add {
            let item = self.shared.assistant.create(specs)?;
            self.shared.stats.record_created();
            self.shared.put(item);
        }
        Ok(to_add)
    }

    fn wrap(&self, item: T) -> PoolHandle<T, S, A> {
        let mut shell = self.shared.shells.pop().unwrap_or_default();
        shell.value = Some(item);
        self.shared.outstanding.fetch_add(1, Ordering::Relaxed);
        PoolHandle::new(shell, Arc::downgrade(&self.shared))
    }

    /// Items sitting in the idle bag.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.len()
    }

    /// Recycled handle shells ready for reuse.
    pub fn spare_shells(&self) -> usize {
        self.shared.shells.len()
    }

    /// Handles checked out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Relaxed)
    }

    /// The pool's assistant.
    pub fn assistant(&self) -> &A {
        &self.shared.assistant
    }

    /// The pool's configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Get a snapshot of pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.shared.stats.snapshot()
    }

    /// Reset pool statistics counters.
    pub fn reset_stats(&self) {
        self.shared.stats.reset();
    }
}

impl<T, S, A: Assistant<T, S>> std::fmt::Debug for ResourcePool<T, S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("idle", &self.idle_count())
            .field("spare_shells", &self.spare_shells())
            .field("outstanding", &self.outstanding())
            .field("stats", &self.stats())
            .finish()
    }
}
