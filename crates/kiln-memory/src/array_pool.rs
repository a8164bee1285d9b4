//! Pool of boxed slices, swept when the idle lengths grow too varied.

use std::marker::PhantomData;

use parking_lot::Mutex;

use crate::assistant::{fits_with_slack, Assistant};
use crate::config::{EvictionConfig, PoolConfig};
use crate::error::MemoryError;
use crate::handle::PoolHandle;
use crate::pool::ResourcePool;
use crate::running::RunningStats;
use crate::stats::PoolStats;

/// Request for an array of at least `len` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArraySpecs {
    /// Minimum number of elements.
    pub len: usize,
}

/// Sizing and eviction strategy for [`ArrayPool`].
///
/// Tracks the running mean and variance of idle array lengths. Once at least
/// `clear_count` arrays sit idle, a squared coefficient of variation above
/// `variance_threshold` marks the pool as wasteful; so does a total idle
/// length above `max_pooled`, regardless of count.
pub struct ArrayAssistant<E> {
    eviction: EvictionConfig,
    recycle_contents: bool,
    lengths: Mutex<RunningStats>,
    _marker: PhantomData<fn() -> E>,
}

impl<E> ArrayAssistant<E> {
    /// Build from pool settings.
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            eviction: config.eviction.clone(),
            recycle_contents: config.recycle_contents,
            lengths: Mutex::new(RunningStats::new()),
            _marker: PhantomData,
        }
    }

    /// Snapshot of the idle-length statistics.
    pub fn lengths(&self) -> RunningStats {
        *self.lengths.lock()
    }
}

impl<E: Default + Clone + Send + 'static> Assistant<Box<[E]>, ArraySpecs> for ArrayAssistant<E> {
    fn create(&self, specs: &ArraySpecs) -> Result<Box<[E]>, MemoryError> {
        let mut items = Vec::new();
        items
            .try_reserve_exact(specs.len)
            .map_err(|_| MemoryError::Allocation {
                size: specs.len.saturating_mul(std::mem::size_of::<E>()),
                align: std::mem::align_of::<E>(),
            })?;
        items.resize_with(specs.len, E::default);
        Ok(items.into_boxed_slice())
    }

    fn evaluate(&self, item: &Box<[E]>, specs: &ArraySpecs, remaining_tolerance: usize) -> bool {
        fits_with_slack(item.len(), specs.len, remaining_tolerance)
    }

    fn register_get(&self, item: &Box<[E]>, _specs: Option<&ArraySpecs>) {
        self.lengths.lock().remove(item.len());
    }

    fn register_return(&self, item: &Box<[E]>) {
        self.lengths.lock().add(item.len());
    }

    fn is_clear(&self) -> bool {
        let lengths = self.lengths.lock();
        if lengths.total() > self.eviction.max_pooled as u64 {
            return false;
        }
        lengths.count() < self.eviction.clear_count as u64
            || lengths.relative_variance() <= self.eviction.variance_threshold
    }

    fn recycle(&self, item: &mut Box<[E]>) {
        if self.recycle_contents {
            item.fill(E::default());
        }
    }

    fn is_vacant(&self, item: &Box<[E]>) -> bool {
        item.is_empty()
    }
}

/// Handle to an array checked out of an [`ArrayPool`].
pub type ArrayHandle<E> = PoolHandle<Box<[E]>, ArraySpecs, ArrayAssistant<E>>;

/// Thread-safe pool of `Box<[E]>` buffers.
pub struct ArrayPool<E: Default + Clone + Send + 'static> {
    pool: ResourcePool<Box<[E]>, ArraySpecs, ArrayAssistant<E>>,
}

impl<E: Default + Clone + Send + 'static> Clone for ArrayPool<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<E: Default + Clone + Send + 'static> ArrayPool<E> {
    /// Create a pool with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with the given settings.
    ///
    /// `config` is checked only in debug builds; call
    /// [`PoolConfig::validate`] first when it comes from outside.
    #[must_use]
    pub fn with_config(config: PoolConfig) -> Self {
        let assistant = ArrayAssistant::new(&config);
        Self {
            pool: ResourcePool::with_config(assistant, config),
        }
    }

    /// Check out an array of at least `len` elements using the configured
    /// tolerance.
    pub fn rent(&self, len: usize) -> Result<ArrayHandle<E>, MemoryError> {
        self.pool.get_default(&ArraySpecs { len })
    }

    /// Check out an array of at least `len` elements, examining at most
    /// `tolerance` idle candidates.
    pub fn rent_with_tolerance(
        &self,
        len: usize,
        tolerance: usize,
    ) -> Result<ArrayHandle<E>, MemoryError> {
        self.pool.get(&ArraySpecs { len }, tolerance)
    }

    /// Hand an array to the pool that was not obtained from it.
    pub fn give_back(&self, array: Box<[E]>) {
        self.pool.put(array);
    }

    /// Destroy every idle array.
    pub fn clear(&self) {
        self.pool.clear();
    }

    /// Arrays sitting idle.
    pub fn idle_count(&self) -> usize {
        self.pool.idle_count()
    }

    /// Idle-length statistics.
    pub fn lengths(&self) -> RunningStats {
        self.pool.assistant().lengths()
    }

    /// Get a snapshot of pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The underlying generic pool.
    pub fn inner(&self) -> &ResourcePool<Box<[E]>, ArraySpecs, ArrayAssistant<E>> {
        &self.pool
    }
}

impl<E: Default + Clone + Send + 'static> Default for ArrayPool<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(clear_count: usize, variance_threshold: f64, max_pooled: usize) -> ArrayPool<i32> {
        ArrayPool::with_config(PoolConfig {
            tolerance: 3,
            eviction: EvictionConfig {
                clear_count,
                variance_threshold,
                max_pooled,
            },
            recycle_contents: false,
        })
    }

    #[test]
    fn returned_arrays_are_reused_before_allocating() {
        let pool = pool_with(2, 0.5, 1 << 20);
        let returned: Vec<Box<[i32]>> = (0..3).map(|_| vec![0; 10].into_boxed_slice()).collect();
        let addresses: Vec<*const i32> = returned.iter().map(|a| a.as_ptr()).collect();
        for array in returned {
            pool.give_back(array);
        }
        assert_eq!(pool.idle_count(), 3);

        let mut held = Vec::new();
        for _ in 0..3 {
            let handle = pool.rent_with_tolerance(10, 3).unwrap();
            assert!(addresses.contains(&handle.as_ptr()));
            held.push(handle);
        }
        assert_eq!(pool.stats().created, 0);

        let fresh = pool.rent_with_tolerance(10, 3).unwrap();
        assert!(!addresses.contains(&fresh.as_ptr()));
        assert_eq!(pool.stats().created, 1);
    }

    #[test]
    fn mixed_lengths_trigger_a_sweep() {
        let pool = pool_with(2, 0.5, 1 << 20);
        pool.give_back(vec![0; 1].into_boxed_slice());
        assert_eq!(pool.idle_count(), 1);
        pool.give_back(vec![0; 100].into_boxed_slice());
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.stats().sweeps, 1);
        assert_eq!(pool.lengths().count(), 0);
    }

    #[test]
    fn uniform_lengths_stay_pooled() {
        let pool = pool_with(2, 0.5, 1 << 20);
        for _ in 0..6 {
            pool.give_back(vec![0; 64].into_boxed_slice());
        }
        assert_eq!(pool.idle_count(), 6);
        assert_eq!(pool.stats().sweeps, 0);
    }

    #[test]
    fn aggregate_size_triggers_a_sweep() {
        let pool = pool_with(8, 0.5, 50);
        pool.give_back(vec![0; 30].into_boxed_slice());
        assert_eq!(pool.idle_count(), 1);
        pool.give_back(vec![0; 30].into_boxed_slice());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn oversized_arrays_match_only_near_the_end_of_the_budget() {
        let pool = pool_with(8, 10.0, 1 << 20);
        pool.give_back(vec![0; 16].into_boxed_slice());
        pool.give_back(vec![0; 10].into_boxed_slice());

        let handle = pool.rent_with_tolerance(10, 2).unwrap();
        assert_eq!(handle.len(), 10);
        assert_eq!(pool.stats().rejections, 1);
        assert_eq!(pool.idle_count(), 1);

        let loose = pool.rent_with_tolerance(10, 1).unwrap();
        assert_eq!(loose.len(), 16);
    }

    #[test]
    fn empty_arrays_are_not_pooled() {
        let pool: ArrayPool<u8> = ArrayPool::new();
        pool.give_back(Vec::new().into_boxed_slice());
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.stats().discards, 1);
    }

    #[test]
    fn recycling_resets_contents() {
        let pool: ArrayPool<u32> = ArrayPool::with_config(PoolConfig {
            recycle_contents: true,
            ..PoolConfig::default()
        });
        let mut handle = pool.rent(4).unwrap();
        handle.copy_from_slice(&[1, 2, 3, 4]);
        drop(handle);
        let again = pool.rent(4).unwrap();
        assert_eq!(&again[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn checkout_removes_length_from_statistics() {
        let pool = pool_with(8, 10.0, 1 << 20);
        pool.give_back(vec![0; 8].into_boxed_slice());
        pool.give_back(vec![0; 8].into_boxed_slice());
        assert_eq!(pool.lengths().count(), 2);
        let handle = pool.rent(8).unwrap();
        assert_eq!(pool.lengths().count(), 1);
        drop(handle);
        assert_eq!(pool.lengths().total(), 16);
    }

    #[test]
    fn oversized_request_is_an_error() {
        let pool: ArrayPool<u64> = ArrayPool::new();
        let err = pool.rent(usize::MAX / 4).unwrap_err();
        assert!(matches!(err, MemoryError::Allocation { align: 8, .. }));
        assert_eq!(pool.stats().created, 0);
        assert_eq!(pool.inner().outstanding(), 0);

        let handle = pool.rent(4).unwrap();
        assert_eq!(handle.len(), 4);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "invalid pool config")]
    fn nan_threshold_rejected_in_debug_builds() {
        let _pool = pool_with(2, f64::NAN, 1 << 20);
    }
}
