//! Pool of [`RawArena`] blocks.
//!
//! A returned block is reset (and optionally zeroed) before it goes idle, so
//! every rented block starts with its whole capacity available.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::arena::RawArena;
use crate::assistant::{fits_with_slack, Assistant};
use crate::config::{ArenaConfig, EvictionConfig, PoolConfig};
use crate::error::MemoryError;
use crate::handle::PoolHandle;
use crate::pool::ResourcePool;
use crate::running::RunningStats;
use crate::stats::PoolStats;

/// Request for a block of at least `size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockSpecs {
    /// Minimum capacity in bytes.
    pub size: usize,
}

/// Sizing and eviction strategy for [`MemoryBlockPool`].
pub struct MemoryBlockAssistant {
    arena: ArenaConfig,
    eviction: EvictionConfig,
    capacities: Mutex<RunningStats>,
    wasted: AtomicU64,
}

impl MemoryBlockAssistant {
    /// Build from arena and eviction settings.
    pub fn new(arena: ArenaConfig, eviction: EvictionConfig) -> Self {
        Self {
            arena,
            eviction,
            capacities: Mutex::new(RunningStats::new()),
            wasted: AtomicU64::new(0),
        }
    }

    /// Capacity a fresh block for `specs` would get.
    #[inline]
    fn block_size(&self, specs: &BlockSpecs) -> usize {
        specs.size.max(self.arena.min_block_size)
    }

    /// Bytes handed out beyond what the matched requests needed.
    pub fn wasted_bytes(&self) -> u64 {
        self.wasted.load(Ordering::Relaxed)
    }

    /// Snapshot of the idle-capacity statistics.
    pub fn capacities(&self) -> RunningStats {
        *self.capacities.lock()
    }

    /// Arena settings.
    pub fn arena_config(&self) -> &ArenaConfig {
        &self.arena
    }
}

impl Assistant<RawArena, BlockSpecs> for MemoryBlockAssistant {
    fn create(&self, specs: &BlockSpecs) -> Result<RawArena, MemoryError> {
        RawArena::with_alignment(self.block_size(specs), self.arena.alignment)
    }

    fn evaluate(&self, item: &RawArena, specs: &BlockSpecs, remaining_tolerance: usize) -> bool {
        fits_with_slack(item.total_size(), self.block_size(specs), remaining_tolerance)
    }

    fn register_get(&self, item: &RawArena, specs: Option<&BlockSpecs>) {
        self.capacities.lock().remove(item.total_size());
        if let Some(specs) = specs {
            let waste = item.total_size().saturating_sub(self.block_size(specs));
            self.wasted.fetch_add(waste as u64, Ordering::Relaxed);
        }
    }

    fn register_return(&self, item: &RawArena) {
        self.capacities.lock().add(item.total_size());
    }

    fn is_clear(&self) -> bool {
        let capacities = self.capacities.lock();
        if capacities.total() > self.eviction.max_pooled as u64 {
            return false;
        }
        capacities.count() < self.eviction.clear_count as u64
            || capacities.relative_variance() <= self.eviction.variance_threshold
    }

    fn recycle(&self, item: &mut RawArena) {
        item.reset();
        if self.arena.zero_on_return {
            item.zero();
        }
    }

    fn is_vacant(&self, item: &RawArena) -> bool {
        item.is_disposed()
    }
}

impl std::fmt::Debug for MemoryBlockAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlockAssistant")
            .field("arena", &self.arena)
            .field("eviction", &self.eviction)
            .field("wasted_bytes", &self.wasted_bytes())
            .finish_non_exhaustive()
    }
}

/// Handle to a block checked out of a [`MemoryBlockPool`].
pub type BlockHandle = PoolHandle<RawArena, BlockSpecs, MemoryBlockAssistant>;

/// Thread-safe pool of arenas.
///
/// Each block is single-writer while rented; the pool itself may be shared
/// across threads by cloning.
#[derive(Clone, Debug)]
pub struct MemoryBlockPool {
    pool: ResourcePool<RawArena, BlockSpecs, MemoryBlockAssistant>,
}

impl MemoryBlockPool {
    /// Create a pool with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default(), ArenaConfig::default())
    }

    /// Create a pool. `pool.eviction.max_pooled` is read as bytes.
    ///
    /// Both configs are checked only in debug builds; call their `validate`
    /// first when they come from outside.
    #[must_use]
    pub fn with_config(pool: PoolConfig, arena: ArenaConfig) -> Self {
        debug_assert!(arena.validate().is_ok(), "invalid arena config: {arena:?}");
        let assistant = MemoryBlockAssistant::new(arena, pool.eviction.clone());
        Self {
            pool: ResourcePool::with_config(assistant, pool),
        }
    }

    /// Check out a reset block of at least `size` bytes using the configured
    /// tolerance.
    pub fn rent(&self, size: usize) -> Result<BlockHandle, MemoryError> {
        self.pool.get_default(&BlockSpecs { size })
    }

    /// Check out a reset block of at least `size` bytes, examining at most
    /// `tolerance` idle candidates.
    pub fn rent_with_tolerance(
        &self,
        size: usize,
        tolerance: usize,
    ) -> Result<BlockHandle, MemoryError> {
        self.pool.get(&BlockSpecs { size }, tolerance)
    }

    /// Hand a block to the pool that was not obtained from it.
    pub fn give_back(&self, block: RawArena) {
        self.pool.put(block);
    }

    /// Pre-allocate idle blocks of `size` bytes until `count` sit idle.
    pub fn warm(&self, size: usize, count: usize) -> Result<usize, MemoryError> {
        self.pool.warm(&BlockSpecs { size }, count)
    }

    /// Dispose every idle block.
    pub fn clear(&self) {
        self.pool.clear();
    }

    /// Blocks sitting idle.
    pub fn idle_count(&self) -> usize {
        self.pool.idle_count()
    }

    /// Bytes handed out beyond what matched requests needed.
    pub fn wasted_bytes(&self) -> u64 {
        self.pool.assistant().wasted_bytes()
    }

    /// Idle-capacity statistics.
    pub fn capacities(&self) -> RunningStats {
        self.pool.assistant().capacities()
    }

    /// Get a snapshot of pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The underlying generic pool.
    pub fn inner(&self) -> &ResourcePool<RawArena, BlockSpecs, MemoryBlockAssistant> {
        &self.pool
    }
}

impl Default for MemoryBlockPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Unsynchronized;

    fn small_blocks(zero_on_return: bool) -> MemoryBlockPool {
        MemoryBlockPool::with_config(
            PoolConfig::default(),
            ArenaConfig {
                min_block_size: 64,
                zero_on_return,
                ..ArenaConfig::default()
            },
        )
    }

    #[test]
    fn small_requests_get_the_minimum_block() {
        let pool = small_blocks(false);
        let block = pool.rent(10).unwrap();
        assert_eq!(block.total_size(), 64);
        assert_eq!(block.used_size(), 0);
    }

    #[test]
    fn returned_blocks_come_back_reset() {
        let pool = small_blocks(false);
        let block = pool.rent(128).unwrap();
        assert!(block.try_alloc(100).is_some());
        assert_eq!(block.used_size(), 100);
        drop(block);

        let again = pool.rent(128).unwrap();
        assert_eq!(again.used_size(), 0);
        assert_eq!(again.remaining_size(), 128);
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.stats().created, 1);
    }

    #[test]
    fn small_requests_reuse_minimum_blocks() {
        let pool = small_blocks(false);
        drop(pool.rent(8).unwrap());
        let again = pool.rent(16).unwrap();
        assert_eq!(again.total_size(), 64);
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.wasted_bytes(), 0);
    }

    #[test]
    fn zero_on_return_clears_contents() {
        let pool = small_blocks(true);
        let block = pool.rent(64).unwrap();
        {
            let mut view = block.alloc_view::<u32, _>(16, Unsynchronized).unwrap();
            view.fill(0xDEAD_BEEF);
        }
        drop(block);

        let again = pool.rent(64).unwrap();
        let view = again.alloc_view::<u32, _>(16, Unsynchronized).unwrap();
        assert!(view.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn waste_is_counted_on_checkout_only() {
        let pool = small_blocks(false);
        pool.give_back(RawArena::new(1000).unwrap());

        assert!(pool.inner().try_get(&BlockSpecs { size: 1200 }, 1).is_none());
        assert_eq!(pool.wasted_bytes(), 0);
        assert_eq!(pool.stats().rejections, 1);

        let block = pool.rent_with_tolerance(800, 1).unwrap();
        assert_eq!(block.total_size(), 1000);
        assert_eq!(pool.wasted_bytes(), 200);
    }

    #[test]
    fn disposed_blocks_are_discarded() {
        let pool = small_blocks(false);
        let mut arena = RawArena::new(64).unwrap();
        arena.dispose();
        pool.give_back(arena);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.stats().discards, 1);
    }

    #[test]
    fn mixed_capacities_trigger_a_sweep() {
        let pool = MemoryBlockPool::with_config(
            PoolConfig {
                eviction: EvictionConfig {
                    clear_count: 2,
                    ..EvictionConfig::default()
                },
                ..PoolConfig::default()
            },
            ArenaConfig {
                min_block_size: 16,
                ..ArenaConfig::default()
            },
        );
        pool.give_back(RawArena::new(16).unwrap());
        pool.give_back(RawArena::new(4096).unwrap());
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.stats().sweeps, 1);
        assert_eq!(pool.capacities().count(), 0);
    }

    #[test]
    fn warm_preallocates_blocks() {
        let pool = small_blocks(false);
        assert_eq!(pool.warm(256, 3).unwrap(), 3);
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.capacities().total(), 768);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "invalid arena config")]
    fn bad_alignment_rejected_in_debug_builds() {
        let _pool = MemoryBlockPool::with_config(
            PoolConfig::default(),
            ArenaConfig {
                alignment: 24,
                ..ArenaConfig::default()
            },
        );
    }
}
