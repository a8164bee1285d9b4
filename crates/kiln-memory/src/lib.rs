//! # kiln-memory
//!
//! Resource pooling and arena memory for the `kiln` workspace.
//!
//! * [`RawArena`]: bump-pointer arena over one native buffer, reclaimed
//!   wholesale by [`RawArena::reset`].
//! * [`TypedView`]: bounds-checked view of `Pod` values over an arena region,
//!   with an optional reader-writer lock chosen at the type level.
//! * [`ResourcePool`]: generic cache of reusable items driven by an
//!   [`Assistant`], handing out RAII [`PoolHandle`]s.
//! * [`ArrayPool`] and [`MemoryBlockPool`]: size-tolerant pools of boxed
//!   slices and arenas that sweep themselves when their idle sizes grow too
//!   varied.
//!
//! ```
//! use kiln_memory::{ArrayPool, MemoryBlockPool, Unsynchronized};
//!
//! let arrays: ArrayPool<f32> = ArrayPool::new();
//! let mut samples = arrays.rent(256).unwrap();
//! samples[0] = 1.0;
//! drop(samples); // back in the pool
//!
//! let blocks = MemoryBlockPool::new();
//! let block = blocks.rent(1024).unwrap();
//! let mut ids = block.alloc_view::<u32, _>(8, Unsynchronized).unwrap();
//! ids.set(3, 42);
//! assert_eq!(ids.get(3), 42);
//! ```
#![warn(missing_docs)]

pub mod arena;
pub mod array_pool;
pub mod assistant;
pub mod block_pool;
pub mod config;
pub mod error;
pub mod handle;
pub mod pool;
pub mod raw;
pub mod running;
pub mod stats;
pub mod view;

pub use arena::{RawArena, Region};
pub use array_pool::{ArrayAssistant, ArrayHandle, ArrayPool, ArraySpecs};
pub use assistant::{fits_with_slack, Assistant, CountingAssistant};
pub use block_pool::{BlockHandle, BlockSpecs, MemoryBlockAssistant, MemoryBlockPool};
pub use config::{ArenaConfig, EvictionConfig, PoolConfig};
pub use error::MemoryError;
pub use handle::{PoolHandle, Retention};
pub use pool::ResourcePool;
pub use running::RunningStats;
pub use stats::{AtomicPoolStats, PoolStats};
pub use view::{Access, ReadOnlyView, ReadWrite, TypedView, Unsynchronized};
