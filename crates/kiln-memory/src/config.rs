//! Pool and arena tuning parameters.
//!
//! Everything here is a plain value; nothing is read from files or the
//! environment by this crate. All structs deserialize with per-field defaults
//! so partial JSON works.

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Default retry budget for a pool lookup.
pub const DEFAULT_TOLERANCE: usize = 4;

/// Default number of idle items below which the eviction heuristic stays quiet.
pub const DEFAULT_CLEAR_COUNT: usize = 8;

/// Default heterogeneity limit (squared coefficient of variation of idle sizes).
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 0.5;

/// Default limit on the summed size of idle items (elements or bytes).
pub const DEFAULT_MAX_POOLED: usize = 64 * 1024 * 1024;

/// Default smallest arena handed out by a block pool.
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 4096;

/// When a size-tracking assistant declares its pool wasteful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Idle items tolerated before the heuristic is consulted at all.
    pub clear_count: usize,
    /// Sweep once the idle sizes' variance / mean² exceeds this.
    pub variance_threshold: f64,
    /// Sweep once the idle sizes sum past this.
    pub max_pooled: usize,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            clear_count: DEFAULT_CLEAR_COUNT,
            variance_threshold: DEFAULT_VARIANCE_THRESHOLD,
            max_pooled: DEFAULT_MAX_POOLED,
        }
    }
}

impl EvictionConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if !self.variance_threshold.is_finite() || self.variance_threshold < 0.0 {
            return Err(MemoryError::InvalidConfig(format!(
                "variance_threshold must be a non-negative number, got {}",
                self.variance_threshold
            )));
        }
        if self.max_pooled == 0 {
            return Err(MemoryError::InvalidConfig(
                "max_pooled must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Lookup and eviction settings for a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Candidates examined per lookup before falling back to creation.
    pub tolerance: usize,
    /// Eviction heuristic for size-tracking assistants.
    pub eviction: EvictionConfig,
    /// Reset item contents to their default when returned.
    pub recycle_contents: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            eviction: EvictionConfig::default(),
            recycle_contents: false,
        }
    }
}

impl PoolConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.tolerance == 0 {
            return Err(MemoryError::InvalidConfig(
                "tolerance must be at least 1".into(),
            ));
        }
        self.eviction.validate()
    }
}

/// Settings for arenas created by a block pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Requests smaller than this still get an arena of this size.
    pub min_block_size: usize,
    /// Base alignment of every arena.
    pub alignment: usize,
    /// Zero an arena's bytes when it comes back to the pool.
    pub zero_on_return: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min_block_size: DEFAULT_MIN_BLOCK_SIZE,
            alignment: crate::raw::DEFAULT_ALIGN,
            zero_on_return: false,
        }
    }
}

impl ArenaConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.min_block_size == 0 {
            return Err(MemoryError::InvalidConfig(
                "min_block_size must be greater than zero".into(),
            ));
        }
        if !self.alignment.is_power_of_two() {
            return Err(MemoryError::InvalidConfig(format!(
                "alignment must be a power of two, got {}",
                self.alignment
            )));
        }
        Ok(())
    }
}
