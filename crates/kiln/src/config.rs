//! Application configuration from CLI flags, environment, and an optional
//! JSON workload file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use kiln_memory::{ArenaConfig, PoolConfig};

use crate::errors::KilnError;

/// Smallest arena request the workload issues.
pub const MIN_ARENA_REQUEST: usize = 64;

/// kiln — exercise resource pools and arenas under a concurrent workload.
#[derive(Parser, Debug, Default)]
#[command(name = "kiln", version, about)]
pub struct AppConfig {
    /// Worker threads (0 = one per core).
    #[arg(short, long, env = "KILN_THREADS")]
    pub threads: Option<usize>,

    /// Number of rent/return rounds to run.
    #[arg(short = 'n', long, env = "KILN_ITERATIONS")]
    pub iterations: Option<u64>,

    /// Idle candidates examined per rent before allocating.
    #[arg(long, env = "KILN_TOLERANCE")]
    pub tolerance: Option<usize>,

    /// Idle items tolerated before the eviction heuristic is consulted.
    #[arg(long, env = "KILN_CLEAR_COUNT")]
    pub clear_count: Option<usize>,

    /// Sweep once idle sizes' variance / mean² exceeds this.
    #[arg(long, env = "KILN_VARIANCE_THRESHOLD")]
    pub variance_threshold: Option<f64>,

    /// Largest arena request (e.g. "4096", "64K", "1M").
    #[arg(long, env = "KILN_ARENA_CAPACITY")]
    pub arena_capacity: Option<String>,

    /// Largest array length requested.
    #[arg(long, env = "KILN_MAX_LEN")]
    pub max_len: Option<usize>,

    /// Seed for the request-size generator.
    #[arg(long, env = "KILN_SEED")]
    pub seed: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// JSON workload file; flags given on the command line override it.
    #[arg(short, long, env = "KILN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging).
    #[arg(short, long)]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Resolve the workload: defaults, then the `--config` file, then flags.
    pub fn workload(&self) -> Result<WorkloadConfig> {
        let mut workload = match &self.config {
            Some(path) => WorkloadConfig::load(path)?,
            None => WorkloadConfig::default(),
        };

        if let Some(threads) = self.threads {
            workload.threads = threads;
        }
        if let Some(iterations) = self.iterations {
            workload.iterations = iterations;
        }
        if let Some(tolerance) = self.tolerance {
            workload.pool.tolerance = tolerance;
        }
        if let Some(clear_count) = self.clear_count {
            workload.pool.eviction.clear_count = clear_count;
        }
        if let Some(threshold) = self.variance_threshold {
            workload.pool.eviction.variance_threshold = threshold;
        }
        if let Some(capacity) = &self.arena_capacity {
            workload.arena_capacity = parse_size(capacity).map_err(KilnError::Config)?;
        }
        if let Some(max_len) = self.max_len {
            workload.max_len = max_len;
        }
        if let Some(seed) = self.seed {
            workload.seed = seed;
        }

        workload.validate()?;
        Ok(workload)
    }
}

/// Everything the workload driver needs. Deserializes with per-field
/// defaults, so a file may set only what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Worker threads (0 = one per core).
    pub threads: usize,
    /// Number of rent/return rounds.
    pub iterations: u64,
    /// Seed for request sizes.
    pub seed: u64,
    /// Largest array length requested.
    pub max_len: usize,
    /// Largest arena request in bytes.
    pub arena_capacity: usize,
    /// Settings shared by both pools.
    pub pool: PoolConfig,
    /// Settings for arenas created by the block pool.
    pub arena: ArenaConfig,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            iterations: 10_000,
            seed: 42,
            max_len: 4096,
            arena_capacity: 64 * 1024,
            pool: PoolConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

impl WorkloadConfig {
    /// Read a workload file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading workload file {}", path.display()))?;
        let workload = serde_json::from_str(&content)
            .map_err(|e| KilnError::Config(format!("{}: {e}", path.display())))?;
        Ok(workload)
    }

    /// Reject values the driver cannot run with.
    pub fn validate(&self) -> Result<(), KilnError> {
        if self.max_len == 0 {
            return Err(KilnError::Config("max_len must be at least 1".into()));
        }
        if self.arena_capacity < MIN_ARENA_REQUEST {
            return Err(KilnError::Config(format!(
                "arena_capacity must be at least {MIN_ARENA_REQUEST} bytes, got {}",
                self.arena_capacity
            )));
        }
        self.pool.validate()?;
        self.arena.validate()?;
        Ok(())
    }
}

/// Parse a byte size like "4096", "64K", "1M", or "2G".
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, multiplier) = if let Some(n) = s.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s, 1)
    };

    let value: usize = digits
        .trim()
        .parse()
        .map_err(|e| format!("invalid size {s:?}: {e}"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size {s:?} overflows"))
}
