//! Application entry point: run the pooled workload and report statistics.

use std::time::Instant;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use kiln_memory::{
    ArrayPool, MemoryBlockPool, MemoryError, PoolStats, ReadWrite, RunningStats,
};

use crate::config::{AppConfig, WorkloadConfig, MIN_ARENA_REQUEST};
use crate::errors::KilnError;
use crate::version::full_version;

/// Share of rounds whose array handle is marked long-lived.
const RETAIN_PROBABILITY: f64 = 0.05;

/// State of one pool after the workload.
#[derive(Debug, Clone, Serialize)]
pub struct PoolReport {
    /// Counters since the pool was created.
    pub stats: PoolStats,
    /// Items left idle.
    pub idle: usize,
    /// Sizes of the idle items (elements for arrays, bytes for blocks).
    pub idle_sizes: RunningStats,
    /// Bytes handed out beyond what matched requests needed (blocks only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wasted_bytes: Option<u64>,
}

/// Outcome of a workload run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    /// Rounds executed.
    pub iterations: u64,
    /// Worker threads used.
    pub threads: usize,
    /// Wall-clock time in milliseconds.
    pub elapsed_ms: f64,
    /// Wrapping sum of every round's checksum. Depends only on the seed and
    /// the request-size limits.
    pub checksum: u64,
    /// Array pool state.
    pub arrays: PoolReport,
    /// Block pool state.
    pub blocks: PoolReport,
}

/// Run the application.
pub fn run(config: &AppConfig) -> Result<()> {
    let workload = config.workload()?;
    tracing::debug!(version = %full_version(), ?workload, "starting workload");

    let report = run_workload(&workload)?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Drive both pools from a rayon thread pool for `workload.iterations`
/// rounds.
pub fn run_workload(workload: &WorkloadConfig) -> Result<WorkloadReport> {
    let arrays: ArrayPool<u64> = ArrayPool::with_config(workload.pool.clone());
    let blocks = MemoryBlockPool::with_config(workload.pool.clone(), workload.arena.clone());

    let threads = rayon::ThreadPoolBuilder::new()
        .num_threads(workload.threads)
        .build()?;

    let start = Instant::now();
    let checksum = threads.install(|| {
        (0..workload.iterations)
            .into_par_iter()
            .map(|round| run_round(round, workload, &arrays, &blocks))
            .try_reduce(|| 0, |a, b| Ok(a.wrapping_add(b)))
    })?;
    let elapsed = start.elapsed();

    tracing::debug!(
        rounds = workload.iterations,
        ?elapsed,
        array_hits = arrays.stats().hits,
        block_hits = blocks.stats().hits,
        "workload finished"
    );

    Ok(WorkloadReport {
        iterations: workload.iterations,
        threads: threads.current_num_threads(),
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        checksum,
        arrays: PoolReport {
            stats: arrays.stats(),
            idle: arrays.idle_count(),
            idle_sizes: arrays.lengths(),
            wasted_bytes: None,
        },
        blocks: PoolReport {
            stats: blocks.stats(),
            idle: blocks.idle_count(),
            idle_sizes: blocks.capacities(),
            wasted_bytes: Some(blocks.wasted_bytes()),
        },
    })
}

/// One round: rent an array and a block, stage the array's contents through
/// a locked view over the block, and verify what comes back.
fn run_round(
    round: u64,
    workload: &WorkloadConfig,
    arrays: &ArrayPool<u64>,
    blocks: &MemoryBlockPool,
) -> Result<u64, KilnError> {
    let mut rng = StdRng::seed_from_u64(workload.seed.wrapping_add(round));

    let len = rng.gen_range(1..=workload.max_len);
    let mut array = arrays.rent(len)?;
    for (i, slot) in array[..len].iter_mut().enumerate() {
        *slot = round.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ i as u64;
    }

    let size = rng.gen_range(MIN_ARENA_REQUEST..=workload.arena_capacity);
    let block = blocks.rent(size)?;
    let count = len.min(size / std::mem::size_of::<u64>());
    let view = block
        .alloc_view::<u64, _>(count, ReadWrite::new())
        .ok_or(MemoryError::Allocation {
            size: count * std::mem::size_of::<u64>(),
            align: std::mem::align_of::<u64>(),
        })?;

    view.copy_from_slice(&array[..count]);
    let expected = checksum(&array[..count]);
    let actual = view.read_only().with_slice(checksum);
    if actual != expected {
        return Err(KilnError::Mismatch {
            round,
            expected,
            actual,
        });
    }

    if rng.gen_bool(RETAIN_PROBABILITY) {
        array.retain();
    }
    Ok(expected)
}

fn checksum(values: &[u64]) -> u64 {
    values
        .iter()
        .fold(0u64, |acc, &v| acc.rotate_left(5).wrapping_add(v))
}

fn print_report(report: &WorkloadReport) {
    println!(
        "{}: {} rounds on {} threads in {:.3} ms (checksum {:#018x})",
        full_version(),
        report.iterations,
        report.threads,
        report.elapsed_ms,
        report.checksum
    );
    print_pool("arrays", &report.arrays);
    print_pool("blocks", &report.blocks);
}

fn print_pool(name: &str, pool: &PoolReport) {
    let s = &pool.stats;
    println!();
    println!("{name}:");
    println!(
        "  hits {:>8}  misses {:>8}  hit rate {:>5.1}%",
        s.hits,
        s.misses,
        s.hit_rate() * 100.0
    );
    println!(
        "  created {:>5}  returns {:>7}  rejections {:>5}  discards {}",
        s.created, s.returns, s.rejections, s.discards
    );
    println!("  sweeps {:>6}  evictions {:>5}", s.sweeps, s.evictions);
    println!(
        "  idle {:>8}  mean size {:.1}  relative variance {:.3}",
        pool.idle,
        pool.idle_sizes.mean(),
        pool.idle_sizes.relative_variance()
    );
    if let Some(wasted) = pool.wasted_bytes {
        println!("  wasted bytes {wasted}");
    }
}
