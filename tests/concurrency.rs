//! Multi-threaded pool tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use kiln_memory::{ArrayPool, CountingAssistant, MemoryBlockPool, ReadWrite, ResourcePool};

const THREADS: usize = 8;
const ROUNDS: usize = 2_000;

/// Pooled item that records whether some handle currently owns it.
struct Token {
    checked_out: Arc<AtomicBool>,
}

#[test]
fn an_item_is_never_checked_out_twice() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let pool: ResourcePool<Token, (), CountingAssistant<Token, ()>> =
        ResourcePool::new(CountingAssistant::new(
            64,
            move |_: &()| {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(Token {
                    checked_out: Arc::new(AtomicBool::new(false)),
                })
            },
            |_: &Token, _: &()| true,
        ));

    thread::scope(|s| {
        for _ in 0..THREADS {
            let pool = pool.clone();
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    let token = pool.get(&(), 2).unwrap();
                    let was_out = token.checked_out.swap(true, Ordering::AcqRel);
                    assert!(!was_out, "item handed to two live handles");
                    thread::yield_now();
                    token.checked_out.store(false, Ordering::Release);
                }
            });
        }
    });

    let stats = pool.stats();
    assert_eq!(stats.hits + stats.misses, (THREADS * ROUNDS) as u64);
    assert_eq!(stats.created, created.load(Ordering::Relaxed) as u64);
    assert_eq!(pool.outstanding(), 0);
    assert!(pool.idle_count() <= created.load(Ordering::Relaxed));
}

#[test]
fn array_pool_under_contention() {
    let pool: ArrayPool<u32> = ArrayPool::new();

    thread::scope(|s| {
        for t in 0..THREADS {
            let pool = pool.clone();
            s.spawn(move || {
                for round in 0..ROUNDS {
                    let len = 16 + (t * 7 + round) % 48;
                    let mut array = pool.rent(len).unwrap();
                    assert!(array.len() >= len);
                    array[..len].fill(u32::try_from(t).unwrap());
                    assert!(array[..len].iter().all(|&v| v as usize == t));
                }
            });
        }
    });

    let stats = pool.stats();
    assert_eq!(stats.hits + stats.misses, (THREADS * ROUNDS) as u64);
    assert_eq!(stats.returns + stats.discards, (THREADS * ROUNDS) as u64);
    assert_eq!(pool.inner().outstanding(), 0);
}

#[test]
fn blocks_are_private_to_their_renter() {
    let pool = MemoryBlockPool::new();

    thread::scope(|s| {
        for t in 0..THREADS {
            let pool = pool.clone();
            s.spawn(move || {
                let marker = u64::try_from(t).unwrap();
                for _ in 0..ROUNDS / 10 {
                    let block = pool.rent(1024).unwrap();
                    assert_eq!(block.used_size(), 0);
                    let view = block.alloc_view::<u64, _>(128, ReadWrite::new()).unwrap();
                    view.fill(marker);
                    thread::yield_now();
                    assert!(view.to_vec().iter().all(|&v| v == marker));
                }
            });
        }
    });

    assert_eq!(pool.inner().outstanding(), 0);
}

#[test]
fn locked_view_is_shared_between_threads() {
    let pool = MemoryBlockPool::new();
    let block = pool.rent(8 * THREADS).unwrap();
    let view = block
        .alloc_view::<u64, _>(THREADS, ReadWrite::new())
        .unwrap();

    thread::scope(|s| {
        for t in 0..THREADS {
            let view = &view;
            s.spawn(move || {
                for _ in 0..100 {
                    view.set(t, view.get(t) + 1);
                }
            });
        }
    });

    assert_eq!(view.to_vec(), vec![100; THREADS]);
}
