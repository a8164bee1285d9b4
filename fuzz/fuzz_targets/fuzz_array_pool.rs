#![no_main]

use libfuzzer_sys::fuzz_target;

use kiln_memory::{ArrayHandle, ArrayPool, EvictionConfig, PoolConfig};

fuzz_target!(|data: &[u8]| {
    let pool: ArrayPool<u8> = ArrayPool::with_config(PoolConfig {
        tolerance: 3,
        eviction: EvictionConfig {
            clear_count: 4,
            variance_threshold: 0.5,
            max_pooled: 1024,
        },
        recycle_contents: true,
    });
    let mut live: Vec<ArrayHandle<u8>> = Vec::new();

    for &byte in data {
        let len = usize::from(byte >> 2);
        match byte & 3 {
            0 | 1 => {
                let handle = pool.rent(len).unwrap();
                assert!(handle.len() >= len);
                live.push(handle);
            }
            2 => {
                if !live.is_empty() {
                    live.swap_remove(usize::from(byte) % live.len());
                }
            }
            _ => pool.give_back(vec![byte; len].into_boxed_slice()),
        }
        assert_eq!(pool.inner().outstanding(), live.len());
        assert_eq!(pool.lengths().count() as usize, pool.idle_count());
    }
});
