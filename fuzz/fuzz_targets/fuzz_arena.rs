#![no_main]

use libfuzzer_sys::fuzz_target;

use kiln_memory::{RawArena, Unsynchronized};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    // First two bytes pick the capacity, capped at 64 KiB
    let capacity = usize::from(u16::from_le_bytes([data[0], data[1]])).max(1);
    let Ok(mut arena) = RawArena::new(capacity) else {
        return;
    };

    for chunk in data[2..].chunks(2) {
        let size = usize::from(chunk[0]) + 1;
        match chunk.get(1).copied().unwrap_or(0) % 4 {
            0 => {
                let before = arena.remaining_size();
                let fits = arena.try_alloc(size).is_some();
                assert_eq!(fits, size <= before);
            }
            1 => {
                let align = 1usize << (chunk[0] % 7);
                if let Some(region) = arena.try_alloc_aligned(size, align) {
                    assert_eq!(region.as_ptr().as_ptr() as usize % align, 0);
                }
            }
            2 => {
                if let Some(mut view) = arena.alloc_view::<u32, _>(size, Unsynchronized) {
                    view.fill(u32::from(chunk[0]));
                    assert_eq!(view.get(size - 1), u32::from(chunk[0]));
                }
            }
            _ => arena.reset(),
        }
        assert!(arena.used_size() <= arena.total_size());
    }
});
