//! Bump-pointer arena over one fixed-size native buffer.
//!
//! Allocation advances a single cursor; there is no per-allocation free. The
//! only reclamation is [`RawArena::reset`], which takes `&mut self` so every
//! [`Region`] and view carved from the arena is statically dead by the time the
//! cursor rewinds.

#![allow(unsafe_code)]

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::NonNull;

use bytemuck::Pod;

use crate::error::MemoryError;
use crate::raw::{self, RawBuffer, DEFAULT_ALIGN};
use crate::view::{Access, TypedView};

/// Fixed-capacity bump arena backed by native memory.
///
/// The cursor lives in a [`Cell`], so the arena is `Send` but not `Sync`:
/// sub-allocation is single-writer by construction. Regions handed out by
/// [`try_alloc`](Self::try_alloc) never overlap until the next `reset`.
pub struct RawArena {
    buffer: Option<RawBuffer>,
    used: Cell<usize>,
}

impl RawArena {
    /// Allocate an arena of `capacity` bytes with the default alignment.
    pub fn new(capacity: usize) -> Result<Self, MemoryError> {
        Self::with_alignment(capacity, DEFAULT_ALIGN)
    }

    /// Allocate an arena of `capacity` bytes whose base is aligned to `align`.
    pub fn with_alignment(capacity: usize, align: usize) -> Result<Self, MemoryError> {
        let buffer = RawBuffer::new(capacity, align)?;
        tracing::debug!(capacity, align, "arena allocated");
        Ok(Self {
            buffer: Some(buffer),
            used: Cell::new(0),
        })
    }

    /// Total capacity in bytes (0 once disposed).
    #[inline]
    pub fn total_size(&self) -> usize {
        self.buffer.as_ref().map_or(0, RawBuffer::len)
    }

    /// Bytes handed out since the last reset, including alignment padding.
    #[inline]
    pub fn used_size(&self) -> usize {
        self.used.get()
    }

    /// Bytes still available to [`try_alloc`](Self::try_alloc).
    #[inline]
    pub fn remaining_size(&self) -> usize {
        self.total_size() - self.used_size()
    }

    /// Alignment of the base address (0 once disposed).
    #[inline]
    pub fn alignment(&self) -> usize {
        self.buffer.as_ref().map_or(0, RawBuffer::align)
    }

    /// Whether [`dispose`](Self::dispose) has released the buffer.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.buffer.is_none()
    }

    fn live_buffer(&self) -> &RawBuffer {
        match &self.buffer {
            Some(buffer) => buffer,
            None => panic!("arena used after dispose"),
        }
    }

    /// Carve `size` bytes at the current cursor.
    ///
    /// Succeeds iff `size <= remaining_size()`; on success the cursor advances
    /// by exactly `size`. Running out of space is an expected condition and
    /// yields `None`.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or the arena has been disposed.
    pub fn try_alloc(&self, size: usize) -> Option<Region<'_>> {
        assert!(size > 0, "try_alloc: size must be greater than zero");
        let buffer = self.live_buffer();
        let offset = self.used.get();
        if size > buffer.len() - offset {
            return None;
        }
        self.used.set(offset + size);
        Some(Region::new(buffer, offset, size))
    }

    /// Carve `size` bytes whose address is a multiple of `align`.
    ///
    /// Padding skipped to reach the alignment counts as used.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero, `align` is not a power of two, or the arena
    /// has been disposed.
    pub fn try_alloc_aligned(&self, size: usize, align: usize) -> Option<Region<'_>> {
        assert!(size > 0, "try_alloc_aligned: size must be greater than zero");
        assert!(
            align.is_power_of_two(),
            "try_alloc_aligned: alignment {align} is not a power of two"
        );
        let buffer = self.live_buffer();
        let base = buffer.as_ptr().as_ptr() as usize;
        let cursor = base + self.used.get();
        let start = raw::align_up(cursor, align)? - base;
        let end = start.checked_add(size)?;
        if end > buffer.len() {
            return None;
        }
        self.used.set(end);
        Some(Region::new(buffer, start, size))
    }

    /// Carve room for `count` values of `T` and wrap it in a typed view.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero, `T` is zero-sized, or the arena has been
    /// disposed.
    pub fn alloc_view<T: Pod, A: Access>(
        &self,
        count: usize,
        access: A,
    ) -> Option<TypedView<'_, T, A>> {
        let bytes = count.checked_mul(std::mem::size_of::<T>())?;
        let region = self.try_alloc_aligned(bytes, std::mem::align_of::<T>())?;
        Some(TypedView::from_region(region, access))
    }

    /// Rewind the cursor to the start. Contents are left as they are.
    pub fn reset(&mut self) {
        tracing::trace!(used = self.used.get(), "arena reset");
        self.used.set(0);
    }

    /// Overwrite the whole buffer with zeroes.
    ///
    /// # Panics
    ///
    /// Panics if the arena has been disposed.
    pub fn zero(&mut self) {
        match &mut self.buffer {
            Some(buffer) => buffer.fill(0),
            None => panic!("arena used after dispose"),
        }
    }

    /// Release the native buffer. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            tracing::debug!(capacity = buffer.len(), "arena disposed");
            self.used.set(0);
            drop(buffer);
        }
    }
}

impl Drop for RawArena {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for RawArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawArena")
            .field("total_size", &self.total_size())
            .field("used_size", &self.used_size())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A byte range carved from a [`RawArena`].
///
/// Regions are exclusive: no two live regions of one arena overlap, so a
/// region may hand out `&mut [u8]` to its bytes. The lifetime ties it to the
/// arena borrow that produced it.
pub struct Region<'a> {
    ptr: NonNull<u8>,
    offset: usize,
    len: usize,
    _arena: PhantomData<&'a mut [u8]>,
}

// SAFETY: a region is the only handle onto its bytes.
unsafe impl Send for Region<'_> {}
// SAFETY: shared access is read-only.
unsafe impl Sync for Region<'_> {}

impl<'a> Region<'a> {
    fn new(buffer: &'a RawBuffer, offset: usize, len: usize) -> Self {
        // SAFETY: callers check `offset + len <= buffer.len()`.
        let ptr = unsafe { NonNull::new_unchecked(buffer.as_ptr().as_ptr().add(offset)) };
        Self {
            ptr,
            offset,
            len,
            _arena: PhantomData,
        }
    }

    /// Offset of the first byte from the arena base.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; empty regions cannot be allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of the first byte.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// The region's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: in bounds, initialized, not aliased mutably elsewhere.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The region's bytes, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: in bounds and exclusively owned by this region.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Copy `src` into the start of the region.
    ///
    /// # Panics
    ///
    /// Panics if `src` is longer than the region.
    pub fn copy_from_slice(&mut self, src: &[u8]) {
        assert!(
            src.len() <= self.len,
            "copy of {} bytes into a region of {} bytes",
            src.len(),
            self.len
        );
        // SAFETY: `src` is a distinct borrow; the destination range is in bounds.
        unsafe { raw::copy_bytes(src.as_ptr(), self.ptr.as_ptr(), src.len()) };
    }

    /// Set every byte of the region to `byte`.
    pub fn fill(&mut self, byte: u8) {
        // SAFETY: in bounds and exclusively owned by this region.
        unsafe { raw::fill_bytes(self.ptr.as_ptr(), byte, self.len) };
    }
}

impl std::fmt::Debug for Region<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Unsynchronized;
    use proptest::prelude::*;

    #[test]
    fn bump_then_exhaust_then_reset() {
        let mut arena = RawArena::new(100).unwrap();
        assert_eq!(arena.try_alloc(60).unwrap().offset(), 0);
        assert!(arena.try_alloc(50).is_none());
        assert_eq!(arena.remaining_size(), 40);
        arena.reset();
        assert_eq!(arena.try_alloc(50).unwrap().offset(), 0);
    }

    #[test]
    fn sizes_track_the_cursor() {
        let arena = RawArena::new(64).unwrap();
        assert_eq!(arena.total_size(), 64);
        assert_eq!(arena.used_size(), 0);
        let _a = arena.try_alloc(10).unwrap();
        let _b = arena.try_alloc(20).unwrap();
        assert_eq!(arena.used_size(), 30);
        assert_eq!(arena.remaining_size(), 34);
    }

    #[test]
    fn exact_fit_succeeds() {
        let arena = RawArena::new(32).unwrap();
        let region = arena.try_alloc(32).unwrap();
        assert_eq!(region.len(), 32);
        assert_eq!(arena.remaining_size(), 0);
        assert!(arena.try_alloc(1).is_none());
    }

    #[test]
    #[should_panic(expected = "size must be greater than zero")]
    fn zero_size_is_a_contract_violation() {
        let arena = RawArena::new(16).unwrap();
        let _ = arena.try_alloc(0);
    }

    #[test]
    fn zero_capacity_is_an_error() {
        assert_eq!(RawArena::new(0).unwrap_err(), MemoryError::ZeroCapacity);
    }

    #[test]
    fn regions_do_not_alias() {
        let arena = RawArena::new(16).unwrap();
        let mut a = arena.try_alloc(8).unwrap();
        let mut b = arena.try_alloc(8).unwrap();
        a.fill(0x11);
        b.fill(0x22);
        assert!(a.as_bytes().iter().all(|&x| x == 0x11));
        assert!(b.as_bytes().iter().all(|&x| x == 0x22));
    }

    #[test]
    fn reset_keeps_contents_and_zero_clears_them() {
        let mut arena = RawArena::new(8).unwrap();
        arena.try_alloc(8).unwrap().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        arena.reset();
        assert_eq!(arena.try_alloc(4).unwrap().as_bytes(), &[1, 2, 3, 4]);
        arena.reset();
        arena.zero();
        assert_eq!(arena.try_alloc(8).unwrap().as_bytes(), &[0; 8]);
    }

    #[test]
    fn aligned_allocation_pads_the_cursor() {
        let arena = RawArena::with_alignment(64, 16).unwrap();
        let _ = arena.try_alloc(3).unwrap();
        let region = arena.try_alloc_aligned(8, 8).unwrap();
        assert_eq!(region.offset(), 8);
        assert_eq!(arena.used_size(), 16);
        assert!(raw::is_aligned(region.as_ptr().as_ptr() as usize, 8));
    }

    #[test]
    fn aligned_allocation_respects_capacity() {
        let arena = RawArena::with_alignment(16, 16).unwrap();
        let _ = arena.try_alloc(9).unwrap();
        assert!(arena.try_alloc_aligned(8, 8).is_none());
        assert_eq!(arena.used_size(), 9);
    }

    #[test]
    fn alloc_view_fits_elements() {
        let arena = RawArena::new(64).unwrap();
        let view = arena.alloc_view::<u32, _>(16, Unsynchronized).unwrap();
        assert_eq!(view.len(), 16);
        assert!(arena.alloc_view::<u32, _>(1, Unsynchronized).is_none());
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut arena = RawArena::new(32).unwrap();
        arena.dispose();
        assert!(arena.is_disposed());
        assert_eq!(arena.total_size(), 0);
        arena.dispose();
        assert!(arena.is_disposed());
    }

    #[test]
    #[should_panic(expected = "arena used after dispose")]
    fn alloc_after_dispose_panics() {
        let mut arena = RawArena::new(32).unwrap();
        arena.dispose();
        let _ = arena.try_alloc(1);
    }

    proptest! {
        #[test]
        fn capacity_law(capacity in 1usize..4096, sizes in prop::collection::vec(1usize..512, 1..32)) {
            let arena = RawArena::new(capacity).unwrap();
            let mut last_end = 0;
            for size in sizes {
                let before = arena.remaining_size();
                match arena.try_alloc(size) {
                    Some(region) => {
                        prop_assert!(size <= before);
                        prop_assert_eq!(arena.remaining_size(), before - size);
                        prop_assert_eq!(region.offset(), last_end);
                        last_end = region.offset() + region.len();
                    }
                    None => {
                        prop_assert!(size > before);
                        prop_assert_eq!(arena.remaining_size(), before);
                    }
                }
            }
        }
    }
}
