//! Low-level byte primitives shared by the arena and typed views.
//!
//! Every raw allocation and every piece of pointer arithmetic in the crate goes
//! through this module or through [`crate::view`]. Nothing else is allowed to
//! use `unsafe`.

#![allow(unsafe_code)]

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use bytemuck::Pod;

use crate::error::MemoryError;

/// Alignment used for arena buffers unless the caller asks for another one.
pub const DEFAULT_ALIGN: usize = 16;

/// Round `offset` up to the next multiple of `align`.
///
/// `align` must be a power of two. Returns `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(offset: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match offset.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Whether `addr` is a multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn is_aligned(addr: usize, align: usize) -> bool {
    addr & (align - 1) == 0
}

/// An owned, zero-initialized, aligned native buffer.
///
/// The bytes are zero-filled on allocation, so every byte is initialized for
/// the whole lifetime of the buffer and may be reinterpreted as any
/// [`Pod`] type.
pub struct RawBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the buffer is uniquely owned; no interior aliasing escapes except
// through borrows that carry their own lifetimes.
unsafe impl Send for RawBuffer {}
// SAFETY: shared access only hands out raw pointers; writes require `&mut`.
unsafe impl Sync for RawBuffer {}

impl RawBuffer {
    /// Allocate `size` zeroed bytes aligned to `align`.
    pub fn new(size: usize, align: usize) -> Result<Self, MemoryError> {
        if size == 0 {
            return Err(MemoryError::ZeroCapacity);
        }
        let layout = Layout::from_size_align(size, align)
            .map_err(|_| MemoryError::InvalidLayout { size, align })?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(MemoryError::Allocation { size, align })?;

        Ok(Self { ptr, layout })
    }

    /// Size of the buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Always `false`; zero-sized buffers cannot be created.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Alignment of the first byte.
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Base pointer of the buffer.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Set every byte to `byte`.
    pub fn fill(&mut self, byte: u8) {
        // SAFETY: the whole range belongs to this buffer and `&mut self`
        // excludes outstanding borrows.
        unsafe { fill_bytes(self.ptr.as_ptr(), byte, self.len()) };
    }

    /// View the whole buffer as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: initialized on allocation, lives as long as `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this layout in `new`.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl std::fmt::Debug for RawBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len())
            .field("align", &self.align())
            .finish()
    }
}

/// Copy `len` bytes from `src` to `dst`.
///
/// # Safety
///
/// Both ranges must be valid for `len` bytes and must not overlap.
#[inline]
pub(crate) unsafe fn copy_bytes(src: *const u8, dst: *mut u8, len: usize) {
    std::ptr::copy_nonoverlapping(src, dst, len);
}

/// Write `byte` over `len` bytes starting at `dst`.
///
/// # Safety
///
/// `dst` must be valid for writes of `len` bytes.
#[inline]
pub(crate) unsafe fn fill_bytes(dst: *mut u8, byte: u8, len: usize) {
    std::ptr::write_bytes(dst, byte, len);
}

/// Read one `T` from an aligned, initialized location.
///
/// # Safety
///
/// `src` must be aligned for `T` and valid for reads of `size_of::<T>()`.
#[inline]
pub(crate) unsafe fn read_pod<T: Pod>(src: *const T) -> T {
    std::ptr::read(src)
}

/// Write one `T` to an aligned location.
///
/// # Safety
///
/// `dst` must be aligned for `T` and valid for writes of `size_of::<T>()`.
#[inline]
pub(crate) unsafe fn write_pod<T: Pod>(dst: *mut T, value: T) {
    std::ptr::write(dst, value);
}
