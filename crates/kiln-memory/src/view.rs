//! Typed, bounds-checked windows over arena memory.
//!
//! A [`TypedView`] does not own its bytes; the [`RawArena`](crate::arena::RawArena)
//! it was carved from does, and the view's lifetime is tied to that arena
//! borrow. Synchronization is chosen at the type level:
//!
//! - [`ReadWrite`]: every read takes a shared lock and every write an exclusive
//!   one, so the view can be used from many threads through `&`.
//! - [`Unsynchronized`]: no lock at all. Writes need `&mut self`; the borrow
//!   checker is the synchronization.
//!
//! Views never copy: a [`ReadOnlyView`] reads the same storage as the view it
//! came from, and sees every write made through it.

#![allow(unsafe_code)]

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::RwLock;

use crate::arena::Region;
use crate::raw;

mod sealed {
    pub trait Sealed {}
}

/// Synchronization mode of a view.
pub trait Access: sealed::Sealed + Clone {
    #[doc(hidden)]
    fn with_read<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// No locking. Mutation requires exclusive access to the view.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsynchronized;

impl sealed::Sealed for Unsynchronized {}

impl Access for Unsynchronized {
    #[inline]
    fn with_read<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }
}

/// Reader/writer lock shared by a view and its aliases.
#[derive(Debug, Clone, Default)]
pub struct ReadWrite {
    lock: Arc<RwLock<()>>,
}

impl ReadWrite {
    /// A fresh lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard a view with an existing lock, e.g. one shared by several views.
    #[must_use]
    pub fn from_lock(lock: Arc<RwLock<()>>) -> Self {
        Self { lock }
    }

    /// The underlying lock.
    #[must_use]
    pub fn lock(&self) -> &Arc<RwLock<()>> {
        &self.lock
    }

    #[inline]
    fn with_write<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.write();
        f()
    }
}

impl sealed::Sealed for ReadWrite {}

impl Access for ReadWrite {
    #[inline]
    fn with_read<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.read();
        f()
    }
}

#[inline]
#[track_caller]
fn check_index(index: usize, len: usize) {
    assert!(
        index < len,
        "index out of range: the len is {len} but the index is {index}"
    );
}

/// A typed window of `len` values of `T` over arena memory.
pub struct TypedView<'a, T: Pod, A: Access = ReadWrite> {
    ptr: NonNull<T>,
    len: usize,
    access: A,
    _arena: PhantomData<&'a mut [T]>,
}

// SAFETY: the view is the only writable handle onto its elements; moving it
// moves that exclusivity.
unsafe impl<T: Pod + Send, A: Access + Send> Send for TypedView<'_, T, A> {}
// SAFETY: through `&`, an `Unsynchronized` view only reads, and a `ReadWrite`
// view takes its lock around every access.
unsafe impl<T: Pod + Sync, A: Access + Sync> Sync for TypedView<'_, T, A> {}

impl<'a, T: Pod, A: Access> TypedView<'a, T, A> {
    /// Wrap a whole region, using as many elements as fit.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or the region is misaligned for `T`.
    pub fn from_region(region: Region<'a>, access: A) -> Self {
        let count = region.len() / Self::elem_size();
        Self::from_region_with_len(region, count, access)
    }

    /// Wrap the first `count` elements of a region.
    ///
    /// # Panics
    ///
    /// Panics if `count * size_of::<T>()` exceeds the region, if `T` is
    /// zero-sized, or if the region is misaligned for `T`.
    pub fn from_region_with_len(region: Region<'a>, count: usize, access: A) -> Self {
        let size = Self::elem_size();
        assert!(
            count.checked_mul(size).is_some_and(|bytes| bytes <= region.len()),
            "{count} elements of {size} bytes do not fit in a region of {} bytes",
            region.len()
        );
        let ptr = region.as_ptr();
        assert!(
            raw::is_aligned(ptr.as_ptr() as usize, std::mem::align_of::<T>()),
            "region at offset {} is misaligned for the element type",
            region.offset()
        );
        Self {
            ptr: ptr.cast::<T>(),
            len: count,
            access,
            _arena: PhantomData,
        }
    }

    /// Build a view from a raw address.
    ///
    /// # Safety
    ///
    /// `ptr` must be aligned and valid for reads and writes of `len` values of
    /// `T` for `'a`, every byte must be initialized, and no other live view or
    /// region may overlap the range.
    pub unsafe fn from_raw_parts(ptr: NonNull<T>, len: usize, access: A) -> Self {
        Self {
            ptr,
            len,
            access,
            _arena: PhantomData,
        }
    }

    fn elem_size() -> usize {
        let size = std::mem::size_of::<T>();
        assert!(size > 0, "typed views require a non-zero-sized element type");
        size
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the view in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// The synchronization mode.
    pub fn access(&self) -> &A {
        &self.access
    }

    /// Read element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[track_caller]
    pub fn get(&self, index: usize) -> T {
        check_index(index, self.len);
        // SAFETY: in bounds; reads are guarded by the access mode.
        self.access
            .with_read(|| unsafe { raw::read_pod(self.ptr.as_ptr().add(index)) })
    }

    /// Run `f` over the elements as a slice, under the read lock if any.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.access.with_read(|| f(self.raw_slice()))
    }

    /// Copy the elements out.
    pub fn to_vec(&self) -> Vec<T> {
        self.with_slice(<[T]>::to_vec)
    }

    /// Copy the elements out as bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.with_slice(|s| bytemuck::cast_slice::<T, u8>(s).to_vec())
    }

    /// A read-only alias onto the same storage.
    pub fn read_only(&self) -> ReadOnlyView<'_, T, A> {
        ReadOnlyView {
            ptr: self.ptr,
            len: self.len,
            access: self.access.clone(),
            _view: PhantomData,
        }
    }

    fn raw_slice(&self) -> &[T] {
        // SAFETY: in bounds and initialized; callers hold the read side.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[allow(clippy::mut_from_ref)]
    fn raw_slice_mut(&self) -> &mut [T] {
        // SAFETY: callers hold `&mut self` or the write lock.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    fn write_unchecked(&self, index: usize, value: T) {
        // SAFETY: callers check bounds and hold `&mut self` or the write lock.
        unsafe { raw::write_pod(self.ptr.as_ptr().add(index), value) };
    }

    fn copy_bytes_unchecked(&self, bytes: &[u8]) {
        assert!(
            bytes.len() <= self.byte_len(),
            "copy of {} bytes into a view of {} bytes",
            bytes.len(),
            self.byte_len()
        );
        // SAFETY: destination is in bounds; `bytes` is a distinct borrow and
        // any byte pattern is a valid `T`.
        unsafe { raw::copy_bytes(bytes.as_ptr(), self.ptr.as_ptr().cast::<u8>(), bytes.len()) };
    }
}

impl<T: Pod> TypedView<'_, T, Unsynchronized> {
    /// Write element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[track_caller]
    pub fn set(&mut self, index: usize, value: T) {
        check_index(index, self.len);
        self.write_unchecked(index, value);
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        self.raw_slice()
    }

    /// The elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.raw_slice_mut()
    }

    /// Copy `src` into the start of the view.
    ///
    /// # Panics
    ///
    /// Panics if `src` is longer than the view.
    pub fn copy_from_slice(&mut self, src: &[T]) {
        self.as_mut_slice()[..src.len()].copy_from_slice(src);
    }

    /// Copy raw bytes into the start of the view.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than the view.
    pub fn copy_from_bytes(&mut self, bytes: &[u8]) {
        self.copy_bytes_unchecked(bytes);
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }
}

impl<T: Pod> TypedView<'_, T, ReadWrite> {
    /// Write element `index` under the write lock.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[track_caller]
    pub fn set(&self, index: usize, value: T) {
        check_index(index, self.len);
        self.access.with_write(|| self.write_unchecked(index, value));
    }

    /// Run `f` over the elements as a mutable slice, under the write lock.
    pub fn with_slice_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        self.access.with_write(|| f(self.raw_slice_mut()))
    }

    /// Copy `src` into the start of the view.
    ///
    /// # Panics
    ///
    /// Panics if `src` is longer than the view.
    pub fn copy_from_slice(&self, src: &[T]) {
        self.with_slice_mut(|dst| dst[..src.len()].copy_from_slice(src));
    }

    /// Copy raw bytes into the start of the view.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than the view.
    pub fn copy_from_bytes(&self, bytes: &[u8]) {
        self.access.with_write(|| self.copy_bytes_unchecked(bytes));
    }

    /// Set every element to `value`.
    pub fn fill(&self, value: T) {
        self.with_slice_mut(|dst| dst.fill(value));
    }
}

impl<T: Pod + std::fmt::Debug, A: Access> std::fmt::Debug for TypedView<'_, T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedView")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Read-only alias of a [`TypedView`].
///
/// Shares storage and lock with its source; there is no copy-on-write.
pub struct ReadOnlyView<'v, T: Pod, A: Access> {
    ptr: NonNull<T>,
    len: usize,
    access: A,
    _view: PhantomData<&'v [T]>,
}

// SAFETY: read-only access to `T: Sync` data, guarded like the source view.
unsafe impl<T: Pod + Sync, A: Access + Send> Send for ReadOnlyView<'_, T, A> {}
// SAFETY: as above.
unsafe impl<T: Pod + Sync, A: Access + Sync> Sync for ReadOnlyView<'_, T, A> {}

impl<T: Pod, A: Access> ReadOnlyView<'_, T, A> {
    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[track_caller]
    pub fn get(&self, index: usize) -> T {
        check_index(index, self.len);
        // SAFETY: in bounds; reads are guarded by the access mode.
        self.access
            .with_read(|| unsafe { raw::read_pod(self.ptr.as_ptr().add(index)) })
    }

    /// Run `f` over the elements as a slice, under the read lock if any.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.access.with_read(|| {
            // SAFETY: in bounds and initialized; the read side is held.
            f(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) })
        })
    }

    /// Copy the elements out.
    pub fn to_vec(&self) -> Vec<T> {
        self.with_slice(<[T]>::to_vec)
    }
}
