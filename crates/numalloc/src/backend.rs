//! Platform allocator backends.
//!
//! The façade never hands a zero-sized layout to a backend; zero-length
//! regions are represented by a dangling pointer and never reach here.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::BackendKind;

/// Raw byte allocator underneath the façade.
///
/// # Safety
///
/// Implementors must behave like [`GlobalAlloc`]: non-null results are valid
/// for `layout.size()` bytes at `layout.align()`, `realloc` preserves the
/// common prefix and leaves the old block untouched when it returns null, and
/// `dealloc` accepts any pointer this backend produced together with the
/// layout it currently has.
///
/// `alloc_zeroed` is a hint: the façade zero-fills every handed-out element
/// itself and never reads backend bytes it did not write.
pub unsafe trait RawAllocator {
    /// # Safety
    /// `layout.size()` must be nonzero.
    unsafe fn alloc(&self, layout: Layout) -> *mut u8;

    /// # Safety
    /// `layout.size()` must be nonzero.
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8;

    /// # Safety
    /// `ptr` must be live from this backend with `layout`; `new_size` must be
    /// nonzero and not overflow `isize` when rounded to `layout.align()`.
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8;

    /// # Safety
    /// `ptr` must be live from this backend with `layout`.
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout);

    fn kind(&self) -> BackendKind;
}

/// Rust's system allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SystemBackend;

// SAFETY: forwards to `System`, which upholds the `GlobalAlloc` contract.
unsafe impl RawAllocator for SystemBackend {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller guarantees a nonzero layout.
        unsafe { System.alloc(layout) }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller guarantees a nonzero layout.
        unsafe { System.alloc_zeroed(layout) }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: caller guarantees `ptr`/`layout` came from us and `new_size` is valid.
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: caller guarantees `ptr`/`layout` came from us.
        unsafe { System.dealloc(ptr, layout) }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::System
    }
}

/// Weakest alignment guaranteed by the C allocator (`alignof(max_align_t)`).
const LIBC_MIN_ALIGN: usize = 2 * size_of::<usize>();

/// The C library's `malloc` family.
///
/// Requests whose alignment exceeds what `malloc` guarantees are refused
/// (null), which the façade reports as out-of-memory. No element type gets there.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LibcBackend;

// SAFETY: `malloc`/`calloc`/`realloc` return blocks aligned to `LIBC_MIN_ALIGN`;
// larger alignments are refused. `realloc` keeps the old block on failure.
unsafe impl RawAllocator for LibcBackend {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > LIBC_MIN_ALIGN {
            return std::ptr::null_mut();
        }
        // SAFETY: plain C allocation of a nonzero size.
        unsafe { libc::malloc(layout.size()) }.cast::<u8>()
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > LIBC_MIN_ALIGN {
            return std::ptr::null_mut();
        }
        // SAFETY: plain C allocation of a nonzero size.
        unsafe { libc::calloc(1, layout.size()) }.cast::<u8>()
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: `ptr` came from this backend's malloc/calloc/realloc.
        unsafe { libc::realloc(ptr.cast(), new_size) }.cast::<u8>()
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        // SAFETY: `ptr` came from this backend and is freed once.
        unsafe { libc::free(ptr.cast()) }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Libc
    }
}

/// Backend that grants a fixed number of requests, then returns null.
///
/// Granted requests are served by [`SystemBackend`]. Clones share the budget.
#[derive(Debug, Clone)]
pub struct FailingBackend {
    remaining: Arc<AtomicUsize>,
}

impl FailingBackend {
    /// Refuse every request.
    #[must_use]
    pub fn always() -> Self {
        Self::after(0)
    }

    /// Grant `grants` requests (alloc, alloc_zeroed or realloc), then refuse.
    #[must_use]
    pub fn after(grants: usize) -> Self {
        Self {
            remaining: Arc::new(AtomicUsize::new(grants)),
        }
    }

    /// Requests still to be granted.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Relaxed)
    }

    fn take_grant(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for FailingBackend {
    fn default() -> Self {
        Self::always()
    }
}

// SAFETY: granted requests forward to `SystemBackend`; refusals return null
// without touching existing blocks.
unsafe impl RawAllocator for FailingBackend {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if !self.take_grant() {
            return std::ptr::null_mut();
        }
        // SAFETY: forwarded under the caller's contract.
        unsafe { SystemBackend.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if !self.take_grant() {
            return std::ptr::null_mut();
        }
        // SAFETY: forwarded under the caller's contract.
        unsafe { SystemBackend.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if !self.take_grant() {
            return std::ptr::null_mut();
        }
        // SAFETY: forwarded under the caller's contract.
        unsafe { SystemBackend.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: every live block came from `SystemBackend`.
        unsafe { SystemBackend.dealloc(ptr, layout) }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Failing
    }
}

/// Backend selected by the `libc-backend` feature.
#[cfg(feature = "libc-backend")]
pub type DefaultBackend = LibcBackend;

/// Backend selected by the `libc-backend` feature.
#[cfg(not(feature = "libc-backend"))]
pub type DefaultBackend = SystemBackend;
