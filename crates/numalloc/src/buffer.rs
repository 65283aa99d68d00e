//! Owning typed handles.
//!
//! A [`Buffer`] is either EMPTY or owns a contiguous region of `len`
//! elements. The four façade operations are methods on it; every `try_*`
//! method has a fail-fast twin that writes one diagnostic line and exits
//! with status 1 instead of returning an error.
//!
//! State machine:
//!
//! ```text
//! EMPTY    --allocate(n) / zero_allocate(n) / resize(n)--> OWNING(n)
//! OWNING(n) --resize(m)--> OWNING(m)
//! OWNING(n) --release--> EMPTY
//! EMPTY    --release--> EMPTY
//! ```
//!
//! Failed `try_*` calls leave the handle exactly as it was.

use std::fmt;
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::backend::{DefaultBackend, RawAllocator};
use crate::element::Element;
use crate::error::{AllocError, OrAbort};
use crate::facade::Facade;
use crate::sink::{DefaultSink, DiagnosticSink};
use crate::trace::TraceOp;

/// Observable state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    Empty,
    Owning { len: usize },
}

/// Owning handle to a typed region obtained through a [`Facade`].
///
/// Dropping an owning handle performs RELEASE (including its trace line).
pub struct Buffer<T: Element, A: RawAllocator = DefaultBackend, S: DiagnosticSink = DefaultSink> {
    region: Option<NonNull<T>>,
    len: usize,
    name: &'static str,
    facade: Facade<A, S>,
}

// SAFETY: the buffer uniquely owns its region, like `Vec<T>`.
unsafe impl<T: Element, A: RawAllocator + Send, S: DiagnosticSink + Send> Send
    for Buffer<T, A, S>
{
}

// SAFETY: shared access only hands out `&[T]`.
unsafe impl<T: Element, A: RawAllocator + Sync, S: DiagnosticSink + Sync> Sync
    for Buffer<T, A, S>
{
}

impl<T: Element> Buffer<T> {
    /// EMPTY handle on the compiled-in façade.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::with_facade(name, Facade::default())
    }
}

/// Write `T::ZERO` into `[from, to)`.
///
/// # Safety
///
/// `ptr` must be valid for writes of `to` elements.
unsafe fn fill_zero<T: Element>(ptr: NonNull<T>, from: usize, to: usize) {
    for i in from..to {
        // SAFETY: `i < to` and the caller guarantees `to` writable elements.
        unsafe { ptr.as_ptr().add(i).write(T::ZERO) };
    }
}

impl<T: Element, A: RawAllocator, S: DiagnosticSink> Buffer<T, A, S> {
    /// EMPTY handle bound to `facade`.
    #[must_use]
    pub fn with_facade(name: &'static str, facade: Facade<A, S>) -> Self {
        Self {
            region: None,
            len: 0,
            name,
            facade,
        }
    }

    /// Symbolic name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Element count; 0 for EMPTY handles.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for EMPTY handles and zero-length regions alike.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn state(&self) -> HandleState {
        match self.region {
            None => HandleState::Empty,
            Some(_) => HandleState::Owning { len: self.len },
        }
    }

    pub fn is_owning(&self) -> bool {
        self.region.is_some()
    }

    pub fn facade(&self) -> &Facade<A, S> {
        &self.facade
    }

    /// Base pointer of the region, or null when EMPTY.
    pub fn as_ptr(&self) -> *const T {
        self.region
            .map_or(std::ptr::null(), |ptr| ptr.as_ptr().cast_const())
    }

    pub fn as_slice(&self) -> &[T] {
        match self.region {
            // SAFETY: `ptr` is live (or dangling with len 0) and initialized.
            Some(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len) },
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.region {
            // SAFETY: `ptr` is live (or dangling with len 0), initialized and uniquely owned.
            Some(ptr) => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// Take ownership of `ptr`, returning any previous region to the backend.
    fn install(&mut self, ptr: NonNull<T>, len: usize) {
        if let Some(old) = self.region.take() {
            // SAFETY: `old` is the region this handle owned with `self.len` elements.
            unsafe { self.facade.give_back(old, self.len) };
        }
        self.region = Some(ptr);
        self.len = len;
    }

    /// ALLOCATE `count` elements.
    ///
    /// The region is zero-filled so it can be read safely; use
    /// [`allocate_uninit`](Self::allocate_uninit) to skip that. A previously
    /// owned region is released without a FREE trace line.
    pub fn try_allocate(&mut self, count: usize) -> Result<&mut [T], AllocError> {
        let ptr = self.facade.obtain::<T>(TraceOp::Malloc, self.name, count)?;
        // SAFETY: fresh region of `count` elements.
        unsafe { fill_zero(ptr, 0, count) };
        self.install(ptr, count);
        Ok(self.as_mut_slice())
    }

    /// Fail-fast [`try_allocate`](Self::try_allocate).
    pub fn allocate(&mut self, count: usize) -> &mut [T] {
        self.try_allocate(count).or_abort()
    }

    /// ALLOCATE `count` elements without initializing them.
    ///
    /// # Safety
    ///
    /// Every element of the returned slice must be written before the buffer
    /// is read through any other method (`as_slice`, `Deref`, `Debug`, ...).
    pub unsafe fn allocate_uninit(&mut self, count: usize) -> &mut [MaybeUninit<T>] {
        let ptr = self
            .facade
            .obtain::<T>(TraceOp::Malloc, self.name, count)
            .or_abort();
        self.install(ptr, count);
        // SAFETY: fresh region of `count` elements; `MaybeUninit` needs no init.
        unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr().cast::<MaybeUninit<T>>(), count) }
    }

    /// ZERO-ALLOCATE `count` elements; every element equals `T::ZERO`.
    ///
    /// Zeroing is done here even when the backend already returned zeroed memory.
    pub fn try_zero_allocate(&mut self, count: usize) -> Result<&mut [T], AllocError> {
        let ptr = self.facade.obtain::<T>(TraceOp::Calloc, self.name, count)?;
        // SAFETY: fresh region of `count` elements.
        unsafe { fill_zero(ptr, 0, count) };
        self.install(ptr, count);
        Ok(self.as_mut_slice())
    }

    /// Fail-fast [`try_zero_allocate`](Self::try_zero_allocate).
    pub fn zero_allocate(&mut self, count: usize) -> &mut [T] {
        self.try_zero_allocate(count).or_abort()
    }

    /// RESIZE to exactly `count` elements.
    ///
    /// The first `min(count, len)` elements are preserved; grown elements are
    /// zero-filled. The region may move. An EMPTY handle is allocated.
    pub fn try_resize(&mut self, count: usize) -> Result<&mut [T], AllocError> {
        match self.region {
            None => {
                let ptr = self.facade.obtain::<T>(TraceOp::Realloc, self.name, count)?;
                // SAFETY: fresh region of `count` elements.
                unsafe { fill_zero(ptr, 0, count) };
                self.install(ptr, count);
            }
            Some(old) => {
                let old_len = self.len;
                // SAFETY: `old` is this handle's live region of `old_len` elements.
                let ptr = unsafe { self.facade.reseat(self.name, old, old_len, count)? };
                if count > old_len {
                    // SAFETY: the new region holds `count` elements.
                    unsafe { fill_zero(ptr, old_len, count) };
                }
                self.region = Some(ptr);
                self.len = count;
            }
        }
        Ok(self.as_mut_slice())
    }

    /// Fail-fast [`try_resize`](Self::try_resize).
    pub fn resize(&mut self, count: usize) -> &mut [T] {
        self.try_resize(count).or_abort()
    }

    /// RELEASE the region, leaving the handle EMPTY.
    ///
    /// Releasing an EMPTY handle changes nothing. In tracing mode a FREE line
    /// is written on every call.
    pub fn release(&mut self) {
        let owned = self.region.take();
        self.facade
            .emit_release::<T>(self.name, owned.map(|_| self.len));
        if let Some(ptr) = owned {
            // SAFETY: `ptr` was this handle's live region of `self.len` elements.
            unsafe { self.facade.give_back(ptr, self.len) };
        }
        self.len = 0;
    }
}

impl<T: Element, A: RawAllocator, S: DiagnosticSink> Drop for Buffer<T, A, S> {
    fn drop(&mut self) {
        if self.region.is_some() {
            self.release();
        }
    }
}

impl<T: Element, A: RawAllocator, S: DiagnosticSink> Deref for Buffer<T, A, S> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Element, A: RawAllocator, S: DiagnosticSink> DerefMut for Buffer<T, A, S> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Element, A: RawAllocator, S: DiagnosticSink> fmt::Debug for Buffer<T, A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.name)
            .field("type", &T::TYPE_NAME)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::Layout;
    use std::sync::Arc;

    use super::*;
    use crate::backend::{FailingBackend, SystemBackend};
    use crate::config::{BackendKind, FacadeConfig};
    use crate::error::AllocErrorKind;
    use crate::sink::{RecordingSink, SilentSink};

    fn recording() -> (Facade<SystemBackend, Arc<RecordingSink>>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let facade = Facade::from_parts(SystemBackend, sink.clone(), FacadeConfig::new());
        (facade, sink)
    }

    const DIRT: u8 = 0xAB;

    /// Serves every request from `SystemBackend`, then scribbles over the
    /// bytes it did not carry over.
    #[derive(Debug, Clone, Copy)]
    struct DirtyBackend;

    // SAFETY: forwards to `SystemBackend`; only freshly obtained bytes are
    // overwritten, so the realloc prefix is kept.
    unsafe impl RawAllocator for DirtyBackend {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            // SAFETY: forwarded under the caller's contract; null is checked.
            unsafe {
                let ptr = SystemBackend.alloc(layout);
                if !ptr.is_null() {
                    ptr.write_bytes(DIRT, layout.size());
                }
                ptr
            }
        }

        unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
            // SAFETY: same contract as `alloc`.
            unsafe { self.alloc(layout) }
        }

        unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
            // SAFETY: forwarded under the caller's contract; only the grown
            // tail past the old size is written.
            unsafe {
                let grown = SystemBackend.realloc(ptr, layout, new_size);
                if !grown.is_null() && new_size > layout.size() {
                    grown
                        .add(layout.size())
                        .write_bytes(DIRT, new_size - layout.size());
                }
                grown
            }
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            // SAFETY: every live block came from `SystemBackend`.
            unsafe { SystemBackend.dealloc(ptr, layout) }
        }

        fn kind(&self) -> BackendKind {
            BackendKind::System
        }
    }

    fn dirty() -> Facade<DirtyBackend, SilentSink> {
        Facade::from_parts(DirtyBackend, SilentSink, FacadeConfig::new())
    }

    #[test]
    fn zero_allocate_zeroes_over_dirty_backend() {
        let facade = dirty();
        let mut x: Buffer<f64, _, _> = facade.buffer("x");
        assert_eq!(x.zero_allocate(8), &[0.0; 8]);
        let mut k: Buffer<u8, _, _> = facade.buffer("k");
        assert_eq!(k.zero_allocate(5), &[0u8; 5]);
    }

    #[test]
    fn allocate_zeroes_over_dirty_backend() {
        let facade = dirty();
        let mut v: Buffer<i64, _, _> = facade.buffer("v");
        assert_eq!(v.allocate(6), &[0i64; 6]);
    }

    #[test]
    fn grown_resize_tail_zeroed_over_dirty_backend() {
        let facade = dirty();
        let mut y: Buffer<f64, _, _> = facade.buffer("y");
        y.allocate(4).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        y.resize(8);
        assert_eq!(&y[..4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(&y[4..], &[0.0; 4]);

        let mut z: Buffer<i32, _, _> = facade.buffer("z");
        z.allocate(0);
        assert_eq!(z.resize(3), &[0, 0, 0]);

        let mut e: Buffer<i32, _, _> = facade.buffer("e");
        assert_eq!(e.resize(2), &[0, 0]);
    }

    #[test]
    fn zero_allocate_four_doubles() {
        let mut x = Buffer::<f64>::new("x");
        x.zero_allocate(4);
        assert_eq!(x.as_slice(), &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(x.state(), HandleState::Owning { len: 4 });
    }

    #[test]
    fn resize_preserves_prefix() {
        let mut y = Buffer::<i32>::new("y");
        y.allocate(3).copy_from_slice(&[7, 8, 9]);
        y.resize(5);
        assert_eq!(y.len(), 5);
        assert_eq!(&y[..3], &[7, 8, 9]);
    }

    #[test]
    fn shrink_to_zero_then_release() {
        let mut z = Buffer::<i32>::new("z");
        z.allocate(2);
        z.resize(0);
        assert_eq!(z.state(), HandleState::Owning { len: 0 });
        z.release();
        assert_eq!(z.state(), HandleState::Empty);
        assert!(z.as_ptr().is_null());
    }

    #[test]
    fn double_release_is_noop() {
        let mut h = Buffer::<u8>::new("h");
        h.zero_allocate(16);
        h.release();
        h.release();
        assert_eq!(h.state(), HandleState::Empty);
        assert!(h.is_empty());
    }

    #[test]
    fn resize_of_empty_handle_allocates_zeroed() {
        let mut r = Buffer::<u16>::new("r");
        r.resize(3);
        assert_eq!(r.as_slice(), &[0, 0, 0]);
    }

    #[test]
    fn allocate_over_owning_handle_replaces_region() {
        let (facade, sink) = recording();
        let mut a = facade.buffer::<i64>("a");
        a.allocate(2).copy_from_slice(&[1, 2]);
        a.allocate(3);
        assert_eq!(a.as_slice(), &[0, 0, 0]);
        let ops: Vec<TraceOp> = sink.events().iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![TraceOp::Malloc, TraceOp::Malloc]);
    }

    #[test]
    fn failed_resize_keeps_old_region() {
        let facade = Facade::from_parts(FailingBackend::after(1), SilentSink, FacadeConfig::new());
        let mut b = facade.buffer::<i32>("b");
        b.allocate(3).copy_from_slice(&[4, 5, 6]);
        let err = b.try_resize(1000).expect_err("backend exhausted");
        assert_eq!(err.kind(), AllocErrorKind::OomResize);
        assert_eq!(err.name(), "b");
        assert_eq!(b.as_slice(), &[4, 5, 6]);
    }

    #[test]
    fn failed_allocate_leaves_empty_handle_empty() {
        let facade = Facade::from_parts(FailingBackend::always(), SilentSink, FacadeConfig::new());
        let mut c = facade.buffer::<f32>("c");
        let err = c.try_zero_allocate(8).expect_err("refused");
        assert_eq!(err.kind(), AllocErrorKind::OomAlloc);
        assert_eq!(c.state(), HandleState::Empty);
    }

    #[test]
    fn overflowing_count_is_size_overflow() {
        let mut w = Buffer::<i32>::new("w");
        let err = w.try_allocate(usize::MAX).expect_err("overflow");
        assert_eq!(err.kind(), AllocErrorKind::SizeOverflow);
        let line = err.to_string();
        assert!(line.contains("w"), "{line}");
        assert!(line.contains(&usize::MAX.to_string()), "{line}");
        assert!(line.contains("int32"), "{line}");
    }

    #[test]
    fn drop_releases_owning_handle_once() {
        let (facade, sink) = recording();
        {
            let mut d = facade.buffer::<f64>("d");
            d.zero_allocate(2);
        }
        {
            let mut e = facade.buffer::<f64>("e");
            e.zero_allocate(2);
            e.release();
        }
        let ops: Vec<(TraceOp, &str)> = sink.events().iter().map(|e| (e.op, e.name)).collect();
        assert_eq!(
            ops,
            vec![
                (TraceOp::Calloc, "d"),
                (TraceOp::Free, "d"),
                (TraceOp::Calloc, "e"),
                (TraceOp::Free, "e"),
            ]
        );
    }

    #[test]
    fn uninit_allocation_can_be_fully_written() {
        let mut u = Buffer::<u32>::new("u");
        // SAFETY: every element is written before the buffer is read.
        unsafe {
            for (i, slot) in u.allocate_uninit(4).iter_mut().enumerate() {
                slot.write(i as u32 * 10);
            }
        }
        assert_eq!(u.as_slice(), &[0, 10, 20, 30]);
    }

    #[test]
    fn handles_move_between_owners() {
        let mut m = Buffer::<i8>::new("m");
        m.allocate(2).copy_from_slice(&[-1, 1]);
        let moved = m;
        assert_eq!(moved.as_slice(), &[-1, 1]);
    }

    #[test]
    fn debug_shows_name_type_and_state() {
        let mut v = Buffer::<f64>::new("v");
        v.zero_allocate(1);
        let text = format!("{v:?}");
        assert!(text.contains("\"v\""), "{text}");
        assert!(text.contains("float64"), "{text}");
        assert!(text.contains("Owning"), "{text}");
    }
}
