//! The typed allocation façade.
//!
//! A [`Facade`] bundles a backend, a diagnostic sink and the trace threshold.
//! It does the typed size arithmetic, emits trace records before touching
//! the backend, and turns null results into [`AllocError`]s. Handles
//! ([`Buffer`]) carry a copy of their façade so that RESIZE and RELEASE go
//! back to the allocator that produced the region.

use std::alloc::Layout;
use std::fmt;
use std::ptr::NonNull;

use crate::backend::{DefaultBackend, RawAllocator};
use crate::buffer::Buffer;
use crate::config::FacadeConfig;
use crate::element::Element;
use crate::error::{AllocError, OrAbort};
use crate::sink::{DefaultSink, DiagnosticSink};
use crate::trace::{TraceEvent, TraceOp};

#[derive(Clone, Default)]
pub struct Facade<A = DefaultBackend, S = DefaultSink> {
    backend: A,
    sink: S,
    config: FacadeConfig,
}

impl Facade {
    /// Façade with the compiled-in backend, sink and default threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<A: RawAllocator, S: DiagnosticSink> Facade<A, S> {
    #[must_use]
    pub fn from_parts(backend: A, sink: S, config: FacadeConfig) -> Self {
        Self {
            backend,
            sink,
            config,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.config = self.config.with_threshold(threshold);
        self
    }

    pub fn backend(&self) -> &A {
        &self.backend
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> FacadeConfig {
        self.config
    }

    /// An EMPTY handle bound to this façade.
    pub fn buffer<T: Element>(&self, name: &'static str) -> Buffer<T, A, S>
    where
        A: Clone,
        S: Clone,
    {
        Buffer::with_facade(name, self.clone())
    }

    /// ZERO-ALLOCATE into a fresh handle.
    pub fn try_zeroed<T: Element>(
        &self,
        name: &'static str,
        count: usize,
    ) -> Result<Buffer<T, A, S>, AllocError>
    where
        A: Clone,
        S: Clone,
    {
        let mut buffer = self.buffer(name);
        buffer.try_zero_allocate(count)?;
        Ok(buffer)
    }

    /// Fail-fast [`try_zeroed`](Self::try_zeroed).
    pub fn zeroed<T: Element>(&self, name: &'static str, count: usize) -> Buffer<T, A, S>
    where
        A: Clone,
        S: Clone,
    {
        self.try_zeroed(name, count).or_abort()
    }

    fn emit_sized<T: Element>(&self, op: TraceOp, name: &'static str, count: usize) {
        if !self.sink.is_enabled() {
            return;
        }
        if self
            .config
            .should_trace(count.saturating_mul(size_of::<T>()))
        {
            self.sink.trace(&TraceEvent::sized(
                op,
                name,
                count,
                size_of::<T>(),
                T::TYPE_NAME,
            ));
        }
    }

    pub(crate) fn emit_release<T: Element>(&self, name: &'static str, count: Option<usize>) {
        if self.sink.is_enabled() {
            self.sink.trace(&TraceEvent::release(name, count, T::TYPE_NAME));
        }
    }

    fn layout_for<T: Element>(
        op: TraceOp,
        name: &'static str,
        count: usize,
    ) -> Result<Layout, AllocError> {
        let overflow = || AllocError::SizeOverflow {
            op,
            name,
            count,
            elem_size: size_of::<T>(),
            type_name: T::TYPE_NAME,
        };
        let bytes = count.checked_mul(size_of::<T>()).ok_or_else(overflow)?;
        Layout::from_size_align(bytes, align_of::<T>()).map_err(|_| overflow())
    }

    fn refused(
        op: TraceOp,
        name: &'static str,
        count: usize,
        type_name: &'static str,
    ) -> AllocError {
        match op {
            TraceOp::Realloc => AllocError::ResizeOutOfMemory {
                op,
                name,
                count,
                type_name,
            },
            _ => AllocError::OutOfMemory {
                op,
                name,
                count,
                type_name,
            },
        }
    }

    /// Obtain a fresh region of `count` elements. Zero bytes yields a dangling pointer.
    ///
    /// `TraceOp::Calloc` asks the backend for zeroed memory; contents are
    /// otherwise uninitialized.
    pub(crate) fn obtain<T: Element>(
        &self,
        op: TraceOp,
        name: &'static str,
        count: usize,
    ) -> Result<NonNull<T>, AllocError> {
        self.emit_sized::<T>(op, name, count);
        let layout = Self::layout_for::<T>(op, name, count)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        // SAFETY: layout size is nonzero.
        let raw = unsafe {
            match op {
                TraceOp::Calloc => self.backend.alloc_zeroed(layout),
                _ => self.backend.alloc(layout),
            }
        };
        NonNull::new(raw.cast::<T>()).ok_or_else(|| Self::refused(op, name, count, T::TYPE_NAME))
    }

    /// Move the region at `ptr` from `old_len` to `new_len` elements.
    ///
    /// On error the old region is untouched and still owned by the caller.
    /// New tail elements are uninitialized.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live region of `old_len` elements produced by this
    /// façade's backend (or dangling when `old_len == 0`).
    pub(crate) unsafe fn reseat<T: Element>(
        &self,
        name: &'static str,
        ptr: NonNull<T>,
        old_len: usize,
        new_len: usize,
    ) -> Result<NonNull<T>, AllocError> {
        self.emit_sized::<T>(TraceOp::Realloc, name, new_len);
        let new_layout = Self::layout_for::<T>(TraceOp::Realloc, name, new_len)?;
        let old_layout = Self::layout_for::<T>(TraceOp::Realloc, name, old_len)?;
        let refused = || Self::refused(TraceOp::Realloc, name, new_len, T::TYPE_NAME);

        match (old_layout.size(), new_layout.size()) {
            (0, 0) => Ok(ptr),
            (0, _) => {
                // SAFETY: nonzero layout.
                let raw = unsafe { self.backend.alloc(new_layout) };
                NonNull::new(raw.cast::<T>()).ok_or_else(refused)
            }
            (_, 0) => {
                // SAFETY: caller guarantees `ptr` is live with `old_layout`.
                unsafe { self.backend.dealloc(ptr.as_ptr().cast::<u8>(), old_layout) };
                Ok(NonNull::dangling())
            }
            (_, new_size) => {
                // SAFETY: caller guarantees `ptr` is live with `old_layout`;
                // `new_layout` validated `new_size` against `isize::MAX`.
                let raw = unsafe {
                    self.backend
                        .realloc(ptr.as_ptr().cast::<u8>(), old_layout, new_size)
                };
                NonNull::new(raw.cast::<T>()).ok_or_else(refused)
            }
        }
    }

    /// Return a region to the backend.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live region of `len` elements produced by this façade's
    /// backend (or dangling when `len == 0`). It must not be used afterwards.
    pub(crate) unsafe fn give_back<T: Element>(&self, ptr: NonNull<T>, len: usize) {
        let bytes = len * size_of::<T>();
        if bytes == 0 {
            return;
        }
        // SAFETY: this exact layout was validated when the region was obtained.
        unsafe {
            let layout = Layout::from_size_align_unchecked(bytes, align_of::<T>());
            self.backend.dealloc(ptr.as_ptr().cast::<u8>(), layout);
        }
    }
}

impl<A: RawAllocator, S: DiagnosticSink> fmt::Debug for Facade<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("backend", &self.backend.kind())
            .field("tracing", &self.sink.is_enabled())
            .field("threshold", &self.config.threshold)
            .finish()
    }
}
