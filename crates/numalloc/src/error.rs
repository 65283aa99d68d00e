//! Allocation failures and the fail-fast exit path.

use std::io::{self, Write};

use thiserror::Error;

use crate::config::FAIL_FAST_EXIT_STATUS;
use crate::trace::TraceOp;

/// Coarse classification of an [`AllocError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocErrorKind {
    /// Backend returned no region for a nonzero ALLOCATE / ZERO-ALLOCATE.
    OomAlloc,
    /// Backend returned no region for a nonzero RESIZE.
    OomResize,
    /// `count * size_of::<T>()` does not fit a `Layout`.
    SizeOverflow,
    /// Caller passed a negative count.
    InternalMisuse,
}

/// Why a façade op could not produce its region.
///
/// The `Display` form is the single diagnostic line written before exit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("{op}({name},n={count},{type_name}): cannot allocate space")]
    OutOfMemory {
        op: TraceOp,
        name: &'static str,
        count: usize,
        type_name: &'static str,
    },
    #[error("{op}({name},n={count},{type_name}): cannot reallocate space")]
    ResizeOutOfMemory {
        op: TraceOp,
        name: &'static str,
        count: usize,
        type_name: &'static str,
    },
    #[error(
        "{op}({name},n={count},{type_name}): size overflow \
         ({count} x {elem_size} bytes exceeds addressable range)"
    )]
    SizeOverflow {
        op: TraceOp,
        name: &'static str,
        count: usize,
        elem_size: usize,
        type_name: &'static str,
    },
    #[error("{op}({name},n={count},{type_name}): negative element count")]
    NegativeCount {
        op: TraceOp,
        name: &'static str,
        count: i64,
        type_name: &'static str,
    },
}

impl AllocError {
    #[must_use]
    pub const fn kind(&self) -> AllocErrorKind {
        match self {
            Self::OutOfMemory { .. } => AllocErrorKind::OomAlloc,
            Self::ResizeOutOfMemory { .. } => AllocErrorKind::OomResize,
            Self::SizeOverflow { .. } => AllocErrorKind::SizeOverflow,
            Self::NegativeCount { .. } => AllocErrorKind::InternalMisuse,
        }
    }

    /// Symbolic name of the failing call site.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OutOfMemory { name, .. }
            | Self::ResizeOutOfMemory { name, .. }
            | Self::SizeOverflow { name, .. }
            | Self::NegativeCount { name, .. } => *name,
        }
    }

    #[must_use]
    pub const fn op(&self) -> TraceOp {
        match self {
            Self::OutOfMemory { op, .. }
            | Self::ResizeOutOfMemory { op, .. }
            | Self::SizeOverflow { op, .. }
            | Self::NegativeCount { op, .. } => *op,
        }
    }

    /// Exit status used by [`fail_fast`]. Identical for every kind.
    #[must_use]
    pub const fn exit_status(&self) -> i32 {
        FAIL_FAST_EXIT_STATUS
    }
}

/// Write `err` as one line to standard error and terminate the process.
#[cold]
#[inline(never)]
pub fn fail_fast(err: &AllocError) -> ! {
    {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{err}");
        let _ = stderr.flush();
    }
    std::process::exit(err.exit_status())
}

/// Fail-fast unwrapping for façade results.
pub trait OrAbort<T> {
    /// Return the value, or [`fail_fast`] on error.
    fn or_abort(self) -> T;
}

impl<T> OrAbort<T> for Result<T, AllocError> {
    #[inline]
    fn or_abort(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => fail_fast(&err),
        }
    }
}

/// Convert a signed caller-side count, rejecting negatives as misuse.
pub fn signed_count(
    op: TraceOp,
    name: &'static str,
    type_name: &'static str,
    count: i64,
) -> Result<usize, AllocError> {
    usize::try_from(count).map_err(|_| {
        if count < 0 {
            AllocError::NegativeCount {
                op,
                name,
                count,
                type_name,
            }
        } else {
            // Positive but wider than usize (32-bit targets).
            AllocError::SizeOverflow {
                op,
                name,
                count: usize::MAX,
                elem_size: 1,
                type_name,
            }
        }
    })
}
