//! numalloc: typed allocation façade for numerical code.
//!
//! Four operations over owning typed handles ([`Buffer`]):
//! - ALLOCATE ([`Buffer::allocate`]): `MALLOC` in trace lines
//! - ZERO-ALLOCATE ([`Buffer::zero_allocate`]): `CALLOC`
//! - RESIZE ([`Buffer::resize`]): `REALLOC`
//! - RELEASE ([`Buffer::release`], also on drop): `FREE`
//!
//! Size arithmetic is checked. Allocation failure with a nonzero request is
//! fatal by default: one line on standard error, then exit status 1. The
//! `try_*` variants return [`AllocError`] instead.
//!
//! Cargo features `trace` and `libc-backend` pick the default sink and
//! backend; see [`config`].

pub mod backend;
pub mod buffer;
pub mod config;
pub mod element;
pub mod error;
pub mod facade;
mod macros;
pub mod sink;
pub mod trace;

pub use backend::{DefaultBackend, FailingBackend, LibcBackend, RawAllocator, SystemBackend};
pub use buffer::{Buffer, HandleState};
pub use config::{
    BackendKind, DEFAULT_TRACE_THRESHOLD, FAIL_FAST_EXIT_STATUS, FacadeConfig, TraceMode,
};
pub use element::Element;
pub use error::{AllocError, AllocErrorKind, OrAbort, fail_fast, signed_count};
pub use facade::Facade;
pub use sink::{
    DefaultSink, DiagnosticSink, DynSink, JsonLinesSink, RecordingSink, SilentSink, StderrSink,
    sink_for,
};
pub use trace::{TraceEvent, TraceOp};
