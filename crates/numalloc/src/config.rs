//! Build-time mode selection.
//!
//! Two independent Cargo features pick the compiled-in defaults:
//! - `trace`: façades default to tracing mode (one line per op above the
//!   size threshold). Without it the default is silent.
//! - `libc-backend`: the default backend is the C library's
//!   `malloc`/`calloc`/`realloc`/`free` instead of Rust's `System` allocator.
//!
//! Nothing here reads the environment. Runtime selection (used by the harness)
//! goes through [`TraceMode::from_str_loose`] and [`BackendKind::from_str_loose`].

/// Byte size at or above which ALLOCATE / ZERO-ALLOCATE / RESIZE are traced.
///
/// One byte means every non-empty request is traced.
pub const DEFAULT_TRACE_THRESHOLD: usize = 1;

/// Process exit status used by every fail-fast path.
pub const FAIL_FAST_EXIT_STATUS: i32 = 1;

/// Diagnostic mode of a façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceMode {
    /// Only failure lines are written.
    Silent,
    /// Every traced op writes one line before touching the allocator.
    Tracing,
}

impl TraceMode {
    /// The mode selected by the `trace` feature.
    #[must_use]
    pub const fn compiled() -> Self {
        if cfg!(feature = "trace") {
            Self::Tracing
        } else {
            Self::Silent
        }
    }

    /// Parse from string (case-insensitive). Unknown input maps to `Silent`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "trace" | "tracing" | "debug" | "on" => Self::Tracing,
            _ => Self::Silent,
        }
    }

    #[must_use]
    pub const fn is_tracing(self) -> bool {
        matches!(self, Self::Tracing)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Tracing => "tracing",
        }
    }
}

impl Default for TraceMode {
    fn default() -> Self {
        Self::compiled()
    }
}

/// Platform allocator behind a façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// `std::alloc::System`.
    System,
    /// The C library allocator via `libc`.
    Libc,
    /// Test backend that refuses requests.
    Failing,
}

impl BackendKind {
    /// The backend selected by the `libc-backend` feature.
    #[must_use]
    pub const fn compiled() -> Self {
        if cfg!(feature = "libc-backend") {
            Self::Libc
        } else {
            Self::System
        }
    }

    /// Parse from string (case-insensitive). Unknown input maps to `System`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "libc" | "c" | "malloc" => Self::Libc,
            "failing" | "fail" | "oom" => Self::Failing,
            _ => Self::System,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Libc => "libc",
            Self::Failing => "failing",
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::compiled()
    }
}

/// Per-façade tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacadeConfig {
    /// Minimum byte size of a traced ALLOCATE / ZERO-ALLOCATE / RESIZE.
    pub threshold: usize,
}

impl FacadeConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: DEFAULT_TRACE_THRESHOLD,
        }
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// True if a request of `bytes` crosses the trace threshold.
    #[must_use]
    pub const fn should_trace(self, bytes: usize) -> bool {
        bytes >= self.threshold
    }
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self::new()
    }
}
