//! Trace records emitted by the façade.

use std::fmt;

use serde::Serialize;

/// The four façade operations, named as they appear in diagnostic lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceOp {
    /// ALLOCATE.
    Malloc,
    /// ZERO-ALLOCATE.
    Calloc,
    /// RESIZE.
    Realloc,
    /// RELEASE.
    Free,
}

impl TraceOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malloc => "MALLOC",
            Self::Calloc => "CALLOC",
            Self::Realloc => "REALLOC",
            Self::Free => "FREE",
        }
    }
}

impl fmt::Display for TraceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trace record: `(op, name, count, type-name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub op: TraceOp,
    /// Symbolic name of the handle at the call site.
    pub name: &'static str,
    /// Requested element count. `None` for FREE of an empty handle.
    pub count: Option<usize>,
    pub type_name: &'static str,
    /// `count * size_of::<T>()`, saturated at `usize::MAX`.
    pub bytes: Option<usize>,
}

impl TraceEvent {
    /// Record for a sized request (MALLOC / CALLOC / REALLOC).
    #[must_use]
    pub fn sized(
        op: TraceOp,
        name: &'static str,
        count: usize,
        elem_size: usize,
        type_name: &'static str,
    ) -> Self {
        Self {
            op,
            name,
            count: Some(count),
            type_name,
            bytes: Some(count.saturating_mul(elem_size)),
        }
    }

    /// Record for a FREE. `count` is the length being returned, if any.
    #[must_use]
    pub fn release(name: &'static str, count: Option<usize>, type_name: &'static str) -> Self {
        Self {
            op: TraceOp::Free,
            name,
            count,
            type_name,
            bytes: None,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = format!("{}(", self.op);
        match (self.op, self.count) {
            (TraceOp::Free, _) | (_, None) => {
                write!(f, "{head:<8} {:>12}, {} )", self.name, self.type_name)
            }
            (_, Some(count)) => write!(
                f,
                "{head:<8} {:>12}, n={count:<6}, {} )",
                self.name, self.type_name
            ),
        }
    }
}
