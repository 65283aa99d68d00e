//! Tooling around the numalloc façade.
//!
//! - [`scenarios`]: the literal end-to-end scenarios, run in-process.
//! - [`probe`]: one fail-fast request in a chosen mode/backend/type, used to
//!   observe the diagnostic line and exit status from outside the process.
//! - [`element_type`]: runtime selection of the element type.

pub mod element_type;
pub mod probe;
pub mod scenarios;

use thiserror::Error;

pub use element_type::ElementType;

/// Exit status for harness-level failures (distinct from the façade's 1).
pub const HARNESS_FAILURE_STATUS: u8 = 2;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid count {0:?} (expected an integer or SIZE_MAX)")]
    InvalidCount(String),
    #[error("unknown scenario {0:?} (expected 1-6 or all)")]
    UnknownScenario(String),
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },
}
