//! End-to-end façade scenarios with literal values.
//!
//! Scenario 4 (SIZE_MAX request) runs here through the `try_` surface; its
//! process-exit half is covered by the `probe` subcommand.

use std::sync::Arc;

use serde::Serialize;

use numalloc::{
    AllocErrorKind, Buffer, Facade, FacadeConfig, HandleState, RecordingSink, SystemBackend,
    TraceEvent, TraceOp,
};

use crate::HarnessError;

pub const SCENARIO_IDS: [u8; 6] = [1, 2, 3, 4, 5, 6];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub id: u8,
    pub title: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl ScenarioReport {
    fn check(id: u8, title: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            id,
            title,
            passed,
            detail: detail.into(),
        }
    }
}

/// Resolve `1`..`6` or `all`.
pub fn select(raw: &str) -> Result<Vec<u8>, HarnessError> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(SCENARIO_IDS.to_vec());
    }
    match raw.parse::<u8>() {
        Ok(id) if SCENARIO_IDS.contains(&id) => Ok(vec![id]),
        _ => Err(HarnessError::UnknownScenario(raw.to_string())),
    }
}

pub fn run(id: u8) -> Result<ScenarioReport, HarnessError> {
    Ok(match id {
        1 => zero_allocate_doubles(),
        2 => resize_preserves_prefix(),
        3 => shrink_then_release(),
        4 => size_max_request(),
        5 => trace_everything(),
        6 => trace_threshold_1024(),
        other => return Err(HarnessError::UnknownScenario(other.to_string())),
    })
}

fn recording(threshold: usize) -> (Facade<SystemBackend, Arc<RecordingSink>>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let facade = Facade::from_parts(
        SystemBackend,
        sink.clone(),
        FacadeConfig::new().with_threshold(threshold),
    );
    (facade, sink)
}

fn zero_allocate_doubles() -> ScenarioReport {
    let mut x = Buffer::<f64>::new("x");
    x.zero_allocate(4);
    ScenarioReport::check(
        1,
        "ZERO-ALLOCATE(x, 4, float64)",
        x.as_slice() == [0.0; 4],
        format!("{:?}", x.as_slice()),
    )
}

fn resize_preserves_prefix() -> ScenarioReport {
    let mut y = Buffer::<i32>::new("y");
    y.allocate(3).copy_from_slice(&[7, 8, 9]);
    y.resize(5);
    ScenarioReport::check(
        2,
        "ALLOCATE(y, 3, int32); RESIZE(y, 5)",
        y.len() == 5 && y[..3] == [7, 8, 9],
        format!("len={} prefix={:?}", y.len(), &y[..3.min(y.len())]),
    )
}

fn shrink_then_release() -> ScenarioReport {
    let mut z = Buffer::<i32>::new("z");
    z.allocate(2);
    z.resize(0);
    z.release();
    ScenarioReport::check(
        3,
        "ALLOCATE(z, 2); RESIZE(z, 0); RELEASE(z)",
        z.state() == HandleState::Empty,
        format!("{:?}", z.state()),
    )
}

fn size_max_request() -> ScenarioReport {
    let mut w = Buffer::<i32>::new("w");
    let title = "ALLOCATE(w, SIZE_MAX, int32)";
    match w.try_allocate(usize::MAX) {
        Ok(_) => ScenarioReport::check(4, title, false, "request unexpectedly succeeded"),
        Err(err) => {
            let line = err.to_string();
            let passed = err.kind() == AllocErrorKind::SizeOverflow
                && err.exit_status() == 1
                && line.contains('w')
                && line.contains(&usize::MAX.to_string())
                && line.contains("int32");
            ScenarioReport::check(4, title, passed, line)
        }
    }
}

fn describe(events: &[TraceEvent]) -> String {
    events
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

fn trace_everything() -> ScenarioReport {
    let (facade, sink) = recording(1);
    let mut a = facade.buffer::<i32>("a");
    a.allocate(10);
    let after_alloc = sink.events();
    a.release();
    let all = sink.events();

    let malloc_ok = after_alloc.len() == 1
        && after_alloc[0].op == TraceOp::Malloc
        && after_alloc[0].name == "a"
        && after_alloc[0].count == Some(10)
        && after_alloc[0].type_name == "int32";
    let free_ok = all.len() == 2 && all[1].op == TraceOp::Free && all[1].name == "a";
    ScenarioReport::check(
        5,
        "tracing, THRESHOLD=1: ALLOCATE(a, 10, int32); RELEASE(a)",
        malloc_ok && free_ok,
        describe(&all),
    )
}

fn trace_threshold_1024() -> ScenarioReport {
    let (facade, sink) = recording(1024);
    let mut a = facade.buffer::<i32>("a");
    a.allocate(10);
    let after_a = sink.len();
    let mut b = facade.buffer::<f64>("b");
    b.allocate(10);
    let after_b = sink.len();
    let mut c = facade.buffer::<i32>("c");
    c.allocate(256);
    let events = sink.events();

    let passed = after_a == 0
        && after_b == 0
        && events.len() == 1
        && events[0].name == "c"
        && events[0].op == TraceOp::Malloc;
    ScenarioReport::check(
        6,
        "tracing, THRESHOLD=1024: 10 x int32, 10 x float64, 256 x int32",
        passed,
        format!("after_a={after_a} after_b={after_b} events=[{}]", describe(&events)),
    )
}
