//! Diagnostic sinks.
//!
//! A façade hands every trace record to its [`DiagnosticSink`]. Silent mode is
//! just [`SilentSink`], a zero-sized no-op, so the tracing branch folds away
//! after inlining. Failure lines do not go through the sink; see
//! [`fail_fast`](crate::fail_fast).

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::TraceMode;
use crate::trace::TraceEvent;

/// Destination for trace records.
pub trait DiagnosticSink {
    /// Consume one record. Must not allocate through the façade.
    fn trace(&self, event: &TraceEvent);

    /// False if [`trace`](Self::trace) is a no-op; lets callers skip building events.
    fn is_enabled(&self) -> bool {
        true
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &S {
    fn trace(&self, event: &TraceEvent) {
        (**self).trace(event);
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn trace(&self, event: &TraceEvent) {
        (**self).trace(event);
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SilentSink;

impl DiagnosticSink for SilentSink {
    #[inline(always)]
    fn trace(&self, _event: &TraceEvent) {}

    #[inline(always)]
    fn is_enabled(&self) -> bool {
        false
    }
}

/// Writes one human-readable line per record to standard error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn trace(&self, event: &TraceEvent) {
        // A broken stderr must not turn a successful allocation into a failure.
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{event}");
    }
}

/// Writes one JSON object per line to an arbitrary writer.
#[derive(Debug, Default)]
pub struct JsonLinesSink<W: Write> {
    writer: Mutex<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer, e.g. to inspect a `Vec<u8>` in tests.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}

impl<W: Write> DiagnosticSink for JsonLinesSink<W> {
    fn trace(&self, event: &TraceEvent) {
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{line}");
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records seen so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Rendered lines, as [`StderrSink`] would have written them.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events.lock().iter().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DiagnosticSink for RecordingSink {
    fn trace(&self, event: &TraceEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Shared sink picked at runtime from a [`TraceMode`].
pub type DynSink = Arc<dyn DiagnosticSink + Send + Sync>;

/// Sink implementing `mode`: [`StderrSink`] when tracing, [`SilentSink`] otherwise.
#[must_use]
pub fn sink_for(mode: TraceMode) -> DynSink {
    match mode {
        TraceMode::Tracing => Arc::new(StderrSink),
        TraceMode::Silent => Arc::new(SilentSink),
    }
}

/// Sink selected by the `trace` feature.
#[cfg(feature = "trace")]
pub type DefaultSink = StderrSink;

/// Sink selected by the `trace` feature.
#[cfg(not(feature = "trace"))]
pub type DefaultSink = SilentSink;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceOp;

    #[test]
    fn silent_sink_reports_disabled() {
        assert!(!SilentSink.is_enabled());
        assert!(StderrSink.is_enabled());
        assert!(!sink_for(TraceMode::Silent).is_enabled());
        assert!(sink_for(TraceMode::Tracing).is_enabled());
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.trace(&TraceEvent::sized(TraceOp::Malloc, "a", 1, 4, "int32"));
        sink.trace(&TraceEvent::release("a", Some(1), "int32"));
        let ops: Vec<TraceOp> = sink.events().iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![TraceOp::Malloc, TraceOp::Free]);
        assert_eq!(sink.lines().len(), 2);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn arc_forwarding_reaches_inner_sink() {
        let inner = Arc::new(RecordingSink::new());
        let shared: DynSink = inner.clone();
        shared.trace(&TraceEvent::release("x", None, "float64"));
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn json_lines_sink_writes_one_object_per_line() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.trace(&TraceEvent::sized(TraceOp::Calloc, "x", 4, 8, "float64"));
        sink.trace(&TraceEvent::release("x", Some(4), "float64"));
        let out = String::from_utf8(sink.into_inner()).expect("utf8");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["op"], "CALLOC");
        assert_eq!(first["count"], 4);
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second["op"], "FREE");
        assert_eq!(second["name"], "x");
    }
}
