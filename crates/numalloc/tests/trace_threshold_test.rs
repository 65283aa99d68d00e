use std::sync::Arc;

use numalloc::{Buffer, Facade, FacadeConfig, RecordingSink, SystemBackend, TraceOp};

type Traced = Facade<SystemBackend, Arc<RecordingSink>>;

fn traced(threshold: usize) -> (Traced, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let facade = Facade::from_parts(
        SystemBackend,
        sink.clone(),
        FacadeConfig::new().with_threshold(threshold),
    );
    (facade, sink)
}

#[test]
fn threshold_one_traces_malloc_then_free() {
    let (facade, sink) = traced(1);
    let mut a = facade.buffer::<i32>("a");
    a.allocate(10);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].op, TraceOp::Malloc);
    assert_eq!(events[0].name, "a");
    assert_eq!(events[0].count, Some(10));
    assert_eq!(events[0].type_name, "int32");
    let line = &sink.lines()[0];
    for part in ["MALLOC", "a", "10", "int32"] {
        assert!(line.contains(part), "{line}");
    }

    a.release();
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].op, TraceOp::Free);
    assert_eq!(events[1].name, "a");

    drop(a);
    assert_eq!(sink.len(), 2, "drop of a released handle is silent");
}

#[test]
fn threshold_1024_suppresses_small_requests() {
    let (facade, sink) = traced(1024);

    let mut a = facade.buffer::<i32>("a");
    a.allocate(10);
    assert_eq!(sink.len(), 0, "40 bytes < 1024");

    let mut b = facade.buffer::<f64>("b");
    b.allocate(10);
    assert_eq!(sink.len(), 0, "80 bytes < 1024");

    let mut c = facade.buffer::<i32>("c");
    c.allocate(256);
    let events = sink.events();
    assert_eq!(events.len(), 1, "1024 bytes >= 1024");
    assert_eq!(events[0].name, "c");
    assert_eq!(events[0].bytes, Some(1024));

    sink.clear();
    a.release();
    b.release();
    c.release();
    assert_eq!(sink.len(), 3, "FREE ignores the threshold");
}

#[test]
fn trace_count_matches_threshold_crossings() {
    let threshold = 100;
    let (facade, sink) = traced(threshold);
    let mut h = facade.buffer::<f64>("h");
    let mut expected = 0;

    for (step, count) in [0_usize, 5, 12, 13, 40, 1, 0, 200, 12].into_iter().enumerate() {
        match step % 3 {
            0 => {
                h.allocate(count);
            }
            1 => {
                h.zero_allocate(count);
            }
            _ => {
                h.resize(count);
            }
        }
        if count * size_of::<f64>() >= threshold {
            expected += 1;
        }
        assert_eq!(sink.len(), expected, "step={step} count={count}");
    }

    let releases = 3;
    for _ in 0..releases {
        h.release();
    }
    assert_eq!(sink.len(), expected + releases, "one FREE line per release call");
}

#[test]
fn trace_is_emitted_before_a_failing_request() {
    let sink = Arc::new(RecordingSink::new());
    let facade = Facade::from_parts(
        numalloc::FailingBackend::always(),
        sink.clone(),
        FacadeConfig::new(),
    );
    let mut h = facade.buffer::<u8>("h");
    assert!(h.try_allocate(64).is_err());
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.events()[0].op, TraceOp::Malloc);
}

#[test]
fn default_facade_uses_compiled_mode() {
    let mut h = Buffer::<f64>::new("h");
    h.zero_allocate(2);
    assert_eq!(
        numalloc::DiagnosticSink::is_enabled(h.facade().sink()),
        cfg!(feature = "trace")
    );
}
