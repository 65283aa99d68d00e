//! Single fail-fast request.
//!
//! A probe performs exactly one façade operation through the fail-fast
//! surface. When the request cannot be satisfied the process exits inside
//! the façade, so callers observe the diagnostic line and exit status from
//! outside (see the harness integration tests).

use clap::ValueEnum;
use serde::Serialize;

use numalloc::{
    BackendKind, Buffer, DynSink, Element, FailingBackend, Facade, FacadeConfig, LibcBackend,
    RawAllocator, SystemBackend, TraceMode, TraceOp, fail_fast, signed_count, sink_for,
};

use crate::{ElementType, HarnessError, with_element_type};

/// Façade operation performed by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProbeOp {
    Malloc,
    Calloc,
    Realloc,
}

impl ProbeOp {
    #[must_use]
    pub const fn trace_op(self) -> TraceOp {
        match self {
            Self::Malloc => TraceOp::Malloc,
            Self::Calloc => TraceOp::Calloc,
            Self::Realloc => TraceOp::Realloc,
        }
    }
}

/// Probe parameters.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub op: ProbeOp,
    pub name: &'static str,
    /// Raw count: an integer (possibly negative) or `SIZE_MAX`.
    pub count: String,
    pub element: ElementType,
    pub mode: TraceMode,
    pub backend: BackendKind,
    pub threshold: usize,
}

/// Outcome of a probe that did not exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub op: &'static str,
    pub name: &'static str,
    pub type_name: &'static str,
    pub backend: &'static str,
    pub mode: &'static str,
    pub owning_len: usize,
}

/// Parsed count: unsigned, or the raw signed value still to be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCount {
    Unsigned(usize),
    Signed(i64),
}

/// Parse `SIZE_MAX`/`max` or a decimal integer.
pub fn parse_count(raw: &str) -> Result<RawCount, HarnessError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("size_max") || trimmed.eq_ignore_ascii_case("max") {
        return Ok(RawCount::Unsigned(usize::MAX));
    }
    if let Ok(n) = trimmed.parse::<usize>() {
        return Ok(RawCount::Unsigned(n));
    }
    trimmed
        .parse::<i64>()
        .map(RawCount::Signed)
        .map_err(|_| HarnessError::InvalidCount(raw.to_string()))
}

/// Run the probe. Returns only if the request succeeded.
pub fn run(request: &ProbeRequest) -> Result<ProbeReport, HarnessError> {
    let count = parse_count(&request.count)?;
    let sink = sink_for(request.mode);
    let config = FacadeConfig::new().with_threshold(request.threshold);
    match request.backend {
        BackendKind::System => run_on(SystemBackend, sink, config, request, count),
        BackendKind::Libc => run_on(LibcBackend, sink, config, request, count),
        BackendKind::Failing => run_on(FailingBackend::always(), sink, config, request, count),
    }
}

fn run_on<A: RawAllocator + Clone>(
    backend: A,
    sink: DynSink,
    config: FacadeConfig,
    request: &ProbeRequest,
    count: RawCount,
) -> Result<ProbeReport, HarnessError> {
    let facade = Facade::from_parts(backend, sink, config);
    let len = with_element_type!(request.element, T => execute::<T, A>(&facade, request, count));
    Ok(ProbeReport {
        op: request.op.trace_op().as_str(),
        name: request.name,
        type_name: request.element.type_name(),
        backend: request.backend.as_str(),
        mode: request.mode.as_str(),
        owning_len: len,
    })
}

fn execute<T: Element, A: RawAllocator + Clone>(
    facade: &Facade<A, DynSink>,
    request: &ProbeRequest,
    count: RawCount,
) -> usize {
    let op = request.op.trace_op();
    let count = match count {
        RawCount::Unsigned(n) => n,
        RawCount::Signed(n) => match signed_count(op, request.name, T::TYPE_NAME, n) {
            Ok(n) => n,
            Err(err) => fail_fast(&err),
        },
    };

    let mut buffer: Buffer<T, A, DynSink> = facade.buffer(request.name);
    match request.op {
        ProbeOp::Malloc => {
            buffer.allocate(count);
        }
        ProbeOp::Calloc => {
            buffer.zero_allocate(count);
        }
        ProbeOp::Realloc => {
            buffer.resize(count);
        }
    }
    let len = buffer.len();
    buffer.release();
    len
}
