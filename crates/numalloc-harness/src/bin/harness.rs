//! CLI entrypoint for the numalloc harness.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use numalloc::{
    BackendKind, Buffer, DiagnosticSink, Facade, FacadeConfig, JsonLinesSink, StderrSink,
    SystemBackend, TraceMode,
};
use numalloc_harness::probe::{self, ProbeOp, ProbeRequest};
use numalloc_harness::{ElementType, HARNESS_FAILURE_STATUS, HarnessError, scenarios};

/// Scenario runner and fail-fast probes for numalloc.
#[derive(Debug, Parser)]
#[command(name = "numalloc-harness")]
#[command(about = "Scenario runner and fail-fast probes for numalloc")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the literal end-to-end scenarios and print a JSON report.
    Scenario {
        /// Scenario id (1-6) or "all".
        #[arg(long, default_value = "all")]
        id: String,
    },
    /// Perform one fail-fast request; exits 1 with one diagnostic line on failure.
    Probe {
        #[arg(long, value_enum, default_value = "malloc")]
        op: ProbeOp,
        /// Symbolic name reported in diagnostics.
        #[arg(long, default_value = "probe")]
        name: String,
        /// Element count: an integer (may be negative) or SIZE_MAX.
        #[arg(long, allow_hyphen_values = true)]
        count: String,
        #[arg(long = "type", value_enum, default_value = "int32")]
        element: ElementType,
        /// silent | tracing
        #[arg(long, default_value = "silent")]
        mode: String,
        /// system | libc | failing
        #[arg(long, default_value = "system")]
        backend: String,
        #[arg(long, default_value_t = numalloc::DEFAULT_TRACE_THRESHOLD)]
        threshold: usize,
    },
    /// Run a short traced sequence, writing trace lines to stderr.
    Trace {
        #[arg(long, default_value_t = numalloc::DEFAULT_TRACE_THRESHOLD)]
        threshold: usize,
        /// Write JSON records to stdout instead of lines to stderr.
        #[arg(long)]
        jsonl: bool,
    },
}

fn run_scenarios(id: &str) -> Result<(), HarnessError> {
    let ids = scenarios::select(id)?;
    let reports = ids
        .into_iter()
        .map(scenarios::run)
        .collect::<Result<Vec<_>, _>>()?;
    let failed = reports.iter().filter(|r| !r.passed).count();
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &reports)?;
    writeln!(stdout)?;
    if failed > 0 {
        return Err(HarnessError::ScenariosFailed {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

fn traced_sequence<S: DiagnosticSink + Clone>(sink: S, threshold: usize) {
    let facade = Facade::from_parts(
        SystemBackend,
        sink,
        FacadeConfig::new().with_threshold(threshold),
    );
    let mut a: Buffer<i32, _, _> = facade.buffer("a");
    let mut b: Buffer<f64, _, _> = facade.buffer("b");
    let mut c: Buffer<i32, _, _> = facade.buffer("c");
    a.allocate(10);
    b.zero_allocate(10);
    c.allocate(256);
    c.resize(512);
    a.release();
    b.release();
    c.release();
}

fn run_trace(threshold: usize, jsonl: bool) -> Result<(), HarnessError> {
    if jsonl {
        let sink = Arc::new(JsonLinesSink::new(std::io::stdout()));
        traced_sequence(Arc::clone(&sink), threshold);
        sink.flush()?;
    } else {
        traced_sequence(StderrSink, threshold);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Scenario { id } => run_scenarios(&id),
        Command::Probe {
            op,
            name,
            count,
            element,
            mode,
            backend,
            threshold,
        } => {
            let request = ProbeRequest {
                op,
                // One probe per process; the name lives until exit.
                name: Box::leak(name.into_boxed_str()),
                count,
                element,
                mode: TraceMode::from_str_loose(&mode),
                backend: BackendKind::from_str_loose(&backend),
                threshold,
            };
            probe::run(&request).and_then(|report| {
                let mut stdout = std::io::stdout().lock();
                serde_json::to_writer(&mut stdout, &report)?;
                writeln!(stdout)?;
                Ok(())
            })
        }
        Command::Trace { threshold, jsonl } => run_trace(threshold, jsonl),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("numalloc-harness: {err}");
            ExitCode::from(HARNESS_FAILURE_STATUS)
        }
    }
}
