//! Progress and diagnostics reporting for the evaluation loop.
//!
//! The loop never writes to stdout or a global logger directly. It reports
//! through an [`EvalLogger`], which filters by [`Verbosity`] and hands
//! messages to a [`LogSink`] callback. [`tracing_sink`] forwards messages to
//! the `tracing` macros; tests capture them with a closure instead.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::error::EvalError;
use super::strategy::{EvaluationRecord, Strategy};
use crate::data::TaskId;

/// How much the evaluation loop reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Nothing.
    #[default]
    Silent,
    /// Failed tasks and strategies.
    Warning,
    /// Per-task progress and the run summary.
    Info,
    /// Per-strategy scores.
    Debug,
}

impl Verbosity {
    /// Map a `-v` count to a level: 0 is `Warning`, 1 is `Info`, 2+ is `Debug`.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Self::Warning,
            1 => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// Receives messages at or below the configured verbosity.
pub type LogSink = Arc<dyn Fn(Verbosity, &str) + Send + Sync>;

/// Sink forwarding to `tracing` at the matching level.
pub fn tracing_sink() -> LogSink {
    Arc::new(|level, message| match level {
        Verbosity::Silent => {}
        Verbosity::Warning => tracing::warn!("{message}"),
        Verbosity::Info => tracing::info!("{message}"),
        Verbosity::Debug => tracing::debug!("{message}"),
    })
}

/// Verbosity-filtered reporter used by [`TaskEvaluator`](super::TaskEvaluator).
///
/// Cheap to clone and safe to share between worker threads.
#[derive(Clone)]
pub struct EvalLogger {
    verbosity: Verbosity,
    sink: LogSink,
    start: Instant,
}

impl EvalLogger {
    pub fn new(verbosity: Verbosity, sink: LogSink) -> Self {
        Self {
            verbosity,
            sink,
            start: Instant::now(),
        }
    }

    /// A logger that drops everything.
    pub fn silent() -> Self {
        Self::new(Verbosity::Silent, Arc::new(|_, _| {}))
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    #[inline]
    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Silent && level <= self.verbosity
    }

    /// Emit a message; `message` is only built if `level` is enabled.
    pub fn log(&self, level: Verbosity, message: impl FnOnce() -> String) {
        if self.enabled(level) {
            (self.sink)(level, &message());
        }
    }

    pub fn start_run(&mut self, n_tasks: usize, n_strategies: usize) {
        self.start = Instant::now();
        self.log(Verbosity::Info, || {
            format!("Evaluating {n_strategies} strategies on {n_tasks} tasks")
        });
    }

    pub fn task_started(&self, task_id: TaskId, position: usize, total: usize) {
        self.log(Verbosity::Info, || {
            format!("Processing task {task_id} ({position}/{total})")
        });
    }

    pub fn strategy_finished(
        &self,
        task_id: TaskId,
        strategy: Strategy,
        records: &[EvaluationRecord],
    ) {
        self.log(Verbosity::Debug, || {
            let parts: Vec<String> = records
                .iter()
                .map(|r| {
                    let rho = r
                        .rank_correlation
                        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
                    format!("{}: precision={:.4} spearman={}", r.set, r.precision_at_n, rho)
                })
                .collect();
            format!("task {task_id} {strategy}: {}", parts.join(", "))
        });
    }

    pub fn evaluation_failed(&self, error: &EvalError) {
        self.log(Verbosity::Warning, || format!("Skipping {error}"));
    }

    pub fn finish_run(&self, n_records: usize, n_failures: usize) {
        self.log(Verbosity::Info, || {
            format!(
                "Finished: {n_records} records, {n_failures} failures in {:.2}s",
                self.start.elapsed().as_secs_f64()
            )
        });
    }
}

impl std::fmt::Debug for EvalLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalLogger")
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}
