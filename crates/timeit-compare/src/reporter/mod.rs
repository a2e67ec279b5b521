//! Logging and progress reporting.

use std::fmt;

pub use self::printer::{PrintingLogger, ProgressPrinter, Verbosity};
pub(crate) use self::table::{progress_bar, HeaderCell, Table};

mod printer;
mod table;

/// Encapsulates logging for comparisons.
pub trait Logger: Send + Sync + fmt::Debug {
    /// Reports debug information (e.g., the progress of estimating the number of executions).
    fn debug(&self, debug_info: &dyn fmt::Display);

    /// Reports a warning (e.g., a statement failing).
    fn warning(&self, warning: &dyn fmt::Display);

    /// Reports an error.
    fn error(&self, error: &dyn fmt::Display);
}

/// No-op implementation.
impl Logger for () {
    fn debug(&self, _debug_info: &dyn fmt::Display) {
        // do nothing
    }

    fn warning(&self, _warning: &dyn fmt::Display) {
        // do nothing
    }

    fn error(&self, _error: &dyn fmt::Display) {
        // do nothing
    }
}

/// Progress of a comparison run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Progress {
    /// Number of completed steps. A step is a single trial of a single timer; skipped trials
    /// of failed timers are counted as completed.
    pub completed: usize,
    /// Total number of steps.
    pub total: usize,
    /// Number of failed timers.
    pub errors: usize,
    /// Total number of timers in the run.
    pub timers: usize,
}

impl Progress {
    pub(crate) fn new(timers: usize, repeat: usize) -> Self {
        Self {
            completed: 0,
            total: timers * repeat,
            errors: 0,
            timers,
        }
    }

    /// Returns the completed fraction of the run in `0.0..=1.0`.
    #[allow(clippy::cast_precision_loss)] // fine for reporting
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Receiver of progress updates during a comparison run.
#[allow(unused_variables)]
pub trait ProgressSink: fmt::Debug {
    /// Reports that the run has started. Called before the number of executions is estimated.
    ///
    /// The default implementation does nothing.
    fn start(&mut self, progress: Progress) {
        // do nothing
    }

    /// Reports a completed step.
    fn update(&mut self, progress: Progress);

    /// Reports that the run has finished, either normally or because of an interrupt.
    ///
    /// The default implementation does nothing.
    fn finish(&mut self, progress: Progress) {
        // do nothing
    }
}

/// No-op implementation.
impl ProgressSink for () {
    fn update(&mut self, _progress: Progress) {
        // do nothing
    }
}
