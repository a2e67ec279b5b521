//! Run controller: estimating the number of executions and running trials.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::{
    options::RunOptions,
    reporter::{Logger, Progress, ProgressSink},
    statement::{ExecutionError, Interpreter},
    timer::{Clock, TimerRecord},
};

/// Estimation pass duration after which the number of executions is extrapolated.
const ESTIMATION_THRESHOLD: Duration = Duration::from_millis(200);
/// Target duration (in seconds) for the next estimation pass.
const ESTIMATION_TARGET: f64 = 0.25;

/// Outcome of a comparison run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "interrupted runs have incomplete results"]
pub enum RunOutcome {
    /// All trials have completed (possibly with some timers failing).
    Completed,
    /// The run was interrupted by the user. Results collected before the interrupt are retained.
    Interrupted,
}

/// Computes the number of executions so that `repeat` trials of all timers take roughly `time_budget`,
/// given that a pass with `n` executions per timer took `elapsed`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)] // `as` saturates for out-of-range values
fn number_for_budget(n: u64, elapsed: Duration, time_budget: Duration, repeat: usize) -> u64 {
    let estimate =
        n as f64 * time_budget.as_secs_f64() / elapsed.as_secs_f64() / repeat as f64;
    (estimate.round() as u64).max(1)
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn next_estimation_number(n: u64, elapsed: Duration) -> u64 {
    let doubled = n.saturating_mul(2);
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        let scaled = (n as f64 * ESTIMATION_TARGET / secs) as u64;
        doubled.max(scaled.saturating_add(1))
    } else {
        doubled
    }
}

/// Borrowed environment for a single run.
#[derive(Debug)]
pub(crate) struct Runner<'a> {
    pub clock: &'a dyn Clock,
    pub interpreter: &'a mut dyn Interpreter,
    pub interrupt: &'static AtomicBool,
    pub logger: &'a dyn Logger,
    pub progress: &'a mut dyn ProgressSink,
}

impl Runner<'_> {
    /// Runs trials for the provided records. Returns the number of executions per trial
    /// (0 if the run was interrupted before it was determined) and the run outcome.
    pub fn run(
        &mut self,
        records: &mut [&mut TimerRecord],
        options: &RunOptions,
    ) -> (u64, RunOutcome) {
        let repeat = options.repeat();
        let mut progress = Progress::new(records.len(), repeat);
        self.progress.start(progress);

        let number = if options.number() > 0 {
            Some(options.number())
        } else {
            self.estimate_number(records, repeat, options.time_budget())
        };
        let outcome = if let Some(number) = number {
            self.logger.debug(&format_args!(
                "running {repeat} trial(s) with {number} execution(s) each"
            ));
            progress.errors = records.iter().filter(|record| record.error().is_some()).count();
            self.measure(records, repeat, number, &mut progress)
        } else {
            RunOutcome::Interrupted
        };

        if outcome == RunOutcome::Interrupted {
            self.logger.warning(&"run was interrupted; results are incomplete");
            for record in records.iter_mut() {
                if record.durations().len() < repeat {
                    record.latch_error(ExecutionError::Interrupted);
                }
            }
        }
        self.progress.finish(progress);
        (number.unwrap_or(0), outcome)
    }

    fn take_interrupt(&self) -> bool {
        self.interrupt.swap(false, Ordering::SeqCst)
    }

    fn latch_error(&self, record: &mut TimerRecord, err: ExecutionError) {
        self.logger.warning(&format_args!(
            "timer {} (`{}`) failed: {err}",
            record.id,
            record.label()
        ));
        record.latch_error(err);
    }

    /// Estimates the number of executions per trial. Returns `None` if interrupted.
    fn estimate_number(
        &mut self,
        records: &mut [&mut TimerRecord],
        repeat: usize,
        time_budget: Duration,
    ) -> Option<u64> {
        let mut n = 1_u64;
        loop {
            let mut elapsed = Duration::ZERO;
            let mut has_measurements = false;
            for record in records.iter_mut() {
                if record.error().is_some() {
                    continue;
                }
                let result = record.time_call(n, self.clock, &mut *self.interpreter);
                if self.take_interrupt() {
                    return None;
                }
                match result {
                    Ok(duration) => {
                        elapsed += duration;
                        has_measurements = true;
                    }
                    Err(err) => self.latch_error(record, err),
                }
            }

            if !has_measurements {
                self.logger
                    .debug(&"all timers failed during estimation; using 1 execution");
                return Some(1);
            }
            self.logger.debug(&format_args!(
                "estimation pass with {n} execution(s) took {elapsed:?}"
            ));
            if elapsed > ESTIMATION_THRESHOLD {
                return Some(number_for_budget(n, elapsed, time_budget, repeat));
            }
            n = next_estimation_number(n, elapsed);
        }
    }

    fn measure(
        &mut self,
        records: &mut [&mut TimerRecord],
        repeat: usize,
        number: u64,
        progress: &mut Progress,
    ) -> RunOutcome {
        for _ in 0..repeat {
            for record in records.iter_mut() {
                if record.error().is_none() {
                    let result = record.time_call(number, self.clock, &mut *self.interpreter);
                    if self.take_interrupt() {
                        return RunOutcome::Interrupted;
                    }
                    match result {
                        Ok(elapsed) => record.push_trial(elapsed, number),
                        Err(err) => {
                            self.latch_error(record, err);
                            progress.errors += 1;
                        }
                    }
                }
                progress.completed += 1;
                self.progress.update(*progress);
            }
        }
        RunOutcome::Completed
    }
}
