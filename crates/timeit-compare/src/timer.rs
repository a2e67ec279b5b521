//! Timer records: a single statement under test with its measurements.

use std::{
    cell::OnceCell,
    collections::HashMap,
    fmt, panic,
    time::{Duration, Instant},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    statement::{ExecutionError, Interpreter, Namespace, SharedNamespace, Statement},
    stats::{self, Aggregator, StatRegistry, Stats},
};

/// Identifier of a timer assigned on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct TimerId(usize);

impl fmt::Display for TimerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, formatter)
    }
}

impl From<usize> for TimerId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl TimerId {
    /// Returns the numeric value of this ID.
    pub fn get(self) -> usize {
        self.0
    }
}

/// Monotonic time source used to time statements.
pub trait Clock: fmt::Debug {
    /// Returns the time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] based on [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Specification of a timer to register.
#[derive(Debug)]
pub struct TimerSpec {
    pub(crate) statement: Statement,
    pub(crate) setup: Option<Statement>,
    pub(crate) namespace: Option<SharedNamespace>,
}

impl From<Statement> for TimerSpec {
    fn from(statement: Statement) -> Self {
        Self::new(statement)
    }
}

impl From<&str> for TimerSpec {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for TimerSpec {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl TimerSpec {
    /// Creates a spec with no setup and a fresh namespace.
    pub fn new(statement: impl Into<Statement>) -> Self {
        Self {
            statement: statement.into(),
            setup: None,
            namespace: None,
        }
    }

    /// Sets the setup statement executed before each timed call. Its execution time is not measured.
    #[must_use]
    pub fn with_setup(mut self, setup: impl Into<Statement>) -> Self {
        self.setup = Some(setup.into());
        self
    }

    /// Sets the namespace for the statement and setup. The namespace can be shared with other timers.
    #[must_use]
    pub fn with_namespace(mut self, namespace: SharedNamespace) -> Self {
        self.namespace = Some(namespace);
        self
    }
}

/// Snapshot of the results for a single timer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub struct ComparisonResult {
    /// Timer ID.
    pub id: TimerId,
    /// Number of completed trials.
    pub repeat: usize,
    /// Values of all registered statistics.
    pub stats: Stats,
    /// Per-call durations in seconds, one for each completed trial.
    pub durations: Vec<f64>,
    /// Number of statement executions in each trial.
    pub number: u64,
    /// Error that stopped measurements for the timer, if any.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub error: Option<ExecutionError>,
}

#[derive(Debug)]
pub(crate) struct TimerRecord {
    pub id: TimerId,
    statement: Statement,
    setup: Option<Statement>,
    namespace: SharedNamespace,
    durations: Vec<f64>,
    total_elapsed: Duration,
    error: Option<ExecutionError>,
    stats: HashMap<String, Option<f64>>,
    cached: OnceCell<ComparisonResult>,
}

impl TimerRecord {
    pub fn new(id: TimerId, spec: TimerSpec, registry: &StatRegistry) -> Self {
        let TimerSpec {
            statement,
            setup,
            namespace,
        } = spec;
        Self {
            id,
            statement,
            setup,
            namespace: namespace.unwrap_or_else(|| Namespace::new().into_shared()),
            durations: vec![],
            total_elapsed: Duration::ZERO,
            error: None,
            stats: registry.evaluate_all(&[]),
            cached: OnceCell::new(),
        }
    }

    pub fn label(&self) -> String {
        self.statement.label()
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied().flatten()
    }

    pub fn reset(&mut self, registry: &StatRegistry) {
        self.durations.clear();
        self.total_elapsed = Duration::ZERO;
        self.error = None;
        self.compute_stats(registry);
    }

    /// Executes the setup once and then the statement `number` times, timing only the statement.
    /// Panics are caught and converted to errors.
    pub fn time_call(
        &mut self,
        number: u64,
        clock: &dyn Clock,
        interpreter: &mut dyn Interpreter,
    ) -> Result<Duration, ExecutionError> {
        let Self {
            statement,
            setup,
            namespace,
            ..
        } = self;

        let timed_call = panic::AssertUnwindSafe(|| -> Result<Duration, ExecutionError> {
            let mut namespace = namespace.borrow_mut();
            if let Some(setup) = setup {
                setup.execute(&mut namespace, interpreter)?;
            }
            let start = clock.now();
            for _ in 0..number {
                statement.execute(&mut namespace, interpreter)?;
            }
            Ok(clock.now().saturating_sub(start))
        });
        panic::catch_unwind(timed_call)
            .unwrap_or_else(|payload| Err(ExecutionError::from_panic(payload.as_ref())))
    }

    /// Records a completed trial. `number` must be positive.
    #[allow(clippy::cast_precision_loss)] // fine for iteration counts
    pub fn push_trial(&mut self, elapsed: Duration, number: u64) {
        self.durations.push(elapsed.as_secs_f64() / number as f64);
        self.total_elapsed += elapsed;
        self.cached.take();
    }

    /// Latches an error for the record. Only the first error is retained.
    pub fn latch_error(&mut self, error: ExecutionError) {
        if self.error.is_none() {
            self.error = Some(error);
            self.cached.take();
        }
    }

    pub fn compute_stats(&mut self, registry: &StatRegistry) {
        self.stats = registry.evaluate_all(&self.durations);
        self.cached.take();
    }

    pub fn compute_stat(&mut self, name: &str, aggregator: &dyn Aggregator) {
        let value = stats::evaluate(aggregator, &self.durations);
        self.stats.insert(name.to_owned(), value);
        self.cached.take();
    }

    pub fn remove_stat(&mut self, name: &str) {
        self.stats.remove(name);
        self.cached.take();
    }

    pub fn result(&self, number: u64, registry: &StatRegistry) -> &ComparisonResult {
        self.cached.get_or_init(|| ComparisonResult {
            id: self.id,
            repeat: self.durations.len(),
            stats: registry.snapshot(&self.stats),
            durations: self.durations.clone(),
            number,
            error: self.error.clone(),
        })
    }
}
