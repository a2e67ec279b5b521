//! `Compare` facade.

use std::{
    collections::BTreeMap,
    rc::Rc,
    sync::{atomic::AtomicBool, Arc},
};

use crate::{
    error::{ConfigError, Error},
    interrupt::{self, InterruptGuard},
    options::{CompareOptions, PrintOptions, RunOptions},
    report::ReportPlan,
    reporter::{Logger, ProgressPrinter, ProgressSink},
    run::{RunOutcome, Runner},
    statement::{Interpreter, ShellInterpreter},
    stats::{Aggregator, StatRegistry},
    timer::{Clock, ComparisonResult, MonotonicClock, TimerRecord, TimerSpec},
    TimerId,
};

/// Registry of timers and statistics, running comparisons and reporting their results.
///
/// # Examples
///
/// ```
/// use timeit_compare::{Compare, PrintOptions, RunOptions, Statement};
///
/// let mut cmp = Compare::default();
/// let sum_id = cmp.add_timer(Statement::from_fn("sum", || (0..1_000_u64).sum::<u64>()));
/// let fold_id = cmp.add_timer(Statement::from_fn("fold", || {
///     (0..1_000_u64).fold(0, |acc, x| acc + x)
/// }));
///
/// let options = RunOptions::default().with_repeat(3).with_number(100);
/// let outcome = cmp.run(&options)?;
/// # assert_eq!(outcome, timeit_compare::RunOutcome::Completed);
/// let result = cmp.get_result(sum_id).unwrap();
/// assert_eq!(result.repeat, 3);
/// assert_eq!(result.number, 100);
/// assert!(result.stats.get("mean").is_some());
///
/// let table = cmp.render_results(&PrintOptions::default().include([sum_id, fold_id]))?;
/// assert!(table.trim_start().starts_with("Table 1. Comparison Results"));
/// # Ok::<_, timeit_compare::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct Compare {
    timers: BTreeMap<TimerId, TimerRecord>,
    next_id: usize,
    stats: StatRegistry,
    number: u64,
    repeat: usize,
    table_number: usize,
    clock: Box<dyn Clock>,
    interpreter: Box<dyn Interpreter>,
    interrupt: &'static AtomicBool,
    logger: Arc<dyn Logger>,
}

impl Default for Compare {
    fn default() -> Self {
        Self {
            timers: BTreeMap::new(),
            next_id: 0,
            stats: StatRegistry::default(),
            number: 0,
            repeat: 0,
            table_number: 0,
            clock: Box::new(MonotonicClock::default()),
            interpreter: Box::new(ShellInterpreter::default()),
            interrupt: interrupt::sigint_flag(),
            logger: Arc::new(()),
        }
    }
}

impl Compare {
    /// Sets the clock used to time statements.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Sets the interpreter for source statements. By default, the OS shell is used.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Interpreter + 'static) -> Self {
        self.interpreter = Box::new(interpreter);
        self
    }

    /// Sets the interrupt flag checked after each timed call. By default, the flag is
    /// [`sigint_flag()`](crate::sigint_flag()).
    #[must_use]
    pub fn with_interrupt_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.interrupt = flag;
        self
    }

    /// Sets the logger. By default, nothing is logged.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Registers a timer and returns its ID. IDs are assigned sequentially starting from 0
    /// and are never reused.
    pub fn add_timer(&mut self, spec: impl Into<TimerSpec>) -> TimerId {
        let id = TimerId::from(self.next_id);
        self.next_id += 1;
        self.timers
            .insert(id, TimerRecord::new(id, spec.into(), &self.stats));
        id
    }

    /// Deletes a timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer doesn't exist.
    pub fn del_timer(&mut self, id: TimerId) -> Result<(), ConfigError> {
        self.timers
            .remove(&id)
            .map(drop)
            .ok_or(ConfigError::UnknownTimer(id))
    }

    /// Returns IDs of all registered timers in the ascending order.
    pub fn timer_ids(&self) -> impl Iterator<Item = TimerId> + '_ {
        self.timers.keys().copied()
    }

    /// Registers a statistic, overwriting the existing one with the same name. The stat is
    /// immediately computed for all timers.
    ///
    /// Names are case-insensitive; they must be identifiers, not keywords and not start with `_`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn add_stat(
        &mut self,
        name: &str,
        aggregator: impl Aggregator + 'static,
    ) -> Result<(), ConfigError> {
        self.add_shared_stat(name, Rc::new(aggregator))
    }

    fn add_shared_stat(
        &mut self,
        name: &str,
        aggregator: Rc<dyn Aggregator>,
    ) -> Result<(), ConfigError> {
        let name = self.stats.register(name, aggregator.clone())?;
        for record in self.timers.values_mut() {
            record.compute_stat(&name, aggregator.as_ref());
        }
        self.logger
            .debug(&format_args!("registered stat `{name}`"));
        Ok(())
    }

    /// Deletes a statistic.
    ///
    /// # Errors
    ///
    /// Returns an error if the stat is not registered.
    pub fn del_stat(&mut self, name: &str) -> Result<(), ConfigError> {
        let name = self.stats.unregister(name)?;
        for record in self.timers.values_mut() {
            record.remove_stat(&name);
        }
        Ok(())
    }

    /// Returns names of the registered statistics in the registration order.
    pub fn stat_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.stats.names()
    }

    /// Returns the number of executions per trial used in the latest run (0 before the first run).
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Runs the comparison, printing a progress bar to stdout if specified in `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if `options` are invalid.
    pub fn run(&mut self, options: &RunOptions) -> Result<RunOutcome, ConfigError> {
        if options.show_progress() {
            self.run_with_progress(options, &mut ProgressPrinter::stdout())
        } else {
            self.run_with_progress(options, &mut ())
        }
    }

    /// Runs the comparison, reporting progress to the provided sink.
    ///
    /// Results of all timers (including ones not selected in `options`) are cleared before the run.
    /// If the run is interrupted, timers with incomplete trials are marked with
    /// [`ExecutionError::Interrupted`](crate::ExecutionError::Interrupted).
    ///
    /// # Errors
    ///
    /// Returns an error if `options` are invalid.
    pub fn run_with_progress(
        &mut self,
        options: &RunOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunOutcome, ConfigError> {
        options.validate()?;
        let all_ids: Vec<_> = self.timer_ids().collect();
        let selected = options.selection.select(&all_ids)?;
        if selected.is_empty() {
            self.logger.debug(&"no timers to run");
            return Ok(RunOutcome::Completed);
        }

        for record in self.timers.values_mut() {
            record.reset(&self.stats);
        }
        let mut records: Vec<_> = self
            .timers
            .values_mut()
            .filter(|record| selected.binary_search(&record.id).is_ok())
            .collect();

        let mut runner = Runner {
            clock: self.clock.as_ref(),
            interpreter: self.interpreter.as_mut(),
            interrupt: self.interrupt,
            logger: self.logger.as_ref(),
            progress,
        };
        let (number, outcome) = runner.run(&mut records, options);
        for record in &mut records {
            record.compute_stats(&self.stats);
        }
        self.number = number;
        self.repeat = options.repeat();
        Ok(outcome)
    }

    /// Returns the latest results for the specified timer, or `None` if the timer doesn't exist.
    pub fn get_result(&self, id: TimerId) -> Option<&ComparisonResult> {
        let record = self.timers.get(&id)?;
        Some(record.result(self.number, &self.stats))
    }

    /// Returns the result with the minimum value of the specified stat. Timers without the stat value
    /// are skipped; ties are resolved in favor of the earlier registered timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the stat is not registered.
    pub fn get_min(&self, stat: &str) -> Result<Option<&ComparisonResult>, ConfigError> {
        self.find_extreme(stat, |value, best| value < best)
    }

    /// Returns the result with the maximum value of the specified stat. Timers without the stat value
    /// are skipped; ties are resolved in favor of the earlier registered timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the stat is not registered.
    pub fn get_max(&self, stat: &str) -> Result<Option<&ComparisonResult>, ConfigError> {
        self.find_extreme(stat, |value, best| value > best)
    }

    fn find_extreme(
        &self,
        stat: &str,
        is_better: impl Fn(f64, f64) -> bool,
    ) -> Result<Option<&ComparisonResult>, ConfigError> {
        let stat = self.stats.resolve(stat)?;
        let mut best: Option<(&TimerRecord, f64)> = None;
        for record in self.timers.values() {
            let Some(value) = record.stat(&stat) else {
                continue;
            };
            if best.map_or(true, |(_, best_value)| is_better(value, best_value)) {
                best = Some((record, value));
            }
        }
        Ok(best.map(|(record, _)| record.result(self.number, &self.stats)))
    }

    /// Renders the results table.
    ///
    /// # Errors
    ///
    /// Returns an error if `options` are invalid.
    pub fn render_results(&mut self, options: &PrintOptions) -> Result<String, ConfigError> {
        let plan = self.resolve_print_options(options)?;
        self.render_plan(&plan)
    }

    /// Prints the results table to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if `options` are invalid.
    pub fn print_results(&mut self, options: &PrintOptions) -> Result<(), ConfigError> {
        let table = self.render_results(options)?;
        println!("{table}");
        Ok(())
    }

    /// Runs the comparison and prints results. Print options are validated before the run.
    /// If the run is interrupted, partial results are printed and [`Error::Interrupted`]
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if any options are invalid or if the run was interrupted.
    pub fn run_and_print(
        &mut self,
        run_options: &RunOptions,
        print_options: &PrintOptions,
    ) -> Result<(), Error> {
        let plan = self.resolve_print_options(print_options)?;
        let outcome = self.run(run_options)?;
        println!("{}", self.render_plan(&plan)?);
        match outcome {
            RunOutcome::Completed => Ok(()),
            RunOutcome::Interrupted => Err(Error::Interrupted),
        }
    }

    fn resolve_print_options(&self, options: &PrintOptions) -> Result<ReportPlan, ConfigError> {
        let all_ids: Vec<_> = self.timer_ids().collect();
        options.resolve(&self.stats, &all_ids)
    }

    fn render_plan(&mut self, plan: &ReportPlan) -> Result<String, ConfigError> {
        let records = plan.select(self.timers.values())?;
        self.table_number += 1;
        let table = plan.build_table(records, self.number, self.repeat, self.table_number);
        Ok(table.render())
    }
}

/// Registers timers, runs a comparison and prints its results to stdout. This is a convenience
/// wrapper around [`Compare`].
///
/// A SIGINT handler is installed for the duration of the call, so that pressing Ctrl+C stops
/// the run and prints partial results.
///
/// # Errors
///
/// Returns an error if options are invalid or if the run was interrupted.
pub fn compare<I>(timers: I, options: &CompareOptions) -> Result<Compare, Error>
where
    I: IntoIterator,
    I::Item: Into<TimerSpec>,
{
    let mut cmp = Compare::default();
    for timer in timers {
        let mut spec: TimerSpec = timer.into();
        if spec.setup.is_none() {
            spec.setup.clone_from(&options.setup);
        }
        if spec.namespace.is_none() {
            spec.namespace.clone_from(&options.namespace);
        }
        cmp.add_timer(spec);
    }
    for (name, aggregator) in &options.stats {
        cmp.add_shared_stat(name, aggregator.clone())?;
    }

    // If the handler cannot be installed, Ctrl+C terminates the process as usual.
    let _guard = InterruptGuard::install().ok();
    cmp.run_and_print(&options.run, &options.print)?;
    Ok(cmp)
}
