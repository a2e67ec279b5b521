//! Tests for the public library API.

use std::{
    cell::Cell,
    rc::Rc,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use assert_matches::assert_matches;
use timeit_compare::{
    reporter::{Progress, ProgressSink},
    Clock, Compare, ConfigError, ExecutionError, PrintOptions, RunOptions, RunOutcome, Statement,
    TimerId, TimerSpec,
};

#[derive(Debug, Clone, Default)]
struct ManualClock(Rc<Cell<Duration>>);

impl ManualClock {
    fn advance(&self, duration: Duration) {
        self.0.set(self.0.get() + duration);
    }

    /// Creates a statement taking the specified time on this clock.
    fn statement(&self, name: &str, cost: Duration) -> Statement {
        let clock = self.clone();
        Statement::from_fn(name, move || clock.advance(cost))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

#[derive(Debug, Default)]
struct RecordingSink {
    started: Option<Progress>,
    updates: Vec<Progress>,
    finished: Option<Progress>,
}

impl ProgressSink for RecordingSink {
    fn start(&mut self, progress: Progress) {
        self.started = Some(progress);
    }

    fn update(&mut self, progress: Progress) {
        self.updates.push(progress);
    }

    fn finish(&mut self, progress: Progress) {
        self.finished = Some(progress);
    }
}

fn assert_close(actual: f64, expected: f64) {
    let diff = (actual - expected).abs();
    assert!(diff <= expected * 1e-9, "actual={actual}, expected={expected}");
}

fn table_ids(table: &str) -> Vec<usize> {
    table
        .lines()
        .filter_map(|line| {
            let cell = line.strip_prefix('│')?.split('│').next()?;
            cell.trim().parse().ok()
        })
        .collect()
}

fn create_compare(clock: &ManualClock, flag: &'static AtomicBool) -> Compare {
    Compare::default()
        .with_clock(clock.clone())
        .with_interrupt_flag(flag)
}

#[test]
fn comparing_statements_with_different_costs() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    let costs = [1, 100, 10].map(Duration::from_micros);
    let ids = costs.map(|cost| cmp.add_timer(clock.statement("work", cost)));

    let options = RunOptions::default().with_repeat(5);
    let mut sink = RecordingSink::default();
    let outcome = cmp.run_with_progress(&options, &mut sink).unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert!(cmp.number() > 1);

    for (&id, cost) in ids.iter().zip(costs) {
        let result = cmp.get_result(id).unwrap();
        assert_eq!(result.repeat, 5);
        assert_eq!(result.number, cmp.number());
        assert!(result.error.is_none());
        for &duration in &result.durations {
            assert_close(duration, cost.as_secs_f64());
        }
        assert_close(result.stats.get("mean").unwrap(), cost.as_secs_f64());
        assert!(result.stats.get("std").unwrap() < 1e-12);
    }

    // Total time should roughly match the time budget.
    let total = clock.now().as_secs_f64();
    assert!(total > 1.0 && total < 1.5, "{total}");

    assert_eq!(cmp.get_min("mean").unwrap().unwrap().id, ids[0]);
    assert_eq!(cmp.get_max("Mean").unwrap().unwrap().id, ids[1]);

    let started = sink.started.unwrap();
    assert_eq!((started.completed, started.total), (0, 15));
    assert_eq!(sink.updates.len(), 15);
    assert!(sink
        .updates
        .windows(2)
        .all(|window| window[0].completed + 1 == window[1].completed));
    assert_eq!(sink.finished.unwrap().completed, 15);

    let table = cmp.render_results(&PrintOptions::default()).unwrap();
    let title = table.lines().next().unwrap();
    assert_eq!(title.trim_start(), "Table 1. Comparison Results (unit: s)");
    assert_eq!(table_ids(&table), [0, 2, 1]);
    assert!(table.contains("100.%"), "{table}");
    assert!(!table.contains("Err"), "{table}");
    assert!(table.lines().all(|line| line == line.trim_end()));

    let table = cmp
        .render_results(&PrintOptions::default().reverse(true))
        .unwrap();
    assert!(table.trim_start().starts_with("Table 2."), "{table}");
    assert_eq!(table_ids(&table), [1, 2, 0]);
}

#[test]
fn estimated_number_decreases_with_statement_cost() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let mut prev_number = u64::MAX;
    for micros in [1, 10, 100, 1_000] {
        let clock = ManualClock::default();
        let mut cmp = create_compare(&clock, &FLAG);
        cmp.add_timer(clock.statement("work", Duration::from_micros(micros)));
        cmp.run(&RunOptions::default()).unwrap();

        let number = cmp.number();
        assert!(number <= prev_number, "{number} > {prev_number}");
        prev_number = number;
    }
    assert!(prev_number >= 1);
}

#[test]
fn explicit_number_is_used_as_is() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    let id = cmp.add_timer(clock.statement("work", Duration::from_millis(1)));
    let options = RunOptions::default().with_repeat(3).with_number(7);
    cmp.run(&options).unwrap();

    assert_eq!(cmp.number(), 7);
    assert_eq!(clock.now(), Duration::from_millis(21));
    let result = cmp.get_result(id).unwrap();
    assert_eq!(result.durations.len(), 3);

    let table = cmp.render_results(&PrintOptions::default()).unwrap();
    assert!(
        table.contains("7 executions for each statement per repetition"),
        "{table}"
    );
    assert!(table.contains("total execution time 0.0210s"), "{table}");
}

#[test]
fn failing_setup_does_not_abort_other_timers() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    let ok_id = cmp.add_timer(clock.statement("ok", Duration::from_micros(10)));
    let spec = TimerSpec::new(clock.statement("never_runs", Duration::from_micros(10)))
        .with_setup(Statement::from_fn("bad_setup", || -> () {
            panic!("setup failed");
        }));
    let failing_id = cmp.add_timer(spec);

    let outcome = cmp.run(&RunOptions::default()).unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let ok_result = cmp.get_result(ok_id).unwrap();
    assert_eq!(ok_result.repeat, 5);
    assert!(ok_result.error.is_none());

    let failing_result = cmp.get_result(failing_id).unwrap();
    assert_eq!(failing_result.repeat, 0);
    assert_eq!(failing_result.stats.get("mean"), None);
    assert_matches!(
        &failing_result.error,
        Some(ExecutionError::Panic { message }) if message == "setup failed"
    );

    let table = cmp.render_results(&PrintOptions::default()).unwrap();
    // Records without the sorting stat go last.
    assert_eq!(table_ids(&table), [0, 1]);
    let failing_row = table
        .lines()
        .find(|line| line.contains("never_runs()"))
        .unwrap();
    assert!(failing_row.contains("Panic (r=0)"), "{table}");
    assert!(failing_row.contains(" - "), "{table}");
}

#[test]
fn failing_statement_is_excluded_from_remaining_trials() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    let calls = Rc::new(Cell::new(0));
    let flaky = {
        let (clock, calls) = (clock.clone(), calls.clone());
        Statement::from_fn("flaky", move || {
            calls.set(calls.get() + 1);
            assert!(calls.get() < 3, "flaky statement failed");
            clock.advance(Duration::from_micros(5));
        })
    };
    let flaky_id = cmp.add_timer(flaky);
    let stable_id = cmp.add_timer(clock.statement("stable", Duration::from_micros(5)));

    let options = RunOptions::default().with_repeat(4).with_number(1);
    let outcome = cmp.run(&options).unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(calls.get(), 3);

    let flaky_result = cmp.get_result(flaky_id).unwrap();
    assert_eq!(flaky_result.repeat, 2);
    assert_matches!(flaky_result.error, Some(ExecutionError::Panic { .. }));
    assert!(flaky_result.stats.get("mean").is_some());
    assert_eq!(cmp.get_result(stable_id).unwrap().repeat, 4);

    let table = cmp.render_results(&PrintOptions::default()).unwrap();
    assert!(table.contains("Panic (r=2)"), "{table}");
}

#[test]
fn interrupting_run() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    let calls = Rc::new(Cell::new(0));
    for name in ["first", "second"] {
        let (clock, calls) = (clock.clone(), calls.clone());
        cmp.add_timer(Statement::from_fn(name, move || {
            calls.set(calls.get() + 1);
            if calls.get() == 3 {
                FLAG.store(true, Ordering::SeqCst);
            }
            clock.advance(Duration::from_millis(1));
        }));
    }

    let options = RunOptions::default().with_repeat(5).with_number(1);
    let outcome = cmp.run(&options).unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    assert!(!FLAG.load(Ordering::SeqCst));
    assert_eq!(calls.get(), 3);

    for id in [0_usize, 1] {
        let result = cmp.get_result(TimerId::from(id)).unwrap();
        // The interrupted call is discarded.
        assert_eq!(result.repeat, 1);
        assert_matches!(result.error, Some(ExecutionError::Interrupted));
    }
    let table = cmp.render_results(&PrintOptions::default()).unwrap();
    assert!(table.contains("Interrupted (r=1)"), "{table}");
}

#[test]
fn interrupting_estimation() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    let id = cmp.add_timer(Statement::from_fn("interrupt", || {
        FLAG.store(true, Ordering::SeqCst);
    }));

    let outcome = cmp.run(&RunOptions::default()).unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    assert_eq!(cmp.number(), 0);
    let result = cmp.get_result(id).unwrap();
    assert_eq!(result.repeat, 0);
    assert_matches!(result.error, Some(ExecutionError::Interrupted));
}

#[test]
fn invalid_selection_is_rejected_before_timing() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    for cost in [1, 2, 3] {
        cmp.add_timer(clock.statement("work", Duration::from_millis(cost)));
    }

    let options = RunOptions::default().include([0_usize, 2]).exclude([0_usize, 2]);
    let err = cmp.run(&options).unwrap_err();
    assert_matches!(err, ConfigError::IncludeAndExclude);
    assert_eq!(clock.now(), Duration::ZERO);

    let options = RunOptions::default().include([5_usize]);
    let err = cmp.run(&options).unwrap_err();
    assert_matches!(err, ConfigError::UnknownTimer(id) if id == TimerId::from(5));

    let err = cmp.run(&RunOptions::default().with_repeat(0)).unwrap_err();
    assert_matches!(err, ConfigError::ZeroRepeat);
    assert_eq!(clock.now(), Duration::ZERO);
}

#[test]
fn running_selected_timers() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    let ids: Vec<_> = (1..=3)
        .map(|cost| cmp.add_timer(clock.statement("work", Duration::from_millis(cost))))
        .collect();

    let options = RunOptions::default().with_repeat(2).with_number(1);
    cmp.run(&options).unwrap();
    cmp.run(&options.clone().exclude([ids[1]])).unwrap();

    // Results for the excluded timer are cleared.
    assert_eq!(cmp.get_result(ids[0]).unwrap().repeat, 2);
    assert_eq!(cmp.get_result(ids[1]).unwrap().repeat, 0);
    assert_eq!(cmp.get_result(ids[2]).unwrap().repeat, 2);

    let table = cmp
        .render_results(&PrintOptions::default().include([ids[2], ids[1]]))
        .unwrap();
    assert_eq!(table_ids(&table), [2, 1]);

    cmp.del_timer(ids[0]).unwrap();
    assert_matches!(cmp.del_timer(ids[0]), Err(ConfigError::UnknownTimer(_)));
    let next_id = cmp.add_timer(clock.statement("new", Duration::from_millis(1)));
    assert_eq!(next_id, TimerId::from(3));
}

#[test]
fn managing_stats() {
    static FLAG: AtomicBool = AtomicBool::new(false);

    let clock = ManualClock::default();
    let mut cmp = create_compare(&clock, &FLAG);
    let fast_id = cmp.add_timer(clock.statement("fast", Duration::from_millis(1)));
    let slow_id = cmp.add_timer(clock.statement("slow", Duration::from_millis(4)));
    cmp.run(&RunOptions::default().with_repeat(3).with_number(1))
        .unwrap();

    cmp.add_stat("Total", |durations: &[f64]| Some(durations.iter().sum::<f64>()))
        .unwrap();
    assert_eq!(
        cmp.stat_names().collect::<Vec<_>>(),
        ["mean", "median", "min", "max", "std", "total"]
    );
    let slow_total = cmp.get_result(slow_id).unwrap().stats.get("total").unwrap();
    assert_close(slow_total, 0.012);
    assert_eq!(cmp.get_max("TOTAL").unwrap().unwrap().id, slow_id);
    assert_eq!(cmp.get_min("total").unwrap().unwrap().id, fast_id);

    let table = cmp
        .render_results(&PrintOptions::default().sort_by("total").stats(["total"]))
        .unwrap();
    assert!(table.contains("Total ↓"), "{table}");
    assert!(!table.contains("Median"), "{table}");

    assert_matches!(
        cmp.add_stat("_private", |_: &[f64]| -> Option<f64> { None }),
        Err(ConfigError::ReservedStatName { .. })
    );
    assert_matches!(
        cmp.add_stat("fn", |_: &[f64]| -> Option<f64> { None }),
        Err(ConfigError::KeywordStatName { .. })
    );
    assert_matches!(
        cmp.add_stat("p 99", |_: &[f64]| -> Option<f64> { None }),
        Err(ConfigError::InvalidStatName { .. })
    );

    cmp.del_stat("total").unwrap();
    assert_eq!(cmp.get_result(slow_id).unwrap().stats.get("total"), None);
    let err = cmp.get_min("total").unwrap_err();
    assert_matches!(err, ConfigError::UnknownStatistic { .. });
    let err = cmp
        .render_results(&PrintOptions::default().sort_by("total"))
        .unwrap_err();
    assert_matches!(err, ConfigError::UnknownStatistic { .. });
}

#[test]
fn results_before_run() {
    let mut cmp = Compare::default();
    let id = cmp.add_timer(Statement::from_fn("noop", || ()));
    let result = cmp.get_result(id).unwrap();
    assert_eq!(result.repeat, 0);
    assert_eq!(result.number, 0);
    assert!(result.stats.iter().all(|(_, value)| value.is_none()));
    assert_eq!(cmp.get_min("mean").unwrap().map(|res| res.id), None);
    assert!(cmp.get_result(TimerId::from(1)).is_none());

    let table = cmp.render_results(&PrintOptions::default()).unwrap();
    assert!(table.contains("noop()"), "{table}");
    assert!(table.contains("0 executions"), "{table}");
}

#[cfg(unix)]
mod shell {
    use timeit_compare::Namespace;

    use super::*;

    #[test]
    fn comparing_shell_commands() {
        static FLAG: AtomicBool = AtomicBool::new(false);

        let mut cmp = Compare::default().with_interrupt_flag(&FLAG);
        let namespace = Namespace::new().into_shared();
        namespace.borrow_mut().set_var("EXPECTED", "42");

        let fast_id = cmp.add_timer("true");
        let slow_id = cmp.add_timer("sleep 0.05");
        let spec = TimerSpec::new(r#"test "$EXPECTED" = 42"#).with_namespace(namespace);
        let env_id = cmp.add_timer(spec);
        let failing_id = cmp.add_timer("exit 3");

        let options = RunOptions::default().with_repeat(2).with_number(1);
        assert_eq!(cmp.run(&options).unwrap(), RunOutcome::Completed);

        let fast_mean = cmp.get_result(fast_id).unwrap().stats.get("mean").unwrap();
        let slow_mean = cmp.get_result(slow_id).unwrap().stats.get("mean").unwrap();
        assert!(slow_mean >= 0.05, "{slow_mean}");
        assert!(fast_mean < slow_mean);
        assert!(cmp.get_result(env_id).unwrap().error.is_none());

        let failing_result = cmp.get_result(failing_id).unwrap();
        assert_eq!(failing_result.repeat, 0);
        let err = failing_result.error.as_ref().unwrap();
        assert_eq!(err.marker(), "Exit(3)");

        let table = cmp.render_results(&PrintOptions::default()).unwrap();
        assert!(table.contains("test \"$EXPECTED\" = 42"), "{table}");
        assert!(table.contains("Exit(3) (r=0)"), "{table}");
    }
}
