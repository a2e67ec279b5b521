use std::{env, hint::black_box, process::ExitCode, thread, time::Duration};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use timeit_compare::{
    Compare, Error, InterruptGuard, PrintOptions, RunOptions, Statement, TimerSpec,
};

use crate::exporter::ResultsExporter;
pub use crate::exporter::EXPORTER_OUTPUT_VAR;

mod exporter;

const RNG_SEED: u64 = 123;
/// Argument switching to the long-running comparison that is expected to be interrupted.
pub const LONG_RUN_ARG: &str = "long";

fn fibonacci(n: u64) -> u64 {
    match n {
        0 | 1 => 1,
        n => fibonacci(n - 1) + fibonacci(n - 2),
    }
}

fn add_timers(cmp: &mut Compare, exporter: &mut ResultsExporter) {
    exporter.add(
        cmp,
        "fib_short",
        Statement::from_fn("fib_short", || fibonacci(black_box(10))),
    );
    exporter.add(
        cmp,
        "fib_long",
        Statement::from_fn("fib_long", || fibonacci(black_box(20))),
    );

    let mut rng = SmallRng::seed_from_u64(RNG_SEED);
    let random_data: Vec<u64> = (0..1_000).map(|_| rng.gen()).collect();
    // Setup restores unsorted data before each trial.
    let sort = TimerSpec::new(Statement::invocable("sort", |namespace| {
        if let Some(data) = namespace.get_mut::<Vec<u64>>("data") {
            data.sort_unstable();
        }
    }))
    .with_setup(Statement::invocable("shuffle", move |namespace| {
        namespace.insert("data", random_data.clone());
    }));
    exporter.add(cmp, "sort", sort);

    exporter.add(
        cmp,
        "panic",
        Statement::from_fn("panic", || -> u64 { panic!("oops") }),
    );
}

fn run(cmp: &mut Compare, run_options: &RunOptions) -> Result<(), Error> {
    let _guard = InterruptGuard::install().ok();
    cmp.run_and_print(run_options, &PrintOptions::default().precision(3))
}

pub fn main() -> ExitCode {
    let mut cmp = Compare::default();
    let mut exporter = ResultsExporter::default();
    let run_options = if env::args().nth(1).as_deref() == Some(LONG_RUN_ARG) {
        exporter.add(
            &mut cmp,
            "sleep",
            Statement::from_fn("sleep", || thread::sleep(Duration::from_millis(1))),
        );
        RunOptions::default()
            .with_repeat(100_000)
            .with_number(1)
            .with_progress(false)
    } else {
        add_timers(&mut cmp, &mut exporter);
        RunOptions::default().with_progress(false)
    };

    let result = run(&mut cmp, &run_options);
    exporter.export(&cmp);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Interrupted) => ExitCode::from(130),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
