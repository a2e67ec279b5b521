//! `timeit-compare` measures wall-clock execution times of several statements across repeated trials,
//! computes statistics for them and prints a ranked comparison table.
//!
//! # Features
//!
//! - Statements can be Rust closures or source code executed by an [`Interpreter`]
//!   (by default, the OS shell).
//! - The number of executions per trial can be estimated automatically so that the entire comparison
//!   fits into a time budget.
//! - Pluggable statistics: `mean`, `median`, `min`, `max` and `std` are registered by default;
//!   custom ones can be added with [`Compare::add_stat()`].
//! - Failing statements don't abort the comparison; the error is recorded for the failing timer,
//!   and other timers continue to be measured.
//! - Pressing Ctrl+C during a run stops it and prints partial results.
//!
//! # How to use
//!
//! The simplest way to compare statements is the [`compare()`] function:
//!
//! ```no_run
//! use timeit_compare::{compare, CompareOptions, Statement};
//!
//! let timers = [
//!     Statement::from_fn("vec_push", || {
//!         let mut v = Vec::new();
//!         for i in 0..1_000 {
//!             v.push(i);
//!         }
//!         v
//!     }),
//!     Statement::from_fn("vec_collect", || (0..1_000).collect::<Vec<_>>()),
//! ];
//! compare(timers, &CompareOptions::default())?;
//! # Ok::<_, timeit_compare::Error>(())
//! ```
//!
//! This prints a table like this:
//!
//! ```text
//!                            Table 1. Comparison Results (unit: s)
//! ╭────┬───────────────┬─────┬──────────────────────────┬────────┬────────┬────────┬────────╮
//! │ Id │     Stmt      │ Rpt │          Mean ↓          │ Median │  Min   │  Max   │  Std   │
//! ├────┼───────────────┼─────┼────────┬───────┬─────────┼────────┼────────┼────────┼────────┤
//! │ 1  │ vec_collect() │  5  │ 1.5e-7 │ 10.0% │ ▋       │ 1.5e-7 │ 1.5e-7 │ 1.6e-7 │ 3.3e-9 │
//! │ 0  │  vec_push()   │  5  │ 1.5e-6 │ 100.% │ ███████ │ 1.5e-6 │ 1.5e-6 │ 1.6e-6 │ 2.1e-8 │
//! ╰────┴───────────────┴─────┴────────┴───────┴─────────┴────────┴────────┴────────┴────────╯
//! 128205 executions for each statement per repetition
//! total execution time 1.0000s
//! ```
//!
//! For finer control (e.g., running the same timers several times, or accessing results
//! programmatically), use [`Compare`] directly.
//!
//! ## Command-line interface
//!
//! The `timeit-compare` binary compares shell commands:
//!
//! ```text
//! timeit-compare 'sleep 0.01' 'sleep 0.02' --repeat 3
//! ```
//!
//! Run `timeit-compare --help` for the list of supported options.
//!
//! # Crate features
//!
//! ## `serde`
//!
//! *(Off by default)*
//!
//! Derives `serde::{Serialize, Deserialize}` for [`ComparisonResult`] and related types.
//! Useful to export comparison results.

// Documentation settings.
#![doc(html_root_url = "https://docs.rs/timeit-compare/0.1.0")]
// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub use crate::{
    compare::{compare, Compare},
    error::{ConfigError, Error},
    interrupt::{sigint_flag, InterruptGuard},
    options::{CompareOptions, PrintOptions, RunOptions},
    run::RunOutcome,
    statement::{
        ExecutionError, Interpreter, Namespace, SharedNamespace, ShellInterpreter, Statement,
    },
    stats::{Aggregator, Max, Mean, Median, Min, Stats, StdDev},
    timer::{Clock, ComparisonResult, MonotonicClock, TimerId, TimerSpec},
};

mod compare;
mod error;
mod interrupt;
mod options;
mod report;
pub mod reporter;
mod run;
mod statement;
mod stats;
mod timer;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
