//! Command-line options.

use std::{
    io::{self, IsTerminal},
    process::ExitCode,
    sync::Arc,
    time::{Duration, TryFromFloatSecsError},
};

use clap::{ColorChoice, Parser};
use timeit_compare::{
    reporter::{Logger, PrintingLogger, Verbosity},
    Compare, Error, InterruptGuard, Namespace, PrintOptions, RunOptions, ShellInterpreter,
    TimerSpec,
};

/// Separator between a statement and its setup in a single argument.
const SETUP_SEPARATOR: &str = ";;";
/// Conventional exit code for processes terminated by SIGINT.
const INTERRUPTED_EXIT_CODE: u8 = 130;
const CONFIG_ERROR_EXIT_CODE: u8 = 2;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid time budget: {0}")]
    TimeBudget(#[source] TryFromFloatSecsError),
    #[error("shell command must not be empty")]
    EmptyShell,
    #[error(transparent)]
    Compare(#[from] Error),
}

fn parse_env_var(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if name.is_empty() {
        return Err("variable name must not be empty".to_owned());
    }
    Ok((name.to_owned(), value.to_owned()))
}

/// Compares execution times of shell commands and prints a ranked table.
#[allow(clippy::struct_excessive_bools)] // fine for command-line args
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub(crate) struct Cli {
    /// Commands to compare. A command may be followed by `;;` and a setup command executed before
    /// each trial, e.g. `sort data.txt;;shuf -o data.txt data.txt`. Setup is not timed.
    #[arg(name = "STATEMENT", required = true)]
    statements: Vec<String>,
    /// Setup command for statements that don't specify their own setup.
    #[arg(long, short = 's', value_name = "CMD")]
    setup: Option<String>,

    /// Number of trials for each statement.
    #[arg(long, short = 'r', env = "TIMEIT_REPEAT", default_value_t = 5)]
    repeat: usize,
    /// Number of executions in each trial. If 0, the number is estimated based on `--time`.
    #[arg(long, short = 'n', default_value_t = 0)]
    number: u64,
    /// Approximate total execution time of the comparison in seconds.
    #[arg(
        long,
        short = 't',
        env = "TIMEIT_TIME",
        default_value_t = 1.0,
        value_name = "SECS"
    )]
    time: f64,
    /// Do not print the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Stat to sort the results by.
    #[arg(long, default_value = "mean", value_name = "STAT")]
    sort_by: String,
    /// Print results in the order of statements.
    #[arg(long, conflicts_with = "sort_by")]
    no_sort: bool,
    /// Sort in the descending order.
    #[arg(long)]
    reverse: bool,
    /// Comma-separated stats to display. By default, all stats are displayed.
    #[arg(long, value_delimiter = ',', value_name = "STATS")]
    stats: Option<Vec<String>>,
    /// Comma-separated stats to display with percentages. By default, only the sorting stat
    /// has percentages; pass an empty list to disable percentages.
    #[arg(long, value_delimiter = ',', value_name = "STATS", num_args = 0..)]
    percentage: Option<Vec<String>>,
    /// Number of significant digits in time values (1 to 8).
    #[arg(long, short = 'p', default_value_t = 2)]
    precision: usize,

    /// Environment variable for all statements and setups.
    #[arg(long = "env", short = 'e', value_name = "KEY=VALUE", value_parser = parse_env_var)]
    env_vars: Vec<(String, String)>,
    /// Shell to execute statements with, e.g. `bash -c`.
    #[arg(long, env = "TIMEIT_SHELL", value_name = "CMD")]
    shell: Option<String>,

    /// Sets coloring of the program output.
    #[arg(long, env = "COLOR", default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
    /// Output detailed information, e.g. on estimating the number of executions.
    #[arg(long)]
    verbose: bool,
    /// Do not output warnings.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn styling(&self) -> bool {
        match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stderr().is_terminal(),
        }
    }

    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// Splits the statement from its setup, falling back to the default setup.
    fn split_statement<'a>(&'a self, raw: &'a str) -> (&'a str, Option<&'a str>) {
        match raw.split_once(SETUP_SEPARATOR) {
            Some((statement, setup)) => (statement, Some(setup)),
            None => (raw, self.setup.as_deref()),
        }
    }

    fn run_options(&self) -> Result<RunOptions, CliError> {
        let time_budget = Duration::try_from_secs_f64(self.time).map_err(CliError::TimeBudget)?;
        Ok(RunOptions::default()
            .with_repeat(self.repeat)
            .with_number(self.number)
            .with_time_budget(time_budget)
            .with_progress(!self.no_progress))
    }

    fn print_options(&self) -> PrintOptions {
        let mut options = PrintOptions::default()
            .reverse(self.reverse)
            .precision(self.precision);
        options = if self.no_sort {
            options.no_sort()
        } else {
            options.sort_by(&self.sort_by)
        };
        if let Some(stats) = &self.stats {
            options = options.stats(stats.clone());
        }
        if let Some(percentage) = &self.percentage {
            options = options.percentage(percentage.clone());
        }
        options
    }

    fn create_compare(&self, logger: Arc<dyn Logger>) -> Result<Compare, CliError> {
        let interpreter = match &self.shell {
            Some(shell) => ShellInterpreter::parse(shell).ok_or(CliError::EmptyShell)?,
            None => ShellInterpreter::default(),
        };

        let mut namespace = Namespace::new();
        for (name, value) in &self.env_vars {
            namespace.set_var(name, value);
        }
        let namespace = namespace.into_shared();

        let mut cmp = Compare::default()
            .with_interpreter(interpreter)
            .with_logger(logger);
        for raw in &self.statements {
            let (statement, setup) = self.split_statement(raw);
            let mut spec = TimerSpec::new(statement).with_namespace(namespace.clone());
            if let Some(setup) = setup {
                spec = spec.with_setup(setup);
            }
            cmp.add_timer(spec);
        }
        Ok(cmp)
    }

    fn try_run(&self, logger: Arc<dyn Logger>) -> Result<(), CliError> {
        let run_options = self.run_options()?;
        let print_options = self.print_options();
        let mut cmp = self.create_compare(logger.clone())?;

        let _guard = match InterruptGuard::install() {
            Ok(guard) => Some(guard),
            Err(err) => {
                logger.warning(&format_args!("cannot install SIGINT handler: {err}"));
                None
            }
        };
        cmp.run_and_print(&run_options, &print_options)?;
        Ok(())
    }

    pub fn run(self) -> ExitCode {
        let logger = Arc::new(PrintingLogger::new(self.styling(), self.verbosity()));
        logger.debug(&format_args!("started with options: {self:?}"));

        match self.try_run(logger.clone()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(CliError::Compare(Error::Interrupted)) => ExitCode::from(INTERRUPTED_EXIT_CODE),
            Err(err) => {
                logger.error(&err);
                ExitCode::from(CONFIG_ERROR_EXIT_CODE)
            }
        }
    }
}
