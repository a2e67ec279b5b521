//! Options for running comparisons and printing results.

use std::{collections::BTreeSet, rc::Rc, time::Duration};

use crate::{error::ConfigError, stats::Aggregator, SharedNamespace, Statement, TimerId};

/// Selection of timers by their IDs.
#[derive(Debug, Clone, Default)]
pub(crate) struct Selection {
    include: Option<BTreeSet<TimerId>>,
    exclude: Option<BTreeSet<TimerId>>,
}

impl Selection {
    /// Selects timers among `all_ids` (assumed to be sorted), preserving their order.
    pub fn select(&self, all_ids: &[TimerId]) -> Result<Vec<TimerId>, ConfigError> {
        match (&self.include, &self.exclude) {
            (Some(_), Some(_)) => Err(ConfigError::IncludeAndExclude),
            (Some(include), None) => {
                let unknown = include
                    .iter()
                    .find(|id| all_ids.binary_search(id).is_err());
                if let Some(&unknown) = unknown {
                    return Err(ConfigError::UnknownTimer(unknown));
                }
                Ok(all_ids
                    .iter()
                    .copied()
                    .filter(|id| include.contains(id))
                    .collect())
            }
            (None, Some(exclude)) => Ok(all_ids
                .iter()
                .copied()
                .filter(|id| !exclude.contains(id))
                .collect()),
            (None, None) => Ok(all_ids.to_vec()),
        }
    }
}

fn collect_ids(ids: impl IntoIterator<Item = impl Into<TimerId>>) -> BTreeSet<TimerId> {
    ids.into_iter().map(Into::into).collect()
}

/// Options for [`Compare::run()`](crate::Compare::run()).
#[derive(Debug, Clone)]
pub struct RunOptions {
    repeat: usize,
    number: u64,
    time_budget: Duration,
    show_progress: bool,
    pub(crate) selection: Selection,
}

/// 5 repetitions, estimated number of executions with the 1s time budget, no progress bar,
/// all timers are run.
impl Default for RunOptions {
    fn default() -> Self {
        Self {
            repeat: 5,
            number: 0,
            time_budget: Duration::from_secs(1),
            show_progress: false,
            selection: Selection::default(),
        }
    }
}

impl RunOptions {
    /// Sets the number of trials for each statement. Must be positive.
    #[must_use]
    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets the number of statement executions in each trial. 0 means that the number will be estimated
    /// based on the [time budget](Self::with_time_budget()).
    #[must_use]
    pub fn with_number(mut self, number: u64) -> Self {
        self.number = number;
        self
    }

    /// Sets the approximate total execution time of all statements. Only used if the number of executions
    /// is estimated.
    #[must_use]
    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = time_budget;
        self
    }

    /// Sets whether to print a progress bar to stdout.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Runs only the specified timers. Results for other timers are cleared.
    #[must_use]
    pub fn include(mut self, ids: impl IntoIterator<Item = impl Into<TimerId>>) -> Self {
        self.selection.include = Some(collect_ids(ids));
        self
    }

    /// Runs all timers except for the specified ones. Results for the excluded timers are cleared.
    #[must_use]
    pub fn exclude(mut self, ids: impl IntoIterator<Item = impl Into<TimerId>>) -> Self {
        self.selection.exclude = Some(collect_ids(ids));
        self
    }

    /// Returns the number of trials for each statement.
    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Returns the number of executions per trial (0 if estimated).
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns the time budget.
    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }

    /// Checks whether a progress bar will be printed.
    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.repeat == 0 {
            return Err(ConfigError::ZeroRepeat);
        }
        if self.selection.include.is_some() && self.selection.exclude.is_some() {
            return Err(ConfigError::IncludeAndExclude);
        }
        Ok(())
    }
}

/// Options for [`Compare::print_results()`](crate::Compare::print_results()).
#[derive(Debug, Clone)]
pub struct PrintOptions {
    pub(crate) selection: Selection,
    pub(crate) sort_by: Option<String>,
    pub(crate) reverse: bool,
    pub(crate) stats: Option<Vec<String>>,
    pub(crate) percentage: Option<Vec<String>>,
    pub(crate) precision: usize,
}

/// All timers sorted by `mean` in the ascending order, all registered stats with percentages
/// for `mean`, 2 significant digits.
impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            selection: Selection::default(),
            sort_by: Some("mean".to_owned()),
            reverse: false,
            stats: None,
            percentage: None,
            precision: 2,
        }
    }
}

impl PrintOptions {
    /// Prints only the specified timers.
    #[must_use]
    pub fn include(mut self, ids: impl IntoIterator<Item = impl Into<TimerId>>) -> Self {
        self.selection.include = Some(collect_ids(ids));
        self
    }

    /// Prints all timers except for the specified ones.
    #[must_use]
    pub fn exclude(mut self, ids: impl IntoIterator<Item = impl Into<TimerId>>) -> Self {
        self.selection.exclude = Some(collect_ids(ids));
        self
    }

    /// Sorts timers by the specified stat.
    #[must_use]
    pub fn sort_by(mut self, stat: impl Into<String>) -> Self {
        self.sort_by = Some(stat.into());
        self
    }

    /// Disables sorting; timers are printed in the registration order.
    #[must_use]
    pub fn no_sort(mut self) -> Self {
        self.sort_by = None;
        self
    }

    /// Sets whether to sort in the descending order.
    #[must_use]
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Sets the stats displayed in the table. By default, all registered stats are displayed.
    #[must_use]
    pub fn stats(mut self, stats: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.stats = Some(stats.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the stats displayed with percentages relative to the maximum value. By default, only
    /// the sorting stat has percentages.
    #[must_use]
    pub fn percentage(mut self, stats: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.percentage = Some(stats.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the number of significant digits for time values. Clamped to `1..=8`.
    #[must_use]
    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }
}

/// Options for the [`compare()`](crate::compare()) entry point.
#[derive(Clone)]
pub struct CompareOptions {
    pub(crate) setup: Option<Statement>,
    pub(crate) namespace: Option<SharedNamespace>,
    pub(crate) stats: Vec<(String, Rc<dyn Aggregator>)>,
    pub(crate) run: RunOptions,
    pub(crate) print: PrintOptions,
}

impl std::fmt::Debug for CompareOptions {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stat_names: Vec<_> = self.stats.iter().map(|(name, _)| name).collect();
        formatter
            .debug_struct("CompareOptions")
            .field("setup", &self.setup)
            .field("namespace", &self.namespace)
            .field("stats", &stat_names)
            .field("run", &self.run)
            .field("print", &self.print)
            .finish()
    }
}

/// Shows the progress bar; otherwise, uses default run and print options.
impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            setup: None,
            namespace: None,
            stats: vec![],
            run: RunOptions::default().with_progress(true),
            print: PrintOptions::default(),
        }
    }
}

impl CompareOptions {
    /// Sets the setup for timers that don't specify setup themselves. An invocable setup
    /// is shared among all such timers.
    #[must_use]
    pub fn with_setup(mut self, setup: impl Into<Statement>) -> Self {
        self.setup = Some(setup.into());
        self
    }

    /// Sets the namespace for timers that don't specify a namespace themselves. The namespace
    /// is shared among all such timers.
    #[must_use]
    pub fn with_namespace(mut self, namespace: SharedNamespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Registers an additional stat.
    #[must_use]
    pub fn with_stat(
        mut self,
        name: impl Into<String>,
        aggregator: impl Aggregator + 'static,
    ) -> Self {
        self.stats.push((name.into(), Rc::new(aggregator)));
        self
    }

    /// Sets run options.
    #[must_use]
    pub fn with_run_options(mut self, options: RunOptions) -> Self {
        self.run = options;
        self
    }

    /// Sets print options.
    #[must_use]
    pub fn with_print_options(mut self, options: PrintOptions) -> Self {
        self.print = options;
        self
    }
}
