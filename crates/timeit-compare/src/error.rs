//! Error types.

use crate::TimerId;

/// Error in the configuration of a comparison. Such errors are raised before any measurements
/// are taken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Statistic name is empty.
    #[error("stat name must not be empty")]
    EmptyStatName,
    /// Statistic name is not a valid identifier.
    #[error("stat name must be a valid identifier, not `{name}`")]
    InvalidStatName {
        /// Offending name.
        name: String,
    },
    /// Statistic name is a keyword.
    #[error("stat name cannot be a keyword: `{name}`")]
    KeywordStatName {
        /// Offending name.
        name: String,
    },
    /// Statistic name starts with an underscore; such names are reserved.
    #[error("stat name cannot start with an underscore: `{name}`")]
    ReservedStatName {
        /// Offending name.
        name: String,
    },
    /// Statistic is not registered.
    #[error("stat `{name}` is not in the registered statistics: {{{available}}}")]
    UnknownStatistic {
        /// Requested name.
        name: String,
        /// Comma-separated list of registered stats.
        available: String,
    },
    /// Timer with the specified ID doesn't exist.
    #[error("timer with ID {0} does not exist")]
    UnknownTimer(TimerId),
    /// Both included and excluded timers are specified.
    #[error("include and exclude cannot be set simultaneously")]
    IncludeAndExclude,
    /// Number of repetitions is zero.
    #[error("`repeat` must be positive")]
    ZeroRepeat,
}

/// Top-level error returned by the convenience entry points.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Run was interrupted by the user. Partial results have been printed before this error
    /// is returned.
    #[error("comparison was interrupted")]
    Interrupted,
}
