//! Statistics engine: named aggregators over per-call durations.

use std::{collections::HashMap, fmt, panic, rc::Rc};

use once_cell::sync::Lazy;
use regex::Regex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Reduction of per-call durations (in seconds) to a single value.
///
/// Implemented for closures with the `Fn(&[f64]) -> Option<f64>` signature.
pub trait Aggregator {
    /// Evaluates the statistic. Returning `None` (or NaN) marks the statistic as unavailable;
    /// panics are caught and treated the same way.
    fn evaluate(&self, durations: &[f64]) -> Option<f64>;
}

impl<F> Aggregator for F
where
    F: Fn(&[f64]) -> Option<f64>,
{
    fn evaluate(&self, durations: &[f64]) -> Option<f64> {
        self(durations)
    }
}

/// Arithmetic mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Aggregator for Mean {
    #[allow(clippy::cast_precision_loss)] // fine for realistic number of trials
    fn evaluate(&self, durations: &[f64]) -> Option<f64> {
        if durations.is_empty() {
            return None;
        }
        Some(durations.iter().sum::<f64>() / durations.len() as f64)
    }
}

/// Median (the mean of two middle values for an even number of durations).
#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl Aggregator for Median {
    fn evaluate(&self, durations: &[f64]) -> Option<f64> {
        if durations.is_empty() {
            return None;
        }
        let mut sorted = durations.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        Some(if sorted.len() % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        })
    }
}

/// Minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

impl Aggregator for Min {
    fn evaluate(&self, durations: &[f64]) -> Option<f64> {
        durations.iter().copied().reduce(f64::min)
    }
}

/// Maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl Aggregator for Max {
    fn evaluate(&self, durations: &[f64]) -> Option<f64> {
        durations.iter().copied().reduce(f64::max)
    }
}

/// Sample standard deviation. Unavailable for fewer than 2 durations.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDev;

impl Aggregator for StdDev {
    #[allow(clippy::cast_precision_loss)] // fine for realistic number of trials
    fn evaluate(&self, durations: &[f64]) -> Option<f64> {
        if durations.len() < 2 {
            return None;
        }
        let mean = Mean.evaluate(durations)?;
        let sum_of_squares: f64 = durations.iter().map(|&x| (x - mean) * (x - mean)).sum();
        Some((sum_of_squares / (durations.len() - 1) as f64).sqrt())
    }
}

/// Evaluates an aggregator, mapping panics and NaNs to `None`.
pub(crate) fn evaluate(aggregator: &dyn Aggregator, durations: &[f64]) -> Option<f64> {
    let wrapped = panic::AssertUnwindSafe(|| aggregator.evaluate(durations));
    panic::catch_unwind(wrapped)
        .ok()
        .flatten()
        .filter(|value| !value.is_nan())
}

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{XID_Start}_]\p{XID_Continue}*$").expect("invalid identifier regex")
});

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Validates a stat name and normalizes it to lowercase.
pub(crate) fn normalize_name(name: &str) -> Result<String, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyStatName);
    }
    if !IDENTIFIER_REGEX.is_match(name) {
        return Err(ConfigError::InvalidStatName {
            name: name.to_owned(),
        });
    }
    // Keywords are case-sensitive, so `While` is a valid name.
    if KEYWORDS.contains(&name) {
        return Err(ConfigError::KeywordStatName {
            name: name.to_owned(),
        });
    }
    if name.starts_with('_') {
        return Err(ConfigError::ReservedStatName {
            name: name.to_owned(),
        });
    }
    Ok(name.to_lowercase())
}

/// Ordered registry of named aggregators.
#[derive(Clone)]
pub(crate) struct StatRegistry {
    entries: Vec<(String, Rc<dyn Aggregator>)>,
}

impl fmt::Debug for StatRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.names()).finish()
    }
}

/// Registers `mean`, `median`, `min`, `max` and `std`.
impl Default for StatRegistry {
    fn default() -> Self {
        let entries: Vec<(String, Rc<dyn Aggregator>)> = vec![
            ("mean".to_owned(), Rc::new(Mean)),
            ("median".to_owned(), Rc::new(Median)),
            ("min".to_owned(), Rc::new(Min)),
            ("max".to_owned(), Rc::new(Max)),
            ("std".to_owned(), Rc::new(StdDev)),
        ];
        Self { entries }
    }
}

impl StatRegistry {
    /// Registers a stat, overwriting the existing stat with the same name in place.
    /// Returns the normalized name.
    pub fn register(
        &mut self,
        name: &str,
        aggregator: Rc<dyn Aggregator>,
    ) -> Result<String, ConfigError> {
        let name = normalize_name(name)?;
        if let Some((_, existing)) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            *existing = aggregator;
        } else {
            self.entries.push((name.clone(), aggregator));
        }
        Ok(name)
    }

    pub fn unregister(&mut self, name: &str) -> Result<String, ConfigError> {
        let name = self.resolve(name)?;
        self.entries.retain(|(key, _)| *key != name);
        Ok(name)
    }

    /// Validates the name and checks that the stat is registered.
    pub fn resolve(&self, name: &str) -> Result<String, ConfigError> {
        let name = normalize_name(name)?;
        if self.get(&name).is_some() {
            Ok(name)
        } else {
            Err(ConfigError::UnknownStatistic {
                name,
                available: self.names().collect::<Vec<_>>().join(", "),
            })
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Aggregator> {
        self.entries
            .iter()
            .find_map(|(key, aggregator)| (key == name).then_some(aggregator.as_ref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn evaluate_all(&self, durations: &[f64]) -> HashMap<String, Option<f64>> {
        self.entries
            .iter()
            .map(|(name, aggregator)| (name.clone(), evaluate(aggregator.as_ref(), durations)))
            .collect()
    }

    /// Creates a snapshot of the values in the registration order.
    pub fn snapshot(&self, values: &HashMap<String, Option<f64>>) -> Stats {
        let entries = self
            .names()
            .map(|name| (name.to_owned(), values.get(name).copied().flatten()))
            .collect();
        Stats { entries }
    }
}

/// Values of all registered statistics for a single timer, in the registration order.
/// `None` values mark unavailable statistics.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Stats {
    entries: Vec<(String, Option<f64>)>,
}

impl Stats {
    /// Gets the value of a statistic. Returns `None` if the statistic is not registered or is unavailable.
    pub fn get(&self, name: &str) -> Option<f64> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find_map(|(key, value)| (*key == name).then_some(*value))
            .flatten()
    }

    /// Iterates over statistics names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> + '_ {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
    }

    /// Returns the number of statistics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether there are no statistics.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("stat is unavailable");
        assert!((actual - expected).abs() < 1e-12, "{actual} != {expected}");
    }

    #[test]
    fn default_stats() {
        let durations = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_close(Mean.evaluate(&durations), 2.8);
        assert_close(Median.evaluate(&durations), 3.0);
        assert_close(Median.evaluate(&durations[..4]), 2.0);
        assert_close(Min.evaluate(&durations), 1.0);
        assert_close(Max.evaluate(&durations), 5.0);
        assert_close(StdDev.evaluate(&durations), 1.788_854_381_999_831_7);
    }

    #[test]
    fn stats_on_short_sequences() {
        for aggregator in [&Mean as &dyn Aggregator, &Median, &Min, &Max, &StdDev] {
            assert_eq!(aggregator.evaluate(&[]), None);
        }
        assert_eq!(StdDev.evaluate(&[1.0]), None);
        assert_close(StdDev.evaluate(&[2.0, 2.0]), 0.0);
    }

    #[test]
    fn evaluating_misbehaving_aggregators() {
        let panicking = |_: &[f64]| -> Option<f64> { panic!("oops") };
        assert_eq!(evaluate(&panicking, &[1.0]), None);
        let nan = |_: &[f64]| Some(f64::NAN);
        assert_eq!(evaluate(&nan, &[1.0]), None);
        let sum = |durations: &[f64]| Some(durations.iter().sum::<f64>());
        assert_eq!(evaluate(&sum, &[1.0, 2.0]), Some(3.0));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let registry = StatRegistry::default();
        let durations = [0.5, 0.25, 0.125];
        assert_eq!(
            registry.evaluate_all(&durations),
            registry.evaluate_all(&durations)
        );
    }

    #[test]
    fn validating_stat_names() {
        assert_eq!(normalize_name("P99").unwrap(), "p99");
        assert_eq!(normalize_name("geo_mean").unwrap(), "geo_mean");
        assert_matches!(normalize_name(""), Err(ConfigError::EmptyStatName));
        assert_matches!(
            normalize_name("99th"),
            Err(ConfigError::InvalidStatName { name }) if name == "99th"
        );
        assert_matches!(
            normalize_name("p 99"),
            Err(ConfigError::InvalidStatName { .. })
        );
        assert_matches!(
            normalize_name("while"),
            Err(ConfigError::KeywordStatName { name }) if name == "while"
        );
        // Keywords are matched case-sensitively.
        assert_eq!(normalize_name("While").unwrap(), "while");
        assert_eq!(normalize_name("Self").unwrap(), "self");
        assert_matches!(
            normalize_name("_private"),
            Err(ConfigError::ReservedStatName { name }) if name == "_private"
        );
    }

    #[test]
    fn registering_stats() {
        let mut registry = StatRegistry::default();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["mean", "median", "min", "max", "std"]);

        let name = registry
            .register("Total", Rc::new(|d: &[f64]| Some(d.iter().sum::<f64>())))
            .unwrap();
        assert_eq!(name, "total");
        // Overwriting keeps the original position.
        registry
            .register("MEAN", Rc::new(|_: &[f64]| Some(0.0)))
            .unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["mean", "median", "min", "max", "std", "total"]);

        let values = registry.evaluate_all(&[1.0, 3.0]);
        let stats = registry.snapshot(&values);
        assert_eq!(stats.get("mean"), Some(0.0));
        assert_eq!(stats.get("Total"), Some(4.0));
        assert_eq!(stats.len(), 6);

        registry.unregister("median").unwrap();
        assert!(registry.get("median").is_none());
        assert_matches!(
            registry.unregister("median"),
            Err(ConfigError::UnknownStatistic { name, available })
                if name == "median" && available == "mean, min, max, std, total"
        );
    }
}
