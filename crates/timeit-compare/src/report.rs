//! Building comparison tables from timer records.

use std::collections::{HashMap, HashSet};

use crate::{
    error::ConfigError,
    options::{PrintOptions, Selection},
    reporter::{progress_bar, HeaderCell, Table},
    stats::StatRegistry,
    timer::TimerRecord,
    TimerId,
};

/// Placeholder for unavailable values.
const NULL: &str = "-";
/// Max length of statement labels in chars.
const MAX_LABEL_LEN: usize = 25;
const MIN_PRECISION: usize = 1;
const MAX_PRECISION: usize = 8;

/// Validated [`PrintOptions`].
#[derive(Debug)]
pub(crate) struct ReportPlan {
    selection: Selection,
    sort_by: Option<String>,
    reverse: bool,
    stats: Vec<String>,
    percentage: HashSet<String>,
    precision: usize,
}

impl PrintOptions {
    pub(crate) fn resolve(
        &self,
        registry: &StatRegistry,
        timer_ids: &[TimerId],
    ) -> Result<ReportPlan, ConfigError> {
        self.selection.select(timer_ids)?;

        let sort_by = self
            .sort_by
            .as_deref()
            .map(|name| registry.resolve(name))
            .transpose()?;
        let stats = match &self.stats {
            Some(stats) => stats
                .iter()
                .map(|name| registry.resolve(name))
                .collect::<Result<Vec<_>, _>>()?,
            None => registry.names().map(str::to_owned).collect(),
        };
        let percentage = match &self.percentage {
            Some(stats) => stats
                .iter()
                .map(|name| registry.resolve(name))
                .collect::<Result<HashSet<_>, _>>()?,
            None => sort_by.iter().cloned().collect(),
        };

        Ok(ReportPlan {
            selection: self.selection.clone(),
            sort_by,
            reverse: self.reverse,
            stats,
            percentage,
            precision: self.precision.clamp(MIN_PRECISION, MAX_PRECISION),
        })
    }
}

impl ReportPlan {
    pub fn select<'a>(
        &self,
        records: impl Iterator<Item = &'a TimerRecord> + Clone,
    ) -> Result<Vec<&'a TimerRecord>, ConfigError> {
        let all_ids: Vec<_> = records.clone().map(|record| record.id).collect();
        let selected = self.selection.select(&all_ids)?;
        Ok(records
            .filter(|record| selected.binary_search(&record.id).is_ok())
            .collect())
    }

    /// Sorts records by the sorting stat. Records without the stat value are placed at the end
    /// in the registration order.
    fn sort(&self, records: &mut Vec<&TimerRecord>) {
        let Some(sort_by) = &self.sort_by else {
            return;
        };
        let (mut defined, undefined): (Vec<_>, Vec<_>) = records
            .drain(..)
            .partition(|record| record.stat(sort_by).is_some());
        defined.sort_by(|x, y| {
            let (x, y) = (x.stat(sort_by), y.stat(sort_by));
            let ordering = x.unwrap_or(0.0).total_cmp(&y.unwrap_or(0.0));
            if self.reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });
        defined.extend(undefined);
        *records = defined;
    }

    fn header(&self, show_errors: bool) -> Vec<HeaderCell> {
        let mut header = vec![
            HeaderCell::new("Id", 1),
            HeaderCell::new("Stmt", 1),
            HeaderCell::new("Rpt", 1),
        ];
        for stat in &self.stats {
            let mut title = title_case(stat);
            if self.sort_by.as_ref() == Some(stat) {
                title.push_str(if self.reverse { " ↑" } else { " ↓" });
            }
            let span = if self.percentage.contains(stat) { 3 } else { 1 };
            header.push(HeaderCell::new(title, span));
        }
        if show_errors {
            header.push(HeaderCell::new("Err", 1));
        }
        header
    }

    /// Builds the comparison table for the selected records.
    pub fn build_table(
        &self,
        mut records: Vec<&TimerRecord>,
        number: u64,
        repeat: usize,
        table_number: usize,
    ) -> Table {
        self.sort(&mut records);

        let mut max_values: HashMap<&str, f64> = self
            .percentage
            .iter()
            .map(|stat| (stat.as_str(), 0.0))
            .collect();
        for record in &records {
            for (stat, max_value) in &mut max_values {
                if let Some(value) = record.stat(stat) {
                    *max_value = max_value.max(value);
                }
            }
        }

        let show_errors = records.iter().any(|record| record.error().is_some());
        let body = records
            .iter()
            .map(|record| self.row(record, &max_values, repeat, show_errors))
            .collect();

        let total_time: f64 = records
            .iter()
            .map(|record| record.total_elapsed().as_secs_f64())
            .sum();
        let plural = if number == 1 { "" } else { "s" };
        Table {
            title: format!("Table {table_number}. Comparison Results (unit: s)"),
            header: self.header(show_errors),
            body,
            notes: vec![
                format!("{number} execution{plural} for each statement per repetition"),
                format!("total execution time {total_time:.4}s"),
            ],
        }
    }

    fn row(
        &self,
        record: &TimerRecord,
        max_values: &HashMap<&str, f64>,
        repeat: usize,
        show_errors: bool,
    ) -> Vec<String> {
        let completed = record.durations().len();
        let mut row = vec![
            record.id.to_string(),
            truncate_label(&record.label()),
            completed.to_string(),
        ];

        for stat in &self.stats {
            let value = record.stat(stat);
            row.push(value.map_or_else(|| NULL.to_owned(), |v| format_time(v, self.precision)));
            if let Some(&max_value) = max_values.get(stat.as_str()) {
                if let Some(value) = value {
                    let fraction = if max_value == 0.0 { 1.0 } else { value / max_value };
                    let pct_precision = self.precision.saturating_sub(2);
                    row.push(format_percentage(fraction, pct_precision));
                    row.push(progress_bar(fraction, 5 + self.precision));
                } else {
                    row.push(NULL.to_owned());
                    row.push(NULL.to_owned());
                }
            }
        }

        if show_errors {
            let cell = match record.error() {
                Some(err) if completed < repeat => format!("{} (r={completed})", err.marker()),
                Some(err) => err.marker(),
                None => String::new(),
            };
            row.push(cell);
        }
        row
    }
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() > MAX_LABEL_LEN {
        let mut truncated: String = label.chars().take(MAX_LABEL_LEN - 1).collect();
        truncated.push('…');
        truncated
    } else {
        label.to_owned()
    }
}

/// Uppercases the first letter of each alphabetic run and lowercases other letters.
fn title_case(name: &str) -> String {
    let mut title = String::with_capacity(name.len());
    let mut in_word = false;
    for ch in name.chars() {
        if ch.is_alphabetic() {
            if in_word {
                title.extend(ch.to_lowercase());
            } else {
                title.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            title.push(ch);
            in_word = false;
        }
    }
    title
}

/// Formats a time value with the specified number of significant digits, keeping trailing zeros
/// and the decimal point (e.g., `12.`). Uses the scientific notation for large and small values,
/// with the exponent not padded (e.g., `1.2e-5` or `3.e+2`).
pub(crate) fn format_time(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let digits = digits.max(1);
    let scientific = format!("{value:.prec$e}", prec = digits - 1);
    let point = if digits == 1 { "." } else { "" };
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    let digits = i32::try_from(digits).unwrap_or(i32::MAX);
    if exponent < -4 || exponent >= digits {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}{point}e{sign}{}", exponent.unsigned_abs())
    } else {
        let decimals = usize::try_from(digits - 1 - exponent).unwrap_or(0);
        let point = if decimals == 0 { "." } else { "" };
        format!("{value:.decimals$}{point}")
    }
}

/// Formats a fraction as a percentage. Fractions noticeably less than 1 get more decimal places
/// so that they are distinguishable from 100%.
pub(crate) fn format_percentage(fraction: f64, precision: usize) -> String {
    let exponent = i32::try_from(precision).unwrap_or(i32::MAX).saturating_add(4);
    let threshold = 1.0 - 5.0 * 0.1_f64.powi(exponent);
    let decimals = if fraction >= threshold {
        precision
    } else if fraction >= 0.1 * threshold {
        precision + 1
    } else {
        precision + 2
    };
    let point = if decimals == 0 { "." } else { "" };
    format!("{:.decimals$}{point}%", fraction * 100.0)
}
