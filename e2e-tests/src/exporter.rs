use std::{collections::BTreeMap, env, fs, io};

use timeit_compare::{Compare, ComparisonResult, TimerId, TimerSpec};

pub const EXPORTER_OUTPUT_VAR: &str = "TIMEIT_COMPARE_RESULTS_JSON";

/// Exports comparison results keyed by the timer label.
#[derive(Debug, Default)]
pub(crate) struct ResultsExporter {
    labels: Vec<(String, TimerId)>,
}

impl ResultsExporter {
    pub(crate) fn add(&mut self, cmp: &mut Compare, label: &str, spec: impl Into<TimerSpec>) {
        let id = cmp.add_timer(spec);
        self.labels.push((label.to_owned(), id));
    }

    pub(crate) fn export(&self, cmp: &Compare) {
        let Ok(out_path) = env::var(EXPORTER_OUTPUT_VAR) else {
            return;
        };
        let results: BTreeMap<&str, &ComparisonResult> = self
            .labels
            .iter()
            .filter_map(|(label, id)| Some((label.as_str(), cmp.get_result(*id)?)))
            .collect();

        let out_file = fs::File::create(&out_path).unwrap_or_else(|err| {
            panic!("Failed writing outputs to `{out_path}`: {err}");
        });
        let out_file = io::BufWriter::new(out_file);
        serde_json::to_writer_pretty(out_file, &results).expect("failed exporting results");
    }
}
