//! Benchmark report parsing.
//!
//! The engine prints its benchmark results as free-form text. Metrics are
//! picked out by their labels:
//!
//! ```text
//! Total Evals: 1843200
//! Time:        2.001s
//! EPS:         921139 (Evals Per Second)
//! === Aggregate Efficiency Metrics ===
//! Total Nodes:      4211871
//! Total Time:       3.52s
//! Global NPS:       1196554
//! Move Ordering:    91.3% (First-move cutoffs/Total cutoffs)
//! Q-Search Load:    42.7% (Nodes spent in Q-search)
//! TT Hit Rate:      18.2%
//! --- Benchmark Complete ---
//! ```

use serde::{Deserialize, Serialize};

const LABEL_TOTAL_EVALS: &str = "Total Evals:";
const LABEL_EVAL_TIME: &str = "Time:";
const LABEL_EPS: &str = "EPS:";
const LABEL_TOTAL_NODES: &str = "Total Nodes:";
const LABEL_TOTAL_TIME: &str = "Total Time:";
const LABEL_GLOBAL_NPS: &str = "Global NPS:";
const LABEL_MOVE_ORDERING: &str = "Move Ordering:";
const LABEL_QSEARCH_LOAD: &str = "Q-Search Load:";
const LABEL_TT_HIT_RATE: &str = "TT Hit Rate:";

/// Metrics collected from a benchmark run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Search throughput in nodes per second.
    pub nps: Option<u64>,
    /// Static evaluations per second.
    pub eval_throughput: Option<u64>,
    /// Static evaluations performed.
    pub total_evals: Option<u64>,
    /// Seconds spent in the evaluation phase.
    pub eval_seconds: Option<f64>,
    /// Nodes searched across all benchmark positions.
    pub nodes: Option<u64>,
    /// Seconds spent in the search phase.
    pub elapsed_seconds: Option<f64>,
    /// Share of beta cutoffs produced by the first move tried.
    pub move_ordering_pct: Option<f64>,
    /// Share of nodes spent in quiescence search.
    pub qsearch_load_pct: Option<f64>,
    /// Share of nodes answered from the transposition table.
    pub tt_hit_rate_pct: Option<f64>,
    /// Every line the engine printed while benchmarking.
    pub raw_lines: Vec<String>,
    /// True when the run timed out before `--- Benchmark Complete ---`.
    pub is_partial: bool,
}

impl BenchmarkReport {
    /// Record one line of benchmark output, updating any metric it carries.
    pub fn absorb(&mut self, line: &str) {
        self.raw_lines.push(line.to_string());

        let line = line.trim();
        if let Some(v) = value_after(line, LABEL_TOTAL_EVALS) {
            self.total_evals = parse_u64(v);
        } else if let Some(v) = value_after(line, LABEL_EVAL_TIME) {
            self.eval_seconds = parse_f64(v);
        } else if let Some(v) = value_after(line, LABEL_EPS) {
            self.eval_throughput = parse_u64(v);
        } else if let Some(v) = value_after(line, LABEL_TOTAL_NODES) {
            self.nodes = parse_u64(v);
        } else if let Some(v) = value_after(line, LABEL_TOTAL_TIME) {
            self.elapsed_seconds = parse_f64(v);
        } else if let Some(v) = value_after(line, LABEL_GLOBAL_NPS) {
            self.nps = parse_u64(v);
        } else if let Some(v) = value_after(line, LABEL_MOVE_ORDERING) {
            self.move_ordering_pct = parse_f64(v);
        } else if let Some(v) = value_after(line, LABEL_QSEARCH_LOAD) {
            self.qsearch_load_pct = parse_f64(v);
        } else if let Some(v) = value_after(line, LABEL_TT_HIT_RATE) {
            self.tt_hit_rate_pct = parse_f64(v);
        }
    }

    /// Serialize the report for an HTTP or storage layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// First token following `label`, if the line starts with it.
fn value_after<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix(label)?.split_whitespace().next()
}

/// Strip the unit suffix the engine prints after a number.
fn numeric(token: &str) -> &str {
    token.trim_end_matches(['%', 's'])
}

fn parse_u64(token: &str) -> Option<u64> {
    let token = numeric(token);
    token
        .parse::<u64>()
        .ok()
        .or_else(|| token.parse::<f64>().ok().map(|v| v.round() as u64))
}

fn parse_f64(token: &str) -> Option<f64> {
    numeric(token).parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[&str] = &[
        "--- Starting Benchmark Suite ---",
        "[Running Eval Throughput Test (2000ms)]",
        "Total Evals: 1843200",
        "Time:        2.001s",
        "EPS:         921139 (Evals Per Second)",
        "[Running Search Test - Fixed Depth: 9]",
        "FEN (Partial)                 Nodes       Time(s)   NPS       Ordering%",
        "rnbqkbnr/pppppppp/8/8/8/8...  1203344     1.020     1179748   92.1%",
        "=== Aggregate Efficiency Metrics ===",
        "Total Nodes:      4211871",
        "Total Time:       3.52s",
        "Global NPS:       1196554",
        "Move Ordering:    91.3% (First-move cutoffs/Total cutoffs)",
        "Q-Search Load:    42.7% (Nodes spent in Q-search)",
        "TT Hit Rate:      18.2%",
    ];

    #[test]
    fn parses_all_metrics() {
        let mut report = BenchmarkReport::default();
        for line in SAMPLE {
            report.absorb(line);
        }

        assert_eq!(report.total_evals, Some(1_843_200));
        assert_eq!(report.eval_seconds, Some(2.001));
        assert_eq!(report.eval_throughput, Some(921_139));
        assert_eq!(report.nodes, Some(4_211_871));
        assert_eq!(report.elapsed_seconds, Some(3.52));
        assert_eq!(report.nps, Some(1_196_554));
        assert_eq!(report.move_ordering_pct, Some(91.3));
        assert_eq!(report.qsearch_load_pct, Some(42.7));
        assert_eq!(report.tt_hit_rate_pct, Some(18.2));
        assert_eq!(report.raw_lines.len(), SAMPLE.len());
        assert!(!report.is_partial);
    }

    #[test]
    fn total_time_is_not_eval_time() {
        let mut report = BenchmarkReport::default();
        report.absorb("Total Time:       3.52s");
        assert_eq!(report.elapsed_seconds, Some(3.52));
        assert_eq!(report.eval_seconds, None);
    }

    #[test]
    fn table_rows_are_kept_but_not_parsed() {
        let mut report = BenchmarkReport::default();
        report.absorb("rnbqkbnr/pppppppp/8/8/8/8...  1203344     1.020     1179748   92.1%");
        assert_eq!(report, BenchmarkReport {
            raw_lines: vec![
                "rnbqkbnr/pppppppp/8/8/8/8...  1203344     1.020     1179748   92.1%".into()
            ],
            ..Default::default()
        });
    }

    #[test]
    fn malformed_values_are_ignored() {
        let mut report = BenchmarkReport::default();
        report.absorb("Global NPS:       n/a");
        report.absorb("TT Hit Rate:");
        assert_eq!(report.nps, None);
        assert_eq!(report.tt_hit_rate_pct, None);
    }

    #[test]
    fn float_counts_are_rounded() {
        let mut report = BenchmarkReport::default();
        report.absorb("Total Nodes: 1.5e3");
        assert_eq!(report.nodes, Some(1500));
    }

    #[test]
    fn json_shape() {
        let mut report = BenchmarkReport::default();
        report.absorb("Global NPS:       1000");
        report.is_partial = true;

        let json = report.to_json();
        assert_eq!(json["nps"], 1000);
        assert_eq!(json["is_partial"], true);
        assert!(json["nodes"].is_null());
    }
}
