//! Result table and report writers.
//!
//! [`ResultTable`] holds the flat list of [`EvaluationRecord`]s of a run. It
//! groups them per (strategy, set), the same grouping as a box plot with the
//! strategy on the x axis and the set as hue, and writes:
//!
//! - JSON lines: one record per line
//! - CSV: one record per row, an undefined correlation is an empty cell
//! - Markdown: one summary table per metric, plus the list of failures

mod summary;

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

pub use summary::BoxStats;

use crate::evaluation::{EvalError, EvaluationRecord, EvaluationRun, EvaluationSet, Strategy};

/// Summary of one (strategy, set) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub strategy: Strategy,
    pub set: EvaluationSet,
    pub precision: BoxStats,
    pub correlation: BoxStats,
}

/// Collected evaluation records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    records: Vec<EvaluationRecord>,
}

impl ResultTable {
    pub fn new(records: Vec<EvaluationRecord>) -> Self {
        Self { records }
    }

    pub fn from_run(run: &EvaluationRun) -> Self {
        Self::new(run.records.clone())
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Box-plot statistics per (strategy, set), ordered by strategy then set.
    pub fn summarize(&self) -> Vec<GroupSummary> {
        let mut keys: Vec<(Strategy, EvaluationSet)> =
            self.records.iter().map(|r| (r.strategy, r.set)).collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .map(|(strategy, set)| {
                let group = || {
                    self.records
                        .iter()
                        .filter(move |r| r.strategy == strategy && r.set == set)
                };
                GroupSummary {
                    strategy,
                    set,
                    precision: BoxStats::from_values(group().map(|r| Some(r.precision_at_n))),
                    correlation: BoxStats::from_values(group().map(|r| r.rank_correlation)),
                }
            })
            .collect()
    }

    /// Write one JSON object per record, newline separated.
    pub fn write_jsonl<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }

    /// Write records as CSV with a header row.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(
            writer,
            "task_id,strategy,set,precision_at_n,rank_correlation,correlation_folds,n_folds"
        )?;
        for r in &self.records {
            let rho = r.rank_correlation.map(|v| v.to_string()).unwrap_or_default();
            writeln!(
                writer,
                "{},{},{},{},{},{},{}",
                r.task_id, r.strategy, r.set, r.precision_at_n, rho, r.correlation_folds, r.n_folds
            )?;
        }
        writer.flush()
    }

    /// Write the per-group summaries as Markdown tables.
    ///
    /// `precision_name` and `correlation_name` title the two tables, e.g.
    /// `precision_at_20_out_100` and `spearmanr_100`.
    pub fn write_markdown<W: Write>(
        &self,
        mut writer: W,
        precision_name: &str,
        correlation_name: &str,
        failures: &[EvalError],
    ) -> io::Result<()> {
        let summary = self.summarize();

        let tables: [(&str, fn(&GroupSummary) -> BoxStats); 2] = [
            (precision_name, |g| g.precision),
            (correlation_name, |g| g.correlation),
        ];
        for (title, pick) in tables {
            writeln!(writer, "## {title}\n")?;
            writeln!(
                writer,
                "| strategy | set | count | missing | min | q1 | median | q3 | max | mean |"
            )?;
            writeln!(writer, "|---|---|---:|---:|---:|---:|---:|---:|---:|---:|")?;
            for group in &summary {
                let s = pick(group);
                writeln!(
                    writer,
                    "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                    group.strategy,
                    group.set,
                    s.count,
                    s.missing,
                    fmt_stat(s.min),
                    fmt_stat(s.q1),
                    fmt_stat(s.median),
                    fmt_stat(s.q3),
                    fmt_stat(s.max),
                    fmt_stat(s.mean),
                )?;
            }
            writeln!(writer)?;
        }

        if !failures.is_empty() {
            writeln!(writer, "## failures\n")?;
            for failure in failures {
                writeln!(writer, "- {failure}")?;
            }
            writeln!(writer)?;
        }

        writer.flush()
    }
}

fn fmt_stat(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{value:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TaskId;

    fn record(
        task: u32,
        strategy: Strategy,
        set: EvaluationSet,
        p: f64,
        rho: Option<f64>,
    ) -> EvaluationRecord {
        EvaluationRecord {
            task_id: TaskId(task),
            strategy,
            set,
            precision_at_n: p,
            rank_correlation: rho,
            correlation_folds: usize::from(rho.is_some()),
            n_folds: 1,
        }
    }

    fn table() -> ResultTable {
        ResultTable::new(vec![
            record(1, Strategy::ForestMeta, EvaluationSet::Test, 0.5, Some(0.2)),
            record(1, Strategy::QuadraticSurrogate, EvaluationSet::Test, 0.8, None),
            record(2, Strategy::ForestMeta, EvaluationSet::Test, 0.7, Some(0.4)),
            record(2, Strategy::ForestMeta, EvaluationSet::TrainTasks, 1.0, Some(0.9)),
        ])
    }

    #[test]
    fn summarize_groups_by_strategy_and_set() {
        let summary = table().summarize();
        let keys: Vec<_> = summary.iter().map(|g| (g.strategy, g.set)).collect();
        assert_eq!(
            keys,
            vec![
                (Strategy::QuadraticSurrogate, EvaluationSet::Test),
                (Strategy::ForestMeta, EvaluationSet::Test),
                (Strategy::ForestMeta, EvaluationSet::TrainTasks),
            ]
        );
        assert_eq!(summary[0].correlation.missing, 1);
        assert_eq!(summary[1].precision.count, 2);
        assert!((summary[1].precision.mean - 0.6).abs() < 1e-12);
    }

    #[test]
    fn csv_leaves_missing_correlation_empty() {
        let mut buf = Vec::new();
        table().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2], "1,quadratic_surrogate,test,0.8,,0,1");
        assert_eq!(lines[4], "2,RF_meta,train-tasks,1,0.9,1,1");
    }

    #[test]
    fn jsonl_uses_null_for_missing_correlation() {
        let mut buf = Vec::new();
        table().write_jsonl(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let second: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(second["strategy"], "quadratic_surrogate");
        assert!(second["rank_correlation"].is_null());

        let parsed: Vec<EvaluationRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed, table().records());
    }

    #[test]
    fn markdown_has_both_metric_tables() {
        let mut buf = Vec::new();
        table()
            .write_markdown(&mut buf, "precision_at_20_out_100", "spearmanr_100", &[])
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("## precision_at_20_out_100"));
        assert!(text.contains("## spearmanr_100"));
        assert!(text.contains("| quadratic_surrogate | test | 0 | 1 | n/a |"));
        assert!(!text.contains("## failures"));
    }

    #[test]
    fn markdown_propagates_write_errors() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let err = table()
            .write_markdown(Broken, "precision_at_20_out_100", "spearmanr_100", &[])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn markdown_lists_failures() {
        let failure = EvalError::new(
            TaskId(7),
            None,
            crate::data::DataError::TooFewTaskRows {
                task_id: TaskId(7),
                rows: 50,
                required: 100,
            },
        );
        let mut buf = Vec::new();
        table()
            .write_markdown(&mut buf, "p", "rho", &[failure])
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("## failures\n\n- task 7"));
    }
}
