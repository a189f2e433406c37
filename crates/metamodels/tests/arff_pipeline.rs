//! ARFF files on disk through the evaluation pipeline and report writers.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use metamodels::data::io::read_arff;
use metamodels::evaluation::EvaluationRecord;
use metamodels::testing::data::synthetic_tables;
use metamodels::{EvaluationData, ForestConfig, HarnessConfig, ResultTable, TaskEvaluator};

/// Write synthetic tables as ARFF files and return their paths.
///
/// Every fourth performance row uses the `sigmoid` kernel with a missing
/// `svc__gamma`, as in SVC run exports; the kernel filter has to drop those
/// rows before the table is built.
fn write_inputs(dir: &Path, n_tasks: usize, rows_per_task: usize) -> (PathBuf, PathBuf) {
    let (perf, meta) = synthetic_tables(n_tasks, rows_per_task, 99).unwrap();

    let mut text = String::from(
        "% synthetic SVC runs\n@RELATION svc\n\n\
         @ATTRIBUTE task_id NUMERIC\n\
         @ATTRIBUTE svc__kernel {rbf, sigmoid}\n\
         @ATTRIBUTE svc__gamma REAL\n\
         @ATTRIBUTE svc__C REAL\n\
         @ATTRIBUTE predictive_accuracy REAL\n\n@DATA\n",
    );
    for i in 0..perf.n_rows() {
        let (kernel, gamma) = if i % 4 == 3 {
            ("sigmoid", "?".to_string())
        } else {
            ("rbf", perf.params()[[i, 0]].to_string())
        };
        writeln!(
            text,
            "{},{},{},{},{}",
            perf.task_ids()[i],
            kernel,
            gamma,
            perf.params()[[i, 1]],
            perf.targets()[i]
        )
        .unwrap();
    }
    let perf_path = dir.join("performances.arff");
    fs::write(&perf_path, text).unwrap();

    let mut text = String::from("@relation 'meta features'\n@attribute task_id numeric\n");
    for name in meta.names() {
        writeln!(text, "@attribute {name} numeric").unwrap();
    }
    text.push_str("@data\n");
    for t in perf.distinct_tasks() {
        let values: Vec<String> = meta
            .get(t)
            .unwrap()
            .iter()
            .map(|v| if v.is_nan() { "?".to_string() } else { v.to_string() })
            .collect();
        writeln!(text, "{t},{}", values.join(",")).unwrap();
    }
    let meta_path = dir.join("metafeatures.arff");
    fs::write(&meta_path, text).unwrap();

    (perf_path, meta_path)
}

#[test]
fn arff_inputs_flow_through_to_reports() {
    let dir = tempfile::tempdir().unwrap();
    let (perf_path, meta_path) = write_inputs(dir.path(), 3, 60);

    let params = vec!["svc__gamma".to_string(), "svc__C".to_string()];
    let performances = read_arff(&perf_path)
        .unwrap()
        .filter_eq("svc__kernel", "rbf")
        .unwrap()
        .to_performance_table("task_id", &params, "predictive_accuracy")
        .unwrap();
    assert_eq!(performances.n_rows(), 3 * 45);

    let metafeatures = read_arff(&meta_path)
        .unwrap()
        .to_metafeature_table("task_id")
        .unwrap()
        .impute_missing(-1.0);
    let data = EvaluationData::join(performances, metafeatures).unwrap();

    let config = HarnessConfig::builder()
        .precision_at_n(5)
        .precision_out_of_k(30)
        .min_task_rows(40)
        .forest(ForestConfig::builder().n_trees(4).build().unwrap())
        .build()
        .unwrap();
    let run = TaskEvaluator::new(config.clone()).run(&data);
    assert!(run.failures.is_empty(), "{:?}", run.failures);

    let table = ResultTable::from_run(&run);
    let jsonl = dir.path().join("records.jsonl");
    table.write_jsonl(fs::File::create(&jsonl).unwrap()).unwrap();
    let summary = dir.path().join("summary.md");
    table
        .write_markdown(
            fs::File::create(&summary).unwrap(),
            &config.precision_metric_name(),
            &config.correlation_metric_name(),
            &run.failures,
        )
        .unwrap();

    let reread: Vec<EvaluationRecord> = fs::read_to_string(&jsonl)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(reread.len(), run.records.len());
    for (a, b) in reread.iter().zip(&run.records) {
        assert_eq!((a.task_id, a.strategy, a.set), (b.task_id, b.strategy, b.set));
        assert!((a.precision_at_n - b.precision_at_n).abs() < 1e-12);
        assert_eq!(a.rank_correlation.is_some(), b.rank_correlation.is_some());
    }

    let summary = fs::read_to_string(&summary).unwrap();
    assert!(summary.contains("## precision_at_5_out_30"));
    assert!(summary.contains("## spearmanr_30"));
    assert!(summary.contains("| RF_meta | train-tasks |"));
}

#[test]
fn command_line_writes_all_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let (perf_path, meta_path) = write_inputs(dir.path(), 2, 40);
    let out_dir = dir.path().join("out");

    let status = Command::new(env!("CARGO_BIN_EXE_meta_models"))
        .arg("--performances-path")
        .arg(&perf_path)
        .arg("--metafeatures-path")
        .arg(&meta_path)
        .arg("--output-directory")
        .arg(&out_dir)
        .args(["--precision-at-n", "5", "--precision-out-of-k", "20"])
        .args(["--min-task-rows", "25", "--n-trees", "4", "--threads", "2"])
        .args(["--strategies", "quadratic_surrogate,RF_aggregate"])
        .status()
        .unwrap();
    assert!(status.success());

    let csv = fs::read_to_string(out_dir.join("records.csv")).unwrap();
    // header + 2 tasks x 2 strategies x 2 sets
    assert_eq!(csv.lines().count(), 1 + 8);
    assert!(csv.starts_with("task_id,strategy,set,"));
    assert!(out_dir.join("records.jsonl").exists());
    assert!(out_dir.join("summary.md").exists());
}

#[test]
fn command_line_rejects_malformed_filter() {
    let dir = tempfile::tempdir().unwrap();
    let (perf_path, meta_path) = write_inputs(dir.path(), 1, 10);

    let output = Command::new(env!("CARGO_BIN_EXE_meta_models"))
        .arg("--performances-path")
        .arg(&perf_path)
        .arg("--metafeatures-path")
        .arg(&meta_path)
        .arg("--output-directory")
        .arg(dir.path().join("out"))
        .args(["--filter", "svc__kernel"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("COLUMN=VALUE"));
}
