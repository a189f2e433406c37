//! Leave-one-task-out evaluation of surrogate models.
//!
//! Loads a performance table and a meta-feature table (ARFF), keeps the rows
//! matching `--filter`, imputes missing meta-features with -1, evaluates every
//! strategy on every task and writes the results to `--output-directory`:
//!
//! - `records.jsonl`: one evaluation record per line
//! - `records.csv`: the same records as CSV
//! - `summary.md`: box-plot statistics per strategy and set, and failures
//!
//! Usage:
//!   meta_models --performances-path perf.arff --metafeatures-path meta.arff \
//!       --output-directory out/ -v

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use metamodels::data::io::read_arff;
use metamodels::evaluation::Strategy;
use metamodels::{
    EvaluationData, ForestConfig, HarnessConfig, ResultTable, TaskEvaluator, Verbosity,
};

/// Imputed value of missing meta-features.
const MISSING_SENTINEL: f64 = -1.0;

#[derive(Parser)]
#[command(name = "meta_models")]
#[command(about = "Evaluate how well surrogate models rank algorithm configurations")]
#[command(version)]
struct Cli {
    /// ARFF file with one row per (task, configuration, accuracy)
    #[arg(long)]
    performances_path: PathBuf,

    /// ARFF file with one row of meta-features per task
    #[arg(long)]
    metafeatures_path: PathBuf,

    /// Directory for records and summary (created if missing)
    #[arg(long)]
    output_directory: PathBuf,

    #[arg(long, default_value = "task_id")]
    task_column: String,

    #[arg(long, default_value = "predictive_accuracy")]
    target_column: String,

    /// Hyperparameter columns used as surrogate inputs
    #[arg(long, value_delimiter = ',', default_value = "svc__gamma,svc__C")]
    param_columns: Vec<String>,

    /// Keep only rows where COLUMN equals VALUE (repeatable, empty to disable)
    #[arg(long, value_name = "COLUMN=VALUE", default_value = "svc__kernel=rbf")]
    filter: Vec<String>,

    /// Strategies to run (default: all)
    #[arg(long, value_delimiter = ',')]
    strategies: Vec<Strategy>,

    #[arg(long, default_value_t = 20)]
    precision_at_n: usize,

    #[arg(long, default_value_t = 100)]
    precision_out_of_k: usize,

    #[arg(long, default_value_t = 5)]
    cv_folds: usize,

    /// Tasks need more rows than this to be evaluated
    #[arg(long, default_value_t = 100)]
    min_task_rows: usize,

    #[arg(long, default_value_t = 16)]
    n_trees: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Worker threads (0 = all cores)
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_count(cli.verbose);

    let level = match verbosity {
        Verbosity::Silent | Verbosity::Warning => "warn",
        Verbosity::Info => "info",
        Verbosity::Debug => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("meta_models={level},metamodels={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let data = load_data(&cli)?;

    let strategies = if cli.strategies.is_empty() {
        Strategy::ALL.to_vec()
    } else {
        cli.strategies.clone()
    };
    let forest = ForestConfig::builder()
        .n_trees(cli.n_trees)
        .build()
        .context("invalid forest configuration")?;
    let config = HarnessConfig::builder()
        .precision_at_n(cli.precision_at_n)
        .precision_out_of_k(cli.precision_out_of_k)
        .cv_folds(cli.cv_folds)
        .min_task_rows(cli.min_task_rows)
        .strategies(strategies)
        .forest(forest)
        .seed(cli.seed)
        .n_threads(cli.threads)
        .verbosity(verbosity)
        .build()
        .context("invalid evaluation configuration")?;

    let precision_name = config.precision_metric_name();
    let correlation_name = config.correlation_metric_name();
    let run = TaskEvaluator::new(config).run(&data);
    if run.records.is_empty() {
        warn!("No task could be evaluated");
    }

    fs::create_dir_all(&cli.output_directory).with_context(|| {
        format!("creating output directory {}", cli.output_directory.display())
    })?;
    let table = ResultTable::from_run(&run);
    let out = |name: &str| -> Result<BufWriter<File>> {
        let path = cli.output_directory.join(name);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        Ok(BufWriter::new(file))
    };
    table.write_jsonl(out("records.jsonl")?)?;
    table.write_csv(out("records.csv")?)?;
    table.write_markdown(
        out("summary.md")?,
        &precision_name,
        &correlation_name,
        &run.failures,
    )?;

    info!(
        "Wrote {} records for {} tasks to {}",
        table.len(),
        run.n_tasks,
        cli.output_directory.display()
    );
    Ok(())
}

fn load_data(cli: &Cli) -> Result<EvaluationData> {
    // Filters run on the raw frame: excluded rows may lack parameter values.
    let mut frame = read_arff(&cli.performances_path)
        .with_context(|| format!("reading {}", cli.performances_path.display()))?;
    for spec in cli.filter.iter().filter(|s| !s.is_empty()) {
        let Some((column, value)) = spec.split_once('=') else {
            bail!("--filter expects COLUMN=VALUE, got '{spec}'");
        };
        frame = frame
            .filter_eq(column, value)
            .with_context(|| format!("applying filter {spec}"))?;
        info!("Filter {spec}: {} rows left", frame.n_rows());
    }
    let performances = frame
        .to_performance_table(&cli.task_column, &cli.param_columns, &cli.target_column)
        .with_context(|| table_context("performances", &cli.performances_path))?;

    let metafeatures = read_arff(&cli.metafeatures_path)
        .with_context(|| format!("reading {}", cli.metafeatures_path.display()))?
        .to_metafeature_table(&cli.task_column)
        .with_context(|| table_context("meta-features", &cli.metafeatures_path))?;

    let data = EvaluationData::join(performances, metafeatures.impute_missing(MISSING_SENTINEL))
        .context("joining performances with meta-features")?;
    if data.dropped_rows() > 0 {
        warn!(
            "Dropped {} performance rows of tasks without meta-features",
            data.dropped_rows()
        );
    }
    info!(
        "Loaded {} rows over {} tasks",
        data.performances().n_rows(),
        data.tasks().len()
    );
    Ok(data)
}

fn table_context(what: &str, path: &Path) -> String {
    format!("building {what} table from {}", path.display())
}
