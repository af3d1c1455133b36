//! CLI entry point for the Framingham imputation pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use framingham_pipeline::reporting::{DEFAULT_HISTOGRAM_BINS, Histogram, histogram};
use framingham_pipeline::{DataSource, Pipeline, PipelineConfig, PipelineOutput, RunReport};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Missing-data and outlier imputation for the Framingham dataset",
    long_about = "Loads the Framingham teaching extract, imputes missing and outlying values,\n\
                  and prints descriptive statistics.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  FRAMINGHAM_DATA_URL    Override the default source URL\n\n\
                  EXAMPLES:\n  \
                  # Fetch the public extract and summarise it\n  \
                  framingham-pipeline\n\n  \
                  # Use a local copy and save the cleaned table\n  \
                  framingham-pipeline -i framingham.csv -o cleaned.csv\n\n  \
                  # Machine-readable report\n  \
                  framingham-pipeline --json | jq .outliers"
)]
struct Args {
    /// Path to a local CSV file instead of the remote source
    #[arg(short, long, conflicts_with = "url")]
    input: Option<PathBuf>,

    /// URL of the CSV source
    #[arg(short, long)]
    url: Option<String>,

    /// JSON file with pipeline configuration overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the cleaned table to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Print a histogram of this column of the cleaned table
    #[arg(long)]
    histogram: Option<String>,

    /// Number of histogram bins (1 - 50)
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    bins: usize,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let source = resolve_source(&args)?;

    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let pipeline = Pipeline::builder().config(config).build()?;

    let output = pipeline.run(&source).map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed: {}", e)
    })?;

    if let Some(path) = &args.output {
        write_csv(&output.cleaned, path)?;
        info!("Cleaned table written to: {}", path.display());
    }

    let hist = match &args.histogram {
        Some(column) => Some(histogram(&output.cleaned, column, args.bins)?),
        None => None,
    };

    let report = output.report(source.display_name());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_human_readable_summary(&report, &output);
    if let Some(hist) = &hist {
        print_histogram(hist);
    }

    Ok(())
}

/// Pick the data source: a local file, an explicit URL, or the environment.
fn resolve_source(args: &Args) -> Result<DataSource> {
    if let Some(path) = &args.input {
        if !path.exists() {
            return Err(anyhow!("Input file not found: {}", path.display()));
        }
        return Ok(DataSource::File(path.clone()));
    }

    Ok(match &args.url {
        Some(url) => DataSource::Url(url.clone()),
        None => DataSource::from_env(),
    })
}

fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    let mut df = df.clone();
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

/// Print a human-readable summary of the run.
///
/// Uses `println!` on purpose: this is the primary output, not a log line.
fn print_human_readable_summary(report: &RunReport, output: &PipelineOutput) {
    println!();
    println!("{}", "=".repeat(80));
    println!("IMPUTATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Source: {}", report.source);
    println!("Rows: {}  Columns: {}", report.rows, report.columns);
    println!("Duration: {}ms", report.duration_ms);
    println!(
        "Data Quality: {:.1}% -> {:.1}%",
        report.data_quality_before * 100.0,
        report.data_quality_after * 100.0
    );
    println!();

    println!("Missing Values (source):");
    for column in report.missingness.columns.iter().filter(|c| c.missing > 0) {
        println!(
            "  {:<10} {:>6} ({:.1}%)",
            column.name, column.missing, column.percent
        );
    }
    println!("  Total: {}", report.missingness.total_missing);
    println!();

    println!("Fills:");
    for fill in report.baseline_fills.iter().filter(|f| f.cells_filled > 0) {
        println!("  - {}", fill.describe());
    }
    println!();

    println!("Outliers ({} cells re-imputed):", report.total_outliers());
    for outlier in &report.outliers {
        match outlier.bounds {
            Some(b) => println!(
                "  {:<10} {:>5}  [{:.2}, {:.2}]",
                outlier.column, outlier.flagged, b.lower, b.upper
            ),
            None => println!("  {:<10} {:>5}  (no values)", outlier.column, outlier.flagged),
        }
    }
    println!();

    println!("Summary Statistics (cleaned):");
    println!(
        "  {:<10} {:>7} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Column", "Count", "Mean", "Std", "Min", "Median", "Max"
    );
    let fmt = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{:.2}", v));
    for name in output.cleaned.get_column_names() {
        if let Some(c) = report.stats.column(name.as_str()) {
            println!(
                "  {:<10} {:>7} {:>9} {:>9} {:>9} {:>9} {:>9}",
                c.name,
                c.count,
                fmt(c.mean),
                fmt(c.std),
                fmt(c.min),
                fmt(c.q50),
                fmt(c.max)
            );
        }
    }
    println!();

    if !report.strong_correlations.is_empty() {
        println!("Strong Correlations:");
        for pair in &report.strong_correlations {
            println!("  {} ~ {}: {:.2}", pair.first, pair.second, pair.coefficient);
        }
        println!();
    }

    println!("CHD Prevalence by BMI Category:");
    for stats in &report.chd_by_bmi {
        println!(
            "  {:<12} n={:<6} {}",
            stats.category.to_string(),
            stats.count,
            stats
                .chd_prevalence
                .map_or("-".to_string(), |p| format!("{:.1}%", p * 100.0))
        );
    }
    println!();

    println!("Means by Period:");
    print!("  {:<10}", "Column");
    for period in &report.period_means.periods {
        print!(" {:>9}", format!("P{}", period));
    }
    println!();
    for (column, means) in &report.period_means.means {
        print!("  {:<10}", column);
        for mean in means {
            print!(" {:>9}", fmt(*mean));
        }
        println!();
    }
    println!();

    if !report.warnings.is_empty() {
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}

fn print_histogram(hist: &Histogram) {
    let max = hist.counts.iter().copied().max().unwrap_or(0).max(1);
    println!();
    println!("Histogram of {}:", hist.column);
    for (i, count) in hist.counts.iter().enumerate() {
        let bar = "#".repeat(count * 50 / max);
        println!(
            "  [{:>9.2}, {:>9.2}) {:>6} {}",
            hist.edges[i],
            hist.edges[i + 1],
            count,
            bar
        );
    }
}
