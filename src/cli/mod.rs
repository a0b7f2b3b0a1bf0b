//! Kolosal Features CLI Module
//!
//! Command-line interface for deriving features from a file and inspecting
//! its time grid.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::grid::{format_step, parse_step, GridValidator};
use crate::pipeline::{FeaturePipeline, PipelineConfig};
use crate::spec::FeatureSpec;
use crate::table::{format_timestamp, SeriesTable};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-features")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Leakage-safe calendar, rolling-window and lag features for time series")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Derive features and print or save the enriched table
    Transform {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Timestamp column
        #[arg(short, long, default_value = "datetime")]
        time_column: String,

        /// Feature specification (JSON)
        #[arg(short, long)]
        spec: PathBuf,

        /// Output CSV file (prints to the terminal when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows to print
        #[arg(long, default_value = "10")]
        rows: usize,

        /// Worker threads (defaults to all cores)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Show the inferred time grid and column summary
    Inspect {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Timestamp column
        #[arg(short, long, default_value = "datetime")]
        time_column: String,

        /// Declared grid step such as 1h or 15min
        #[arg(long)]
        step: Option<String>,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        "json" => JsonReader::new(std::fs::File::open(path)?)
            .finish()?,
        "parquet" => ParquetReader::new(std::fs::File::open(path)?)
            .finish()?,
        _ => anyhow::bail!("Unsupported file format: {}", ext),
    };

    Ok(df)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_transform(
    data_path: &Path,
    time_column: &str,
    spec_path: &Path,
    output: Option<&Path>,
    rows: usize,
    threads: Option<usize>,
) -> anyhow::Result<()> {
    section("Transform");

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(data_path)?;
    let table = SeriesTable::from_frame(&df, time_column)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run("Loading specification");
    let spec = FeatureSpec::from_json_file(spec_path)?;
    step_done(&format!("{} features", spec.features().len()));

    let config = match threads {
        Some(n) => PipelineConfig::new().with_threads(n),
        None => PipelineConfig::new(),
    };
    let pipeline = FeaturePipeline::with_config(spec, config);

    step_run("Deriving features");
    let start = Instant::now();
    let enriched = pipeline.transform(&table)?;
    step_done(&format!("{:?}", start.elapsed()));

    let mut frame = enriched.to_frame(time_column)?;

    match output {
        Some(path) => {
            step_run(&format!("Saving → {}", path.display()));
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).finish(&mut frame)?;
            step_done(&format!("{} rows × {} cols", frame.height(), frame.width()));
        }
        None => {
            println!();
            println!("{}", frame.head(Some(rows)));
        }
    }

    println!();
    Ok(())
}

pub fn cmd_inspect(data_path: &Path, time_column: &str, step: Option<&str>) -> anyhow::Result<()> {
    section("Inspect");

    let df = load_data(data_path)?;
    let table = SeriesTable::from_frame(&df, time_column)?;

    let validator = GridValidator::new().fill_gaps(true);
    let validator = match step {
        Some(step) => validator.with_step(parse_step(step)?),
        None => validator,
    };
    let grid = validator.validate(&table)?;

    kv("Rows", &table.height().to_string());
    kv("Step", &grid.step().map(format_step).unwrap_or_else(|| "-".to_string()));
    if let (Some(first), Some(last)) = (table.index().first(), table.index().last()) {
        kv("Start", &format_timestamp(first));
        kv("End", &format_timestamp(last));
    }
    kv("Grid rows", &grid.len().to_string());
    kv("Missing rows", &grid.gap_count().to_string());
    for ts in grid.missing_slots().iter().take(5) {
        println!("  {:<16} {}", "", dim(&format_timestamp(ts)));
    }

    println!();
    println!("  {:<24} {:>12} {:>10}", muted("Column"), muted("Type"), muted("Missing"));
    println!("  {}", dim(&"─".repeat(48)));
    for column in table.frame().get_columns() {
        println!(
            "  {:<24} {:>12} {:>10}",
            column.name().as_str(),
            column.dtype().to_string(),
            column.null_count()
        );
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "datetime,temp,season").unwrap();
        writeln!(file, "2011-01-01 00:00:00,9.84,winter").unwrap();
        writeln!(file, "2011-01-01 01:00:00,9.02,winter").unwrap();
        writeln!(file, "2011-01-01 02:00:00,9.02,winter").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let df = load_data(file.path()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("temp").unwrap().dtype(), &DataType::Float64);

        let table = SeriesTable::from_frame(&df, "datetime").unwrap();
        assert_eq!(table.column_names(), vec!["temp", "season"]);
    }

    #[test]
    fn test_load_unsupported_format() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let err = load_data(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported file format"));
    }

    #[test]
    fn test_inspect_reports_gaps() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "datetime,temp").unwrap();
        writeln!(file, "2011-01-01 00:00:00,9.84").unwrap();
        writeln!(file, "2011-01-01 01:00:00,9.02").unwrap();
        writeln!(file, "2011-01-01 03:00:00,9.84").unwrap();

        assert!(cmd_inspect(file.path(), "datetime", None).is_ok());
        assert!(cmd_inspect(file.path(), "datetime", Some("1fortnight")).is_err());
    }
}
