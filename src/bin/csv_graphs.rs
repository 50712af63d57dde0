//! Load a CSV and generate common graphs with minimal fuss.
//!
//! ```text
//! csv-graphs --csv energy_log.csv
//! csv-graphs --csv data.csv --sep ';' --decimal ','
//! csv-graphs --csv data.csv --time-col timestamp --y-cols power_w,current_a
//! csv-graphs --csv data.csv --save-dir ./plots --no-show
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use num_format::{Locale, ToFormattedString};
use powerlog::error::PlotError;
use powerlog::logging::init_logger;
use powerlog::plot::{bar_top_n, correlation_heatmap, histograms, line_over_time, scatter, Output};
use powerlog::table::{Encoding, LoadOptions, Table};
use std::path::PathBuf;
use std::process::ExitCode;

/// Generate graphs from a CSV quickly
#[derive(Parser, Debug)]
#[command(name = "csv-graphs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to CSV file
    #[arg(long)]
    csv: PathBuf,

    /// CSV separator (a single character, or \t for tab)
    #[arg(long, default_value = ",", value_parser = parse_separator)]
    sep: u8,

    /// Decimal character
    #[arg(long, default_value = ".")]
    decimal: char,

    /// CSV encoding (utf-8 or latin-1)
    #[arg(long, default_value = "utf-8")]
    encoding: Encoding,

    /// Name of the column to use for time-based plots
    #[arg(long)]
    time_col: Option<String>,

    /// Comma-separated numeric columns for line plots
    #[arg(long)]
    y_cols: Option<String>,

    /// Categorical column for the top-N bar chart
    #[arg(long)]
    top_by: Option<String>,

    /// Numeric column for the top-N bar chart
    #[arg(long)]
    top_val: Option<String>,

    /// N for the top-N bar chart
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    top_n: u32,

    /// Rank the top-N chart by smallest sums instead
    #[arg(long)]
    ascending: bool,

    /// Bins for histograms
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    bins: u32,

    /// X column for scatter
    #[arg(long)]
    scatter_x: Option<String>,

    /// Y column for scatter
    #[arg(long)]
    scatter_y: Option<String>,

    /// Directory to save PNGs (no saving if omitted)
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Also save each figure as SVG
    #[arg(long)]
    svg: bool,

    /// Do not display plots interactively
    #[arg(long)]
    no_show: bool,

    /// Skip line-over-time plots
    #[arg(long)]
    skip_line: bool,

    /// Skip histograms
    #[arg(long)]
    skip_hist: bool,

    /// Skip correlation heatmap
    #[arg(long)]
    skip_heatmap: bool,
}

fn parse_separator(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => Ok(c as u8),
                _ => Err(format!("separator must be a single ASCII character, got '{}'", s)),
            }
        }
    }
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Print why a plot was skipped; the remaining plots still run
fn report(name: &str, result: Result<usize, PlotError>) {
    if let Err(e) = result {
        println!("[{}] skipped: {}", name, e);
    }
}

fn run(args: &Args) -> Result<()> {
    let opts = LoadOptions {
        separator: args.sep,
        decimal: args.decimal,
        encoding: args.encoding,
    };
    let table = Table::load(&args.csv, &opts)
        .with_context(|| format!("Failed to load CSV: {}", args.csv.display()))?;

    println!(
        "Loaded: {} | Rows: {} | Columns: {}",
        args.csv.display(),
        table.row_count().to_formatted_string(&Locale::en),
        table.column_count()
    );
    println!("Columns: {:?}", table.column_names());

    let mut output = Output::new(args.save_dir.clone(), !args.no_show).with_svg(args.svg);

    if !args.skip_line {
        let y_cols = args.y_cols.as_deref().map(split_columns);
        report(
            "line_over_time",
            line_over_time(&table, args.time_col.as_deref(), y_cols.as_deref(), &mut output),
        );
    }

    if !args.skip_hist {
        report("histograms", histograms(&table, args.bins as usize, &mut output));
    }

    if let (Some(x), Some(y)) = (&args.scatter_x, &args.scatter_y) {
        report("scatter", scatter(&table, x, y, &mut output));
    }

    if let (Some(by), Some(val)) = (&args.top_by, &args.top_val) {
        report(
            "bar_top_n",
            bar_top_n(&table, by, val, args.top_n as usize, args.ascending, &mut output),
        );
    }

    if !args.skip_heatmap {
        report("correlation_heatmap", correlation_heatmap(&table, &mut output));
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger();

    if !args.csv.exists() {
        eprintln!("ERROR: CSV file not found: {}", args.csv.display());
        return ExitCode::from(1);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
