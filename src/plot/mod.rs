//! Chart generation from a loaded [`Table`](crate::table::Table).
//!
//! Plot functions in [`charts`] validate their inputs and build
//! backend-independent [`Figure`]s, handing each one to a [`FigureSink`].
//! [`Output`] is the sink used by the CLI: it writes PNG (and SVG) files with
//! `plotters` and/or shows the figure in the terminal with `ratatui`.

pub mod charts;
mod display;
mod output;
mod render;
pub mod stats;

pub use charts::{bar_top_n, correlation_heatmap, histograms, line_over_time, scatter, top_n};
pub use output::Output;
pub use render::ImageFormat;
pub use stats::Bin;

use crate::error::PlotError;
use chrono::DateTime;
use std::ops::Range;

/// How values on an axis are labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisScale {
    Linear,
    /// Values are seconds since the Unix epoch
    Time,
}

impl AxisScale {
    pub fn format(&self, value: f64) -> String {
        match self {
            AxisScale::Linear => format_number(value),
            AxisScale::Time => DateTime::from_timestamp_millis((value * 1000.0).round() as i64)
                .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| format!("{value:.0}")),
        }
    }
}

/// Padded `[min, max]` of the finite values; `0..1` when there are none
pub(crate) fn axis_range<I: IntoIterator<Item = f64>>(values: I) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return 0.0..1.0;
    }
    if lo == hi {
        return (lo - 0.5)..(hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

fn format_number(value: f64) -> String {
    let abs = value.abs();
    if abs != 0.0 && !(1e-3..1e6).contains(&abs) {
        format!("{value:.2e}")
    } else {
        let s = format!("{value:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FigureBody {
    Line {
        points: Vec<(f64, f64)>,
        x_axis: AxisScale,
    },
    Histogram {
        bins: Vec<Bin>,
    },
    Bar {
        labels: Vec<String>,
        values: Vec<f64>,
    },
    Scatter {
        points: Vec<(f64, f64)>,
        x_axis: AxisScale,
        y_axis: AxisScale,
    },
    Heatmap {
        labels: Vec<String>,
        /// Row-major, `NaN` where the correlation is undefined
        matrix: Vec<Vec<f64>>,
    },
}

/// One chart, independent of how it is rendered
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    /// File name without extension, before sanitising
    pub stem: String,
    pub x_label: String,
    pub y_label: String,
    pub body: FigureBody,
}

impl Figure {
    pub fn file_name(&self, format: ImageFormat) -> String {
        format!("{}.{}", sanitize_file_stem(&self.stem), format.extension())
    }
}

/// Receives finished figures
pub trait FigureSink {
    fn emit(&mut self, figure: Figure) -> Result<(), PlotError>;
}

/// Collects figures in memory
impl FigureSink for Vec<Figure> {
    fn emit(&mut self, figure: Figure) -> Result<(), PlotError> {
        self.push(figure);
        Ok(())
    }
}

/// Replace every character that is not alphanumeric or one of `-_.` with `_`
pub fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
