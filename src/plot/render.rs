//! PNG and SVG rendering of figures with plotters.

use super::{axis_range, AxisScale, Bin, Figure, FigureBody};
use crate::error::PlotError;
use anyhow::{anyhow, Result};
use log::{debug, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const CHART_SIZE: (u32, u32) = (1200, 600);
const HEATMAP_SIZE: (u32, u32) = (900, 750);

/// Checked in order after `POWERLOG_FONT`
const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT: OnceLock<Result<PathBuf, String>> = OnceLock::new();

/// Register a TrueType font as `sans-serif`, once per process
fn ensure_font() -> Result<()> {
    let loaded = FONT.get_or_init(|| {
        let candidates = std::env::var_os("POWERLOG_FONT")
            .map(PathBuf::from)
            .into_iter()
            .chain(FONT_PATHS.iter().map(PathBuf::from));
        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            // plotters keeps registered fonts for the life of the process
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font("sans-serif", FontStyle::Normal, bytes) {
                Ok(()) => {
                    debug!("using font {}", path.display());
                    return Ok(path);
                }
                Err(_) => warn!("{} is not a usable TrueType font", path.display()),
            }
        }
        Err("no TrueType font found; point POWERLOG_FONT at a .ttf file".to_string())
    });
    loaded.as_ref().map(|_| ()).map_err(|e| anyhow!("{}", e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

/// Write `figure` to `path` in the given format
pub fn render(figure: &Figure, path: &Path, format: ImageFormat) -> Result<(), PlotError> {
    let size = match figure.body {
        FigureBody::Heatmap { .. } => HEATMAP_SIZE,
        _ => CHART_SIZE,
    };
    let drawn = ensure_font().and_then(|()| match format {
        ImageFormat::Png => draw(BitMapBackend::new(path, size).into_drawing_area(), figure),
        ImageFormat::Svg => draw(SVGBackend::new(path, size).into_drawing_area(), figure),
    });
    drawn.map_err(|e| PlotError::Render {
        path: path.to_path_buf(),
        detail: format!("{e:#}"),
    })
}

fn draw<DB>(root: DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    match &figure.body {
        FigureBody::Line { points, x_axis } => draw_line(&root, figure, points, *x_axis)?,
        FigureBody::Histogram { bins } => draw_histogram(&root, figure, bins)?,
        FigureBody::Bar { labels, values } => draw_bar(&root, figure, labels, values)?,
        FigureBody::Scatter {
            points,
            x_axis,
            y_axis,
        } => draw_scatter(&root, figure, points, *x_axis, *y_axis)?,
        FigureBody::Heatmap { labels, matrix } => draw_heatmap(&root, figure, labels, matrix)?,
    }

    root.present()?;
    Ok(())
}

fn draw_line<DB>(
    root: &DrawingArea<DB, Shift>,
    figure: &Figure,
    points: &[(f64, f64)],
    x_axis: AxisScale,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_range = axis_range(points.iter().map(|p| p.0));
    let y_range = axis_range(points.iter().map(|p| p.1));

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(&figure.x_label)
        .y_desc(&figure.y_label)
        .x_labels(6)
        .x_label_formatter(&|v| x_axis.format(*v))
        .draw()?;

    chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
    Ok(())
}

fn draw_scatter<DB>(
    root: &DrawingArea<DB, Shift>,
    figure: &Figure,
    points: &[(f64, f64)],
    x_axis: AxisScale,
    y_axis: AxisScale,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_range = axis_range(points.iter().map(|p| p.0));
    let y_range = axis_range(points.iter().map(|p| p.1));

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(&figure.x_label)
        .y_desc(&figure.y_label)
        .x_labels(6)
        .x_label_formatter(&|v| x_axis.format(*v))
        .y_label_formatter(&|v| y_axis.format(*v))
        .draw()?;

    chart.draw_series(points.iter().map(|p| Circle::new(*p, 3, BLUE.mix(0.7).filled())))?;
    Ok(())
}

fn draw_histogram<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure, bins: &[Bin]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_range = match (bins.first(), bins.last()) {
        (Some(first), Some(last)) => first.lower..last.upper,
        _ => 0.0..1.0,
    };
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, 0f64..max_count * 1.1)?;

    chart
        .configure_mesh()
        .x_desc(&figure.x_label)
        .y_desc(&figure.y_label)
        .x_label_formatter(&|v| AxisScale::Linear.format(*v))
        .draw()?;

    chart.draw_series(bins.iter().map(|b| {
        let mut bar = Rectangle::new([(b.lower, 0.0), (b.upper, b.count as f64)], BLUE.mix(0.6).filled());
        bar.set_margin(0, 0, 1, 1);
        bar
    }))?;
    Ok(())
}

fn draw_bar<DB>(
    root: &DrawingArea<DB, Shift>,
    figure: &Figure,
    labels: &[String],
    values: &[f64],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let lo = values.iter().copied().fold(0.0_f64, f64::min);
    let hi = values.iter().copied().fold(0.0_f64, f64::max);
    let pad = ((hi - lo) * 0.1).max(1e-9);
    let y_range = if lo < 0.0 { (lo - pad)..(hi + pad) } else { 0.0..(hi + pad) };

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(120)
        .y_label_area_size(70)
        .build_cartesian_2d((0..labels.len()).into_segmented(), y_range)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(&figure.x_label)
        .y_desc(&figure.y_label)
        .x_labels(labels.len())
        .x_label_style(
            ("sans-serif", 14)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .x_label_formatter(&|seg| match seg {
            SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
            BLUE.mix(0.7).filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;
    Ok(())
}

/// Diverging blue-white-red scale over `[-1, 1]`; grey for undefined
pub(super) fn correlation_color(r: f64) -> RGBColor {
    if !r.is_finite() {
        return RGBColor(200, 200, 200);
    }
    let (end, t) = if r >= 0.0 {
        ((178.0, 24.0, 43.0), r.min(1.0))
    } else {
        ((33.0, 102.0, 172.0), (-r).min(1.0))
    };
    let lerp = |to: f64| (255.0 + (to - 255.0) * t).round() as u8;
    RGBColor(lerp(end.0), lerp(end.1), lerp(end.2))
}

fn draw_heatmap<DB>(
    root: &DrawingArea<DB, Shift>,
    figure: &Figure,
    labels: &[String],
    matrix: &[Vec<f64>],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let k = labels.len();
    let (width, _) = root.dim_in_pixel();
    let (main, legend) = root.split_horizontally((width as i32 - 130).max(1));

    let mut chart = ChartBuilder::on(&main)
        .caption(&figure.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(140)
        .y_label_area_size(140)
        .build_cartesian_2d((0..k).into_segmented(), (0..k).into_segmented())?;

    // Row 0 is drawn at the top
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(k)
        .y_labels(k)
        .x_label_style(
            ("sans-serif", 14)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .x_label_formatter(&|seg| match seg {
            SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .y_label_formatter(&|seg| match seg {
            SegmentValue::CenterOf(i) if *i < k => labels[k - 1 - *i].clone(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(matrix.iter().enumerate().flat_map(|(row, values)| {
        let y = k - 1 - row;
        values.iter().enumerate().map(move |(col, r)| {
            Rectangle::new(
                [
                    (SegmentValue::Exact(col), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(col + 1), SegmentValue::Exact(y + 1)),
                ],
                correlation_color(*r).filled(),
            )
        })
    }))?;

    let mut scale = ChartBuilder::on(&legend)
        .margin_top(60)
        .margin_bottom(150)
        .margin_right(20)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..1f64, -1f64..1f64)?;
    scale
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(5)
        .draw()?;

    const STEPS: usize = 50;
    let step = 2.0 / STEPS as f64;
    scale.draw_series((0..STEPS).map(|i| {
        let lo = -1.0 + step * i as f64;
        Rectangle::new([(0.0, lo), (1.0, lo + step)], correlation_color(lo + step / 2.0).filled())
    }))?;
    Ok(())
}
