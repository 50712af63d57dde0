//! Full-screen terminal viewer for a single figure.

use super::render::{correlation_color, ImageFormat};
use super::{axis_range, AxisScale, Bin, Figure, FigureBody};
use crate::error::PlotError;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::time::Duration;

/// Show `figure` until any key is pressed
pub fn show_figure(figure: &Figure) -> Result<(), PlotError> {
    run_viewer(figure).map_err(|e| PlotError::Display(format!("{e:#}")))
}

fn run_viewer(figure: &Figure) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, figure);

    // Restore terminal even if drawing failed
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, figure: &Figure) -> Result<()> {
    loop {
        terminal.draw(|f| render_figure(f, figure))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(());
                }
            }
        }
    }
}

fn render_figure(f: &mut Frame, figure: &Figure) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(f.area());

    let block = Block::default()
        .title(format!(" {} ", figure.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    match &figure.body {
        FigureBody::Line { points, x_axis } => {
            render_xy(f, chunks[0], block, figure, points, GraphType::Line, *x_axis, AxisScale::Linear)
        }
        FigureBody::Scatter {
            points,
            x_axis,
            y_axis,
        } => render_xy(f, chunks[0], block, figure, points, GraphType::Scatter, *x_axis, *y_axis),
        FigureBody::Histogram { bins } => render_histogram(f, chunks[0], block, bins),
        FigureBody::Bar { labels, values } => render_bars(f, chunks[0], block, labels, values),
        FigureBody::Heatmap { labels, matrix } => render_heatmap(f, chunks[0], block, labels, matrix),
    }

    render_help_bar(f, chunks[1], &figure.file_name(ImageFormat::Png));
}

fn axis_labels(range: &std::ops::Range<f64>, scale: AxisScale) -> Vec<Span<'static>> {
    let mid = (range.start + range.end) / 2.0;
    [range.start, mid, range.end]
        .into_iter()
        .map(|v| Span::styled(scale.format(v), Style::default().fg(Color::Gray)))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn render_xy(
    f: &mut Frame,
    area: Rect,
    block: Block,
    figure: &Figure,
    points: &[(f64, f64)],
    graph_type: GraphType,
    x_scale: AxisScale,
    y_scale: AxisScale,
) {
    let x_range = axis_range(points.iter().map(|p| p.0));
    let y_range = axis_range(points.iter().map(|p| p.1));

    let dataset = Dataset::default()
        .name(figure.y_label.clone())
        .marker(Marker::Braille)
        .graph_type(graph_type)
        .style(Style::default().fg(Color::Yellow))
        .data(points);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .title(figure.x_label.clone())
                .bounds([x_range.start, x_range.end])
                .labels(axis_labels(&x_range, x_scale)),
        )
        .y_axis(
            Axis::default()
                .title(figure.y_label.clone())
                .bounds([y_range.start, y_range.end])
                .labels(axis_labels(&y_range, y_scale)),
        );
    f.render_widget(chart, area);
}

/// Columns available to each bar, at least one
fn bar_width(area: Rect, count: usize) -> u16 {
    let inner = area.width.saturating_sub(2) as usize;
    (inner / count.max(1)).saturating_sub(1).clamp(1, 12) as u16
}

fn render_histogram(f: &mut Frame, area: Rect, block: Block, bins: &[Bin]) {
    let bars: Vec<Bar> = bins
        .iter()
        .map(|b| {
            Bar::default()
                .value(b.count)
                .label(Line::from(AxisScale::Linear.format(b.lower)))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .bar_width(bar_width(area, bins.len()))
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

fn render_bars(f: &mut Frame, area: Rect, block: Block, labels: &[String], values: &[f64]) {
    // BarChart heights are unsigned; scale against the largest magnitude
    let max = values.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);
    let bars: Vec<Bar> = labels
        .iter()
        .zip(values)
        .map(|(label, v)| {
            Bar::default()
                .value((v.max(0.0) / max * 1000.0).round() as u64)
                .text_value(AxisScale::Linear.format(*v))
                .label(Line::from(label.clone()))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .bar_width(bar_width(area, labels.len()))
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Green))
        .value_style(Style::default().fg(Color::Black).bg(Color::Green))
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

fn render_heatmap(f: &mut Frame, area: Rect, block: Block, labels: &[String], matrix: &[Vec<f64>]) {
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0).min(20);
    let cell = 8;

    let mut lines = Vec::with_capacity(labels.len() + 1);
    let mut header = vec![Span::raw(" ".repeat(label_width + 1))];
    header.extend(labels.iter().map(|l| {
        Span::styled(
            format!("{:>width$}", truncate(l, cell - 1), width = cell),
            Style::default().add_modifier(Modifier::BOLD),
        )
    }));
    lines.push(Line::from(header));

    for (label, row) in labels.iter().zip(matrix) {
        let mut spans = vec![Span::styled(
            format!("{:<width$} ", truncate(label, label_width), width = label_width),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        spans.extend(row.iter().map(|r| {
            let c = correlation_color(*r);
            let text = if r.is_finite() { format!("{:+.2}", r) } else { "nan".to_string() };
            Span::styled(
                format!("{:>width$} ", text, width = cell - 1),
                Style::default().fg(Color::Black).bg(Color::Rgb(c.0, c.1, c.2)),
            )
        }));
        lines.push(Line::from(spans));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn render_help_bar(f: &mut Frame, area: Rect, file_name: &str) {
    let paragraph = Paragraph::new(format!(" Any key: close | {} ", file_name))
        .style(Style::default().fg(Color::Black).bg(Color::Gray));
    f.render_widget(paragraph, area);
}
