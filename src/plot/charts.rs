//! Plot entry points. Each validates its preconditions before emitting any
//! figure and returns how many figures it produced.

use super::stats::{correlation_matrix, histogram};
use super::{AxisScale, Figure, FigureBody, FigureSink};
use crate::error::PlotError;
use crate::table::{Column, ColumnData, ColumnKind, Table};
use chrono::NaiveDateTime;
use std::cmp::Ordering;

fn require<'a>(table: &'a Table, name: &str) -> Result<&'a Column, PlotError> {
    table
        .column(name)
        .ok_or_else(|| PlotError::UnknownColumn(name.to_string()))
}

fn require_numeric<'a>(table: &'a Table, name: &str) -> Result<&'a Column, PlotError> {
    let column = require(table, name)?;
    if column.kind() != ColumnKind::Numeric {
        return Err(PlotError::WrongKind {
            column: name.to_string(),
            expected: "numeric",
        });
    }
    Ok(column)
}

/// A column usable as a continuous axis
fn require_axis<'a>(table: &'a Table, name: &str) -> Result<(&'a Column, AxisScale), PlotError> {
    let column = require(table, name)?;
    match column.kind() {
        ColumnKind::Numeric => Ok((column, AxisScale::Linear)),
        ColumnKind::DateTime => Ok((column, AxisScale::Time)),
        ColumnKind::Text => Err(PlotError::WrongKind {
            column: name.to_string(),
            expected: "numeric or datetime",
        }),
    }
}

fn paired_points(x: &Column, y: &Column, rows: usize) -> Vec<(f64, f64)> {
    (0..rows)
        .filter_map(|i| Some((x.axis_value(i)?, y.axis_value(i)?)))
        .collect()
}

/// One line chart per y column against a time column.
///
/// Without `time_col` the first datetime column is used. Without `y_cols`
/// every numeric column other than the time column is plotted.
pub fn line_over_time(
    table: &Table,
    time_col: Option<&str>,
    y_cols: Option<&[String]>,
    sink: &mut dyn FigureSink,
) -> Result<usize, PlotError> {
    let (time, x_axis) = match time_col {
        Some(name) => require_axis(table, name)?,
        None => table
            .datetime_columns()
            .next()
            .map(|c| (c, AxisScale::Time))
            .ok_or(PlotError::NoDatetimeColumn)?,
    };

    let ys: Vec<&Column> = match y_cols {
        Some(names) => names
            .iter()
            .map(|n| require_numeric(table, n))
            .collect::<Result<_, _>>()?,
        None => table.numeric_columns().filter(|c| c.name != time.name).collect(),
    };
    if ys.is_empty() {
        return Err(PlotError::NoNumericColumns);
    }

    for y in &ys {
        sink.emit(Figure {
            title: format!("Line over time: {}", y.name),
            stem: format!("line_{}_vs_{}", y.name, time.name),
            x_label: time.name.clone(),
            y_label: y.name.clone(),
            body: FigureBody::Line {
                points: paired_points(time, y, table.row_count()),
                x_axis,
            },
        })?;
    }
    Ok(ys.len())
}

/// One histogram per numeric column, missing values dropped
pub fn histograms(table: &Table, bins: usize, sink: &mut dyn FigureSink) -> Result<usize, PlotError> {
    let columns: Vec<&Column> = table.numeric_columns().collect();
    if columns.is_empty() {
        return Err(PlotError::NoNumericForHistogram);
    }

    for col in &columns {
        sink.emit(Figure {
            title: format!("Histogram: {}", col.name),
            stem: format!("hist_{}", col.name),
            x_label: col.name.clone(),
            y_label: "Frequency".to_string(),
            body: FigureBody::Histogram {
                bins: histogram(&col.present_numbers(), bins),
            },
        })?;
    }
    Ok(columns.len())
}

/// Scatter of two named columns; each must be numeric or datetime
pub fn scatter(table: &Table, x: &str, y: &str, sink: &mut dyn FigureSink) -> Result<usize, PlotError> {
    let (x_col, x_axis) = require_axis(table, x)?;
    let (y_col, y_axis) = require_axis(table, y)?;

    sink.emit(Figure {
        title: format!("Scatter: {} vs {}", x, y),
        stem: format!("scatter_{}_vs_{}", x, y),
        x_label: x.to_string(),
        y_label: y.to_string(),
        body: FigureBody::Scatter {
            points: paired_points(x_col, y_col, table.row_count()),
            x_axis,
            y_axis,
        },
    })?;
    Ok(1)
}

#[derive(Debug, Clone, PartialEq)]
enum GroupKey {
    Number(f64),
    Time(NaiveDateTime),
    Text(String),
}

impl GroupKey {
    fn of(column: &Column, row: usize) -> Option<Self> {
        match &column.data {
            ColumnData::Numeric(v) => v.get(row).copied().flatten().map(GroupKey::Number),
            ColumnData::DateTime(v) => v.get(row).copied().flatten().map(GroupKey::Time),
            ColumnData::Text(v) => v.get(row).cloned().flatten().map(GroupKey::Text),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GroupKey::Number(a), GroupKey::Number(b)) => a.total_cmp(b),
            (GroupKey::Time(a), GroupKey::Time(b)) => a.cmp(b),
            (GroupKey::Text(a), GroupKey::Text(b)) => a.cmp(b),
            // One column never mixes key kinds
            _ => Ordering::Equal,
        }
    }

    fn label(&self) -> String {
        match self {
            GroupKey::Number(n) => n.to_string(),
            GroupKey::Time(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            GroupKey::Text(s) => s.clone(),
        }
    }
}

/// Sum `values` per group of `by`, then keep the `n` largest (or smallest)
/// sums.
///
/// Rows missing either value are dropped. Groups start in key order and the
/// sort by sum is stable, so ties keep key order.
pub fn top_n(by: &Column, values: &[Option<f64>], n: usize, ascending: bool) -> Vec<(String, f64)> {
    let mut rows: Vec<(GroupKey, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| Some((GroupKey::of(by, i)?, (*v)?)))
        .collect();
    rows.sort_by(|a, b| a.0.compare(&b.0));

    let mut groups: Vec<(GroupKey, f64)> = Vec::new();
    for (key, value) in rows {
        match groups.last_mut() {
            Some((last, sum)) if last.compare(&key) == Ordering::Equal => *sum += value,
            _ => groups.push((key, value)),
        }
    }

    if ascending {
        groups.sort_by(|a, b| a.1.total_cmp(&b.1));
    } else {
        groups.sort_by(|a, b| b.1.total_cmp(&a.1));
    }
    groups.truncate(n);
    groups.into_iter().map(|(k, sum)| (k.label(), sum)).collect()
}

/// Bar chart of the top `n` groups of `by_col` ranked by summed `value_col`
pub fn bar_top_n(
    table: &Table,
    by_col: &str,
    value_col: &str,
    n: usize,
    ascending: bool,
    sink: &mut dyn FigureSink,
) -> Result<usize, PlotError> {
    let by = require(table, by_col)?;
    let values = require_numeric(table, value_col)?
        .as_numeric()
        .unwrap_or_default();

    let top = top_n(by, values, n, ascending);
    if top.is_empty() {
        return Err(PlotError::NoData(format!("{} by {}", value_col, by_col)));
    }
    let (labels, values) = top.into_iter().unzip();

    sink.emit(Figure {
        title: format!("Top N: {} by {}", value_col, by_col),
        stem: format!("bar_top_{}_{}_by_{}", n, value_col, by_col),
        x_label: by_col.to_string(),
        y_label: value_col.to_string(),
        body: FigureBody::Bar { labels, values },
    })?;
    Ok(1)
}

/// Pearson correlation matrix of all numeric columns
pub fn correlation_heatmap(table: &Table, sink: &mut dyn FigureSink) -> Result<usize, PlotError> {
    let columns: Vec<&Column> = table.numeric_columns().collect();
    if columns.len() < 2 || table.row_count() == 0 {
        return Err(PlotError::NotEnoughForCorrelation);
    }

    let data: Vec<&[Option<f64>]> = columns.iter().filter_map(|c| c.as_numeric()).collect();
    sink.emit(Figure {
        title: "Correlation heatmap".to_string(),
        stem: "correlation_heatmap".to_string(),
        x_label: String::new(),
        y_label: String::new(),
        body: FigureBody::Heatmap {
            labels: columns.iter().map(|c| c.name.clone()).collect(),
            matrix: correlation_matrix(&data),
        },
    })?;
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::LoadOptions;

    fn table(text: &str) -> Table {
        Table::from_text(text, &LoadOptions::default()).unwrap()
    }

    fn text_column(values: &[&str]) -> Column {
        Column {
            name: "host".into(),
            data: ColumnData::Text(values.iter().map(|v| Some(v.to_string())).collect()),
        }
    }

    #[test]
    fn top_n_sums_and_ranks() {
        let by = text_column(&["b", "a", "b", "c", "a"]);
        let values = [Some(1.0), Some(5.0), Some(2.0), Some(0.5), Some(1.0)];
        let top = top_n(&by, &values, 2, false);
        assert_eq!(top, vec![("a".to_string(), 6.0), ("b".to_string(), 3.0)]);
    }

    #[test]
    fn top_n_ties_keep_key_order() {
        let by = text_column(&["zeta", "alpha", "mid", "alpha"]);
        let values = [Some(4.0), Some(2.0), Some(4.0), Some(2.0)];
        let top = top_n(&by, &values, 10, false);
        let labels: Vec<&str> = top.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "mid", "zeta"]);

        let asc = top_n(&by, &values, 10, true);
        let labels: Vec<&str> = asc.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn top_n_drops_incomplete_rows() {
        let by = Column {
            name: "host".into(),
            data: ColumnData::Text(vec![Some("a".into()), None, Some("b".into())]),
        };
        let values = [Some(1.0), Some(100.0), None];
        assert_eq!(top_n(&by, &values, 5, false), vec![("a".to_string(), 1.0)]);
    }

    #[test]
    fn nan_cells_do_not_rank_first() {
        let t = table("host,joules\na,1\nb,nan\nb,4\nc,NaN\nc,2\n");
        let joules = t.column("joules").unwrap().as_numeric().unwrap();
        let top = top_n(t.column("host").unwrap(), joules, 3, false);
        assert_eq!(
            top,
            vec![("b".to_string(), 4.0), ("c".to_string(), 2.0), ("a".to_string(), 1.0)]
        );
    }

    #[test]
    fn numeric_group_keys_sort_numerically() {
        let t = table("core,load\n10,1\n9,1\n10,1\n");
        let top = top_n(t.column("core").unwrap(), t.column("load").unwrap().as_numeric().unwrap(), 5, false);
        assert_eq!(top, vec![("10".to_string(), 2.0), ("9".to_string(), 1.0)]);
    }

    #[test]
    fn line_uses_numeric_time_column_when_named() {
        let t = table("secs,watts\n0,1.0\n1,2.0\n");
        let mut figures = Vec::new();
        let n = line_over_time(&t, Some("secs"), None, &mut figures).unwrap();
        assert_eq!(n, 1);
        assert_eq!(figures[0].stem, "line_watts_vs_secs");
        assert_eq!(
            figures[0].body,
            FigureBody::Line {
                points: vec![(0.0, 1.0), (1.0, 2.0)],
                x_axis: AxisScale::Linear
            }
        );
    }

    #[test]
    fn line_rejects_unknown_and_text_columns() {
        let t = table("when,watts,host\n2024-05-01 12:00:00,1,a\n");
        let mut figures = Vec::new();
        let unknown = vec!["volts".to_string()];
        assert!(matches!(
            line_over_time(&t, None, Some(&unknown), &mut figures),
            Err(PlotError::UnknownColumn(c)) if c == "volts"
        ));
        let text = vec!["watts".to_string(), "host".to_string()];
        assert!(matches!(
            line_over_time(&t, None, Some(&text), &mut figures),
            Err(PlotError::WrongKind { .. })
        ));
        assert!(figures.is_empty());
    }

    #[test]
    fn scatter_needs_continuous_axes() {
        let t = table("a,b,c\n1,2,x\n3,4,y\n");
        let mut figures = Vec::new();
        assert_eq!(scatter(&t, "a", "b", &mut figures).unwrap(), 1);
        assert_eq!(figures[0].title, "Scatter: a vs b");
        assert!(scatter(&t, "a", "c", &mut figures).is_err());
        assert_eq!(figures.len(), 1);
    }

    #[test]
    fn bar_requires_numeric_value_column() {
        let t = table("host,tag\na,x\n");
        let mut figures = Vec::new();
        assert!(matches!(
            bar_top_n(&t, "host", "tag", 3, false, &mut figures),
            Err(PlotError::WrongKind { .. })
        ));
    }

    #[test]
    fn bar_figure_naming() {
        let t = table("host,watts\na,1\nb,2\n");
        let mut figures = Vec::new();
        bar_top_n(&t, "host", "watts", 5, false, &mut figures).unwrap();
        assert_eq!(figures[0].title, "Top N: watts by host");
        assert_eq!(figures[0].stem, "bar_top_5_watts_by_host");
        assert_eq!(
            figures[0].body,
            FigureBody::Bar {
                labels: vec!["b".into(), "a".into()],
                values: vec![2.0, 1.0]
            }
        );
    }

    #[test]
    fn heatmap_over_numeric_columns() {
        let t = table("a,b,host\n1,2,x\n2,4,y\n3,7,z\n");
        let mut figures = Vec::new();
        correlation_heatmap(&t, &mut figures).unwrap();
        match &figures[0].body {
            FigureBody::Heatmap { labels, matrix } => {
                assert_eq!(labels, &vec!["a".to_string(), "b".to_string()]);
                assert_eq!(matrix.len(), 2);
                assert!(matrix[0][1] > 0.9);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn heatmap_skips_missing_markers_pairwise() {
        let t = table("a,b,c\n1,2,1\nNA,3,nan\n4,5,3\n6,7,4\n");
        let mut figures = Vec::new();
        correlation_heatmap(&t, &mut figures).unwrap();
        match &figures[0].body {
            FigureBody::Heatmap { labels, matrix } => {
                assert_eq!(labels, &vec!["a".to_string(), "b".to_string(), "c".to_string()]);
                for (i, row) in matrix.iter().enumerate() {
                    assert!((row[i] - 1.0).abs() < 1e-12);
                    assert!(row.iter().all(|r| r.is_finite()));
                }
                // a and b move together on the three rows where a is present
                assert!((matrix[0][1] - 1.0).abs() < 1e-9);
                assert!(matrix[0][2] > 0.99);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }
}
