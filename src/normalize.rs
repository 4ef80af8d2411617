// Shaping of aggregated query results: resolve the metric column, apply
// percentage scaling, split by color group and order each group along X.

use std::collections::BTreeSet;

use crate::labels::compare_labels;
use crate::query::{field_as_string, metric_as_f64, Row};

/// One renderable point. X is always a string so the renderer never
/// reinterprets numeric-looking labels as dates or numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub x: String,
    pub y: f64,
}

/// Rows for one series: one group per distinct color value, or a single
/// ungrouped set when no color variable is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesGroup {
    /// Distinct color value this group belongs to; `None` when ungrouped.
    pub key: Option<String>,
    pub points: Vec<DataPoint>,
}

/// Group and order aggregated rows for the series builder.
///
/// Color groups are collected as a set and sorted in plain lexical order of
/// the raw value. X points within each group sort through the label
/// comparator. The two orderings differ on purpose; see DESIGN.md.
pub fn normalize(
    rows: &[Row],
    x_field: &str,
    color_field: Option<&str>,
    metric_key: &str,
    is_percentage: bool,
) -> Vec<SeriesGroup> {
    match color_field {
        Some(color) => {
            let values: BTreeSet<String> = rows
                .iter()
                .filter_map(|row| field_as_string(row, color))
                .collect();

            values
                .into_iter()
                .map(|value| {
                    let members: Vec<&Row> = rows
                        .iter()
                        .filter(|row| {
                            field_as_string(row, color).as_deref() == Some(value.as_str())
                        })
                        .collect();
                    SeriesGroup {
                        key: Some(value),
                        points: extract_points(&members, x_field, metric_key, is_percentage),
                    }
                })
                .collect()
        }
        None => {
            let members: Vec<&Row> = rows.iter().collect();
            vec![SeriesGroup {
                key: None,
                points: extract_points(&members, x_field, metric_key, is_percentage),
            }]
        }
    }
}

fn extract_points(
    rows: &[&Row],
    x_field: &str,
    metric_key: &str,
    is_percentage: bool,
) -> Vec<DataPoint> {
    let mut points: Vec<DataPoint> = rows
        .iter()
        .filter_map(|row| {
            let x = field_as_string(row, x_field)?;
            let mut y = metric_as_f64(row, metric_key);
            if is_percentage {
                y *= 100.0;
            }
            Some(DataPoint { x, y })
        })
        .collect();

    points.sort_by(|a, b| compare_labels(&a.x, &b.x));
    points
}
