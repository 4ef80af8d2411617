// Heatmap construction: a dense 2D matrix indexed by two categorical axes.
//
// The X-axis variable supplies the columns, the color variable supplies the
// rows, and the Y metric colors the cells.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::labels::compare_labels;
use crate::query::{field_as_string, metric_as_f64, Row};
use crate::series::{
    AxisData, AxisLayout, ChartView, ColorBar, Config, Layout, Margin, RenderSeries,
};

const LONG_LABEL_CHARS: usize = 5;

/// Gradient stops for the cell colors, position in [0, 1] to hex color.
/// Defaults to a light-green → dark-red ramp (low attrition → high).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScale {
    pub stops: Vec<(f64, String)>,
}

impl Default for ColorScale {
    fn default() -> Self {
        ColorScale {
            stops: vec![
                (0.0, "#c8e6c9".to_string()),
                (0.25, "#a5d6a7".to_string()),
                (0.5, "#81c784".to_string()),
                (0.75, "#e57373".to_string()),
                (1.0, "#c62828".to_string()),
            ],
        }
    }
}

/// The dense matrix behind a heatmap trace.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapMatrix {
    /// Column labels, from the X-axis variable.
    pub x: Vec<String>,
    /// Row labels, from the color variable.
    pub y: Vec<String>,
    /// `z[row][col]`, defaulted to 0 for combinations absent from the rows.
    pub z: Vec<Vec<f64>>,
}

/// Build the matrix from aggregated rows. Fails when no color field is
/// bound: a heatmap cannot render with a single axis.
pub fn build_matrix(
    rows: &[Row],
    x_field: &str,
    color_field: Option<&str>,
    metric_key: &str,
    is_percentage: bool,
) -> Result<HeatmapMatrix> {
    let Some(color_field) = color_field else {
        bail!("Para mapas de calor necesitas una variable categórica en Color");
    };

    let mut x_labels: Vec<String> = rows
        .iter()
        .filter_map(|row| field_as_string(row, x_field))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    x_labels.sort_by(|a, b| compare_labels(a, b));

    let mut y_labels: Vec<String> = rows
        .iter()
        .filter_map(|row| field_as_string(row, color_field))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    y_labels.sort_by(|a, b| compare_labels(a, b));

    let mut z = vec![vec![0.0; x_labels.len()]; y_labels.len()];

    for row in rows {
        let (Some(x_value), Some(y_value)) =
            (field_as_string(row, x_field), field_as_string(row, color_field))
        else {
            continue;
        };
        let (Some(col), Some(line)) = (
            x_labels.iter().position(|l| *l == x_value),
            y_labels.iter().position(|l| *l == y_value),
        ) else {
            continue;
        };

        let mut value = metric_as_f64(row, metric_key);
        if is_percentage {
            value *= 100.0;
        }
        z[line][col] = value;
    }

    Ok(HeatmapMatrix { x: x_labels, y: y_labels, z })
}

/// Build the full renderer input for a heatmap.
pub fn build_heatmap(
    rows: &[Row],
    x_field: &str,
    color_field: Option<&str>,
    metric_key: &str,
    metric_label: &str,
    is_percentage: bool,
    title: &str,
    scale: &ColorScale,
) -> Result<ChartView> {
    let matrix = build_matrix(rows, x_field, color_field, metric_key, is_percentage)?;
    // build_matrix already rejected the missing-color case
    let color_field = color_field.unwrap_or_default();

    let long_x = matrix.x.iter().any(|l| l.chars().count() > LONG_LABEL_CHARS);
    let long_y = matrix.y.iter().any(|l| l.chars().count() > LONG_LABEL_CHARS);

    let colorbar_title = if is_percentage {
        format!("{metric_label} (%)")
    } else {
        metric_label.to_string()
    };

    let trace = RenderSeries {
        x: matrix.x,
        y: AxisData::Labels(matrix.y),
        z: Some(matrix.z),
        trace_type: "heatmap".to_string(),
        hoverongaps: Some(false),
        colorscale: Some(scale.stops.clone()),
        colorbar: Some(ColorBar { title: colorbar_title }),
        ..Default::default()
    };

    let margin = Margin {
        t: 50,
        r: 70,
        b: if long_x { 120 } else { 60 },
        l: if long_y { 120 } else { 80 },
    };

    Ok(ChartView {
        series: vec![trace],
        layout: Layout {
            title: title.to_string(),
            margin,
            xaxis: AxisLayout {
                title: Some(x_field.to_string()),
                tickangle: Some(if long_x { -90 } else { 0 }),
                automargin: true,
                axis_type: Some("category".to_string()),
                range: None,
                ticksuffix: None,
            },
            yaxis: AxisLayout {
                title: Some(color_field.to_string()),
                tickangle: Some(if long_y { -90 } else { 0 }),
                automargin: true,
                axis_type: Some("category".to_string()),
                range: None,
                ticksuffix: None,
            },
            showlegend: None,
            hovermode: Some("closest".to_string()),
            barmode: None,
            boxmode: None,
        },
        config: Config::default(),
    })
}
