// Renderer-ready output: series, layout and config for the charting
// library. The vocabulary here (x/y/z arrays, type, mode, marker, line,
// fill) is this crate's own output contract and must stay stable.

use serde::{Deserialize, Serialize};

use crate::encoding::{ChartType, Metric};
use crate::normalize::SeriesGroup;
use crate::palette::{color_for, hex_to_rgba, SINGLE_SERIES_COLOR};
use crate::query::{field_as_string, metric_as_f64, Row};

/// Labels longer than this rotate X ticks and widen the bottom margin.
const LONG_LABEL_CHARS: usize = 5;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Marker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorBar {
    pub title: String,
}

/// Y-axis values of one trace: numeric for bar/line/scatter/box series,
/// string row labels for heatmaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisData {
    Numbers(Vec<f64>),
    Labels(Vec<String>),
}

impl Default for AxisData {
    fn default() -> Self {
        AxisData::Numbers(Vec::new())
    }
}

impl AxisData {
    pub fn is_empty(&self) -> bool {
        match self {
            AxisData::Numbers(v) => v.is_empty(),
            AxisData::Labels(v) => v.is_empty(),
        }
    }

    pub fn numbers(&self) -> Option<&[f64]> {
        match self {
            AxisData::Numbers(v) => Some(v),
            AxisData::Labels(_) => None,
        }
    }
}

impl From<Vec<f64>> for AxisData {
    fn from(values: Vec<f64>) -> Self {
        AxisData::Numbers(values)
    }
}

/// One renderable trace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderSeries {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x: Vec<String>,
    #[serde(default, skip_serializing_if = "AxisData::is_empty")]
    pub y: AxisData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Vec<Vec<f64>>>,
    #[serde(rename = "type")]
    pub trace_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<LineProps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fillcolor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boxmean: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<Vec<(f64, String)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorbar: Option<ColorBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoverongaps: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margin {
    pub t: u32,
    pub r: u32,
    pub b: u32,
    pub l: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickangle: Option<i32>,
    pub automargin: bool,
    /// Forced to "category" on aggregated charts so numeric-looking labels
    /// are never auto-detected as dates.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticksuffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub title: String,
    pub margin: Margin,
    pub xaxis: AxisLayout,
    pub yaxis: AxisLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub showlegend: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hovermode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barmode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boxmode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub responsive: bool,
    #[serde(rename = "displayModeBar")]
    pub display_mode_bar: bool,
    pub displaylogo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config { responsive: true, display_mode_bar: true, displaylogo: false }
    }
}

/// The full renderer input for one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartView {
    pub series: Vec<RenderSeries>,
    pub layout: Layout,
    pub config: Config,
}

impl ChartView {
    /// A chart with no data; shown instead of stale data on query failure.
    pub fn empty(title: &str) -> Self {
        ChartView {
            series: Vec::new(),
            layout: Layout {
                title: title.to_string(),
                margin: margin_for(false),
                xaxis: AxisLayout { automargin: true, ..Default::default() },
                yaxis: AxisLayout { automargin: true, ..Default::default() },
                showlegend: Some(true),
                hovermode: Some("closest".to_string()),
                barmode: None,
                boxmode: None,
            },
            config: Config::default(),
        }
    }
}

fn has_long_label<'a>(labels: impl Iterator<Item = &'a str>) -> bool {
    let mut labels = labels;
    labels.any(|label| label.chars().count() > LONG_LABEL_CHARS)
}

fn margin_for(long_labels: bool) -> Margin {
    if long_labels {
        Margin { t: 50, r: 50, b: 120, l: 60 }
    } else {
        Margin { t: 50, r: 50, b: 50, l: 60 }
    }
}

/// Build one trace per series group, styled by chart type.
pub fn build_series(
    groups: &[SeriesGroup],
    chart_type: ChartType,
    x_field: &str,
    y_field: &str,
    metric: Metric,
    color_field: Option<&str>,
    title: &str,
) -> ChartView {
    let grouped = color_field.is_some();

    let series: Vec<RenderSeries> = groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let base_color = if grouped {
                color_for(index).to_string()
            } else {
                SINGLE_SERIES_COLOR.to_string()
            };

            let name = match (&group.key, color_field) {
                (Some(value), Some(field)) => format!("{field} = {value}"),
                _ => title.to_string(),
            };

            let mut trace = RenderSeries {
                x: group.points.iter().map(|p| p.x.clone()).collect(),
                y: group.points.iter().map(|p| p.y).collect::<Vec<f64>>().into(),
                trace_type: chart_type.trace_type().to_string(),
                name: Some(name),
                ..Default::default()
            };

            if grouped {
                trace.marker = Some(Marker { color: Some(base_color.clone()), size: None });
            }

            match chart_type {
                ChartType::Bar => {
                    trace.marker =
                        Some(Marker { color: Some(base_color.clone()), size: None });
                }
                ChartType::Line => {
                    trace.mode = Some("lines+markers".to_string());
                    trace.line =
                        Some(LineProps { color: Some(base_color.clone()), width: Some(2.0) });
                }
                ChartType::Area => {
                    trace.mode = Some("lines".to_string());
                    trace.line =
                        Some(LineProps { color: Some(base_color.clone()), width: Some(2.0) });
                    trace.fill = Some("tozeroy".to_string());
                    trace.fillcolor = hex_to_rgba(&base_color, 0.5).ok();
                }
                ChartType::Scatter => {
                    trace.mode = Some("markers".to_string());
                    trace.marker =
                        Some(Marker { color: Some(base_color.clone()), size: Some(10.0) });
                }
                // Histogram and pie pass through without extra styling.
                _ => {}
            }

            trace
        })
        .collect();

    let long_labels = has_long_label(
        groups
            .iter()
            .flat_map(|g| g.points.iter())
            .map(|p| p.x.as_str()),
    );

    let mut yaxis = AxisLayout {
        title: Some(format!("{} de {}", metric.label(), y_field)),
        automargin: true,
        ..Default::default()
    };
    if metric.is_percentage() {
        yaxis.range = Some([0.0, 100.0]);
        yaxis.ticksuffix = Some("%".to_string());
    }

    let barmode = if grouped && chart_type == ChartType::Bar {
        "group"
    } else {
        "relative"
    };

    ChartView {
        series,
        layout: Layout {
            title: title.to_string(),
            margin: margin_for(long_labels),
            xaxis: AxisLayout {
                title: Some(x_field.to_string()),
                tickangle: Some(if long_labels { -90 } else { 0 }),
                automargin: true,
                axis_type: Some("category".to_string()),
                range: None,
                ticksuffix: None,
            },
            yaxis,
            showlegend: Some(true),
            hovermode: Some("closest".to_string()),
            barmode: Some(barmode.to_string()),
            boxmode: None,
        },
        config: Config::default(),
    }
}

/// Build box-plot traces from unaggregated rows: one trace per color value
/// when grouped, one trace per X category otherwise.
pub fn build_box_series(
    rows: &[Row],
    x_field: &str,
    y_field: &str,
    color_field: Option<&str>,
    title: &str,
) -> ChartView {
    let (series, x_labels): (Vec<RenderSeries>, Vec<String>) = match color_field {
        Some(color) => {
            let values: Vec<String> = rows
                .iter()
                .filter_map(|row| field_as_string(row, color))
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();

            let series = values
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    let members: Vec<&Row> = rows
                        .iter()
                        .filter(|row| {
                            field_as_string(row, color).as_deref() == Some(value.as_str())
                        })
                        .collect();
                    RenderSeries {
                        x: members
                            .iter()
                            .filter_map(|row| field_as_string(row, x_field))
                            .collect(),
                        y: members
                            .iter()
                            .map(|row| metric_as_f64(row, y_field))
                            .collect::<Vec<f64>>()
                            .into(),
                        trace_type: "box".to_string(),
                        name: Some(format!("{color} = {value}")),
                        marker: Some(Marker {
                            color: Some(color_for(index).to_string()),
                            size: None,
                        }),
                        boxmean: Some("sd".to_string()),
                        ..Default::default()
                    }
                })
                .collect();

            let labels = rows
                .iter()
                .filter_map(|row| field_as_string(row, x_field))
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();
            (series, labels)
        }
        None => {
            let categories: Vec<String> = rows
                .iter()
                .filter_map(|row| field_as_string(row, x_field))
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();

            let series = categories
                .iter()
                .map(|category| RenderSeries {
                    y: rows
                        .iter()
                        .filter(|row| {
                            field_as_string(row, x_field).as_deref() == Some(category.as_str())
                        })
                        .map(|row| metric_as_f64(row, y_field))
                        .collect::<Vec<f64>>()
                        .into(),
                    trace_type: "box".to_string(),
                    name: Some(category.clone()),
                    marker: Some(Marker {
                        color: Some(SINGLE_SERIES_COLOR.to_string()),
                        size: None,
                    }),
                    boxmean: Some("sd".to_string()),
                    ..Default::default()
                })
                .collect();

            (series, categories.clone())
        }
    };

    let long_labels = has_long_label(x_labels.iter().map(String::as_str));

    ChartView {
        series,
        layout: Layout {
            title: title.to_string(),
            margin: margin_for(long_labels),
            xaxis: AxisLayout {
                title: Some(x_field.to_string()),
                tickangle: Some(if long_labels { -90 } else { 0 }),
                automargin: true,
                ..Default::default()
            },
            yaxis: AxisLayout {
                title: Some(y_field.to_string()),
                automargin: true,
                ..Default::default()
            },
            showlegend: Some(true),
            hovermode: None,
            barmode: None,
            boxmode: color_field.map(|_| "group".to_string()),
        },
        config: Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{DataPoint, SeriesGroup};
    use serde_json::json;

    fn groups() -> Vec<SeriesGroup> {
        vec![
            SeriesGroup {
                key: Some("F".to_string()),
                points: vec![
                    DataPoint { x: "Artes".to_string(), y: 3.5 },
                    DataPoint { x: "Ciencias".to_string(), y: 3.8 },
                ],
            },
            SeriesGroup {
                key: Some("M".to_string()),
                points: vec![
                    DataPoint { x: "Artes".to_string(), y: 3.2 },
                    DataPoint { x: "Ciencias".to_string(), y: 3.6 },
                ],
            },
        ]
    }

    #[test]
    fn test_grouped_bar_series() {
        let view = build_series(
            &groups(),
            ChartType::Bar,
            "facultad",
            "promedio_carrera",
            Metric::Avg,
            Some("sexo"),
            "Promedio de promedio_carrera por facultad",
        );
        assert_eq!(view.series.len(), 2);
        assert_eq!(view.series[0].name.as_deref(), Some("sexo = F"));
        assert_eq!(view.series[1].name.as_deref(), Some("sexo = M"));
        assert_eq!(view.series[0].marker.as_ref().unwrap().color.as_deref(), Some("#1f77b4"));
        assert_eq!(view.series[1].marker.as_ref().unwrap().color.as_deref(), Some("#ff7f0e"));
        assert_eq!(view.layout.barmode.as_deref(), Some("group"));
    }

    #[test]
    fn test_ungrouped_series_uses_title_and_default_color() {
        let single = vec![SeriesGroup {
            key: None,
            points: vec![DataPoint { x: "2016".to_string(), y: 1.0 }],
        }];
        let view = build_series(
            &single,
            ChartType::Bar,
            "periodo",
            "desertor",
            Metric::Avg,
            None,
            "Promedio de desertor por periodo",
        );
        assert_eq!(view.series.len(), 1);
        assert_eq!(view.series[0].name.as_deref(), Some("Promedio de desertor por periodo"));
        assert_eq!(
            view.series[0].marker.as_ref().unwrap().color.as_deref(),
            Some(SINGLE_SERIES_COLOR)
        );
        assert_eq!(view.layout.barmode.as_deref(), Some("relative"));
    }

    #[test]
    fn test_line_and_area_modes() {
        let view = build_series(
            &groups(),
            ChartType::Line,
            "facultad",
            "promedio_carrera",
            Metric::Avg,
            Some("sexo"),
            "t",
        );
        assert_eq!(view.series[0].mode.as_deref(), Some("lines+markers"));
        assert_eq!(view.series[0].line.as_ref().unwrap().width, Some(2.0));

        let view = build_series(
            &groups(),
            ChartType::Area,
            "facultad",
            "promedio_carrera",
            Metric::Avg,
            Some("sexo"),
            "t",
        );
        assert_eq!(view.series[0].mode.as_deref(), Some("lines"));
        assert_eq!(view.series[0].fill.as_deref(), Some("tozeroy"));
        assert_eq!(
            view.series[0].fillcolor.as_deref(),
            Some("rgba(31, 119, 180, 0.5)")
        );
    }

    #[test]
    fn test_scatter_marker_size() {
        let view = build_series(
            &groups(),
            ChartType::Scatter,
            "facultad",
            "promedio_carrera",
            Metric::Avg,
            Some("sexo"),
            "t",
        );
        assert_eq!(view.series[0].mode.as_deref(), Some("markers"));
        assert_eq!(view.series[0].marker.as_ref().unwrap().size, Some(10.0));
    }

    #[test]
    fn test_long_labels_rotate_ticks() {
        let view = build_series(
            &groups(), // "Ciencias" is longer than 5 chars
            ChartType::Bar,
            "facultad",
            "promedio_carrera",
            Metric::Avg,
            Some("sexo"),
            "t",
        );
        assert_eq!(view.layout.xaxis.tickangle, Some(-90));
        assert_eq!(view.layout.margin.b, 120);

        let short = vec![SeriesGroup {
            key: None,
            points: vec![DataPoint { x: "M".to_string(), y: 1.0 }],
        }];
        let view =
            build_series(&short, ChartType::Bar, "sexo", "desertor", Metric::Avg, None, "t");
        assert_eq!(view.layout.xaxis.tickangle, Some(0));
        assert_eq!(view.layout.margin.b, 50);
    }

    #[test]
    fn test_percentage_pins_y_axis() {
        let view = build_series(
            &groups(),
            ChartType::Bar,
            "facultad",
            "desertor",
            Metric::Percentage,
            Some("sexo"),
            "t",
        );
        assert_eq!(view.layout.yaxis.range, Some([0.0, 100.0]));
        assert_eq!(view.layout.yaxis.ticksuffix.as_deref(), Some("%"));
        assert_eq!(view.layout.yaxis.title.as_deref(), Some("Porcentaje de desertor"));
    }

    #[test]
    fn test_x_axis_forced_categorical() {
        let view =
            build_series(&groups(), ChartType::Bar, "facultad", "y", Metric::Avg, Some("sexo"), "t");
        assert_eq!(view.layout.xaxis.axis_type.as_deref(), Some("category"));
    }

    #[test]
    fn test_build_is_idempotent() {
        let input = groups();
        let a = build_series(&input, ChartType::Line, "f", "y", Metric::Avg, Some("sexo"), "t");
        let b = build_series(&input, ChartType::Line, "f", "y", Metric::Avg, Some("sexo"), "t");
        assert_eq!(a, b);
    }

    fn box_rows() -> Vec<Row> {
        serde_json::from_value(json!([
            {"facultad": "Artes", "sexo": "F", "promedio_carrera": 3.1},
            {"facultad": "Artes", "sexo": "M", "promedio_carrera": 3.3},
            {"facultad": "Ciencias", "sexo": "F", "promedio_carrera": 3.9},
            {"facultad": "Ciencias", "sexo": "M", "promedio_carrera": 3.5},
        ]))
        .unwrap()
    }

    #[test]
    fn test_box_grouped_by_color() {
        let view = build_box_series(
            &box_rows(),
            "facultad",
            "promedio_carrera",
            Some("sexo"),
            "Distribución de promedio_carrera por facultad",
        );
        assert_eq!(view.series.len(), 2);
        assert_eq!(view.series[0].name.as_deref(), Some("sexo = F"));
        assert_eq!(view.series[0].x, vec!["Artes", "Ciencias"]);
        assert_eq!(view.series[0].y.numbers(), Some(&[3.1, 3.9][..]));
        assert_eq!(view.series[0].boxmean.as_deref(), Some("sd"));
        assert_eq!(view.layout.boxmode.as_deref(), Some("group"));
    }

    #[test]
    fn test_box_ungrouped_one_trace_per_category() {
        let view = build_box_series(&box_rows(), "facultad", "promedio_carrera", None, "t");
        assert_eq!(view.series.len(), 2);
        assert_eq!(view.series[0].name.as_deref(), Some("Artes"));
        assert!(view.series[0].x.is_empty());
        assert_eq!(view.series[0].y.numbers(), Some(&[3.1, 3.3][..]));
        assert_eq!(view.layout.boxmode, None);
        // Raw y values, never a percentage range
        assert_eq!(view.layout.yaxis.range, None);
    }

    #[test]
    fn test_series_serialization_shape() {
        let view = build_box_series(&box_rows(), "facultad", "promedio_carrera", None, "t");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["series"][0]["type"], "box");
        assert_eq!(json["config"]["displayModeBar"], true);
        assert_eq!(json["config"]["displaylogo"], false);
        // Absent options stay out of the wire format
        assert!(json["series"][0].get("fill").is_none());
    }
}
