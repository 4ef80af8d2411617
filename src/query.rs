// Compilation of an encoding into a dynamic aggregation query, plus the
// result types coming back from the query executor.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encoding::{ChartEncoding, ChartType, Filter, Metric};

/// Row cap for aggregated queries.
pub const AGGREGATED_LIMIT: usize = 1000;
/// Row cap for unaggregated queries; box plots need raw distributions.
pub const RAW_LIMIT: usize = 5000;

/// Aggregation request for the dynamic query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicQuery {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    pub limit: usize,
}

/// Request for the unaggregated-rows endpoint (box plots).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuery {
    pub dimensions: Vec<String>,
    pub value_columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub limit: usize,
}

/// What the compiler produced for the current encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    Aggregated(DynamicQuery),
    Raw(RawQuery),
}

/// A result row: field name → value. Values are numbers, strings or null;
/// lookups are explicit and missing keys surface as `None`.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Raw,
    Aggregated,
}

/// Response shape of both query endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub kind: ResultKind,
    pub rows: Vec<Row>,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
}

/// Read a row field as a display string. Numbers are formatted, null and
/// missing keys are `None`. X values always go through this before sorting
/// so the renderer never reinterprets them as dates or numbers.
pub fn field_as_string(row: &Row, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Read a metric value from a row, coercing strings and defaulting malformed
/// or missing values to 0.0. A complete chart beats a crash here, at the
/// cost of showing missing data as zero.
pub fn metric_as_f64(row: &Row, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Compile the current encoding into a query.
///
/// Returns `Ok(None)` when either positional axis is empty — no query should
/// be issued. Heatmaps additionally require a color variable for their
/// second axis; that failure is an error the caller must surface.
pub fn compile(encoding: &ChartEncoding) -> Result<Option<CompiledQuery>> {
    let (x, y) = match (encoding.x_var(), encoding.y_var()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Ok(None),
    };

    if encoding.chart_type == ChartType::Heatmap && encoding.color_var().is_none() {
        bail!("El mapa de calor requiere una variable adicional en Color para formar el eje Y");
    }

    // X dimension always first, color second; the normalizer relies on it.
    let mut dimensions = vec![x.name.clone()];
    if let Some(color) = encoding.color_var() {
        dimensions.push(color.name.clone());
    }

    if encoding.chart_type == ChartType::Box {
        return Ok(Some(CompiledQuery::Raw(RawQuery {
            dimensions,
            value_columns: vec![y.name.clone()],
            filters: encoding.filters.clone(),
            limit: RAW_LIMIT,
        })));
    }

    let metric = y.effective_metric();
    Ok(Some(CompiledQuery::Aggregated(DynamicQuery {
        dimensions,
        metrics: vec![metric.query_expr(&y.name)],
        filters: encoding.filters.clone(),
        order_by: None,
        limit: AGGREGATED_LIMIT,
    })))
}

/// Metric key the executor will use for this encoding's Y variable.
pub fn metric_key(encoding: &ChartEncoding) -> Option<String> {
    let y = encoding.y_var()?;
    Some(y.effective_metric().result_key(&y.name))
}
