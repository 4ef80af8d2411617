// Visual encoding state: chart type, metric, filters and axis bindings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Pie,
    Area,
    Box,
    Histogram,
    Heatmap,
}

impl ChartType {
    /// Trace type understood by the renderer. Line and area charts render as
    /// scatter traces with a mode; the rest map one-to-one.
    pub fn trace_type(self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line | ChartType::Scatter | ChartType::Area => "scatter",
            ChartType::Pie => "pie",
            ChartType::Box => "box",
            ChartType::Histogram => "histogram",
            ChartType::Heatmap => "heatmap",
        }
    }
}

/// Aggregation applied to the Y variable. One enum carries the query
/// expression, the result-column key and the display label so the compiler
/// and the normalizer cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Metric {
    Avg,
    Count,
    Sum,
    Min,
    Max,
    Percentage,
}

impl Metric {
    /// Metric expression sent to the query executor.
    /// COUNT always counts rows; PERCENTAGE is an AVG scaled afterwards.
    pub fn query_expr(self, field: &str) -> String {
        match self {
            Metric::Count => "COUNT(id)".to_string(),
            Metric::Avg | Metric::Percentage => format!("AVG({field})"),
            Metric::Sum => format!("SUM({field})"),
            Metric::Min => format!("MIN({field})"),
            Metric::Max => format!("MAX({field})"),
        }
    }

    /// Key under which the executor reports this metric in each result row.
    /// This naming convention is a contract with the backend.
    pub fn result_key(self, field: &str) -> String {
        match self {
            Metric::Count => "count".to_string(),
            Metric::Avg | Metric::Percentage => format!("avg_{field}"),
            Metric::Sum => format!("sum_{field}"),
            Metric::Min => format!("min_{field}"),
            Metric::Max => format!("max_{field}"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Avg => "Promedio",
            Metric::Count => "Recuento",
            Metric::Sum => "Suma",
            Metric::Min => "Mínimo",
            Metric::Max => "Máximo",
            Metric::Percentage => "Porcentaje",
        }
    }

    pub fn is_percentage(self) -> bool {
        self == Metric::Percentage
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    Icontains,
}

impl FilterOp {
    pub fn expects_set(self) -> bool {
        matches!(self, FilterOp::In | FilterOp::NotIn)
    }
}

/// One active filter. At most one filter per column is active at a time;
/// the store enforces replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: FilterOp, value: Value) -> Self {
        Filter { column: column.into(), operator, value }
    }

    /// Check value shape against the operator: `in`/`not_in` take a set,
    /// the rest a scalar.
    pub fn validate(&self) -> Result<()> {
        if self.operator.expects_set() {
            if !self.value.is_array() {
                bail!(
                    "Filter on '{}': operator {:?} requires a list of values",
                    self.column,
                    self.operator
                );
            }
        } else if self.value.is_array() || self.value.is_object() {
            bail!(
                "Filter on '{}': operator {:?} requires a scalar value",
                self.column,
                self.operator
            );
        }
        Ok(())
    }
}

/// Which encoding channel a variable is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisSlot {
    X,
    Y,
    Color,
    Size,
}

/// The complete encoding of one chart. X and Y hold at most one variable;
/// color and size may hold several (in practice one is used).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartEncoding {
    pub chart_type: ChartType,
    pub x_axis: Vec<Variable>,
    pub y_axis: Vec<Variable>,
    pub color: Vec<Variable>,
    pub size: Vec<Variable>,
    pub filters: Vec<Filter>,
}

impl Default for ChartEncoding {
    fn default() -> Self {
        ChartEncoding {
            chart_type: ChartType::Bar,
            x_axis: Vec::new(),
            y_axis: Vec::new(),
            color: Vec::new(),
            size: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl ChartEncoding {
    pub fn x_var(&self) -> Option<&Variable> {
        self.x_axis.first()
    }

    pub fn y_var(&self) -> Option<&Variable> {
        self.y_axis.first()
    }

    pub fn color_var(&self) -> Option<&Variable> {
        self.color.first()
    }

    /// Both positional axes bound; nothing can be queried otherwise.
    pub fn is_complete(&self) -> bool {
        self.x_var().is_some() && self.y_var().is_some()
    }

    /// Chart title derived from the current encoding, recomputed on every
    /// metric or axis change.
    pub fn title(&self) -> Option<String> {
        let x = self.x_var()?;
        let y = self.y_var()?;
        Some(match self.chart_type {
            ChartType::Box => format!("Distribución de {} por {}", y.name, x.name),
            _ => {
                let metric = y.effective_metric();
                format!("{} de {} por {}", metric.label(), y.name, x.name)
            }
        })
    }
}
