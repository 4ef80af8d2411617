// Column metadata as served by the schema endpoint, and the drag-drop
// variables the explorer derives from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encoding::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Text,
    Date,
}

/// One column of the dataset. Immutable once fetched; decides which
/// encodings are legal for the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
    pub filterable: bool,
    pub visualizable: bool,
    #[serde(default)]
    pub distinct_value_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response shape of the schema endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub columns: Vec<ColumnDescriptor>,
    pub total_columns: usize,
    pub filterable_columns: usize,
    pub numeric_columns: usize,
    pub categorical_columns: usize,
}

/// Response shape of the distinct-values endpoint (filter pickers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistinctValues {
    pub values: Vec<Value>,
    pub total: usize,
}

/// Numeric columns with fewer distinct values than this are treated as
/// quasi-categorical and may drive color grouping.
const COLOR_DISTINCT_LIMIT: usize = 20;

/// A variable available for drag and drop onto an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: ColumnKind,
    #[serde(default)]
    pub distinct_value_count: usize,
    pub eligible_for_color: bool,
    /// True only for zero/one-coded numeric columns, where AVG×100 reads as
    /// a percentage.
    #[serde(default)]
    pub supports_percentage: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
}

impl Variable {
    /// Derive a variable from a schema column. Returns `None` for columns
    /// the schema marks as not visualizable.
    pub fn from_column(col: &ColumnDescriptor) -> Option<Self> {
        if !col.visualizable {
            return None;
        }

        let quasi_categorical = col.kind == ColumnKind::Numeric
            && col.distinct_value_count >= 1
            && col.distinct_value_count < COLOR_DISTINCT_LIMIT;

        let binary = col.kind == ColumnKind::Numeric
            && col.distinct_value_count <= 2
            && col.min.map_or(false, |v| v >= 0.0)
            && col.max.map_or(false, |v| v <= 1.0);

        Some(Variable {
            name: col.name.clone(),
            kind: col.kind,
            distinct_value_count: col.distinct_value_count,
            eligible_for_color: col.kind == ColumnKind::Categorical || quasi_categorical,
            supports_percentage: binary,
            metric: None,
        })
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    /// Metrics offered for this variable on the Y axis. PERCENTAGE only
    /// makes sense for zero/one-coded fields.
    pub fn available_metrics(&self) -> Vec<Metric> {
        let mut metrics = vec![
            Metric::Avg,
            Metric::Count,
            Metric::Sum,
            Metric::Min,
            Metric::Max,
        ];
        if self.supports_percentage {
            metrics.push(Metric::Percentage);
        }
        metrics
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Metric in effect on the Y axis; AVG when none was chosen.
    pub fn effective_metric(&self) -> Metric {
        self.metric.unwrap_or(Metric::Avg)
    }
}

/// Build the drag-drop variable list for a schema.
pub fn variables_from_schema(schema: &SchemaSummary) -> Vec<Variable> {
    schema.columns.iter().filter_map(Variable::from_column).collect()
}
