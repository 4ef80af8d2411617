use anyhow::{bail, Result};
use serde_json::json;

use cohortviz::encoding::{AxisSlot, ChartType, Filter, FilterOp, Metric};
use cohortviz::query::{DynamicQuery, QueryResult, RawQuery, ResultKind, Row};
use cohortviz::runtime::{ChartRuntime, QueryExecutor};
use cohortviz::schema::{ColumnKind, DistinctValues, SchemaSummary, Variable};
use cohortviz::store::EncodingStore;

/// Executor serving canned rows, recording the queries it receives.
struct CannedExecutor {
    rows: Vec<Row>,
    kind: ResultKind,
    seen: std::cell::RefCell<Vec<String>>,
}

impl CannedExecutor {
    fn aggregated(rows: serde_json::Value) -> Self {
        CannedExecutor {
            rows: serde_json::from_value(rows).unwrap(),
            kind: ResultKind::Aggregated,
            seen: std::cell::RefCell::new(Vec::new()),
        }
    }

    fn raw(rows: serde_json::Value) -> Self {
        CannedExecutor {
            rows: serde_json::from_value(rows).unwrap(),
            kind: ResultKind::Raw,
            seen: std::cell::RefCell::new(Vec::new()),
        }
    }

    fn respond(&self) -> QueryResult {
        QueryResult {
            kind: self.kind,
            total: self.rows.len(),
            rows: self.rows.clone(),
            dimensions: None,
            metrics: None,
        }
    }
}

impl QueryExecutor for CannedExecutor {
    fn run_aggregated(&self, query: &DynamicQuery) -> Result<QueryResult> {
        self.seen.borrow_mut().push(serde_json::to_string(query)?);
        Ok(self.respond())
    }

    fn run_raw(&self, query: &RawQuery) -> Result<QueryResult> {
        self.seen.borrow_mut().push(serde_json::to_string(query)?);
        Ok(self.respond())
    }

    fn distinct_values(&self, _column: &str, _filters: &[Filter]) -> Result<DistinctValues> {
        bail!("not served by this executor")
    }

    fn fetch_schema(&self) -> Result<SchemaSummary> {
        bail!("not served by this executor")
    }
}

fn categorical(name: &str) -> Variable {
    Variable {
        name: name.to_string(),
        kind: ColumnKind::Categorical,
        distinct_value_count: 5,
        eligible_for_color: true,
        supports_percentage: false,
        metric: None,
    }
}

fn binary(name: &str) -> Variable {
    Variable {
        name: name.to_string(),
        kind: ColumnKind::Numeric,
        distinct_value_count: 2,
        eligible_for_color: true,
        supports_percentage: true,
        metric: None,
    }
}

fn numeric(name: &str) -> Variable {
    Variable {
        name: name.to_string(),
        kind: ColumnKind::Numeric,
        distinct_value_count: 200,
        eligible_for_color: false,
        supports_percentage: false,
        metric: None,
    }
}

#[test]
fn test_attrition_rate_by_faculty_and_sex() {
    // Attrition percentage per faculty, split by sex
    let mut store = EncodingStore::new();
    store.add_variable(AxisSlot::X, categorical("facultad")).unwrap();
    store.add_variable(AxisSlot::Y, binary("desertor")).unwrap();
    store.set_metric(Metric::Percentage);
    store.add_variable(AxisSlot::Color, categorical("sexo")).unwrap();

    let executor = CannedExecutor::aggregated(json!([
        {"facultad": "Artes", "sexo": "F", "avg_desertor": 0.12},
        {"facultad": "Artes", "sexo": "M", "avg_desertor": 0.30},
        {"facultad": "Ciencias", "sexo": "F", "avg_desertor": 0.08},
        {"facultad": "Ciencias", "sexo": "M", "avg_desertor": 0.22},
    ]));

    let mut runtime = ChartRuntime::default();
    let view = runtime.refresh(&executor, &store.snapshot()).unwrap().unwrap();

    // The executor saw AVG(desertor) grouped by both dimensions
    let sent = executor.seen.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("AVG(desertor)"));
    assert!(sent[0].contains("facultad"));
    assert!(sent[0].contains("sexo"));

    // One series per sex, lexical group order
    assert_eq!(view.series.len(), 2);
    assert_eq!(view.series[0].name.as_deref(), Some("sexo = F"));
    assert_eq!(view.series[1].name.as_deref(), Some("sexo = M"));

    // Two faculties per series, percentages scaled to 0-100
    assert_eq!(view.series[0].x, vec!["Artes", "Ciencias"]);
    assert_eq!(view.series[0].y.numbers(), Some(&[12.0, 8.0][..]));
    assert_eq!(view.series[1].y.numbers(), Some(&[30.0, 22.0][..]));

    // Percentage cosmetics on the Y axis
    assert_eq!(view.layout.yaxis.range, Some([0.0, 100.0]));
    assert_eq!(view.layout.yaxis.ticksuffix.as_deref(), Some("%"));
    assert_eq!(view.layout.title, "Porcentaje de desertor por facultad");
}

#[test]
fn test_incomplete_encoding_issues_no_query() {
    let mut store = EncodingStore::new();
    store.add_variable(AxisSlot::X, categorical("facultad")).unwrap();

    let executor = CannedExecutor::aggregated(json!([]));
    let mut runtime = ChartRuntime::default();
    assert!(runtime.refresh(&executor, &store.snapshot()).unwrap().is_none());
    assert!(executor.seen.borrow().is_empty());
}

#[test]
fn test_filters_reach_the_executor() {
    let mut store = EncodingStore::new();
    store.add_variable(AxisSlot::X, categorical("periodo_ingreso")).unwrap();
    store.add_variable(AxisSlot::Y, numeric("promedio_carrera")).unwrap();
    store
        .add_filter(Filter::new("estrato", FilterOp::Lte, json!(3)))
        .unwrap();

    let executor = CannedExecutor::aggregated(json!([]));
    let mut runtime = ChartRuntime::default();
    runtime.refresh(&executor, &store.snapshot()).unwrap();

    let sent = executor.seen.borrow();
    assert!(sent[0].contains("estrato"));
    assert!(sent[0].contains("lte"));
}

#[test]
fn test_box_plot_uses_raw_rows() {
    let mut store = EncodingStore::new();
    store.set_chart_type(ChartType::Box);
    store.add_variable(AxisSlot::X, categorical("facultad")).unwrap();
    store.add_variable(AxisSlot::Y, numeric("promedio_carrera")).unwrap();

    let executor = CannedExecutor::raw(json!([
        {"facultad": "Artes", "promedio_carrera": 3.1},
        {"facultad": "Artes", "promedio_carrera": 3.9},
        {"facultad": "Ciencias", "promedio_carrera": 4.2},
    ]));

    let mut runtime = ChartRuntime::default();
    let view = runtime.refresh(&executor, &store.snapshot()).unwrap().unwrap();

    // value_columns marks the unaggregated endpoint
    assert!(executor.seen.borrow()[0].contains("value_columns"));

    // One box per faculty, named by category, raw values on Y
    assert_eq!(view.series.len(), 2);
    assert_eq!(view.series[0].name.as_deref(), Some("Artes"));
    assert_eq!(view.series[0].y.numbers(), Some(&[3.1, 3.9][..]));
    assert_eq!(view.series[1].name.as_deref(), Some("Ciencias"));
    assert_eq!(view.layout.title, "Distribución de promedio_carrera por facultad");
}

#[test]
fn test_heatmap_matrix_from_store_state() {
    let mut store = EncodingStore::new();
    store.set_chart_type(ChartType::Heatmap);
    store.add_variable(AxisSlot::X, categorical("periodo_ingreso")).unwrap();
    store.add_variable(AxisSlot::Y, binary("desertor")).unwrap();
    store.set_metric(Metric::Percentage);
    store.add_variable(AxisSlot::Color, categorical("facultad")).unwrap();

    let executor = CannedExecutor::aggregated(json!([
        {"periodo_ingreso": "2016-2", "facultad": "Artes", "avg_desertor": 0.2},
        {"periodo_ingreso": "2016-1", "facultad": "Artes", "avg_desertor": 0.1},
        {"periodo_ingreso": "2016-1", "facultad": "Ciencias", "avg_desertor": 0.4},
    ]));

    let mut runtime = ChartRuntime::default();
    let view = runtime.refresh(&executor, &store.snapshot()).unwrap().unwrap();

    assert_eq!(view.series.len(), 1);
    let trace = &view.series[0];
    assert_eq!(trace.trace_type, "heatmap");
    // Periods ordered chronologically, absent cell zeroed, values scaled
    assert_eq!(trace.x, vec!["2016-1", "2016-2"]);
    assert_eq!(
        trace.z,
        Some(vec![vec![10.0, 20.0], vec![40.0, 0.0]])
    );
    assert_eq!(
        trace.colorbar.as_ref().unwrap().title,
        "Porcentaje (%)"
    );
}

#[test]
fn test_heatmap_without_color_is_rejected() {
    let mut store = EncodingStore::new();
    store.set_chart_type(ChartType::Heatmap);
    store.add_variable(AxisSlot::X, categorical("facultad")).unwrap();
    store.add_variable(AxisSlot::Y, numeric("promedio_carrera")).unwrap();

    let executor = CannedExecutor::aggregated(json!([]));
    let mut runtime = ChartRuntime::default();
    assert!(runtime.refresh(&executor, &store.snapshot()).is_err());
    assert!(executor.seen.borrow().is_empty());
}

#[test]
fn test_out_of_order_responses_keep_the_newest() {
    let mut store = EncodingStore::new();
    store.add_variable(AxisSlot::X, categorical("facultad")).unwrap();
    store.add_variable(AxisSlot::Y, numeric("promedio_carrera")).unwrap();
    let encoding = store.snapshot();

    let mut runtime = ChartRuntime::default();
    let slow = runtime.dispatch(&encoding).unwrap().unwrap();
    let fast = runtime.dispatch(&encoding).unwrap().unwrap();

    let stale_rows: Vec<Row> = serde_json::from_value(json!([
        {"facultad": "Artes", "avg_promedio_carrera": 1.0},
    ]))
    .unwrap();
    let fresh_rows: Vec<Row> = serde_json::from_value(json!([
        {"facultad": "Artes", "avg_promedio_carrera": 4.5},
    ]))
    .unwrap();
    let stale = QueryResult {
        kind: ResultKind::Aggregated,
        total: stale_rows.len(),
        rows: stale_rows,
        dimensions: None,
        metrics: None,
    };
    let fresh = QueryResult {
        kind: ResultKind::Aggregated,
        total: fresh_rows.len(),
        rows: fresh_rows,
        dimensions: None,
        metrics: None,
    };

    // Fresh response lands first, slow one arrives afterwards
    let applied = runtime.apply_response(&encoding, fast.seq, &fresh).unwrap().unwrap();
    assert_eq!(applied.series[0].y.numbers(), Some(&[4.5][..]));
    assert!(runtime.apply_response(&encoding, slow.seq, &stale).unwrap().is_none());
}

#[test]
fn test_store_validation_guards_the_pipeline() {
    let mut store = EncodingStore::new();
    // Categorical on Y and continuous numeric on color both bounce
    assert!(store.add_variable(AxisSlot::Y, categorical("facultad")).is_err());
    assert!(store.add_variable(AxisSlot::Color, numeric("promedio_carrera")).is_err());
    assert!(store.snapshot().y_axis.is_empty());
    assert!(store.snapshot().color.is_empty());
}
