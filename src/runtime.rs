// Chart update orchestration: compile the current encoding, run the query
// through the executor, and shape the response for the renderer.

use anyhow::{bail, Result};
use std::time::Instant;
use tracing::{debug, warn};

use crate::debounce::Debouncer;
use crate::encoding::{ChartEncoding, ChartType, Filter};
use crate::heatmap::{build_heatmap, ColorScale};
use crate::normalize::normalize;
use crate::query::{compile, CompiledQuery, DynamicQuery, QueryResult, RawQuery};
use crate::schema::{DistinctValues, SchemaSummary};
use crate::series::{build_box_series, build_series, ChartView};

/// Boundary to the backend. The executor owns aggregation semantics; the
/// metric-result naming convention in `Metric::result_key` is the contract
/// both sides rely on.
pub trait QueryExecutor {
    fn run_aggregated(&self, query: &DynamicQuery) -> Result<QueryResult>;
    fn run_raw(&self, query: &RawQuery) -> Result<QueryResult>;
    fn distinct_values(&self, column: &str, filters: &[Filter]) -> Result<DistinctValues>;
    fn fetch_schema(&self) -> Result<SchemaSummary>;
}

/// A dispatched query, tagged for staleness detection.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuery {
    pub seq: u64,
    pub query: CompiledQuery,
}

/// Drives the encode → query → shape pipeline for one chart.
///
/// Responses may arrive out of order. Every dispatch carries a
/// monotonically increasing sequence number and only the response to the
/// newest dispatch is applied, so a slow early response never overwrites
/// a fresher chart.
pub struct ChartRuntime {
    color_scale: ColorScale,
    debouncer: Debouncer,
    current_seq: u64,
}

impl Default for ChartRuntime {
    fn default() -> Self {
        ChartRuntime::new(ColorScale::default())
    }
}

impl ChartRuntime {
    pub fn new(color_scale: ColorScale) -> Self {
        ChartRuntime {
            color_scale,
            debouncer: Debouncer::default(),
            current_seq: 0,
        }
    }

    /// Record an encoding mutation; the re-query is due once the quiet
    /// period elapses, observed through `poll`.
    pub fn notify_mutation(&mut self, now: Instant) {
        self.debouncer.trigger(now);
    }

    /// True when the debounce window has elapsed and a re-query is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.debouncer.poll(now)
    }

    /// Compile the encoding into a tagged query. `Ok(None)` when the
    /// encoding is incomplete: no query must be issued.
    pub fn dispatch(&mut self, encoding: &ChartEncoding) -> Result<Option<PendingQuery>> {
        let Some(query) = compile(encoding)? else {
            debug!("encoding incomplete, no query dispatched");
            return Ok(None);
        };
        self.current_seq += 1;
        debug!(seq = self.current_seq, "query dispatched");
        Ok(Some(PendingQuery { seq: self.current_seq, query }))
    }

    /// Apply an executor response. Returns `None` when the response is
    /// stale, i.e. a newer query has been dispatched since.
    pub fn apply_response(
        &self,
        encoding: &ChartEncoding,
        seq: u64,
        result: &QueryResult,
    ) -> Result<Option<ChartView>> {
        if seq != self.current_seq {
            warn!(seq, current = self.current_seq, "discarding stale response");
            return Ok(None);
        }
        self.build_view(encoding, result).map(Some)
    }

    /// Shape a query result into the renderer triple for this encoding.
    pub fn build_view(&self, encoding: &ChartEncoding, result: &QueryResult) -> Result<ChartView> {
        let (Some(x_var), Some(y_var)) = (encoding.x_var(), encoding.y_var()) else {
            bail!("cannot build a chart from an incomplete encoding");
        };
        let title = encoding.title().unwrap_or_default();
        if result.rows.is_empty() {
            return Ok(ChartView::empty(&title));
        }

        let color_field = encoding.color_var().map(|v| v.name.as_str());
        let metric = y_var.effective_metric();

        match encoding.chart_type {
            ChartType::Box => Ok(build_box_series(
                &result.rows,
                &x_var.name,
                &y_var.name,
                color_field,
                &title,
            )),
            ChartType::Heatmap => build_heatmap(
                &result.rows,
                &x_var.name,
                color_field,
                &metric.result_key(&y_var.name),
                metric.label(),
                metric.is_percentage(),
                &title,
                &self.color_scale,
            ),
            _ => {
                let groups = normalize(
                    &result.rows,
                    &x_var.name,
                    color_field,
                    &metric.result_key(&y_var.name),
                    metric.is_percentage(),
                );
                Ok(build_series(
                    &groups,
                    encoding.chart_type,
                    &x_var.name,
                    &y_var.name,
                    metric,
                    color_field,
                    &title,
                ))
            }
        }
    }

    /// Full synchronous round-trip: compile, execute, shape.
    ///
    /// Encoding errors propagate so the caller can surface them. Executor
    /// failures are logged and produce an empty chart instead of stale
    /// data; recovery is a fresh mutation or a manual retry.
    pub fn refresh<E: QueryExecutor>(
        &mut self,
        executor: &E,
        encoding: &ChartEncoding,
    ) -> Result<Option<ChartView>> {
        let Some(pending) = self.dispatch(encoding)? else {
            return Ok(None);
        };

        let result = match &pending.query {
            CompiledQuery::Aggregated(query) => executor.run_aggregated(query),
            CompiledQuery::Raw(query) => executor.run_raw(query),
        };

        match result {
            Ok(result) => self.apply_response(encoding, pending.seq, &result),
            Err(error) => {
                warn!(%error, "query execution failed");
                let title = encoding.title().unwrap_or_default();
                Ok(Some(ChartView::empty(&title)))
            }
        }
    }
}
