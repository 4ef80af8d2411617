use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Read as _, Write as _};

use cohortviz::encoding::{AxisSlot, ChartEncoding, ChartType, Filter, FilterOp, Metric};
use cohortviz::query::{compile, QueryResult, ResultKind, Row};
use cohortviz::runtime::ChartRuntime;
use cohortviz::schema::{ColumnKind, Variable};
use cohortviz::store::EncodingStore;

#[derive(Parser, Debug)]
#[command(name = "cohortviz")]
#[command(about = "Shape aggregated query results into renderable chart JSON", long_about = None)]
struct Args {
    /// Chart type: bar, line, scatter, pie, area, box, histogram, heatmap
    #[arg(long, default_value = "bar")]
    chart: String,

    /// Column bound to the X axis
    #[arg(long)]
    x: String,

    /// Numeric column bound to the Y axis
    #[arg(long)]
    y: String,

    /// Aggregation metric: AVG, COUNT, SUM, MIN, MAX, PERCENTAGE
    #[arg(long, default_value = "AVG")]
    metric: String,

    /// Categorical column bound to color (one series per value)
    #[arg(long)]
    color: Option<String>,

    /// Equality filter, `column=value`; repeatable
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Print the compiled query instead of reading rows and building a chart
    #[arg(long)]
    query_only: bool,
}

fn parse_chart_type(name: &str) -> Result<ChartType> {
    serde_json::from_value(serde_json::Value::String(name.to_lowercase()))
        .with_context(|| format!("unknown chart type '{name}'"))
}

fn parse_metric(name: &str) -> Result<Metric> {
    serde_json::from_value(serde_json::Value::String(name.to_uppercase()))
        .with_context(|| format!("unknown metric '{name}'"))
}

fn parse_filter(spec: &str) -> Result<Filter> {
    let Some((column, value)) = spec.split_once('=') else {
        bail!("filter '{spec}' is not of the form column=value");
    };
    // Numeric literals filter as numbers, everything else as strings
    let value = match value.parse::<f64>() {
        Ok(n) => serde_json::json!(n),
        Err(_) => serde_json::json!(value),
    };
    Ok(Filter::new(column, FilterOp::Eq, value))
}

fn categorical(name: &str) -> Variable {
    Variable {
        name: name.to_string(),
        kind: ColumnKind::Categorical,
        distinct_value_count: 0,
        eligible_for_color: true,
        supports_percentage: false,
        metric: None,
    }
}

fn numeric(name: &str, metric: Metric) -> Variable {
    Variable {
        name: name.to_string(),
        kind: ColumnKind::Numeric,
        distinct_value_count: 0,
        eligible_for_color: false,
        supports_percentage: metric == Metric::Percentage,
        metric: None,
    }
    .with_metric(metric)
}

fn build_encoding(args: &Args) -> Result<ChartEncoding> {
    let metric = parse_metric(&args.metric)?;

    let mut store = EncodingStore::new();
    store.set_chart_type(parse_chart_type(&args.chart)?);
    store.add_variable(AxisSlot::X, categorical(&args.x))?;
    store.add_variable(AxisSlot::Y, numeric(&args.y, metric))?;
    store.set_metric(metric);
    if let Some(color) = &args.color {
        store.add_variable(AxisSlot::Color, categorical(color))?;
    }
    for spec in &args.filters {
        store.add_filter(parse_filter(spec)?)?;
    }
    Ok((*store.snapshot()).clone())
}

fn read_rows_from_stdin() -> Result<Vec<Row>> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read rows from stdin")?;
    serde_json::from_str(&input).context("stdin is not a JSON array of result rows")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let encoding = build_encoding(&args)?;

    if args.query_only {
        let Some(query) = compile(&encoding)? else {
            bail!("encoding is incomplete, nothing to compile");
        };
        let json = match query {
            cohortviz::query::CompiledQuery::Aggregated(q) => serde_json::to_string_pretty(&q)?,
            cohortviz::query::CompiledQuery::Raw(q) => serde_json::to_string_pretty(&q)?,
        };
        println!("{json}");
        return Ok(());
    }

    let rows = read_rows_from_stdin()?;
    let kind = if encoding.chart_type == ChartType::Box {
        ResultKind::Raw
    } else {
        ResultKind::Aggregated
    };
    let result = QueryResult {
        kind,
        total: rows.len(),
        rows,
        dimensions: None,
        metrics: None,
    };

    let runtime = ChartRuntime::default();
    let view = runtime.build_view(&encoding, &result)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &view).context("Failed to write chart JSON")?;
    handle.write_all(b"\n")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
