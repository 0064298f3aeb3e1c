use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use comovement::ComovementEngine;
use comovement::PipelineConfig;
use comovement::PipelineOutput;
use comovement::ReturnSeries;
use comovement::WindowKey;
use comovement::io::read_return_file;
use prettytable::Table;
use prettytable::row;

#[derive(Parser, Debug)]
#[clap(
  name = "comovement",
  about = "Windowed distance-correlation graphs and similar-regime search"
)]
struct Args {
  /// Comma-separated return table: `date,asset1,asset2,...`
  input: PathBuf,

  /// Column holding the benchmark; it is windowed but kept out of the graphs.
  #[clap(short, long)]
  benchmark: Option<String>,

  /// YAML pipeline configuration.
  #[clap(short, long)]
  config: Option<PathBuf>,

  #[clap(short, long)]
  window: Option<usize>,

  #[clap(short, long)]
  threshold: Option<f64>,

  #[clap(short = 'k', long)]
  top_k: Option<usize>,

  /// First date to include.
  #[clap(long)]
  from: Option<NaiveDate>,

  /// Last date to include.
  #[clap(long)]
  to: Option<NaiveDate>,

  /// Print the graph of the window containing this date.
  #[clap(long)]
  date: Option<NaiveDate>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => PipelineConfig::load(path)
      .with_context(|| format!("failed to load config {}", path.display()))?,
    None => PipelineConfig::default(),
  };
  if let Some(window) = args.window {
    config.window_len = window;
  }
  if let Some(threshold) = args.threshold {
    config.threshold = threshold;
  }
  if let Some(top_k) = args.top_k {
    config.top_k = top_k;
  }

  let table = read_return_file(&args.input)
    .with_context(|| format!("failed to read {}", args.input.display()))?;
  let table = match (args.from, args.to) {
    (None, None) => table,
    (from, to) => table.between(
      from.unwrap_or(NaiveDate::MIN),
      to.unwrap_or(NaiveDate::MAX),
    ),
  };

  let (assets, benchmark): (ReturnSeries, Option<ReturnSeries>) = match &args.benchmark {
    Some(name) => {
      let (assets, bm) = table
        .split_column(name)
        .with_context(|| format!("cannot use {name} as benchmark"))?;
      (assets, Some(bm))
    }
    None => (table, None),
  };

  let engine = ComovementEngine::new(config)?;
  let out = engine.run(&assets, benchmark.as_ref())?;

  print_overview(&out);

  if let Some(date) = args.date {
    let window = out.window_for(date)?;
    print_graph(&out, window.key())?;
  }

  for failure in out.failures() {
    eprintln!("window {} ({}): {}", failure.window, failure.key, failure.error);
  }

  Ok(())
}

fn print_overview(out: &PipelineOutput) {
  let bm = out.benchmark_cumulative_returns();

  let mut table = Table::new();
  table.add_row(row![
    "window", "benchmark", "edges", "isolates", "density", "similar windows"
  ]);

  for (i, key) in out.window_keys().into_iter().enumerate() {
    let bm_return = bm
      .as_ref()
      .map(|b| format!("{:.4}", b[i].1))
      .unwrap_or_default();

    match (out.graph(key), out.similar(key)) {
      (Ok(graph), Ok(similar)) => {
        let summary = graph.summary();
        let similar = similar
          .iter()
          .map(|s| format!("{} ({:.3})", s.key, s.score))
          .collect::<Vec<_>>()
          .join(", ");
        table.add_row(row![
          key,
          bm_return,
          summary.edges,
          summary.isolates,
          format!("{:.3}", summary.density),
          similar
        ]);
      }
      _ => {
        table.add_row(row![key, bm_return, "-", "-", "-", "failed"]);
      }
    }
  }

  table.printstd();
}

fn print_graph(out: &PipelineOutput, key: WindowKey) -> Result<()> {
  let graph = out.graph(key)?;
  let assets = graph.assets();

  println!("\nDependence graph of window {key}");
  let mut table = Table::new();
  table.add_row(row!["source", "target", "dependence"]);
  for e in graph.edges() {
    table.add_row(row![
      assets[e.source],
      assets[e.target],
      format!("{:.4}", e.weight)
    ]);
  }
  table.printstd();

  let isolates = graph
    .isolates()
    .into_iter()
    .map(|i| assets[i].as_str())
    .collect::<Vec<_>>();
  if !isolates.is_empty() {
    println!("isolated: {}", isolates.join(", "));
  }

  Ok(())
}
