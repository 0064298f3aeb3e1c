//! # Comovement Engine
//!
//! $$
//! R \xrightarrow{\ L\ } \{W_i\} \xrightarrow{\ \mathcal R_n\ } \{D_i\}
//! \xrightarrow{\ \tau\ } \{G_i\} \xrightarrow{\ J_w\ } \text{top-}k
//! $$
//!
//! High-level orchestration of windowing, estimation, graph building and
//! similarity indexing.

use chrono::NaiveDate;
use ndarray::Array1;
use rayon::prelude::*;

use crate::cache::CacheKey;
use crate::cache::GraphCache;
use crate::config::PipelineConfig;
use crate::dependence::DependenceEstimator;
use crate::dependence::DependenceMatrix;
use crate::error::ComovementError;
use crate::error::Result;
use crate::graph::DependenceGraph;
use crate::graph::GraphBuilder;
use crate::series::ReturnSeries;
use crate::similarity::SimilarWindow;
use crate::similarity::SimilarityIndex;
use crate::window::Window;
use crate::window::WindowKey;
use crate::window::check_alignment;
use crate::window::moving_window;
use crate::window::window_keys;

/// Estimated matrix and pruned graph of one window.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowAnalysis {
  pub matrix: DependenceMatrix,
  pub graph: DependenceGraph,
}

/// A window whose estimation failed; it is absent from the similarity index.
#[derive(Debug)]
pub struct WindowFailure {
  pub window: usize,
  pub key: WindowKey,
  pub error: ComovementError,
}

/// Everything a run produces, addressable by window start date.
#[derive(Debug)]
pub struct PipelineOutput {
  windows: Vec<Window>,
  benchmark: Option<Vec<Window>>,
  analyses: Vec<Option<WindowAnalysis>>,
  failures: Vec<WindowFailure>,
  index: SimilarityIndex,
}

impl PipelineOutput {
  pub fn windows(&self) -> &[Window] {
    &self.windows
  }

  /// Start dates of every window, including failed ones.
  pub fn window_keys(&self) -> Vec<WindowKey> {
    window_keys(&self.windows)
  }

  pub fn benchmark_windows(&self) -> Option<&[Window]> {
    self.benchmark.as_deref()
  }

  pub fn failures(&self) -> &[WindowFailure] {
    &self.failures
  }

  pub fn index(&self) -> &SimilarityIndex {
    &self.index
  }

  /// Position of the window starting on `key`, failed windows included.
  pub fn position(&self, key: WindowKey) -> Result<usize> {
    self
      .windows
      .binary_search_by_key(&key, Window::key)
      .map_err(|_| ComovementError::UnknownWindow(key))
  }

  /// Window containing `date`, the way a date picker maps onto a window.
  pub fn window_for(&self, date: NaiveDate) -> Result<&Window> {
    let i = self.windows.partition_point(|w| w.key() <= date);
    let window = i
      .checked_sub(1)
      .and_then(|i| self.windows.get(i))
      .filter(|w| w.dates().last().is_some_and(|last| *last >= date));
    window.ok_or(ComovementError::UnknownWindow(date))
  }

  pub fn window(&self, key: WindowKey) -> Result<&Window> {
    Ok(&self.windows[self.position(key)?])
  }

  fn analysis(&self, key: WindowKey) -> Result<&WindowAnalysis> {
    self.analyses[self.position(key)?]
      .as_ref()
      .ok_or(ComovementError::UnknownWindow(key))
  }

  pub fn matrix(&self, key: WindowKey) -> Result<&DependenceMatrix> {
    Ok(&self.analysis(key)?.matrix)
  }

  pub fn graph(&self, key: WindowKey) -> Result<&DependenceGraph> {
    Ok(&self.analysis(key)?.graph)
  }

  /// Ranked similar windows, failing for windows absent from the index.
  pub fn similar(&self, key: WindowKey) -> Result<&[SimilarWindow]> {
    self.index.similar(key)
  }

  /// Per-window, per-asset summed returns.
  pub fn cumulative_returns(&self) -> Vec<(WindowKey, Array1<f64>)> {
    self
      .windows
      .iter()
      .map(|w| (w.key(), w.cumulative_returns()))
      .collect()
  }

  /// Per-window summed benchmark returns.
  pub fn benchmark_cumulative_returns(&self) -> Option<Vec<(WindowKey, f64)>> {
    self.benchmark.as_ref().map(|windows| {
      windows
        .iter()
        .map(|w| (w.key(), w.cumulative_returns().sum()))
        .collect()
    })
  }
}

/// Single entry point running the full window-to-index pipeline.
#[derive(Clone, Debug)]
pub struct ComovementEngine {
  config: PipelineConfig,
  estimator: DependenceEstimator,
  builder: GraphBuilder,
}

impl ComovementEngine {
  /// Construct an engine, rejecting invalid configuration up front.
  pub fn new(config: PipelineConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      estimator: DependenceEstimator::new(config.parallel),
      builder: GraphBuilder::new(config.threshold)?,
      config,
    })
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Run the pipeline on `assets`, windowing `benchmark` alongside when given.
  pub fn run(
    &self,
    assets: &ReturnSeries,
    benchmark: Option<&ReturnSeries>,
  ) -> Result<PipelineOutput> {
    let (windows, benchmark) = self.slice(assets, benchmark)?;
    let outcomes = self.analyze(&windows, |_| None);
    self.assemble(windows, benchmark, outcomes)
  }

  /// Like [`ComovementEngine::run`], reusing and filling `cache`.
  pub fn run_cached(
    &self,
    assets: &ReturnSeries,
    benchmark: Option<&ReturnSeries>,
    cache: &mut GraphCache,
  ) -> Result<PipelineOutput> {
    let (windows, benchmark) = self.slice(assets, benchmark)?;
    let (window_len, threshold) = (self.config.window_len, self.config.threshold);
    cache.retain_config(window_len, threshold);

    let keys: Vec<CacheKey> = windows
      .iter()
      .map(|w| CacheKey::new(w, window_len, threshold))
      .collect();
    let hits = keys.iter().filter(|k| cache.get(k).is_some()).count() as u64;

    let outcomes = {
      let cache = &*cache;
      self.analyze(&windows, |i| cache.get(&keys[i]).cloned())
    };
    for (key, outcome) in keys.into_iter().zip(&outcomes) {
      if let Ok(analysis) = outcome {
        cache.insert(key, analysis.clone());
      }
    }
    cache.record(hits, windows.len() as u64 - hits);

    self.assemble(windows, benchmark, outcomes)
  }

  fn slice(
    &self,
    assets: &ReturnSeries,
    benchmark: Option<&ReturnSeries>,
  ) -> Result<(Vec<Window>, Option<Vec<Window>>)> {
    let windows = moving_window(assets, self.config.window_len)?;

    let benchmark = match benchmark {
      Some(bm) => {
        if bm.dates() != assets.dates() {
          return Err(ComovementError::InvalidSeries(
            "benchmark and assets must share the same date index".to_string(),
          ));
        }
        let bm_windows = moving_window(bm, self.config.window_len)?;
        check_alignment(&windows, &bm_windows)?;
        Some(bm_windows)
      }
      None => None,
    };

    Ok((windows, benchmark))
  }

  fn analyze<F>(&self, windows: &[Window], cached: F) -> Vec<Result<WindowAnalysis>>
  where
    F: Fn(usize) -> Option<WindowAnalysis> + Sync,
  {
    let one = |(i, w): (usize, &Window)| match cached(i) {
      Some(hit) => Ok(hit),
      None => self.estimator.estimate(w).map(|matrix| WindowAnalysis {
        graph: self.builder.build(&matrix),
        matrix,
      }),
    };

    if self.config.parallel {
      windows.par_iter().enumerate().map(one).collect()
    } else {
      windows.iter().enumerate().map(one).collect()
    }
  }

  fn assemble(
    &self,
    windows: Vec<Window>,
    benchmark: Option<Vec<Window>>,
    outcomes: Vec<Result<WindowAnalysis>>,
  ) -> Result<PipelineOutput> {
    let mut analyses = Vec::with_capacity(windows.len());
    let mut failures = Vec::new();

    for (w, outcome) in windows.iter().zip(outcomes) {
      match outcome {
        Ok(analysis) => analyses.push(Some(analysis)),
        Err(error) if error.is_window_local() => {
          tracing::warn!(window = w.index(), start = %w.key(), %error, "window excluded from index");
          failures.push(WindowFailure {
            window: w.index(),
            key: w.key(),
            error,
          });
          analyses.push(None);
        }
        Err(error) => return Err(error),
      }
    }

    let entries: Vec<(WindowKey, &DependenceGraph)> = windows
      .iter()
      .zip(&analyses)
      .filter_map(|(w, a)| a.as_ref().map(|a| (w.key(), &a.graph)))
      .collect();
    let index = SimilarityIndex::build(
      &entries,
      self.config.top_k,
      self.config.metric,
      self.config.parallel,
    )?;

    tracing::info!(
      windows = windows.len(),
      indexed = index.len(),
      failed = failures.len(),
      window_len = self.config.window_len,
      threshold = self.config.threshold,
      "pipeline finished"
    );

    Ok(PipelineOutput {
      windows,
      benchmark,
      analyses,
      failures,
      index,
    })
  }
}
