//! # Graph Similarity
//!
//! $$
//! J_w(G_1,G_2)=\frac{\sum_{e\in E_1\cup E_2}\min\big(w_1(e),w_2(e)\big)}
//! {\sum_{e\in E_1\cup E_2}\max\big(w_1(e),w_2(e)\big)}
//! $$
//!
//! Pairwise similarity of per-window dependence graphs and the ranked index
//! of historically similar windows.

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::btree_map;
use std::iter::Peekable;

use impl_new_derive::ImplNew;
use ndarray::Array2;
use ndarray::ArrayView2;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use crate::config::validate_top_k;
use crate::error::ComovementError;
use crate::error::Result;
use crate::graph::DependenceGraph;
use crate::window::WindowKey;

/// Graph similarity used to rank windows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
  /// Bounded in `[0, 1]`; `1` for edge-identical graphs, `0` for disjoint edge sets.
  #[default]
  WeightedJaccard,
  /// Dot product of the two weight vectors over the union of edges.
  ///
  /// Unbounded and biased towards dense graphs, so rankings differ materially
  /// from [`SimilarityMetric::WeightedJaccard`]. Only used when asked for.
  EdgeWeightDot,
}

impl SimilarityMetric {
  pub fn score(self, g1: &DependenceGraph, g2: &DependenceGraph) -> f64 {
    match self {
      SimilarityMetric::WeightedJaccard => weighted_jaccard(g1, g2),
      SimilarityMetric::EdgeWeightDot => edge_weight_dot(g1, g2),
    }
  }
}

/// Weights of both graphs over the union of their edges, absent edges as `0`.
struct UnionWeights<'a> {
  left: Peekable<btree_map::Iter<'a, (usize, usize), f64>>,
  right: Peekable<btree_map::Iter<'a, (usize, usize), f64>>,
}

impl<'a> UnionWeights<'a> {
  fn new(g1: &'a DependenceGraph, g2: &'a DependenceGraph) -> Self {
    Self {
      left: g1.edge_map().iter().peekable(),
      right: g2.edge_map().iter().peekable(),
    }
  }
}

impl Iterator for UnionWeights<'_> {
  type Item = (f64, f64);

  fn next(&mut self) -> Option<Self::Item> {
    let order = match (self.left.peek(), self.right.peek()) {
      (Some((l, _)), Some((r, _))) => l.cmp(r),
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => return None,
    };

    match order {
      Ordering::Less => self.left.next().map(|(_, &w)| (w, 0.0)),
      Ordering::Greater => self.right.next().map(|(_, &w)| (0.0, w)),
      Ordering::Equal => {
        let (_, &w1) = self.left.next()?;
        let (_, &w2) = self.right.next()?;
        Some((w1, w2))
      }
    }
  }
}

/// Weighted Jaccard similarity of two graphs over the same node set.
///
/// Two edgeless graphs are edge-identical and score `1`.
pub fn weighted_jaccard(g1: &DependenceGraph, g2: &DependenceGraph) -> f64 {
  let (mins, maxs) = UnionWeights::new(g1, g2).fold((0.0, 0.0), |(lo, hi), (w1, w2)| {
    (lo + w1.min(w2), hi + w1.max(w2))
  });

  if maxs <= 0.0 {
    1.0
  } else {
    mins / maxs
  }
}

/// $\sum_{e\in E_1\cup E_2} w_1(e)\,w_2(e)$
pub fn edge_weight_dot(g1: &DependenceGraph, g2: &DependenceGraph) -> f64 {
  UnionWeights::new(g1, g2).map(|(w1, w2)| w1 * w2).sum()
}

/// One entry of a window's ranked neighbour list.
#[derive(Clone, Copy, Debug, PartialEq, ImplNew)]
pub struct SimilarWindow {
  pub key: WindowKey,
  /// Chronological position of the window within the index.
  pub position: usize,
  pub score: f64,
}

/// All-pairs similarity of a graph collection with per-window top-k lists.
///
/// Built once from the complete collection; never updated incrementally.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityIndex {
  keys: Vec<WindowKey>,
  scores: Array2<f64>,
  ranked: Vec<Vec<SimilarWindow>>,
  top_k: usize,
  metric: SimilarityMetric,
}

impl SimilarityIndex {
  /// Build the index from `(key, graph)` entries in chronological order.
  ///
  /// Keys must be strictly increasing and every graph must share the first
  /// graph's asset list.
  pub fn build(
    entries: &[(WindowKey, &DependenceGraph)],
    top_k: usize,
    metric: SimilarityMetric,
    parallel: bool,
  ) -> Result<Self> {
    validate_top_k(top_k)?;

    if let Some(w) = entries.windows(2).find(|w| w[0].0 >= w[1].0) {
      return Err(ComovementError::InvalidSeries(format!(
        "window keys must be strictly increasing ({} followed by {})",
        w[0].0, w[1].0
      )));
    }
    if let Some((first, rest)) = entries.split_first() {
      if let Some((key, _)) = rest
        .iter()
        .find(|(_, g)| g.assets() != first.1.assets())
      {
        return Err(ComovementError::AssetMismatch(*key));
      }
    }

    let n = entries.len();
    let pairs: Vec<(usize, usize)> = (0..n)
      .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
      .collect();
    let score = |&(i, j): &(usize, usize)| metric.score(entries[i].1, entries[j].1);
    let values: Vec<f64> = if parallel {
      pairs.par_iter().map(score).collect()
    } else {
      pairs.iter().map(score).collect()
    };

    let mut scores = Array2::zeros((n, n));
    for (i, (_, g)) in entries.iter().enumerate() {
      scores[[i, i]] = metric.score(g, g);
    }
    for (&(i, j), v) in pairs.iter().zip(values) {
      scores[[i, j]] = v;
      scores[[j, i]] = v;
    }

    let keys: Vec<WindowKey> = entries.iter().map(|(k, _)| *k).collect();
    let ranked = (0..n).map(|i| rank_row(&keys, &scores, i, top_k)).collect();

    tracing::info!(windows = n, top_k, ?metric, "built similarity index");

    Ok(Self {
      keys,
      scores,
      ranked,
      top_k,
      metric,
    })
  }

  pub fn keys(&self) -> &[WindowKey] {
    &self.keys
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  pub fn top_k(&self) -> usize {
    self.top_k
  }

  pub fn metric(&self) -> SimilarityMetric {
    self.metric
  }

  /// Full `W x W` score matrix in chronological order.
  pub fn scores(&self) -> ArrayView2<'_, f64> {
    self.scores.view()
  }

  pub fn position(&self, key: WindowKey) -> Result<usize> {
    self
      .keys
      .binary_search(&key)
      .map_err(|_| ComovementError::UnknownWindow(key))
  }

  pub fn contains(&self, key: WindowKey) -> bool {
    self.keys.binary_search(&key).is_ok()
  }

  /// Up to `top_k` other windows, most similar first.
  pub fn similar(&self, key: WindowKey) -> Result<&[SimilarWindow]> {
    let i = self.position(key)?;
    Ok(&self.ranked[i])
  }

  pub fn score(&self, a: WindowKey, b: WindowKey) -> Result<f64> {
    Ok(self.scores[[self.position(a)?, self.position(b)?]])
  }
}

/// Other windows by descending score, earlier windows first on ties.
fn rank_row(keys: &[WindowKey], scores: &Array2<f64>, i: usize, top_k: usize) -> Vec<SimilarWindow> {
  let mut row: Vec<SimilarWindow> = (0..keys.len())
    .filter(|&j| j != i)
    .map(|j| SimilarWindow::new(keys[j], j, scores[[i, j]]))
    .collect();
  row.sort_by_key(|s| (Reverse(OrderedFloat(s.score)), s.position));
  row.truncate(top_k);
  row
}
