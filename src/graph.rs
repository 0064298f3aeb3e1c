//! # Dependence Graph
//!
//! $$
//! G_\tau=(V,E),\quad E=\{\{i,j\}: i\ne j,\ D_{ij}>\tau\},\quad w_{ij}=D_{ij}
//! $$
//!
//! Thresholded, undirected, weighted graph over the full asset set. Assets
//! with no surviving edge stay in the graph as isolated nodes.

use std::collections::BTreeMap;

use crate::config::validate_threshold;
use crate::dependence::DependenceMatrix;
use crate::error::ComovementError;
use crate::error::Result;

/// Undirected edge with `source < target`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
  pub source: usize,
  pub target: usize,
  /// Dependence value of the pair.
  pub weight: f64,
}

impl Edge {
  /// `1 - weight`; close nodes are strongly dependent. Useful as a layout length.
  pub fn distance(&self) -> f64 {
    1.0 - self.weight
  }
}

/// Counts used to compare graphs across windows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphSummary {
  pub nodes: usize,
  pub edges: usize,
  pub isolates: usize,
  pub density: f64,
  /// Mean edge weight, `0` for an edgeless graph.
  pub mean_weight: f64,
}

/// Immutable dependence graph of one window.
#[derive(Clone, Debug, PartialEq)]
pub struct DependenceGraph {
  assets: Vec<String>,
  edges: BTreeMap<(usize, usize), f64>,
}

fn ordered(i: usize, j: usize) -> (usize, usize) {
  if i <= j {
    (i, j)
  } else {
    (j, i)
  }
}

impl DependenceGraph {
  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn node_count(&self) -> usize {
    self.assets.len()
  }

  pub fn edge_count(&self) -> usize {
    self.edges.len()
  }

  /// Edges in `(source, target)` order.
  pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
    self.edges.iter().map(|(&(source, target), &weight)| Edge {
      source,
      target,
      weight,
    })
  }

  pub(crate) fn edge_map(&self) -> &BTreeMap<(usize, usize), f64> {
    &self.edges
  }

  /// Weight of the edge between `i` and `j`, in either order.
  pub fn weight(&self, i: usize, j: usize) -> Option<f64> {
    self.edges.get(&ordered(i, j)).copied()
  }

  pub fn has_edge(&self, i: usize, j: usize) -> bool {
    self.weight(i, j).is_some()
  }

  pub fn weight_by_name(&self, a: &str, b: &str) -> Result<Option<f64>> {
    Ok(self.weight(self.index_of(a)?, self.index_of(b)?))
  }

  pub fn index_of(&self, asset: &str) -> Result<usize> {
    self
      .assets
      .iter()
      .position(|x| x == asset)
      .ok_or_else(|| ComovementError::UnknownAsset(asset.to_string()))
  }

  pub fn neighbors(&self, node: usize) -> Vec<usize> {
    self
      .edges
      .keys()
      .filter_map(|&(s, t)| {
        if s == node {
          Some(t)
        } else if t == node {
          Some(s)
        } else {
          None
        }
      })
      .collect()
  }

  pub fn degree(&self, node: usize) -> usize {
    self
      .edges
      .keys()
      .filter(|&&(s, t)| s == node || t == node)
      .count()
  }

  /// Nodes without any edge, in asset order.
  pub fn isolates(&self) -> Vec<usize> {
    let mut connected = vec![false; self.node_count()];
    for &(s, t) in self.edges.keys() {
      connected[s] = true;
      connected[t] = true;
    }
    (0..self.node_count()).filter(|&i| !connected[i]).collect()
  }

  /// Share of possible undirected edges that are present.
  pub fn density(&self) -> f64 {
    let n = self.node_count();
    if n < 2 {
      return 0.0;
    }
    self.edge_count() as f64 / (n * (n - 1) / 2) as f64
  }

  pub fn summary(&self) -> GraphSummary {
    let edges = self.edge_count();
    let mean_weight = if edges == 0 {
      0.0
    } else {
      self.edges.values().sum::<f64>() / edges as f64
    };

    GraphSummary {
      nodes: self.node_count(),
      edges,
      isolates: self.isolates().len(),
      density: self.density(),
      mean_weight,
    }
  }
}

/// Turns dependence matrices into thresholded graphs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphBuilder {
  threshold: f64,
}

impl Default for GraphBuilder {
  fn default() -> Self {
    Self { threshold: 0.325 }
  }
}

impl GraphBuilder {
  /// Keep an edge iff its dependence is strictly greater than `threshold`.
  pub fn new(threshold: f64) -> Result<Self> {
    validate_threshold(threshold)?;
    Ok(Self { threshold })
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  pub fn build(&self, matrix: &DependenceMatrix) -> DependenceGraph {
    // pairs() never yields the diagonal, so no self-loops
    let edges = matrix
      .pairs()
      .filter(|&(_, _, v)| v > self.threshold)
      .map(|(i, j, v)| ((i, j), v))
      .collect();

    DependenceGraph {
      assets: matrix.assets().to_vec(),
      edges,
    }
  }
}
