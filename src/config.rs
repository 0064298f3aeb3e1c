//! # Pipeline Configuration
//!
//! $$
//! (L,\ \tau,\ k)\in\mathbb N_{>0}\times[0,1)\times\mathbb N_{>0}
//! $$
//!
//! Runtime parameters for windowing, edge pruning and similarity retrieval.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ComovementError;
use crate::error::Result;
use crate::similarity::SimilarityMetric;

/// Runtime configuration for [`crate::engine::ComovementEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Rows per non-overlapping window.
  pub window_len: usize,
  /// An edge is kept iff its dependence is strictly greater than this value.
  pub threshold: f64,
  /// Number of similar windows retained per window.
  pub top_k: usize,
  /// Graph similarity used by the index.
  pub metric: SimilarityMetric,
  /// Estimate windows on the rayon pool.
  pub parallel: bool,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      window_len: 21,
      threshold: 0.325,
      top_k: 3,
      metric: SimilarityMetric::WeightedJaccard,
      parallel: true,
    }
  }
}

impl PipelineConfig {
  /// Parse a YAML document. Absent fields take their default value.
  pub fn from_yaml(yaml: &str) -> Result<Self> {
    let config: PipelineConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
  }

  /// Read and parse a YAML file.
  pub fn load(path: &Path) -> Result<Self> {
    let contents = fs::read_to_string(path)?;
    Self::from_yaml(&contents)
  }

  pub fn validate(&self) -> Result<()> {
    validate_window_len(self.window_len)?;
    validate_threshold(self.threshold)?;
    validate_top_k(self.top_k)
  }
}

pub(crate) fn validate_window_len(window_len: usize) -> Result<()> {
  if window_len == 0 {
    return Err(ComovementError::InvalidConfiguration(
      "window length must be positive".to_string(),
    ));
  }
  Ok(())
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<()> {
  if !threshold.is_finite() || !(0.0..1.0).contains(&threshold) {
    return Err(ComovementError::InvalidConfiguration(format!(
      "threshold must lie in [0, 1), got {threshold}"
    )));
  }
  Ok(())
}

pub(crate) fn validate_top_k(top_k: usize) -> Result<()> {
  if top_k == 0 {
    return Err(ComovementError::InvalidConfiguration(
      "top-k must be positive".to_string(),
    ));
  }
  Ok(())
}
