//! # Errors
//!
//! $$
//! \text{input}\to\text{Result}\langle T,\ \text{ComovementError}\rangle
//! $$
//!
use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the windowing, estimation, graph and similarity stages.
#[derive(Error, Debug)]
pub enum ComovementError {
  /// A pipeline parameter is out of range. Fatal, nothing is computed.
  #[error("invalid configuration: {0}")]
  InvalidConfiguration(String),

  /// A column is constant over a window, or its distances overflow, so its
  /// distance variance is zero or not finite.
  #[error(
    "degenerate input in window {window} (starting {start}): asset {asset} has zero or non-finite distance variance"
  )]
  DegenerateInput {
    window: usize,
    start: NaiveDate,
    asset: String,
  },

  /// The coefficient of a pair could not be evaluated to a finite number.
  #[error("undefined dependence in window {window} (starting {start}) between {left} and {right}")]
  UndefinedDependence {
    window: usize,
    start: NaiveDate,
    left: String,
    right: String,
  },

  /// A dependence value handed to a matrix lies outside `[0, 1]`.
  #[error("invalid dependence value: {0}")]
  InvalidDependence(String),

  /// No window with this start date is present in the index.
  #[error("unknown window: {0}")]
  UnknownWindow(NaiveDate),

  #[error("invalid return series: {0}")]
  InvalidSeries(String),

  /// Graphs handed to one index were built over different asset lists.
  #[error("graphs do not share the same asset set (window {0})")]
  AssetMismatch(NaiveDate),

  #[error("unknown asset: {0}")]
  UnknownAsset(String),

  #[error("parse error on line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("YAML error: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

impl ComovementError {
  /// Whether the error is confined to a single window and other windows may proceed.
  pub fn is_window_local(&self) -> bool {
    matches!(
      self,
      ComovementError::DegenerateInput { .. } | ComovementError::UndefinedDependence { .. }
    )
  }
}

pub type Result<T> = std::result::Result<T, ComovementError>;
