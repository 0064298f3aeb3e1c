//! # Return Series
//!
//! $$
//! R\in\mathbb R^{N\times A},\quad R_{ta}=\text{return of asset }a\text{ on date }t
//! $$
//!
//! Date-indexed, column-named return tables shared by the asset universe and
//! the benchmark.

use std::collections::HashSet;
use std::ops::Range;

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::s;

use crate::error::ComovementError;
use crate::error::Result;

/// An aligned multivariate return table.
///
/// Rows are trading dates in strictly increasing order, columns are uniquely
/// named assets. Missing observations must already be filled by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnSeries {
  dates: Vec<NaiveDate>,
  assets: Vec<String>,
  values: Array2<f64>,
}

impl ReturnSeries {
  /// Build a validated series from a `dates.len() x assets.len()` block.
  pub fn new(dates: Vec<NaiveDate>, assets: Vec<String>, values: Array2<f64>) -> Result<Self> {
    if assets.is_empty() {
      return Err(ComovementError::InvalidSeries(
        "series must contain at least one asset".to_string(),
      ));
    }
    if values.dim() != (dates.len(), assets.len()) {
      return Err(ComovementError::InvalidSeries(format!(
        "values have shape {:?}, expected ({}, {})",
        values.dim(),
        dates.len(),
        assets.len()
      )));
    }

    let mut seen = HashSet::with_capacity(assets.len());
    if let Some(dup) = assets.iter().find(|a| !seen.insert(a.as_str())) {
      return Err(ComovementError::InvalidSeries(format!(
        "duplicate asset {dup}"
      )));
    }

    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
      return Err(ComovementError::InvalidSeries(format!(
        "dates must be strictly increasing ({} followed by {})",
        w[0], w[1]
      )));
    }

    if let Some(((row, col), v)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
      return Err(ComovementError::InvalidSeries(format!(
        "non-finite value {v} for {} on {}",
        assets[col], dates[row]
      )));
    }

    Ok(Self {
      dates,
      assets,
      values,
    })
  }

  /// One-column series, used for a benchmark index.
  pub fn single(name: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
    let n = values.len();
    let values = Array1::from(values)
      .into_shape_with_order((n, 1))
      .map_err(|e| ComovementError::InvalidSeries(e.to_string()))?;
    Self::new(dates, vec![name.into()], values)
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.values.view()
  }

  /// Number of rows (dates).
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  pub fn column_index(&self, asset: &str) -> Result<usize> {
    self
      .assets
      .iter()
      .position(|a| a == asset)
      .ok_or_else(|| ComovementError::UnknownAsset(asset.to_string()))
  }

  pub fn column(&self, asset: &str) -> Result<ArrayView1<'_, f64>> {
    let idx = self.column_index(asset)?;
    Ok(self.values.column(idx))
  }

  /// Rows whose date lies in `[start, end]`.
  pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
    let lo = self.dates.partition_point(|d| *d < start);
    let hi = self.dates.partition_point(|d| *d <= end).max(lo);
    self.rows(lo..hi)
  }

  /// Split one column off, returning `(remaining assets, that column)`.
  ///
  /// This is how a benchmark stored alongside the asset universe is separated
  /// from it before windowing.
  pub fn split_column(&self, asset: &str) -> Result<(Self, Self)> {
    let idx = self.column_index(asset)?;
    if self.assets.len() == 1 {
      return Err(ComovementError::InvalidSeries(format!(
        "splitting {asset} would leave no assets"
      )));
    }

    let keep: Vec<usize> = (0..self.assets.len()).filter(|&c| c != idx).collect();
    let rest = Self {
      dates: self.dates.clone(),
      assets: keep.iter().map(|&c| self.assets[c].clone()).collect(),
      values: self.values.select(Axis(1), &keep),
    };
    let column = Self {
      dates: self.dates.clone(),
      assets: vec![self.assets[idx].clone()],
      values: self.values.select(Axis(1), &[idx]),
    };

    Ok((rest, column))
  }

  /// Contiguous row slice. Validation is unnecessary since a sub-range of a
  /// valid series is valid.
  pub(crate) fn rows(&self, range: Range<usize>) -> Self {
    Self {
      dates: self.dates[range.clone()].to_vec(),
      assets: self.assets.clone(),
      values: self.values.slice(s![range, ..]).to_owned(),
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use ndarray::array;

  use super::*;

  pub(crate) fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2007, 1, 1).unwrap() + chrono::Duration::days(offset)
  }

  pub(crate) fn days(n: usize) -> Vec<NaiveDate> {
    (0..n as i64).map(day).collect()
  }

  fn names(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn rejects_shape_mismatch() {
    let err = ReturnSeries::new(days(2), names(&["A", "B"]), Array2::zeros((3, 2))).unwrap_err();
    assert!(matches!(err, ComovementError::InvalidSeries(_)));
  }

  #[test]
  fn rejects_duplicate_dates() {
    let dates = vec![day(0), day(1), day(1)];
    let err = ReturnSeries::new(dates, names(&["A"]), Array2::zeros((3, 1))).unwrap_err();
    assert!(err.to_string().contains("strictly increasing"));
  }

  #[test]
  fn rejects_duplicate_assets_and_empty_universe() {
    assert!(ReturnSeries::new(days(1), names(&["A", "A"]), Array2::zeros((1, 2))).is_err());
    assert!(ReturnSeries::new(days(1), Vec::new(), Array2::zeros((1, 0))).is_err());
  }

  #[test]
  fn rejects_non_finite_values() {
    let err = ReturnSeries::new(days(2), names(&["A"]), array![[0.1], [f64::NAN]]).unwrap_err();
    assert!(err.to_string().contains("non-finite"));
  }

  #[test]
  fn between_is_inclusive() {
    let s = ReturnSeries::single("SPX", days(5), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let sub = s.between(day(1), day(3));
    assert_eq!(sub.dates(), &[day(1), day(2), day(3)]);
    assert_eq!(sub.column("SPX").unwrap().to_vec(), vec![2.0, 3.0, 4.0]);
  }

  #[test]
  fn between_with_inverted_bounds_is_empty() {
    let s = ReturnSeries::single("SPX", days(5), vec![0.0; 5]).unwrap();
    assert!(s.between(day(3), day(1)).is_empty());
  }

  #[test]
  fn split_column_separates_benchmark() {
    let values = array![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]];
    let s = ReturnSeries::new(days(2), names(&["XLE", "SPX", "XLF"]), values).unwrap();

    let (assets, bm) = s.split_column("SPX").unwrap();
    assert_eq!(assets.assets(), &names(&["XLE", "XLF"])[..]);
    assert_eq!(assets.values(), array![[0.1, 0.3], [0.4, 0.6]]);
    assert_eq!(bm.assets(), &names(&["SPX"])[..]);
    assert_eq!(bm.column("SPX").unwrap().to_vec(), vec![0.2, 0.5]);
    assert_eq!(bm.dates(), assets.dates());
  }

  #[test]
  fn split_unknown_or_last_column_fails() {
    let s = ReturnSeries::single("SPX", days(2), vec![0.0, 0.0]).unwrap();
    assert!(matches!(
      s.split_column("XLE").unwrap_err(),
      ComovementError::UnknownAsset(_)
    ));
    assert!(matches!(
      s.split_column("SPX").unwrap_err(),
      ComovementError::InvalidSeries(_)
    ));
  }
}
