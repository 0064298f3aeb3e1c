//! # Moving Window
//!
//! $$
//! W_i = R_{[iL,\,(i+1)L)},\qquad i=0,\dots,\lfloor N/L\rfloor-1
//! $$
//!
//! Fixed-length, non-overlapping slices of a [`ReturnSeries`]. A trailing
//! remainder shorter than `L` rows is dropped.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Axis;

use crate::config::validate_window_len;
use crate::error::ComovementError;
use crate::error::Result;
use crate::series::ReturnSeries;

/// A window is identified by the date of its first row.
pub type WindowKey = NaiveDate;

/// Immutable snapshot of `L` consecutive rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Window {
  index: usize,
  rows: ReturnSeries,
}

impl Window {
  /// Position of the window in chronological order.
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn key(&self) -> WindowKey {
    // windows are never empty
    self.rows.dates()[0]
  }

  pub fn dates(&self) -> &[NaiveDate] {
    self.rows.dates()
  }

  pub fn assets(&self) -> &[String] {
    self.rows.assets()
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.rows.values()
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Per-asset sum of returns over the window.
  pub fn cumulative_returns(&self) -> Array1<f64> {
    self.rows.values().sum_axis(Axis(0))
  }

  pub fn as_series(&self) -> &ReturnSeries {
    &self.rows
  }
}

/// Slice `series` into `floor(N / window_len)` consecutive windows.
///
/// The same call is used for the asset universe and for a benchmark series
/// on the same date index; the i-th windows of both then share a start date.
pub fn moving_window(series: &ReturnSeries, window_len: usize) -> Result<Vec<Window>> {
  validate_window_len(window_len)?;

  let count = series.len() / window_len;
  let windows = (0..count)
    .map(|index| Window {
      index,
      rows: series.rows(index * window_len..(index + 1) * window_len),
    })
    .collect::<Vec<_>>();

  tracing::debug!(
    rows = series.len(),
    window_len,
    windows = count,
    dropped = series.len() - count * window_len,
    "sliced return series"
  );

  Ok(windows)
}

/// Start dates of `windows`, in order.
pub fn window_keys(windows: &[Window]) -> Vec<WindowKey> {
  windows.iter().map(Window::key).collect()
}

/// Verify that two window sequences are positionally aligned by start date.
pub fn check_alignment(left: &[Window], right: &[Window]) -> Result<()> {
  if left.len() != right.len() {
    return Err(ComovementError::InvalidSeries(format!(
      "window counts differ ({} vs {})",
      left.len(),
      right.len()
    )));
  }

  match left.iter().zip(right).find(|(l, r)| l.key() != r.key()) {
    Some((l, r)) => Err(ComovementError::InvalidSeries(format!(
      "window {} starts on {} but its counterpart starts on {}",
      l.index(),
      l.key(),
      r.key()
    ))),
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use ndarray::Array2;
  use ndarray::concatenate;

  use super::*;
  use crate::series::tests::day;
  use crate::series::tests::days;

  fn ramp(n: usize, a: usize) -> ReturnSeries {
    let values = Array2::from_shape_fn((n, a), |(t, c)| (t * a + c) as f64);
    let assets = (0..a).map(|c| format!("A{c}")).collect();
    ReturnSeries::new(days(n), assets, values).unwrap()
  }

  #[test]
  fn drops_trailing_remainder() {
    let series = ramp(47, 3);
    let windows = moving_window(&series, 21).unwrap();

    assert_eq!(windows.len(), 2);
    assert!(windows.iter().all(|w| w.len() == 21));
    assert_eq!(window_keys(&windows), vec![day(0), day(21)]);
  }

  #[test]
  fn concatenation_reproduces_prefix() {
    let series = ramp(50, 2);
    for len in 1..=50 {
      let windows = moving_window(&series, len).unwrap();
      assert_eq!(windows.len(), 50 / len);

      let covered = windows.len() * len;
      if covered == 0 {
        continue;
      }
      let views: Vec<_> = windows.iter().map(|w| w.values()).collect();
      let joined = concatenate(Axis(0), &views).unwrap();
      assert_eq!(joined, series.values().slice(ndarray::s![..covered, ..]));
      assert!(windows.iter().enumerate().all(|(i, w)| w.index() == i));
    }
  }

  #[test]
  fn zero_length_is_invalid_configuration() {
    let err = moving_window(&ramp(10, 1), 0).unwrap_err();
    assert!(matches!(err, ComovementError::InvalidConfiguration(_)));
  }

  #[test]
  fn window_longer_than_series_yields_nothing() {
    assert!(moving_window(&ramp(5, 1), 6).unwrap().is_empty());
  }

  #[test]
  fn benchmark_windows_align_with_asset_windows() {
    let series = ramp(63, 3);
    let (assets, bm) = series.split_column("A1").unwrap();

    let asset_windows = moving_window(&assets, 21).unwrap();
    let bm_windows = moving_window(&bm, 21).unwrap();

    assert!(check_alignment(&asset_windows, &bm_windows).is_ok());
    assert!(check_alignment(&asset_windows, &bm_windows[1..]).is_err());
    assert!(check_alignment(&asset_windows[1..], &bm_windows[..2]).is_err());
  }

  #[test]
  fn cumulative_returns_sum_each_column() {
    let series = ramp(4, 2);
    let windows = moving_window(&series, 2).unwrap();
    // rows (0,1),(2,3) then (4,5),(6,7)
    assert_eq!(windows[0].cumulative_returns().to_vec(), vec![2.0, 4.0]);
    assert_eq!(windows[1].cumulative_returns().to_vec(), vec![10.0, 12.0]);
  }
}
