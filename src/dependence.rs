//! # Dependence Matrix
//!
//! $$
//! D_{ij}=D_{ji}=\mathcal R_n\big(W_{\cdot i},W_{\cdot j}\big)\in[0,1],\qquad D_{ii}=1
//! $$
//!
//! Pairwise distance-correlation matrix of one window. Each unordered pair is
//! estimated once; pairs and windows can run on the rayon pool.

use ndarray::Array2;
use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::error::ComovementError;
use crate::error::Result;
use crate::stats::dcor::CenteredDistances;
use crate::window::Window;

/// Square, symmetric dependence matrix indexed by a fixed, ordered asset list.
#[derive(Clone, Debug, PartialEq)]
pub struct DependenceMatrix {
  assets: Vec<String>,
  values: Array2<f64>,
}

impl DependenceMatrix {
  /// Matrix with unit diagonal and no pair entries yet.
  fn identity(assets: Vec<String>) -> Self {
    let n = assets.len();
    Self {
      assets,
      values: Array2::eye(n),
    }
  }

  /// The only write path, so symmetry holds by construction.
  fn set_pair(&mut self, i: usize, j: usize, value: f64) {
    self.values[[i, j]] = value;
    self.values[[j, i]] = value;
  }

  /// Build a matrix by evaluating `f(i, j)` once for every `i < j`.
  ///
  /// Values must be finite and lie in `[0, 1]`.
  pub fn from_fn<F>(assets: Vec<String>, mut f: F) -> Result<Self>
  where
    F: FnMut(usize, usize) -> f64,
  {
    let mut m = Self::identity(assets);
    let n = m.n_assets();
    for i in 0..n {
      for j in (i + 1)..n {
        let v = f(i, j);
        if !(0.0..=1.0).contains(&v) {
          return Err(ComovementError::InvalidDependence(format!(
            "dependence between {} and {} is {v}, outside [0, 1]",
            m.assets[i], m.assets[j]
          )));
        }
        m.set_pair(i, j, v);
      }
    }
    Ok(m)
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.values.view()
  }

  /// Dependence between assets at positions `i` and `j`.
  ///
  /// # Panics
  /// Panics if either index is out of bounds.
  pub fn get(&self, i: usize, j: usize) -> f64 {
    self.values[[i, j]]
  }

  pub fn by_name(&self, a: &str, b: &str) -> Result<f64> {
    let i = self.index_of(a)?;
    let j = self.index_of(b)?;
    Ok(self.get(i, j))
  }

  fn index_of(&self, asset: &str) -> Result<usize> {
    self
      .assets
      .iter()
      .position(|x| x == asset)
      .ok_or_else(|| ComovementError::UnknownAsset(asset.to_string()))
  }

  /// Upper-triangle entries `(i, j, value)` with `i < j`. Empty for a single asset.
  pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
    let n = self.n_assets();
    (0..n).flat_map(move |i| ((i + 1)..n).map(move |j| (i, j, self.values[[i, j]])))
  }
}

/// Estimates a [`DependenceMatrix`] per window with distance correlation.
#[derive(Clone, Copy, Debug)]
pub struct DependenceEstimator {
  parallel: bool,
}

impl Default for DependenceEstimator {
  fn default() -> Self {
    Self { parallel: true }
  }
}

impl DependenceEstimator {
  #[must_use]
  pub fn new(parallel: bool) -> Self {
    Self { parallel }
  }

  /// Dependence matrix of one window.
  ///
  /// Fails with [`ComovementError::DegenerateInput`] if any asset is constant
  /// over the window or its distance variance overflows, and with
  /// [`ComovementError::UndefinedDependence`] if a pair has no finite
  /// coefficient. A single-asset window yields a matrix with no pairs.
  pub fn estimate(&self, window: &Window) -> Result<DependenceMatrix> {
    let assets = window.assets().to_vec();
    let n = assets.len();
    if n < 2 {
      return Ok(DependenceMatrix::identity(assets));
    }

    let values = window.values();
    if let Some(c) = (0..n).find(|&c| is_constant(values.column(c).iter().copied())) {
      return Err(ComovementError::DegenerateInput {
        window: window.index(),
        start: window.key(),
        asset: assets[c].clone(),
      });
    }

    let centered: Vec<CenteredDistances> = if self.parallel {
      (0..n)
        .into_par_iter()
        .map(|c| CenteredDistances::new(values.column(c)))
        .collect()
    } else {
      (0..n)
        .map(|c| CenteredDistances::new(values.column(c)))
        .collect()
    };
    if let Some(c) = centered
      .iter()
      .position(|d| d.dvar2() <= 0.0 || !d.dvar2().is_finite())
    {
      return Err(ComovementError::DegenerateInput {
        window: window.index(),
        start: window.key(),
        asset: assets[c].clone(),
      });
    }

    let pairs: Vec<(usize, usize)> = (0..n)
      .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
      .collect();
    let dcor = |&(i, j): &(usize, usize)| {
      centered[i]
        .dcor(&centered[j])
        .ok_or_else(|| ComovementError::UndefinedDependence {
          window: window.index(),
          start: window.key(),
          left: assets[i].clone(),
          right: assets[j].clone(),
        })
    };
    let coefficients: Vec<f64> = if self.parallel {
      pairs.par_iter().map(dcor).collect::<Result<_>>()?
    } else {
      pairs.iter().map(dcor).collect::<Result<_>>()?
    };

    let mut matrix = DependenceMatrix::identity(assets);
    for (&(i, j), v) in pairs.iter().zip(coefficients) {
      matrix.set_pair(i, j, v);
    }

    tracing::debug!(
      window = window.index(),
      start = %window.key(),
      pairs = pairs.len(),
      "estimated dependence matrix"
    );

    Ok(matrix)
  }

  /// One result per window, in window order. A failing window does not stop the others.
  pub fn estimate_all(&self, windows: &[Window]) -> Vec<Result<DependenceMatrix>> {
    if self.parallel {
      windows.par_iter().map(|w| self.estimate(w)).collect()
    } else {
      windows.iter().map(|w| self.estimate(w)).collect()
    }
  }
}

fn is_constant(mut xs: impl Iterator<Item = f64>) -> bool {
  match xs.next() {
    Some(first) => xs.all(|x| x == first),
    None => true,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::Array2;
  use proptest::prelude::*;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;
  use crate::series::ReturnSeries;
  use crate::series::tests::days;
  use crate::window::moving_window;

  fn window_from(values: Array2<f64>) -> Window {
    let (n, a) = values.dim();
    let assets = (0..a).map(|c| format!("A{c}")).collect();
    let series = ReturnSeries::new(days(n), assets, values).unwrap();
    moving_window(&series, n).unwrap().remove(0)
  }

  fn random_window(n: usize, a: usize, seed: u64) -> Window {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 0.01).unwrap();
    window_from(Array2::from_shape_fn((n, a), |_| normal.sample(&mut rng)))
  }

  #[test]
  fn matrix_is_symmetric_and_bounded() {
    let m = DependenceEstimator::default()
      .estimate(&random_window(21, 6, 42))
      .unwrap();
    let v = m.values();
    assert_eq!(v, v.t());
    assert!(v.iter().all(|x| (0.0..=1.0).contains(x)));
    assert!((0..6).all(|i| m.get(i, i) == 1.0));
    assert_eq!(m.pairs().count(), 15);
  }

  #[test]
  fn parallel_and_sequential_agree() {
    let w = random_window(21, 5, 9);
    let par = DependenceEstimator::new(true).estimate(&w).unwrap();
    let seq = DependenceEstimator::new(false).estimate(&w).unwrap();
    assert_eq!(par, seq);
  }

  #[test]
  fn identical_columns_are_fully_dependent() {
    let mut values = random_window(21, 3, 1).values().to_owned();
    let first = values.column(0).to_owned();
    values.column_mut(1).assign(&first);

    let m = DependenceEstimator::default().estimate(&window_from(values)).unwrap();
    assert_abs_diff_eq!(m.by_name("A0", "A1").unwrap(), 1.0, epsilon = 1e-12);
    assert!(m.by_name("A0", "A2").unwrap() < 1.0);
    assert!(m.by_name("A0", "ZZZ").is_err());
  }

  #[test]
  fn single_asset_window_has_no_pairs() {
    let m = DependenceEstimator::default()
      .estimate(&random_window(21, 1, 3))
      .unwrap();
    assert_eq!(m.n_assets(), 1);
    assert_eq!(m.pairs().count(), 0);
  }

  #[test]
  fn constant_column_is_reported_with_window_identity() {
    let mut values = random_window(21, 3, 5).values().to_owned();
    values.column_mut(2).fill(0.0);
    let w = window_from(values);

    match DependenceEstimator::default().estimate(&w).unwrap_err() {
      ComovementError::DegenerateInput {
        window,
        start,
        asset,
      } => {
        assert_eq!(window, 0);
        assert_eq!(start, w.key());
        assert_eq!(asset, "A2");
      }
      other => panic!("unexpected error {other}"),
    }
  }

  #[test]
  fn overflowing_distances_fail_instead_of_scoring_zero() {
    let values = Array2::from_shape_fn((21, 2), |(t, _)| ((t * 7) % 11) as f64 * 1e160);
    let w = window_from(values);

    for parallel in [true, false] {
      match DependenceEstimator::new(parallel).estimate(&w).unwrap_err() {
        ComovementError::DegenerateInput { window, asset, .. } => {
          assert_eq!(window, 0);
          assert_eq!(asset, "A0");
        }
        other => panic!("unexpected error {other}"),
      }
    }
  }

  #[test]
  fn undefined_coefficient_is_not_replaced() {
    let x = CenteredDistances::new(ndarray::arr1(&[1.0, 2.0, 4.0]).view());
    let overflow = CenteredDistances::new(ndarray::arr1(&[0.0, 1e300, -1e300]).view());
    assert!(x.dcor(&x).is_some());
    assert!(!overflow.dvar2().is_finite());
    assert_eq!(x.dcor(&overflow), None);
  }

  #[test]
  fn estimate_all_isolates_failures() {
    let mut values = random_window(63, 2, 8).values().to_owned();
    // second window: asset 0 constant
    values.slice_mut(ndarray::s![21..42, 0]).fill(0.0);
    let series = ReturnSeries::new(days(63), vec!["A".into(), "B".into()], values).unwrap();
    let windows = moving_window(&series, 21).unwrap();

    let results = DependenceEstimator::default().estimate_all(&windows);
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
  }

  #[test]
  fn from_fn_rejects_out_of_range_values() {
    let assets = vec!["A".to_string(), "B".to_string()];
    assert!(matches!(
      DependenceMatrix::from_fn(assets.clone(), |_, _| 1.5).unwrap_err(),
      ComovementError::InvalidDependence(_)
    ));
    assert!(DependenceMatrix::from_fn(assets.clone(), |_, _| f64::NAN).is_err());
    let m = DependenceMatrix::from_fn(assets, |_, _| 0.4).unwrap();
    assert_eq!(m.get(1, 0), 0.4);
  }

  proptest! {
    #[test]
    fn estimated_entries_stay_in_unit_interval(seed in any::<u64>(), a in 2usize..6, n in 3usize..30) {
      let m = DependenceEstimator::new(false).estimate(&random_window(n, a, seed)).unwrap();
      for (i, j, v) in m.pairs() {
        prop_assert!((0.0..=1.0).contains(&v));
        prop_assert_eq!(v, m.get(j, i));
      }
    }
  }
}
