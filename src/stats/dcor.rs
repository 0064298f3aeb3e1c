//! # Distance Correlation
//!
//! $$
//! A_{kl}=a_{kl}-\bar a_{k\cdot}-\bar a_{\cdot l}+\bar a_{\cdot\cdot},\quad
//! \mathcal R^2_n(x,y)=\frac{\mathcal V^2_n(x,y)}{\sqrt{\mathcal V^2_n(x)\,\mathcal V^2_n(y)}}
//! $$
//!
//! Székely-Rizzo-Bakirov sample distance correlation (V-statistic form),
//! with $a_{kl}=|x_k-x_l|$ and $\mathcal V^2_n(x,y)=n^{-2}\sum_{k,l}A_{kl}B_{kl}$.
//! The coefficient returned is $\mathcal R_n\in[0,1]$.
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use ndarray::Zip;

/// Double-centered pairwise distance matrix of one sample, with its distance variance.
///
/// Building this once per column lets every pair involving the column reuse it.
#[derive(Clone, Debug)]
pub struct CenteredDistances {
  matrix: Array2<f64>,
  dvar2: f64,
}

impl CenteredDistances {
  pub fn new(x: ArrayView1<f64>) -> Self {
    let matrix = double_centered(x);
    let dvar2 = mean_product(&matrix, &matrix);
    Self { matrix, dvar2 }
  }

  /// Squared distance variance $\mathcal V^2_n(x)$.
  pub fn dvar2(&self) -> f64 {
    self.dvar2
  }

  pub fn len(&self) -> usize {
    self.matrix.nrows()
  }

  pub fn is_empty(&self) -> bool {
    self.matrix.is_empty()
  }

  /// Squared distance covariance $\mathcal V^2_n(x,y)$.
  pub fn dcov2(&self, other: &Self) -> f64 {
    mean_product(&self.matrix, &other.matrix)
  }

  /// Distance correlation with `other`, or `None` when either sample is constant or
  /// the estimate is not finite.
  pub fn dcor(&self, other: &Self) -> Option<f64> {
    let denom = (self.dvar2 * other.dvar2).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
      return None;
    }
    // V-statistic dcov2 is non-negative; clamp away rounding noise.
    let r2 = self.dcov2(other) / denom;
    if !r2.is_finite() {
      return None;
    }
    Some(r2.clamp(0.0, 1.0).sqrt())
  }
}

/// $A_{kl}=|x_k-x_l|-\bar a_{k\cdot}-\bar a_{\cdot l}+\bar a_{\cdot\cdot}$
pub fn double_centered(x: ArrayView1<f64>) -> Array2<f64> {
  let n = x.len();
  let mut d = Array2::from_shape_fn((n, n), |(k, l)| (x[k] - x[l]).abs());
  let Some(row_means) = d.mean_axis(Axis(1)) else {
    return d;
  };
  let grand = row_means.mean().unwrap_or(0.0);

  // symmetric, so column means equal row means
  for ((k, l), v) in d.indexed_iter_mut() {
    *v += grand - row_means[k] - row_means[l];
  }
  d
}

fn mean_product(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
  let n = a.len();
  if n == 0 {
    return 0.0;
  }
  let sum = Zip::from(a).and(b).fold(0.0, |acc, &x, &y| acc + x * y);
  sum / n as f64
}

/// Distance correlation of two equal-length samples.
///
/// Returns `None` if the lengths differ, a sample is empty, or either sample is constant.
pub fn distance_correlation(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<f64> {
  if x.len() != y.len() || x.is_empty() {
    return None;
  }
  CenteredDistances::new(x).dcor(&CenteredDistances::new(y))
}
