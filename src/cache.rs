//! # Window Analysis Cache
//!
//! $$
//! \text{key}=\big(t_0,\ \operatorname{SHA256}(\text{assets},W),\ L,\ \tau\big)
//! $$
//!
//! In-memory cache of per-window estimates. Entries are keyed by window
//! identity and the content of the window, and become unreachable as soon as
//! the window length or threshold changes. A window start holds at most one
//! entry per configuration: inserting revised content replaces the old entry.

use std::collections::HashMap;

use sha2::Digest;
use sha2::Sha256;

use crate::engine::WindowAnalysis;
use crate::window::Window;
use crate::window::WindowKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub start: WindowKey,
  pub content: [u8; 32],
  pub window_len: usize,
  threshold_bits: u64,
}

impl CacheKey {
  pub fn new(window: &Window, window_len: usize, threshold: f64) -> Self {
    Self {
      start: window.key(),
      content: content_hash(window),
      window_len,
      threshold_bits: threshold.to_bits(),
    }
  }

  pub fn threshold(&self) -> f64 {
    f64::from_bits(self.threshold_bits)
  }
}

/// SHA-256 over asset names, dates and the little-endian bytes of every value.
pub fn content_hash(window: &Window) -> [u8; 32] {
  let mut hasher = Sha256::new();
  for asset in window.assets() {
    hasher.update((asset.len() as u64).to_le_bytes());
    hasher.update(asset.as_bytes());
  }
  for date in window.dates() {
    hasher.update(date.to_string().as_bytes());
  }
  for v in window.values().iter() {
    hasher.update(v.to_le_bytes());
  }
  hasher.finalize().into()
}

#[derive(Debug, Default)]
pub struct GraphCache {
  entries: HashMap<CacheKey, WindowAnalysis>,
  hits: u64,
  misses: u64,
}

impl GraphCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn hits(&self) -> u64 {
    self.hits
  }

  pub fn misses(&self) -> u64 {
    self.misses
  }

  pub fn get(&self, key: &CacheKey) -> Option<&WindowAnalysis> {
    self.entries.get(key)
  }

  /// Insert `analysis`, evicting entries for the same window start and
  /// configuration that were built from different content.
  pub fn insert(&mut self, key: CacheKey, analysis: WindowAnalysis) {
    let before = self.entries.len();
    self.entries.retain(|k, _| {
      k.start != key.start
        || k.window_len != key.window_len
        || k.threshold_bits != key.threshold_bits
        || k.content == key.content
    });
    let replaced = before - self.entries.len();
    if replaced > 0 {
      tracing::debug!(start = %key.start, replaced, "replaced revised window");
    }
    self.entries.insert(key, analysis);
  }

  pub(crate) fn record(&mut self, hits: u64, misses: u64) {
    self.hits += hits;
    self.misses += misses;
  }

  /// Drop entries built with a different window length or threshold.
  pub fn retain_config(&mut self, window_len: usize, threshold: f64) {
    let before = self.entries.len();
    self
      .entries
      .retain(|k, _| k.window_len == window_len && k.threshold_bits == threshold.to_bits());
    let evicted = before - self.entries.len();
    if evicted > 0 {
      tracing::debug!(evicted, window_len, threshold, "invalidated cached windows");
    }
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }
}

#[cfg(test)]
mod tests {
  use ndarray::Array2;

  use super::*;
  use crate::dependence::DependenceEstimator;
  use crate::graph::GraphBuilder;
  use crate::series::ReturnSeries;
  use crate::series::tests::days;
  use crate::window::moving_window;

  fn windows(scale: f64) -> Vec<Window> {
    let values = Array2::from_shape_fn((42, 2), |(t, c)| scale * ((t * 7 + c * 3) % 11) as f64);
    let series = ReturnSeries::new(days(42), vec!["A".into(), "B".into()], values).unwrap();
    moving_window(&series, 21).unwrap()
  }

  fn analysis(w: &Window) -> WindowAnalysis {
    let matrix = DependenceEstimator::new(false).estimate(w).unwrap();
    let graph = GraphBuilder::default().build(&matrix);
    WindowAnalysis { matrix, graph }
  }

  #[test]
  fn key_depends_on_content_and_config() {
    let a = windows(1.0);
    let b = windows(2.0);

    assert_eq!(CacheKey::new(&a[0], 21, 0.325), CacheKey::new(&a[0], 21, 0.325));
    assert_ne!(CacheKey::new(&a[0], 21, 0.325), CacheKey::new(&b[0], 21, 0.325));
    assert_ne!(CacheKey::new(&a[0], 21, 0.325), CacheKey::new(&a[0], 21, 0.5));
    assert_ne!(CacheKey::new(&a[0], 21, 0.325), CacheKey::new(&a[1], 21, 0.325));
    assert_eq!(CacheKey::new(&a[0], 21, 0.4).threshold(), 0.4);
  }

  #[test]
  fn retain_config_evicts_stale_entries() {
    let w = windows(1.0);
    let mut cache = GraphCache::new();
    cache.insert(CacheKey::new(&w[0], 21, 0.325), analysis(&w[0]));
    cache.insert(CacheKey::new(&w[1], 21, 0.5), analysis(&w[1]));

    cache.retain_config(21, 0.325);
    assert_eq!(cache.len(), 1);
    assert!(cache.get(&CacheKey::new(&w[0], 21, 0.325)).is_some());

    cache.retain_config(63, 0.325);
    assert!(cache.is_empty());
  }

  #[test]
  fn revised_window_content_replaces_entry() {
    let original = windows(1.0);
    let revised = windows(2.0);
    let mut cache = GraphCache::new();

    cache.insert(CacheKey::new(&original[0], 21, 0.325), analysis(&original[0]));
    cache.insert(CacheKey::new(&original[1], 21, 0.325), analysis(&original[1]));
    cache.insert(CacheKey::new(&revised[0], 21, 0.325), analysis(&revised[0]));

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&CacheKey::new(&original[0], 21, 0.325)).is_none());
    assert!(cache.get(&CacheKey::new(&revised[0], 21, 0.325)).is_some());
    assert!(cache.get(&CacheKey::new(&original[1], 21, 0.325)).is_some());

    // same content under another threshold is a separate entry
    cache.insert(CacheKey::new(&revised[0], 21, 0.5), analysis(&revised[0]));
    assert_eq!(cache.len(), 3);
  }
}
