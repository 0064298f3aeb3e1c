//! # comovement
//!
//! $$
//! \text{returns}\ \to\ \text{windows}\ \to\ \text{distance-correlation graphs}\ \to\ \text{similar regimes}
//! $$
//!
//! Builds one dependence graph per non-overlapping window of a multivariate
//! return series and retrieves, for any window, the historically most similar
//! windows by weighted Jaccard similarity of their graphs.
//!
//! ## Modules
//!
//! | Module         | Description                                                                 |
//! |----------------|-----------------------------------------------------------------------------|
//! | [`series`]     | Date-indexed return tables, date-range slicing, benchmark column split.     |
//! | [`window`]     | Fixed-length, non-overlapping windows keyed by start date.                  |
//! | [`stats`]      | Sample distance correlation.                                                |
//! | [`dependence`] | Symmetric per-window dependence matrices.                                   |
//! | [`graph`]      | Thresholded dependence graphs.                                              |
//! | [`similarity`] | Graph similarity metrics and the top-k similarity index.                    |
//! | [`engine`]     | End-to-end pipeline with per-window failure reporting.                      |
//! | [`cache`]      | Content-addressed cache of per-window estimates.                            |
//! | [`config`]     | Pipeline parameters, YAML loading.                                          |
//! | [`io`]         | Comma-separated return table reader.                                        |
//!
//! ## Parallelism
//!
//! Windows, asset pairs within a window, and window pairs of the similarity
//! index are evaluated on the global `rayon` pool unless `parallel` is off.
//!
//! ## Example Usage
//!
//! ```rust
//! use comovement::ComovementEngine;
//! use comovement::PipelineConfig;
//!
//! let engine = ComovementEngine::new(PipelineConfig::default())?;
//! let out = engine.run(&series, None)?;
//! for key in out.window_keys() {
//!   println!("{key}: {:?}", out.similar(key));
//! }
//! ```

pub mod cache;
pub mod config;
pub mod dependence;
pub mod engine;
pub mod error;
pub mod graph;
pub mod io;
pub mod series;
pub mod similarity;
pub mod stats;
pub mod window;

pub use cache::GraphCache;
pub use config::PipelineConfig;
pub use dependence::DependenceEstimator;
pub use dependence::DependenceMatrix;
pub use engine::ComovementEngine;
pub use engine::PipelineOutput;
pub use engine::WindowAnalysis;
pub use engine::WindowFailure;
pub use error::ComovementError;
pub use error::Result;
pub use graph::DependenceGraph;
pub use graph::Edge;
pub use graph::GraphBuilder;
pub use graph::GraphSummary;
pub use series::ReturnSeries;
pub use similarity::SimilarWindow;
pub use similarity::SimilarityIndex;
pub use similarity::SimilarityMetric;
pub use similarity::weighted_jaccard;
pub use window::Window;
pub use window::WindowKey;
pub use window::moving_window;
