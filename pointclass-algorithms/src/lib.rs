//! # pointclass algorithms
//!
//! Training-time and inference-time algorithms of the point cloud classifier.
//!
//! Training draws a class-balanced sample set from labeled clouds
//! ([`sampling`]) and grows decision trees whose nodes are split by a
//! randomized impurity search ([`split`]). Inference scores every processed
//! point, makes the labels spatially consistent ([`regularization`]) and
//! writes them back onto the full-resolution cloud ([`remap`]).

pub mod classify;
pub mod graphcut;
pub mod maxflow;
pub mod nearest_neighbor;
pub mod parallel;
pub mod partition;
pub mod regularization;
pub mod remap;
pub mod sampling;
pub mod split;
pub mod statistics;

// Re-export commonly used items
pub use classify::*;
pub use graphcut::*;
pub use nearest_neighbor::*;
pub use parallel::*;
pub use partition::*;
pub use regularization::*;
pub use remap::*;
pub use sampling::*;
pub use split::*;
pub use statistics::*;
