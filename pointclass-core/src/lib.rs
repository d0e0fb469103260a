//! Core data structures and traits for pointclass
//!
//! This crate provides the fundamental types shared by the classification
//! pipeline: points and point sets with their decimation map, the class label
//! catalog, per-point feature tables, and the traits behind which the
//! classifier and the spatial index live.

pub mod point;
pub mod point_cloud;
pub mod labels;
pub mod features;
pub mod traits;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use labels::*;
pub use features::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::Point3;
