//! # Duplicate Detection
//!
//! [`PairwiseComparisonDriver`] scores the pairs of a batch and
//! [`DuplicateResolver`] turns the within-threshold pairs into one survivor
//! per duplicate cluster.

mod driver;
mod resolver;
mod size;

pub use driver::{DriverStats, PairwiseComparisonDriver};
pub use resolver::{DuplicateMap, DuplicateResolver};
pub use size::{HeaderSizeReader, ImageSizeReader};
