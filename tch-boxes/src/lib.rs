//! Tensor helpers for anchor-box geometry: coordinate conversions, pairwise
//! overlaps, and the regression-target codec shared by anchor-based
//! detectors.

mod common;
pub mod codec;
pub mod coord;
pub mod overlap;
pub mod reduce;

pub use codec::*;
pub use coord::*;
pub use overlap::*;
pub use reduce::*;
