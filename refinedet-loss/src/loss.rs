//! Loss function building blocks.

mod aggregate;
mod arm;
mod config;
mod cross_entropy;
mod matcher;
mod mining;
mod misc;
mod odm;

pub use arm::*;
pub use config::*;
pub use cross_entropy::*;
pub use matcher::*;
pub use mining::*;
pub use misc::*;
pub use odm::*;
