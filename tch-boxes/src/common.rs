pub use anyhow::{ensure, Result};
pub use tch::{IndexOp, Kind, Tensor};
