pub use anyhow::{bail, ensure, format_err, Error, Result};
pub use approx::{abs_diff_eq, assert_abs_diff_eq};
pub use itertools::{izip, Itertools as _};
pub use log::warn;
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::convert::{TryFrom, TryInto};
pub use tch::{
    kind::{FLOAT_CPU, INT64_CPU},
    Device, IndexOp, Kind, Reduction, Tensor,
};
pub use tch_tensor_like::TensorLike;

unzip_n::unzip_n!(pub 2);
