use crate::common::*;

/// Numerically stable `log(sum(exp(scores)))` over each row of a
/// `[num_samples, num_classes]` tensor, shape `[num_samples, 1]`.
pub fn log_sum_exp(scores: &Tensor) -> Tensor {
    let (max, _) = scores.max_dim(1, true);
    (scores - &max).exp().sum_dim_intlist(&[1], true, Kind::Float).log() + max
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn log_sum_exp_matches_direct_formula() {
        let scores = Tensor::of_slice(&[0.0f32, 0.0, 1.0, -2.0]).view([2, 2]);
        let values = Vec::<f32>::from(&log_sum_exp(&scores).view([-1]));
        assert_abs_diff_eq!(values[0], 2f32.ln(), epsilon = 1e-6);
        assert_abs_diff_eq!(values[1], (1f32.exp() + (-2f32).exp()).ln(), epsilon = 1e-6);
    }

    #[test]
    fn log_sum_exp_is_stable_for_large_scores() {
        let scores = Tensor::of_slice(&[1000.0f32, 1000.0]).view([1, 2]);
        let values = Vec::<f32>::from(&log_sum_exp(&scores).view([-1]));
        assert_abs_diff_eq!(values[0], 1000.0 + 2f32.ln(), epsilon = 1e-3);
    }
}
