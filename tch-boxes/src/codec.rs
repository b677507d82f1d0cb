use crate::{common::*, coord::center_size};

/// Encodes matched ground-truth boxes (corner form) as regression targets
/// relative to priors (center form).
///
/// The first two components are the center offset scaled by the prior size
/// and `variances[0]`; the last two are the log size ratio scaled by
/// `variances[1]`.
pub fn encode(matched: &Tensor, priors: &Tensor, variances: [f64; 2]) -> Tensor {
    debug_assert_eq!(matched.size(), priors.size());
    let prior_center = priors.narrow(1, 0, 2);
    let prior_size = priors.narrow(1, 2, 2);
    let matched = center_size(matched);
    let delta_center = (matched.narrow(1, 0, 2) - &prior_center) / (&prior_size * variances[0]);
    let delta_size = (matched.narrow(1, 2, 2) / &prior_size).log() / variances[1];
    Tensor::cat(&[delta_center, delta_size], 1)
}

/// Decodes regression offsets against center-form priors into corner-form
/// boxes. Inverse of [`encode`].
pub fn decode(loc: &Tensor, priors: &Tensor, variances: [f64; 2]) -> Tensor {
    let prior_center = priors.narrow(-1, 0, 2);
    let prior_size = priors.narrow(-1, 2, 2);
    let center = &prior_center + loc.narrow(-1, 0, 2) * variances[0] * &prior_size;
    let size = &prior_size * (loc.narrow(-1, 2, 2) * variances[1]).exp();
    Tensor::cat(&[&center - &size / 2.0, &center + &size / 2.0], -1)
}

/// Applies predicted offsets to the shared priors, one offset set per image,
/// keeping the result in center form so the refined boxes can serve as
/// priors again.
///
/// `loc` has shape `[batch, num_priors, 4]` and `priors` `[num_priors, 4]`;
/// the result has the shape of `loc`.
pub fn refine_priors(loc: &Tensor, priors: &Tensor, variances: [f64; 2]) -> Tensor {
    let prior_center = priors.narrow(-1, 0, 2);
    let prior_size = priors.narrow(-1, 2, 2);
    let center = &prior_center + loc.narrow(-1, 0, 2) * variances[0] * &prior_size;
    let size = &prior_size * (loc.narrow(-1, 2, 2) * variances[1]).exp();
    Tensor::cat(&[center, size], -1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::point_form;
    use approx::assert_abs_diff_eq;

    const VARIANCES: [f64; 2] = [0.1, 0.2];

    #[test]
    fn encode_decode_round_trip() {
        let matched = Tensor::of_slice(&[
            0.1f32, 0.2, 0.5, 0.6, //
            0.4, 0.4, 0.9, 0.7, //
            0.05, 0.6, 0.3, 0.95,
        ])
        .view([3, 4]);
        let priors = Tensor::of_slice(&[
            0.3f32, 0.4, 0.5, 0.5, //
            0.6, 0.5, 0.4, 0.3, //
            0.2, 0.8, 0.3, 0.4,
        ])
        .view([3, 4]);

        let decoded = decode(&encode(&matched, &priors, VARIANCES), &priors, VARIANCES);

        let expect = Vec::<f32>::from(&matched.view([-1]));
        let actual = Vec::<f32>::from(&decoded.view([-1]));
        for (lhs, rhs) in expect.iter().zip(&actual) {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-5);
        }
    }

    #[test]
    fn zero_offsets_keep_priors() {
        let priors = Tensor::of_slice(&[
            0.3f32, 0.4, 0.5, 0.5, //
            0.6, 0.5, 0.4, 0.3,
        ])
        .view([2, 4]);
        let loc = Tensor::zeros(&[1, 2, 4], tch::kind::FLOAT_CPU);

        let refined = refine_priors(&loc, &priors, VARIANCES);

        let expect = Vec::<f32>::from(&priors.view([-1]));
        let actual = Vec::<f32>::from(&refined.view([-1]));
        for (lhs, rhs) in expect.iter().zip(&actual) {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-6);
        }

        let decoded = decode(&loc.i((0, .., ..)), &priors, VARIANCES);
        let expect = Vec::<f32>::from(&point_form(&priors).view([-1]));
        let actual = Vec::<f32>::from(&decoded.view([-1]));
        for (lhs, rhs) in expect.iter().zip(&actual) {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-6);
        }
    }
}
