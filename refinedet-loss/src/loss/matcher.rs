use super::misc::BACKGROUND_LABEL;
use crate::common::*;
use tch_boxes::{encode, jaccard, point_form};

#[derive(Debug, Clone)]
pub struct MatcherInit {
    pub overlap_thresh: f64,
    pub variances: [f64; 2],
}

impl MatcherInit {
    pub fn build(self) -> Result<Matcher> {
        let Self {
            overlap_thresh,
            variances,
        } = self;
        ensure!(
            overlap_thresh > 0.0 && overlap_thresh < 1.0,
            "overlap_thresh must be in range (0, 1)"
        );
        ensure!(
            variances.iter().all(|var| var.is_finite() && *var > 0.0),
            "variances must be positive finite numbers"
        );
        Ok(Matcher {
            overlap_thresh,
            variances,
        })
    }
}

/// Assigns ground-truth boxes to priors and encodes regression targets.
#[derive(Debug, Clone)]
pub struct Matcher {
    overlap_thresh: f64,
    variances: [f64; 2],
}

impl Matcher {
    /// Matches one image's ground truth against a set of center-form priors.
    ///
    /// Returns `(loc_target, label_target)` of shapes `[num_priors, 4]` and
    /// `[num_priors]`. Every ground-truth box claims its best-overlapping
    /// prior even below the overlap threshold; when two ground truths claim
    /// the same prior, the higher ground-truth index wins. Any other prior
    /// takes its best-overlapping ground truth's label if that overlap
    /// reaches the threshold, and background otherwise. `loc_target` rows of
    /// background priors are placeholders.
    pub fn match_image(
        &self,
        truths: &Tensor,
        labels: &Tensor,
        priors: &Tensor,
    ) -> Result<(Tensor, Tensor)> {
        let device = priors.device();
        let num_priors = priors.size()[0];
        let num_truths = truths.size()[0];

        if num_truths == 0 {
            let loc_target = Tensor::zeros(&[num_priors, 4], (Kind::Float, device));
            let label_target = Tensor::zeros(&[num_priors], (Kind::Int64, device));
            return Ok((loc_target, label_target));
        }

        let degenerate = (truths.i((.., 2)) - truths.i((.., 0)))
            .le(0.0)
            .logical_or(&(truths.i((.., 3)) - truths.i((.., 1))).le(0.0));
        if bool::from(degenerate.any()) {
            warn!("ground truth contains boxes with non-positive width or height");
        }

        let overlaps = jaccard(truths, &point_form(priors))?;
        let (_, best_prior_index) = overlaps.max_dim(1, false);
        let (best_truth_overlap, best_truth_index) = overlaps.max_dim(0, false);

        let best_prior_index = Vec::<i64>::from(&best_prior_index);
        let mut best_truth_index = Vec::<i64>::from(&best_truth_index);
        let mut best_truth_overlap = Vec::<f64>::from(&best_truth_overlap);

        // every ground truth claims its best prior regardless of the
        // threshold; later claims win
        for (truth_index, &prior_index) in best_prior_index.iter().enumerate() {
            best_truth_index[prior_index as usize] = truth_index as i64;
            best_truth_overlap[prior_index as usize] = 2.0;
        }

        let labels = Vec::<i64>::from(labels);
        let label_target: Vec<i64> = best_truth_index
            .iter()
            .zip(&best_truth_overlap)
            .map(|(&truth_index, &overlap)| {
                if overlap < self.overlap_thresh {
                    BACKGROUND_LABEL
                } else {
                    labels[truth_index as usize]
                }
            })
            .collect();

        let best_truth_index = Tensor::of_slice(&best_truth_index).to_device(device);
        let matched = truths.index_select(0, &best_truth_index);
        let loc_target = encode(&matched, priors, self.variances);
        let label_target = Tensor::of_slice(&label_target).to_device(device);

        Ok((loc_target, label_target))
    }
}
