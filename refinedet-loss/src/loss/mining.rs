use super::misc::{BACKGROUND_LABEL, IGNORE_LABEL};
use crate::common::*;
use tch_boxes::log_sum_exp;

#[derive(Debug, Clone)]
pub struct HardNegativeMinerInit {
    pub neg_pos_ratio: i64,
}

impl HardNegativeMinerInit {
    pub fn build(self) -> Result<HardNegativeMiner> {
        let Self { neg_pos_ratio } = self;
        ensure!(neg_pos_ratio >= 0, "neg_pos_ratio must be non-negative");
        Ok(HardNegativeMiner { neg_pos_ratio })
    }
}

/// Selects the hardest background priors for the classification loss.
///
/// Hardness is ranked by `log_sum_exp(scores) - score(target)`, which is
/// monotonic with the per-prior cross entropy while skipping the softmax
/// normalization.
#[derive(Debug, Clone)]
pub struct HardNegativeMiner {
    neg_pos_ratio: i64,
}

impl HardNegativeMiner {
    /// Returns a `[batch, num_priors]` bool mask of mined negatives.
    ///
    /// Per image, at most `min(neg_pos_ratio * positive_count,
    /// num_priors - 1)` background priors are selected; positive and ignored
    /// priors are never selected.
    pub fn select(&self, cls_pred: &Tensor, label_target: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let (batch_size, num_priors, num_classes) = cls_pred.size3().unwrap();
            let pos = label_target.gt(BACKGROUND_LABEL);
            let ignore = label_target.eq(IGNORE_LABEL);

            // gather needs a valid class index at ignored priors
            let gather_target = label_target.masked_fill(&ignore, BACKGROUND_LABEL);
            let scores = cls_pred.view([batch_size * num_priors, num_classes]);
            let proxy = log_sum_exp(&scores)
                - scores.gather(1, &gather_target.view([batch_size * num_priors, 1]), false);
            let proxy = proxy
                .view([batch_size, num_priors])
                .masked_fill(&pos, 0.0)
                .masked_fill(&ignore, 0.0);

            // double argsort turns the descending order into per-prior ranks
            let (_, order) = proxy.sort(1, true);
            let (_, rank) = order.sort(1, false);

            let num_pos = pos.to_kind(Kind::Int64).sum_dim_intlist(&[1], true, Kind::Int64);
            let num_neg = (num_pos * self.neg_pos_ratio).clamp_max(num_priors - 1);
            (rank - num_neg)
                .lt(0)
                .logical_and(&label_target.eq(BACKGROUND_LABEL))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mining_respects_ratio_and_hardness_order() -> Result<()> {
        let miner = HardNegativeMinerInit { neg_pos_ratio: 2 }.build()?;

        // prior 0 positive, priors 1-3 background with descending hardness,
        // prior 4 ignored with a huge proxy value
        let cls_pred = Tensor::of_slice(&[
            3.0f32, 0.0, // positive, proxy zeroed
            0.0, 5.0, // hardest background
            0.0, 1.0, // medium background
            0.0, -2.0, // easy background
            0.0, 9.0, // ignored, must never be picked
        ])
        .view([1, 5, 2]);
        let label_target = Tensor::of_slice(&[1i64, 0, 0, 0, -1]).view([1, 5]);

        let neg = miner.select(&cls_pred, &label_target);
        let selected = Vec::<i64>::from(&neg.to_kind(Kind::Int64).view([-1]));
        assert_eq!(selected, vec![0, 1, 1, 0, 0]);
        Ok(())
    }

    #[test]
    fn mining_is_capped_at_num_priors_minus_one() -> Result<()> {
        let miner = HardNegativeMinerInit { neg_pos_ratio: 100 }.build()?;

        let cls_pred = Tensor::zeros(&[1, 4, 2], FLOAT_CPU);
        let label_target = Tensor::of_slice(&[1i64, 0, 0, 0]).view([1, 4]);

        let neg = miner.select(&cls_pred, &label_target);
        let count = i64::from(&neg.to_kind(Kind::Int64).sum(Kind::Int64));
        assert_eq!(count, 3);
        Ok(())
    }

    #[test]
    fn no_positives_means_no_negatives() -> Result<()> {
        let miner = HardNegativeMinerInit { neg_pos_ratio: 3 }.build()?;

        let cls_pred = Tensor::zeros(&[1, 4, 2], FLOAT_CPU);
        let label_target = Tensor::zeros(&[1, 4], INT64_CPU);

        let neg = miner.select(&cls_pred, &label_target);
        let count = i64::from(&neg.to_kind(Kind::Int64).sum(Kind::Int64));
        assert_eq!(count, 0);
        Ok(())
    }
}
