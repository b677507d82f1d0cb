use super::{
    aggregate::aggregate_losses,
    cross_entropy::CrossEntropyLoss,
    matcher::{Matcher, MatcherInit},
    mining::{HardNegativeMiner, HardNegativeMinerInit},
    misc::{truncate_priors, validate_predictions, GroundTruth, LossAuxiliary, LossOutput},
};
use crate::common::*;

/// The anchor refinement stage only separates objects from background.
pub const ARM_NUM_CLASSES: i64 = 2;

#[derive(Debug, Clone)]
pub struct ArmLossInit {
    pub overlap_thresh: f64,
    pub neg_pos_ratio: i64,
    pub variances: [f64; 2],
}

impl ArmLossInit {
    pub fn build(self) -> Result<ArmLoss> {
        let Self {
            overlap_thresh,
            neg_pos_ratio,
            variances,
        } = self;

        let matcher = MatcherInit {
            overlap_thresh,
            variances,
        }
        .build()?;
        let miner = HardNegativeMinerInit { neg_pos_ratio }.build()?;

        Ok(ArmLoss {
            matcher,
            miner,
            cross_entropy: CrossEntropyLoss::new(Reduction::Sum),
        })
    }
}

impl Default for ArmLossInit {
    fn default() -> Self {
        Self {
            overlap_thresh: 0.5,
            neg_pos_ratio: 3,
            variances: [0.1, 0.2],
        }
    }
}

/// Binary object/background loss over the raw priors.
#[derive(Debug)]
pub struct ArmLoss {
    matcher: Matcher,
    miner: HardNegativeMiner,
    cross_entropy: CrossEntropyLoss,
}

impl ArmLoss {
    /// Computes the anchor refinement loss of one batch.
    ///
    /// `loc_pred` has shape `[batch, num_priors, 4]`, `cls_pred`
    /// `[batch, num_priors, 2]`, `priors` `[num_priors, 4]` in center form
    /// (extra prior rows are truncated), and `targets` one entry per image.
    pub fn forward(
        &self,
        loc_pred: &Tensor,
        cls_pred: &Tensor,
        priors: &Tensor,
        targets: &[GroundTruth],
    ) -> Result<(LossOutput, LossAuxiliary)> {
        let (_batch_size, num_priors, num_classes) =
            validate_predictions(loc_pred, cls_pred, targets.len())?;
        ensure!(
            num_classes == ARM_NUM_CLASSES,
            "the anchor refinement stage predicts {} classes, got {}",
            ARM_NUM_CLASSES,
            num_classes
        );
        let priors = truncate_priors(priors, num_priors)?;
        let device = loc_pred.device();

        let (loc_target, label_target) = tch::no_grad(|| -> Result<_> {
            let pairs: Vec<_> = targets
                .iter()
                .map(|target| {
                    let truths = target.boxes().to_device(device);
                    // the binary stage sees every object as foreground
                    let labels = target.labels().to_device(device).clamp_max(1);
                    self.matcher.match_image(&truths, &labels, &priors)
                })
                .try_collect()?;
            let (loc, label) = pairs.into_iter().unzip_n_vec();
            Ok((Tensor::stack(&loc, 0), Tensor::stack(&label, 0)))
        })?;

        Ok(aggregate_losses(
            &self.miner,
            &self.cross_entropy,
            loc_pred,
            cls_pred,
            &loc_target,
            &label_target,
        ))
    }
}
