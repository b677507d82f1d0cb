use super::{
    aggregate::aggregate_losses,
    arm::ARM_NUM_CLASSES,
    cross_entropy::CrossEntropyLoss,
    matcher::{Matcher, MatcherInit},
    mining::{HardNegativeMiner, HardNegativeMinerInit},
    misc::{
        truncate_priors, validate_predictions, GroundTruth, LossAuxiliary, LossOutput,
        IGNORE_LABEL,
    },
};
use crate::common::*;
use tch_boxes::refine_priors;

#[derive(Debug, Clone)]
pub struct OdmLossInit {
    pub num_classes: i64,
    pub overlap_thresh: f64,
    pub neg_pos_ratio: i64,
    pub objectness_thresh: f64,
    pub arm_variances: [f64; 2],
    pub variances: [f64; 2],
}

impl OdmLossInit {
    pub fn build(self) -> Result<OdmLoss> {
        let Self {
            num_classes,
            overlap_thresh,
            neg_pos_ratio,
            objectness_thresh,
            arm_variances,
            variances,
        } = self;

        ensure!(
            num_classes >= 2,
            "num_classes must cover background and at least one object class"
        );
        ensure!(
            (0.0..1.0).contains(&objectness_thresh),
            "objectness_thresh must be in range [0, 1)"
        );
        ensure!(
            arm_variances.iter().all(|var| var.is_finite() && *var > 0.0),
            "arm_variances must be positive finite numbers"
        );
        let matcher = MatcherInit {
            overlap_thresh,
            variances,
        }
        .build()?;
        let miner = HardNegativeMinerInit { neg_pos_ratio }.build()?;

        Ok(OdmLoss {
            num_classes,
            objectness_thresh,
            arm_variances,
            matcher,
            miner,
            cross_entropy: CrossEntropyLoss::new(Reduction::Sum),
        })
    }
}

/// Multi-class loss over priors refined and filtered by the binary stage.
#[derive(Debug)]
pub struct OdmLoss {
    num_classes: i64,
    objectness_thresh: f64,
    arm_variances: [f64; 2],
    matcher: Matcher,
    miner: HardNegativeMiner,
    cross_entropy: CrossEntropyLoss,
}

impl OdmLoss {
    /// Computes the object detection loss of one batch.
    ///
    /// `arm_loc` and `arm_cls` are the first stage's outputs; they refine
    /// and filter the priors but receive no gradient from this loss.
    /// Priors whose first-stage foreground probability stays at or below
    /// `objectness_thresh` are ignored, and an image whose priors are all
    /// filtered out contributes no loss at all.
    pub fn forward(
        &self,
        arm_loc: &Tensor,
        arm_cls: &Tensor,
        loc_pred: &Tensor,
        cls_pred: &Tensor,
        priors: &Tensor,
        targets: &[GroundTruth],
    ) -> Result<(LossOutput, LossAuxiliary)> {
        let (batch_size, num_priors, num_classes) =
            validate_predictions(loc_pred, cls_pred, targets.len())?;
        ensure!(
            num_classes == self.num_classes,
            "class predictions carry {} classes, expected {}",
            num_classes,
            self.num_classes
        );
        ensure!(
            arm_loc.size() == loc_pred.size(),
            "arm_loc shape {:?} does not match loc shape {:?}",
            arm_loc.size(),
            loc_pred.size()
        );
        let (arm_batch, arm_priors, arm_classes) = arm_cls
            .size3()
            .map_err(|_| format_err!("expect a 3-d arm_cls tensor, got {:?}", arm_cls.size()))?;
        ensure!(
            arm_classes == ARM_NUM_CLASSES && arm_batch == batch_size && arm_priors == num_priors,
            "arm_cls shape {:?} does not agree with class shape {:?}",
            arm_cls.size(),
            cls_pred.size()
        );
        let priors = truncate_priors(priors, num_priors)?;
        let device = loc_pred.device();

        let (loc_target, label_target) = tch::no_grad(|| -> Result<_> {
            // the refined anchors play the role of per-image priors
            let refined = refine_priors(&arm_loc.detach(), &priors, self.arm_variances);
            let foreground_prob = arm_cls.detach().softmax(-1, Kind::Float).i((.., .., 1));

            let pairs: Vec<_> = izip!(0..batch_size, targets)
                .map(|(index, target)| -> Result<_> {
                    let keep_index = foreground_prob
                        .i((index, ..))
                        .gt(self.objectness_thresh)
                        .nonzero()
                        .view([-1]);
                    if keep_index.size()[0] == 0 {
                        // the first stage is confident the whole image is
                        // background; ignore it instead of penalizing the
                        // second stage for that call
                        let loc = Tensor::zeros(&[num_priors, 4], (Kind::Float, device));
                        let label =
                            Tensor::full(&[num_priors], IGNORE_LABEL, (Kind::Int64, device));
                        return Ok((loc, label));
                    }

                    let used_priors = refined.i((index, .., ..)).index_select(0, &keep_index);
                    let truths = target.boxes().to_device(device);
                    let labels = target.labels().to_device(device);
                    ensure!(
                        bool::from(labels.lt(self.num_classes).all()),
                        "ground truth labels must be smaller than num_classes {}",
                        self.num_classes
                    );
                    let (used_loc, used_label) =
                        self.matcher.match_image(&truths, &labels, &used_priors)?;

                    // scatter the survivors back to full prior length;
                    // filtered-out priors stay ignored
                    let loc = Tensor::zeros(&[num_priors, 4], (Kind::Float, device)).scatter_(
                        0,
                        &keep_index.unsqueeze(1).repeat(&[1, 4]),
                        &used_loc,
                    );
                    let label = Tensor::full(&[num_priors], IGNORE_LABEL, (Kind::Int64, device))
                        .scatter_(0, &keep_index, &used_label);
                    Ok((loc, label))
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
