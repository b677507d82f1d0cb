use super::{
    cross_entropy::CrossEntropyLoss,
    mining::HardNegativeMiner,
    misc::{LossAuxiliary, LossOutput, BACKGROUND_LABEL, IGNORE_LABEL},
};
use crate::common::*;

/// Sums smooth-L1 over positive priors and cross entropy over positives plus
/// mined negatives, both normalized by the batch positive count.
///
/// A batch without positives divides by one instead of zero, so its loss
/// scale is no longer proportional to the positive count.
pub(super) fn aggregate_losses(
    miner: &HardNegativeMiner,
    cross_entropy: &CrossEntropyLoss,
    loc_pred: &Tensor,
    cls_pred: &Tensor,
    loc_target: &Tensor,
    label_target: &Tensor,
) -> (LossOutput, LossAuxiliary) {
    let num_classes = cls_pred.size()[2];
    let pos = label_target.gt(BACKGROUND_LABEL);
    let num_pos = i64::from(&pos.to_kind(Kind::Int64).sum(Kind::Int64));

    let pos_loc_mask = pos.unsqueeze(-1).expand_as(loc_pred);
    let loc_pred_pos = loc_pred.masked_select(&pos_loc_mask).view([num_pos, 4]);
    let loc_target_pos = loc_target.masked_select(&pos_loc_mask).view([num_pos, 4]);
    let loc_loss = loc_pred_pos.smooth_l1_loss(&loc_target_pos, Reduction::Sum, 1.0);

    let neg = miner.select(cls_pred, label_target);
    let selected = pos.logical_or(&neg);
    let num_selected = i64::from(&selected.to_kind(Kind::Int64).sum(Kind::Int64));
    let cls_mask = selected.unsqueeze(-1).expand_as(cls_pred);
    let cls_pred_selected = cls_pred
        .masked_select(&cls_mask)
        .view([num_selected, num_classes]);
    let target_selected = tch::no_grad(|| {
        label_target
            .masked_fill(&label_target.eq(IGNORE_LABEL), BACKGROUND_LABEL)
            .masked_select(&selected)
    });
    let cls_loss = cross_entropy.forward(&cls_pred_selected, &target_selected);

    let normalizer = num_pos.max(1) as f64;
    let output = LossOutput {
        loc_loss: loc_loss / normalizer,
        cls_loss: cls_loss / normalizer,
    };
    let auxiliary = LossAuxiliary {
        loc_target: loc_target.shallow_clone(),
        label_target: label_target.shallow_clone(),
        selected,
    };
    (output, auxiliary)
}
