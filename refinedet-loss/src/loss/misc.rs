use crate::common::*;
use getset::Getters;

/// Label value of priors assigned to background.
pub const BACKGROUND_LABEL: i64 = 0;
/// Label value of priors excluded from the loss entirely.
pub const IGNORE_LABEL: i64 = -1;

#[derive(Debug, TensorLike)]
pub struct GroundTruthUnchecked {
    pub boxes: Tensor,
    pub labels: Tensor,
}

/// Validated per-image annotations.
#[derive(Debug, TensorLike, Getters)]
pub struct GroundTruth {
    /// Corner-form boxes, shape `[num_objects, 4]`.
    #[get = "pub"]
    boxes: Tensor,
    /// Class labels, shape `[num_objects]`, int64 values starting at 1.
    #[get = "pub"]
    labels: Tensor,
}

impl GroundTruth {
    pub fn num_objects(&self) -> i64 {
        self.boxes.size()[0]
    }
}

impl TryFrom<GroundTruthUnchecked> for GroundTruth {
    type Error = Error;

    fn try_from(from: GroundTruthUnchecked) -> Result<Self, Self::Error> {
        let GroundTruthUnchecked { boxes, labels } = from;

        let (num_boxes, num_coords) = boxes
            .size2()
            .map_err(|_| format_err!("expect a [_, 4] box tensor, got {:?}", boxes.size()))?;
        let num_labels = labels
            .size1()
            .map_err(|_| format_err!("expect a 1-d label tensor, got {:?}", labels.size()))?;
        ensure!(
            num_coords == 4,
            "boxes must have 4 coordinates each, got {}",
            num_coords
        );
        ensure!(
            num_boxes == num_labels,
            "the numbers of boxes ({}) and labels ({}) differ",
            num_boxes,
            num_labels
        );
        ensure!(
            boxes.kind() == Kind::Float,
            "boxes must be a float tensor, got {:?}",
            boxes.kind()
        );
        ensure!(
            bool::from(boxes.isfinite().all()),
            "boxes must have finite coordinates"
        );
        ensure!(
            labels.kind() == Kind::Int64,
            "labels must be an int64 tensor, got {:?}",
            labels.kind()
        );
        ensure!(
            bool::from(labels.ge(1).all()),
            "class labels must be positive; background is implicit"
        );

        Ok(Self { boxes, labels })
    }
}

impl From<GroundTruth> for GroundTruthUnchecked {
    fn from(from: GroundTruth) -> Self {
        let GroundTruth { boxes, labels } = from;
        Self { boxes, labels }
    }
}

/// The pair of loss terms one stage produces. Weighting and summing belong
/// to the training loop.
#[derive(Debug, TensorLike)]
pub struct LossOutput {
    pub loc_loss: Tensor,
    pub cls_loss: Tensor,
}

impl LossOutput {
    pub fn weighted_total(&self, loc_weight: f64, cls_weight: f64) -> Tensor {
        loc_weight * &self.loc_loss + cls_weight * &self.cls_loss
    }
}

/// Intermediate per-prior results of one forward pass.
#[derive(Debug, TensorLike)]
pub struct LossAuxiliary {
    /// Regression targets, shape `[batch, num_priors, 4]`; only rows whose
    /// label is positive are meaningful.
    pub loc_target: Tensor,
    /// Assigned labels, shape `[batch, num_priors]`; -1 ignored,
    /// 0 background, positive values are object classes.
    pub label_target: Tensor,
    /// Bool mask of priors included in the classification loss, shape
    /// `[batch, num_priors]`.
    pub selected: Tensor,
}

pub(super) fn validate_predictions(
    loc_pred: &Tensor,
    cls_pred: &Tensor,
    num_targets: usize,
) -> Result<(i64, i64, i64)> {
    let (loc_batch, loc_priors, num_coords) = loc_pred
        .size3()
        .map_err(|_| format_err!("expect a 3-d loc tensor, got {:?}", loc_pred.size()))?;
    let (cls_batch, cls_priors, num_classes) = cls_pred
        .size3()
        .map_err(|_| format_err!("expect a 3-d class tensor, got {:?}", cls_pred.size()))?;
    ensure!(
        loc_batch > 0 && loc_priors > 0,
        "predictions must cover at least one image and one prior, got {:?}",
        loc_pred.size()
    );
    ensure!(
        num_coords == 4,
        "loc predictions must have 4 values per prior, got {}",
        num_coords
    );
    ensure!(
        loc_batch == cls_batch && loc_priors == cls_priors,
        "loc shape {:?} and class shape {:?} do not agree",
        loc_pred.size(),
        cls_pred.size()
    );
    ensure!(
        loc_batch == num_targets as i64,
        "batch size {} does not match the number of ground truth entries {}",
        loc_batch,
        num_targets
    );
    Ok((loc_batch, loc_priors, num_classes))
}

/// Keeps the first `num_priors` rows. Supplying more priors than predicted
/// anchors is fine; supplying fewer is an input error.
pub(super) fn truncate_priors(priors: &Tensor, num_priors: i64) -> Result<Tensor> {
    let (num_rows, num_coords) = priors
        .size2()
        .map_err(|_| format_err!("expect a [_, 4] prior tensor, got {:?}", priors.size()))?;
    ensure!(
        num_coords == 4,
        "priors must have 4 coordinates each, got {}",
        num_coords
    );
    ensure!(
        num_rows >= num_priors,
        "{} priors cannot cover {} predicted anchors",
        num_rows,
        num_priors
    );
    Ok(priors.narrow(0, 0, num_priors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_truth_validation() {
        let ok: Result<GroundTruth> = GroundTruthUnchecked {
            boxes: Tensor::of_slice(&[0.1f32, 0.1, 0.4, 0.4]).view([1, 4]),
            labels: Tensor::of_slice(&[3i64]),
        }
        .try_into();
        assert!(ok.is_ok());

        let empty: Result<GroundTruth> = GroundTruthUnchecked {
            boxes: Tensor::of_slice(&[] as &[f32]).view([0, 4]),
            labels: Tensor::of_slice(&[] as &[i64]),
        }
        .try_into();
        assert!(empty.is_ok());
        assert_eq!(empty.unwrap().num_objects(), 0);

        let non_finite: Result<GroundTruth> = GroundTruthUnchecked {
            boxes: Tensor::of_slice(&[0.1f32, f32::NAN, 0.4, 0.4]).view([1, 4]),
            labels: Tensor::of_slice(&[1i64]),
        }
        .try_into();
        assert!(non_finite.is_err());

        let background_label: Result<GroundTruth> = GroundTruthUnchecked {
            boxes: Tensor::of_slice(&[0.1f32, 0.1, 0.4, 0.4]).view([1, 4]),
            labels: Tensor::of_slice(&[0i64]),
        }
        .try_into();
        assert!(background_label.is_err());
    }

    #[test]
    fn prior_truncation() {
        let priors = Tensor::of_slice(&[0.5f32; 12]).view([3, 4]);
        assert_eq!(truncate_priors(&priors, 2).unwrap().size(), &[2, 4]);
        assert!(truncate_priors(&priors, 4).is_err());
    }
}
