use super::{ArmLossInit, OdmLossInit};
use crate::common::*;

/// The loss function configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The number of object classes, background included.
    pub num_classes: i64,
    /// The minimum IoU for a prior to take a ground truth's label.
    pub overlap_thresh: R64,
    /// The maximum ratio of mined negatives to positives.
    pub neg_pos_ratio: i64,
    /// The minimum first-stage foreground probability for a prior to enter
    /// the second-stage matching.
    pub objectness_thresh: R64,
    /// Coordinate variances of the first-stage box encoding.
    pub arm_variances: [R64; 2],
    /// Coordinate variances of the second-stage box encoding.
    pub odm_variances: [R64; 2],
}

impl Config {
    pub fn arm_loss_init(&self) -> ArmLossInit {
        let Self {
            overlap_thresh,
            neg_pos_ratio,
            arm_variances,
            ..
        } = *self;

        ArmLossInit {
            overlap_thresh: overlap_thresh.raw(),
            neg_pos_ratio,
            variances: [arm_variances[0].raw(), arm_variances[1].raw()],
        }
    }

    pub fn odm_loss_init(&self) -> OdmLossInit {
        let Self {
            num_classes,
            overlap_thresh,
            neg_pos_ratio,
            objectness_thresh,
            arm_variances,
            odm_variances,
        } = *self;

        OdmLossInit {
            num_classes,
            overlap_thresh: overlap_thresh.raw(),
            neg_pos_ratio,
            objectness_thresh: objectness_thresh.raw(),
            arm_variances: [arm_variances[0].raw(), arm_variances[1].raw()],
            variances: [odm_variances[0].raw(), odm_variances[1].raw()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_and_builds() -> Result<()> {
        let config: Config = serde_json::from_str(
            r#"{
                "num_classes": 21,
                "overlap_thresh": 0.5,
                "neg_pos_ratio": 3,
                "objectness_thresh": 0.01,
                "arm_variances": [0.1, 0.2],
                "odm_variances": [0.1, 0.2]
            }"#,
        )?;

        let arm_init = config.arm_loss_init();
        assert_eq!(arm_init.neg_pos_ratio, 3);
        assert!(abs_diff_eq!(arm_init.overlap_thresh, 0.5));
        arm_init.build()?;

        let odm_init = config.odm_loss_init();
        assert_eq!(odm_init.num_classes, 21);
        assert!(abs_diff_eq!(odm_init.objectness_thresh, 0.01));
        odm_init.build()?;
        Ok(())
    }
}
