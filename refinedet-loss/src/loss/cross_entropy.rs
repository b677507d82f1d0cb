use crate::common::*;

#[derive(Debug)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
}

impl CrossEntropyLoss {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    /// Computes cross entropy of `[num_samples, num_classes]` logits against
    /// sparse int64 targets of shape `[num_samples]`.
    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Tensor {
        let (num_samples, num_classes) = input.size2().unwrap();
        debug_assert!(
            target.kind() == Kind::Int64 && target.size1().unwrap() == num_samples,
            "expect target a [{}] int64 tensor",
            num_samples
        );
        debug_assert!(
            num_samples == 0
                || (bool::from(target.ge(0).all()) && bool::from(target.lt(num_classes).all())),
            "target values must be in range of [0, {})",
            num_classes
        );

        // return zero tensor if (1) input is empty and (2) using a scalar reduction
        if num_samples == 0 && self.reduction != Reduction::None {
            return Tensor::zeros(&[], (Kind::Float, input.device())).set_requires_grad(false);
        }

        let loss = -input
            .log_softmax(1, Kind::Float)
            .gather(1, &target.view([num_samples, 1]), false)
            .view([num_samples]);

        match self.reduction {
            Reduction::None => loss,
            Reduction::Sum => loss.sum(Kind::Float),
            Reduction::Mean => loss.mean(Kind::Float),
            Reduction::Other(_) => unimplemented!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summed_cross_entropy_matches_hand_computed_value() {
        let input = Tensor::of_slice(&[1.0f32, 0.0, 0.0, 2.0]).view([2, 2]);
        let target = Tensor::of_slice(&[0i64, 1]);

        let loss = CrossEntropyLoss::new(Reduction::Sum).forward(&input, &target);

        // per sample: log(sum(exp(scores))) - score[target]
        let expect = ((1f64.exp() + 1.0).ln() - 1.0) + ((1.0 + 2f64.exp()).ln() - 2.0);
        assert!(abs_diff_eq!(f64::from(&loss), expect, epsilon = 1e-5));
    }

    #[test]
    fn empty_input_gives_zero_sum() {
        let input = Tensor::zeros(&[0, 4], FLOAT_CPU);
        let target = Tensor::of_slice(&[] as &[i64]);

        let loss = CrossEntropyLoss::new(Reduction::Sum).forward(&input, &target);
        assert_eq!(f64::from(&loss), 0.0);
    }
}
