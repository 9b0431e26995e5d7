//! Dice loss for binary classification over a two-class softmax.

use burn::{
    module::{Content, DisplaySettings, ModuleDisplay},
    prelude::*,
    tensor::activation::softmax,
};

use crate::ground_truth::{flatten_class_inputs, GroundTruth};

/// Configuration to create a [Masked Dice loss](MaskedDiceLoss) using the
/// [init function](MaskedDiceLossConfig::init).
#[derive(Config, Debug)]
pub struct MaskedDiceLossConfig {
    /// Label smoothing factor in `[0, 1)`. Hard targets for the positive
    /// class become `1 - s`, the rest `s / (num_classes - 1)`. Default: 0.0
    #[config(default = 0.0)]
    pub label_smoothing: f64,
}

impl MaskedDiceLossConfig {
    /// Initialize [Masked Dice loss](MaskedDiceLoss).
    pub fn init(&self) -> MaskedDiceLoss {
        self.assertions();
        MaskedDiceLoss {
            label_smoothing: self.label_smoothing,
        }
    }

    fn assertions(&self) {
        assert!(
            (0.0..1.0).contains(&self.label_smoothing),
            "Label smoothing must be in [0, 1), got {}",
            self.label_smoothing
        );
    }
}

/// Dice loss over the positive class (class index 1) of a softmax.
///
/// `loss = 1 - 2*|P1 ∩ T1| / (|P1| + |T1|)` computed over every valid
/// element at once. The Dice coefficient is a statistic of the whole valid
/// set, so the result is always a single scalar and no reduction applies.
/// With zero valid elements the 0/0 ratio propagates `NaN`; the per-class
/// evaluator is the layer that coerces non-finite values.
#[derive(Module, Debug, Clone)]
#[module(custom_display)]
pub struct MaskedDiceLoss {
    /// Label smoothing factor.
    pub label_smoothing: f64,
}

impl Default for MaskedDiceLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for MaskedDiceLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("label_smoothing", &self.label_smoothing)
            .optional()
    }
}

impl MaskedDiceLoss {
    /// Create a new masked Dice loss with default configuration.
    pub fn new() -> Self {
        MaskedDiceLossConfig::new().init()
    }

    /// Compute the criterion over the valid elements.
    ///
    /// # Shapes
    ///
    /// - logits: `[...dims, num_classes]` with `num_classes >= 2`
    /// - ground truth target: `[...dims]`, class indices
    /// - ground truth mask: `[...dims]`
    /// - output: `[1]`
    pub fn forward<B: Backend, const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, DG, Int>,
    ) -> Tensor<B, 1> {
        let (logits, targets) = flatten_class_inputs(logits, ground_truth);
        let [_, num_classes] = logits.dims();
        assert!(
            num_classes >= 2,
            "Dice loss is a binary-classification criterion; the logits provide {num_classes} class(es)"
        );

        let probs_pos = softmax(logits, 1).narrow(1, 1, 1).reshape([-1]);
        let target_pos = targets.equal_elem(1).float();
        let target_pos = if self.label_smoothing > 0.0 {
            let high = 1.0 - self.label_smoothing;
            let low = self.label_smoothing / (num_classes as f64 - 1.0);
            target_pos.mul_scalar(high - low).add_scalar(low)
        } else {
            target_pos
        };

        let intersection = (probs_pos.clone() * target_pos.clone()).sum();
        let union = probs_pos.sum() + target_pos.sum();

        intersection.mul_scalar(2.0).div(union).neg().add_scalar(1.0)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::TensorData;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn dice_near_perfect_prediction_gives_near_zero_loss() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[-10.0, 10.0], [-10.0, 10.0], [-10.0, 10.0], [-10.0, 10.0]],
            &device,
        );
        let target = Tensor::<TestBackend, 1, Int>::ones([4], &device);

        let result = MaskedDiceLoss::new().forward(logits, GroundTruth::Target(target));

        assert!(result.into_scalar() < 1e-3);
    }

    #[test]
    fn dice_total_disagreement_gives_loss_one() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[-10.0, 10.0], [-10.0, 10.0]],
            &device,
        );
        let target = Tensor::<TestBackend, 1, Int>::zeros([2], &device);

        let result = MaskedDiceLoss::new().forward(logits, GroundTruth::Target(target));

        assert!((result.into_scalar() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn dice_uniform_probabilities_match_closed_form() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 2], &device);
        let target =
            Tensor::<TestBackend, 1, Int>::from_data(TensorData::from([1, 1]), &device);

        let result = MaskedDiceLoss::new().forward(logits, GroundTruth::Target(target));

        // p1 = [0.5, 0.5], t1 = [1, 1]: 1 - 2*1/(1+2) = 1/3
        assert!((result.into_scalar() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn dice_is_bounded_by_zero_and_one() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[0.3, -1.2], [2.0, 0.1], [-0.7, 0.9]],
            &device,
        );
        let target =
            Tensor::<TestBackend, 1, Int>::from_data(TensorData::from([1, 0, 1]), &device);

        let result = MaskedDiceLoss::new()
            .forward(logits, GroundTruth::Target(target))
            .into_scalar();

        assert!((0.0..=1.0).contains(&result));
    }

    #[test]
    fn dice_label_smoothing_softens_targets() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 2], &device);
        let target =
            Tensor::<TestBackend, 1, Int>::from_data(TensorData::from([1, 1]), &device);

        let result = MaskedDiceLossConfig::new()
            .with_label_smoothing(0.2)
            .init()
            .forward(logits, GroundTruth::Target(target));

        // t1 = [0.8, 0.8]: 1 - 2*0.8/(1 + 1.6) = 0.384615...
        assert!((result.into_scalar() - 0.384_615_4).abs() < 1e-6);
    }

    #[test]
    fn dice_mask_excludes_disagreeing_elements() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[-10.0, 10.0], [10.0, -10.0]],
            &device,
        );
        let target =
            Tensor::<TestBackend, 1, Int>::from_data(TensorData::from([1, 1]), &device);
        let mask = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::from([1, 0]),
            &device,
        )
        .bool();

        let masked = MaskedDiceLoss::new()
            .forward(logits.clone(), GroundTruth::masked(target.clone(), mask));
        let unmasked = MaskedDiceLoss::new().forward(logits, GroundTruth::Target(target));

        assert!(masked.into_scalar() < 1e-3);
        // Unmasked: intersection 1, union 3, loss 1/3.
        assert!(unmasked.into_scalar() > 0.3);
    }

    #[test]
    #[should_panic = "binary-classification criterion"]
    fn dice_rejects_single_class_logits() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 1], &device);
        let target = Tensor::<TestBackend, 1, Int>::zeros([2], &device);

        let _ = MaskedDiceLoss::new().forward(logits, GroundTruth::Target(target));
    }

    #[test]
    #[should_panic = "Label smoothing must be in [0, 1)"]
    fn dice_config_rejects_out_of_range_smoothing() {
        let _loss = MaskedDiceLossConfig::new().with_label_smoothing(1.0).init();
    }
}
