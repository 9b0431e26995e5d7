//! Contrastive loss on raw prediction scores.

use burn::{
    module::{Content, DisplaySettings, Ignored, ModuleDisplay},
    prelude::*,
};

use crate::{ground_truth::GroundTruth, reduction::Reduction};

/// Configuration to create a [Masked contrastive loss](MaskedContrastiveLoss)
/// using the [init function](MaskedContrastiveLossConfig::init).
#[derive(Config, Debug)]
pub struct MaskedContrastiveLossConfig {
    /// Weight applied to the positive-class term. Default: 1.0
    #[config(default = 1.0)]
    pub pos_weight: f64,

    /// Reduction applied to the per-element losses. Default: Mean
    #[config(default = "Reduction::Mean")]
    pub reduction: Reduction,
}

impl MaskedContrastiveLossConfig {
    /// Initialize [Masked contrastive loss](MaskedContrastiveLoss).
    pub fn init(&self) -> MaskedContrastiveLoss {
        self.assertions();
        MaskedContrastiveLoss {
            pos_weight: self.pos_weight,
            reduction: Ignored(self.reduction),
        }
    }

    fn assertions(&self) {
        assert!(
            self.pos_weight > 0.0,
            "Positive-class weight of the contrastive loss must be positive, got {}",
            self.pos_weight
        );
    }
}

/// Contrastive scoring rule on raw (pre-activation) scores.
///
/// Computes `-pos_weight * y * x + (1 - y) * x` per element; no softmax or
/// sigmoid is applied. A validity mask zeroes excluded elements in place
/// before reduction. The mean therefore divides by the *total* element
/// count, masked elements included. This is the convention of the reference
/// training runs, pinned by tests rather than renormalized.
#[derive(Module, Debug, Clone)]
#[module(custom_display)]
pub struct MaskedContrastiveLoss {
    /// Weight applied to the positive-class term.
    pub pos_weight: f64,
    /// Reduction applied to the per-element losses.
    pub reduction: Ignored<Reduction>,
}

impl Default for MaskedContrastiveLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for MaskedContrastiveLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("pos_weight", &self.pos_weight).optional()
    }
}

impl MaskedContrastiveLoss {
    /// Create a new masked contrastive loss with default configuration.
    pub fn new() -> Self {
        MaskedContrastiveLossConfig::new().init()
    }

    /// Compute the criterion with the configured reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[...dims]`, raw scores of any rank
    /// - ground truth target: `[...dims]`, values in `{0, 1}`
    /// - output: `[1]`, or `[elements]` for `Reduction::None`
    pub fn forward<B: Backend, const D: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, D>,
    ) -> Tensor<B, 1> {
        self.reduction
            .0
            .apply(self.forward_no_reduction(logits, ground_truth))
    }

    /// Compute the flattened per-element criterion. Masked-out elements are
    /// zeroed but stay in place.
    pub fn forward_no_reduction<B: Backend, const D: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, D>,
    ) -> Tensor<B, 1> {
        let (target, mask) = ground_truth.split();
        assert_eq!(
            logits.dims(),
            target.dims(),
            "Shape of logits ({:?}) must match target ({:?})",
            logits.dims(),
            target.dims()
        );

        let positive = (target.clone() * logits.clone()).mul_scalar(-self.pos_weight);
        let negative = target.neg().add_scalar(1.0) * logits;
        let mut loss = positive + negative;
        if let Some(mask) = mask {
            loss = loss * mask.float();
        }
        loss.reshape([-1])
    }
}
