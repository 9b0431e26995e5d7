//! Binary cross-entropy with logits, with optional positive-class weighting
//! and validity masking.

use burn::{
    module::{Content, DisplaySettings, Ignored, ModuleDisplay},
    prelude::*,
};

use crate::{
    ground_truth::{flatten_elementwise_inputs, GroundTruth},
    reduction::Reduction,
};

/// Configuration to create a
/// [Masked binary cross-entropy loss](MaskedBinaryCrossEntropyLoss) using the
/// [init function](MaskedBinaryCrossEntropyLossConfig::init).
#[derive(Config, Debug)]
pub struct MaskedBinaryCrossEntropyLossConfig {
    /// Multiplier on the positive-class term of the criterion. Default: None
    #[config(default = "None")]
    pub pos_weight: Option<f64>,

    /// Reduction applied to the per-element losses. Default: Mean
    #[config(default = "Reduction::Mean")]
    pub reduction: Reduction,
}

impl MaskedBinaryCrossEntropyLossConfig {
    /// Initialize [Masked binary cross-entropy loss](MaskedBinaryCrossEntropyLoss).
    pub fn init(&self) -> MaskedBinaryCrossEntropyLoss {
        self.assertions();
        MaskedBinaryCrossEntropyLoss {
            pos_weight: self.pos_weight,
            reduction: Ignored(self.reduction),
        }
    }

    fn assertions(&self) {
        if let Some(pos_weight) = self.pos_weight {
            assert!(
                pos_weight > 0.0,
                "Positive-class weight of binary cross-entropy must be positive, got {pos_weight}"
            );
        }
    }
}

/// Sigmoid cross-entropy on logits.
///
/// Uses the numerically stable formulation
/// `max(x, 0) - x*y + log(1 + exp(-|x|))`; when `pos_weight` is set, the
/// positive term is rescaled by it. A validity mask selects elements before
/// scoring (mask, logits and target are indexed identically), so the mean
/// divides by the number of valid elements.
#[derive(Module, Debug, Clone)]
#[module(custom_display)]
pub struct MaskedBinaryCrossEntropyLoss {
    /// Multiplier on the positive-class term.
    pub pos_weight: Option<f64>,
    /// Reduction applied to the per-element losses.
    pub reduction: Ignored<Reduction>,
}

impl Default for MaskedBinaryCrossEntropyLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for MaskedBinaryCrossEntropyLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("pos_weight", &self.pos_weight).optional()
    }
}

impl MaskedBinaryCrossEntropyLoss {
    /// Create a new masked binary cross-entropy loss with default configuration.
    pub fn new() -> Self {
        MaskedBinaryCrossEntropyLossConfig::new().init()
    }

    /// Compute the criterion with the configured reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[...dims]`, raw scores of any rank
    /// - ground truth target: `[...dims]`, values in `{0, 1}`
    /// - output: `[1]`, or `[valid_elements]` for `Reduction::None`
    pub fn forward<B: Backend, const D: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, D>,
    ) -> Tensor<B, 1> {
        self.reduction
            .0
            .apply(self.forward_no_reduction(logits, ground_truth))
    }

    /// Compute the per-element criterion over the valid elements.
    pub fn forward_no_reduction<B: Backend, const D: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, D>,
    ) -> Tensor<B, 1> {
        let (logits, target) = flatten_elementwise_inputs(logits, ground_truth);

        // softplus(-x) = max(-x, 0) + log(1 + exp(-|x|))
        let softplus_neg = logits.clone().neg().clamp_min(0.0)
            + logits.clone().abs().neg().exp().add_scalar(1.0).log();
        let linear = target.clone().neg().add_scalar(1.0) * logits;

        match self.pos_weight {
            Some(pos_weight) => {
                // -pos_weight*y*log(s(x)) - (1-y)*log(1-s(x))
                let scale = target.mul_scalar(pos_weight - 1.0).add_scalar(1.0);
                linear + scale * softplus_neg
            }
            None => linear + softplus_neg,
        }
    }
}
