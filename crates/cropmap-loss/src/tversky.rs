//! Focal Tversky loss for binary classification.
//!
//! The Tversky index generalizes Dice with independent weights on false
//! positives and false negatives; the focal exponent sharpens hard cases.
//! `gamma = 1` is the plain Tversky loss, `alpha = beta = 0.5` with
//! `smooth = 0` degenerates to Dice.

use burn::{
    module::{Content, DisplaySettings, ModuleDisplay},
    prelude::*,
    tensor::activation::softmax,
};

use crate::ground_truth::{flatten_class_inputs, GroundTruth};

/// Configuration to create a [Focal Tversky loss](FocalTverskyLoss) using the
/// [init function](FocalTverskyLossConfig::init).
#[derive(Config, Debug)]
pub struct FocalTverskyLossConfig {
    /// Smoothing term guarding the ratio against empty unions. Default: 1.0
    #[config(default = 1.0)]
    pub smooth: f64,

    /// Weight on false positives. Default: 0.5
    #[config(default = 0.5)]
    pub alpha: f64,

    /// Weight on false negatives. Default: 0.5
    #[config(default = 0.5)]
    pub beta: f64,

    /// Focusing exponent; 1.0 yields the plain Tversky loss. Default: 1.0
    #[config(default = 1.0)]
    pub gamma: f64,
}

impl FocalTverskyLossConfig {
    /// Initialize [Focal Tversky loss](FocalTverskyLoss).
    pub fn init(&self) -> FocalTverskyLoss {
        self.assertions();
        FocalTverskyLoss {
            smooth: self.smooth,
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
        }
    }

    fn assertions(&self) {
        assert!(
            self.smooth >= 0.0,
            "Smooth term of the Tversky loss must be non-negative, got {}",
            self.smooth
        );
        assert!(
            self.alpha >= 0.0 && self.beta >= 0.0,
            "Alpha and beta of the Tversky loss must be non-negative, got {} and {}",
            self.alpha,
            self.beta
        );
        assert!(
            self.gamma >= 0.0,
            "Gamma of the Tversky loss must be non-negative, got {}",
            self.gamma
        );
    }
}

/// Focal Tversky loss over the positive class of a two-class softmax.
///
/// `loss = (1 - (TP + s) / (TP + alpha*FP + beta*FN + s))^gamma`, computed
/// over the whole batch at once. Like Dice, the result is a single scalar
/// and no reduction applies.
#[derive(Module, Debug, Clone)]
#[module(custom_display)]
pub struct FocalTverskyLoss {
    /// Smoothing term guarding the ratio.
    pub smooth: f64,
    /// Weight on false positives.
    pub alpha: f64,
    /// Weight on false negatives.
    pub beta: f64,
    /// Focusing exponent.
    pub gamma: f64,
}

impl Default for FocalTverskyLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for FocalTverskyLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("smooth", &self.smooth)
            .add("alpha", &self.alpha)
            .add("beta", &self.beta)
            .add("gamma", &self.gamma)
            .optional()
    }
}

impl FocalTverskyLoss {
    /// Create a new focal Tversky loss with default configuration.
    pub fn new() -> Self {
        FocalTverskyLossConfig::new().init()
    }

    /// Compute the criterion.
    ///
    /// # Shapes
    ///
    /// - logits: `[...dims, num_classes]` with `num_classes >= 2`
    /// - targets: `[...dims]`, class indices in `{0, 1}`
    /// - output: `[1]`
    pub fn forward<B: Backend, const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        targets: Tensor<B, DG, Int>,
    ) -> Tensor<B, 1> {
        let (logits, targets) = flatten_class_inputs(logits, GroundTruth::Target(targets));
        let [_, num_classes] = logits.dims();
        assert!(
            num_classes >= 2,
            "Tversky loss is a binary-classification criterion; the logits provide {num_classes} class(es)"
        );

        let probs = softmax(logits, 1);
        let probs_pos = probs.clone().narrow(1, 1, 1).reshape([-1]);
        let probs_neg = probs.narrow(1, 0, 1).reshape([-1]);
        let targets = targets.float();

        let true_pos = (probs_pos.clone() * targets.clone()).sum();
        let false_pos = (targets.clone().neg().add_scalar(1.0) * probs_pos).sum();
        let false_neg = (targets * probs_neg).sum();

        let tversky = true_pos.clone().add_scalar(self.smooth)
            / (true_pos + false_pos.mul_scalar(self.alpha) + false_neg.mul_scalar(self.beta))
                .add_scalar(self.smooth);

        tversky.neg().add_scalar(1.0).powf_scalar(self.gamma)
    }
}
