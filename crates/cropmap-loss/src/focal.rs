//! Focal loss with optional per-class alpha rebalancing.
//!
//! `loss = -(1 - pt)^gamma * log(pt)` where `pt` is the softmax probability
//! of the target class. `gamma = 0` recovers plain cross-entropy.

use burn::{
    module::{Content, DisplaySettings, Ignored, ModuleDisplay},
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::{
    ground_truth::{flatten_class_inputs, GroundTruth},
    reduction::Reduction,
};

/// Configuration to create a [Focal loss](FocalLoss) using the
/// [init function](FocalLossConfig::init).
#[derive(Config, Debug)]
pub struct FocalLossConfig {
    /// Focusing exponent applied to the modulating factor. Default: 1.0
    #[config(default = 1.0)]
    pub gamma: f64,

    /// Per-class rebalancing factors, one per class.
    #[config(default = "None")]
    pub alpha: Option<Vec<f32>>,

    /// Reduction applied to the per-element losses. Default: Mean
    #[config(default = "Reduction::Mean")]
    pub reduction: Reduction,
}

impl FocalLossConfig {
    /// Initialize [Focal loss](FocalLoss).
    ///
    /// The alpha vector is materialized on `device` here, once.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FocalLoss<B> {
        self.assertions();
        FocalLoss {
            gamma: self.gamma,
            alpha: self
                .alpha
                .as_ref()
                .map(|alpha| Tensor::<B, 1>::from_floats(alpha.as_slice(), device)),
            reduction: Ignored(self.reduction),
        }
    }

    fn assertions(&self) {
        assert!(
            self.gamma >= 0.0,
            "Gamma of the focal loss must be non-negative, got {}",
            self.gamma
        );
    }
}

/// Focal loss on class-index targets, without mask support.
#[derive(Module, Debug)]
#[module(custom_display)]
pub struct FocalLoss<B: Backend> {
    /// Focusing exponent applied to the modulating factor.
    pub gamma: f64,
    /// Per-class rebalancing factors, resolved onto the compute device at
    /// construction.
    pub alpha: Option<Tensor<B, 1>>,
    /// Reduction applied to the per-element losses.
    pub reduction: Ignored<Reduction>,
}

impl<B: Backend> ModuleDisplay for FocalLoss<B> {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("gamma", &self.gamma)
            .add("alpha", &self.alpha)
            .optional()
    }
}

impl<B: Backend> FocalLoss<B> {
    /// Create a new focal loss with default configuration.
    pub fn new(device: &B::Device) -> Self {
        FocalLossConfig::new().init(device)
    }

    /// Compute the criterion with the configured reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[...dims, num_classes]`
    /// - targets: `[...dims]`, class indices
    /// - output: `[1]`, or `[elements]` for `Reduction::None`
    pub fn forward<const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        targets: Tensor<B, DG, Int>,
    ) -> Tensor<B, 1> {
        self.reduction
            .0
            .apply(self.forward_no_reduction(logits, targets))
    }

    /// Compute the per-element criterion, flattened.
    pub fn forward_no_reduction<const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        targets: Tensor<B, DG, Int>,
    ) -> Tensor<B, 1> {
        let (logits, targets) = flatten_class_inputs(logits, GroundTruth::Target(targets));
        focal_score(logits, targets, self.gamma, self.alpha.as_ref())
    }
}

/// Configuration to create a [Masked focal loss](MaskedFocalLoss) using the
/// [init function](MaskedFocalLossConfig::init).
#[derive(Config, Debug)]
pub struct MaskedFocalLossConfig {
    /// Focusing exponent applied to the modulating factor. Default: 1.0
    #[config(default = 1.0)]
    pub gamma: f64,

    /// Per-class rebalancing factors, one per class.
    #[config(default = "None")]
    pub alpha: Option<Vec<f32>>,

    /// Reduction applied to the per-element losses. Default: Mean
    #[config(default = "Reduction::Mean")]
    pub reduction: Reduction,
}

impl MaskedFocalLossConfig {
    /// Initialize [Masked focal loss](MaskedFocalLoss).
    pub fn init<B: Backend>(&self, device: &B::Device) -> MaskedFocalLoss<B> {
        MaskedFocalLoss {
            inner: FocalLossConfig::new()
                .with_gamma(self.gamma)
                .with_alpha(self.alpha.clone())
                .with_reduction(self.reduction)
                .init(device),
        }
    }
}

/// Focal loss restricted to mask-valid elements.
///
/// Identical scoring rule to [`FocalLoss`]; valid positions are selected
/// before flattening, so the mean divides by the valid-element count.
#[derive(Module, Debug)]
pub struct MaskedFocalLoss<B: Backend> {
    /// The shared focal scoring rule and its parameters.
    pub inner: FocalLoss<B>,
}

impl<B: Backend> MaskedFocalLoss<B> {
    /// Create a new masked focal loss with default configuration.
    pub fn new(device: &B::Device) -> Self {
        MaskedFocalLossConfig::new().init(device)
    }

    /// Compute the criterion with the configured reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[...dims, num_classes]`
    /// - ground truth target: `[...dims]`, class indices
    /// - ground truth mask: `[...dims]`
    /// - output: `[1]`, or `[valid_elements]` for `Reduction::None`
    pub fn forward<const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, DG, Int>,
    ) -> Tensor<B, 1> {
        self.inner
            .reduction
            .0
            .apply(self.forward_no_reduction(logits, ground_truth))
    }

    /// Compute the per-element criterion over the valid elements.
    pub fn forward_no_reduction<const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, DG, Int>,
    ) -> Tensor<B, 1> {
        let (logits, targets) = flatten_class_inputs(logits, ground_truth);
        focal_score(logits, targets, self.inner.gamma, self.inner.alpha.as_ref())
    }
}

/// The focal scoring rule on flattened inputs.
fn focal_score<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    gamma: f64,
    alpha: Option<&Tensor<B, 1>>,
) -> Tensor<B, 1> {
    if let Some(alpha) = alpha {
        assert_eq!(
            alpha.dims()[0],
            logits.dims()[1],
            "Focal loss was configured with {} alpha factors but the logits provide {} classes",
            alpha.dims()[0],
            logits.dims()[1]
        );
    }

    let log_pt = log_softmax(logits, 1)
        .gather(1, targets.clone().reshape([-1, 1]))
        .reshape([-1]);
    let pt = log_pt.clone().exp();

    let log_pt = match alpha {
        Some(alpha) => log_pt * alpha.clone().gather(0, targets),
        None => log_pt,
    };

    pt.neg().add_scalar(1.0).powf_scalar(gamma) * log_pt.neg()
}
