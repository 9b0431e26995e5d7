//! Categorical cross-entropy losses over the trailing class axis.
//!
//! Two variants share one scoring core: [`CategoricalCrossEntropyLoss`]
//! carries per-class weights and label smoothing, while
//! [`MaskedCrossEntropyLoss`] is the plain criterion behind the
//! validity-mask contract. Probabilities always come from Burn's
//! `log_softmax`, which subtracts the per-row maximum before
//! exponentiating; large logits therefore cannot overflow into `NaN`.

use burn::{
    module::{Content, DisplaySettings, Ignored, ModuleDisplay},
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::{
    ground_truth::{flatten_class_inputs, GroundTruth},
    reduction::Reduction,
};

/// Configuration to create a
/// [Categorical cross-entropy loss](CategoricalCrossEntropyLoss) using the
/// [init function](CategoricalCrossEntropyLossConfig::init).
#[derive(Config, Debug)]
pub struct CategoricalCrossEntropyLossConfig {
    /// Per-class rescaling weights.
    ///
    /// The loss of an element is multiplied by the weight of its target
    /// class; the mean divides by the summed weights of the targets.
    #[config(default = "None")]
    pub weights: Option<Vec<f32>>,

    /// Label smoothing factor in `[0, 1)`. Hard one-hot targets become
    /// `y*(1 - a) + a/num_classes`.
    #[config(default = "None")]
    pub smoothing: Option<f32>,

    /// Reduction applied to the per-element losses. Default: Mean
    #[config(default = "Reduction::Mean")]
    pub reduction: Reduction,
}

impl CategoricalCrossEntropyLossConfig {
    /// Initialize [Categorical cross-entropy loss](CategoricalCrossEntropyLoss).
    ///
    /// The weight vector is materialized on `device` here, once, so the
    /// training loop never races on lazy placement.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CategoricalCrossEntropyLoss<B> {
        self.assertions();
        CategoricalCrossEntropyLoss {
            weights: self
                .weights
                .as_ref()
                .map(|weights| Tensor::<B, 1>::from_floats(weights.as_slice(), device)),
            smoothing: self.smoothing,
            reduction: Ignored(self.reduction),
        }
    }

    fn assertions(&self) {
        if let Some(smoothing) = self.smoothing {
            assert!(
                (0.0..1.0).contains(&smoothing),
                "Label smoothing must be in [0, 1), got {smoothing}"
            );
        }
        if let Some(weights) = &self.weights {
            assert!(
                weights.iter().all(|weight| *weight > 0.0),
                "Class weights of cross-entropy must be positive"
            );
        }
    }
}

/// Cross-entropy over the trailing class axis, with optional per-class
/// weights and label smoothing.
///
/// The classification target carries one class index per leading-axis
/// element; it does not take a validity mask (use
/// [`MaskedCrossEntropyLoss`] for that).
#[derive(Module, Debug)]
#[module(custom_display)]
pub struct CategoricalCrossEntropyLoss<B: Backend> {
    /// Per-class rescaling weights, resolved onto the compute device at
    /// construction.
    pub weights: Option<Tensor<B, 1>>,
    /// Label smoothing factor.
    pub smoothing: Option<f32>,
    /// Reduction applied to the per-element losses.
    pub reduction: Ignored<Reduction>,
}

impl<B: Backend> ModuleDisplay for CategoricalCrossEntropyLoss<B> {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("weights", &self.weights)
            .add("smoothing", &self.smoothing)
            .optional()
    }
}

impl<B: Backend> CategoricalCrossEntropyLoss<B> {
    /// Create a new categorical cross-entropy loss with default configuration.
    pub fn new(device: &B::Device) -> Self {
        CategoricalCrossEntropyLossConfig::new().init(device)
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
        let (logits, targets) = flatten_class_inputs(logits, GroundTruth::Target(targets));
        self.assertions(&logits);

        let scored = self.score(logits, targets.clone());
        match (&self.weights, self.reduction.0) {
            (Some(weights), Reduction::Mean) => {
                scored.sum() / weights.clone().gather(0, targets).sum()
            }
            (_, reduction) => reduction.apply(scored),
        }
    }

    /// Weighted per-element losses, flattened.
    fn score(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [elements, num_classes] = logits.dims();
        let log_probs = log_softmax(logits, 1);

        match self.smoothing {
            Some(alpha) => {
                let smoothed =
                    Self::smoothed_targets([elements, num_classes], targets, alpha);
                let smoothed = match &self.weights {
                    Some(weights) => {
                        smoothed
                            * weights
                                .clone()
                                .reshape([1, num_classes])
                                .repeat_dim(0, elements)
                    }
                    None => smoothed,
                };
                (log_probs * smoothed).sum_dim(1).reshape([-1]).neg()
            }
            None => {
                let gathered = log_probs
                    .gather(1, targets.clone().reshape([-1, 1]))
                    .reshape([-1])
                    .neg();
                match &self.weights {
                    Some(weights) => gathered * weights.clone().gather(0, targets),
                    None => gathered,
                }
            }
        }
    }

    /// One-hot targets softened by the smoothing factor.
    fn smoothed_targets(
        shape: [usize; 2],
        targets: Tensor<B, 1, Int>,
        alpha: f32,
    ) -> Tensor<B, 2> {
        let [elements, num_classes] = shape;
        let device = targets.device();
        let one_hot = Tensor::<B, 2>::zeros(shape, &device).scatter(
            1,
            targets.reshape([elements, 1]),
            Tensor::ones([elements, 1], &device),
        );
        one_hot
            .mul_scalar(1.0 - alpha)
            .add_scalar(alpha / num_classes as f32)
    }

    fn assertions(&self, logits: &Tensor<B, 2>) {
        if let Some(weights) = &self.weights {
            assert_eq!(
                weights.dims()[0],
                logits.dims()[1],
                "Cross-entropy was configured with {} class weights but the logits provide {} classes",
                weights.dims()[0],
                logits.dims()[1]
            );
        }
    }
}

/// Configuration to create a [Masked cross-entropy loss](MaskedCrossEntropyLoss)
/// using the [init function](MaskedCrossEntropyLossConfig::init).
#[derive(Config, Debug)]
pub struct MaskedCrossEntropyLossConfig {
    /// Reduction applied to the per-element losses. Default: Mean
    #[config(default = "Reduction::Mean")]
    pub reduction: Reduction,
}

impl MaskedCrossEntropyLossConfig {
    /// Initialize [Masked cross-entropy loss](MaskedCrossEntropyLoss).
    pub fn init(&self) -> MaskedCrossEntropyLoss {
        MaskedCrossEntropyLoss {
            reduction: Ignored(self.reduction),
        }
    }
}

/// Cross-entropy restricted to mask-valid elements.
///
/// Valid leading-axis positions are selected before flattening to
/// `[valid_elements, num_classes]`, so a `Reduction::None` evaluation
/// returns exactly one value per valid element.
#[derive(Module, Debug, Clone)]
pub struct MaskedCrossEntropyLoss {
    /// Reduction applied to the per-element losses.
    pub reduction: Ignored<Reduction>,
}

impl Default for MaskedCrossEntropyLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskedCrossEntropyLoss {
    /// Create a new masked cross-entropy loss with default configuration.
    pub fn new() -> Self {
        MaskedCrossEntropyLossConfig::new().init()
    }

    /// Compute the criterion with the configured reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[...dims, num_classes]`
    /// - ground truth target: `[...dims]`, class indices
    /// - ground truth mask: `[...dims]`
    /// - output: `[1]`, or `[valid_elements]` for `Reduction::None`
    pub fn forward<B: Backend, const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, DG, Int>,
    ) -> Tensor<B, 1> {
        self.reduction
            .0
            .apply(self.forward_no_reduction(logits, ground_truth))
    }

    /// Compute the per-element criterion over the valid elements.
    pub fn forward_no_reduction<B: Backend, const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, DG, Int>,
    ) -> Tensor<B, 1> {
        let (logits, targets) = flatten_class_inputs(logits, ground_truth);
        log_softmax(logits, 1)
            .gather(1, targets.reshape([-1, 1]))
            .reshape([-1])
            .neg()
    }
}
