//! Masked loss functions for crop-type classification training.
//!
//! This crate is the loss subsystem of the cropmap trainer: satellite
//! image/time-series classifiers produce logits of shape
//! `[...dims, num_classes]`, ground truth arrives as class indices with an
//! optional validity mask (unlabeled pixels are excluded from the loss),
//! and a configuration-driven factory assembles the scoring rule the solver
//! asked for.
//!
//! ## Loss functions
//!
//! - **[`MaskedCrossEntropyLoss`]** / **[`CategoricalCrossEntropyLoss`]**:
//!   cross-entropy over the trailing class axis, the latter with per-class
//!   weights and label smoothing
//! - **[`FocalLoss`]** / **[`MaskedFocalLoss`]**: focal reweighting with
//!   optional per-class alpha factors
//! - **[`MaskedDiceLoss`]** and **[`FocalTverskyLoss`]**: region-overlap
//!   criteria for binary segmentation-style targets
//! - **[`MaskedBinaryCrossEntropyLoss`]** and
//!   **[`MaskedContrastiveLoss`]**: elementwise criteria on raw scores
//! - **[`CombinedLoss`]**: weighted sum of loss terms over identical inputs
//!
//! ## Ground truth contract
//!
//! Every masked loss takes a [`GroundTruth`]: a bare target, or a target
//! paired with a boolean validity mask of the same shape. Valid positions
//! are selected *before* flattening to `[valid_elements, num_classes]`, so
//! per-element results cover exactly the valid elements and means divide by
//! the valid-element count.
//!
//! ## Assembly and monitoring
//!
//! [`build_loss`] resolves a [`TrainingConfig`] into ready-to-call
//! functors: a single one, or an ordered list when the configuration names
//! several identifiers. [`per_class_loss`] breaks a batch's loss down per
//! class label for monitoring, reporting valid-element counts alongside.
//!
//! ```rust
//! use burn::backend::NdArray;
//! use cropmap_loss::{build_loss, ModelConfig, Reduction, SolverConfig, TrainingConfig};
//!
//! let config = TrainingConfig::new(
//!     ModelConfig::new(2),
//!     SolverConfig::new("masked_cross_entropy".into()),
//! );
//! let loss = build_loss::<NdArray>(&config, &Default::default(), Reduction::Mean)?;
//! # Ok::<(), cropmap_loss::LossError>(())
//! ```

mod binary_cross_entropy;
mod combined;
mod config;
mod contrastive;
mod cross_entropy;
mod dice;
mod error;
mod factory;
mod focal;
mod ground_truth;
mod per_class;
mod reduction;
mod tversky;

#[cfg(feature = "train")]
mod metric;

pub use binary_cross_entropy::{
    MaskedBinaryCrossEntropyLoss, MaskedBinaryCrossEntropyLossConfig,
};
pub use combined::CombinedLoss;
pub use config::{AlphaParam, LossFunctionSpec, ModelConfig, SolverConfig, TrainingConfig};
pub use contrastive::{MaskedContrastiveLoss, MaskedContrastiveLossConfig};
pub use cross_entropy::{
    CategoricalCrossEntropyLoss, CategoricalCrossEntropyLossConfig, MaskedCrossEntropyLoss,
    MaskedCrossEntropyLossConfig,
};
pub use dice::{MaskedDiceLoss, MaskedDiceLossConfig};
pub use error::{LossError, LossResult};
pub use factory::{build_loss, ConfiguredLoss, LossFunction, LossKind};
pub use focal::{FocalLoss, FocalLossConfig, MaskedFocalLoss, MaskedFocalLossConfig};
pub use ground_truth::GroundTruth;
pub use per_class::{per_class_loss, PerClassLoss};
pub use reduction::Reduction;
pub use tversky::{FocalTverskyLoss, FocalTverskyLossConfig};

#[cfg(feature = "train")]
pub use metric::PerClassLossMetric;

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray;
}
