//! Structured training configuration consumed by the loss factory.
//!
//! Every tunable carries a default through `#[config(default = ...)]`, so a
//! configuration only has to name the loss function(s) it wants; the factory
//! resolves the rest per loss type.

use std::collections::HashMap;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Top-level training configuration. The model section fixes the class
/// count; the solver section describes the loss assembly.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Model-side settings the loss subsystem depends on.
    pub model: ModelConfig,
    /// Loss-related solver settings.
    pub solver: SolverConfig,
}

/// Model-side settings the loss subsystem depends on.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Number of target classes. Must equal the trailing dimension of the
    /// logits the model produces.
    pub num_classes: usize,
}

/// Loss-related solver settings.
#[derive(Config, Debug)]
pub struct SolverConfig {
    /// One loss identifier, or an ordered list of identifiers when the
    /// driver wants independently logged per-loss terms.
    pub loss_function: LossFunctionSpec,

    /// Positive-class weight for the contrastive, binary cross-entropy and
    /// weighted cross-entropy families.
    #[config(default = "None")]
    pub pos_weight: Option<f64>,

    /// Per-class weight overrides for `cross_entropy`, keyed by class index.
    #[config(default = "HashMap::new()")]
    pub class_weights: HashMap<usize, f64>,

    /// Label smoothing factor for the cross-entropy and Dice losses.
    #[config(default = "None")]
    pub label_smoothing: Option<f64>,

    /// Focusing exponent for the focal and focal-Tversky losses.
    #[config(default = "None")]
    pub gamma: Option<f64>,

    /// Class rebalancing factor(s) for the focal loss, or the
    /// false-positive weight of the Tversky loss.
    #[config(default = "None")]
    pub alpha: Option<AlphaParam>,

    /// Smoothing term of the Tversky ratio.
    #[config(default = "None")]
    pub smooth: Option<f64>,

    /// False-negative weight of the Tversky loss.
    #[config(default = "None")]
    pub beta: Option<f64>,

    /// Weights of the terms built by `combined_dice_ce`.
    #[config(default = "None")]
    pub loss_weights: Option<Vec<f64>>,
}

/// The `loss_function` field: a single identifier or an ordered sequence of
/// identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LossFunctionSpec {
    /// Build one loss functor.
    Single(String),
    /// Build one functor per identifier, returned in order.
    Multiple(Vec<String>),
}

impl From<&str> for LossFunctionSpec {
    fn from(name: &str) -> Self {
        Self::Single(name.to_owned())
    }
}

impl From<Vec<&str>> for LossFunctionSpec {
    fn from(names: Vec<&str>) -> Self {
        Self::Multiple(names.into_iter().map(str::to_owned).collect())
    }
}

/// Focal-loss `alpha`: a scalar resolves to the two-class pair
/// `[alpha, 1 - alpha]`; a vector is taken as per-class factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlphaParam {
    Scalar(f64),
    PerClass(Vec<f64>),
}

impl AlphaParam {
    /// Resolve to a per-class factor vector.
    pub fn resolve(&self) -> Vec<f32> {
        match self {
            Self::Scalar(alpha) => vec![*alpha as f32, (1.0 - alpha) as f32],
            Self::PerClass(values) => values.iter().map(|&value| value as f32).collect(),
        }
    }

    /// The scalar form, when that is what was configured.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(alpha) => Some(*alpha),
            Self::PerClass(_) => None,
        }
    }
}
