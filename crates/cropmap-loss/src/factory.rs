//! Configuration-driven assembly of loss functions.
//!
//! Identifier strings resolve through [`LossKind`]'s `FromStr`, the single
//! registry of configurable losses, and [`build_loss`] turns the parsed
//! kinds into ready-to-call functors. Misconfiguration fails here, at
//! training setup, before any tensor is touched.

use std::str::FromStr;

use burn::prelude::*;

use crate::{
    binary_cross_entropy::{MaskedBinaryCrossEntropyLoss, MaskedBinaryCrossEntropyLossConfig},
    combined::CombinedLoss,
    config::{AlphaParam, LossFunctionSpec, SolverConfig, TrainingConfig},
    contrastive::{MaskedContrastiveLoss, MaskedContrastiveLossConfig},
    cross_entropy::{
        CategoricalCrossEntropyLoss, CategoricalCrossEntropyLossConfig, MaskedCrossEntropyLoss,
        MaskedCrossEntropyLossConfig,
    },
    dice::{MaskedDiceLoss, MaskedDiceLossConfig},
    error::{LossError, LossResult},
    focal::{FocalLoss, FocalLossConfig, MaskedFocalLoss, MaskedFocalLossConfig},
    ground_truth::GroundTruth,
    reduction::Reduction,
    tversky::{FocalTverskyLoss, FocalTverskyLossConfig},
};

/// The configurable loss kinds, one per accepted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    Contrastive,
    MaskedContrastive,
    BinaryCrossEntropy,
    MaskedBinaryCrossEntropy,
    CrossEntropy,
    WeightCrossEntropy,
    MaskedCrossEntropy,
    Focal,
    MaskedFocal,
    MaskedDice,
    Tversky,
    FocalTversky,
    CombinedDiceCe,
}

impl FromStr for LossKind {
    type Err = LossError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "contrastive_loss" => Ok(Self::Contrastive),
            "masked_contrastive_loss" => Ok(Self::MaskedContrastive),
            "binary_cross_entropy" => Ok(Self::BinaryCrossEntropy),
            "masked_binary_cross_entropy" => Ok(Self::MaskedBinaryCrossEntropy),
            "cross_entropy" => Ok(Self::CrossEntropy),
            "weight_cross_entropy" => Ok(Self::WeightCrossEntropy),
            "masked_cross_entropy" => Ok(Self::MaskedCrossEntropy),
            "focal_loss" => Ok(Self::Focal),
            "masked_focal_loss" => Ok(Self::MaskedFocal),
            "masked_dice_loss" => Ok(Self::MaskedDice),
            "tversky_loss" => Ok(Self::Tversky),
            "focal_tversky_loss" => Ok(Self::FocalTversky),
            "combined_dice_ce" => Ok(Self::CombinedDiceCe),
            _ => Err(LossError::UnknownLossFunction {
                name: name.to_owned(),
            }),
        }
    }
}

/// A configured loss functor.
///
/// Framework-style and hand-rolled masked losses share this one calling
/// surface, so composition and the training driver never distinguish them.
/// Classification losses score through [`forward`](Self::forward);
/// the contrastive and binary cross-entropy families score elementwise
/// targets through [`forward_elementwise`](Self::forward_elementwise).
#[derive(Debug, Clone)]
pub enum LossFunction<B: Backend> {
    MaskedContrastive(MaskedContrastiveLoss),
    MaskedBinaryCrossEntropy(MaskedBinaryCrossEntropyLoss),
    CategoricalCrossEntropy(CategoricalCrossEntropyLoss<B>),
    MaskedCrossEntropy(MaskedCrossEntropyLoss),
    Focal(FocalLoss<B>),
    MaskedFocal(MaskedFocalLoss<B>),
    MaskedDice(MaskedDiceLoss),
    FocalTversky(FocalTverskyLoss),
    Combined(CombinedLoss<B>),
}

impl<B: Backend> LossFunction<B> {
    /// Score classification logits of shape `[...dims, num_classes]` against
    /// class-index ground truth covering the leading axes.
    ///
    /// # Panics
    ///
    /// Panics when called on an elementwise loss, or when ground truth
    /// carrying a validity mask reaches a loss without mask support.
    pub fn forward<const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, DG, Int>,
    ) -> Tensor<B, 1> {
        match self {
            Self::CategoricalCrossEntropy(loss) => {
                loss.forward(logits, unmasked(ground_truth, "cross_entropy"))
            }
            Self::MaskedCrossEntropy(loss) => loss.forward(logits, ground_truth),
            Self::Focal(loss) => loss.forward(logits, unmasked(ground_truth, "focal_loss")),
            Self::MaskedFocal(loss) => loss.forward(logits, ground_truth),
            Self::MaskedDice(loss) => loss.forward(logits, ground_truth),
            Self::FocalTversky(loss) => {
                loss.forward(logits, unmasked(ground_truth, "focal_tversky_loss"))
            }
            Self::Combined(loss) => loss.forward(logits, ground_truth),
            Self::MaskedContrastive(_) | Self::MaskedBinaryCrossEntropy(_) => panic!(
                "{} scores elementwise targets; call forward_elementwise",
                self.name()
            ),
        }
    }

    /// Score raw logits against an elementwise `{0, 1}` target matching the
    /// full logits shape.
    ///
    /// # Panics
    ///
    /// Panics when called on a classification loss.
    pub fn forward_elementwise<const D: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, D>,
    ) -> Tensor<B, 1> {
        match self {
            Self::MaskedContrastive(loss) => loss.forward(logits, ground_truth),
            Self::MaskedBinaryCrossEntropy(loss) => loss.forward(logits, ground_truth),
            _ => panic!(
                "{} scores class-index targets; call forward",
                self.name()
            ),
        }
    }

    /// The identifier family this functor belongs to.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MaskedContrastive(_) => "masked_contrastive_loss",
            Self::MaskedBinaryCrossEntropy(_) => "masked_binary_cross_entropy",
            Self::CategoricalCrossEntropy(_) => "cross_entropy",
            Self::MaskedCrossEntropy(_) => "masked_cross_entropy",
            Self::Focal(_) => "focal_loss",
            Self::MaskedFocal(_) => "masked_focal_loss",
            Self::MaskedDice(_) => "masked_dice_loss",
            Self::FocalTversky(_) => "focal_tversky_loss",
            Self::Combined(_) => "combined_dice_ce",
        }
    }
}

/// Unwrap ground truth for a loss without mask support.
fn unmasked<B: Backend, const DG: usize>(
    ground_truth: GroundTruth<B, DG, Int>,
    name: &str,
) -> Tensor<B, DG, Int> {
    match ground_truth {
        GroundTruth::Target(target) => target,
        GroundTruth::TargetAndMask(..) => {
            panic!("{name} does not accept a validity mask; use its masked counterpart")
        }
    }
}

/// The factory's product: a single loss functor, or one functor per
/// identifier when the configuration lists several (used when a caller wants
/// independently logged per-loss terms rather than a pre-combined scalar).
#[derive(Debug, Clone)]
pub enum ConfiguredLoss<B: Backend> {
    Single(LossFunction<B>),
    Terms(Vec<LossFunction<B>>),
}

/// Assemble the loss function(s) described by the configuration.
///
/// Parameter defaults are resolved per loss type; unknown identifiers,
/// missing required parameters and per-class vectors that do not match
/// `MODEL.num_classes` all fail here.
pub fn build_loss<B: Backend>(
    config: &TrainingConfig,
    device: &B::Device,
    reduction: Reduction,
) -> LossResult<ConfiguredLoss<B>> {
    match &config.solver.loss_function {
        LossFunctionSpec::Single(name) => Ok(ConfiguredLoss::Single(build_single(
            name.parse()?,
            config,
            device,
            reduction,
        )?)),
        LossFunctionSpec::Multiple(names) => {
            let kinds = names
                .iter()
                .map(|name| name.parse())
                .collect::<LossResult<Vec<LossKind>>>()?;
            kinds
                .into_iter()
                .map(|kind| build_single(kind, config, device, reduction))
                .collect::<LossResult<Vec<_>>>()
                .map(ConfiguredLoss::Terms)
        }
    }
}

fn build_single<B: Backend>(
    kind: LossKind,
    config: &TrainingConfig,
    device: &B::Device,
    reduction: Reduction,
) -> LossResult<LossFunction<B>> {
    let solver = &config.solver;
    let num_classes = config.model.num_classes;

    Ok(match kind {
        LossKind::Contrastive | LossKind::MaskedContrastive => LossFunction::MaskedContrastive(
            MaskedContrastiveLossConfig::new()
                .with_pos_weight(solver.pos_weight.unwrap_or(1.0))
                .with_reduction(reduction)
                .init(),
        ),
        LossKind::BinaryCrossEntropy => LossFunction::MaskedBinaryCrossEntropy(
            MaskedBinaryCrossEntropyLossConfig::new()
                .with_reduction(reduction)
                .init(),
        ),
        LossKind::MaskedBinaryCrossEntropy => {
            let pos_weight =
                solver
                    .pos_weight
                    .ok_or(LossError::MissingRequiredParameter {
                        loss: "masked_binary_cross_entropy",
                        parameter: "pos_weight",
                    })?;
            LossFunction::MaskedBinaryCrossEntropy(
                MaskedBinaryCrossEntropyLossConfig::new()
                    .with_pos_weight(Some(pos_weight))
                    .with_reduction(reduction)
                    .init(),
            )
        }
        LossKind::CrossEntropy => {
            let weights = resolve_class_weights(num_classes, solver)?;
            LossFunction::CategoricalCrossEntropy(
                CategoricalCrossEntropyLossConfig::new()
                    .with_weights(Some(weights))
                    .with_reduction(reduction)
                    .init(device),
            )
        }
        LossKind::WeightCrossEntropy => LossFunction::CategoricalCrossEntropy(
            weighted_cross_entropy_config(solver)
                .with_reduction(reduction)
                .init(device),
        ),
        LossKind::MaskedCrossEntropy => LossFunction::MaskedCrossEntropy(
            MaskedCrossEntropyLossConfig::new()
                .with_reduction(reduction)
                .init(),
        ),
        LossKind::Focal | LossKind::MaskedFocal => {
            let gamma = solver.gamma.unwrap_or(1.0);
            let alpha = solver.alpha.as_ref().map(AlphaParam::resolve);
            if let Some(alpha) = &alpha {
                if alpha.len() != num_classes {
                    return Err(LossError::ClassCountMismatch {
                        expected: num_classes,
                        actual: alpha.len(),
                    });
                }
            }
            if kind == LossKind::Focal {
                LossFunction::Focal(
                    FocalLossConfig::new()
                        .with_gamma(gamma)
                        .with_alpha(alpha)
                        .with_reduction(reduction)
                        .init(device),
                )
            } else {
                LossFunction::MaskedFocal(
                    MaskedFocalLossConfig::new()
                        .with_gamma(gamma)
                        .with_alpha(alpha)
                        .with_reduction(reduction)
                        .init(device),
                )
            }
        }
        LossKind::MaskedDice => LossFunction::MaskedDice(
            MaskedDiceLossConfig::new()
                .with_label_smoothing(solver.label_smoothing.unwrap_or(0.0))
                .init(),
        ),
        LossKind::Tversky | LossKind::FocalTversky => {
            let alpha = match &solver.alpha {
                Some(alpha) => alpha.as_scalar().ok_or_else(|| LossError::ShapeMismatch {
                    expected: "a scalar alpha for the Tversky loss".to_owned(),
                    actual: "a per-class alpha vector".to_owned(),
                })?,
                None => 0.5,
            };
            let gamma = if kind == LossKind::Tversky {
                1.0
            } else {
                solver.gamma.unwrap_or(1.0)
            };
            LossFunction::FocalTversky(
                FocalTverskyLossConfig::new()
                    .with_smooth(solver.smooth.unwrap_or(1.0))
                    .with_alpha(alpha)
                    .with_beta(solver.beta.unwrap_or(0.5))
                    .with_gamma(gamma)
                    .init(),
            )
        }
        LossKind::CombinedDiceCe => {
            let weights = solver
                .loss_weights
                .clone()
                .unwrap_or_else(|| vec![0.5, 0.5]);
            if weights.len() != 2 {
                return Err(LossError::ShapeMismatch {
                    expected: "2 loss weights for combined_dice_ce".to_owned(),
                    actual: format!("{}", weights.len()),
                });
            }
            let dice = MaskedDiceLossConfig::new().init();
            let cross_entropy = weighted_cross_entropy_config(solver)
                .with_reduction(reduction)
                .init(device);
            LossFunction::Combined(CombinedLoss::new(vec![
                (weights[0], LossFunction::MaskedDice(dice)),
                (
                    weights[1],
                    LossFunction::CategoricalCrossEntropy(cross_entropy),
                ),
            ]))
        }
    })
}

/// Uniform class weights with the configured per-class overrides applied.
fn resolve_class_weights(num_classes: usize, solver: &SolverConfig) -> LossResult<Vec<f32>> {
    let mut weights = vec![1.0_f32; num_classes];
    for (&class, &weight) in &solver.class_weights {
        let slot = weights
            .get_mut(class)
            .ok_or(LossError::ClassCountMismatch {
                expected: num_classes,
                actual: class + 1,
            })?;
        *slot = weight as f32;
    }
    Ok(weights)
}

/// Cross-entropy configured from `pos_weight` and `label_smoothing`.
///
/// `pos_weight` turns into the normalized two-class weight pair
/// `[1/pos_weight, 1] / (1/pos_weight + 1)`.
fn weighted_cross_entropy_config(solver: &SolverConfig) -> CategoricalCrossEntropyLossConfig {
    let weights = solver.pos_weight.map(|pos_weight| {
        let weight_neg = 1.0 / pos_weight;
        let weight_pos = 1.0;
        let total = weight_neg + weight_pos;
        vec![(weight_neg / total) as f32, (weight_pos / total) as f32]
    });
    let smoothing = solver
        .label_smoothing
        .filter(|smoothing| *smoothing > 0.0)
        .map(|smoothing| smoothing as f32);
    CategoricalCrossEntropyLossConfig::new()
        .with_weights(weights)
        .with_smoothing(smoothing)
}

#[cfg(test)]
mod tests {
    use burn::backend::ndarray::NdArrayDevice;
    use burn::tensor::TensorData;

    use super::*;
    use crate::config::ModelConfig;
    use crate::tests::TestBackend;

    fn config(loss_function: LossFunctionSpec) -> TrainingConfig {
        TrainingConfig::new(ModelConfig::new(2), SolverConfig::new(loss_function))
    }

    fn build(config: &TrainingConfig) -> LossResult<ConfiguredLoss<TestBackend>> {
        build_loss(config, &NdArrayDevice::default(), Reduction::Mean)
    }

    #[test]
    fn factory_rejects_unknown_identifier_before_touching_tensors() {
        let config = config("hinge_loss".into());

        match build(&config) {
            Err(LossError::UnknownLossFunction { name }) => assert_eq!(name, "hinge_loss"),
            other => panic!("Expected UnknownLossFunction, got {other:?}"),
        }
    }

    #[test]
    fn factory_builds_each_identifier() {
        for name in [
            "contrastive_loss",
            "masked_contrastive_loss",
            "binary_cross_entropy",
            "cross_entropy",
            "weight_cross_entropy",
            "masked_cross_entropy",
            "focal_loss",
            "masked_focal_loss",
            "masked_dice_loss",
            "tversky_loss",
            "focal_tversky_loss",
            "combined_dice_ce",
        ] {
            let config = config(name.into());
            assert!(build(&config).is_ok(), "failed to build `{name}`");
        }
    }

    #[test]
    fn factory_identifier_list_builds_terms_in_order() {
        let config = config(vec!["focal_loss", "masked_dice_loss"].into());

        match build(&config).unwrap() {
            ConfiguredLoss::Terms(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(terms[0], LossFunction::Focal(_)));
                assert!(matches!(terms[1], LossFunction::MaskedDice(_)));
            }
            ConfiguredLoss::Single(_) => panic!("Expected a term list"),
        }
    }

    #[test]
    fn factory_terms_are_independently_invocable() {
        let device = NdArrayDevice::default();
        let config = config(vec!["masked_cross_entropy", "masked_dice_loss"].into());

        let ConfiguredLoss::Terms(terms) = build(&config).unwrap() else {
            panic!("Expected a term list");
        };

        let logits = Tensor::<TestBackend, 2>::zeros([4, 2], &device);
        let targets = Tensor::<TestBackend, 1, Int>::ones([4], &device);
        for term in &terms {
            let value = term
                .forward(logits.clone(), GroundTruth::Target(targets.clone()))
                .into_scalar();
            assert!(value.is_finite());
        }
    }

    #[test]
    fn factory_masked_bce_requires_pos_weight() {
        let config = config("masked_binary_cross_entropy".into());

        match build(&config) {
            Err(LossError::MissingRequiredParameter { loss, parameter }) => {
                assert_eq!(loss, "masked_binary_cross_entropy");
                assert_eq!(parameter, "pos_weight");
            }
            other => panic!("Expected MissingRequiredParameter, got {other:?}"),
        }
    }

    #[test]
    fn factory_masked_bce_accepts_supplied_pos_weight() {
        let mut config = config("masked_binary_cross_entropy".into());
        config.solver.pos_weight = Some(2.0);

        match build(&config).unwrap() {
            ConfiguredLoss::Single(LossFunction::MaskedBinaryCrossEntropy(loss)) => {
                assert_eq!(loss.pos_weight, Some(2.0));
            }
            other => panic!("Expected a masked BCE functor, got {other:?}"),
        }
    }

    #[test]
    fn factory_rejects_alpha_vector_of_wrong_length() {
        let mut config = config("focal_loss".into());
        config.solver.alpha = Some(AlphaParam::PerClass(vec![0.2, 0.3, 0.5]));

        match build(&config) {
            Err(LossError::ClassCountMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected ClassCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn factory_rejects_class_weight_override_out_of_range() {
        let mut config = config("cross_entropy".into());
        config.solver.class_weights.insert(5, 2.0);

        match build(&config) {
            Err(LossError::ClassCountMismatch { expected, .. }) => assert_eq!(expected, 2),
            other => panic!("Expected ClassCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn factory_cross_entropy_applies_class_weight_overrides() {
        let mut config = config("cross_entropy".into());
        config.solver.class_weights.insert(1, 4.0);

        match build(&config).unwrap() {
            ConfiguredLoss::Single(LossFunction::CategoricalCrossEntropy(loss)) => {
                let weights = loss
                    .weights
                    .unwrap()
                    .into_data()
                    .to_vec::<f32>()
                    .unwrap();
                assert_eq!(weights, vec![1.0, 4.0]);
            }
            other => panic!("Expected a cross-entropy functor, got {other:?}"),
        }
    }

    #[test]
    fn factory_weight_cross_entropy_normalizes_pos_weight_pair() {
        let mut config = config("weight_cross_entropy".into());
        config.solver.pos_weight = Some(4.0);

        match build(&config).unwrap() {
            ConfiguredLoss::Single(LossFunction::CategoricalCrossEntropy(loss)) => {
                let weights = loss
                    .weights
                    .unwrap()
                    .into_data()
                    .to_vec::<f32>()
                    .unwrap();
                // [1/4, 1] normalized to sum 1.
                assert!((weights[0] - 0.2).abs() < 1e-6);
                assert!((weights[1] - 0.8).abs() < 1e-6);
            }
            other => panic!("Expected a cross-entropy functor, got {other:?}"),
        }
    }

    #[test]
    fn factory_tversky_fixes_gamma_to_one() {
        let mut config = config("tversky_loss".into());
        config.solver.gamma = Some(3.0);

        match build(&config).unwrap() {
            ConfiguredLoss::Single(LossFunction::FocalTversky(loss)) => {
                assert_eq!(loss.gamma, 1.0);
            }
            other => panic!("Expected a Tversky functor, got {other:?}"),
        }
    }

    #[test]
    fn factory_focal_tversky_keeps_configured_gamma() {
        let mut config = config("focal_tversky_loss".into());
        config.solver.gamma = Some(3.0);

        match build(&config).unwrap() {
            ConfiguredLoss::Single(LossFunction::FocalTversky(loss)) => {
                assert_eq!(loss.gamma, 3.0);
            }
            other => panic!("Expected a focal Tversky functor, got {other:?}"),
        }
    }

    #[test]
    fn factory_combined_dice_ce_defaults_to_equal_weights() {
        let config = config("combined_dice_ce".into());

        match build(&config).unwrap() {
            ConfiguredLoss::Single(LossFunction::Combined(loss)) => {
                let terms = loss.terms();
                assert_eq!(terms.len(), 2);
                assert_eq!(terms[0].0, 0.5);
                assert_eq!(terms[1].0, 0.5);
                assert!(matches!(terms[0].1, LossFunction::MaskedDice(_)));
                assert!(matches!(
                    terms[1].1,
                    LossFunction::CategoricalCrossEntropy(_)
                ));
            }
            other => panic!("Expected a combined functor, got {other:?}"),
        }
    }

    #[test]
    fn factory_combined_dice_ce_rejects_wrong_weight_count() {
        let mut config = config("combined_dice_ce".into());
        config.solver.loss_weights = Some(vec![0.2, 0.3, 0.5]);

        match build(&config) {
            Err(LossError::ShapeMismatch { .. }) => {}
            other => panic!("Expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    #[should_panic = "does not accept a validity mask"]
    fn unmasked_loss_rejects_masked_ground_truth() {
        let device = NdArrayDevice::default();
        let config = config("focal_loss".into());
        let ConfiguredLoss::Single(loss) = build(&config).unwrap() else {
            panic!("Expected a single functor");
        };

        let logits = Tensor::<TestBackend, 2>::zeros([2, 2], &device);
        let targets = Tensor::<TestBackend, 1, Int>::ones([2], &device);
        let mask = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::from([1, 0]),
            &device,
        )
        .bool();

        let _ = loss.forward(logits, GroundTruth::masked(targets, mask));
    }

    #[test]
    #[should_panic = "call forward_elementwise"]
    fn elementwise_loss_rejects_class_entry_point() {
        let device = NdArrayDevice::default();
        let config = config("contrastive_loss".into());
        let ConfiguredLoss::Single(loss) = build(&config).unwrap() else {
            panic!("Expected a single functor");
        };

        let logits = Tensor::<TestBackend, 2>::zeros([2, 2], &device);
        let targets = Tensor::<TestBackend, 1, Int>::ones([2], &device);

        let _ = loss.forward(logits, GroundTruth::Target(targets));
    }
}
