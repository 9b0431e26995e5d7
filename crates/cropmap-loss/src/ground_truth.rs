//! Polymorphic ground truth and the shared masking/flattening routines.
//!
//! Every masked loss consumes ground truth through this module, so the
//! normalization and the select-before-flatten masking logic exist exactly
//! once. Masking selects valid leading-axis positions *before* flattening to
//! `[valid_elements, num_classes]`; a per-element evaluation therefore
//! covers exactly the valid elements.

use burn::tensor::{backend::Backend, BasicOps, Bool, Float, Int, Tensor};

/// Ground truth for a loss evaluation: a target tensor, optionally paired
/// with a validity mask of the same shape.
///
/// Constructed at the call boundary by the training driver. `true` mask
/// entries participate in the loss; `false` entries are excluded entirely
/// (e.g. unknown-label pixels). A missing mask means every element is valid.
#[derive(Debug, Clone)]
pub enum GroundTruth<B: Backend, const D: usize, K = Float>
where
    K: BasicOps<B>,
{
    /// Every element of the target participates in the loss.
    Target(Tensor<B, D, K>),

    /// Only elements whose mask entry is `true` participate in the loss.
    TargetAndMask(Tensor<B, D, K>, Tensor<B, D, Bool>),
}

impl<B: Backend, const D: usize, K> GroundTruth<B, D, K>
where
    K: BasicOps<B>,
{
    /// Pair a target with a validity mask.
    ///
    /// # Panics
    ///
    /// Panics if the mask's shape differs from the target's; the two must
    /// index the same elements.
    pub fn masked(target: Tensor<B, D, K>, mask: Tensor<B, D, Bool>) -> Self {
        assert_eq!(
            target.dims(),
            mask.dims(),
            "Shape of validity mask ({:?}) must match target ({:?})",
            mask.dims(),
            target.dims()
        );
        Self::TargetAndMask(target, mask)
    }

    /// Normalize into the `(target, optional mask)` form every loss consumes.
    pub fn split(self) -> (Tensor<B, D, K>, Option<Tensor<B, D, Bool>>) {
        match self {
            Self::Target(target) => (target, None),
            Self::TargetAndMask(target, mask) => (target, Some(mask)),
        }
    }

    /// Whether a validity mask is attached.
    pub const fn has_mask(&self) -> bool {
        matches!(self, Self::TargetAndMask(..))
    }
}

impl<B: Backend, const D: usize, K> From<Tensor<B, D, K>> for GroundTruth<B, D, K>
where
    K: BasicOps<B>,
{
    fn from(target: Tensor<B, D, K>) -> Self {
        Self::Target(target)
    }
}

impl<B: Backend, const D: usize, K> From<(Tensor<B, D, K>, Tensor<B, D, Bool>)>
    for GroundTruth<B, D, K>
where
    K: BasicOps<B>,
{
    fn from((target, mask): (Tensor<B, D, K>, Tensor<B, D, Bool>)) -> Self {
        Self::masked(target, mask)
    }
}

/// Indices of the `true` entries of a flattened mask.
pub(crate) fn valid_indices<B: Backend>(mask: Tensor<B, 1, Bool>) -> Tensor<B, 1, Int> {
    mask.argwhere().squeeze::<1>(1)
}

/// Flatten logits to `[elements, num_classes]` and class-index targets to
/// `[elements]`, keeping only mask-valid positions.
///
/// The logits' trailing axis is the class axis; their leading axes must hold
/// exactly as many elements as the target.
pub(crate) fn flatten_class_inputs<B: Backend, const D: usize, const DG: usize>(
    logits: Tensor<B, D>,
    ground_truth: GroundTruth<B, DG, Int>,
) -> (Tensor<B, 2>, Tensor<B, 1, Int>) {
    let num_classes = logits.dims()[D - 1];
    let lead_elements = logits.shape().num_elements() / num_classes;
    let (target, mask) = ground_truth.split();
    assert_eq!(
        target.shape().num_elements(),
        lead_elements,
        "Ground truth covers {} elements but the logits' leading axes hold {} (class axis: {})",
        target.shape().num_elements(),
        lead_elements,
        num_classes
    );

    let logits = logits.reshape([-1, num_classes as i32]);
    let target = target.reshape([-1]);
    match mask {
        Some(mask) => {
            let indices = valid_indices(mask.reshape([-1]));
            (
                logits.select(0, indices.clone()),
                target.select(0, indices),
            )
        }
        None => (logits, target),
    }
}

/// Flatten logits and an elementwise target to `[elements]`, keeping only
/// mask-valid positions. Used by losses whose target matches the full logits
/// shape.
pub(crate) fn flatten_elementwise_inputs<B: Backend, const D: usize>(
    logits: Tensor<B, D>,
    ground_truth: GroundTruth<B, D>,
) -> (Tensor<B, 1>, Tensor<B, 1>) {
    let (target, mask) = ground_truth.split();
    assert_eq!(
        logits.dims(),
        target.dims(),
        "Shape of logits ({:?}) must match target ({:?})",
        logits.dims(),
        target.dims()
    );

    let logits = logits.reshape([-1]);
    let target = target.reshape([-1]);
    match mask {
        Some(mask) => {
            let indices = valid_indices(mask.reshape([-1]));
            (
                logits.select(0, indices.clone()),
                target.select(0, indices),
            )
        }
        None => (logits, target),
    }
}
