//! Per-class loss diagnostics for training monitoring.

use burn::{prelude::*, tensor::ElementConversion};

use crate::{
    error::{LossError, LossResult},
    factory::LossFunction,
    ground_truth::GroundTruth,
};

/// Per-class breakdown of a loss evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PerClassLoss {
    /// Loss value per class label. 0.0 where the batch holds no valid
    /// element of the class; check the matching count to tell "no data"
    /// from "zero loss".
    pub losses: Vec<f64>,
    /// Count of mask-valid elements contributing to each class entry.
    pub valid_counts: Vec<usize>,
}

/// Evaluate `criterion` separately on the elements of each class label.
///
/// Read-only introspection: the logits are detached up front, so no
/// gradient state is touched. For each class, the elements whose label
/// equals the class are selected together with their mask entries and
/// scored by the criterion; non-finite results (no valid elements in this
/// batch) are recorded as 0. Criteria configured with a per-element
/// reduction are averaged to a scalar per class.
///
/// The criterion must be a classification loss that accepts masked ground
/// truth (e.g. `masked_cross_entropy`).
pub fn per_class_loss<B: Backend, const D: usize, const DG: usize>(
    criterion: &LossFunction<B>,
    logits: Tensor<B, D>,
    labels: Tensor<B, DG, Int>,
    mask: Tensor<B, DG, Bool>,
    num_classes: usize,
) -> LossResult<PerClassLoss> {
    if labels.dims() != mask.dims() {
        return Err(LossError::ShapeMismatch {
            expected: format!("{:?}", labels.dims()),
            actual: format!("{:?}", mask.dims()),
        });
    }
    let class_axis = logits.dims()[D - 1];
    if class_axis != num_classes {
        return Err(LossError::ClassCountMismatch {
            expected: num_classes,
            actual: class_axis,
        });
    }
    let lead_elements = logits.shape().num_elements() / num_classes;
    if labels.shape().num_elements() != lead_elements {
        return Err(LossError::InvalidGroundTruthShape {
            reason: format!(
                "labels cover {} elements but the logits' leading axes hold {}",
                labels.shape().num_elements(),
                lead_elements
            ),
        });
    }

    let logits = logits.detach().reshape([-1, num_classes as i32]);
    let labels = labels.reshape([-1]);
    let mask = mask.reshape([-1]);

    let mut losses = Vec::with_capacity(num_classes);
    let mut valid_counts = Vec::with_capacity(num_classes);
    for class in 0..num_classes {
        let indices = labels
            .clone()
            .equal_elem(class as i64)
            .argwhere()
            .squeeze::<1>(1);
        if indices.dims()[0] == 0 {
            losses.push(0.0);
            valid_counts.push(0);
            continue;
        }

        let class_logits = logits.clone().select(0, indices.clone());
        let class_labels = labels.clone().select(0, indices.clone());
        let class_mask = mask.clone().int().select(0, indices).bool();

        let count = class_mask
            .clone()
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;
        if count == 0 {
            // No valid element of this class in the batch; an evaluation
            // would reduce over an empty selection.
            losses.push(0.0);
            valid_counts.push(0);
            continue;
        }

        let value = criterion
            .forward(class_logits, GroundTruth::masked(class_labels, class_mask))
            .mean()
            .into_scalar()
            .elem::<f64>();

        losses.push(if value.is_finite() { value } else { 0.0 });
        valid_counts.push(count);
    }

    Ok(PerClassLoss {
        losses,
        valid_counts,
    })
}

impl PerClassLoss {
    /// Total number of valid elements across all classes. Equals the number
    /// of `true` mask entries of the evaluated batch.
    pub fn total_valid(&self) -> usize {
        self.valid_counts.iter().sum()
    }

    /// Mean loss over the classes that had valid elements.
    pub fn macro_average(&self) -> f64 {
        let observed: Vec<f64> = self
            .losses
            .iter()
            .zip(&self.valid_counts)
            .filter(|(_, &count)| count > 0)
            .map(|(&loss, _)| loss)
            .collect();
        if observed.is_empty() {
            0.0
        } else {
            observed.iter().sum::<f64>() / observed.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::TensorData;

    use super::*;
    use crate::cross_entropy::MaskedCrossEntropyLossConfig;
    use crate::tests::TestBackend;

    fn criterion() -> LossFunction<TestBackend> {
        LossFunction::MaskedCrossEntropy(MaskedCrossEntropyLossConfig::new().init())
    }

    #[test]
    fn per_class_counts_partition_the_mask() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::zeros([2, 3, 2], &device);
        let labels = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::from([[0, 1, 1], [0, 0, 1]]),
            &device,
        );
        let mask = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::from([[1, 1, 0], [1, 0, 1]]),
            &device,
        )
        .bool();

        let report = per_class_loss(&criterion(), logits, labels, mask.clone(), 2).unwrap();

        let mask_total = mask.int().sum().into_scalar() as usize;
        assert_eq!(report.total_valid(), mask_total);
        assert_eq!(report.valid_counts, vec![2, 2]);
    }

    #[test]
    fn per_class_uniform_logits_give_log_two_per_observed_class() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([4, 2], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::from([0, 0, 1, 1]),
            &device,
        );
        let mask = Tensor::<TestBackend, 1, Int>::ones([4], &device).bool();

        let report = per_class_loss(&criterion(), logits, labels, mask, 2).unwrap();

        for loss in &report.losses {
            assert!((loss - core::f64::consts::LN_2).abs() < 1e-6);
        }
        assert!((report.macro_average() - core::f64::consts::LN_2).abs() < 1e-6);
    }

    #[test]
    fn per_class_absent_class_reports_zero_loss_and_zero_count() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([3, 3], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::from([0, 0, 2]),
            &device,
        );
        let mask = Tensor::<TestBackend, 1, Int>::ones([3], &device).bool();

        let report = per_class_loss(&criterion(), logits, labels, mask, 3).unwrap();

        assert_eq!(report.losses[1], 0.0);
        assert_eq!(report.valid_counts[1], 0);
        assert!(report.losses[0] > 0.0);
        assert!(report.losses[2] > 0.0);
    }

    #[test]
    fn per_class_fully_masked_class_reports_zero_not_nan() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::from([0, 1, 1]),
            &device,
        );
        // Every class-1 element is masked out.
        let mask = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::from([1, 0, 0]),
            &device,
        )
        .bool();

        let report = per_class_loss(&criterion(), logits, labels, mask, 2).unwrap();

        assert_eq!(report.losses[1], 0.0);
        assert_eq!(report.valid_counts[1], 0);
        assert_eq!(report.valid_counts[0], 1);
    }

    #[test]
    fn per_class_rejects_label_mask_shape_mismatch() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        let labels = Tensor::<TestBackend, 1, Int>::zeros([3], &device);
        let mask = Tensor::<TestBackend, 1, Int>::ones([2], &device).bool();

        match per_class_loss(&criterion(), logits, labels, mask, 2) {
            Err(LossError::ShapeMismatch { .. }) => {}
            other => panic!("Expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn per_class_rejects_wrong_class_count() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        let labels = Tensor::<TestBackend, 1, Int>::zeros([3], &device);
        let mask = Tensor::<TestBackend, 1, Int>::ones([3], &device).bool();

        match per_class_loss(&criterion(), logits, labels, mask, 4) {
            Err(LossError::ClassCountMismatch { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected ClassCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn per_class_rejects_misaligned_labels() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        let labels = Tensor::<TestBackend, 1, Int>::zeros([5], &device);
        let mask = Tensor::<TestBackend, 1, Int>::ones([5], &device).bool();

        match per_class_loss(&criterion(), logits, labels, mask, 2) {
            Err(LossError::InvalidGroundTruthShape { .. }) => {}
            other => panic!("Expected InvalidGroundTruthShape, got {other:?}"),
        }
    }
}
