//! Weighted combination of independently configured loss terms.

use burn::prelude::*;

use crate::{factory::LossFunction, ground_truth::GroundTruth};

/// Weighted sum of an ordered list of loss terms evaluated against the same
/// inputs.
///
/// Every term sees the identical logits and ground truth; the weights need
/// not sum to 1. The terms hold no shared state.
#[derive(Debug, Clone)]
pub struct CombinedLoss<B: Backend> {
    terms: Vec<(f64, LossFunction<B>)>,
}

impl<B: Backend> CombinedLoss<B> {
    /// Create a combined loss from `(weight, loss)` pairs.
    ///
    /// # Panics
    ///
    /// Panics when no term is supplied.
    pub fn new(terms: Vec<(f64, LossFunction<B>)>) -> Self {
        assert!(
            !terms.is_empty(),
            "Combined loss requires at least one term"
        );
        Self { terms }
    }

    /// The ordered `(weight, loss)` pairs.
    pub fn terms(&self) -> &[(f64, LossFunction<B>)] {
        &self.terms
    }

    /// Compute the weighted sum of every term's criterion.
    ///
    /// # Shapes
    ///
    /// - logits: `[...dims, num_classes]`
    /// - ground truth target: `[...dims]`, class indices
    /// - output: `[1]` (or the terms' common per-element shape when they are
    ///   configured with `Reduction::None`)
    pub fn forward<const D: usize, const DG: usize>(
        &self,
        logits: Tensor<B, D>,
        ground_truth: GroundTruth<B, DG, Int>,
    ) -> Tensor<B, 1> {
        let mut total: Option<Tensor<B, 1>> = None;
        for (weight, term) in &self.terms {
            let loss = term
                .forward(logits.clone(), ground_truth.clone())
                .mul_scalar(*weight);
            total = Some(match total {
                Some(acc) => acc + loss,
                None => loss,
            });
        }
        total.unwrap_or_else(|| panic!("Combined loss requires at least one term"))
    }
}
