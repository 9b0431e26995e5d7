use std::str::FromStr;

use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::LossError;

/// The reduction applied to per-element losses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    /// The mean of the per-element losses will be returned.
    Mean,

    /// The sum of the per-element losses will be returned.
    Sum,

    /// The unreduced per-element losses will be returned.
    None,
}

impl Reduction {
    /// Apply the reduction to a flat tensor of per-element losses.
    pub(crate) fn apply<B: Backend>(self, loss: Tensor<B, 1>) -> Tensor<B, 1> {
        match self {
            Self::Mean => loss.mean(),
            Self::Sum => loss.sum(),
            Self::None => loss,
        }
    }
}

impl FromStr for Reduction {
    type Err = LossError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            "none" => Ok(Self::None),
            _ => Err(LossError::InvalidReductionMode {
                mode: value.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Tensor;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn reduction_parses_known_identifiers() {
        assert_eq!("mean".parse::<Reduction>().unwrap(), Reduction::Mean);
        assert_eq!("sum".parse::<Reduction>().unwrap(), Reduction::Sum);
        assert_eq!("none".parse::<Reduction>().unwrap(), Reduction::None);
    }

    #[test]
    fn reduction_rejects_unknown_identifier() {
        match "median".parse::<Reduction>() {
            Err(LossError::InvalidReductionMode { mode }) => assert_eq!(mode, "median"),
            other => panic!("Expected InvalidReductionMode, got {other:?}"),
        }
    }

    #[test]
    fn reduction_apply_matches_mode() {
        let device = Default::default();
        let loss = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0], &device);

        let mean = Reduction::Mean.apply(loss.clone());
        assert_eq!(mean.dims(), [1]);
        assert!((mean.into_scalar() - 2.0).abs() < 1e-6);

        let sum = Reduction::Sum.apply(loss.clone());
        assert!((sum.into_scalar() - 6.0).abs() < 1e-6);

        let none = Reduction::None.apply(loss);
        assert_eq!(none.dims(), [3]);
    }
}
