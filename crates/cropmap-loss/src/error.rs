use thiserror::Error;

/// The error type for `cropmap-loss` operations.
///
/// Covers the failures surfaced while assembling loss functions from
/// configuration as well as the shape contracts validated when ground truth
/// and logits are brought together. Factory-level misconfiguration is
/// reported here at training setup time, before any forward pass.
#[derive(Error, Debug)]
pub enum LossError {
    /// Error for when a loss identifier does not name a known loss function.
    #[error("Unknown loss function: {name}")]
    UnknownLossFunction {
        /// The unrecognized identifier.
        name: String,
    },

    /// Error for when a loss type requires a parameter the configuration
    /// does not supply.
    #[error("Loss function `{loss}` requires the `{parameter}` parameter")]
    MissingRequiredParameter {
        /// The loss identifier that needs the parameter.
        loss: &'static str,
        /// The missing parameter name.
        parameter: &'static str,
    },

    /// Error for when a reduction identifier is not `mean`, `sum` or `none`.
    #[error("Invalid reduction mode: {mode}")]
    InvalidReductionMode {
        /// The unrecognized reduction identifier.
        mode: String,
    },

    /// Error for when a per-class parameter vector does not match the
    /// configured class count.
    #[error("Class count mismatch: expected {expected} classes, got {actual}")]
    ClassCountMismatch { expected: usize, actual: usize },

    /// Error for when two tensors or parameter lists that must agree in
    /// shape do not.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Error for when ground truth cannot be aligned with the logits'
    /// leading axes.
    #[error("Invalid ground truth shape: {reason}")]
    InvalidGroundTruthShape { reason: String },
}

/// A specialized `Result` type for `cropmap-loss` operations.
pub type LossResult<T> = Result<T, LossError>;
