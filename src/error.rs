//! Error types for pruning operations.
//!
//! Every failure is fatal and surfaced to the caller; no operation retries
//! or silently skips a pruning step. Variants carry enough context to
//! diagnose the failing artifact, slot, or shape without a debugger.

use std::fmt;
use std::path::PathBuf;

/// Pruning operation errors with detailed context.
#[derive(Debug)]
pub enum PruningError {
    /// Model artifact could not be loaded from the given path.
    Load {
        /// Path that failed to resolve to a loadable model
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// Model artifact exists but its contents are not a valid model.
    Format {
        /// Error description
        message: String,
    },

    /// Model artifact could not be persisted.
    ///
    /// The store writes to a fresh path, so a failed save leaves no
    /// partial artifact behind.
    Save {
        /// Destination path
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// Tensor shape mismatch between mask and model parameter.
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape found
        got: Vec<usize>,
    },

    /// Parameter slot index outside the model's parameter list.
    LayerOutOfBounds {
        /// Requested slot index
        index: usize,
        /// Number of parameter slots in the model
        count: usize,
    },

    /// Row-major position outside a parameter tensor.
    PositionOutOfBounds {
        /// Requested position
        position: usize,
        /// Element count of the addressed tensor
        len: usize,
    },

    /// Mask state disagrees with the model it was built from.
    InvalidMask {
        /// Reason for invalidity
        reason: String,
    },

    /// The training collaborator reported a failure.
    Training {
        /// Reason forwarded from the trainer
        reason: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),
}

impl fmt::Display for PruningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruningError::Load { path, reason } => {
                write!(f, "Failed to load model from '{}': {reason}", path.display())
            }
            PruningError::Format { message } => {
                write!(f, "Invalid model format: {message}")
            }
            PruningError::Save { path, reason } => {
                write!(f, "Failed to save model to '{}': {reason}", path.display())
            }
            PruningError::ShapeMismatch { expected, got } => {
                write!(f, "Shape mismatch: expected {expected:?}, got {got:?}")
            }
            PruningError::LayerOutOfBounds { index, count } => {
                write!(
                    f,
                    "Parameter slot {index} out of bounds for model with {count} slots"
                )
            }
            PruningError::PositionOutOfBounds { position, len } => {
                write!(
                    f,
                    "Position {position} out of bounds for tensor with {len} elements"
                )
            }
            PruningError::InvalidMask { reason } => {
                write!(f, "Invalid weight mask: {reason}")
            }
            PruningError::Training { reason } => {
                write!(f, "Training failed: {reason}")
            }
            PruningError::Io(err) => {
                write!(f, "I/O error: {err}")
            }
        }
    }
}

impl std::error::Error for PruningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PruningError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PruningError {
    fn from(err: std::io::Error) -> Self {
        PruningError::Io(err)
    }
}
