//! Podar: iterative magnitude-based weight pruning for dense networks.
//!
//! Podar takes a trained model, repeatedly zeroes the smallest-magnitude
//! weight below a threshold in a chosen parameter slot, optionally
//! retrains between steps to recover accuracy, and persists the pruned
//! model as a new artifact. Pruning is scalar and per-weight: a binary
//! mask mirrors the model's parameters and pins pruned positions to zero
//! through every retraining epoch.
//!
//! Model I/O and training run behind collaborator traits
//! ([`store::ModelStore`], [`train::Trainer`]); this crate owns the
//! pruning loop, the mask, and their interaction with retraining.
//!
//! # Quick Start
//!
//! ```ignore
//! use podar::prelude::*;
//!
//! let data = DataSplit::new(train_batch, validation_batch);
//! let mut run = PruningRun::new(
//!     "models/net.safetensors",
//!     data,
//!     SafeTensorsStore::new(),
//!     trainer,
//! )?;
//!
//! // Prune the first weight matrix: everything below 0.05, with 10
//! // recovery epochs after each removed weight.
//! let report = run.prune_layer(0, 0.05, 10)?;
//! println!("{} weights remain", report.remaining);
//! ```
//!
//! # Modules
//!
//! - [`tensor`]: Dense row-major F32 tensor
//! - [`model`]: Layer stack and its flat parameter list
//! - [`mask`]: Binary weight mask (prune, apply, propagate)
//! - [`train`]: Training collaborator contracts and the masking hook
//! - [`store`]: Model persistence (`SafeTensors` container)
//! - [`run`]: The pruning orchestrator
//! - [`error`]: Error taxonomy
//!
//! # References
//!
//! - Han, S., et al. (2015). Learning both weights and connections for
//!   efficient neural networks. `NeurIPS`.
//! - Frankle, J., & Carbin, M. (2018). The Lottery Ticket Hypothesis.

pub mod error;
pub mod mask;
pub mod model;
pub mod run;
pub mod store;
pub mod tensor;
pub mod train;

pub use error::PruningError;
pub use mask::WeightMask;
pub use model::{DenseLayer, Model};
pub use run::{PruneReport, PruningRun, FINAL_RETRAIN_EPOCHS};
pub use store::{ModelStore, SafeTensorsStore};
pub use tensor::Tensor;
pub use train::{
    Batch, DataSplit, EpochHook, LossKind, MaskingHook, OptimizerKind, ThreadConfig, TrainConfig,
    Trainer,
};

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::error::PruningError;
    pub use crate::mask::WeightMask;
    pub use crate::model::{DenseLayer, Model};
    pub use crate::run::{PruneReport, PruningRun};
    pub use crate::store::{ModelStore, SafeTensorsStore};
    pub use crate::tensor::Tensor;
    pub use crate::train::{Batch, DataSplit, EpochHook, MaskingHook, TrainConfig, Trainer};
}
