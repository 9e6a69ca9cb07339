//! Training collaborator contracts.
//!
//! The pruning run does not implement training; it drives an external
//! trainer through the [`Trainer`] trait. What this module pins down is
//! the interaction the run depends on: the compile configuration (loss,
//! optimizer, thread caps) and the per-epoch hook that re-applies the
//! weight mask after every optimizer update, so pruned weights stay
//! pruned across retraining.

use crate::error::PruningError;
use crate::mask::WeightMask;
use crate::model::Model;
use crate::tensor::Tensor;

/// One input/target tensor pair.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Input features
    pub inputs: Tensor,
    /// Regression targets
    pub targets: Tensor,
}

impl Batch {
    /// Create a batch from inputs and targets.
    #[must_use]
    pub fn new(inputs: Tensor, targets: Tensor) -> Self {
        Self { inputs, targets }
    }
}

/// Train/validation data driving retraining between pruning steps.
#[derive(Debug, Clone)]
pub struct DataSplit {
    /// Data the trainer fits on
    pub train: Batch,
    /// Held-out data passed to the trainer for validation
    pub validation: Batch,
}

impl DataSplit {
    /// Create a split from train and validation batches.
    #[must_use]
    pub fn new(train: Batch, validation: Batch) -> Self {
        Self { train, validation }
    }
}

/// Loss function identifier handed to the trainer at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LossKind {
    /// Mean squared error
    #[default]
    MeanSquaredError,
}

/// Optimizer identifier handed to the trainer at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizerKind {
    /// Adaptive moment estimation (Kingma & Ba, 2015)
    #[default]
    Adam,
}

/// Thread caps for the trainer's numeric engine.
///
/// Pruning runs are kept reproducible and resource-bounded on shared
/// machines: one coordinating thread, one worker thread. Passed
/// explicitly per run instead of mutating process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadConfig {
    /// Threads coordinating independent operations
    pub inter_op: usize,
    /// Worker threads within one operation
    pub intra_op: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            inter_op: 1,
            intra_op: 1,
        }
    }
}

/// Compile configuration for a retraining phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainConfig {
    /// Loss function
    pub loss: LossKind,
    /// Optimizer
    pub optimizer: OptimizerKind,
    /// Numeric engine thread caps
    pub threads: ThreadConfig,
}

/// Strategy invoked by the trainer after each epoch's weight update.
pub trait EpochHook {
    /// Called once per epoch, after the optimizer step, with the updated
    /// model. Must leave the model in the state the next epoch starts from.
    ///
    /// # Errors
    ///
    /// Any error aborts the fit; the trainer must propagate it unchanged.
    fn on_epoch_end(&mut self, epoch: usize, model: &mut Model) -> Result<(), PruningError>;
}

/// Epoch hook that re-applies a weight mask.
///
/// Gradient updates move every weight, including pruned ones; re-applying
/// the mask after each epoch forces them back to exactly 0.
#[derive(Debug)]
pub struct MaskingHook<'a> {
    mask: &'a WeightMask,
}

impl<'a> MaskingHook<'a> {
    /// Create a hook re-applying the given mask.
    #[must_use]
    pub fn new(mask: &'a WeightMask) -> Self {
        Self { mask }
    }
}

impl EpochHook for MaskingHook<'_> {
    fn on_epoch_end(&mut self, _epoch: usize, model: &mut Model) -> Result<(), PruningError> {
        self.mask.apply(model)
    }
}

/// External training collaborator.
///
/// Implementations own the forward/backward machinery; this crate only
/// requires that `fit` runs the requested number of epochs and invokes
/// the hook after every epoch.
pub trait Trainer {
    /// Compile step: accept the loss/optimizer/thread configuration for
    /// subsequent fits. Must not modify any weights.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::Training`] if the configuration is not
    /// supported.
    fn prepare(&mut self, config: &TrainConfig) -> Result<(), PruningError>;

    /// Run `epochs` training epochs against the split, calling
    /// `hook.on_epoch_end` after each epoch's weight update.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::Training`] on trainer failure, or
    /// propagates hook errors unchanged.
    fn fit(
        &mut self,
        model: &mut Model,
        data: &DataSplit,
        config: &TrainConfig,
        epochs: usize,
        hook: &mut dyn EpochHook,
    ) -> Result<(), PruningError>;
}
