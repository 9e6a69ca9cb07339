//! Iterative magnitude pruning orchestration.
//!
//! [`PruningRun`] owns a loaded model and its weight mask, and drives the
//! prune/retrain cycle: find the smallest-magnitude surviving weight in a
//! parameter slot, zero it through the mask, retrain with the mask
//! re-applied after every epoch, repeat until no candidate is below the
//! threshold. Results are persisted to a fresh artifact next to the
//! source model; the original file is never overwritten.
//!
//! # References
//!
//! - Han, S., et al. (2015). Learning both weights and connections for
//!   efficient neural networks. `NeurIPS`.

use std::path::{Path, PathBuf};

use crate::error::PruningError;
use crate::mask::WeightMask;
use crate::model::Model;
use crate::store::ModelStore;
use crate::train::{DataSplit, MaskingHook, TrainConfig, Trainer};

/// Epochs of the final retraining pass after a pruning loop exits.
pub const FINAL_RETRAIN_EPOCHS: usize = 20;

/// Diagnostics from one pruning call.
#[derive(Debug, Clone)]
pub struct PruneReport {
    /// Positions pruned during this call
    pub pruned: usize,
    /// Nonzero mask entries across all slots after the call
    pub remaining: usize,
    /// Path of the persisted artifact
    pub artifact: PathBuf,
}

/// Orchestrates magnitude pruning of one model.
///
/// Single-owner, sequential: the model and mask are mutated in place and
/// one run drives one model at a time. The store and trainer are the
/// external collaborators for persistence and retraining.
pub struct PruningRun<S: ModelStore, T: Trainer> {
    model_path: PathBuf,
    model: Model,
    data: DataSplit,
    mask: WeightMask,
    store: S,
    trainer: T,
    config: TrainConfig,
    initial_weights: usize,
}

impl<S: ModelStore, T: Trainer> PruningRun<S, T> {
    /// Load the model at `path` and set up an all-ones mask for it.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::Load`] or [`PruningError::Format`] if the
    /// path does not resolve to a loadable model.
    pub fn new(
        path: impl Into<PathBuf>,
        data: DataSplit,
        store: S,
        trainer: T,
    ) -> Result<Self, PruningError> {
        let model_path = path.into();
        let model = store.load(&model_path)?;
        let mask = WeightMask::new(&model);
        let initial_weights = mask.remaining();

        Ok(Self {
            model_path,
            model,
            data,
            mask,
            store,
            trainer,
            config: TrainConfig::default(),
            initial_weights,
        })
    }

    /// Replace the retraining configuration.
    #[must_use]
    pub fn with_config(mut self, config: TrainConfig) -> Self {
        self.config = config;
        self
    }

    /// Iteratively prune one parameter slot, retraining after each step.
    ///
    /// Each iteration selects the smallest-magnitude surviving weight in
    /// slot `layer_index`; if its magnitude is below `threshold` the
    /// position is masked out and the trainer runs `epochs` epochs with
    /// the mask re-applied after every epoch. The loop stops when no
    /// candidate is below the threshold or the slot's element count is
    /// exhausted. A final retraining of [`FINAL_RETRAIN_EPOCHS`] epochs
    /// runs regardless of whether anything was pruned, then the model is
    /// persisted.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures; persistence failure is fatal.
    pub fn prune_layer(
        &mut self,
        layer_index: usize,
        threshold: f32,
        epochs: usize,
    ) -> Result<PruneReport, PruningError> {
        let max_weights = self.model.parameter(layer_index)?.numel();
        let mut pruned_values = 0;

        while let Some((position, magnitude)) = self.smallest_active_weight(layer_index)? {
            if !(magnitude < threshold && pruned_values < max_weights) {
                break;
            }

            self.mask.prune_parameter(layer_index, position)?;
            self.mask.apply(&mut self.model)?;
            self.retrain(epochs)?;
            pruned_values += 1;
        }

        self.retrain(FINAL_RETRAIN_EPOCHS)?;
        let artifact = self.save_pruned_model()?;

        Ok(PruneReport {
            pruned: pruned_values,
            remaining: self.mask.remaining(),
            artifact,
        })
    }

    /// Iteratively prune one parameter slot without retraining.
    ///
    /// Same candidate selection and acceptance as [`Self::prune_layer`];
    /// accepted steps only update the mask and re-apply it. The trainer's
    /// compile step still runs once after the loop, with no fit, before
    /// the model is persisted.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures; persistence failure is fatal.
    pub fn prune_layer_no_retraining(
        &mut self,
        layer_index: usize,
        threshold: f32,
    ) -> Result<PruneReport, PruningError> {
        let max_weights = self.model.parameter(layer_index)?.numel();
        let mut pruned_values = 0;

        while let Some((position, magnitude)) = self.smallest_active_weight(layer_index)? {
            if !(magnitude < threshold && pruned_values < max_weights) {
                break;
            }

            self.mask.prune_parameter(layer_index, position)?;
            self.mask.apply(&mut self.model)?;
            pruned_values += 1;
        }

        self.trainer.prepare(&self.config)?;
        let artifact = self.save_pruned_model()?;

        Ok(PruneReport {
            pruned: pruned_values,
            remaining: self.mask.remaining(),
            artifact,
        })
    }

    /// Derive pruning in a higher slot from a lower slot's dead output
    /// units, re-apply the mask, and persist immediately.
    ///
    /// # Errors
    ///
    /// Propagates mask and persistence failures.
    pub fn propagate_pruning(
        &mut self,
        lower_layer_index: usize,
        higher_layer_index: usize,
    ) -> Result<PathBuf, PruningError> {
        self.mask
            .propagate_pruning(lower_layer_index, higher_layer_index)?;
        self.mask.apply(&mut self.model)?;
        self.save_pruned_model()
    }

    /// Count of nonzero mask entries across all slots. Pure query.
    #[must_use]
    pub fn remaining_weights(&self) -> usize {
        self.mask.remaining()
    }

    /// Nonzero parameter count recorded at construction.
    #[must_use]
    pub fn initial_weights(&self) -> usize {
        self.initial_weights
    }

    /// Persist the in-memory model next to the source artifact.
    ///
    /// The destination name embeds the remaining-weight count:
    /// `Remaining_weights<N>_noretrain_<original_filename>`. The original
    /// file is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::Save`] on persistence failure; no retry.
    pub fn save_pruned_model(&self) -> Result<PathBuf, PruningError> {
        let out = artifact_path(&self.model_path, self.mask.remaining())?;
        self.store.save(&self.model, &out)?;
        Ok(out)
    }

    /// The current in-memory model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The current weight mask.
    #[must_use]
    pub fn mask(&self) -> &WeightMask {
        &self.mask
    }

    /// Smallest-magnitude nonzero entry of one parameter slot.
    ///
    /// Entries whose value is exactly 0 are excluded: pruned weights are
    /// held at 0 by the mask, so they never re-qualify. Ties resolve to
    /// the first position in row-major order.
    fn smallest_active_weight(
        &self,
        layer_index: usize,
    ) -> Result<Option<(usize, f32)>, PruningError> {
        let weights = self.model.parameter(layer_index)?;

        let mut best: Option<(usize, f32)> = None;
        for (position, &w) in weights.data().iter().enumerate() {
            let magnitude = w.abs();
            if magnitude == 0.0 {
                continue;
            }
            if best.map_or(true, |(_, current)| magnitude < current) {
                best = Some((position, magnitude));
            }
        }
        Ok(best)
    }

    fn retrain(&mut self, epochs: usize) -> Result<(), PruningError> {
        self.trainer.prepare(&self.config)?;
        let mut hook = MaskingHook::new(&self.mask);
        self.trainer
            .fit(&mut self.model, &self.data, &self.config, epochs, &mut hook)
    }
}

/// Derive the output artifact path from the source path and the
/// remaining-weight count.
fn artifact_path(model_path: &Path, remaining: usize) -> Result<PathBuf, PruningError> {
    let file_name = model_path.file_name().ok_or_else(|| PruningError::Save {
        path: model_path.to_path_buf(),
        reason: "model path has no file name".to_string(),
    })?;

    Ok(model_path.with_file_name(format!(
        "Remaining_weights{remaining}_noretrain_{}",
        file_name.to_string_lossy()
    )))
}
