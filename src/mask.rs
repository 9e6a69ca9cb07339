//! Binary weight mask mirroring a model's parameter tensors.
//!
//! One 0/1 tensor per parameter slot, shape-matched at construction.
//! Entries only ever transition 1 -> 0: pruning marks positions, it never
//! resurrects them. Applying the mask forces every marked weight in the
//! model to exactly 0, which is what keeps retraining from reviving
//! pruned connections.

use crate::error::PruningError;
use crate::model::Model;
use crate::tensor::Tensor;

/// Per-slot binary mask over a model's flat parameter list.
///
/// # Invariants
///
/// - Mask values are exactly 0.0 or 1.0
/// - Shapes match the model the mask was built from
/// - Entries never transition 0 -> 1
#[derive(Debug, Clone)]
pub struct WeightMask {
    masks: Vec<Tensor>,
}

impl WeightMask {
    /// Build an all-ones mask matching the model's parameter shapes.
    #[must_use]
    pub fn new(model: &Model) -> Self {
        let masks = model
            .parameters()
            .iter()
            .map(|p| Tensor::ones_like(p))
            .collect();
        Self { masks }
    }

    /// Mark one position in one parameter slot as pruned.
    ///
    /// `position` is a row-major offset into the slot's tensor. Marking an
    /// already-pruned position is a no-op; the transition is one-way.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::LayerOutOfBounds`] or
    /// [`PruningError::PositionOutOfBounds`] for invalid addresses.
    pub fn prune_parameter(
        &mut self,
        layer_index: usize,
        position: usize,
    ) -> Result<(), PruningError> {
        let count = self.masks.len();
        let mask = self
            .masks
            .get_mut(layer_index)
            .ok_or(PruningError::LayerOutOfBounds {
                index: layer_index,
                count,
            })?;

        let len = mask.numel();
        if position >= len {
            return Err(PruningError::PositionOutOfBounds { position, len });
        }

        mask.data_mut()[position] = 0.0;
        Ok(())
    }

    /// Force every masked-out position in the model to exactly 0.
    ///
    /// In-place elementwise multiply of each parameter tensor with its
    /// mask. Idempotent: applying twice yields the same model as once.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::InvalidMask`] if the model's slot count no
    /// longer matches the mask, or [`PruningError::ShapeMismatch`] if a
    /// slot's shape disagrees.
    pub fn apply(&self, model: &mut Model) -> Result<(), PruningError> {
        let mut params = model.parameters_mut();
        if params.len() != self.masks.len() {
            return Err(PruningError::InvalidMask {
                reason: format!(
                    "mask has {} slots but model has {} parameters",
                    self.masks.len(),
                    params.len()
                ),
            });
        }

        for (param, mask) in params.iter_mut().zip(&self.masks) {
            if param.shape() != mask.shape() {
                return Err(PruningError::ShapeMismatch {
                    expected: mask.shape().to_vec(),
                    got: param.shape().to_vec(),
                });
            }
            for (w, &m) in param.data_mut().iter_mut().zip(mask.data()) {
                *w *= m;
            }
        }

        Ok(())
    }

    /// Derive pruning in a higher slot from decisions in a lower slot.
    ///
    /// Both slots must be 2-D weight matrices with the lower slot's output
    /// dimension feeding the higher slot's input dimension. Every fully
    /// masked row (output unit) of the lower slot zeroes the matching
    /// column (incoming weights) of the higher slot. The lower slot's mask
    /// is never modified.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::LayerOutOfBounds`] for invalid slot indices
    /// and [`PruningError::ShapeMismatch`] if either slot is not 2-D or
    /// the dimensions do not connect.
    pub fn propagate_pruning(&mut self, lower: usize, higher: usize) -> Result<(), PruningError> {
        let count = self.masks.len();
        let lower_mask = self
            .masks
            .get(lower)
            .ok_or(PruningError::LayerOutOfBounds {
                index: lower,
                count,
            })?;
        if lower_mask.ndim() != 2 {
            return Err(PruningError::ShapeMismatch {
                expected: vec![0, 0],
                got: lower_mask.shape().to_vec(),
            });
        }

        let (lower_rows, lower_cols) = (lower_mask.shape()[0], lower_mask.shape()[1]);

        // Output units of the lower slot whose entire row is masked out.
        let mut dead_units = Vec::new();
        for row in 0..lower_rows {
            let row_data = &lower_mask.data()[row * lower_cols..(row + 1) * lower_cols];
            if row_data.iter().all(|&m| m == 0.0) {
                dead_units.push(row);
            }
        }

        let higher_mask = self
            .masks
            .get_mut(higher)
            .ok_or(PruningError::LayerOutOfBounds {
                index: higher,
                count,
            })?;
        if higher_mask.ndim() != 2 {
            return Err(PruningError::ShapeMismatch {
                expected: vec![0, 0],
                got: higher_mask.shape().to_vec(),
            });
        }

        let (higher_rows, higher_cols) = (higher_mask.shape()[0], higher_mask.shape()[1]);
        if higher_cols != lower_rows {
            return Err(PruningError::ShapeMismatch {
                expected: vec![higher_rows, lower_rows],
                got: vec![higher_rows, higher_cols],
            });
        }

        let data = higher_mask.data_mut();
        for &unit in &dead_units {
            for row in 0..higher_rows {
                data[row * higher_cols + unit] = 0.0;
            }
        }

        Ok(())
    }

    /// The per-slot mask tensors, in parameter order.
    #[must_use]
    pub fn masks(&self) -> &[Tensor] {
        &self.masks
    }

    /// Count of unpruned positions across all slots.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.masks
            .iter()
            .map(|m| m.data().iter().filter(|&&v| v != 0.0).count())
            .sum()
    }
}
