//! Dense model representation: an ordered stack of fully connected layers.
//!
//! The pruning API addresses parameters through the *flat parameter list*
//! `[w0, b0, w1, b1, ...]`: weight and bias tensors interleaved in layer
//! order, biases present only where the layer has one. Both weights and
//! biases are prunable slots.

use crate::error::PruningError;
use crate::tensor::Tensor;

/// A fully connected layer's parameters.
///
/// Weight shape is `[out_features, in_features]`; bias, when present, is
/// `[out_features]`. The layer stores parameters only; the forward pass
/// lives with the training collaborator.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    weight: Tensor,
    bias: Option<Tensor>,
}

impl DenseLayer {
    /// Create a layer from a weight matrix and optional bias vector.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::ShapeMismatch`] if the weight is not 2-D or
    /// the bias length disagrees with the weight's output dimension.
    pub fn new(weight: Tensor, bias: Option<Tensor>) -> Result<Self, PruningError> {
        if weight.ndim() != 2 {
            return Err(PruningError::ShapeMismatch {
                expected: vec![0, 0],
                got: weight.shape().to_vec(),
            });
        }
        if let Some(b) = &bias {
            let out_features = weight.shape()[0];
            if b.shape() != [out_features] {
                return Err(PruningError::ShapeMismatch {
                    expected: vec![out_features],
                    got: b.shape().to_vec(),
                });
            }
        }
        Ok(Self { weight, bias })
    }

    /// Number of output units.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.weight.shape()[0]
    }

    /// Number of input features.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.weight.shape()[1]
    }

    /// Check if this layer has a bias term.
    #[must_use]
    pub fn has_bias(&self) -> bool {
        self.bias.is_some()
    }

    /// Get reference to weight tensor.
    #[must_use]
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Get reference to bias tensor if present.
    #[must_use]
    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }
}

/// An ordered sequence of dense layers.
///
/// Owned and mutated in place by the pruning run: mask application zeroes
/// weights directly, and the trainer updates them between pruning steps.
#[derive(Debug, Clone, Default)]
pub struct Model {
    layers: Vec<DenseLayer>,
}

impl Model {
    /// Create a model from an ordered layer list.
    #[must_use]
    pub fn new(layers: Vec<DenseLayer>) -> Self {
        Self { layers }
    }

    /// Get the layers in order.
    #[must_use]
    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Number of layers.
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Flat ordered parameter list: `[w0, b0, w1, b1, ...]`.
    ///
    /// This list defines the slot indices used by
    /// [`crate::mask::WeightMask`] and [`crate::run::PruningRun`].
    #[must_use]
    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::with_capacity(self.layers.len() * 2);
        for layer in &self.layers {
            params.push(&layer.weight);
            if let Some(b) = &layer.bias {
                params.push(b);
            }
        }
        params
    }

    /// Mutable flat parameter list, same ordering as [`Model::parameters`].
    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = Vec::with_capacity(self.layers.len() * 2);
        for layer in &mut self.layers {
            params.push(&mut layer.weight);
            if let Some(b) = &mut layer.bias {
                params.push(b);
            }
        }
        params
    }

    /// Get one parameter tensor by slot index.
    ///
    /// # Errors
    ///
    /// Returns [`PruningError::LayerOutOfBounds`] for an invalid index.
    pub fn parameter(&self, index: usize) -> Result<&Tensor, PruningError> {
        let params = self.parameters();
        let count = params.len();
        params
            .into_iter()
            .nth(index)
            .ok_or(PruningError::LayerOutOfBounds { index, count })
    }

    /// Total element count across all parameter tensors.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer_model() -> Model {
        let l0 = DenseLayer::new(
            Tensor::new(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], &[3, 2]),
            Some(Tensor::from_slice(&[0.0, 0.0, 0.0])),
        )
        .unwrap();
        let l1 = DenseLayer::new(
            Tensor::new(&[1.0, 2.0, 3.0], &[1, 3]),
            Some(Tensor::from_slice(&[0.5])),
        )
        .unwrap();
        Model::new(vec![l0, l1])
    }

    #[test]
    fn test_parameters_interleave_weights_and_biases() {
        let model = two_layer_model();
        let params = model.parameters();

        assert_eq!(params.len(), 4);
        assert_eq!(params[0].shape(), &[3, 2]); // w0
        assert_eq!(params[1].shape(), &[3]); // b0
        assert_eq!(params[2].shape(), &[1, 3]); // w1
        assert_eq!(params[3].shape(), &[1]); // b1
    }

    #[test]
    fn test_layer_without_bias_skips_slot() {
        let l0 = DenseLayer::new(Tensor::new(&[1.0, 2.0], &[1, 2]), None).unwrap();
        let l1 = DenseLayer::new(
            Tensor::new(&[3.0], &[1, 1]),
            Some(Tensor::from_slice(&[0.0])),
        )
        .unwrap();
        let model = Model::new(vec![l0, l1]);

        let params = model.parameters();
        assert_eq!(params.len(), 3);
        assert_eq!(params[1].shape(), &[1, 1]); // w1 directly after w0
    }

    #[test]
    fn test_dense_layer_rejects_non_2d_weight() {
        let result = DenseLayer::new(Tensor::from_slice(&[1.0, 2.0]), None);
        assert!(matches!(result, Err(PruningError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_dense_layer_rejects_bias_length_mismatch() {
        let result = DenseLayer::new(
            Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]),
            Some(Tensor::from_slice(&[0.0, 0.0, 0.0])),
        );
        assert!(matches!(result, Err(PruningError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_parameter_out_of_bounds() {
        let model = two_layer_model();
        let result = model.parameter(4);
        assert!(matches!(
            result,
            Err(PruningError::LayerOutOfBounds { index: 4, count: 4 })
        ));
    }

    #[test]
    fn test_num_parameters() {
        let model = two_layer_model();
        // 6 + 3 + 3 + 1
        assert_eq!(model.num_parameters(), 13);
    }

    #[test]
    fn test_parameters_mut_writes_through() {
        let mut model = two_layer_model();
        model.parameters_mut()[0].data_mut()[0] = 9.0;
        assert_eq!(model.layers()[0].weight().data()[0], 9.0);
    }
}
