//! Dense tensor type backing model weights and masks.
//!
//! Stores F32 values in row-major order together with an explicit shape.
//! Pruning never needs gradient tracking (training runs behind the
//! [`crate::train::Trainer`] contract), so this type is plain data.

use std::fmt;

/// A dense row-major F32 tensor.
///
/// # Example
///
/// ```
/// use podar::tensor::Tensor;
///
/// let t = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
/// assert_eq!(t.shape(), &[2, 2]);
/// assert_eq!(t.numel(), 4);
/// ```
#[derive(Clone, PartialEq)]
pub struct Tensor {
    /// Underlying data storage
    data: Vec<f32>,
    /// Shape of the tensor
    shape: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor from a slice with the given shape.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "Data length {} doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_len
        );

        Self {
            data: data.to_vec(),
            shape: shape.to_vec(),
        }
    }

    /// Create a tensor from a 1D slice (vector).
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self::new(data, &[data.len()])
    }

    /// Create a tensor filled with zeros.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::new(&vec![0.0; len], shape)
    }

    /// Create a tensor filled with ones.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::new(&vec![1.0; len], shape)
    }

    /// Create a tensor with the same shape as another, filled with ones.
    #[must_use]
    pub fn ones_like(other: &Tensor) -> Self {
        Self::ones(&other.shape)
    }

    /// Get the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Get the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get a reference to the underlying data (row-major).
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get a mutable reference to the underlying data (row-major).
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("numel", &self.numel())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stores_shape_and_data() {
        let t = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.numel(), 6);
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    #[should_panic(expected = "Data length")]
    fn test_new_rejects_length_mismatch() {
        let _ = Tensor::new(&[1.0, 2.0, 3.0], &[2, 2]);
    }

    #[test]
    fn test_zeros_and_ones() {
        let z = Tensor::zeros(&[3, 2]);
        assert!(z.data().iter().all(|&v| v == 0.0));

        let o = Tensor::ones(&[3, 2]);
        assert!(o.data().iter().all(|&v| v == 1.0));
        assert_eq!(o.numel(), 6);
    }

    #[test]
    fn test_ones_like_matches_shape() {
        let t = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[4, 1]);
        let o = Tensor::ones_like(&t);
        assert_eq!(o.shape(), t.shape());
        assert!(o.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_data_mut_writes_through() {
        let mut t = Tensor::from_slice(&[1.0, 2.0]);
        t.data_mut()[1] = 5.0;
        assert_eq!(t.data(), &[1.0, 5.0]);
    }
}
