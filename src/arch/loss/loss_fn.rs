use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::Result;

/// A loss over class scores (`N×classes`) and integer labels (`N`).
pub trait LossFn {
    /// Returns the mean loss of the batch.
    fn loss(&self, scores: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<f32>;

    /// Returns the derivative of `loss` with respect to `scores`.
    fn loss_prime(&self, scores: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<Array2<f32>>;
}
