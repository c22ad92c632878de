use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array2, ArrayView4};

use super::{Mode, TensorSpec, serialize_state};
use crate::{device::Device, error::Result};

/// Identifies one model's parameter set, so optimizers can tell which model they're bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamsId(u64);

impl ParamsId {
    /// Returns an identifier that no other parameter set in this process has.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A differentiable image classifier that owns its parameters.
///
/// The parameters live in one flat buffer with a gradient buffer of the same length. The
/// current `Mode` is explicit state on the model, set by whoever drives it.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the identity of this model's parameter set.
    fn params_id(&self) -> ParamsId;

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    fn device(&self) -> Device;

    /// Moves the model's parameters to `device`.
    fn to_device(&mut self, device: Device);

    /// Computes the class scores (`N×classes`) for a batch of images (`N×C×H×W`).
    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>>;

    /// Accumulates into the gradient buffer the gradient of the loss given its derivative
    /// with respect to the scores of the last forward pass.
    ///
    /// # Errors
    /// Fails with `GradientsDisabled` in evaluation mode.
    fn backward(&mut self, d: Array2<f32>) -> Result<()>;

    fn params(&self) -> &[f32];

    /// Returns the parameters and the gradient buffer.
    fn params_and_grad(&mut self) -> (&mut [f32], &mut [f32]);

    /// Names and shapes of the parameter groups, in buffer order.
    fn tensors(&self) -> Vec<TensorSpec>;

    /// Clears the gradient buffer.
    fn zero_grad(&mut self) {
        self.params_and_grad().1.fill(0.);
    }

    /// Serializes the parameters as a safetensors blob.
    fn state_dict(&self) -> Result<Vec<u8>> {
        serialize_state(&self.tensors(), self.params())
    }
}
