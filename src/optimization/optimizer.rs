use crate::error::Result;

/// A gradient-update rule with its per-parameter state.
pub trait Optimizer {
    /// Takes one step over `params` in the direction opposite to `grad`.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the loss with respect to `params`.
    /// * `params` - The parameters that are going to be modified.
    ///
    /// # Returns
    /// An error if `grad`, `params` and the optimizer's state differ in length.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;
}

/// Checks that an optimizer holding `state` entries can update `grad` and `params`.
pub(super) fn check_lens(state: usize, grad: &[f32], params: &[f32]) -> Result<()> {
    for got in [grad.len(), params.len()] {
        if got != state {
            return Err(crate::TrainErr::SizeMismatch {
                what: "optimizer state",
                got,
                expected: state,
            });
        }
    }

    Ok(())
}
