use super::{Optimizer, optimizer::check_lens};
use crate::error::Result;

/// Stochastic gradient descent with momentum. A zero momentum is plain gradient descent.
#[derive(Debug, Clone, PartialEq)]
pub struct Sgd {
    learning_rate: f32,
    weight_decay: f32,
    momentum: f32,
    velocity: Box<[f32]>,
}

impl Sgd {
    /// Creates a new `Sgd` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `weight_decay` - The L2 penalty folded into the gradient.
    /// * `momentum` - How much of the previous velocity is kept on every step.
    ///
    /// # Returns
    /// A new `Sgd` instance.
    pub fn new(len: usize, learning_rate: f32, weight_decay: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            weight_decay,
            momentum,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Sgd {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_lens(self.velocity.len(), grad, params)?;

        let lr = self.learning_rate;
        let wd = self.weight_decay;
        let mu = self.momentum;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.velocity.iter_mut())
            .for_each(|((p, g), v)| {
                let g = g + wd * *p;
                *v = (mu * *v) + g;
                *p -= lr * *v;
            });

        Ok(())
    }
}
