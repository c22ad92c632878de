use super::{Optimizer, optimizer::check_lens};
use crate::error::Result;

/// Root mean square propagation: every step is scaled by a running average of the squared
/// gradient, optionally accumulated in a momentum buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RmsProp {
    learning_rate: f32,
    weight_decay: f32,
    momentum: f32,
    alpha: f32,
    epsilon: f32,
    square_avg: Box<[f32]>,
    buffer: Box<[f32]>,
}

impl RmsProp {
    pub const ALPHA: f32 = 0.99;
    pub const EPSILON: f32 = 1e-8;

    /// Creates a new `RmsProp` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `weight_decay` - The L2 penalty folded into the gradient.
    /// * `momentum` - The decay of the momentum buffer, zero disables it.
    ///
    /// # Returns
    /// A new `RmsProp` instance.
    pub fn new(len: usize, learning_rate: f32, weight_decay: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            weight_decay,
            momentum,
            alpha: Self::ALPHA,
            epsilon: Self::EPSILON,
            square_avg: vec![0.; len].into_boxed_slice(),
            buffer: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for RmsProp {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_lens(self.square_avg.len(), grad, params)?;

        let Self {
            learning_rate: lr,
            weight_decay: wd,
            momentum: mu,
            alpha,
            epsilon: eps,
            ..
        } = *self;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.square_avg.iter_mut())
            .zip(self.buffer.iter_mut())
            .for_each(|(((p, g), s), b)| {
                let g = g + wd * *p;
                *s = alpha * *s + (1. - alpha) * g.powi(2);
                let scaled = g / (s.sqrt() + eps);

                if mu > 0. {
                    *b = mu * *b + scaled;
                    *p -= lr * *b;
                } else {
                    *p -= lr * scaled;
                }
            });

        Ok(())
    }
}
