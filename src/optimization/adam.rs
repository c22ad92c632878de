use super::{Optimizer, optimizer::check_lens};
use crate::error::Result;

/// Adam with the L2 penalty added to the gradient before the moment estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct Adam {
    learning_rate: f32,
    weight_decay: f32,
    steps: i32,
    first_moment: Box<[f32]>,
    second_moment: Box<[f32]>,
}

impl Adam {
    pub const BETA1: f32 = 0.9;
    pub const BETA2: f32 = 0.999;
    pub const EPSILON: f32 = 1e-8;

    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `weight_decay` - The L2 penalty folded into the gradient.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            weight_decay,
            steps: 0,
            first_moment: vec![0.; len].into_boxed_slice(),
            second_moment: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_lens(self.first_moment.len(), grad, params)?;

        self.steps = self.steps.saturating_add(1);
        let (b1, b2) = (Self::BETA1, Self::BETA2);
        let wd = self.weight_decay;

        // Both bias corrections folded into the step size.
        let correction1 = 1. - b1.powi(self.steps);
        let correction2 = 1. - b2.powi(self.steps);
        let alpha = self.learning_rate * correction2.sqrt() / correction1;

        let moments = self.first_moment.iter_mut().zip(self.second_moment.iter_mut());
        for ((p, &g), (m, v)) in params.iter_mut().zip(grad).zip(moments) {
            let g = g + wd * *p;
            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;
            *p -= alpha * *m / (v.sqrt() + Self::EPSILON);
        }

        Ok(())
    }
}
