use std::mem;

use crate::{TrainErr, error::Result};

/// Iterates a flat parameter buffer from front to back, one layer at a time.
pub struct FrontIter<'p> {
    params: &'p [f32],
}

impl<'p> FrontIter<'p> {
    pub fn new(params: &'p [f32]) -> Self {
        Self { params }
    }

    /// Takes the next `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The amount of parameters to take.
    ///
    /// # Returns
    /// A slice of parameters or an error if there are less than `n` left.
    pub fn take(&mut self, n: usize) -> Result<&'p [f32]> {
        if n > self.params.len() {
            return Err(TrainErr::SizeMismatch {
                what: "parameters",
                got: self.params.len(),
                expected: n,
            });
        }

        let (head, tail) = self.params.split_at(n);
        self.params = tail;
        Ok(head)
    }
}

/// Iterates a flat parameter buffer and its gradient from back to front, one layer at a time.
pub struct BackIter<'p> {
    params: &'p [f32],
    grad: &'p mut [f32],
}

impl<'p> BackIter<'p> {
    /// Creates a new `BackIter`.
    ///
    /// `params` and `grad` must have the same length.
    pub fn new(params: &'p [f32], grad: &'p mut [f32]) -> Self {
        debug_assert_eq!(params.len(), grad.len());
        Self { params, grad }
    }

    /// Takes the last `n` parameters and their gradient.
    ///
    /// # Arguments
    /// * `n` - The amount of parameters to take.
    ///
    /// # Returns
    /// A tuple of parameters and gradient or an error if there are less than `n` left.
    pub fn take(&mut self, n: usize) -> Result<(&'p [f32], &'p mut [f32])> {
        let len = self.params.len();

        if n > len || len != self.grad.len() {
            return Err(TrainErr::SizeMismatch {
                what: "parameters",
                got: len,
                expected: n,
            });
        }

        let (params, params_tail) = self.params.split_at(len - n);
        self.params = params;

        let grad = mem::take(&mut self.grad);
        let (grad, grad_tail) = grad.split_at_mut(len - n);
        self.grad = grad;

        Ok((params_tail, grad_tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_iterator() {
        let params = [1.0, 2.0, 3.0, 4.0];
        let mut front = FrontIter::new(&params);

        assert_eq!(front.take(1).unwrap(), [1.0]);
        assert!(front.take(0).unwrap().is_empty());
        assert_eq!(front.take(2).unwrap(), [2.0, 3.0]);
        assert!(front.take(2).is_err());
        assert_eq!(front.take(1).unwrap(), [4.0]);
    }

    #[test]
    fn back_iterator() {
        let params = [1.0, 2.0, 3.0, 4.0];
        let mut grad = [0.0; 4];
        let mut back = BackIter::new(&params, &mut grad);

        let (p, g) = back.take(1).unwrap();
        assert_eq!(p, [4.0]);
        g[0] = 40.0;

        let (p, g) = back.take(3).unwrap();
        assert_eq!(p, [1.0, 2.0, 3.0]);
        g[0] = 10.0;

        assert!(back.take(1).is_err());
        assert_eq!(grad, [10.0, 0.0, 0.0, 40.0]);
    }
}
