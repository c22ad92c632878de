use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, Ix2, linalg};
use rand::Rng;

use crate::{
    TrainErr,
    arch::{Mode, TensorSpec, init},
    error::Result,
};

/// A fully connected layer, `x·W + b`.
///
/// Parameters: `in × out` weights followed by `out` biases.
#[derive(Debug)]
pub struct Dense {
    dim: (usize, usize),
    size: usize,
    x: Option<Array2<f32>>,
}

impl Dense {
    /// Creates a new `Dense`.
    ///
    /// # Arguments
    /// * `dim` - The input and output sizes.
    pub fn new(dim: (usize, usize)) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            x: None,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let w_size = self.size - self.dim.1;
        let (weights, bias) = params.split_at_mut(w_size);
        init::kaiming(rng, weights, self.dim.0)?;
        bias.fill(0.);
        Ok(())
    }

    pub fn tensors(&self, prefix: &str) -> Vec<TensorSpec> {
        vec![
            TensorSpec::new(format!("{prefix}.weight"), vec![self.dim.0, self.dim.1]),
            TensorSpec::new(format!("{prefix}.bias"), vec![self.dim.1]),
        ]
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix2>()?;

        if x.ncols() != self.dim.0 {
            return Err(TrainErr::SizeMismatch {
                what: "dense input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;

        self.x = mode.tracks_gradients().then_some(x);
        Ok(z.into_dyn())
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let x = self.x.take().ok_or(TrainErr::GradientsDisabled)?;
        let d = d.into_dimensionality::<Ix2>()?;

        if d.dim() != (x.nrows(), self.dim.1) {
            return Err(TrainErr::SizeMismatch {
                what: "dense delta",
                got: d.len(),
                expected: x.nrows() * self.dim.1,
            });
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &x.t(), &d, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (w, _) = self.view_params(params)?;
        let mut dx = Array2::zeros((d.nrows(), self.dim.0));
        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut dx);

        Ok(dx.into_dyn())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size {
            return Err(TrainErr::SizeMismatch {
                what: "dense parameters",
                got: params.len(),
                expected: self.size,
            });
        }

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn forward_and_backward_match_hand_computed_values() {
        let mut dense = Dense::new((2, 1));
        let params = [2., 3., 1.];

        let y = dense
            .forward(&params, array![[1., 1.], [0., 2.]].into_dyn(), Mode::Training)
            .unwrap();
        assert_eq!(y, array![[6.], [7.]].into_dyn());

        let mut grad = [0.; 3];
        let dx = dense
            .backward(&params, &mut grad, array![[1.], [1.]].into_dyn())
            .unwrap();

        assert_eq!(grad, [1., 3., 2.]);
        assert_eq!(dx, array![[2., 3.], [2., 3.]].into_dyn());
    }

    #[test]
    fn rejects_inputs_of_the_wrong_width() {
        let mut dense = Dense::new((3, 1));
        let params = [0.; 4];
        assert!(
            dense
                .forward(&params, array![[1., 1.]].into_dyn(), Mode::Evaluation)
                .is_err()
        );
    }
}
