use ndarray::{ArrayD, IxDyn};

use crate::{TrainErr, arch::Mode, error::Result};

/// Collapses every axis but the first into one, `N×C×H×W` to `N×(C·H·W)`.
#[derive(Debug, Default)]
pub struct Flatten {
    shape: Option<Vec<usize>>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        let shape = x.shape().to_vec();
        let n = *shape.first().ok_or(TrainErr::SizeMismatch {
            what: "flatten input rank",
            got: 0,
            expected: 2,
        })?;
        let rest = shape[1..].iter().product::<usize>();

        let y = x
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(&[n, rest]))?;

        self.shape = mode.tracks_gradients().then_some(shape);
        Ok(y)
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let shape = self.shape.take().ok_or(TrainErr::GradientsDisabled)?;

        Ok(d
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(&shape))?)
    }
}
