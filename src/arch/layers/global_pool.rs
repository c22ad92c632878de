use ndarray::{Array4, ArrayD, Axis, Ix2, Ix4};

use crate::{TrainErr, arch::Mode, error::Result};

/// Averages each channel over its spatial extent, `N×C×H×W` to `N×C`.
#[derive(Debug, Default)]
pub struct GlobalAvgPool {
    in_dim: Option<(usize, usize, usize, usize)>,
}

impl GlobalAvgPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix4>()?;
        let dim = x.dim();
        let (n, c, h, w) = dim;

        let y = x
            .into_shape_with_order((n, c, h * w))?
            .mean_axis(Axis(2))
            .ok_or(TrainErr::SizeMismatch {
                what: "global pooling input side",
                got: 0,
                expected: 1,
            })?;

        self.in_dim = mode.tracks_gradients().then_some(dim);
        Ok(y.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let (n, c, h, w) = self.in_dim.take().ok_or(TrainErr::GradientsDisabled)?;
        let d = d.into_dimensionality::<Ix2>()?;

        if d.dim() != (n, c) {
            return Err(TrainErr::SizeMismatch {
                what: "global pooling delta",
                got: d.len(),
                expected: n * c,
            });
        }

        let scale = 1. / (h * w) as f32;
        let mut dx = Array4::zeros((n, c, h, w));
        for ((b, ch), &v) in d.indexed_iter() {
            dx.slice_mut(ndarray::s![b, ch, .., ..]).fill(v * scale);
        }

        Ok(dx.into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn averages_channels_and_spreads_the_delta() {
        let mut pool = GlobalAvgPool::new();
        let x = array![[[[1., 3.], [5., 7.]], [[0., 0.], [0., 4.]]]].into_dyn();

        let y = pool.forward(x, Mode::Training).unwrap();
        assert_eq!(y, array![[4., 1.]].into_dyn());

        let dx = pool.backward(array![[4., 8.]].into_dyn()).unwrap();
        assert_eq!(
            dx,
            array![[[[1., 1.], [1., 1.]], [[2., 2.], [2., 2.]]]].into_dyn()
        );
    }
}
