use ndarray::{
    Array1, Array2, Array3, Array4, ArrayD, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut1,
    ArrayViewMut2, Axis, Ix4, linalg,
};
use rand::Rng;
use rayon::prelude::*;

use crate::{
    TrainErr,
    arch::{Mode, TensorSpec, init},
    error::Result,
};

/// Kernel size, stride and zero padding of a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    kernel: usize,
    stride: usize,
    padding: usize,
}

impl Geometry {
    fn output_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let Self {
            kernel: k,
            stride: s,
            padding: p,
        } = *self;

        if h + 2 * p < k || w + 2 * p < k {
            return Err(TrainErr::SizeMismatch {
                what: "convolution input side",
                got: h.min(w) + 2 * p,
                expected: k,
            });
        }

        Ok(((h + 2 * p - k) / s + 1, (w + 2 * p - k) / s + 1))
    }

    /// Maps an output coordinate and a kernel offset to an input coordinate, `None` when it
    /// lands on the padding.
    fn source(&self, out: usize, offset: usize, len: usize) -> Option<usize> {
        (out * self.stride + offset)
            .checked_sub(self.padding)
            .filter(|&i| i < len)
    }
}

struct ConvCache {
    cols: Vec<Array2<f32>>,
    in_dim: (usize, usize, usize, usize),
    out_hw: (usize, usize),
}

/// A 2D convolution over `N×C×H×W` inputs, computed as a matrix product over unrolled
/// patches (im2col). The samples of a batch are convolved in parallel.
///
/// Parameters: `out_channels × in_channels × k × k` weights followed by `out_channels` biases.
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    geometry: Geometry,
    cache: Option<ConvCache>,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `in_channels` - The channels of the input.
    /// * `out_channels` - The amount of filters.
    /// * `kernel_size` - The side of the square kernel.
    /// * `stride` - The step between consecutive patches.
    /// * `padding` - The zero padding added to every side.
    ///
    /// # Returns
    /// A new `Conv2d` or an error if any of the sizes or the stride is zero.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 || kernel_size == 0 || stride == 0 {
            return Err(TrainErr::InvalidConfig(format!(
                "invalid convolution {in_channels}->{out_channels}, kernel {kernel_size}, stride {stride}"
            )));
        }

        Ok(Self {
            in_channels,
            out_channels,
            geometry: Geometry {
                kernel: kernel_size,
                stride,
                padding,
            },
            cache: None,
        })
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.out_channels * self.patch_len() + self.out_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Returns the spatial size of the output for an `h×w` input.
    pub fn output_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        self.geometry.output_hw(h, w)
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let w_size = self.out_channels * self.patch_len();
        let (weights, bias) = params.split_at_mut(w_size);
        init::kaiming(rng, weights, self.patch_len())?;
        bias.fill(0.);
        Ok(())
    }

    pub fn tensors(&self, prefix: &str) -> Vec<TensorSpec> {
        let k = self.geometry.kernel;

        vec![
            TensorSpec::new(
                format!("{prefix}.weight"),
                vec![self.out_channels, self.in_channels, k, k],
            ),
            TensorSpec::new(format!("{prefix}.bias"), vec![self.out_channels]),
        ]
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = x.dim();

        if c != self.in_channels {
            return Err(TrainErr::SizeMismatch {
                what: "convolution input channels",
                got: c,
                expected: self.in_channels,
            });
        }

        let (ho, wo) = self.geometry.output_hw(h, w)?;
        let (weights, bias) = self.view_params(params)?;
        let bias = bias.insert_axis(Axis(1));
        let geometry = self.geometry;
        let out_channels = self.out_channels;

        let samples: Vec<_> = (0..n)
            .into_par_iter()
            .map(|i| {
                let cols = im2col(x.index_axis(Axis(0), i), geometry, (ho, wo));
                let mut out = Array2::zeros((out_channels, ho * wo));
                linalg::general_mat_mul(1.0, &weights, &cols, 0.0, &mut out);
                out += &bias;
                (cols, out)
            })
            .collect();

        let mut y = Array4::zeros((n, out_channels, ho, wo));
        let mut cols_cache = Vec::with_capacity(n);

        for (i, (cols, out)) in samples.into_iter().enumerate() {
            let out = out.into_shape_with_order((out_channels, ho, wo))?;
            y.index_axis_mut(Axis(0), i).assign(&out);
            cols_cache.push(cols);
        }

        self.cache = mode.tracks_gradients().then(|| ConvCache {
            cols: cols_cache,
            in_dim: (n, c, h, w),
            out_hw: (ho, wo),
        });

        Ok(y.into_dyn())
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let cache = self.cache.take().ok_or(TrainErr::GradientsDisabled)?;
        let d = d.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = cache.in_dim;
        let (ho, wo) = cache.out_hw;

        if d.dim() != (n, self.out_channels, ho, wo) {
            return Err(TrainErr::SizeMismatch {
                what: "convolution delta",
                got: d.len(),
                expected: n * self.out_channels * ho * wo,
            });
        }

        let (weights, _) = self.view_params(params)?;
        let geometry = self.geometry;
        let out_channels = self.out_channels;

        let per_sample = cache
            .cols
            .par_iter()
            .enumerate()
            .map(|(i, cols)| -> Result<(Array2<f32>, Array1<f32>, Array3<f32>)> {
                let d_i = d
                    .index_axis(Axis(0), i)
                    .to_shape((out_channels, ho * wo))?
                    .into_owned();

                let mut dw = Array2::zeros(weights.raw_dim());
                linalg::general_mat_mul(1.0, &d_i, &cols.t(), 0.0, &mut dw);
                let db = d_i.sum_axis(Axis(1));

                let mut dcols = Array2::zeros(cols.raw_dim());
                linalg::general_mat_mul(1.0, &weights.t(), &d_i, 0.0, &mut dcols);
                let dx = col2im(dcols.view(), (c, h, w), geometry, (ho, wo));

                Ok((dw, db, dx))
            })
            .collect::<Result<Vec<_>>>()?;

        let (mut dw_total, mut db_total) = self.view_grad(grad)?;
        let mut dx = Array4::zeros((n, c, h, w));

        for (i, (dw, db, dx_i)) in per_sample.into_iter().enumerate() {
            dw_total += &dw;
            db_total += &db;
            dx.index_axis_mut(Axis(0), i).assign(&dx_i);
        }

        Ok(dx.into_dyn())
    }

    fn patch_len(&self) -> usize {
        self.in_channels * self.geometry.kernel * self.geometry.kernel
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len(params.len())?;
        let w_size = self.out_channels * self.patch_len();
        let weights = ArrayView2::from_shape((self.out_channels, self.patch_len()), &params[..w_size])?;
        let bias = ArrayView1::from_shape(self.out_channels, &params[w_size..])?;
        Ok((weights, bias))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len(grad.len())?;
        let w_size = self.out_channels * self.patch_len();
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape((self.out_channels, self.patch_len()), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.out_channels, db_raw)?;
        Ok((dw, db))
    }

    fn check_len(&self, got: usize) -> Result<()> {
        if got != self.size() {
            return Err(TrainErr::SizeMismatch {
                what: "convolution parameters",
                got,
                expected: self.size(),
            });
        }

        Ok(())
    }
}

/// Unrolls every receptive field of `x` (`C×H×W`) into a column of a
/// `(C·k·k)×(ho·wo)` matrix.
fn im2col(x: ArrayView3<f32>, g: Geometry, (ho, wo): (usize, usize)) -> Array2<f32> {
    let (c, h, w) = x.dim();
    let k = g.kernel;
    let mut cols = Array2::zeros((c * k * k, ho * wo));

    for ch in 0..c {
        for ki in 0..k {
            for kj in 0..k {
                let row = (ch * k + ki) * k + kj;

                for oi in 0..ho {
                    let Some(ii) = g.source(oi, ki, h) else {
                        continue;
                    };

                    for oj in 0..wo {
                        if let Some(jj) = g.source(oj, kj, w) {
                            cols[[row, oi * wo + oj]] = x[[ch, ii, jj]];
                        }
                    }
                }
            }
        }
    }

    cols
}

/// Folds unrolled columns back into a `C×H×W` image, summing overlapping contributions.
fn col2im(
    cols: ArrayView2<f32>,
    (c, h, w): (usize, usize, usize),
    g: Geometry,
    (ho, wo): (usize, usize),
) -> Array3<f32> {
    let k = g.kernel;
    let mut x = Array3::zeros((c, h, w));

    for ch in 0..c {
        for ki in 0..k {
            for kj in 0..k {
                let row = (ch * k + ki) * k + kj;

                for oi in 0..ho {
                    let Some(ii) = g.source(oi, ki, h) else {
                        continue;
                    };

                    for oj in 0..wo {
                        if let Some(jj) = g.source(oj, kj, w) {
                            x[[ch, ii, jj]] += cols[[row, oi * wo + oj]];
                        }
                    }
                }
            }
        }
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn output_size_accounts_for_padding_and_stride() {
        let conv = Conv2d::new(1, 1, 3, 2, 1).unwrap();
        assert_eq!(conv.output_hw(5, 4).unwrap(), (3, 2));
        assert!(Conv2d::new(1, 1, 5, 1, 0).unwrap().output_hw(3, 3).is_err());
    }

    #[test]
    fn forward_matches_a_hand_computed_convolution() {
        let mut conv = Conv2d::new(1, 1, 2, 1, 0).unwrap();
        // weights [[1, 0], [0, 1]], bias 0.5
        let params = [1., 0., 0., 1., 0.5];
        let x = array![[[[1., 2., 3.], [4., 5., 6.], [7., 8., 9.]]]].into_dyn();

        let y = conv.forward(&params, x, Mode::Evaluation).unwrap();

        let expected = array![[[[6.5, 8.5], [12.5, 14.5]]]].into_dyn();
        assert_eq!(y, expected);
    }

    #[test]
    fn backward_matches_hand_computed_gradients() {
        let mut conv = Conv2d::new(1, 1, 2, 1, 0).unwrap();
        let params = [1., 2., 3., 4., 0.];
        let x = array![[[[1., 2., 3.], [4., 5., 6.], [7., 8., 9.]]]].into_dyn();
        conv.forward(&params, x, Mode::Training).unwrap();

        let mut grad = [0.; 5];
        let d = Array4::<f32>::ones((1, 1, 2, 2)).into_dyn();
        let dx = conv.backward(&params, &mut grad, d).unwrap();

        // dW[i, j] is the sum of the input patch shifted by (i, j).
        assert_eq!(grad, [12., 16., 24., 28., 4.]);
        let expected = array![[[[1., 3., 2.], [4., 10., 6.], [3., 7., 4.]]]].into_dyn();
        assert_eq!(dx, expected);
    }

    #[test]
    fn padding_is_zero_filled() {
        let mut conv = Conv2d::new(1, 1, 3, 1, 1).unwrap();
        let mut params = [0.; 10];
        params[4] = 1.; // center tap

        let x = array![[[[1., 2.], [3., 4.]]]].into_dyn();
        let y = conv.forward(&params, x.clone(), Mode::Evaluation).unwrap();

        assert_eq!(y, x);
    }

    #[test]
    fn evaluation_mode_refuses_backward() {
        let mut conv = Conv2d::new(1, 1, 1, 1, 0).unwrap();
        let params = [1., 0.];
        let x = Array4::<f32>::ones((1, 1, 2, 2)).into_dyn();
        conv.forward(&params, x, Mode::Evaluation).unwrap();

        let mut grad = [0.; 2];
        let d = Array4::<f32>::ones((1, 1, 2, 2)).into_dyn();
        assert!(matches!(
            conv.backward(&params, &mut grad, d),
            Err(TrainErr::GradientsDisabled)
        ));
    }

    #[test]
    fn gradients_accumulate_until_cleared() {
        let mut conv = Conv2d::new(1, 1, 1, 1, 0).unwrap();
        let params = [2., 0.];
        let mut grad = [0.; 2];

        for _ in 0..2 {
            let x = Array4::<f32>::ones((1, 1, 1, 1)).into_dyn();
            conv.forward(&params, x, Mode::Training).unwrap();
            let d = Array4::<f32>::ones((1, 1, 1, 1)).into_dyn();
            conv.backward(&params, &mut grad, d).unwrap();
        }

        assert_eq!(grad, [2., 2.]);
    }
}
