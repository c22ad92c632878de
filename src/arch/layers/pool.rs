use ndarray::{Array4, ArrayD, Ix4, Zip, s};

use crate::{TrainErr, arch::Mode, error::Result};

/// Non overlapping 2×2 max pooling with stride 2. Odd trailing rows and columns are dropped.
#[derive(Default)]
pub struct MaxPool2d {
    argmax: Option<(Array4<usize>, (usize, usize, usize, usize))>,
}

impl MaxPool2d {
    pub const WINDOW: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the spatial size of the output for an `h×w` input.
    pub fn output_hw(h: usize, w: usize) -> Result<(usize, usize)> {
        let (ho, wo) = (h / Self::WINDOW, w / Self::WINDOW);
        if ho == 0 || wo == 0 {
            return Err(TrainErr::SizeMismatch {
                what: "pooling input side",
                got: h.min(w),
                expected: Self::WINDOW,
            });
        }

        Ok((ho, wo))
    }

    pub fn forward(&mut self, x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = x.dim();
        let (ho, wo) = Self::output_hw(h, w)?;
        let k = Self::WINDOW;

        let mut y = Array4::zeros((n, c, ho, wo));
        let mut argmax = Array4::zeros((n, c, ho, wo));

        Zip::indexed(&mut y)
            .and(&mut argmax)
            .par_for_each(|(b, ch, i, j), out, idx| {
                let window = x.slice(s![b, ch, i * k..(i + 1) * k, j * k..(j + 1) * k]);
                let (mut best, mut best_at) = (f32::NEG_INFINITY, 0);

                for ((wi, wj), &v) in window.indexed_iter() {
                    if v > best {
                        best = v;
                        best_at = (i * k + wi) * w + j * k + wj;
                    }
                }

                *out = best;
                *idx = best_at;
            });

        self.argmax = mode.tracks_gradients().then_some((argmax, (n, c, h, w)));
        Ok(y.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let (argmax, (n, c, h, w)) = self.argmax.take().ok_or(TrainErr::GradientsDisabled)?;
        let d = d.into_dimensionality::<Ix4>()?;

        if d.dim() != argmax.dim() {
            return Err(TrainErr::SizeMismatch {
                what: "pooling delta",
                got: d.len(),
                expected: argmax.len(),
            });
        }

        let mut dx = Array4::zeros((n, c, h, w));
        for ((b, ch, i, j), &at) in argmax.indexed_iter() {
            dx[[b, ch, at / w, at % w]] += d[[b, ch, i, j]];
        }

        Ok(dx.into_dyn())
    }
}
