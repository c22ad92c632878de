use ndarray::ArrayD;

use crate::{TrainErr, arch::Mode, error::Result};

/// Rectified linear unit, `max(0, z)` element wise.
#[derive(Debug, Default)]
pub struct Relu {
    mask: Option<ArrayD<bool>>,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, z: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        if mode.tracks_gradients() {
            self.mask = Some(z.mapv(|z| z > 0.));
        } else {
            self.mask = None;
        }

        Ok(z.mapv_into(|z| z.max(0.)))
    }

    pub fn backward(&mut self, mut d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let mask = self.mask.take().ok_or(TrainErr::GradientsDisabled)?;

        if mask.shape() != d.shape() {
            return Err(TrainErr::SizeMismatch {
                what: "relu delta",
                got: d.len(),
                expected: mask.len(),
            });
        }

        d.zip_mut_with(&mask, |d, &on| {
            if !on {
                *d = 0.;
            }
        });

        Ok(d)
    }
}
