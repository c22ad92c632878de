use ndarray::ArrayD;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{TrainErr, arch::Mode, error::Result};

/// Inverted dropout: during training every unit is zeroed with probability `p` and the
/// survivors are scaled by `1 / (1 - p)`. Evaluation is the identity.
#[derive(Debug)]
pub struct Dropout {
    p: f32,
    rng: StdRng,
    mask: Option<ArrayD<f32>>,
}

impl Dropout {
    /// Creates a new `Dropout`.
    ///
    /// # Arguments
    /// * `p` - The probability of dropping a unit, in `[0, 1)`.
    /// * `seed` - Seed of the mask generator.
    pub fn new(p: f32, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(TrainErr::InvalidConfig(format!(
                "dropout probability must be in [0, 1), got {p}"
            )));
        }

        Ok(Self {
            p,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        })
    }

    pub fn forward(&mut self, x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        if !mode.tracks_gradients() {
            self.mask = None;
            return Ok(x);
        }

        let scale = 1. / (1. - self.p);
        let p = self.p;
        let rng = &mut self.rng;
        let mask = x.mapv(|_| if rng.random::<f32>() < p { 0. } else { scale });

        let y = &x * &mask;
        self.mask = Some(mask);
        Ok(y)
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let mask = self.mask.take().ok_or(TrainErr::GradientsDisabled)?;

        if mask.shape() != d.shape() {
            return Err(TrainErr::SizeMismatch {
                what: "dropout delta",
                got: d.len(),
                expected: mask.len(),
            });
        }

        Ok(d * &mask)
    }
}
