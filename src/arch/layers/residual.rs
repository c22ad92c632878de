use ndarray::ArrayD;
use rand::Rng;

use super::{Conv2d, Relu};
use crate::{
    TrainErr,
    arch::{BackIter, FrontIter, Mode, TensorSpec},
    error::Result,
};

/// A basic residual block: two 3×3 convolutions with a relu in between, added to the input
/// (or a 1×1 projection of it when the shape changes) and passed through a final relu.
///
/// Parameters: first convolution, second convolution, then the projection if any.
pub struct Residual {
    conv1: Conv2d,
    relu1: Relu,
    conv2: Conv2d,
    shortcut: Option<Conv2d>,
    out_relu: Relu,
}

impl Residual {
    /// Creates a new `Residual`.
    ///
    /// # Arguments
    /// * `in_channels` - The channels of the input.
    /// * `out_channels` - The channels of the output.
    /// * `stride` - The stride of the first convolution and the projection.
    pub fn new(in_channels: usize, out_channels: usize, stride: usize) -> Result<Self> {
        let shortcut = (stride != 1 || in_channels != out_channels)
            .then(|| Conv2d::new(in_channels, out_channels, 1, stride, 0))
            .transpose()?;

        Ok(Self {
            conv1: Conv2d::new(in_channels, out_channels, 3, stride, 1)?,
            relu1: Relu::new(),
            conv2: Conv2d::new(out_channels, out_channels, 3, 1, 1)?,
            shortcut,
            out_relu: Relu::new(),
        })
    }

    pub fn size(&self) -> usize {
        self.conv1.size() + self.conv2.size() + self.shortcut.as_ref().map_or(0, Conv2d::size)
    }

    pub fn out_channels(&self) -> usize {
        self.conv2.out_channels()
    }

    /// Returns the spatial size of the output for an `h×w` input.
    pub fn output_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        self.conv1.output_hw(h, w)
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let (conv1, rest) = params.split_at_mut(self.conv1.size());
        let (conv2, shortcut) = rest.split_at_mut(self.conv2.size());

        self.conv1.init(conv1, rng)?;
        self.conv2.init(conv2, rng)?;
        if let Some(proj) = &self.shortcut {
            proj.init(shortcut, rng)?;
        }

        Ok(())
    }

    pub fn tensors(&self, prefix: &str) -> Vec<TensorSpec> {
        let mut specs = self.conv1.tensors(&format!("{prefix}.conv1"));
        specs.extend(self.conv2.tensors(&format!("{prefix}.conv2")));
        if let Some(proj) = &self.shortcut {
            specs.extend(proj.tensors(&format!("{prefix}.shortcut")));
        }

        specs
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        let mut front = FrontIter::new(params);
        let conv1_params = front.take(self.conv1.size())?;
        let conv2_params = front.take(self.conv2.size())?;

        let identity = match &mut self.shortcut {
            Some(proj) => {
                let proj_params = front.take(proj.size())?;
                proj.forward(proj_params, x.clone(), mode)?
            }
            None => x.clone(),
        };

        let z = self.conv1.forward(conv1_params, x, mode)?;
        let z = self.relu1.forward(z, mode)?;
        let z = self.conv2.forward(conv2_params, z, mode)?;

        if z.shape() != identity.shape() {
            return Err(TrainErr::SizeMismatch {
                what: "residual shortcut",
                got: identity.len(),
                expected: z.len(),
            });
        }

        self.out_relu.forward(z + identity, mode)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let d = self.out_relu.backward(d)?;
        let mut back = BackIter::new(params, grad);

        let dx_shortcut = match &mut self.shortcut {
            Some(proj) => {
                let (params, grad) = back.take(proj.size())?;
                proj.backward(params, grad, d.clone())?
            }
            None => d.clone(),
        };

        let (conv2_params, conv2_grad) = back.take(self.conv2.size())?;
        let d = self.conv2.backward(conv2_params, conv2_grad, d)?;
        let d = self.relu1.backward(d)?;

        let (conv1_params, conv1_grad) = back.take(self.conv1.size())?;
        let dx_body = self.conv1.backward(conv1_params, conv1_grad, d)?;

        Ok(dx_body + dx_shortcut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn projects_the_shortcut_only_when_the_shape_changes() {
        let same = Residual::new(4, 4, 1).unwrap();
        let down = Residual::new(4, 8, 2).unwrap();

        assert_eq!(same.size(), 2 * (4 * 4 * 9 + 4));
        assert_eq!(down.size(), (8 * 4 * 9 + 8) + (8 * 8 * 9 + 8) + (8 * 4 + 8));
        assert_eq!(down.output_hw(8, 8).unwrap(), (4, 4));
    }

    #[test]
    fn zero_body_passes_the_input_through() {
        let mut block = Residual::new(2, 2, 1).unwrap();
        let params = vec![0.; block.size()];
        let x = Array4::from_elem((1, 2, 3, 3), 1.5).into_dyn();

        let y = block.forward(&params, x.clone(), Mode::Training).unwrap();
        assert_eq!(y, x);

        let mut grad = vec![0.; block.size()];
        let dx = block.backward(&params, &mut grad, y).unwrap();
        assert_eq!(dx, x);
    }

    #[test]
    fn backward_fills_every_parameter_group() {
        let mut block = Residual::new(1, 2, 2).unwrap();
        let params = vec![0.1; block.size()];

        let x = Array4::from_shape_fn((2, 1, 4, 4), |(n, _, i, j)| (n + i + j) as f32).into_dyn();
        let y = block.forward(&params, x, Mode::Training).unwrap();
        assert_eq!(y.shape(), &[2, 2, 2, 2]);

        let mut grad = vec![0.; block.size()];
        block
            .backward(&params, &mut grad, y.mapv(|_| 1.))
            .unwrap();

        // Every output is positive, so each projection bias sees all 2·2·2 unit deltas.
        assert_eq!(grad[grad.len() - 2..], [8., 8.]);
        assert!(grad.iter().all(|&g| g > 0.));
    }

    #[test]
    fn seeded_init_is_reproducible() {
        let block = Residual::new(1, 2, 2).unwrap();
        let mut a = vec![0.; block.size()];
        let mut b = vec![0.; block.size()];

        block.init(&mut a, &mut StdRng::seed_from_u64(3)).unwrap();
        block.init(&mut b, &mut StdRng::seed_from_u64(3)).unwrap();

        assert_eq!(a, b);
    }
}
