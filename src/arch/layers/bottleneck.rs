use ndarray::ArrayD;
use rand::Rng;

use super::{Conv2d, Relu};
use crate::{
    TrainErr,
    arch::{BackIter, FrontIter, Mode, TensorSpec},
    error::Result,
};

/// A bottleneck residual block: a 1×1 reduction to `width` channels, a 3×3 convolution and a
/// 1×1 expansion to `width * EXPANSION` channels, added to the input (or a 1×1 projection of
/// it when the shape changes) and passed through a final relu.
///
/// Parameters: the three convolutions in order, then the projection if any.
pub struct Bottleneck {
    reduce: Conv2d,
    relu1: Relu,
    conv: Conv2d,
    relu2: Relu,
    expand: Conv2d,
    shortcut: Option<Conv2d>,
    out_relu: Relu,
}

impl Bottleneck {
    /// Output channels per channel of the inner width.
    pub const EXPANSION: usize = 4;

    /// Creates a new `Bottleneck`.
    ///
    /// # Arguments
    /// * `in_channels` - The channels of the input.
    /// * `width` - The channels of the inner convolutions.
    /// * `stride` - The stride of the 3×3 convolution and the projection.
    pub fn new(in_channels: usize, width: usize, stride: usize) -> Result<Self> {
        let out_channels = width * Self::EXPANSION;
        let shortcut = (stride != 1 || in_channels != out_channels)
            .then(|| Conv2d::new(in_channels, out_channels, 1, stride, 0))
            .transpose()?;

        Ok(Self {
            reduce: Conv2d::new(in_channels, width, 1, 1, 0)?,
            relu1: Relu::new(),
            conv: Conv2d::new(width, width, 3, stride, 1)?,
            relu2: Relu::new(),
            expand: Conv2d::new(width, out_channels, 1, 1, 0)?,
            shortcut,
            out_relu: Relu::new(),
        })
    }

    fn body(&self) -> [&Conv2d; 3] {
        [&self.reduce, &self.conv, &self.expand]
    }

    pub fn size(&self) -> usize {
        self.body().iter().map(|c| c.size()).sum::<usize>()
            + self.shortcut.as_ref().map_or(0, Conv2d::size)
    }

    pub fn out_channels(&self) -> usize {
        self.expand.out_channels()
    }

    /// Returns the spatial size of the output for an `h×w` input.
    pub fn output_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        self.conv.output_hw(h, w)
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let mut rest = params;
        for conv in self.body().into_iter().chain(self.shortcut.as_ref()) {
            let (head, tail) = rest.split_at_mut(conv.size());
            conv.init(head, rng)?;
            rest = tail;
        }

        Ok(())
    }

    pub fn tensors(&self, prefix: &str) -> Vec<TensorSpec> {
        let mut specs = self.reduce.tensors(&format!("{prefix}.conv1"));
        specs.extend(self.conv.tensors(&format!("{prefix}.conv2")));
        specs.extend(self.expand.tensors(&format!("{prefix}.conv3")));
        if let Some(proj) = &self.shortcut {
            specs.extend(proj.tensors(&format!("{prefix}.shortcut")));
        }

        specs
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        let mut front = FrontIter::new(params);
        let reduce_params = front.take(self.reduce.size())?;
        let conv_params = front.take(self.conv.size())?;
        let expand_params = front.take(self.expand.size())?;

        let identity = match &mut self.shortcut {
            Some(proj) => {
                let proj_params = front.take(proj.size())?;
                proj.forward(proj_params, x.clone(), mode)?
            }
            None => x.clone(),
        };

        let z = self.reduce.forward(reduce_params, x, mode)?;
        let z = self.relu1.forward(z, mode)?;
        let z = self.conv.forward(conv_params, z, mode)?;
        let z = self.relu2.forward(z, mode)?;
        let z = self.expand.forward(expand_params, z, mode)?;

        if z.shape() != identity.shape() {
            return Err(TrainErr::SizeMismatch {
                what: "bottleneck shortcut",
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

        let (expand_params, expand_grad) = back.take(self.expand.size())?;
        let d = self.expand.backward(expand_params, expand_grad, d)?;
        let d = self.relu2.backward(d)?;

        let (conv_params, conv_grad) = back.take(self.conv.size())?;
        let d = self.conv.backward(conv_params, conv_grad, d)?;
        let d = self.relu1.backward(d)?;

        let (reduce_params, reduce_grad) = back.take(self.reduce.size())?;
        let dx_body = self.reduce.backward(reduce_params, reduce_grad, d)?;

        Ok(dx_body + dx_shortcut)
    }
}
