use super::{
    Sequential,
    layers::{Bottleneck, Conv2d, Layer, MaxPool2d, Residual},
};
use crate::{TrainErr, error::Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Image(usize, usize, usize),
    Flat(usize),
}

/// Stacks layers while tracking the shape of a single sample, so every layer is created with
/// the sizes its input actually has.
#[derive(Debug)]
pub struct NetBuilder {
    shape: Shape,
    layers: Vec<Layer>,
    seed: u64,
}

impl NetBuilder {
    /// Creates a new `NetBuilder`.
    ///
    /// # Arguments
    /// * `image_shape` - The channels, height and width of an input image.
    /// * `seed` - Seed of the parameter initialization and dropout masks.
    pub fn new((channels, height, width): (usize, usize, usize), seed: u64) -> Self {
        Self {
            shape: Shape::Image(channels, height, width),
            layers: Vec::new(),
            seed,
        }
    }

    fn image(&self, op: &str) -> Result<(usize, usize, usize)> {
        match self.shape {
            Shape::Image(c, h, w) => Ok((c, h, w)),
            Shape::Flat(_) => Err(TrainErr::InvalidConfig(format!(
                "{op} needs an image input, found flat features"
            ))),
        }
    }

    pub fn conv(
        mut self,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        let (c, h, w) = self.image("convolution")?;
        let conv = Conv2d::new(c, out_channels, kernel_size, stride, padding)?;
        let (ho, wo) = conv.output_hw(h, w)?;

        self.shape = Shape::Image(out_channels, ho, wo);
        self.layers.push(Layer::Conv2d(conv));
        Ok(self)
    }

    pub fn relu(mut self) -> Self {
        self.layers.push(Layer::relu());
        self
    }

    pub fn max_pool(mut self) -> Result<Self> {
        let (c, h, w) = self.image("pooling")?;
        let (ho, wo) = MaxPool2d::output_hw(h, w)?;
        self.shape = Shape::Image(c, ho, wo);
        self.layers.push(Layer::max_pool());
        Ok(self)
    }

    pub fn dropout(mut self, p: f32) -> Result<Self> {
        let seed = self.seed.wrapping_add(self.layers.len() as u64 + 1);
        self.layers.push(Layer::dropout(p, seed)?);
        Ok(self)
    }

    pub fn flatten(mut self) -> Result<Self> {
        let (c, h, w) = self.image("flatten")?;
        self.shape = Shape::Flat(c * h * w);
        self.layers.push(Layer::flatten());
        Ok(self)
    }

    pub fn global_avg_pool(mut self) -> Result<Self> {
        let (c, _, _) = self.image("global pooling")?;
        self.shape = Shape::Flat(c);
        self.layers.push(Layer::global_avg_pool());
        Ok(self)
    }

    pub fn dense(mut self, out: usize) -> Result<Self> {
        let Shape::Flat(features) = self.shape else {
            return Err(TrainErr::InvalidConfig(
                "dense layers need flat features, flatten first".into(),
            ));
        };

        self.shape = Shape::Flat(out);
        self.layers.push(Layer::dense((features, out)));
        Ok(self)
    }

    pub fn residual(mut self, out_channels: usize, stride: usize) -> Result<Self> {
        let (c, h, w) = self.image("residual block")?;
        let block = Residual::new(c, out_channels, stride)?;
        let (ho, wo) = block.output_hw(h, w)?;

        self.shape = Shape::Image(block.out_channels(), ho, wo);
        self.layers.push(Layer::Residual(Box::new(block)));
        Ok(self)
    }

    /// Adds a bottleneck block with `width` inner channels and `width * 4` output channels.
    pub fn bottleneck(mut self, width: usize, stride: usize) -> Result<Self> {
        let (c, h, w) = self.image("bottleneck block")?;
        let block = Bottleneck::new(c, width, stride)?;
        let (ho, wo) = block.output_hw(h, w)?;

        self.shape = Shape::Image(block.out_channels(), ho, wo);
        self.layers.push(Layer::Bottleneck(Box::new(block)));
        Ok(self)
    }

    /// Builds the model with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `num_classes` - The width the last layer must have.
    ///
    /// # Returns
    /// The model, or an error if the stack doesn't end in `num_classes` flat features.
    pub fn build(self, num_classes: usize) -> Result<Sequential> {
        if self.shape != Shape::Flat(num_classes) {
            return Err(TrainErr::InvalidConfig(format!(
                "the network must end in {num_classes} class scores, ends in {:?}",
                self.shape
            )));
        }

        Sequential::new(self.layers, self.seed)
    }
}
