use std::fmt;

use ndarray::ArrayD;
use rand::Rng;

use super::{Bottleneck, Conv2d, Dense, Dropout, Flatten, GlobalAvgPool, MaxPool2d, Relu, Residual};
use crate::{
    arch::{Mode, TensorSpec},
    error::Result,
};

pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Relu(Relu),
    Dropout(Dropout),
    Flatten(Flatten),
    Dense(Dense),
    GlobalAvgPool(GlobalAvgPool),
    Residual(Box<Residual>),
    Bottleneck(Box<Bottleneck>),
}
use Layer::*;

impl Layer {
    pub fn conv2d(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        Ok(Conv2d(super::Conv2d::new(
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
        )?))
    }

    pub fn max_pool() -> Self {
        MaxPool2d(super::MaxPool2d::new())
    }

    pub fn relu() -> Self {
        Relu(super::Relu::new())
    }

    pub fn dropout(p: f32, seed: u64) -> Result<Self> {
        Ok(Dropout(super::Dropout::new(p, seed)?))
    }

    pub fn flatten() -> Self {
        Flatten(super::Flatten::new())
    }

    pub fn dense(dim: (usize, usize)) -> Self {
        Dense(super::Dense::new(dim))
    }

    pub fn global_avg_pool() -> Self {
        GlobalAvgPool(super::GlobalAvgPool::new())
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Conv2d(l) => l.size(),
            Dense(l) => l.size(),
            Residual(l) => l.size(),
            Bottleneck(l) => l.size(),
            MaxPool2d(_) | Relu(_) | Dropout(_) | Flatten(_) | GlobalAvgPool(_) => 0,
        }
    }

    /// Writes the initial values of this layer's parameters.
    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            Conv2d(l) => l.init(params, rng),
            Dense(l) => l.init(params, rng),
            Residual(l) => l.init(params, rng),
            Bottleneck(l) => l.init(params, rng),
            _ => Ok(()),
        }
    }

    /// Names and shapes of this layer's parameter groups, prefixed by `prefix`.
    pub fn tensors(&self, prefix: &str) -> Vec<TensorSpec> {
        match self {
            Conv2d(l) => l.tensors(prefix),
            Dense(l) => l.tensors(prefix),
            Residual(l) => l.tensors(prefix),
            Bottleneck(l) => l.tensors(prefix),
            _ => Vec::new(),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayD<f32>, mode: Mode) -> Result<ArrayD<f32>> {
        match self {
            Conv2d(l) => l.forward(params, x, mode),
            MaxPool2d(l) => l.forward(x, mode),
            Relu(l) => l.forward(x, mode),
            Dropout(l) => l.forward(x, mode),
            Flatten(l) => l.forward(x, mode),
            Dense(l) => l.forward(params, x, mode),
            GlobalAvgPool(l) => l.forward(x, mode),
            Residual(l) => l.forward(params, x, mode),
            Bottleneck(l) => l.forward(params, x, mode),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        match self {
            Conv2d(l) => l.backward(params, grad, d),
            MaxPool2d(l) => l.backward(d),
            Relu(l) => l.backward(d),
            Dropout(l) => l.backward(d),
            Flatten(l) => l.backward(d),
            Dense(l) => l.backward(params, grad, d),
            GlobalAvgPool(l) => l.backward(d),
            Residual(l) => l.backward(params, grad, d),
            Bottleneck(l) => l.backward(params, grad, d),
        }
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Conv2d(_) => "Conv2d",
            MaxPool2d(_) => "MaxPool2d",
            Relu(_) => "Relu",
            Dropout(_) => "Dropout",
            Flatten(_) => "Flatten",
            Dense(_) => "Dense",
            GlobalAvgPool(_) => "GlobalAvgPool",
            Residual(_) => "Residual",
            Bottleneck(_) => "Bottleneck",
        };

        write!(f, "{name}")
    }
}
