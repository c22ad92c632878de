mod bottleneck;
mod conv;
mod dense;
mod dropout;
mod flatten;
mod global_pool;
mod layer;
mod pool;
mod relu;
mod residual;

pub use bottleneck::Bottleneck;
pub use conv::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use global_pool::GlobalAvgPool;
pub use layer::Layer;
pub use pool::MaxPool2d;
pub use relu::Relu;
pub use residual::Residual;
