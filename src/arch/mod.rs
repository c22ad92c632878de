mod architecture;
mod builder;
mod init;
pub mod layers;
pub mod loss;
mod mode;
mod model;
mod params;
mod sequential;
mod state;

pub use architecture::{Architecture, ConvLayerSpec, ResNetVariant};
pub use builder::NetBuilder;
pub use mode::Mode;
pub use model::{Model, ParamsId};
pub use params::{BackIter, FrontIter};
pub use sequential::Sequential;
pub use state::{TensorSpec, serialize_state};
