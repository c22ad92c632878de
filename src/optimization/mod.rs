mod adam;
mod optimizer;
mod resolver;
mod rmsprop;
mod sgd;

pub use adam::Adam;
pub use optimizer::Optimizer;
pub use resolver::{BoundOptimizer, OptimizerConfig, OptimizerKind, resolve};
pub use rmsprop::RmsProp;
pub use sgd::Sgd;
