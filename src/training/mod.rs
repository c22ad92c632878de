mod train;
mod trainer;
mod tuning;

pub use train::{TrainOutcome, train};
pub use trainer::Trainer;
pub use tuning::{Trial, TrialParams, TuningReport, optimize_hyperparams};
