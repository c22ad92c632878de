mod accumulator;
mod confusion;
mod record;
mod scores;

pub use accumulator::{TrainAccumulator, ValAccumulator, ValidationAverages};
pub use confusion::ConfusionMatrix;
pub use record::EpochMetrics;
pub use scores::{ClassificationScores, argmax_rows};
