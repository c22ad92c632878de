use std::{error::Error, fmt, io, path::PathBuf};

use ndarray::ShapeError;

use crate::{data::Split, device::Device};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Training pipeline failures.
#[derive(Debug)]
pub enum TrainErr {
    /// The requested optimizer identifier is not recognized.
    UnsupportedOptimizer { name: String },
    /// The requested model identifier is not recognized.
    UnsupportedArchitecture { name: String },
    /// A data provider yielded zero batches for an epoch.
    EmptyDataset { split: Split },
    /// Writing the model parameters to durable storage failed. The metrics of the
    /// run were already computed and travel with the error.
    PersistenceFailure {
        path: PathBuf,
        source: io::Error,
        metrics: Vec<f32>,
    },
    /// The optimizer was used on a model it was not bound to.
    OptimizerNotBound,
    /// A backward pass was requested while the model was in evaluation mode.
    GradientsDisabled,
    DeviceMismatch {
        model: Device,
        batch: Device,
    },
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    InvalidConfig(String),
    InvalidDataset(String),
    Serialization(String),
    Io(io::Error),
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::UnsupportedOptimizer { name } => write!(
                f,
                "unsupported optimizer '{name}', consider using the Adam, SGD, or RMSprop optimizers"
            ),
            TrainErr::UnsupportedArchitecture { name } => write!(
                f,
                "unsupported architecture '{name}', use \"base\", \"bigger\", \"dynamic\" or the name of a ResNet"
            ),
            TrainErr::EmptyDataset { split } => {
                write!(f, "the {split} data provider yielded no batches")
            }
            TrainErr::PersistenceFailure { path, source, .. } => {
                write!(f, "failed to save the model to {}: {source}", path.display())
            }
            TrainErr::OptimizerNotBound => {
                write!(f, "the optimizer is bound to a different model's parameters")
            }
            TrainErr::GradientsDisabled => {
                write!(f, "gradients are disabled while the model is in evaluation mode")
            }
            TrainErr::DeviceMismatch { model, batch } => {
                write!(f, "device mismatch: model is on {model}, batch is on {batch}")
            }
            TrainErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "size mismatch for {what}: got {got}, expected {expected}"
            ),
            TrainErr::Shape(e) => write!(f, "shape error: {e}"),
            TrainErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            TrainErr::InvalidDataset(msg) => write!(f, "invalid dataset: {msg}"),
            TrainErr::Serialization(msg) => write!(f, "serialization error: {msg}"),
            TrainErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::PersistenceFailure { source, .. } => Some(source),
            TrainErr::Shape(e) => Some(e),
            TrainErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ShapeError> for TrainErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}
