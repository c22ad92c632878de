pub mod arch;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod metrics;
pub mod optimization;
pub mod storage;
pub mod telemetry;
pub mod training;

pub use error::{Result, TrainErr};
