mod json_sink;
mod log_sink;
mod sink;

pub use json_sink::JsonFileSink;
pub use log_sink::LogSink;
pub use sink::{ConfusionArtifact, Context, NoopSink, TelemetrySink};
