use std::{fmt, io};

use ndarray::Array1;
use serde::Serialize;

use crate::metrics::{ConfusionMatrix, EpochMetrics};

/// The phase metrics are reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Test,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Test => write!(f, "test"),
        }
    }
}

/// A confusion matrix ready to be reported, with the raw labels and predictions it was
/// built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionArtifact {
    pub title: String,
    pub file_name: String,
    pub y_true: Vec<usize>,
    pub y_predicted: Vec<usize>,
    pub matrix: ConfusionMatrix,
}

impl ConfusionArtifact {
    pub const EVALUATION_TITLE: &'static str = "Confusion Matrix: Evaluation";
    pub const EVALUATION_FILE: &'static str = "confusion-matrix.json";

    /// The artifact reported after every validation pass.
    pub fn evaluation(
        y_true: &Array1<usize>,
        y_predicted: &Array1<usize>,
        matrix: ConfusionMatrix,
    ) -> Self {
        Self {
            title: Self::EVALUATION_TITLE.to_string(),
            file_name: Self::EVALUATION_FILE.to_string(),
            y_true: y_true.to_vec(),
            y_predicted: y_predicted.to_vec(),
            matrix,
        }
    }
}

/// Where the metrics and artifacts of a run are reported.
///
/// Reporting failures are not fatal to a run; whoever drives the sink decides what to do with
/// them.
pub trait TelemetrySink {
    fn log_metrics(&mut self, context: Context, metrics: &EpochMetrics) -> io::Result<()>;

    fn log_confusion_matrix(&mut self, artifact: &ConfusionArtifact) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn log_metrics(&mut self, context: Context, metrics: &EpochMetrics) -> io::Result<()> {
        (**self).log_metrics(context, metrics)
    }

    fn log_confusion_matrix(&mut self, artifact: &ConfusionArtifact) -> io::Result<()> {
        (**self).log_confusion_matrix(artifact)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn log_metrics(&mut self, _context: Context, _metrics: &EpochMetrics) -> io::Result<()> {
        Ok(())
    }

    fn log_confusion_matrix(&mut self, _artifact: &ConfusionArtifact) -> io::Result<()> {
        Ok(())
    }
}
