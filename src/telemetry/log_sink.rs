use std::io;

use log::info;

use super::{ConfusionArtifact, Context, TelemetrySink};
use crate::metrics::EpochMetrics;

/// Reports through the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn log_metrics(&mut self, context: Context, metrics: &EpochMetrics) -> io::Result<()> {
        info!(
            epoch = metrics.epoch,
            train_loss = metrics.train_loss,
            val_loss = metrics.val_loss,
            val_accuracy = metrics.val_accuracy,
            val_recall = metrics.val_recall,
            val_precision = metrics.val_precision;
            "{context} metrics"
        );

        Ok(())
    }

    fn log_confusion_matrix(&mut self, artifact: &ConfusionArtifact) -> io::Result<()> {
        let rows = serde_json::to_string(&artifact.matrix)?;
        info!("{}: {rows}", artifact.title);
        Ok(())
    }
}
