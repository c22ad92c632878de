use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use super::{ConfusionArtifact, Context, TelemetrySink};
use crate::metrics::EpochMetrics;

/// Appends one JSON object per reported epoch to `metrics.jsonl` and writes every confusion
/// matrix to its own file, all inside one directory.
#[derive(Debug)]
pub struct JsonFileSink {
    dir: PathBuf,
    metrics: BufWriter<File>,
}

impl JsonFileSink {
    pub const METRICS_FILE: &'static str = "metrics.jsonl";

    /// Creates a new `JsonFileSink`, creating `dir` if needed.
    ///
    /// # Arguments
    /// * `dir` - The directory all files are written to.
    pub fn create<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(Self::METRICS_FILE))?;

        Ok(Self {
            dir,
            metrics: BufWriter::new(file),
        })
    }
}

impl TelemetrySink for JsonFileSink {
    fn log_metrics(&mut self, context: Context, metrics: &EpochMetrics) -> io::Result<()> {
        let mut line: BTreeMap<&str, serde_json::Value> = metrics
            .named()
            .into_iter()
            .map(|(name, value)| (name, value.into()))
            .collect();
        line.insert("Epoch", metrics.epoch.into());
        line.insert("context", context.to_string().into());

        serde_json::to_writer(&mut self.metrics, &line)?;
        self.metrics.write_all(b"\n")?;
        self.metrics.flush()
    }

    fn log_confusion_matrix(&mut self, artifact: &ConfusionArtifact) -> io::Result<()> {
        let file = File::create(self.dir.join(&artifact.file_name))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, artifact)?;
        writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.metrics.flush()
    }
}
