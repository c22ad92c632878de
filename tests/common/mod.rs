#![allow(dead_code)]

use std::{
    io,
    path::{Path, PathBuf},
};

use cnn_trainer::{
    data::{ImageDataset, InMemoryDataSource},
    metrics::EpochMetrics,
    storage::Storage,
    telemetry::{ConfusionArtifact, Context, TelemetrySink},
};

pub const SHAPE: (usize, usize, usize) = (1, 4, 4);
pub const NUM_CLASSES: usize = 3;

/// `n` images where class `k` lights up row `k` of the image.
pub fn dataset(n: usize) -> ImageDataset {
    let (c, h, w) = SHAPE;
    let labels: Vec<usize> = (0..n).map(|i| i % NUM_CLASSES).collect();
    let pixels = labels
        .iter()
        .enumerate()
        .flat_map(|(i, &label)| {
            (0..c * h * w).map(move |p| {
                let row = p / w;
                if row == label {
                    1.0
                } else {
                    0.05 * ((i + p) % 3) as f32
                }
            })
        })
        .collect();

    ImageDataset::from_flat(pixels, labels, SHAPE).unwrap()
}

pub fn source(train: usize, val: usize) -> InMemoryDataSource {
    InMemoryDataSource::new(dataset(train), dataset(val), NUM_CLASSES).unwrap()
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub metrics: Vec<(Context, EpochMetrics)>,
    pub artifacts: Vec<ConfusionArtifact>,
}

impl TelemetrySink for RecordingSink {
    fn log_metrics(&mut self, context: Context, metrics: &EpochMetrics) -> io::Result<()> {
        self.metrics.push((context, *metrics));
        Ok(())
    }

    fn log_confusion_matrix(&mut self, artifact: &ConfusionArtifact) -> io::Result<()> {
        self.artifacts.push(artifact.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingStorage {
    pub writes: Vec<(Vec<u8>, PathBuf)>,
}

impl Storage for RecordingStorage {
    fn save(&mut self, blob: &[u8], path: &Path) -> io::Result<()> {
        self.writes.push((blob.to_vec(), path.to_path_buf()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FailingStorage;

impl Storage for FailingStorage {
    fn save(&mut self, _blob: &[u8], _path: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }
}
