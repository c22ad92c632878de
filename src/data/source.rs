use std::{fmt, fs, path::Path, sync::Arc};

use super::{DataLoader, ImageDataset};
use crate::{TrainErr, error::Result};

/// The portion of the data a loader is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Validation,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "training"),
            Split::Validation => write!(f, "validation"),
        }
    }
}

/// Provides the batched data and the class count of an image-classification problem.
pub trait DataSource {
    /// Builds a fresh loader over `split`. Every call starts a new, re-enumerable pass.
    ///
    /// # Arguments
    /// * `split` - Which portion of the data to load.
    /// * `batch_size` - The maximum amount of samples per batch.
    fn make_dataset(&self, split: Split, batch_size: usize) -> Result<DataLoader>;

    /// Returns the amount of classes the labels range over.
    fn num_classes(&self) -> usize;

    /// Returns the `(channels, height, width)` of the images.
    fn image_shape(&self) -> (usize, usize, usize);
}

/// A data source backed by two datasets already in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataSource {
    train: Arc<ImageDataset>,
    val: Arc<ImageDataset>,
    num_classes: usize,
}

impl InMemoryDataSource {
    /// Creates a new `InMemoryDataSource`.
    ///
    /// # Returns
    /// A new instance or an error if the splits disagree on the image shape, a label is out
    /// of range or `num_classes` is zero while there are samples.
    pub fn new(train: ImageDataset, val: ImageDataset, num_classes: usize) -> Result<Self> {
        if num_classes == 0 && !(train.is_empty() && val.is_empty()) {
            return Err(TrainErr::InvalidDataset("num_classes must be > 0".into()));
        }

        if !train.is_empty() && !val.is_empty() && train.image_shape() != val.image_shape() {
            return Err(TrainErr::InvalidDataset(format!(
                "training images are {:?} but validation images are {:?}",
                train.image_shape(),
                val.image_shape()
            )));
        }

        let max_label = train.labels().iter().chain(val.labels()).max();
        if let Some(&label) = max_label.filter(|&&l| l >= num_classes) {
            return Err(TrainErr::InvalidDataset(format!(
                "label {label} is out of range for {num_classes} classes"
            )));
        }

        Ok(Self {
            train: Arc::new(train),
            val: Arc::new(val),
            num_classes,
        })
    }
}

impl DataSource for InMemoryDataSource {
    fn make_dataset(&self, split: Split, batch_size: usize) -> Result<DataLoader> {
        let dataset = match split {
            Split::Train => Arc::clone(&self.train),
            Split::Validation => Arc::clone(&self.val),
        };

        DataLoader::new(dataset, batch_size)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn image_shape(&self) -> (usize, usize, usize) {
        if self.train.is_empty() {
            self.val.image_shape()
        } else {
            self.train.image_shape()
        }
    }
}

/// A data source read from `train.csv` and `val.csv` inside a directory.
///
/// Every non-empty line is `label,p0,p1,...` with `channels * height * width` pixel values
/// in channel-major order.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    inner: InMemoryDataSource,
}

impl CsvDataSource {
    pub const TRAIN_FILE: &str = "train.csv";
    pub const VAL_FILE: &str = "val.csv";

    /// Reads both splits from `dir`.
    ///
    /// # Arguments
    /// * `dir` - The directory holding the csv files.
    /// * `shape` - The `(channels, height, width)` of every image.
    ///
    /// The class count is one past the largest label of either split.
    ///
    /// # Returns
    /// The data source or an error if a file can't be read or parsed.
    pub fn open<P: AsRef<Path>>(dir: P, shape: (usize, usize, usize)) -> Result<Self> {
        let dir = dir.as_ref();
        let train = read_csv(&dir.join(Self::TRAIN_FILE), shape)?;
        let val = read_csv(&dir.join(Self::VAL_FILE), shape)?;

        let num_classes = train
            .labels()
            .iter()
            .chain(val.labels())
            .max()
            .map_or(0, |&max| max + 1);
        log::info!(
            "loaded {} training and {} validation images over {num_classes} classes",
            train.len(),
            val.len()
        );

        let inner = InMemoryDataSource::new(train, val, num_classes)?;
        Ok(Self { inner })
    }
}

impl DataSource for CsvDataSource {
    fn make_dataset(&self, split: Split, batch_size: usize) -> Result<DataLoader> {
        self.inner.make_dataset(split, batch_size)
    }

    fn num_classes(&self) -> usize {
        self.inner.num_classes()
    }

    fn image_shape(&self) -> (usize, usize, usize) {
        self.inner.image_shape()
    }
}

fn read_csv(path: &Path, shape: (usize, usize, usize)) -> Result<ImageDataset> {
    let content = fs::read_to_string(path).map_err(|e| {
        TrainErr::InvalidDataset(format!("cannot read '{}': {e}", path.display()))
    })?;

    parse_csv(&content, shape)
}

fn parse_csv(content: &str, shape: (usize, usize, usize)) -> Result<ImageDataset> {
    let (c, h, w) = shape;
    let row_size = c * h * w;
    let mut pixels = Vec::new();
    let mut labels = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut values = line.split(',').map(str::trim);

        let label = values
            .next()
            .and_then(|v| v.parse::<usize>().ok())
            .ok_or_else(|| TrainErr::InvalidDataset(format!("line {i}: invalid label")))?;

        let row = values
            .map(|v| {
                v.parse::<f32>().map_err(|_| {
                    TrainErr::InvalidDataset(format!("line {i}: cannot parse '{v}' as f32"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if row.len() != row_size {
            return Err(TrainErr::InvalidDataset(format!(
                "line {i}: expected {row_size} pixel values ({c}x{h}x{w}), got {}",
                row.len()
            )));
        }

        labels.push(label);
        pixels.extend(row);
    }

    ImageDataset::from_flat(pixels, labels, shape)
}
