use std::sync::Arc;

use super::{Batch, ImageDataset};
use crate::{TrainErr, error::Result};

/// Splits a dataset into batches of a fixed size, always in the same order.
///
/// The last batch is shorter when the dataset size isn't a multiple of the batch size.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: Arc<ImageDataset>,
    batch_size: usize,
}

impl DataLoader {
    /// Creates a new `DataLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The samples to batch.
    /// * `batch_size` - The maximum amount of samples per batch.
    ///
    /// # Returns
    /// A new `DataLoader` or an error if `batch_size` is zero.
    pub fn new(dataset: Arc<ImageDataset>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(TrainErr::InvalidConfig("batch_size must be > 0".into()));
        }

        Ok(Self {
            dataset,
            batch_size,
        })
    }

    /// Returns the amount of batches a full pass yields.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new pass over the dataset.
    pub fn iter(&self) -> Batches<'_> {
        Batches {
            loader: self,
            cursor: 0,
        }
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = Result<Batch>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A single pass over a `DataLoader`.
pub struct Batches<'a> {
    loader: &'a DataLoader,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.loader.dataset.len();

        if self.cursor >= total {
            return None;
        }

        let end = (self.cursor + self.loader.batch_size).min(total);
        let batch = self.loader.dataset.batch(self.cursor, end);
        self.cursor = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.loader.dataset.len().saturating_sub(self.cursor);
        let n = left.div_ceil(self.loader.batch_size);
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> Arc<ImageDataset> {
        let pixels = (0..n).map(|i| i as f32).collect();
        let labels = (0..n).map(|i| i % 2).collect();
        Arc::new(ImageDataset::from_flat(pixels, labels, (1, 1, 1)).unwrap())
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(DataLoader::new(dataset(3), 0).is_err());
    }

    #[test]
    fn batches_respect_order_and_size() {
        let loader = DataLoader::new(dataset(5), 2).unwrap();
        assert_eq!(loader.len(), 3);

        let sizes: Vec<_> = loader.iter().map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, [2, 2, 1]);

        let first = loader.iter().next().unwrap().unwrap();
        assert_eq!(first.images()[[1, 0, 0, 0]], 1.);
    }

    #[test]
    fn every_pass_starts_over() {
        let loader = DataLoader::new(dataset(4), 4).unwrap();

        assert_eq!(loader.iter().count(), 1);
        assert_eq!(loader.iter().count(), 1);
    }

    #[test]
    fn empty_dataset_yields_no_batches() {
        let empty = ImageDataset::from_flat(vec![], vec![], (1, 2, 2)).unwrap();
        let loader = DataLoader::new(Arc::new(empty), 4).unwrap();

        assert!(loader.is_empty());
        assert!(loader.iter().next().is_none());
    }
}
