use ndarray::{Array1, Array4, Axis, s};

use super::Batch;
use crate::{TrainErr, error::Result};

/// An in-memory collection of labeled images stored as a single `N×C×H×W` tensor.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    images: Array4<f32>,
    labels: Vec<usize>,
}

impl ImageDataset {
    /// Creates a new `ImageDataset`.
    ///
    /// # Arguments
    /// * `images` - The images, the first axis indexes the samples.
    /// * `labels` - One class index per image.
    ///
    /// # Returns
    /// A new `ImageDataset` or an error if the amounts of images and labels differ.
    pub fn new(images: Array4<f32>, labels: Vec<usize>) -> Result<Self> {
        let n = images.len_of(Axis(0));

        if n != labels.len() {
            return Err(TrainErr::SizeMismatch {
                what: "dataset labels",
                got: labels.len(),
                expected: n,
            });
        }

        Ok(Self { images, labels })
    }

    /// Creates a new `ImageDataset` from flat row-major pixel values.
    ///
    /// # Arguments
    /// * `pixels` - `len(labels) * channels * height * width` values.
    /// * `labels` - One class index per image.
    /// * `shape` - The `(channels, height, width)` of every image.
    pub fn from_flat(
        pixels: Vec<f32>,
        labels: Vec<usize>,
        (channels, height, width): (usize, usize, usize),
    ) -> Result<Self> {
        let images = Array4::from_shape_vec((labels.len(), channels, height, width), pixels)?;
        Self::new(images, labels)
    }

    /// Returns the amount of samples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the `(channels, height, width)` of the images.
    pub fn image_shape(&self) -> (usize, usize, usize) {
        let (_, c, h, w) = self.images.dim();
        (c, h, w)
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Copies the samples in `start..end` into a new batch.
    pub(super) fn batch(&self, start: usize, end: usize) -> Result<Batch> {
        let images = self.images.slice(s![start..end, .., .., ..]).to_owned();
        let labels = Array1::from_vec(self.labels[start..end].to_vec());
        Batch::new(images, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_flat_checks_the_pixel_count() {
        let res = ImageDataset::from_flat(vec![0.; 7], vec![0, 1], (1, 2, 2));
        assert!(matches!(res, Err(TrainErr::Shape(_))));
    }

    #[test]
    fn batch_copies_the_requested_range() {
        let pixels = (0..12).map(|i| i as f32).collect();
        let dataset = ImageDataset::from_flat(pixels, vec![0, 1, 2], (1, 2, 2)).unwrap();

        let batch = dataset.batch(1, 3).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.labels().to_vec(), [1, 2]);
        assert_eq!(batch.images()[[0, 0, 0, 0]], 4.);
        assert_eq!(batch.images()[[1, 0, 1, 1]], 11.);
    }
}
