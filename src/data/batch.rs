use ndarray::{Array1, Array4, ArrayView1, ArrayView4};

use crate::{TrainErr, device::Device, error::Result};

/// A group of images (`N×C×H×W`) with their class labels, tagged with the device it lives on.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    images: Array4<f32>,
    labels: Array1<usize>,
    device: Device,
}

impl Batch {
    /// Creates a new `Batch` on the default device.
    ///
    /// # Arguments
    /// * `images` - The input images, one per row of the first axis.
    /// * `labels` - The class index of each image.
    ///
    /// # Returns
    /// A new `Batch` or an error if there isn't exactly one label per image.
    pub fn new(images: Array4<f32>, labels: Array1<usize>) -> Result<Self> {
        let n = images.len_of(ndarray::Axis(0));

        if n != labels.len() {
            return Err(TrainErr::SizeMismatch {
                what: "batch labels",
                got: labels.len(),
                expected: n,
            });
        }

        Ok(Self {
            images,
            labels,
            device: Device::default(),
        })
    }

    /// Moves the batch to `device`.
    pub fn to(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn images(&self) -> ArrayView4<'_, f32> {
        self.images.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, usize> {
        self.labels.view()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Returns the amount of samples in this batch.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_must_match_images() {
        let images = Array4::zeros((3, 1, 2, 2));
        let labels = Array1::from_vec(vec![0, 1]);

        let err = Batch::new(images, labels).unwrap_err();
        assert!(matches!(
            err,
            TrainErr::SizeMismatch {
                got: 2,
                expected: 3,
                ..
            }
        ));
    }

    #[test]
    fn moving_keeps_contents() {
        let images = Array4::from_elem((2, 1, 1, 1), 0.5);
        let labels = Array1::from_vec(vec![1, 0]);
        let batch = Batch::new(images, labels).unwrap().to(Device::Cpu);

        assert_eq!(batch.device(), Device::Cpu);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.labels().to_vec(), [1, 0]);
    }
}
