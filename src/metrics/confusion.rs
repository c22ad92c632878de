use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Serialize, Serializer};

use crate::{TrainErr, error::Result};

/// Counts of (true class, predicted class) pairs: rows are true classes, columns predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Array2<u64>,
}

impl ConfusionMatrix {
    /// Builds the matrix of a batch.
    ///
    /// # Arguments
    /// * `predictions` - The predicted class of every sample.
    /// * `labels` - The true class of every sample.
    /// * `num_classes` - The amount of classes.
    ///
    /// # Returns
    /// The matrix or an error if the vectors differ in length or a class is out of range.
    pub fn from_predictions(
        predictions: ArrayView1<usize>,
        labels: ArrayView1<usize>,
        num_classes: usize,
    ) -> Result<Self> {
        if predictions.len() != labels.len() {
            return Err(TrainErr::SizeMismatch {
                what: "predictions",
                got: predictions.len(),
                expected: labels.len(),
            });
        }

        let mut counts = Array2::zeros((num_classes, num_classes));

        for (&predicted, &actual) in predictions.iter().zip(labels) {
            let class = predicted.max(actual);
            if class >= num_classes {
                return Err(TrainErr::SizeMismatch {
                    what: "class index",
                    got: class,
                    expected: num_classes,
                });
            }

            counts[[actual, predicted]] += 1;
        }

        Ok(Self { counts })
    }

    pub fn num_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn counts(&self) -> ArrayView2<'_, u64> {
        self.counts.view()
    }

    pub fn true_positives(&self, class: usize) -> u64 {
        self.counts[[class, class]]
    }

    /// Samples predicted as `class` that belong to another one.
    pub fn false_positives(&self, class: usize) -> u64 {
        self.counts.index_axis(Axis(1), class).sum() - self.true_positives(class)
    }

    /// Samples of `class` predicted as another one.
    pub fn false_negatives(&self, class: usize) -> u64 {
        self.counts.index_axis(Axis(0), class).sum() - self.true_positives(class)
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }
}

impl Serialize for ConfusionMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let rows: Vec<Vec<u64>> = self
            .counts
            .axis_iter(Axis(0))
            .map(|row| row.to_vec())
            .collect();

        rows.serialize(serializer)
    }
}
