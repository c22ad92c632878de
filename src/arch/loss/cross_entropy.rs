use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::LossFn;
use crate::{TrainErr, error::Result};

/// Softmax cross entropy loss function, averaged over the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    fn check(scores: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<()> {
        if scores.nrows() != labels.len() {
            return Err(TrainErr::SizeMismatch {
                what: "labels",
                got: labels.len(),
                expected: scores.nrows(),
            });
        }

        if scores.nrows() == 0 {
            return Err(TrainErr::SizeMismatch {
                what: "batch",
                got: 0,
                expected: 1,
            });
        }

        if let Some(&label) = labels.iter().find(|&&l| l >= scores.ncols()) {
            return Err(TrainErr::SizeMismatch {
                what: "label",
                got: label,
                expected: scores.ncols(),
            });
        }

        Ok(())
    }
}

/// Row wise softmax, shifted by each row's maximum.
fn softmax(scores: ArrayView2<f32>) -> Array2<f32> {
    let mut probs = scores.to_owned();

    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }

    probs
}

impl LossFn for CrossEntropy {
    fn loss(&self, scores: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<f32> {
        Self::check(scores, labels)?;

        let total: f32 = scores
            .axis_iter(Axis(0))
            .zip(labels)
            .map(|(row, &label)| {
                let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                let log_sum = row.mapv(|v| (v - max).exp()).sum().ln() + max;
                log_sum - row[label]
            })
            .sum();

        Ok(total / labels.len() as f32)
    }

    fn loss_prime(&self, scores: ArrayView2<f32>, labels: ArrayView1<usize>) -> Result<Array2<f32>> {
        Self::check(scores, labels)?;

        let n = labels.len() as f32;
        let mut d = softmax(scores);
        for (mut row, &label) in d.axis_iter_mut(Axis(0)).zip(labels) {
            row[label] -= 1.;
        }

        Ok(d / n)
    }
}
