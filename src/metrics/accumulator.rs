use super::ClassificationScores;
use crate::{TrainErr, data::Split, error::Result};

/// Running total of the training losses of an epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainAccumulator {
    loss: f32,
    batches: usize,
}

impl TrainAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds the loss of one batch.
    pub fn push(self, loss: f32) -> Self {
        Self {
            loss: self.loss + loss,
            batches: self.batches + 1,
        }
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Returns the average loss per batch.
    ///
    /// # Errors
    /// `EmptyDataset` if no batch was folded.
    pub fn finish(self) -> Result<f32> {
        if self.batches == 0 {
            return Err(TrainErr::EmptyDataset {
                split: Split::Train,
            });
        }

        Ok(self.loss / self.batches as f32)
    }
}

/// The per batch averages of a validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValidationAverages {
    pub loss: f32,
    pub scores: ClassificationScores,
}

/// Running totals of the validation loss and scores of an epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValAccumulator {
    loss: f32,
    accuracy: f32,
    recall: f32,
    precision: f32,
    batches: usize,
}

impl ValAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds the loss and scores of one batch.
    pub fn push(self, loss: f32, scores: ClassificationScores) -> Self {
        Self {
            loss: self.loss + loss,
            accuracy: self.accuracy + scores.accuracy,
            recall: self.recall + scores.recall,
            precision: self.precision + scores.precision,
            batches: self.batches + 1,
        }
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Returns every quantity averaged by the number of batches.
    ///
    /// # Errors
    /// `EmptyDataset` if no batch was folded.
    pub fn finish(self) -> Result<ValidationAverages> {
        if self.batches == 0 {
            return Err(TrainErr::EmptyDataset {
                split: Split::Validation,
            });
        }

        let n = self.batches as f32;
        Ok(ValidationAverages {
            loss: self.loss / n,
            scores: ClassificationScores {
                accuracy: self.accuracy / n,
                recall: self.recall / n,
                precision: self.precision / n,
            },
        })
    }
}
