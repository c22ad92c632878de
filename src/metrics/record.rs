use serde::Serialize;

use super::ValidationAverages;

/// The metrics of one finished epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
    pub val_recall: f32,
    pub val_precision: f32,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f32, val: ValidationAverages) -> Self {
        Self {
            epoch,
            train_loss,
            val_loss: val.loss,
            val_accuracy: val.scores.accuracy,
            val_recall: val.scores.recall,
            val_precision: val.scores.precision,
        }
    }

    /// The metrics under the names they are reported with.
    pub fn named(&self) -> [(&'static str, f32); 6] {
        [
            ("Epoch", self.epoch as f32),
            ("Average Training Loss", self.train_loss),
            ("Average Validation_loss", self.val_loss),
            ("Average Validation Accuracy", self.val_accuracy),
            ("Average Validation Recall", self.val_recall),
            ("Average Validation Precision", self.val_precision),
        ]
    }

    /// The summary a run returns: `[loss, accuracy, loss, precision]` of the validation pass.
    ///
    /// The loss appears twice and the recall not at all; callers index into this layout.
    pub fn summary(&self) -> [f32; 4] {
        [
            self.val_loss,
            self.val_accuracy,
            self.val_loss,
            self.val_precision,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ClassificationScores;

    #[test]
    fn summary_repeats_the_loss_in_place_of_the_recall() {
        let metrics = EpochMetrics::new(
            3,
            0.9,
            ValidationAverages {
                loss: 0.4,
                scores: ClassificationScores {
                    accuracy: 0.7,
                    recall: 0.6,
                    precision: 0.5,
                },
            },
        );

        assert_eq!(metrics.summary(), [0.4, 0.7, 0.4, 0.5]);
        assert_eq!(metrics.named()[0], ("Epoch", 3.));
    }
}
