use ndarray::{Array1, ArrayView2, Axis};

use super::ConfusionMatrix;

/// Macro averaged classification scores of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassificationScores {
    pub accuracy: f32,
    pub recall: f32,
    pub precision: f32,
}

fn ratio(num: u64, den: u64) -> f32 {
    if den == 0 { 0. } else { num as f32 / den as f32 }
}

impl ClassificationScores {
    /// Averages the per class scores of `cm`, every class weighing the same.
    ///
    /// Classes that neither occur nor are predicted are left out of the average and a class
    /// whose ratio is undefined scores zero. Macro accuracy is the mean per class recall.
    pub fn macro_average(cm: &ConfusionMatrix) -> Self {
        let (mut recall, mut precision, mut present) = (0., 0., 0usize);

        for class in 0..cm.num_classes() {
            let tp = cm.true_positives(class);
            let fp = cm.false_positives(class);
            let fn_ = cm.false_negatives(class);

            if tp + fp + fn_ == 0 {
                continue;
            }

            present += 1;
            recall += ratio(tp, tp + fn_);
            precision += ratio(tp, tp + fp);
        }

        if present == 0 {
            return Self::default();
        }

        let present = present as f32;
        Self {
            accuracy: recall / present,
            recall: recall / present,
            precision: precision / present,
        }
    }
}

/// Returns the index of the highest score of every row, the first one on ties.
pub fn argmax_rows(scores: ArrayView2<f32>) -> Array1<usize> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best_at, best), (i, &v)| {
                    if v > best { (i, v) } else { (best_at, best) }
                })
                .0
        })
        .collect()
}
