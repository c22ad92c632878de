use std::path::PathBuf;

use log::{debug, info, warn};
use ndarray::Array1;

use crate::{
    TrainErr,
    arch::{Mode, Model, loss::LossFn},
    data::{Batch, DataSource, Split},
    device::Device,
    error::Result,
    metrics::{
        ClassificationScores, ConfusionMatrix, EpochMetrics, TrainAccumulator, ValAccumulator,
        argmax_rows,
    },
    optimization::BoundOptimizer,
    storage::Storage,
    telemetry::{ConfusionArtifact, Context, TelemetrySink},
};

/// The labels and predictions of the last validation batch of an epoch.
struct LastBatch {
    labels: Array1<usize>,
    predictions: Array1<usize>,
    matrix: ConfusionMatrix,
}

/// Drives the epoch loop of a run: a training pass followed by a validation pass per epoch.
///
/// Data, reporting and persistence are collaborators borrowed for the lifetime of the
/// trainer; the model and optimizer are borrowed by each `run`.
pub struct Trainer<'a> {
    source: &'a dyn DataSource,
    telemetry: &'a mut dyn TelemetrySink,
    storage: &'a mut dyn Storage,
    model_path: PathBuf,
    history: Vec<EpochMetrics>,
}

impl<'a> Trainer<'a> {
    /// Creates a new `Trainer`.
    ///
    /// # Arguments
    /// * `source` - Provides the training and validation batches and the class count.
    /// * `telemetry` - Receives the metrics of every epoch.
    /// * `storage` - Receives the model parameters at the end of a saving run.
    /// * `model_path` - Where the parameters are stored.
    pub fn new<P: Into<PathBuf>>(
        source: &'a dyn DataSource,
        telemetry: &'a mut dyn TelemetrySink,
        storage: &'a mut dyn Storage,
        model_path: P,
    ) -> Self {
        Self {
            source,
            telemetry,
            storage,
            model_path: model_path.into(),
            history: Vec::new(),
        }
    }

    /// Returns the metrics of every epoch run so far.
    pub fn history(&self) -> &[EpochMetrics] {
        &self.history
    }

    /// Trains `model` for `num_epochs` epochs, validating it after each one.
    ///
    /// # Arguments
    /// * `model` - The model to train, left in evaluation mode.
    /// * `loss_fn` - The loss minimized by the training pass.
    /// * `optimizer` - An optimizer bound to `model`.
    /// * `num_epochs` - The amount of epochs, at least one.
    /// * `batch_size` - The maximum amount of samples per batch.
    /// * `save` - Whether to store the final parameters.
    ///
    /// # Returns
    /// The validation `[loss, accuracy, loss, precision]` of the last epoch.
    ///
    /// # Errors
    /// `EmptyDataset` if a pass yields no batches, `PersistenceFailure` (carrying the
    /// metrics) if the parameters can't be stored, or whatever error the model, loss or
    /// optimizer raise.
    pub fn run<M, L>(
        &mut self,
        model: &mut M,
        loss_fn: &L,
        optimizer: &mut BoundOptimizer,
        num_epochs: usize,
        batch_size: usize,
        save: bool,
    ) -> Result<Vec<f32>>
    where
        M: Model + ?Sized,
        L: LossFn + ?Sized,
    {
        if num_epochs == 0 {
            return Err(TrainErr::InvalidConfig("num_epochs must be > 0".into()));
        }

        info!("collecting training data");
        let train_loader = self.source.make_dataset(Split::Train, batch_size)?;

        let device = Device::select();
        model.to_device(device);

        let mut last = None;

        for epoch in 0..num_epochs {
            info!("starting epoch {epoch}");

            model.set_mode(Mode::Training);
            let train_loss = train_loader
                .iter()
                .try_fold(TrainAccumulator::new(), |acc, batch| -> Result<_> {
                    optimizer.zero_grad(model)?;
                    let batch = batch?.to(device);
                    let loss = train_step(model, loss_fn, optimizer, &batch)?;

                    debug!(epoch = epoch, batch = acc.batches(), loss = loss; "training batch");
                    Ok(acc.push(loss))
                })?
                .finish()?;

            model.set_mode(Mode::Evaluation);
            let val_loader = self.source.make_dataset(Split::Validation, batch_size)?;
            let num_classes = self.source.num_classes();

            let mut last_batch = None;
            let val = val_loader
                .iter()
                .try_fold(ValAccumulator::new(), |acc, batch| -> Result<_> {
                    let batch = batch?.to(device);
                    let (loss, scores, batch_result) =
                        validation_step(model, loss_fn, &batch, num_classes)?;

                    last_batch = Some(batch_result);
                    Ok(acc.push(loss, scores))
                })?
                .finish()?;

            let metrics = EpochMetrics::new(epoch, train_loss, val);
            info!(
                "Epoch: [{}/{num_epochs}], Average Training Loss: {:.2}, Average Validation_loss: {:.2}, Average Validation Accuracy: {:.2}, Average Validation Recall: {:.2}, Average Validation Precision: {:.2}",
                epoch + 1,
                metrics.train_loss,
                metrics.val_loss,
                metrics.val_accuracy,
                metrics.val_recall,
                metrics.val_precision,
            );

            if let Err(e) = self.telemetry.log_metrics(Context::Test, &metrics) {
                warn!("failed to report the metrics of epoch {epoch}: {e}");
            }

            if let Some(LastBatch {
                labels,
                predictions,
                matrix,
            }) = last_batch
            {
                let artifact = ConfusionArtifact::evaluation(&labels, &predictions, matrix);
                if let Err(e) = self.telemetry.log_confusion_matrix(&artifact) {
                    warn!("failed to report the confusion matrix of epoch {epoch}: {e}");
                }
            }

            self.history.push(metrics);
            last = Some(metrics);
        }

        if let Err(e) = self.telemetry.flush() {
            warn!("failed to flush telemetry: {e}");
        }

        let summary = last
            .map(|metrics| metrics.summary().to_vec())
            .unwrap_or_default();

        if save {
            let blob = model.state_dict()?;
            self.storage
                .save(&blob, &self.model_path)
                .map_err(|source| TrainErr::PersistenceFailure {
                    path: self.model_path.clone(),
                    source,
                    metrics: summary.clone(),
                })?;
        }

        info!("finished training");
        Ok(summary)
    }
}

fn check_device<M: Model + ?Sized>(model: &M, batch: &Batch) -> Result<()> {
    if model.device() != batch.device() {
        return Err(TrainErr::DeviceMismatch {
            model: model.device(),
            batch: batch.device(),
        });
    }

    Ok(())
}

/// Forward, backward and one optimizer step over `batch`, returning its loss.
fn train_step<M, L>(
    model: &mut M,
    loss_fn: &L,
    optimizer: &mut BoundOptimizer,
    batch: &Batch,
) -> Result<f32>
where
    M: Model + ?Sized,
    L: LossFn + ?Sized,
{
    check_device(model, batch)?;

    let scores = model.forward(batch.images())?;
    let loss = loss_fn.loss(scores.view(), batch.labels())?;
    let d = loss_fn.loss_prime(scores.view(), batch.labels())?;

    model.backward(d)?;
    optimizer.step(model)?;
    Ok(loss)
}

fn validation_step<M, L>(
    model: &mut M,
    loss_fn: &L,
    batch: &Batch,
    num_classes: usize,
) -> Result<(f32, ClassificationScores, LastBatch)>
where
    M: Model + ?Sized,
    L: LossFn + ?Sized,
{
    check_device(model, batch)?;

    let scores = model.forward(batch.images())?;
    let loss = loss_fn.loss(scores.view(), batch.labels())?;

    let predictions = argmax_rows(scores.view());
    let matrix = ConfusionMatrix::from_predictions(predictions.view(), batch.labels(), num_classes)?;
    let batch_scores = ClassificationScores::macro_average(&matrix);

    Ok((
        loss,
        batch_scores,
        LastBatch {
            labels: batch.labels().to_owned(),
            predictions,
            matrix,
        },
    ))
}
