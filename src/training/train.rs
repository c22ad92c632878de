use log::info;

use super::{Trainer, TuningReport, optimize_hyperparams};
use crate::{
    TrainErr,
    arch::{Architecture, Sequential, loss::CrossEntropy},
    config::RunConfig,
    data::{DataSource, Split},
    error::Result,
    metrics::EpochMetrics,
    optimization,
    storage::Storage,
    telemetry::TelemetrySink,
};

/// What a call to `train` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    /// A single model was trained and stored.
    Trained {
        /// The validation `[loss, accuracy, loss, precision]` of the last epoch.
        metrics: Vec<f32>,
        history: Vec<EpochMetrics>,
    },
    /// A hyperparameter search was run instead.
    Tuned(TuningReport),
}

/// Builds the configured network for the images and classes of `source`.
pub(super) fn build_model(
    config: &RunConfig,
    source: &dyn DataSource,
    dropout: Option<f32>,
    seed: u64,
) -> Result<Sequential> {
    Architecture::parse(&config.model_name, config.dynamic_layers.clone(), dropout)?.build(
        source.image_shape(),
        source.num_classes(),
        seed,
    )
}

/// Trains the configured model, or searches for its best hyperparameters when tuning is on.
///
/// An untuned run trains with cross entropy and stores the final parameters at
/// `config.model_path`.
///
/// # Arguments
/// * `config` - The run configuration.
/// * `source` - Provides the data and the class count.
/// * `telemetry` - Receives the metrics of every epoch.
/// * `storage` - Receives the final parameters.
pub fn train(
    config: &RunConfig,
    source: &dyn DataSource,
    telemetry: &mut dyn TelemetrySink,
    storage: &mut dyn Storage,
) -> Result<TrainOutcome> {
    config.validate()?;

    // No samples means no classes to build a network for.
    if source.make_dataset(Split::Train, config.batch_size)?.is_empty() {
        return Err(TrainErr::EmptyDataset {
            split: Split::Train,
        });
    }

    if config.tune_hyperparams {
        info!("finding optimal values of hyperparameters");
        let report = optimize_hyperparams(config, source, telemetry, storage)?;
        return Ok(TrainOutcome::Tuned(report));
    }

    info!("setting up neural network");
    let mut model = build_model(config, source, config.dropout_prob, config.seed)?;
    let mut optimizer = optimization::resolve(
        &model,
        config.optimizer_name.as_deref(),
        config.learning_rate,
        config.weight_decay,
        config.momentum,
    )?;

    let mut trainer = Trainer::new(source, telemetry, storage, &config.model_path);
    let metrics = trainer.run(
        &mut model,
        &CrossEntropy::new(),
        &mut optimizer,
        config.num_epochs,
        config.batch_size,
        true,
    )?;

    Ok(TrainOutcome::Trained {
        metrics,
        history: trainer.history().to_vec(),
    })
}
