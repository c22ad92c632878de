use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

use super::{Trainer, train::build_model};
use crate::{
    arch::loss::CrossEntropy,
    config::RunConfig,
    data::DataSource,
    error::Result,
    optimization::{self, OptimizerKind},
    storage::Storage,
    telemetry::TelemetrySink,
};

const LEARNING_RATE: (f32, f32) = (1e-5, 1e-1);
const WEIGHT_DECAY: (f32, f32) = (1e-6, 1e-2);
const MAX_MOMENTUM: f32 = 0.99;
const MAX_DROPOUT: f32 = 0.5;

/// The hyperparameters of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialParams {
    pub optimizer: OptimizerKind,
    pub learning_rate: f32,
    pub weight_decay: f32,
    pub momentum: f32,
    pub dropout: f32,
}

impl TrialParams {
    fn sample<R: Rng>(rng: &mut R) -> Self {
        let kinds = OptimizerKind::ALL;

        Self {
            optimizer: kinds[rng.random_range(0..kinds.len())],
            learning_rate: log_uniform(rng, LEARNING_RATE),
            weight_decay: log_uniform(rng, WEIGHT_DECAY),
            momentum: rng.random_range(0.0..MAX_MOMENTUM),
            dropout: rng.random_range(0.0..MAX_DROPOUT),
        }
    }
}

fn log_uniform<R: Rng>(rng: &mut R, (low, high): (f32, f32)) -> f32 {
    rng.random_range(low.ln()..high.ln()).exp().clamp(low, high)
}

/// A finished trial: its hyperparameters and the validation loss of its last epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    pub number: usize,
    pub params: TrialParams,
    pub objective: f32,
    pub metrics: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningReport {
    pub trials: Vec<Trial>,
}

impl TuningReport {
    /// The trial with the lowest finite objective.
    pub fn best(&self) -> Option<&Trial> {
        self.trials
            .iter()
            .filter(|t| t.objective.is_finite())
            .min_by(|a, b| a.objective.total_cmp(&b.objective))
    }
}

/// Random search over the optimizer and its hyperparameters.
///
/// Every trial trains a freshly built model with a fresh optimizer for the configured epochs
/// without storing it; the objective is the final validation loss. The search is
/// reproducible for a given `config.seed`.
///
/// # Arguments
/// * `config` - The run configuration, `tuning_trials` is the amount of trials.
/// * `source` - Provides the data and the class count.
/// * `telemetry` - Receives the metrics of every epoch of every trial.
/// * `storage` - Handed to the trainer, never written to.
pub fn optimize_hyperparams(
    config: &RunConfig,
    source: &dyn DataSource,
    telemetry: &mut dyn TelemetrySink,
    storage: &mut dyn Storage,
) -> Result<TuningReport> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut trials = Vec::with_capacity(config.tuning_trials);

    for number in 0..config.tuning_trials {
        let params = TrialParams::sample(&mut rng);
        info!(
            lr = params.learning_rate,
            weight_decay = params.weight_decay,
            momentum = params.momentum,
            dropout = params.dropout;
            "trial {number} with {}", params.optimizer
        );

        let seed = config.seed.wrapping_add(number as u64);
        let mut model = build_model(config, source, Some(params.dropout), seed)?;
        let kind = params.optimizer.to_string();
        let mut optimizer = optimization::resolve(
            &model,
            Some(kind.as_str()),
            params.learning_rate,
            Some(params.weight_decay),
            Some(params.momentum),
        )?;

        let mut trainer = Trainer::new(source, &mut *telemetry, &mut *storage, &config.model_path);
        let metrics = trainer.run(
            &mut model,
            &CrossEntropy::new(),
            &mut optimizer,
            config.num_epochs,
            config.batch_size,
            false,
        )?;

        let objective = metrics.first().copied().unwrap_or(f32::NAN);
        info!("trial {number} finished with validation loss {objective:.4}");
        trials.push(Trial {
            number,
            params,
            objective,
            metrics,
        });
    }

    let report = TuningReport { trials };
    if let Some(best) = report.best() {
        info!(
            "best trial {} with validation loss {:.4}: {:?}",
            best.number, best.objective, best.params
        );
    }

    Ok(report)
}
