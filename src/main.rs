use std::env;

use anyhow::{Context, Result, bail};
use log::info;

use cnn_trainer::{
    config::RunConfig,
    data::{CsvDataSource, DataSource},
    storage::FileStorage,
    telemetry::{JsonFileSink, LogSink, TelemetrySink},
    training::{self, TrainOutcome},
};

fn main() -> Result<()> {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        bail!("usage: cnn-trainer <config.json>");
    };

    let config = RunConfig::load(&path).with_context(|| format!("loading config '{path}'"))?;
    info!("loaded config from {path}");

    let source = CsvDataSource::open(&config.data_dir, config.image.shape())
        .with_context(|| format!("reading data from '{}'", config.data_dir.display()))?;
    info!(
        "training on {} classes of {:?} images",
        source.num_classes(),
        source.image_shape()
    );

    let mut telemetry: Box<dyn TelemetrySink> = match &config.telemetry_dir {
        Some(dir) => Box::new(
            JsonFileSink::create(dir)
                .with_context(|| format!("creating telemetry dir '{}'", dir.display()))?,
        ),
        None => Box::new(LogSink),
    };

    let outcome = training::train(&config, &source, &mut telemetry, &mut FileStorage)?;

    match outcome {
        TrainOutcome::Trained { metrics, .. } => {
            let [loss, accuracy, _, precision] = metrics[..] else {
                bail!("expected 4 summary metrics, got {}", metrics.len());
            };
            println!("validation loss {loss:.4}, accuracy {accuracy:.4}, precision {precision:.4}");
        }
        TrainOutcome::Tuned(report) => {
            let best = report.best().context("no trial finished with a finite loss")?;
            println!(
                "best of {} trials: #{} {} (lr {:.2e}, weight decay {:.2e}, momentum {:.2}, dropout {:.2}) with validation loss {:.4}",
                report.trials.len(),
                best.number,
                best.params.optimizer,
                best.params.learning_rate,
                best.params.weight_decay,
                best.params.momentum,
                best.params.dropout,
                best.objective
            );
        }
    }

    Ok(())
}
