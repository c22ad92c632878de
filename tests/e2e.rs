mod common;

use cnn_trainer::{
    TrainErr,
    arch::{Architecture, Mode, Model, loss::CrossEntropy},
    config::RunConfig,
    data::{ImageDataset, InMemoryDataSource, Split},
    optimization,
    telemetry::{ConfusionArtifact, Context, NoopSink},
    training::{self, TrainOutcome, Trainer},
};
use common::{FailingStorage, NUM_CLASSES, RecordingSink, RecordingStorage, SHAPE, source};

const MODEL_PATH: &str = "models/e2e.safetensors";

#[test]
fn one_epoch_without_saving() {
    // Two training batches of four.
    let source = source(8, 6);
    let mut sink = RecordingSink::default();
    let mut storage = RecordingStorage::default();

    let mut model = Architecture::Base.build(SHAPE, NUM_CLASSES, 0).unwrap();
    let mut optimizer = optimization::resolve(&model, None, 1e-2, None, None).unwrap();

    let mut trainer = Trainer::new(&source, &mut sink, &mut storage, MODEL_PATH);
    let metrics = trainer
        .run(&mut model, &CrossEntropy::new(), &mut optimizer, 1, 4, false)
        .unwrap();
    assert_eq!(trainer.history().len(), 1);

    assert_eq!(metrics.len(), 4);
    assert!(metrics.iter().all(|m| m.is_finite()));
    assert_eq!(metrics[0], metrics[2]);
    assert!((0.0..=1.0).contains(&metrics[1]));
    assert!((0.0..=1.0).contains(&metrics[3]));

    assert!(storage.writes.is_empty());
    assert_eq!(model.mode(), Mode::Evaluation);
}

#[test]
fn one_epoch_saving_writes_the_trained_parameters_once() {
    let source = source(8, 6);
    let mut sink = RecordingSink::default();
    let mut storage = RecordingStorage::default();

    let mut model = Architecture::Base.build(SHAPE, NUM_CLASSES, 0).unwrap();
    let initial = model.state_dict().unwrap();
    let mut optimizer = optimization::resolve(&model, Some("sgd"), 1e-2, None, Some(0.9)).unwrap();

    let metrics = Trainer::new(&source, &mut sink, &mut storage, MODEL_PATH)
        .run(&mut model, &CrossEntropy::new(), &mut optimizer, 1, 4, true)
        .unwrap();

    assert_eq!(metrics.len(), 4);
    assert_eq!(storage.writes.len(), 1);

    let (blob, path) = &storage.writes[0];
    assert_eq!(path.to_str(), Some(MODEL_PATH));
    assert_eq!(*blob, model.state_dict().unwrap());
    assert_ne!(*blob, initial);
}

#[test]
fn every_epoch_reports_metrics_and_the_last_validation_batch() {
    // Validation batches of 4 and 2.
    let source = source(8, 6);
    let mut sink = RecordingSink::default();
    let mut storage = RecordingStorage::default();

    let mut model = Architecture::Base.build(SHAPE, NUM_CLASSES, 1).unwrap();
    let mut optimizer = optimization::resolve(&model, Some("rmsprop"), 1e-3, None, None).unwrap();

    Trainer::new(&source, &mut sink, &mut storage, MODEL_PATH)
        .run(&mut model, &CrossEntropy::new(), &mut optimizer, 2, 4, false)
        .unwrap();

    assert_eq!(sink.metrics.len(), 2);
    assert!(sink.metrics.iter().all(|(ctx, _)| *ctx == Context::Test));
    assert_eq!(sink.metrics[1].1.epoch, 1);

    assert_eq!(sink.artifacts.len(), 2);
    let artifact = &sink.artifacts[1];
    assert_eq!(artifact.title, ConfusionArtifact::EVALUATION_TITLE);
    assert_eq!(artifact.file_name, "confusion-matrix.json");
    assert_eq!(artifact.y_true, [1, 2]);
    assert_eq!(artifact.y_predicted.len(), 2);
    assert_eq!(artifact.matrix.total(), 2);
}

#[test]
fn storage_failures_keep_the_metrics() {
    let source = source(8, 6);
    let mut model = Architecture::Base.build(SHAPE, NUM_CLASSES, 0).unwrap();
    let mut optimizer = optimization::resolve(&model, None, 1e-3, None, None).unwrap();

    let err = Trainer::new(&source, &mut NoopSink, &mut FailingStorage, MODEL_PATH)
        .run(&mut model, &CrossEntropy::new(), &mut optimizer, 1, 4, true)
        .unwrap_err();

    let TrainErr::PersistenceFailure { metrics, path, .. } = err else {
        panic!("expected a persistence failure");
    };
    assert_eq!(metrics.len(), 4);
    assert_eq!(path.to_str(), Some(MODEL_PATH));
}

#[test]
fn zero_epochs_is_rejected() {
    let source = source(8, 6);
    let mut model = Architecture::Base.build(SHAPE, NUM_CLASSES, 0).unwrap();
    let mut optimizer = optimization::resolve(&model, None, 1e-3, None, None).unwrap();
    let mut storage = RecordingStorage::default();

    let res = Trainer::new(&source, &mut NoopSink, &mut storage, MODEL_PATH).run(
        &mut model,
        &CrossEntropy::new(),
        &mut optimizer,
        0,
        4,
        true,
    );

    assert!(matches!(res, Err(TrainErr::InvalidConfig(_))));
    assert!(storage.writes.is_empty());
}

fn config(tune: bool) -> RunConfig {
    RunConfig {
        model_name: "dynamic".into(),
        batch_size: 4,
        num_epochs: 1,
        tune_hyperparams: tune,
        tuning_trials: 2,
        model_path: MODEL_PATH.into(),
        ..RunConfig::default()
    }
}

#[test]
fn train_stores_the_configured_model() {
    let source = source(8, 6);
    let mut sink = RecordingSink::default();
    let mut storage = RecordingStorage::default();

    let outcome = training::train(&config(false), &source, &mut sink, &mut storage).unwrap();

    let TrainOutcome::Trained { metrics, history } = outcome else {
        panic!("tuning was off");
    };
    assert_eq!(metrics.len(), 4);
    assert_eq!(history.len(), 1);
    assert_eq!(storage.writes.len(), 1);
}

#[test]
fn tuning_runs_every_trial_without_saving() {
    let source = source(8, 6);
    let mut sink = RecordingSink::default();
    let mut storage = RecordingStorage::default();

    let outcome = training::train(&config(true), &source, &mut sink, &mut storage).unwrap();

    let TrainOutcome::Tuned(report) = outcome else {
        panic!("tuning was on");
    };
    assert_eq!(report.trials.len(), 2);
    assert_eq!(sink.metrics.len(), 2);
    assert!(storage.writes.is_empty());
}

#[test]
fn unknown_models_fail_before_training() {
    let source = source(8, 6);
    let mut storage = RecordingStorage::default();
    let config = RunConfig {
        model_name: "vgg16".into(),
        ..config(false)
    };

    let res = training::train(&config, &source, &mut NoopSink, &mut storage);

    assert!(matches!(res, Err(TrainErr::UnsupportedArchitecture { .. })));
    assert!(storage.writes.is_empty());
}

#[test]
fn resnet50_trains_end_to_end() {
    let source = source(8, 6);
    let mut storage = RecordingStorage::default();
    let config = RunConfig {
        model_name: "resnet50".into(),
        ..config(false)
    };

    let outcome = training::train(&config, &source, &mut NoopSink, &mut storage).unwrap();

    let TrainOutcome::Trained { metrics, .. } = outcome else {
        panic!("tuning was off");
    };
    assert!(metrics.iter().all(|m| m.is_finite()));
    assert_eq!(storage.writes.len(), 1);
}

#[test]
fn a_source_without_samples_reports_the_empty_training_split() {
    let empty = || ImageDataset::from_flat(Vec::new(), Vec::new(), SHAPE).unwrap();
    let source = InMemoryDataSource::new(empty(), empty(), 0).unwrap();
    let mut storage = RecordingStorage::default();

    for tune in [false, true] {
        let res = training::train(&config(tune), &source, &mut NoopSink, &mut storage);
        assert!(matches!(
            res,
            Err(TrainErr::EmptyDataset {
                split: Split::Train
            })
        ));
    }
    assert!(storage.writes.is_empty());
}
