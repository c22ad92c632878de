mod common;

use cnn_trainer::{
    TrainErr,
    arch::{Architecture, Model, Sequential},
    optimization::{self, OptimizerKind},
};
use common::{NUM_CLASSES, SHAPE};

fn model(seed: u64) -> Sequential {
    Architecture::Base.build(SHAPE, NUM_CLASSES, seed).unwrap()
}

#[test]
fn every_spelling_resolves_to_the_same_configuration() {
    let model = model(0);

    for (spellings, kind) in [
        (["adam", "Adam", "ADAM"], OptimizerKind::Adam),
        (["sgd", "SGD", "Sgd"], OptimizerKind::Sgd),
        (["rmsprop", "RMSprop", "RMSPROP"], OptimizerKind::RmsProp),
    ] {
        let configs: Vec<_> = spellings
            .into_iter()
            .map(|name| {
                *optimization::resolve(&model, Some(name), 1e-3, Some(1e-4), Some(0.9))
                    .unwrap()
                    .config()
            })
            .collect();

        assert!(configs.iter().all(|c| c.kind == kind));
        assert!(configs.windows(2).all(|w| w[0] == w[1]));
    }
}

#[test]
fn missing_name_defaults_to_adam() {
    let model = model(0);

    let default = optimization::resolve(&model, None, 1e-3, None, None).unwrap();
    let adam = optimization::resolve(&model, Some("adam"), 1e-3, None, None).unwrap();

    assert_eq!(default.kind(), OptimizerKind::Adam);
    assert_eq!(default, adam);
}

#[test]
fn unknown_names_are_rejected() {
    let model = model(0);

    for name in ["adagrad", "lbfgs", ""] {
        let res = optimization::resolve(&model, Some(name), 1e-3, None, None);
        assert!(
            matches!(res, Err(TrainErr::UnsupportedOptimizer { name: ref n }) if n == name),
            "{name:?} was accepted"
        );
    }
}

#[test]
fn missing_extras_default_to_zero() {
    let model = model(0);

    let config = *optimization::resolve(&model, Some("sgd"), 0.1, None, None)
        .unwrap()
        .config();

    assert_eq!(config.learning_rate, 0.1);
    assert_eq!(config.weight_decay, 0.);
    assert_eq!(config.momentum, 0.);
}

#[test]
fn each_resolution_has_its_own_state() {
    let mut model = model(0);
    model.params_and_grad().1.fill(0.5);

    let mut stepped = optimization::resolve(&model, Some("rmsprop"), 1e-3, None, Some(0.9)).unwrap();
    let untouched = optimization::resolve(&model, Some("rmsprop"), 1e-3, None, Some(0.9)).unwrap();
    let fresh = untouched.clone();

    stepped.step(&mut model).unwrap();

    assert_ne!(stepped, untouched);
    assert_eq!(untouched, fresh);
}

#[test]
fn a_step_moves_against_the_gradient() {
    let mut model = model(0);
    let before = model.params().to_vec();
    model.params_and_grad().1.fill(1.);

    let mut optimizer = optimization::resolve(&model, Some("sgd"), 0.1, None, None).unwrap();
    optimizer.step(&mut model).unwrap();

    for (after, before) in model.params().iter().zip(&before) {
        assert!((before - after - 0.1).abs() < 1e-5);
    }
}

#[test]
fn optimizers_only_drive_the_model_they_were_resolved_for() {
    let bound = model(0);
    let mut other = model(0);

    let mut optimizer = optimization::resolve(&bound, None, 1e-3, None, None).unwrap();

    assert!(matches!(optimizer.step(&mut other), Err(TrainErr::OptimizerNotBound)));
    assert!(matches!(optimizer.zero_grad(&mut other), Err(TrainErr::OptimizerNotBound)));
}

#[test]
fn non_positive_learning_rates_are_rejected() {
    let model = model(0);

    for lr in [0., -1e-3, f32::NAN] {
        assert!(matches!(
            optimization::resolve(&model, None, lr, None, None),
            Err(TrainErr::InvalidConfig(_))
        ));
    }
}
