use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Adam, Optimizer, RmsProp, Sgd};
use crate::{
    TrainErr,
    arch::{Model, ParamsId},
    error::Result,
};

/// The optimizer families a run can be trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizerKind {
    Adam,
    Sgd,
    RmsProp,
}

impl OptimizerKind {
    pub const ALL: [OptimizerKind; 3] = [Self::Adam, Self::Sgd, Self::RmsProp];

    /// Parses an optimizer identifier: surrounding whitespace, case, `-`, `_` and inner
    /// spaces are ignored.
    ///
    /// # Returns
    /// The family or `UnsupportedOptimizer` for an unknown identifier.
    pub fn parse(name: &str) -> Result<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "adam" => Ok(Self::Adam),
            "sgd" => Ok(Self::Sgd),
            "rmsprop" => Ok(Self::RmsProp),
            _ => Err(TrainErr::UnsupportedOptimizer {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adam => write!(f, "adam"),
            Self::Sgd => write!(f, "sgd"),
            Self::RmsProp => write!(f, "rmsprop"),
        }
    }
}

/// The resolved hyperparameters of an optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizerConfig {
    pub kind: OptimizerKind,
    pub learning_rate: f32,
    pub weight_decay: f32,
    /// Unused by Adam.
    pub momentum: f32,
}

#[derive(Debug, Clone, PartialEq)]
enum Engine {
    Adam(Adam),
    Sgd(Sgd),
    RmsProp(RmsProp),
}

impl Engine {
    fn new(config: &OptimizerConfig, len: usize) -> Self {
        let OptimizerConfig {
            kind,
            learning_rate: lr,
            weight_decay: wd,
            momentum: mu,
        } = *config;

        match kind {
            OptimizerKind::Adam => Engine::Adam(Adam::new(len, lr, wd)),
            OptimizerKind::Sgd => Engine::Sgd(Sgd::new(len, lr, wd, mu)),
            OptimizerKind::RmsProp => Engine::RmsProp(RmsProp::new(len, lr, wd, mu)),
        }
    }
}

impl Optimizer for Engine {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        match self {
            Engine::Adam(o) => o.update_params(grad, params),
            Engine::Sgd(o) => o.update_params(grad, params),
            Engine::RmsProp(o) => o.update_params(grad, params),
        }
    }
}

/// A stateful optimizer bound to the parameters of exactly one model.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundOptimizer {
    config: OptimizerConfig,
    bound_to: ParamsId,
    len: usize,
    engine: Engine,
}

impl BoundOptimizer {
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn kind(&self) -> OptimizerKind {
        self.config.kind
    }

    fn check_binding<M: Model + ?Sized>(&self, model: &M) -> Result<()> {
        if model.params_id() != self.bound_to || model.size() != self.len {
            return Err(TrainErr::OptimizerNotBound);
        }

        Ok(())
    }

    /// Clears the gradient of the bound model.
    ///
    /// # Errors
    /// `OptimizerNotBound` if `model` is not the model this optimizer was resolved for.
    pub fn zero_grad<M: Model + ?Sized>(&self, model: &mut M) -> Result<()> {
        self.check_binding(model)?;
        model.zero_grad();
        Ok(())
    }

    /// Updates the parameters of the bound model with its current gradient.
    ///
    /// # Errors
    /// `OptimizerNotBound` if `model` is not the model this optimizer was resolved for.
    pub fn step<M: Model + ?Sized>(&mut self, model: &mut M) -> Result<()> {
        self.check_binding(model)?;
        let (params, grad) = model.params_and_grad();
        self.engine.update_params(grad, params)
    }
}

/// Resolves an optimizer request into a fresh optimizer bound to `model`.
///
/// # Arguments
/// * `model` - The model whose parameters will be updated.
/// * `name` - The optimizer identifier, `None` is Adam.
/// * `learning_rate` - The step size, must be finite and positive.
/// * `weight_decay` - The L2 penalty, `None` is zero.
/// * `momentum` - The momentum of SGD and RMSprop, `None` is zero.
///
/// # Returns
/// The bound optimizer, or `UnsupportedOptimizer` for an unknown identifier.
pub fn resolve<M: Model + ?Sized>(
    model: &M,
    name: Option<&str>,
    learning_rate: f32,
    weight_decay: Option<f32>,
    momentum: Option<f32>,
) -> Result<BoundOptimizer> {
    let kind = name.map_or(Ok(OptimizerKind::Adam), OptimizerKind::parse)?;

    if !(learning_rate.is_finite() && learning_rate > 0.) {
        return Err(TrainErr::InvalidConfig(format!(
            "learning rate must be positive, got {learning_rate}"
        )));
    }

    let config = OptimizerConfig {
        kind,
        learning_rate,
        weight_decay: weight_decay.unwrap_or(0.),
        momentum: momentum.unwrap_or(0.),
    };

    log::debug!(
        lr = learning_rate, weight_decay = config.weight_decay, momentum = config.momentum;
        "resolved {kind} optimizer"
    );

    Ok(BoundOptimizer {
        engine: Engine::new(&config, model.size()),
        config,
        bound_to: model.params_id(),
        len: model.size(),
    })
}
