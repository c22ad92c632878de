use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{TrainErr, arch::ConvLayerSpec, error::Result};

/// The `(channels, height, width)` of the images of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Default for ImageGeometry {
    fn default() -> Self {
        Self {
            channels: 3,
            height: 32,
            width: 32,
        }
    }
}

impl ImageGeometry {
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }
}

/// Everything a training run is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub model_name: String,
    /// Blocks of a `dynamic` network, two 3×3 blocks when absent.
    pub dynamic_layers: Option<Vec<ConvLayerSpec>>,
    pub dropout_prob: Option<f32>,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub weight_decay: Option<f32>,
    pub momentum: Option<f32>,
    pub num_epochs: usize,
    /// `None` trains with Adam.
    pub optimizer_name: Option<String>,
    pub tune_hyperparams: bool,
    pub tuning_trials: usize,
    pub seed: u64,
    /// Directory holding `train.csv` and `val.csv`.
    pub data_dir: PathBuf,
    pub image: ImageGeometry,
    pub model_path: PathBuf,
    /// Directory of the JSON telemetry files, metrics only go to the log when absent.
    pub telemetry_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model_name: "base".into(),
            dynamic_layers: None,
            dropout_prob: None,
            batch_size: 20,
            learning_rate: 1e-3,
            weight_decay: None,
            momentum: None,
            num_epochs: 20,
            optimizer_name: None,
            tune_hyperparams: false,
            tuning_trials: 10,
            seed: 42,
            data_dir: "data".into(),
            image: ImageGeometry::default(),
            model_path: "models/model.safetensors".into(),
            telemetry_dir: None,
        }
    }
}

impl RunConfig {
    /// Loads and validates a config from a JSON file; missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TrainErr::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| TrainErr::Serialization(format!("invalid JSON config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects values no run can be made with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TrainErr::InvalidConfig(msg));

        if self.batch_size == 0 {
            return invalid("batch_size must be > 0".into());
        }

        if self.num_epochs == 0 {
            return invalid("num_epochs must be > 0".into());
        }

        if self.tune_hyperparams && self.tuning_trials == 0 {
            return invalid("tuning_trials must be > 0".into());
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }

        if let Some(p) = self.dropout_prob.filter(|p| !(0.0..1.0).contains(p)) {
            return invalid(format!("dropout_prob must be in [0, 1), got {p}"));
        }

        let ImageGeometry {
            channels,
            height,
            width,
        } = self.image;
        if channels == 0 || height == 0 || width == 0 {
            return invalid(format!("image geometry must be positive, got {channels}x{height}x{width}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_their_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{ "model_name": "dynamic", "num_epochs": 3 }"#).unwrap();

        assert_eq!(config.model_name, "dynamic");
        assert_eq!(config.num_epochs, 3);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.optimizer_name, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn dynamic_layers_are_read_from_json() {
        let config: RunConfig = serde_json::from_str(
            r#"{ "dynamic_layers": [
                { "out_channels": 4, "kernel_size": 5, "padding": 2, "stride": 1, "pooling": false }
            ] }"#,
        )
        .unwrap();

        let layers = config.dynamic_layers.unwrap();
        assert_eq!(layers[0].kernel_size, 5);
        assert!(!layers[0].pooling);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = RunConfig::default();

        let cases = [
            RunConfig {
                batch_size: 0,
                ..base.clone()
            },
            RunConfig {
                num_epochs: 0,
                ..base.clone()
            },
            RunConfig {
                learning_rate: -1.,
                ..base.clone()
            },
            RunConfig {
                dropout_prob: Some(1.),
                ..base.clone()
            },
            RunConfig {
                tune_hyperparams: true,
                tuning_trials: 0,
                ..base
            },
        ];

        for config in cases {
            assert!(matches!(config.validate(), Err(TrainErr::InvalidConfig(_))));
        }
    }
}
