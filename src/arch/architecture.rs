use serde::{Deserialize, Serialize};

use super::{NetBuilder, Sequential};
use crate::{TrainErr, error::Result};

/// Dropout probability of `dynamic` networks when none is configured.
pub const DEFAULT_DROPOUT: f32 = 0.5;

/// One convolutional block of a `dynamic` network: convolution, relu and optional pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvLayerSpec {
    pub out_channels: usize,
    pub kernel_size: usize,
    pub padding: usize,
    pub stride: usize,
    pub pooling: bool,
}

impl ConvLayerSpec {
    /// Two 3×3 blocks with 8 and 16 channels, each followed by pooling.
    pub fn default_stack() -> Vec<Self> {
        [8, 16]
            .into_iter()
            .map(|out_channels| Self {
                out_channels,
                kernel_size: 3,
                padding: 1,
                stride: 1,
                pooling: true,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResNetVariant {
    ResNet10,
    ResNet18,
    ResNet34,
    ResNet50,
    ResNet101,
    ResNet152,
}

impl ResNetVariant {
    pub const ALL: [ResNetVariant; 6] = [
        Self::ResNet10,
        Self::ResNet18,
        Self::ResNet34,
        Self::ResNet50,
        Self::ResNet101,
        Self::ResNet152,
    ];

    /// Residual blocks per stage.
    pub fn stages(self) -> [usize; 4] {
        match self {
            Self::ResNet10 => [1, 1, 1, 1],
            Self::ResNet18 => [2, 2, 2, 2],
            Self::ResNet34 | Self::ResNet50 => [3, 4, 6, 3],
            Self::ResNet101 => [3, 4, 23, 3],
            Self::ResNet152 => [3, 8, 36, 3],
        }
    }

    /// Whether the stages are made of bottleneck blocks instead of basic ones.
    pub fn uses_bottlenecks(self) -> bool {
        matches!(self, Self::ResNet50 | Self::ResNet101 | Self::ResNet152)
    }

    fn depth(self) -> usize {
        match self {
            Self::ResNet10 => 10,
            Self::ResNet18 => 18,
            Self::ResNet34 => 34,
            Self::ResNet50 => 50,
            Self::ResNet101 => 101,
            Self::ResNet152 => 152,
        }
    }
}

/// The family of networks a run can train.
#[derive(Debug, Clone, PartialEq)]
pub enum Architecture {
    /// Two convolutional blocks and a linear classifier.
    Base,
    /// Three convolutional blocks, a hidden dense layer and dropout.
    Bigger { dropout: f32 },
    /// User supplied convolutional blocks, dropout and a linear classifier.
    Dynamic {
        layers: Vec<ConvLayerSpec>,
        dropout: f32,
    },
    ResNet(ResNetVariant),
}

const STAGE_WIDTHS: [usize; 4] = [16, 32, 64, 128];

impl Architecture {
    /// Parses a model identifier.
    ///
    /// # Arguments
    /// * `name` - The identifier, case insensitive; `-` and `_` are ignored.
    /// * `dynamic_layers` - The blocks of a `dynamic` network, defaults to two blocks.
    /// * `dropout` - The dropout probability of `bigger` and `dynamic` networks.
    ///
    /// # Returns
    /// The architecture or `UnsupportedArchitecture` for an unknown identifier.
    pub fn parse(
        name: &str,
        dynamic_layers: Option<Vec<ConvLayerSpec>>,
        dropout: Option<f32>,
    ) -> Result<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();

        let dropout = dropout.unwrap_or(DEFAULT_DROPOUT);

        let arch = match normalized.as_str() {
            "base" => Architecture::Base,
            "bigger" => Architecture::Bigger { dropout },
            "dynamic" => Architecture::Dynamic {
                layers: dynamic_layers.unwrap_or_else(ConvLayerSpec::default_stack),
                dropout,
            },
            "resnet10" => Architecture::ResNet(ResNetVariant::ResNet10),
            "resnet18" => Architecture::ResNet(ResNetVariant::ResNet18),
            "resnet34" => Architecture::ResNet(ResNetVariant::ResNet34),
            "resnet50" => Architecture::ResNet(ResNetVariant::ResNet50),
            "resnet101" => Architecture::ResNet(ResNetVariant::ResNet101),
            "resnet152" => Architecture::ResNet(ResNetVariant::ResNet152),
            _ => {
                return Err(TrainErr::UnsupportedArchitecture {
                    name: name.to_string(),
                });
            }
        };

        Ok(arch)
    }

    /// Builds a freshly initialized network.
    ///
    /// # Arguments
    /// * `image_shape` - The channels, height and width of the input images.
    /// * `num_classes` - The amount of class scores to produce.
    /// * `seed` - Seed of the parameter initialization.
    ///
    /// # Returns
    /// The network or an error if the images are too small for it.
    pub fn build(
        &self,
        image_shape: (usize, usize, usize),
        num_classes: usize,
        seed: u64,
    ) -> Result<Sequential> {
        if num_classes == 0 {
            return Err(TrainErr::InvalidConfig("a classifier needs at least one class".into()));
        }

        let net = NetBuilder::new(image_shape, seed);

        let net = match self {
            Architecture::Base => net
                .conv(16, 3, 1, 1)?
                .relu()
                .max_pool()?
                .conv(32, 3, 1, 1)?
                .relu()
                .max_pool()?
                .flatten()?
                .dense(num_classes)?,
            Architecture::Bigger { dropout } => net
                .conv(32, 3, 1, 1)?
                .relu()
                .max_pool()?
                .conv(64, 3, 1, 1)?
                .relu()
                .max_pool()?
                .conv(128, 3, 1, 1)?
                .relu()
                .max_pool()?
                .flatten()?
                .dense(256)?
                .relu()
                .dropout(*dropout)?
                .dense(num_classes)?,
            Architecture::Dynamic { layers, dropout } => {
                let mut net = net;
                for spec in layers {
                    net = net
                        .conv(spec.out_channels, spec.kernel_size, spec.stride, spec.padding)?
                        .relu();
                    if spec.pooling {
                        net = net.max_pool()?;
                    }
                }

                net.flatten()?.dropout(*dropout)?.dense(num_classes)?
            }
            Architecture::ResNet(variant) => {
                let mut net = net.conv(STAGE_WIDTHS[0], 3, 1, 1)?.relu();
                for (stage, (&blocks, &width)) in
                    variant.stages().iter().zip(&STAGE_WIDTHS).enumerate()
                {
                    for block in 0..blocks {
                        let stride = if stage > 0 && block == 0 { 2 } else { 1 };
                        net = if variant.uses_bottlenecks() {
                            net.bottleneck(width, stride)?
                        } else {
                            net.residual(width, stride)?
                        };
                    }
                }

                net.global_avg_pool()?.dense(num_classes)?
            }
        };

        let model = net.build(num_classes)?;
        log::info!("built {self} network with {} layers", model.depth());
        Ok(model)
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Architecture::Base => write!(f, "base"),
            Architecture::Bigger { .. } => write!(f, "bigger"),
            Architecture::Dynamic { .. } => write!(f, "dynamic"),
            Architecture::ResNet(variant) => write!(f, "resnet{}", variant.depth()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Model;
    use ndarray::Array4;

    #[test]
    fn identifiers_are_case_insensitive() {
        for name in ["base", "Base", "BASE"] {
            assert_eq!(Architecture::parse(name, None, None).unwrap(), Architecture::Base);
        }

        assert_eq!(
            Architecture::parse("ResNet-18", None, None).unwrap(),
            Architecture::ResNet(ResNetVariant::ResNet18)
        );
    }

    #[test]
    fn every_resnet_depth_parses_and_prints_back() {
        for variant in ResNetVariant::ALL {
            let arch = Architecture::ResNet(variant);
            assert_eq!(Architecture::parse(&arch.to_string(), None, None).unwrap(), arch);
        }

        assert_eq!(
            Architecture::parse("resnet50", None, None).unwrap(),
            Architecture::ResNet(ResNetVariant::ResNet50)
        );
    }

    #[test]
    fn resnet50_is_built_from_bottlenecks() {
        let mut model = Architecture::ResNet(ResNetVariant::ResNet50)
            .build((3, 8, 8), 4, 0)
            .unwrap();

        // Stem, relu, 16 blocks, global pooling and the classifier.
        assert_eq!(model.depth(), 2 + 16 + 2);

        let names: Vec<_> = model.tensors().into_iter().map(|t| t.name).collect();
        assert!(names.contains(&"layers.2.conv3.weight".to_string()));
        assert!(names.contains(&"layers.19.weight".to_string()));

        let scores = model.forward(Array4::zeros((2, 3, 8, 8)).view()).unwrap();
        assert_eq!(scores.dim(), (2, 4));
    }

    #[test]
    fn unknown_identifiers_are_rejected() {
        for name in ["vgg", "resnet", "resnet20", "resnet-50x", ""] {
            assert!(matches!(
                Architecture::parse(name, None, None),
                Err(TrainErr::UnsupportedArchitecture { .. })
            ));
        }
    }

    #[test]
    fn dynamic_defaults_to_two_pooled_blocks() {
        let arch = Architecture::parse("dynamic", None, None).unwrap();
        assert_eq!(
            arch,
            Architecture::Dynamic {
                layers: ConvLayerSpec::default_stack(),
                dropout: DEFAULT_DROPOUT,
            }
        );
    }

    #[test]
    fn every_architecture_scores_every_class() {
        let names = ["base", "bigger", "dynamic", "resnet10", "resnet50"];

        for name in names {
            let mut model = Architecture::parse(name, None, Some(0.2))
                .unwrap()
                .build((3, 16, 16), 5, 0)
                .unwrap();

            let scores = model.forward(Array4::zeros((2, 3, 16, 16)).view()).unwrap();
            assert_eq!(scores.dim(), (2, 5), "{name}");
        }
    }

    #[test]
    fn deeper_resnets_have_more_parameters() {
        let size = |variant| {
            Architecture::ResNet(variant)
                .build((1, 8, 8), 2, 0)
                .unwrap()
                .size()
        };

        assert!(size(ResNetVariant::ResNet10) < size(ResNetVariant::ResNet18));
        assert!(size(ResNetVariant::ResNet18) < size(ResNetVariant::ResNet34));
        assert!(size(ResNetVariant::ResNet50) < size(ResNetVariant::ResNet101));
        assert!(size(ResNetVariant::ResNet101) < size(ResNetVariant::ResNet152));
    }
}
