//! # The Model Registry
//!
//! A static mapping from architecture name to a config builder, plus the
//! uniform [`load_model`] entry point.
//!
//! Lookup is by exact, case-sensitive key; an absent key is a
//! [`ModelZooError::UnsupportedArchitecture`] naming the offending string.
//! Every call constructs a fresh model instance; nothing is cached.

use crate::models::cifar_resnet::{
    CifarResNet, CifarResNetConfig, resnet20_config, wide_resnet_config,
};
use crate::models::densenet::{DenseNet, DenseNetConfig, densenet121_config};
use crate::models::mobilenet::{MobileNetV2, MobileNetV2Config, mobilenet_v2_config};
use crate::models::resnet::{ResNet, ResNetConfig, resnet18_config};
use crate::models::simple_convnet::{SimpleConvNet, SimpleConvNetConfig};
use crate::models::vgg::{Vgg, VggConfig, vgg11_config, vgg16_config};
use burn::prelude::{Backend, Config, Module, Tensor};
use thiserror::Error;

/// Model registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelZooError {
    /// The requested architecture key is not in the registry.
    #[error("architecture '{0}' is not supported")]
    UnsupportedArchitecture(String),
}

/// Backend-free config for any registered architecture.
#[derive(Config, Debug)]
pub enum ModelConfig {
    /// A CIFAR `ResNet` family config.
    CifarResNet(CifarResNetConfig),

    /// An ImageNet-style `ResNet` config.
    ResNet(ResNetConfig),

    /// A `VGG` config.
    Vgg(VggConfig),

    /// A `DenseNet` config.
    DenseNet(DenseNetConfig),

    /// A `MobileNetV2` config.
    MobileNetV2(MobileNetV2Config),

    /// A simple-convnet config.
    SimpleConvNet(SimpleConvNetConfig),
}

impl From<CifarResNetConfig> for ModelConfig {
    fn from(config: CifarResNetConfig) -> Self {
        Self::CifarResNet(config)
    }
}

impl From<ResNetConfig> for ModelConfig {
    fn from(config: ResNetConfig) -> Self {
        Self::ResNet(config)
    }
}

impl From<VggConfig> for ModelConfig {
    fn from(config: VggConfig) -> Self {
        Self::Vgg(config)
    }
}

impl From<DenseNetConfig> for ModelConfig {
    fn from(config: DenseNetConfig) -> Self {
        Self::DenseNet(config)
    }
}

impl From<MobileNetV2Config> for ModelConfig {
    fn from(config: MobileNetV2Config) -> Self {
        Self::MobileNetV2(config)
    }
}

impl From<SimpleConvNetConfig> for ModelConfig {
    fn from(config: SimpleConvNetConfig) -> Self {
        Self::SimpleConvNet(config)
    }
}

impl ModelConfig {
    /// Initialize a [`Model`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Model<B> {
        match self {
            Self::CifarResNet(config) => Model::CifarResNet(config.init(device)),
            Self::ResNet(config) => Model::ResNet(config.init(device)),
            Self::Vgg(config) => Model::Vgg(config.init(device)),
            Self::DenseNet(config) => Model::DenseNet(config.init(device)),
            Self::MobileNetV2(config) => Model::MobileNetV2(config.init(device)),
            Self::SimpleConvNet(config) => Model::SimpleConvNet(config.init(device)),
        }
    }
}

/// A model from any registered architecture family.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Model<B: Backend> {
    /// A CIFAR `ResNet` family model.
    CifarResNet(CifarResNet<B>),

    /// An ImageNet-style `ResNet`.
    ResNet(ResNet<B>),

    /// A `VGG` model.
    Vgg(Vgg<B>),

    /// A `DenseNet` model.
    DenseNet(DenseNet<B>),

    /// A `MobileNetV2` model.
    MobileNetV2(MobileNetV2<B>),

    /// A simple-convnet baseline.
    SimpleConvNet(SimpleConvNet<B>),
}

impl<B: Backend> Model<B> {
    /// The number of output classes.
    pub fn num_classes(&self) -> usize {
        match self {
            Self::CifarResNet(model) => model.num_classes(),
            Self::ResNet(model) => model.num_classes(),
            Self::Vgg(model) => model.num_classes(),
            Self::DenseNet(model) => model.num_classes(),
            Self::MobileNetV2(model) => model.num_classes(),
            Self::SimpleConvNet(model) => model.num_classes(),
        }
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, channels, height, width]`` image batch.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` class scores.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        match self {
            Self::CifarResNet(model) => model.forward(input),
            Self::ResNet(model) => model.forward(input),
            Self::Vgg(model) => model.forward(input),
            Self::DenseNet(model) => model.forward(input),
            Self::MobileNetV2(model) => model.forward(input),
            Self::SimpleConvNet(model) => model.forward(input),
        }
    }
}

/// A registered architecture.
#[derive(Debug)]
pub struct StaticArchitecture {
    /// The registry key.
    pub name: &'static str,

    /// Description of the architecture.
    pub description: &'static str,

    /// Config builder; takes the number of output classes.
    pub builder: fn(usize) -> ModelConfig,
}

impl StaticArchitecture {
    /// Build a config for the given class count.
    pub fn build_config(
        &self,
        num_classes: usize,
    ) -> ModelConfig {
        (self.builder)(num_classes)
    }
}

/// The architecture registry.
///
/// Keys are exact and case-sensitive.
pub static ARCHITECTURES: &[StaticArchitecture] = &[
    StaticArchitecture {
        name: "simple_convnet",
        description: "two-conv baseline for 32x32 images",
        builder: |c| SimpleConvNetConfig::new(c).into(),
    },
    StaticArchitecture {
        name: "vgg11",
        description: "VGG-11 (configuration A)",
        builder: |c| vgg11_config(c).into(),
    },
    StaticArchitecture {
        name: "rn-20",
        description: "CIFAR ResNet-20 [3, 3, 3], width factor 1",
        builder: |c| resnet20_config(c).into(),
    },
    StaticArchitecture {
        name: "rn-18",
        description: "ImageNet-style ResNet-18 [2, 2, 2, 2]",
        builder: |c| resnet18_config(c).into(),
    },
    StaticArchitecture {
        name: "wrn28-2",
        description: "wide CIFAR ResNet, depth 28, width factor 2",
        builder: |c| wide_resnet_config(28, 2, c).into(),
    },
    StaticArchitecture {
        name: "wrn28-10",
        description: "wide CIFAR ResNet, depth 28, width factor 10",
        builder: |c| wide_resnet_config(28, 10, c).into(),
    },
    StaticArchitecture {
        name: "wrn40-2",
        description: "wide CIFAR ResNet, depth 40, width factor 2",
        builder: |c| wide_resnet_config(40, 2, c).into(),
    },
    StaticArchitecture {
        name: "wrn40-4",
        description: "wide CIFAR ResNet, depth 40, width factor 4",
        builder: |c| wide_resnet_config(40, 4, c).into(),
    },
    StaticArchitecture {
        name: "vgg16",
        description: "VGG-16 (configuration D)",
        builder: |c| vgg16_config(c).into(),
    },
    StaticArchitecture {
        name: "densenet121",
        description: "DenseNet-121 [6, 12, 24, 16], growth rate 32",
        builder: |c| densenet121_config(c).into(),
    },
    StaticArchitecture {
        name: "mobilenetv2",
        description: "MobileNetV2 inverted-residual network",
        builder: |c| mobilenet_v2_config(c).into(),
    },
];

/// Look up a registered architecture by exact key.
///
/// # Errors
///
/// [`ModelZooError::UnsupportedArchitecture`] when the key is absent.
pub fn lookup_architecture(arch: &str) -> Result<&'static StaticArchitecture, ModelZooError> {
    ARCHITECTURES
        .iter()
        .find(|entry| entry.name == arch)
        .ok_or_else(|| ModelZooError::UnsupportedArchitecture(arch.to_string()))
}

/// Load a model by architecture name.
///
/// Constructs a fresh, independently initialized instance on every call.
///
/// # Arguments
///
/// - `arch`: the registry key; exact and case-sensitive.
/// - `num_classes`: the number of output classes.
/// - `device`: the device to build on.
///
/// # Errors
///
/// [`ModelZooError::UnsupportedArchitecture`] when the key is absent.
pub fn load_model<B: Backend>(
    arch: &str,
    num_classes: usize,
    device: &B::Device,
) -> Result<Model<B>, ModelZooError> {
    Ok(lookup_architecture(arch)?
        .build_config(num_classes)
        .init(device))
}
