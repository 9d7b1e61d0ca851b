//! # `VGG` Networks
//!
//! Classification backbones behind the `vgg11` / `vgg16` registry keys:
//! stacks of 3x3 convolutions with max-pool separators, then a three-layer
//! classifier with dropout.

use crate::models::util::conv_fan_out_initializer;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// One element of a `VGG` feature plan.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum VggFeatureSpec {
    /// 3x3 convolution to the given channel width, followed by ReLU.
    Conv(usize),

    /// 2x2 max pool with stride 2.
    Pool,
}

/// [`Vgg`] Config.
#[derive(Config, Debug)]
pub struct VggConfig {
    /// The feature-stack plan.
    pub features: Vec<VggFeatureSpec>,

    /// The number of output classes.
    pub num_classes: usize,

    /// Classifier dropout probability.
    #[config(default = 0.5)]
    pub dropout: f64,

    /// The number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

/// `VGG-11` (configuration "A") config.
pub fn vgg11_config(num_classes: usize) -> VggConfig {
    use VggFeatureSpec::{Conv, Pool};
    VggConfig::new(
        vec![
            Conv(64),
            Pool,
            Conv(128),
            Pool,
            Conv(256),
            Conv(256),
            Pool,
            Conv(512),
            Conv(512),
            Pool,
            Conv(512),
            Conv(512),
            Pool,
        ],
        num_classes,
    )
}

/// `VGG-16` (configuration "D") config.
pub fn vgg16_config(num_classes: usize) -> VggConfig {
    use VggFeatureSpec::{Conv, Pool};
    VggConfig::new(
        vec![
            Conv(64),
            Conv(64),
            Pool,
            Conv(128),
            Conv(128),
            Pool,
            Conv(256),
            Conv(256),
            Conv(256),
            Pool,
            Conv(512),
            Conv(512),
            Conv(512),
            Pool,
            Conv(512),
            Conv(512),
            Conv(512),
            Pool,
        ],
        num_classes,
    )
}

impl VggConfig {
    /// The channel width entering the classifier.
    pub fn feature_width(&self) -> usize {
        self.features
            .iter()
            .rev()
            .find_map(|spec| match spec {
                VggFeatureSpec::Conv(width) => Some(*width),
                VggFeatureSpec::Pool => None,
            })
            .expect("feature plan must contain a convolution")
    }

    /// Initialize a [`Vgg`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Vgg<B> {
        let mut width = self.in_channels;
        let features = self
            .features
            .iter()
            .map(|spec| match spec {
                VggFeatureSpec::Conv(planes) => {
                    let conv = Conv2dConfig::new([width, *planes], [3, 3])
                        .with_padding(PaddingConfig2d::Explicit(1, 1))
                        .with_initializer(conv_fan_out_initializer())
                        .init(device);
                    width = *planes;
                    VggFeature::Conv(conv)
                }
                VggFeatureSpec::Pool => VggFeature::Pool(
                    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                ),
            })
            .collect();

        Vgg {
            features,
            avgpool: AdaptiveAvgPool2dConfig::new([7, 7]).init(),
            fc1: LinearConfig::new(width * 7 * 7, 4096).init(device),
            fc2: LinearConfig::new(4096, 4096).init(device),
            fc3: LinearConfig::new(4096, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            relu: Relu::new(),
        }
    }
}

/// A `VGG` feature-stack element.
#[derive(Module, Debug)]
pub enum VggFeature<B: Backend> {
    /// 3x3 convolution followed by ReLU.
    Conv(Conv2d<B>),

    /// 2x2 max pool.
    Pool(MaxPool2d),
}

impl<B: Backend> VggFeature<B> {
    /// Apply the element.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Conv(conv) => burn::tensor::activation::relu(conv.forward(input)),
            Self::Pool(pool) => pool.forward(input),
        }
    }
}

/// `VGG` classification network.
#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    /// Convolutional feature stack.
    pub features: Vec<VggFeature<B>>,

    /// Adaptive pooling to ``7x7`` ahead of the classifier.
    pub avgpool: AdaptiveAvgPool2d,

    /// First classifier layer.
    pub fc1: Linear<B>,

    /// Second classifier layer.
    pub fc2: Linear<B>,

    /// Output classifier layer.
    pub fc3: Linear<B>,

    /// Classifier dropout.
    pub dropout: Dropout,

    /// Classifier rectifier.
    pub relu: Relu,
}

impl<B: Backend> Vgg<B> {
    /// The number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc3.weight.shape().dims[1]
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_channels, height, width]`` image batch.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` class scores.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let x = self
            .features
            .iter()
            .fold(input, |x, feature| feature.forward(x));

        let x = self.avgpool.forward(x);
        let x = x.flatten(1, 3);

        let x = self.relu.forward(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        let x = self.relu.forward(self.fc2.forward(x));
        let x = self.dropout.forward(x);

        self.fc3.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_vgg_plans() {
        let config = vgg11_config(10);
        let convs = config
            .features
            .iter()
            .filter(|s| matches!(s, VggFeatureSpec::Conv(_)))
            .count();
        assert_eq!(convs, 8);
        assert_eq!(config.feature_width(), 512);

        let config = vgg16_config(10);
        let convs = config
            .features
            .iter()
            .filter(|s| matches!(s, VggFeatureSpec::Conv(_)))
            .count();
        assert_eq!(convs, 13);
    }

    #[test]
    fn test_vgg11_forward_shape() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: Vgg<B> = vgg11_config(7).init(&device);
        assert_eq!(model.num_classes(), 7);

        let input = Tensor::ones([1, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 1), ("num_classes", 7)],
        );
    }
}
