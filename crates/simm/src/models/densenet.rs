//! # `DenseNet`
//!
//! The densely connected backbone behind the `densenet121` registry key.
//! Each dense layer concatenates its output onto the running feature map;
//! transition layers halve both channels and resolution between blocks.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{
    AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, AvgPool2d, AvgPool2dConfig, MaxPool2d,
    MaxPool2dConfig,
};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

use crate::models::util::conv_fan_out_initializer;

/// [`DenseNet`] Config.
#[derive(Config, Debug)]
pub struct DenseNetConfig {
    /// Dense-layer counts for the four dense blocks.
    pub block_layers: [usize; 4],

    /// The number of output classes.
    pub num_classes: usize,

    /// Channels added by each dense layer.
    #[config(default = 32)]
    pub growth_rate: usize,

    /// Stem output width.
    #[config(default = 64)]
    pub num_init_features: usize,

    /// The number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

/// `DenseNet-121` config: dense blocks ``[6, 12, 24, 16]``, growth rate 32.
pub fn densenet121_config(num_classes: usize) -> DenseNetConfig {
    DenseNetConfig::new([6, 12, 24, 16], num_classes)
}

impl DenseNetConfig {
    /// Initialize a [`DenseNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> DenseNet<B> {
        let mut blocks = Vec::with_capacity(self.block_layers.len());
        let mut transitions = Vec::with_capacity(self.block_layers.len() - 1);

        let mut width = self.num_init_features;
        for (idx, &num_layers) in self.block_layers.iter().enumerate() {
            let layers = (0..num_layers)
                .map(|l| DenseLayer::new(width + l * self.growth_rate, self.growth_rate, device))
                .collect();
            blocks.push(DenseBlock { layers });
            width += num_layers * self.growth_rate;

            if idx + 1 < self.block_layers.len() {
                transitions.push(Transition::new(width, width / 2, device));
                width /= 2;
            }
        }

        DenseNet {
            conv0: Conv2dConfig::new([self.in_channels, self.num_init_features], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .with_initializer(conv_fan_out_initializer())
                .init(device),
            norm0: BatchNormConfig::new(self.num_init_features).init(device),
            relu: Relu::new(),
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),

            blocks,
            transitions,

            norm_final: BatchNormConfig::new(width).init(device),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(width, self.num_classes).init(device),
        }
    }
}

/// One dense layer: bottleneck 1x1 conv then 3x3 conv, output concatenated
/// onto the input feature map.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    norm1: BatchNorm<B, 2>,
    conv1: Conv2d<B>,
    norm2: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> DenseLayer<B> {
    fn new(
        in_planes: usize,
        growth_rate: usize,
        device: &B::Device,
    ) -> Self {
        // Bottleneck width is fixed at 4x the growth rate.
        let bottleneck = 4 * growth_rate;

        Self {
            norm1: BatchNormConfig::new(in_planes).init(device),
            conv1: Conv2dConfig::new([in_planes, bottleneck], [1, 1])
                .with_bias(false)
                .with_initializer(conv_fan_out_initializer())
                .init(device),
            norm2: BatchNormConfig::new(bottleneck).init(device),
            conv2: Conv2dConfig::new([bottleneck, growth_rate], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .with_initializer(conv_fan_out_initializer())
                .init(device),
            relu: Relu::new(),
        }
    }

    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.relu.forward(self.norm1.forward(input.clone()));
        let x = self.conv1.forward(x);
        let x = self.relu.forward(self.norm2.forward(x));
        let x = self.conv2.forward(x);

        Tensor::cat(vec![input, x], 1)
    }
}

/// A sequence of [`DenseLayer`]s.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.layers.iter().fold(input, |x, layer| layer.forward(x))
    }
}

/// Transition between dense blocks: halve channels and resolution.
#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    norm: BatchNorm<B, 2>,
    conv: Conv2d<B>,
    pool: AvgPool2d,
    relu: Relu,
}

impl<B: Backend> Transition<B> {
    fn new(
        in_planes: usize,
        out_planes: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            norm: BatchNormConfig::new(in_planes).init(device),
            conv: Conv2dConfig::new([in_planes, out_planes], [1, 1])
                .with_bias(false)
                .with_initializer(conv_fan_out_initializer())
                .init(device),
            pool: AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            relu: Relu::new(),
        }
    }

    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.relu.forward(self.norm.forward(input));
        let x = self.conv.forward(x);
        self.pool.forward(x)
    }
}

/// Densely connected classification network.
#[derive(Module, Debug)]
pub struct DenseNet<B: Backend> {
    conv0: Conv2d<B>,
    norm0: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,

    blocks: Vec<DenseBlock<B>>,
    transitions: Vec<Transition<B>>,

    norm_final: BatchNorm<B, 2>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> DenseNet<B> {
    /// The number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.shape().dims[1]
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
        let x = self.conv0.forward(input);
        let x = self.norm0.forward(x);
        let x = self.relu.forward(x);
        let mut x = self.maxpool.forward(x);

        for (idx, block) in self.blocks.iter().enumerate() {
            x = block.forward(x);
            if let Some(transition) = self.transitions.get(idx) {
                x = transition.forward(x);
            }
        }

        let x = self.relu.forward(self.norm_final.forward(x));
        let x = self.avgpool.forward(x);
        let x = x.flatten(1, 3);

        self.fc.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_densenet121_config() {
        let config = densenet121_config(10);
        assert_eq!(config.block_layers, [6, 12, 24, 16]);
        assert_eq!(config.growth_rate, 32);
        assert_eq!(config.num_init_features, 64);
    }

    #[test]
    fn test_densenet121_head_width() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: DenseNet<B> = densenet121_config(10).init(&device);
        assert_eq!(model.num_classes(), 10);
        // 121-layer plan lands at 1024 features.
        assert_eq!(model.fc.weight.shape().dims[0], 1024);
    }

    #[test]
    fn test_densenet_forward_shape() {
        type B = NdArray<f32>;
        let device = Default::default();

        // A shallow plan keeps the test cheap; same composition rules.
        let model: DenseNet<B> = DenseNetConfig::new([2, 2, 2, 2], 6).init(&device);

        let input = Tensor::ones([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 6)],
        );
    }
}
