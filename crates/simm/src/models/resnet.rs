//! # ImageNet-Style `ResNet`
//!
//! The standard classification backbone behind the `rn-18` registry key:
//! 7x7 stem, four basic-block layers, global average pooling, linear head.
//!
//! Unlike [`crate::models::cifar_resnet`], this family uses affine batch
//! normalization and a learned 1x1 convolution on shape-changing identity
//! paths.

use crate::models::util::{conv3x3, conv_fan_out_initializer};
use bimm_contracts::assert_shape_contract_periodically;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Learned 1x1 conv + norm downsample for the identity path.
#[derive(Module, Debug)]
pub struct ConvDownsample<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvDownsample<B> {
    fn new(
        in_planes: usize,
        out_planes: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            conv: Conv2dConfig::new([in_planes, out_planes], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .with_initializer(conv_fan_out_initializer())
                .init(device),
            norm: BatchNormConfig::new(out_planes).init(device),
        }
    }

    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(input))
    }
}

/// [`BasicBlock`] Config.
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The number of input feature planes.
    pub in_planes: usize,

    /// The number of output feature planes.
    pub planes: usize,

    /// The stride of the first convolution.
    #[config(default = 1)]
    pub stride: usize,
}

impl BasicBlockConfig {
    /// Initialize a [`BasicBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> BasicBlock<B> {
        let downsample = if self.stride != 1 || self.in_planes != self.planes {
            Some(ConvDownsample::new(
                self.in_planes,
                self.planes,
                self.stride,
                device,
            ))
        } else {
            None
        };

        BasicBlock {
            conv1: conv3x3(self.in_planes, self.planes, self.stride).init(device),
            norm1: BatchNormConfig::new(self.planes).init(device),
            conv2: conv3x3(self.planes, self.planes, 1).init(device),
            norm2: BatchNormConfig::new(self.planes).init(device),
            downsample,
            relu: Relu::new(),
        }
    }
}

/// Standard residual basic block with affine normalization.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    norm1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    norm2: BatchNorm<B, 2>,
    downsample: Option<ConvDownsample<B>>,
    relu: Relu,
}

impl<B: Backend> BasicBlock<B> {
    /// Forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.conv1.forward(input);
        let x = self.norm1.forward(x);
        let x = self.relu.forward(x);

        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);

        self.relu.forward(x + identity)
    }
}

/// [`ResNet`] Config.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Basic-block counts for the four layers.
    pub blocks: [usize; 4],

    /// The number of output classes.
    pub num_classes: usize,

    /// The number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

impl ResNetConfig {
    /// Initialize a [`ResNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNet<B> {
        let build_layer = |num_blocks: usize, in_planes: usize, planes: usize, stride: usize| {
            (0..num_blocks)
                .map(|b| {
                    if b == 0 {
                        BasicBlockConfig::new(in_planes, planes).with_stride(stride)
                    } else {
                        BasicBlockConfig::new(planes, planes)
                    }
                    .init(device)
                })
                .collect::<Vec<_>>()
        };

        ResNet {
            conv1: Conv2dConfig::new([self.in_channels, 64], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .with_initializer(conv_fan_out_initializer())
                .init(device),
            norm1: BatchNormConfig::new(64).init(device),
            relu: Relu::new(),
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),

            layer1: build_layer(self.blocks[0], 64, 64, 1),
            layer2: build_layer(self.blocks[1], 64, 128, 2),
            layer3: build_layer(self.blocks[2], 128, 256, 2),
            layer4: build_layer(self.blocks[3], 256, 512, 2),

            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(512, self.num_classes).init(device),
        }
    }
}

/// `ResNet-18` config: basic blocks ``[2, 2, 2, 2]``.
pub fn resnet18_config(num_classes: usize) -> ResNetConfig {
    ResNetConfig::new([2, 2, 2, 2], num_classes)
}

/// ImageNet-style `ResNet` with basic blocks.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    conv1: Conv2d<B>,
    norm1: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,

    layer1: Vec<BasicBlock<B>>,
    layer2: Vec<BasicBlock<B>>,
    layer3: Vec<BasicBlock<B>>,
    layer4: Vec<BasicBlock<B>>,

    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> ResNet<B> {
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
        let batch = input.dims()[0];

        let x = self.conv1.forward(input);
        let x = self.norm1.forward(x);
        let x = self.relu.forward(x);
        let x = self.maxpool.forward(x);

        let x = self.layer1.iter().fold(x, |x, b| b.forward(x));
        let x = self.layer2.iter().fold(x, |x, b| b.forward(x));
        let x = self.layer3.iter().fold(x, |x, b| b.forward(x));
        let x = self.layer4.iter().fold(x, |x, b| b.forward(x));

        let x = self.avgpool.forward(x);
        let x = x.flatten(1, 3);
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())],
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_resnet18_config() {
        let config = resnet18_config(10);
        assert_eq!(config.blocks, [2, 2, 2, 2]);
        assert_eq!(config.num_classes, 10);
        assert_eq!(config.in_channels, 3);
    }

    #[test]
    fn test_basic_block_downsample_presence() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(64, 64).init(&device);
        assert!(block.downsample.is_none());

        let block: BasicBlock<B> = BasicBlockConfig::new(64, 128).with_stride(2).init(&device);
        assert!(block.downsample.is_some());
    }

    #[test]
    fn test_resnet18_forward_shape() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = resnet18_config(5).init(&device);
        assert_eq!(model.num_classes(), 5);

        let input = Tensor::ones([2, 3, 64, 64], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 5)],
        );
    }
}
