//! # CIFAR `ResNet` Core Model

use crate::layers::norm::{PlainBatchNorm2d, PlainBatchNorm2dConfig};
use crate::models::cifar_resnet::stage::{Stage, StageConfig};
use crate::models::util::conv3x3;
use bimm_contracts::assert_shape_contract_periodically;
use burn::nn::conv::Conv2d;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Base channel width of the family before the width multiplier.
const BASE_WIDTH: usize = 16;

/// [`CifarResNet`] Config.
#[derive(Config, Debug)]
pub struct CifarResNetConfig {
    /// Residual block counts for the three stages.
    pub num_blocks: [usize; 3],

    /// The number of output classes.
    pub num_classes: usize,

    /// Width multiplier `k` over the ``[16, 32, 64]`` base widths.
    #[config(default = 1)]
    pub width_factor: usize,

    /// The number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

impl CifarResNetConfig {
    /// The channel width of each stage.
    pub fn stage_widths(&self) -> [usize; 3] {
        let k = self.width_factor;
        [BASE_WIDTH * k, 2 * BASE_WIDTH * k, 4 * BASE_WIDTH * k]
    }

    /// Initialize a [`CifarResNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> CifarResNet<B> {
        let [w1, w2, w3] = self.stage_widths();

        CifarResNet {
            conv1: conv3x3(self.in_channels, w1, 1).init(device),
            norm1: PlainBatchNorm2dConfig::new(w1).init(device),
            relu: Relu::new(),

            stage1: StageConfig::build(self.num_blocks[0], w1, w1, 1).init(device),
            stage2: StageConfig::build(self.num_blocks[1], w1, w2, 2).init(device),
            stage3: StageConfig::build(self.num_blocks[2], w2, w3, 2).init(device),

            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(w3, self.num_classes).init(device),
        }
    }
}

/// Residual network for small (CIFAR-sized) images.
///
/// A 3x3 stem, three stages of residual blocks (stages 2 and 3 halve the
/// resolution and double the width), global average pooling, and a linear
/// classifier head.
#[derive(Module, Debug)]
pub struct CifarResNet<B: Backend> {
    /// Stem convolution.
    pub conv1: Conv2d<B>,

    /// Parameter-free stem norm.
    pub norm1: PlainBatchNorm2d<B>,

    /// Shared rectifier.
    pub relu: Relu,

    /// First stage; keeps resolution.
    pub stage1: Stage<B>,

    /// Second stage; stride 2, double width.
    pub stage2: Stage<B>,

    /// Third stage; stride 2, double width.
    pub stage3: Stage<B>,

    /// Global average pooling to ``1x1``.
    pub avgpool: AdaptiveAvgPool2d,

    /// Classifier head.
    pub fc: Linear<B>,
}

impl<B: Backend> CifarResNet<B> {
    /// The number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.shape().dims[1]
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_channels, height, width]`` image batch;
    ///   height and width must be divisible by 4.
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

        let x = self.stage1.forward(x);
        let x = self.stage2.forward(x);
        let x = self.stage3.forward(x);

        let x = self.avgpool.forward(x);
        // [batch, width, 1, 1] -> [batch, width]
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
    use burn::backend::{Autodiff, NdArray};

    #[test]
    fn test_config_stage_widths() {
        let config = CifarResNetConfig::new([3, 3, 3], 10);
        assert_eq!(config.stage_widths(), [16, 32, 64]);

        let config = config.with_width_factor(2);
        assert_eq!(config.stage_widths(), [32, 64, 128]);
    }

    #[test]
    fn test_forward_cifar_shape() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let model: CifarResNet<B> = CifarResNetConfig::new([3, 3, 3], 10).init(&device);
        assert_eq!(model.num_classes(), 10);

        let input = Tensor::ones([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 10)],
        );
    }

    #[test]
    fn test_forward_wide_variant() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: CifarResNet<B> = CifarResNetConfig::new([1, 1, 1], 4)
            .with_width_factor(2)
            .init(&device);

        let input = Tensor::ones([1, 3, 16, 16], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 1), ("num_classes", 4)],
        );
    }
}
