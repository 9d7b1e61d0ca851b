//! # `MobileNetV2`
//!
//! The inverted-residual backbone behind the `mobilenetv2` registry key.
//! Bottleneck blocks expand channels, filter depthwise, and project back
//! down with a linear 1x1 convolution; ReLU6 activations throughout.

use crate::models::util::conv_fan_out_initializer;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Per-stage ``(expand_ratio, channels, repeats, stride)`` plan.
const INVERTED_RESIDUAL_SETTINGS: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

/// Clamped rectifier; linear on ``[0, 6]``.
fn relu6<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    x.clamp(0.0, 6.0)
}

/// Convolution + norm + ReLU6 unit.
#[derive(Module, Debug)]
pub struct ConvNormAct<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvNormAct<B> {
    fn new(
        in_planes: usize,
        out_planes: usize,
        kernel_size: usize,
        stride: usize,
        groups: usize,
        device: &B::Device,
    ) -> Self {
        let padding = (kernel_size - 1) / 2;

        Self {
            conv: Conv2dConfig::new([in_planes, out_planes], [kernel_size, kernel_size])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .with_groups(groups)
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
        relu6(self.norm.forward(self.conv.forward(input)))
    }
}

/// Inverted residual bottleneck block.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    /// Optional 1x1 expansion; absent when the expand ratio is 1.
    expand: Option<ConvNormAct<B>>,

    /// Depthwise 3x3 filter.
    depthwise: ConvNormAct<B>,

    /// Linear 1x1 projection.
    project_conv: Conv2d<B>,

    /// Norm after the projection; no activation follows.
    project_norm: BatchNorm<B, 2>,

    /// Whether the block carries a skip connection.
    use_residual: bool,
}

impl<B: Backend> InvertedResidual<B> {
    fn new(
        in_planes: usize,
        out_planes: usize,
        stride: usize,
        expand_ratio: usize,
        device: &B::Device,
    ) -> Self {
        let hidden = in_planes * expand_ratio;

        Self {
            expand: (expand_ratio != 1)
                .then(|| ConvNormAct::new(in_planes, hidden, 1, 1, 1, device)),
            depthwise: ConvNormAct::new(hidden, hidden, 3, stride, hidden, device),
            project_conv: Conv2dConfig::new([hidden, out_planes], [1, 1])
                .with_bias(false)
                .with_initializer(conv_fan_out_initializer())
                .init(device),
            project_norm: BatchNormConfig::new(out_planes).init(device),
            use_residual: stride == 1 && in_planes == out_planes,
        }
    }

    fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = match &self.expand {
            Some(expand) => expand.forward(input.clone()),
            None => input.clone(),
        };
        let x = self.depthwise.forward(x);
        let x = self.project_norm.forward(self.project_conv.forward(x));

        if self.use_residual { x + input } else { x }
    }
}

/// [`MobileNetV2`] Config.
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    /// The number of output classes.
    pub num_classes: usize,

    /// Classifier dropout probability.
    #[config(default = 0.2)]
    pub dropout: f64,

    /// The number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

/// `MobileNetV2` config with the standard bottleneck plan.
pub fn mobilenet_v2_config(num_classes: usize) -> MobileNetV2Config {
    MobileNetV2Config::new(num_classes)
}

impl MobileNetV2Config {
    /// Initialize a [`MobileNetV2`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> MobileNetV2<B> {
        let stem_width = 32;
        let head_width = 1280;

        let mut width = stem_width;
        let mut blocks = Vec::new();
        for (expand_ratio, planes, repeats, stride) in INVERTED_RESIDUAL_SETTINGS {
            for r in 0..repeats {
                let stride = if r == 0 { stride } else { 1 };
                blocks.push(InvertedResidual::new(
                    width,
                    planes,
                    stride,
                    expand_ratio,
                    device,
                ));
                width = planes;
            }
        }

        MobileNetV2 {
            stem: ConvNormAct::new(self.in_channels, stem_width, 3, 2, 1, device),
            blocks,
            head: ConvNormAct::new(width, head_width, 1, 1, 1, device),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc: LinearConfig::new(head_width, self.num_classes).init(device),
        }
    }
}

/// `MobileNetV2` classification network.
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    /// Stem convolution unit; stride 2.
    pub stem: ConvNormAct<B>,

    /// Inverted residual bottleneck stack.
    pub blocks: Vec<InvertedResidual<B>>,

    /// 1x1 head convolution unit.
    pub head: ConvNormAct<B>,

    /// Global average pooling to ``1x1``.
    pub avgpool: AdaptiveAvgPool2d,

    /// Classifier dropout.
    pub dropout: Dropout,

    /// Classifier head.
    pub fc: Linear<B>,
}

impl<B: Backend> MobileNetV2<B> {
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
        let x = self.stem.forward(input);
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));
        let x = self.head.forward(x);

        let x = self.avgpool.forward(x);
        let x = x.flatten(1, 3);
        let x = self.dropout.forward(x);

        self.fc.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_mobilenet_v2_plan() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: MobileNetV2<B> = mobilenet_v2_config(10).init(&device);
        assert_eq!(model.num_classes(), 10);

        let repeats: usize = INVERTED_RESIDUAL_SETTINGS.iter().map(|s| s.2).sum();
        assert_eq!(model.blocks.len(), repeats);

        // The expand-ratio-1 first block has no expansion unit.
        assert!(model.blocks[0].expand.is_none());
        assert!(model.blocks[1].expand.is_some());
    }

    #[test]
    fn test_mobilenet_forward_shape() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: MobileNetV2<B> = mobilenet_v2_config(4).init(&device);

        let input = Tensor::ones([1, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 1), ("num_classes", 4)],
        );
    }
}
