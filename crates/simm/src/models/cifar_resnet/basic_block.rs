//! # Basic Block for the CIFAR `ResNet` Family
//!
//! [`CifarBasicBlock`] is the residual unit: two ``3x3 conv -> parameter-free
//! norm`` stages with ReLU after the first norm and after the skip addition.
//!
//! [`CifarBlockMeta`] defines a common meta API for the block and its config.

use crate::layers::norm::{PlainBatchNorm2d, PlainBatchNorm2dConfig};
use crate::models::cifar_resnet::downsample::{ZeroPadDownsample, ZeroPadDownsampleConfig};
use crate::models::util::{conv3x3, stride_div_output_resolution};
use burn::nn::Relu;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Meta API shared by block configs and initialized blocks.
pub trait CifarBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of the first convolution.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// The input must be a multiple of the stride.
    ///
    /// # Panics
    ///
    /// If the input resolution is not a multiple of the stride.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_div_output_resolution(input_resolution, self.stride())
    }
}

/// [`CifarBasicBlock`] Config.
///
/// Implements [`CifarBlockMeta`].
#[derive(Config, Debug)]
pub struct CifarBasicBlockConfig {
    /// The number of input feature planes.
    pub in_planes: usize,

    /// The number of output feature planes.
    pub planes: usize,

    /// The stride of the first convolution.
    #[config(default = 1)]
    pub stride: usize,
}

impl CifarBlockMeta for CifarBasicBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl CifarBasicBlockConfig {
    /// Initialize a [`CifarBasicBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> CifarBasicBlock<B> {
        // The identity path needs adjustment exactly when the block
        // changes resolution or width.
        let downsample = if self.stride != 1 || self.in_planes != self.planes {
            Some(
                ZeroPadDownsampleConfig::new(self.in_planes, self.planes)
                    .with_stride(self.stride)
                    .init(device),
            )
        } else {
            None
        };

        CifarBasicBlock {
            conv1: conv3x3(self.in_planes, self.planes, self.stride).init(device),
            norm1: PlainBatchNorm2dConfig::new(self.planes).init(device),
            conv2: conv3x3(self.planes, self.planes, 1).init(device),
            norm2: PlainBatchNorm2dConfig::new(self.planes).init(device),
            downsample,
            relu: Relu::new(),
        }
    }
}

/// Basic residual block of the CIFAR `ResNet` family.
///
/// Implements [`CifarBlockMeta`].
#[derive(Module, Debug)]
pub struct CifarBasicBlock<B: Backend> {
    /// First 3x3 convolution; carries the block stride.
    pub conv1: Conv2d<B>,

    /// Parameter-free norm after `conv1`.
    pub norm1: PlainBatchNorm2d<B>,

    /// Second 3x3 convolution; always stride 1.
    pub conv2: Conv2d<B>,

    /// Parameter-free norm after `conv2`.
    pub norm2: PlainBatchNorm2d<B>,

    /// Identity-path adjustment; present iff stride or width changes.
    pub downsample: Option<ZeroPadDownsample<B>>,

    /// Shared rectifier.
    pub relu: Relu,
}

impl<B: Backend> CifarBlockMeta for CifarBasicBlock<B> {
    fn in_planes(&self) -> usize {
        self.conv1.weight.shape().dims[1]
    }

    fn out_planes(&self) -> usize {
        self.conv2.weight.shape().dims[0]
    }

    fn stride(&self) -> usize {
        self.conv1.stride[0]
    }
}

impl<B: Backend> CifarBasicBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        #[cfg(debug_assertions)]
        let [batch, out_height, out_width] = bimm_contracts::unpack_shape_contract!(
            [
                "batch",
                "in_planes",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[("in_planes", self.in_planes()), ("stride", self.stride())],
        );

        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.conv1.forward(input);
        let x = self.norm1.forward(x);
        let x = self.relu.forward(x);

        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);

        let x = self.relu.forward(x + identity);

        #[cfg(debug_assertions)]
        bimm_contracts::assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width),
            ]
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
    fn test_basic_block_config() {
        let config = CifarBasicBlockConfig::new(16, 16);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 16);
        assert_eq!(config.stride(), 1);
        assert_eq!(config.output_resolution([32, 32]), [32, 32]);

        let config = CifarBasicBlockConfig::new(16, 32).with_stride(2);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([32, 32]), [16, 16]);
    }

    #[test]
    fn test_identity_block_has_no_downsample() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: CifarBasicBlock<B> = CifarBasicBlockConfig::new(8, 8).init(&device);
        assert!(block.downsample.is_none());
        assert_eq!(block.in_planes(), 8);
        assert_eq!(block.out_planes(), 8);
        assert_eq!(block.stride(), 1);
    }

    #[test]
    fn test_stride_1_forward_preserves_shape() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: CifarBasicBlock<B> = CifarBasicBlockConfig::new(8, 8).init(&device);

        let input = Tensor::ones([2, 8, 16, 16], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "planes", "height", "width"],
            &output,
            &[("batch", 2), ("planes", 8), ("height", 16), ("width", 16)],
        );
    }

    #[test]
    fn test_stride_2_forward_halves_resolution() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: CifarBasicBlock<B> = CifarBasicBlockConfig::new(8, 16).with_stride(2).init(&device);
        assert!(block.downsample.is_some());

        let input = Tensor::ones([2, 8, 16, 16], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "planes", "height", "width"],
            &output,
            &[("batch", 2), ("planes", 16), ("height", 8), ("width", 8)],
        );
    }
}
