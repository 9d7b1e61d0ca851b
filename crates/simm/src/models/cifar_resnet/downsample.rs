//! # Identity-Path Downsample for the CIFAR `ResNet` Family
//!
//! When a block changes stride or channel count, the skip connection is
//! matched with a [`ZeroPadDownsample`]: a 1x1-kernel average pool at the
//! block stride, parameter-free normalization, then zero-filled channels
//! concatenated up to the output width. A fixed policy; never a learned
//! projection.

use crate::layers::norm::{PlainBatchNorm2d, PlainBatchNorm2dConfig};
use crate::models::util::stride_div_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`ZeroPadDownsample`] Meta trait.
pub trait ZeroPadDownsampleMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_channels(&self) -> usize;

    /// The stride of the pooling reduction.
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

/// [`ZeroPadDownsample`] configuration.
#[derive(Config, Debug)]
pub struct ZeroPadDownsampleConfig {
    /// The size of the in channels dimension.
    in_channels: usize,

    /// The size of the out channels dimension.
    ///
    /// Must be >= `in_channels`; the difference is zero-filled.
    out_channels: usize,

    /// The stride of the pooling reduction.
    #[config(default = 1)]
    stride: usize,
}

impl ZeroPadDownsampleMeta for ZeroPadDownsampleConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ZeroPadDownsampleConfig {
    /// Initialize a [`ZeroPadDownsample`] module.
    ///
    /// # Panics
    ///
    /// If `out_channels < in_channels`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ZeroPadDownsample<B> {
        assert!(
            self.out_channels >= self.in_channels,
            "out_channels ({}) must be >= in_channels ({})",
            self.out_channels,
            self.in_channels,
        );

        ZeroPadDownsample {
            pool: AvgPool2dConfig::new([1, 1])
                .with_strides([self.stride, self.stride])
                .init(),
            norm: PlainBatchNorm2dConfig::new(self.in_channels).init(device),
            out_channels: self.out_channels,
            stride: self.stride,
        }
    }
}

/// Pooling + zero-padded-channel downsample layer.
///
/// Maps ``[batch, in_channels, in_height, in_width]`` to
/// ``[batch, out_channels, in_height / stride, in_width / stride]``; the
/// trailing ``out_channels - in_channels`` channels are zero-filled.
#[derive(Module, Debug)]
pub struct ZeroPadDownsample<B: Backend> {
    /// Pooling reduction matched to the block stride.
    pub pool: AvgPool2d,

    /// Parameter-free normalization over the pooled input.
    pub norm: PlainBatchNorm2d<B>,

    /// The size of the out channels dimension.
    pub out_channels: usize,

    /// The stride of the pooling reduction.
    pub stride: usize,
}

impl<B: Backend> ZeroPadDownsampleMeta for ZeroPadDownsample<B> {
    fn in_channels(&self) -> usize {
        self.norm.num_features()
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl<B: Backend> ZeroPadDownsample<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_channels",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[
                ("in_channels", self.in_channels()),
                ("stride", self.stride())
            ]
        );

        let x = self.pool.forward(input);
        let x = self.norm.forward(x);

        let channels = x.dims()[1];
        let out = if channels == self.out_channels {
            x
        } else {
            let pad = Tensor::zeros(
                [batch, self.out_channels - channels, out_height, out_width],
                &x.device(),
            );
            Tensor::cat(vec![x, pad], 1)
        };

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_downsample_config() {
        let config = ZeroPadDownsampleConfig::new(16, 32);
        assert_eq!(config.in_channels(), 16);
        assert_eq!(config.out_channels(), 32);
        assert_eq!(config.stride(), 1);
        assert_eq!(config.output_resolution([8, 8]), [8, 8]);

        let config = config.with_stride(2);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([8, 8]), [4, 4]);
    }

    #[test]
    #[should_panic(expected = "must be >= in_channels")]
    fn test_downsample_channel_shrink_panics() {
        type B = NdArray<f32>;
        let device = Default::default();
        let _: ZeroPadDownsample<B> = ZeroPadDownsampleConfig::new(32, 16).init(&device);
    }

    #[test]
    fn test_downsample_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let batch_size = 2;
        let in_channels = 4;
        let out_channels = 8;

        let downsample: ZeroPadDownsample<B> =
            ZeroPadDownsampleConfig::new(in_channels, out_channels)
                .with_stride(2)
                .init(&device);

        let input = Tensor::ones([batch_size, in_channels, 8, 8], &device);
        let out = downsample.forward(input);

        assert_shape_contract!(
            ["batch", "out_channels", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch_size),
                ("out_channels", out_channels),
                ("out_height", 4),
                ("out_width", 4)
            ]
        );

        // The padded channels are exactly zero.
        let pad_mass: f32 = out
            .slice([0..batch_size, in_channels..out_channels, 0..4, 0..4])
            .abs()
            .sum()
            .into_scalar();
        assert_eq!(pad_mass, 0.0);
    }
}
