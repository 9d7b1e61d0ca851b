//! # Model Building Utilities

use bimm_contracts::unpack_shape_contract;
use burn::nn::conv::Conv2dConfig;
use burn::nn::{Initializer, PaddingConfig2d};

/// Fan-out scaled normal initializer for convolutions feeding a ReLU.
///
/// Draws weights from ``N(0, 2 / (kernel_area * out_channels))``.
pub fn conv_fan_out_initializer() -> Initializer {
    Initializer::KaimingNormal {
        gain: std::f64::consts::SQRT_2,
        fan_out_only: true,
    }
}

/// 3x3 convolution with padding, no bias.
///
/// # Arguments
///
/// - `in_planes`: input channel count.
/// - `out_planes`: output channel count.
/// - `stride`: square stride.
pub fn conv3x3(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
) -> Conv2dConfig {
    Conv2dConfig::new([in_planes, out_planes], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .with_initializer(conv_fan_out_initializer())
}

/// Get the output resolution for a given input resolution.
///
/// The input must be a multiple of the stride.
///
/// # Arguments
///
/// - `input_resolution`: ``[height_in=height_out*stride, width_in=width_out*stride]``.
///
/// # Returns
///
/// ``[height_out, width_out]``
///
/// # Panics
///
/// If the input resolution is not a multiple of the stride.
#[inline(always)]
pub fn stride_div_output_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    unpack_shape_contract!(
        [
            "height_in" = "height_out" * "stride",
            "width_in" = "width_out" * "stride"
        ],
        &input_resolution,
        &["height_out", "width_out"],
        &[("stride", stride)]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv3x3() {
        let config = conv3x3(16, 32, 2);
        assert_eq!(config.channels, [16, 32]);
        assert_eq!(config.kernel_size, [3, 3]);
        assert_eq!(config.stride, [2, 2]);
        assert!(!config.bias);
        assert!(matches!(
            config.initializer,
            Initializer::KaimingNormal {
                fan_out_only: true,
                ..
            }
        ));
    }

    #[test]
    fn test_stride_div_output_resolution() {
        assert_eq!(stride_div_output_resolution([32, 32], 1), [32, 32]);
        assert_eq!(stride_div_output_resolution([32, 16], 2), [16, 8]);
    }

    #[test]
    #[should_panic(expected = "7 !~ height_in=(height_out*stride)")]
    fn test_stride_div_output_resolution_panic() {
        stride_div_output_resolution([7, 8], 2);
    }
}
