//! # The CIFAR `ResNet` Family
//!
//! Residual networks for 32x32 images, after the CIFAR models of
//! "Deep Residual Learning for Image Recognition"; with two fixed family
//! policies:
//!
//! * normalization is parameter-free everywhere (no learned scale/shift);
//! * identity paths that change shape use pooling plus zero-filled channel
//!   padding, never a learned projection.

pub mod basic_block;
pub mod downsample;
pub mod model;
pub mod stage;

pub use basic_block::{CifarBasicBlock, CifarBasicBlockConfig, CifarBlockMeta};
pub use downsample::{ZeroPadDownsample, ZeroPadDownsampleConfig, ZeroPadDownsampleMeta};
pub use model::{CifarResNet, CifarResNetConfig};
pub use stage::{Stage, StageConfig, StageMeta};

/// `ResNet-20` config: blocks ``[3, 3, 3]``, width factor 1 (depth ``6n+2``).
pub fn resnet20_config(num_classes: usize) -> CifarResNetConfig {
    CifarResNetConfig::new([3, 3, 3], num_classes)
}

/// Wide variant config for depth ``6n+4`` and width factor `k`.
///
/// # Panics
///
/// If `depth` is not of the form ``6n+4``.
pub fn wide_resnet_config(
    depth: usize,
    width_factor: usize,
    num_classes: usize,
) -> CifarResNetConfig {
    assert!(
        depth > 4 && (depth - 4) % 6 == 0,
        "wide variant depth must be 6n+4, got {depth}"
    );
    let n = (depth - 4) / 6;

    CifarResNetConfig::new([n, n, n], num_classes).with_width_factor(width_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resnet20_config() {
        let config = resnet20_config(10);
        assert_eq!(config.num_blocks, [3, 3, 3]);
        assert_eq!(config.width_factor, 1);
        assert_eq!(config.num_classes, 10);
    }

    #[test]
    fn test_wide_resnet_config() {
        let config = wide_resnet_config(28, 2, 100);
        assert_eq!(config.num_blocks, [4, 4, 4]);
        assert_eq!(config.width_factor, 2);
        assert_eq!(config.num_classes, 100);

        let config = wide_resnet_config(40, 4, 10);
        assert_eq!(config.num_blocks, [6, 6, 6]);
        assert_eq!(config.width_factor, 4);
    }

    #[test]
    #[should_panic(expected = "depth must be 6n+4")]
    fn test_wide_resnet_bad_depth() {
        wide_resnet_config(27, 2, 10);
    }
}
