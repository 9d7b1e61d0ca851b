//! # CIFAR `ResNet` Stage
//!
//! A [`Stage`] is a sequence of [`CifarBasicBlock`]s sharing channel width
//! and spatial resolution except at stage entry: the first block carries
//! the stage's stride and width change.

use crate::models::cifar_resnet::basic_block::{
    CifarBasicBlock, CifarBasicBlockConfig, CifarBlockMeta,
};
use crate::models::util::stride_div_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Stage`] Meta API.
pub trait StageMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the stage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the stage.
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

/// [`Stage`] Configuration.
#[derive(Config, Debug)]
pub struct StageConfig {
    /// The component blocks.
    pub blocks: Vec<CifarBasicBlockConfig>,
}

impl From<Vec<CifarBasicBlockConfig>> for StageConfig {
    fn from(blocks: Vec<CifarBasicBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl StageMeta for StageConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl StageConfig {
    /// Build a stage config.
    ///
    /// The first block maps `in_planes` to `planes` at `stride`; the rest
    /// are identity-shaped.
    pub fn build(
        num_blocks: usize,
        in_planes: usize,
        planes: usize,
        stride: usize,
    ) -> Self {
        let blocks = (0..num_blocks)
            .map(|b| {
                if b == 0 {
                    CifarBasicBlockConfig::new(in_planes, planes).with_stride(stride)
                } else {
                    CifarBasicBlockConfig::new(planes, planes)
                }
            })
            .collect();

        Self { blocks }
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(format!(
                    "block[{}].out_planes({}) != block[{}].in_planes({})\n{:#?}",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                    self,
                ));
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        match self.try_validate() {
            Ok(_) => (),
            Err(err) => panic!("{}", err),
        }
    }

    /// Initialize a new [`Stage`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Stage<B> {
        self.expect_valid();

        Stage {
            blocks: self
                .blocks
                .iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }
}

/// A sequence of residual blocks.
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<CifarBasicBlock<B>>,
}

impl<B: Backend> StageMeta for Stage<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> Stage<B> {
    /// Apply the stage.
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
        let [batch, out_height, out_width] = unpack_shape_contract!(
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

        let x = self.blocks.iter().fold(input, |x, block| block.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
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
    fn test_stage_config_build() {
        let config = StageConfig::build(3, 16, 32, 2);
        config.expect_valid();
        assert_eq!(config.len(), 3);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([32, 32]), [16, 16]);

        let first = &config.blocks[0];
        assert_eq!(first.in_planes(), 16);
        assert_eq!(first.out_planes(), 32);
        assert_eq!(first.stride(), 2);

        for block in &config.blocks[1..] {
            assert_eq!(block.in_planes(), 32);
            assert_eq!(block.out_planes(), 32);
            assert_eq!(block.stride(), 1);
        }
    }

    #[test]
    fn test_stage_config_validation() {
        let config = StageConfig::from(vec![
            CifarBasicBlockConfig::new(16, 32).with_stride(2),
            CifarBasicBlockConfig::new(16, 32),
        ]);
        assert!(config.try_validate().is_err());

        let config = StageConfig::from(vec![]);
        assert!(config.try_validate().is_err());
    }

    #[test]
    fn test_stage_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let stage: Stage<B> = StageConfig::build(2, 8, 16, 2).init(&device);
        assert_eq!(stage.len(), 2);
        assert_eq!(stage.in_planes(), 8);
        assert_eq!(stage.out_planes(), 16);
        assert_eq!(stage.stride(), 2);

        let input = Tensor::ones([2, 8, 16, 16], &device);
        let output = stage.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 16),
                ("out_height", 8),
                ("out_width", 8)
            ],
        );
    }
}
