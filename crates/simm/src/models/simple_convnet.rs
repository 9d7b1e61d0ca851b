//! # Simple ConvNet Baseline
//!
//! The small two-convolution baseline behind the `simple_convnet` registry
//! key. Fixed to 32x32 inputs; the flatten below hard-codes the resulting
//! ``16 * 5 * 5`` feature size.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`SimpleConvNet`] Config.
#[derive(Config, Debug)]
pub struct SimpleConvNetConfig {
    /// The number of output classes.
    pub num_classes: usize,

    /// The number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

impl SimpleConvNetConfig {
    /// Initialize a [`SimpleConvNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SimpleConvNet<B> {
        SimpleConvNet {
            conv1: Conv2dConfig::new([self.in_channels, 6], [5, 5]).init(device),
            conv2: Conv2dConfig::new([6, 16], [5, 5]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(16 * 5 * 5, 120).init(device),
            fc2: LinearConfig::new(120, 84).init(device),
            fc3: LinearConfig::new(84, self.num_classes).init(device),
            relu: Relu::new(),
        }
    }
}

/// A small convolutional baseline for 32x32 images.
#[derive(Module, Debug)]
pub struct SimpleConvNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    relu: Relu,
}

impl<B: Backend> SimpleConvNet<B> {
    /// The number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc3.weight.shape().dims[1]
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_channels, 32, 32]`` image batch.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` class scores.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let x = self.pool.forward(self.relu.forward(self.conv1.forward(input)));
        let x = self.pool.forward(self.relu.forward(self.conv2.forward(x)));

        let x = x.flatten(1, 3);

        let x = self.relu.forward(self.fc1.forward(x));
        let x = self.relu.forward(self.fc2.forward(x));

        self.fc3.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_simple_convnet_forward_shape() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: SimpleConvNet<B> = SimpleConvNetConfig::new(10).init(&device);
        assert_eq!(model.num_classes(), 10);

        let input = Tensor::ones([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 10)],
        );
    }
}
