//! # Parameter-Free Batch Normalization
//!
//! [`PlainBatchNorm2d`] is batch normalization over ``[batch, channels,
//! height, width]`` feature maps with the learned scale/shift disabled;
//! per-channel statistic rescaling only.
//!
//! This is the fixed normalization policy of the CIFAR `ResNet` family;
//! it is a deliberate design choice of that family, not a per-call option.

use burn::module::RunningState;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`PlainBatchNorm2d`] Config.
#[derive(Config, Debug)]
pub struct PlainBatchNorm2dConfig {
    /// The number of channel features.
    pub num_features: usize,

    /// Numerical stability term added to the variance.
    #[config(default = 1e-5)]
    pub epsilon: f64,

    /// Momentum for the running statistics update.
    #[config(default = 0.1)]
    pub momentum: f64,
}

impl PlainBatchNorm2dConfig {
    /// Initialize a [`PlainBatchNorm2d`] module.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> PlainBatchNorm2d<B> {
        PlainBatchNorm2d {
            running_mean: RunningState::new(Tensor::zeros([self.num_features], device)),
            running_var: RunningState::new(Tensor::ones([self.num_features], device)),
            momentum: self.momentum,
            epsilon: self.epsilon,
        }
    }
}

/// Batch normalization without learned scale/shift parameters.
///
/// Normalizes by batch statistics when autodiff is enabled (training),
/// and by the tracked running statistics otherwise (inference).
///
/// Carries no learnable parameters.
#[derive(Module, Debug)]
pub struct PlainBatchNorm2d<B: Backend> {
    /// Running estimate of the per-channel mean.
    pub running_mean: RunningState<Tensor<B, 1>>,

    /// Running estimate of the per-channel variance.
    pub running_var: RunningState<Tensor<B, 1>>,

    /// Momentum for the running statistics update.
    pub momentum: f64,

    /// Numerical stability term added to the variance.
    pub epsilon: f64,
}

impl<B: Backend> PlainBatchNorm2d<B> {
    /// The number of channel features.
    pub fn num_features(&self) -> usize {
        self.running_mean.value().shape().dims[0]
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, channels, height, width]`` tensor.
    ///
    /// # Returns
    ///
    /// A normalized tensor of the same shape.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match B::ad_enabled() {
            true => self.forward_train(input),
            false => self.forward_inference(input),
        }
    }

    fn forward_inference(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let channels = input.dims()[1];

        let mean = self.running_mean.value().reshape([1, channels, 1, 1]);
        let var = self.running_var.value().reshape([1, channels, 1, 1]);

        self.normalize(input, mean, var)
    }

    fn forward_train(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, channels, height, width] = input.dims();
        let flatten_size = batch * height * width;

        let mean = input
            .clone()
            .swap_dims(0, 1)
            .reshape([channels, flatten_size])
            .mean_dim(1)
            .reshape([1, channels, 1, 1]);

        // Biased variance; matches the training-mode normalizer.
        let var = (input.clone() - mean.clone())
            .powf_scalar(2.0)
            .swap_dims(0, 1)
            .reshape([channels, flatten_size])
            .mean_dim(1)
            .reshape([1, channels, 1, 1]);

        let running_mean = self
            .running_mean
            .value_sync()
            .mul_scalar(1.0 - self.momentum)
            .add(
                mean.clone()
                    .detach()
                    .mul_scalar(self.momentum)
                    .reshape([channels]),
            );
        let running_var = self
            .running_var
            .value_sync()
            .mul_scalar(1.0 - self.momentum)
            .add(
                var.clone()
                    .detach()
                    .mul_scalar(self.momentum)
                    .reshape([channels]),
            );

        self.running_mean.update(running_mean.detach());
        self.running_var.update(running_var.detach());

        self.normalize(input, mean, var)
    }

    fn normalize(
        &self,
        input: Tensor<B, 4>,
        mean: Tensor<B, 4>,
        var: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let std = var.add_scalar(self.epsilon).sqrt();
        input.sub(mean).div(std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::Module;
    use burn::tensor::Tolerance;

    #[test]
    fn test_plain_batch_norm_config() {
        let config = PlainBatchNorm2dConfig::new(8);
        assert_eq!(config.num_features, 8);
        assert_eq!(config.epsilon, 1e-5);
        assert_eq!(config.momentum, 0.1);
    }

    #[test]
    fn test_no_learnable_parameters() {
        type B = NdArray<f32>;
        let device = Default::default();

        let norm: PlainBatchNorm2d<B> = PlainBatchNorm2dConfig::new(4).init(&device);
        assert_eq!(norm.num_features(), 4);

        // The only state is the running mean/var pair; no learned
        // scale/shift tensors.
        assert_eq!(norm.num_params(), 2 * 4);
    }

    #[test]
    fn test_inference_uses_running_stats() {
        type B = NdArray<f32>;
        let device = Default::default();

        let norm: PlainBatchNorm2d<B> = PlainBatchNorm2dConfig::new(3).init(&device);

        // Fresh running stats are mean=0 / var=1; the output is the input
        // scaled by 1/sqrt(1 + epsilon).
        let input = Tensor::<B, 4>::ones([2, 3, 4, 4], &device);
        let output = norm.forward(input.clone());

        let expected = input / (1.0f32 + 1e-5).sqrt();
        output
            .into_data()
            .assert_approx_eq::<f32>(&expected.into_data(), Tolerance::default());
    }

    #[test]
    fn test_train_normalizes_batch_statistics() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let norm: PlainBatchNorm2d<B> = PlainBatchNorm2dConfig::new(2).init(&device);

        let input = Tensor::<B, 4>::random(
            [4, 2, 8, 8],
            burn::tensor::Distribution::Normal(3.0, 2.0),
            &device,
        );
        let output = norm.forward(input);

        let mean: f32 = output.clone().mean().into_scalar();
        assert!(mean.abs() < 1e-4, "channel means should center: {mean}");

        let var: f32 = output.powf_scalar(2.0).mean().into_scalar();
        assert!((var - 1.0).abs() < 1e-2, "unit variance expected: {var}");
    }
}
