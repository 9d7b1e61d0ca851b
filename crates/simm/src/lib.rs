#![warn(missing_docs)]
//!# simm - Small Image Models
//!
//! Architecture definitions for small-image classification experiments,
//! plus a name-keyed registry to construct them.
//!
//! ## Notable Components
//!
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::norm`] - parameter-free batch normalization.
//! * [`models`] - complete model families.
//!   * [`models::cifar_resnet`] - the CIFAR `ResNet` family (`rn-20`, `wrn*`).
//!   * [`models::resnet`] - ImageNet-style `ResNet-18`.
//!   * [`models::vgg`] - `VGG-11` / `VGG-16`.
//!   * [`models::densenet`] - `DenseNet-121`.
//!   * [`models::mobilenet`] - `MobileNetV2`.
//!   * [`models::simple_convnet`] - a small two-conv baseline.
//! * [`registry`] - the architecture name -> model registry.
//! * [`records`] - persisted training-record inspection.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod layers;
pub mod models;
pub mod records;
pub mod registry;

pub use registry::{Model, ModelConfig, ModelZooError, load_model};
