//! # Model Families
//!
//! * [`cifar_resnet`] - the custom CIFAR `ResNet` family (`rn-20`, `wrn*`).
//! * [`resnet`] - ImageNet-style `ResNet-18`.
//! * [`vgg`] - `VGG-11` / `VGG-16`.
//! * [`densenet`] - `DenseNet-121`.
//! * [`mobilenet`] - `MobileNetV2`.
//! * [`simple_convnet`] - a small two-conv baseline.

pub mod cifar_resnet;
pub mod densenet;
pub mod mobilenet;
pub mod resnet;
pub mod simple_convnet;
pub mod util;
pub mod vgg;
