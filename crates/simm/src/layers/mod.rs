//! # Reusable neural network modules.

pub mod norm;
