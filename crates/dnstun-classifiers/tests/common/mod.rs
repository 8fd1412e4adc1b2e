//! Tiny hand-built models for exercising the candle path
//!
//! The "digit" model has a one-dimensional embedding that is 1.0 for
//! digits and 0.0 otherwise, a width-1 convolution passing it through,
//! and a head that maps "saw a digit" to class 0 and "no digit" to class 1.

#![allow(dead_code)]

use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Vocabulary size the encoder produces ids for
pub const VOCAB_SIZE: usize = 41;

/// Builder for small safetensors model files
pub struct ModelFixture {
    tensors: HashMap<String, Tensor>,
}

impl ModelFixture {
    /// Empty model file
    pub fn empty() -> Self {
        Self {
            tensors: HashMap::new(),
        }
    }

    /// Model refusing (class 0) any name that contains a digit
    pub fn digit_model() -> Self {
        let mut table = vec![0f32; VOCAB_SIZE];
        for id in 27..=36 {
            table[id] = 1.0;
        }

        Self::empty()
            .with("embedding.weight", table, &[VOCAB_SIZE, 1])
            .with("conv.0.weight", vec![1.0], &[1, 1, 1])
            .with("conv.0.bias", vec![0.0], &[1])
            .with("dense.weight", vec![2.0, -2.0], &[2, 1])
            .with("dense.bias", vec![-1.0, 1.0], &[2])
    }

    /// Model whose output ignores the input: softmax of `bias`
    pub fn constant_model(bias: Vec<f32>) -> Self {
        let classes = bias.len();
        Self::empty()
            .with("embedding.weight", vec![0.0; VOCAB_SIZE], &[VOCAB_SIZE, 1])
            .with("conv.0.weight", vec![0.0], &[1, 1, 1])
            .with("dense.weight", vec![0.0; classes], &[classes, 1])
            .with("dense.bias", bias, &[classes])
    }

    /// Add or replace a tensor
    pub fn with(mut self, name: &str, data: Vec<f32>, shape: &[usize]) -> Self {
        let tensor = Tensor::from_vec(data, shape, &Device::Cpu).unwrap();
        self.tensors.insert(name.to_string(), tensor);
        self
    }

    /// Drop a tensor
    pub fn without(mut self, name: &str) -> Self {
        self.tensors.remove(name);
        self
    }

    /// Write the model to `dir/<file_name>`
    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        candle_core::safetensors::save(&self.tensors, &path).unwrap();
        path
    }
}
