//! Model loading for Candle-based classifiers

use candle_core::{DType, Device, Tensor};
use dnstun_core::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default input endpoint (embedding table prefix)
pub const DEFAULT_INPUT_ENDPOINT: &str = "embedding";

/// Default output endpoint (classification head prefix)
pub const DEFAULT_OUTPUT_ENDPOINT: &str = "dense";

/// Default cap on concurrent forward passes
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Configuration for loading a Candle model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Path to the safetensors graph file
    pub path: PathBuf,

    /// Name of the input endpoint
    pub input: String,

    /// Name of the output endpoint
    pub output: String,

    /// Device to run inference on
    pub device: DeviceType,

    /// Expected number of classes, checked against the loaded model
    pub num_classes: Option<usize>,

    /// Forward passes allowed in flight at once; later calls wait for a slot
    pub max_concurrency: usize,
}

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// CPU inference (always available)
    Cpu,
    /// CUDA GPU inference (if available)
    Cuda(usize), // GPU index
    /// Metal (Apple Silicon)
    Metal(usize),
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            input: DEFAULT_INPUT_ENDPOINT.to_string(),
            output: DEFAULT_OUTPUT_ENDPOINT.to_string(),
            device: DeviceType::Cpu,
            num_classes: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl ModelConfig {
    /// Create a new model configuration from local path
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set input and output endpoint names
    pub fn with_endpoints(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.input = input.into();
        self.output = output.into();
        self
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Set the expected class count
    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = Some(num_classes);
        self
    }

    /// Set the cap on concurrent forward passes
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }
}

/// Tensors of a loaded model file, resident on one device
pub struct LoadedModel {
    tensors: HashMap<String, Tensor>,
    device: Device,
    metadata: ModelMetadata,
}

#[derive(Debug, Clone)]
pub struct ModelMetadata {
    /// Model name, taken from the file stem
    pub name: String,

    /// Number of named tensors in the file
    pub tensor_count: usize,
}

impl LoadedModel {
    /// Load a model from configuration
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let weights_path = Self::resolve_model_path(config)?;
        let device = Self::create_device(config.device)?;

        let tensors = candle_core::safetensors::load(&weights_path, &device).map_err(|e| {
            Error::initialization(format!(
                "Failed to parse model {}: {}",
                weights_path.display(),
                e
            ))
        })?;

        let metadata = ModelMetadata {
            name: weights_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string(),
            tensor_count: tensors.len(),
        };

        tracing::info!(
            model = %metadata.name,
            tensors = metadata.tensor_count,
            path = %weights_path.display(),
            "Model loaded"
        );

        Ok(Self {
            tensors,
            device,
            metadata,
        })
    }

    fn resolve_model_path(config: &ModelConfig) -> Result<PathBuf> {
        if !config.path.is_file() {
            return Err(Error::initialization(format!(
                "Model file not found: {}",
                config.path.display()
            )));
        }
        Ok(config.path.clone())
    }

    /// Create Candle device from device type
    fn create_device(device_type: DeviceType) -> Result<Device> {
        match device_type {
            DeviceType::Cpu => Ok(Device::Cpu),
            DeviceType::Cuda(idx) => Device::new_cuda(idx).map_err(|e| {
                Error::initialization(format!("Failed to create CUDA device: {}", e))
            }),
            DeviceType::Metal(idx) => Device::new_metal(idx).map_err(|e| {
                Error::initialization(format!("Failed to create Metal device: {}", e))
            }),
        }
    }

    /// Look up a tensor by name, converted to `f32`
    pub fn tensor(&self, name: &str) -> Result<Tensor> {
        let tensor = self
            .tensors
            .get(name)
            .ok_or_else(|| Error::initialization(format!("tensor '{}' not found in model", name)))?;

        tensor
            .to_dtype(DType::F32)
            .map_err(|e| Error::initialization(format!("tensor '{}': {}", name, e)))
    }

    /// Check whether a tensor exists
    pub fn has_tensor(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Check whether an endpoint (a `<name>.weight` tensor) exists
    pub fn has_endpoint(&self, name: &str) -> bool {
        self.has_tensor(&format!("{}.weight", name))
    }

    /// Get reference to the device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Get model metadata
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_local() {
        let config = ModelConfig::from_local("/path/to/dnscnn.safetensors")
            .with_endpoints("sent_input", "dense_18")
            .with_device(DeviceType::Cpu)
            .with_num_classes(4)
            .with_max_concurrency(2);

        assert_eq!(config.path, PathBuf::from("/path/to/dnscnn.safetensors"));
        assert_eq!(config.input, "sent_input");
        assert_eq!(config.output, "dense_18");
        assert_eq!(config.num_classes, Some(4));
        assert_eq!(config.max_concurrency, 2);
    }

    #[test]
    fn test_model_config_defaults() {
        let config = ModelConfig::from_local("model.safetensors");

        assert_eq!(config.input, DEFAULT_INPUT_ENDPOINT);
        assert_eq!(config.output, DEFAULT_OUTPUT_ENDPOINT);
        assert_eq!(config.device, DeviceType::Cpu);
        assert!(config.num_classes.is_none());
    }

    #[test]
    fn test_missing_file() {
        let config = ModelConfig::from_local("/nonexistent/dnscnn.safetensors");
        let err = LoadedModel::load(&config).err().unwrap();

        assert!(matches!(err, Error::Initialization(_)));
    }

    #[test]
    fn test_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.safetensors");
        std::fs::write(&path, b"definitely not a tensor file").unwrap();

        let err = LoadedModel::load(&ModelConfig::from_local(&path)).err().unwrap();
        assert!(matches!(err, Error::Initialization(_)));
    }
}
