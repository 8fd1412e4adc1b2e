//! Configuration for model loading

use crate::model_loader::{
    DeviceType, ModelConfig, DEFAULT_INPUT_ENDPOINT, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_OUTPUT_ENDPOINT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model configuration specification (for YAML/config files)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfigSpec {
    /// Path to the graph file
    pub graph: PathBuf,

    /// Input endpoint name
    #[serde(default = "default_input")]
    pub input: String,

    /// Output endpoint name
    #[serde(default = "default_output")]
    pub output: String,

    /// Expected number of classes
    #[serde(default)]
    pub num_classes: Option<usize>,

    /// Device to run inference on
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub device: DeviceSpec,

    /// Forward passes allowed to run at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

/// Device specification (for config files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda {
        #[serde(default)]
        index: Option<usize>,
    },
    Metal {
        #[serde(default)]
        index: Option<usize>,
    },
}

impl ModelConfigSpec {
    /// Spec for a graph with default endpoints
    pub fn new(graph: impl Into<PathBuf>) -> Self {
        Self {
            graph: graph.into(),
            input: default_input(),
            output: default_output(),
            num_classes: None,
            device: DeviceSpec::Cpu,
            max_concurrency: default_max_concurrency(),
        }
    }

    /// Anchor a relative graph path at `base`
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if self.graph.is_relative() {
            self.graph = base.join(&self.graph);
        }
    }

    /// Convert to ModelConfig for loading
    pub fn to_model_config(&self) -> ModelConfig {
        let mut config = ModelConfig::from_local(&self.graph)
            .with_endpoints(&self.input, &self.output)
            .with_device(self.device.to_device_type());
        config.num_classes = self.num_classes;
        config.max_concurrency = self.max_concurrency;
        config
    }
}

impl DeviceSpec {
    /// Convert to DeviceType
    pub fn to_device_type(&self) -> DeviceType {
        match self {
            DeviceSpec::Cpu => DeviceType::Cpu,
            DeviceSpec::Cuda { index } => DeviceType::Cuda(index.unwrap_or(0)),
            DeviceSpec::Metal { index } => DeviceType::Metal(index.unwrap_or(0)),
        }
    }
}

fn default_input() -> String {
    DEFAULT_INPUT_ENDPOINT.to_string()
}

fn default_output() -> String {
    DEFAULT_OUTPUT_ENDPOINT.to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_spec_yaml() {
        let yaml = r#"
graph: ./models/dnscnn.safetensors
input: sent_input
output: dense_18
num_classes: 2
device:
  cuda:
    index: 1
"#;

        let spec: ModelConfigSpec = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(spec.graph, PathBuf::from("./models/dnscnn.safetensors"));
        assert_eq!(spec.input, "sent_input");
        assert_eq!(spec.output, "dense_18");
        assert_eq!(spec.num_classes, Some(2));
        assert_eq!(spec.device, DeviceSpec::Cuda { index: Some(1) });
    }

    #[test]
    fn test_model_spec_defaults() {
        let spec: ModelConfigSpec = serde_yaml::from_str("graph: dnscnn.safetensors").unwrap();

        assert_eq!(spec, ModelConfigSpec::new("dnscnn.safetensors"));
        assert_eq!(spec.input, DEFAULT_INPUT_ENDPOINT);
        assert_eq!(spec.output, DEFAULT_OUTPUT_ENDPOINT);
    }

    #[test]
    fn test_unknown_property_rejected() {
        let yaml = r#"
graph: dnscnn.safetensors
layers: 3
"#;
        assert!(serde_yaml::from_str::<ModelConfigSpec>(yaml).is_err());
    }

    #[test]
    fn test_missing_graph_rejected() {
        assert!(serde_yaml::from_str::<ModelConfigSpec>("input: embedding").is_err());
    }

    #[test]
    fn test_to_model_config() {
        let mut spec = ModelConfigSpec::new("dnscnn.safetensors");
        spec.num_classes = Some(4);
        spec.resolve_relative_to(Path::new("/etc/dnstun"));

        let config = spec.to_model_config();
        assert_eq!(config.path, PathBuf::from("/etc/dnstun/dnscnn.safetensors"));
        assert_eq!(config.num_classes, Some(4));
        assert_eq!(config.device, DeviceType::Cpu);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn test_device_forms() {
        let yaml = "graph: m.safetensors\ndevice: cpu\n";
        let cpu: ModelConfigSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cpu.device, DeviceSpec::Cpu);

        let yaml = "graph: m.safetensors\ndevice:\n  metal: {}\n";
        let metal: ModelConfigSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(metal.device, DeviceSpec::Metal { index: None });
        assert!(matches!(metal.to_model_config().device, DeviceType::Metal(0)));

        let yaml = "graph: m.safetensors\ndevice:\n  tpu: {}\n";
        assert!(serde_yaml::from_str::<ModelConfigSpec>(yaml).is_err());
    }

    #[test]
    fn test_device_round_trip() {
        let mut spec = ModelConfigSpec::new("m.safetensors");
        spec.device = DeviceSpec::Cuda { index: Some(2) };

        let yaml = serde_yaml::to_string(&spec).unwrap();
        let parsed: ModelConfigSpec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_device_spec() {
        let spec: DeviceSpec = serde_yaml::from_str("cpu").unwrap();
        assert_eq!(spec, DeviceSpec::Cpu);

        assert!(matches!(
            DeviceSpec::Cuda { index: Some(1) }.to_device_type(),
            DeviceType::Cuda(1)
        ));
        assert!(matches!(
            DeviceSpec::Metal { index: None }.to_device_type(),
            DeviceType::Metal(0)
        ));
    }
}
