//! Network description that can be stored as YAML or JSON.
//!
//! ```yaml
//! input_features: 5
//! layers:
//!   - out_features: 3
//!   - out_features: 1
//!     activation: { type: sigmoid }
//! ```

use crate::nn::{Activation, Discriminator, Layer, LayerKind};
use crate::tensor::{GraphContext, Tensor};
use log::info;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_bias() -> bool {
    true
}

/// One layer of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub out_features: usize,
    #[serde(default = "default_bias")]
    pub bias: bool,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default)]
    pub kind: LayerKind,
}

impl LayerConfig {
    pub fn new(out_features: usize, activation: Activation) -> Self {
        Self { out_features, bias: true, activation, kind: LayerKind::Linear }
    }
}

/// Whole discriminator: input width and layers in depth order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorConfig {
    pub input_features: usize,
    pub layers: Vec<LayerConfig>,
}

impl Default for DiscriminatorConfig {
    /// `in -> 3 (leaky relu) -> 1 (sigmoid)` for five input features.
    fn default() -> Self {
        Self {
            input_features: 5,
            layers: vec![LayerConfig::new(3, Activation::default()), LayerConfig::new(1, Activation::Sigmoid)],
        }
    }
}

impl DiscriminatorConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        info!("loading discriminator config from {}", path.display());
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_features == 0 {
            return Err(ConfigError::Invalid("input_features must be positive".to_string()));
        }
        if self.layers.is_empty() {
            return Err(ConfigError::Invalid("at least one layer is required".to_string()));
        }
        if let Some(i) = self.layers.iter().position(|l| l.out_features == 0) {
            return Err(ConfigError::Invalid(format!("layer #{} has zero out_features", i)));
        }
        Ok(())
    }

    /// Same network with a different input width.
    pub fn with_input_features(mut self, input_features: usize) -> Result<Self, ConfigError> {
        self.input_features = input_features;
        self.validate()?;
        Ok(self)
    }

    pub fn output_features(&self) -> usize {
        self.layers.last().map(|l| l.out_features).unwrap_or(self.input_features)
    }

    /// Registers the parameters of every layer in `context` as
    /// `<name>.<i>.weights` and `<name>.<i>.bias`.
    pub fn build(&self, context: &Rc<RefCell<GraphContext>>, name: &str) -> Result<Discriminator, ConfigError> {
        self.validate()?;
        let mut in_features = self.input_features;
        let mut layers = Vec::with_capacity(self.layers.len());
        for (i, layer) in self.layers.iter().enumerate() {
            let layer_name = format!("{}.{}", name, i);
            let weight = Tensor::new_parameter(
                context,
                &format!("{}.weights", layer_name),
                vec![layer.out_features, in_features],
            );
            let bias = layer
                .bias
                .then(|| Tensor::new_parameter(context, &format!("{}.bias", layer_name), vec![layer.out_features]));
            layers.push(Layer::new(Some(weight), bias, layer.kind, layer.activation.into_fn()));
            in_features = layer.out_features;
        }
        Ok(Discriminator::new(layers))
    }
}
