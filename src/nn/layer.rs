//! Layer records consumed by the discriminator.
//!
//! A layer does not own its parameters: it holds handles to `Parameter`
//! nodes created by whoever builds the network, plus the activation callable.

use crate::asg::AsgResult;
use crate::nn::activations::Activation;
use crate::tensor::{GraphContext, Tensor};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Fallible, pure activation applied to a layer's pre-activation output.
pub type ActivationFn = Rc<dyn Fn(&Tensor) -> AsgResult<Tensor>>;

/// Raw tag of the linear layer kind.
pub const LAYER_LINEAR: u16 = 0;

/// Kind of transformation a layer performs.
///
/// Stored and read back as its raw `u16` tag, so a known tag always decodes
/// to its named variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum LayerKind {
    /// `x · Wᵀ`
    Linear,
    /// A raw tag with no transformation behind it.
    Unknown(u16),
}

impl LayerKind {
    pub fn tag(&self) -> u16 {
        match self {
            LayerKind::Linear => LAYER_LINEAR,
            LayerKind::Unknown(tag) => *tag,
        }
    }

    /// Maps a hand-built `Unknown` carrying a known tag to its variant.
    pub fn normalized(self) -> Self {
        LayerKind::from(self.tag())
    }
}

impl Default for LayerKind {
    fn default() -> Self {
        LayerKind::Linear
    }
}

impl From<u16> for LayerKind {
    fn from(tag: u16) -> Self {
        match tag {
            LAYER_LINEAR => LayerKind::Linear,
            other => LayerKind::Unknown(other),
        }
    }
}

impl From<LayerKind> for u16 {
    fn from(kind: LayerKind) -> Self {
        kind.tag()
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Linear => write!(f, "linear"),
            LayerKind::Unknown(tag) => write!(f, "unknown({})", tag),
        }
    }
}

/// One stage of the network: weight, optional bias, kind, activation.
#[derive(Clone)]
pub struct Layer {
    /// Weight matrix, stored `[out_features, in_features]`.
    pub weight: Option<Tensor>,
    /// Bias vector, `[out_features]`.
    pub bias: Option<Tensor>,
    pub kind: LayerKind,
    pub activation: ActivationFn,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("weight", &self.weight)
            .field("bias", &self.bias)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Layer {
    pub fn new(weight: Option<Tensor>, bias: Option<Tensor>, kind: LayerKind, activation: ActivationFn) -> Self {
        Self { weight, bias, kind, activation }
    }

    /// Creates a linear layer and registers its parameters in the graph as
    /// `<name>.weights` (`[out_features, in_features]`) and `<name>.bias`.
    pub fn linear(
        context: &Rc<RefCell<GraphContext>>,
        name: &str,
        in_features: usize,
        out_features: usize,
        with_bias: bool,
        activation: ActivationFn,
    ) -> Self {
        let weight = Tensor::new_parameter(context, &format!("{}.weights", name), vec![out_features, in_features]);
        let bias = with_bias.then(|| Tensor::new_parameter(context, &format!("{}.bias", name), vec![out_features]));
        Self::new(Some(weight), bias, LayerKind::Linear, activation)
    }

    /// Same as [`Layer::linear`], with the activation given by description.
    pub fn linear_with(
        context: &Rc<RefCell<GraphContext>>,
        name: &str,
        in_features: usize,
        out_features: usize,
        with_bias: bool,
        activation: Activation,
    ) -> Self {
        Self::linear(context, name, in_features, out_features, with_bias, activation.into_fn())
    }

    /// Weight followed by bias, skipping whichever is absent.
    pub fn parameters(&self) -> Vec<Tensor> {
        self.weight.iter().chain(self.bias.iter()).cloned().collect()
    }
}
