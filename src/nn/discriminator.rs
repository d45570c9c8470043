//! Discriminator half of a GAN: a feedforward stack of linear layers.
//!
//! [`Discriminator::fwd`] does not compute values. It appends the forward
//! pass to the graph the input lives in, layer by layer:
//!
//! ```text
//! h_0 = input
//! z_i = h_i · W_iᵀ (+ b_i)            named "discriminator_<i>"
//! h_{i+1} = activation_i(z_i)         named "discriminator_activated_<i>"
//! ```
//!
//! and remembers the last activated node as the network output.

use crate::asg::AsgError;
use crate::nn::layer::{Layer, LayerKind};
use crate::tensor::Tensor;
use log::{debug, trace};
use std::fmt;
use thiserror::Error;

/// Axis along which the bias is expanded for batched inputs.
const BIAS_BROADCAST_AXIS: usize = 0;

/// Graph operation that failed while building a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Transpose,
    MatMul,
    Name,
    AddBias,
    BroadcastAddBias,
    Activation,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operation::Transpose => "transpose weights",
            Operation::MatMul => "multiply input and weights",
            Operation::Name => "name node",
            Operation::AddBias => "add bias to non-activated output",
            Operation::BroadcastAddBias => "broadcast-add bias to non-activated output",
            Operation::Activation => "apply activation function to non-activated output",
        };
        f.write_str(text)
    }
}

fn layer_note(layer: &Option<usize>) -> String {
    match layer {
        Some(i) => format!(" at layer #{}", i),
        None => String::new(),
    }
}

fn batch_note(batch_size: &Option<usize>) -> String {
    match batch_size {
        Some(size) => format!(" (batch size {})", size),
        None => String::new(),
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscriminatorError {
    #[error("Discriminator misconfigured{}: {reason}", layer_note(.layer))]
    Configuration { layer: Option<usize>, reason: &'static str },

    #[error("Layer #{layer}'s type '{tag}' is not handled by the discriminator")]
    UnsupportedLayerType { layer: usize, tag: u16 },

    #[error("Can't {op}{} of discriminator layer #{layer}: {source}", batch_note(.batch_size))]
    Computation {
        op: Operation,
        layer: usize,
        batch_size: Option<usize>,
        #[source]
        source: AsgError,
    },
}

impl DiscriminatorError {
    /// Index of the layer the error refers to, if any.
    pub fn layer(&self) -> Option<usize> {
        match self {
            DiscriminatorError::Configuration { layer, .. } => *layer,
            DiscriminatorError::UnsupportedLayerType { layer, .. }
            | DiscriminatorError::Computation { layer, .. } => Some(*layer),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscriminatorError>;

/// Discriminator network.
///
/// `layers` is in depth order; `None` entries stand for layers that were
/// never set up and are rejected by [`Discriminator::fwd`].
#[derive(Debug, Clone, Default)]
pub struct Discriminator {
    pub layers: Vec<Option<Layer>>,
    out: Option<Tensor>,
}

impl Discriminator {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self::from_slots(layers.into_iter().map(Some).collect())
    }

    /// Builds a discriminator whose layer list may contain gaps.
    pub fn from_slots(layers: Vec<Option<Layer>>) -> Self {
        Self { layers, out: None }
    }

    /// Activated output of the last layer, once [`Discriminator::fwd`] succeeded.
    pub fn out(&self) -> Option<&Tensor> {
        self.out.as_ref()
    }

    /// Weights and biases of every present layer, weight first, in layer order.
    pub fn learnables(&self) -> Vec<Tensor> {
        self.layers.iter().flatten().flat_map(Layer::parameters).collect()
    }

    /// Builds the forward graph for `input`.
    ///
    /// With `batch_size >= 2` biases are broadcast along axis 0, otherwise
    /// they are added with matching shapes. On error the previous output is
    /// kept; nodes already appended to the graph stay there unreferenced.
    pub fn fwd(&mut self, input: &Tensor, batch_size: usize) -> Result<()> {
        if self.layers.is_empty() {
            return Err(DiscriminatorError::Configuration {
                layer: None,
                reason: "must have at least one layer",
            });
        }

        let mut activated = input.clone();
        for (i, slot) in self.layers.iter().enumerate() {
            activated = Self::layer_fwd(i, slot.as_ref(), &activated, batch_size)?;
        }

        debug!(
            "discriminator graph built: {} layers, batch size {}, output node {}",
            self.layers.len(),
            batch_size,
            activated.node_id
        );
        self.out = Some(activated);
        Ok(())
    }

    fn layer_fwd(i: usize, layer: Option<&Layer>, prev: &Tensor, batch_size: usize) -> Result<Tensor> {
        let layer = layer.ok_or(DiscriminatorError::Configuration { layer: Some(i), reason: "layer is absent" })?;
        let weight = layer
            .weight
            .as_ref()
            .ok_or(DiscriminatorError::Configuration { layer: Some(i), reason: "weight is absent" })?;

        let wrap = |op: Operation, batch_size: Option<usize>| {
            move |source: AsgError| DiscriminatorError::Computation { op, layer: i, batch_size, source }
        };

        let weight_t = weight.t().map_err(wrap(Operation::Transpose, None))?;

        let mut non_activated = match layer.kind.normalized() {
            LayerKind::Linear => prev.matmul(&weight_t).map_err(wrap(Operation::MatMul, None))?,
            LayerKind::Unknown(tag) => return Err(DiscriminatorError::UnsupportedLayerType { layer: i, tag }),
        };
        non_activated
            .set_name(&format!("discriminator_{}", i))
            .map_err(wrap(Operation::Name, None))?;

        if let Some(bias) = &layer.bias {
            non_activated = if batch_size < 2 {
                non_activated.add(bias).map_err(wrap(Operation::AddBias, None))?
            } else {
                non_activated
                    .broadcast_add(bias, BIAS_BROADCAST_AXIS)
                    .map_err(wrap(Operation::BroadcastAddBias, Some(batch_size)))?
            };
        }

        let activated = (layer.activation)(&non_activated).map_err(wrap(Operation::Activation, None))?;
        activated
            .set_name(&format!("discriminator_activated_{}", i))
            .map_err(wrap(Operation::Name, None))?;

        trace!("layer #{} ({}): node {} -> node {}", i, layer.kind, prev.node_id, activated.node_id);
        Ok(activated)
    }
}
