//! Activation functions for the graph-based layers.
//!
//! A layer holds its activation as an opaque callable ([`ActivationFn`]);
//! [`Activation`] is the serializable description that produces one.

use crate::asg::AsgResult;
use crate::nn::layer::ActivationFn;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Slope used by `LeakyReLU` when none is configured.
pub const DEFAULT_NEGATIVE_SLOPE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activation {
    /// Passes the pre-activation through unchanged.
    Identity,
    Relu,
    LeakyRelu {
        #[serde(default = "default_negative_slope")]
        negative_slope: f32,
    },
    Sigmoid,
    Tanh,
}

fn default_negative_slope() -> f32 {
    DEFAULT_NEGATIVE_SLOPE
}

impl Default for Activation {
    fn default() -> Self {
        Activation::LeakyRelu { negative_slope: DEFAULT_NEGATIVE_SLOPE }
    }
}

impl Activation {
    /// Adds the activation node for `x` to the graph.
    pub fn apply(&self, x: &Tensor) -> AsgResult<Tensor> {
        match *self {
            Activation::Identity => Ok(x.clone()),
            Activation::Relu => x.relu(),
            Activation::LeakyRelu { negative_slope } => x.leaky_relu(negative_slope),
            Activation::Sigmoid => x.sigmoid(),
            Activation::Tanh => x.tanh(),
        }
    }

    /// Turns the description into the callable stored on a layer.
    pub fn into_fn(self) -> ActivationFn {
        Rc::new(move |x: &Tensor| self.apply(x))
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Identity => write!(f, "identity"),
            Activation::Relu => write!(f, "relu"),
            Activation::LeakyRelu { negative_slope } => write!(f, "leaky_relu({})", negative_slope),
            Activation::Sigmoid => write!(f, "sigmoid"),
            Activation::Tanh => write!(f, "tanh"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asg::NodeType;
    use crate::tensor::GraphContext;

    #[test]
    fn test_identity_adds_no_node() {
        let ctx = GraphContext::shared();
        let x = Tensor::new_input(&ctx, "x", vec![2, 3]);
        let y = Activation::Identity.apply(&x).unwrap();
        assert_eq!(y, x);
        assert_eq!(ctx.borrow().main_graph().len(), 1);
    }

    #[test]
    fn test_leaky_relu_records_slope() {
        let ctx = GraphContext::shared();
        let x = Tensor::new_input(&ctx, "x", vec![2, 3]);
        let f = Activation::LeakyRelu { negative_slope: 0.1 }.into_fn();
        let y = f(&x).unwrap();
        let graph = ctx.borrow();
        let node = graph.main_graph().get_node(y.node_id).unwrap();
        assert_eq!(node.node_type, NodeType::LeakyReLU(x.node_id, 0.1));
        assert_eq!(node.shape, Some(vec![2, 3]));
    }

    #[test]
    fn test_deserialize_with_default_slope() {
        let act: Activation = serde_json::from_str(r#"{"type": "leaky_relu"}"#).unwrap();
        assert_eq!(act, Activation::LeakyRelu { negative_slope: DEFAULT_NEGATIVE_SLOPE });
        let act: Activation = serde_json::from_str(r#"{"type": "sigmoid"}"#).unwrap();
        assert_eq!(act, Activation::Sigmoid);
    }
}
