//! ASG: the abstract semantic graph.
//!
//! The graph is an arena: every node lives in [`Asg::nodes`] and is referred
//! to by its [`NodeId`]. Handles elsewhere in the crate (see
//! [`crate::tensor::Tensor`]) only hold ids, never the nodes themselves.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Node identifier.
pub type NodeId = usize;
/// Graph identifier.
pub type AsgId = usize;
/// Tensor shape.
pub type Shape = Vec<usize>;

pub type AsgResult<T> = std::result::Result<T, AsgError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsgError {
    #[error("Node with ID {0} not found")]
    NodeNotFound(NodeId),

    #[error("Shape information missing for node {0}")]
    MissingShapeInfo(NodeId),

    #[error("Incompatible shapes for operation '{op}': left operand {lhs:?}, right operand {rhs:?}")]
    IncompatibleShapes { op: &'static str, lhs: Shape, rhs: Shape },

    #[error("Invalid tensor rank for operation '{op}': expected at least {expected}D, got {actual}D")]
    InvalidRank { op: &'static str, expected: usize, actual: usize },

    #[error("Axis {axis} is out of range for a rank-{rank} tensor")]
    InvalidAxis { axis: usize, rank: usize },

    #[error("Operands belong to different graph contexts")]
    ForeignContext,

    #[error("Operation not supported: {0}")]
    UnsupportedOperation(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    F32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node ID (mirrors the HashMap key so callers can pass nodes around).
    pub id: NodeId,
    pub name: Option<String>,
    pub node_type: NodeType,
    pub shape: Option<Shape>,
    pub dtype: Option<DType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeType {
    // Data
    Input { name: String },
    Parameter { name: String },
    Literal(Value),

    // Binary
    Add(NodeId, NodeId),
    /// Adds `rhs` to `lhs` after expanding `rhs` along `axis`.
    BroadcastAdd { lhs: NodeId, rhs: NodeId, axis: usize },
    MatrixMultiply(NodeId, NodeId),

    // Unary
    ReLU(NodeId),
    LeakyReLU(NodeId, f32),
    Sigmoid(NodeId),
    Tanh(NodeId),

    // Transformations
    Transpose(NodeId, usize, usize),
}

impl NodeType {
    /// Ids of the nodes this node reads from, in operand order.
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            NodeType::Input { .. } | NodeType::Parameter { .. } | NodeType::Literal(_) => vec![],
            NodeType::Add(a, b) | NodeType::MatrixMultiply(a, b) => vec![*a, *b],
            NodeType::BroadcastAdd { lhs, rhs, .. } => vec![*lhs, *rhs],
            NodeType::ReLU(a)
            | NodeType::LeakyReLU(a, _)
            | NodeType::Sigmoid(a)
            | NodeType::Tanh(a)
            | NodeType::Transpose(a, _, _) => vec![*a],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Tensor(ArrayD<f32>),
    ScalarF32(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asg {
    pub id: AsgId,
    pub nodes: HashMap<NodeId, Node>,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
}

impl Asg {
    pub fn new(id: AsgId) -> Self {
        Self { id, nodes: HashMap::new(), inputs: vec![], outputs: vec![] }
    }

    /// Adds a node without shape information. Literals get their shape
    /// from the embedded value.
    pub fn add_node(&mut self, name: Option<String>, node_type: NodeType) -> NodeId {
        let new_id = self.nodes.len();
        let mut node = Node { id: new_id, name, node_type, shape: None, dtype: None };

        match &node.node_type {
            NodeType::Literal(Value::Tensor(arr)) => {
                node.shape = Some(arr.shape().to_vec());
                node.dtype = Some(DType::F32);
            }
            NodeType::Literal(Value::ScalarF32(_)) => {
                node.shape = Some(vec![]);
                node.dtype = Some(DType::F32);
            }
            _ => {}
        }

        self.nodes.insert(new_id, node);
        new_id
    }

    /// Adds a node whose output shape is already known.
    pub fn add_shaped_node(&mut self, name: Option<String>, node_type: NodeType, shape: Shape) -> NodeId {
        let id = self.add_node(name, node_type);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.shape = Some(shape);
            node.dtype = Some(DType::F32);
        }
        id
    }

    pub fn set_inputs(&mut self, inputs: Vec<NodeId>) { self.inputs = inputs; }
    pub fn set_outputs(&mut self, outputs: Vec<NodeId>) { self.outputs = outputs; }

    /// Shortcut for graphs with a single output.
    pub fn set_output(&mut self, output: NodeId) {
        self.set_outputs(vec![output]);
    }

    pub fn get_node(&self, id: NodeId) -> AsgResult<&Node> {
        self.nodes.get(&id).ok_or(AsgError::NodeNotFound(id))
    }
    pub fn get_node_mut(&mut self, id: NodeId) -> AsgResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(AsgError::NodeNotFound(id))
    }

    /// Replaces the debug name of a node.
    pub fn set_node_name(&mut self, id: NodeId, name: &str) -> AsgResult<()> {
        self.get_node_mut(id)?.name = Some(name.to_string());
        Ok(())
    }

    /// Shape recorded for a node at construction time.
    pub fn shape_of(&self, id: NodeId) -> AsgResult<Shape> {
        self.get_node(id)?.shape.clone().ok_or(AsgError::MissingShapeInfo(id))
    }

    /// Looks a node up by its debug name. Returns the most recent match.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.name.as_deref() == Some(name))
            .map(|n| n.id)
            .max()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
