//! Module defining `Tensor` and `GraphContext`.
//!
//! `Tensor` is not a data container. It is a lightweight handle that
//! refers to a node of the abstract semantic graph (ASG) owned by a
//! `GraphContext`. Operations on tensors (`matmul`, `add`, ...) do not
//! compute anything; they validate operand shapes and append a node to the
//! graph, returning a handle to it.
//!
//! Every operation is fallible: a shape mismatch, a node missing from the
//! arena, or operands from two different contexts produce an [`AsgError`]
//! and leave the graph unchanged.

use crate::analysis::shape_inference::{add_shape, broadcast_add_shape, matmul_shape, transpose_shape};
use crate::asg::{Asg, AsgError, AsgResult, NodeId, NodeType, Shape, Value};
use ndarray::ArrayD;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Owns the graph that tensors are built into.
///
/// Wrapped in `Rc<RefCell<>>` so it can be shared between many `Tensor` handles.
#[derive(Debug, Clone)]
pub struct GraphContext {
    main_graph: Asg,
}

impl GraphContext {
    /// Creates a new, empty graph context.
    pub fn new() -> Self {
        Self { main_graph: Asg::new(0) }
    }

    /// Creates a context already wrapped for sharing between handles.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn main_graph_mut(&mut self) -> &mut Asg {
        &mut self.main_graph
    }

    pub fn main_graph(&self) -> &Asg {
        &self.main_graph
    }
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbolic handle to a node in the computation graph.
///
/// Holds the node ID and a shared reference to the `GraphContext` the node
/// lives in. Cloning a handle never copies the node.
#[derive(Clone)]
pub struct Tensor {
    /// ID of the ASG node this tensor represents.
    pub node_id: NodeId,
    /// Shared reference to the context the graph is built in.
    pub context: Rc<RefCell<GraphContext>>,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor").field("node_id", &self.node_id).finish()
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id && Rc::ptr_eq(&self.context, &other.context)
    }
}

impl Tensor {
    /// Creates an input node of the given shape. Input nodes are fed with
    /// real data at execution time.
    pub fn new_input(context: &Rc<RefCell<GraphContext>>, name: &str, shape: Shape) -> Self {
        let mut ctx = context.borrow_mut();
        let graph = ctx.main_graph_mut();
        let node_id = graph.add_shaped_node(
            Some(name.to_string()),
            NodeType::Input { name: name.to_string() },
            shape,
        );
        graph.inputs.push(node_id);

        Self { node_id, context: Rc::clone(context) }
    }

    /// Creates a trainable parameter node of the given shape.
    pub fn new_parameter(context: &Rc<RefCell<GraphContext>>, name: &str, shape: Shape) -> Self {
        let node_id = context.borrow_mut().main_graph_mut().add_shaped_node(
            Some(name.to_string()),
            NodeType::Parameter { name: name.to_string() },
            shape,
        );
        Self { node_id, context: Rc::clone(context) }
    }

    /// Creates a constant node that embeds `data` in the graph.
    pub fn new_literal(context: &Rc<RefCell<GraphContext>>, data: ArrayD<f32>, name: &str) -> Self {
        let node_id = context
            .borrow_mut()
            .main_graph_mut()
            .add_node(Some(name.to_string()), NodeType::Literal(Value::Tensor(data)));
        Self { node_id, context: Rc::clone(context) }
    }

    /// Shape recorded for this node.
    pub fn shape(&self) -> AsgResult<Shape> {
        self.context.borrow().main_graph().shape_of(self.node_id)
    }

    /// Current debug name of this node, if any.
    pub fn name(&self) -> AsgResult<Option<String>> {
        Ok(self.context.borrow().main_graph().get_node(self.node_id)?.name.clone())
    }

    /// Renames the node this handle points to.
    pub fn set_name(&self, name: &str) -> AsgResult<()> {
        self.context.borrow_mut().main_graph_mut().set_node_name(self.node_id, name)
    }

    fn ensure_same_context(&self, other: &Tensor) -> AsgResult<()> {
        if Rc::ptr_eq(&self.context, &other.context) {
            Ok(())
        } else {
            Err(AsgError::ForeignContext)
        }
    }

    fn push(&self, node_type: NodeType, shape: Shape) -> Tensor {
        let node_id = self.context.borrow_mut().main_graph_mut().add_shaped_node(None, node_type, shape);
        Tensor { node_id, context: Rc::clone(&self.context) }
    }

    // --- Linear algebra ---

    pub fn transpose(&self, axis1: usize, axis2: usize) -> AsgResult<Self> {
        let shape = transpose_shape(&self.shape()?, axis1, axis2)?;
        Ok(self.push(NodeType::Transpose(self.node_id, axis1, axis2), shape))
    }

    /// Swaps the last two axes.
    pub fn t(&self) -> AsgResult<Self> {
        let rank = self.shape()?.len();
        if rank < 2 {
            return Err(AsgError::InvalidRank { op: "Transpose", expected: 2, actual: rank });
        }
        self.transpose(rank - 2, rank - 1)
    }

    pub fn matmul(&self, other: &Tensor) -> AsgResult<Self> {
        self.ensure_same_context(other)?;
        let shape = matmul_shape(&self.shape()?, &other.shape()?)?;
        Ok(self.push(NodeType::MatrixMultiply(self.node_id, other.node_id), shape))
    }

    /// Element-wise addition of two tensors of identical shape.
    pub fn add(&self, other: &Tensor) -> AsgResult<Self> {
        self.ensure_same_context(other)?;
        let shape = add_shape(&self.shape()?, &other.shape()?)?;
        Ok(self.push(NodeType::Add(self.node_id, other.node_id), shape))
    }

    /// Adds `other` after expanding it along `axis` to match `self`.
    pub fn broadcast_add(&self, other: &Tensor, axis: usize) -> AsgResult<Self> {
        self.ensure_same_context(other)?;
        let shape = broadcast_add_shape(&self.shape()?, &other.shape()?, axis)?;
        Ok(self.push(NodeType::BroadcastAdd { lhs: self.node_id, rhs: other.node_id, axis }, shape))
    }

    // --- Activation functions ---

    pub fn relu(&self) -> AsgResult<Self> {
        Ok(self.push(NodeType::ReLU(self.node_id), self.shape()?))
    }

    pub fn leaky_relu(&self, negative_slope: f32) -> AsgResult<Self> {
        Ok(self.push(NodeType::LeakyReLU(self.node_id, negative_slope), self.shape()?))
    }

    pub fn sigmoid(&self) -> AsgResult<Self> {
        Ok(self.push(NodeType::Sigmoid(self.node_id), self.shape()?))
    }

    pub fn tanh(&self) -> AsgResult<Self> {
        Ok(self.push(NodeType::Tanh(self.node_id), self.shape()?))
    }
}
