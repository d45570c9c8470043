//! Abstract interface (trait) for execution backends.

use crate::analysis::shape_inference::ShapeInferenceError;
use crate::asg::{Asg, AsgId, NodeId, NodeType, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while executing a graph. Shared by all backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Node with ID {0} not found in graph {1}. Check that the graph was built correctly.")]
    NodeNotFound(NodeId, AsgId),

    #[error("Type mismatch: operation expected {expected}, got {actual}")]
    TypeError { expected: String, actual: String },

    #[error("Tensor shape error: {0}")]
    ShapeError(String),

    #[error("Missing value for input '{0}' (node ID: {1}). Provide it in the initial memo.")]
    MissingInput(String, NodeId),

    #[error("Missing value for parameter '{0}' (node ID: {1}). Initialize the parameter before running the graph.")]
    MissingParameter(String, NodeId),

    #[error("Graph analysis failed: {0}")]
    Analysis(#[from] ShapeInferenceError),
}

/// Cache of already computed node values, keyed by (AsgId, NodeId).
pub type Memo<T> = HashMap<(AsgId, NodeId), T>;

/// Common interface of an execution environment (backend).
///
/// Anything implementing this trait can take an ASG and data, run the
/// computation, and hand the results back.
pub trait Backend {
    /// Device-specific representation of a value.
    type DeviceData: std::fmt::Debug;

    /// Moves host values onto the device.
    fn load_data(
        &self,
        data: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Self::DeviceData>, RuntimeError>;

    /// Executes the graph, reading from and extending the memo.
    ///
    /// Returns the values of the graph outputs, in order, and the final memo
    /// holding every intermediate result.
    fn run(
        &self,
        main_asg: &Asg,
        initial_memo: Memo<Self::DeviceData>,
    ) -> Result<(Vec<Self::DeviceData>, Memo<Self::DeviceData>), RuntimeError>;

    /// Copies device results back to host values.
    fn retrieve_data(&self, device_data: &[Self::DeviceData]) -> Result<Vec<Value>, RuntimeError>;
}

/// Builds an initial memo from a `name -> value` table by matching the
/// names of `Input` and `Parameter` nodes. Names without a node are ignored.
pub fn bind_named_values<T: Clone>(asg: &Asg, values: &HashMap<String, T>) -> Memo<T> {
    asg.nodes
        .values()
        .filter_map(|node| match &node.node_type {
            NodeType::Input { name } | NodeType::Parameter { name } => {
                values.get(name).map(|v| ((asg.id, node.id), v.clone()))
            }
            _ => None,
        })
        .collect()
}
