//! Module for shape and data type inference (Shape Inference).
//!
//! Holds the per-operation shape rules used when nodes are added to the graph,
//! and a pass that re-derives every node's shape from its operands to check
//! that the recorded shapes are consistent.

use crate::asg::{Asg, AsgError, AsgResult, DType, Node, NodeId, NodeType, Shape, Value};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeInferenceError {
    #[error("Graph error: {0}")]
    AsgError(#[from] AsgError),

    #[error("Node {node_id} records shape {recorded:?} but its operands produce {inferred:?}")]
    ShapeMismatch {
        node_id: NodeId,
        recorded: Shape,
        inferred: Shape,
    },

    #[error("Initial shape not specified for '{0}'. Leaf nodes must be created with a shape.")]
    MissingInitialShape(String),

    #[error("Graph contains a cycle through node {0}")]
    CyclicGraph(NodeId),
}

type Result<T> = std::result::Result<T, ShapeInferenceError>;

/// Shape of `Transpose(axis1, axis2)`.
pub fn transpose_shape(shape: &Shape, axis1: usize, axis2: usize) -> AsgResult<Shape> {
    let rank = shape.len();
    if rank < 2 {
        return Err(AsgError::InvalidRank { op: "Transpose", expected: 2, actual: rank });
    }
    for axis in [axis1, axis2] {
        if axis >= rank {
            return Err(AsgError::InvalidAxis { axis, rank });
        }
    }
    let mut out = shape.clone();
    out.swap(axis1, axis2);
    Ok(out)
}

/// Shape of a matrix product.
///
/// `[k] x [k, n] -> [n]` and `[m, k] x [k, n] -> [m, n]`.
pub fn matmul_shape(lhs: &Shape, rhs: &Shape) -> AsgResult<Shape> {
    if rhs.len() != 2 {
        return Err(AsgError::InvalidRank { op: "MatrixMultiply", expected: 2, actual: rhs.len() });
    }
    let incompatible = || AsgError::IncompatibleShapes {
        op: "MatrixMultiply",
        lhs: lhs.clone(),
        rhs: rhs.clone(),
    };
    match lhs.len() {
        1 if lhs[0] == rhs[0] => Ok(vec![rhs[1]]),
        2 if lhs[1] == rhs[0] => Ok(vec![lhs[0], rhs[1]]),
        1 | 2 => Err(incompatible()),
        actual => Err(AsgError::InvalidRank { op: "MatrixMultiply", expected: 1, actual }),
    }
}

/// Shape of an element-wise addition. No implicit broadcasting.
pub fn add_shape(lhs: &Shape, rhs: &Shape) -> AsgResult<Shape> {
    if lhs != rhs {
        return Err(AsgError::IncompatibleShapes { op: "Add", lhs: lhs.clone(), rhs: rhs.clone() });
    }
    Ok(lhs.clone())
}

/// Shape of `BroadcastAdd`: `rhs` gains `axis` with extent `lhs[axis]` and
/// must then equal `lhs`.
pub fn broadcast_add_shape(lhs: &Shape, rhs: &Shape, axis: usize) -> AsgResult<Shape> {
    if axis >= lhs.len() || axis > rhs.len() {
        return Err(AsgError::InvalidAxis { axis, rank: lhs.len() });
    }
    let mut expanded = rhs.clone();
    expanded.insert(axis, lhs[axis]);
    if &expanded != lhs {
        return Err(AsgError::IncompatibleShapes {
            op: "BroadcastAdd",
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        });
    }
    Ok(lhs.clone())
}

/// Structure that performs shape inference for ASG.
pub struct ShapeInference;

impl ShapeInference {
    /// Re-derives the shape of every node reachable from the graph outputs
    /// and compares it with the shape recorded at construction time.
    pub fn verify(asg: &Asg) -> Result<()> {
        for node_id in Self::topological_sort(asg)? {
            let node = asg.get_node(node_id)?;
            let (inferred, _) = Self::infer_node_shape(asg, node)?;
            let recorded = node.shape.clone().ok_or(AsgError::MissingShapeInfo(node_id))?;
            if recorded != inferred {
                return Err(ShapeInferenceError::ShapeMismatch { node_id, recorded, inferred });
            }
        }
        Ok(())
    }

    /// Shape inference logic for a single node, from its operands' recorded shapes.
    fn infer_node_shape(asg: &Asg, node: &Node) -> Result<(Shape, DType)> {
        let shape = match &node.node_type {
            NodeType::Input { name } | NodeType::Parameter { name } => node
                .shape
                .clone()
                .ok_or_else(|| ShapeInferenceError::MissingInitialShape(name.clone()))?,

            NodeType::Literal(value) => match value {
                Value::Tensor(arr) => arr.shape().to_vec(),
                Value::ScalarF32(_) => vec![],
            },

            NodeType::Add(l, r) => add_shape(&asg.shape_of(*l)?, &asg.shape_of(*r)?)?,

            NodeType::BroadcastAdd { lhs, rhs, axis } => {
                broadcast_add_shape(&asg.shape_of(*lhs)?, &asg.shape_of(*rhs)?, *axis)?
            }

            NodeType::MatrixMultiply(l, r) => matmul_shape(&asg.shape_of(*l)?, &asg.shape_of(*r)?)?,

            // Element-wise operations - shape unchanged
            NodeType::ReLU(id) | NodeType::LeakyReLU(id, _) | NodeType::Sigmoid(id) | NodeType::Tanh(id) => {
                asg.shape_of(*id)?
            }

            NodeType::Transpose(id, axis1, axis2) => transpose_shape(&asg.shape_of(*id)?, *axis1, *axis2)?,
        };
        Ok((shape, DType::F32))
    }

    /// Performs topological sort of the graph.
    /// Returns node IDs in an order suitable for computation.
    pub fn topological_sort(asg: &Asg) -> Result<Vec<NodeId>> {
        let mut sorted = Vec::new();
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();
        for output_id in &asg.outputs {
            Self::build_sorted_graph(*output_id, asg, &mut visited, &mut in_progress, &mut sorted)?;
        }
        Ok(sorted)
    }

    fn build_sorted_graph(
        node_id: NodeId,
        asg: &Asg,
        visited: &mut HashSet<NodeId>,
        in_progress: &mut HashSet<NodeId>,
        sorted: &mut Vec<NodeId>,
    ) -> Result<()> {
        if visited.contains(&node_id) {
            return Ok(());
        }
        if !in_progress.insert(node_id) {
            return Err(ShapeInferenceError::CyclicGraph(node_id));
        }

        let node = asg.get_node(node_id)?;
        for input_id in node.node_type.operands() {
            Self::build_sorted_graph(input_id, asg, visited, in_progress, sorted)?;
        }

        in_progress.remove(&node_id);
        visited.insert(node_id);
        sorted.push(node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_batched_and_vector() {
        assert_eq!(matmul_shape(&vec![8, 5], &vec![5, 3]).unwrap(), vec![8, 3]);
        assert_eq!(matmul_shape(&vec![5], &vec![5, 3]).unwrap(), vec![3]);
        assert!(matches!(
            matmul_shape(&vec![8, 5], &vec![3, 5]),
            Err(AsgError::IncompatibleShapes { op: "MatrixMultiply", .. })
        ));
        assert!(matches!(
            matmul_shape(&vec![2, 2, 2], &vec![2, 2]),
            Err(AsgError::InvalidRank { actual: 3, .. })
        ));
    }

    #[test]
    fn test_transpose_swaps_axes() {
        assert_eq!(transpose_shape(&vec![3, 5], 0, 1).unwrap(), vec![5, 3]);
        assert!(matches!(transpose_shape(&vec![3], 0, 1), Err(AsgError::InvalidRank { .. })));
    }

    #[test]
    fn test_add_requires_equal_shapes() {
        assert_eq!(add_shape(&vec![3], &vec![3]).unwrap(), vec![3]);
        assert!(add_shape(&vec![8, 3], &vec![3]).is_err());
    }

    #[test]
    fn test_broadcast_add_on_axis_zero() {
        assert_eq!(broadcast_add_shape(&vec![8, 3], &vec![3], 0).unwrap(), vec![8, 3]);
        assert!(broadcast_add_shape(&vec![8, 3], &vec![4], 0).is_err());
        // Already-batched bias cannot be expanded again.
        assert!(broadcast_add_shape(&vec![8, 3], &vec![8, 3], 0).is_err());
        assert!(matches!(
            broadcast_add_shape(&vec![], &vec![], 0),
            Err(AsgError::InvalidAxis { axis: 0, rank: 0 })
        ));
    }

    #[test]
    fn test_verify_detects_tampered_shape() {
        let mut asg = Asg::new(0);
        let x = asg.add_shaped_node(None, NodeType::Input { name: "x".into() }, vec![2, 4]);
        let w = asg.add_shaped_node(None, NodeType::Parameter { name: "w".into() }, vec![4, 3]);
        let y = asg.add_shaped_node(None, NodeType::MatrixMultiply(x, w), vec![2, 3]);
        asg.set_output(y);
        assert!(ShapeInference::verify(&asg).is_ok());

        asg.get_node_mut(y).unwrap().shape = Some(vec![3, 2]);
        assert_eq!(
            ShapeInference::verify(&asg),
            Err(ShapeInferenceError::ShapeMismatch { node_id: y, recorded: vec![3, 2], inferred: vec![2, 3] })
        );
    }

    #[test]
    fn test_topological_order_puts_operands_first() {
        let mut asg = Asg::new(0);
        let x = asg.add_shaped_node(None, NodeType::Input { name: "x".into() }, vec![2]);
        let r = asg.add_shaped_node(None, NodeType::ReLU(x), vec![2]);
        let s = asg.add_shaped_node(None, NodeType::Sigmoid(r), vec![2]);
        asg.set_output(s);
        assert_eq!(ShapeInference::topological_sort(&asg).unwrap(), vec![x, r, s]);
    }
}
