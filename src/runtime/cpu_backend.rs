//! Backend that executes an ASG on the CPU.
//!
//! Nodes are visited in topological order and each operation is carried out
//! with `ndarray`.

use super::backend::{Backend, Memo, RuntimeError};
use crate::analysis::shape_inference::ShapeInference;
use crate::asg::{Asg, NodeId, NodeType, Value};
use log::trace;
use ndarray::{ArrayD, Axis, Ix1, Ix2};
use std::collections::HashMap;

/// Execution state for one graph on the CPU.
struct ExecutionContext<'a> {
    asg: &'a Asg,
    memo: Memo<Value>,
}

impl<'a> ExecutionContext<'a> {
    fn new(asg: &'a Asg, initial_memo: Memo<Value>) -> Self {
        Self { asg, memo: initial_memo }
    }

    fn operand(&self, node_id: NodeId) -> Result<ArrayD<f32>, RuntimeError> {
        let value = self
            .memo
            .get(&(self.asg.id, node_id))
            .ok_or(RuntimeError::NodeNotFound(node_id, self.asg.id))?;
        as_tensor(value.clone())
    }

    /// Computes a node whose operands are already in the memo.
    fn evaluate_node(&mut self, node_id: NodeId) -> Result<(), RuntimeError> {
        let key = (self.asg.id, node_id);
        if self.memo.contains_key(&key) {
            return Ok(());
        }

        let node = self
            .asg
            .nodes
            .get(&node_id)
            .ok_or(RuntimeError::NodeNotFound(node_id, self.asg.id))?;

        let result = match &node.node_type {
            NodeType::Input { name } => return Err(RuntimeError::MissingInput(name.clone(), node.id)),
            NodeType::Parameter { name } => return Err(RuntimeError::MissingParameter(name.clone(), node.id)),
            NodeType::Literal(value) => as_tensor(value.clone())?,

            NodeType::Add(l, r) => op_add(self.operand(*l)?, self.operand(*r)?)?,
            NodeType::BroadcastAdd { lhs, rhs, axis } => {
                op_broadcast_add(self.operand(*lhs)?, self.operand(*rhs)?, *axis)?
            }
            NodeType::MatrixMultiply(l, r) => op_matmul(self.operand(*l)?, self.operand(*r)?)?,
            NodeType::Transpose(op, ax1, ax2) => op_transpose(self.operand(*op)?, *ax1, *ax2)?,

            NodeType::ReLU(op) => self.operand(*op)?.mapv(|x| x.max(0.0)),
            NodeType::LeakyReLU(op, slope) => {
                let slope = *slope;
                self.operand(*op)?.mapv(|x| if x > 0.0 { x } else { slope * x })
            }
            NodeType::Sigmoid(op) => self.operand(*op)?.mapv(|x| 1.0 / (1.0 + (-x).exp())),
            NodeType::Tanh(op) => self.operand(*op)?.mapv(|x| x.tanh()),
        };

        trace!("evaluated node {} -> shape {:?}", node_id, result.shape());
        self.memo.insert(key, Value::Tensor(result));
        Ok(())
    }
}

pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self { Self }
}

impl Default for CpuBackend {
    fn default() -> Self { Self::new() }
}

impl Backend for CpuBackend {
    type DeviceData = Value;

    fn load_data(
        &self,
        data: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Self::DeviceData>, RuntimeError> {
        Ok(data.clone())
    }

    fn run(
        &self,
        main_asg: &Asg,
        initial_memo: Memo<Self::DeviceData>,
    ) -> Result<(Vec<Self::DeviceData>, Memo<Self::DeviceData>), RuntimeError> {
        let sorted_nodes = ShapeInference::topological_sort(main_asg)?;

        let mut context = ExecutionContext::new(main_asg, initial_memo);
        for node_id in sorted_nodes {
            context.evaluate_node(node_id)?;
        }

        let mut results = Vec::new();
        for output_node_id in &main_asg.outputs {
            let result = context
                .memo
                .get(&(main_asg.id, *output_node_id))
                .ok_or(RuntimeError::NodeNotFound(*output_node_id, main_asg.id))?
                .clone();
            results.push(result);
        }
        Ok((results, context.memo))
    }

    fn retrieve_data(&self, device_data: &[Self::DeviceData]) -> Result<Vec<Value>, RuntimeError> {
        Ok(device_data.to_vec())
    }
}

fn as_tensor(value: Value) -> Result<ArrayD<f32>, RuntimeError> {
    match value {
        Value::Tensor(a) => Ok(a),
        Value::ScalarF32(x) => Ok(ndarray::arr0(x).into_dyn()),
    }
}

fn op_add(a: ArrayD<f32>, b: ArrayD<f32>) -> Result<ArrayD<f32>, RuntimeError> {
    if a.shape() != b.shape() {
        return Err(RuntimeError::ShapeError(format!("Cannot add {:?} and {:?}", a.shape(), b.shape())));
    }
    Ok(&a + &b)
}

fn op_broadcast_add(a: ArrayD<f32>, b: ArrayD<f32>, axis: usize) -> Result<ArrayD<f32>, RuntimeError> {
    if axis > b.ndim() {
        return Err(RuntimeError::ShapeError(format!("Axis {} out of range for {:?}", axis, b.shape())));
    }
    let expanded = b.insert_axis(Axis(axis));
    let broadcasted = expanded.broadcast(a.shape()).ok_or_else(|| {
        RuntimeError::ShapeError(format!("Cannot broadcast {:?} to {:?}", expanded.shape(), a.shape()))
    })?;
    Ok(&a + &broadcasted)
}

fn op_matmul(a: ArrayD<f32>, b: ArrayD<f32>) -> Result<ArrayD<f32>, RuntimeError> {
    let shape_err = |a: &ArrayD<f32>, b: &ArrayD<f32>| {
        RuntimeError::ShapeError(format!("Incompatible matmul shapes: {:?} and {:?}", a.shape(), b.shape()))
    };
    let b_mat = b.view().into_dimensionality::<Ix2>().map_err(|_| shape_err(&a, &b))?;
    match a.ndim() {
        1 => {
            let a_vec = a.view().into_dimensionality::<Ix1>().map_err(|_| shape_err(&a, &b))?;
            if a_vec.len() != b_mat.nrows() {
                return Err(shape_err(&a, &b));
            }
            Ok(a_vec.dot(&b_mat).into_dyn())
        }
        2 => {
            let a_mat = a.view().into_dimensionality::<Ix2>().map_err(|_| shape_err(&a, &b))?;
            if a_mat.ncols() != b_mat.nrows() {
                return Err(shape_err(&a, &b));
            }
            Ok(a_mat.dot(&b_mat).into_dyn())
        }
        _ => Err(shape_err(&a, &b)),
    }
}

fn op_transpose(a: ArrayD<f32>, axis1: usize, axis2: usize) -> Result<ArrayD<f32>, RuntimeError> {
    if axis1 >= a.ndim() || axis2 >= a.ndim() {
        return Err(RuntimeError::ShapeError(format!(
            "Cannot swap axes {} and {} of {:?}",
            axis1,
            axis2,
            a.shape()
        )));
    }
    let mut axes: Vec<_> = (0..a.ndim()).collect();
    axes.swap(axis1, axis2);
    Ok(a.permuted_axes(axes))
}
