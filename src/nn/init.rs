//! Initial values for learnable parameters.
//!
//! The graph only knows parameter *names* and shapes; execution needs real
//! arrays. `init_learnables` produces them keyed by parameter name, ready to
//! be bound with [`crate::runtime::backend::bind_named_values`].

use crate::asg::{AsgError, AsgResult, NodeType, Value};
use crate::tensor::Tensor;
use log::debug;
use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use std::collections::HashMap;

/// Xavier/Glorot uniform bound for a `[fan_out, fan_in]` weight.
pub fn xavier_bound(fan_in: usize, fan_out: usize) -> f32 {
    (6.0 / (fan_in + fan_out) as f32).sqrt()
}

/// Draws a value for every learnable: rank-2 weights from
/// `U(-a, a)` with the Xavier bound, everything else zero.
pub fn init_learnables<R: Rng + ?Sized>(learnables: &[Tensor], rng: &mut R) -> AsgResult<HashMap<String, Value>> {
    let mut values = HashMap::new();
    for param in learnables {
        let (name, shape) = {
            let ctx = param.context.borrow();
            let node = ctx.main_graph().get_node(param.node_id)?;
            let name = match &node.node_type {
                NodeType::Parameter { name } => name.clone(),
                other => {
                    return Err(AsgError::UnsupportedOperation(format!(
                        "cannot initialize non-parameter node {} ({:?})",
                        param.node_id, other
                    )))
                }
            };
            (name, node.shape.clone().ok_or(AsgError::MissingShapeInfo(param.node_id))?)
        };

        let data = match shape.as_slice() {
            [fan_out, fan_in] => {
                if fan_in + fan_out == 0 {
                    return Err(AsgError::UnsupportedOperation(format!(
                        "cannot initialize weight '{}' with shape {:?}",
                        name, shape
                    )));
                }
                let a = xavier_bound(*fan_in, *fan_out);
                ArrayD::random_using(IxDyn(&shape), Uniform::new_inclusive(-a, a), &mut *rng)
            }
            _ => ArrayD::zeros(IxDyn(&shape)),
        };
        debug!("initialized '{}' with shape {:?}", name, shape);
        values.insert(name, Value::Tensor(data));
    }
    Ok(values)
}
