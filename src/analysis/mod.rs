//! # Graph Analysis Module
//!
//! Analysis passes that process the ASG before execution.
//!
//! ## Available Passes
//!
//! - [`ShapeInference`](shape_inference::ShapeInference): re-derives tensor shapes
//!   through the graph and reports nodes whose recorded shape disagrees.
//!
//! The same per-operation rules ([`shape_inference::matmul_shape`] and friends)
//! are applied eagerly by [`crate::tensor::Tensor`] when a node is created, so
//! shape mismatches surface at graph construction time:
//!
//! ```text
//! Tensor op -> shape rule -> node with shape   (or AsgError)
//! ```

pub mod shape_inference;
