//! # Neural Network Module
//!
//! Building blocks of the GAN discriminator.
//!
//! In the graph-based architecture a layer does not hold data: it holds
//! handles to `Parameter` nodes, and running it forward appends operation
//! nodes to the ASG.
//!
//! - [`Layer`] / [`LayerKind`]: one linear stage (weight, optional bias, activation)
//! - [`Activation`]: serializable activation description
//! - [`Discriminator`]: ordered stack of layers with `fwd`, `out`, `learnables`
//! - [`init`]: initial values for learnables
//!
//! ## Example
//!
//! ```
//! use rustygan::nn::{Activation, Discriminator, Layer};
//! use rustygan::tensor::{GraphContext, Tensor};
//!
//! let ctx = GraphContext::shared();
//! let mut net = Discriminator::new(vec![
//!     Layer::linear_with(&ctx, "d.0", 5, 3, true, Activation::default()),
//!     Layer::linear_with(&ctx, "d.1", 3, 1, true, Activation::Sigmoid),
//! ]);
//!
//! let x = Tensor::new_input(&ctx, "x", vec![8, 5]);
//! net.fwd(&x, 8).unwrap();
//! assert_eq!(net.out().unwrap().shape().unwrap(), vec![8, 1]);
//! ```

pub mod activations;
pub mod discriminator;
pub mod init;
pub mod layer;

pub use activations::Activation;
pub use discriminator::{Discriminator, DiscriminatorError, Operation};
pub use layer::{ActivationFn, Layer, LayerKind};
