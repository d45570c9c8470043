//! # RustyGAN: graph-based GAN discriminator
//!
//! The discriminator of a Generative Adversarial Network, built on an
//! **Abstract Semantic Graph (ASG)**. Running the network forward does not
//! compute anything: it appends the forward pass to the graph, which can
//! then be checked, inspected, and executed on a backend.
//!
//! ## Usage Example
//!
//! ```
//! use rustygan::config::DiscriminatorConfig;
//! use rustygan::tensor::{GraphContext, Tensor};
//!
//! // 1. Create graph context
//! let context = GraphContext::shared();
//!
//! // 2. Describe the network and register its parameters
//! let mut discriminator = DiscriminatorConfig::default().build(&context, "disc").unwrap();
//!
//! // 3. Build the forward graph for a batch of 8 samples
//! let input = Tensor::new_input(&context, "input", vec![8, 5]);
//! discriminator.fwd(&input, 8).unwrap();
//!
//! assert_eq!(discriminator.out().unwrap().shape().unwrap(), vec![8, 1]);
//! assert_eq!(discriminator.learnables().len(), 4);
//! ```

pub mod analysis;
pub mod asg;
pub mod config;
pub mod nn;
pub mod runtime;
pub mod tensor;
