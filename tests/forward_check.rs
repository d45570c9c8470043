//! Executes the discriminator graph on the CPU backend and compares the
//! result with a forward pass computed directly with ndarray.

use rustygan::asg::Value;
use rustygan::config::{DiscriminatorConfig, LayerConfig};
use rustygan::nn::init::init_learnables;
use rustygan::nn::Activation;
use rustygan::runtime::backend::{bind_named_values, Backend};
use rustygan::runtime::cpu_backend::CpuBackend;
use rustygan::tensor::{GraphContext, Tensor};

use ndarray::{Array1, Array2, ArrayD, Axis, Ix1, Ix2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

const TOLERANCE: f32 = 1e-5;

fn assert_close(actual: &ArrayD<f32>, expected: &ArrayD<f32>) {
    assert_eq!(actual.shape(), expected.shape(), "Output shapes do not match!");
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() <= TOLERANCE, "Outputs do not match: got {:.6}, expected {:.6}", a, e);
    }
}

fn tensor(values: &HashMap<String, Value>, name: &str) -> ArrayD<f32> {
    match &values[name] {
        Value::Tensor(t) => t.clone(),
        other => panic!("'{}' is not a tensor: {:?}", name, other),
    }
}

fn leaky_relu(x: f32) -> f32 {
    if x > 0.0 { x } else { 0.2 * x }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Builds the default 5 -> 3 -> 1 network, executes it, and returns the
/// backend output together with the values that were fed in.
fn run_default(input_shape: Vec<usize>, batch_size: usize) -> (ArrayD<f32>, HashMap<String, Value>) {
    let ctx = GraphContext::shared();
    let mut net = DiscriminatorConfig::default().build(&ctx, "disc").unwrap();
    let x = Tensor::new_input(&ctx, "x", input_shape.clone());
    net.fwd(&x, batch_size).unwrap();

    let mut graph = ctx.borrow().main_graph().clone();
    graph.set_output(net.out().unwrap().node_id);

    let mut rng = StdRng::seed_from_u64(3);
    let mut values = init_learnables(&net.learnables(), &mut rng).unwrap();
    // Non-zero biases so the bias path is actually exercised.
    for name in ["disc.0.bias", "disc.1.bias"] {
        let shape = tensor(&values, name).shape().to_vec();
        values.insert(name.to_string(), Value::Tensor(ArrayD::random_using(shape, Uniform::new(-0.5_f32, 0.5), &mut rng)));
    }
    values.insert(
        "x".to_string(),
        Value::Tensor(ArrayD::random_using(input_shape, Uniform::new(-1.0_f32, 1.0), &mut rng)),
    );

    let backend = CpuBackend::new();
    let memo = bind_named_values(&graph, &backend.load_data(&values).unwrap());
    let (outputs, _) = backend.run(&graph, memo).unwrap();
    match backend.retrieve_data(&outputs).unwrap().remove(0) {
        Value::Tensor(out) => (out, values),
        other => panic!("Output is not a tensor: {:?}", other),
    }
}

fn matrix(values: &HashMap<String, Value>, name: &str) -> Array2<f32> {
    tensor(values, name).into_dimensionality::<Ix2>().unwrap()
}

fn vector(values: &HashMap<String, Value>, name: &str) -> Array1<f32> {
    tensor(values, name).into_dimensionality::<Ix1>().unwrap()
}

#[test]
fn batched_forward_matches_reference() {
    let (out, values) = run_default(vec![8, 5], 8);

    let x = matrix(&values, "x");
    let h0 = (x.dot(&matrix(&values, "disc.0.weights").t()) + &vector(&values, "disc.0.bias")).mapv(leaky_relu);
    let h1 = (h0.dot(&matrix(&values, "disc.1.weights").t()) + &vector(&values, "disc.1.bias")).mapv(sigmoid);

    assert_close(&out, &h1.into_dyn());
    assert!(out.iter().all(|p| *p > 0.0 && *p < 1.0));
}

#[test]
fn single_sample_forward_matches_reference() {
    let (out, values) = run_default(vec![5], 1);

    let x = vector(&values, "x");
    let h0 = (x.dot(&matrix(&values, "disc.0.weights").t()) + &vector(&values, "disc.0.bias")).mapv(leaky_relu);
    let h1 = (h0.dot(&matrix(&values, "disc.1.weights").t()) + &vector(&values, "disc.1.bias")).mapv(sigmoid);

    assert_close(&out, &h1.into_dyn());
}

#[test]
fn batch_rows_are_independent() {
    // Each row of a batched run must equal the single-sample result for that row.
    let ctx = GraphContext::shared();
    let config = DiscriminatorConfig {
        input_features: 3,
        layers: vec![LayerConfig::new(4, Activation::Tanh), LayerConfig::new(2, Activation::Relu)],
    };
    let mut batched = config.build(&ctx, "disc").unwrap();
    let learnables = batched.learnables();
    let xb = Tensor::new_input(&ctx, "xb", vec![4, 3]);
    batched.fwd(&xb, 4).unwrap();
    let batched_out = batched.out().unwrap().node_id;

    // Same parameters, second forward graph for one row.
    let xs = Tensor::new_input(&ctx, "xs", vec![3]);
    batched.fwd(&xs, 1).unwrap();
    let single_out = batched.out().unwrap().node_id;

    let mut graph = ctx.borrow().main_graph().clone();
    graph.set_outputs(vec![batched_out, single_out]);

    let mut rng = StdRng::seed_from_u64(11);
    let mut values = init_learnables(&learnables, &mut rng).unwrap();
    let rows = ArrayD::random_using(vec![4, 3], Uniform::new(-1.0_f32, 1.0), &mut rng);
    values.insert("xs".to_string(), Value::Tensor(rows.index_axis(Axis(0), 2).to_owned()));
    values.insert("xb".to_string(), Value::Tensor(rows));

    let backend = CpuBackend::new();
    let (outputs, _) = backend.run(&graph, bind_named_values(&graph, &values)).unwrap();
    match (&outputs[0], &outputs[1]) {
        (Value::Tensor(b), Value::Tensor(s)) => assert_close(&b.index_axis(Axis(0), 2).to_owned(), s),
        other => panic!("unexpected outputs {:?}", other),
    }
}
