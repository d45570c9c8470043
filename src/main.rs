//! Builds a discriminator, runs one forward pass on random data, and logs the scores.

use clap::Parser;
use log::info;
use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustygan::analysis::shape_inference::ShapeInference;
use rustygan::asg::Value;
use rustygan::config::DiscriminatorConfig;
use rustygan::nn::init::init_learnables;
use rustygan::runtime::backend::{bind_named_values, Backend};
use rustygan::runtime::cpu_backend::CpuBackend;
use rustygan::tensor::{GraphContext, Tensor};
use std::path::PathBuf;
use std::time::Instant;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "RustyGAN: graph-based GAN discriminator", long_about = None)]
struct Args {
    /// Network description (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of samples in the input batch
    #[arg(short, long, default_value_t = 8)]
    batch_size: usize,

    /// Seed for parameter initialization and input data
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Overrides the input width from the config
    #[arg(long)]
    input_features: Option<usize>,

    /// Prefix of the parameter names
    #[arg(long, default_value = "discriminator")]
    name: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DiscriminatorConfig::from_file(path)?,
        None => DiscriminatorConfig::default(),
    };
    if let Some(input_features) = args.input_features {
        config = config.with_input_features(input_features)?;
    }
    info!(
        "network: {} -> {} ({} layers), batch size {}",
        config.input_features,
        config.output_features(),
        config.layers.len(),
        args.batch_size
    );

    // ---------- 1. Graph ----------
    let context = GraphContext::shared();
    let mut discriminator = config.build(&context, &args.name)?;

    // A single sample is fed as a plain vector so biases add without broadcasting.
    let input_shape = if args.batch_size < 2 {
        vec![config.input_features]
    } else {
        vec![args.batch_size, config.input_features]
    };
    let input = Tensor::new_input(&context, "input", input_shape.clone());
    discriminator.fwd(&input, args.batch_size)?;
    let output = discriminator.out().ok_or("forward pass produced no output")?.clone();

    let mut graph = context.borrow().main_graph().clone();
    graph.set_output(output.node_id);
    ShapeInference::verify(&graph)?;
    info!("forward graph built: {} nodes, output shape {:?}", graph.len(), output.shape()?);

    // ---------- 2. Data ----------
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut data = init_learnables(&discriminator.learnables(), &mut rng)?;
    let samples = ArrayD::random_using(IxDyn(&input_shape), Uniform::new(-1.0_f32, 1.0), &mut rng);
    data.insert("input".to_string(), Value::Tensor(samples));

    // ---------- 3. Execution ----------
    let backend = CpuBackend::new();
    let start = Instant::now();
    let memo = bind_named_values(&graph, &backend.load_data(&data)?);
    let (outputs, _) = backend.run(&graph, memo)?;
    let scores = backend.retrieve_data(&outputs)?;
    info!("forward pass finished in {:.2?}", start.elapsed());

    if let Some(Value::Tensor(scores)) = scores.first() {
        for (i, score) in scores.iter().enumerate() {
            info!("sample {:<3} score {:.6}", i, score);
        }
    }
    Ok(())
}
