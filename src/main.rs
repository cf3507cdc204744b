use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use potflow_rs::domain::{Domain, InferenceDomain};
use potflow_rs::models::potential_flow::domains::{INFERENCE, INTERIOR};
use potflow_rs::models::potential_flow::{
    free_stream_components, FlowConfig, FreeStreamArch, PotentialSolver,
};
use potflow_rs::numerics::{ResidualEvaluator, SolverBinding, TrainingConfig};
use potflow_rs::processing::csv_writer;
use potflow_rs::processing::summary::DomainSummary;

/// Builds the potential-flow problem and samples one training step.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Problem configuration (JSON); defaults apply to missing fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Training hyperparameter overrides (JSON)
    #[arg(long)]
    training_config: Option<PathBuf>,

    #[arg(long, default_value = "output/main")]
    output: PathBuf,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Overridden by RUST_LOG when set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Points drawn from the inference set for the preview file
    #[arg(long, default_value_t = 10_000)]
    inference_preview: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    let config = match &args.config {
        Some(path) => FlowConfig::from_file(path)?,
        None => FlowConfig::default(),
    };

    let solver = PotentialSolver::new()?;
    let mut training = TrainingConfig::default();
    solver.update_defaults(&mut training);
    if let Some(path) = &args.training_config {
        training.apply_file(path)?;
    }

    let domain = solver.train_domain(&config)?;
    let inference = solver.inference_domain(&config)?;

    let mut summary = DomainSummary::from_problem(&config, &domain, &inference, &training);

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let step = domain.sample_step(&mut rng)?;
    summary.add_step_info(&step);
    for (name, batch) in &step {
        let path = args.output.join(format!("{name}.csv"));
        csv_writer::write_batch(&path, batch)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    info!("wrote {} sub-domain batches to {}", step.len(), args.output.display());

    save_inference_preview(&config, &inference, &mut rng, args.inference_preview, &args.output)?;
    check_free_stream(&solver, &domain, &config, &mut rng)?;

    let summary_path = args.output.join("domain_summary.txt");
    summary
        .write_to_file(&summary_path)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;
    summary.print_to_console();

    println!("Summary saved to {}", summary_path.display());
    Ok(())
}

fn save_inference_preview(
    config: &FlowConfig,
    inference: &InferenceDomain,
    rng: &mut ChaCha8Rng,
    count: usize,
    output: &Path,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let spec = inference
        .get(INFERENCE)
        .context("inference set is missing")?;
    let alpha = spec.parameters().get(&config.alpha()).unwrap_or_default();
    let (u, v) = free_stream_components(config.free_stream_speed, alpha);
    info!("inference at alpha = {alpha:.4} rad, free stream ({u:.4}, {v:.4})");
    let batch = spec.sample_n(rng, count.min(spec.count()))?;
    let path = output.join("inference_preview.csv");
    csv_writer::write_batch(&path, &batch)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("inference preview: {} of {} points", batch.len(), spec.count());
    Ok(())
}

/// Sanity check of the residual path: a uniform stream is harmonic.
fn check_free_stream(
    solver: &PotentialSolver,
    domain: &Domain,
    config: &FlowConfig,
    rng: &mut ChaCha8Rng,
) -> Result<()> {
    let arch = FreeStreamArch {
        speed: config.free_stream_speed,
    };
    let net = solver
        .make_nets(&arch)
        .into_iter()
        .flatten()
        .next()
        .context("no network fits the free-stream potential")?;
    let evaluator = ResidualEvaluator::new(solver.equations())?;
    let batch = domain.sample(INTERIOR, rng, None)?;
    let residuals = evaluator.evaluate(&net, &batch)?;
    for (name, column) in &residuals {
        info!(
            "free-stream {name}: max |value| = {:.3e}",
            column.amax()
        );
    }
    Ok(())
}
