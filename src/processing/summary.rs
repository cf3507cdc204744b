use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::discretization::Geometry;
use crate::domain::{Domain, InferenceDomain, SampleBatch};
use crate::models::potential_flow::FlowConfig;
use crate::numerics::TrainingConfig;

pub struct SubDomainRow {
    pub name: String,
    pub kind: String,
    pub region: &'static str,
    pub density: f64,
    pub measure: f64,
    pub batch_size: usize,
    pub targets: Vec<String>,
}

pub struct DomainSummary {
    // Problem
    pub width: f64,
    pub height: f64,
    pub obstacle_length: f64,
    pub alpha_range_deg: (f64, f64),
    pub policy: String,

    // Domains
    pub sub_domains: Vec<SubDomainRow>,
    pub points_per_step: usize,
    pub inference: Vec<(String, usize, Vec<String>)>,

    // Training
    pub training: TrainingConfig,

    // Sampled step
    pub sampled_points: Option<usize>,
    pub step_alpha: Option<(f64, f64)>,
}

impl DomainSummary {
    pub fn from_problem(
        config: &FlowConfig,
        domain: &Domain,
        inference: &InferenceDomain,
        training: &TrainingConfig,
    ) -> Self {
        let sub_domains = domain
            .iter()
            .map(|(name, sub)| SubDomainRow {
                name: name.to_string(),
                kind: sub.kind().to_string(),
                region: sub.region().kind(),
                density: sub.density(),
                measure: sub.measure(),
                batch_size: sub.batch_size(),
                targets: sub.targets().map(|(n, e, w)| format!("{n} = {e} [w = {w}]")).collect(),
            })
            .collect();

        let inference = inference
            .iter()
            .map(|(name, spec)| {
                (
                    name.to_string(),
                    spec.count(),
                    spec.output_names().to_vec(),
                )
            })
            .collect();

        Self {
            width: config.width(),
            height: config.height(),
            obstacle_length: config.obstacle_length,
            alpha_range_deg: (-config.alpha_max_deg, config.alpha_max_deg),
            policy: format!("{:?}", config.policy),
            sub_domains,
            points_per_step: domain.points_per_step(),
            inference,
            training: training.clone(),
            sampled_points: None,
            step_alpha: None,
        }
    }

    /// Records the size and the α spread of one sampled step.
    pub fn add_step_info(&mut self, step: &[(String, SampleBatch)]) {
        self.sampled_points = Some(step.iter().map(|(_, b)| b.len()).sum());
        let alphas = step
            .iter()
            .filter_map(|(_, b)| b.invar.get("alpha"))
            .flat_map(|col| col.iter().copied());
        let (lo, hi) = alphas.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), a| {
            (lo.min(a), hi.max(a))
        });
        if lo <= hi {
            self.step_alpha = Some((lo, hi));
        }
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;

        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file, "POTENTIAL FLOW DOMAIN SUMMARY")?;
        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file)?;

        writeln!(file, "PROBLEM")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Box:                 {:.4} x {:.4}", self.width, self.height)?;
        writeln!(file, "Obstacle length:     {:.4}", self.obstacle_length)?;
        writeln!(
            file,
            "Angle of attack:     [{:.2}, {:.2}] deg",
            self.alpha_range_deg.0, self.alpha_range_deg.1
        )?;
        writeln!(file, "Parameter policy:    {}", self.policy)?;
        writeln!(file)?;

        writeln!(file, "TRAINING DOMAIN")?;
        writeln!(file, "{}", "-".repeat(60))?;
        for row in &self.sub_domains {
            writeln!(file, "{} ({} of the {})", row.name, row.kind, row.region)?;
            writeln!(file, "  Density:           {:.1}", row.density)?;
            writeln!(file, "  Measure:           {:.6e}", row.measure)?;
            writeln!(file, "  Batch size:        {}", row.batch_size)?;
            for target in &row.targets {
                writeln!(file, "  {target}")?;
            }
        }
        writeln!(file, "Points per step:     {}", self.points_per_step)?;
        writeln!(file)?;

        writeln!(file, "INFERENCE DOMAIN")?;
        writeln!(file, "{}", "-".repeat(60))?;
        for (name, count, outputs) in &self.inference {
            writeln!(file, "{name}: {count} points, outputs {}", outputs.join(", "))?;
        }
        writeln!(file)?;

        writeln!(file, "TRAINING DEFAULTS")?;
        writeln!(file, "{}", "-".repeat(60))?;
        let t = &self.training;
        writeln!(file, "Network dir:         {}", t.network_dir)?;
        writeln!(file, "Max steps:           {}", t.max_steps)?;
        writeln!(
            file,
            "Learning rate:       {:.3e} (x{} every {} steps)",
            t.start_lr, t.decay_rate, t.decay_steps
        )?;
        writeln!(file, "Layers:              {} x {}", t.nr_layers, t.layer_size)?;
        writeln!(file, "Checkpoint every:    {} steps", t.save_network_freq)?;
        writeln!(file)?;

        if let Some(points) = self.sampled_points {
            writeln!(file, "SAMPLED STEP")?;
            writeln!(file, "{}", "-".repeat(60))?;
            writeln!(file, "Points:              {points}")?;
            if let Some((lo, hi)) = self.step_alpha {
                writeln!(
                    file,
                    "Alpha:               [{:.4}, {:.4}] deg",
                    lo.to_degrees(),
                    hi.to_degrees()
                )?;
            }
            writeln!(file)?;
        }

        writeln!(file, "{}", "=".repeat(60))?;

        Ok(())
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("DOMAIN SUMMARY");
        println!("{}", "=".repeat(60));
        for row in &self.sub_domains {
            println!("{:<15} {:>8} points", row.name, row.batch_size);
        }
        println!("Per step:       {:>8} points", self.points_per_step);
        if let Some((lo, hi)) = self.step_alpha {
            println!(
                "Alpha:          [{:.3}, {:.3}] deg",
                lo.to_degrees(),
                hi.to_degrees()
            );
        }
        println!("{}\n", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::potential_flow::PotentialSolver;
    use crate::numerics::SolverBinding;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::fs;

    #[test]
    fn summary_lists_every_sub_domain() {
        let config = FlowConfig::default();
        let solver = PotentialSolver::new().unwrap();
        let domain = solver.train_domain(&config).unwrap();
        let inference = solver.inference_domain(&config).unwrap();
        let mut training = TrainingConfig::default();
        solver.update_defaults(&mut training);

        let mut summary = DomainSummary::from_problem(&config, &domain, &inference, &training);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        summary.add_step_info(&domain.sample_step(&mut rng).unwrap());
        assert_eq!(summary.sampled_points, Some(domain.points_per_step()));
        let (lo, hi) = summary.step_alpha.unwrap();
        assert_eq!(lo, hi);

        let path = std::env::temp_dir().join("potflow_summary.txt");
        summary.write_to_file(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        for name in domain.names() {
            assert!(text.contains(name));
        }
        assert!(text.contains("Inference: 1000000 points"));
        fs::remove_file(path).ok();
    }
}
