use super::domains;
use super::flow::{FlowConfig, FlowGeometry};
use crate::domain::{Domain, DomainError, InferenceDomain};
use crate::numerics::{
    validate_binding, validate_inference_domain, validate_train_domain, NetworkSpec,
    SolverBinding, SolverError, TrainingConfig,
};
use crate::physics::poisson::Poisson2D;
use crate::physics::PdeSystem;

/// Binds [`Poisson2D`] and the `flow_net` signature to the flat-plate domains.
#[derive(Clone, Debug)]
pub struct PotentialSolver {
    system: Poisson2D,
    nets: Vec<NetworkSpec>,
}

impl PotentialSolver {
    pub const NET: &'static str = "flow_net";

    pub fn new() -> Result<Self, SolverError> {
        let system = Poisson2D::new()?;
        let field = system.field();
        let net = NetworkSpec::new(Self::NET, field.args().to_vec(), [field.name().clone()]);
        Self::with_nets(system, vec![net])
    }

    /// Binds custom networks; their signatures are checked against the field.
    pub fn with_nets(system: Poisson2D, nets: Vec<NetworkSpec>) -> Result<Self, SolverError> {
        validate_binding(&system, &nets)?;
        Ok(Self { system, nets })
    }
}

impl SolverBinding for PotentialSolver {
    type System = Poisson2D;
    type Config = FlowConfig;

    fn equations(&self) -> &Poisson2D {
        &self.system
    }

    fn nets(&self) -> &[NetworkSpec] {
        &self.nets
    }

    fn train_domain(&self, config: &FlowConfig) -> Result<Domain, SolverError> {
        config.validate()?;
        let geo = FlowGeometry::new(config).map_err(DomainError::from)?;
        let domain = domains::train_domain(config, &geo)?;
        validate_train_domain(&self.system, &domain)?;
        Ok(domain)
    }

    fn inference_domain(&self, config: &FlowConfig) -> Result<InferenceDomain, SolverError> {
        config.validate()?;
        let geo = FlowGeometry::new(config).map_err(DomainError::from)?;
        let domain = domains::inference_domain(config, &geo)?;
        validate_inference_domain(&self.system, &domain)?;
        Ok(domain)
    }

    fn update_defaults(&self, config: &mut TrainingConfig) {
        config.network_dir = "./network_checkpoint_potential_flow_2d".to_string();
        config.decay_steps = 4000;
        config.max_steps = 400_000;
        config.layer_size = 100;
        config.nr_layers = 2;
        log::debug!("potential-flow training defaults: {config:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::ArchFactory;
    use crate::physics::Symbol;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<NetworkSpec>>,
    }

    impl ArchFactory for Recorder {
        type Net = usize;

        fn make_node(&self, spec: &NetworkSpec) -> usize {
            self.seen.borrow_mut().push(spec.clone());
            spec.inputs.len()
        }
    }

    #[test]
    fn builds_flow_net_through_the_factory() {
        let solver = PotentialSolver::new().unwrap();
        let arch = Recorder::default();
        assert_eq!(solver.make_nets(&arch), vec![3]);
        assert_eq!(
            *arch.seen.borrow(),
            vec![NetworkSpec::new("flow_net", ["x", "y", "alpha"], ["phi"])]
        );
    }

    #[test]
    fn defaults_keep_controller_settings() {
        let solver = PotentialSolver::new().unwrap();
        let mut config = TrainingConfig {
            start_lr: 5e-4,
            decay_rate: 0.9,
            save_network_freq: 7,
            ..TrainingConfig::default()
        };
        solver.update_defaults(&mut config);
        assert_eq!(config.start_lr, 5e-4);
        assert_eq!(config.decay_rate, 0.9);
        assert_eq!(config.save_network_freq, 7);
        assert_eq!(config.layer_size, 100);
        assert_eq!(config.nr_layers, 2);
    }

    #[test]
    fn binds_flow_net() {
        let solver = PotentialSolver::new().unwrap();
        let net = &solver.nets()[0];
        assert_eq!(net.name, "flow_net");
        assert_eq!(net.outputs, vec![Symbol::from("phi")]);
        assert_eq!(solver.equations().name(), "Poisson_2D");
    }

    #[test]
    fn defaults_then_overrides() {
        let solver = PotentialSolver::new().unwrap();
        let mut config = TrainingConfig::default();
        solver.update_defaults(&mut config);
        assert_eq!(config.max_steps, 400_000);
        assert_eq!(config.network_dir, "./network_checkpoint_potential_flow_2d");

        config
            .apply_overrides(serde_json::json!({"layer_size": 256}))
            .unwrap();
        assert_eq!(config.layer_size, 256);
        assert_eq!(config.decay_steps, 4000);
    }

    #[test]
    fn rejects_mismatched_network() {
        let system = Poisson2D::new().unwrap();
        let net = NetworkSpec::new("flow_net", ["x", "y"], ["phi"]);
        assert!(matches!(
            PotentialSolver::with_nets(system, vec![net]),
            Err(SolverError::InputMismatch { .. })
        ));
    }

    #[test]
    fn invalid_config_fails_before_sampling() {
        let solver = PotentialSolver::new().unwrap();
        let config = FlowConfig {
            obstacle_length: -1.0,
            ..FlowConfig::default()
        };
        assert!(matches!(
            solver.train_domain(&config),
            Err(SolverError::InvalidConfig(_))
        ));
    }
}
