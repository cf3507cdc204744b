use num_dual::DualNum;

use super::solver::PotentialSolver;
use crate::numerics::{ArchFactory, LearnedFunction, NetworkSpec};

/// Uniform stream `φ = U (x cos α + y sin α)`. Harmonic, so it zeroes the
/// Laplace residual and reproduces the far-field targets exactly.
#[derive(Clone, Debug)]
pub struct FreeStreamPotential {
    spec: NetworkSpec,
    // positions of x, y and alpha in the input row
    slots: [usize; 3],
    speed: f64,
}

impl FreeStreamPotential {
    pub fn new(speed: f64) -> Self {
        Self {
            spec: NetworkSpec::new(PotentialSolver::NET, ["x", "y", "alpha"], ["phi"]),
            slots: [0, 1, 2],
            speed,
        }
    }

    /// Follows the input order of `spec`; `None` if it lacks x, y or alpha.
    pub fn with_spec(spec: &NetworkSpec, speed: f64) -> Option<Self> {
        let slot = |name: &str| spec.input_index(&name.into());
        Some(Self {
            slots: [slot("x")?, slot("y")?, slot("alpha")?],
            spec: spec.clone(),
            speed,
        })
    }
}

impl LearnedFunction for FreeStreamPotential {
    fn spec(&self) -> &NetworkSpec {
        &self.spec
    }

    fn forward<T: DualNum<f64> + Copy>(&self, inputs: &[T]) -> Vec<T> {
        let [x, y, alpha] = self.slots.map(|i| inputs[i]);
        vec![(x * alpha.cos() + y * alpha.sin()) * self.speed]
    }
}

/// Builds [`FreeStreamPotential`]s for any compatible signature.
#[derive(Clone, Copy, Debug)]
pub struct FreeStreamArch {
    pub speed: f64,
}

impl ArchFactory for FreeStreamArch {
    type Net = Option<FreeStreamPotential>;

    fn make_node(&self, spec: &NetworkSpec) -> Self::Net {
        FreeStreamPotential::with_spec(spec, self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn input_order_follows_the_signature() {
        let spec = NetworkSpec::new("flow_net", ["alpha", "y", "x"], ["phi"]);
        let net = FreeStreamArch { speed: 2.0 }.make_node(&spec).unwrap();
        let phi = net.forward(&[0.0, 3.0, 1.5])[0];
        assert_abs_diff_eq!(phi, 3.0, epsilon = 1e-12);

        let missing = NetworkSpec::new("flow_net", ["x", "y"], ["phi"]);
        assert!(FreeStreamArch { speed: 2.0 }.make_node(&missing).is_none());
    }
}
