use approx::assert_abs_diff_eq;
use nalgebra::DVector;
use num_dual::DualNum;

use potflow_rs::domain::SampleBatch;
use potflow_rs::numerics::{LearnedFunction, NetworkSpec, ResidualEvaluator};
use potflow_rs::physics::poisson::Poisson2D;
use potflow_rs::physics::{Bindings, Expr, PdeSystem, Symbol};

// phi = a x^2 - a y^2 + alpha x y, harmonic for every a and alpha
struct Saddle {
    spec: NetworkSpec,
    a: f64,
}

impl LearnedFunction for Saddle {
    fn spec(&self) -> &NetworkSpec {
        &self.spec
    }

    fn forward<T: DualNum<f64> + Copy>(&self, inputs: &[T]) -> Vec<T> {
        let (x, y, alpha) = (inputs[0], inputs[1], inputs[2]);
        vec![x * x * self.a - y * y * self.a + alpha * x * y]
    }
}

// phi = exp(x) cos(alpha y) + y^3, in a different input order
struct Wavy {
    spec: NetworkSpec,
}

impl LearnedFunction for Wavy {
    fn spec(&self) -> &NetworkSpec {
        &self.spec
    }

    fn forward<T: DualNum<f64> + Copy>(&self, inputs: &[T]) -> Vec<T> {
        let (alpha, y, x) = (inputs[0], inputs[1], inputs[2]);
        vec![x.exp() * (alpha * y).cos() + y.powi(3)]
    }
}

fn grid_batch() -> SampleBatch {
    let mut points = Vec::new();
    for i in 0..5 {
        for j in 0..5 {
            points.push((-0.3 + 0.15 * i as f64, -0.3 + 0.15 * j as f64, 0.05 * (i + j) as f64));
        }
    }
    let n = points.len();
    let mut batch = SampleBatch::default();
    batch.invar.push("x", DVector::from_iterator(n, points.iter().map(|p| p.0)));
    batch.invar.push("y", DVector::from_iterator(n, points.iter().map(|p| p.1)));
    batch.invar.push("alpha", DVector::from_iterator(n, points.iter().map(|p| p.2)));
    batch
}

#[test]
fn harmonic_network_has_zero_laplacian() {
    let system = Poisson2D::new().unwrap();
    let evaluator = ResidualEvaluator::new(&system).unwrap();
    let net = Saddle {
        spec: NetworkSpec::new("flow_net", ["x", "y", "alpha"], ["phi"]),
        a: 3.5,
    };
    let batch = grid_batch();
    let out = evaluator.evaluate(&net, &batch).unwrap();

    assert!(out["Poisson_2D"].amax() < 1e-12);
    let (x, y, alpha) = (
        batch.invar.get("x").unwrap(),
        batch.invar.get("y").unwrap(),
        batch.invar.get("alpha").unwrap(),
    );
    for i in 0..batch.len() {
        assert_abs_diff_eq!(out["u"][i], 7.0 * x[i] + alpha[i] * y[i], epsilon = 1e-12);
        assert_abs_diff_eq!(out["v"][i], -7.0 * y[i] + alpha[i] * x[i], epsilon = 1e-12);
    }
}

#[test]
fn automatic_and_symbolic_derivatives_agree() {
    let system = Poisson2D::new().unwrap();
    let evaluator = ResidualEvaluator::new(&system).unwrap();
    let net = Wavy {
        spec: NetworkSpec::new("flow_net", ["alpha", "y", "x"], ["phi"]),
    };
    let batch = grid_batch();
    let ad = evaluator.evaluate(&net, &batch).unwrap();

    // the same potential written symbolically, then pushed through the equations
    let (x, y, alpha) = (Expr::var("x"), Expr::var("y"), Expr::var("alpha"));
    let phi = x.exp() * (alpha * y.clone()).cos() + y.powi(3);
    let field = Symbol::from(Poisson2D::FIELD);

    for (name, equation) in system.equations().iter() {
        let explicit = equation.substitute_field(&field, &phi);
        assert!(explicit.fields().is_empty());
        for i in 0..batch.len() {
            let ctx = Bindings::new()
                .with("x", batch.invar.get("x").unwrap()[i])
                .with("y", batch.invar.get("y").unwrap()[i])
                .with("alpha", batch.invar.get("alpha").unwrap()[i]);
            let symbolic: f64 = explicit.eval(&ctx).unwrap();
            assert_abs_diff_eq!(ad[name][i], symbolic, epsilon = 1e-10);
        }
    }
}
