use super::{Equations, ExprError, Field, PdeSystem, Symbol};

/// Potential-flow equation set for φ(x, y, α).
///
/// Velocity is the gradient of the potential, and incompressibility of an
/// irrotational flow reduces to Laplace's equation on φ:
///
/// * `u = ∂φ/∂x`
/// * `v = ∂φ/∂y`
/// * `Poisson_2D = ∂²φ/∂x² + ∂²φ/∂y²`
#[derive(Clone, Debug)]
pub struct Poisson2D {
    equations: Equations,
}

impl Poisson2D {
    pub const NAME: &'static str = "Poisson_2D";
    pub const FIELD: &'static str = "phi";

    pub fn new() -> Result<Self, ExprError> {
        let x = Symbol::from("x");
        let y = Symbol::from("y");
        // angle of attack
        let alpha = Symbol::from("alpha");

        let phi = Field::new(Self::FIELD, [x.clone(), y.clone(), alpha])?;

        let mut equations = Equations::new(phi.clone());
        equations.insert("u", phi.diff(&x))?;
        equations.insert("v", phi.diff(&y))?;
        equations.insert(Self::NAME, phi.diff(&x).diff(&x) + phi.diff(&y).diff(&y))?;

        Ok(Self { equations })
    }
}

impl PdeSystem for Poisson2D {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn equations(&self) -> &Equations {
        &self.equations
    }
}
