pub mod expr;
pub mod poisson;

use std::collections::BTreeSet;

pub use expr::{Bindings, EvalContext, Expr, ExprError, Field, Symbol};

/// Defines the contract for any equation system a solver can be bound to.
pub trait PdeSystem {
    /// Name under which the system is registered with the solver.
    fn name(&self) -> &str;

    /// The unknown field the residuals are written in.
    fn field(&self) -> &Field {
        self.equations().field()
    }

    /// Named residual expressions. Each one is zero when the field satisfies the PDE.
    fn equations(&self) -> &Equations;
}

/// Ordered, validated mapping from equation name to expression.
#[derive(Clone, Debug)]
pub struct Equations {
    field: Field,
    constants: BTreeSet<Symbol>,
    entries: Vec<(String, Expr)>,
}

impl Equations {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            constants: BTreeSet::new(),
            entries: Vec::new(),
        }
    }

    /// Declares symbols that may appear in equations without being independent
    /// variables of the field (physical constants bound at evaluation time).
    pub fn with_constants(mut self, constants: impl IntoIterator<Item = Symbol>) -> Self {
        self.constants.extend(constants);
        self
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Checks that an expression is written purely in terms of this system's
    /// field, its derivatives and its independent variables.
    pub fn validate(&self, expr: &Expr) -> Result<(), ExprError> {
        for (field, wrt) in expr.derivatives() {
            if &field != self.field.name() {
                return Err(ExprError::ForeignField {
                    expected: self.field.name().clone(),
                    found: field,
                });
            }
            if let Some(var) = wrt.iter().find(|v| !self.field.depends_on(v)) {
                return Err(ExprError::NotAnArgument {
                    field: field.clone(),
                    symbol: var.clone(),
                });
            }
        }
        if let Some(symbol) = expr
            .free_symbols()
            .into_iter()
            .find(|s| !self.field.depends_on(s) && !self.constants.contains(s))
        {
            return Err(ExprError::NotAnArgument {
                field: self.field.name().clone(),
                symbol,
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, expr: Expr) -> Result<(), ExprError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ExprError::DuplicateEquation(name));
        }
        self.validate(&expr)?;
        log::debug!("registered equation {name} = {expr}");
        self.entries.push((name, expr));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phi_xy() -> (Field, Symbol, Symbol) {
        let (x, y) = (Symbol::from("x"), Symbol::from("y"));
        let phi = Field::new("phi", [x.clone(), y.clone()]).unwrap();
        (phi, x, y)
    }

    #[test]
    fn rejects_foreign_field() {
        let (phi, x, y) = phi_xy();
        let psi = Field::new("psi", [x.clone(), y]).unwrap();
        let mut eqs = Equations::new(phi);
        let err = eqs.insert("bad", psi.diff(&x)).unwrap_err();
        assert!(matches!(err, ExprError::ForeignField { .. }));
    }

    #[test]
    fn rejects_unknown_variable() {
        let (phi, x, _) = phi_xy();
        let mut eqs = Equations::new(phi.clone());
        let err = eqs
            .insert("bad", phi.diff(&Symbol::from("t")))
            .unwrap_err();
        assert!(matches!(err, ExprError::NotAnArgument { .. }));

        let err = eqs
            .insert("also_bad", phi.diff(&x) * Expr::var("k"))
            .unwrap_err();
        assert!(matches!(err, ExprError::NotAnArgument { .. }));
    }

    #[test]
    fn declared_constants_are_accepted() {
        let (phi, x, _) = phi_xy();
        let mut eqs = Equations::new(phi.clone()).with_constants([Symbol::from("k")]);
        eqs.insert("flux", phi.diff(&x) * Expr::var("k")).unwrap();
        assert_eq!(eqs.names(), vec!["flux"]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let (phi, x, y) = phi_xy();
        let mut eqs = Equations::new(phi.clone());
        eqs.insert("u", phi.diff(&x)).unwrap();
        assert_eq!(
            eqs.insert("u", phi.diff(&y)),
            Err(ExprError::DuplicateEquation("u".into()))
        );
        assert_eq!(eqs.len(), 1);
    }
}
