use std::collections::{BTreeMap, BTreeSet};

use nalgebra::DVector;
use num_dual::{Dual64, DualNum, HyperDual64};

use super::solver::NetworkSpec;
use crate::domain::SampleBatch;
use crate::physics::{EvalContext, ExprError, PdeSystem, Symbol};

/// Highest derivative order the evaluator seeds dual numbers for.
pub const MAX_ORDER: usize = 2;

/// A field approximator that can be evaluated with any dual number type.
pub trait LearnedFunction {
    fn spec(&self) -> &NetworkSpec;

    /// Maps one input row (in `spec().inputs` order) to one output row.
    fn forward<T: DualNum<f64> + Copy>(&self, inputs: &[T]) -> Vec<T>;
}

type DerivativeKey = (Symbol, Vec<Symbol>);

/// Evaluates every equation of a system through a learned function,
/// taking field derivatives by forward-mode automatic differentiation.
pub struct ResidualEvaluator<'a, S: PdeSystem + ?Sized> {
    system: &'a S,
    required: BTreeSet<DerivativeKey>,
}

impl<'a, S: PdeSystem + ?Sized> ResidualEvaluator<'a, S> {
    pub fn new(system: &'a S) -> Result<Self, ExprError> {
        let mut required = BTreeSet::new();
        for (_, expr) in system.equations().iter() {
            required.extend(expr.derivatives());
        }
        if let Some((_, wrt)) = required.iter().find(|(_, wrt)| wrt.len() > MAX_ORDER) {
            return Err(ExprError::UnsupportedOrder {
                order: wrt.len(),
                max: MAX_ORDER,
            });
        }
        Ok(Self { system, required })
    }

    /// Derivatives the system's equations reference.
    pub fn required(&self) -> impl Iterator<Item = &DerivativeKey> {
        self.required.iter()
    }

    /// Residual columns keyed by equation name, one row per sample point.
    pub fn evaluate<N: LearnedFunction>(
        &self,
        net: &N,
        batch: &SampleBatch,
    ) -> Result<BTreeMap<String, DVector<f64>>, ExprError> {
        let spec = net.spec();
        let field = self.system.field();
        let output = spec.output_index(field.name()).ok_or_else(|| {
            ExprError::Signature(format!(
                "network `{}` does not output {}",
                spec.name,
                field.name()
            ))
        })?;

        let columns = spec
            .inputs
            .iter()
            .map(|s| {
                batch
                    .invar
                    .get(s.as_str())
                    .ok_or_else(|| ExprError::UnresolvedSymbol(s.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n = batch.len();
        let mut residuals: Vec<(String, Vec<f64>)> = self
            .system
            .equations()
            .names()
            .into_iter()
            .map(|name| (name.to_string(), Vec::with_capacity(n)))
            .collect();

        let mut row = vec![0.0; columns.len()];
        let mut values = BTreeMap::new();
        for i in 0..n {
            for (slot, column) in row.iter_mut().zip(&columns) {
                *slot = column[i];
            }
            values.clear();
            for key in &self.required {
                let value = derivative_at(net, &row, output, key)?;
                values.insert(key.clone(), value);
            }

            let ctx = PointContext {
                names: &spec.inputs,
                row: &row,
                derivatives: &values,
            };
            for ((_, expr), (_, column)) in self.system.equations().iter().zip(&mut residuals) {
                column.push(expr.eval::<f64, _>(&ctx)?);
            }
        }

        Ok(residuals
            .into_iter()
            .map(|(name, column)| (name, DVector::from_vec(column)))
            .collect())
    }
}

fn pick<T: Copy>(outputs: &[T], index: usize, net: &NetworkSpec) -> Result<T, ExprError> {
    outputs.get(index).copied().ok_or_else(|| {
        ExprError::Signature(format!(
            "network `{}` returned {} outputs, expected {}",
            net.name,
            outputs.len(),
            net.outputs.len()
        ))
    })
}

fn input_slot(spec: &NetworkSpec, var: &Symbol) -> Result<usize, ExprError> {
    spec.input_index(var).ok_or_else(|| {
        ExprError::Signature(format!("network `{}` has no input {var}", spec.name))
    })
}

/// Value of one field derivative at `row`.
fn derivative_at<N: LearnedFunction>(
    net: &N,
    row: &[f64],
    output: usize,
    (_, wrt): &DerivativeKey,
) -> Result<f64, ExprError> {
    let spec = net.spec();
    match wrt.as_slice() {
        [] => pick(&net.forward(row), output, spec),
        [a] => {
            let a = input_slot(spec, a)?;
            let seeded: Vec<Dual64> = row
                .iter()
                .enumerate()
                .map(|(j, &re)| Dual64::new(re, if j == a { 1.0 } else { 0.0 }))
                .collect();
            Ok(pick(&net.forward(&seeded), output, spec)?.eps)
        }
        [a, b] => {
            let (a, b) = (input_slot(spec, a)?, input_slot(spec, b)?);
            let seeded: Vec<HyperDual64> = row
                .iter()
                .enumerate()
                .map(|(j, &re)| {
                    let e1 = if j == a { 1.0 } else { 0.0 };
                    let e2 = if j == b { 1.0 } else { 0.0 };
                    HyperDual64::new(re, e1, e2, 0.0)
                })
                .collect();
            Ok(pick(&net.forward(&seeded), output, spec)?.eps1eps2)
        }
        _ => Err(ExprError::UnsupportedOrder {
            order: wrt.len(),
            max: MAX_ORDER,
        }),
    }
}

struct PointContext<'a> {
    names: &'a [Symbol],
    row: &'a [f64],
    derivatives: &'a BTreeMap<DerivativeKey, f64>,
}

impl EvalContext<f64> for PointContext<'_> {
    fn var(&self, name: &Symbol) -> Option<f64> {
        self.names
            .iter()
            .position(|s| s == name)
            .map(|i| self.row[i])
    }

    fn derivative(&self, field: &Symbol, wrt: &[Symbol]) -> Option<f64> {
        self.derivatives
            .get(&(field.clone(), wrt.to_vec()))
            .copied()
    }
}
