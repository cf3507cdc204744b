use std::collections::BTreeSet;
use std::fmt;
use std::ops::Not;

use crate::physics::{EvalContext, Expr, ExprError, Symbol};

/// Tolerance of equality criteria unless one is given.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Predicate over `x`, `y` and parameters restricting where a sub-domain samples.
#[derive(Clone, Debug, PartialEq)]
pub enum Criterion {
    Eq { lhs: Expr, rhs: Expr, tol: f64 },
    Ge(Expr, Expr),
    Gt(Expr, Expr),
    Le(Expr, Expr),
    Lt(Expr, Expr),
    And(Box<Criterion>, Box<Criterion>),
    Or(Box<Criterion>, Box<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    pub fn equals(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::equals_within(lhs, rhs, DEFAULT_TOLERANCE)
    }

    pub fn equals_within(lhs: impl Into<Expr>, rhs: impl Into<Expr>, tol: f64) -> Self {
        Criterion::Eq {
            lhs: lhs.into(),
            rhs: rhs.into(),
            tol,
        }
    }

    pub fn ge(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Criterion::Ge(lhs.into(), rhs.into())
    }

    pub fn gt(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Criterion::Gt(lhs.into(), rhs.into())
    }

    pub fn le(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Criterion::Le(lhs.into(), rhs.into())
    }

    pub fn lt(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Criterion::Lt(lhs.into(), rhs.into())
    }

    pub fn and(self, other: Criterion) -> Self {
        Criterion::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Criterion) -> Self {
        Criterion::Or(Box::new(self), Box::new(other))
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        match self {
            Criterion::Eq { lhs, rhs, .. }
            | Criterion::Ge(lhs, rhs)
            | Criterion::Gt(lhs, rhs)
            | Criterion::Le(lhs, rhs)
            | Criterion::Lt(lhs, rhs) => {
                let mut out = lhs.free_symbols();
                out.extend(rhs.free_symbols());
                out
            }
            Criterion::And(a, b) | Criterion::Or(a, b) => {
                let mut out = a.free_symbols();
                out.extend(b.free_symbols());
                out
            }
            Criterion::Not(a) => a.free_symbols(),
        }
    }

    pub fn evaluate<C: EvalContext<f64> + ?Sized>(&self, ctx: &C) -> Result<bool, ExprError> {
        let pair = |lhs: &Expr, rhs: &Expr| -> Result<(f64, f64), ExprError> {
            Ok((lhs.eval::<f64, C>(ctx)?, rhs.eval::<f64, C>(ctx)?))
        };
        Ok(match self {
            Criterion::Eq { lhs, rhs, tol } => {
                let (a, b) = pair(lhs, rhs)?;
                (a - b).abs() <= *tol
            }
            Criterion::Ge(lhs, rhs) => {
                let (a, b) = pair(lhs, rhs)?;
                a >= b
            }
            Criterion::Gt(lhs, rhs) => {
                let (a, b) = pair(lhs, rhs)?;
                a > b
            }
            Criterion::Le(lhs, rhs) => {
                let (a, b) = pair(lhs, rhs)?;
                a <= b
            }
            Criterion::Lt(lhs, rhs) => {
                let (a, b) = pair(lhs, rhs)?;
                a < b
            }
            Criterion::And(a, b) => a.evaluate(ctx)? && b.evaluate(ctx)?,
            Criterion::Or(a, b) => a.evaluate(ctx)? || b.evaluate(ctx)?,
            Criterion::Not(a) => !a.evaluate(ctx)?,
        })
    }
}

impl Not for Criterion {
    type Output = Criterion;

    fn not(self) -> Criterion {
        Criterion::Not(Box::new(self))
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Eq { lhs, rhs, .. } => write!(f, "{lhs} = {rhs}"),
            Criterion::Ge(lhs, rhs) => write!(f, "{lhs} >= {rhs}"),
            Criterion::Gt(lhs, rhs) => write!(f, "{lhs} > {rhs}"),
            Criterion::Le(lhs, rhs) => write!(f, "{lhs} <= {rhs}"),
            Criterion::Lt(lhs, rhs) => write!(f, "{lhs} < {rhs}"),
            Criterion::And(a, b) => write!(f, "({a} and {b})"),
            Criterion::Or(a, b) => write!(f, "({a} or {b})"),
            Criterion::Not(a) => write!(f, "not ({a})"),
        }
    }
}

/// Per-point weight of one target in the loss.
#[derive(Clone, Debug, PartialEq)]
pub enum Weight {
    Constant(f64),
    Expr(Expr),
    /// Distance to the region boundary, zero outside: `max(-sdf, 0)`.
    BoundaryDistance,
}

impl Default for Weight {
    fn default() -> Self {
        Weight::Constant(1.0)
    }
}

impl From<f64> for Weight {
    fn from(value: f64) -> Self {
        Weight::Constant(value)
    }
}

impl From<Expr> for Weight {
    fn from(expr: Expr) -> Self {
        Weight::Expr(expr)
    }
}

impl Weight {
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        match self {
            Weight::Expr(e) => e.free_symbols(),
            Weight::Constant(_) | Weight::BoundaryDistance => BTreeSet::new(),
        }
    }

    /// `sdf` is the region's signed distance at the point being weighted.
    pub fn evaluate<C: EvalContext<f64> + ?Sized>(&self, ctx: &C, sdf: f64) -> Result<f64, ExprError> {
        match self {
            Weight::Constant(c) => Ok(*c),
            Weight::Expr(e) => e.eval(ctx),
            Weight::BoundaryDistance => Ok((-sdf).max(0.0)),
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weight::Constant(c) => write!(f, "{c}"),
            Weight::Expr(e) => write!(f, "{e}"),
            Weight::BoundaryDistance => write!(f, "sdf"),
        }
    }
}
