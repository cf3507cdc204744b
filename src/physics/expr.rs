use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use num_dual::DualNum;
use thiserror::Error;

/// Symbol identifier stored as a runtime string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub Arc<str>);

impl Symbol {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Symbol::new(name)
    }
}

impl From<&Symbol> for Symbol {
    fn from(symbol: &Symbol) -> Self {
        symbol.clone()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("unresolved symbol {0}")]
    UnresolvedSymbol(Symbol),
    #[error("no value for the derivative of {field} with respect to {wrt:?}")]
    UnresolvedDerivative { field: Symbol, wrt: Vec<Symbol> },
    #[error("expression references field {found} but the system is built on {expected}")]
    ForeignField { expected: Symbol, found: Symbol },
    #[error("{symbol} is not an independent variable of {field}")]
    NotAnArgument { field: Symbol, symbol: Symbol },
    #[error("duplicate equation `{0}`")]
    DuplicateEquation(String),
    #[error("field {0} needs at least one independent variable")]
    NoArguments(Symbol),
    #[error("independent variable {var} of {field} is listed twice")]
    DuplicateArgument { field: Symbol, var: Symbol },
    #[error("derivative of order {order} exceeds the supported maximum of {max}")]
    UnsupportedOrder { order: usize, max: usize },
    #[error("network signature mismatch: {0}")]
    Signature(String),
}

/// An unknown scalar function of a fixed, ordered list of independent variables.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    name: Symbol,
    args: Vec<Symbol>,
}

impl Field {
    pub fn new(
        name: impl Into<Symbol>,
        args: impl IntoIterator<Item = Symbol>,
    ) -> Result<Self, ExprError> {
        let name = name.into();
        let args: Vec<Symbol> = args.into_iter().collect();
        if args.is_empty() {
            return Err(ExprError::NoArguments(name));
        }
        let mut seen = BTreeSet::new();
        for arg in &args {
            if !seen.insert(arg.clone()) {
                return Err(ExprError::DuplicateArgument {
                    field: name,
                    var: arg.clone(),
                });
            }
        }
        Ok(Self { name, args })
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn args(&self) -> &[Symbol] {
        &self.args
    }

    pub fn depends_on(&self, symbol: &Symbol) -> bool {
        self.args.contains(symbol)
    }

    /// The field itself as an expression node.
    pub fn expr(&self) -> Expr {
        Expr::Derivative {
            field: self.name.clone(),
            wrt: Vec::new(),
        }
    }

    pub fn diff(&self, var: &Symbol) -> Expr {
        self.expr().diff(var)
    }
}

/// Symbolic expression tree.
///
/// `Derivative { field, wrt }` is a partial derivative of an unknown field.
/// An empty `wrt` is the field value itself. `wrt` is kept sorted so that
/// mixed partials compare equal regardless of differentiation order.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const(f64),
    Var(Symbol),
    Derivative { field: Symbol, wrt: Vec<Symbol> },
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Powi(Box<Expr>, i32),
    Sin(Box<Expr>),
    Cos(Box<Expr>),
    Exp(Box<Expr>),
}

/// Source of numeric values for symbols and field derivatives during evaluation.
pub trait EvalContext<T> {
    fn var(&self, name: &Symbol) -> Option<T>;

    fn derivative(&self, _field: &Symbol, _wrt: &[Symbol]) -> Option<T> {
        None
    }
}

/// Plain symbol → value bindings. Knows nothing about fields.
#[derive(Clone, Debug, Default)]
pub struct Bindings<T> {
    values: HashMap<Symbol, T>,
}

impl<T: Clone> Bindings<T> {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<Symbol>, value: T) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<Symbol>, value: T) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &Symbol) -> Option<&T> {
        self.values.get(name)
    }
}

impl<T: Clone> EvalContext<T> for Bindings<T> {
    fn var(&self, name: &Symbol) -> Option<T> {
        self.values.get(name).cloned()
    }
}

impl Expr {
    pub fn var(name: impl Into<Symbol>) -> Self {
        Expr::Var(name.into())
    }

    pub fn constant(value: f64) -> Self {
        Expr::Const(value)
    }

    pub fn zero() -> Self {
        Expr::Const(0.0)
    }

    pub fn one() -> Self {
        Expr::Const(1.0)
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    fn is_const(&self, value: f64) -> bool {
        matches!(self, Expr::Const(c) if *c == value)
    }

    // Smart constructors fold constants and drop neutral elements so that
    // repeated differentiation does not blow up the tree.

    pub fn sum(lhs: Expr, rhs: Expr) -> Expr {
        match (&lhs, &rhs) {
            (Expr::Const(a), Expr::Const(b)) => Expr::Const(a + b),
            _ if lhs.is_const(0.0) => rhs,
            _ if rhs.is_const(0.0) => lhs,
            _ => Expr::Add(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn difference(lhs: Expr, rhs: Expr) -> Expr {
        match (&lhs, &rhs) {
            (Expr::Const(a), Expr::Const(b)) => Expr::Const(a - b),
            _ if rhs.is_const(0.0) => lhs,
            _ if lhs.is_const(0.0) => Expr::negate(rhs),
            _ => Expr::Sub(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn product(lhs: Expr, rhs: Expr) -> Expr {
        match (&lhs, &rhs) {
            (Expr::Const(a), Expr::Const(b)) => Expr::Const(a * b),
            _ if lhs.is_const(0.0) || rhs.is_const(0.0) => Expr::zero(),
            _ if lhs.is_const(1.0) => rhs,
            _ if rhs.is_const(1.0) => lhs,
            _ => Expr::Mul(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn quotient(lhs: Expr, rhs: Expr) -> Expr {
        match (&lhs, &rhs) {
            (Expr::Const(a), Expr::Const(b)) if *b != 0.0 => Expr::Const(a / b),
            _ if lhs.is_const(0.0) && !rhs.is_const(0.0) => Expr::zero(),
            _ if rhs.is_const(1.0) => lhs,
            _ => Expr::Div(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn negate(inner: Expr) -> Expr {
        match inner {
            Expr::Const(c) => Expr::Const(-c),
            Expr::Neg(e) => *e,
            other => Expr::Neg(Box::new(other)),
        }
    }

    pub fn powi(self, n: i32) -> Expr {
        match (self, n) {
            (_, 0) => Expr::one(),
            (base, 1) => base,
            (Expr::Const(c), n) => Expr::Const(c.powi(n)),
            (base, n) => Expr::Powi(Box::new(base), n),
        }
    }

    pub fn sin(self) -> Expr {
        match self {
            Expr::Const(c) => Expr::Const(c.sin()),
            other => Expr::Sin(Box::new(other)),
        }
    }

    pub fn cos(self) -> Expr {
        match self {
            Expr::Const(c) => Expr::Const(c.cos()),
            other => Expr::Cos(Box::new(other)),
        }
    }

    pub fn exp(self) -> Expr {
        match self {
            Expr::Const(c) => Expr::Const(c.exp()),
            other => Expr::Exp(Box::new(other)),
        }
    }

    /// Exact partial derivative with respect to `var`.
    pub fn diff(&self, var: &Symbol) -> Expr {
        match self {
            Expr::Const(_) => Expr::zero(),
            Expr::Var(name) => {
                if name == var {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            Expr::Derivative { field, wrt } => {
                let mut wrt = wrt.clone();
                wrt.push(var.clone());
                wrt.sort();
                Expr::Derivative {
                    field: field.clone(),
                    wrt,
                }
            }
            Expr::Add(a, b) => Expr::sum(a.diff(var), b.diff(var)),
            Expr::Sub(a, b) => Expr::difference(a.diff(var), b.diff(var)),
            Expr::Mul(a, b) => Expr::sum(
                Expr::product(a.diff(var), (**b).clone()),
                Expr::product((**a).clone(), b.diff(var)),
            ),
            Expr::Div(a, b) => Expr::quotient(
                Expr::difference(
                    Expr::product(a.diff(var), (**b).clone()),
                    Expr::product((**a).clone(), b.diff(var)),
                ),
                (**b).clone().powi(2),
            ),
            Expr::Neg(a) => Expr::negate(a.diff(var)),
            Expr::Powi(base, n) => Expr::product(
                Expr::product(Expr::Const(*n as f64), (**base).clone().powi(n - 1)),
                base.diff(var),
            ),
            Expr::Sin(a) => Expr::product((**a).clone().cos(), a.diff(var)),
            Expr::Cos(a) => Expr::negate(Expr::product((**a).clone().sin(), a.diff(var))),
            Expr::Exp(a) => Expr::product((**a).clone().exp(), a.diff(var)),
        }
    }

    /// Replaces every occurrence of `var` by `value`.
    pub fn subs(&self, var: &Symbol, value: &Expr) -> Expr {
        self.rebuild(&|node| match node {
            Expr::Var(name) if name == var => Some(value.clone()),
            _ => None,
        })
    }

    /// Replaces the unknown `field` (and all its derivatives) by an explicit
    /// expression, differentiating the replacement where required.
    pub fn substitute_field(&self, field: &Symbol, replacement: &Expr) -> Expr {
        self.rebuild(&|node| match node {
            Expr::Derivative { field: f, wrt } if f == field => Some(
                wrt.iter()
                    .fold(replacement.clone(), |acc, var| acc.diff(var)),
            ),
            _ => None,
        })
    }

    /// Re-applies the smart constructors bottom-up.
    pub fn simplify(&self) -> Expr {
        self.rebuild(&|_| None)
    }

    fn rebuild(&self, leaf: &dyn Fn(&Expr) -> Option<Expr>) -> Expr {
        if let Some(replaced) = leaf(self) {
            return replaced;
        }
        match self {
            Expr::Const(_) | Expr::Var(_) | Expr::Derivative { .. } => self.clone(),
            Expr::Add(a, b) => Expr::sum(a.rebuild(leaf), b.rebuild(leaf)),
            Expr::Sub(a, b) => Expr::difference(a.rebuild(leaf), b.rebuild(leaf)),
            Expr::Mul(a, b) => Expr::product(a.rebuild(leaf), b.rebuild(leaf)),
            Expr::Div(a, b) => Expr::quotient(a.rebuild(leaf), b.rebuild(leaf)),
            Expr::Neg(a) => Expr::negate(a.rebuild(leaf)),
            Expr::Powi(a, n) => a.rebuild(leaf).powi(*n),
            Expr::Sin(a) => a.rebuild(leaf).sin(),
            Expr::Cos(a) => a.rebuild(leaf).cos(),
            Expr::Exp(a) => a.rebuild(leaf).exp(),
        }
    }

    fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Const(_) | Expr::Var(_) | Expr::Derivative { .. } => {}
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Expr::Neg(a) | Expr::Powi(a, _) | Expr::Sin(a) | Expr::Cos(a) | Expr::Exp(a) => {
                a.visit(f)
            }
        }
    }

    /// Free variables, excluding fields.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let Expr::Var(name) = node {
                out.insert(name.clone());
            }
        });
        out
    }

    /// Names of the unknown fields referenced by this expression.
    pub fn fields(&self) -> BTreeSet<Symbol> {
        self.derivatives().into_iter().map(|(f, _)| f).collect()
    }

    /// Every distinct `(field, wrt)` derivative node.
    pub fn derivatives(&self) -> BTreeSet<(Symbol, Vec<Symbol>)> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let Expr::Derivative { field, wrt } = node {
                out.insert((field.clone(), wrt.clone()));
            }
        });
        out
    }

    /// Evaluates the expression with any dual number type, so the result can
    /// itself be differentiated by the caller.
    pub fn eval<T, C>(&self, ctx: &C) -> Result<T, ExprError>
    where
        T: DualNum<f64>,
        C: EvalContext<T> + ?Sized,
    {
        Ok(match self {
            Expr::Const(c) => T::from(*c),
            Expr::Var(name) => ctx
                .var(name)
                .ok_or_else(|| ExprError::UnresolvedSymbol(name.clone()))?,
            Expr::Derivative { field, wrt } => {
                ctx.derivative(field, wrt)
                    .ok_or_else(|| ExprError::UnresolvedDerivative {
                        field: field.clone(),
                        wrt: wrt.clone(),
                    })?
            }
            Expr::Add(a, b) => a.eval::<T, C>(ctx)? + b.eval::<T, C>(ctx)?,
            Expr::Sub(a, b) => a.eval::<T, C>(ctx)? - b.eval::<T, C>(ctx)?,
            Expr::Mul(a, b) => a.eval::<T, C>(ctx)? * b.eval::<T, C>(ctx)?,
            Expr::Div(a, b) => a.eval::<T, C>(ctx)? / b.eval::<T, C>(ctx)?,
            Expr::Neg(a) => -a.eval::<T, C>(ctx)?,
            Expr::Powi(a, n) => a.eval::<T, C>(ctx)?.powi(*n),
            Expr::Sin(a) => a.eval::<T, C>(ctx)?.sin(),
            Expr::Cos(a) => a.eval::<T, C>(ctx)?.cos(),
            Expr::Exp(a) => a.eval::<T, C>(ctx)?.exp(),
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Derivative { field, wrt } if wrt.is_empty() => write!(f, "{field}"),
            Expr::Derivative { field, wrt } => {
                write!(f, "d")?;
                if wrt.len() > 1 {
                    write!(f, "{}", wrt.len())?;
                }
                write!(f, "({field})/")?;
                for var in wrt {
                    write!(f, "d{var}")?;
                }
                Ok(())
            }
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Neg(a) => write!(f, "-{a}"),
            Expr::Powi(a, n) => write!(f, "{a}^{n}"),
            Expr::Sin(a) => write!(f, "sin({a})"),
            Expr::Cos(a) => write!(f, "cos({a})"),
            Expr::Exp(a) => write!(f, "exp({a})"),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::Var(symbol)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        Expr::Var(symbol.clone())
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::sum(self, rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::difference(self, rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::product(self, rhs)
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::quotient(self, rhs)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::negate(self)
    }
}

impl Add<f64> for Expr {
    type Output = Expr;

    fn add(self, rhs: f64) -> Expr {
        Expr::sum(self, Expr::Const(rhs))
    }
}

impl Sub<f64> for Expr {
    type Output = Expr;

    fn sub(self, rhs: f64) -> Expr {
        Expr::difference(self, Expr::Const(rhs))
    }
}

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        Expr::product(self, Expr::Const(rhs))
    }
}

impl Div<f64> for Expr {
    type Output = Expr;

    fn div(self, rhs: f64) -> Expr {
        Expr::quotient(self, Expr::Const(rhs))
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::product(Expr::Const(self), rhs)
    }
}
