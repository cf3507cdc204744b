pub mod constraint;
pub mod inference;
pub mod params;
pub mod subdomain;

use rand::Rng;
use thiserror::Error;

use crate::discretization::GeometryError;
use crate::physics::{ExprError, Symbol};

pub use constraint::{Criterion, Weight};
pub use inference::{InferenceDomain, InferenceSpec};
pub use params::{ParameterDraw, ParameterPolicy, ParameterRange, ParameterRanges};
pub use subdomain::{
    boundary_bc, interior_bc, BoundaryBc, Columns, InteriorBc, SampleBatch, SubDomain,
    SubDomainKind,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("parameter {0} is used but has no range")]
    MissingParameter(Symbol),
    #[error("parameter {0} has more than one range")]
    DuplicateParameter(Symbol),
    #[error("parameter {symbol} has empty interval [{low}, {high}]")]
    EmptyInterval { symbol: Symbol, low: f64, high: f64 },
    #[error("value {value} of parameter {symbol} lies outside its range")]
    OutOfRange { symbol: Symbol, value: f64 },
    #[error("parameter {symbol} is shared per step over [{low}, {high}] but redeclared over [{other_low}, {other_high}]")]
    ConflictingRange {
        symbol: Symbol,
        low: f64,
        high: f64,
        other_low: f64,
        other_high: f64,
    },
    #[error("sub-domain `{0}` already exists")]
    DuplicateName(String),
    #[error("no sub-domain named `{0}`")]
    UnknownSubDomain(String),
    #[error("{kind} selection on the {region} is empty")]
    EmptySelection {
        kind: subdomain::SubDomainKind,
        region: &'static str,
    },
    #[error("sample count must be positive")]
    ZeroCount,
    #[error("density must be positive and finite, got {0}")]
    InvalidDensity(f64),
    #[error("sub-domain declares no targets")]
    NoTargets,
    #[error("target `{0}` is declared twice")]
    DuplicateTarget(String),
    #[error("target `{0}` refers to an unknown field")]
    FieldInTarget(String),
    #[error("weight given for unknown target `{0}`")]
    UnknownWeight(String),
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Ordered collection of uniquely named training sub-domains.
#[derive(Clone, Debug, Default)]
pub struct Domain {
    sub_domains: Vec<(String, SubDomain)>,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sub_domain: SubDomain, name: impl Into<String>) -> Result<(), DomainError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(DomainError::DuplicateName(name));
        }
        if sub_domain.policy() == ParameterPolicy::PerStep {
            self.check_step_ranges(&sub_domain)?;
        }
        log::info!(
            "added {} sub-domain `{name}` ({} points per batch)",
            sub_domain.kind(),
            sub_domain.batch_size()
        );
        self.sub_domains.push((name, sub_domain));
        Ok(())
    }

    // per-step values are drawn once, so every per-step range of a symbol must agree
    fn check_step_ranges(&self, incoming: &SubDomain) -> Result<(), DomainError> {
        let existing = self
            .sub_domains
            .iter()
            .filter(|(_, s)| s.policy() == ParameterPolicy::PerStep)
            .flat_map(|(_, s)| s.ranges().iter());
        for range in existing {
            if let Some(other) = incoming.ranges().get(range.symbol()) {
                if other.low() != range.low() || other.high() != range.high() {
                    return Err(DomainError::ConflictingRange {
                        symbol: range.symbol().clone(),
                        low: range.low(),
                        high: range.high(),
                        other_low: other.low(),
                        other_high: other.high(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SubDomain> {
        self.sub_domains
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sub_domains.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SubDomain)> {
        self.sub_domains.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.sub_domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_domains.is_empty()
    }

    /// Total points drawn by one [`sample_step`](Self::sample_step).
    pub fn points_per_step(&self) -> usize {
        self.sub_domains.iter().map(|(_, s)| s.batch_size()).sum()
    }

    /// Draws the values shared by every `PerStep` sub-domain. A parameter
    /// takes the range of the first sub-domain that declares it.
    pub fn step_draw<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterDraw {
        let mut draw = ParameterDraw::new();
        for (_, sub) in &self.sub_domains {
            if sub.policy() != ParameterPolicy::PerStep {
                continue;
            }
            for range in sub.ranges().iter() {
                if draw.get(range.symbol()).is_none() {
                    draw.set(range.symbol().clone(), range.draw(rng));
                }
            }
        }
        draw
    }

    /// Samples one batch from every sub-domain, in insertion order.
    pub fn sample_step<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Vec<(String, SampleBatch)>, DomainError> {
        let step = self.step_draw(rng);
        log::debug!("step draw {step:?}");
        self.sub_domains
            .iter()
            .map(|(name, sub)| Ok((name.clone(), sub.sample(rng, Some(&step))?)))
            .collect()
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        name: &str,
        rng: &mut R,
        draw: Option<&ParameterDraw>,
    ) -> Result<SampleBatch, DomainError> {
        self.get(name)
            .ok_or_else(|| DomainError::UnknownSubDomain(name.to_string()))?
            .sample(rng, draw)
    }
}
