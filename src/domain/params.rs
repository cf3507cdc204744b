use std::collections::BTreeMap;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::DomainError;
use crate::physics::Symbol;

/// Continuous interval a free parameter is drawn from.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterRange {
    symbol: Symbol,
    low: f64,
    high: f64,
}

impl ParameterRange {
    /// A degenerate interval (`low == high`) pins the parameter.
    pub fn new(symbol: impl Into<Symbol>, low: f64, high: f64) -> Result<Self, DomainError> {
        let symbol = symbol.into();
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(DomainError::EmptyInterval { symbol, low, high });
        }
        Ok(Self { symbol, low, high })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.low + self.high)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        Uniform::new_inclusive(self.low, self.high).sample(rng)
    }

    /// `n` independent uniform draws.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        let dist = Uniform::new_inclusive(self.low, self.high);
        (0..n).map(|_| dist.sample(rng)).collect()
    }
}

/// Parameter ranges of one sub-domain, at most one per symbol.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterRanges {
    entries: Vec<ParameterRange>,
}

impl ParameterRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, range: ParameterRange) -> Result<Self, DomainError> {
        self.insert(range)?;
        Ok(self)
    }

    pub fn insert(&mut self, range: ParameterRange) -> Result<(), DomainError> {
        if self.get(range.symbol()).is_some() {
            return Err(DomainError::DuplicateParameter(range.symbol.clone()));
        }
        self.entries.push(range);
        Ok(())
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&ParameterRange> {
        self.entries.iter().find(|r| r.symbol() == symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterRange> {
        self.entries.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter().map(|r| r.symbol())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One value per parameter.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterDraw {
        ParameterDraw {
            values: self
                .entries
                .iter()
                .map(|r| (r.symbol.clone(), r.draw(rng)))
                .collect(),
        }
    }

    /// Interval midpoints, used wherever a deterministic draw is needed.
    pub fn midpoints(&self) -> ParameterDraw {
        ParameterDraw {
            values: self
                .entries
                .iter()
                .map(|r| (r.symbol.clone(), r.midpoint()))
                .collect(),
        }
    }

    /// Takes the values this sub-domain needs from a shared draw, drawing any
    /// parameter the shared draw does not carry.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        shared: &ParameterDraw,
        rng: &mut R,
    ) -> Result<ParameterDraw, DomainError> {
        let mut out = ParameterDraw::default();
        for range in &self.entries {
            let value = match shared.get(range.symbol()) {
                Some(v) if range.contains(v) => v,
                Some(v) => {
                    return Err(DomainError::OutOfRange {
                        symbol: range.symbol.clone(),
                        value: v,
                    })
                }
                None => range.draw(rng),
            };
            out.set(range.symbol.clone(), value);
        }
        Ok(out)
    }
}

/// When fresh parameter values are drawn during sampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterPolicy {
    /// Independent draw for every sample point.
    PerPoint,
    /// One draw shared by every point of a batch.
    PerBatch,
    /// One draw shared by every sub-domain within a training step.
    #[default]
    PerStep,
}

/// Concrete values for a set of parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterDraw {
    values: BTreeMap<Symbol, f64>,
}

impl ParameterDraw {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: impl Into<Symbol>, value: f64) -> Self {
        self.set(symbol, value);
        self
    }

    pub fn set(&mut self, symbol: impl Into<Symbol>, value: f64) {
        self.values.insert(symbol.into(), value);
    }

    pub fn get(&self, symbol: &Symbol) -> Option<f64> {
        self.values.get(symbol).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.values.iter().map(|(s, v)| (s, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn alpha() -> ParameterRange {
        ParameterRange::new("alpha", -0.2, 0.2).unwrap()
    }

    #[test]
    fn draws_stay_in_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let range = alpha();
        assert!(range.sample(&mut rng, 500).into_iter().all(|v| range.contains(v)));
    }

    #[test]
    fn pinned_interval_is_allowed() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let range = ParameterRange::new("alpha", 0.0, 0.0).unwrap();
        assert_eq!(range.draw(&mut rng), 0.0);
    }

    #[test]
    fn rejects_empty_interval_and_duplicates() {
        assert!(matches!(
            ParameterRange::new("alpha", 1.0, -1.0),
            Err(DomainError::EmptyInterval { .. })
        ));
        let err = ParameterRanges::new()
            .with(alpha())
            .unwrap()
            .with(alpha())
            .unwrap_err();
        assert_eq!(err, DomainError::DuplicateParameter(Symbol::from("alpha")));
    }

    #[test]
    fn resolve_prefers_shared_values() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let ranges = ParameterRanges::new()
            .with(alpha())
            .unwrap()
            .with(ParameterRange::new("beta", 1.0, 2.0).unwrap())
            .unwrap();
        let shared = ParameterDraw::new().with("alpha", 0.1);
        let draw = ranges.resolve(&shared, &mut rng).unwrap();
        assert_eq!(draw.get(&Symbol::from("alpha")), Some(0.1));
        assert!(draw.get(&Symbol::from("beta")).is_some());

        let outside = ParameterDraw::new().with("alpha", 3.0);
        assert!(matches!(
            ranges.resolve(&outside, &mut rng),
            Err(DomainError::OutOfRange { .. })
        ));
    }

    #[test]
    fn policy_serializes_in_snake_case() {
        let json = serde_json::to_string(&ParameterPolicy::PerBatch).unwrap();
        assert_eq!(json, "\"per_batch\"");
        assert_eq!(ParameterPolicy::default(), ParameterPolicy::PerStep);
    }
}
