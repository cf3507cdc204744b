use nalgebra::DVector;
use rand::Rng;

use super::params::ParameterDraw;
use super::subdomain::{Columns, SampleBatch, COORDINATES};
use super::DomainError;
use crate::discretization::generator;
use crate::discretization::{Aabb, Geometry, Primitive};
use crate::physics::Symbol;

/// Raw field values requested over an interior region at fixed parameters.
#[derive(Clone, Debug)]
pub struct InferenceSpec {
    region: Primitive,
    count: usize,
    bounds: Option<Aabb>,
    parameters: ParameterDraw,
    outputs: Vec<String>,
}

impl InferenceSpec {
    pub fn new(region: impl Into<Primitive>, count: usize) -> Self {
        Self {
            region: region.into(),
            count,
            bounds: None,
            parameters: ParameterDraw::new(),
            outputs: Vec::new(),
        }
    }

    pub fn bounds(mut self, bounds: Aabb) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn parameter(mut self, symbol: impl Into<Symbol>, value: f64) -> Self {
        self.parameters.set(symbol, value);
        self
    }

    pub fn outputs<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.outputs.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn region(&self) -> &Primitive {
        &self.region
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn parameters(&self) -> &ParameterDraw {
        &self.parameters
    }

    pub fn output_names(&self) -> &[String] {
        &self.outputs
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.count == 0 {
            return Err(DomainError::ZeroCount);
        }
        if self.outputs.is_empty() {
            return Err(DomainError::NoTargets);
        }
        if let Some(name) = self
            .outputs
            .iter()
            .enumerate()
            .find(|(i, name)| self.outputs[..*i].contains(*name))
            .map(|(_, name)| name)
        {
            return Err(DomainError::DuplicateTarget(name.clone()));
        }
        generator::interior_window(&self.region, self.bounds.as_ref())?;
        Ok(())
    }

    /// Draws the full point set.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SampleBatch, DomainError> {
        self.sample_n(rng, self.count)
    }

    /// Draws `n` points; the consumer can stream a large set in chunks.
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Result<SampleBatch, DomainError> {
        if n == 0 {
            return Err(DomainError::ZeroCount);
        }
        let points = generator::sample_interior(&self.region, self.bounds.as_ref(), rng, n)?;

        let mut invar = Columns::default();
        invar.push(
            COORDINATES[0],
            DVector::from_iterator(n, points.iter().map(|p| p.x)),
        );
        invar.push(
            COORDINATES[1],
            DVector::from_iterator(n, points.iter().map(|p| p.y)),
        );
        for (symbol, value) in self.parameters.iter() {
            invar.push(symbol.as_str(), DVector::from_element(n, value));
        }

        Ok(SampleBatch {
            invar,
            ..SampleBatch::default()
        })
    }
}

/// Ordered collection of uniquely named inference requests.
#[derive(Clone, Debug, Default)]
pub struct InferenceDomain {
    entries: Vec<(String, InferenceSpec)>,
}

impl InferenceDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: InferenceSpec, name: impl Into<String>) -> Result<(), DomainError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(DomainError::DuplicateName(name));
        }
        spec.validate()?;
        log::info!(
            "added inference set `{name}`: {} points on the {}, outputs {:?}",
            spec.count,
            spec.region.kind(),
            spec.outputs
        );
        self.entries.push((name, spec));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&InferenceSpec> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InferenceSpec)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
