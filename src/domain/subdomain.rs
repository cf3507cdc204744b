use glam::DVec2;
use nalgebra::DVector;
use rand::Rng;

use super::constraint::{Criterion, Weight};
use super::params::{ParameterDraw, ParameterPolicy, ParameterRanges};
use super::DomainError;
use crate::discretization::generator::{self, BOUNDARY_RESOLUTION, INTERIOR_RESOLUTION};
use crate::discretization::{Aabb, Geometry, Primitive};
use crate::physics::{Bindings, Expr, Symbol};

/// Coordinates every sub-domain provides to targets, weights and criteria.
pub const COORDINATES: [&str; 2] = ["x", "y"];

/// Extra inputs of boundary samples.
pub const NORMALS: [&str; 2] = ["normal_x", "normal_y"];

/// Named, equally long columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Columns {
    entries: Vec<(String, DVector<f64>)>,
}

impl Columns {
    pub fn push(&mut self, name: impl Into<String>, column: DVector<f64>) {
        self.entries.push((name.into(), column));
    }

    pub fn get(&self, name: &str) -> Option<&DVector<f64>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DVector<f64>)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn from_rows(names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            entries: names
                .into_iter()
                .zip(rows)
                .map(|(n, r)| (n, DVector::from_vec(r)))
                .collect(),
        }
    }
}

/// One sampling call's worth of supervision data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBatch {
    /// `x`, `y`, boundary normals and every parameter.
    pub invar: Columns,
    /// Target value of every output or residual.
    pub outvar: Columns,
    /// `lambda_<name>` weight of every target.
    pub lambda: Columns,
}

impl SampleBatch {
    /// Number of sample points.
    pub fn len(&self) -> usize {
        self.invar.iter().next().map_or(0, |(_, c)| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubDomainKind {
    Boundary,
    Interior,
}

impl std::fmt::Display for SubDomainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubDomainKind::Boundary => write!(f, "boundary"),
            SubDomainKind::Interior => write!(f, "interior"),
        }
    }
}

/// Boundary constraint: prescribed output values on part of a boundary.
#[derive(Clone, Debug)]
pub struct BoundaryBc {
    pub outputs: Vec<(String, Expr)>,
    /// Samples per unit boundary length.
    pub density: f64,
    pub weights: Vec<(String, Weight)>,
    pub criterion: Option<Criterion>,
    pub policy: ParameterPolicy,
}

impl BoundaryBc {
    pub fn new(density: f64) -> Self {
        Self {
            outputs: Vec::new(),
            density,
            weights: Vec::new(),
            criterion: None,
            policy: ParameterPolicy::default(),
        }
    }

    pub fn output(mut self, name: impl Into<String>, target: impl Into<Expr>) -> Self {
        self.outputs.push((name.into(), target.into()));
        self
    }

    pub fn weight(mut self, name: impl Into<String>, weight: impl Into<Weight>) -> Self {
        self.weights.push((name.into(), weight.into()));
        self
    }

    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = Some(criterion);
        self
    }

    pub fn policy(mut self, policy: ParameterPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Interior constraint: residual targets over a region, optionally clipped.
#[derive(Clone, Debug)]
pub struct InteriorBc {
    pub residuals: Vec<(String, Expr)>,
    pub bounds: Option<Aabb>,
    /// Samples per unit area.
    pub density: f64,
    pub weights: Vec<(String, Weight)>,
    pub criterion: Option<Criterion>,
    pub policy: ParameterPolicy,
}

impl InteriorBc {
    pub fn new(density: f64) -> Self {
        Self {
            residuals: Vec::new(),
            bounds: None,
            density,
            weights: Vec::new(),
            criterion: None,
            policy: ParameterPolicy::default(),
        }
    }

    pub fn residual(mut self, name: impl Into<String>, target: impl Into<Expr>) -> Self {
        self.residuals.push((name.into(), target.into()));
        self
    }

    pub fn bounds(mut self, bounds: Aabb) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn weight(mut self, name: impl Into<String>, weight: impl Into<Weight>) -> Self {
        self.weights.push((name.into(), weight.into()));
        self
    }

    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = Some(criterion);
        self
    }

    pub fn policy(mut self, policy: ParameterPolicy) -> Self {
        self.policy = policy;
        self
    }
}

struct Layout {
    kind: SubDomainKind,
    targets: Vec<(String, Expr)>,
    weights: Vec<(String, Weight)>,
    criterion: Option<Criterion>,
    bounds: Option<Aabb>,
    density: f64,
    policy: ParameterPolicy,
}

/// Builds a sub-domain sampling the boundary of `region`.
pub fn boundary_bc(
    region: impl Into<Primitive>,
    spec: BoundaryBc,
    ranges: ParameterRanges,
) -> Result<SubDomain, DomainError> {
    SubDomain::build(
        region.into(),
        Layout {
            kind: SubDomainKind::Boundary,
            targets: spec.outputs,
            weights: spec.weights,
            criterion: spec.criterion,
            bounds: None,
            density: spec.density,
            policy: spec.policy,
        },
        ranges,
    )
}

/// Builds a sub-domain sampling the interior of `region`.
pub fn interior_bc(
    region: impl Into<Primitive>,
    spec: InteriorBc,
    ranges: ParameterRanges,
) -> Result<SubDomain, DomainError> {
    SubDomain::build(
        region.into(),
        Layout {
            kind: SubDomainKind::Interior,
            targets: spec.residuals,
            weights: spec.weights,
            criterion: spec.criterion,
            bounds: spec.bounds,
            density: spec.density,
            policy: spec.policy,
        },
        ranges,
    )
}

/// Immutable description of one loss term. Sampling never mutates it.
#[derive(Clone, Debug)]
pub struct SubDomain {
    kind: SubDomainKind,
    region: Primitive,
    targets: Vec<(String, Expr)>,
    weights: Vec<Weight>,
    criterion: Option<Criterion>,
    bounds: Option<Aabb>,
    ranges: ParameterRanges,
    policy: ParameterPolicy,
    density: f64,
    measure: f64,
    batch_size: usize,
}

impl SubDomain {
    fn build(
        region: Primitive,
        layout: Layout,
        ranges: ParameterRanges,
    ) -> Result<Self, DomainError> {
        let Layout {
            kind,
            targets,
            weights: named_weights,
            criterion,
            bounds,
            density,
            policy,
        } = layout;

        if !(density.is_finite() && density > 0.0) {
            return Err(DomainError::InvalidDensity(density));
        }
        if targets.is_empty() {
            return Err(DomainError::NoTargets);
        }
        for (i, (name, target)) in targets.iter().enumerate() {
            if targets[..i].iter().any(|(n, _)| n == name) {
                return Err(DomainError::DuplicateTarget(name.clone()));
            }
            if !target.fields().is_empty() {
                return Err(DomainError::FieldInTarget(name.clone()));
            }
        }

        let mut weights = vec![Weight::default(); targets.len()];
        for (name, weight) in named_weights {
            let slot = targets
                .iter()
                .position(|(n, _)| *n == name)
                .ok_or(DomainError::UnknownWeight(name))?;
            weights[slot] = weight;
        }
        if kind == SubDomainKind::Boundary && weights.contains(&Weight::BoundaryDistance) {
            log::warn!("boundary-distance weight on a boundary sub-domain is zero everywhere");
        }

        let mut sub = Self {
            kind,
            region,
            targets,
            weights,
            criterion,
            bounds,
            ranges,
            policy,
            density,
            measure: 0.0,
            batch_size: 0,
        };
        sub.check_parameters()?;

        sub.measure = sub.selected_measure()?;
        if sub.measure <= 0.0 {
            return Err(DomainError::EmptySelection {
                kind,
                region: sub.region.kind(),
            });
        }
        // absorbs quadrature rounding so exact products do not round up
        sub.batch_size = ((density * sub.measure - 1e-9).ceil() as usize).max(1);

        log::debug!(
            "{kind} sub-domain on {}: measure {:.6}, batch size {}",
            sub.region.kind(),
            sub.measure,
            sub.batch_size
        );
        Ok(sub)
    }

    fn inputs(&self) -> Vec<&str> {
        let mut names = COORDINATES.to_vec();
        if self.kind == SubDomainKind::Boundary {
            names.extend(NORMALS);
        }
        names
    }

    fn check_parameters(&self) -> Result<(), DomainError> {
        let inputs = self.inputs();
        let mut symbols = std::collections::BTreeSet::new();
        for (_, target) in &self.targets {
            symbols.extend(target.free_symbols());
        }
        for weight in &self.weights {
            symbols.extend(weight.free_symbols());
        }
        if let Some(criterion) = &self.criterion {
            symbols.extend(criterion.free_symbols());
        }

        match symbols
            .into_iter()
            .find(|s| !inputs.contains(&s.as_str()) && self.ranges.get(s).is_none())
        {
            Some(missing) => Err(DomainError::MissingParameter(missing)),
            None => Ok(()),
        }
    }

    fn selected_measure(&self) -> Result<f64, DomainError> {
        let midpoints = self.ranges.midpoints();
        match (self.kind, &self.criterion) {
            (SubDomainKind::Boundary, None) => Ok(self.region.boundary_measure()),
            (SubDomainKind::Boundary, Some(criterion)) => {
                generator::boundary_measure_where(&self.region, BOUNDARY_RESOLUTION, |b| {
                    let ctx = bindings(b.point, Some(b.normal), &midpoints);
                    Ok::<_, DomainError>(criterion.evaluate(&ctx)?)
                })
            }
            (SubDomainKind::Interior, None) if self.bounds.is_none() => {
                generator::interior_window(&self.region, None)?;
                Ok(self.region.area())
            }
            (SubDomainKind::Interior, criterion) => generator::interior_measure_where(
                &self.region,
                self.bounds.as_ref(),
                INTERIOR_RESOLUTION,
                |p| match criterion {
                    Some(c) => Ok::<_, DomainError>(c.evaluate(&bindings(p, None, &midpoints))?),
                    None => Ok(true),
                },
            ),
        }
    }

    pub fn kind(&self) -> SubDomainKind {
        self.kind
    }

    pub fn region(&self) -> &Primitive {
        &self.region
    }

    pub fn targets(&self) -> impl Iterator<Item = (&str, &Expr, &Weight)> {
        self.targets
            .iter()
            .zip(&self.weights)
            .map(|((n, e), w)| (n.as_str(), e, w))
    }

    pub fn criterion(&self) -> Option<&Criterion> {
        self.criterion.as_ref()
    }

    pub fn bounds(&self) -> Option<&Aabb> {
        self.bounds.as_ref()
    }

    pub fn ranges(&self) -> &ParameterRanges {
        &self.ranges
    }

    pub fn policy(&self) -> ParameterPolicy {
        self.policy
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    /// Length or area of the selected region.
    pub fn measure(&self) -> f64 {
        self.measure
    }

    /// `ceil(density · measure)`.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Samples one batch of [`batch_size`](Self::batch_size) points.
    /// `step` carries the values shared across a training step.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        step: Option<&ParameterDraw>,
    ) -> Result<SampleBatch, DomainError> {
        self.sample_n(rng, self.batch_size, step)
    }

    pub fn sample_n<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
        step: Option<&ParameterDraw>,
    ) -> Result<SampleBatch, DomainError> {
        if n == 0 {
            return Err(DomainError::ZeroCount);
        }
        let shared = match (self.policy, step) {
            (ParameterPolicy::PerPoint, _) => None,
            (ParameterPolicy::PerBatch, _) | (ParameterPolicy::PerStep, None) => {
                Some(self.ranges.draw(rng))
            }
            (ParameterPolicy::PerStep, Some(step)) => Some(self.ranges.resolve(step, rng)?),
        };

        let mut rows = Rows::new(self, n);
        match self.kind {
            SubDomainKind::Boundary => {
                generator::sample_boundary_where(&self.region, rng, n, |b, rng| {
                    let draw = self.point_draw(shared.as_ref(), rng);
                    self.record(b.point, Some(b.normal), &draw, &mut rows)
                })?;
            }
            SubDomainKind::Interior => {
                generator::sample_interior_where(
                    &self.region,
                    self.bounds.as_ref(),
                    rng,
                    n,
                    |p, rng| {
                        let draw = self.point_draw(shared.as_ref(), rng);
                        self.record(p, None, &draw, &mut rows)
                    },
                )?;
            }
        }
        Ok(rows.finish(self))
    }

    fn point_draw<R: Rng + ?Sized>(
        &self,
        shared: Option<&ParameterDraw>,
        rng: &mut R,
    ) -> ParameterDraw {
        match shared {
            Some(draw) => draw.clone(),
            None => self.ranges.draw(rng),
        }
    }

    // Evaluates the criterion at a candidate and stores the row if accepted.
    fn record(
        &self,
        p: DVec2,
        normal: Option<DVec2>,
        draw: &ParameterDraw,
        rows: &mut Rows,
    ) -> Result<bool, DomainError> {
        let ctx = bindings(p, normal, draw);
        if let Some(criterion) = &self.criterion {
            if !criterion.evaluate(&ctx)? {
                return Ok(false);
            }
        }

        let mut input = vec![p.x, p.y];
        if let Some(n) = normal {
            input.extend([n.x, n.y]);
        }
        for symbol in self.ranges.symbols() {
            let value = draw
                .get(symbol)
                .ok_or_else(|| DomainError::MissingParameter(symbol.clone()))?;
            input.push(value);
        }

        let sdf = self.region.sdf(p);
        let mut output = Vec::with_capacity(self.targets.len());
        let mut weight = Vec::with_capacity(self.targets.len());
        for ((_, target), w) in self.targets.iter().zip(&self.weights) {
            output.push(target.eval::<f64, _>(&ctx)?);
            weight.push(w.evaluate(&ctx, sdf)?);
        }

        rows.push(&input, &output, &weight);
        Ok(true)
    }
}

fn bindings(p: DVec2, normal: Option<DVec2>, draw: &ParameterDraw) -> Bindings<f64> {
    let mut ctx = Bindings::new().with(COORDINATES[0], p.x).with(COORDINATES[1], p.y);
    if let Some(n) = normal {
        ctx.set(NORMALS[0], n.x);
        ctx.set(NORMALS[1], n.y);
    }
    for (symbol, value) in draw.iter() {
        ctx.set(symbol, value);
    }
    ctx
}

/// Column-major accumulator of accepted samples.
struct Rows {
    invar: Vec<Vec<f64>>,
    outvar: Vec<Vec<f64>>,
    lambda: Vec<Vec<f64>>,
}

impl Rows {
    fn new(sub: &SubDomain, n: usize) -> Self {
        let columns = |k: usize| -> Vec<Vec<f64>> { (0..k).map(|_| Vec::with_capacity(n)).collect() };
        Self {
            invar: columns(sub.inputs().len() + sub.ranges.len()),
            outvar: columns(sub.targets.len()),
            lambda: columns(sub.targets.len()),
        }
    }

    fn push(&mut self, input: &[f64], output: &[f64], weight: &[f64]) {
        for (col, v) in self.invar.iter_mut().zip(input) {
            col.push(*v);
        }
        for (col, v) in self.outvar.iter_mut().zip(output) {
            col.push(*v);
        }
        for (col, v) in self.lambda.iter_mut().zip(weight) {
            col.push(*v);
        }
    }

    fn finish(self, sub: &SubDomain) -> SampleBatch {
        let mut inputs: Vec<String> = sub.inputs().into_iter().map(String::from).collect();
        inputs.extend(sub.ranges.symbols().map(Symbol::to_string));
        let targets: Vec<String> = sub.targets.iter().map(|(n, _)| n.clone()).collect();
        let lambdas = targets.iter().map(|n| format!("lambda_{n}")).collect();

        SampleBatch {
            invar: Columns::from_rows(inputs, self.invar),
            outvar: Columns::from_rows(targets, self.outvar),
            lambda: Columns::from_rows(lambdas, self.lambda),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::{Line, Rectangle};
    use crate::domain::params::ParameterRange;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square() -> Rectangle {
        Rectangle::new((-0.3, -0.3), (0.3, 0.3)).unwrap()
    }

    fn alpha_ranges() -> ParameterRanges {
        ParameterRanges::new()
            .with(ParameterRange::new("alpha", -0.1, 0.1).unwrap())
            .unwrap()
    }

    #[test]
    fn batch_size_follows_density_and_measure() {
        let inlet = boundary_bc(
            square(),
            BoundaryBc::new(250.0)
                .output("u", 1.0)
                .criterion(Criterion::equals(Expr::var("x"), -0.3)),
            ParameterRanges::new(),
        )
        .unwrap();
        assert_abs_diff_eq!(inlet.measure(), 0.6, epsilon = 1e-9);
        assert_eq!(inlet.batch_size(), 150);

        let interior = interior_bc(
            square(),
            InteriorBc::new(2000.0).residual("r", 0.0),
            ParameterRanges::new(),
        )
        .unwrap();
        assert_eq!(interior.batch_size(), 720);
    }

    #[test]
    fn boundary_batch_columns() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let inlet = boundary_bc(
            square(),
            BoundaryBc::new(50.0)
                .output("u", Expr::var("alpha").cos() * 10.0)
                .weight("u", 2.0)
                .criterion(Criterion::equals(Expr::var("x"), -0.3)),
            alpha_ranges(),
        )
        .unwrap();
        let batch = inlet.sample(&mut rng, None).unwrap();

        assert_eq!(batch.len(), 30);
        assert_eq!(batch.invar.names(), vec!["x", "y", "normal_x", "normal_y", "alpha"]);
        assert_eq!(batch.lambda.names(), vec!["lambda_u"]);
        let x = batch.invar.get("x").unwrap();
        let nx = batch.invar.get("normal_x").unwrap();
        let alpha = batch.invar.get("alpha").unwrap();
        let u = batch.outvar.get("u").unwrap();
        for i in 0..batch.len() {
            assert_abs_diff_eq!(x[i], -0.3, epsilon = 1e-6);
            assert_abs_diff_eq!(nx[i], -1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(u[i], 10.0 * alpha[i].cos(), epsilon = 1e-12);
        }
        assert!(batch.lambda.get("lambda_u").unwrap().iter().all(|&w| w == 2.0));
    }

    #[test]
    fn per_batch_policy_shares_one_value() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let sub = interior_bc(
            square(),
            InteriorBc::new(100.0)
                .residual("r", 0.0)
                .policy(ParameterPolicy::PerBatch),
            alpha_ranges(),
        )
        .unwrap();
        let batch = sub.sample(&mut rng, None).unwrap();
        let alpha = batch.invar.get("alpha").unwrap();
        assert!(alpha.iter().all(|&a| a == alpha[0]));

        let per_point = interior_bc(
            square(),
            InteriorBc::new(100.0)
                .residual("r", 0.0)
                .policy(ParameterPolicy::PerPoint),
            alpha_ranges(),
        )
        .unwrap();
        let batch = per_point.sample(&mut rng, None).unwrap();
        let alpha = batch.invar.get("alpha").unwrap();
        assert!(alpha.iter().any(|&a| a != alpha[0]));
    }

    #[test]
    fn per_step_policy_uses_shared_draw() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let sub = interior_bc(square(), InteriorBc::new(100.0).residual("r", 0.0), alpha_ranges())
            .unwrap();
        let step = ParameterDraw::new().with("alpha", 0.05);
        let batch = sub.sample(&mut rng, Some(&step)).unwrap();
        assert!(batch.invar.get("alpha").unwrap().iter().all(|&a| a == 0.05));
    }

    #[test]
    fn interior_weights_follow_boundary_distance() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let rect = square();
        let sub = interior_bc(
            rect.clone(),
            InteriorBc::new(500.0)
                .residual("r", 0.0)
                .weight("r", Weight::BoundaryDistance),
            ParameterRanges::new(),
        )
        .unwrap();
        let batch = sub.sample(&mut rng, None).unwrap();
        let (x, y) = (batch.invar.get("x").unwrap(), batch.invar.get("y").unwrap());
        let w = batch.lambda.get("lambda_r").unwrap();
        for i in 0..batch.len() {
            let p = DVec2::new(x[i], y[i]);
            assert!(rect.sdf(p) < 0.0);
            assert_abs_diff_eq!(w[i], -rect.sdf(p), epsilon = 1e-12);
        }
    }

    #[test]
    fn bounds_clip_interior_samples() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let bounds = Aabb::from_bounds((-0.2, 0.2), (-0.075, 0.075));
        let sub = interior_bc(
            square(),
            InteriorBc::new(2000.0).residual("r", 0.0).bounds(bounds),
            ParameterRanges::new(),
        )
        .unwrap();
        assert_eq!(sub.batch_size(), 120);
        let batch = sub.sample(&mut rng, None).unwrap();
        let (x, y) = (batch.invar.get("x").unwrap(), batch.invar.get("y").unwrap());
        for i in 0..batch.len() {
            assert!(bounds.contains(DVec2::new(x[i], y[i])));
        }
    }

    #[test]
    fn construction_errors() {
        let missing = boundary_bc(
            square(),
            BoundaryBc::new(10.0).output("v", Expr::var("alpha").sin()),
            ParameterRanges::new(),
        )
        .unwrap_err();
        assert_eq!(missing, DomainError::MissingParameter(Symbol::from("alpha")));

        let nothing = boundary_bc(
            square(),
            BoundaryBc::new(10.0)
                .output("u", 0.0)
                .criterion(Criterion::gt(Expr::var("x"), 5.0)),
            ParameterRanges::new(),
        )
        .unwrap_err();
        assert!(matches!(nothing, DomainError::EmptySelection { .. }));

        let line = Line::new((0.0, 0.0), (1.0, 0.0), 1.0).unwrap();
        let no_interior =
            interior_bc(line, InteriorBc::new(10.0).residual("r", 0.0), ParameterRanges::new())
                .unwrap_err();
        assert!(matches!(no_interior, DomainError::Geometry(_)));

        let stray = boundary_bc(
            square(),
            BoundaryBc::new(10.0).output("u", 0.0).weight("w", 1.0),
            ParameterRanges::new(),
        )
        .unwrap_err();
        assert_eq!(stray, DomainError::UnknownWeight("w".into()));

        assert_eq!(
            boundary_bc(square(), BoundaryBc::new(0.0).output("u", 0.0), ParameterRanges::new())
                .unwrap_err(),
            DomainError::InvalidDensity(0.0)
        );
    }

    #[test]
    fn zero_count_sample_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let sub = boundary_bc(square(), BoundaryBc::new(10.0).output("u", 0.0), ParameterRanges::new())
            .unwrap();
        assert_eq!(sub.sample_n(&mut rng, 0, None), Err(DomainError::ZeroCount));
    }
}
