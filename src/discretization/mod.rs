pub mod generator;
pub mod primitives;

use glam::DVec2;
use rand::Rng;
use thiserror::Error;

pub use primitives::{Line, Rectangle, RigidTransform};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("line from {start} to {end} has zero length")]
    ZeroLength { start: DVec2, end: DVec2 },
    #[error("rectangle spanning {lower} to {upper} has zero area")]
    ZeroArea { lower: DVec2, upper: DVec2 },
    #[error("normal sign must be +1 or -1, got {0}")]
    InvalidNormalSign(f64),
    #[error("non-finite coordinate in {0} definition")]
    NonFinite(&'static str),
    #[error("{0} has no interior to sample")]
    NoInterior(&'static str),
    #[error("requested an empty sample")]
    EmptyRequest,
    #[error("sampling bounds do not overlap the {0}")]
    Disjoint(&'static str),
    #[error("accepted {accepted} of {requested} points within {attempts} attempts")]
    SamplingBudget {
        accepted: usize,
        requested: usize,
        attempts: usize,
    },
}

/// A point on a primitive's boundary together with its unit normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundarySample {
    pub point: DVec2,
    pub normal: DVec2,
}

/// Axis-aligned box in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec2,
    pub max: DVec2,
}

impl Aabb {
    pub fn new(a: impl Into<DVec2>, b: impl Into<DVec2>) -> Self {
        let (a, b) = (a.into(), b.into());
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box from per-axis intervals, as in `x ∈ [x0, x1], y ∈ [y0, y1]`.
    pub fn from_bounds(x: (f64, f64), y: (f64, f64)) -> Self {
        Self::new((x.0, y.0), (x.1, y.1))
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    pub fn area(&self) -> f64 {
        let s = self.size();
        s.x * s.y
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn intersect(&self, other: &Aabb) -> Option<Aabb> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (max.x > min.x && max.y > min.y).then_some(Aabb { min, max })
    }
}

/// Spatial queries and samplers shared by all primitives.
pub trait Geometry {
    /// Short name used in log and error messages.
    fn kind(&self) -> &'static str;

    /// Signed distance: negative inside, zero on the boundary, positive outside.
    /// Primitives without interior return the unsigned distance.
    fn sdf(&self, p: DVec2) -> f64;

    /// Total boundary length.
    fn boundary_measure(&self) -> f64;

    /// Enclosed area, zero for degenerate primitives.
    fn area(&self) -> f64;

    fn bounding_box(&self) -> Aabb;

    /// Closed-form boundary parametrization by arc-length fraction `s ∈ [0, 1)`.
    fn boundary_point(&self, s: f64) -> BoundarySample;

    fn has_interior(&self) -> bool {
        self.area() > 0.0
    }

    fn on_boundary(&self, p: DVec2, tol: f64) -> bool {
        self.sdf(p).abs() <= tol
    }

    fn contains(&self, p: DVec2) -> bool {
        self.sdf(p) < 0.0
    }

    fn sample_boundary<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
    ) -> Result<Vec<BoundarySample>, GeometryError>
    where
        Self: Sized,
    {
        generator::sample_boundary(self, rng, n)
    }

    fn sample_interior<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
    ) -> Result<Vec<DVec2>, GeometryError>
    where
        Self: Sized,
    {
        generator::sample_interior(self, None, rng, n)
    }
}

/// Any primitive a sub-domain can be built on.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Rectangle(Rectangle),
    Line(Line),
}

impl From<Rectangle> for Primitive {
    fn from(r: Rectangle) -> Self {
        Primitive::Rectangle(r)
    }
}

impl From<Line> for Primitive {
    fn from(l: Line) -> Self {
        Primitive::Line(l)
    }
}

impl Geometry for Primitive {
    fn kind(&self) -> &'static str {
        match self {
            Primitive::Rectangle(r) => r.kind(),
            Primitive::Line(l) => l.kind(),
        }
    }

    fn sdf(&self, p: DVec2) -> f64 {
        match self {
            Primitive::Rectangle(r) => r.sdf(p),
            Primitive::Line(l) => l.sdf(p),
        }
    }

    fn boundary_measure(&self) -> f64 {
        match self {
            Primitive::Rectangle(r) => r.boundary_measure(),
            Primitive::Line(l) => l.boundary_measure(),
        }
    }

    fn area(&self) -> f64 {
        match self {
            Primitive::Rectangle(r) => r.area(),
            Primitive::Line(l) => l.area(),
        }
    }

    fn bounding_box(&self) -> Aabb {
        match self {
            Primitive::Rectangle(r) => r.bounding_box(),
            Primitive::Line(l) => l.bounding_box(),
        }
    }

    fn boundary_point(&self, s: f64) -> BoundarySample {
        match self {
            Primitive::Rectangle(r) => r.boundary_point(s),
            Primitive::Line(l) => l.boundary_point(s),
        }
    }
}
