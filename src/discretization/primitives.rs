use glam::{DAffine2, DVec2};

use super::{Aabb, BoundarySample, Geometry, GeometryError};

/// Rigid placement of a primitive: maps its local frame into world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    to_world: DAffine2,
    to_local: DAffine2,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self {
            to_world: DAffine2::IDENTITY,
            to_local: DAffine2::IDENTITY,
        }
    }
}

impl RigidTransform {
    /// Applies `step` after the current placement.
    pub fn then(&self, step: DAffine2) -> Self {
        Self {
            to_world: step * self.to_world,
            to_local: self.to_local * step.inverse(),
        }
    }

    pub fn to_world(&self) -> DAffine2 {
        self.to_world
    }

    pub fn point_to_world(&self, p: DVec2) -> DVec2 {
        self.to_world.transform_point2(p)
    }

    pub fn point_to_local(&self, p: DVec2) -> DVec2 {
        self.to_local.transform_point2(p)
    }

    pub fn vector_to_world(&self, v: DVec2) -> DVec2 {
        self.to_world.transform_vector2(v)
    }
}

fn rotation_about(angle: f64, centre: DVec2) -> DAffine2 {
    DAffine2::from_translation(centre)
        * DAffine2::from_angle(angle)
        * DAffine2::from_translation(-centre)
}

fn finite(p: DVec2, what: &'static str) -> Result<DVec2, GeometryError> {
    if p.is_finite() {
        Ok(p)
    } else {
        Err(GeometryError::NonFinite(what))
    }
}

/// Axis-aligned box in its local frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Rectangle {
    lower: DVec2,
    upper: DVec2,
    frame: RigidTransform,
}

impl Rectangle {
    /// Creates a rectangle from two opposite corners, in any order.
    pub fn new(a: impl Into<DVec2>, b: impl Into<DVec2>) -> Result<Self, GeometryError> {
        let a = finite(a.into(), "rectangle")?;
        let b = finite(b.into(), "rectangle")?;
        let (lower, upper) = (a.min(b), a.max(b));
        let size = upper - lower;
        if size.x <= 0.0 || size.y <= 0.0 {
            return Err(GeometryError::ZeroArea { lower, upper });
        }
        Ok(Self {
            lower,
            upper,
            frame: RigidTransform::default(),
        })
    }

    pub fn rotate(&self, angle: f64) -> Self {
        self.rotate_about(angle, DVec2::ZERO)
    }

    pub fn rotate_about(&self, angle: f64, centre: impl Into<DVec2>) -> Self {
        Self {
            frame: self.frame.then(rotation_about(angle, centre.into())),
            ..self.clone()
        }
    }

    pub fn translate(&self, offset: impl Into<DVec2>) -> Self {
        Self {
            frame: self.frame.then(DAffine2::from_translation(offset.into())),
            ..self.clone()
        }
    }

    pub fn frame(&self) -> &RigidTransform {
        &self.frame
    }

    pub fn width(&self) -> f64 {
        self.upper.x - self.lower.x
    }

    pub fn height(&self) -> f64 {
        self.upper.y - self.lower.y
    }

    /// Corners in world coordinates, counter-clockwise from the lower-left one.
    pub fn corners(&self) -> [DVec2; 4] {
        let (lo, hi) = (self.lower, self.upper);
        [
            DVec2::new(lo.x, lo.y),
            DVec2::new(hi.x, lo.y),
            DVec2::new(hi.x, hi.y),
            DVec2::new(lo.x, hi.y),
        ]
        .map(|c| self.frame.point_to_world(c))
    }
}

impl Geometry for Rectangle {
    fn kind(&self) -> &'static str {
        "rectangle"
    }

    fn sdf(&self, p: DVec2) -> f64 {
        let local = self.frame.point_to_local(p);
        let centre = (self.lower + self.upper) * 0.5;
        let half = (self.upper - self.lower) * 0.5;
        let q = (local - centre).abs() - half;
        q.max(DVec2::ZERO).length() + q.x.max(q.y).min(0.0)
    }

    fn boundary_measure(&self) -> f64 {
        2.0 * (self.width() + self.height())
    }

    fn area(&self) -> f64 {
        self.width() * self.height()
    }

    fn bounding_box(&self) -> Aabb {
        let c = self.corners();
        let min = c[0].min(c[1]).min(c[2]).min(c[3]);
        let max = c[0].max(c[1]).max(c[2]).max(c[3]);
        Aabb { min, max }
    }

    // Edges are walked counter-clockwise: bottom, right, top, left.
    fn boundary_point(&self, s: f64) -> BoundarySample {
        let (lo, hi) = (self.lower, self.upper);
        let (w, h) = (self.width(), self.height());
        let t = s.rem_euclid(1.0) * self.boundary_measure();

        let (point, normal) = if t < w {
            (DVec2::new(lo.x + t, lo.y), DVec2::NEG_Y)
        } else if t < w + h {
            (DVec2::new(hi.x, lo.y + (t - w)), DVec2::X)
        } else if t < 2.0 * w + h {
            (DVec2::new(hi.x - (t - w - h), hi.y), DVec2::Y)
        } else {
            let run = t - 2.0 * w - h;
            (DVec2::new(lo.x, (hi.y - run).max(lo.y)), DVec2::NEG_X)
        };

        BoundarySample {
            point: self.frame.point_to_world(point),
            normal: self.frame.vector_to_world(normal),
        }
    }
}

/// Straight segment with a chosen normal side. Has no interior.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    start: DVec2,
    end: DVec2,
    normal_sign: f64,
    frame: RigidTransform,
}

impl Line {
    /// `normal_sign` must be `1.0` or `-1.0`. With `+1` an upward segment
    /// has its normal pointing towards `+x`.
    pub fn new(
        start: impl Into<DVec2>,
        end: impl Into<DVec2>,
        normal_sign: f64,
    ) -> Result<Self, GeometryError> {
        let start = finite(start.into(), "line")?;
        let end = finite(end.into(), "line")?;
        if normal_sign != 1.0 && normal_sign != -1.0 {
            return Err(GeometryError::InvalidNormalSign(normal_sign));
        }
        if start.distance(end) == 0.0 {
            return Err(GeometryError::ZeroLength { start, end });
        }
        Ok(Self {
            start,
            end,
            normal_sign,
            frame: RigidTransform::default(),
        })
    }

    pub fn rotate(&self, angle: f64) -> Self {
        self.rotate_about(angle, DVec2::ZERO)
    }

    pub fn rotate_about(&self, angle: f64, centre: impl Into<DVec2>) -> Self {
        Self {
            frame: self.frame.then(rotation_about(angle, centre.into())),
            ..self.clone()
        }
    }

    pub fn translate(&self, offset: impl Into<DVec2>) -> Self {
        Self {
            frame: self.frame.then(DAffine2::from_translation(offset.into())),
            ..self.clone()
        }
    }

    pub fn frame(&self) -> &RigidTransform {
        &self.frame
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// Start and end point in world coordinates.
    pub fn endpoints(&self) -> (DVec2, DVec2) {
        (
            self.frame.point_to_world(self.start),
            self.frame.point_to_world(self.end),
        )
    }

    /// Unit normal in world coordinates.
    pub fn normal(&self) -> DVec2 {
        let d = (self.end - self.start) / self.length();
        self.frame
            .vector_to_world(DVec2::new(d.y, -d.x) * self.normal_sign)
    }
}

impl Geometry for Line {
    fn kind(&self) -> &'static str {
        "line"
    }

    fn sdf(&self, p: DVec2) -> f64 {
        let local = self.frame.point_to_local(p);
        let d = self.end - self.start;
        let t = ((local - self.start).dot(d) / d.length_squared()).clamp(0.0, 1.0);
        local.distance(self.start + d * t)
    }

    fn boundary_measure(&self) -> f64 {
        self.length()
    }

    fn area(&self) -> f64 {
        0.0
    }

    fn bounding_box(&self) -> Aabb {
        let (a, b) = self.endpoints();
        Aabb::new(a, b)
    }

    fn boundary_point(&self, s: f64) -> BoundarySample {
        let s = s.clamp(0.0, 1.0);
        BoundarySample {
            point: self
                .frame
                .point_to_world(self.start.lerp(self.end, s)),
            normal: self.normal(),
        }
    }
}
