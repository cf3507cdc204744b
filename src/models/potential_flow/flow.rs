use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::discretization::{Aabb, Geometry, GeometryError, Line, Rectangle};
use crate::domain::{Criterion, DomainError, ParameterPolicy, ParameterRange, ParameterRanges};
use crate::numerics::SolverError;
use crate::physics::{Expr, Symbol};

/// Sampling densities: points per unit length on boundaries, per unit area inside.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Densities {
    pub inlet: f64,
    pub outlet: f64,
    pub bottom_wall: f64,
    pub obstacle: f64,
    pub wake: f64,
    pub interior: f64,
    pub neighbourhood: f64,
}

impl Default for Densities {
    fn default() -> Self {
        Self {
            inlet: 250.0,
            outlet: 500.0,
            bottom_wall: 250.0,
            obstacle: 500.0,
            wake: 500.0,
            interior: 2000.0,
            neighbourhood: 2000.0,
        }
    }
}

/// Parametric potential flow past a flat plate in a square box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowConfig {
    pub obstacle_length: f64,   // plate length L
    pub box_lengths: f64,       // box side in units of L
    pub wake_lengths: f64,      // wake line length in units of L
    pub free_stream_speed: f64, // |U|, same units as u and v
    pub alpha_max_deg: f64,     // angle of attack in [-max, max] degrees
    pub policy: ParameterPolicy,
    pub line_weight: f64, // loss weight on the plate and wake lines
    pub densities: Densities,
    pub inference_points: usize,
    pub inference_alpha: f64, // radians
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            obstacle_length: 0.10,
            box_lengths: 6.0,
            wake_lengths: 3.0,
            free_stream_speed: 10.0,
            alpha_max_deg: 10.0,
            policy: ParameterPolicy::PerStep,
            line_weight: 100.0,
            densities: Densities::default(),
            inference_points: 1_000_000,
            inference_alpha: 0.0,
        }
    }
}

impl FlowConfig {
    pub const ALPHA: &'static str = "alpha";

    /// Reads a JSON file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SolverError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SolverError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        let positive = [
            ("obstacle_length", self.obstacle_length),
            ("box_lengths", self.box_lengths),
            ("wake_lengths", self.wake_lengths),
            ("line_weight", self.line_weight),
        ];
        if let Some((name, value)) = positive
            .iter()
            .find(|(_, v)| !(v.is_finite() && *v > 0.0))
        {
            return Err(SolverError::InvalidConfig(format!(
                "{name} must be positive, got {value}"
            )));
        }
        if !self.free_stream_speed.is_finite() {
            return Err(SolverError::InvalidConfig(
                "free_stream_speed must be finite".into(),
            ));
        }
        if !(self.alpha_max_deg.is_finite() && (0.0..90.0).contains(&self.alpha_max_deg)) {
            return Err(SolverError::InvalidConfig(format!(
                "alpha_max_deg must lie in [0, 90), got {}",
                self.alpha_max_deg
            )));
        }
        if self.inference_points == 0 {
            return Err(SolverError::InvalidConfig(
                "inference_points must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.box_lengths * self.obstacle_length
    }

    pub fn height(&self) -> f64 {
        self.box_lengths * self.obstacle_length
    }

    pub fn wake_length(&self) -> f64 {
        self.wake_lengths * self.obstacle_length
    }

    pub fn alpha(&self) -> Symbol {
        Symbol::from(Self::ALPHA)
    }

    /// `alpha ∈ [-alpha_max, alpha_max]` in radians.
    pub fn alpha_range(&self) -> Result<ParameterRange, DomainError> {
        let max = self.alpha_max_deg.to_radians();
        ParameterRange::new(self.alpha(), -max, max)
    }

    pub fn ranges(&self) -> Result<ParameterRanges, DomainError> {
        ParameterRanges::new().with(self.alpha_range()?)
    }

    /// Symbolic free-stream velocity `(U cos α, U sin α)`.
    pub fn free_stream(&self) -> (Expr, Expr) {
        let alpha = Expr::from(self.alpha());
        (
            self.free_stream_speed * alpha.clone().cos(),
            self.free_stream_speed * alpha.sin(),
        )
    }

    /// Wake-line target for `v`: zero at the trailing edge, free-stream at the
    /// far end of the wake.
    pub fn wake_v(&self) -> Expr {
        let (_, v) = self.free_stream();
        v * (Expr::var("x") / self.wake_length())
    }

    /// Far-field outlet: the part of the boundary with `y/h + x/w ≥ 1/2`.
    pub fn outlet_criterion(&self) -> Criterion {
        Criterion::ge(
            Expr::var("y") / self.height() + Expr::var("x") / self.width(),
            0.5,
        )
    }

    pub fn inlet_criterion(&self) -> Criterion {
        Criterion::equals(Expr::var("x"), -self.width() / 2.0)
    }

    pub fn bottom_wall_criterion(&self) -> Criterion {
        Criterion::equals(Expr::var("y"), -self.height() / 2.0)
    }

    /// Clip box of the refined region around the plate.
    pub fn neighbourhood(&self) -> Aabb {
        let h = self.height();
        Aabb::from_bounds((-h / 3.0, h / 3.0), (-h / 8.0, h / 8.0))
    }
}

/// Numeric free-stream velocity for a given speed and angle.
pub fn free_stream_components(speed: f64, alpha: f64) -> (f64, f64) {
    (speed * alpha.cos(), speed * alpha.sin())
}

/// The box, the plate and its wake.
#[derive(Clone, Debug)]
pub struct FlowGeometry {
    pub rect: Rectangle,
    pub obstacle: Line,
    pub wake: Line,
}

impl FlowGeometry {
    pub fn new(config: &FlowConfig) -> Result<Self, GeometryError> {
        let (w, h, l) = (config.width(), config.height(), config.obstacle_length);
        let quarter = std::f64::consts::FRAC_PI_2;

        let rect = Rectangle::new((-w / 2.0, -h / 2.0), (w / 2.0, h / 2.0))?;
        // vertical lines laid flat: the plate spans [-L, 0], the wake [0, wake]
        let obstacle = Line::new((0.0, 0.0), (0.0, l), 1.0)?.rotate(quarter);
        let wake = Line::new((0.0, -config.wake_length()), (0.0, 0.0), 1.0)?.rotate(quarter);

        Ok(Self {
            rect,
            obstacle,
            wake,
        })
    }

    pub fn bounds(&self) -> Aabb {
        self.rect.bounding_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::Bindings;
    use approx::assert_abs_diff_eq;
    use glam::DVec2;
    use std::f64::consts::PI;

    #[test]
    fn free_stream_at_reference_angles() {
        let (u, v) = free_stream_components(10.0, 0.0);
        assert_eq!((u, v), (10.0, 0.0));

        let (u, v) = free_stream_components(10.0, PI / 18.0);
        assert_abs_diff_eq!(u, 9.8481, epsilon = 1e-4);
        assert_abs_diff_eq!(v, 1.7365, epsilon = 1e-4);

        let config = FlowConfig::default();
        let (su, sv) = config.free_stream();
        let ctx = Bindings::new().with("alpha", PI / 18.0);
        assert_abs_diff_eq!(su.eval::<f64, _>(&ctx).unwrap(), u, epsilon = 1e-12);
        assert_abs_diff_eq!(sv.eval::<f64, _>(&ctx).unwrap(), v, epsilon = 1e-12);
    }

    #[test]
    fn outlet_selects_upper_right() {
        let config = FlowConfig::default();
        let (w, h) = (config.width(), config.height());
        let outlet = config.outlet_criterion();
        let at = |x: f64, y: f64| Bindings::new().with("x", x).with("y", y);
        assert!(outlet.evaluate(&at(w / 2.0, h / 2.0)).unwrap());
        assert!(!outlet.evaluate(&at(-w / 2.0, -h / 2.0)).unwrap());
    }

    #[test]
    fn geometry_matches_layout() {
        let config = FlowConfig::default();
        let geo = FlowGeometry::new(&config).unwrap();

        let (a, b) = geo.obstacle.endpoints();
        assert_abs_diff_eq!(a.distance(DVec2::ZERO), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(b.distance(DVec2::new(-0.10, 0.0)), 0.0, epsilon = 1e-9);

        let (a, b) = geo.wake.endpoints();
        assert_abs_diff_eq!(a.distance(DVec2::new(0.30, 0.0)), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(b.distance(DVec2::ZERO), 0.0, epsilon = 1e-9);

        assert_eq!(geo.bounds(), Aabb::from_bounds((-0.3, 0.3), (-0.3, 0.3)));
    }

    #[test]
    fn wake_target_runs_from_zero_to_free_stream() {
        let config = FlowConfig::default();
        let alpha = 0.1;
        let v = config.wake_v();
        let at = |x: f64| Bindings::new().with("x", x).with("alpha", alpha);
        assert_abs_diff_eq!(v.eval::<f64, _>(&at(0.0)).unwrap(), 0.0);
        assert_abs_diff_eq!(
            v.eval::<f64, _>(&at(0.3)).unwrap(),
            10.0 * alpha.sin(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn json_round_trip_and_partial_files() {
        let config = FlowConfig {
            policy: ParameterPolicy::PerBatch,
            ..FlowConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: FlowConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);

        let partial: FlowConfig =
            serde_json::from_str(r#"{"alpha_max_deg": 5.0, "densities": {"inlet": 100.0}}"#)
                .unwrap();
        assert_eq!(partial.alpha_max_deg, 5.0);
        assert_eq!(partial.densities.inlet, 100.0);
        assert_eq!(partial.densities.outlet, 500.0);
    }

    #[test]
    fn validation_rejects_nonsense() {
        let bad = FlowConfig {
            obstacle_length: 0.0,
            ..FlowConfig::default()
        };
        assert!(matches!(bad.validate(), Err(SolverError::InvalidConfig(_))));
        let steep = FlowConfig {
            alpha_max_deg: 120.0,
            ..FlowConfig::default()
        };
        assert!(steep.validate().is_err());
        FlowConfig::default().validate().unwrap();
    }
}
