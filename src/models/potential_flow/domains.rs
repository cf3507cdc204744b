use super::flow::{FlowConfig, FlowGeometry};
use crate::domain::{
    boundary_bc, interior_bc, BoundaryBc, Domain, DomainError, InferenceDomain, InferenceSpec,
    InteriorBc, Weight,
};
use crate::physics::poisson::Poisson2D;
use crate::physics::Expr;

pub const INLET: &str = "Inlet";
pub const OUTLET: &str = "Outlet";
pub const BOTTOM_WALL: &str = "BottomWall";
pub const OBSTACLE_LINE: &str = "obstacleLine";
pub const WAKE_LINE: &str = "wakeLine";
pub const INTERIOR: &str = "Interior";
pub const NEIGHBOURHOOD: &str = "Neighbourhood";
pub const INFERENCE: &str = "Inference";

/// The seven training sub-domains of the flat-plate problem.
pub fn train_domain(config: &FlowConfig, geo: &FlowGeometry) -> Result<Domain, DomainError> {
    let ranges = config.ranges()?;
    let (u_x, u_y) = config.free_stream();
    let d = &config.densities;
    let far_field = |density: f64| {
        BoundaryBc::new(density)
            .output("u", u_x.clone())
            .output("v", u_y.clone())
            .policy(config.policy)
    };

    let mut domain = Domain::new();

    // far field on the left, the bottom and the upper-right outflow
    domain.add(
        boundary_bc(
            geo.rect.clone(),
            far_field(d.inlet).criterion(config.inlet_criterion()),
            ranges.clone(),
        )?,
        INLET,
    )?;
    domain.add(
        boundary_bc(
            geo.rect.clone(),
            far_field(d.outlet).criterion(config.outlet_criterion()),
            ranges.clone(),
        )?,
        OUTLET,
    )?;
    domain.add(
        boundary_bc(
            geo.rect.clone(),
            far_field(d.bottom_wall).criterion(config.bottom_wall_criterion()),
            ranges.clone(),
        )?,
        BOTTOM_WALL,
    )?;

    // no penetration through the plate
    let obstacle = BoundaryBc::new(d.obstacle)
        .output("u", u_x.clone())
        .output("v", Expr::zero())
        .weight("u", config.line_weight)
        .weight("v", config.line_weight)
        .policy(config.policy);
    domain.add(
        boundary_bc(geo.obstacle.clone(), obstacle, ranges.clone())?,
        OBSTACLE_LINE,
    )?;

    // Kutta condition along the wake
    let wake = BoundaryBc::new(d.wake)
        .output("u", u_x)
        .output("v", config.wake_v())
        .weight("u", config.line_weight)
        .weight("v", config.line_weight)
        .policy(config.policy);
    domain.add(boundary_bc(geo.wake.clone(), wake, ranges.clone())?, WAKE_LINE)?;

    let laplace = |density: f64| {
        InteriorBc::new(density)
            .residual(Poisson2D::NAME, Expr::zero())
            .weight(Poisson2D::NAME, Weight::BoundaryDistance)
            .policy(config.policy)
    };
    domain.add(
        interior_bc(
            geo.rect.clone(),
            laplace(d.interior).bounds(geo.bounds()),
            ranges.clone(),
        )?,
        INTERIOR,
    )?;
    domain.add(
        interior_bc(
            geo.rect.clone(),
            laplace(d.neighbourhood).bounds(config.neighbourhood()),
            ranges,
        )?,
        NEIGHBOURHOOD,
    )?;

    log::info!(
        "potential-flow training domain: {} sub-domains, {} points per step",
        domain.len(),
        domain.points_per_step()
    );
    Ok(domain)
}

/// Velocity and potential over the whole box at a fixed angle of attack.
pub fn inference_domain(
    config: &FlowConfig,
    geo: &FlowGeometry,
) -> Result<InferenceDomain, DomainError> {
    let spec = InferenceSpec::new(geo.rect.clone(), config.inference_points)
        .bounds(geo.bounds())
        .parameter(config.alpha(), config.inference_alpha)
        .outputs(["u", "v", Poisson2D::FIELD]);
    let mut domain = InferenceDomain::new();
    domain.add(spec, INFERENCE)?;
    Ok(domain)
}
