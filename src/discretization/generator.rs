use glam::DVec2;
use rand::Rng;

use super::{Aabb, BoundarySample, Geometry, GeometryError};

/// Rejection attempts allowed per requested point.
pub const ATTEMPTS_PER_POINT: usize = 1000;

/// Boundary midpoints used when measuring a boundary selection.
pub const BOUNDARY_RESOLUTION: usize = 4096;

/// Grid cells per axis used when measuring an interior selection.
pub const INTERIOR_RESOLUTION: usize = 256;

/// Cell-centred grid of `nx × ny` points covering `bounds`.
pub fn midpoint_grid(bounds: &Aabb, nx: usize, ny: usize) -> Vec<DVec2> {
    let mut points = Vec::with_capacity(nx * ny);
    let size = bounds.size();
    let dx = size.x / nx as f64;
    let dy = size.y / ny as f64;

    for j in 0..ny {
        for i in 0..nx {
            let x = bounds.min.x + (i as f64 + 0.5) * dx;
            let y = bounds.min.y + (j as f64 + 0.5) * dy;
            points.push(DVec2::new(x, y));
        }
    }

    points
}

/// Region the interior sampler draws from: the primitive's bounding box,
/// optionally clipped.
pub fn interior_window<G: Geometry + ?Sized>(
    geom: &G,
    clip: Option<&Aabb>,
) -> Result<Aabb, GeometryError> {
    if !geom.has_interior() {
        return Err(GeometryError::NoInterior(geom.kind()));
    }
    let bbox = geom.bounding_box();
    match clip {
        Some(clip) => bbox
            .intersect(clip)
            .ok_or(GeometryError::Disjoint(geom.kind())),
        None => Ok(bbox),
    }
}

pub fn sample_boundary<G, R>(
    geom: &G,
    rng: &mut R,
    n: usize,
) -> Result<Vec<BoundarySample>, GeometryError>
where
    G: Geometry + ?Sized,
    R: Rng + ?Sized,
{
    sample_boundary_where(geom, rng, n, |_, _| Ok::<_, GeometryError>(true))
}

pub fn sample_interior<G, R>(
    geom: &G,
    clip: Option<&Aabb>,
    rng: &mut R,
    n: usize,
) -> Result<Vec<DVec2>, GeometryError>
where
    G: Geometry + ?Sized,
    R: Rng + ?Sized,
{
    sample_interior_where(geom, clip, rng, n, |_, _| Ok::<_, GeometryError>(true))
}

/// Draws `n` boundary points uniformly in arc length, keeping only those
/// `accept` agrees with. `accept` gets the generator back so it can draw
/// per-point data of its own.
pub fn sample_boundary_where<G, R, E, F>(
    geom: &G,
    rng: &mut R,
    n: usize,
    mut accept: F,
) -> Result<Vec<BoundarySample>, E>
where
    G: Geometry + ?Sized,
    R: Rng + ?Sized,
    E: From<GeometryError>,
    F: FnMut(&BoundarySample, &mut R) -> Result<bool, E>,
{
    if n == 0 {
        return Err(GeometryError::EmptyRequest.into());
    }
    let budget = n * ATTEMPTS_PER_POINT;
    let mut out = Vec::with_capacity(n);

    for _ in 0..budget {
        let sample = geom.boundary_point(rng.gen::<f64>());
        if accept(&sample, rng)? {
            out.push(sample);
            if out.len() == n {
                return Ok(out);
            }
        }
    }

    Err(GeometryError::SamplingBudget {
        accepted: out.len(),
        requested: n,
        attempts: budget,
    }
    .into())
}

/// Draws `n` points uniformly over the interior of `geom` clipped to `clip`,
/// keeping only those `accept` agrees with.
pub fn sample_interior_where<G, R, E, F>(
    geom: &G,
    clip: Option<&Aabb>,
    rng: &mut R,
    n: usize,
    mut accept: F,
) -> Result<Vec<DVec2>, E>
where
    G: Geometry + ?Sized,
    R: Rng + ?Sized,
    E: From<GeometryError>,
    F: FnMut(DVec2, &mut R) -> Result<bool, E>,
{
    if n == 0 {
        return Err(GeometryError::EmptyRequest.into());
    }
    let window = interior_window(geom, clip)?;
    let budget = n * ATTEMPTS_PER_POINT;
    let mut out = Vec::with_capacity(n);

    for _ in 0..budget {
        let p = DVec2::new(
            rng.gen_range(window.min.x..window.max.x),
            rng.gen_range(window.min.y..window.max.y),
        );
        if geom.contains(p) && accept(p, rng)? {
            out.push(p);
            if out.len() == n {
                return Ok(out);
            }
        }
    }

    Err(GeometryError::SamplingBudget {
        accepted: out.len(),
        requested: n,
        attempts: budget,
    }
    .into())
}

/// Length of the part of the boundary selected by `select`, by the midpoint
/// rule in arc length.
pub fn boundary_measure_where<G, E, F>(geom: &G, resolution: usize, mut select: F) -> Result<f64, E>
where
    G: Geometry + ?Sized,
    F: FnMut(&BoundarySample) -> Result<bool, E>,
{
    let mut hits = 0usize;
    for i in 0..resolution {
        let s = (i as f64 + 0.5) / resolution as f64;
        if select(&geom.boundary_point(s))? {
            hits += 1;
        }
    }
    Ok(geom.boundary_measure() * hits as f64 / resolution as f64)
}

/// Area of the interior of `geom` inside `clip` selected by `select`, by the
/// midpoint rule on a regular grid.
pub fn interior_measure_where<G, E, F>(
    geom: &G,
    clip: Option<&Aabb>,
    resolution: usize,
    mut select: F,
) -> Result<f64, E>
where
    G: Geometry + ?Sized,
    E: From<GeometryError>,
    F: FnMut(DVec2) -> Result<bool, E>,
{
    let window = interior_window(geom, clip)?;
    let mut hits = 0usize;
    for p in midpoint_grid(&window, resolution, resolution) {
        if geom.contains(p) && select(p)? {
            hits += 1;
        }
    }
    let cells = (resolution * resolution) as f64;
    Ok(window.area() * hits as f64 / cells)
}
