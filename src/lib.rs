//! Problem definition for a physics-informed potential-flow solver: the
//! symbolic equations, the geometry, and the weighted point sets a training
//! loop consumes.

pub mod discretization;
pub mod domain;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;
