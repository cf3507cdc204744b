//! Parametric potential flow past a flat plate at angle of attack α.

pub mod analytic;
pub mod domains;
pub mod flow;
pub mod solver;

pub use analytic::{FreeStreamArch, FreeStreamPotential};
pub use flow::{free_stream_components, Densities, FlowConfig, FlowGeometry};
pub use solver::PotentialSolver;
