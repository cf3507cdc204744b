pub mod autodiff;
pub mod solver;

pub use autodiff::{LearnedFunction, ResidualEvaluator};
pub use solver::{
    validate_binding, validate_inference_domain, validate_train_domain, ArchFactory, NetworkSpec,
    SolverBinding, SolverError, TrainingConfig,
};
