use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::subdomain::COORDINATES;
use crate::domain::{Domain, DomainError, InferenceDomain};
use crate::physics::{ExprError, PdeSystem, Symbol};

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("network `{net}` takes {found:?} but {field} depends on {expected:?}")]
    InputMismatch {
        net: String,
        field: Symbol,
        expected: Vec<Symbol>,
        found: Vec<Symbol>,
    },
    #[error("no network outputs the field {0}")]
    MissingOutput(Symbol),
    #[error("network `{0}` is declared twice")]
    DuplicateNetwork(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration overrides must be a JSON object")]
    NotAnObject,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("`{set}` targets `{target}`, which the equations do not produce")]
    UnknownTarget { set: String, target: String },
    #[error("inference set `{set}` leaves the input {symbol} unset")]
    UnboundInput { set: String, symbol: Symbol },
}

/// Signature of a learned function: named inputs to named outputs.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkSpec {
    pub name: String,
    pub inputs: Vec<Symbol>,
    pub outputs: Vec<Symbol>,
}

impl NetworkSpec {
    pub fn new<I, O>(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = I>,
        outputs: impl IntoIterator<Item = O>,
    ) -> Self
    where
        I: Into<Symbol>,
        O: Into<Symbol>,
    {
        Self {
            name: name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn input_index(&self, symbol: &Symbol) -> Option<usize> {
        self.inputs.iter().position(|s| s == symbol)
    }

    pub fn output_index(&self, symbol: &Symbol) -> Option<usize> {
        self.outputs.iter().position(|s| s == symbol)
    }
}

/// Builds concrete networks from their signatures. Lives outside this crate.
pub trait ArchFactory {
    type Net;

    fn make_node(&self, spec: &NetworkSpec) -> Self::Net;
}

/// Hyperparameters handed to the training controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub network_dir: String,
    pub max_steps: u64,
    pub decay_steps: u64,
    pub decay_rate: f64,
    pub start_lr: f64,
    pub layer_size: usize,
    pub nr_layers: usize,
    pub save_network_freq: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            network_dir: "./checkpoints".to_string(),
            max_steps: 10_000,
            decay_steps: 1000,
            decay_rate: 0.95,
            start_lr: 1e-3,
            layer_size: 512,
            nr_layers: 6,
            save_network_freq: 1000,
        }
    }
}

impl TrainingConfig {
    /// Overwrites the fields present in `overrides`, a flat JSON object.
    pub fn apply_overrides(&mut self, overrides: Value) -> Result<(), SolverError> {
        let Value::Object(overrides) = overrides else {
            return Err(SolverError::NotAnObject);
        };
        let mut current = serde_json::to_value(&*self)?;
        if let Value::Object(fields) = &mut current {
            for (key, value) in overrides {
                log::debug!("training override {key} = {value}");
                fields.insert(key, value);
            }
        }
        *self = serde_json::from_value(current)?;
        Ok(())
    }

    /// Reads overrides from a JSON file.
    pub fn apply_file(&mut self, path: impl AsRef<Path>) -> Result<(), SolverError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SolverError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply_overrides(serde_json::from_str(&text)?)
    }
}

/// Attaches an equation system and its learned functions to a problem.
pub trait SolverBinding {
    type System: PdeSystem;
    type Config;

    fn equations(&self) -> &Self::System;

    fn nets(&self) -> &[NetworkSpec];

    fn train_domain(&self, config: &Self::Config) -> Result<Domain, SolverError>;

    fn inference_domain(&self, config: &Self::Config) -> Result<InferenceDomain, SolverError>;

    /// Sets the problem's default hyperparameters, leaving the others alone.
    fn update_defaults(&self, config: &mut TrainingConfig);

    /// Builds one network per declared signature.
    fn make_nets<A: ArchFactory>(&self, arch: &A) -> Vec<A::Net> {
        self.nets()
            .iter()
            .map(|spec| {
                log::debug!("building network `{}`", spec.name);
                arch.make_node(spec)
            })
            .collect()
    }
}

fn check_target<S: PdeSystem + ?Sized>(
    system: &S,
    set: &str,
    target: &str,
) -> Result<(), SolverError> {
    if system.equations().contains(target) || system.field().name().as_str() == target {
        Ok(())
    } else {
        Err(SolverError::UnknownTarget {
            set: set.to_string(),
            target: target.to_string(),
        })
    }
}

/// Every sub-domain target must name an equation or the field itself.
pub fn validate_train_domain<S: PdeSystem + ?Sized>(
    system: &S,
    domain: &Domain,
) -> Result<(), SolverError> {
    for (name, sub) in domain.iter() {
        for (target, _, _) in sub.targets() {
            check_target(system, name, target)?;
        }
    }
    Ok(())
}

/// Inference outputs must be known, and every non-coordinate input of the
/// field needs a fixed value.
pub fn validate_inference_domain<S: PdeSystem + ?Sized>(
    system: &S,
    domain: &InferenceDomain,
) -> Result<(), SolverError> {
    for (name, spec) in domain.iter() {
        for output in spec.output_names() {
            check_target(system, name, output)?;
        }
        let unbound = system.field().args().iter().find(|s| {
            !COORDINATES.contains(&s.as_str()) && spec.parameters().get(s).is_none()
        });
        if let Some(symbol) = unbound {
            return Err(SolverError::UnboundInput {
                set: name.to_string(),
                symbol: symbol.clone(),
            });
        }
    }
    Ok(())
}

/// Every network must take exactly the field's independent variables, and
/// at least one must output the field.
pub fn validate_binding<S: PdeSystem + ?Sized>(
    system: &S,
    nets: &[NetworkSpec],
) -> Result<(), SolverError> {
    let field = system.field();
    let mut expected = field.args().to_vec();
    expected.sort();

    for (i, net) in nets.iter().enumerate() {
        if nets[..i].iter().any(|n| n.name == net.name) {
            return Err(SolverError::DuplicateNetwork(net.name.clone()));
        }
        let mut found = net.inputs.clone();
        found.sort();
        if found != expected {
            return Err(SolverError::InputMismatch {
                net: net.name.clone(),
                field: field.name().clone(),
                expected: field.args().to_vec(),
                found: net.inputs.clone(),
            });
        }
    }

    if !nets.iter().any(|n| n.output_index(field.name()).is_some()) {
        return Err(SolverError::MissingOutput(field.name().clone()));
    }
    Ok(())
}
