use crate::core::forcefield::params::ParamLoadError;
use crate::core::io::pdb::PdbError;
use crate::engine::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Simulation diverged at step {step}: {reason}")]
    Divergence { step: u64, reason: String },

    #[error("Cannot simulate an empty system")]
    EmptySystem,

    #[error("State does not match the system: {0}")]
    StateMismatch(String),

    #[error("NPT simulation requires a periodic box")]
    NoPeriodicBox,

    #[error("Invalid simulation parameters: {0}")]
    InvalidParameters(#[from] ConfigError),

    #[error("Parameter file error: {0}")]
    Params(#[from] ParamLoadError),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("JSON error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("Trajectory error for '{path}': {source}")]
    Trajectory { path: String, source: PdbError },
}

impl SimulationError {
    pub fn is_divergence(&self) -> bool {
        matches!(self, Self::Divergence { .. })
    }
}
