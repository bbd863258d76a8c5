use super::charger::ChargerKind;
use crate::core::monomers::group::TerminalOrientation;
use cheq::SolverOptions;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Unknown charge strategy '{0}' (expected one of: gasteiger, qeq, rct)")]
    UnknownStrategy(String),
    #[error("Invalid value for '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// How `max_chain_len` bounds the chain built by the RCT protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainLengthPolicy {
    /// `max_chain_len` is an atom budget for the reduced chain; the repeat count
    /// is estimated from it.
    #[default]
    Reduced,
    /// `max_chain_len` is used directly as the repeat count.
    Full,
}

#[derive(Debug, Clone)]
pub struct ChargerConfig {
    pub kind: ChargerKind,
    /// Residue library consulted by the `rct` strategy.
    pub library_path: Option<PathBuf>,
    pub qeq_options: SolverOptions,
}

impl ChargerConfig {
    /// Resolves a strategy name, rejecting unknown names and an `rct` strategy
    /// without a library path.
    pub fn from_name(name: &str, library_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let kind: ChargerKind = name.parse()?;
        if kind == ChargerKind::Rct && library_path.is_none() {
            return Err(ConfigError::MissingParameter("library_path"));
        }
        Ok(Self {
            kind,
            library_path,
            qeq_options: SolverOptions::default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RctConfig {
    pub charger: ChargerConfig,
    pub max_chain_len: usize,
    pub chain_length_policy: ChainLengthPolicy,
    /// Overrides the group's own terminal orientation when set.
    pub orientation: Option<TerminalOrientation>,
    /// Directory in which the reduced chain is written as PDB and reloaded.
    pub keep_intermediate: Option<PathBuf>,
}

#[derive(Default)]
pub struct RctConfigBuilder {
    charger_name: Option<String>,
    library_path: Option<PathBuf>,
    qeq_options: Option<SolverOptions>,
    max_chain_len: Option<usize>,
    chain_length_policy: Option<ChainLengthPolicy>,
    orientation: Option<TerminalOrientation>,
    keep_intermediate: Option<PathBuf>,
}

impl RctConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn charger(mut self, name: &str) -> Self {
        self.charger_name = Some(name.to_string());
        self
    }
    pub fn library_path(mut self, path: PathBuf) -> Self {
        self.library_path = Some(path);
        self
    }
    pub fn qeq_options(mut self, options: SolverOptions) -> Self {
        self.qeq_options = Some(options);
        self
    }
    pub fn max_chain_len(mut self, len: usize) -> Self {
        self.max_chain_len = Some(len);
        self
    }
    pub fn chain_length_policy(mut self, policy: ChainLengthPolicy) -> Self {
        self.chain_length_policy = Some(policy);
        self
    }
    pub fn orientation(mut self, orientation: TerminalOrientation) -> Self {
        self.orientation = Some(orientation);
        self
    }
    pub fn keep_intermediate(mut self, dir: PathBuf) -> Self {
        self.keep_intermediate = Some(dir);
        self
    }

    pub fn build(self) -> Result<RctConfig, ConfigError> {
        let name = self
            .charger_name
            .ok_or(ConfigError::MissingParameter("charger"))?;
        let mut charger = ChargerConfig::from_name(&name, self.library_path)?;
        if let Some(options) = self.qeq_options {
            charger.qeq_options = options;
        }
        let max_chain_len = self
            .max_chain_len
            .ok_or(ConfigError::MissingParameter("max_chain_len"))?;
        if max_chain_len == 0 {
            return Err(ConfigError::Invalid {
                name: "max_chain_len",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(RctConfig {
            charger,
            max_chain_len,
            chain_length_policy: self.chain_length_policy.unwrap_or_default(),
            orientation: self.orientation,
            keep_intermediate: self.keep_intermediate,
        })
    }
}

/// Where a simulation schedule writes its per-step reports.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportingConfig {
    /// Output directory; reports are skipped entirely when `None`.
    pub output_dir: Option<PathBuf>,
    /// Prefix for every report file name, typically the molecule name.
    pub prefix: String,
}

impl ReportingConfig {
    pub fn new(output_dir: PathBuf, prefix: &str) -> Self {
        Self {
            output_dir: Some(output_dir),
            prefix: prefix.to_string(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Directory used for the reports of one named step.
    pub fn step_dir(&self, step_name: &str) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| dir.join(step_name))
    }
}
