use super::config::{ChargerConfig, ConfigError};
use super::error::EngineError;
use crate::core::charges::ChargeError;
use crate::core::charges::charge_set::ChargeSet;
use crate::core::charges::gasteiger::gasteiger_charges;
use crate::core::charges::library::ChargesByResidue;
use crate::core::charges::qeq::qeq_charges;
use crate::core::models::structure::Structure;
use cheq::SolverOptions;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The closed set of charge strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargerKind {
    /// Gasteiger-Marsili empirical charges.
    Gasteiger,
    /// Charge equilibration.
    Qeq,
    /// Residue library lookup.
    Rct,
}

impl ChargerKind {
    pub const ALL: [ChargerKind; 3] = [ChargerKind::Gasteiger, ChargerKind::Qeq, ChargerKind::Rct];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gasteiger => "gasteiger",
            Self::Qeq => "qeq",
            Self::Rct => "rct",
        }
    }

    /// Direct strategies compute charges from the whole molecule and do not
    /// need a residue partition.
    pub fn is_direct(&self) -> bool {
        !matches!(self, Self::Rct)
    }
}

impl FromStr for ChargerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == lowered)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

impl fmt::Display for ChargerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A partial charge strategy applied to a whole molecule.
pub trait MolCharger: Send + Sync {
    fn kind(&self) -> ChargerKind;

    fn charge_molecule(&self, structure: &Structure) -> Result<ChargeSet, ChargeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GasteigerCharger;

impl MolCharger for GasteigerCharger {
    fn kind(&self) -> ChargerKind {
        ChargerKind::Gasteiger
    }

    fn charge_molecule(&self, structure: &Structure) -> Result<ChargeSet, ChargeError> {
        gasteiger_charges(structure)
    }
}

#[derive(Debug, Default, Clone)]
pub struct QeqCharger {
    options: SolverOptions,
}

impl QeqCharger {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

impl MolCharger for QeqCharger {
    fn kind(&self) -> ChargerKind {
        ChargerKind::Qeq
    }

    fn charge_molecule(&self, structure: &Structure) -> Result<ChargeSet, ChargeError> {
        qeq_charges(structure, self.options)
    }
}

/// Assigns charges from a residue library by (residue template, atom name).
#[derive(Debug, Clone)]
pub struct RctCharger {
    library: ChargesByResidue,
    source: PathBuf,
}

impl RctCharger {
    pub fn new(library: ChargesByResidue, source: PathBuf) -> Self {
        Self { library, source }
    }

    /// Loads the library file, failing with `MissingResource` when it does not exist.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        if !path.is_file() {
            return Err(EngineError::MissingResource(format!(
                "residue charge library '{}' does not exist",
                path.display()
            )));
        }
        let library = ChargesByResidue::load(path)?;
        Ok(Self::new(library, path.to_path_buf()))
    }

    pub fn library(&self) -> &ChargesByResidue {
        &self.library
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl MolCharger for RctCharger {
    fn kind(&self) -> ChargerKind {
        ChargerKind::Rct
    }

    fn charge_molecule(&self, structure: &Structure) -> Result<ChargeSet, ChargeError> {
        self.library.charges_for(structure)
    }
}

/// Instantiates the strategy described by `config`.
pub fn make_charger(config: &ChargerConfig) -> Result<Box<dyn MolCharger>, EngineError> {
    Ok(match config.kind {
        ChargerKind::Gasteiger => Box::new(GasteigerCharger),
        ChargerKind::Qeq => Box::new(QeqCharger::new(config.qeq_options)),
        ChargerKind::Rct => {
            let path = config
                .library_path
                .as_deref()
                .ok_or(ConfigError::MissingParameter("library_path"))?;
            Box::new(RctCharger::from_path(path)?)
        }
    })
}
