use thiserror::Error;

use super::config::ConfigError;
use super::md::error::SimulationError;
use super::solvent::SolventError;
use crate::core::charges::ChargeError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::io::bgf::BgfError;
use crate::core::io::pdb::PdbError;
use crate::core::monomers::group::MonomerLoadError;
use crate::core::polymers::error::MorphologyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Polymer morphology error: {source}")]
    Morphology {
        #[from]
        source: MorphologyError,
    },

    #[error("Could not partition '{molecule}' into residues of the monomer group")]
    PartitionFailure { molecule: String },

    #[error("Charge assignment failed: {0}")]
    Charge(ChargeError),

    #[error("Missing resource: {0}")]
    MissingResource(String),

    #[error("Simulation failed: {source}")]
    Simulation {
        #[from]
        source: SimulationError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Solvation failed: {source}")]
    Solvent {
        #[from]
        source: SolventError,
    },

    #[error("Failed to load monomers: {source}")]
    MonomerLoad {
        #[from]
        source: MonomerLoadError,
    },

    #[error("Failed to load parameters: {source}")]
    Params {
        #[from]
        source: ParamLoadError,
    },

    #[error("PDB error: {source}")]
    Pdb {
        #[from]
        source: PdbError,
    },

    #[error("BGF error: {source}")]
    Bgf {
        #[from]
        source: BgfError,
    },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Expected a single molecule but found {components} connected components")]
    NotSingleMolecule { components: usize },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<ChargeError> for EngineError {
    fn from(e: ChargeError) -> Self {
        match e {
            ChargeError::MissingLibraryEntry { residue, atom } => EngineError::MissingResource(
                format!("residue library has no charge for atom '{atom}' of residue '{residue}'"),
            ),
            other => EngineError::Charge(other),
        }
    }
}
