//! Partial charge algorithms and residue library charges.
//!
//! Direct methods ([`gasteiger`], [`qeq`]) compute per-atom charges from the
//! whole molecule. Library charges ([`library`]) are looked up by residue
//! template and atom name, and are produced by [`reduce`] from a charged,
//! partitioned reference chain.

pub mod charge_set;
pub mod gasteiger;
pub mod library;
pub mod qeq;
pub mod reduce;

use crate::core::models::element::Element;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChargeError {
    #[error("Cannot charge an empty structure")]
    EmptyStructure,
    #[error("Charge vector has {actual} entries but the structure has {expected} atoms")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Charges sum to {actual:.6} but the declared net charge is {expected}")]
    NetChargeMismatch { expected: f64, actual: f64 },
    #[error("Non-finite charge computed for atom {0}")]
    NonFinite(usize),
    #[error("No Gasteiger parameters for element '{element}' ({hybridization})")]
    UnsupportedElement {
        element: Element,
        hybridization: &'static str,
    },
    #[error("QEq solver failed: {0}")]
    Qeq(#[from] cheq::CheqError),
    #[error("Atom {0} is not assigned to a residue; the structure must be partitioned")]
    UnassignedAtom(usize),
    #[error("Residue '{0}' has no template in the monomer group")]
    UnknownTemplate(String),
    #[error("Library has no charge for atom '{atom}' of residue '{residue}'")]
    MissingLibraryEntry { residue: String, atom: String },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}
