//! Provides input/output functionality for molecular file formats.
//!
//! PDB is the interchange format for raw and built structures (with CONECT
//! connectivity and multi-model trajectories); BGF is the annotated format
//! carrying residue assignments and partial charges. Both implement the
//! [`traits::MolecularFile`] interface.

pub mod bgf;
pub mod pdb;
pub mod traits;
