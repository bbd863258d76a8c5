//! # Core Module
//!
//! Stateless building blocks of polyflow: molecular data models, file formats,
//! monomer templates, polymer construction, substructure partitioning, charge
//! algorithms and force-field parameters.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds, residues and the
//!   [`Structure`](models::structure::Structure) container
//! - **File I/O** ([`io`]) - PDB and BGF readers/writers
//! - **Monomer Registry** ([`monomers`]) - Substructure templates and monomer groups
//! - **Polymer Construction** ([`polymers`]) - Degree-of-polymerization estimation
//!   and linear chain building
//! - **Partitioning** ([`partition`]) - Exact cover of a structure by monomer templates
//! - **Charges** ([`charges`]) - Gasteiger and QEq charges, residue library charges
//!   and their reduction from a charged reference chain
//! - **Force Field** ([`forcefield`]) - Classical parameters and pair potentials

pub mod charges;
pub mod forcefield;
pub mod io;
pub mod models;
pub mod monomers;
pub mod partition;
pub mod polymers;
