//! # Core Models Module
//!
//! Data structures used to represent polymer molecules in polyflow.
//!
//! ## Key Components
//!
//! - [`element`] - Chemical elements with masses, atomic numbers, and covalent radii
//! - [`atom`] - Individual atom representation with coordinates, element, and charges
//! - [`residue`] - Residue instances (one occurrence of a monomer template)
//! - [`structure`] - Complete molecule with atoms, bonds, residues, and periodic box
//! - [`topology`] - Bond connectivity and bond orders
//! - [`ids`] - Stable identifier types
//!
//! ## Usage
//!
//! ```ignore
//! use polyflow::core::models::{structure::Structure, atom::Atom, element::Element};
//!
//! let mut mol = Structure::new("ethanol");
//! let c1 = mol.add_atom(Atom::new("C1", Element::C, Point3::origin()));
//! let c2 = mol.add_atom(Atom::new("C2", Element::C, Point3::new(1.54, 0.0, 0.0)));
//! mol.add_bond(c1, c2, BondOrder::Single)?;
//! ```

pub mod atom;
pub mod element;
pub mod ids;
pub mod residue;
pub mod structure;
pub mod topology;
