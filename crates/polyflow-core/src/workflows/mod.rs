//! # Workflows Module
//!
//! Public entry points that chain `core` algorithms and `engine` machinery into
//! the steps of a polymer simulation pipeline.
//!
//! - **Chemistry Assignment** ([`assign`]) - PDB to partitioned BGF
//! - **Charging** ([`charge`]) - Apply a named charge strategy to a BGF molecule
//! - **Residue Library Charges** ([`rct`]) - Build, partition, charge and reduce a reference chain
//! - **Simulation Schedules** ([`schedule`]) - Ordered, state-threaded MD steps
//! - **Annealing** ([`anneal`]) - Single-step vacuum anneal of one molecule
//! - **Solvation** ([`solvate`]) - Water box packing around a BGF molecule

pub mod anneal;
pub mod assign;
pub mod charge;
pub mod rct;
pub mod schedule;
pub mod solvate;
