//! # polyflow Core Library
//!
//! Building blocks for polymer molecular-simulation workflows: turning monomer
//! descriptions into chemically annotated structures, assigning partial charges,
//! deriving reusable residue library charges with the RCT protocol, and running
//! molecular-dynamics schedules.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`,
//!   `MonomerGroup`), file formats, polymer construction, partitioning and the
//!   charge and force-field mathematics.
//!
//! - **[`engine`]: The Logic Core.** Stateful machinery: configuration builders,
//!   the charge strategy registry, the Langevin molecular-dynamics engine with its
//!   reporters, and solvent packing.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built from the two
//!   layers below: chemistry assignment, molecule charging, the RCT protocol,
//!   simulation schedules, annealing and solvation.

pub mod core;
pub mod engine;
pub mod workflows;
