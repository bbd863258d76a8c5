//! # Force Field Module
//!
//! Classical force-field parameters and pair potentials used by the
//! molecular-dynamics engine.
//!
//! - [`params`] loads element-keyed Lennard-Jones parameters, global
//!   nonbonded settings and bonded force constants from TOML, and derives
//!   equilibrium bond lengths and angles from element data.
//! - [`potentials`] holds the energy/derivative kernels (12-6 Lennard-Jones,
//!   Coulomb, harmonic).

pub mod params;
pub mod potentials;
