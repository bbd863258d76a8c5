//! # Engine Module
//!
//! Stateful machinery sitting between the stateless `core` algorithms and the
//! public `workflows`.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Builders for the RCT protocol and report locations
//! - **Charge Strategies** ([`charger`]) - The closed set of charge methods behind [`charger::MolCharger`]
//! - **Molecular Dynamics** ([`md`]) - Parameters, state, force evaluation and the Langevin engine
//! - **Solvation** ([`solvent`]) - Water packing around a solute
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - The aggregated [`error::EngineError`]

pub mod charger;
pub mod config;
pub mod error;
pub mod md;
pub mod progress;
pub mod solvent;

pub(crate) fn io_error(path: &std::path::Path, source: std::io::Error) -> error::EngineError {
    error::EngineError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}
