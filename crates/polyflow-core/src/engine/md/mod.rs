//! Molecular dynamics: parameter sets, simulation state, the force evaluation
//! and the Langevin engine that drives schedule steps.

pub mod barostat;
pub mod engine;
pub mod error;
pub mod forces;
pub mod langevin;
pub mod parameters;
pub mod reporters;
pub mod state;
pub mod system;

pub use engine::{SimulationEngine, StepDiagnostics, StepOutput};
pub use error::SimulationError;
pub use langevin::LangevinEngine;
pub use parameters::{Ensemble, SimulationParameters};
pub use state::{Checkpoint, SimulationState};
