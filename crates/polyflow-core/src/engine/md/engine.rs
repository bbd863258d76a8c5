use super::error::SimulationError;
use super::parameters::SimulationParameters;
use super::state::SimulationState;
use crate::engine::config::ReportingConfig;
use crate::engine::progress::ProgressReporter;
use std::path::PathBuf;

/// Summary of one completed simulation step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepDiagnostics {
    pub steps: u64,
    pub simulated_time_ps: f64,
    pub final_potential_energy: f64,
    pub final_kinetic_energy: f64,
    pub mean_temperature_k: f64,
    /// Fraction of accepted volume moves; `None` outside NPT.
    pub barostat_acceptance: Option<f64>,
    pub samples: usize,
    /// Report files written for this step.
    pub reports: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StepOutput {
    pub final_state: SimulationState,
    pub diagnostics: StepDiagnostics,
}

/// A molecular-dynamics backend able to advance a state under a parameter set.
///
/// Implementations own their force field; the schedule hands them a state and
/// receives the advanced state back.
pub trait SimulationEngine: Send + Sync {
    fn name(&self) -> &str;

    fn run(
        &self,
        step_name: &str,
        state: SimulationState,
        params: &SimulationParameters,
        reporting: &ReportingConfig,
        progress: &ProgressReporter,
    ) -> Result<StepOutput, SimulationError>;
}
