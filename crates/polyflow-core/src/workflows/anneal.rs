use crate::core::models::structure::Structure;
use crate::engine::config::ReportingConfig;
use crate::engine::error::EngineError;
use crate::engine::md::engine::{SimulationEngine, StepDiagnostics};
use crate::engine::md::parameters::SimulationParameters;
use crate::engine::md::state::SimulationState;
use crate::engine::progress::ProgressReporter;
use crate::workflows::schedule::{SimulationSchedule, StepResult, run_simulation_schedule};
use tracing::{info, instrument};

pub const DEFAULT_STEP_NAME: &str = "anneal";

#[derive(Debug, Clone)]
pub struct AnnealOutcome {
    /// A copy of the input molecule carrying the annealed coordinates.
    pub molecule: Structure,
    pub diagnostics: StepDiagnostics,
}

/// Anneals a single molecule in vacuum with a one-step schedule.
#[instrument(skip_all, name = "anneal_workflow", fields(molecule = %molecule.name))]
pub fn run(
    engine: &dyn SimulationEngine,
    molecule: &Structure,
    params: &SimulationParameters,
    step_name: Option<&str>,
    reporting: &ReportingConfig,
    reporter: &ProgressReporter,
) -> Result<AnnealOutcome, EngineError> {
    let components = molecule.connected_components().len();
    if components != 1 {
        return Err(EngineError::NotSingleMolecule { components });
    }
    let step_name = step_name.unwrap_or(DEFAULT_STEP_NAME);
    let schedule = SimulationSchedule::new().with_step(step_name, params.clone())?;

    let history = run_simulation_schedule(
        engine,
        SimulationState::new(molecule.clone()),
        &schedule,
        reporting,
        reporter,
    );
    let record = history
        .into_records()
        .pop()
        .ok_or_else(|| EngineError::Internal("anneal schedule produced no record".to_string()))?;
    let output = match record.result {
        StepResult::Completed(output) => output,
        StepResult::Failed(e) => return Err(e.into()),
    };

    let mut annealed = molecule.clone();
    annealed
        .set_positions(&output.final_state.positions())
        .map_err(|e| EngineError::Internal(e.to_string()))?;
    info!(
        potential_energy = output.diagnostics.final_potential_energy,
        "Annealing finished"
    );
    Ok(AnnealOutcome {
        molecule: annealed,
        diagnostics: output.diagnostics,
    })
}
