use crate::engine::config::{ConfigError, ReportingConfig};
use crate::engine::md::engine::{SimulationEngine, StepDiagnostics, StepOutput};
use crate::engine::md::error::SimulationError;
use crate::engine::md::parameters::SimulationParameters;
use crate::engine::md::state::SimulationState;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{error, info, instrument};

/// An ordered list of uniquely named simulation steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationSchedule {
    steps: Vec<(String, SimulationParameters)>,
}

impl SimulationSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step, rejecting empty and duplicate names.
    pub fn add_step(&mut self, name: &str, params: SimulationParameters) -> Result<(), ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "step",
                reason: "step names must not be empty".to_string(),
            });
        }
        if self.steps.iter().any(|(existing, _)| existing == name) {
            return Err(ConfigError::Invalid {
                name: "step",
                reason: format!("duplicate step name '{name}'"),
            });
        }
        self.steps.push((name.to_string(), params));
        Ok(())
    }

    pub fn with_step(mut self, name: &str, params: SimulationParameters) -> Result<Self, ConfigError> {
        self.add_step(name, params)?;
        Ok(self)
    }

    pub fn steps(&self) -> impl Iterator<Item = (&str, &SimulationParameters)> {
        self.steps.iter().map(|(name, params)| (name.as_str(), params))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug)]
pub enum StepResult {
    Completed(StepOutput),
    Failed(SimulationError),
}

#[derive(Debug)]
pub struct StepRecord {
    pub name: String,
    pub parameters: SimulationParameters,
    pub initial_state: SimulationState,
    pub result: StepResult,
}

impl StepRecord {
    pub fn succeeded(&self) -> bool {
        matches!(self.result, StepResult::Completed(_))
    }

    pub fn final_state(&self) -> Option<&SimulationState> {
        match &self.result {
            StepResult::Completed(output) => Some(&output.final_state),
            StepResult::Failed(_) => None,
        }
    }

    pub fn diagnostics(&self) -> Option<&StepDiagnostics> {
        match &self.result {
            StepResult::Completed(output) => Some(&output.diagnostics),
            StepResult::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SimulationError> {
        match &self.result {
            StepResult::Completed(_) => None,
            StepResult::Failed(e) => Some(e),
        }
    }
}

/// Per-step records of a schedule run, in execution order.
#[derive(Debug, Default)]
pub struct ScheduleHistory {
    records: Vec<StepRecord>,
}

impl ScheduleHistory {
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// The failed step, if the schedule stopped early.
    pub fn failure(&self) -> Option<&StepRecord> {
        self.records.iter().find(|r| !r.succeeded())
    }

    pub fn succeeded(&self) -> bool {
        self.failure().is_none()
    }

    /// State after the last successful step.
    pub fn final_state(&self) -> Option<&SimulationState> {
        self.records.iter().rev().find_map(StepRecord::final_state)
    }
}

/// Runs every step of `schedule` in order, threading the state from one step
/// into the next. The first failing step ends the run; its record holds the
/// error and earlier records are kept.
#[instrument(skip_all, name = "schedule_workflow", fields(steps = schedule.len()))]
pub fn run_simulation_schedule(
    engine: &dyn SimulationEngine,
    initial_state: SimulationState,
    schedule: &SimulationSchedule,
    reporting: &ReportingConfig,
    reporter: &ProgressReporter,
) -> ScheduleHistory {
    let mut history = ScheduleHistory::default();
    let mut state = initial_state;

    for (name, params) in schedule.steps() {
        reporter.phase_start(name);
        info!(step = name, engine = engine.name(), "Running simulation step");
        let initial = state.clone();
        let result = save_parameters(reporting, name, params)
            .and_then(|()| engine.run(name, state, params, reporting, reporter));
        reporter.report(Progress::PhaseFinish);

        match result {
            Ok(output) => {
                state = output.final_state.clone();
                history.records.push(StepRecord {
                    name: name.to_string(),
                    parameters: params.clone(),
                    initial_state: initial,
                    result: StepResult::Completed(output),
                });
            }
            Err(e) => {
                error!(step = name, error = %e, "Simulation step failed; stopping schedule");
                history.records.push(StepRecord {
                    name: name.to_string(),
                    parameters: params.clone(),
                    initial_state: initial,
                    result: StepResult::Failed(e),
                });
                break;
            }
        }
    }
    history
}

fn save_parameters(
    reporting: &ReportingConfig,
    step_name: &str,
    params: &SimulationParameters,
) -> Result<(), SimulationError> {
    let Some(dir) = reporting.step_dir(step_name) else {
        return Ok(());
    };
    std::fs::create_dir_all(&dir).map_err(|e| SimulationError::Io {
        path: dir.to_string_lossy().to_string(),
        source: e,
    })?;
    params.save(&dir.join(format!("{step_name}_params.toml")))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::structure::Structure;
    use nalgebra::{Point3, Vector3};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Shifts every atom by +1 Å in x per step and fails on request.
    #[derive(Default)]
    pub(crate) struct ShiftEngine {
        pub fail_on: Option<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl SimulationEngine for ShiftEngine {
        fn name(&self) -> &str {
            "shift"
        }

        fn run(
            &self,
            step_name: &str,
            mut state: SimulationState,
            params: &SimulationParameters,
            _reporting: &ReportingConfig,
            _progress: &ProgressReporter,
        ) -> Result<StepOutput, SimulationError> {
            self.calls.lock().unwrap().push(step_name.to_string());
            if self.fail_on.as_deref() == Some(step_name) {
                return Err(SimulationError::Divergence {
                    step: 3,
                    reason: "forced".to_string(),
                });
            }
            let shifted: Vec<_> = state
                .positions()
                .iter()
                .map(|p| p + Vector3::new(1.0, 0.0, 0.0))
                .collect();
            state.set_positions(&shifted)?;
            state.set_velocities(vec![Vector3::zeros(); state.atom_count()]);
            state.advance_time(params.integrator.total_time_ps);
            Ok(StepOutput {
                final_state: state,
                diagnostics: StepDiagnostics {
                    steps: params.total_steps(),
                    ..StepDiagnostics::default()
                },
            })
        }
    }

    pub(crate) fn single_atom() -> SimulationState {
        let mut s = Structure::new("atom");
        s.add_atom(Atom::new("C1", Element::C, Point3::origin()));
        SimulationState::new(s)
    }

    fn three_steps() -> SimulationSchedule {
        let preset = SimulationParameters::preset("production_lite").unwrap();
        SimulationSchedule::new()
            .with_step("anneal", preset.clone())
            .unwrap()
            .with_step("equilibrate", preset.clone())
            .unwrap()
            .with_step("produce", preset)
            .unwrap()
    }

    #[test]
    fn duplicate_and_empty_step_names_are_rejected() {
        let preset = SimulationParameters::preset("anneal").unwrap();
        let mut schedule = SimulationSchedule::new();
        schedule.add_step("anneal", preset.clone()).unwrap();
        assert!(schedule.add_step("anneal", preset.clone()).is_err());
        assert!(schedule.add_step("  ", preset).is_err());
        assert_eq!(schedule.len(), 1);
    }

    #[test]
    fn steps_run_in_order_and_thread_state() {
        let engine = ShiftEngine::default();
        let history = run_simulation_schedule(
            &engine,
            single_atom(),
            &three_steps(),
            &ReportingConfig::disabled(),
            &ProgressReporter::new(),
        );

        assert!(history.succeeded());
        assert_eq!(*engine.calls.lock().unwrap(), vec!["anneal", "equilibrate", "produce"]);
        let records = history.records();
        for pair in records.windows(2) {
            let prev_final = pair[0].final_state().unwrap();
            assert_eq!(pair[1].initial_state.positions(), prev_final.positions());
            assert_eq!(pair[1].initial_state.time_ps(), prev_final.time_ps());
        }
        assert_eq!(history.final_state().unwrap().positions()[0].x, 3.0);
        assert!(records[1].initial_state.velocities().is_some());
    }

    #[test]
    fn failure_stops_the_schedule_and_keeps_prior_records() {
        let engine = ShiftEngine {
            fail_on: Some("equilibrate".to_string()),
            ..ShiftEngine::default()
        };
        let history = run_simulation_schedule(
            &engine,
            single_atom(),
            &three_steps(),
            &ReportingConfig::disabled(),
            &ProgressReporter::new(),
        );

        assert_eq!(history.len(), 2);
        assert!(history.records()[0].succeeded());
        let failed = history.failure().unwrap();
        assert_eq!(failed.name, "equilibrate");
        assert!(failed.error().unwrap().is_divergence());
        assert!(history.get("produce").is_none());
        assert_eq!(history.final_state().unwrap().positions()[0].x, 1.0);
        assert_eq!(engine.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn parameters_are_written_into_each_step_directory() {
        let dir = tempdir().unwrap();
        let reporting = ReportingConfig::new(dir.path().to_path_buf(), "atom");
        let history = run_simulation_schedule(
            &ShiftEngine::default(),
            single_atom(),
            &three_steps(),
            &reporting,
            &ProgressReporter::new(),
        );
        assert!(history.succeeded());
        for step in ["anneal", "equilibrate", "produce"] {
            let path = dir.path().join(step).join(format!("{step}_params.toml"));
            assert_eq!(
                SimulationParameters::load(&path).unwrap(),
                SimulationParameters::preset("production_lite").unwrap()
            );
        }
    }

    #[test]
    fn phases_bracket_every_step() {
        let events = Mutex::new(Vec::new());
        {
            let reporter = ProgressReporter::with_callback(Box::new(|e| events.lock().unwrap().push(e)));
            run_simulation_schedule(
                &ShiftEngine::default(),
                single_atom(),
                &three_steps(),
                &ReportingConfig::disabled(),
                &reporter,
            );
        }
        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[0],
            Progress::PhaseStart {
                name: "anneal".to_string()
            }
        );
        assert_eq!(events[5], Progress::PhaseFinish);
    }
}
