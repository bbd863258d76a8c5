use crate::cli::SimulateArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::ui::{self, UiEvent};
use crate::utils::parser;
use polyflow::core::io::bgf::BgfFile;
use polyflow::core::io::traits::MolecularFile;
use polyflow::engine::config::ReportingConfig;
use polyflow::engine::error::EngineError;
use polyflow::engine::md::{LangevinEngine, SimulationState};
use polyflow::engine::progress::ProgressReporter;
use polyflow::workflows::schedule::{StepResult, run_simulation_schedule};
use tokio::sync::mpsc;
use tracing::{error, info};

pub async fn run(args: SimulateArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let schedule_config = config::build_schedule_config(&args)?;

    info!("Loading system from {:?}", &args.input);
    let mut system = BgfFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    if let Some(text) = &args.box_dimensions {
        system.set_box_dimensions(Some(parser::parse_box_dimensions(text)?));
    }
    let prefix = schedule_config
        .prefix
        .clone()
        .unwrap_or_else(|| system.name.clone());

    let engine = LangevinEngine::new(schedule_config.forcefield);
    let reporting = ReportingConfig::new(args.output_dir.clone(), &prefix);
    let reporter = ProgressReporter::with_callback(ui::progress_callback(ui_sender));

    println!(
        "Running {} simulation step(s) on {} ({} atoms)...",
        schedule_config.schedule.len(),
        system.name,
        system.atom_count()
    );
    let history = tokio::task::block_in_place(|| {
        run_simulation_schedule(
            &engine,
            SimulationState::new(system),
            &schedule_config.schedule,
            &reporting,
            &reporter,
        )
    });

    for record in history.records() {
        match &record.result {
            StepResult::Completed(output) => println!(
                "  {:<16} {:>9} steps  E_pot {:>12.2} kcal/mol  <T> {:>7.1} K",
                record.name,
                output.diagnostics.steps,
                output.diagnostics.final_potential_energy,
                output.diagnostics.mean_temperature_k
            ),
            StepResult::Failed(e) => println!("  {:<16} failed: {}", record.name, e),
        }
    }

    if let Some(state) = history.final_state() {
        std::fs::create_dir_all(&args.output_dir)?;
        let output_path = args.output_dir.join(format!("{}_final.bgf", prefix));
        BgfFile::write_to_path(state.structure(), &output_path).map_err(EngineError::from)?;
        println!(
            "✓ State after {:.3} ps written to: {}",
            state.time_ps(),
            output_path.display()
        );
    }

    if let Some(failed) = history.failure() {
        let reason = failed
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        error!(step = %failed.name, "Schedule stopped early");
        return Err(CliError::StepFailed {
            step: failed.name.clone(),
            reason,
        });
    }
    Ok(())
}
