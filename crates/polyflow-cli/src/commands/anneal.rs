use crate::cli::AnnealArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::ui::{self, UiEvent};
use crate::utils::parser;
use polyflow::core::io::bgf::BgfFile;
use polyflow::core::io::traits::MolecularFile;
use polyflow::engine::config::ReportingConfig;
use polyflow::engine::error::EngineError;
use polyflow::engine::md::LangevinEngine;
use polyflow::engine::progress::ProgressReporter;
use polyflow::workflows;
use tokio::sync::mpsc;
use tracing::info;

const DEFAULT_AFFIX: &str = "annealed";

pub async fn run(args: AnnealArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let anneal_config = config::build_anneal_config(&args)?;

    info!("Loading molecule from {:?}", &args.input);
    let mut molecule = BgfFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    if let Some(text) = &args.box_dimensions {
        molecule.set_box_dimensions(Some(parser::parse_box_dimensions(text)?));
    }

    let engine = LangevinEngine::new(anneal_config.forcefield);
    let reporting = ReportingConfig::new(args.output_dir.clone(), &molecule.name);
    let reporter = ProgressReporter::with_callback(ui::progress_callback(ui_sender));

    println!(
        "Annealing {} ({} atoms, {} ps at {} K)...",
        molecule.name,
        molecule.atom_count(),
        anneal_config.params.integrator.total_time_ps,
        anneal_config.params.thermo.temperature_k
    );
    let outcome = tokio::task::block_in_place(|| {
        workflows::anneal::run(
            &engine,
            &molecule,
            &anneal_config.params,
            Some(&anneal_config.step_name),
            &reporting,
            &reporter,
        )
    })?;

    std::fs::create_dir_all(&args.output_dir)?;
    let affix = args.affix.as_deref().unwrap_or(DEFAULT_AFFIX);
    let output_path = args
        .output_dir
        .join(format!("{}_{}.bgf", outcome.molecule.name, affix));
    BgfFile::write_to_path(&outcome.molecule, &output_path).map_err(EngineError::from)?;

    let diagnostics = &outcome.diagnostics;
    println!(
        "✓ Annealed conformer (E_pot {:.2} kcal/mol, <T> {:.1} K) written to: {}",
        diagnostics.final_potential_energy,
        diagnostics.mean_temperature_k,
        output_path.display()
    );
    for report in &diagnostics.reports {
        println!("  Report: {}", report.display());
    }
    Ok(())
}
