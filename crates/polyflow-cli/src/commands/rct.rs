use crate::cli::RctArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::ui::{self, UiEvent};
use crate::utils::parser;
use polyflow::core::io::bgf::BgfFile;
use polyflow::core::io::traits::MolecularFile;
use polyflow::core::monomers::group::MonomerGroup;
use polyflow::engine::error::EngineError;
use polyflow::engine::config::RctConfig;
use polyflow::engine::progress::ProgressReporter;
use polyflow::workflows;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: RctArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let rct_config = config::build_rct_config(&args)?;
    let group = MonomerGroup::load(&args.monomers).map_err(|e| CliError::FileParsing {
        path: args.monomers.clone(),
        source: e.into(),
    })?;
    let name = args
        .name
        .clone()
        .or_else(|| parser::file_stem(&args.monomers))
        .unwrap_or_else(|| "polymer".to_string());
    info!(
        molecule = %name,
        monomers = group.len(),
        charger = %rct_config.charger.kind,
        max_chain_len = rct_config.max_chain_len,
        "Starting RCT protocol"
    );

    let reporter = ProgressReporter::with_callback(ui::progress_callback(ui_sender));

    println!("Deriving residue library charges for {}...", name);
    let outcome =
        tokio::task::block_in_place(|| workflows::rct::rct_protocol(&group, &rct_config, &reporter))?;

    std::fs::create_dir_all(&args.output_dir)?;
    let library_path = args
        .output_dir
        .join(format!("{}_residue_charges.json", name));
    outcome
        .charges
        .save(&library_path)
        .map_err(EngineError::from)?;

    let mut molecule = outcome.molecule;
    molecule.name = reference_chain_name(&name, &args.affix, &rct_config.charger.kind.to_string());
    let molecule_path = args.output_dir.join(format!("{}.bgf", molecule.name));
    BgfFile::write_to_path(&molecule, &molecule_path).map_err(EngineError::from)?;

    println!(
        "✓ Library charges for {} residue templates ({} repeat units) written to: {}",
        outcome.charges.len(),
        outcome.repeat_count,
        library_path.display()
    );
    println!("  Charged reference chain written to: {}", molecule_path.display());

    if let Some(path) = &args.save_monomers {
        save_oriented_group(&group, &rct_config, path)?;
        println!("  Monomer group written to: {}", path.display());
    }
    Ok(())
}

/// `<name>_<affix>_<charger>`, skipping an empty affix.
fn reference_chain_name(name: &str, affix: &str, charger: &str) -> String {
    if affix.is_empty() {
        format!("{}_{}", name, charger)
    } else {
        format!("{}_{}_{}", name, affix, charger)
    }
}

fn save_oriented_group(group: &MonomerGroup, config: &RctConfig, path: &Path) -> Result<()> {
    let mut group = group.clone();
    if let Some(orientation) = &config.orientation {
        group.set_term_orient(orientation.clone()).map_err(EngineError::from)?;
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    group.save(path).map_err(|e| {
        CliError::Other(anyhow::Error::new(e).context(format!(
            "Failed to save monomer group to {}",
            path.display()
        )))
    })
}
