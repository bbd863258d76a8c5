use crate::core::io::bgf::BgfFile;
use crate::core::io::traits::MolecularFile;
use crate::engine::error::EngineError;
use crate::engine::io_error;
use crate::engine::solvent::{SolvationOutcome, SolventSpec, solvate};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct SolvateOutcome {
    pub solvation: SolvationOutcome,
    pub output_path: PathBuf,
}

/// Solvates the molecule in a BGF file and writes `<name>_solv_water.bgf`.
#[instrument(skip_all, name = "solvate_workflow", fields(input = %input.display()))]
pub fn run(input: &Path, spec: &SolventSpec, output_dir: &Path) -> Result<SolvateOutcome, EngineError> {
    let solute = BgfFile::read_from_path(input)?;
    let solvation = solvate(&solute, spec)?;
    info!(
        molecule = %solute.name,
        solvent_added = solvation.solvent_added,
        atoms = solvation.structure.atom_count(),
        "Packed solvent box"
    );

    std::fs::create_dir_all(output_dir).map_err(|e| io_error(output_dir, e))?;
    let output_path = output_dir.join(format!("{}_solv_water.bgf", solute.name));
    BgfFile::write_to_path(&solvation.structure, &output_path)?;
    Ok(SolvateOutcome {
        solvation,
        output_path,
    })
}
