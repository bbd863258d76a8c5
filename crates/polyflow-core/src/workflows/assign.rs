use crate::core::io::bgf::BgfFile;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use crate::core::monomers::group::MonomerGroup;
use crate::core::partition::partition;
use crate::engine::error::EngineError;
use crate::engine::io_error;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct AssignOutcome {
    pub structure: Structure,
    pub output_path: PathBuf,
}

/// Partitions `structure` in place, failing with `PartitionFailure` when no
/// unique residue cover exists.
pub fn assign_chemistry(structure: &mut Structure, group: &MonomerGroup) -> Result<(), EngineError> {
    if partition(structure, group) {
        Ok(())
    } else {
        Err(EngineError::PartitionFailure {
            molecule: structure.name.clone(),
        })
    }
}

/// Reads a PDB file, partitions it against `group` and writes the annotated
/// molecule as `<output_dir>/<name>.bgf`.
#[instrument(skip_all, name = "assign_workflow", fields(pdb = %pdb_path.display()))]
pub fn run(
    pdb_path: &Path,
    group: &MonomerGroup,
    output_dir: &Path,
    molecule_name: Option<&str>,
) -> Result<AssignOutcome, EngineError> {
    let mut structure = PdbFile::read_from_path(pdb_path)?;
    if let Some(name) = molecule_name {
        structure.name = name.to_string();
    }
    if structure.name.is_empty() {
        structure.name = "molecule".to_string();
    }

    assign_chemistry(&mut structure, group)?;
    info!(
        molecule = %structure.name,
        residues = structure.residue_count(),
        "Assigned residue chemistry"
    );

    std::fs::create_dir_all(output_dir).map_err(|e| io_error(output_dir, e))?;
    let output_path = output_dir.join(format!("{}.bgf", structure.name));
    BgfFile::write_to_path(&structure, &output_path)?;
    Ok(AssignOutcome {
        structure,
        output_path,
    })
}
