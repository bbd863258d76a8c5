use crate::core::io::bgf::BgfFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use crate::engine::charger::{MolCharger, make_charger};
use crate::engine::config::ChargerConfig;
use crate::engine::error::EngineError;
use crate::engine::io_error;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub structure: Structure,
    pub output_path: PathBuf,
}

/// Returns a copy of `structure` carrying the charges computed by `charger`.
pub fn charge_structure(structure: &Structure, charger: &dyn MolCharger) -> Result<Structure, EngineError> {
    let charges = charger.charge_molecule(structure)?;
    let mut charged = structure.clone();
    charges.apply_to(&mut charged)?;
    Ok(charged)
}

/// Charges the molecule in a BGF file and writes `<name>_<method>.bgf` into
/// `output_dir`.
#[instrument(skip_all, name = "charge_workflow", fields(method = %config.kind))]
pub fn run(bgf_path: &Path, config: &ChargerConfig, output_dir: &Path) -> Result<ChargeOutcome, EngineError> {
    let charger = make_charger(config)?;
    let molecule = BgfFile::read_from_path(bgf_path)?;
    let structure = charge_structure(&molecule, charger.as_ref())?;
    let net: f64 = structure.partial_charges().iter().sum();
    info!(molecule = %structure.name, net_charge = net, "Assigned partial charges");

    std::fs::create_dir_all(output_dir).map_err(|e| io_error(output_dir, e))?;
    let output_path = output_dir.join(format!("{}_{}.bgf", structure.name, config.kind));
    BgfFile::write_to_path(&structure, &output_path)?;
    Ok(ChargeOutcome {
        structure,
        output_path,
    })
}
