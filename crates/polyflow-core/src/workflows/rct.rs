use crate::core::charges::library::ChargesByResidue;
use crate::core::charges::reduce::reduce_to_library;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use crate::core::monomers::group::MonomerGroup;
use crate::core::polymers::building::build_linear_polymer;
use crate::core::polymers::error::MorphologyError;
use crate::core::polymers::estimation::estimate_dop_lower;
use crate::engine::charger::make_charger;
use crate::engine::config::{ChainLengthPolicy, RctConfig};
use crate::engine::error::EngineError;
use crate::engine::io_error;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::workflows::assign::assign_chemistry;
use tracing::{debug, info, instrument};

const REDUCED_CHAIN_NAME: &str = "reduced_chain";

#[derive(Debug, Clone)]
pub struct RctOutcome {
    /// Library charges per residue template.
    pub charges: ChargesByResidue,
    /// The charged, partitioned reference chain.
    pub molecule: Structure,
    pub repeat_count: usize,
}

/// Derives residue library charges from a reduced reference chain.
///
/// Builds a chain of the group, partitions it, charges it with the configured
/// strategy and averages the charges per (template, atom name).
#[instrument(skip_all, name = "rct_workflow", fields(charger = %config.charger.kind))]
pub fn rct_protocol(
    group: &MonomerGroup,
    config: &RctConfig,
    reporter: &ProgressReporter,
) -> Result<RctOutcome, EngineError> {
    if !group.is_linear() {
        let terminals = group.terminal_names().len();
        let invalid = group
            .templates()
            .filter(|t| t.valence() != 1 && t.valence() != 2)
            .count();
        return Err(MorphologyError::NotLinear { terminals, invalid }.into());
    }
    let charger = make_charger(&config.charger)?;

    // === Phase 1: Reduced chain ===
    reporter.phase_start("Chain construction");
    let repeat_count = match config.chain_length_policy {
        ChainLengthPolicy::Reduced => estimate_dop_lower(group, config.max_chain_len)?,
        ChainLengthPolicy::Full => config.max_chain_len,
    };
    let chain = build_linear_polymer(group, repeat_count, config.orientation.as_ref())?;
    let mut molecule = chain.to_structure(group, REDUCED_CHAIN_NAME)?;
    molecule.clear_residues();
    info!(
        repeat_count,
        instances = chain.len(),
        atoms = molecule.atom_count(),
        "Built reduced chain"
    );

    if let Some(dir) = &config.keep_intermediate {
        std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        let path = dir.join(format!("{REDUCED_CHAIN_NAME}.pdb"));
        PdbFile::write_to_path(&molecule, &path)?;
        molecule = PdbFile::read_from_path(&path)?;
        debug!(path = %path.display(), "Reloaded intermediate chain");
    }
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Partition ===
    reporter.phase_start("Partitioning");
    assign_chemistry(&mut molecule, group)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Charge ===
    reporter.phase_start("Charging");
    let charges = charger.charge_molecule(&molecule)?;
    charges.apply_to(&mut molecule)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 4: Reduce ===
    reporter.phase_start("Reduction");
    let library = reduce_to_library(&molecule, &charges, group)?;
    reporter.report(Progress::PhaseFinish);

    info!(residues = library.len(), "Derived residue library charges");
    Ok(RctOutcome {
        charges: library,
        molecule,
        repeat_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::charger::{MolCharger, RctCharger};
    use crate::engine::config::RctConfigBuilder;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn peg_group() -> MonomerGroup {
        MonomerGroup::from_json_str(
            r#"{"monomers": {
                "ET": "[*]-[#6](-[#1])(-[#1])-[#6](-[#1])(-[#1])-[*]",
                "OX": "[*]-[#8]-[*]",
                "HO": "[#1]-[#8]-[*]",
                "FL": "[*]-[#9]"},
              "term_orient": {"HO": "head", "FL": "tail"}}"#,
        )
        .unwrap()
    }

    fn gasteiger_config(max_chain_len: usize) -> RctConfig {
        RctConfigBuilder::new()
            .charger("gasteiger")
            .max_chain_len(max_chain_len)
            .build()
            .unwrap()
    }

    #[test]
    fn protocol_produces_integral_residue_charges() {
        let outcome = rct_protocol(&peg_group(), &gasteiger_config(40), &ProgressReporter::new()).unwrap();
        assert_eq!(outcome.repeat_count, 10);
        assert_eq!(outcome.molecule.residue_count(), 12);
        for name in ["ET", "OX", "HO", "FL"] {
            let total = outcome.charges.residue_total(name).unwrap();
            assert!((total - total.round()).abs() < 1e-9, "{name} sums to {total}");
        }
    }

    #[test]
    fn protocol_is_deterministic() {
        let group = peg_group();
        let config = gasteiger_config(40);
        let a = rct_protocol(&group, &config, &ProgressReporter::new()).unwrap();
        let b = rct_protocol(&group, &config, &ProgressReporter::new()).unwrap();
        assert_eq!(a.charges, b.charges);
    }

    #[test]
    fn rct_charger_reproduces_library_lookups() {
        let outcome = rct_protocol(&peg_group(), &gasteiger_config(40), &ProgressReporter::new()).unwrap();
        let charger = RctCharger::new(outcome.charges.clone(), PathBuf::from("<memory>"));
        let charges = charger.charge_molecule(&outcome.molecule).unwrap();
        for (i, atom) in outcome.molecule.atoms().iter().enumerate() {
            let residue = outcome.molecule.residue_name_of(i).unwrap();
            assert_eq!(charges.charges()[i], outcome.charges.get(residue, &atom.name).unwrap());
        }
    }

    #[test]
    fn full_policy_uses_budget_as_repeat_count() {
        let config = RctConfigBuilder::new()
            .charger("gasteiger")
            .max_chain_len(3)
            .chain_length_policy(ChainLengthPolicy::Full)
            .build()
            .unwrap();
        let outcome = rct_protocol(&peg_group(), &config, &ProgressReporter::new()).unwrap();
        assert_eq!(outcome.repeat_count, 3);
        assert_eq!(outcome.molecule.residue_count(), 5);
    }

    #[test]
    fn intermediate_chain_is_persisted_and_reloaded() {
        let dir = tempdir().unwrap();
        let config = RctConfigBuilder::new()
            .charger("gasteiger")
            .max_chain_len(40)
            .keep_intermediate(dir.path().to_path_buf())
            .build()
            .unwrap();
        let reloaded = rct_protocol(&peg_group(), &config, &ProgressReporter::new()).unwrap();
        let in_memory = rct_protocol(&peg_group(), &gasteiger_config(40), &ProgressReporter::new()).unwrap();

        assert!(dir.path().join("reduced_chain.pdb").exists());
        assert_eq!(reloaded.molecule.atom_count(), in_memory.molecule.atom_count());
        assert_eq!(
            reloaded.charges.residue_names().collect::<Vec<_>>(),
            in_memory.charges.residue_names().collect::<Vec<_>>()
        );
    }

    #[test]
    fn hydrogen_capped_polyethylene_reduces_to_neutral_residues() {
        let group = MonomerGroup::from_json_str(
            r#"{"monomers": {
                "PE": "[*]-[#6](-[#1])(-[#1])-[#6](-[#1])(-[#1])-[*]",
                "PE_TERM1": "[*]-[#1]",
                "PE_TERM2": "[#1]-[*]"},
              "term_orient": {"PE_TERM1": "head", "PE_TERM2": "tail"}}"#,
        )
        .unwrap();
        let outcome = rct_protocol(&group, &gasteiger_config(40), &ProgressReporter::new()).unwrap();

        assert_eq!(outcome.repeat_count, 6);
        assert_eq!(outcome.molecule.residue_count(), 8);
        for name in ["PE", "PE_TERM1", "PE_TERM2"] {
            let total = outcome.charges.residue_total(name).unwrap();
            assert!(total.abs() < 1e-9, "{name} sums to {total}");
        }
    }

    #[test]
    fn ambiguous_group_is_a_partition_failure() {
        let group = MonomerGroup::from_json_str(
            r#"{"monomers": {
                "C1U": "[*]-[#6]-[*]",
                "C2U": "[*]-[#6]-[#6]-[*]",
                "FH": "[#9]-[*]",
                "CT": "[*]-[#17]"},
              "term_orient": {"FH": "head", "CT": "tail"}}"#,
        )
        .unwrap();
        let err = rct_protocol(&group, &gasteiger_config(20), &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::PartitionFailure { .. }));
    }

    #[test]
    fn non_linear_group_is_rejected_before_building() {
        let group = MonomerGroup::from_json_str(r#"{"monomers": {"X": "[*]-[#6](-[*])-[*]"}}"#).unwrap();
        let err = rct_protocol(&group, &gasteiger_config(20), &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Morphology {
                source: MorphologyError::NotLinear { .. }
            }
        ));
    }

    #[test]
    fn phases_are_reported_in_order() {
        let events = Mutex::new(Vec::new());
        {
            let reporter = ProgressReporter::with_callback(Box::new(|e| {
                if let Progress::PhaseStart { name } = e {
                    events.lock().unwrap().push(name);
                }
            }));
            rct_protocol(&peg_group(), &gasteiger_config(40), &reporter).unwrap();
        }
        assert_eq!(
            events.into_inner().unwrap(),
            vec!["Chain construction", "Partitioning", "Charging", "Reduction"]
        );
    }
}
