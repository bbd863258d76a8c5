use super::ChargeError;
use super::charge_set::{ChargeSet, NET_CHARGE_TOLERANCE};
use crate::core::models::structure::Structure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Library charges: residue template name → atom name → partial charge.
///
/// Serialized as a nested JSON object. Entries are ordered so that files are
/// stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargesByResidue {
    residues: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ChargesByResidue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ChargeError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ChargeError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ChargeError::Json {
            path: path_str,
            source: e,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ChargeError> {
        let path_str = path.to_string_lossy().to_string();
        let json = serde_json::to_string_pretty(self).map_err(|e| ChargeError::Json {
            path: path_str.clone(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ChargeError::Io {
            path: path_str,
            source: e,
        })
    }

    pub fn insert(&mut self, residue: &str, atom: &str, charge: f64) {
        self.residues
            .entry(residue.to_string())
            .or_default()
            .insert(atom.to_string(), charge);
    }

    pub fn get(&self, residue: &str, atom: &str) -> Option<f64> {
        self.residues.get(residue)?.get(atom).copied()
    }

    pub fn residue(&self, residue: &str) -> Option<&BTreeMap<String, f64>> {
        self.residues.get(residue)
    }

    pub fn residue_names(&self) -> impl Iterator<Item = &str> {
        self.residues.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Sum of the charges listed for one residue template.
    pub fn residue_total(&self, residue: &str) -> Option<f64> {
        self.residues.get(residue).map(|atoms| atoms.values().sum())
    }

    /// Looks up every atom of a partitioned structure by (residue name, atom name).
    ///
    /// The declared net charge of the returned set is the exact sum of the
    /// looked-up charges. A sum that strays from the structure's net formal
    /// charge is logged but not rejected.
    pub fn charges_for(&self, structure: &Structure) -> Result<ChargeSet, ChargeError> {
        if structure.atom_count() == 0 {
            return Err(ChargeError::EmptyStructure);
        }
        let charges = structure
            .atoms()
            .iter()
            .enumerate()
            .map(|(i, atom)| {
                let residue = structure
                    .residue_name_of(i)
                    .ok_or(ChargeError::UnassignedAtom(i))?;
                self.get(residue, &atom.name)
                    .ok_or_else(|| ChargeError::MissingLibraryEntry {
                        residue: residue.to_string(),
                        atom: atom.name.clone(),
                    })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        let total: f64 = charges.iter().sum();
        let formal = structure.net_formal_charge() as f64;
        if (total - formal).abs() > NET_CHARGE_TOLERANCE {
            warn!(
                molecule = %structure.name,
                library_total = total,
                formal_charge = formal,
                "Library charges do not sum to the molecule's formal charge."
            );
        }
        ChargeSet::new(charges, total)
    }
}
