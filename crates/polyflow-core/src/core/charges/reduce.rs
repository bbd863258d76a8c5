use super::ChargeError;
use super::charge_set::ChargeSet;
use super::library::ChargesByResidue;
use crate::core::models::structure::Structure;
use crate::core::monomers::group::MonomerGroup;
use std::collections::BTreeMap;
use tracing::debug;

/// Collapses per-atom charges of a partitioned structure into library charges.
///
/// Every (template, atom name) pair receives the mean charge over all residue
/// instances of that template. Each template's residual from its own formal
/// net charge is then spread evenly over its atoms, so a library residue
/// carries exactly the charge its template declares.
pub fn reduce_to_library(
    structure: &Structure,
    charges: &ChargeSet,
    group: &MonomerGroup,
) -> Result<ChargesByResidue, ChargeError> {
    if structure.atom_count() != charges.len() {
        return Err(ChargeError::LengthMismatch {
            expected: structure.atom_count(),
            actual: charges.len(),
        });
    }
    if let Some(i) = (0..structure.atom_count()).find(|&i| structure.residue_name_of(i).is_none()) {
        return Err(ChargeError::UnassignedAtom(i));
    }

    let mut sums: BTreeMap<&str, BTreeMap<&str, (f64, usize)>> = BTreeMap::new();
    for (_, residue) in structure.residues_iter() {
        let per_atom = sums.entry(residue.name.as_str()).or_default();
        for &idx in residue.atoms() {
            let name = structure.atoms()[idx].name.as_str();
            let entry = per_atom.entry(name).or_insert((0.0, 0));
            entry.0 += charges.charges()[idx];
            entry.1 += 1;
        }
    }

    let mut library = ChargesByResidue::new();
    for (residue, atoms) in &sums {
        let means: Vec<(&str, f64)> = atoms
            .iter()
            .map(|(name, (sum, count))| (*name, sum / *count as f64))
            .collect();
        let target = group
            .get(residue)
            .ok_or_else(|| ChargeError::UnknownTemplate(residue.to_string()))?
            .net_formal_charge() as f64;
        let total: f64 = means.iter().map(|(_, q)| q).sum();
        let residual = target - total;
        let shift = residual / means.len() as f64;
        debug!(residue = residue, total = total, target = target, residual = residual, "Reduced residue charges.");
        for (name, q) in means {
            library.insert(residue, name, q + shift);
        }
    }
    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use nalgebra::Point3;

    fn two_residue_group() -> MonomerGroup {
        MonomerGroup::from_json_str(
            r#"{"monomers": {"AAA": "[#6]-[#1]", "BBB": "[#8-]"}}"#,
        )
        .unwrap()
    }

    fn two_residue_types() -> Structure {
        let mut s = Structure::new("mix");
        let layout: [(&str, &[(&str, Element)]); 3] = [
            ("AAA", &[("C1", Element::C), ("H1", Element::H)]),
            ("BBB", &[("O1", Element::O)]),
            ("AAA", &[("C1", Element::C), ("H1", Element::H)]),
        ];
        for (n, (res, atoms)) in layout.iter().enumerate() {
            let rid = s.add_residue(n as isize + 1, res);
            for (name, element) in atoms.iter() {
                let idx = s.add_atom(Atom::new(name, *element, Point3::origin()));
                s.assign_atom(idx, rid).unwrap();
            }
        }
        s
    }

    #[test]
    fn averages_instances_and_shifts_to_formal_charge() {
        let s = two_residue_types();
        // AAA instances carry (0.3, 0.1) and (0.1, 0.3); BBB carries -0.8.
        let charges = ChargeSet::new(vec![0.3, 0.1, -0.8, 0.1, 0.3], 0.0).unwrap();
        let lib = reduce_to_library(&s, &charges, &two_residue_group()).unwrap();

        // AAA means (0.2, 0.2) sum 0.4 -> 0, shift -0.2 each.
        assert!(lib.get("AAA", "C1").unwrap().abs() < 1e-12);
        assert!(lib.get("AAA", "H1").unwrap().abs() < 1e-12);
        // BBB is an oxide anion: -0.8 -> -1.
        assert!((lib.get("BBB", "O1").unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn neutral_caps_stay_neutral_when_mean_totals_are_far_from_zero() {
        let group = MonomerGroup::from_json_str(
            r#"{"monomers": {"HD": "[#6]-[#1]", "TL": "[#6]-[#1]"}}"#,
        )
        .unwrap();
        let mut s = Structure::new("caps");
        for (n, res) in ["HD", "TL"].iter().enumerate() {
            let rid = s.add_residue(n as isize + 1, res);
            for (name, element) in [("C1", Element::C), ("H1", Element::H)] {
                let idx = s.add_atom(Atom::new(name, element, Point3::origin()));
                s.assign_atom(idx, rid).unwrap();
            }
        }
        let charges = ChargeSet::new(vec![0.30, 0.25, -0.30, -0.25], 0.0).unwrap();
        let lib = reduce_to_library(&s, &charges, &group).unwrap();

        for residue in ["HD", "TL"] {
            assert!(lib.residue_total(residue).unwrap().abs() < 1e-12);
        }
        assert!((lib.get("HD", "C1").unwrap() - 0.025).abs() < 1e-12);
        assert!((lib.get("HD", "H1").unwrap() + 0.025).abs() < 1e-12);
        assert!((lib.get("TL", "C1").unwrap() + 0.025).abs() < 1e-12);
    }

    #[test]
    fn residues_without_a_template_are_rejected() {
        let s = two_residue_types();
        let charges = ChargeSet::new(vec![0.3, 0.1, -0.8, 0.1, 0.3], 0.0).unwrap();
        let group = MonomerGroup::from_json_str(r#"{"monomers": {"AAA": "[#6]-[#1]"}}"#).unwrap();
        assert!(matches!(
            reduce_to_library(&s, &charges, &group),
            Err(ChargeError::UnknownTemplate(name)) if name == "BBB"
        ));
    }

    #[test]
    fn reduction_is_deterministic() {
        let s = two_residue_types();
        let charges = ChargeSet::new(vec![0.25, -0.05, -0.4, 0.15, 0.05], 0.0).unwrap();
        let group = two_residue_group();
        let first = reduce_to_library(&s, &charges, &group).unwrap();
        let second = reduce_to_library(&s, &charges, &group).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_unpartitioned_structures_and_length_mismatch() {
        let mut s = two_residue_types();
        s.add_atom(Atom::new("X1", Element::C, Point3::origin()));
        let charges = ChargeSet::new(vec![0.0; 6], 0.0).unwrap();
        let group = two_residue_group();
        assert!(matches!(reduce_to_library(&s, &charges, &group), Err(ChargeError::UnassignedAtom(5))));

        let s = two_residue_types();
        let short = ChargeSet::new(vec![0.0; 2], 0.0).unwrap();
        assert!(matches!(
            reduce_to_library(&s, &short, &group),
            Err(ChargeError::LengthMismatch { expected: 5, actual: 2 })
        ));
    }
}
