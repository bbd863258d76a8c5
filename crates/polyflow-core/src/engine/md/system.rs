//! Force-field terms compiled from a structure for the MD engine.

use super::error::SimulationError;
use crate::core::forcefield::params::{Forcefield, LennardJonesParam};
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondOrder;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondTerm {
    pub i: usize,
    pub j: usize,
    pub length: f64,
    pub force_constant: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleTerm {
    pub i: usize,
    /// Central atom.
    pub j: usize,
    pub k: usize,
    pub angle: f64,
    pub force_constant: f64,
}

/// Ordered pair key with `a < b`.
#[inline]
pub fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

#[derive(Debug, Clone)]
pub struct MdSystem {
    pub masses: Vec<f64>,
    pub charges: Vec<f64>,
    pub vdw: Vec<LennardJonesParam>,
    pub bonds: Vec<BondTerm>,
    pub angles: Vec<AngleTerm>,
    /// 1-2 and 1-3 pairs: no nonbonded interaction.
    pub excluded: HashSet<(usize, usize)>,
    /// 1-4 pairs: nonbonded interaction scaled by `scale_14`.
    pub scaled_14: HashSet<(usize, usize)>,
    /// Connected components, used for molecular scaling by the barostat.
    pub molecules: Vec<Vec<usize>>,
    pub dielectric: f64,
    pub cutoff: f64,
    pub scale_14: f64,
}

impl MdSystem {
    pub fn build(structure: &Structure, forcefield: &Forcefield) -> Result<Self, SimulationError> {
        let n = structure.atom_count();
        if n == 0 {
            return Err(SimulationError::EmptySystem);
        }
        let atoms = structure.atoms();

        let vdw = atoms
            .iter()
            .map(|a| forcefield.vdw(a.element).copied())
            .collect::<Result<Vec<_>, _>>()?;

        let bonds: Vec<BondTerm> = structure
            .bonds()
            .iter()
            .map(|b| BondTerm {
                i: b.atom1,
                j: b.atom2,
                length: Forcefield::bond_length(atoms[b.atom1].element, atoms[b.atom2].element, b.order),
                force_constant: forcefield.bonded.bond_force_constant,
            })
            .collect();

        let mut angles = Vec::new();
        let mut excluded = HashSet::new();
        for bond in structure.bonds() {
            excluded.insert(pair_key(bond.atom1, bond.atom2));
        }
        for center in 0..n {
            let neighbors = structure.neighbors(center);
            if neighbors.len() < 2 {
                continue;
            }
            let orders: Vec<BondOrder> = neighbors
                .iter()
                .filter_map(|&nb| structure.bond_between(center, nb).map(|b| b.order))
                .collect();
            let angle = Forcefield::angle_for_center(atoms[center].element, &orders);
            for (a, &i) in neighbors.iter().enumerate() {
                for &k in &neighbors[a + 1..] {
                    angles.push(AngleTerm {
                        i,
                        j: center,
                        k,
                        angle,
                        force_constant: forcefield.bonded.angle_force_constant,
                    });
                    excluded.insert(pair_key(i, k));
                }
            }
        }

        let mut scaled_14 = HashSet::new();
        for bond in structure.bonds() {
            let (j, k) = (bond.atom1, bond.atom2);
            for &i in structure.neighbors(j).iter().filter(|&&i| i != k) {
                for &l in structure.neighbors(k).iter().filter(|&&l| l != j && l != i) {
                    let key = pair_key(i, l);
                    if !excluded.contains(&key) {
                        scaled_14.insert(key);
                    }
                }
            }
        }

        Ok(Self {
            masses: atoms.iter().map(|a| a.mass()).collect(),
            charges: atoms.iter().map(|a| a.partial_charge).collect(),
            vdw,
            bonds,
            angles,
            excluded,
            scaled_14,
            molecules: structure.connected_components(),
            dielectric: forcefield.globals.dielectric_constant,
            cutoff: forcefield.globals.nonbonded_cutoff,
            scale_14: forcefield.globals.scale_14,
        })
    }

    pub fn atom_count(&self) -> usize {
        self.masses.len()
    }

    pub fn total_mass(&self) -> f64 {
        self.masses.iter().sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use nalgebra::Point3;

    /// Butane carbon skeleton: C1-C2-C3-C4.
    pub(crate) fn butane_skeleton() -> Structure {
        let mut s = Structure::new("butane");
        let xs = [0.0, 1.25, 2.5, 3.75];
        let ys = [0.0, 0.9, 0.0, 0.9];
        for k in 0..4 {
            s.add_atom(Atom::new(&format!("C{}", k + 1), Element::C, Point3::new(xs[k], ys[k], 0.0)));
        }
        for k in 0..3 {
            s.add_bond(k, k + 1, BondOrder::Single).unwrap();
        }
        s
    }

    #[test]
    fn build_enumerates_bonded_terms_and_exclusions() {
        let ff = Forcefield::builtin().unwrap();
        let system = MdSystem::build(&butane_skeleton(), &ff).unwrap();
        assert_eq!(system.bonds.len(), 3);
        assert_eq!(system.angles.len(), 2);
        assert!(system.excluded.contains(&(0, 1)));
        assert!(system.excluded.contains(&(0, 2)));
        assert!(!system.excluded.contains(&(0, 3)));
        assert_eq!(system.scaled_14.iter().copied().collect::<Vec<_>>(), vec![(0, 3)]);
        assert_eq!(system.molecules.len(), 1);
        assert!((system.bonds[0].length - 1.51).abs() < 1e-9);
    }

    #[test]
    fn build_rejects_empty_structures() {
        let ff = Forcefield::builtin().unwrap();
        assert!(matches!(
            MdSystem::build(&Structure::new("empty"), &ff),
            Err(SimulationError::EmptySystem)
        ));
    }
}
