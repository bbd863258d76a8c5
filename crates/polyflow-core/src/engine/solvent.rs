//! Lattice packing of rigid water around a solute in a periodic box.

use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::{Structure, StructureError};
use crate::core::models::topology::BondOrder;
use itertools::iproduct;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Vector3};
use thiserror::Error;
use tracing::{debug, info, warn};

/// 1 g/cm³ expressed in amu/Å³.
pub const GRAMS_PER_CM3_TO_AMU_PER_A3: f64 = 0.602_214_076;

const WATER_OH_LENGTH: f64 = 0.9572;
const WATER_HOH_ANGLE_DEG: f64 = 104.52;
const WATER_OXYGEN_CHARGE: f64 = -0.834;
const WATER_HYDROGEN_CHARGE: f64 = 0.417;
pub const WATER_RESIDUE_NAME: &str = "HOH";

#[derive(Debug, Error, PartialEq)]
pub enum SolventError {
    #[error("No box dimensions were given and the structure has no periodic box")]
    MissingBox,
    #[error("Box dimensions must be positive, got {0:?}")]
    InvalidBox([f64; 3]),
    #[error("Density must be positive, got {0} g/cm³")]
    InvalidDensity(f64),
    #[error("Exclusion distance must not be negative, got {0} Å")]
    InvalidExclusion(f64),
    #[error("Failed to add solvent molecule: {0}")]
    Structure(#[from] StructureError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolventSpec {
    /// Target density of the solvated box in g/cm³.
    pub density: f64,
    /// Minimum distance in Å between any solvent atom and any solute atom.
    pub exclusion: f64,
    /// Box edge lengths in Å; falls back to the solute's own box.
    pub box_dimensions: Option<Vector3<f64>>,
}

impl Default for SolventSpec {
    fn default() -> Self {
        Self {
            density: 1.0,
            exclusion: 2.5,
            box_dimensions: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolvationOutcome {
    pub structure: Structure,
    pub solvent_added: usize,
    pub solvent_requested: usize,
}

fn water_mass() -> f64 {
    Element::O.mass() + 2.0 * Element::H.mass()
}

/// Water atoms relative to the oxygen, in the xy plane.
fn water_geometry() -> [(&'static str, Element, Vector3<f64>, f64); 3] {
    let half = (WATER_HOH_ANGLE_DEG * 0.5).to_radians();
    let (dx, dy) = (WATER_OH_LENGTH * half.sin(), WATER_OH_LENGTH * half.cos());
    [
        ("O", Element::O, Vector3::zeros(), WATER_OXYGEN_CHARGE),
        ("H1", Element::H, Vector3::new(dx, dy, 0.0), WATER_HYDROGEN_CHARGE),
        ("H2", Element::H, Vector3::new(-dx, dy, 0.0), WATER_HYDROGEN_CHARGE),
    ]
}

fn wrap(p: &Point3<f64>, dims: &Vector3<f64>) -> [f64; 3] {
    [
        p.x.rem_euclid(dims.x),
        p.y.rem_euclid(dims.y),
        p.z.rem_euclid(dims.z),
    ]
}

/// Number of water molecules that brings the box to the target density.
pub fn target_water_count(solute_mass: f64, volume: f64, density: f64) -> usize {
    let solvent_mass = density * GRAMS_PER_CM3_TO_AMU_PER_A3 * volume - solute_mass;
    if solvent_mass <= 0.0 {
        0
    } else {
        (solvent_mass / water_mass()).floor() as usize
    }
}

/// Assigns a water's atoms (oxygen first) to `residue` and bonds both hydrogens.
fn attach_water(structure: &mut Structure, residue: ResidueId, atoms: &[usize]) -> Result<(), SolventError> {
    for &idx in atoms {
        structure.assign_atom(idx, residue)?;
    }
    if let [oxygen, hydrogens @ ..] = atoms {
        for &h in hydrogens {
            structure.add_bond(*oxygen, h, BondOrder::Single)?;
        }
    }
    Ok(())
}

/// Centers the solute in the box and fills the remaining volume with water.
pub fn solvate(solute: &Structure, spec: &SolventSpec) -> Result<SolvationOutcome, SolventError> {
    if !(spec.density.is_finite() && spec.density > 0.0) {
        return Err(SolventError::InvalidDensity(spec.density));
    }
    if !(spec.exclusion.is_finite() && spec.exclusion >= 0.0) {
        return Err(SolventError::InvalidExclusion(spec.exclusion));
    }
    let dims = spec
        .box_dimensions
        .or_else(|| solute.box_dimensions())
        .ok_or(SolventError::MissingBox)?;
    if dims.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
        return Err(SolventError::InvalidBox([dims.x, dims.y, dims.z]));
    }

    let mut structure = solute.clone();
    if let Some(centroid) = structure.centroid() {
        structure.translate(&(dims * 0.5 - centroid.coords));
    }
    structure.set_box_dimensions(Some(dims));

    let volume = dims.x * dims.y * dims.z;
    let requested = target_water_count(structure.total_mass(), volume, spec.density);
    if requested == 0 {
        warn!(volume, "Solute already fills the box at the target density; no solvent added");
        return Ok(SolvationOutcome {
            structure,
            solvent_added: 0,
            solvent_requested: 0,
        });
    }

    let spacing = (water_mass() / (spec.density * GRAMS_PER_CM3_TO_AMU_PER_A3)).cbrt();
    let counts = dims.map(|d| ((d / spacing).ceil() as usize).max(1));
    let step = Vector3::new(
        dims.x / counts.x as f64,
        dims.y / counts.y as f64,
        dims.z / counts.z as f64,
    );

    let solute_points: Vec<[f64; 3]> = structure.atoms().iter().map(|a| wrap(&a.position, &dims)).collect();
    let tree: KdTree<f64, 3> = (&solute_points).into();
    let exclusion_sq = spec.exclusion * spec.exclusion;
    let geometry = water_geometry();

    let clashes = |p: &Point3<f64>| -> bool {
        if solute_points.is_empty() || exclusion_sq == 0.0 {
            return false;
        }
        let base = wrap(p, &dims);
        iproduct!(-1..=1, -1..=1, -1..=1).any(|(i, j, k)| {
            let query = [
                base[0] + f64::from(i) * dims.x,
                base[1] + f64::from(j) * dims.y,
                base[2] + f64::from(k) * dims.z,
            ];
            tree.nearest_one::<SquaredEuclidean>(&query).distance < exclusion_sq
        })
    };

    let sites: Vec<Point3<f64>> = iproduct!(0..counts.x, 0..counts.y, 0..counts.z)
        .map(|(i, j, k)| {
            Point3::new(
                (i as f64 + 0.5) * step.x,
                (j as f64 + 0.5) * step.y,
                (k as f64 + 0.5) * step.z,
            )
        })
        .filter(|site| !geometry.iter().any(|(_, _, offset, _)| clashes(&(site + offset))))
        .collect();
    debug!(
        lattice_sites = counts.x * counts.y * counts.z,
        free_sites = sites.len(),
        spacing,
        "Built solvent lattice"
    );

    let placed = requested.min(sites.len());
    if placed < requested {
        warn!(requested, placed, "Not enough free lattice sites to reach the target density");
    }

    let mut next_residue = structure
        .residues_iter()
        .map(|(_, r)| r.number)
        .max()
        .unwrap_or(0)
        + 1;
    for n in 0..placed {
        // Evenly strided subset of the free sites.
        let site = sites[n * sites.len() / placed];
        let residue = structure.add_residue(next_residue, WATER_RESIDUE_NAME);
        next_residue += 1;
        let indices: Vec<usize> = geometry
            .iter()
            .map(|(name, element, offset, charge)| {
                let mut atom = Atom::new(name, *element, site + offset);
                atom.partial_charge = *charge;
                structure.add_atom(atom)
            })
            .collect();
        attach_water(&mut structure, residue, &indices)?;
    }

    info!(
        solvent_added = placed,
        requested,
        box_edges = ?[dims.x, dims.y, dims.z],
        "Solvated structure"
    );
    Ok(SolvationOutcome {
        structure,
        solvent_added: placed,
        solvent_requested: requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water_box(edge: f64) -> SolventSpec {
        SolventSpec {
            box_dimensions: Some(Vector3::new(edge, edge, edge)),
            ..SolventSpec::default()
        }
    }

    #[test]
    fn target_count_follows_density() {
        assert_eq!(target_water_count(0.0, 8000.0, 1.0), 267);
        assert_eq!(target_water_count(1.0e6, 8000.0, 1.0), 0);
    }

    #[test]
    fn pure_water_box_reaches_target_density() {
        let outcome = solvate(&Structure::new("empty"), &water_box(20.0)).unwrap();
        assert_eq!(outcome.solvent_added, 267);
        assert_eq!(outcome.solvent_requested, 267);
        let s = &outcome.structure;
        assert_eq!(s.atom_count(), 3 * 267);
        assert_eq!(s.bonds().len(), 2 * 267);
        assert_eq!(s.residue_count(), 267);
        assert!(s.is_partitioned());
        assert_eq!(s.box_dimensions(), Some(Vector3::new(20.0, 20.0, 20.0)));
        let net: f64 = s.partial_charges().iter().sum();
        assert!(net.abs() < 1e-9);
        assert!(s.residues_iter().all(|(_, r)| r.name == WATER_RESIDUE_NAME));
    }

    #[test]
    fn water_keeps_clear_of_the_solute() {
        let mut solute = Structure::new("carbon");
        solute.add_atom(Atom::new("C1", Element::C, Point3::new(-3.0, 1.0, 2.0)));
        let spec = SolventSpec {
            exclusion: 3.0,
            ..water_box(18.0)
        };
        let outcome = solvate(&solute, &spec).unwrap();
        let s = &outcome.structure;

        let center = s.atoms()[0].position;
        assert!((center - Point3::new(9.0, 9.0, 9.0)).norm() < 1e-9);
        for atom in &s.atoms()[1..] {
            assert!((atom.position - center).norm() >= 3.0);
        }
        assert!(outcome.solvent_added > 0);
        assert_eq!(s.residue_count(), outcome.solvent_added);
    }

    #[test]
    fn box_comes_from_the_structure_when_not_given() {
        let mut solute = Structure::new("boxed");
        solute.set_box_dimensions(Some(Vector3::new(12.0, 12.0, 12.0)));
        let outcome = solvate(&solute, &SolventSpec::default()).unwrap();
        assert_eq!(outcome.solvent_added, target_water_count(0.0, 1728.0, 1.0));

        assert_eq!(
            solvate(&Structure::new("free"), &SolventSpec::default()).unwrap_err(),
            SolventError::MissingBox
        );
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let spec = SolventSpec {
            density: 0.0,
            ..water_box(10.0)
        };
        assert_eq!(
            solvate(&Structure::new("x"), &spec).unwrap_err(),
            SolventError::InvalidDensity(0.0)
        );
        assert!(matches!(
            solvate(&Structure::new("x"), &water_box(-1.0)),
            Err(SolventError::InvalidBox(_))
        ));
    }

    #[test]
    fn attaching_water_reports_structure_errors() {
        let mut s = Structure::new("w");
        let residue = s.add_residue(1, WATER_RESIDUE_NAME);
        let o = s.add_atom(Atom::new("O1", Element::O, Point3::origin()));
        let h = s.add_atom(Atom::new("H1", Element::H, Point3::new(0.96, 0.0, 0.0)));

        assert_eq!(
            attach_water(&mut s, residue, &[o, h, 7]),
            Err(SolventError::Structure(StructureError::AtomOutOfRange(7)))
        );

        let mut s = Structure::new("w");
        let residue = s.add_residue(1, WATER_RESIDUE_NAME);
        let o = s.add_atom(Atom::new("O1", Element::O, Point3::origin()));
        let h = s.add_atom(Atom::new("H1", Element::H, Point3::new(0.96, 0.0, 0.0)));
        attach_water(&mut s, residue, &[o, h]).unwrap();
        assert_eq!(s.bonds().len(), 1);
        assert!(matches!(
            attach_water(&mut s, residue, &[o]),
            Err(SolventError::Structure(StructureError::AlreadyAssigned { .. }))
        ));
    }
}
