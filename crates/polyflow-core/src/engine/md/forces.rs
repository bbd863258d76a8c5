//! Energy and force evaluation for an [`MdSystem`].
//!
//! Bonded terms are evaluated serially; the pairwise nonbonded sum is split
//! across the rayon pool, each worker accumulating into its own force buffer.

use super::system::{MdSystem, pair_key};
use crate::core::forcefield::potentials::{coulomb, harmonic, lennard_jones_12_6};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyBreakdown {
    pub bond: f64,
    pub angle: f64,
    pub vdw: f64,
    pub coulomb: f64,
}

impl EnergyBreakdown {
    pub fn total(&self) -> f64 {
        self.bond + self.angle + self.vdw + self.coulomb
    }

    pub fn is_finite(&self) -> bool {
        self.total().is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct ForceEvaluation {
    pub energy: EnergyBreakdown,
    /// Forces in kcal/(mol·Å), indexed by atom.
    pub forces: Vec<Vector3<f64>>,
}

/// Applies the minimum-image convention for an orthorhombic box.
#[inline]
pub fn minimum_image(mut d: Vector3<f64>, box_dims: Option<&Vector3<f64>>) -> Vector3<f64> {
    if let Some(b) = box_dims {
        for k in 0..3 {
            if b[k] > 0.0 {
                d[k] -= b[k] * (d[k] / b[k]).round();
            }
        }
    }
    d
}

/// Nonbonded cutoff actually applied: the configured cutoff, capped at half the
/// shortest box edge when periodic.
pub fn effective_cutoff(system: &MdSystem, box_dims: Option<&Vector3<f64>>) -> f64 {
    match box_dims {
        Some(b) => system.cutoff.min(0.5 * b.min()),
        None => system.cutoff,
    }
}

pub fn evaluate(system: &MdSystem, positions: &[Point3<f64>], box_dims: Option<&Vector3<f64>>) -> ForceEvaluation {
    let n = system.atom_count();
    let mut forces = vec![Vector3::zeros(); n];
    let mut energy = EnergyBreakdown::default();

    for bond in &system.bonds {
        let d = minimum_image(positions[bond.j] - positions[bond.i], box_dims);
        let r = d.norm().max(1e-12);
        let (e, de) = harmonic(r, bond.length, bond.force_constant);
        energy.bond += e;
        let f = d * (de / r);
        forces[bond.i] += f;
        forces[bond.j] -= f;
    }

    for term in &system.angles {
        let u = minimum_image(positions[term.i] - positions[term.j], box_dims);
        let v = minimum_image(positions[term.k] - positions[term.j], box_dims);
        let (lu, lv) = (u.norm().max(1e-12), v.norm().max(1e-12));
        let cos = (u.dot(&v) / (lu * lv)).clamp(-1.0, 1.0);
        let theta = cos.acos();
        let (e, de) = harmonic(theta, term.angle, term.force_constant);
        energy.angle += e;
        let sin = theta.sin().max(1e-6);
        let fi = (v / (lu * lv) - u * (cos / (lu * lu))) * (de / sin);
        let fk = (u / (lu * lv) - v * (cos / (lv * lv))) * (de / sin);
        forces[term.i] += fi;
        forces[term.k] += fk;
        forces[term.j] -= fi + fk;
    }

    let cutoff = effective_cutoff(system, box_dims);
    let cutoff2 = cutoff * cutoff;
    let (nb_forces, vdw, elec) = (0..n)
        .into_par_iter()
        .fold(
            || (vec![Vector3::zeros(); n], 0.0, 0.0),
            |(mut f, mut vdw, mut elec), i| {
                for j in (i + 1)..n {
                    let key = pair_key(i, j);
                    if system.excluded.contains(&key) {
                        continue;
                    }
                    let d = minimum_image(positions[j] - positions[i], box_dims);
                    let r2 = d.norm_squared();
                    if r2 > cutoff2 {
                        continue;
                    }
                    let r = r2.sqrt();
                    let scale = if system.scaled_14.contains(&key) {
                        system.scale_14
                    } else {
                        1.0
                    };
                    let (pi, pj) = (&system.vdw[i], &system.vdw[j]);
                    let (e_lj, de_lj) = lennard_jones_12_6(
                        r,
                        0.5 * (pi.radius + pj.radius),
                        (pi.well_depth * pj.well_depth).sqrt(),
                    );
                    let (e_c, de_c) = coulomb(r, system.charges[i], system.charges[j], system.dielectric);
                    vdw += scale * e_lj;
                    elec += scale * e_c;
                    let fj = d * (-scale * (de_lj + de_c) / r.max(1e-12));
                    f[j] += fj;
                    f[i] -= fj;
                }
                (f, vdw, elec)
            },
        )
        .reduce(
            || (vec![Vector3::zeros(); n], 0.0, 0.0),
            |(mut fa, va, ea), (fb, vb, eb)| {
                for (a, b) in fa.iter_mut().zip(fb) {
                    *a += b;
                }
                (fa, va + vb, ea + eb)
            },
        );

    for (f, nb) in forces.iter_mut().zip(nb_forces) {
        *f += nb;
    }
    energy.vdw = vdw;
    energy.coulomb = elec;

    ForceEvaluation { energy, forces }
}
