use super::forces::evaluate;
use super::system::MdSystem;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use tracing::trace;

/// Boltzmann constant in kcal/(mol·K).
pub const BOLTZMANN: f64 = 0.001_987_204_1;
/// One atmosphere in kcal/(mol·Å³).
pub const ATM_TO_KCAL_PER_A3: f64 = 1.458_397e-5;

const ADAPT_EVERY: u32 = 10;

/// Isotropic Monte Carlo barostat.
///
/// Each trial scales the box and moves every molecule rigidly with its center
/// of mass, then accepts with the isothermal-isobaric Metropolis criterion.
#[derive(Debug, Clone)]
pub struct MonteCarloBarostat {
    pressure: f64,
    temperature_k: f64,
    max_volume_change: f64,
    attempted: u32,
    accepted: u32,
    window_attempted: u32,
    window_accepted: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveResult {
    Accepted { potential_energy: f64 },
    Rejected,
}

impl MonteCarloBarostat {
    pub fn new(pressure_atm: f64, temperature_k: f64, initial_volume: f64) -> Self {
        Self {
            pressure: pressure_atm * ATM_TO_KCAL_PER_A3,
            temperature_k,
            max_volume_change: 0.01 * initial_volume,
            attempted: 0,
            accepted: 0,
            window_attempted: 0,
            window_accepted: 0,
        }
    }

    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.attempted > 0).then(|| f64::from(self.accepted) / f64::from(self.attempted))
    }

    pub fn max_volume_change(&self) -> f64 {
        self.max_volume_change
    }

    /// Attempts one volume move. On acceptance `positions` and `box_dims` are
    /// updated in place.
    pub fn attempt(
        &mut self,
        system: &MdSystem,
        positions: &mut [Point3<f64>],
        box_dims: &mut Vector3<f64>,
        current_energy: f64,
        rng: &mut impl Rng,
    ) -> MoveResult {
        let volume = box_dims.x * box_dims.y * box_dims.z;
        let delta_v = self.max_volume_change * (2.0 * rng.r#gen::<f64>() - 1.0);
        let new_volume = volume + delta_v;
        self.attempted += 1;
        self.window_attempted += 1;

        let result = if new_volume <= 0.0 {
            MoveResult::Rejected
        } else {
            let scale = (new_volume / volume).cbrt();
            let trial_box = *box_dims * scale;
            let trial = scale_molecules(system, positions, scale);
            let trial_energy = evaluate(system, &trial, Some(&trial_box)).energy.total();
            let kt = BOLTZMANN * self.temperature_k;
            let w = (trial_energy - current_energy) + self.pressure * delta_v
                - system.molecules.len() as f64 * kt * (new_volume / volume).ln();
            if trial_energy.is_finite() && (w <= 0.0 || rng.r#gen::<f64>() < (-w / kt).exp()) {
                positions.copy_from_slice(&trial);
                *box_dims = trial_box;
                self.accepted += 1;
                self.window_accepted += 1;
                MoveResult::Accepted {
                    potential_energy: trial_energy,
                }
            } else {
                MoveResult::Rejected
            }
        };

        if self.window_attempted >= ADAPT_EVERY {
            let rate = f64::from(self.window_accepted) / f64::from(self.window_attempted);
            if rate < 0.25 {
                self.max_volume_change /= 1.1;
            } else if rate > 0.75 {
                self.max_volume_change = (self.max_volume_change * 1.1).min(0.3 * volume);
            }
            trace!(rate, max_volume_change = self.max_volume_change, "Adapted barostat step size");
            self.window_attempted = 0;
            self.window_accepted = 0;
        }
        result
    }
}

/// Scales molecule centers of mass by `scale`, keeping each molecule rigid.
pub fn scale_molecules(system: &MdSystem, positions: &[Point3<f64>], scale: f64) -> Vec<Point3<f64>> {
    let mut scaled = positions.to_vec();
    for molecule in &system.molecules {
        let mass: f64 = molecule.iter().map(|&i| system.masses[i]).sum();
        if mass <= 0.0 {
            continue;
        }
        let com = molecule
            .iter()
            .fold(Vector3::zeros(), |acc, &i| acc + positions[i].coords * system.masses[i])
            / mass;
        let shift = com * (scale - 1.0);
        for &i in molecule {
            scaled[i] = positions[i] + shift;
        }
    }
    scaled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::Forcefield;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::structure::Structure;
    use crate::core::models::topology::BondOrder;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn two_dimers() -> Structure {
        let mut s = Structure::new("dimers");
        for (k, x) in [2.0, 8.0].into_iter().enumerate() {
            let a = s.add_atom(Atom::new(&format!("C{}", 2 * k + 1), Element::C, Point3::new(x, 5.0, 5.0)));
            let b = s.add_atom(Atom::new(&format!("C{}", 2 * k + 2), Element::C, Point3::new(x + 1.51, 5.0, 5.0)));
            s.add_bond(a, b, BondOrder::Single).unwrap();
        }
        s
    }

    #[test]
    fn scaling_preserves_intramolecular_geometry() {
        let ff = Forcefield::builtin().unwrap();
        let structure = two_dimers();
        let system = MdSystem::build(&structure, &ff).unwrap();
        let positions = structure.positions();
        let scaled = scale_molecules(&system, &positions, 1.1);

        let before = (positions[1] - positions[0]).norm();
        let after = (scaled[1] - scaled[0]).norm();
        assert!((before - after).abs() < 1e-12);
        assert!((scaled[2] - scaled[0]).norm() > (positions[2] - positions[0]).norm());
    }

    #[test]
    fn attempts_track_acceptance_and_keep_box_positive() {
        let ff = Forcefield::builtin().unwrap();
        let structure = two_dimers();
        let system = MdSystem::build(&structure, &ff).unwrap();
        let mut positions = structure.positions();
        let mut box_dims = Vector3::new(20.0, 20.0, 20.0);
        let mut energy = evaluate(&system, &positions, Some(&box_dims)).energy.total();
        let mut barostat = MonteCarloBarostat::new(1.0, 300.0, 8000.0);
        let mut rng = StdRng::seed_from_u64(7);
        assert!(barostat.acceptance_rate().is_none());

        for _ in 0..40 {
            if let MoveResult::Accepted { potential_energy } =
                barostat.attempt(&system, &mut positions, &mut box_dims, energy, &mut rng)
            {
                energy = potential_energy;
            }
        }
        let rate = barostat.acceptance_rate().unwrap();
        assert!((0.0..=1.0).contains(&rate));
        assert!(box_dims.min() > 0.0);
        assert!(barostat.max_volume_change() > 0.0);
    }
}
