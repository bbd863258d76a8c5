//! Langevin dynamics with a BAOAB splitting and an optional Monte Carlo barostat.

use super::barostat::{BOLTZMANN, MonteCarloBarostat, MoveResult};
use super::engine::{SimulationEngine, StepDiagnostics, StepOutput};
use super::error::SimulationError;
use super::forces::{ForceEvaluation, evaluate};
use super::parameters::{Ensemble, SimulationParameters};
use super::reporters::{StateDataRow, StepReports};
use super::state::SimulationState;
use super::system::MdSystem;
use crate::core::forcefield::params::Forcefield;
use crate::engine::config::ReportingConfig;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, info, instrument, warn};

/// Converts kcal/(mol·amu·Å) to Å/ps².
pub const ACCELERATION_CONVERSION: f64 = 418.4;

const ENERGY_LIMIT: f64 = 1e10;
const COORDINATE_LIMIT: f64 = 1e5;

#[derive(Debug, Clone)]
pub struct LangevinEngine {
    forcefield: Forcefield,
}

impl LangevinEngine {
    pub fn new(forcefield: Forcefield) -> Self {
        Self { forcefield }
    }

    pub fn forcefield(&self) -> &Forcefield {
        &self.forcefield
    }
}

pub fn kinetic_energy(masses: &[f64], velocities: &[Vector3<f64>]) -> f64 {
    masses
        .iter()
        .zip(velocities)
        .map(|(m, v)| 0.5 * m * v.norm_squared())
        .sum::<f64>()
        / ACCELERATION_CONVERSION
}

fn degrees_of_freedom(atom_count: usize) -> f64 {
    if atom_count > 1 {
        (3 * atom_count - 3) as f64
    } else {
        3.0
    }
}

pub fn instantaneous_temperature(masses: &[f64], velocities: &[Vector3<f64>]) -> f64 {
    2.0 * kinetic_energy(masses, velocities) / (degrees_of_freedom(masses.len()) * BOLTZMANN)
}

/// Draws velocities from the Maxwell-Boltzmann distribution at `temperature_k`,
/// removes the center-of-mass motion and rescales to the exact temperature.
pub fn maxwell_boltzmann(masses: &[f64], temperature_k: f64, rng: &mut impl Rng) -> Vec<Vector3<f64>> {
    let mut velocities: Vec<Vector3<f64>> = masses
        .iter()
        .map(|&m| {
            let sigma = (BOLTZMANN * temperature_k * ACCELERATION_CONVERSION / m).sqrt();
            Vector3::from_fn(|_, _| sigma * rng.sample::<f64, _>(StandardNormal))
        })
        .collect();

    let total_mass: f64 = masses.iter().sum();
    if masses.len() > 1 && total_mass > 0.0 {
        let momentum = masses
            .iter()
            .zip(&velocities)
            .fold(Vector3::zeros(), |acc, (m, v)| acc + v * *m);
        let drift = momentum / total_mass;
        for v in &mut velocities {
            *v -= drift;
        }
    }

    let current = instantaneous_temperature(masses, &velocities);
    if current > 0.0 && temperature_k > 0.0 {
        let scale = (temperature_k / current).sqrt();
        for v in &mut velocities {
            *v *= scale;
        }
    }
    velocities
}

fn check_energy(step: u64, eval: &ForceEvaluation) -> Result<f64, SimulationError> {
    let total = eval.energy.total();
    if !total.is_finite() || total.abs() > ENERGY_LIMIT {
        return Err(SimulationError::Divergence {
            step,
            reason: format!("potential energy {total:e} kcal/mol is out of range"),
        });
    }
    Ok(total)
}

fn check_coordinates(
    step: u64,
    positions: &[Point3<f64>],
    velocities: &[Vector3<f64>],
) -> Result<(), SimulationError> {
    if let Some(i) = positions
        .iter()
        .position(|p| p.coords.iter().any(|x| !x.is_finite() || x.abs() > COORDINATE_LIMIT))
    {
        return Err(SimulationError::Divergence {
            step,
            reason: format!("atom {i} left the simulation volume"),
        });
    }
    if let Some(i) = velocities.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        return Err(SimulationError::Divergence {
            step,
            reason: format!("atom {i} has a non-finite velocity"),
        });
    }
    Ok(())
}

impl SimulationEngine for LangevinEngine {
    fn name(&self) -> &str {
        "langevin"
    }

    #[instrument(skip_all, name = "md_step", fields(step = step_name))]
    fn run(
        &self,
        step_name: &str,
        mut state: SimulationState,
        params: &SimulationParameters,
        reporting: &ReportingConfig,
        progress: &ProgressReporter,
    ) -> Result<StepOutput, SimulationError> {
        params.validate()?;
        let system = MdSystem::build(state.structure(), &self.forcefield)?;
        let n = system.atom_count();
        let ensemble = params.thermo.ensemble;
        let mut box_dims = state.box_dimensions();
        if ensemble == Ensemble::Npt && box_dims.is_none() {
            return Err(SimulationError::NoPeriodicBox);
        }
        if let Some(b) = &box_dims {
            if system.cutoff > 0.5 * b.min() {
                warn!(
                    cutoff = system.cutoff,
                    shortest_edge = b.min(),
                    "Nonbonded cutoff exceeds half the box; capping it"
                );
            }
        }

        let dt = params.timestep_ps();
        let total_steps = params.total_steps();
        let interval = params.report_interval();
        let temperature = params.thermo.temperature_k;
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut velocities = match state.velocities() {
            Some(v) if v.len() == n => v.to_vec(),
            _ => maxwell_boltzmann(&system.masses, temperature, &mut rng),
        };
        let mut positions = state.positions();
        let mut barostat = match (ensemble, &box_dims) {
            (Ensemble::Npt, Some(b)) => Some(MonteCarloBarostat::new(
                params.thermo.pressure_atm,
                temperature,
                b.x * b.y * b.z,
            )),
            _ => None,
        };

        let friction = if ensemble == Ensemble::Nve {
            0.0
        } else {
            params.thermo.friction_per_ps
        };
        let c1 = (-friction * dt).exp();
        let c2 = (1.0 - c1 * c1).max(0.0).sqrt();
        let noise_scale: Vec<f64> = system
            .masses
            .iter()
            .map(|m| c2 * (BOLTZMANN * temperature * ACCELERATION_CONVERSION / m).sqrt())
            .collect();
        let inverse_mass: Vec<f64> = system
            .masses
            .iter()
            .map(|m| ACCELERATION_CONVERSION / m)
            .collect();

        info!(
            atoms = n,
            %ensemble,
            steps = total_steps,
            temperature_k = temperature,
            "Starting simulation step"
        );
        let mut reports = StepReports::open(reporting, step_name, &params.reporters)?;
        progress.report(Progress::TaskStart {
            total_steps,
        });

        let start_time = state.time_ps();
        let mut eval = evaluate(&system, &positions, box_dims.as_ref());
        let mut potential = check_energy(0, &eval)?;
        let mut temperature_sum = 0.0;
        let mut samples = 0usize;
        let mut last_row = StateDataRow {
            step: 0,
            time_ps: start_time,
            potential_energy: potential,
            kinetic_energy: kinetic_energy(&system.masses, &velocities),
            total_energy: 0.0,
            temperature_k: instantaneous_temperature(&system.masses, &velocities),
            volume_a3: box_dims.map(|b| b.x * b.y * b.z),
        };
        last_row.total_energy = last_row.potential_energy + last_row.kinetic_energy;

        for step in 1..=total_steps {
            for i in 0..n {
                velocities[i] += eval.forces[i] * (0.5 * dt * inverse_mass[i]);
                positions[i] += velocities[i] * (0.5 * dt);
            }
            if friction > 0.0 {
                for i in 0..n {
                    let noise = Vector3::from_fn(|_, _| rng.sample::<f64, _>(StandardNormal));
                    velocities[i] = velocities[i] * c1 + noise * noise_scale[i];
                }
            }
            for i in 0..n {
                positions[i] += velocities[i] * (0.5 * dt);
            }
            eval = evaluate(&system, &positions, box_dims.as_ref());
            for i in 0..n {
                velocities[i] += eval.forces[i] * (0.5 * dt * inverse_mass[i]);
            }
            potential = check_energy(step, &eval)?;

            if let (Some(barostat), Some(dims)) = (barostat.as_mut(), box_dims.as_mut()) {
                if step % params.thermo.barostat_frequency as u64 == 0 {
                    if let MoveResult::Accepted { .. } =
                        barostat.attempt(&system, &mut positions, dims, potential, &mut rng)
                    {
                        eval = evaluate(&system, &positions, Some(&*dims));
                        potential = check_energy(step, &eval)?;
                    }
                }
            }

            if step % interval == 0 || step == total_steps {
                check_coordinates(step, &positions, &velocities)?;
                let kinetic = kinetic_energy(&system.masses, &velocities);
                let temperature_now = instantaneous_temperature(&system.masses, &velocities);
                last_row = StateDataRow {
                    step,
                    time_ps: start_time + step as f64 * dt,
                    potential_energy: potential,
                    kinetic_energy: kinetic,
                    total_energy: potential + kinetic,
                    temperature_k: temperature_now,
                    volume_a3: box_dims.map(|b| b.x * b.y * b.z),
                };
                temperature_sum += temperature_now;
                samples += 1;

                state.set_positions(&positions)?;
                state.set_velocities(velocities.clone());
                state.set_box_dimensions(box_dims);
                if let Some(reports) = reports.as_mut() {
                    reports.record_sample(&state, &last_row)?;
                }
                debug!(
                    step,
                    potential_energy = potential,
                    temperature_k = temperature_now,
                    "Sampled state"
                );
                let done = if step % interval == 0 { interval } else { step % interval };
                progress.report(Progress::TaskIncrement { steps: done });
            }
        }
        progress.report(Progress::TaskFinish);

        state.set_positions(&positions)?;
        state.set_velocities(velocities);
        state.set_box_dimensions(box_dims);
        state.advance_time(total_steps as f64 * dt);

        let report_files = match reports {
            Some(reports) => reports.finish(&state, &last_row)?,
            None => Vec::new(),
        };
        let diagnostics = StepDiagnostics {
            steps: total_steps,
            simulated_time_ps: total_steps as f64 * dt,
            final_potential_energy: last_row.potential_energy,
            final_kinetic_energy: last_row.kinetic_energy,
            mean_temperature_k: if samples > 0 {
                temperature_sum / samples as f64
            } else {
                last_row.temperature_k
            },
            barostat_acceptance: barostat.as_ref().and_then(|b| b.acceptance_rate()),
            samples,
            reports: report_files,
        };
        info!(
            potential_energy = diagnostics.final_potential_energy,
            mean_temperature_k = diagnostics.mean_temperature_k,
            "Simulation step finished"
        );
        Ok(StepOutput {
            final_state: state,
            diagnostics,
        })
    }
}
