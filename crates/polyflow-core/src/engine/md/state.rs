use super::error::SimulationError;
use crate::core::models::structure::Structure;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The state threaded through a simulation schedule.
///
/// The structure carries the topology, current positions and periodic box;
/// velocities exist once a step has run (or a checkpoint was restored).
#[derive(Debug, Clone)]
pub struct SimulationState {
    structure: Structure,
    velocities: Option<Vec<Vector3<f64>>>,
    time_ps: f64,
}

impl SimulationState {
    pub fn new(structure: Structure) -> Self {
        Self {
            structure,
            velocities: None,
            time_ps: 0.0,
        }
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn into_structure(self) -> Structure {
        self.structure
    }

    pub fn atom_count(&self) -> usize {
        self.structure.atom_count()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.structure.positions()
    }

    pub fn set_positions(&mut self, positions: &[Point3<f64>]) -> Result<(), SimulationError> {
        self.structure
            .set_positions(positions)
            .map_err(|e| SimulationError::StateMismatch(e.to_string()))
    }

    pub fn velocities(&self) -> Option<&[Vector3<f64>]> {
        self.velocities.as_deref()
    }

    pub fn set_velocities(&mut self, velocities: Vec<Vector3<f64>>) {
        self.velocities = Some(velocities);
    }

    pub fn box_dimensions(&self) -> Option<Vector3<f64>> {
        self.structure.box_dimensions()
    }

    pub fn set_box_dimensions(&mut self, dims: Option<Vector3<f64>>) {
        self.structure.set_box_dimensions(dims);
    }

    pub fn time_ps(&self) -> f64 {
        self.time_ps
    }

    pub fn advance_time(&mut self, dt_ps: f64) {
        self.time_ps += dt_ps;
    }

    /// Restores positions, velocities, box and time from a checkpoint.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), SimulationError> {
        if checkpoint.positions.len() != self.atom_count() {
            return Err(SimulationError::StateMismatch(format!(
                "checkpoint holds {} atoms but the system has {}",
                checkpoint.positions.len(),
                self.atom_count()
            )));
        }
        let positions: Vec<Point3<f64>> = checkpoint.positions.iter().map(|p| Point3::from(*p)).collect();
        self.set_positions(&positions)?;
        self.velocities = checkpoint
            .velocities
            .as_ref()
            .map(|v| v.iter().map(|x| Vector3::from(*x)).collect());
        self.set_box_dimensions(checkpoint.box_dimensions.map(Vector3::from));
        self.time_ps = checkpoint.time_ps;
        Ok(())
    }
}

/// Serialized snapshot of a simulation, written by the checkpoint and state
/// reporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: u64,
    pub time_ps: f64,
    pub potential_energy: f64,
    pub kinetic_energy: f64,
    pub positions: Vec<[f64; 3]>,
    #[serde(default)]
    pub velocities: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    pub box_dimensions: Option<[f64; 3]>,
}

impl Checkpoint {
    pub fn capture(state: &SimulationState, step: u64, potential_energy: f64, kinetic_energy: f64) -> Self {
        Self {
            step,
            time_ps: state.time_ps(),
            potential_energy,
            kinetic_energy,
            positions: state.positions().iter().map(|p| [p.x, p.y, p.z]).collect(),
            velocities: state
                .velocities()
                .map(|v| v.iter().map(|x| [x.x, x.y, x.z]).collect()),
            box_dimensions: state.box_dimensions().map(|b| [b.x, b.y, b.z]),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SimulationError> {
        let path_str = path.to_string_lossy().to_string();
        let json = serde_json::to_string(self).map_err(|e| SimulationError::Json {
            path: path_str.clone(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| SimulationError::Io {
            path: path_str,
            source: e,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SimulationError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| SimulationError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| SimulationError::Json {
            path: path_str,
            source: e,
        })
    }
}
