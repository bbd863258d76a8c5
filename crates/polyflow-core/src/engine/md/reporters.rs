use super::error::SimulationError;
use super::parameters::ReporterParams;
use super::state::{Checkpoint, SimulationState};
use crate::core::io::pdb::PdbFile;
use crate::engine::config::ReportingConfig;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One sampled row of thermodynamic data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateDataRow {
    pub step: u64,
    pub time_ps: f64,
    pub potential_energy: f64,
    pub kinetic_energy: f64,
    pub total_energy: f64,
    pub temperature_k: f64,
    /// Box volume in Å³; empty for non-periodic systems.
    pub volume_a3: Option<f64>,
}

fn io_error(path: &Path, source: std::io::Error) -> SimulationError {
    SimulationError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

/// The report files of one simulation step.
pub struct StepReports {
    dir: PathBuf,
    prefix: String,
    enabled: ReporterParams,
    state_data: Option<(PathBuf, csv::Writer<File>)>,
    trajectory: Option<(PathBuf, BufWriter<File>)>,
    frames: usize,
}

impl StepReports {
    /// Opens the reports requested by `enabled` under the step directory.
    ///
    /// Returns `None` when reporting is disabled or no reporter is enabled.
    pub fn open(
        reporting: &ReportingConfig,
        step_name: &str,
        enabled: &ReporterParams,
    ) -> Result<Option<Self>, SimulationError> {
        let Some(dir) = reporting.step_dir(step_name) else {
            return Ok(None);
        };
        if !enabled.any() {
            return Ok(None);
        }
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        let prefix = if reporting.prefix.is_empty() {
            "sim".to_string()
        } else {
            reporting.prefix.clone()
        };

        let mut reports = Self {
            dir,
            prefix,
            enabled: enabled.clone(),
            state_data: None,
            trajectory: None,
            frames: 0,
        };
        if enabled.state_data {
            let path = reports.file_path("state_data.csv");
            let writer = csv::Writer::from_path(&path).map_err(|e| SimulationError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
            reports.state_data = Some((path, writer));
        }
        if enabled.trajectory {
            let path = reports.file_path("traj.pdb");
            let file = File::create(&path).map_err(|e| io_error(&path, e))?;
            reports.trajectory = Some((path, BufWriter::new(file)));
        }
        debug!(dir = %reports.dir.display(), "Opened step reports");
        Ok(Some(reports))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{}", self.prefix, suffix))
    }

    /// Writes one sample to every enabled periodic reporter.
    pub fn record_sample(&mut self, state: &SimulationState, row: &StateDataRow) -> Result<(), SimulationError> {
        if let Some((path, writer)) = self.state_data.as_mut() {
            writer.serialize(row).map_err(|e| SimulationError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
        }
        if let Some((path, writer)) = self.trajectory.as_mut() {
            self.frames += 1;
            let trajectory_error = |e| SimulationError::Trajectory {
                path: path.to_string_lossy().to_string(),
                source: e,
            };
            if let Some(dims) = state.box_dimensions() {
                PdbFile::write_cryst1(&dims, writer).map_err(trajectory_error)?;
            }
            PdbFile::write_model(state.structure(), &state.positions(), self.frames, writer)
                .map_err(trajectory_error)?;
        }
        if self.enabled.checkpoint {
            Checkpoint::capture(state, row.step, row.potential_energy, row.kinetic_energy)
                .save(&self.file_path("checkpoint.json"))?;
        }
        Ok(())
    }

    /// Flushes the periodic reporters, writes the final state and returns every
    /// file produced for this step.
    pub fn finish(mut self, state: &SimulationState, last: &StateDataRow) -> Result<Vec<PathBuf>, SimulationError> {
        let mut written = Vec::new();
        if let Some((path, mut writer)) = self.state_data.take() {
            writer.flush().map_err(|e| io_error(&path, e))?;
            written.push(path);
        }
        if let Some((path, mut writer)) = self.trajectory.take() {
            writeln!(writer, "END")
                .and_then(|_| writer.flush())
                .map_err(|e| io_error(&path, e))?;
            written.push(path);
        }
        if self.enabled.checkpoint {
            written.push(self.file_path("checkpoint.json"));
        }
        if self.enabled.state {
            let path = self.file_path("state.json");
            Checkpoint::capture(state, last.step, last.potential_energy, last.kinetic_energy).save(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}
