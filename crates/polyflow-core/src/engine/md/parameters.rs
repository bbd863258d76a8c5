//! Simulation parameters and the standard parameter presets.

use crate::core::forcefield::params::ParamLoadError;
use crate::engine::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ensemble {
    Nve,
    Nvt,
    Npt,
}

impl FromStr for Ensemble {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NVE" => Ok(Self::Nve),
            "NVT" => Ok(Self::Nvt),
            "NPT" => Ok(Self::Npt),
            _ => Err(ConfigError::Invalid {
                name: "ensemble",
                reason: format!("'{s}' is not one of NVE, NVT, NPT"),
            }),
        }
    }
}

impl fmt::Display for Ensemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nve => "NVE",
            Self::Nvt => "NVT",
            Self::Npt => "NPT",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratorParams {
    pub timestep_fs: f64,
    pub total_time_ps: f64,
    pub num_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermoParams {
    pub ensemble: Ensemble,
    pub temperature_k: f64,
    pub pressure_atm: f64,
    pub friction_per_ps: f64,
    pub barostat_frequency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterParams {
    /// Final state (positions, velocities, box, energies) as JSON.
    pub state: bool,
    /// Periodic restartable checkpoint as JSON.
    pub checkpoint: bool,
    /// Per-sample thermodynamic data as CSV.
    pub state_data: bool,
    /// Per-sample coordinates as multi-model PDB.
    pub trajectory: bool,
}

impl ReporterParams {
    pub fn all() -> Self {
        Self {
            state: true,
            checkpoint: true,
            state_data: true,
            trajectory: true,
        }
    }

    pub fn none() -> Self {
        Self {
            state: false,
            checkpoint: false,
            state_data: false,
            trajectory: false,
        }
    }

    pub fn any(&self) -> bool {
        self.state || self.checkpoint || self.state_data || self.trajectory
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub integrator: IntegratorParams,
    pub thermo: ThermoParams,
    pub reporters: ReporterParams,
    /// Seed for velocity initialization and the thermostat noise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

pub const PRESET_NAMES: [&str; 4] = ["anneal", "equilibration", "production_lite", "production"];

impl SimulationParameters {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let params: Self = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path_str,
            source: e,
        })?;
        params.validate().map_err(|e| match e {
            ConfigError::Invalid { name, reason } => ParamLoadError::Invalid { name, reason },
            other => ParamLoadError::Invalid {
                name: "simulation",
                reason: other.to_string(),
            },
        })?;
        Ok(params)
    }

    pub fn save(&self, path: &Path) -> Result<(), ParamLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let content = toml::to_string_pretty(self).map_err(|e| ParamLoadError::Invalid {
            name: "simulation",
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ParamLoadError::Io {
            path: path_str,
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &'static str, reason: &str| {
            Err(ConfigError::Invalid {
                name,
                reason: reason.to_string(),
            })
        };
        let integ = &self.integrator;
        let thermo = &self.thermo;
        if !is_positive(integ.timestep_fs) {
            return invalid("timestep_fs", "must be positive");
        }
        if !is_positive(integ.total_time_ps) {
            return invalid("total_time_ps", "must be positive");
        }
        if integ.num_samples == 0 {
            return invalid("num_samples", "must be at least 1");
        }
        if integ.num_samples as u64 > self.total_steps() {
            return invalid("num_samples", "exceeds the number of integration steps");
        }
        if thermo.ensemble != Ensemble::Nve && !is_positive(thermo.temperature_k) {
            return invalid("temperature_k", "must be positive for NVT and NPT");
        }
        if thermo.friction_per_ps < 0.0 {
            return invalid("friction_per_ps", "must not be negative");
        }
        if thermo.ensemble == Ensemble::Npt {
            if !is_positive(thermo.pressure_atm) {
                return invalid("pressure_atm", "must be positive for NPT");
            }
            if thermo.barostat_frequency == 0 {
                return invalid("barostat_frequency", "must be at least 1 for NPT");
            }
        }
        Ok(())
    }

    pub fn timestep_ps(&self) -> f64 {
        self.integrator.timestep_fs * 1e-3
    }

    pub fn total_steps(&self) -> u64 {
        (self.integrator.total_time_ps / self.timestep_ps()).round() as u64
    }

    /// Integration steps between consecutive samples.
    pub fn report_interval(&self) -> u64 {
        (self.total_steps() / self.integrator.num_samples.max(1) as u64).max(1)
    }

    /// The standard parameter sets, by name.
    pub fn preset(name: &str) -> Option<Self> {
        let (total_time_ps, num_samples, ensemble, temperature_k, barostat_frequency) = match name {
            "anneal" => (1_000.0, 100, Ensemble::Nvt, 600.0, 25),
            "equilibration" => (50.0, 100, Ensemble::Npt, 300.0, 100),
            "production_lite" => (100.0, 50, Ensemble::Nvt, 300.0, 100),
            "production" => (100_000.0, 5_000, Ensemble::Nvt, 300.0, 100),
            _ => return None,
        };
        Some(Self {
            integrator: IntegratorParams {
                timestep_fs: 2.0,
                total_time_ps,
                num_samples,
            },
            thermo: ThermoParams {
                ensemble,
                temperature_k,
                pressure_atm: 1.0,
                friction_per_ps: 1.0,
                barostat_frequency,
            },
            reporters: ReporterParams::all(),
            seed: None,
        })
    }
}

fn is_positive(value: f64) -> bool {
    value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn presets_match_standard_protocols() {
        let anneal = SimulationParameters::preset("anneal").unwrap();
        assert_eq!(anneal.thermo.ensemble, Ensemble::Nvt);
        assert_eq!(anneal.thermo.temperature_k, 600.0);
        assert_eq!(anneal.total_steps(), 500_000);
        assert_eq!(anneal.report_interval(), 5_000);

        let equil = SimulationParameters::preset("equilibration").unwrap();
        assert_eq!(equil.thermo.ensemble, Ensemble::Npt);
        assert_eq!(equil.total_steps(), 25_000);

        for name in PRESET_NAMES {
            let params = SimulationParameters::preset(name).unwrap();
            params.validate().unwrap();
            assert!(params.reporters.any());
        }
        assert!(SimulationParameters::preset("minimize").is_none());
    }

    #[test]
    fn save_and_load_round_trip_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("equilibration_params.toml");
        let mut params = SimulationParameters::preset("equilibration").unwrap();
        params.seed = Some(42);
        params.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("ensemble = \"NPT\""));
        assert_eq!(SimulationParameters::load(&path).unwrap(), params);
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            r#"
            [integrator]
            timestep_fs = 2.0
            total_time_ps = 0.01
            num_samples = 10

            [thermo]
            ensemble = "NVT"
            temperature_k = 300.0
            pressure_atm = 1.0
            friction_per_ps = 1.0
            barostat_frequency = 25

            [reporters]
            state = false
            checkpoint = false
            state_data = false
            trajectory = false
            "#,
        )
        .unwrap();
        assert!(matches!(
            SimulationParameters::load(&path),
            Err(ParamLoadError::Invalid { name: "num_samples", .. })
        ));
    }

    #[test]
    fn validate_checks_ensemble_specific_fields() {
        let mut params = SimulationParameters::preset("equilibration").unwrap();
        params.thermo.barostat_frequency = 0;
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Invalid { name: "barostat_frequency", .. })
        ));

        let mut nve = SimulationParameters::preset("production_lite").unwrap();
        nve.thermo.ensemble = Ensemble::Nve;
        nve.thermo.temperature_k = 0.0;
        assert!(nve.validate().is_ok());
    }

    #[test]
    fn ensemble_parses_case_insensitively() {
        assert_eq!("npt".parse::<Ensemble>().unwrap(), Ensemble::Npt);
        assert_eq!(Ensemble::Nvt.to_string(), "NVT");
        assert!("NPH".parse::<Ensemble>().is_err());
    }
}
