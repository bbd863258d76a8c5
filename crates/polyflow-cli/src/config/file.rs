use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileChargingConfig {
    pub method: Option<String>,
    pub library: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRctConfig {
    pub charger: Option<String>,
    pub max_chain_len: Option<usize>,
    /// `reduced` or `full`.
    pub chain_length: Option<String>,
    pub keep_intermediate: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSolventConfig {
    pub density: Option<f64>,
    pub exclusion: Option<f64>,
    #[serde(rename = "box")]
    pub box_dimensions: Option<[f64; 3]>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileForcefieldConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOutputConfig {
    pub prefix: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileAnnealConfig {
    pub params: Option<String>,
    pub step_name: Option<String>,
}

/// One `[[steps]]` entry: a base parameter set plus optional overrides.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileStepConfig {
    pub name: String,
    /// Preset name or parameter file path.
    pub params: String,
    pub ensemble: Option<String>,
    pub temperature_k: Option<f64>,
    pub pressure_atm: Option<f64>,
    pub timestep_fs: Option<f64>,
    pub total_time_ps: Option<f64>,
    pub num_samples: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub seed: Option<u64>,
    pub charging: Option<FileChargingConfig>,
    pub rct: Option<FileRctConfig>,
    pub solvent: Option<FileSolventConfig>,
    pub forcefield: Option<FileForcefieldConfig>,
    pub output: Option<FileOutputConfig>,
    pub anneal: Option<FileAnnealConfig>,
    #[serde(default)]
    pub steps: Vec<FileStepConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Loads `path` when given, otherwise an empty configuration.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn kebab_case_sections_are_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("polyflow.toml");
        fs::write(
            &path,
            r#"
            seed = 7

            [rct]
            charger = "qeq"
            max-chain-len = 120
            chain-length = "full"

            [solvent]
            density = 0.95
            box = [30.0, 30.0, 40.0]

            [[steps]]
            name = "equilibration"
            params = "equilibration"
            temperature-k = 350.0

            [[steps]]
            name = "production"
            params = "runs/production.toml"
            "#,
        )
        .unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        assert_eq!(config.seed, Some(7));
        let rct = config.rct.unwrap();
        assert_eq!(rct.charger.as_deref(), Some("qeq"));
        assert_eq!(rct.max_chain_len, Some(120));
        assert_eq!(rct.chain_length.as_deref(), Some("full"));
        assert_eq!(config.solvent.unwrap().box_dimensions, Some([30.0, 30.0, 40.0]));
        assert_eq!(config.steps.len(), 2);
        assert_eq!(config.steps[0].temperature_k, Some(350.0));
        assert_eq!(config.steps[1].params, "runs/production.toml");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[rct]\nmax_chain_len = 3\n").unwrap();
        assert!(matches!(
            FileConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let result = FileConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(CliError::Io(_))));
        assert!(FileConfig::load_optional(None).unwrap().steps.is_empty());
    }
}
