use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileStepConfig};
use super::models::{AnnealConfig, ScheduleConfig};
use crate::cli::{AnnealArgs, ChargeArgs, ConfigArgs, RctArgs, SimulateArgs, SolvateArgs};
use crate::error::{CliError, Result};
use crate::utils::parser::{self, ParamsSource};
use nalgebra::Vector3;
use polyflow::core::forcefield::params::Forcefield;
use polyflow::engine::config::{
    ChainLengthPolicy, ChargerConfig, ConfigError, RctConfig, RctConfigBuilder,
};
use polyflow::engine::error::EngineError;
use polyflow::engine::md::SimulationParameters;
use polyflow::engine::md::parameters::PRESET_NAMES;
use polyflow::engine::solvent::SolventSpec;
use polyflow::workflows::schedule::SimulationSchedule;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub fn build_charger_config(args: &ChargeArgs) -> Result<ChargerConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_config(&args.config)?;
    let charging = file_config.charging.take().unwrap_or_default();

    let method = args
        .method
        .clone()
        .or(charging.method)
        .unwrap_or(defaults.charger);
    let library = args.library.clone().or(charging.library);
    ChargerConfig::from_name(&method, library).map_err(|e| CliError::Config(e.to_string()))
}

pub fn build_rct_config(args: &RctArgs) -> Result<RctConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_config(&args.config)?;
    let rct_file = file_config.rct.take().unwrap_or_default();
    let charging = file_config.charging.take().unwrap_or_default();

    let charger = args
        .charger
        .clone()
        .or(rct_file.charger)
        .unwrap_or(defaults.charger);
    let max_chain_len = args
        .max_chain_len
        .or(rct_file.max_chain_len)
        .unwrap_or(defaults.max_chain_len);
    let policy = if args.full_chain {
        ChainLengthPolicy::Full
    } else {
        match rct_file.chain_length.as_deref() {
            None => ChainLengthPolicy::default(),
            Some(text) => parse_chain_length(text)?,
        }
    };

    let mut builder = RctConfigBuilder::new()
        .charger(&charger)
        .max_chain_len(max_chain_len)
        .chain_length_policy(policy);
    if let Some(library) = charging.library {
        builder = builder.library_path(library);
    }
    if let Some(orientation) = parser::parse_orientation(&args.orientation)? {
        builder = builder.orientation(orientation);
    }
    if args.keep_intermediate || rct_file.keep_intermediate.unwrap_or(false) {
        builder = builder.keep_intermediate(args.output_dir.clone());
    }
    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

pub fn build_anneal_config(args: &AnnealArgs) -> Result<AnnealConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_config(&args.config)?;
    let anneal_file = file_config.anneal.take().unwrap_or_default();
    let forcefield_file = file_config.forcefield.take().unwrap_or_default();

    let source = args
        .params
        .clone()
        .or(anneal_file.params)
        .unwrap_or(defaults.anneal_params);
    let mut params = resolve_parameters(&source)?;
    if let Some(seed) = args.seed.or(file_config.seed) {
        params.seed = Some(seed);
    }
    let step_name = args
        .step_name
        .clone()
        .or(anneal_file.step_name)
        .unwrap_or(defaults.anneal_step_name);
    let forcefield = load_forcefield(args.forcefield.as_deref().or(forcefield_file.path.as_deref()))?;

    Ok(AnnealConfig {
        params,
        step_name,
        forcefield,
    })
}

pub fn build_solvent_spec(args: &SolvateArgs) -> Result<SolventSpec> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_config(&args.config)?;
    let solvent_file = file_config.solvent.take().unwrap_or_default();

    let box_dimensions = match &args.box_dimensions {
        Some(text) => Some(parser::parse_box_dimensions(text)?),
        None => solvent_file.box_dimensions.map(Vector3::from),
    };
    Ok(SolventSpec {
        density: args.density.or(solvent_file.density).unwrap_or(defaults.density),
        exclusion: args
            .exclusion
            .or(solvent_file.exclusion)
            .unwrap_or(defaults.exclusion),
        box_dimensions,
    })
}

/// Steps come from the config file's `[[steps]]` in order, then from `--step`.
pub fn build_schedule_config(args: &SimulateArgs) -> Result<ScheduleConfig> {
    let mut file_config = load_config(&args.config)?;
    let forcefield_file = file_config.forcefield.take().unwrap_or_default();
    let output_file = file_config.output.take().unwrap_or_default();
    let seed = file_config.seed;

    let mut schedule = SimulationSchedule::new();
    for step in &file_config.steps {
        let mut params = apply_step_overrides(resolve_parameters(&step.params)?, step)?;
        if params.seed.is_none() {
            params.seed = seed;
        }
        add_step(&mut schedule, &step.name, params)?;
    }
    for pair in &args.steps {
        let (name, source) = parser::parse_key_value(pair)?;
        let mut params = resolve_parameters(source)?;
        if params.seed.is_none() {
            params.seed = seed;
        }
        add_step(&mut schedule, name, params)?;
    }
    if schedule.is_empty() {
        return Err(CliError::Config(
            "No simulation steps given. Add [[steps]] to the config file or pass --step NAME=PRESET_OR_PATH."
                .to_string(),
        ));
    }

    let forcefield = load_forcefield(args.forcefield.as_deref().or(forcefield_file.path.as_deref()))?;
    Ok(ScheduleConfig {
        schedule,
        forcefield,
        prefix: args.prefix.clone().or(output_file.prefix),
    })
}

fn add_step(schedule: &mut SimulationSchedule, name: &str, params: SimulationParameters) -> Result<()> {
    debug!(step = name, "Adding simulation step");
    schedule
        .add_step(name, params)
        .map_err(|e| CliError::Config(e.to_string()))
}

fn load_config(args: &ConfigArgs) -> Result<FileConfig> {
    let file_config = FileConfig::load_optional(args.config.as_deref())?;
    apply_set_values(file_config, &args.set_values)
}

/// A preset name or a parameter TOML path.
fn resolve_parameters(name_or_path: &str) -> Result<SimulationParameters> {
    match parser::parse_params_source(name_or_path) {
        ParamsSource::Preset(name) => SimulationParameters::preset(&name).ok_or_else(|| {
            CliError::Config(format!(
                "Unknown parameter preset '{}'. Expected a parameter file path or one of: {}.",
                name,
                PRESET_NAMES.join(", ")
            ))
        }),
        ParamsSource::File(path) => {
            SimulationParameters::load(&path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })
        }
    }
}

fn load_forcefield(path: Option<&Path>) -> Result<Forcefield> {
    match path {
        Some(path) => Forcefield::load(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        }),
        None => Forcefield::builtin().map_err(|e| CliError::Core(EngineError::from(e))),
    }
}

fn apply_step_overrides(
    mut params: SimulationParameters,
    step: &FileStepConfig,
) -> Result<SimulationParameters> {
    if let Some(ensemble) = &step.ensemble {
        params.thermo.ensemble = ensemble
            .parse()
            .map_err(|e: ConfigError| CliError::Config(e.to_string()))?;
    }
    if let Some(t) = step.temperature_k {
        params.thermo.temperature_k = t;
    }
    if let Some(p) = step.pressure_atm {
        params.thermo.pressure_atm = p;
    }
    if let Some(dt) = step.timestep_fs {
        params.integrator.timestep_fs = dt;
    }
    if let Some(total) = step.total_time_ps {
        params.integrator.total_time_ps = total;
    }
    if let Some(samples) = step.num_samples {
        params.integrator.num_samples = samples;
    }
    params.validate().map_err(|e| {
        CliError::Config(format!("Step '{}' has invalid parameters: {}", step.name, e))
    })?;
    Ok(params)
}

fn parse_chain_length(text: &str) -> Result<ChainLengthPolicy> {
    match text.trim().to_ascii_lowercase().as_str() {
        "reduced" => Ok(ChainLengthPolicy::Reduced),
        "full" => Ok(ChainLengthPolicy::Full),
        other => Err(CliError::Config(format!(
            "Invalid rct.chain-length '{}'. Expected 'reduced' or 'full'.",
            other
        ))),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) = parser::parse_key_value(kv_pair)?;

        match key {
            "seed" => config.seed = Some(parse_value(key, value, "integer")?),
            "charging.method" => {
                config.charging.get_or_insert_with(Default::default).method = Some(value.to_string());
            }
            "charging.library" => {
                config.charging.get_or_insert_with(Default::default).library = Some(PathBuf::from(value));
            }
            "rct.charger" => {
                config.rct.get_or_insert_with(Default::default).charger = Some(value.to_string());
            }
            "rct.max-chain-len" => {
                config.rct.get_or_insert_with(Default::default).max_chain_len =
                    Some(parse_value(key, value, "integer")?);
            }
            "rct.chain-length" => {
                parse_chain_length(value)?;
                config.rct.get_or_insert_with(Default::default).chain_length = Some(value.to_string());
            }
            "rct.keep-intermediate" => {
                config.rct.get_or_insert_with(Default::default).keep_intermediate =
                    Some(parse_value(key, value, "boolean")?);
            }
            "solvent.density" => {
                config.solvent.get_or_insert_with(Default::default).density =
                    Some(parse_value(key, value, "float")?);
            }
            "solvent.exclusion" => {
                config.solvent.get_or_insert_with(Default::default).exclusion =
                    Some(parse_value(key, value, "float")?);
            }
            "forcefield.path" => {
                config.forcefield.get_or_insert_with(Default::default).path = Some(PathBuf::from(value));
            }
            "output.prefix" => {
                config.output.get_or_insert_with(Default::default).prefix = Some(value.to_string());
            }
            "anneal.params" => {
                config.anneal.get_or_insert_with(Default::default).params = Some(value.to_string());
            }
            "anneal.step-name" => {
                config.anneal.get_or_insert_with(Default::default).step_name = Some(value.to_string());
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyflow::engine::charger::ChargerKind;
    use polyflow::engine::md::Ensemble;
    use std::fs;
    use tempfile::tempdir;

    fn rct_args(output_dir: &Path) -> RctArgs {
        RctArgs {
            monomers: PathBuf::from("peg.json"),
            output_dir: output_dir.to_path_buf(),
            name: None,
            charger: None,
            max_chain_len: None,
            full_chain: false,
            orientation: vec![],
            keep_intermediate: false,
            affix: "reduced".to_string(),
            save_monomers: None,
            config: ConfigArgs::default(),
        }
    }

    fn simulate_args(config: Option<PathBuf>) -> SimulateArgs {
        SimulateArgs {
            input: PathBuf::from("in.bgf"),
            output_dir: PathBuf::from("out"),
            steps: vec![],
            forcefield: None,
            box_dimensions: None,
            prefix: None,
            config: ConfigArgs {
                config,
                set_values: vec![],
            },
        }
    }

    #[test]
    fn rct_config_uses_defaults_without_a_file() {
        let dir = tempdir().unwrap();
        let config = build_rct_config(&rct_args(dir.path())).unwrap();
        assert_eq!(config.charger.kind, ChargerKind::Gasteiger);
        assert_eq!(config.max_chain_len, DefaultsConfig::default().max_chain_len);
        assert_eq!(config.chain_length_policy, ChainLengthPolicy::Reduced);
        assert!(config.keep_intermediate.is_none());
        assert!(config.orientation.is_none());
    }

    #[test]
    fn cli_overrides_set_values_which_override_the_file() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("polyflow.toml");
        fs::write(
            &cfg_path,
            r#"
            [rct]
            charger = "qeq"
            max-chain-len = 90
            chain-length = "full"
            "#,
        )
        .unwrap();

        let mut args = rct_args(dir.path());
        args.config.config = Some(cfg_path);
        args.config.set_values = vec!["rct.max-chain-len=60".to_string()];
        let config = build_rct_config(&args).unwrap();
        assert_eq!(config.charger.kind, ChargerKind::Qeq);
        assert_eq!(config.max_chain_len, 60);
        assert_eq!(config.chain_length_policy, ChainLengthPolicy::Full);

        args.charger = Some("gasteiger".to_string());
        args.max_chain_len = Some(40);
        args.orientation = vec!["HO=head".to_string(), "FL=tail".to_string()];
        args.keep_intermediate = true;
        let config = build_rct_config(&args).unwrap();
        assert_eq!(config.charger.kind, ChargerKind::Gasteiger);
        assert_eq!(config.max_chain_len, 40);
        assert_eq!(config.orientation.unwrap().len(), 2);
        assert_eq!(config.keep_intermediate, Some(dir.path().to_path_buf()));
    }

    #[test]
    fn rct_charger_without_library_is_a_config_error() {
        let dir = tempdir().unwrap();
        let mut args = rct_args(dir.path());
        args.charger = Some("rct".to_string());
        assert!(matches!(build_rct_config(&args), Err(CliError::Config(_))));

        args.charger = Some("am1bcc".to_string());
        assert!(matches!(build_rct_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn unsupported_set_key_is_rejected() {
        let result = apply_set_values(FileConfig::default(), &["rct.depth=3".to_string()]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("rct.depth")));

        let result = apply_set_values(FileConfig::default(), &["seed=abc".to_string()]);
        assert!(matches!(result, Err(CliError::Config(_))));

        let result = apply_set_values(FileConfig::default(), &["seed".to_string()]);
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn charger_config_reads_library_from_file() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("charge.toml");
        fs::write(
            &cfg_path,
            "[charging]\nmethod = \"rct\"\nlibrary = \"peg_residue_charges.json\"\n",
        )
        .unwrap();
        let args = ChargeArgs {
            input: PathBuf::from("peg.bgf"),
            output_dir: dir.path().to_path_buf(),
            method: None,
            library: None,
            config: ConfigArgs {
                config: Some(cfg_path),
                set_values: vec![],
            },
        };
        let config = build_charger_config(&args).unwrap();
        assert_eq!(config.kind, ChargerKind::Rct);
        assert_eq!(config.library_path, Some(PathBuf::from("peg_residue_charges.json")));
    }

    #[test]
    fn schedule_combines_file_steps_and_cli_steps_in_order() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("schedule.toml");
        fs::write(
            &cfg_path,
            r#"
            seed = 11

            [output]
            prefix = "peg"

            [[steps]]
            name = "anneal"
            params = "anneal"
            temperature-k = 500.0
            total-time-ps = 10.0

            [[steps]]
            name = "equilibration"
            params = "equilibration"
            ensemble = "nvt"
            "#,
        )
        .unwrap();

        let mut args = simulate_args(Some(cfg_path));
        args.steps = vec!["production=production_lite".to_string()];
        let config = build_schedule_config(&args).unwrap();

        let steps: Vec<_> = config.schedule.steps().collect();
        assert_eq!(
            steps.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            vec!["anneal", "equilibration", "production"]
        );
        assert_eq!(steps[0].1.thermo.temperature_k, 500.0);
        assert_eq!(steps[0].1.integrator.total_time_ps, 10.0);
        assert_eq!(steps[1].1.thermo.ensemble, Ensemble::Nvt);
        assert!(steps.iter().all(|(_, p)| p.seed == Some(11)));
        assert_eq!(config.prefix.as_deref(), Some("peg"));
    }

    #[test]
    fn schedule_rejects_duplicates_and_empty_schedules() {
        let mut args = simulate_args(None);
        assert!(matches!(build_schedule_config(&args), Err(CliError::Config(_))));

        args.steps = vec!["anneal=anneal".to_string(), "anneal=production".to_string()];
        assert!(matches!(build_schedule_config(&args), Err(CliError::Config(_))));

        args.steps = vec!["anneal=melt".to_string()];
        assert!(matches!(build_schedule_config(&args), Err(CliError::Config(msg)) if msg.contains("melt")));
    }

    #[test]
    fn parameter_files_are_resolved_by_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut params = SimulationParameters::preset("production_lite").unwrap();
        params.thermo.temperature_k = 275.0;
        params.save(&path).unwrap();

        let loaded = resolve_parameters(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, params);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            resolve_parameters(missing.to_str().unwrap()),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn solvent_spec_merges_box_from_cli_or_file() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("solvent.toml");
        fs::write(&cfg_path, "[solvent]\ndensity = 0.9\nbox = [20.0, 20.0, 20.0]\n").unwrap();

        let mut args = SolvateArgs {
            input: PathBuf::from("peg.bgf"),
            output_dir: dir.path().to_path_buf(),
            box_dimensions: None,
            density: None,
            exclusion: None,
            config: ConfigArgs {
                config: Some(cfg_path),
                set_values: vec!["solvent.exclusion=3.0".to_string()],
            },
        };
        let spec = build_solvent_spec(&args).unwrap();
        assert_eq!(spec.density, 0.9);
        assert_eq!(spec.exclusion, 3.0);
        assert_eq!(spec.box_dimensions, Some(Vector3::new(20.0, 20.0, 20.0)));

        args.box_dimensions = Some("25,25,30".to_string());
        let spec = build_solvent_spec(&args).unwrap();
        assert_eq!(spec.box_dimensions, Some(Vector3::new(25.0, 25.0, 30.0)));
    }

    #[test]
    fn anneal_config_defaults_to_the_anneal_preset() {
        let args = AnnealArgs {
            input: PathBuf::from("peg.bgf"),
            output_dir: PathBuf::from("out"),
            params: None,
            step_name: None,
            forcefield: None,
            box_dimensions: None,
            affix: None,
            seed: Some(5),
            config: ConfigArgs::default(),
        };
        let config = build_anneal_config(&args).unwrap();
        let mut expected = SimulationParameters::preset("anneal").unwrap();
        expected.seed = Some(5);
        assert_eq!(config.params, expected);
        assert_eq!(config.step_name, "anneal");
    }
}
