use crate::cli::ParamsArgs;
use crate::error::{CliError, Result};
use polyflow::engine::md::SimulationParameters;
use polyflow::engine::md::parameters::PRESET_NAMES;
use tracing::info;

pub async fn run(args: ParamsArgs) -> Result<()> {
    let names: Vec<String> = if args.presets.is_empty() {
        PRESET_NAMES.iter().map(|name| name.to_string()).collect()
    } else {
        args.presets.clone()
    };

    std::fs::create_dir_all(&args.output_dir)?;
    for name in &names {
        let mut params = SimulationParameters::preset(name).ok_or_else(|| {
            CliError::Config(format!(
                "Unknown parameter preset '{}'. Expected one of: {}.",
                name,
                PRESET_NAMES.join(", ")
            ))
        })?;
        if args.seed.is_some() {
            params.seed = args.seed;
        }
        let path = args.output_dir.join(format!("{}.toml", name));
        params.save(&path).map_err(|e| CliError::FileParsing {
            path: path.clone(),
            source: e.into(),
        })?;
        info!(preset = %name, path = %path.display(), "Wrote parameter preset");
        println!(
            "✓ {:<16} {} {:>10} ps at {:>5} K -> {}",
            name,
            params.thermo.ensemble,
            params.integrator.total_time_ps,
            params.thermo.temperature_k,
            path.display()
        );
    }
    Ok(())
}
