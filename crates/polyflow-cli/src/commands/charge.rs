use crate::cli::ChargeArgs;
use crate::config;
use crate::error::Result;
use polyflow::workflows;
use tracing::info;

pub async fn run(args: ChargeArgs) -> Result<()> {
    let charger_config = config::build_charger_config(&args)?;
    info!(method = %charger_config.kind, "Resolved charge strategy");

    println!(
        "Charging {} with the {} strategy...",
        args.input.display(),
        charger_config.kind
    );
    let outcome = tokio::task::block_in_place(|| {
        workflows::charge::run(&args.input, &charger_config, &args.output_dir)
    })?;

    let net: f64 = outcome.structure.partial_charges().iter().sum();
    println!(
        "✓ Charged molecule (net charge {:+.4} e) written to: {}",
        net,
        outcome.output_path.display()
    );
    Ok(())
}
