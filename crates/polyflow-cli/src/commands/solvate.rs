use crate::cli::SolvateArgs;
use crate::config;
use crate::error::Result;
use polyflow::workflows;
use tracing::{info, warn};

pub async fn run(args: SolvateArgs) -> Result<()> {
    let spec = config::build_solvent_spec(&args)?;
    info!(
        density = spec.density,
        exclusion = spec.exclusion,
        "Resolved solvent settings"
    );

    println!("Solvating {}...", args.input.display());
    let outcome =
        tokio::task::block_in_place(|| workflows::solvate::run(&args.input, &spec, &args.output_dir))?;

    let solvation = &outcome.solvation;
    if solvation.solvent_added < solvation.solvent_requested {
        warn!(
            added = solvation.solvent_added,
            requested = solvation.solvent_requested,
            "Box could not reach the target density"
        );
        println!(
            "Warning: only {} of {} water molecules fit around the solute.",
            solvation.solvent_added, solvation.solvent_requested
        );
    }
    println!(
        "✓ {} water molecules added; solvated system written to: {}",
        solvation.solvent_added,
        outcome.output_path.display()
    );
    Ok(())
}
