use crate::cli::AssignArgs;
use crate::error::{CliError, Result};
use polyflow::core::monomers::group::MonomerGroup;
use polyflow::workflows;
use tracing::info;

pub async fn run(args: AssignArgs) -> Result<()> {
    info!("Loading monomer group from {:?}", &args.monomers);
    let group = MonomerGroup::load(&args.monomers).map_err(|e| CliError::FileParsing {
        path: args.monomers.clone(),
        source: e.into(),
    })?;

    println!("Assigning residue chemistry to {}...", args.input.display());
    let outcome = tokio::task::block_in_place(|| {
        workflows::assign::run(&args.input, &group, &args.output_dir, args.name.as_deref())
    })?;

    println!(
        "✓ {} residues assigned; annotated molecule written to: {}",
        outcome.structure.residue_count(),
        outcome.output_path.display()
    );
    Ok(())
}
