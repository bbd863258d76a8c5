use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The polyflow developers",
    version,
    about = "polyflow - Polymer simulation workflows: chemistry assignment, residue library charges, and molecular-dynamics schedules.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assign residue templates to an unannotated PDB structure and write a BGF file.
    Assign(AssignArgs),
    /// Compute partial charges for a BGF molecule with a named charge strategy.
    Charge(ChargeArgs),
    /// Derive residue library charges from a reduced reference chain (RCT protocol).
    Rct(RctArgs),
    /// Anneal a single molecule in vacuum and write the relaxed conformer.
    Anneal(AnnealArgs),
    /// Pack water around a molecule in a periodic box.
    Solvate(SolvateArgs),
    /// Run a multi-step molecular-dynamics schedule on a BGF system.
    Simulate(SimulateArgs),
    /// Write the standard simulation parameter presets as TOML files.
    Params(ParamsArgs),
}

/// Options shared by commands that read a configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S rct.max-chain-len=150
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `assign` subcommand.
#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Path to the input PDB structure.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to the monomer group JSON file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub monomers: PathBuf,

    /// Directory into which the annotated BGF file is written.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Molecule name used for the output file; defaults to the PDB file stem.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,
}

/// Arguments for the `charge` subcommand.
#[derive(Args, Debug)]
pub struct ChargeArgs {
    /// Path to the input BGF molecule.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory into which the charged BGF file is written.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Charge strategy: gasteiger, qeq or rct.
    #[arg(short = 'm', long, value_name = "NAME")]
    pub method: Option<String>,

    /// Residue library charges JSON, required by the rct strategy.
    #[arg(short, long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `rct` subcommand.
#[derive(Args, Debug)]
pub struct RctArgs {
    /// Path to the monomer group JSON file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub monomers: PathBuf,

    /// Directory into which the library charges and the charged reference chain are written.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Molecule name used for output files; defaults to the monomer file stem.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Charge strategy applied to the reference chain.
    #[arg(long, value_name = "NAME")]
    pub charger: Option<String>,

    /// Atom budget of the reduced chain, or the repeat count with --full-chain.
    #[arg(short = 'N', long, value_name = "INT")]
    pub max_chain_len: Option<usize>,

    /// Interpret --max-chain-len as the repeat count instead of an atom budget.
    #[arg(long)]
    pub full_chain: bool,

    /// Terminal orientation overrides. Can be used multiple times. Example: --orient HO=head
    #[arg(long = "orient", value_name = "MONOMER=END")]
    pub orientation: Vec<String>,

    /// Keep the reference chain PDB written during the protocol.
    #[arg(long)]
    pub keep_intermediate: bool,

    /// Text appended to the molecule name of the charged reference chain; empty for none.
    #[arg(short, long, value_name = "TEXT", default_value = "reduced")]
    pub affix: String,

    /// Write the monomer group, with the applied terminal orientation, to this path.
    #[arg(long, value_name = "PATH")]
    pub save_monomers: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `anneal` subcommand.
#[derive(Args, Debug)]
pub struct AnnealArgs {
    /// Path to the input BGF molecule (must contain a single molecule).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory into which reports and the annealed BGF file are written.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Simulation parameters: a preset name or a path to a parameter TOML file.
    #[arg(short, long, value_name = "NAME_OR_PATH")]
    pub params: Option<String>,

    /// Name of the simulation step and its report directory.
    #[arg(long, value_name = "NAME")]
    pub step_name: Option<String>,

    /// Force-field parameter TOML; the built-in parameters are used otherwise.
    #[arg(long, value_name = "PATH")]
    pub forcefield: Option<PathBuf>,

    /// Periodic box edge lengths in Å. Example: --box 40,40,40
    #[arg(long = "box", value_name = "X,Y,Z")]
    pub box_dimensions: Option<String>,

    /// Text appended to the molecule name in the output file name.
    #[arg(short, long, value_name = "TEXT")]
    pub affix: Option<String>,

    /// Seed for velocity initialization and thermostat noise.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `solvate` subcommand.
#[derive(Args, Debug)]
pub struct SolvateArgs {
    /// Path to the input BGF molecule.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory into which the solvated BGF file is written.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Periodic box edge lengths in Å; defaults to the molecule's own box.
    #[arg(long = "box", value_name = "X,Y,Z")]
    pub box_dimensions: Option<String>,

    /// Target density of the solvated box in g/cm³.
    #[arg(short, long, value_name = "FLOAT")]
    pub density: Option<f64>,

    /// Minimum solvent to solute atom distance in Å.
    #[arg(short, long, value_name = "FLOAT")]
    pub exclusion: Option<f64>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to the input BGF system.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory into which per-step reports and the final BGF file are written.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Schedule steps in execution order, appended after any steps from the config file.
    /// Can be used multiple times. Example: --step equilibration=equilibration
    #[arg(long = "step", value_name = "NAME=PRESET_OR_PATH")]
    pub steps: Vec<String>,

    /// Force-field parameter TOML; the built-in parameters are used otherwise.
    #[arg(long, value_name = "PATH")]
    pub forcefield: Option<PathBuf>,

    /// Periodic box edge lengths in Å, replacing any box in the input file.
    #[arg(long = "box", value_name = "X,Y,Z")]
    pub box_dimensions: Option<String>,

    /// Prefix for report file names; defaults to the molecule name.
    #[arg(long, value_name = "TEXT")]
    pub prefix: Option<String>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `params` subcommand.
#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// Directory into which the parameter files are written.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Presets to write; all standard presets when omitted.
    #[arg(value_name = "PRESET")]
    pub presets: Vec<String>,

    /// Seed stored in every written parameter file.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,
}
