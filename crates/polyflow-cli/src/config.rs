//! Layered configuration for the CLI: built-in defaults, then the TOML file,
//! then `-S KEY=VALUE` overrides, then explicit command-line flags.

mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{
    build_anneal_config, build_charger_config, build_rct_config, build_schedule_config,
    build_solvent_spec,
};
pub use models::{AnnealConfig, ScheduleConfig};
