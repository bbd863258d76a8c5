use thiserror::Error;

/// The monomer group's topology is unsuitable for the requested chain operation.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MorphologyError {
    #[error(
        "monomer group is not linear: {terminals} terminal monomer(s) and {invalid} monomer(s) with neither one nor two ports"
    )]
    NotLinear { terminals: usize, invalid: usize },

    #[error("monomer group contains no interior (two-port) monomer")]
    NoInteriorMonomer,

    #[error("chain length budget of {budget} atoms cannot fit a single repeat unit plus termini ({required} atoms)")]
    BudgetTooSmall { budget: usize, required: usize },

    #[error("repeat count must be at least 1")]
    ZeroRepeat,

    #[error("invalid terminal orientation: {0}")]
    InvalidOrientation(String),

    #[error("failed to assemble chain: {0}")]
    Construction(String),

    #[error("ports of '{left}' and '{right}' have mismatched bond orders")]
    IncompatiblePorts { left: String, right: String },
}
