pub mod anneal;
pub mod assign;
pub mod charge;
pub mod params;
pub mod rct;
pub mod simulate;
pub mod solvate;
