//! Linear polymer construction.
//!
//! - [`estimation`] - degree-of-polymerization estimation under an atom budget
//! - [`building`] - head-to-tail chain assembly and materialization to a [`Structure`](crate::core::models::structure::Structure)
//! - [`error`] - morphology errors shared by both

pub mod building;
pub mod error;
pub mod estimation;
