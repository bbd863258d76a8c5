//! Monomer templates and monomer groups.
//!
//! A [`template::MonomerTemplate`] is a connected substructure pattern with
//! attachment ports; a [`group::MonomerGroup`] collects templates under names
//! and records which terminal monomers cap the head and tail of a chain.
//! Monomer files are JSON and may describe templates either as explicit-hydrogen
//! SMARTS (see [`smarts`]) or as explicit atom/bond lists.

pub mod group;
pub mod smarts;
pub mod template;
