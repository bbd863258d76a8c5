//! Charge equilibration (QEq) through the `cheq` solver.

use super::ChargeError;
use super::charge_set::ChargeSet;
use crate::core::models::structure::Structure;
use cheq::{QEqSolver, SolverOptions, get_default_parameters};

/// Computes QEq charges constrained to the structure's net formal charge.
///
/// Charges depend on geometry, so the structure must carry realistic
/// coordinates.
pub fn qeq_charges(structure: &Structure, options: SolverOptions) -> Result<ChargeSet, ChargeError> {
    if structure.atom_count() == 0 {
        return Err(ChargeError::EmptyStructure);
    }
    let net = f64::from(structure.net_formal_charge());
    let params = get_default_parameters();
    let solver = QEqSolver::new(params).with_options(options);
    let result = solver.solve(structure.atoms(), net)?;

    let mut charges = result.charges;
    // Remove solver round-off so the set passes the net-charge check.
    let drift = (charges.iter().sum::<f64>() - net) / charges.len() as f64;
    charges.iter_mut().for_each(|q| *q -= drift);
    ChargeSet::new(charges, net)
}
