use super::ChargeError;
use crate::core::models::structure::Structure;

pub const NET_CHARGE_TOLERANCE: f64 = 1e-6;

/// Per-atom partial charges for one structure, indexed by atom index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeSet {
    charges: Vec<f64>,
    net_charge: f64,
}

impl ChargeSet {
    /// Creates a charge set, checking that the charges sum to `net_charge`.
    pub fn new(charges: Vec<f64>, net_charge: f64) -> Result<Self, ChargeError> {
        if let Some(i) = charges.iter().position(|q| !q.is_finite()) {
            return Err(ChargeError::NonFinite(i));
        }
        let actual: f64 = charges.iter().sum();
        if (actual - net_charge).abs() > NET_CHARGE_TOLERANCE {
            return Err(ChargeError::NetChargeMismatch {
                expected: net_charge,
                actual,
            });
        }
        Ok(Self {
            charges,
            net_charge,
        })
    }

    pub fn charges(&self) -> &[f64] {
        &self.charges
    }

    pub fn net_charge(&self) -> f64 {
        self.net_charge
    }

    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.charges
    }

    /// Writes the charges into the structure's atoms.
    pub fn apply_to(&self, structure: &mut Structure) -> Result<(), ChargeError> {
        if structure.atom_count() != self.charges.len() {
            return Err(ChargeError::LengthMismatch {
                expected: structure.atom_count(),
                actual: self.charges.len(),
            });
        }
        for (atom, &q) in structure.atoms_mut().iter_mut().zip(&self.charges) {
            atom.partial_charge = q;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use nalgebra::Point3;

    #[test]
    fn new_accepts_charges_summing_to_net_charge() {
        let set = ChargeSet::new(vec![-0.4, 0.2, 0.2], 0.0).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.net_charge(), 0.0);
    }

    #[test]
    fn new_rejects_charges_off_by_more_than_tolerance() {
        let err = ChargeSet::new(vec![0.5, 0.5], 0.0).unwrap_err();
        assert!(matches!(err, ChargeError::NetChargeMismatch { .. }));
    }

    #[test]
    fn new_rejects_non_finite_charges() {
        let err = ChargeSet::new(vec![0.0, f64::NAN], 0.0).unwrap_err();
        assert!(matches!(err, ChargeError::NonFinite(1)));
    }

    #[test]
    fn apply_to_writes_partial_charges_and_checks_length() {
        let mut s = Structure::new("pair");
        s.add_atom(Atom::new("N", Element::Na, Point3::origin()));
        s.add_atom(Atom::new("C", Element::Cl, Point3::new(2.8, 0.0, 0.0)));

        let set = ChargeSet::new(vec![1.0, -1.0], 0.0).unwrap();
        set.apply_to(&mut s).unwrap();
        assert_eq!(s.partial_charges(), vec![1.0, -1.0]);

        let short = ChargeSet::new(vec![0.0], 0.0).unwrap();
        assert!(matches!(
            short.apply_to(&mut s),
            Err(ChargeError::LengthMismatch { expected: 2, actual: 1 })
        ));
    }
}
