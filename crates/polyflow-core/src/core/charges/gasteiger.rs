//! Gasteiger-Marsili partial equalization of orbital electronegativity (PEOE).
//!
//! Orbital electronegativity is a quadratic in the atom's charge,
//! `χ(q) = a + b·q + c·q²`. Each iteration moves charge along every bond from
//! the less to the more electronegative atom, scaled by the cation
//! electronegativity `χ⁺ = a + b + c` of the donor and a damping factor that
//! halves every iteration. Charge is moved pairwise, so the total always equals
//! the sum of formal charges.

use super::ChargeError;
use super::charge_set::ChargeSet;
use crate::core::models::element::Element;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondOrder;
use phf::{Map, phf_map};

pub const ITERATIONS: usize = 6;

/// Hydrogen's cation electronegativity is fixed rather than taken from `a + b + c`.
const HYDROGEN_CATION_CHI: f64 = 20.02;

static PARAMETERS: Map<&'static str, [f64; 3]> = phf_map! {
    "H" => [7.17, 6.24, -0.56],
    "B_2" => [5.98, 6.82, 1.605],
    "B_3" => [6.42, 6.24, 0.47],
    "C_3" => [7.98, 9.18, 1.88],
    "C_2" => [8.79, 9.32, 1.51],
    "C_R" => [8.79, 9.32, 1.51],
    "C_1" => [10.39, 9.45, 0.73],
    "N_3" => [11.54, 10.82, 1.36],
    "N_2" => [12.87, 11.15, 0.85],
    "N_R" => [12.87, 11.15, 0.85],
    "N_1" => [15.68, 11.70, -0.27],
    "O_3" => [14.18, 12.92, 1.39],
    "O_2" => [17.07, 13.79, 0.47],
    "O_R" => [17.07, 13.79, 0.47],
    "F" => [14.66, 13.85, 2.31],
    "Si" => [7.30, 6.567, 0.657],
    "P" => [8.90, 8.24, 0.96],
    "S_3" => [10.14, 9.13, 1.38],
    "S_2" => [10.88, 9.485, 1.325],
    "S_R" => [10.88, 9.485, 1.325],
    "Cl" => [11.00, 9.69, 1.35],
    "Br" => [10.08, 8.47, 1.16],
    "I" => [9.90, 7.96, 0.96],
};

/// Hybridization label derived from the bond orders around an atom.
fn hybridization(orders: &[BondOrder]) -> &'static str {
    let triples = orders.iter().filter(|o| **o == BondOrder::Triple).count();
    let doubles = orders.iter().filter(|o| **o == BondOrder::Double).count();
    if triples > 0 || doubles >= 2 {
        "1"
    } else if orders.contains(&BondOrder::Aromatic) {
        "R"
    } else if doubles == 1 {
        "2"
    } else {
        "3"
    }
}

fn parameters_for(element: Element, orders: &[BondOrder]) -> Result<[f64; 3], ChargeError> {
    let hyb = hybridization(orders);
    let keyed = format!("{}_{}", element.symbol(), hyb);
    PARAMETERS
        .get(keyed.as_str())
        .or_else(|| PARAMETERS.get(element.symbol()))
        .copied()
        .ok_or(ChargeError::UnsupportedElement {
            element,
            hybridization: hyb,
        })
}

/// Computes Gasteiger-Marsili charges for every atom of `structure`.
pub fn gasteiger_charges(structure: &Structure) -> Result<ChargeSet, ChargeError> {
    if structure.atom_count() == 0 {
        return Err(ChargeError::EmptyStructure);
    }

    let mut orders: Vec<Vec<BondOrder>> = vec![Vec::new(); structure.atom_count()];
    for bond in structure.bonds() {
        orders[bond.atom1].push(bond.order);
        orders[bond.atom2].push(bond.order);
    }

    let params = structure
        .atoms()
        .iter()
        .zip(&orders)
        .map(|(atom, o)| parameters_for(atom.element, o))
        .collect::<Result<Vec<_>, _>>()?;
    let cation_chi: Vec<f64> = structure
        .atoms()
        .iter()
        .zip(&params)
        .map(|(atom, [a, b, c])| {
            if atom.element == Element::H {
                HYDROGEN_CATION_CHI
            } else {
                a + b + c
            }
        })
        .collect();

    let mut charges: Vec<f64> = structure
        .atoms()
        .iter()
        .map(|a| f64::from(a.formal_charge))
        .collect();

    let mut damping = 1.0;
    for _ in 0..ITERATIONS {
        damping *= 0.5;
        let chi: Vec<f64> = charges
            .iter()
            .zip(&params)
            .map(|(q, [a, b, c])| a + b * q + c * q * q)
            .collect();

        let mut delta = vec![0.0; charges.len()];
        for bond in structure.bonds() {
            let (i, j) = (bond.atom1, bond.atom2);
            let (donor, acceptor) = if chi[j] > chi[i] { (i, j) } else { (j, i) };
            let transfer = damping * (chi[acceptor] - chi[donor]) / cation_chi[donor];
            delta[donor] += transfer;
            delta[acceptor] -= transfer;
        }
        for (q, d) in charges.iter_mut().zip(delta) {
            *q += d;
        }
    }

    let net = f64::from(structure.net_formal_charge());
    ChargeSet::new(charges, net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    fn methanol() -> Structure {
        let mut s = Structure::new("methanol");
        let c = s.add_atom(Atom::new("C1", Element::C, Point3::origin()));
        let o = s.add_atom(Atom::new("O1", Element::O, Point3::new(1.43, 0.0, 0.0)));
        let ho = s.add_atom(Atom::new("H4", Element::H, Point3::new(1.75, 0.9, 0.0)));
        s.add_bond(c, o, BondOrder::Single).unwrap();
        s.add_bond(o, ho, BondOrder::Single).unwrap();
        for k in 0..3 {
            let h = s.add_atom(Atom::new(
                &format!("H{}", k + 1),
                Element::H,
                Point3::new(-0.4, (k as f64) - 1.0, 0.5),
            ));
            s.add_bond(c, h, BondOrder::Single).unwrap();
        }
        s
    }

    #[test]
    fn neutral_molecule_sums_to_zero_with_negative_oxygen() {
        let set = gasteiger_charges(&methanol()).unwrap();
        let q = set.charges();
        assert!(q.iter().sum::<f64>().abs() < 1e-9);
        assert!(q[1] < -0.3, "oxygen should be strongly negative, got {}", q[1]);
        assert!(q[2] > 0.1, "hydroxyl hydrogen should be positive, got {}", q[2]);
    }

    #[test]
    fn equivalent_atoms_receive_equal_charges() {
        let set = gasteiger_charges(&methanol()).unwrap();
        let q = set.charges();
        assert!((q[3] - q[4]).abs() < 1e-12);
        assert!((q[4] - q[5]).abs() < 1e-12);
    }

    #[test]
    fn formal_charges_are_conserved() {
        let mut s = Structure::new("ammonium");
        let n = s.add_atom(Atom::new("N1", Element::N, Point3::origin()).with_formal_charge(1));
        for k in 0..4 {
            let h = s.add_atom(Atom::new("H", Element::H, Point3::new(k as f64, 1.0, 0.0)));
            s.add_bond(n, h, BondOrder::Single).unwrap();
        }
        let set = gasteiger_charges(&s).unwrap();
        assert_eq!(set.net_charge(), 1.0);
        assert!((set.charges().iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hybridization_selects_parameters() {
        assert_eq!(hybridization(&[BondOrder::Single; 4]), "3");
        assert_eq!(hybridization(&[BondOrder::Double, BondOrder::Single]), "2");
        assert_eq!(hybridization(&[BondOrder::Aromatic, BondOrder::Aromatic]), "R");
        assert_eq!(hybridization(&[BondOrder::Triple, BondOrder::Single]), "1");
        assert_eq!(parameters_for(Element::Cl, &[BondOrder::Single]).unwrap(), [11.00, 9.69, 1.35]);
    }

    #[test]
    fn unsupported_elements_and_empty_structures_are_rejected() {
        let mut s = Structure::new("salt");
        s.add_atom(Atom::new("NA", Element::Na, Point3::origin()));
        assert!(matches!(
            gasteiger_charges(&s),
            Err(ChargeError::UnsupportedElement { element: Element::Na, .. })
        ));
        assert!(matches!(
            gasteiger_charges(&Structure::new("empty")),
            Err(ChargeError::EmptyStructure)
        ));
    }
}
