use super::element::Element;
use super::ids::ResidueId;
use nalgebra::Point3;

/// Represents an atom in a polymer structure.
///
/// Atoms are stored densely inside a [`Structure`](super::structure::Structure) and
/// addressed by their index. The residue assignment is `None` until the structure
/// has been partitioned against a monomer group.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom (e.g., "C1", "H3").
    pub name: String,
    /// The chemical element of the atom.
    pub element: Element,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// Integer formal charge in elementary charge units.
    pub formal_charge: i8,
    /// The partial atomic charge in elementary charge units.
    pub partial_charge: f64,
    /// The residue instance this atom belongs to, if partitioned.
    pub residue: Option<ResidueId>,
}

impl Atom {
    /// Creates a new neutral, unassigned `Atom`.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `element` - The chemical element.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, element: Element, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            element,
            position,
            formal_charge: 0,
            partial_charge: 0.0,
            residue: None,
        }
    }

    pub fn with_formal_charge(mut self, charge: i8) -> Self {
        self.formal_charge = charge;
        self
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.element.mass()
    }
}

impl cheq::AtomView for Atom {
    #[inline]
    fn atomic_number(&self) -> u8 {
        self.element.atomic_number()
    }

    #[inline]
    fn position(&self) -> [f64; 3] {
        [self.position.x, self.position.y, self.position.z]
    }
}
