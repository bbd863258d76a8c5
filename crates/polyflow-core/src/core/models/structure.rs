use super::atom::Atom;
use super::ids::ResidueId;
use super::residue::Residue;
use super::topology::{Bond, BondOrder};
use nalgebra::{Point3, Vector3};
use slotmap::SlotMap;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("Atom index {0} is out of range")]
    AtomOutOfRange(usize),
    #[error("Atom {0} cannot be bonded to itself")]
    SelfBond(usize),
    #[error("Residue not found in structure")]
    ResidueNotFound,
    #[error("Atom {atom} is already assigned to residue '{residue}'")]
    AlreadyAssigned { atom: usize, residue: String },
}

/// An atomistic structure: atoms with positions and elements, a bond graph, an
/// optional orthorhombic periodic box, and a residue table.
///
/// Atoms and bonds are stored densely and addressed by index, which keeps the
/// structure cheap to hand to numerical code. Residues are stored in a slot map
/// so that a partition can be replaced wholesale without invalidating atom
/// indices.
///
/// A structure is *partitioned* when every atom carries exactly one residue
/// assignment; see [`Structure::is_partitioned`].
#[derive(Debug, Clone, Default)]
pub struct Structure {
    /// Molecule title, written to file headers.
    pub name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// Cached adjacency list, indexed by atom.
    adjacency: Vec<Vec<usize>>,
    residues: SlotMap<ResidueId, Residue>,
    /// Residue ids in insertion order.
    residue_order: Vec<ResidueId>,
    /// Orthorhombic box edge lengths in Angstroms.
    box_dimensions: Option<Vector3<f64>>,
}

impl Structure {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Appends an atom and returns its index.
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Adds a bond between two atoms.
    ///
    /// Adding a bond that already exists is a no-op (the original order is kept).
    ///
    /// # Errors
    ///
    /// Returns [`StructureError`] if either index is out of range or the bond
    /// would connect an atom to itself.
    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> Result<(), StructureError> {
        if a >= self.atoms.len() {
            return Err(StructureError::AtomOutOfRange(a));
        }
        if b >= self.atoms.len() {
            return Err(StructureError::AtomOutOfRange(b));
        }
        if a == b {
            return Err(StructureError::SelfBond(a));
        }
        if self.adjacency[a].contains(&b) {
            return Ok(());
        }
        self.bonds.push(Bond::new(a, b, order));
        self.adjacency[a].push(b);
        self.adjacency[b].push(a);
        Ok(())
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Returns the bonded neighbours of `atom`, or an empty slice for an unknown index.
    pub fn neighbors(&self, atom: usize) -> &[usize] {
        self.adjacency.get(atom).map_or(&[], |v| v.as_slice())
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        let key = Bond::new(a, b, BondOrder::Single);
        self.bonds
            .iter()
            .find(|bond| bond.atom1 == key.atom1 && bond.atom2 == key.atom2)
    }

    pub fn box_dimensions(&self) -> Option<Vector3<f64>> {
        self.box_dimensions
    }

    pub fn set_box_dimensions(&mut self, dims: Option<Vector3<f64>>) {
        self.box_dimensions = dims;
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Overwrites atom positions in index order.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::AtomOutOfRange`] if `positions` is longer than the atom list.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) -> Result<(), StructureError> {
        if positions.len() > self.atoms.len() {
            return Err(StructureError::AtomOutOfRange(positions.len() - 1));
        }
        for (atom, pos) in self.atoms.iter_mut().zip(positions) {
            atom.position = *pos;
        }
        Ok(())
    }

    pub fn partial_charges(&self) -> Vec<f64> {
        self.atoms.iter().map(|a| a.partial_charge).collect()
    }

    pub fn net_formal_charge(&self) -> i32 {
        self.atoms.iter().map(|a| a.formal_charge as i32).sum()
    }

    /// Total mass in daltons.
    pub fn total_mass(&self) -> f64 {
        self.atoms.iter().map(Atom::mass).sum()
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.atoms.is_empty() {
            return None;
        }
        let sum = self
            .atoms
            .iter()
            .fold(Vector3::zeros(), |acc, a| acc + a.position.coords);
        Some(Point3::from(sum / self.atoms.len() as f64))
    }

    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for atom in &mut self.atoms {
            atom.position += offset;
        }
    }

    /// Splits the bond graph into connected components, each sorted by atom index.
    ///
    /// Components are ordered by their lowest atom index.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.atoms.len()];
        let mut components = Vec::new();
        for start in 0..self.atoms.len() {
            if visited[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            visited[start] = true;
            while let Some(current) = stack.pop() {
                component.push(current);
                for &next in &self.adjacency[current] {
                    if !visited[next] {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Appends every atom and bond of `other`, shifting its indices, and copies its residues.
    ///
    /// Returns the index offset applied to `other`'s atoms.
    pub fn append(&mut self, other: &Structure) -> usize {
        let offset = self.atoms.len();
        let mut residue_map = std::collections::HashMap::new();
        for &rid in &other.residue_order {
            let residue = &other.residues[rid];
            let new_id = self.add_residue(residue.number, &residue.name);
            residue_map.insert(rid, new_id);
        }
        for atom in &other.atoms {
            let mut copy = atom.clone();
            copy.residue = None;
            let idx = self.add_atom(copy);
            if let Some(new_rid) = atom.residue.and_then(|rid| residue_map.get(&rid)) {
                let name = self.atoms[idx].name.clone();
                self.atoms[idx].residue = Some(*new_rid);
                self.residues[*new_rid].add_atom(&name, idx);
            }
        }
        for bond in &other.bonds {
            let (a, b) = (bond.atom1 + offset, bond.atom2 + offset);
            self.bonds.push(Bond::new(a, b, bond.order));
            self.adjacency[a].push(b);
            self.adjacency[b].push(a);
        }
        offset
    }

    pub fn add_residue(&mut self, number: isize, name: &str) -> ResidueId {
        let id = self.residues.insert(Residue::new(number, name));
        self.residue_order.push(id);
        id
    }

    /// Assigns an atom to a residue.
    ///
    /// # Errors
    ///
    /// Fails if the atom or residue does not exist, or if the atom already belongs
    /// to a residue.
    pub fn assign_atom(&mut self, atom: usize, residue: ResidueId) -> Result<(), StructureError> {
        let current = self
            .atoms
            .get(atom)
            .ok_or(StructureError::AtomOutOfRange(atom))?
            .residue;
        if let Some(existing) = current {
            let name = self
                .residues
                .get(existing)
                .map(|r| r.name.clone())
                .unwrap_or_default();
            return Err(StructureError::AlreadyAssigned {
                atom,
                residue: name,
            });
        }
        let res = self
            .residues
            .get_mut(residue)
            .ok_or(StructureError::ResidueNotFound)?;
        res.add_atom(&self.atoms[atom].name, atom);
        self.atoms[atom].residue = Some(residue);
        Ok(())
    }

    /// Renames an atom, keeping its residue's name lookup in sync.
    pub fn rename_atom(&mut self, atom: usize, new_name: &str) -> Result<(), StructureError> {
        let entry = self
            .atoms
            .get_mut(atom)
            .ok_or(StructureError::AtomOutOfRange(atom))?;
        let old = std::mem::replace(&mut entry.name, new_name.to_string());
        if let Some(rid) = entry.residue {
            if let Some(res) = self.residues.get_mut(rid) {
                res.rename_atom(&old, new_name);
            }
        }
        Ok(())
    }

    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    /// Iterates residues in insertion order.
    pub fn residues_iter(&self) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.residue_order
            .iter()
            .filter_map(|&id| self.residues.get(id).map(|r| (id, r)))
    }

    pub fn residue_count(&self) -> usize {
        self.residue_order.len()
    }

    /// Residue template name of the atom at `index`, if assigned.
    pub fn residue_name_of(&self, index: usize) -> Option<&str> {
        let rid = self.atoms.get(index)?.residue?;
        self.residues.get(rid).map(|r| r.name.as_str())
    }

    /// Removes every residue and clears all atom assignments.
    pub fn clear_residues(&mut self) {
        self.residues.clear();
        self.residue_order.clear();
        for atom in &mut self.atoms {
            atom.residue = None;
        }
    }

    /// Returns `true` when every atom belongs to exactly one residue and residue
    /// atom sets cover the structure without overlap.
    pub fn is_partitioned(&self) -> bool {
        if self.atoms.is_empty() || self.atoms.iter().any(|a| a.residue.is_none()) {
            return false;
        }
        let mut seen = HashSet::with_capacity(self.atoms.len());
        for (_, residue) in self.residues_iter() {
            for &idx in residue.atoms() {
                if !seen.insert(idx) {
                    return false;
                }
            }
        }
        seen.len() == self.atoms.len()
    }
}
