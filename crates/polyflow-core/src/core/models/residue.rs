use std::collections::HashMap;

/// A residue instance: one occurrence of a monomer template inside a structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub number: isize,             // Sequential residue number, 1-based
    pub name: String,              // Name of the monomer template this residue instantiates
    pub(crate) atoms: Vec<usize>,  // Indices of atoms belonging to this residue
    atom_name_map: HashMap<String, usize>,
}

impl Residue {
    pub(crate) fn new(number: isize, name: &str) -> Self {
        Self {
            number,
            name: name.to_string(),
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom: usize) {
        self.atoms.push(atom);
        self.atom_name_map.insert(atom_name.to_string(), atom);
    }

    pub(crate) fn rename_atom(&mut self, old_name: &str, new_name: &str) {
        if let Some(idx) = self.atom_name_map.remove(old_name) {
            self.atom_name_map.insert(new_name.to_string(), idx);
        }
    }

    pub fn atoms(&self) -> &[usize] {
        &self.atoms
    }

    pub fn atom_by_name(&self, name: &str) -> Option<usize> {
        self.atom_name_map.get(name).copied()
    }
}
