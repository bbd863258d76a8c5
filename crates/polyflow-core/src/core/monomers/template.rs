use crate::core::models::element::Element;
use crate::core::models::topology::BondOrder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One atom of a monomer template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateAtom {
    pub name: String,
    pub element: Element,
    /// Required formal charge; `None` matches any charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formal_charge: Option<i8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateBond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
}

/// An attachment point: a bond leaving the template from `atom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub atom: usize,
    pub order: BondOrder,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template '{0}' has no atoms")]
    Empty(String),
    #[error("template '{template}' references unknown atom '{atom}'")]
    UnknownAtom { template: String, atom: String },
    #[error("template '{template}' has duplicate atom name '{atom}'")]
    DuplicateAtomName { template: String, atom: String },
    #[error("template '{template}' contains a self-bond on '{atom}'")]
    SelfBond { template: String, atom: String },
    #[error("template '{0}' is not a single connected fragment")]
    Disconnected(String),
}

/// A named substructure pattern with designated attachment ports.
///
/// Immutable once constructed; [`MonomerTemplate::new`] validates that names are
/// unique, bonds reference known atoms, and the pattern is connected.
#[derive(Debug, Clone, PartialEq)]
pub struct MonomerTemplate {
    name: String,
    atoms: Vec<TemplateAtom>,
    bonds: Vec<TemplateBond>,
    ports: Vec<Port>,
    adjacency: Vec<Vec<usize>>,
}

impl MonomerTemplate {
    pub fn new(
        name: &str,
        atoms: Vec<TemplateAtom>,
        bonds: Vec<TemplateBond>,
        ports: Vec<Port>,
    ) -> Result<Self, TemplateError> {
        if atoms.is_empty() {
            return Err(TemplateError::Empty(name.to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for atom in &atoms {
            if !seen.insert(atom.name.as_str()) {
                return Err(TemplateError::DuplicateAtomName {
                    template: name.to_string(),
                    atom: atom.name.clone(),
                });
            }
        }
        let out_of_range = |idx: usize| TemplateError::UnknownAtom {
            template: name.to_string(),
            atom: format!("#{}", idx),
        };

        let mut adjacency = vec![Vec::new(); atoms.len()];
        let mut normalized = Vec::with_capacity(bonds.len());
        for bond in bonds {
            if bond.atom1 >= atoms.len() {
                return Err(out_of_range(bond.atom1));
            }
            if bond.atom2 >= atoms.len() {
                return Err(out_of_range(bond.atom2));
            }
            if bond.atom1 == bond.atom2 {
                return Err(TemplateError::SelfBond {
                    template: name.to_string(),
                    atom: atoms[bond.atom1].name.clone(),
                });
            }
            if adjacency[bond.atom1].contains(&bond.atom2) {
                continue;
            }
            adjacency[bond.atom1].push(bond.atom2);
            adjacency[bond.atom2].push(bond.atom1);
            normalized.push(bond);
        }
        for port in &ports {
            if port.atom >= atoms.len() {
                return Err(out_of_range(port.atom));
            }
        }

        let template = Self {
            name: name.to_string(),
            atoms,
            bonds: normalized,
            ports,
            adjacency,
        };
        if template.bfs_order(0).len() != template.atoms.len() {
            return Err(TemplateError::Disconnected(name.to_string()));
        }
        Ok(template)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn atoms(&self) -> &[TemplateAtom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[TemplateBond] {
        &self.bonds
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of ports.
    pub fn valence(&self) -> usize {
        self.ports.len()
    }

    pub fn neighbors(&self, atom: usize) -> &[usize] {
        &self.adjacency[atom]
    }

    /// Number of ports attached to `atom`.
    pub fn ports_on(&self, atom: usize) -> usize {
        self.ports.iter().filter(|p| p.atom == atom).count()
    }

    pub fn atom_index(&self, name: &str) -> Option<usize> {
        self.atoms.iter().position(|a| a.name == name)
    }

    /// Sum of required formal charges; unconstrained atoms count as neutral.
    pub fn net_formal_charge(&self) -> i32 {
        self.atoms
            .iter()
            .map(|a| a.formal_charge.unwrap_or(0) as i32)
            .sum()
    }

    /// Breadth-first atom order starting from `start`.
    pub fn bfs_order(&self, start: usize) -> Vec<usize> {
        let mut visited = vec![false; self.atoms.len()];
        let mut order = Vec::with_capacity(self.atoms.len());
        let mut queue = std::collections::VecDeque::from([start]);
        visited[start] = true;
        while let Some(current) = queue.pop_front() {
            order.push(current);
            for &next in &self.adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Serializable description using atom names instead of indices.
    pub fn to_spec(&self) -> TemplateSpec {
        TemplateSpec {
            atoms: self.atoms.clone(),
            bonds: self
                .bonds
                .iter()
                .map(|b| BondSpec {
                    atoms: [
                        self.atoms[b.atom1].name.clone(),
                        self.atoms[b.atom2].name.clone(),
                    ],
                    order: b.order,
                })
                .collect(),
            ports: self
                .ports
                .iter()
                .map(|p| PortSpec {
                    atom: self.atoms[p.atom].name.clone(),
                    order: p.order,
                })
                .collect(),
        }
    }

    pub fn from_spec(name: &str, spec: TemplateSpec) -> Result<Self, TemplateError> {
        let lookup = |atom: &str| {
            spec.atoms
                .iter()
                .position(|a| a.name == atom)
                .ok_or_else(|| TemplateError::UnknownAtom {
                    template: name.to_string(),
                    atom: atom.to_string(),
                })
        };
        let bonds = spec
            .bonds
            .iter()
            .map(|b| {
                Ok(TemplateBond {
                    atom1: lookup(&b.atoms[0])?,
                    atom2: lookup(&b.atoms[1])?,
                    order: b.order,
                })
            })
            .collect::<Result<Vec<_>, TemplateError>>()?;
        let ports = spec
            .ports
            .iter()
            .map(|p| {
                Ok(Port {
                    atom: lookup(&p.atom)?,
                    order: p.order,
                })
            })
            .collect::<Result<Vec<_>, TemplateError>>()?;
        Self::new(name, spec.atoms, bonds, ports)
    }
}

/// Name-based template description used in monomer files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    pub atoms: Vec<TemplateAtom>,
    #[serde(default)]
    pub bonds: Vec<BondSpec>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BondSpec {
    pub atoms: [String; 2],
    #[serde(default)]
    pub order: BondOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortSpec {
    pub atom: String,
    #[serde(default)]
    pub order: BondOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str, element: Element) -> TemplateAtom {
        TemplateAtom {
            name: name.to_string(),
            element,
            formal_charge: None,
        }
    }

    fn single(a: usize, b: usize) -> TemplateBond {
        TemplateBond {
            atom1: a,
            atom2: b,
            order: BondOrder::Single,
        }
    }

    #[test]
    fn new_builds_adjacency_and_counts_ports() {
        let t = MonomerTemplate::new(
            "EO",
            vec![atom("C1", Element::C), atom("C2", Element::C), atom("O1", Element::O)],
            vec![single(0, 1), single(1, 2)],
            vec![
                Port { atom: 0, order: BondOrder::Single },
                Port { atom: 2, order: BondOrder::Single },
            ],
        )
        .unwrap();
        assert_eq!(t.valence(), 2);
        assert_eq!(t.atom_count(), 3);
        assert_eq!(t.neighbors(1), &[0, 2]);
        assert_eq!(t.ports_on(0), 1);
        assert_eq!(t.ports_on(1), 0);
        assert_eq!(t.atom_index("O1"), Some(2));
        assert_eq!(t.bfs_order(0), vec![0, 1, 2]);
    }

    #[test]
    fn new_rejects_disconnected_patterns() {
        let result = MonomerTemplate::new(
            "split",
            vec![atom("C1", Element::C), atom("C2", Element::C)],
            vec![],
            vec![],
        );
        assert_eq!(result, Err(TemplateError::Disconnected("split".into())));
    }

    #[test]
    fn new_rejects_duplicate_names_and_bad_indices() {
        let dup = MonomerTemplate::new(
            "dup",
            vec![atom("C1", Element::C), atom("C1", Element::C)],
            vec![single(0, 1)],
            vec![],
        );
        assert!(matches!(dup, Err(TemplateError::DuplicateAtomName { .. })));

        let bad = MonomerTemplate::new("bad", vec![atom("C1", Element::C)], vec![single(0, 3)], vec![]);
        assert!(matches!(bad, Err(TemplateError::UnknownAtom { .. })));
    }

    #[test]
    fn spec_round_trip_preserves_template() {
        let t = MonomerTemplate::new(
            "CO",
            vec![atom("C1", Element::C), atom("O1", Element::O)],
            vec![TemplateBond { atom1: 0, atom2: 1, order: BondOrder::Double }],
            vec![Port { atom: 0, order: BondOrder::Single }],
        )
        .unwrap();
        let back = MonomerTemplate::from_spec("CO", t.to_spec()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn from_spec_reports_unknown_atom_names() {
        let spec = TemplateSpec {
            atoms: vec![atom("C1", Element::C)],
            bonds: vec![],
            ports: vec![PortSpec { atom: "X9".into(), order: BondOrder::Single }],
        };
        let result = MonomerTemplate::from_spec("t", spec);
        assert_eq!(
            result,
            Err(TemplateError::UnknownAtom { template: "t".into(), atom: "X9".into() })
        );
    }
}
