use super::error::MorphologyError;
use crate::core::models::atom::Atom;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondOrder;
use crate::core::monomers::group::{MonomerGroup, TerminalEnd, TerminalOrientation};
use crate::core::monomers::template::MonomerTemplate;
use nalgebra::{Point3, Vector3};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonomerRole {
    Head,
    Interior,
    Tail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonomerInstance {
    pub template: String,
    pub role: MonomerRole,
}

/// A bond between port `from_port` of instance `from` and port `to_port` of instance `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linkage {
    pub from: usize,
    pub from_port: usize,
    pub to: usize,
    pub to_port: usize,
    pub order: BondOrder,
}

/// An ordered, unbranched chain of monomer instances joined port to port.
///
/// Interior templates are joined head-to-tail: port 0 of an interior monomer
/// faces the head of the chain and port 1 faces the tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolymerChain {
    instances: Vec<MonomerInstance>,
    linkages: Vec<Linkage>,
}

impl PolymerChain {
    pub fn instances(&self) -> &[MonomerInstance] {
        &self.instances
    }

    pub fn linkages(&self) -> &[Linkage] {
        &self.linkages
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn interior_count(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.role == MonomerRole::Interior)
            .count()
    }

    /// Checks that instances form one simple path: connected, acyclic, no
    /// instance with more than two links, and no port used twice.
    pub fn is_simple_path(&self) -> bool {
        let n = self.instances.len();
        if n == 0 {
            return false;
        }
        if self.linkages.len() != n - 1 {
            return false;
        }
        let mut used_ports = HashSet::new();
        let mut degree = vec![0usize; n];
        let mut adjacency = vec![Vec::new(); n];
        for link in &self.linkages {
            if link.from >= n || link.to >= n || link.from == link.to {
                return false;
            }
            if !used_ports.insert((link.from, link.from_port)) || !used_ports.insert((link.to, link.to_port)) {
                return false;
            }
            degree[link.from] += 1;
            degree[link.to] += 1;
            adjacency[link.from].push(link.to);
            adjacency[link.to].push(link.from);
        }
        if degree.iter().any(|&d| d > 2) {
            return false;
        }
        let mut seen = vec![false; n];
        let mut queue = VecDeque::from([0]);
        seen[0] = true;
        let mut visited = 1;
        while let Some(current) = queue.pop_front() {
            for &next in &adjacency[current] {
                if !seen[next] {
                    seen[next] = true;
                    visited += 1;
                    queue.push_back(next);
                }
            }
        }
        visited == n
    }

    /// Materializes the chain as an atomistic structure.
    ///
    /// Atoms carry their template names, every instance becomes one residue
    /// (numbered from 1 along the chain), and coordinates are generated so that
    /// bonded atoms sit at covalent distance and non-bonded atoms stay apart.
    pub fn to_structure(&self, group: &MonomerGroup, name: &str) -> Result<Structure, MorphologyError> {
        let mut structure = Structure::new(name);
        let mut offsets = Vec::with_capacity(self.instances.len());
        let mut templates = Vec::with_capacity(self.instances.len());

        for (i, instance) in self.instances.iter().enumerate() {
            let template = lookup(group, &instance.template)?;
            let rid = structure.add_residue(i as isize + 1, template.name());
            offsets.push(structure.atom_count());
            for atom in template.atoms() {
                let idx = structure.add_atom(
                    Atom::new(&atom.name, atom.element, Point3::origin())
                        .with_formal_charge(atom.formal_charge.unwrap_or(0)),
                );
                structure
                    .assign_atom(idx, rid)
                    .map_err(|e| MorphologyError::Construction(e.to_string()))?;
            }
            templates.push(template);
        }

        for (template, &offset) in templates.iter().zip(&offsets) {
            for bond in template.bonds() {
                structure
                    .add_bond(offset + bond.atom1, offset + bond.atom2, bond.order)
                    .map_err(|e| MorphologyError::Construction(e.to_string()))?;
            }
        }
        for link in &self.linkages {
            let a = offsets[link.from] + templates[link.from].ports()[link.from_port].atom;
            let b = offsets[link.to] + templates[link.to].ports()[link.to_port].atom;
            structure
                .add_bond(a, b, link.order)
                .map_err(|e| MorphologyError::Construction(e.to_string()))?;
        }

        let positions = embed_coordinates(&structure);
        structure
            .set_positions(&positions)
            .map_err(|e| MorphologyError::Construction(e.to_string()))?;
        debug!(
            atoms = structure.atom_count(),
            residues = structure.residue_count(),
            "Materialized polymer chain."
        );
        Ok(structure)
    }
}

fn lookup<'a>(group: &'a MonomerGroup, name: &str) -> Result<&'a MonomerTemplate, MorphologyError> {
    group
        .get(name)
        .ok_or_else(|| MorphologyError::Construction(format!("unknown monomer '{}'", name)))
}

/// Picks the (head, tail) monomer names from an orientation.
fn resolve_termini(
    group: &MonomerGroup,
    orientation: &TerminalOrientation,
) -> Result<Option<(String, String)>, MorphologyError> {
    let terminals = group.terminal_names();
    if terminals.is_empty() {
        if orientation.is_empty() {
            return Ok(None);
        }
        return Err(MorphologyError::InvalidOrientation(
            "group has no terminal monomers to orient".into(),
        ));
    }

    if orientation.is_empty() {
        warn!(
            head = terminals[0],
            tail = terminals[1],
            "No terminal orientation given; assigning head and tail in name order."
        );
        return Ok(Some((terminals[0].to_string(), terminals[1].to_string())));
    }

    let pick = |end: TerminalEnd| -> Result<String, MorphologyError> {
        let names: Vec<&String> = orientation
            .iter()
            .filter(|(_, e)| **e == end)
            .map(|(n, _)| n)
            .collect();
        match names.as_slice() {
            [name] if terminals.contains(&name.as_str()) => Ok((*name).clone()),
            [name] => Err(MorphologyError::InvalidOrientation(format!(
                "'{}' is not a single-port terminal monomer",
                name
            ))),
            _ => Err(MorphologyError::InvalidOrientation(format!(
                "expected exactly one {} monomer, found {}",
                end,
                names.len()
            ))),
        }
    };
    Ok(Some((pick(TerminalEnd::Head)?, pick(TerminalEnd::Tail)?)))
}

/// Builds a linear chain of `repeat_count` interior units capped by the head and
/// tail monomers.
///
/// `orientation` overrides the group's own terminal orientation when given.
/// Interior units cycle through the group's repeat sequence.
///
/// # Errors
///
/// Fails with [`MorphologyError`] when the group is not linear, the orientation
/// does not name exactly one head and one tail terminal monomer, `repeat_count`
/// is zero, or adjoining ports disagree on bond order.
pub fn build_linear_polymer(
    group: &MonomerGroup,
    repeat_count: usize,
    orientation: Option<&TerminalOrientation>,
) -> Result<PolymerChain, MorphologyError> {
    if !group.is_linear() {
        let terminals = group.terminal_names().len();
        let invalid = group
            .templates()
            .filter(|t| t.valence() != 1 && t.valence() != 2)
            .count();
        return Err(MorphologyError::NotLinear { terminals, invalid });
    }
    if repeat_count == 0 {
        return Err(MorphologyError::ZeroRepeat);
    }
    let cycle = group.interior_cycle();
    if cycle.is_empty() {
        return Err(MorphologyError::NoInteriorMonomer);
    }

    let orientation = orientation.unwrap_or_else(|| group.term_orient());
    let termini = resolve_termini(group, orientation)?;

    let mut instances = Vec::with_capacity(repeat_count + 2);
    if let Some((head, _)) = &termini {
        instances.push(MonomerInstance {
            template: head.clone(),
            role: MonomerRole::Head,
        });
    }
    for i in 0..repeat_count {
        instances.push(MonomerInstance {
            template: cycle[i % cycle.len()].name().to_string(),
            role: MonomerRole::Interior,
        });
    }
    if let Some((_, tail)) = &termini {
        instances.push(MonomerInstance {
            template: tail.clone(),
            role: MonomerRole::Tail,
        });
    }

    let mut linkages = Vec::with_capacity(instances.len().saturating_sub(1));
    for i in 0..instances.len() - 1 {
        let left = lookup(group, &instances[i].template)?;
        let right = lookup(group, &instances[i + 1].template)?;
        // Terminal monomers only have port 0; interior units face the tail with port 1.
        let from_port = if instances[i].role == MonomerRole::Interior { 1 } else { 0 };
        let to_port = 0;
        let left_order = left.ports()[from_port].order;
        let right_order = right.ports()[to_port].order;
        if left_order != right_order {
            return Err(MorphologyError::IncompatiblePorts {
                left: left.name().to_string(),
                right: right.name().to_string(),
            });
        }
        linkages.push(Linkage {
            from: i,
            from_port,
            to: i + 1,
            to_port,
            order: left_order,
        });
    }

    debug!(
        instances = instances.len(),
        repeat_count, "Built linear polymer chain."
    );
    Ok(PolymerChain {
        instances,
        linkages,
    })
}

/// Generates non-overlapping coordinates for a bonded structure.
///
/// Atoms are placed breadth-first; each new atom sits at covalent distance
/// from its parent along whichever of 26 lattice directions keeps it farthest
/// from everything already placed.
fn embed_coordinates(structure: &Structure) -> Vec<Point3<f64>> {
    let n = structure.atom_count();
    let mut positions = vec![Point3::origin(); n];
    let mut placed = vec![false; n];

    let directions: Vec<Vector3<f64>> = (-1..=1)
        .flat_map(|x| (-1..=1).flat_map(move |y| (-1..=1).map(move |z| (x, y, z))))
        .filter(|&(x, y, z)| (x, y, z) != (0, 0, 0))
        .map(|(x, y, z)| Vector3::new(x as f64, y as f64, z as f64).normalize())
        .collect();

    let mut placed_list: Vec<usize> = Vec::with_capacity(n);
    let mut component_origin = Vector3::zeros();
    for root in 0..n {
        if placed[root] {
            continue;
        }
        positions[root] = Point3::from(component_origin);
        placed[root] = true;
        placed_list.push(root);
        component_origin.z += 10.0;

        let mut queue = VecDeque::from([root]);
        while let Some(parent) = queue.pop_front() {
            for &child in structure.neighbors(parent) {
                if placed[child] {
                    continue;
                }
                let atoms = structure.atoms();
                let bond_length =
                    atoms[parent].element.covalent_radius() + atoms[child].element.covalent_radius();
                let mut best = positions[parent] + Vector3::x() * bond_length;
                let mut best_score = f64::NEG_INFINITY;
                for dir in &directions {
                    let candidate = positions[parent] + dir * bond_length;
                    let score = placed_list
                        .iter()
                        .filter(|&&p| p != parent)
                        .map(|&p| (positions[p] - candidate).norm_squared())
                        .fold(f64::INFINITY, f64::min);
                    // Slight preference for +x keeps chains extended.
                    let score = score + 1e-3 * dir.x;
                    if score > best_score {
                        best_score = score;
                        best = candidate;
                    }
                }
                positions[child] = best;
                placed[child] = true;
                placed_list.push(child);
                queue.push_back(child);
            }
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::polymers::estimation::estimate_dop_lower;

    fn group() -> MonomerGroup {
        MonomerGroup::from_json_str(
            r#"{"monomers": {
                "A": "[*]-[#6](-[#1])(-[#1])-[#6](=[#8])-[*]",
                "cap": "[*]-[#7](-[#1])-[#1]",
                "cap2": "[*]-[#6](=[#8])-[#1]"},
              "term_orient": {"cap": "head", "cap2": "tail"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn fifty_atom_budget_yields_ten_instances() {
        let g = group();
        let dop = estimate_dop_lower(&g, 50).unwrap();
        assert_eq!(dop, 8);
        let chain = build_linear_polymer(&g, dop, None).unwrap();
        assert_eq!(chain.len(), 10);
        assert_eq!(chain.interior_count(), 8);
        assert_eq!(chain.instances()[0].template, "cap");
        assert_eq!(chain.instances()[9].template, "cap2");
        assert!(chain.is_simple_path());
    }

    #[test]
    fn chain_has_exact_interior_count_and_two_caps() {
        let g = group();
        for r in 1..6 {
            let chain = build_linear_polymer(&g, r, None).unwrap();
            assert_eq!(chain.interior_count(), r);
            assert_eq!(chain.len(), r + 2);
            assert_eq!(chain.instances()[0].role, MonomerRole::Head);
            assert_eq!(chain.instances()[r + 1].role, MonomerRole::Tail);
            assert!(chain.is_simple_path());
        }
    }

    #[test]
    fn explicit_orientation_overrides_group_orientation() {
        let g = group();
        let mut flipped = TerminalOrientation::new();
        flipped.insert("cap".into(), TerminalEnd::Tail);
        flipped.insert("cap2".into(), TerminalEnd::Head);
        let chain = build_linear_polymer(&g, 2, Some(&flipped)).unwrap();
        assert_eq!(chain.instances()[0].template, "cap2");
        assert_eq!(chain.instances()[3].template, "cap");
    }

    #[test]
    fn orientation_must_name_one_head_and_one_tail() {
        let g = group();
        let mut both_heads = TerminalOrientation::new();
        both_heads.insert("cap".into(), TerminalEnd::Head);
        both_heads.insert("cap2".into(), TerminalEnd::Head);
        assert!(matches!(
            build_linear_polymer(&g, 2, Some(&both_heads)),
            Err(MorphologyError::InvalidOrientation(_))
        ));

        let mut interior_as_head = TerminalOrientation::new();
        interior_as_head.insert("A".into(), TerminalEnd::Head);
        interior_as_head.insert("cap2".into(), TerminalEnd::Tail);
        assert!(matches!(
            build_linear_polymer(&g, 2, Some(&interior_as_head)),
            Err(MorphologyError::InvalidOrientation(_))
        ));
    }

    #[test]
    fn non_linear_group_and_zero_repeat_are_rejected() {
        let branched = MonomerGroup::from_json_str(
            r#"{"monomers": {"X": "[*]-[#6](-[*])-[*]", "c": "[*]-[#1]", "d": "[*]-[#9]"}}"#,
        )
        .unwrap();
        assert_eq!(
            build_linear_polymer(&branched, 3, None),
            Err(MorphologyError::NotLinear {
                terminals: 2,
                invalid: 1
            })
        );
        assert_eq!(
            build_linear_polymer(&group(), 0, None),
            Err(MorphologyError::ZeroRepeat)
        );
    }

    #[test]
    fn mismatched_port_orders_are_rejected() {
        let g = MonomerGroup::from_json_str(
            r#"{"monomers": {
                "A": "[*]-[#6](-[#1])(-[#1])-[*]",
                "h": "[*]=[#8]",
                "t": "[*]-[#1]"},
              "term_orient": {"h": "head", "t": "tail"}}"#,
        )
        .unwrap();
        assert!(matches!(
            build_linear_polymer(&g, 1, None),
            Err(MorphologyError::IncompatiblePorts { .. })
        ));
    }

    #[test]
    fn uncapped_group_builds_open_chain() {
        let g = MonomerGroup::from_json_str(
            r#"{"monomers": {"A": "[*]-[#6](-[#1])(-[#1])-[*]"}}"#,
        )
        .unwrap();
        let chain = build_linear_polymer(&g, 4, None).unwrap();
        assert_eq!(chain.len(), 4);
        assert!(chain.is_simple_path());
    }

    #[test]
    fn to_structure_links_ports_and_separates_atoms() {
        let g = group();
        let chain = build_linear_polymer(&g, 3, None).unwrap();
        let s = chain.to_structure(&g, "chain").unwrap();

        assert_eq!(s.atom_count(), 3 + 3 * 5 + 3);
        assert_eq!(s.residue_count(), 5);
        assert!(s.is_partitioned());
        assert_eq!(s.connected_components().len(), 1);
        // Template bonds plus one linkage between each consecutive pair.
        let template_bonds = 2 + 3 * 4 + 2;
        assert_eq!(s.bonds().len(), template_bonds + 4);

        let positions = s.positions();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                assert!((positions[i] - positions[j]).norm() > 0.5);
            }
        }
        for bond in s.bonds() {
            let d = (positions[bond.atom1] - positions[bond.atom2]).norm();
            assert!(d > 0.5 && d < 2.5);
        }
    }
}
