//! Substructure partitioning of a structure into monomer residues.
//!
//! Partitioning covers every atom of a structure with non-overlapping matches of
//! a monomer group's templates. A template matches a set of atoms when there is
//! an element-preserving graph isomorphism between the template and the induced
//! subgraph on those atoms, and every bond leaving the set starts from a
//! template atom that carries a port (at most one leaving bond per port).
//!
//! The search is an exact-cover backtracking over the lowest-indexed uncovered
//! atom. Covers are compared up to symmetry: atoms are grouped into classes by
//! iterated neighborhood refinement, isomorphic templates share a class, and two
//! covers are the same partition when they hold the same multiset of (template
//! class, atom classes) residues. Two covers that differ beyond that make the
//! partition ambiguous; both ambiguity and incomplete coverage are reported as
//! failure rather than an error.

use crate::core::models::structure::Structure;
use crate::core::monomers::group::{MonomerGroup, TerminalEnd};
use crate::core::monomers::template::MonomerTemplate;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Upper bound on embedding extensions explored before giving up.
const MAX_SEARCH_STEPS: usize = 5_000_000;

/// One template occurrence: `atoms[i]` is the structure atom matched to template atom `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidueMatch {
    pub template: String,
    pub atoms: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// Exactly one cover exists up to symmetry.
    Unique(Vec<ResidueMatch>),
    /// At least two inequivalent covers exist.
    Ambiguous,
    /// No cover exists; `first_uncovered` is the atom at which every branch failed.
    Incomplete { first_uncovered: usize },
    /// The search exceeded its step budget.
    Exhausted,
}

/// Sorted (template class, sorted atom classes) per residue.
type CoverSignature = Vec<(usize, Vec<usize>)>;

/// Identifies a structure atom up to swaps with same-kind leaf siblings:
/// a leaf is keyed by its parent and kind, any other atom by its index.
type AtomKey = (usize, Option<(u8, i8, u8)>);

/// (distinct templates used, head template owns the first terminal residue,
/// first atom of the head residue)
type Preference = (usize, bool, Reverse<usize>);

/// Assigns every vertex a class id so that vertices related by a graph
/// automorphism always share a class.
fn refine_classes<K: Ord>(initial: &[K], adjacency: &[Vec<(u8, usize)>]) -> Vec<usize> {
    let mut classes = compact(initial);
    let mut count = class_count(&classes);
    loop {
        let keys: Vec<(usize, Vec<(u8, usize)>)> = adjacency
            .iter()
            .enumerate()
            .map(|(i, around)| {
                let mut seen: Vec<(u8, usize)> =
                    around.iter().map(|&(order, j)| (order, classes[j])).collect();
                seen.sort_unstable();
                (classes[i], seen)
            })
            .collect();
        let next = compact(&keys);
        let next_count = class_count(&next);
        classes = next;
        if next_count == count {
            return classes;
        }
        count = next_count;
    }
}

fn compact<K: Ord>(keys: &[K]) -> Vec<usize> {
    let ids: BTreeMap<&K, usize> = keys
        .iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(id, key)| (key, id))
        .collect();
    keys.iter().map(|key| ids[key]).collect()
}

fn class_count(classes: &[usize]) -> usize {
    classes.iter().max().map_or(0, |&max| max + 1)
}

fn structure_classes(structure: &Structure) -> Vec<usize> {
    let mut adjacency = vec![Vec::new(); structure.atom_count()];
    for bond in structure.bonds() {
        adjacency[bond.atom1].push((bond.order as u8, bond.atom2));
        adjacency[bond.atom2].push((bond.order as u8, bond.atom1));
    }
    let initial: Vec<(u8, i8, usize)> = structure
        .atoms()
        .iter()
        .enumerate()
        .map(|(i, atom)| (atom.element.atomic_number(), atom.formal_charge, adjacency[i].len()))
        .collect();
    refine_classes(&initial, &adjacency)
}

/// Class per template name; isomorphic templates (ports included) share one.
fn template_classes(group: &MonomerGroup) -> BTreeMap<String, usize> {
    let mut initial = Vec::new();
    let mut adjacency = Vec::new();
    let mut spans = Vec::new();
    for template in group.templates() {
        let offset = initial.len();
        for (i, atom) in template.atoms().iter().enumerate() {
            initial.push((
                atom.element.atomic_number(),
                atom.formal_charge,
                template.ports_on(i),
                template.neighbors(i).len(),
            ));
            adjacency.push(Vec::new());
        }
        for bond in template.bonds() {
            adjacency[offset + bond.atom1].push((bond.order as u8, offset + bond.atom2));
            adjacency[offset + bond.atom2].push((bond.order as u8, offset + bond.atom1));
        }
        spans.push((template.name().to_string(), offset..initial.len()));
    }
    let atom_classes = refine_classes(&initial, &adjacency);
    let keys: Vec<Vec<usize>> = spans
        .iter()
        .map(|(_, span)| {
            let mut key = atom_classes[span.clone()].to_vec();
            key.sort_unstable();
            key
        })
        .collect();
    spans
        .into_iter()
        .map(|(name, _)| name)
        .zip(compact(&keys))
        .collect()
}

/// Covers seen so far: they must all share one signature.
#[derive(Default)]
struct CoverTally {
    signature: Option<CoverSignature>,
    best: Option<(Preference, Vec<ResidueMatch>)>,
    equivalent: usize,
    ambiguous: bool,
}

impl CoverTally {
    fn record(&mut self, signature: CoverSignature, preference: Preference, cover: &[ResidueMatch]) {
        match &self.signature {
            Some(existing) if *existing != signature => {
                self.ambiguous = true;
                return;
            }
            Some(_) => {}
            None => self.signature = Some(signature),
        }
        self.equivalent += 1;
        if self.best.as_ref().is_none_or(|(best, _)| preference > *best) {
            self.best = Some((preference, cover.to_vec()));
        }
    }
}

struct TemplatePlan<'a> {
    template: &'a MonomerTemplate,
    /// For every start atom: BFS order and, for each position after the first,
    /// the index of an already-ordered neighbor.
    orders: Vec<(Vec<usize>, Vec<usize>)>,
}

impl<'a> TemplatePlan<'a> {
    fn new(template: &'a MonomerTemplate) -> Self {
        let orders = (0..template.atom_count())
            .map(|start| {
                let order = template.bfs_order(start);
                let mut position = vec![usize::MAX; template.atom_count()];
                for (k, &atom) in order.iter().enumerate() {
                    position[atom] = k;
                }
                let parents = order
                    .iter()
                    .enumerate()
                    .map(|(k, &atom)| {
                        if k == 0 {
                            return atom;
                        }
                        template
                            .neighbors(atom)
                            .iter()
                            .copied()
                            .filter(|&n| position[n] < k)
                            .min_by_key(|&n| position[n])
                            .unwrap_or(atom)
                    })
                    .collect();
                (order, parents)
            })
            .collect();
        Self { template, orders }
    }
}

struct Matcher<'a> {
    structure: &'a Structure,
    group: &'a MonomerGroup,
    plans: Vec<TemplatePlan<'a>>,
    atom_classes: Vec<usize>,
    template_classes: BTreeMap<String, usize>,
    steps: usize,
}

impl<'a> Matcher<'a> {
    fn new(structure: &'a Structure, group: &'a MonomerGroup) -> Self {
        Self {
            structure,
            group,
            plans: group.templates().map(TemplatePlan::new).collect(),
            atom_classes: structure_classes(structure),
            template_classes: template_classes(group),
            steps: 0,
        }
    }

    fn atom_compatible(&self, template: &MonomerTemplate, t_atom: usize, s_atom: usize) -> bool {
        let spec = &template.atoms()[t_atom];
        let atom = &self.structure.atoms()[s_atom];
        if spec.element != atom.element {
            return false;
        }
        if spec.formal_charge.is_some_and(|c| c != atom.formal_charge) {
            return false;
        }
        let internal = template.neighbors(t_atom).len();
        let degree = self.structure.neighbors(s_atom).len();
        degree >= internal && degree <= internal + template.ports_on(t_atom)
    }

    fn atom_key(&self, atom: usize) -> AtomKey {
        match self.structure.neighbors(atom) {
            &[parent] => {
                let order = self
                    .structure
                    .bond_between(atom, parent)
                    .map_or(0, |bond| bond.order as u8);
                let kind = &self.structure.atoms()[atom];
                (parent, Some((kind.element.atomic_number(), kind.formal_charge, order)))
            }
            _ => (atom, None),
        }
    }

    /// Template matches that contain `anchor` and avoid `assigned` atoms.
    ///
    /// Matches that differ only by exchanging unassigned leaf atoms of the same
    /// kind on the same parent lead to identical subproblems; one is kept.
    fn matches_containing(&mut self, anchor: usize, assigned: &[bool]) -> Vec<ResidueMatch> {
        let mut found: Vec<ResidueMatch> = Vec::new();
        let mut seen: HashSet<(usize, Vec<AtomKey>)> = HashSet::new();

        for plan_idx in 0..self.plans.len() {
            let template = self.plans[plan_idx].template;
            for start in 0..template.atom_count() {
                if !self.atom_compatible(template, start, anchor) {
                    continue;
                }
                let mut mapping = vec![usize::MAX; template.atom_count()];
                mapping[start] = anchor;
                let mut results = Vec::new();
                self.extend(plan_idx, start, 1, &mut mapping, assigned, &mut results);
                for atoms in results {
                    let mut key: Vec<AtomKey> = atoms.iter().map(|&a| self.atom_key(a)).collect();
                    key.sort_unstable();
                    if seen.insert((plan_idx, key)) {
                        found.push(ResidueMatch {
                            template: template.name().to_string(),
                            atoms,
                        });
                    }
                }
            }
        }
        found
    }

    fn extend(
        &mut self,
        plan_idx: usize,
        start: usize,
        k: usize,
        mapping: &mut Vec<usize>,
        assigned: &[bool],
        results: &mut Vec<Vec<usize>>,
    ) {
        self.steps += 1;
        if self.steps > MAX_SEARCH_STEPS {
            return;
        }
        let template: &'a MonomerTemplate = self.plans[plan_idx].template;
        let (order, parents) = &self.plans[plan_idx].orders[start];
        if k == order.len() {
            if self.boundary_ok(template, mapping) {
                results.push(mapping.clone());
            }
            return;
        }
        let (t_atom, parent) = (order[k], parents[k]);

        let anchor = mapping[parent];
        let candidates: Vec<usize> = self
            .structure
            .neighbors(anchor)
            .iter()
            .copied()
            .filter(|&c| !assigned[c] && !mapping.contains(&c))
            .filter(|&c| self.atom_compatible(template, t_atom, c))
            .filter(|&c| {
                template.neighbors(t_atom).iter().all(|&q| {
                    mapping[q] == usize::MAX || self.structure.neighbors(c).contains(&mapping[q])
                })
            })
            .collect();

        for c in candidates {
            mapping[t_atom] = c;
            self.extend(plan_idx, start, k + 1, mapping, assigned, results);
            mapping[t_atom] = usize::MAX;
        }
    }

    /// Induced-subgraph and port checks for a complete mapping.
    fn boundary_ok(&self, template: &MonomerTemplate, mapping: &[usize]) -> bool {
        mapping.iter().enumerate().all(|(t_atom, &s_atom)| {
            let (inside, outside): (Vec<usize>, Vec<usize>) = self
                .structure
                .neighbors(s_atom)
                .iter()
                .copied()
                .partition(|n| mapping.contains(n));
            inside.len() == template.neighbors(t_atom).len()
                && outside.len() <= template.ports_on(t_atom)
        })
    }

    fn signature(&self, cover: &[ResidueMatch]) -> CoverSignature {
        let mut signature: CoverSignature = cover
            .iter()
            .map(|m| {
                let mut classes: Vec<usize> = m.atoms.iter().map(|&a| self.atom_classes[a]).collect();
                classes.sort_unstable();
                let template = self.template_classes.get(&m.template).copied().unwrap_or(usize::MAX);
                (template, classes)
            })
            .collect();
        signature.sort_unstable();
        signature
    }

    /// Among equivalent covers, prefer the one that uses every template it can
    /// and puts the head template on the lowest-indexed terminal atoms.
    fn preference(&self, cover: &[ResidueMatch]) -> Preference {
        let distinct = cover.iter().map(|m| m.template.as_str()).collect::<HashSet<_>>().len();
        let orientation = self.group.term_orient();
        let first_atom = |m: &ResidueMatch| m.atoms.iter().copied().min().unwrap_or(usize::MAX);
        let is_head = |m: &ResidueMatch| orientation.get(&m.template) == Some(&TerminalEnd::Head);
        let head_first = cover
            .iter()
            .filter(|m| orientation.contains_key(&m.template))
            .min_by_key(|m| first_atom(*m))
            .is_some_and(is_head);
        let head_start = cover
            .iter()
            .filter(|m| is_head(*m))
            .map(first_atom)
            .min()
            .unwrap_or(usize::MAX);
        (distinct, head_first, Reverse(head_start))
    }

    fn search(
        &mut self,
        assigned: &mut Vec<bool>,
        chosen: &mut Vec<ResidueMatch>,
        tally: &mut CoverTally,
        deepest_failure: &mut usize,
    ) {
        if tally.ambiguous || self.steps > MAX_SEARCH_STEPS {
            return;
        }
        let Some(anchor) = assigned.iter().position(|a| !a) else {
            tally.record(self.signature(chosen), self.preference(chosen), chosen);
            return;
        };
        let candidates = self.matches_containing(anchor, assigned);
        if candidates.is_empty() {
            *deepest_failure = (*deepest_failure).max(anchor);
            return;
        }
        for candidate in candidates {
            for &a in &candidate.atoms {
                assigned[a] = true;
            }
            chosen.push(candidate);
            self.search(assigned, chosen, tally, deepest_failure);
            if let Some(undone) = chosen.pop() {
                for &a in &undone.atoms {
                    assigned[a] = false;
                }
            }
            if tally.ambiguous {
                return;
            }
        }
    }
}

/// Searches for a cover of `structure` by templates of `group` without modifying it.
pub fn find_partition(structure: &Structure, group: &MonomerGroup) -> PartitionOutcome {
    if structure.atom_count() == 0 || group.is_empty() {
        return PartitionOutcome::Incomplete { first_uncovered: 0 };
    }
    let mut matcher = Matcher::new(structure, group);
    let mut assigned = vec![false; structure.atom_count()];
    let mut chosen = Vec::new();
    let mut tally = CoverTally::default();
    let mut deepest_failure = 0;
    matcher.search(&mut assigned, &mut chosen, &mut tally, &mut deepest_failure);

    if tally.ambiguous {
        return PartitionOutcome::Ambiguous;
    }
    if matcher.steps > MAX_SEARCH_STEPS {
        return PartitionOutcome::Exhausted;
    }
    match tally.best {
        Some((_, cover)) => {
            debug!(equivalent = tally.equivalent, "Found partition cover.");
            PartitionOutcome::Unique(cover)
        }
        None => PartitionOutcome::Incomplete {
            first_uncovered: deepest_failure,
        },
    }
}

/// Partitions `structure` into residues of `group`'s templates.
///
/// On success the residue table is replaced: residues are numbered from 1 in
/// order of their lowest atom index, named after their template, and every
/// atom is renamed to its template atom name. On failure (incomplete or
/// ambiguous coverage) the structure is left untouched and `false` is returned.
pub fn partition(structure: &mut Structure, group: &MonomerGroup) -> bool {
    let mut matches = match find_partition(structure, group) {
        PartitionOutcome::Unique(matches) => matches,
        PartitionOutcome::Ambiguous => {
            warn!("Partition is ambiguous: more than one residue cover exists.");
            return false;
        }
        PartitionOutcome::Incomplete { first_uncovered } => {
            warn!(atom = first_uncovered, "Partition is incomplete: atom cannot be covered by any template.");
            return false;
        }
        PartitionOutcome::Exhausted => {
            warn!("Partition search exceeded its step budget.");
            return false;
        }
    };

    matches.sort_by_key(|m| m.atoms.iter().copied().min().unwrap_or(usize::MAX));
    structure.clear_residues();
    for (i, m) in matches.iter().enumerate() {
        let Some(template) = group.get(&m.template) else {
            return false;
        };
        let rid = structure.add_residue(i as isize + 1, &m.template);
        for (t_atom, &s_atom) in m.atoms.iter().enumerate() {
            let renamed = structure.rename_atom(s_atom, &template.atoms()[t_atom].name);
            let assigned = structure.assign_atom(s_atom, rid);
            if renamed.is_err() || assigned.is_err() {
                return false;
            }
        }
    }
    debug!(residues = matches.len(), "Partitioned structure into residues.");
    structure.is_partitioned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::core::models::topology::BondOrder;
    use crate::core::polymers::building::build_linear_polymer;
    use nalgebra::Point3;

    fn copolymer_group() -> MonomerGroup {
        MonomerGroup::from_json_str(
            r#"{"monomers": {
                "ET": "[*]-[#6](-[#1])(-[#1])-[#6](-[#1])(-[#1])-[*]",
                "OX": "[*]-[#8]-[*]",
                "HO": "[#1]-[#8]-[*]",
                "FL": "[*]-[#9]"},
              "term_orient": {"HO": "head", "FL": "tail"}}"#,
        )
        .unwrap()
    }

    fn stripped_chain(group: &MonomerGroup, repeats: usize) -> Structure {
        let chain = build_linear_polymer(group, repeats, None).unwrap();
        let mut s = chain.to_structure(group, "chain").unwrap();
        s.clear_residues();
        for i in 0..s.atom_count() {
            s.rename_atom(i, &format!("X{}", i)).unwrap();
        }
        s
    }

    #[test]
    fn built_chain_partitions_back_into_its_monomers() {
        let group = copolymer_group();
        let mut s = stripped_chain(&group, 4);
        assert!(partition(&mut s, &group));
        assert!(s.is_partitioned());

        let names: Vec<&str> = s.residues_iter().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["HO", "ET", "OX", "ET", "OX", "FL"]);
        for (_, residue) in s.residues_iter() {
            let template = group.get(&residue.name).unwrap();
            assert_eq!(residue.atoms().len(), template.atom_count());
            for atom in template.atoms() {
                assert!(residue.atom_by_name(&atom.name).is_some());
            }
        }
    }

    #[test]
    fn residues_are_numbered_along_the_chain() {
        let group = copolymer_group();
        let mut s = stripped_chain(&group, 2);
        assert!(partition(&mut s, &group));
        let numbers: Vec<isize> = s.residues_iter().map(|(_, r)| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn uncovered_atom_fails_without_touching_structure() {
        let group = copolymer_group();
        let mut s = stripped_chain(&group, 2);
        let extra = s.add_atom(Atom::new("CL", Element::Cl, Point3::new(50.0, 0.0, 0.0)));
        s.add_bond(0, extra, BondOrder::Single).unwrap();
        let before = s.atoms().to_vec();

        assert!(matches!(
            find_partition(&s, &group),
            PartitionOutcome::Incomplete { .. }
        ));
        assert!(!partition(&mut s, &group));
        assert_eq!(s.atoms(), before.as_slice());
        assert_eq!(s.residue_count(), 0);
    }

    #[test]
    fn interchangeable_terminal_hydrogens_give_one_partition() {
        let group = MonomerGroup::from_json_str(
            r#"{"monomers": {
                "CH2": "[*]-[#6](-[#1])(-[#1])-[*]",
                "H": "[*]-[#1]",
                "F": "[*]-[#9]"},
              "term_orient": {"H": "head", "F": "tail"}}"#,
        )
        .unwrap();
        let mut s = stripped_chain(&group, 2);
        assert!(matches!(find_partition(&s, &group), PartitionOutcome::Unique(_)));
        assert!(partition(&mut s, &group));
        let names: Vec<&str> = s.residues_iter().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["H", "CH2", "CH2", "F"]);
    }

    #[test]
    fn hydrogen_capped_polyethylene_uses_head_and_tail_caps() {
        let group = MonomerGroup::from_json_str(
            r#"{"monomers": {
                "PE": "[*]-[#6](-[#1])(-[#1])-[#6](-[#1])(-[#1])-[*]",
                "PE_TERM1": "[*]-[#1]",
                "PE_TERM2": "[#1]-[*]"},
              "term_orient": {"PE_TERM1": "head", "PE_TERM2": "tail"}}"#,
        )
        .unwrap();
        let mut s = stripped_chain(&group, 3);
        assert!(partition(&mut s, &group));
        let names: Vec<&str> = s.residues_iter().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["PE_TERM1", "PE", "PE", "PE", "PE_TERM2"]);
    }

    #[test]
    fn inequivalent_covers_are_ambiguous() {
        let group = MonomerGroup::from_json_str(
            r#"{"monomers": {
                "CC": "[#6]-[#6]-[*]",
                "C": "[#6]-[*]",
                "CO": "[*]-[#6]-[#8]",
                "O": "[*]-[#8]"}}"#,
        )
        .unwrap();
        let mut s = Structure::new("cco");
        let c1 = s.add_atom(Atom::new("A", Element::C, Point3::origin()));
        let c2 = s.add_atom(Atom::new("B", Element::C, Point3::new(1.5, 0.0, 0.0)));
        let o3 = s.add_atom(Atom::new("C", Element::O, Point3::new(3.0, 0.0, 0.0)));
        s.add_bond(c1, c2, BondOrder::Single).unwrap();
        s.add_bond(c2, o3, BondOrder::Single).unwrap();

        assert_eq!(find_partition(&s, &group), PartitionOutcome::Ambiguous);
        assert!(!partition(&mut s, &group));
        assert_eq!(s.residue_count(), 0);
    }

    #[test]
    fn formal_charge_constraints_are_enforced() {
        let group = MonomerGroup::from_json_str(
            r#"{"monomers": {"NH4": "[#7+](-[#1])(-[#1])(-[#1])-[#1]"}}"#,
        )
        .unwrap();
        let mut s = Structure::new("ammonium");
        let n = s.add_atom(Atom::new("N", Element::N, Point3::origin()));
        for i in 0..4 {
            let h = s.add_atom(Atom::new("H", Element::H, Point3::new(i as f64, 1.0, 0.0)));
            s.add_bond(n, h, BondOrder::Single).unwrap();
        }
        assert!(!partition(&mut s, &group));
        s.atom_mut(n).unwrap().formal_charge = 1;
        assert!(partition(&mut s, &group));
        assert_eq!(s.atom(n).unwrap().name, "N1");
    }

    #[test]
    fn disconnected_molecules_are_covered_independently() {
        let group = MonomerGroup::from_json_str(
            r#"{"monomers": {"HOH": "[#8](-[#1])-[#1]"}}"#,
        )
        .unwrap();
        let mut s = Structure::new("waters");
        for k in 0..3 {
            let base = Point3::new(5.0 * k as f64, 0.0, 0.0);
            let o = s.add_atom(Atom::new("O", Element::O, base));
            let h1 = s.add_atom(Atom::new("H", Element::H, base + nalgebra::Vector3::x()));
            let h2 = s.add_atom(Atom::new("H", Element::H, base + nalgebra::Vector3::y()));
            s.add_bond(o, h1, BondOrder::Single).unwrap();
            s.add_bond(o, h2, BondOrder::Single).unwrap();
        }
        assert!(partition(&mut s, &group));
        assert_eq!(s.residue_count(), 3);
    }

    #[test]
    fn empty_inputs_fail() {
        let group = copolymer_group();
        let mut empty = Structure::new("empty");
        assert!(!partition(&mut empty, &group));
        let mut s = stripped_chain(&group, 1);
        assert!(!partition(&mut s, &MonomerGroup::new()));
    }
}
