//! Parser for the explicit-hydrogen SMARTS subset used to describe monomers.
//!
//! Monomer fragments are written with every hydrogen explicit and with wildcard
//! atoms (`*`) marking attachment ports, for example
//! `[*:1]-[#6D4+0](-[#1])(-[#1])-[#8D2+0]-[*:2]`. Supported syntax: bracket
//! atoms with element symbols or `#<n>` atomic numbers, charges, atom maps and
//! the ignorable primitives `D`, `X`, `H`, `R`, `v`, `x`, `@`; unbracketed
//! organic-subset atoms; bonds `-`, `=`, `#`, `:`, `~`, `/`, `\`; branches; and
//! ring closures. Logical operators other than `;`/`&` are rejected.
//! Unbracketed atoms do not receive implicit hydrogens.

use super::template::{MonomerTemplate, Port, TemplateAtom, TemplateBond, TemplateError};
use crate::core::models::element::Element;
use crate::core::models::topology::BondOrder;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmartsError {
    #[error("unexpected character '{ch}' at position {pos}")]
    Unexpected { ch: char, pos: usize },
    #[error("unsupported SMARTS feature '{0}'")]
    Unsupported(String),
    #[error("unknown element in SMARTS: '{0}'")]
    UnknownElement(String),
    #[error("unterminated bracket atom")]
    UnterminatedBracket,
    #[error("unbalanced branch parentheses")]
    UnbalancedBranch,
    #[error("ring closure {0} was never closed")]
    OpenRing(u32),
    #[error("bond or branch before any atom")]
    DanglingBond,
    #[error("wildcard port must be bonded to exactly one atom")]
    InvalidPort,
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Atom {
        element: Element,
        aromatic: bool,
        charge: Option<i8>,
    },
    Wildcard,
}

type Edge = (usize, usize, Option<BondOrder>);

struct Parser {
    chars: Vec<char>,
    pos: usize,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Parser {
    fn new(src: &str) -> Self {
        Self {
            chars: src.trim().chars().collect(),
            pos: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn read_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.chars[start..self.pos].iter().collect::<String>().parse().ok()
    }

    fn parse(mut self) -> Result<(Vec<Node>, Vec<Edge>), SmartsError> {
        let mut prev: Option<usize> = None;
        let mut pending: Option<BondOrder> = None;
        let mut branches: Vec<usize> = Vec::new();
        let mut rings: HashMap<u32, (usize, Option<BondOrder>)> = HashMap::new();

        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    self.pos += 1;
                    branches.push(prev.ok_or(SmartsError::DanglingBond)?);
                }
                ')' => {
                    self.pos += 1;
                    prev = Some(branches.pop().ok_or(SmartsError::UnbalancedBranch)?);
                    pending = None;
                }
                '-' | '/' | '\\' | '~' => {
                    self.pos += 1;
                    pending = Some(BondOrder::Single);
                }
                '=' => {
                    self.pos += 1;
                    pending = Some(BondOrder::Double);
                }
                '#' => {
                    self.pos += 1;
                    pending = Some(BondOrder::Triple);
                }
                ':' => {
                    self.pos += 1;
                    pending = Some(BondOrder::Aromatic);
                }
                '.' => return Err(SmartsError::Unsupported(".".into())),
                '%' | '0'..='9' => {
                    let label = if c == '%' {
                        self.pos += 1;
                        let start = self.pos;
                        self.read_number()
                            .ok_or(SmartsError::Unexpected { ch: c, pos: start })?
                    } else {
                        self.pos += 1;
                        c.to_digit(10).unwrap_or(0)
                    };
                    let current = prev.ok_or(SmartsError::DanglingBond)?;
                    match rings.remove(&label) {
                        Some((opener, open_bond)) => {
                            self.edges.push((opener, current, pending.or(open_bond)));
                        }
                        None => {
                            rings.insert(label, (current, pending));
                        }
                    }
                    pending = None;
                }
                '[' => {
                    self.pos += 1;
                    let node = self.parse_bracket()?;
                    prev = Some(self.push_node(node, prev, pending.take()));
                }
                _ => {
                    let node = self.parse_organic()?;
                    prev = Some(self.push_node(node, prev, pending.take()));
                }
            }
        }

        if !branches.is_empty() {
            return Err(SmartsError::UnbalancedBranch);
        }
        if let Some(&label) = rings.keys().next() {
            return Err(SmartsError::OpenRing(label));
        }
        if pending.is_some() {
            return Err(SmartsError::DanglingBond);
        }
        Ok((self.nodes, self.edges))
    }

    fn push_node(&mut self, node: Node, prev: Option<usize>, bond: Option<BondOrder>) -> usize {
        self.nodes.push(node);
        let idx = self.nodes.len() - 1;
        if let Some(p) = prev {
            self.edges.push((p, idx, bond));
        }
        idx
    }

    fn parse_organic(&mut self) -> Result<Node, SmartsError> {
        let c = self.peek().ok_or(SmartsError::DanglingBond)?;
        let start = self.pos;
        self.pos += 1;
        if c == '*' {
            return Ok(Node::Wildcard);
        }
        let two: String = self.chars[start..(start + 2).min(self.chars.len())].iter().collect();
        if two == "Cl" || two == "Br" {
            self.pos += 1;
            return Ok(Node::Atom {
                element: two.parse().map_err(|_| SmartsError::UnknownElement(two.clone()))?,
                aromatic: false,
                charge: None,
            });
        }
        let (symbol, aromatic) = match c {
            'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' => (c.to_string(), false),
            'b' | 'c' | 'n' | 'o' | 'p' | 's' => (c.to_ascii_uppercase().to_string(), true),
            _ => return Err(SmartsError::Unexpected { ch: c, pos: start }),
        };
        Ok(Node::Atom {
            element: symbol
                .parse()
                .map_err(|_| SmartsError::UnknownElement(symbol.clone()))?,
            aromatic,
            charge: None,
        })
    }

    fn parse_bracket(&mut self) -> Result<Node, SmartsError> {
        let mut element: Option<Element> = None;
        let mut aromatic = false;
        let mut wildcard = false;
        let mut charge: Option<i8> = None;

        // Isotope prefix.
        self.read_number();

        loop {
            let c = self.peek().ok_or(SmartsError::UnterminatedBracket)?;
            let here = self.pos;
            match c {
                ']' => {
                    self.pos += 1;
                    break;
                }
                ';' | '&' => self.pos += 1,
                '!' | ',' => return Err(SmartsError::Unsupported(c.to_string())),
                '*' => {
                    self.pos += 1;
                    wildcard = true;
                }
                '#' => {
                    self.pos += 1;
                    let number = self
                        .read_number()
                        .ok_or(SmartsError::Unexpected { ch: c, pos: here })?;
                    element = Some(
                        u8::try_from(number)
                            .ok()
                            .and_then(Element::from_atomic_number)
                            .ok_or_else(|| SmartsError::UnknownElement(format!("#{}", number)))?,
                    );
                }
                '+' | '-' => {
                    self.pos += 1;
                    let sign: i8 = if c == '+' { 1 } else { -1 };
                    let magnitude = match self.read_number() {
                        Some(n) => n as i8,
                        None => {
                            let mut count = 1;
                            while self.peek() == Some(c) {
                                self.pos += 1;
                                count += 1;
                            }
                            count
                        }
                    };
                    charge = Some(sign * magnitude);
                }
                ':' => {
                    self.pos += 1;
                    self.read_number();
                }
                '@' => self.pos += 1,
                'H' if element.is_some() || wildcard => {
                    self.pos += 1;
                    self.read_number();
                }
                'D' | 'X' | 'R' | 'v' | 'x' if element.is_some() || wildcard => {
                    self.pos += 1;
                    self.read_number();
                }
                c if c.is_ascii_lowercase() && element.is_none() => {
                    self.pos += 1;
                    let symbol = c.to_ascii_uppercase().to_string();
                    element = Some(
                        symbol
                            .parse()
                            .map_err(|_| SmartsError::UnknownElement(symbol.clone()))?,
                    );
                    aromatic = true;
                }
                c if c.is_ascii_uppercase() && element.is_none() => {
                    self.pos += 1;
                    let mut symbol = c.to_string();
                    if let Some(next) = self.peek().filter(|n| n.is_ascii_lowercase()) {
                        let candidate = format!("{}{}", c, next);
                        if candidate.parse::<Element>().is_ok() {
                            symbol = candidate;
                            self.pos += 1;
                        }
                    }
                    element = Some(
                        symbol
                            .parse()
                            .map_err(|_| SmartsError::UnknownElement(symbol.clone()))?,
                    );
                }
                _ => return Err(SmartsError::Unexpected { ch: c, pos: here }),
            }
        }

        if wildcard {
            return Ok(Node::Wildcard);
        }
        let element = element.ok_or(SmartsError::Unsupported("bracket atom without element".into()))?;
        Ok(Node::Atom {
            element,
            aromatic,
            charge,
        })
    }
}

/// Parses a monomer SMARTS into a [`MonomerTemplate`] named `name`.
///
/// Atoms are named by element and order of appearance (`C1`, `C2`, `H1`, ...).
/// Every wildcard becomes a port on the atom it is bonded to.
pub fn template_from_smarts(name: &str, smarts: &str) -> Result<MonomerTemplate, SmartsError> {
    let (nodes, edges) = Parser::new(smarts).parse()?;

    let mut node_to_atom = vec![None; nodes.len()];
    let mut atoms = Vec::new();
    let mut counters: HashMap<Element, usize> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if let Node::Atom {
            element, charge, ..
        } = node
        {
            let counter = counters.entry(*element).or_default();
            *counter += 1;
            node_to_atom[idx] = Some(atoms.len());
            atoms.push(TemplateAtom {
                name: format!("{}{}", element.symbol(), counter),
                element: *element,
                formal_charge: *charge,
            });
        }
    }

    let default_order = |a: usize, b: usize| match (nodes[a], nodes[b]) {
        (
            Node::Atom { aromatic: true, .. },
            Node::Atom { aromatic: true, .. },
        ) => BondOrder::Aromatic,
        _ => BondOrder::Single,
    };

    let mut bonds = Vec::new();
    let mut ports = Vec::new();
    let mut wildcard_degree = vec![0usize; nodes.len()];
    for &(a, b, order) in &edges {
        let order = order.unwrap_or_else(|| default_order(a, b));
        match (node_to_atom[a], node_to_atom[b]) {
            (Some(x), Some(y)) => bonds.push(TemplateBond {
                atom1: x,
                atom2: y,
                order,
            }),
            (Some(x), None) => {
                wildcard_degree[b] += 1;
                ports.push((b, Port { atom: x, order }));
            }
            (None, Some(y)) => {
                wildcard_degree[a] += 1;
                ports.push((a, Port { atom: y, order }));
            }
            (None, None) => return Err(SmartsError::InvalidPort),
        }
    }
    for (idx, node) in nodes.iter().enumerate() {
        if matches!(node, Node::Wildcard) && wildcard_degree[idx] != 1 {
            return Err(SmartsError::InvalidPort);
        }
    }
    ports.sort_by_key(|(wildcard, _)| *wildcard);
    let ports = ports.into_iter().map(|(_, port)| port).collect();

    Ok(MonomerTemplate::new(name, atoms, bonds, ports)?)
}
