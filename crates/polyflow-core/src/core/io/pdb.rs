use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondOrder;
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Cannot determine element for atom '{0}'")]
    UnknownElement(String),
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let s = slice_and_trim(line, start, end);
    s.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: s.into(),
        },
    })
}

/// Parses a PDB formal charge field such as `1+` or `2-`.
fn parse_formal_charge(field: &str) -> i8 {
    let field = field.trim();
    if field.len() < 2 {
        return 0;
    }
    let (magnitude, sign) = field.split_at(field.len() - 1);
    let magnitude: i8 = magnitude.parse().unwrap_or(0);
    match sign {
        "-" => -magnitude,
        _ => magnitude,
    }
}

fn format_formal_charge(charge: i8) -> String {
    match charge {
        0 => "  ".to_string(),
        c if c > 0 => format!("{}+", c),
        c => format!("{}-", -c),
    }
}

/// Formats an atom name into the four-character PDB name field.
fn format_atom_name(name: &str, element: Element) -> String {
    if name.len() < 4 && element.symbol().len() == 1 {
        format!(" {:<3}", name)
    } else {
        format!("{:<4}", name)
    }
}

pub struct PdbFile;

impl PdbFile {
    /// Writes the ATOM/HETATM records of `structure` using `positions` in place of the
    /// stored coordinates.
    pub fn write_atom_records(
        structure: &Structure,
        positions: &[Point3<f64>],
        writer: &mut impl Write,
    ) -> Result<(), PdbError> {
        if positions.len() != structure.atom_count() {
            return Err(PdbError::Inconsistency(format!(
                "{} positions supplied for {} atoms",
                positions.len(),
                structure.atom_count()
            )));
        }
        let residue_numbers: HashMap<ResidueId, isize> = structure
            .residues_iter()
            .map(|(id, r)| (id, r.number))
            .collect();
        for (idx, (atom, pos)) in structure.atoms().iter().zip(positions).enumerate() {
            let (res_name, res_num) = match atom.residue {
                Some(rid) => (
                    structure.residue(rid).map_or("UNL", |r| r.name.as_str()),
                    residue_numbers.get(&rid).copied().unwrap_or(1),
                ),
                None => ("UNL", 1),
            };
            let res_name: String = res_name.chars().take(4).collect();
            writeln!(
                writer,
                "HETATM{:>5} {}{:1}{:<4}{:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}{:2}",
                (idx + 1) % 100_000,
                format_atom_name(&atom.name, atom.element),
                ' ',
                res_name,
                'A',
                res_num % 10_000,
                ' ',
                pos.x,
                pos.y,
                pos.z,
                1.0,
                0.0,
                atom.element.symbol().to_ascii_uppercase(),
                format_formal_charge(atom.formal_charge)
            )?;
        }
        Ok(())
    }

    /// Writes one `MODEL`/`ENDMDL` block, used for multi-frame trajectories.
    pub fn write_model(
        structure: &Structure,
        positions: &[Point3<f64>],
        model_number: usize,
        writer: &mut impl Write,
    ) -> Result<(), PdbError> {
        writeln!(writer, "MODEL     {:>4}", model_number)?;
        Self::write_atom_records(structure, positions, writer)?;
        writeln!(writer, "ENDMDL")?;
        Ok(())
    }

    pub fn write_cryst1(dims: &Vector3<f64>, writer: &mut impl Write) -> Result<(), PdbError> {
        writeln!(
            writer,
            "CRYST1{:>9.3}{:>9.3}{:>9.3}{:>7.2}{:>7.2}{:>7.2} P 1           1",
            dims.x, dims.y, dims.z, 90.0, 90.0, 90.0
        )?;
        Ok(())
    }

    pub fn write_conect(structure: &Structure, writer: &mut impl Write) -> Result<(), PdbError> {
        let mut partners: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for bond in structure.bonds() {
            let repeats = match bond.order {
                BondOrder::Double => 2,
                BondOrder::Triple => 3,
                BondOrder::Single | BondOrder::Aromatic => 1,
            };
            for _ in 0..repeats {
                partners.entry(bond.atom1 + 1).or_default().push(bond.atom2 + 1);
                partners.entry(bond.atom2 + 1).or_default().push(bond.atom1 + 1);
            }
        }
        for (serial, list) in partners {
            for chunk in list.chunks(4) {
                write!(writer, "CONECT{:>5}", serial)?;
                for partner in chunk {
                    write!(writer, "{:>5}", partner)?;
                }
                writeln!(writer)?;
            }
        }
        Ok(())
    }
}

impl MolecularFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::default();
        let mut serial_to_index: HashMap<usize, usize> = HashMap::new();
        let mut current_residue: Option<((char, String, String), ResidueId)> = None;
        let mut conect_counts: HashMap<(usize, usize), usize> = HashMap::new();
        let mut seen_model = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "COMPND" | "TITLE" if structure.name.is_empty() => {
                    structure.name = slice_and_trim(&line, 10, 80).to_string();
                }
                "CRYST1" => {
                    let a = parse_float(&line, line_num, 6, 15)?;
                    let b = parse_float(&line, line_num, 15, 24)?;
                    let c = parse_float(&line, line_num, 24, 33)?;
                    structure.set_box_dimensions(Some(Vector3::new(a, b, c)));
                }
                "MODEL" => {
                    if seen_model {
                        break;
                    }
                    seen_model = true;
                }
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }
                    let serial_str = slice_and_trim(&line, 6, 11);
                    let serial: usize = serial_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "7-11".into(),
                            value: serial_str.into(),
                        },
                    })?;
                    let name = slice_and_trim(&line, 12, 16);
                    let res_name = slice_and_trim(&line, 17, 21);
                    let chain = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');
                    let res_seq = slice_and_trim(&line, 22, 27);
                    let x = parse_float(&line, line_num, 30, 38)?;
                    let y = parse_float(&line, line_num, 38, 46)?;
                    let z = parse_float(&line, line_num, 46, 54)?;
                    let element_str = slice_and_trim(&line, 76, 78);
                    let element = element_str
                        .parse::<Element>()
                        .ok()
                        .or_else(|| Element::guess_from_atom_name(name))
                        .ok_or_else(|| PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::UnknownElement(name.to_string()),
                        })?;
                    let formal_charge = parse_formal_charge(slice_and_trim(&line, 78, 80));

                    let atom = Atom::new(name, element, Point3::new(x, y, z))
                        .with_formal_charge(formal_charge);
                    let index = structure.add_atom(atom);
                    if serial_to_index.insert(serial, index).is_some() {
                        return Err(PdbError::Inconsistency(format!(
                            "Duplicate atom serial: {}",
                            serial
                        )));
                    }

                    let key = (chain, res_seq.to_string(), res_name.to_string());
                    let rid = match &current_residue {
                        Some((current_key, rid)) if *current_key == key => *rid,
                        _ => {
                            let number = res_seq.parse().unwrap_or(structure.residue_count() as isize + 1);
                            let rid = structure.add_residue(number, res_name);
                            current_residue = Some((key, rid));
                            rid
                        }
                    };
                    structure
                        .assign_atom(index, rid)
                        .map_err(|e| PdbError::Inconsistency(e.to_string()))?;
                }
                "CONECT" => {
                    let Ok(origin) = slice_and_trim(&line, 6, 11).parse::<usize>() else {
                        continue;
                    };
                    for start in (11..31).step_by(5) {
                        if let Ok(partner) = slice_and_trim(&line, start, start + 5).parse::<usize>() {
                            *conect_counts.entry((origin, partner)).or_default() += 1;
                        }
                    }
                }
                "END" | "ENDMDL" => break,
                _ => {}
            }
        }

        if structure.atom_count() == 0 {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }

        // Repeated CONECT partners encode bond multiplicity; either direction may carry it.
        let mut undirected: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        for ((origin, partner), count) in conect_counts {
            let entry = undirected
                .entry((origin.min(partner), origin.max(partner)))
                .or_default();
            *entry = (*entry).max(count);
        }
        let pairs = undirected;
        for ((s1, s2), count) in pairs {
            let (Some(&a), Some(&b)) = (serial_to_index.get(&s1), serial_to_index.get(&s2)) else {
                return Err(PdbError::Inconsistency(format!(
                    "CONECT references unknown atom serial {} or {}",
                    s1, s2
                )));
            };
            let order = match count {
                1 => BondOrder::Single,
                2 => BondOrder::Double,
                _ => BondOrder::Triple,
            };
            structure
                .add_bond(a, b, order)
                .map_err(|e| PdbError::Inconsistency(e.to_string()))?;
        }
        Ok(structure)
    }

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        if !structure.name.is_empty() {
            writeln!(writer, "COMPND    {}", structure.name)?;
        }
        if let Some(dims) = structure.box_dimensions() {
            Self::write_cryst1(&dims, writer)?;
        }
        Self::write_atom_records(structure, &structure.positions(), writer)?;
        Self::write_conect(structure, writer)?;
        writeln!(writer, "END")?;
        Ok(())
    }
}
