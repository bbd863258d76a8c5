use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondOrder;
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, BufRead, Write};
use thiserror::Error;

const FORMAT_ATOM_LINE: &str =
    "FORMAT ATOM   (a6,1x,i5,1x,a5,1x,a3,1x,a1,1x,a5,3f10.5,1x,a5,i3,i2,1x,f8.5,1x,i3)";
const FORMAT_CONECT_LINE: &str = "FORMAT CONECT (a6,12i6)";

#[derive(Debug, Error)]
pub enum BgfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: BgfParseErrorKind,
    },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum BgfParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Unrecognized element in force field type column: '{0}'")]
    UnknownElement(String),
    #[error("Line is too short for ATOM/HETATM record (must be at least 80 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_field<T: std::str::FromStr>(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
    float: bool,
) -> Result<T, BgfError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| {
        let columns = format!("{}-{}", start + 1, end);
        BgfError::Parse {
            line: line_num,
            kind: if float {
                BgfParseErrorKind::InvalidFloat {
                    columns,
                    value: value.into(),
                }
            } else {
                BgfParseErrorKind::InvalidInt {
                    columns,
                    value: value.into(),
                }
            },
        }
    })
}

/// Element from a force field type such as `C_3`, `O_R` or plain `Cl`.
fn element_from_ff_type(ff_type: &str) -> Option<Element> {
    let symbol = ff_type.split('_').next().unwrap_or(ff_type);
    symbol.parse().ok()
}

/// Reader and writer for BGF (Biograph) files.
///
/// BGF is the annotated molecule format of the toolkit: besides coordinates and
/// connectivity it carries the residue assignment of every atom and its partial
/// charge. The force field type column holds the element symbol, and an
/// optional trailing integer column holds the formal charge.
pub struct BgfFile;

impl MolecularFile for BgfFile {
    type Error = BgfError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::default();
        let mut serial_to_index: HashMap<usize, usize> = HashMap::new();
        let mut seen_serials = HashSet::new();
        let mut current_residue: Option<((isize, String), ResidueId)> = None;

        let mut conect: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut orders: HashMap<usize, Vec<u8>> = HashMap::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            let record_type = slice_and_trim(&line, 0, 6);
            match record_type {
                "DESCRP" => structure.name = slice_and_trim(&line, 7, line.len()).to_string(),
                "CRYSTX" => {
                    let parts: Vec<f64> = line
                        .split_whitespace()
                        .skip(1)
                        .take(3)
                        .filter_map(|p| p.parse().ok())
                        .collect();
                    if let [a, b, c] = parts[..] {
                        structure.set_box_dimensions(Some(Vector3::new(a, b, c)));
                    }
                }
                "ATOM" | "HETATM" => {
                    if line.len() < 80 {
                        return Err(BgfError::Parse {
                            line: line_num,
                            kind: BgfParseErrorKind::LineTooShort,
                        });
                    }

                    let name_str = slice_and_trim(&line, 13, 18);
                    let res_name_str = slice_and_trim(&line, 19, 22);
                    let ff_type_str = slice_and_trim(&line, 61, 66);

                    if name_str.is_empty() {
                        return Err(BgfError::Parse {
                            line: line_num,
                            kind: BgfParseErrorKind::MissingRequiredField {
                                columns: "14-18".into(),
                            },
                        });
                    }
                    if ff_type_str.is_empty() {
                        return Err(BgfError::Parse {
                            line: line_num,
                            kind: BgfParseErrorKind::MissingRequiredField {
                                columns: "62-66".into(),
                            },
                        });
                    }

                    let serial: usize = parse_field(&line, line_num, 7, 12, false)?;
                    if !seen_serials.insert(serial) {
                        return Err(BgfError::Inconsistency(format!(
                            "Duplicate atom serial: {}",
                            serial
                        )));
                    }
                    let res_id: isize = parse_field(&line, line_num, 25, 30, false)?;
                    let x: f64 = parse_field(&line, line_num, 30, 40, true)?;
                    let y: f64 = parse_field(&line, line_num, 40, 50, true)?;
                    let z: f64 = parse_field(&line, line_num, 50, 60, true)?;
                    let charge: f64 = parse_field(&line, line_num, 72, 80, true)?;
                    let formal: i8 = slice_and_trim(&line, 80, 84).parse().unwrap_or(0);

                    let element = element_from_ff_type(ff_type_str).ok_or_else(|| BgfError::Parse {
                        line: line_num,
                        kind: BgfParseErrorKind::UnknownElement(ff_type_str.to_string()),
                    })?;

                    let mut atom =
                        Atom::new(name_str, element, Point3::new(x, y, z)).with_formal_charge(formal);
                    atom.partial_charge = charge;
                    let index = structure.add_atom(atom);
                    serial_to_index.insert(serial, index);

                    let key = (res_id, res_name_str.to_string());
                    let rid = match &current_residue {
                        Some((current_key, rid)) if *current_key == key => *rid,
                        _ => {
                            let rid = structure.add_residue(res_id, res_name_str);
                            current_residue = Some((key, rid));
                            rid
                        }
                    };
                    structure
                        .assign_atom(index, rid)
                        .map_err(|e| BgfError::Inconsistency(e.to_string()))?;
                }
                "CONECT" | "ORDER" => {
                    let mut parts = line.split_whitespace().skip(1);
                    let Some(Ok(origin)) = parts.next().map(str::parse::<usize>) else {
                        continue;
                    };
                    if record_type == "CONECT" {
                        let partners = parts.filter_map(|p| p.parse().ok()).collect();
                        conect.push((origin, partners));
                    } else {
                        let values = parts.filter_map(|p| p.parse().ok()).collect();
                        orders.insert(origin, values);
                    }
                }
                "END" => break,
                _ => {}
            }
        }

        if seen_serials.is_empty() {
            return Err(BgfError::MissingRecord("ATOM/HETATM records".into()));
        }

        let mut bonds: BTreeMap<(usize, usize), BondOrder> = BTreeMap::new();
        for (origin, partners) in conect {
            let origin_orders = orders.get(&origin);
            for (pos, partner) in partners.into_iter().enumerate() {
                let order = origin_orders
                    .and_then(|o| o.get(pos))
                    .and_then(|o| o.to_string().parse().ok())
                    .unwrap_or_default();
                let key = (origin.min(partner), origin.max(partner));
                let entry = bonds.entry(key).or_insert(order);
                if order != BondOrder::Single {
                    *entry = order;
                }
            }
        }
        for ((s1, s2), order) in bonds {
            let (Some(&a), Some(&b)) = (serial_to_index.get(&s1), serial_to_index.get(&s2)) else {
                return Err(BgfError::Inconsistency(format!(
                    "CONECT references unknown atom serial {} or {}",
                    s1, s2
                )));
            };
            structure
                .add_bond(a, b, order)
                .map_err(|e| BgfError::Inconsistency(e.to_string()))?;
        }

        Ok(structure)
    }

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "BIOGRF  332")?;
        writeln!(
            writer,
            "DESCRP {}",
            if structure.name.is_empty() {
                "polyflow"
            } else {
                structure.name.as_str()
            }
        )?;
        writeln!(writer, "REMARK Generated by polyflow")?;
        if let Some(dims) = structure.box_dimensions() {
            writeln!(
                writer,
                "PERIOD 111\nAXES   ZYX\nSGNAME P 1\nCRYSTX {:>11.5}{:>11.5}{:>11.5}{:>11.5}{:>11.5}{:>11.5}",
                dims.x, dims.y, dims.z, 90.0, 90.0, 90.0
            )?;
        }
        writeln!(writer, "{}", FORMAT_ATOM_LINE)?;

        for (idx, atom) in structure.atoms().iter().enumerate() {
            let (res_name, res_num) = match atom.residue.and_then(|rid| structure.residue(rid)) {
                Some(residue) => (residue.name.as_str(), residue.number),
                None => ("UNL", 1),
            };
            let res_name: String = res_name.chars().take(3).collect();
            write!(
                writer,
                "{:<6} {:>5} {:<5} {:<3} {:1} {:<5}{:>10.5}{:>10.5}{:>10.5} {:<5}{:>3}{:>2} {:>8.5}",
                "HETATM",
                idx + 1,
                atom.name,
                res_name,
                'A',
                res_num,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                atom.element.symbol(),
                structure.neighbors(idx).len(),
                0,
                atom.partial_charge
            )?;
            if atom.formal_charge != 0 {
                write!(writer, " {:>3}", atom.formal_charge)?;
            }
            writeln!(writer)?;
        }

        writeln!(writer, "{}", FORMAT_CONECT_LINE)?;
        for idx in 0..structure.atom_count() {
            let neighbors = structure.neighbors(idx);
            if neighbors.is_empty() {
                continue;
            }
            let mut sorted = neighbors.to_vec();
            sorted.sort_unstable();
            write!(writer, "CONECT{:>6}", idx + 1)?;
            for partner in &sorted {
                write!(writer, "{:>6}", partner + 1)?;
            }
            writeln!(writer)?;

            let partner_orders: Vec<BondOrder> = sorted
                .iter()
                .map(|&p| {
                    structure
                        .bond_between(idx, p)
                        .map_or(BondOrder::Single, |b| b.order)
                })
                .collect();
            if partner_orders.iter().any(|o| *o != BondOrder::Single) {
                write!(writer, "ORDER {:>6}", idx + 1)?;
                for order in partner_orders {
                    write!(writer, "{:>6}", order as u8)?;
                }
                writeln!(writer)?;
            }
        }

        writeln!(writer, "END")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn charged_fragment() -> Structure {
        let mut s = Structure::new("fragment");
        let rid = s.add_residue(1, "ACE");
        let mut c = Atom::new("C1", Element::C, Point3::new(0.1, 0.2, 0.3));
        c.partial_charge = 0.51234;
        let mut o = Atom::new("O1", Element::O, Point3::new(1.3, 0.2, 0.3)).with_formal_charge(-1);
        o.partial_charge = -0.51234;
        let ci = s.add_atom(c);
        let oi = s.add_atom(o);
        s.assign_atom(ci, rid).unwrap();
        s.assign_atom(oi, rid).unwrap();
        s.add_bond(ci, oi, BondOrder::Double).unwrap();
        s
    }

    #[test]
    fn write_then_read_preserves_residues_charges_and_orders() {
        let original = charged_fragment();
        let mut buffer = Vec::new();
        BgfFile::write_to(&original, &mut buffer).unwrap();

        let parsed = BgfFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(parsed.name, "fragment");
        assert_eq!(parsed.atom_count(), 2);
        assert!(parsed.is_partitioned());
        assert_eq!(parsed.residue_name_of(0), Some("ACE"));
        assert!((parsed.atom(0).unwrap().partial_charge - 0.51234).abs() < 1e-6);
        assert_eq!(parsed.atom(1).unwrap().formal_charge, -1);
        assert_eq!(parsed.atom(1).unwrap().element, Element::O);
        assert_eq!(parsed.bond_between(0, 1).unwrap().order, BondOrder::Double);
    }

    #[test]
    fn written_atom_lines_follow_fixed_columns() {
        let mut buffer = Vec::new();
        BgfFile::write_to(&charged_fragment(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let line = text.lines().find(|l| l.starts_with("HETATM")).unwrap();
        assert_eq!(slice_and_trim(line, 7, 12), "1");
        assert_eq!(slice_and_trim(line, 13, 18), "C1");
        assert_eq!(slice_and_trim(line, 19, 22), "ACE");
        assert_eq!(slice_and_trim(line, 61, 66), "C");
        assert_eq!(slice_and_trim(line, 72, 80), "0.51234");
    }

    #[test]
    fn box_dimensions_survive_round_trip() {
        let mut s = charged_fragment();
        s.set_box_dimensions(Some(Vector3::new(20.0, 21.0, 22.0)));
        let mut buffer = Vec::new();
        BgfFile::write_to(&s, &mut buffer).unwrap();
        let parsed = BgfFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(parsed.box_dimensions(), Some(Vector3::new(20.0, 21.0, 22.0)));
    }

    #[test]
    fn read_accepts_dreiding_style_force_field_types() {
        assert_eq!(element_from_ff_type("C_3"), Some(Element::C));
        assert_eq!(element_from_ff_type("O_R"), Some(Element::O));
        assert_eq!(element_from_ff_type("Cl"), Some(Element::Cl));
        assert_eq!(element_from_ff_type("Xx_1"), None);
    }

    #[test]
    fn read_rejects_short_atom_lines() {
        let data = "HETATM     1 C1    ACE A     1\nEND\n";
        let result = BgfFile::read_from(&mut Cursor::new(data));
        assert!(matches!(
            result,
            Err(BgfError::Parse {
                line: 1,
                kind: BgfParseErrorKind::LineTooShort
            })
        ));
    }

    #[test]
    fn read_fails_without_atom_records() {
        let result = BgfFile::read_from(&mut Cursor::new("BIOGRF  332\nEND\n"));
        assert!(matches!(result, Err(BgfError::MissingRecord(_))));
    }
}
