use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical elements recognized in polymer structures.
///
/// The set covers the organic subset plus the common counter-ions and halogens
/// encountered in polymer chemistry. Each variant carries its standard atomic
/// mass, atomic number, and single-bond covalent radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    H,
    Li,
    B,
    C,
    N,
    O,
    F,
    Na,
    Mg,
    Si,
    P,
    S,
    Cl,
    K,
    Ca,
    Br,
    I,
}

static SYMBOLS: Map<&'static str, Element> = phf_map! {
    "H" => Element::H,
    "LI" => Element::Li,
    "B" => Element::B,
    "C" => Element::C,
    "N" => Element::N,
    "O" => Element::O,
    "F" => Element::F,
    "NA" => Element::Na,
    "MG" => Element::Mg,
    "SI" => Element::Si,
    "P" => Element::P,
    "S" => Element::S,
    "CL" => Element::Cl,
    "K" => Element::K,
    "CA" => Element::Ca,
    "BR" => Element::Br,
    "I" => Element::I,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown element symbol: '{0}'")]
pub struct ParseElementError(pub String);

impl Element {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::H => "H",
            Self::Li => "Li",
            Self::B => "B",
            Self::C => "C",
            Self::N => "N",
            Self::O => "O",
            Self::F => "F",
            Self::Na => "Na",
            Self::Mg => "Mg",
            Self::Si => "Si",
            Self::P => "P",
            Self::S => "S",
            Self::Cl => "Cl",
            Self::K => "K",
            Self::Ca => "Ca",
            Self::Br => "Br",
            Self::I => "I",
        }
    }

    pub fn atomic_number(&self) -> u8 {
        match self {
            Self::H => 1,
            Self::Li => 3,
            Self::B => 5,
            Self::C => 6,
            Self::N => 7,
            Self::O => 8,
            Self::F => 9,
            Self::Na => 11,
            Self::Mg => 12,
            Self::Si => 14,
            Self::P => 15,
            Self::S => 16,
            Self::Cl => 17,
            Self::K => 19,
            Self::Ca => 20,
            Self::Br => 35,
            Self::I => 53,
        }
    }

    pub fn from_atomic_number(number: u8) -> Option<Self> {
        SYMBOLS
            .values()
            .copied()
            .find(|el| el.atomic_number() == number)
    }

    /// Standard atomic mass in daltons.
    pub fn mass(&self) -> f64 {
        match self {
            Self::H => 1.008,
            Self::Li => 6.94,
            Self::B => 10.81,
            Self::C => 12.011,
            Self::N => 14.007,
            Self::O => 15.999,
            Self::F => 18.998,
            Self::Na => 22.990,
            Self::Mg => 24.305,
            Self::Si => 28.085,
            Self::P => 30.974,
            Self::S => 32.06,
            Self::Cl => 35.45,
            Self::K => 39.098,
            Self::Ca => 40.078,
            Self::Br => 79.904,
            Self::I => 126.904,
        }
    }

    /// Single-bond covalent radius in Angstroms.
    pub fn covalent_radius(&self) -> f64 {
        match self {
            Self::H => 0.31,
            Self::Li => 1.28,
            Self::B => 0.84,
            Self::C => 0.76,
            Self::N => 0.71,
            Self::O => 0.66,
            Self::F => 0.57,
            Self::Na => 1.66,
            Self::Mg => 1.41,
            Self::Si => 1.11,
            Self::P => 1.07,
            Self::S => 1.05,
            Self::Cl => 1.02,
            Self::K => 2.03,
            Self::Ca => 1.76,
            Self::Br => 1.20,
            Self::I => 1.39,
        }
    }

    /// Guesses the element from a PDB-style atom name when no element column is present.
    ///
    /// Two-letter symbols are only accepted when the name is exactly that symbol,
    /// so `CA` in a name such as `CA1` resolves to carbon.
    pub fn guess_from_atom_name(name: &str) -> Option<Self> {
        let letters: String = name
            .trim()
            .chars()
            .skip_while(|c| c.is_ascii_digit())
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if letters.is_empty() {
            return None;
        }
        let upper = letters.to_ascii_uppercase();
        if upper.len() <= 2 {
            if let Some(&el) = SYMBOLS.get(upper.as_str()) {
                if upper.len() == 1 || name.trim().len() == upper.len() {
                    return Some(el);
                }
            }
        }
        SYMBOLS.get(&upper[..1]).copied()
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SYMBOLS
            .get(s.trim().to_ascii_uppercase().as_str())
            .copied()
            .ok_or_else(|| ParseElementError(s.to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl serde::Serialize for Element {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> serde::Deserialize<'de> for Element {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!("c".parse::<Element>().unwrap(), Element::C);
        assert_eq!("Cl".parse::<Element>().unwrap(), Element::Cl);
        assert_eq!("BR".parse::<Element>().unwrap(), Element::Br);
    }

    #[test]
    fn from_str_rejects_unknown_symbols() {
        assert_eq!(
            "Xx".parse::<Element>(),
            Err(ParseElementError("Xx".to_string()))
        );
    }

    #[test]
    fn guess_from_atom_name_prefers_single_letter_for_numbered_names() {
        assert_eq!(Element::guess_from_atom_name("CA1"), Some(Element::C));
        assert_eq!(Element::guess_from_atom_name("H12"), Some(Element::H));
        assert_eq!(Element::guess_from_atom_name("1HB"), Some(Element::H));
        assert_eq!(Element::guess_from_atom_name("CL"), Some(Element::Cl));
        assert_eq!(Element::guess_from_atom_name("O"), Some(Element::O));
        assert_eq!(Element::guess_from_atom_name("  "), None);
    }

    #[test]
    fn from_atomic_number_inverts_atomic_number() {
        assert_eq!(Element::from_atomic_number(6), Some(Element::C));
        assert_eq!(Element::from_atomic_number(17), Some(Element::Cl));
        assert_eq!(Element::from_atomic_number(2), None);
    }

    #[test]
    fn display_uses_conventional_capitalization() {
        assert_eq!(Element::Na.to_string(), "Na");
        assert_eq!(Element::O.to_string(), "O");
    }

    #[test]
    fn serde_round_trips_through_symbol() {
        let json = serde_json::to_string(&Element::Si).unwrap();
        assert_eq!(json, "\"Si\"");
        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Element::Si);
    }
}
