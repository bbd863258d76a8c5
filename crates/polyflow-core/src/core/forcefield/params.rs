use crate::core::models::element::Element;
use crate::core::models::topology::BondOrder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::Path;
use thiserror::Error;

const BUILTIN_FORCEFIELD: &str = include_str!("../../../data/forcefield.toml");

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct LennardJonesParam {
    /// Distance of the potential minimum, in Angstroms.
    pub radius: f64,
    /// Depth of the potential well, in kcal/mol.
    pub well_depth: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GlobalParams {
    pub dielectric_constant: f64,
    pub nonbonded_cutoff: f64,
    /// Scale applied to nonbonded terms between atoms three bonds apart.
    #[serde(default = "default_scale_14")]
    pub scale_14: f64,
}

fn default_scale_14() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BondedParams {
    /// Harmonic bond constant in kcal/(mol·Å²).
    pub bond_force_constant: f64,
    /// Harmonic angle constant in kcal/(mol·rad²).
    pub angle_force_constant: f64,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("No van der Waals parameters for element '{0}'")]
    MissingVdw(Element),
    #[error("Invalid parameter '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Classical force field used by the molecular-dynamics engine.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Forcefield {
    pub globals: GlobalParams,
    pub bonded: BondedParams,
    vdw: HashMap<Element, LennardJonesParam>,
}

impl Forcefield {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        Self::from_toml_str(&content, &path_str)
    }

    /// The force field shipped with the library.
    pub fn builtin() -> Result<Self, ParamLoadError> {
        Self::from_toml_str(BUILTIN_FORCEFIELD, "<builtin>")
    }

    fn from_toml_str(content: &str, origin: &str) -> Result<Self, ParamLoadError> {
        let ff: Self = toml::from_str(content).map_err(|e| ParamLoadError::Toml {
            path: origin.to_string(),
            source: e,
        })?;
        ff.validate()?;
        Ok(ff)
    }

    fn validate(&self) -> Result<(), ParamLoadError> {
        require_positive("dielectric_constant", self.globals.dielectric_constant)?;
        require_positive("nonbonded_cutoff", self.globals.nonbonded_cutoff)?;
        require_positive("bond_force_constant", self.bonded.bond_force_constant)?;
        require_positive("angle_force_constant", self.bonded.angle_force_constant)?;
        if !(0.0..=1.0).contains(&self.globals.scale_14) {
            return Err(ParamLoadError::Invalid {
                name: "scale_14",
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        Ok(())
    }

    pub fn vdw(&self, element: Element) -> Result<&LennardJonesParam, ParamLoadError> {
        self.vdw
            .get(&element)
            .ok_or(ParamLoadError::MissingVdw(element))
    }

    /// Mixed pair parameters: arithmetic mean radius, geometric mean depth.
    pub fn vdw_pair(&self, a: Element, b: Element) -> Result<LennardJonesParam, ParamLoadError> {
        let (pa, pb) = (self.vdw(a)?, self.vdw(b)?);
        Ok(LennardJonesParam {
            radius: 0.5 * (pa.radius + pb.radius),
            well_depth: (pa.well_depth * pb.well_depth).sqrt(),
        })
    }

    /// Equilibrium bond length from covalent radii, shortened for higher orders.
    pub fn bond_length(a: Element, b: Element, order: BondOrder) -> f64 {
        let scale = match order {
            BondOrder::Single => 1.0,
            BondOrder::Aromatic => 0.93,
            BondOrder::Double => 0.87,
            BondOrder::Triple => 0.78,
        };
        (a.covalent_radius() + b.covalent_radius() - 0.01) * scale
    }

    /// Equilibrium angle (radians) around a central atom.
    ///
    /// `center_orders` holds the orders of every bond on the central atom.
    pub fn angle_for_center(center: Element, center_orders: &[BondOrder]) -> f64 {
        let triples = center_orders.iter().filter(|o| **o == BondOrder::Triple).count();
        let doubles = center_orders.iter().filter(|o| **o == BondOrder::Double).count();
        let aromatic = center_orders.iter().any(|o| *o == BondOrder::Aromatic);
        let degrees = match center_orders.len() {
            0 | 1 => 180.0,
            2 if triples > 0 || doubles >= 2 => 180.0,
            2 if doubles == 1 || aromatic => 120.0,
            2 if center == Element::O => 104.52,
            2 if center == Element::S => 92.1,
            3 if doubles > 0 || aromatic => 120.0,
            _ => 109.471,
        };
        degrees * PI / 180.0
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ParamLoadError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ParamLoadError::Invalid {
            name,
            reason: format!("must be positive, got {value}"),
        })
    }
}
