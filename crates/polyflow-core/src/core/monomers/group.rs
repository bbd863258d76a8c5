use super::smarts::{SmartsError, template_from_smarts};
use super::template::{MonomerTemplate, TemplateError, TemplateSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Which end of a linear chain a terminal monomer caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalEnd {
    Head,
    Tail,
}

impl FromStr for TerminalEnd {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "tail" => Ok(Self::Tail),
            other => Err(format!("invalid terminal end '{}', expected 'head' or 'tail'", other)),
        }
    }
}

impl fmt::Display for TerminalEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Head => "head",
            Self::Tail => "tail",
        })
    }
}

/// Monomer name to chain end.
pub type TerminalOrientation = BTreeMap<String, TerminalEnd>;

/// How a monomer is written in a monomer file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonomerEntry {
    Smarts(String),
    SmartsList(Vec<String>),
    Explicit(TemplateSpec),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MonomerFile {
    monomers: BTreeMap<String, MonomerEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    term_orient: TerminalOrientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequence: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum MonomerLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Invalid SMARTS for monomer '{monomer}': {source}")]
    Smarts {
        monomer: String,
        source: SmartsError,
    },
    #[error("Invalid monomer template: {0}")]
    Template(#[from] TemplateError),
    #[error("Monomer '{0}' lists more than one pattern; exactly one is supported")]
    MultiplePatterns(String),
    #[error("Unknown monomer '{0}' referenced in monomer group")]
    UnknownMonomer(String),
}

/// A named collection of monomer templates plus the optional terminal orientation
/// and interior repeat sequence.
///
/// Templates are immutable once loaded. The orientation and sequence can be
/// changed after loading and persisted again with [`MonomerGroup::save`].
#[derive(Debug, Clone, Default)]
pub struct MonomerGroup {
    templates: BTreeMap<String, MonomerTemplate>,
    entries: BTreeMap<String, MonomerEntry>,
    term_orient: TerminalOrientation,
    sequence: Option<Vec<String>>,
}

impl MonomerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: impl IntoIterator<Item = MonomerTemplate>) -> Self {
        let mut group = Self::new();
        for template in templates {
            group.insert(template);
        }
        group
    }

    /// Adds (or replaces) a template, keyed by its name.
    pub fn insert(&mut self, template: MonomerTemplate) {
        let name = template.name().to_string();
        self.entries
            .insert(name.clone(), MonomerEntry::Explicit(template.to_spec()));
        self.templates.insert(name, template);
    }

    pub fn load(path: &Path) -> Result<Self, MonomerLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| MonomerLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: MonomerFile =
            serde_json::from_str(&content).map_err(|e| MonomerLoadError::Json {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
        Self::from_file(file)
    }

    pub fn from_json_str(content: &str) -> Result<Self, MonomerLoadError> {
        let file: MonomerFile =
            serde_json::from_str(content).map_err(|e| MonomerLoadError::Json {
                path: "<string>".to_string(),
                source: e,
            })?;
        Self::from_file(file)
    }

    fn from_file(file: MonomerFile) -> Result<Self, MonomerLoadError> {
        let mut templates = BTreeMap::new();
        for (name, entry) in &file.monomers {
            let template = match entry {
                MonomerEntry::Smarts(smarts) => parse_smarts(name, smarts)?,
                MonomerEntry::SmartsList(list) => match list.as_slice() {
                    [smarts] => parse_smarts(name, smarts)?,
                    _ => return Err(MonomerLoadError::MultiplePatterns(name.clone())),
                },
                MonomerEntry::Explicit(spec) => MonomerTemplate::from_spec(name, spec.clone())?,
            };
            templates.insert(name.clone(), template);
        }
        let mut group = Self {
            templates,
            entries: file.monomers,
            term_orient: TerminalOrientation::new(),
            sequence: None,
        };
        group.set_term_orient(file.term_orient)?;
        if let Some(sequence) = file.sequence {
            group.set_sequence(sequence)?;
        }
        Ok(group)
    }

    pub fn save(&self, path: &Path) -> Result<(), MonomerLoadError> {
        let file = MonomerFile {
            monomers: self.entries.clone(),
            term_orient: self.term_orient.clone(),
            sequence: self.sequence.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| MonomerLoadError::Json {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| MonomerLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn get(&self, name: &str) -> Option<&MonomerTemplate> {
        self.templates.get(name)
    }

    /// Templates in name order.
    pub fn templates(&self) -> impl Iterator<Item = &MonomerTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn term_orient(&self) -> &TerminalOrientation {
        &self.term_orient
    }

    /// Replaces the terminal orientation.
    ///
    /// # Errors
    ///
    /// Returns [`MonomerLoadError::UnknownMonomer`] if a name is not in the group.
    pub fn set_term_orient(&mut self, orientation: TerminalOrientation) -> Result<(), MonomerLoadError> {
        if let Some(unknown) = orientation.keys().find(|n| !self.templates.contains_key(*n)) {
            return Err(MonomerLoadError::UnknownMonomer(unknown.clone()));
        }
        self.term_orient = orientation;
        Ok(())
    }

    pub fn sequence(&self) -> Option<&[String]> {
        self.sequence.as_deref()
    }

    /// Sets the interior repeat sequence used for copolymers.
    pub fn set_sequence(&mut self, sequence: Vec<String>) -> Result<(), MonomerLoadError> {
        if let Some(unknown) = sequence.iter().find(|n| !self.templates.contains_key(*n)) {
            return Err(MonomerLoadError::UnknownMonomer(unknown.clone()));
        }
        self.sequence = Some(sequence);
        Ok(())
    }

    /// Monomers with exactly one port, in name order.
    pub fn terminal_names(&self) -> Vec<&str> {
        self.templates
            .values()
            .filter(|t| t.valence() == 1)
            .map(MonomerTemplate::name)
            .collect()
    }

    /// Monomers with exactly two ports, in name order.
    pub fn interior_names(&self) -> Vec<&str> {
        self.templates
            .values()
            .filter(|t| t.valence() == 2)
            .map(MonomerTemplate::name)
            .collect()
    }

    /// A group is linear when it has zero or two single-port terminal monomers and
    /// every other monomer has exactly two ports.
    pub fn is_linear(&self) -> bool {
        let terminals = self.templates.values().filter(|t| t.valence() == 1).count();
        let all_valid = self
            .templates
            .values()
            .all(|t| t.valence() == 1 || t.valence() == 2);
        !self.templates.is_empty() && all_valid && (terminals == 0 || terminals == 2)
    }

    /// One cycle of interior monomers as they repeat along the chain.
    ///
    /// Uses the explicit sequence when set (ignoring non-interior entries),
    /// otherwise every interior monomer once, in name order.
    pub fn interior_cycle(&self) -> Vec<&MonomerTemplate> {
        match &self.sequence {
            Some(sequence) => sequence
                .iter()
                .filter_map(|name| self.templates.get(name))
                .filter(|t| t.valence() == 2)
                .collect(),
            None => self
                .templates
                .values()
                .filter(|t| t.valence() == 2)
                .collect(),
        }
    }
}

fn parse_smarts(name: &str, smarts: &str) -> Result<MonomerTemplate, MonomerLoadError> {
    template_from_smarts(name, smarts).map_err(|e| MonomerLoadError::Smarts {
        monomer: name.to_string(),
        source: e,
    })
}
