use nalgebra::Vector3;
use polyflow::core::monomers::group::{TerminalEnd, TerminalOrientation};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid format for '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Invalid box dimensions '{0}'. Expected three positive lengths in Å, e.g. '40,40,40'.")]
    InvalidBoxDimensions(String),

    #[error("Invalid terminal orientation '{0}'. Expected MONOMER=head or MONOMER=tail.")]
    InvalidOrientation(String),

    #[error("Component '{component}' cannot be empty in '{text}'.")]
    EmptyComponent {
        component: &'static str,
        text: String,
    },
}

/// Splits `KEY=VALUE` at the first `=`.
pub fn parse_key_value(text: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidKeyValue(text.to_string()))?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "key",
            text: text.to_string(),
        });
    }
    if value.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "value",
            text: text.to_string(),
        });
    }
    Ok((key, value))
}

/// Parses `X,Y,Z` (commas or whitespace) into box edge lengths.
pub fn parse_box_dimensions(text: &str) -> Result<Vector3<f64>, ParseError> {
    let invalid = || ParseError::InvalidBoxDimensions(text.to_string());
    let values = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [x, y, z] if [x, y, z].iter().all(|v| v.is_finite() && **v > 0.0) => {
            Ok(Vector3::new(*x, *y, *z))
        }
        _ => Err(invalid()),
    }
}

pub fn parse_orientation(pairs: &[String]) -> Result<Option<TerminalOrientation>, ParseError> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut orientation = TerminalOrientation::new();
    for pair in pairs {
        let (monomer, end) =
            parse_key_value(pair).map_err(|_| ParseError::InvalidOrientation(pair.clone()))?;
        let end: TerminalEnd = end
            .parse()
            .map_err(|_| ParseError::InvalidOrientation(pair.clone()))?;
        orientation.insert(monomer.to_string(), end);
    }
    Ok(Some(orientation))
}

/// Where a step's simulation parameters come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsSource {
    Preset(String),
    File(PathBuf),
}

/// Treats anything that looks like a path as a parameter file, otherwise a preset name.
pub fn parse_params_source(text: &str) -> ParamsSource {
    let path = Path::new(text);
    if path.is_absolute() || text.contains(['/', '\\']) || text.ends_with(".toml") {
        ParamsSource::File(path.to_path_buf())
    } else {
        ParamsSource::Preset(text.to_string())
    }
}

/// File stem of `path`, used as a molecule name when none is given.
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_splits_at_first_equals() {
        assert_eq!(
            parse_key_value("output.prefix=a=b").unwrap(),
            ("output.prefix", "a=b")
        );
        assert_eq!(
            parse_key_value("novalue"),
            Err(ParseError::InvalidKeyValue("novalue".to_string()))
        );
        assert!(matches!(
            parse_key_value("=3"),
            Err(ParseError::EmptyComponent { component: "key", .. })
        ));
        assert!(matches!(
            parse_key_value("seed= "),
            Err(ParseError::EmptyComponent { component: "value", .. })
        ));
    }

    #[test]
    fn box_dimensions_accept_commas_and_spaces() {
        assert_eq!(
            parse_box_dimensions("40,40.5,41").unwrap(),
            Vector3::new(40.0, 40.5, 41.0)
        );
        assert_eq!(
            parse_box_dimensions("30 30 30").unwrap(),
            Vector3::new(30.0, 30.0, 30.0)
        );
        assert!(parse_box_dimensions("30,30").is_err());
        assert!(parse_box_dimensions("30,-1,30").is_err());
        assert!(parse_box_dimensions("a,b,c").is_err());
    }

    #[test]
    fn orientation_pairs_map_monomers_to_ends() {
        let pairs = vec!["HO=head".to_string(), "FL=Tail".to_string()];
        let orientation = parse_orientation(&pairs).unwrap().unwrap();
        assert_eq!(orientation["HO"], TerminalEnd::Head);
        assert_eq!(orientation["FL"], TerminalEnd::Tail);

        assert_eq!(parse_orientation(&[]).unwrap(), None);
        assert_eq!(
            parse_orientation(&["HO=middle".to_string()]),
            Err(ParseError::InvalidOrientation("HO=middle".to_string()))
        );
    }

    #[test]
    fn params_source_distinguishes_presets_from_files() {
        assert_eq!(
            parse_params_source("anneal"),
            ParamsSource::Preset("anneal".to_string())
        );
        assert_eq!(
            parse_params_source("params/anneal.toml"),
            ParamsSource::File(PathBuf::from("params/anneal.toml"))
        );
        assert_eq!(
            parse_params_source("custom.toml"),
            ParamsSource::File(PathBuf::from("custom.toml"))
        );
    }
}
