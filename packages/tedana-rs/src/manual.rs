//! Manual component list parsing
//!
//! Users hand over components to accept or reject in several shapes: explicit
//! integers from library calls, loosely typed numbers (CLI tokens, JSON), a
//! single comma/space delimited string, or a path to a file holding such a
//! list. [`ManualInput`] names each shape explicitly and
//! [`parse_manual_list`] turns any of them into an ordered, de-duplicated
//! [`ComponentSet`].

use crate::error::{Result, TedanaError};
use crate::types::ComponentSet;
use std::path::{Path, PathBuf};

/// Column holding component indices in CSV/TSV manual lists
pub const COMPONENTS_COLUMN: &str = "Components";

#[derive(Debug, Clone, PartialEq)]
pub enum ManualInput {
    /// Already-typed indices
    Indices(Vec<usize>),
    /// Numbers that still need an integrality check
    Numbers(Vec<f64>),
    /// One string of comma and/or whitespace separated integers
    Delimited(String),
    /// File containing a delimited list or a `Components` column
    Path(PathBuf),
}

impl ManualInput {
    /// Resolve raw command-line tokens.
    ///
    /// Several tokens are a numeric sequence. A single token is a file path
    /// when such a file exists, otherwise a delimited string.
    pub fn from_tokens(tokens: &[String]) -> Result<Self> {
        match tokens {
            [] => Ok(ManualInput::Indices(Vec::new())),
            [single] => {
                let trimmed = single.trim();
                if !trimmed.is_empty() && Path::new(trimmed).is_file() {
                    Ok(ManualInput::Path(PathBuf::from(trimmed)))
                } else {
                    Ok(ManualInput::Delimited(single.clone()))
                }
            }
            many => {
                let numbers = many
                    .iter()
                    .map(|t| {
                        t.trim()
                            .parse::<f64>()
                            .map_err(|_| TedanaError::NonIntegerComponent {
                                value: t.clone(),
                                input: format!("{:?}", many),
                            })
                    })
                    .collect::<Result<Vec<f64>>>()?;
                Ok(ManualInput::Numbers(numbers))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ManualInput::Indices(v) => v.is_empty(),
            ManualInput::Numbers(v) => v.is_empty(),
            ManualInput::Delimited(s) => s.trim().is_empty(),
            ManualInput::Path(_) => false,
        }
    }
}

impl Default for ManualInput {
    fn default() -> Self {
        ManualInput::Indices(Vec::new())
    }
}

impl From<Vec<usize>> for ManualInput {
    fn from(v: Vec<usize>) -> Self {
        ManualInput::Indices(v)
    }
}

impl From<&[usize]> for ManualInput {
    fn from(v: &[usize]) -> Self {
        ManualInput::Indices(v.to_vec())
    }
}

impl From<&str> for ManualInput {
    fn from(s: &str) -> Self {
        ManualInput::Delimited(s.to_string())
    }
}

/// Parse any manual input shape into a set of component indices.
pub fn parse_manual_list(input: &ManualInput) -> Result<ComponentSet> {
    match input {
        ManualInput::Indices(indices) => Ok(indices.iter().copied().collect()),
        ManualInput::Numbers(numbers) => parse_numbers(numbers),
        ManualInput::Delimited(text) => parse_delimited(text),
        ManualInput::Path(path) => parse_file(path),
    }
}

fn parse_numbers(numbers: &[f64]) -> Result<ComponentSet> {
    match numbers {
        [] => Ok(ComponentSet::new()),
        [single] => as_index(*single)
            .map(|i| ComponentSet::from([i]))
            .ok_or_else(|| TedanaError::UnrecognizedManualInput(format!("{:?}", numbers))),
        many => many
            .iter()
            .map(|&value| {
                as_index(value).ok_or_else(|| TedanaError::NonIntegerComponent {
                    value: value.to_string(),
                    input: format!("{:?}", many),
                })
            })
            .collect(),
    }
}

fn as_index(value: f64) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < usize::MAX as f64 {
        Some(value as usize)
    } else {
        None
    }
}

/// Split on commas and any whitespace, dropping empty tokens.
fn parse_delimited(text: &str) -> Result<ComponentSet> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| parse_token(token, text))
        .collect()
}

fn parse_token(token: &str, input: &str) -> Result<usize> {
    if let Ok(index) = token.parse::<usize>() {
        return Ok(index);
    }
    token
        .parse::<f64>()
        .ok()
        .and_then(as_index)
        .ok_or_else(|| TedanaError::InvalidComponentToken {
            token: token.to_string(),
            input: input.to_string(),
        })
}

fn parse_file(path: &Path) -> Result<ComponentSet> {
    if !path.is_file() {
        return Err(TedanaError::UnrecognizedManualInput(
            path.display().to_string(),
        ));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let delimiter = match extension.as_deref() {
        Some("csv") => b',',
        Some("tsv") => b'\t',
        _ => {
            let contents = std::fs::read_to_string(path).map_err(TedanaError::read_file(path))?;
            return parse_delimited(&contents);
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(TedanaError::csv_file(path))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(TedanaError::csv_file(path))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let column = headers
        .iter()
        .position(|h| h == COMPONENTS_COLUMN)
        .or_else(|| {
            if headers.len() == 2 {
                headers.iter().position(|h| h == "0")
            } else {
                None
            }
        })
        .ok_or_else(|| TedanaError::NoComponentsColumn(path.to_path_buf()))?;

    let source = path.display().to_string();
    let mut components = ComponentSet::new();
    for record in reader.records() {
        let record = record.map_err(TedanaError::csv_file(path))?;
        match record.get(column).map(str::trim) {
            Some(cell) if !cell.is_empty() => {
                components.insert(parse_token(cell, &source)?);
            }
            _ => {}
        }
    }

    log::debug!(
        "Read {} components from column '{}' of {}",
        components.len(),
        headers[column],
        source
    );
    Ok(components)
}
