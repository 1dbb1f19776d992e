//! Output file names for each registry role

use crate::config::Convention;
use crate::error::{Result, TedanaError};
use crate::registry::roles;
use chrono::{DateTime, Duration, Local};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const LOG_PREFIX: &str = "tedana_";
pub const LOG_EXTENSION: &str = "tsv";
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S";

/// role, bids name, orig name
const ROLE_FILES: &[(&str, &str, &str)] = &[
    (roles::METRICS_TSV, "desc-tedana_metrics.tsv", "ica_metrics.tsv"),
    (roles::MIXING_TSV, "desc-ICA_mixing.tsv", "ica_mixing.tsv"),
    (
        roles::ORTH_MIXING_TSV,
        "desc-ICAOrth_mixing.tsv",
        "ica_orth_mixing.tsv",
    ),
    (
        roles::DECISION_TREE_JSON,
        "desc-ICA_decision_tree.json",
        "ica_decision_tree.json",
    ),
    (
        roles::STATUS_TABLE_TSV,
        "desc-ICA_status_table.tsv",
        "ica_status_table.tsv",
    ),
    (
        roles::CROSS_COMPONENT_JSON,
        "desc-ICACrossComponent_metrics.json",
        "ica_cross_component_metrics.json",
    ),
    (roles::REGISTRY_JSON, "desc-tedana_registry.json", "registry.json"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    prefix: String,
    convention: Convention,
}

impl OutputNames {
    pub fn new(prefix: &str, convention: Convention) -> Self {
        Self {
            prefix: prefix.trim_end_matches('_').to_string(),
            convention,
        }
    }

    /// File name for a role, or `KeyNotFound` for roles without one.
    pub fn file_name(&self, role: &str) -> Result<String> {
        let (_, bids, orig) = ROLE_FILES
            .iter()
            .find(|(r, _, _)| *r == role)
            .ok_or_else(|| TedanaError::KeyNotFound(role.to_string()))?;
        let base = match self.convention {
            Convention::Bids => bids,
            Convention::Orig => orig,
        };
        if self.prefix.is_empty() {
            Ok(base.to_string())
        } else {
            Ok(format!("{}_{}", self.prefix, base))
        }
    }

    pub fn path_in(&self, dir: &Path, role: &str) -> Result<PathBuf> {
        Ok(dir.join(self.file_name(role)?))
    }
}

pub fn log_file_name(timestamp: DateTime<Local>) -> String {
    format!(
        "{}{}.{}",
        LOG_PREFIX,
        timestamp.format(LOG_TIMESTAMP_FORMAT),
        LOG_EXTENSION
    )
}

/// Run logs already present in `dir`, sorted by name.
pub fn existing_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        LOG_PREFIX,
        LOG_EXTENSION
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| TedanaError::InvalidParameter(format!("invalid log pattern '{}': {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable log entry: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// First free log name at or after `start`, stepping one second at a time.
pub fn unique_log_name(dir: &Path, start: DateTime<Local>) -> Result<String> {
    let taken: BTreeSet<String> = existing_log_files(dir)?
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();

    let mut timestamp = start;
    let mut name = log_file_name(timestamp);
    while taken.contains(&name) {
        timestamp += Duration::seconds(1);
        name = log_file_name(timestamp);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bids_and_orig_names() {
        let bids = OutputNames::new("", Convention::Bids);
        assert_eq!(bids.file_name(roles::METRICS_TSV).unwrap(), "desc-tedana_metrics.tsv");
        assert_eq!(
            bids.file_name(roles::REGISTRY_JSON).unwrap(),
            "desc-tedana_registry.json"
        );

        let orig = OutputNames::new("", Convention::Orig);
        assert_eq!(orig.file_name(roles::MIXING_TSV).unwrap(), "ica_mixing.tsv");
        assert_eq!(orig.file_name(roles::REGISTRY_JSON).unwrap(), "registry.json");

        assert!(matches!(
            bids.file_name(roles::INPUT_DATA),
            Err(TedanaError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_prefix() {
        let names = OutputNames::new("sub-01", Convention::Bids);
        assert_eq!(
            names.file_name(roles::STATUS_TABLE_TSV).unwrap(),
            "sub-01_desc-ICA_status_table.tsv"
        );
        let trailing = OutputNames::new("sub-01_", Convention::Bids);
        assert_eq!(trailing, names);
    }

    #[test]
    fn test_log_name_format() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(log_file_name(ts), "tedana_2024-03-09T140507.tsv");
    }

    #[test]
    fn test_unique_log_name_skips_taken_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        std::fs::write(dir.path().join("tedana_2024-03-09T140507.tsv"), "").unwrap();
        std::fs::write(dir.path().join("tedana_2024-03-09T140508.tsv"), "").unwrap();

        assert_eq!(
            unique_log_name(dir.path(), ts).unwrap(),
            "tedana_2024-03-09T140509.tsv"
        );
        assert_eq!(existing_log_files(dir.path()).unwrap().len(), 2);
    }
}
