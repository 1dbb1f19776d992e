//! File registry and provenance log
//!
//! A registry maps logical output roles ("ICA metrics tsv", ...) to paths
//! relative to the registry file and keeps an append-only history of the runs
//! that wrote into its directory. On disk it is a flat JSON object, so
//! registries without a `history` key load as well.

use crate::error::{Result, TedanaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Well-known registry roles
pub mod roles {
    pub const METRICS_TSV: &str = "ICA metrics tsv";
    pub const MIXING_TSV: &str = "ICA mixing tsv";
    pub const ORTH_MIXING_TSV: &str = "ICA orthogonalized mixing tsv";
    pub const DECISION_TREE_JSON: &str = "ICA decision tree json";
    pub const STATUS_TABLE_TSV: &str = "ICA status table tsv";
    pub const CROSS_COMPONENT_JSON: &str = "ICA cross component metrics json";
    pub const REGISTRY_JSON: &str = "registry json";
    pub const INPUT_DATA: &str = "input data";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryEntry {
    File(PathBuf),
    /// Lists (e.g. input data) are not checked for existence on load.
    Files(Vec<PathBuf>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunCounts {
    pub accepted: usize,
    pub rejected: usize,
    pub ignored: usize,
}

/// One run that wrote into the registry's directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub workflow: String,
    pub log_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub counts: RunCounts,
}

impl LogEvent {
    pub fn new(workflow: impl Into<String>, log_file: impl Into<String>, counts: RunCounts) -> Self {
        Self {
            seq: 0,
            timestamp: Utc::now(),
            run_id: Uuid::new_v4(),
            workflow: workflow.into(),
            log_file: log_file.into(),
            source: None,
            counts,
        }
    }

    pub fn with_source(mut self, source: &Path) -> Self {
        self.source = Some(source.display().to_string());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(skip)]
    path: PathBuf,
    #[serde(flatten)]
    entries: BTreeMap<String, RegistryEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<LogEvent>,
}

impl Registry {
    /// Empty registry that will live at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load and verify that every single-file entry exists.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let registry = Self::load_unchecked(path)?;
        registry.verify()?;
        Ok(registry)
    }

    /// Load without checking referenced files.
    pub fn load_unchecked<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(TedanaError::read_file(path))?;
        let mut registry: Registry =
            serde_json::from_str(&text).map_err(TedanaError::json_file(path))?;
        registry.path = path.to_path_buf();
        log::debug!(
            "Loaded registry {} with {} roles and {} history events",
            path.display(),
            registry.entries.len(),
            registry.history.len()
        );
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that relative entries are resolved against
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn lookup(&self, role: &str) -> Result<&Path> {
        match self.entries.get(role) {
            Some(RegistryEntry::File(path)) => Ok(path),
            Some(RegistryEntry::Files(paths)) => Err(TedanaError::InvalidParameter(format!(
                "registry role '{}' lists {} files, not one",
                role,
                paths.len()
            ))),
            None => Err(TedanaError::KeyNotFound(role.to_string())),
        }
    }

    pub fn lookup_files(&self, role: &str) -> Result<&[PathBuf]> {
        match self.entries.get(role) {
            Some(RegistryEntry::Files(paths)) => Ok(paths),
            Some(RegistryEntry::File(path)) => Ok(std::slice::from_ref(path)),
            None => Err(TedanaError::KeyNotFound(role.to_string())),
        }
    }

    /// Absolute location of a single-file role
    pub fn resolve(&self, role: &str) -> Result<PathBuf> {
        Ok(self.base_dir().join(self.lookup(role)?))
    }

    pub fn record(&mut self, role: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries.insert(role.into(), RegistryEntry::File(path.into()));
    }

    pub fn record_files(&mut self, role: impl Into<String>, paths: Vec<PathBuf>) {
        self.entries.insert(role.into(), RegistryEntry::Files(paths));
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Role → path for single-file entries
    pub fn file_map(&self) -> BTreeMap<&str, &Path> {
        self.entries
            .iter()
            .filter_map(|(role, entry)| match entry {
                RegistryEntry::File(path) => Some((role.as_str(), path.as_path())),
                RegistryEntry::Files(_) => None,
            })
            .collect()
    }

    pub fn history(&self) -> &[LogEvent] {
        &self.history
    }

    /// Append a run event. Sequence numbers increase by one and timestamps
    /// never go backwards; earlier events are left untouched.
    pub fn append_log(&mut self, mut event: LogEvent) -> &LogEvent {
        if let Some(last) = self.history.last() {
            event.seq = last.seq + 1;
            if event.timestamp < last.timestamp {
                event.timestamp = last.timestamp;
            }
        } else {
            event.seq = 0;
        }
        self.history.push(event);
        &self.history[self.history.len() - 1]
    }

    /// Start a new history from an existing one.
    pub fn carry_history(&mut self, previous: &Registry) {
        self.history = previous.history.clone();
    }

    /// Absolute paths of single-file entries that do not exist
    pub fn missing_files(&self) -> Vec<PathBuf> {
        let base = self.base_dir();
        self.file_map()
            .values()
            .map(|p| base.join(p))
            .filter(|p| !p.exists())
            .collect()
    }

    pub fn verify(&self) -> Result<()> {
        let missing = self.missing_files();
        if missing.is_empty() {
            Ok(())
        } else {
            log::warn!(
                "Registry {} references {} missing files",
                self.path.display(),
                missing.len()
            );
            Err(TedanaError::MissingRegistryFiles {
                registry: self.path.clone(),
                missing,
            })
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn save(&self) -> Result<()> {
        std::fs::write(&self.path, self.to_json_bytes()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn counts() -> RunCounts {
        RunCounts {
            accepted: 3,
            rejected: 2,
            ignored: 0,
        }
    }

    #[test]
    fn test_lookup_and_record() {
        let mut registry = Registry::new("/tmp/out/desc-tedana_registry.json");
        registry.record(roles::METRICS_TSV, "desc-tedana_metrics.tsv");
        assert_eq!(
            registry.lookup(roles::METRICS_TSV).unwrap(),
            Path::new("desc-tedana_metrics.tsv")
        );
        assert_eq!(
            registry.resolve(roles::METRICS_TSV).unwrap(),
            PathBuf::from("/tmp/out/desc-tedana_metrics.tsv")
        );

        registry.record(roles::METRICS_TSV, "other.tsv");
        assert_eq!(registry.lookup(roles::METRICS_TSV).unwrap(), Path::new("other.tsv"));

        match registry.lookup("ICA mixing tsv") {
            Err(TedanaError::KeyNotFound(role)) => assert_eq!(role, "ICA mixing tsv"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_append_log_is_monotonic() {
        let mut registry = Registry::new("registry.json");
        let now = Utc::now();
        registry.append_log(LogEvent::new("tedana", "tedana_a.tsv", counts()).with_timestamp(now));
        let second = registry
            .append_log(
                LogEvent::new("ica_reclassify", "tedana_b.tsv", counts())
                    .with_timestamp(now - Duration::seconds(30)),
            )
            .clone();

        assert_eq!(second.seq, 1);
        assert_eq!(second.timestamp, now);
        assert_eq!(registry.history()[0].log_file, "tedana_a.tsv");
        assert_eq!(registry.history().len(), 2);
    }

    #[test]
    fn test_plain_registry_without_history_loads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("metrics.tsv"), "x").unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"ICA metrics tsv": "metrics.tsv", "input data": ["/data/echo-1.nii.gz", "/data/echo-2.nii.gz"]}"#,
        )
        .unwrap();

        let registry = Registry::load(&path).unwrap();
        assert!(registry.history().is_empty());
        assert_eq!(registry.lookup_files(roles::INPUT_DATA).unwrap().len(), 2);
        assert!(registry.lookup(roles::INPUT_DATA).is_err());
    }

    #[test]
    fn test_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tsv"), "a").unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();

        let path = dir.path().join("registry.json");
        let mut registry = Registry::new(&path);
        registry.record(roles::METRICS_TSV, "a.tsv");
        registry.record(roles::DECISION_TREE_JSON, "b.json");
        registry.append_log(LogEvent::new("tedana", "tedana_x.tsv", counts()));
        registry.save().unwrap();

        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded.file_map(), registry.file_map());
        assert_eq!(loaded.history(), registry.history());

        std::fs::remove_file(dir.path().join("b.json")).unwrap();
        let err = Registry::load(&path).unwrap_err();
        assert!(err.requires_reacquire());
        match err {
            TedanaError::MissingRegistryFiles { missing, .. } => {
                assert_eq!(missing, vec![dir.path().join("b.json")]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_registry_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no_such_registry.json");
        let err = Registry::load(&missing).unwrap_err();
        assert!(matches!(err, TedanaError::ReadFile { .. }));
        assert!(err.to_string().contains("no_such_registry.json"));

        let corrupt = dir.path().join("desc-tedana_registry.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        let err = Registry::load_unchecked(&corrupt).unwrap_err();
        assert!(matches!(err, TedanaError::JsonFile { .. }));
        assert!(err.to_string().contains(&corrupt.display().to_string()));
    }
}
