use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TedanaError {
    #[error("manual list expected a list of integers, but the input is {input}: {value} is not a non-negative integer")]
    NonIntegerComponent { value: String, input: String },

    #[error("manual list expected integers, a delimited string or an existing filename, but the input is {0}")]
    UnrecognizedManualInput(String),

    #[error("Invalid component token '{token}' in manual list {input:?}")]
    InvalidComponentToken { token: String, input: String },

    #[error("Cannot determine a components column in file {0}")]
    NoComponentsColumn(PathBuf),

    #[error("Must manually accept or reject at least one component")]
    NoManualChanges,

    #[error("The following components were both accepted and rejected: {0:?}")]
    ConflictingOverrides(Vec<usize>),

    #[error("Components {indices:?} are not present in the component table ({n_components} components)")]
    ComponentsOutOfRange {
        indices: Vec<usize>,
        n_components: usize,
    },

    #[error("Registry has no entry for role '{0}'")]
    KeyNotFound(String),

    #[error("Registry {registry} references missing files: {missing:?}")]
    MissingRegistryFiles {
        registry: PathBuf,
        missing: Vec<PathBuf>,
    },

    #[error("Table {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Failed to parse {path} at line {line}: {message}")]
    TableParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Component {0} appears more than once")]
    DuplicateComponent(usize),

    #[error("Mixing matrix and component table disagree: {0}")]
    ComponentMismatch(String),

    #[error("Unknown classification '{0}'")]
    InvalidClassification(String),

    #[error("Decision node {node} references unknown {kind} '{name}'")]
    UnknownMetric {
        node: usize,
        kind: &'static str,
        name: String,
    },

    #[error("Components {0:?} were left without a final classification")]
    UnresolvedComponents(Vec<usize>),

    #[error("Unknown decision tree '{0}'")]
    UnknownTree(String),

    #[error("Output files already exist (use overwrite to replace them): {0:?}")]
    OutputExists(Vec<PathBuf>),

    #[error("Output path {0} exists and is not a file")]
    OutputNotAFile(PathBuf),

    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    JsonFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed table {path}: {source}")]
    CsvFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse error category, used by callers to pick exit codes and recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DataIntegrity,
    Decomposition,
    Io,
}

impl TedanaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TedanaError::NonIntegerComponent { .. }
            | TedanaError::UnrecognizedManualInput(_)
            | TedanaError::InvalidComponentToken { .. }
            | TedanaError::NoComponentsColumn(_)
            | TedanaError::NoManualChanges
            | TedanaError::ConflictingOverrides(_)
            | TedanaError::ComponentsOutOfRange { .. }
            | TedanaError::InvalidClassification(_)
            | TedanaError::UnknownMetric { .. }
            | TedanaError::UnknownTree(_)
            | TedanaError::OutputExists(_)
            | TedanaError::OutputNotAFile(_)
            | TedanaError::InvalidParameter(_) => ErrorKind::Validation,
            TedanaError::KeyNotFound(_)
            | TedanaError::MissingRegistryFiles { .. }
            | TedanaError::MissingColumn { .. }
            | TedanaError::TableParse { .. }
            | TedanaError::DuplicateComponent(_)
            | TedanaError::ComponentMismatch(_)
            | TedanaError::UnresolvedComponents(_)
            | TedanaError::JsonFile { .. }
            | TedanaError::CsvFile { .. } => ErrorKind::DataIntegrity,
            TedanaError::Decomposition(_) => ErrorKind::Decomposition,
            TedanaError::ReadFile { .. }
            | TedanaError::WriteFile { .. }
            | TedanaError::Csv(_)
            | TedanaError::Json(_)
            | TedanaError::IoError(_) => ErrorKind::Io,
        }
    }

    /// True when the referenced dataset is incomplete and must be fetched again.
    pub fn requires_reacquire(&self) -> bool {
        matches!(self, TedanaError::MissingRegistryFiles { .. })
    }

    pub(crate) fn read_file(path: &Path) -> impl FnOnce(std::io::Error) -> TedanaError + '_ {
        move |source| TedanaError::ReadFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write_file(path: &Path) -> impl FnOnce(std::io::Error) -> TedanaError + '_ {
        move |source| TedanaError::WriteFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json_file(path: &Path) -> impl FnOnce(serde_json::Error) -> TedanaError + '_ {
        move |source| TedanaError::JsonFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv_file(path: &Path) -> impl FnOnce(csv::Error) -> TedanaError + '_ {
        move |source| TedanaError::CsvFile {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TedanaError>;
