use crate::error::{Result, TedanaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Ordered set of component indices
pub type ComponentSet = BTreeSet<usize>;

/// Component classification
///
/// `Accepted`, `Rejected` and `Ignored` are final. The remaining states only
/// exist while a decision tree is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Unclassified,
    #[serde(rename = "provisionalaccept")]
    ProvisionalAccept,
    #[serde(rename = "provisionalreject")]
    ProvisionalReject,
    Accepted,
    Rejected,
    Ignored,
}

impl Classification {
    pub const ALL: [Classification; 6] = [
        Classification::Unclassified,
        Classification::ProvisionalAccept,
        Classification::ProvisionalReject,
        Classification::Accepted,
        Classification::Rejected,
        Classification::Ignored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Unclassified => "unclassified",
            Classification::ProvisionalAccept => "provisionalaccept",
            Classification::ProvisionalReject => "provisionalreject",
            Classification::Accepted => "accepted",
            Classification::Rejected => "rejected",
            Classification::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| TedanaError::InvalidClassification(s.to_string()))
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Classification::Accepted | Classification::Rejected | Classification::Ignored
        )
    }

    /// Accepted and ignored components are both kept in the denoised data.
    pub fn is_kept(&self) -> bool {
        matches!(self, Classification::Accepted | Classification::Ignored)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract the component index from a label such as `ICA_07` or `7`.
pub fn component_index(label: &str) -> Option<usize> {
    let trimmed = label.trim();
    let digits = trimmed.rsplit('_').next().unwrap_or(trimmed);
    digits.parse::<usize>().ok()
}

/// Canonical label for a component index.
pub fn component_label(index: usize) -> String {
    format!("ICA_{:02}", index)
}

/// Severity of a non-fatal diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
        }
    }
}

/// A successful value together with the non-fatal diagnostics raised while
/// producing it.
#[derive(Debug, Clone)]
pub struct Diagnosed<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Diagnosed<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .map(|d| d.message.as_str())
    }

    pub fn has_warning(&self, needle: &str) -> bool {
        self.warnings().any(|w| w.contains(needle))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Diagnosed<U> {
        Diagnosed {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }
}
