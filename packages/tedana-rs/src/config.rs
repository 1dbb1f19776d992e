use crate::error::{Result, TedanaError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_N_ROBUST_RUNS: u32 = 30;
pub const DEFAULT_N_MAX_ITER: u32 = 500;
pub const DEFAULT_N_MAX_RESTART: u32 = 10;
pub const DEFAULT_SEED: u64 = 42;

/// ICA algorithm used by the decomposition collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcaMethod {
    #[default]
    Robustica,
    Fastica,
}

impl IcaMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "robustica" => Some(Self::Robustica),
            "fastica" => Some(Self::Fastica),
            _ => None,
        }
    }
}

/// Decomposition settings, fixed for the lifetime of a decomposer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompositionConfig {
    pub method: IcaMethod,
    pub n_robust_runs: u32,
    pub max_iter: u32,
    pub max_restart: u32,
    pub seed: u64,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            method: IcaMethod::default(),
            n_robust_runs: DEFAULT_N_ROBUST_RUNS,
            max_iter: DEFAULT_N_MAX_ITER,
            max_restart: DEFAULT_N_MAX_RESTART,
            seed: DEFAULT_SEED,
        }
    }
}

impl DecompositionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(TedanaError::InvalidParameter(
                "max_iter must be greater than 0".to_string(),
            ));
        }
        if self.method == IcaMethod::Robustica && self.n_robust_runs < 2 {
            return Err(TedanaError::InvalidParameter(format!(
                "robustica needs at least 2 runs, got {}",
                self.n_robust_runs
            )));
        }
        Ok(())
    }
}

/// Decision engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Emit a warning when no component ends up accepted.
    pub warn_on_no_accepted: bool,
    /// Fail when a component is left in a non-final classification.
    pub require_final_classification: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warn_on_no_accepted: true,
            require_final_classification: true,
        }
    }
}

/// Output file naming convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Convention {
    #[default]
    Bids,
    Orig,
}

impl Convention {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bids" => Some(Self::Bids),
            "orig" => Some(Self::Orig),
            _ => None,
        }
    }
}

/// Where and how a workflow writes its outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    pub out_dir: PathBuf,
    pub prefix: String,
    pub convention: Convention,
    pub overwrite: bool,
    /// Orthogonalize rejected mixing columns against the kept ones.
    pub tedort: bool,
}

impl OutputOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            prefix: String::new(),
            convention: Convention::default(),
            overwrite: false,
            tedort: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_convention(mut self, convention: Convention) -> Self {
        self.convention = convention;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_tedort(mut self, tedort: bool) -> Self {
        self.tedort = tedort;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decomposition_defaults() {
        let config = DecompositionConfig::default();
        assert_eq!(config.method, IcaMethod::Robustica);
        assert_eq!(config.n_robust_runs, 30);
        assert_eq!(config.max_iter, 500);
        assert_eq!(config.max_restart, 10);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_decomposition_validate_rejects_single_robust_run() {
        let config = DecompositionConfig {
            n_robust_runs: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let fastica = DecompositionConfig {
            method: IcaMethod::Fastica,
            n_robust_runs: 1,
            ..Default::default()
        };
        assert!(fastica.validate().is_ok());
    }

    #[test]
    fn test_convention_from_str() {
        assert_eq!(Convention::from_str("BIDS"), Some(Convention::Bids));
        assert_eq!(Convention::from_str("orig"), Some(Convention::Orig));
        assert_eq!(Convention::from_str("other"), None);
    }
}
