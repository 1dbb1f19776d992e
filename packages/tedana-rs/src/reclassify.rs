//! Manual reclassification of a finished run
//!
//! Each stage is its own type so a run cannot be persisted before it was
//! validated and reapplied:
//!
//! `LoadedRun::load` → `validate` → `reapply` → `persist`
//!
//! Nothing touches the output directory until `persist`, and `persist`
//! writes all outputs or none.

use crate::config::{EngineConfig, OutputOptions};
use crate::decision::{DecisionEngine, DecisionOutcome};
use crate::error::{Result, TedanaError};
use crate::manual::ManualInput;
use crate::metrics::{MetricsTable, TableSchema};
use crate::mixing::MixingMatrix;
use crate::overrides::ManualOverrides;
use crate::persist::{persist_run, PersistedRun, RunArtifacts};
use crate::registry::{roles, Registry, RegistryEntry};
use crate::runlog::RunLog;
use crate::trees::manual_only_tree;
use crate::types::Diagnosed;
use std::path::{Path, PathBuf};

pub const WORKFLOW: &str = "ica_reclassify";
const MODULE: &str = "reclassify";

/// A previous run read back through its registry
#[derive(Debug, Clone)]
pub struct LoadedRun {
    registry: Registry,
    table: MetricsTable,
    mixing: MixingMatrix,
    run_log: RunLog,
}

impl LoadedRun {
    /// Load the registry (every referenced file must exist), the classified
    /// component table and the mixing matrix.
    pub fn load<P: AsRef<Path>>(registry_path: P) -> Result<Self> {
        let registry_path = registry_path.as_ref();
        let mut run_log = RunLog::new();
        let registry = Registry::load(registry_path)?;

        let table = MetricsTable::read_tsv(registry.resolve(roles::METRICS_TSV)?, TableSchema::Classified)?;
        let mixing = MixingMatrix::read_tsv(registry.resolve(roles::MIXING_TSV)?)?;
        mixing.check_against(&table)?;

        run_log.info(
            MODULE,
            format!(
                "Loaded {} components and a {}×{} mixing matrix from {}",
                table.len(),
                mixing.n_timepoints(),
                mixing.n_components(),
                registry_path.display()
            ),
        );

        Ok(Self {
            registry,
            table,
            mixing,
            run_log,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn table(&self) -> &MetricsTable {
        &self.table
    }

    pub fn mixing(&self) -> &MixingMatrix {
        &self.mixing
    }

    /// Parse and check the manual decisions. At least one component must be
    /// named, the two lists must not overlap and every index must exist.
    pub fn validate(mut self, accept: &ManualInput, reject: &ManualInput) -> Result<ValidatedRun> {
        let overrides = ManualOverrides::from_inputs(accept, reject)?;
        if overrides.is_empty() {
            return Err(TedanaError::NoManualChanges);
        }
        overrides.check_against(&self.table)?;

        self.run_log.info(
            MODULE,
            format!(
                "Manually accepting {:?} and rejecting {:?}",
                overrides.accept(),
                overrides.reject()
            ),
        );
        Ok(ValidatedRun {
            loaded: self,
            overrides,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedRun {
    loaded: LoadedRun,
    overrides: ManualOverrides,
}

impl ValidatedRun {
    pub fn overrides(&self) -> &ManualOverrides {
        &self.overrides
    }

    /// Apply the overrides through the manual-only tree, optionally
    /// orthogonalizing the rejected mixing columns.
    pub fn reapply(self, tedort: bool) -> Result<Diagnosed<ReappliedRun>> {
        let ValidatedRun {
            mut loaded,
            overrides,
        } = self;

        let engine = DecisionEngine::new(manual_only_tree(), EngineConfig::default());
        let Diagnosed { value: outcome, diagnostics } = engine.run(&loaded.table, &overrides)?;
        loaded.run_log.extend_diagnostics("decision", &diagnostics);

        let orth_mixing = if tedort {
            loaded.run_log.info(MODULE, "Orthogonalizing rejected components");
            Some(loaded.mixing.orthogonalize(&outcome.table)?)
        } else {
            None
        };

        Ok(Diagnosed::with_diagnostics(
            ReappliedRun {
                loaded,
                outcome,
                orth_mixing,
            },
            diagnostics,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct ReappliedRun {
    loaded: LoadedRun,
    outcome: DecisionOutcome,
    orth_mixing: Option<MixingMatrix>,
}

impl ReappliedRun {
    pub fn outcome(&self) -> &DecisionOutcome {
        &self.outcome
    }

    pub fn orth_mixing(&self) -> Option<&MixingMatrix> {
        self.orth_mixing.as_ref()
    }

    /// List entries of the source registry, made absolute so they stay valid
    /// from the new output directory.
    fn carried_entries(&self) -> Vec<(String, Vec<PathBuf>)> {
        let base = self.loaded.registry.base_dir();
        self.loaded
            .registry
            .entries()
            .filter_map(|(role, entry)| match entry {
                RegistryEntry::Files(paths) => Some((
                    role.to_string(),
                    paths.iter().map(|p| base.join(p)).collect(),
                )),
                RegistryEntry::File(_) => None,
            })
            .collect()
    }

    pub fn persist(self, options: &OutputOptions) -> Result<PersistedRun> {
        let carried = self.carried_entries();
        let ReappliedRun {
            loaded,
            outcome,
            orth_mixing,
        } = self;
        persist_run(
            RunArtifacts {
                workflow: WORKFLOW,
                outcome: &outcome,
                mixing: &loaded.mixing,
                orth_mixing: orth_mixing.as_ref(),
                source: Some(loaded.registry.path()),
                carried,
                run_log: loaded.run_log,
            },
            options,
        )
    }
}

/// Load, validate, reapply and persist in one call.
///
/// Warnings raised while reapplying (for example when nothing is left
/// accepted) are returned alongside the persisted run.
pub fn ica_reclassify<P: AsRef<Path>>(
    registry_path: P,
    accept: &ManualInput,
    reject: &ManualInput,
    options: &OutputOptions,
) -> Result<Diagnosed<PersistedRun>> {
    let validated = LoadedRun::load(registry_path)?.validate(accept, reject)?;
    let Diagnosed { value, diagnostics } = validated.reapply(options.tedort)?;
    let persisted = value.persist(options)?;
    Ok(Diagnosed::with_diagnostics(persisted, diagnostics))
}
