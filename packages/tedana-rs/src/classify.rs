//! Initial classification of a decomposition with a decision tree

use crate::config::{EngineConfig, OutputOptions};
use crate::decision::{DecisionEngine, DecisionTree};
use crate::decomposition::{run_decomposition, Decomposer};
use crate::error::Result;
use crate::metrics::{MetricsTable, TableSchema};
use crate::mixing::MixingMatrix;
use crate::overrides::ManualOverrides;
use crate::persist::{persist_run, PersistedRun, RunArtifacts};
use crate::registry::roles;
use crate::runlog::RunLog;
use crate::types::Diagnosed;
use nalgebra::DMatrix;
use std::path::{Path, PathBuf};

pub const WORKFLOW: &str = "tedana";
const MODULE: &str = "classify";

/// Component metrics and mixing matrix to classify
#[derive(Debug, Clone)]
pub struct ClassifyInputs {
    pub table: MetricsTable,
    pub mixing: MixingMatrix,
    /// Input files recorded in the registry as `input data`
    pub sources: Vec<PathBuf>,
}

impl ClassifyInputs {
    pub fn new(table: MetricsTable, mixing: MixingMatrix) -> Result<Self> {
        mixing.check_against(&table)?;
        Ok(Self {
            table,
            mixing,
            sources: Vec::new(),
        })
    }

    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(metrics: P, mixing: Q) -> Result<Self> {
        let table = MetricsTable::read_tsv(metrics.as_ref(), TableSchema::Raw)?;
        let mixing_matrix = MixingMatrix::read_tsv(mixing.as_ref())?;
        let mut inputs = Self::new(table, mixing_matrix)?;
        inputs.sources = vec![absolute(metrics.as_ref()), absolute(mixing.as_ref())];
        Ok(inputs)
    }

    /// Decompose `data` and pair the resulting mixing matrix with a metrics
    /// table computed for the same components.
    pub fn from_decomposition(
        table: MetricsTable,
        decomposer: &dyn Decomposer,
        data: &DMatrix<f64>,
        n_components: usize,
    ) -> Result<Self> {
        let (_, mixing) = run_decomposition(decomposer, data, n_components)?;
        Self::new(table, mixing)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Run `tree` over the inputs and persist the full output set.
pub fn run(
    inputs: ClassifyInputs,
    tree: DecisionTree,
    overrides: &ManualOverrides,
    config: &EngineConfig,
    options: &OutputOptions,
) -> Result<Diagnosed<PersistedRun>> {
    let mut run_log = RunLog::new();
    run_log.info(
        MODULE,
        format!(
            "Classifying {} components with tree '{}'",
            inputs.table.len(),
            tree.name
        ),
    );

    let engine = DecisionEngine::new(tree, config.clone());
    let Diagnosed { value: outcome, diagnostics } = engine.run(&inputs.table, overrides)?;
    run_log.extend_diagnostics("decision", &diagnostics);

    let orth_mixing = if options.tedort {
        run_log.info(MODULE, "Orthogonalizing rejected components");
        Some(inputs.mixing.orthogonalize(&outcome.table)?)
    } else {
        None
    };

    let carried = if inputs.sources.is_empty() {
        Vec::new()
    } else {
        vec![(roles::INPUT_DATA.to_string(), inputs.sources.clone())]
    };

    let persisted = persist_run(
        RunArtifacts {
            workflow: WORKFLOW,
            outcome: &outcome,
            mixing: &inputs.mixing,
            orth_mixing: orth_mixing.as_ref(),
            source: inputs.sources.first().map(PathBuf::as_path),
            carried,
            run_log,
        },
        options,
    )?;
    Ok(Diagnosed::with_diagnostics(persisted, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{names, Component};
    use crate::registry::Registry;
    use crate::trees::minimal_tree;
    use crate::types::{component_label, Classification};

    fn raw_table() -> MetricsTable {
        let rows = [
            [80.0, 10.0, 20.0, 500.0, 10.0, 0.6, 0.1, 5.0],
            [15.0, 60.0, 10.0, 50.0, 300.0, 0.1, 0.5, -2.0],
            [70.0, 12.0, 15.0, 400.0, 20.0, 0.5, 0.1, 4.0],
        ];
        let columns = [
            names::KAPPA,
            names::RHO,
            names::VARIANCE_EXPLAINED,
            names::COUNTSIG_FT2,
            names::COUNTSIG_FS0,
            names::DICE_FT2,
            names::DICE_FS0,
            names::SIGNAL_NOISE_T,
        ];
        let mut table = MetricsTable::new(columns.iter().map(|c| c.to_string()).collect());
        for (i, row) in rows.iter().enumerate() {
            let mut component = Component::new(i, component_label(i));
            for (name, value) in columns.iter().zip(row) {
                component = component.with_metric(name, *value);
            }
            table.insert(component).unwrap();
        }
        table
    }

    #[test]
    fn test_classify_writes_registry() {
        let dir = tempfile::tempdir().unwrap();
        let mixing = MixingMatrix::from_matrix(DMatrix::from_fn(8, 3, |t, j| (t * (j + 1)) as f64));
        let inputs = ClassifyInputs::new(raw_table(), mixing).unwrap();

        let persisted = run(
            inputs,
            minimal_tree(),
            &ManualOverrides::none(),
            &EngineConfig::default(),
            &OutputOptions::new(dir.path()).with_prefix("sub-01"),
        )
        .unwrap()
        .value;

        assert!(persisted
            .registry_path
            .ends_with("sub-01_desc-tedana_registry.json"));
        let registry = Registry::load(&persisted.registry_path).unwrap();
        assert_eq!(registry.history()[0].workflow, WORKFLOW);

        let table = MetricsTable::read_tsv(
            registry.resolve(roles::METRICS_TSV).unwrap(),
            TableSchema::Classified,
        )
        .unwrap();
        assert_eq!(table.get(1).unwrap().classification, Classification::Rejected);
        assert_eq!(table.get(0).unwrap().classification, Classification::Accepted);
        assert_eq!(persisted.counts.rejected, 1);
    }

    #[test]
    fn test_mismatched_inputs() {
        let mixing = MixingMatrix::from_matrix(DMatrix::zeros(8, 2));
        assert!(ClassifyInputs::new(raw_table(), mixing).is_err());
    }
}
