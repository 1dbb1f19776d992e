//! All-or-nothing output writing shared by the workflows

use crate::config::OutputOptions;
use crate::decision::DecisionOutcome;
use crate::error::{Result, TedanaError};
use crate::mixing::MixingMatrix;
use crate::naming::{log_file_name, unique_log_name, OutputNames};
use crate::registry::{roles, LogEvent, Registry, RunCounts};
use crate::runlog::RunLog;
use crate::types::Classification;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

const MODULE: &str = "persist";

/// Output bytes held in memory until every file is ready.
#[derive(Debug)]
pub struct StagedOutputs {
    dir: PathBuf,
    files: Vec<(String, Vec<u8>)>,
}

impl StagedOutputs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    pub fn add(&mut self, file_name: impl Into<String>, contents: Vec<u8>) {
        self.files.push((file_name.into(), contents));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn targets(&self) -> Vec<PathBuf> {
        self.files.iter().map(|(name, _)| self.dir.join(name)).collect()
    }

    /// Targets that already exist on disk
    pub fn collisions(&self) -> Vec<PathBuf> {
        self.targets().into_iter().filter(|p| p.exists()).collect()
    }

    /// Write every staged file to a temporary file in the target directory,
    /// then rename them into place. Nothing is renamed unless every write
    /// succeeded. Replaced files are moved aside first and restored if any
    /// rename fails, so the directory ends up with either the full new set or
    /// the old contents.
    pub fn commit(self, overwrite: bool) -> Result<Vec<PathBuf>> {
        if !overwrite {
            let collisions = self.collisions();
            if !collisions.is_empty() {
                return Err(TedanaError::OutputExists(collisions));
            }
        }
        if let Some(path) = self.targets().into_iter().find(|p| p.is_dir()) {
            return Err(TedanaError::OutputNotAFile(path));
        }

        let created_dir = !self.dir.exists();
        if created_dir {
            std::fs::create_dir_all(&self.dir).map_err(TedanaError::write_file(&self.dir))?;
        }

        let written = match self
            .write_temporaries()
            .and_then(|staged| self.swap_in(staged))
        {
            Ok(written) => written,
            Err(e) => {
                if created_dir {
                    let _ = std::fs::remove_dir_all(&self.dir);
                }
                return Err(e);
            }
        };
        log::debug!("Committed {} files to {}", written.len(), self.dir.display());
        Ok(written)
    }

    fn swap_in(&self, staged: Vec<(PathBuf, NamedTempFile)>) -> Result<Vec<PathBuf>> {
        let mut backups: Vec<(PathBuf, TempPath)> = Vec::new();
        let mut written = Vec::with_capacity(staged.len());
        for (target, temp) in staged {
            if let Err(e) = self.place(&target, temp, &mut backups) {
                roll_back(&written, backups);
                return Err(e);
            }
            written.push(target);
        }
        // Dropping the backups deletes them.
        Ok(written)
    }

    fn place(
        &self,
        target: &Path,
        temp: NamedTempFile,
        backups: &mut Vec<(PathBuf, TempPath)>,
    ) -> Result<()> {
        if target.is_file() {
            let backup = tempfile::Builder::new()
                .prefix(".tedana-backup-")
                .tempfile_in(&self.dir)
                .map_err(TedanaError::write_file(target))?
                .into_temp_path();
            std::fs::rename(target, &backup).map_err(TedanaError::write_file(target))?;
            backups.push((target.to_path_buf(), backup));
        }
        temp.persist(target).map_err(|e| TedanaError::write_file(target)(e.error))?;
        Ok(())
    }

    fn write_temporaries(&self) -> Result<Vec<(PathBuf, NamedTempFile)>> {
        let mut staged = Vec::with_capacity(self.files.len());
        for (name, contents) in &self.files {
            let target = self.dir.join(name);
            let mut temp =
                NamedTempFile::new_in(&self.dir).map_err(TedanaError::write_file(&self.dir))?;
            temp.write_all(contents)
                .and_then(|_| temp.as_file().sync_all())
                .map_err(TedanaError::write_file(&target))?;
            staged.push((target, temp));
        }
        Ok(staged)
    }
}

/// Remove newly placed files, then move the replaced ones back.
fn roll_back(written: &[PathBuf], backups: Vec<(PathBuf, TempPath)>) {
    for path in written.iter().rev() {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Could not remove partial output {}: {}", path.display(), e);
        }
    }
    for (target, backup) in backups.into_iter().rev() {
        if let Err(e) = std::fs::rename(&backup, &target) {
            log::warn!("Could not restore {}: {}", target.display(), e);
        }
    }
    log::debug!("Rolled back {} outputs", written.len());
}

/// Everything a finished workflow run hands to `persist_run`
pub struct RunArtifacts<'a> {
    pub workflow: &'a str,
    pub outcome: &'a DecisionOutcome,
    pub mixing: &'a MixingMatrix,
    pub orth_mixing: Option<&'a MixingMatrix>,
    /// Registry or input file the run started from
    pub source: Option<&'a Path>,
    /// List entries copied verbatim into the new registry
    pub carried: Vec<(String, Vec<PathBuf>)>,
    pub run_log: RunLog,
}

/// Result of a committed run
#[derive(Debug, Clone)]
pub struct PersistedRun {
    pub registry_path: PathBuf,
    pub registry: Registry,
    pub log_file: PathBuf,
    pub written: Vec<PathBuf>,
    pub counts: RunCounts,
}

pub fn run_counts(outcome: &DecisionOutcome) -> RunCounts {
    RunCounts {
        accepted: outcome.table.count(Classification::Accepted),
        rejected: outcome.table.count(Classification::Rejected),
        ignored: outcome.table.count(Classification::Ignored),
    }
}

/// Stage the full output set, the run log and the registry, then commit.
pub fn persist_run(artifacts: RunArtifacts<'_>, options: &OutputOptions) -> Result<PersistedRun> {
    let RunArtifacts {
        workflow,
        outcome,
        mixing,
        orth_mixing,
        source,
        carried,
        mut run_log,
    } = artifacts;

    let names = OutputNames::new(&options.prefix, options.convention);
    let out_dir = options.out_dir.as_path();
    let registry_path = names.path_in(out_dir, roles::REGISTRY_JSON)?;

    let mut registry = Registry::new(&registry_path);
    if options.overwrite && registry_path.is_file() {
        let previous = Registry::load_unchecked(&registry_path)?;
        run_log.info(
            MODULE,
            format!(
                "Carrying {} history events from {}",
                previous.history().len(),
                registry_path.display()
            ),
        );
        registry.carry_history(&previous);
    }

    let mut staged = StagedOutputs::new(out_dir);
    let mut stage = |role: &str, bytes: Vec<u8>, registry: &mut Registry| -> Result<()> {
        let name = names.file_name(role)?;
        registry.record(role, name.as_str());
        staged.add(name, bytes);
        Ok(())
    };

    stage(roles::METRICS_TSV, outcome.table.to_tsv_bytes()?, &mut registry)?;
    stage(roles::MIXING_TSV, mixing.to_tsv_bytes()?, &mut registry)?;
    if let Some(orth) = orth_mixing {
        stage(roles::ORTH_MIXING_TSV, orth.to_tsv_bytes()?, &mut registry)?;
    }
    stage(roles::DECISION_TREE_JSON, outcome.decision_tree_json()?, &mut registry)?;
    stage(roles::STATUS_TABLE_TSV, outcome.status.to_tsv_bytes()?, &mut registry)?;
    stage(
        roles::CROSS_COMPONENT_JSON,
        outcome.cross_component_json()?,
        &mut registry,
    )?;

    for (role, paths) in carried {
        registry.record_files(role, paths);
    }

    let counts = run_counts(outcome);
    let log_name = if out_dir.is_dir() {
        unique_log_name(out_dir, run_log.started())?
    } else {
        log_file_name(run_log.started())
    };

    let mut event = LogEvent::new(workflow, log_name.as_str(), counts);
    if let Some(source) = source {
        event = event.with_source(source);
    }
    let seq = registry.append_log(event).seq;
    registry.record(roles::REGISTRY_JSON, names.file_name(roles::REGISTRY_JSON)?);

    run_log.info(
        MODULE,
        format!(
            "Writing {} outputs and registry event {} to {}",
            staged.len() + 2,
            seq,
            out_dir.display()
        ),
    );
    staged.add(log_name.as_str(), run_log.to_tsv_bytes()?);
    staged.add(names.file_name(roles::REGISTRY_JSON)?, registry.to_json_bytes()?);

    let written = staged.commit(options.overwrite)?;
    log::info!("{} wrote {} files to {}", workflow, written.len(), out_dir.display());

    Ok(PersistedRun {
        log_file: out_dir.join(&log_name),
        registry_path,
        registry,
        written,
        counts,
    })
}
