pub mod classify;
pub mod reclassify;
pub mod trees;
pub mod validate;

use crate::cli::ManualArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use std::collections::BTreeMap;
use tedana_rs::{Diagnosed, ManualInput, PersistedRun, Result};

pub(crate) fn manual_inputs(args: &ManualArgs) -> Result<(ManualInput, ManualInput)> {
    Ok((
        ManualInput::from_tokens(&args.manacc)?,
        ManualInput::from_tokens(&args.manrej)?,
    ))
}

#[derive(Serialize)]
struct RunSummary<'a> {
    registry: String,
    log_file: String,
    accepted: usize,
    rejected: usize,
    ignored: usize,
    files: BTreeMap<&'a str, String>,
    warnings: Vec<&'a str>,
}

/// Warnings go to stderr; the summary to stdout.
pub(crate) fn print_run_summary(result: &Diagnosed<PersistedRun>, json: bool) -> i32 {
    let run = &result.value;
    for warning in result.warnings() {
        eprintln!("Warning: {}", warning);
    }

    let summary = RunSummary {
        registry: run.registry_path.display().to_string(),
        log_file: run.log_file.display().to_string(),
        accepted: run.counts.accepted,
        rejected: run.counts.rejected,
        ignored: run.counts.ignored,
        files: run
            .registry
            .file_map()
            .into_iter()
            .map(|(role, path)| (role, path.display().to_string()))
            .collect(),
        warnings: result.warnings().collect(),
    };

    if json {
        return output::print_json(&summary);
    }

    println!(
        "{} accepted, {} rejected, {} ignored",
        summary.accepted, summary.rejected, summary.ignored
    );
    println!("Registry: {}", summary.registry);
    println!("Log: {}", summary.log_file);
    exit_codes::SUCCESS
}
