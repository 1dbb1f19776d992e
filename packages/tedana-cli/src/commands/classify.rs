use crate::cli::ClassifyArgs;
use crate::commands::{manual_inputs, print_run_summary};
use crate::exit_codes;
use tedana_rs::classify::{self, ClassifyInputs};
use tedana_rs::trees::resolve_tree;
use tedana_rs::{EngineConfig, ManualOverrides, Result};

pub fn execute(args: ClassifyArgs) -> i32 {
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::for_error(&e)
        }
    }
}

fn run(args: &ClassifyArgs) -> Result<i32> {
    let (accept, reject) = manual_inputs(&args.manual)?;
    let overrides = ManualOverrides::from_inputs(&accept, &reject)?;
    let tree = resolve_tree(&args.tree)?;
    let inputs = ClassifyInputs::from_files(&args.metrics, &args.mixing)?;
    let config = EngineConfig {
        require_final_classification: !args.allow_unresolved,
        ..EngineConfig::default()
    };

    let result = classify::run(inputs, tree, &overrides, &config, &args.output.options())?;
    Ok(print_run_summary(&result, args.output.json))
}
