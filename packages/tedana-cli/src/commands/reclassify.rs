use crate::cli::ReclassifyArgs;
use crate::commands::{manual_inputs, print_run_summary};
use crate::exit_codes;
use tedana_rs::ica_reclassify;

pub fn execute(args: ReclassifyArgs) -> i32 {
    let (accept, reject) = match manual_inputs(&args.manual) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let options = args.output.options();
    log::info!(
        "Reclassifying {} into {}",
        args.registry.display(),
        options.out_dir.display()
    );

    match ica_reclassify(&args.registry, &accept, &reject, &options) {
        Ok(result) => print_run_summary(&result, args.output.json),
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::for_error(&e)
        }
    }
}
