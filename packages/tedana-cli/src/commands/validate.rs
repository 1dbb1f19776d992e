use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use tedana_rs::Registry;

#[derive(Serialize)]
struct ValidateOutput {
    registry: String,
    valid: bool,
    roles: Vec<String>,
    history_events: usize,
    missing: Vec<String>,
    error: Option<String>,
}

pub fn execute(args: ValidateArgs) -> i32 {
    let (result, code) = match Registry::load_unchecked(&args.registry) {
        Ok(registry) => {
            let missing: Vec<String> = registry
                .missing_files()
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            let code = if missing.is_empty() {
                exit_codes::SUCCESS
            } else {
                exit_codes::DATA_ERROR
            };
            (
                ValidateOutput {
                    registry: args.registry.display().to_string(),
                    valid: missing.is_empty(),
                    roles: registry.entries().map(|(role, _)| role.to_string()).collect(),
                    history_events: registry.history().len(),
                    missing,
                    error: None,
                },
                code,
            )
        }
        Err(e) => (
            ValidateOutput {
                registry: args.registry.display().to_string(),
                valid: false,
                roles: Vec::new(),
                history_events: 0,
                missing: Vec::new(),
                error: Some(e.to_string()),
            },
            exit_codes::INPUT_ERROR,
        ),
    };

    if args.json {
        let printed = output::print_json(&result);
        return if printed == exit_codes::SUCCESS { code } else { printed };
    }

    if let Some(ref err) = result.error {
        eprintln!("Error: {}", err);
    } else if result.valid {
        println!(
            "Registry '{}' is valid ({} roles, {} history events)",
            result.registry,
            result.roles.len(),
            result.history_events
        );
    } else {
        eprintln!("Error: registry '{}' references missing files:", result.registry);
        for path in &result.missing {
            eprintln!("  {}", path);
        }
    }
    code
}
