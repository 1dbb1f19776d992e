use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let exit_code = match cli.command {
        cli::Command::Reclassify(args) => commands::reclassify::execute(args),
        cli::Command::Classify(args) => commands::classify::execute(args),
        cli::Command::Validate(args) => commands::validate::execute(args),
        cli::Command::Trees(args) => commands::trees::execute(args),
    };

    std::process::exit(exit_code);
}
