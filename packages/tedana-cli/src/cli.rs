use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tedana_rs::{Convention, OutputOptions};

#[derive(Parser)]
#[command(
    name = "tedana",
    version,
    about = "TE-dependent ICA component classification for multi-echo fMRI",
    long_about = "Classify ICA components with a decision tree, manually reclassify a finished run,\n\
                  and check the file registry that ties a run's outputs together."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manually accept or reject components of a finished run
    Reclassify(ReclassifyArgs),
    /// Classify components from a metrics table and mixing matrix
    Classify(ClassifyArgs),
    /// Check that every file a registry references exists
    Validate(ValidateArgs),
    /// List built-in decision trees
    Trees(TreesArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ConventionArg {
    Bids,
    Orig,
}

impl From<ConventionArg> for Convention {
    fn from(arg: ConventionArg) -> Self {
        match arg {
            ConventionArg::Bids => Convention::Bids,
            ConventionArg::Orig => Convention::Orig,
        }
    }
}

#[derive(Args)]
pub struct ManualArgs {
    /// Components to accept: integers, one comma/space separated string, or a file
    #[arg(long, num_args = 1..)]
    pub manacc: Vec<String>,

    /// Components to reject: integers, one comma/space separated string, or a file
    #[arg(long, num_args = 1..)]
    pub manrej: Vec<String>,
}

#[derive(Args)]
pub struct OutputArgs {
    /// Output directory
    #[arg(long, short = 'o', default_value = ".")]
    pub out_dir: PathBuf,

    /// Prefix for output file names
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// File naming convention
    #[arg(long, value_enum, default_value_t = ConventionArg::Bids)]
    pub convention: ConventionArg,

    /// Also write a mixing matrix with rejected components orthogonalized
    #[arg(long)]
    pub tedort: bool,

    /// Replace existing outputs
    #[arg(short = 'f', long)]
    pub overwrite: bool,

    /// Print a JSON summary
    #[arg(long)]
    pub json: bool,
}

impl OutputArgs {
    pub fn options(&self) -> OutputOptions {
        OutputOptions::new(&self.out_dir)
            .with_prefix(self.prefix.as_str())
            .with_convention(self.convention.into())
            .with_overwrite(self.overwrite)
            .with_tedort(self.tedort)
    }
}

#[derive(Args)]
pub struct ReclassifyArgs {
    /// Registry JSON of the run to reclassify
    pub registry: PathBuf,

    #[command(flatten)]
    pub manual: ManualArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct ClassifyArgs {
    /// Component metrics table (TSV)
    #[arg(long)]
    pub metrics: PathBuf,

    /// ICA mixing matrix (TSV)
    #[arg(long)]
    pub mixing: PathBuf,

    /// Built-in tree name or path to a decision tree JSON file
    #[arg(long, default_value = "minimal")]
    pub tree: String,

    /// Do not fail when components are left without a final classification
    #[arg(long)]
    pub allow_unresolved: bool,

    #[command(flatten)]
    pub manual: ManualArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Registry JSON file
    pub registry: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct TreesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
