use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The cellshake developers",
    version,
    about = "cellshake CLI - Metropolis Monte-Carlo shaking of periodic particle configurations with replicated cell locking.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for energy evaluation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run Monte-Carlo shake cycles on a system described by a TOML file.
    Shake(ShakeArgs),
    /// Validate a system file and print a summary of the system it describes.
    Check(CheckArgs),
}

/// Which shake workflow to run each cycle.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShakeModule {
    /// Translate individual atoms, one cell at a time.
    Atom,
    /// Translate and rotate whole molecules.
    Molecule,
}

/// Arguments for the `shake` subcommand.
#[derive(Args, Debug)]
pub struct ShakeArgs {
    /// Path to the system description in TOML format.
    #[arg(required = true, value_name = "PATH")]
    pub system: PathBuf,

    /// Write the final coordinates to this path in XYZ format.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Override the number of shake cycles.
    #[arg(short = 'n', long, value_name = "INT")]
    pub cycles: Option<usize>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the shake workflow.
    #[arg(short, long, value_enum)]
    pub module: Option<ShakeModule>,

    /// Set a specific configuration value, overriding the system file.
    /// Can be used multiple times. Example: -S monte-carlo.shakes-per-object=5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the system description in TOML format.
    #[arg(required = true, value_name = "PATH")]
    pub system: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn shake_arguments_are_parsed() {
        let cli = Cli::try_parse_from([
            "cellshake",
            "-vv",
            "shake",
            "system.toml",
            "--cycles",
            "4",
            "--module",
            "atom",
            "-S",
            "monte-carlo.seed=9",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Shake(args) = cli.command else {
            panic!("expected the shake subcommand");
        };
        assert_eq!(args.system, PathBuf::from("system.toml"));
        assert_eq!(args.cycles, Some(4));
        assert_eq!(args.module, Some(ShakeModule::Atom));
        assert_eq!(args.set_values, vec!["monte-carlo.seed=9".to_string()]);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["cellshake", "-q", "-v", "check", "s.toml"]).is_err());
    }
}
