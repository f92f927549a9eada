use binmd::core::neighbor::ListingMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The binmd developers",
    version,
    about = "binmd - short-range particle dynamics on binned neighbor lists.",
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

    /// Set the number of threads for list construction and force evaluation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Integrate a Lennard-Jones FCC lattice with velocity Verlet.
    Run(RunArgs),
    /// Build a single neighbor list for the configured lattice and report statistics.
    Neighbors(SystemArgs),
}

/// Options shared by every command that sets up a lattice system.
#[derive(Args, Debug, Clone, Default)]
pub struct SystemArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the number of FCC unit cells along each axis.
    #[arg(long, value_name = "INT")]
    pub cells: Option<usize>,

    /// Override the neighbor skin distance.
    #[arg(long, value_name = "FLOAT")]
    pub skin: Option<f64>,

    /// Override the listing mode (half, half-newton-off, full).
    #[arg(long, value_name = "MODE")]
    pub listing: Option<ListingMode>,

    /// Override the Lennard-Jones parameter file.
    #[arg(long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S neighbor.skin=0.4
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub system: SystemArgs,

    /// Override the number of integration steps.
    #[arg(short = 'n', long, value_name = "INT")]
    pub steps: Option<usize>,

    /// Override the integration timestep.
    #[arg(long, value_name = "FLOAT")]
    pub timestep: Option<f64>,

    /// Override the thermodynamic output interval.
    #[arg(long, value_name = "INT")]
    pub thermo_every: Option<usize>,

    /// Print per-stage wall-clock timings after the run.
    #[arg(long)]
    pub timings: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_arguments_parse_with_global_flags() {
        let cli = Cli::try_parse_from([
            "binmd", "run", "-vv", "--cells", "4", "--listing", "full", "-n", "50", "-S",
            "run.timestep=0.001",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.system.cells, Some(4));
        assert_eq!(args.system.listing, Some(ListingMode::Full));
        assert_eq!(args.steps, Some(50));
        assert_eq!(args.system.set_values, vec!["run.timestep=0.001".to_string()]);
    }

    #[test]
    fn unknown_listing_mode_is_rejected() {
        assert!(Cli::try_parse_from(["binmd", "neighbors", "--listing", "quarter"]).is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["binmd", "-q", "-v", "neighbors"]).is_err());
    }
}
