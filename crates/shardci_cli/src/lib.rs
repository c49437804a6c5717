use std::num::NonZeroUsize;

use camino::Utf8PathBuf;
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use shardci_logging::{TerminalColor, VerbosityLevel};
use shardci_metadata::PartitionStrategy;
use shardci_static::EnvVars;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(clap::Args, Debug, Clone, Default)]
#[command(about = None, long_about = None)]
pub struct Verbosity {
    #[arg(
        long,
        short = 'v',
        help = "Use verbose output (or `-vv` and `-vvv` for more verbose output)",
        action = clap::ArgAction::Count,
        global = true,
        overrides_with = "quiet",
    )]
    verbose: u8,

    #[arg(
        long,
        short,
        help = "Use quiet output (or `-qq` for silent output)",
        action = clap::ArgAction::Count,
        global = true,
        overrides_with = "verbose",
    )]
    quiet: u8,
}

impl Verbosity {
    /// Returns the verbosity level based on the number of `-v` and `-q` flags.
    pub const fn level(&self) -> VerbosityLevel {
        // `--quiet` and `--verbose` override each other, so only one of them is set.
        match self.quiet {
            0 => {}
            1 => return VerbosityLevel::Quiet,
            _ => return VerbosityLevel::Silent,
        }

        match self.verbose {
            0 => VerbosityLevel::Default,
            1 => VerbosityLevel::Verbose,
            2 => VerbosityLevel::ExtraVerbose,
            _ => VerbosityLevel::Trace,
        }
    }
}

/// How feature files are spread over runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Balance runs by scenario step weight.
    Weighted,

    /// Deal files out round-robin in discovery order.
    Positional,
}

impl From<Strategy> for PartitionStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Weighted => Self::Weighted,
            Strategy::Positional => Self::Positional,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    name = "shardci",
    about = "Runs a Cucumber suite in parallel shards, each against its own containers."
)]
#[command(version)]
#[command(styles = STYLES)]
pub struct Args {
    /// Directory to run the build in.
    #[arg(long, default_value = "./")]
    pub path: Utf8PathBuf,

    /// Name of this build. Also used as the image tag.
    #[arg(long, env = EnvVars::JOB_NAME)]
    pub name: Option<String>,

    /// Identifier of this build [default: 8 random hex digits]
    #[arg(long, env = EnvVars::BUILD_ID)]
    pub id: Option<String>,

    /// Cucumber tags to filter features on. Prefix with `~` to exclude a tag.
    #[arg(long = "tags", value_name = "TAG", env = EnvVars::CUCUMBER_TAGS, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Tags whose features count double when balancing runs.
    #[arg(long = "slow-tags", value_name = "TAG", env = EnvVars::CUCUMBER_SLOW_TAGS, value_delimiter = ',')]
    pub slow_tags: Vec<String>,

    /// Commit the container of a failed run as an image for inspection.
    #[arg(long)]
    pub commit: bool,

    /// Maximum number of concurrent feature runs [default: number of CPUs]
    #[arg(long, value_name = "N")]
    pub max_runs: Option<usize>,

    /// How to spread features over runs [default: from `shardci.toml`, else weighted]
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Seed for the weighted shuffle, to reproduce a partition.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Path to a `shardci.toml` to use instead of the one in the build directory.
    #[arg(long, env = EnvVars::SHARDCI_CONFIG_FILE)]
    pub config_file: Option<Utf8PathBuf>,

    /// Control when colored output is used.
    #[arg(long, value_name = "WHEN")]
    pub color: Option<TerminalColor>,

    #[clap(flatten)]
    pub verbosity: Verbosity,
}

impl Args {
    /// The requested run count, or the machine's parallelism when unset or zero.
    pub fn max_runs(&self) -> NonZeroUsize {
        self.max_runs
            .and_then(NonZeroUsize::new)
            .unwrap_or_else(shardci_static::max_parallelism)
    }
}
