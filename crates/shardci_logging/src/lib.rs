use shardci_static::EnvVars;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod printer;

pub use printer::{Printer, Stdout, StdoutLock};

/// How much output the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    /// `-qq`: nothing but the process exit status.
    Silent,

    /// `-q`: only the final summary.
    Quiet,

    /// Progress topics and the final summary.
    #[default]
    Default,

    /// `-v`: also tee external command output and list selected files.
    Verbose,

    /// `-vv`: debug logs.
    ExtraVerbose,

    /// `-vvv`: trace logs.
    Trace,
}

impl VerbosityLevel {
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::ExtraVerbose | Self::Trace)
    }

    const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Silent | Self::Quiet | Self::Default => LevelFilter::WARN,
            Self::Verbose => LevelFilter::INFO,
            Self::ExtraVerbose => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Control when colored output is used.
#[derive(Copy, Clone, Hash, Debug, PartialEq, Eq, PartialOrd, Ord, Default, clap::ValueEnum)]
pub enum TerminalColor {
    /// Display colors if the output goes to an interactive terminal.
    #[default]
    Auto,

    /// Always display colors.
    Always,

    /// Never display colors.
    Never,
}

pub fn set_colored_override(color: Option<TerminalColor>) {
    match color.unwrap_or_default() {
        TerminalColor::Auto => colored::control::unset_override(),
        TerminalColor::Always => colored::control::set_override(true),
        TerminalColor::Never => colored::control::set_override(false),
    }
}

/// Installs the global tracing subscriber.
///
/// Diagnostics always go to stderr so they never interleave with the summary
/// table on stdout. `SHARDCI_LOG` takes precedence over the verbosity flags.
/// Calling this more than once is a no-op.
pub fn setup_tracing(level: VerbosityLevel) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.level_filter().into())
        .with_env_var(EnvVars::SHARDCI_LOG)
        .from_env_lossy();

    let layer = tracing_tree::HierarchicalLayer::default()
        .with_indent_lines(true)
        .with_indent_amount(2)
        .with_bracketed_fields(true)
        .with_targets(level >= VerbosityLevel::ExtraVerbose)
        .with_writer(std::io::stderr);

    if tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}
