use std::ffi::OsString;
use std::io;
use std::process::{ExitCode, Termination};
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use clap::Parser;
use colored::Colorize;
use shardci_cli::Args;
use shardci_logging::{Printer, set_colored_override, setup_tracing};
use shardci_metadata::ProjectMetadata;
use shardci_runner::{BuildIdentity, CliRuntime, CommandError, RunConfig, RunCoordinator, SetupError};

mod summary;

pub fn shardci_main(f: impl FnOnce(Vec<OsString>) -> Vec<OsString>) -> ExitStatus {
    run(f).unwrap_or_else(|error| {
        use std::io::Write;

        let mut stderr = std::io::stderr().lock();

        writeln!(stderr, "{}", "shardci failed".red().bold()).ok();
        for cause in error.chain() {
            if let Some(ioerr) = cause.downcast_ref::<io::Error>() {
                if ioerr.kind() == io::ErrorKind::BrokenPipe {
                    return ExitStatus::Success;
                }
            }

            writeln!(stderr, "  {} {cause}", "Cause:".bold()).ok();
        }

        let output = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<CommandError>())
            .and_then(CommandError::output)
            .filter(|output| !output.is_empty());
        if let Some(output) = output {
            writeln!(stderr, "{}", "Command output:".bold()).ok();
            write!(stderr, "{}{}", output.stdout, output.stderr).ok();
        }

        ExitStatus::Error
    })
}

fn run(f: impl FnOnce(Vec<OsString>) -> Vec<OsString>) -> anyhow::Result<ExitStatus> {
    let args = wild::args_os();

    let args = f(
        argfile::expand_args_from(args, argfile::parse_fromfile, argfile::PREFIX)
            .context("Failed to read CLI arguments from file")?,
    );

    let args = Args::parse_from(args);

    build(args)
}

pub(crate) fn build(args: Args) -> Result<ExitStatus> {
    let verbosity = args.verbosity.level();

    set_colored_override(args.color);

    let printer = Printer::new(verbosity);

    setup_tracing(verbosity);

    let Some(name) = non_empty(args.name.as_deref()) else {
        anyhow::bail!("Must specify a build name (`--name` or `JOB_NAME`)");
    };
    let id = non_empty(args.id.as_deref()).map_or_else(random_build_id, str::to_string);
    let identity = BuildIdentity::new(name, &id);

    let cwd = {
        let cwd = std::env::current_dir().context("Failed to get the current working directory")?;
        Utf8PathBuf::from_path_buf(cwd).map_err(|path| {
            anyhow::anyhow!(
                "The current working directory `{}` contains non-Unicode characters. shardci only supports Unicode paths.",
                path.display()
            )
        })?
    };
    let root = absolute(&args.path, &cwd);
    let config_file = args.config_file.as_ref().map(|path| absolute(path, &cwd));

    printer.topic(format!(
        "Starting build {} of {}",
        identity.id(),
        identity.name()
    ));

    printer.message(format!("Changing working directory to {root}"));
    std::env::set_current_dir(&root)
        .with_context(|| format!("Failed to change working directory to `{root}`"))?;
    tracing::debug!(root = %root, "Working directory");

    let metadata = if let Some(config_file) = config_file {
        ProjectMetadata::from_config_file(config_file)?
    } else {
        ProjectMetadata::discover(&root)?
    };

    let mut settings = metadata.to_settings()?;
    if let Some(strategy) = args.strategy {
        settings.set_strategy(strategy.into());
    }

    let program = &settings.runtime().program;
    let runtime = CliRuntime::resolve(program, verbosity.is_verbose()).map_err(|source| {
        SetupError::RuntimeNotFound {
            program: program.clone(),
            source,
        }
    })?;

    let config = RunConfig {
        identity,
        tag_args: args.tags.clone(),
        slow_tags: args.slow_tags.clone(),
        max_shards: args.max_runs(),
        commit_on_failure: args.commit,
        create_ctrlc_handler: true,
        seed: args.seed,
    };

    let summary =
        RunCoordinator::new(Arc::new(runtime), &settings, config, printer, root).run()?;

    summary::print_summary(printer, &summary)?;

    if summary.is_success() {
        Ok(ExitStatus::Success)
    } else {
        Ok(ExitStatus::Failure)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Eight lowercase hex digits.
fn random_build_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

/// Resolves `path` against `cwd` and drops `.` and `..` components.
fn absolute(path: &Utf8Path, cwd: &Utf8Path) -> Utf8PathBuf {
    let mut absolute = Utf8PathBuf::new();
    for component in cwd.join(path).components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                absolute.pop();
            }
            component => absolute.push(component),
        }
    }
    absolute
}

#[derive(Copy, Clone)]
pub enum ExitStatus {
    /// Every run passed.
    Success = 0,

    /// The build ran but at least one run failed.
    Failure = 1,

    /// The build could not be carried out.
    Error = 2,
}

impl Termination for ExitStatus {
    fn report(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}
