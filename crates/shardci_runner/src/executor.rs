use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use shardci_logging::Printer;
use shardci_metadata::{BaselineSettings, FeatureSettings, Settings};

use crate::command::CommandOutput;
use crate::identity::{BuildIdentity, ShardId};
use crate::lifecycle::{ServiceLifecycle, ShardInfraError, Verdict};
use crate::partition::Shard;
use crate::runtime::ContainerRuntime;

/// What one shard runs and where its reports end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardJob {
    pub id: ShardId,

    /// Test command run inside the sandbox.
    pub command: Vec<String>,

    /// Report directory inside the sandbox, relative to the image workdir.
    pub report_source: String,

    /// Host directory the reports are copied into.
    pub report_destination: Utf8PathBuf,
}

impl ShardJob {
    /// The feature runner command for `shard`: the configured command, every tag
    /// selector passed through as `<tag flag> <token>`, then the shard's files.
    pub fn for_shard(
        shard: &Shard,
        features: &FeatureSettings,
        tag_args: &[String],
        root: &Utf8Path,
    ) -> Self {
        let mut command = features.command.clone();
        for tag in tag_args {
            command.extend([features.tag_flag.clone(), tag.clone()]);
        }
        command.extend(shard.files().iter().map(|file| file.path.to_string()));

        Self {
            id: shard.id().clone(),
            command,
            report_source: features.report_dir.clone(),
            report_destination: root.join(&features.report_dir).join(shard.id().as_str()),
        }
    }

    pub fn baseline(baseline: &BaselineSettings, root: &Utf8Path) -> Self {
        Self {
            id: ShardId::baseline(&baseline.name),
            command: baseline.command.clone(),
            report_source: baseline.report_dir.clone(),
            report_destination: root.join(&baseline.report_dest),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Passed,
    InfraFailure,
    TestFailure,
}

/// The terminal result of one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub shard: ShardId,
    pub kind: OutcomeKind,
    pub message: String,
    pub duration: Duration,
    pub output: CommandOutput,
}

impl RunOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self.kind, OutcomeKind::Passed)
    }
}

/// Runs shards end to end, each against its own backing services.
pub struct ShardExecutor<'a> {
    runtime: &'a dyn ContainerRuntime,
    settings: &'a Settings,
    identity: &'a BuildIdentity,
    commit_on_failure: bool,
    printer: Printer,
}

impl<'a> ShardExecutor<'a> {
    pub const fn new(
        runtime: &'a dyn ContainerRuntime,
        settings: &'a Settings,
        identity: &'a BuildIdentity,
        commit_on_failure: bool,
        printer: Printer,
    ) -> Self {
        Self {
            runtime,
            settings,
            identity,
            commit_on_failure,
            printer,
        }
    }

    /// Runs `job` and classifies how it ended.
    ///
    /// The shard's containers are removed before it starts and again on every
    /// exit path. Report extraction is best effort.
    pub fn execute(&self, job: &ShardJob) -> RunOutcome {
        let started = Instant::now();
        let _span = tracing::info_span!("shard", id = %job.id).entered();

        let mut lifecycle =
            ServiceLifecycle::new(self.runtime, self.settings, self.identity, job.id.clone());
        lifecycle.clear_stale();

        if let Err(error) = prepare(&mut lifecycle) {
            self.printer.message(format!("Run {} failed: {error}", job.id));
            let outcome = RunOutcome {
                shard: job.id.clone(),
                kind: OutcomeKind::InfraFailure,
                message: error.to_string(),
                duration: started.elapsed(),
                output: error.output().cloned().unwrap_or_default(),
            };
            lifecycle.teardown();
            return outcome;
        }

        lifecycle.begin_tests();
        let sandbox = lifecycle.resources().sandbox.clone();
        let result = self.runtime.run(&lifecycle.sandbox_spec(&job.command));

        self.extract_reports(&sandbox, job);

        let (kind, message, output) = match result {
            Ok(output) => {
                self.printer.message(format!("Run {} succeeded", job.id));
                lifecycle.complete(Verdict::Success);
                (OutcomeKind::Passed, String::new(), output)
            }
            Err(error) => {
                tracing::debug!(%error, "Test command failed");
                if self.commit_on_failure {
                    self.printer.message(format!(
                        "Run {} failed, committing as {sandbox}",
                        job.id
                    ));
                    if let Err(error) = self.runtime.commit(&sandbox, &sandbox) {
                        tracing::warn!(container = %sandbox, %error, "Committing failed sandbox failed");
                    }
                } else {
                    self.printer.message(format!("Run {} failed", job.id));
                }
                lifecycle.complete(Verdict::TestFailure);
                (
                    OutcomeKind::TestFailure,
                    "Run failed".to_string(),
                    error.output().cloned().unwrap_or_default(),
                )
            }
        };

        let duration = started.elapsed();
        lifecycle.teardown();

        RunOutcome {
            shard: job.id.clone(),
            kind,
            message,
            duration,
            output,
        }
    }

    fn extract_reports(&self, sandbox: &str, job: &ShardJob) {
        if let Err(error) = std::fs::create_dir_all(&job.report_destination) {
            tracing::debug!(destination = %job.report_destination, %error, "Creating report directory failed");
        }

        let workdir = self.settings.runtime().workdir.trim_end_matches('/');
        let source = format!("{workdir}/{}", job.report_source);
        if let Err(error) = self
            .runtime
            .copy_from(sandbox, &source, &job.report_destination)
        {
            tracing::debug!(container = sandbox, %error, "Copying reports failed");
        }
    }
}

fn prepare(lifecycle: &mut ServiceLifecycle<'_>) -> Result<(), ShardInfraError> {
    lifecycle.start_backing_services()?;
    lifecycle.run_migration()?;
    Ok(())
}
