use std::fmt::Write as _;
use std::io;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use crossbeam_channel::Receiver;
use shardci_catalog::{CatalogError, FeatureCatalog, GherkinParser, ScenarioFile, TagRuleSet};
use shardci_logging::Printer;
use shardci_metadata::{DatabaseSettings, PrepareSettings, Settings};
use thiserror::Error;

use crate::command::{CommandError, CommandOutput};
use crate::executor::{ShardExecutor, ShardJob};
use crate::identity::BuildIdentity;
use crate::lifecycle::await_readiness;
use crate::partition::partition_files;
use crate::results::{ResultAggregator, RunSummary};
use crate::runtime::{ContainerRuntime, ContainerSpec};
use crate::shutdown::{InterruptWatcher, shutdown_receiver};

/// Per-invocation choices, as opposed to project [`Settings`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub identity: BuildIdentity,

    /// Raw tag selectors, also passed through to the feature runner.
    pub tag_args: Vec<String>,
    pub slow_tags: Vec<String>,

    /// Upper bound on feature shards. The baseline run comes on top.
    pub max_shards: NonZeroUsize,

    /// Snapshot failed sandboxes as images.
    pub commit_on_failure: bool,

    /// Tear everything down and exit on Ctrl+C.
    pub create_ctrlc_handler: bool,

    /// Seeds the shuffle of the weighted partition.
    pub seed: Option<u64>,
}

/// A failure before any shard started. The run is aborted.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Container runtime `{program}` was not found")]
    RuntimeNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("Failed to clear `{path}`")]
    Prepare {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Building image `{image}` failed")]
    ImageBuild {
        image: String,
        #[source]
        source: CommandError,
    },

    #[error("Selecting features failed")]
    Catalog(#[from] CatalogError),

    #[error("Starting database `{container}` failed")]
    SharedService {
        container: String,
        #[source]
        source: CommandError,
    },

    #[error("Database `{container}` was not ready after {}s", .warmup.as_secs())]
    SharedServiceNotReady {
        container: String,
        warmup: Duration,
        #[source]
        source: CommandError,
    },
}

impl SetupError {
    /// Output of the external command behind this error, if any.
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            Self::ImageBuild { source, .. }
            | Self::SharedService { source, .. }
            | Self::SharedServiceNotReady { source, .. } => source.output(),
            Self::RuntimeNotFound { .. } | Self::Prepare { .. } | Self::Catalog(_) => None,
        }
    }
}

/// Renames config templates into place and clears stale report directories.
///
/// Missing templates are skipped and failed renames only warn. Failing to clear
/// an existing report directory is fatal.
pub fn prepare_workspace(root: &Utf8Path, prepare: &PrepareSettings) -> Result<(), SetupError> {
    for template in &prepare.templates {
        match std::fs::rename(root.join(&template.from), root.join(&template.to)) {
            Ok(()) => {
                tracing::debug!(from = %template.from, to = %template.to, "Renamed config template");
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(from = %template.from, "No config template");
            }
            Err(error) => {
                tracing::warn!(from = %template.from, %error, "Failed to rename config template");
            }
        }
    }

    for dir in &prepare.clean {
        let path = root.join(dir);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => tracing::debug!(%path, "Cleared report directory"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(SetupError::Prepare { path, source }),
        }
    }

    Ok(())
}

/// The relational store every shard links to. Removed on drop.
struct SharedDatabase<'a> {
    runtime: &'a dyn ContainerRuntime,
    container: String,
}

impl<'a> SharedDatabase<'a> {
    fn start(
        runtime: &'a dyn ContainerRuntime,
        settings: &DatabaseSettings,
        container: String,
    ) -> Result<Self, SetupError> {
        let database = Self { runtime, container };
        database.remove();

        let started = Instant::now();
        let spec = ContainerSpec::new(&settings.image)
            .detached()
            .name(&database.container)
            .envs(&settings.env);

        if let Err(source) = runtime.run(&spec) {
            return Err(SetupError::SharedService {
                container: database.container.clone(),
                source,
            });
        }

        await_readiness(runtime, &database.container, &settings.readiness, started).map_err(
            |source| SetupError::SharedServiceNotReady {
                container: database.container.clone(),
                warmup: settings.readiness.warmup,
                source,
            },
        )?;

        Ok(database)
    }

    fn remove(&self) {
        if let Err(error) = self.runtime.remove(std::slice::from_ref(&self.container)) {
            tracing::debug!(container = %self.container, %error, "Removing database failed");
        }
    }
}

impl Drop for SharedDatabase<'_> {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Drives a whole build: prepare, build the image, shard, run every shard, collect.
pub struct RunCoordinator<'a> {
    runtime: Arc<dyn ContainerRuntime>,
    settings: &'a Settings,
    config: RunConfig,
    printer: Printer,
    root: Utf8PathBuf,
    interrupts: Receiver<()>,
    on_interrupt: Arc<dyn Fn() + Send + Sync>,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        settings: &'a Settings,
        config: RunConfig,
        printer: Printer,
        root: impl Into<Utf8PathBuf>,
    ) -> Self {
        let interrupts = if config.create_ctrlc_handler {
            shutdown_receiver()
        } else {
            crossbeam_channel::never()
        };

        Self {
            runtime,
            settings,
            config,
            printer,
            root: root.into(),
            interrupts,
            on_interrupt: Arc::new(move || {
                printer.topic("Build interrupted, containers removed");
                std::process::exit(1);
            }),
        }
    }

    /// Replaces the Ctrl+C source and the exit that follows the teardown.
    #[cfg(test)]
    pub(crate) fn with_interrupts(
        mut self,
        interrupts: Receiver<()>,
        on_interrupt: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.interrupts = interrupts;
        self.on_interrupt = Arc::new(on_interrupt);
        self
    }

    /// Runs the build to completion.
    ///
    /// Shard failures end up in the summary; only setup failures are errors. The
    /// shared database is removed on every path once it was started.
    pub fn run(&self) -> Result<RunSummary, SetupError> {
        let runtime = self.runtime.as_ref();
        let identity = &self.config.identity;

        self.printer
            .topic("Preparing config files and cleaning old reports");
        prepare_workspace(&self.root, self.settings.prepare())?;

        self.printer.topic("Building base image");
        runtime
            .build_image(identity.image(), &self.root)
            .map_err(|source| SetupError::ImageBuild {
                image: identity.image().to_string(),
                source,
            })?;

        self.printer.topic("Selecting features");
        let files = self.select_features()?;
        self.print_feature_table(&files);

        let mut rng = self
            .config
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let shards = partition_files(
            files,
            self.config.max_shards,
            self.settings.features().strategy,
            &mut rng,
        );
        tracing::info!(shards = shards.len(), "Partitioned features");

        let baseline = self
            .settings
            .baseline()
            .map(|baseline| ShardJob::baseline(baseline, &self.root));
        let mut jobs: Vec<ShardJob> = baseline.iter().cloned().collect();
        jobs.extend(shards.iter().map(|shard| {
            ShardJob::for_shard(
                shard,
                self.settings.features(),
                &self.config.tag_args,
                &self.root,
            )
        }));

        // Must cover the database from its first start attempt.
        let watcher = self.watch_interrupts(&jobs);

        self.printer.topic("Starting database");
        let database = SharedDatabase::start(
            runtime,
            self.settings.database(),
            identity.shared_database(),
        )?;

        self.printer.topic(match &baseline {
            Some(baseline) => format!("Running build in {} runs + {} run", shards.len(), baseline.id),
            None => format!("Running build in {} runs", shards.len()),
        });

        let aggregator = ResultAggregator::new();
        let executor = ShardExecutor::new(
            runtime,
            self.settings,
            identity,
            self.config.commit_on_failure,
            self.printer,
        );

        thread::scope(|scope| {
            for job in &jobs {
                let executor = &executor;
                let aggregator = &aggregator;
                scope.spawn(move || aggregator.append(executor.execute(job)));
            }
        });

        let summary = aggregator.finalize();

        drop(database);
        drop(watcher);

        Ok(summary)
    }

    fn select_features(&self) -> Result<Vec<ScenarioFile>, CatalogError> {
        let features = self.settings.features();
        let rules = TagRuleSet::parse(&self.config.tag_args, &self.config.slow_tags);
        let catalog = FeatureCatalog::new(self.root.join(&features.root), &features.suffix);

        let mut files = catalog.select(&rules, &GherkinParser)?;

        // The runner sees paths relative to the image workdir.
        for file in &mut files {
            if let Ok(relative) = file.path.strip_prefix(&self.root) {
                file.path = relative.to_path_buf();
            }
        }

        tracing::info!(count = files.len(), "Selected features");
        Ok(files)
    }

    fn print_feature_table(&self, files: &[ScenarioFile]) {
        if !self.printer.verbosity().is_verbose() {
            return;
        }

        let width = files
            .iter()
            .map(|file| file.path.as_str().len())
            .max()
            .unwrap_or_default();

        let mut stdout = self.printer.stream_for_requested_summary().lock();
        for file in files {
            writeln!(stdout, "{:<width$}  {}", file.path.as_str(), file.weight).ok();
        }
    }

    /// Every container the run may create, whether or not it gets started.
    fn known_containers(&self, jobs: &[ShardJob]) -> Vec<String> {
        let identity = &self.config.identity;
        let mut containers = vec![identity.shared_database()];
        for job in jobs {
            containers.extend(
                identity
                    .resources(&job.id, self.settings.services())
                    .containers(),
            );
        }
        containers
    }

    fn watch_interrupts(&self, jobs: &[ShardJob]) -> InterruptWatcher {
        let on_interrupt = Arc::clone(&self.on_interrupt);
        InterruptWatcher::install(
            Arc::clone(&self.runtime),
            self.known_containers(jobs),
            self.interrupts.clone(),
            move || on_interrupt(),
        )
    }
}
