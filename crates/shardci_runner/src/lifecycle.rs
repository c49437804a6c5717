//! Per-shard backing services and their teardown.

use std::thread;
use std::time::{Duration, Instant};

use shardci_metadata::{Readiness, Settings};
use thiserror::Error;

use crate::command::{CommandError, CommandOutput};
use crate::identity::{BuildIdentity, ShardId, ShardResources};
use crate::runtime::{ContainerRuntime, ContainerSpec};

/// Interval between two readiness checks.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How a shard's test phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    InfraFailure,
    TestFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    ServicesStarting,
    ServicesReady,
    MigrationRunning,
    MigrationDone,
    TestRunning,
    Completed(Verdict),
    TornDown,
}

/// The shard's own infrastructure failed before its tests could run.
#[derive(Debug, Error)]
pub enum ShardInfraError {
    #[error("Starting {service} failed: {source}")]
    ServiceStart {
        service: String,
        #[source]
        source: CommandError,
    },

    #[error("{service} was not ready after {}s: {source}", .warmup.as_secs())]
    ServiceNotReady {
        service: String,
        warmup: Duration,
        #[source]
        source: CommandError,
    },

    #[error("Migrating database failed: {source}")]
    Migration {
        #[source]
        source: CommandError,
    },
}

impl ShardInfraError {
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            Self::ServiceStart { source, .. }
            | Self::ServiceNotReady { source, .. }
            | Self::Migration { source } => source.output(),
        }
    }
}

/// Owns the containers of one shard from creation to removal.
///
/// Dropping a lifecycle that was not torn down removes its containers.
pub struct ServiceLifecycle<'a> {
    runtime: &'a dyn ContainerRuntime,
    settings: &'a Settings,
    identity: &'a BuildIdentity,
    shard: ShardId,
    resources: ShardResources,
    state: LifecycleState,
}

impl<'a> ServiceLifecycle<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        settings: &'a Settings,
        identity: &'a BuildIdentity,
        shard: ShardId,
    ) -> Self {
        let resources = identity.resources(&shard, settings.services());
        Self {
            runtime,
            settings,
            identity,
            shard,
            resources,
            state: LifecycleState::Idle,
        }
    }

    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    pub const fn resources(&self) -> &ShardResources {
        &self.resources
    }

    /// Removes leftovers from an earlier run that reused this shard's names.
    ///
    /// Does not change the state; absent containers are expected.
    pub fn clear_stale(&self) {
        self.remove_all();
    }

    pub fn start_backing_services(&mut self) -> Result<(), ShardInfraError> {
        self.state = LifecycleState::ServicesStarting;

        let settings = self.settings;
        let containers = self.resources.services.clone();
        for (service, container) in settings.services().iter().zip(&containers) {
            tracing::debug!(shard = %self.shard, %container, "Starting service");

            let started = Instant::now();
            let spec = ContainerSpec::new(&service.image)
                .detached()
                .name(container)
                .envs(&service.env);

            if let Err(source) = self.runtime.run(&spec) {
                return Err(self.fail(ShardInfraError::ServiceStart {
                    service: service.name.clone(),
                    source,
                }));
            }

            if let Err(source) =
                await_readiness(self.runtime, container, &service.readiness, started)
            {
                return Err(self.fail(ShardInfraError::ServiceNotReady {
                    service: service.name.clone(),
                    warmup: service.readiness.warmup,
                    source,
                }));
            }
        }

        self.state = LifecycleState::ServicesReady;
        Ok(())
    }

    /// Prepares this shard's database with a throwaway container of the application image.
    pub fn run_migration(&mut self) -> Result<CommandOutput, ShardInfraError> {
        self.state = LifecycleState::MigrationRunning;

        let command = [
            "sh".to_string(),
            "-c".to_string(),
            self.settings.migration().command.clone(),
        ];
        let spec = self.linked_spec().auto_remove().command(command);

        match self.runtime.run(&spec) {
            Ok(output) => {
                self.state = LifecycleState::MigrationDone;
                Ok(output)
            }
            Err(source) => Err(self.fail(ShardInfraError::Migration { source })),
        }
    }

    /// The named sandbox container running `command` against this shard's services.
    pub fn sandbox_spec(&self, command: &[String]) -> ContainerSpec {
        self.linked_spec()
            .name(&self.resources.sandbox)
            .command(command.iter().cloned())
    }

    pub fn begin_tests(&mut self) {
        self.state = LifecycleState::TestRunning;
    }

    pub fn complete(&mut self, verdict: Verdict) {
        self.state = LifecycleState::Completed(verdict);
    }

    /// Force-removes every container this shard may have created.
    ///
    /// Safe to call any number of times and in any state.
    pub fn teardown(&mut self) {
        if self.state == LifecycleState::TornDown {
            return;
        }
        self.remove_all();
        self.state = LifecycleState::TornDown;
    }

    fn linked_spec(&self) -> ContainerSpec {
        let runtime = self.settings.runtime();
        let database = self.settings.database();

        let mut spec = ContainerSpec::new(self.identity.image())
            .envs(&runtime.env)
            .envs([format!("{}={}", database.name_env, self.resources.database)])
            .link(self.identity.shared_database(), &database.alias);

        let services = self.settings.services().iter().zip(&self.resources.services);
        for (service, container) in services {
            spec = spec.link(container, &service.alias);
        }
        spec
    }

    fn fail(&mut self, error: ShardInfraError) -> ShardInfraError {
        tracing::debug!(shard = %self.shard, %error, "Shard infrastructure failed");
        self.state = LifecycleState::Completed(Verdict::InfraFailure);
        error
    }

    fn remove_all(&self) {
        if let Err(error) = self.runtime.remove(&self.resources.containers()) {
            tracing::debug!(shard = %self.shard, %error, "Removing containers failed");
        }
    }
}

impl Drop for ServiceLifecycle<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Waits until `container`, started at `started`, can be used.
///
/// Without a ready command this sleeps out the rest of the warm-up. With one, the
/// command is polled until it succeeds; the last failure is returned once the
/// warm-up has elapsed.
pub(crate) fn await_readiness(
    runtime: &dyn ContainerRuntime,
    container: &str,
    readiness: &Readiness,
    started: Instant,
) -> Result<(), CommandError> {
    let deadline = started + readiness.warmup;

    let Some(ready_command) = &readiness.ready_command else {
        thread::sleep(deadline.saturating_duration_since(Instant::now()));
        return Ok(());
    };

    loop {
        match runtime.exec(container, ready_command) {
            Ok(_) => {
                tracing::debug!(container, elapsed = ?started.elapsed(), "Container ready");
                return Ok(());
            }
            Err(error) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(error);
                }
                thread::sleep(READY_POLL_INTERVAL.min(deadline - now));
            }
        }
    }
}
