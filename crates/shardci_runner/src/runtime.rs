//! The container engine seam.
//!
//! [`ContainerRuntime`] is what the lifecycle and coordinator talk to.
//! [`CliRuntime`] drives a docker-compatible command-line tool; tests substitute
//! an in-memory recorder.

use std::path::PathBuf;

use camino::Utf8Path;

use crate::command::{CommandError, CommandOutput, run_captured};

/// Operations the orchestration needs from a container engine.
///
/// Every call blocks until the underlying command exits.
pub trait ContainerRuntime: Send + Sync {
    fn build_image(&self, tag: &str, context: &Utf8Path) -> Result<CommandOutput, CommandError>;

    fn run(&self, spec: &ContainerSpec) -> Result<CommandOutput, CommandError>;

    fn exec(&self, container: &str, command: &[String]) -> Result<CommandOutput, CommandError>;

    /// Copies `source` out of `container` into the host directory `destination`.
    fn copy_from(
        &self,
        container: &str,
        source: &str,
        destination: &Utf8Path,
    ) -> Result<CommandOutput, CommandError>;

    /// Snapshots `container` as the image `image`.
    fn commit(&self, container: &str, image: &str) -> Result<CommandOutput, CommandError>;

    /// Force-removes containers and their volumes. Absent containers are not an
    /// error worth acting on, but engines usually report them with a failure status.
    fn remove(&self, containers: &[String]) -> Result<CommandOutput, CommandError>;
}

/// A `run` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: Option<String>,
    pub detach: bool,
    pub auto_remove: bool,
    pub env: Vec<String>,
    /// `(container, alias)` pairs.
    pub links: Vec<(String, String)>,
    pub command: Vec<String>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn detached(mut self) -> Self {
        self.detach = true;
        self
    }

    #[must_use]
    pub const fn auto_remove(mut self) -> Self {
        self.auto_remove = true;
        self
    }

    #[must_use]
    pub fn envs<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env.extend(env.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn link(mut self, container: impl Into<String>, alias: impl Into<String>) -> Self {
        self.links.push((container.into(), alias.into()));
        self
    }

    #[must_use]
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments for `<runtime> run ...`, starting with `run`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if self.detach {
            args.push("-d".to_string());
        }
        if self.auto_remove {
            args.push("--rm".to_string());
        }
        if let Some(name) = &self.name {
            args.extend(["--name".to_string(), name.clone()]);
        }
        for env in &self.env {
            args.extend(["-e".to_string(), env.clone()]);
        }
        for (container, alias) in &self.links {
            args.extend(["--link".to_string(), format!("{container}:{alias}")]);
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

pub(crate) fn build_args(tag: &str, context: &Utf8Path) -> Vec<String> {
    vec![
        "build".to_string(),
        "-t".to_string(),
        tag.to_string(),
        context.to_string(),
    ]
}

pub(crate) fn exec_args(container: &str, command: &[String]) -> Vec<String> {
    let mut args = vec!["exec".to_string(), container.to_string()];
    args.extend(command.iter().cloned());
    args
}

pub(crate) fn copy_args(container: &str, source: &str, destination: &Utf8Path) -> Vec<String> {
    vec![
        "cp".to_string(),
        format!("{container}:{source}"),
        destination.to_string(),
    ]
}

pub(crate) fn commit_args(container: &str, image: &str) -> Vec<String> {
    vec![
        "commit".to_string(),
        container.to_string(),
        image.to_string(),
    ]
}

pub(crate) fn remove_args(containers: &[String]) -> Vec<String> {
    let mut args = vec!["rm".to_string(), "-f".to_string(), "-v".to_string()];
    args.extend(containers.iter().cloned());
    args
}

/// Drives a docker-compatible CLI such as `docker` or `podman`.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    /// Name as configured, used in messages.
    name: String,
    /// Resolved executable.
    program: PathBuf,
    /// Forward command output to the terminal while capturing it.
    tee: bool,
}

impl CliRuntime {
    /// Resolves `name` on `PATH` (or as a path).
    pub fn resolve(name: &str, tee: bool) -> Result<Self, which::Error> {
        let program = which::which(name)?;
        tracing::debug!(runtime = name, program = %program.display(), "Resolved container runtime");
        Ok(Self {
            name: name.to_string(),
            program,
            tee,
        })
    }

    fn invoke(&self, args: &[String]) -> Result<CommandOutput, CommandError> {
        let label = match args.first() {
            Some(verb) => format!("{} {verb}", self.name),
            None => self.name.clone(),
        };
        run_captured(&self.program, &label, args, self.tee)
    }
}

impl ContainerRuntime for CliRuntime {
    fn build_image(&self, tag: &str, context: &Utf8Path) -> Result<CommandOutput, CommandError> {
        self.invoke(&build_args(tag, context))
    }

    fn run(&self, spec: &ContainerSpec) -> Result<CommandOutput, CommandError> {
        self.invoke(&spec.to_args())
    }

    fn exec(&self, container: &str, command: &[String]) -> Result<CommandOutput, CommandError> {
        self.invoke(&exec_args(container, command))
    }

    fn copy_from(
        &self,
        container: &str,
        source: &str,
        destination: &Utf8Path,
    ) -> Result<CommandOutput, CommandError> {
        self.invoke(&copy_args(container, source, destination))
    }

    fn commit(&self, container: &str, image: &str) -> Result<CommandOutput, CommandError> {
        self.invoke(&commit_args(container, image))
    }

    fn remove(&self, containers: &[String]) -> Result<CommandOutput, CommandError> {
        if containers.is_empty() {
            return Ok(CommandOutput::default());
        }
        self.invoke(&remove_args(containers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_service_args() {
        let spec = ContainerSpec::new("redis")
            .name("app-1a2b-3-redis")
            .detached();

        insta::assert_snapshot!(spec.to_args().join(" "), @"run -d --name app-1a2b-3-redis redis");
    }

    #[test]
    fn throwaway_migration_args() {
        let spec = ContainerSpec::new("app")
            .auto_remove()
            .envs(["RAILS_ENV=test", "DBNAME=app_1a2b_3_test"])
            .link("app-1a2b-db", "db")
            .link("app-1a2b-3-redis", "redis")
            .command(["sh", "-c", "bundle exec rake db:migrate"]);

        insta::assert_snapshot!(
            spec.to_args().join(" "),
            @"run --rm -e RAILS_ENV=test -e DBNAME=app_1a2b_3_test --link app-1a2b-db:db --link app-1a2b-3-redis:redis app sh -c bundle exec rake db:migrate"
        );
    }

    #[test]
    fn remove_is_forced_and_drops_volumes() {
        let args = remove_args(&["a".to_string(), "b".to_string()]);
        assert_eq!(args, ["rm", "-f", "-v", "a", "b"]);
    }

    #[test]
    fn copy_uses_container_prefix() {
        let args = copy_args("app-1a2b-3", "/app/features/reports", Utf8Path::new("out/3"));
        assert_eq!(args, ["cp", "app-1a2b-3:/app/features/reports", "out/3"]);
    }

    #[test]
    fn resolve_missing_runtime_fails() {
        assert!(CliRuntime::resolve("shardci-no-such-runtime", false).is_err());
    }
}
