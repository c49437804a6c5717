use std::sync::Mutex;
use std::time::Duration;

use camino::Utf8Path;
use crossbeam_channel::Receiver;
use shardci_metadata::{Options, Settings};

use crate::command::{CommandError, CommandOutput};
use crate::runtime::{
    ContainerRuntime, ContainerSpec, build_args, commit_args, copy_args, exec_args, remove_args,
};

/// Default settings without warm-up delays.
pub(crate) fn settings() -> Settings {
    Options::from_toml_str(
        r#"
[database]
warmup-secs = 0

[[services]]
name = "redis"
image = "redis"
warmup-secs = 0
"#,
    )
    .expect("valid toml")
    .to_settings()
    .expect("valid settings")
}

struct Failure {
    needle: String,
    /// `None` fails forever.
    remaining: Option<usize>,
}

/// Records every call as its rendered argument list.
///
/// A call fails when its arguments contain a configured needle.
#[derive(Default)]
pub(crate) struct RecordingRuntime {
    calls: Mutex<Vec<String>>,
    failures: Mutex<Vec<Failure>>,
    pause: Mutex<Option<(String, Receiver<()>)>>,
}

impl RecordingRuntime {
    pub(crate) fn failing_when(self, needle: &str) -> Self {
        self.push_failure(needle, None)
    }

    pub(crate) fn failing_times(self, needle: &str, times: usize) -> Self {
        self.push_failure(needle, Some(times))
    }

    fn push_failure(self, needle: &str, remaining: Option<usize>) -> Self {
        self.failures.lock().expect("lock").push(Failure {
            needle: needle.to_string(),
            remaining,
        });
        self
    }

    /// Holds the matching call until `resume` yields, or five seconds pass.
    pub(crate) fn pausing_at(self, needle: &str, resume: Receiver<()>) -> Self {
        *self.pause.lock().expect("lock") = Some((needle.to_string(), resume));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, args: &[String]) -> Result<CommandOutput, CommandError> {
        let call = args.join(" ");
        self.calls.lock().expect("lock").push(call.clone());

        let resume = self
            .pause
            .lock()
            .expect("lock")
            .as_ref()
            .filter(|(needle, _)| call.contains(needle))
            .map(|(_, resume)| resume.clone());
        if let Some(resume) = resume {
            resume.recv_timeout(Duration::from_secs(5)).ok();
        }

        let mut failures = self.failures.lock().expect("lock");
        let failure = failures.iter_mut().find(|failure| {
            call.contains(&failure.needle) && failure.remaining.is_none_or(|left| left > 0)
        });

        let Some(failure) = failure else {
            return Ok(CommandOutput {
                stdout: format!("{call}\n"),
                stderr: String::new(),
            });
        };

        if let Some(left) = &mut failure.remaining {
            *left -= 1;
        }

        Err(CommandError::Failed {
            command: format!("docker {}", args.first().map_or("", String::as_str)),
            status: "exit status: 1".to_string(),
            output: CommandOutput {
                stdout: format!("{call}\n"),
                stderr: "boom\n".to_string(),
            },
        })
    }
}

impl ContainerRuntime for RecordingRuntime {
    fn build_image(&self, tag: &str, context: &Utf8Path) -> Result<CommandOutput, CommandError> {
        self.record(&build_args(tag, context))
    }

    fn run(&self, spec: &ContainerSpec) -> Result<CommandOutput, CommandError> {
        self.record(&spec.to_args())
    }

    fn exec(&self, container: &str, command: &[String]) -> Result<CommandOutput, CommandError> {
        self.record(&exec_args(container, command))
    }

    fn copy_from(
        &self,
        container: &str,
        source: &str,
        destination: &Utf8Path,
    ) -> Result<CommandOutput, CommandError> {
        self.record(&copy_args(container, source, destination))
    }

    fn commit(&self, container: &str, image: &str) -> Result<CommandOutput, CommandError> {
        self.record(&commit_args(container, image))
    }

    fn remove(&self, containers: &[String]) -> Result<CommandOutput, CommandError> {
        self.record(&remove_args(containers))
    }
}
