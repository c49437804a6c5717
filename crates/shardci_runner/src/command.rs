use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;

/// Everything an external command wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed {
        command: String,
        status: String,
        output: CommandOutput,
    },
}

impl CommandError {
    /// Output captured before the command failed, if it ran at all.
    pub const fn output(&self) -> Option<&CommandOutput> {
        match self {
            Self::Spawn { .. } => None,
            Self::Failed { output, .. } => Some(output),
        }
    }
}

/// Runs `program` to completion, capturing stdout and stderr.
///
/// With `tee` set the streams are also forwarded line by line to this process's
/// own stdout and stderr while they are captured. `label` names the command in
/// errors, e.g. `docker run`.
pub(crate) fn run_captured(
    program: &Path,
    label: &str,
    args: &[String],
    tee: bool,
) -> Result<CommandOutput, CommandError> {
    tracing::debug!(command = label, ?args, "Running");

    let spawn_error = |source| CommandError::Spawn {
        command: label.to_string(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr) = std::thread::scope(|scope| {
        let stdout = scope.spawn(move || drain(stdout, tee.then(io::stdout)));
        let stderr = scope.spawn(move || drain(stderr, tee.then(io::stderr)));
        (
            stdout.join().unwrap_or_default(),
            stderr.join().unwrap_or_default(),
        )
    });

    let status = child.wait().map_err(spawn_error)?;
    let output = CommandOutput { stdout, stderr };

    if status.success() {
        Ok(output)
    } else {
        tracing::debug!(command = label, %status, "Command failed");
        Err(CommandError::Failed {
            command: label.to_string(),
            status: status.to_string(),
            output,
        })
    }
}

fn drain(pipe: Option<impl Read>, mut tee: Option<impl Write>) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };

    let mut reader = BufReader::new(pipe);
    let mut captured = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if let Some(tee) = &mut tee {
                    tee.write_all(&line).ok();
                }
                captured.extend_from_slice(&line);
            }
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}
