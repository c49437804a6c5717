use std::fmt::{self, Display, Write as _};
use std::io::Write as _;

use crate::VerbosityLevel;

/// Writes user-facing output to stdout, gated by the requested verbosity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    verbosity: VerbosityLevel,
}

impl Printer {
    pub const fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    pub const fn verbosity(self) -> VerbosityLevel {
        self.verbosity
    }

    /// Stream for progress lines and per-run chatter. Disabled by `-q`.
    pub fn stream_for_details(self) -> Stdout {
        Stdout::new(self.verbosity >= VerbosityLevel::Default)
    }

    /// Stream for the results table. Disabled by `-qq`.
    pub fn stream_for_failure_summary(self) -> Stdout {
        Stdout::new(self.verbosity >= VerbosityLevel::Quiet)
    }

    /// Stream for output the user explicitly asked for, e.g. `-v` file listings.
    pub fn stream_for_requested_summary(self) -> Stdout {
        Stdout::new(self.verbosity > VerbosityLevel::Silent)
    }

    /// Prints a section header: `===> title`.
    pub fn topic(self, title: impl Display) {
        let mut stdout = self.stream_for_details().lock();
        writeln!(stdout, "===> {title}").ok();
    }

    /// Prints an indented line under the current topic.
    pub fn message(self, message: impl Display) {
        let mut stdout = self.stream_for_details().lock();
        writeln!(stdout, "     {message}").ok();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Stdout {
    enabled: bool,
}

impl Stdout {
    const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn lock(self) -> StdoutLock<'static> {
        StdoutLock {
            lock: self.enabled.then(|| std::io::stdout().lock()),
        }
    }
}

/// A locked stdout that silently swallows writes when its stream is disabled.
pub struct StdoutLock<'a> {
    lock: Option<std::io::StdoutLock<'a>>,
}

impl StdoutLock<'_> {
    pub const fn is_enabled(&self) -> bool {
        self.lock.is_some()
    }
}

impl fmt::Write for StdoutLock<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match &mut self.lock {
            Some(lock) => lock.write_all(s.as_bytes()).map_err(|_| fmt::Error),
            None => Ok(()),
        }
    }
}

impl Drop for StdoutLock<'_> {
    fn drop(&mut self) {
        if let Some(lock) = &mut self.lock {
            lock.flush().ok();
        }
    }
}
