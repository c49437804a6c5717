//! Interrupt handling.
//!
//! An interrupt does not stop in-flight commands. It removes every container
//! the run may have created, which makes blocked commands fail, and then leaves.

use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::runtime::ContainerRuntime;

/// Returns a receiver signalled on Ctrl+C.
///
/// The handler is installed on first use and shared by every caller. A second
/// interrupt that nobody has received exits the process.
pub fn shutdown_receiver() -> Receiver<()> {
    static RECEIVER: OnceLock<Receiver<()>> = OnceLock::new();

    RECEIVER
        .get_or_init(|| {
            let (tx, rx) = crossbeam_channel::bounded(1);
            if let Err(error) = ctrlc::set_handler(move || {
                // A full channel means nothing is watching: a repeated Ctrl+C leaves.
                if tx.try_send(()).is_err() {
                    std::process::exit(1);
                }
            }) {
                tracing::warn!(%error, "Failed to install the interrupt handler");
            }
            rx
        })
        .clone()
}

/// Force-removes `containers` in one call. Absent containers are fine.
pub fn emergency_teardown(runtime: &dyn ContainerRuntime, containers: &[String]) {
    tracing::debug!(count = containers.len(), "Removing every known container");
    if let Err(error) = runtime.remove(containers) {
        tracing::debug!(%error, "Emergency teardown reported a failure");
    }
}

/// Watches for an interrupt while the run is in progress.
///
/// Dropping the watcher stops watching.
pub struct InterruptWatcher {
    done: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl InterruptWatcher {
    /// On the first message from `interrupts`, removes `containers` and calls `on_interrupt`.
    pub fn install<F>(
        runtime: Arc<dyn ContainerRuntime>,
        containers: Vec<String>,
        interrupts: Receiver<()>,
        on_interrupt: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = thread::spawn(move || {
            crossbeam_channel::select! {
                recv(interrupts) -> signal => {
                    if signal.is_ok() {
                        tracing::warn!("Interrupted, removing containers");
                        emergency_teardown(runtime.as_ref(), &containers);
                        on_interrupt();
                    }
                }
                recv(done_rx) -> _ => {}
            }
        });

        Self {
            done: Some(done_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for InterruptWatcher {
    fn drop(&mut self) {
        // Disconnecting the sender wakes the watcher thread.
        drop(self.done.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
