//! Microphone-armed flag shared between whoever toggles listening (a UI, a
//! file watcher, or startup configuration) and the orchestration loop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::shutdown::ShutdownSignal;

#[derive(Debug, Clone, Default)]
pub struct ActivationFlag {
    armed: Arc<AtomicBool>,
}

impl ActivationFlag {
    pub fn new(armed: bool) -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(armed)),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn set(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationMode {
    /// Armed once at startup and never disarmed.
    Always,
    /// Mirrors a `True`/`False` file written by another process.
    File(PathBuf),
}

/// Reads an activation file. Missing or unreadable files count as disarmed.
pub fn read_activation_file(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|raw| raw.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Applies `mode` to `flag`. For [`ActivationMode::File`] a watcher task is
/// spawned and its handle returned; it exits when `shutdown` triggers.
pub fn start_activation_source(
    mode: &ActivationMode,
    flag: &ActivationFlag,
    poll_interval: Duration,
    mut shutdown: ShutdownSignal,
) -> Option<JoinHandle<()>> {
    match mode {
        ActivationMode::Always => {
            flag.arm();
            None
        }
        ActivationMode::File(path) => {
            let path = path.clone();
            let flag = flag.clone();
            flag.set(read_activation_file(&path));
            Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval(poll_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let armed = read_activation_file(&path);
                            if armed != flag.is_armed() {
                                tracing::debug!(
                                    reason_code = "activation_file_toggled",
                                    armed,
                                    path = %path.display(),
                                    "activation file changed"
                                );
                            }
                            flag.set(armed);
                        }
                        _ = shutdown.triggered() => break,
                    }
                }
            }))
        }
    }
}
