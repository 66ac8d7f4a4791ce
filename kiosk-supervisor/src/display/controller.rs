//! Mode decision and reconciliation (spec §4.4 a/b/d).

use crate::api::ApiOutcome;
use crate::config::Config;
use crate::health::HealthView;

use super::mode::Mode;
use super::process::{PlayerHandle, TerminationOutcome};

/// A child exited without being asked to (spec §4.4d "crash recovery").
#[derive(Debug, Clone)]
pub struct CrashEvent {
    pub mode: Mode,
    pub exit_status: Option<i32>,
}

/// What [`DisplayController::reconcile`] actually did this tick (spec §4.4b).
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The running child already matched the desired mode; nothing changed.
    NoAction,
    /// No child was running; one was spawned.
    Spawned(Mode),
    /// The running child did not match the desired mode; it was terminated
    /// and a new one was spawned.
    Respawned {
        from: Mode,
        to: Mode,
        termination: TerminationOutcome,
    },
    /// Spawning the desired mode failed. The controller has no running
    /// child; the next tick's reconciliation will retry (spec §4.4b
    /// "treating the absent child as a crash").
    SpawnFailed { mode: Mode, error: String },
}

/// Owns the single live [`PlayerHandle`], if any, and drives it to match
/// the mode computed each tick.
pub struct DisplayController {
    config: std::sync::Arc<Config>,
    handle: Option<PlayerHandle>,
}

impl DisplayController {
    pub fn new(config: std::sync::Arc<Config>) -> Self {
        Self {
            config,
            handle: None,
        }
    }

    /// The mode of the currently running child, if any.
    pub fn current_mode(&self) -> Option<&Mode> {
        self.handle.as_ref().map(PlayerHandle::mode)
    }

    pub fn current_pid(&self) -> Option<u32> {
        self.handle.as_ref().map(PlayerHandle::pid)
    }

    pub fn current_spawned_at(&self) -> Option<std::time::Instant> {
        self.handle.as_ref().map(PlayerHandle::spawned_at)
    }

    /// Compute the desired mode from health state and the latest API
    /// outcome (spec §4.4a). Pure; does not touch the running process.
    pub fn desired_mode(health: &HealthView, outcome: &ApiOutcome) -> Mode {
        if health.in_failure_mode {
            return Mode::Failure;
        }
        match outcome.playback_url() {
            Some(url) => Mode::Stream(url.to_string()),
            None => Mode::Holding,
        }
    }

    /// Non-blocking crash check, to be called once per tick before
    /// computing the desired mode (spec §4.4d, spec §5 task 1 "reap").
    pub fn reap(&mut self) -> Option<CrashEvent> {
        let exited = self.handle.as_mut()?.poll_exit()?;
        let handle = self.handle.take().expect("checked Some above");
        Some(CrashEvent {
            mode: handle.mode().clone(),
            exit_status: exited.code(),
        })
    }

    /// Drive the running process to match `desired` (spec §4.4b). Between
    /// "terminate old" and "spawn new" there is a brief window with no
    /// child; that window is the only one the spec permits.
    pub async fn reconcile(&mut self, desired: Mode) -> ReconcileOutcome {
        match &self.handle {
            None => self.spawn(desired).await,
            Some(handle) if handle.mode() == &desired => ReconcileOutcome::NoAction,
            Some(_) => {
                let old = self.handle.take().expect("checked Some above");
                let from = old.mode().clone();
                let termination = old.terminate().await;
                match self.spawn(desired).await {
                    ReconcileOutcome::Spawned(to) => ReconcileOutcome::Respawned {
                        from,
                        to,
                        termination,
                    },
                    other @ ReconcileOutcome::SpawnFailed { .. } => other,
                    ReconcileOutcome::NoAction | ReconcileOutcome::Respawned { .. } => {
                        unreachable!("spawn() only returns Spawned or SpawnFailed")
                    }
                }
            }
        }
    }

    async fn spawn(&mut self, mode: Mode) -> ReconcileOutcome {
        match PlayerHandle::spawn(mode.clone(), &self.config) {
            Ok(handle) => {
                self.handle = Some(handle);
                ReconcileOutcome::Spawned(mode)
            }
            Err(err) => ReconcileOutcome::SpawnFailed {
                mode,
                error: err.to_string(),
            },
        }
    }

    /// Terminate the running child unconditionally, used on shutdown (spec
    /// §5 "terminates any child process using the full termination
    /// sequence").
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.terminate().await;
        }
    }
}
