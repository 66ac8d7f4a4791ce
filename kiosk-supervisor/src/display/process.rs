//! The player process handle (spec §3 "Player process handle", §4.4c/d).
//!
//! [`PlayerHandle`] is the only place in the supervisor that owns a live
//! child process. It encapsulates spawn, non-blocking crash detection, and
//! the graceful-then-forceful termination sequence, and its `Drop`
//! implementation guarantees that no code path can drop the handle while
//! leaving the child alive — directly enforcing the exactly-one-child
//! invariant (spec §5, Design Note 9).

use std::ffi::OsString;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

use super::mode::Mode;

/// Fixed grace period allowed for a child to exit after each signal (spec
/// §4.4c: "a short grace period (fixed bound, e.g., 5 s)"). Not
/// configurable — the spec treats this as an implementation constant, not
/// an operator-tunable option.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Outcome of [`PlayerHandle::terminate`], surfaced to metrics (spec §7
/// "Termination timeout").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Exited after the graceful signal, within the first grace period.
    Graceful,
    /// Did not exit after the graceful signal; the forceful kill was sent
    /// and the child exited within the second grace period.
    ForcedKill,
    /// Still alive after both signals and both grace periods. The OS will
    /// reap it eventually; the controller moves on (spec §4.4c).
    StillAlive,
}

/// A single live child process showing one [`Mode`].
///
/// At most one instance of this type exists at a time, owned by the
/// [`super::DisplayController`] (spec §3 "Invariant: at most one live handle
/// exists process-wide").
pub struct PlayerHandle {
    child: tokio::process::Child,
    mode: Mode,
    command: Vec<OsString>,
    pid: u32,
    spawned_at: Instant,
    last_health_check: Instant,
}

impl PlayerHandle {
    /// Spawn the child process for `mode`, built from `config` (spec §4.4c).
    pub fn spawn(mode: Mode, config: &Config) -> Result<Self> {
        let command = mode.command(config);
        let mut cmd = process_utils::tokio_command_from_vec(&command)
            .ok_or_else(|| Error::SpawnFailed("empty command vector".to_string()))?;
        cmd.kill_on_drop(false); // PlayerHandle::drop owns the kill sequence, not tokio's default.

        let child = cmd
            .spawn()
            .map_err(|err| Error::SpawnFailed(format!("{mode:?}: {err}")))?;
        let pid = child
            .id()
            .ok_or_else(|| Error::SpawnFailed(format!("{mode:?}: child exited immediately")))?;

        debug!(?mode, pid, "spawned player process");
        let now = Instant::now();
        Ok(Self {
            child,
            mode,
            command,
            pid,
            spawned_at: now,
            last_health_check: now,
        })
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &[OsString] {
        &self.command
    }

    pub fn spawned_at(&self) -> Instant {
        self.spawned_at
    }

    /// Non-blocking poll of the child's exit status (spec §4.4d "crash
    /// recovery"). `Some` means the child has already exited.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        self.last_health_check = Instant::now();
        match self.child.try_wait() {
            Ok(status) => status,
            Err(err) => {
                warn!(pid = self.pid, error = %err, "failed to poll child status");
                None
            }
        }
    }

    /// Run the full graceful-then-forceful termination sequence (spec
    /// §4.4c): send the graceful signal, wait up to [`TERMINATION_GRACE`];
    /// if still alive, send the forceful kill and wait again; if still
    /// alive after that, log and return, leaving the OS to reap it.
    pub async fn terminate(mut self) -> TerminationOutcome {
        self.send_graceful();
        if self.wait_grace().await {
            debug!(pid = self.pid, ?self.mode, "child exited after graceful signal");
            return TerminationOutcome::Graceful;
        }

        warn!(pid = self.pid, ?self.mode, "child did not exit within grace period, forcing kill");
        let _ = self.child.start_kill();
        if self.wait_grace().await {
            return TerminationOutcome::ForcedKill;
        }

        warn!(pid = self.pid, ?self.mode, "child still alive after forceful kill; leaving for the OS to reap");
        TerminationOutcome::StillAlive
    }

    /// Send the graceful-termination signal without waiting for exit.
    #[cfg(unix)]
    fn send_graceful(&self) {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if let Err(err) = signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            warn!(pid = self.pid, error = %err, "failed to send SIGTERM to child");
        }
    }

    /// Windows has no SIGTERM equivalent reachable from stable `std`; fall
    /// straight through to the forceful path on the first attempt.
    #[cfg(not(unix))]
    fn send_graceful(&mut self) {
        let _ = self.child.start_kill();
    }

    async fn wait_grace(&mut self) -> bool {
        tokio::time::timeout(TERMINATION_GRACE, self.child.wait())
            .await
            .is_ok()
    }
}

impl Drop for PlayerHandle {
    /// Last-resort backstop: if the handle is dropped without going through
    /// [`Self::terminate`] (e.g. a panic unwinds past the controller), make
    /// a best-effort attempt to kill the child so it cannot outlive the
    /// handle silently (spec's Design Note 9). This is synchronous and
    /// cannot run the full graceful sequence.
    fn drop(&mut self) {
        if self.child.try_wait().ok().flatten().is_none() {
            let _ = self.child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_config() -> Config {
        Config {
            access_token: "t".into(),
            api_key: "k".into(),
            api_secret: "s".into(),
            stream_id: "id".into(),
            holding_image_path: "/dev/null".into(),
            failure_image_path: "/dev/null".into(),
            player_binary: "sleep".into(),
            player_args: vec![],
            viewer_binary: "sleep".into(),
            viewer_args: vec![],
            poll_interval: StdDuration::from_secs(30),
            request_timeout: StdDuration::from_secs(10),
            failure_threshold: 3,
            stability_threshold: 5,
            min_retry: StdDuration::from_secs(10),
            max_retry: StdDuration::from_secs(300),
            enable_backoff: true,
            scrape_bind_host: "127.0.0.1".into(),
            scrape_bind_port: 0,
            system_probe: crate::config::ProbeConfig {
                enabled: false,
                interval: StdDuration::from_secs(10),
            },
            network_probe: crate::config::ProbeConfig {
                enabled: false,
                interval: StdDuration::from_secs(30),
            },
            stream_probe: crate::config::ProbeConfig {
                enabled: false,
                interval: StdDuration::from_secs(60),
            },
            network_probe_hosts: vec![],
            stream_probe_timeout: StdDuration::from_secs(15),
            stream_probe_binary: "ffprobe".into(),
            stream_probe_args: vec![],
        }
    }

    #[tokio::test]
    async fn spawn_and_poll_exit_reports_running_then_exited() {
        let mut cfg = test_config();
        cfg.player_args = vec!["0.2".to_string()];
        let mut handle = PlayerHandle::spawn(Mode::Stream("u".into()), &cfg).expect("spawn");
        assert!(handle.poll_exit().is_none());

        tokio::time::sleep(StdDuration::from_millis(500)).await;
        assert!(handle.poll_exit().is_some());
    }

    #[tokio::test]
    async fn terminate_kills_long_running_child() {
        let mut cfg = test_config();
        cfg.player_args = vec!["30".to_string()];
        let handle = PlayerHandle::spawn(Mode::Holding, &cfg).expect("spawn");
        let pid = handle.pid();

        let outcome = handle.terminate().await;
        assert_ne!(outcome, TerminationOutcome::StillAlive);

        // The pid should no longer be a running process of ours; best we
        // can assert portably is that terminate() returned promptly.
        let _ = pid;
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let mut cfg = test_config();
        cfg.player_binary = "/no/such/binary-kiosk-test".into();
        let err = PlayerHandle::spawn(Mode::Stream("u".into()), &cfg).unwrap_err();
        assert!(matches!(err, Error::SpawnFailed(_)));
    }
}
