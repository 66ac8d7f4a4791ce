//! Ties the four core subsystems into the per-tick loop (spec §5 "Tasks",
//! task 1 "Supervisor tick").
//!
//! Mirrors the teacher's `ServiceContainer`: one struct owns every
//! subsystem handle and exposes a single `run` entry point driven by a
//! shared [`CancellationToken`], the same shutdown shape as
//! `ServiceContainer::shutdown` in `rust-srec/src/services`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::clock::Clock;
use crate::config::Config;
use crate::display::{DisplayController, Mode, ReconcileOutcome};
use crate::health::HealthTracker;
use crate::metrics::{names, Registry};
use crate::Result;

/// Owns the supervisor tick's state: the API client, health tracker, and
/// display controller. Exactly one tick is in flight at a time (spec §5
/// "Exactly one supervisor tick is in flight at a time").
pub struct Supervisor<C: Clock> {
    config: Arc<Config>,
    clock: C,
    api: ApiClient,
    health: HealthTracker,
    display: DisplayController,
    registry: Arc<Registry>,
    stream_url_tx: watch::Sender<Option<String>>,
    start_time: Instant,
}

impl<C: Clock> Supervisor<C> {
    /// Build a new supervisor and the watch receiver the stream probe task
    /// observes for the currently-known playback URL (spec §5 task 4
    /// "if a stream URL is currently known").
    pub fn new(
        config: Arc<Config>,
        clock: C,
        registry: Arc<Registry>,
    ) -> Result<(Self, watch::Receiver<Option<String>>)> {
        let api = ApiClient::new(&config)?;
        let health = HealthTracker::new(&config);
        let display = DisplayController::new(config.clone());
        let (stream_url_tx, stream_url_rx) = watch::channel(None);

        let supervisor = Self {
            config,
            clock,
            api,
            health,
            display,
            registry,
            stream_url_tx,
            start_time: Instant::now(),
        };
        Ok((supervisor, stream_url_rx))
    }

    /// Run one tick: reap → fetch → update health → reconcile → update
    /// metrics (spec §5 task 1's strict per-tick order). Returns the
    /// interval to wait before the next tick.
    pub async fn tick(&mut self) -> Duration {
        if let Some(crash) = self.display.reap() {
            warn!(mode = crash.mode.label(), exit_status = ?crash.exit_status, "player process crashed; will respawn");
            // The respawn this same tick's `reconcile()` performs (None →
            // X is `Spawned`) is what increments `process_restarts_total`;
            // counting it here too would double-count a single crash.
        }

        let outcome = self.api.fetch().await;
        self.registry.incr(names::API_REQUESTS_TOTAL, &[]);
        if let Some(label) = outcome.error_label() {
            self.registry.incr(names::API_ERRORS_TOTAL, &[("kind", label)]);
            debug!(kind = label, latency = ?outcome.latency(), "provider poll failed");
        }

        let _transition = self.health.on_outcome(&outcome);
        let interval = self.health.next_interval();
        let health_view = self.health.snapshot();

        let desired = DisplayController::desired_mode(&health_view, &outcome);
        self.publish_stream_url(&desired);

        let reconcile = self.display.reconcile(desired.clone()).await;
        self.record_reconcile(&reconcile);

        self.update_gauges(&health_view, &desired);
        interval
    }

    /// Run until `shutdown` is cancelled, sleeping between ticks for the
    /// interval the health tracker computed (spec §5 "sleep until `now +
    /// next_interval`"). On cancellation, terminates any running child
    /// with the full termination sequence before returning (spec §5
    /// "Cancellation and timeouts").
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("supervisor loop starting");
        loop {
            let interval = tokio::select! {
                _ = shutdown.cancelled() => break,
                interval = self.tick() => interval,
            };

            let deadline = self.clock.now() + interval;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.clock.sleep_until(deadline) => {}
            }
        }

        info!("supervisor loop shutting down");
        self.display.shutdown().await;
    }

    fn publish_stream_url(&self, desired: &Mode) {
        let url = match desired {
            Mode::Stream(url) => Some(url.clone()),
            Mode::Holding | Mode::Failure => None,
        };
        self.stream_url_tx.send_if_modified(|current| {
            if *current != url {
                *current = url.clone();
                true
            } else {
                false
            }
        });
    }

    fn record_reconcile(&self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::NoAction => {}
            ReconcileOutcome::Spawned(mode) => {
                self.registry
                    .incr(names::PROCESS_RESTARTS_TOTAL, &[("mode", mode.label())]);
            }
            ReconcileOutcome::Respawned { to, termination, .. } => {
                self.registry
                    .incr(names::PROCESS_RESTARTS_TOTAL, &[("mode", to.label())]);
                debug!(?termination, "terminated previous player before respawn");
            }
            ReconcileOutcome::SpawnFailed { mode, error } => {
                warn!(mode = mode.label(), %error, "failed to spawn player process");
                self.registry.incr(names::SPAWN_FAILURES_TOTAL, &[]);
            }
        }
    }

    fn update_gauges(&self, health: &crate::health::HealthView, mode: &Mode) {
        self.registry.update(names::UP, &[], 1.0);
        self.registry
            .update(names::UPTIME_SECONDS, &[], self.start_time.elapsed().as_secs_f64());
        self.registry.update(
            names::CONSECUTIVE_ERRORS,
            &[],
            health.consecutive_failures as f64,
        );
        self.registry.update(
            names::SECONDS_SINCE_LAST_SUCCESS,
            &[],
            health
                .last_success_at
                .map(|at| at.elapsed().as_secs_f64())
                .unwrap_or(-1.0),
        );
        self.registry.update(
            names::CURRENT_POLL_INTERVAL_SECONDS,
            &[],
            health.current_interval.as_secs_f64(),
        );
        self.registry
            .update(names::IN_FAILURE_MODE, &[], if health.in_failure_mode { 1.0 } else { 0.0 });

        self.registry.update(names::CURRENT_MODE, &[], mode.gauge_value());
        let stream_uptime = match (mode, self.display.current_spawned_at()) {
            (Mode::Stream(_), Some(spawned_at)) => spawned_at.elapsed().as_secs_f64(),
            _ => 0.0,
        };
        self.registry.update(names::STREAM_UPTIME_SECONDS, &[], stream_uptime);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::config::ProbeConfig;

    fn test_config(base_url: &str, player_binary: &str) -> Arc<Config> {
        unsafe {
            std::env::set_var("KIOSK_PROVIDER_BASE_URL", base_url);
        }
        Arc::new(Config {
            access_token: "tok".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            stream_id: "s1".into(),
            holding_image_path: "/dev/null".into(),
            failure_image_path: "/dev/null".into(),
            player_binary: player_binary.into(),
            player_args: vec!["30".to_string()],
            viewer_binary: player_binary.into(),
            viewer_args: vec!["30".to_string()],
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(2),
            failure_threshold: 3,
            stability_threshold: 5,
            min_retry: Duration::from_secs(10),
            max_retry: Duration::from_secs(300),
            enable_backoff: true,
            scrape_bind_host: "127.0.0.1".into(),
            scrape_bind_port: 0,
            system_probe: ProbeConfig { enabled: false, interval: Duration::from_secs(10) },
            network_probe: ProbeConfig { enabled: false, interval: Duration::from_secs(30) },
            stream_probe: ProbeConfig { enabled: false, interval: Duration::from_secs(60) },
            network_probe_hosts: vec![],
            stream_probe_timeout: Duration::from_secs(15),
            stream_probe_binary: "ffprobe".into(),
            stream_probe_args: vec![],
        })
    }

    #[tokio::test]
    async fn scenario_1_steady_live_stream() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams/s1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "playback_url": "https://live/1.m3u8",
            })))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), "sleep");
        let registry = Arc::new(Registry::new());
        let (mut supervisor, _rx) = Supervisor::new(config, FakeClock::new(), registry.clone()).unwrap();

        let mut last_pid = None;
        for _ in 0..10 {
            supervisor.tick().await;
            let pid = supervisor.display.current_pid();
            if let Some(prev) = last_pid {
                assert_eq!(pid, Some(prev), "should not respawn on identical outcomes");
            }
            last_pid = pid;
        }

        assert_eq!(registry.get(names::API_REQUESTS_TOTAL, &[]), Some(10.0));
        assert_eq!(registry.get(names::API_ERRORS_TOTAL, &[("kind", "http")]), None);
        assert_eq!(registry.get(names::IN_FAILURE_MODE, &[]), Some(0.0));
        assert_eq!(
            registry.get(names::CURRENT_POLL_INTERVAL_SECONDS, &[]),
            Some(30.0)
        );
        assert_eq!(
            registry.get(names::PROCESS_RESTARTS_TOTAL, &[("mode", "stream")]),
            Some(1.0)
        );

        supervisor.display.shutdown().await;
    }

    #[tokio::test]
    async fn scenario_3_and_4_failure_then_recovery() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams/s1/status"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(5)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/streams/s1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "playback_url": "https://live/1.m3u8",
            })))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), "sleep");
        let registry = Arc::new(Registry::new());
        let (mut supervisor, _rx) = Supervisor::new(config, FakeClock::new(), registry.clone()).unwrap();

        for i in 0..5 {
            supervisor.tick().await;
            if i >= 2 {
                assert_eq!(registry.get(names::IN_FAILURE_MODE, &[]), Some(1.0));
            } else {
                assert_eq!(registry.get(names::IN_FAILURE_MODE, &[]), Some(0.0));
            }
        }

        for i in 0..5 {
            supervisor.tick().await;
            if i < 4 {
                assert_eq!(registry.get(names::IN_FAILURE_MODE, &[]), Some(1.0));
            } else {
                assert_eq!(registry.get(names::IN_FAILURE_MODE, &[]), Some(0.0));
                assert_eq!(
                    registry.get(names::CURRENT_POLL_INTERVAL_SECONDS, &[]),
                    Some(10.0)
                );
            }
        }

        supervisor.display.shutdown().await;
    }
}
