//! Network probe (spec §4.5 "Network & stream probes (optional)", §5 task 3).
//!
//! TCP-connect reachability/latency rather than raw ICMP — ICMP needs raw
//! sockets or root, which an unattended kiosk process should not require
//! (the same unprivileged-process reasoning the corpus favors for
//! network-level checks over ICMP).

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics::{names, Registry};

/// Bounded per-host timeout (spec §5 "Network probe ... bounded per-host
/// timeout"). Fixed, like the termination grace period — not one of the
/// spec's operator-tunable options.
const PER_HOST_TIMEOUT: Duration = Duration::from_secs(5);

async fn probe_host(registry: &Registry, host: &str) {
    let started = Instant::now();
    match tokio::time::timeout(PER_HOST_TIMEOUT, TcpStream::connect(host)).await {
        Ok(Ok(_stream)) => {
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            registry.update(names::NETWORK_REACHABLE, &[("host", host)], 1.0);
            registry.update(names::NETWORK_LATENCY_MS, &[("host", host)], latency_ms);
        }
        Ok(Err(err)) => {
            debug!(host, error = %err, "network probe connect failed");
            registry.update(names::NETWORK_REACHABLE, &[("host", host)], 0.0);
        }
        Err(_) => {
            debug!(host, "network probe timed out");
            registry.update(names::NETWORK_REACHABLE, &[("host", host)], 0.0);
        }
    }
    // network_latency_ms is left at its last value on failure (spec §7
    // "leave the corresponding gauge unchanged").
}

/// Run the periodic reachability loop until cancelled (spec §5 task 3).
pub async fn run(
    registry: std::sync::Arc<Registry>,
    hosts: Vec<String>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                for host in &hosts {
                    probe_host(&registry, host).await;
                }
            }
        }
    }
}
