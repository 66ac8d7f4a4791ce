//! kiosk-supervisor — autonomous video-kiosk supervisor.
//!
//! Polls a livestream provider on a fixed cadence and keeps exactly one
//! full-screen display process alive: a live HLS player, a holding still
//! image, or a failure still image. See `kiosk_supervisor::supervisor` for
//! the per-tick loop this binary drives.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kiosk_supervisor::clock::SystemClock;
use kiosk_supervisor::config::Config;
use kiosk_supervisor::metrics::{serve, AppState, Registry};
use kiosk_supervisor::probes::{network, stream, system};
use kiosk_supervisor::supervisor::Supervisor;
use kiosk_supervisor::Error;

/// Configuration validation failures exit with a category-specific code
/// (spec §6 "Exit codes": "distinct code ≠ 0 per failing category is
/// recommended"), rather than one generic non-zero code for every
/// `Error::Configuration`.
fn config_exit_code(message: &str) -> i32 {
    if message.contains("TOKEN") || message.contains("API_KEY") || message.contains("API_SECRET") {
        10 // credentials
    } else if message.contains("STREAM_ID") {
        11 // stream identity
    } else if message.contains("IMAGE") {
        12 // still-image paths
    } else if message.contains("RETRY") {
        13 // backoff bounds
    } else if message.contains("THRESHOLD") {
        14 // hysteresis thresholds
    } else if message.contains("INTERVAL") || message.contains("TIMEOUT") {
        15 // timing options
    } else if message.contains("bind") {
        16 // scrape bind address
    } else {
        2 // unclassified configuration error
    }
}

#[tokio::main]
async fn main() {
    let log_dir = std::env::var("KIOSK_LOG_FILE_PATH").unwrap_or_else(|_| "logs".to_string());
    let log_level = std::env::var("KIOSK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let _guard = match kiosk_supervisor::logging::init(std::path::Path::new(&log_dir), &log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            std::process::exit(1);
        }
    };

    info!("kiosk-supervisor v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(Error::Configuration(message)) => {
            error!(field = %message, "configuration invalid; refusing to start");
            std::process::exit(config_exit_code(&message));
        }
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(config).await {
        error!(error = %err, "supervisor exited with an error");
        std::process::exit(1);
    }

    info!("kiosk-supervisor shutdown complete");
}

async fn run(config: Arc<Config>) -> kiosk_supervisor::Result<()> {
    let registry = Arc::new(Registry::new());
    let shutdown = CancellationToken::new();

    let (supervisor, stream_url_rx) = Supervisor::new(config.clone(), SystemClock, registry.clone())?;

    let mut tasks = tokio::task::JoinSet::new();

    if config.system_probe.enabled {
        let registry = registry.clone();
        let interval = config.system_probe.interval;
        let token = shutdown.clone();
        tasks.spawn(async move { system::run(registry, interval, token).await });
    }

    if config.network_probe.enabled {
        let registry = registry.clone();
        let hosts = config.network_probe_hosts.clone();
        let interval = config.network_probe.interval;
        let token = shutdown.clone();
        tasks.spawn(async move { network::run(registry, hosts, interval, token).await });
    }

    if config.stream_probe.enabled {
        let registry = registry.clone();
        let binary = config.stream_probe_binary.clone();
        let args = config.stream_probe_args.clone();
        let timeout = config.stream_probe_timeout;
        let interval = config.stream_probe.interval;
        let token = shutdown.clone();
        tasks.spawn(async move {
            stream::run(registry, stream_url_rx, binary, args, timeout, interval, token).await
        });
    }

    let scrape_state = AppState {
        registry: registry.clone(),
        start_time: std::time::Instant::now(),
    };
    let scrape_host = config.scrape_bind_host.clone();
    let scrape_port = config.scrape_bind_port;
    let scrape_shutdown = shutdown.clone();
    tasks.spawn(async move {
        if let Err(err) = serve(&scrape_host, scrape_port, scrape_state, async move {
            scrape_shutdown.cancelled().await;
        })
        .await
        {
            error!(error = %err, "scrape endpoint exited with an error");
        }
    });

    let supervisor_shutdown = shutdown.clone();
    let supervisor_handle = tokio::spawn(async move {
        supervisor.run(supervisor_shutdown).await;
    });

    wait_for_shutdown_signal().await;
    info!("shutdown signal received; stopping supervisor loop and probes");
    shutdown.cancel();

    let _ = supervisor_handle.await;
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            warn!(error = %err, "background task ended with a join error");
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
