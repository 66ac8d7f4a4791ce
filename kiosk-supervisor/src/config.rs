//! Configuration loading and validation.
//!
//! Every option is read from an environment variable (optionally via a
//! `.env` file loaded with `dotenvy`), validated once at startup, and then
//! shared read-only for the lifetime of the process. There is no hot-reload.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Immutable, validated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Provider credentials / identity.
    pub access_token: String,
    pub api_key: String,
    pub api_secret: String,
    pub stream_id: String,

    // Still images.
    pub holding_image_path: PathBuf,
    pub failure_image_path: PathBuf,

    // Player / viewer binaries.
    pub player_binary: String,
    pub player_args: Vec<String>,
    pub viewer_binary: String,
    pub viewer_args: Vec<String>,

    // Polling / backoff.
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub failure_threshold: u32,
    pub stability_threshold: u32,
    pub min_retry: Duration,
    pub max_retry: Duration,
    pub enable_backoff: bool,

    // Scrape endpoint.
    pub scrape_bind_host: String,
    pub scrape_bind_port: u16,

    // Probes.
    pub system_probe: ProbeConfig,
    pub network_probe: ProbeConfig,
    pub stream_probe: ProbeConfig,
    pub network_probe_hosts: Vec<String>,
    pub stream_probe_timeout: Duration,
    pub stream_probe_binary: String,
    pub stream_probe_args: Vec<String>,
}

/// Cadence/enable toggle shared by the three optional probe families.
#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    pub enabled: bool,
    pub interval: Duration,
}

const fn default_failure_threshold() -> u32 {
    3
}
const fn default_stability_threshold() -> u32 {
    5
}

impl Config {
    /// Load configuration from the environment (after optionally loading a
    /// `.env` file), applying defaults for optional values, then validate.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cfg = Self {
            access_token: env_required("KIOSK_ACCESS_TOKEN")?,
            api_key: env_required("KIOSK_API_KEY")?,
            api_secret: env_required("KIOSK_API_SECRET")?,
            stream_id: env_required("KIOSK_STREAM_ID")?,

            holding_image_path: PathBuf::from(env_required("KIOSK_HOLDING_IMAGE")?),
            failure_image_path: PathBuf::from(env_required("KIOSK_FAILURE_IMAGE")?),

            player_binary: env_or("KIOSK_PLAYER_BINARY", "mpv"),
            player_args: env_list("KIOSK_PLAYER_ARGS", &["--fullscreen", "--loop-playlist=no"]),
            viewer_binary: env_or("KIOSK_VIEWER_BINARY", "mpv"),
            viewer_args: env_list("KIOSK_VIEWER_ARGS", &["--fullscreen", "--loop-playlist=inf"]),

            poll_interval: env_secs("KIOSK_POLL_INTERVAL", 30),
            request_timeout: env_secs("KIOSK_REQUEST_TIMEOUT", 10),
            failure_threshold: env_u32("KIOSK_FAILURE_THRESHOLD", default_failure_threshold()),
            stability_threshold: env_u32("KIOSK_STABILITY_THRESHOLD", default_stability_threshold()),
            min_retry: env_secs("KIOSK_MIN_RETRY", 10),
            max_retry: env_secs("KIOSK_MAX_RETRY", 300),
            enable_backoff: env_bool("KIOSK_ENABLE_BACKOFF", true),

            scrape_bind_host: env_or("KIOSK_SCRAPE_BIND_HOST", "0.0.0.0"),
            scrape_bind_port: env_u32("KIOSK_SCRAPE_BIND_PORT", 9090) as u16,

            system_probe: ProbeConfig {
                enabled: env_bool("KIOSK_SYSTEM_PROBE_ENABLED", true),
                interval: env_secs("KIOSK_SYSTEM_PROBE_INTERVAL", 10),
            },
            network_probe: ProbeConfig {
                enabled: env_bool("KIOSK_NETWORK_PROBE_ENABLED", true),
                interval: env_secs("KIOSK_NETWORK_PROBE_INTERVAL", 30),
            },
            stream_probe: ProbeConfig {
                enabled: env_bool("KIOSK_STREAM_PROBE_ENABLED", true),
                interval: env_secs("KIOSK_STREAM_PROBE_INTERVAL", 60),
            },
            network_probe_hosts: env_list("KIOSK_NETWORK_PROBE_HOSTS", &["1.1.1.1:443"]),
            stream_probe_timeout: env_secs("KIOSK_STREAM_PROBE_TIMEOUT", 15),
            stream_probe_binary: env_or("KIOSK_STREAM_PROBE_BINARY", "ffprobe"),
            stream_probe_args: env_list("KIOSK_STREAM_PROBE_ARGS", &["-print_format", "json", "-show_streams"]),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate required invariants, returning the first failing field.
    fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(Error::config("KIOSK_ACCESS_TOKEN must not be empty"));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::config("KIOSK_API_KEY must not be empty"));
        }
        if self.api_secret.trim().is_empty() {
            return Err(Error::config("KIOSK_API_SECRET must not be empty"));
        }
        if self.stream_id.trim().is_empty() {
            return Err(Error::config("KIOSK_STREAM_ID must not be empty"));
        }
        if !self.holding_image_path.is_file() {
            return Err(Error::config(format!(
                "KIOSK_HOLDING_IMAGE does not exist or is not readable: {}",
                self.holding_image_path.display()
            )));
        }
        if !self.failure_image_path.is_file() {
            return Err(Error::config(format!(
                "KIOSK_FAILURE_IMAGE does not exist or is not readable: {}",
                self.failure_image_path.display()
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::config("KIOSK_POLL_INTERVAL must be positive"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config("KIOSK_REQUEST_TIMEOUT must be positive"));
        }
        if self.failure_threshold == 0 {
            return Err(Error::config("KIOSK_FAILURE_THRESHOLD must be positive"));
        }
        if self.stability_threshold == 0 {
            return Err(Error::config("KIOSK_STABILITY_THRESHOLD must be positive"));
        }
        if self.min_retry.is_zero() {
            return Err(Error::config("KIOSK_MIN_RETRY must be positive"));
        }
        if self.min_retry > self.max_retry {
            return Err(Error::config("KIOSK_MIN_RETRY must be <= KIOSK_MAX_RETRY"));
        }
        Ok(())
    }
}

fn env_required(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::config(format!("{name} is required")))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_secs(name: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

fn env_list(name: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.split(',').map(|s| s.trim().to_string()).collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}
