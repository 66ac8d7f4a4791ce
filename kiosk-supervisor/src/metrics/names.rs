//! The fixed metric name/help/kind table (spec §4.5's family tables). The
//! [`Registry`](super::Registry) pre-registers every one of these at
//! construction so `# HELP`/`# TYPE` lines are always present, even for a
//! series that has not been written yet.

/// The two metric kinds the exposition format distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// `(name, help text, kind)` for one metric family member.
pub type MetricDef = (&'static str, &'static str, MetricKind);

macro_rules! counter {
    ($name:expr, $help:expr) => {
        ($name, $help, MetricKind::Counter)
    };
}

macro_rules! gauge {
    ($name:expr, $help:expr) => {
        ($name, $help, MetricKind::Gauge)
    };
}

// Supervisor family (spec §4.5).
pub const UP: &str = "up";
pub const UPTIME_SECONDS: &str = "uptime_seconds";
pub const API_REQUESTS_TOTAL: &str = "api_requests_total";
pub const API_ERRORS_TOTAL: &str = "api_errors_total";
pub const CONSECUTIVE_ERRORS: &str = "consecutive_errors";
pub const SECONDS_SINCE_LAST_SUCCESS: &str = "seconds_since_last_success";
pub const CURRENT_POLL_INTERVAL_SECONDS: &str = "current_poll_interval_seconds";
pub const IN_FAILURE_MODE: &str = "in_failure_mode";

// Display family.
pub const CURRENT_MODE: &str = "current_mode";
pub const PROCESS_RESTARTS_TOTAL: &str = "process_restarts_total";
pub const SPAWN_FAILURES_TOTAL: &str = "spawn_failures_total";
pub const STREAM_UPTIME_SECONDS: &str = "stream_uptime_seconds";

// System probe family (optional).
pub const CPU_PERCENT: &str = "cpu_percent";
pub const MEMORY_PERCENT: &str = "memory_percent";
pub const DISK_PERCENT: &str = "disk_percent";
pub const TEMPERATURE_CELSIUS: &str = "temperature_celsius";
pub const LOAD_1: &str = "load_1";
pub const LOAD_5: &str = "load_5";
pub const LOAD_15: &str = "load_15";

// Network & stream probe family (optional).
pub const NETWORK_REACHABLE: &str = "network_reachable";
pub const NETWORK_LATENCY_MS: &str = "network_latency_ms";
pub const STREAM_BITRATE_KBPS: &str = "stream_bitrate_kbps";
pub const STREAM_WIDTH_PIXELS: &str = "stream_width_pixels";
pub const STREAM_HEIGHT_PIXELS: &str = "stream_height_pixels";
pub const STREAM_FRAMERATE_FPS: &str = "stream_framerate_fps";

/// Every metric this supervisor ever writes, with its help text and kind.
/// Order matches spec §4.5's table, family by family.
pub const ALL: &[MetricDef] = &[
    gauge!(UP, "1 if the supervisor process is running"),
    gauge!(UPTIME_SECONDS, "Seconds since the supervisor started"),
    counter!(API_REQUESTS_TOTAL, "Total provider polls issued"),
    counter!(API_ERRORS_TOTAL, "Total provider polls that did not classify as Ok, labeled by error kind"),
    gauge!(CONSECUTIVE_ERRORS, "Current consecutive-failure run length"),
    gauge!(SECONDS_SINCE_LAST_SUCCESS, "Seconds since the last Ok outcome, or -1 if never succeeded"),
    gauge!(CURRENT_POLL_INTERVAL_SECONDS, "Interval that will be waited before the next poll"),
    gauge!(IN_FAILURE_MODE, "1 if the health tracker is in failure mode, else 0"),
    gauge!(CURRENT_MODE, "Enum-encoded current display mode: 0=holding, 1=stream, 2=failure"),
    counter!(PROCESS_RESTARTS_TOTAL, "Total child process (re)spawns, labeled by mode"),
    counter!(SPAWN_FAILURES_TOTAL, "Total failed attempts to spawn a child process"),
    gauge!(STREAM_UPTIME_SECONDS, "Seconds the current Stream-mode child has been running, else 0"),
    gauge!(CPU_PERCENT, "System-wide CPU utilization percentage"),
    gauge!(MEMORY_PERCENT, "System-wide memory utilization percentage"),
    gauge!(DISK_PERCENT, "Disk utilization percentage, labeled by mountpoint"),
    gauge!(TEMPERATURE_CELSIUS, "Highest reported component temperature"),
    gauge!(LOAD_1, "1-minute load average"),
    gauge!(LOAD_5, "5-minute load average"),
    gauge!(LOAD_15, "15-minute load average"),
    gauge!(NETWORK_REACHABLE, "1 if the host is reachable, else 0, labeled by host"),
    gauge!(NETWORK_LATENCY_MS, "TCP-connect latency in milliseconds, labeled by host"),
    gauge!(STREAM_BITRATE_KBPS, "Last probed stream bitrate in kbps"),
    gauge!(STREAM_WIDTH_PIXELS, "Last probed stream width in pixels"),
    gauge!(STREAM_HEIGHT_PIXELS, "Last probed stream height in pixels"),
    gauge!(STREAM_FRAMERATE_FPS, "Last probed stream frame rate in fps"),
];
