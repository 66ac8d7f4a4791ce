//! The tagged outcome of a single provider poll (spec §3 "API outcome").

use std::time::Duration;

/// Playback information returned by the provider on a 2xx, well-formed
/// response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPayload {
    /// `Some(url)` iff the provider returned a non-empty playback URL.
    pub playback_url: Option<String>,
    /// The provider's own status string, if present, kept only for logs.
    pub raw_status: Option<String>,
}

/// The transport-level failure kinds distinguished by spec §4.2's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connection,
    Tls,
    Dns,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Tls => "tls",
            Self::Dns => "dns",
        }
    }
}

/// The classified result of one [`crate::api::ApiClient::fetch`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    Ok {
        payload: ApiPayload,
        latency: Duration,
    },
    Transport {
        kind: TransportErrorKind,
        latency: Duration,
    },
    Http {
        status: u16,
        latency: Duration,
    },
    Timeout {
        latency: Duration,
    },
    Malformed {
        latency: Duration,
    },
}

impl ApiOutcome {
    /// Whether this outcome counts as a success for the health tracker.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn latency(&self) -> Duration {
        match self {
            Self::Ok { latency, .. }
            | Self::Transport { latency, .. }
            | Self::Http { latency, .. }
            | Self::Timeout { latency }
            | Self::Malformed { latency } => *latency,
        }
    }

    /// A short label describing this outcome's error kind, for metrics
    /// labels and logs. `None` for `Ok`.
    pub fn error_label(&self) -> Option<&'static str> {
        match self {
            Self::Ok { .. } => None,
            Self::Transport { kind, .. } => Some(kind.as_str()),
            Self::Http { status, .. } => match status {
                401 | 403 => Some("auth"),
                429 => Some("rate_limited"),
                _ => Some("http"),
            },
            Self::Timeout { .. } => Some("timeout"),
            Self::Malformed { .. } => Some("malformed"),
        }
    }

    /// The playback URL from an `Ok` payload, if any.
    pub fn playback_url(&self) -> Option<&str> {
        match self {
            Self::Ok { payload, .. } => payload.playback_url.as_deref(),
            _ => None,
        }
    }
}
