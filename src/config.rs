use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use chrono_tz::Tz;
use live_track::Backoff;
use realtime::{bad_request, not_found};
use tracing::{trace, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_WS_URL: &str = "ws://localhost:3000";

/// Live channel used by detail views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LiveTransport {
    /// Server-push event stream.
    PushStream,

    /// Bidirectional socket with a room join.
    #[default]
    Socket,
}

impl FromStr for LiveTransport {
    type Err = realtime::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sse" | "push" | "eventsource" => Ok(Self::PushStream),
            "socket" | "websocket" | "ws" => Ok(Self::Socket),
            _ => Err(bad_request!("unknown live transport: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub ws_url: String,
    pub transport: LiveTransport,

    /// Zone marker titles are rendered in.
    pub timezone: Tz,

    /// Age after which a cached history is refetched.
    pub history_stale_after: Duration,
    pub reconnect: Backoff,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| {
            lookup(key).filter(|value| !value.trim().is_empty()).unwrap_or_else(|| {
                trace!("{key} not set, using default: {default}");
                default.to_string()
            })
        };

        let api_url = string("API_URL", DEFAULT_API_URL).trim_end_matches('/').to_string();
        let ws_url = string("WS_URL", DEFAULT_WS_URL).trim_end_matches('/').to_string();
        let transport = lookup("LIVE_TRANSPORT")
            .and_then(|value| {
                value.parse().inspect_err(|e| warn!(error = %e, "ignoring LIVE_TRANSPORT")).ok()
            })
            .unwrap_or_default();
        let timezone = lookup("TIMEZONE")
            .and_then(|value| value.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::Europe::Istanbul);
        let history_stale_after =
            Duration::from_secs(parse_or(lookup("HISTORY_STALE_SECS"), 30));

        let defaults = Backoff::default();
        let reconnect = Backoff {
            base: Duration::from_millis(parse_or(lookup("RECONNECT_BASE_MS"), 500)),
            max: Duration::from_millis(parse_or(lookup("RECONNECT_MAX_MS"), 10_000)),
            max_attempts: parse_or(lookup("RECONNECT_MAX_ATTEMPTS"), defaults.max_attempts),
        };

        Self { api_url, ws_url, transport, timezone, history_stale_after, reconnect }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Serves `API_URL` and `WS_URL` to the request collaborators.
impl realtime::Config for Config {
    async fn get(&self, key: &str) -> Result<String> {
        match key {
            "API_URL" => Ok(self.api_url.clone()),
            "WS_URL" => Ok(self.ws_url.clone()),
            _ => Err(not_found!("config key {key} not set").into()),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|value| value.trim().parse::<T>().ok()).unwrap_or(default)
}
