use std::time::Duration;

use log::warn;

use crate::{
    error::ConfigError, hooks::HookTable, net::SERIALIZER_VSN, progress::ProgressConfig,
};

pub const DEFAULT_ENDPOINT: &str = "/live";
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub const CSRF_META: &str = "csrf-token";
pub const DEBUG_KEY: &str = "phx:live-socket:debug";
pub const LATENCY_KEY: &str = "phx:live-socket:latency-sim";

#[derive(Debug, Clone, PartialEq)]
pub struct SocketConfig {
    pub endpoint: String,
    pub csrf_token: String,
    pub heartbeat: Duration,
    pub hooks: HookTable,
    pub progress: ProgressConfig,
}

impl SocketConfig {
    /// `csrf_token` is the content of the page's `csrf-token` meta tag.
    pub fn new(csrf_token: Option<String>) -> Result<Self, ConfigError> {
        let csrf_token = csrf_token
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingCsrfToken)?;
        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            csrf_token,
            heartbeat: HEARTBEAT_INTERVAL,
            hooks: HookTable::default(),
            progress: ProgressConfig::default(),
        })
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        endpoint.trim_end_matches('/').clone_into(&mut self.endpoint);
        self
    }

    /// `protocol` and `host` as reported by `window.location`;
    /// `encode` escapes a query component.
    pub fn websocket_url(&self, protocol: &str, host: &str, encode: impl Fn(&str) -> String) -> String {
        let scheme = if protocol == "https:" { "wss" } else { "ws" };
        format!(
            "{scheme}://{host}{}/websocket?_csrf_token={}&vsn={SERIALIZER_VSN}",
            self.endpoint,
            encode(&self.csrf_token),
        )
    }
}

/// Developer toggles, kept for the browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugSettings {
    pub debug: bool,
    pub latency_ms: Option<u32>,
}

impl DebugSettings {
    pub fn from_storage(debug: Option<&str>, latency: Option<&str>) -> Self {
        let latency_ms = latency.and_then(|raw| match raw.parse() {
            Ok(ms) => Some(ms),
            Err(_) => {
                warn!("ignoring stored latency {raw:?}");
                None
            }
        });
        Self {
            debug: debug == Some("true"),
            latency_ms,
        }
    }

    pub const fn log_level(self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}
