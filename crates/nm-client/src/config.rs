//! Client configuration

use std::time::Duration;

/// Environment variable holding protocol diagnostic tokens
pub const DEBUG_ENV: &str = "NMCLIENT_DEBUG";

/// Well-known bus name of the managed service
pub const DEFAULT_BUS_NAME: &str = "org.freedesktop.NetworkManager";

/// Root of the exported object tree
pub const DEFAULT_ROOT_PATH: &str = "/org/freedesktop";

/// Object path of the manager object
pub const MANAGER_PATH: &str = "/org/freedesktop/NetworkManager";

/// Verbosity of protocol-tolerance diagnostics
///
/// Levels are cumulative: `Trace` also emits everything `Debug` does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ProtocolLogLevel {
    Error,
    #[default]
    Warn,
    Debug,
    Trace,
}

impl ProtocolLogLevel {
    /// Parse a comma or space separated token list; the most verbose
    /// recognized token wins, unknown tokens are skipped
    pub fn parse(tokens: &str) -> Option<Self> {
        tokens
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter_map(|tok| match tok.trim().to_ascii_lowercase().as_str() {
                "error" => Some(ProtocolLogLevel::Error),
                "warn" | "warning" => Some(ProtocolLogLevel::Warn),
                "debug" => Some(ProtocolLogLevel::Debug),
                "trace" => Some(ProtocolLogLevel::Trace),
                _ => None,
            })
            .max()
    }

    pub fn enables(self, level: ProtocolLogLevel) -> bool {
        self >= level
    }
}

/// Configuration for [`NmClient`](crate::NmClient) and [`ObjectCache`](crate::ObjectCache)
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Bus name of the remote service
    pub bus_name: String,
    /// Object-manager root; signals outside it are ignored
    pub root_path: String,
    /// Timeout for remote calls
    pub call_timeout: Duration,
    pub log_level: ProtocolLogLevel,
    /// Repeated type mismatches on one property escalate to a warning after this many
    pub mismatch_warn_threshold: u32,
    /// Upper bound on settle rounds per processing cycle
    pub max_settle_rounds: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bus_name: DEFAULT_BUS_NAME.to_string(),
            root_path: DEFAULT_ROOT_PATH.to_string(),
            call_timeout: Duration::from_secs(25),
            log_level: ProtocolLogLevel::default(),
            mismatch_warn_threshold: 8,
            max_settle_rounds: 64,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `NMCLIENT_DEBUG`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(tokens) = std::env::var(DEBUG_ENV) {
            config.apply_debug_tokens(&tokens);
        }
        config
    }

    pub fn apply_debug_tokens(&mut self, tokens: &str) {
        if let Some(level) = ProtocolLogLevel::parse(tokens) {
            self.log_level = level;
        }
    }
}
