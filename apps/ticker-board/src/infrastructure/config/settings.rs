//! Board Configuration Settings
//!
//! Configuration types for the ticker board, loaded from environment
//! variables. Every variable is optional; unset variables take the
//! defaults below, malformed or out-of-range values are rejected.

use std::time::Duration;

use crate::application::services::EngineSettings;
use crate::domain::search::{CaseFold, MatchMode, SearchSettings};

/// Where board updates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedKind {
    /// In-process random walk over a fixed symbol list.
    #[default]
    Simulated,
    /// Remote map-lane subscription over WebSocket.
    WebSocket,
}

impl FeedKind {
    /// Parse feed kind from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "simulated" | "sim" => Some(Self::Simulated),
            "websocket" | "ws" => Some(Self::WebSocket),
            _ => None,
        }
    }

    /// Get the feed kind name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::WebSocket => "websocket",
        }
    }
}

/// Render and highlight timing.
#[derive(Debug, Clone)]
pub struct BoardSettings {
    /// Render tick interval.
    pub render_interval: Duration,
    /// Highlight expiry duration.
    pub highlight_duration: Duration,
    /// Feed event channel capacity.
    pub event_capacity: usize,
    /// Search applied at startup.
    pub initial_search: String,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            render_interval: Duration::from_millis(16),
            highlight_duration: Duration::from_millis(2_000),
            event_capacity: 4_096,
            initial_search: String::new(),
        }
    }
}

/// Upstream feed selection and subscription address.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Feed implementation.
    pub kind: FeedKind,
    /// WebSocket URL of the data server.
    pub url: String,
    /// Node URI to link.
    pub node: String,
    /// Lane to link.
    pub lane: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            kind: FeedKind::default(),
            url: "ws://localhost:9001".to_string(),
            node: "/symbols".to_string(),
            lane: "stocks".to_string(),
        }
    }
}

/// WebSocket reconnection settings.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Initial reconnection delay.
    pub delay_initial: Duration,
    /// Maximum reconnection delay.
    pub delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_initial: Duration::from_millis(500),
            delay_max: Duration::from_secs(30),
            delay_multiplier: 2.0,
            max_attempts: 0, // Unlimited
        }
    }
}

/// Simulated feed settings.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Symbols to simulate.
    pub symbols: Vec<String>,
    /// Time between simulated updates.
    pub tick_interval: Duration,
    /// Probability per update that a row is removed and re-added later.
    pub churn: f64,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            symbols: ["AAPL", "MSFT", "GOOG", "AMZN", "DIS", "TSLA", "NVDA", "META"]
                .into_iter()
                .map(String::from)
                .collect(),
            tick_interval: Duration::from_millis(50),
            churn: 0.01,
            seed: None,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete board configuration.
#[derive(Debug, Clone, Default)]
pub struct BoardConfig {
    /// Render and highlight timing.
    pub board: BoardSettings,
    /// Search normalization.
    pub search: SearchSettings,
    /// Upstream feed.
    pub feed: FeedSettings,
    /// Reconnect policy for the WebSocket feed.
    pub reconnect: ReconnectSettings,
    /// Simulated feed.
    pub simulation: SimulationSettings,
    /// Server ports.
    pub server: ServerSettings,
}

impl BoardConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable or
    /// out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`BoardConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let board_defaults = BoardSettings::default();
        let board = BoardSettings {
            render_interval: env.duration_millis(
                "BOARD_RENDER_INTERVAL_MS",
                board_defaults.render_interval,
            )?,
            highlight_duration: env.duration_millis(
                "BOARD_HIGHLIGHT_DURATION_MS",
                board_defaults.highlight_duration,
            )?,
            event_capacity: env.positive("BOARD_EVENT_CAPACITY", board_defaults.event_capacity)?,
            initial_search: env.raw("BOARD_SEARCH").unwrap_or(board_defaults.initial_search),
        };

        let search_defaults = SearchSettings::default();
        let search = SearchSettings {
            max_len: env.positive("BOARD_SEARCH_MAX_LEN", search_defaults.max_len)?,
            case_fold: env.named(
                "BOARD_SEARCH_CASE",
                search_defaults.case_fold,
                CaseFold::from_str_case_insensitive,
            )?,
            mode: env.named(
                "BOARD_SEARCH_MODE",
                search_defaults.mode,
                MatchMode::from_str_case_insensitive,
            )?,
        };

        let feed_defaults = FeedSettings::default();
        let feed = FeedSettings {
            kind: env.named("BOARD_FEED", feed_defaults.kind, FeedKind::from_str_case_insensitive)?,
            url: env.string("BOARD_FEED_URL", feed_defaults.url)?,
            node: env.string("BOARD_FEED_NODE", feed_defaults.node)?,
            lane: env.string("BOARD_FEED_LANE", feed_defaults.lane)?,
        };

        let reconnect_defaults = ReconnectSettings::default();
        let reconnect = ReconnectSettings {
            delay_initial: env.duration_millis(
                "BOARD_RECONNECT_DELAY_INITIAL_MS",
                reconnect_defaults.delay_initial,
            )?,
            delay_max: env.duration_secs(
                "BOARD_RECONNECT_DELAY_MAX_SECS",
                reconnect_defaults.delay_max,
            )?,
            delay_multiplier: env.multiplier(
                "BOARD_RECONNECT_DELAY_MULTIPLIER",
                reconnect_defaults.delay_multiplier,
            )?,
            max_attempts: env.parse(
                "BOARD_MAX_RECONNECT_ATTEMPTS",
                reconnect_defaults.max_attempts,
            )?,
        };

        let sim_defaults = SimulationSettings::default();
        let simulation = SimulationSettings {
            symbols: env.list("BOARD_SIM_SYMBOLS", sim_defaults.symbols)?,
            tick_interval: env.duration_millis("BOARD_SIM_TICK_MS", sim_defaults.tick_interval)?,
            churn: env.probability("BOARD_SIM_CHURN", sim_defaults.churn)?,
            seed: env.optional("BOARD_SIM_SEED")?,
        };

        let server = ServerSettings {
            health_port: env.parse("BOARD_HEALTH_PORT", ServerSettings::default().health_port)?,
        };

        Ok(Self {
            board,
            search,
            feed,
            reconnect,
            simulation,
            server,
        })
    }

    /// Settings for the board engine.
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            render_interval: self.board.render_interval,
            highlight_duration: self.board.highlight_duration,
            event_capacity: self.board.event_capacity,
            search: self.search,
            node: self.feed.node.clone(),
            lane: self.feed.lane.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: &'static str,
    },
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: &'static str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string())
    }

    fn string(&self, key: &str, default: String) -> Result<String, ConfigError> {
        match self.raw(key) {
            None => Ok(default),
            Some(v) if v.is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
            Some(v) => Ok(v),
        }
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.optional(key)?.unwrap_or(default))
    }

    fn optional<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.raw(key)
            .map(|v| v.parse().map_err(|_| ConfigError::invalid(key, &v, "not a number")))
            .transpose()
    }

    fn positive(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        let value = self.parse(key, default)?;
        if value == 0 {
            return Err(ConfigError::invalid(key, "0", "must be greater than zero"));
        }
        Ok(value)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.duration(key, default, Duration::from_millis)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.duration(key, default, Duration::from_secs)
    }

    fn duration(
        &self,
        key: &str,
        default: Duration,
        unit: fn(u64) -> Duration,
    ) -> Result<Duration, ConfigError> {
        match self.optional::<u64>(key)? {
            None => Ok(default),
            Some(0) => Err(ConfigError::invalid(key, "0", "must be greater than zero")),
            Some(v) => Ok(unit(v)),
        }
    }

    fn multiplier(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        let value: f64 = self.parse(key, default)?;
        if !value.is_finite() || value < 1.0 {
            return Err(ConfigError::invalid(key, &value.to_string(), "must be at least 1.0"));
        }
        Ok(value)
    }

    fn probability(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        let value: f64 = self.parse(key, default)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::invalid(
                key,
                &value.to_string(),
                "must be between 0.0 and 1.0",
            ));
        }
        Ok(value)
    }

    fn named<T: Copy>(
        &self,
        key: &str,
        default: T,
        parse: fn(&str) -> Option<T>,
    ) -> Result<T, ConfigError> {
        match self.raw(key) {
            None => Ok(default),
            Some(v) => parse(&v).ok_or_else(|| ConfigError::invalid(key, &v, "unknown name")),
        }
    }

    fn list(&self, key: &str, default: Vec<String>) -> Result<Vec<String>, ConfigError> {
        let Some(raw) = self.raw(key) else {
            return Ok(default);
        };

        let items: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if items.is_empty() {
            return Err(ConfigError::EmptyValue(key.to_string()));
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<BoardConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        BoardConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn feed_kind_parsing() {
        assert_eq!(FeedKind::from_str_case_insensitive("WebSocket"), Some(FeedKind::WebSocket));
        assert_eq!(FeedKind::from_str_case_insensitive("sim"), Some(FeedKind::Simulated));
        assert_eq!(FeedKind::from_str_case_insensitive("grpc"), None);
        assert_eq!(FeedKind::WebSocket.as_str(), "websocket");
    }

    #[test]
    fn defaults_without_env() {
        let config = config(&[]).unwrap();

        assert_eq!(config.board.render_interval, Duration::from_millis(16));
        assert_eq!(config.board.highlight_duration, Duration::from_millis(2_000));
        assert_eq!(config.board.event_capacity, 4_096);
        assert_eq!(config.search.max_len, 4);
        assert_eq!(config.search.case_fold, CaseFold::Upper);
        assert_eq!(config.search.mode, MatchMode::Substring);
        assert_eq!(config.feed.kind, FeedKind::Simulated);
        assert_eq!(config.feed.node, "/symbols");
        assert_eq!(config.reconnect.delay_initial, Duration::from_millis(500));
        assert_eq!(config.reconnect.max_attempts, 0);
        assert_eq!(config.simulation.symbols.len(), 8);
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config(&[
            ("BOARD_RENDER_INTERVAL_MS", "33"),
            ("BOARD_HIGHLIGHT_DURATION_MS", "2500"),
            ("BOARD_SEARCH_CASE", "lower"),
            ("BOARD_SEARCH_MODE", "PREFIX"),
            ("BOARD_FEED", "websocket"),
            ("BOARD_FEED_URL", "ws://stocks.example:9001"),
            ("BOARD_RECONNECT_DELAY_MULTIPLIER", "1.5"),
            ("BOARD_SIM_SYMBOLS", " AAPL, ,DIS "),
            ("BOARD_SIM_SEED", "7"),
            ("BOARD_SEARCH", " dis "),
        ])
        .unwrap();

        assert_eq!(config.board.render_interval, Duration::from_millis(33));
        assert_eq!(config.board.highlight_duration, Duration::from_millis(2_500));
        assert_eq!(config.search.case_fold, CaseFold::Lower);
        assert_eq!(config.search.mode, MatchMode::Prefix);
        assert_eq!(config.feed.kind, FeedKind::WebSocket);
        assert_eq!(config.feed.url, "ws://stocks.example:9001");
        assert!((config.reconnect.delay_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.simulation.symbols, vec!["AAPL", "DIS"]);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.board.initial_search, "dis");

        let engine = config.engine_settings();
        assert_eq!(engine.highlight_duration, Duration::from_millis(2_500));
        assert_eq!(engine.lane, "stocks");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = config(&[("BOARD_RENDER_INTERVAL_MS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BOARD_RENDER_INTERVAL_MS"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config(&[("BOARD_SEARCH_MAX_LEN", "0")]).is_err());
        assert!(config(&[("BOARD_SEARCH_CASE", "title")]).is_err());
        assert!(config(&[("BOARD_HEALTH_PORT", "99999")]).is_err());
        assert!(config(&[("BOARD_SIM_CHURN", "1.5")]).is_err());
        assert!(config(&[("BOARD_RECONNECT_DELAY_MULTIPLIER", "0.5")]).is_err());
        assert!(matches!(
            config(&[("BOARD_FEED_NODE", " ")]),
            Err(ConfigError::EmptyValue(_))
        ));
        assert!(matches!(
            config(&[("BOARD_SIM_SYMBOLS", ",,")]),
            Err(ConfigError::EmptyValue(_))
        ));
    }

    #[test]
    fn error_message_names_variable() {
        let err = config(&[("BOARD_EVENT_CAPACITY", "lots")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"lots\" for BOARD_EVENT_CAPACITY: not a number"
        );
    }
}
