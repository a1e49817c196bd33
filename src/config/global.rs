use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SLOW_QUERY_THRESHOLD_SECS: f64 = 1.0;
pub const DEFAULT_RECENT_QUERY_CAPACITY: usize = 1000;

// -------------------------------------------------------
// Monitor Config Struct
// -------------------------------------------------------
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Record statements at all. Reporting keeps working when off.
    pub enabled: bool,

    /// Statements slower than this (seconds) are slow queries
    pub slow_query_threshold_secs: f64,

    /// Size of the recent-query ring buffer
    pub recent_query_capacity: usize,

    /// Log each recorded statement at DEBUG level
    pub log_each_query: bool,

    /// Append-only file receiving the slow-query stream (optional)
    pub slow_query_log: Option<PathBuf>,

    /// Slack webhook URL for slow-query alerts (optional)
    pub slack_webhook: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            slow_query_threshold_secs: DEFAULT_SLOW_QUERY_THRESHOLD_SECS,
            recent_query_capacity: DEFAULT_RECENT_QUERY_CAPACITY,
            log_each_query: false,
            slow_query_log: None,
            slack_webhook: None,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self { Self::default() }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Non-finite or negative values keep the current threshold.
    pub fn with_slow_query_threshold(mut self, secs: f64) -> Self {
        if valid_threshold(secs) {
            self.slow_query_threshold_secs = secs;
        }
        self
    }

    /// Zero keeps the current capacity.
    pub fn with_recent_query_capacity(mut self, capacity: usize) -> Self {
        if capacity > 0 {
            self.recent_query_capacity = capacity;
        }
        self
    }

    pub fn with_log_each_query(mut self, on: bool) -> Self {
        self.log_each_query = on;
        self
    }

    pub fn with_slow_query_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.slow_query_log = Some(path.into());
        self
    }

    pub fn with_slack_webhook(mut self, url: impl Into<String>) -> Self {
        self.slack_webhook = Some(url.into());
        self
    }

    /// Read the config from an optional TOML file overlaid by environment
    /// variables (`ENABLE_QUERY_MONITORING`, `SLOW_QUERY_THRESHOLD`,
    /// `RECENT_QUERY_CAPACITY`, `LOG_EACH_QUERY`, `SLOW_QUERY_LOG`, `SLACK_WEBHOOK`).
    ///
    /// Never fails: missing keys take defaults, invalid keys are logged and
    /// take defaults too.
    pub fn load(path: Option<&Path>) -> Self {
        let mut builder = config::Config::builder();
        if let Some(p) = path {
            builder = builder.add_source(config::File::from(p).required(false));
        }
        let source = match builder.add_source(config::Environment::default()).build() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target: "querymon", error = %e, "query monitor config unreadable, using defaults");
                return Self::default();
            }
        };
        Self::from_source(&source)
    }

    fn from_source(source: &config::Config) -> Self {
        let defaults = Self::default();
        Self {
            enabled: read(source, "enable_query_monitoring", |c, k| c.get_bool(k), |_| true)
                .unwrap_or(defaults.enabled),
            slow_query_threshold_secs: read(
                source,
                "slow_query_threshold",
                |c, k| c.get_float(k),
                |v| valid_threshold(*v),
            )
            .unwrap_or(defaults.slow_query_threshold_secs),
            recent_query_capacity: read(source, "recent_query_capacity", |c, k| c.get_int(k), |v| *v > 0)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.recent_query_capacity),
            log_each_query: read(source, "log_each_query", |c, k| c.get_bool(k), |_| true)
                .unwrap_or(defaults.log_each_query),
            slow_query_log: read(source, "slow_query_log", |c, k| c.get_string(k), |v| !v.trim().is_empty())
                .map(PathBuf::from),
            slack_webhook: read(source, "slack_webhook", |c, k| c.get_string(k), |v| !v.trim().is_empty()),
        }
    }
}

fn valid_threshold(secs: f64) -> bool {
    secs.is_finite() && secs >= 0.0
}

/// Fetch one key; `None` when absent, or (with a warning) when unparseable or
/// rejected by `accept`.
fn read<T: std::fmt::Debug>(
    source: &config::Config,
    key: &str,
    get: impl Fn(&config::Config, &str) -> Result<T, config::ConfigError>,
    accept: impl Fn(&T) -> bool,
) -> Option<T> {
    match get(source, key) {
        Ok(v) if accept(&v) => Some(v),
        Ok(v) => {
            tracing::warn!(target: "querymon", key, value = ?v, "invalid query monitor setting, using default");
            None
        }
        Err(config::ConfigError::NotFound(_)) => None,
        Err(e) => {
            tracing::warn!(target: "querymon", key, error = %e, "invalid query monitor setting, using default");
            None
        }
    }
}

// -------------------------------------------------------
// TRACING SETUP
// -------------------------------------------------------
/// Install the global tracing subscriber: `RUST_LOG` plus querymon fallback
/// directives and a fmt layer. Does nothing if a subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let mut filter = EnvFilter::from_default_env();
    for directive in ["querymon=info", "querymon::sql=debug", "querymon::slow_queries=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    let fmt_layer = fmt::layer().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    tracing::info!(target: "querymon", "querymon tracing initiated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    fn from_file(body: &str) -> MonitorConfig {
        let f = write_toml(body);
        let source = config::Config::builder()
            .add_source(config::File::from(f.path()))
            .build()
            .unwrap();
        MonitorConfig::from_source(&source)
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = MonitorConfig::default();
        assert!(!cfg.enabled);
        assert_eq!(cfg.slow_query_threshold_secs, 1.0);
        assert_eq!(cfg.recent_query_capacity, 1000);
    }

    #[test]
    fn reads_valid_file() {
        let cfg = from_file(
            "enable_query_monitoring = true\nslow_query_threshold = 0.5\nrecent_query_capacity = 50\nslack_webhook = \"https://hooks.example/x\"\n",
        );
        assert!(cfg.enabled);
        assert_eq!(cfg.slow_query_threshold_secs, 0.5);
        assert_eq!(cfg.recent_query_capacity, 50);
        assert_eq!(cfg.slack_webhook.as_deref(), Some("https://hooks.example/x"));
        assert!(cfg.slow_query_log.is_none());
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = from_file(
            "enable_query_monitoring = true\nslow_query_threshold = \"fast\"\nrecent_query_capacity = -3\n",
        );
        assert!(cfg.enabled);
        assert_eq!(cfg.slow_query_threshold_secs, DEFAULT_SLOW_QUERY_THRESHOLD_SECS);
        assert_eq!(cfg.recent_query_capacity, DEFAULT_RECENT_QUERY_CAPACITY);

        let cfg = from_file("slow_query_threshold = -1.0\nrecent_query_capacity = 0\n");
        assert_eq!(cfg.slow_query_threshold_secs, DEFAULT_SLOW_QUERY_THRESHOLD_SECS);
        assert_eq!(cfg.recent_query_capacity, DEFAULT_RECENT_QUERY_CAPACITY);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let cfg = MonitorConfig::load(Some(Path::new("/nonexistent/querymon.toml")));
        assert!(cfg.recent_query_capacity > 0);
        assert!(cfg.slow_query_threshold_secs >= 0.0);
    }

    #[test]
    fn builder_ignores_invalid_values() {
        let cfg = MonitorConfig::new()
            .enabled()
            .with_slow_query_threshold(f64::NAN)
            .with_recent_query_capacity(0);
        assert!(cfg.enabled);
        assert_eq!(cfg.slow_query_threshold_secs, 1.0);
        assert_eq!(cfg.recent_query_capacity, 1000);
    }
}
