//! Configuration loading and resolution.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use thirdparty_timer::{MeasureKey, MetricName};

use crate::error::{MonitorError, MonitorResult};

/// Path and fixed query of the TransactionFlow XML export.
pub const REPORT_PATH: &str =
    "/rest/management/reports/create/TransactionFlow?type=XML&format=XML+Export";

const DEFAULT_PORT: u16 = 8021;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 50_000;
const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_INTERVAL_SECS: u64 = 60;
/// Upper bound for `executionTimeoutSecs` and `intervalSecs`.
pub const MAX_PERIOD_SECS: u64 = 24 * 60 * 60;

/// Monitor settings, read from a JSON file with environment overrides.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Report server address.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default = "default_port")]
    pub http_port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Response-time statistic to read, e.g. `avg` for `response_avg`.
    #[serde(default = "default_aggregation")]
    pub aggregation: String,

    #[serde(default)]
    pub system_profile_filter: String,

    /// Offset timeframe such as `Last 5 Minutes`.
    #[serde(default = "default_timeframe")]
    pub timeframe_filter: String,

    /// Whether `bt_filter` is applied.
    #[serde(default, rename = "btBoolean")]
    pub bt_enabled: bool,

    #[serde(default)]
    pub bt_filter: String,

    /// Skip certificate and hostname verification on the report fetch.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound on fetch plus aggregation for one pass.
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// Period of the `watch` loop.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Metrics to publish.
    #[serde(default = "default_metrics")]
    pub metrics: BTreeSet<MetricName>,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_protocol() -> String {
    "https".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_aggregation() -> String {
    "avg".to_string()
}
fn default_timeframe() -> String {
    "Last 5 Minutes".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}
fn default_execution_timeout_secs() -> u64 {
    DEFAULT_EXECUTION_TIMEOUT_SECS
}
fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_metrics() -> BTreeSet<MetricName> {
    MetricName::ALL.into_iter().collect()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            protocol: default_protocol(),
            http_port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            aggregation: default_aggregation(),
            system_profile_filter: String::new(),
            timeframe_filter: default_timeframe(),
            bt_enabled: false,
            bt_filter: String::new(),
            accept_invalid_certs: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            execution_timeout_secs: DEFAULT_EXECUTION_TIMEOUT_SECS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            metrics: default_metrics(),
        }
    }
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("host", &self.host)
            .field("protocol", &self.protocol)
            .field("http_port", &self.http_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("aggregation", &self.aggregation)
            .field("system_profile_filter", &self.system_profile_filter)
            .field("timeframe_filter", &self.timeframe_filter)
            .field("bt_enabled", &self.bt_enabled)
            .field("bt_filter", &self.bt_filter)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("execution_timeout_secs", &self.execution_timeout_secs)
            .field("interval_secs", &self.interval_secs)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl MonitorConfig {
    /// Read a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> MonitorResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| MonitorError::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// Resolve, load, apply environment overrides and validate.
    pub fn from_sources(explicit: Option<&str>) -> MonitorResult<Self> {
        let path = resolve_config_path(explicit);
        let mut config = if path.exists() {
            tracing::info!("Loading config from {}", path.display());
            Self::load(&path)?
        } else if explicit.is_some() {
            return Err(MonitorError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override connection settings from `TPT_HOST`, `TPT_USERNAME` and
    /// `TPT_PASSWORD`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with an explicit variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("TPT_HOST") {
            self.host = host;
        }
        if let Some(username) = lookup("TPT_USERNAME") {
            self.username = username;
        }
        if let Some(password) = lookup("TPT_PASSWORD") {
            self.password = password;
        }
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(MonitorError::Config(
                "username and password are required".into(),
            ));
        }
        if self.system_profile_filter.trim().is_empty() {
            return Err(MonitorError::Config(
                "systemProfileFilter is required".into(),
            ));
        }
        if !matches!(self.protocol.as_str(), "http" | "https") {
            return Err(MonitorError::Config(format!(
                "unsupported protocol '{}', expected http or https",
                self.protocol
            )));
        }
        if self.aggregation.trim().is_empty() {
            return Err(MonitorError::Config("aggregation must not be empty".into()));
        }
        for (key, value) in [
            ("executionTimeoutSecs", self.execution_timeout_secs),
            ("intervalSecs", self.interval_secs),
        ] {
            if value == 0 || value > MAX_PERIOD_SECS {
                return Err(MonitorError::Config(format!(
                    "{key} must be between 1 and {MAX_PERIOD_SECS}, got {value}"
                )));
            }
        }
        if self.metrics.is_empty() {
            tracing::warn!("No metrics subscribed; passes will publish nothing");
        }
        Ok(())
    }

    pub fn measure_key(&self) -> MeasureKey {
        MeasureKey::from_aggregation(&self.aggregation)
    }

    /// Timeframe in the report's filter syntax (`Last 5 Minutes` -> `LAST:5:MINUTES`).
    pub fn timeframe(&self) -> String {
        self.timeframe_filter.trim().replace(' ', ":").to_uppercase()
    }

    /// Full report URL for this configuration.
    pub fn report_url(&self) -> MonitorResult<Url> {
        let mut raw = format!(
            "{}://{}:{}{}&source=live:{}&filter=tf:OffsetTimeframe?{}",
            self.protocol,
            self.host,
            self.http_port,
            REPORT_PATH,
            self.system_profile_filter.trim(),
            self.timeframe()
        );
        if self.bt_enabled && !self.bt_filter.is_empty() {
            raw.push_str("&filter=bt:");
            raw.push_str(&self.bt_filter);
        }
        Url::parse(&raw).map_err(|e| MonitorError::Config(format!("invalid report URL {raw}: {e}")))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

const CONFIG_RELATIVE_PATH: &str = ".thirdparty-timer/config.json";

/// Resolve the config file path.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    resolve_config_path_with(explicit, |key| std::env::var(key).ok(), Path::new(""))
}

/// Resolve the config path against an explicit variable lookup and working
/// directory: explicit path, then `TPT_CONFIG`, then `<cwd>/.thirdparty-timer`,
/// then the home directory.
pub fn resolve_config_path_with(
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
    cwd: &Path,
) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Some(env_path) = lookup("TPT_CONFIG") {
        return PathBuf::from(env_path);
    }

    let cwd_config = cwd.join(CONFIG_RELATIVE_PATH);
    if cwd_config.exists() {
        return cwd_config;
    }

    let home = lookup("HOME")
        .or_else(|| lookup("USERPROFILE"))
        .unwrap_or_else(|| ".".to_string());
    Path::new(&home).join(CONFIG_RELATIVE_PATH)
}
