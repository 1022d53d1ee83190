use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use domain::services::UpdatePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub polling: PollingConfig,
    pub location: LocationConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the backend; endpoint names are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_http_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Directory holding the persisted identity file.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Overrides for platform detection.
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub platform_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
}

/// Positioning providers the agent can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A gpsd daemon reachable over TCP.
    Gpsd,
    /// A static coordinate from configuration.
    Fixed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_location_interval")]
    pub min_interval_secs: u64,

    #[serde(default = "default_min_displacement")]
    pub min_displacement_m: f64,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceKind>,

    #[serde(default = "default_gpsd_addr")]
    pub gpsd_addr: String,

    #[serde(default)]
    pub fixed_latitude: Option<f64>,
    #[serde(default)]
    pub fixed_longitude: Option<f64>,

    /// Reference point for synthesized locations.
    #[serde(default = "default_fallback_latitude")]
    pub fallback_latitude: f64,
    #[serde(default = "default_fallback_longitude")]
    pub fallback_longitude: f64,

    /// Total jitter width around the reference point, in degrees.
    #[serde(default = "default_fallback_jitter")]
    pub fallback_jitter: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics over HTTP.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_addr")]
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_addr(),
        }
    }
}

/// What the agent does right after start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StartupMode {
    /// Start tracking and command polling.
    #[default]
    Monitor,
    /// Run the connection test; monitoring starts only if it passes.
    TestConnection,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub startup_mode: StartupMode,

    /// In monitor mode, run the connection test before monitoring starts.
    #[serde(default)]
    pub verify_on_start: bool,
}

// Default value functions
fn default_base_url() -> String {
    "https://gis.xakserv.ru/api/".to_string()
}
fn default_http_timeout() -> u64 {
    30
}
fn default_state_dir() -> String {
    "./state".to_string()
}
fn default_poll_interval() -> u64 {
    60
}
fn default_initial_delay() -> u64 {
    5
}
fn default_location_interval() -> u64 {
    30
}
fn default_min_displacement() -> f64 {
    10.0
}
fn default_sources() -> Vec<SourceKind> {
    vec![SourceKind::Gpsd]
}
fn default_gpsd_addr() -> String {
    "127.0.0.1:2947".to_string()
}
fn default_fallback_latitude() -> f64 {
    domain::models::location::FALLBACK_LATITUDE
}
fn default_fallback_longitude() -> f64 {
    domain::models::location::FALLBACK_LONGITUDE
}
fn default_fallback_jitter() -> f64 {
    domain::models::location::FALLBACK_JITTER
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_metrics_addr() -> String {
    "0.0.0.0:9100".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Defaults used by [`Config::load_for_test`], mirroring `config/default.toml`.
const EMBEDDED_DEFAULTS: &str = r#"
    [server]
    base_url = "https://gis.xakserv.ru/api/"
    connect_timeout_secs = 30
    read_timeout_secs = 30

    [device]
    state_dir = "./state"

    [polling]
    interval_secs = 60
    initial_delay_secs = 5

    [location]
    min_interval_secs = 30
    min_displacement_m = 10.0
    sources = ["gpsd"]
    gpsd_addr = "127.0.0.1:2947"
    fallback_latitude = 55.7558
    fallback_longitude = 37.6173
    fallback_jitter = 0.001

    [logging]
    level = "info"
    format = "pretty"

    [metrics]
    enabled = false
    listen_addr = "0.0.0.0:9100"

    [agent]
    startup_mode = "monitor"
    verify_on_start = false
"#;

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with MA__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("MA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("location.sources")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Build a configuration from embedded defaults plus overrides.
    ///
    /// Does not touch the file system and skips validation, so tests can
    /// construct partial or deliberately invalid configs.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            EMBEDDED_DEFAULTS,
            config::FileFormat::Toml,
        ));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let base_url = self.server.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "MA__SERVER__BASE_URL must be set".to_string(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "server.base_url must be an http(s) URL, got {}",
                base_url
            )));
        }

        if self.polling.interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "polling.interval_secs cannot be 0".to_string(),
            ));
        }

        if self.location.min_displacement_m < 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "location.min_displacement_m cannot be negative".to_string(),
            ));
        }

        shared::validation::validate_coordinates(
            self.location.fallback_latitude,
            self.location.fallback_longitude,
        )
        .map_err(|e| invalid("location.fallback", e))?;

        shared::validation::validate_jitter(self.location.fallback_jitter)
            .map_err(|e| invalid("location.fallback_jitter", e))?;

        match (self.location.fixed_latitude, self.location.fixed_longitude) {
            (Some(lat), Some(lon)) => shared::validation::validate_coordinates(lat, lon)
                .map_err(|e| invalid("location.fixed", e))?,
            (None, None) => {
                if self.location.sources.contains(&SourceKind::Fixed) {
                    return Err(ConfigValidationError::MissingRequired(
                        "location.fixed_latitude and location.fixed_longitude are required for the fixed source"
                            .to_string(),
                    ));
                }
            }
            _ => {
                return Err(ConfigValidationError::InvalidValue(
                    "location.fixed_latitude and location.fixed_longitude must be set together"
                        .to_string(),
                ));
            }
        }

        if self.metrics.enabled && self.metrics.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigValidationError::InvalidValue(format!(
                "metrics.listen_addr is not a socket address: {}",
                self.metrics.listen_addr
            )));
        }

        Ok(())
    }

    /// Base URL with a guaranteed trailing slash, so endpoint names join under it.
    pub fn api_base_url(&self) -> String {
        let base = self.server.base_url.trim();
        if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.server.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.server.read_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn initial_poll_delay(&self) -> Duration {
        Duration::from_secs(self.polling.initial_delay_secs)
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        UpdatePolicy {
            min_interval: Duration::from_secs(self.location.min_interval_secs),
            min_displacement_m: self.location.min_displacement_m,
        }
    }
}

fn invalid(field: &str, err: validator::ValidationError) -> ConfigValidationError {
    let detail = err
        .message
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string());
    ConfigValidationError::InvalidValue(format!("{}: {}", field, detail))
}
