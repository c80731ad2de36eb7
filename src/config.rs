//! Configuration module for Vigil.
//!
//! Loads configuration from a YAML file, fills in defaults, applies
//! environment variable overrides, and writes edited configuration back.

use crate::probe::{TargetSpec, DEFAULT_EXPECTED_STATUS};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("config YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitoring: MonitoringConfig,
    pub websites: Vec<WebsiteConfig>,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
    pub web: WebConfig,
}

/// Probe scheduling settings. Durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between probe rounds (default: 300)
    pub interval: f64,
    /// Default per-probe timeout in seconds (default: 30)
    pub timeout: f64,
    /// Number of concurrent workers (default: 5)
    pub workers: usize,
    /// Seconds between summary reports, 0 disables them (default: 0)
    pub summary_interval: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval: 300.0,
            timeout: 30.0,
            workers: 5,
            summary_interval: 0.0,
        }
    }
}

/// A website to monitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsiteConfig {
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub expected_status: u16,
    pub check_content: Option<String>,
    /// Seconds; inherits the monitoring timeout when unset.
    pub timeout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file (default: "data/vigil.db")
    pub path: String,
    /// Days of history to keep (default: 30)
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/vigil.db".to_string(),
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    /// HTTP port for the dashboard (default: 8080)
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// Environment variables:
    /// - `VIGIL_HTTP_PORT`: dashboard port
    /// - `VIGIL_DB_PATH`: database file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut cfg = Self::read(path)?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Load the file as written, without environment overrides.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_yaml(&data)
    }

    /// Write the configuration back as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse configuration from YAML text and fill in defaults.
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        let mut cfg: Config = serde_yaml::from_str(data)?;
        cfg.apply_defaults();
        Ok(cfg)
    }

    fn apply_defaults(&mut self) {
        let defaults = MonitoringConfig::default();
        if self.monitoring.interval == 0.0 {
            self.monitoring.interval = defaults.interval;
        }
        if self.monitoring.timeout <= 0.0 {
            self.monitoring.timeout = defaults.timeout;
        }
        if self.monitoring.workers == 0 {
            self.monitoring.workers = defaults.workers;
        }
        if self.storage.path.is_empty() {
            self.storage.path = StorageConfig::default().path;
        }
        if self.storage.retention_days == 0 {
            self.storage.retention_days = StorageConfig::default().retention_days;
        }

        let timeout = self.monitoring.timeout;
        for website in &mut self.websites {
            website.apply_defaults(timeout);
        }
    }

    fn apply_env(&mut self) {
        if let Ok(port_str) = env::var("VIGIL_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                self.web.port = port;
            }
        }

        if let Ok(db_path) = env::var("VIGIL_DB_PATH") {
            self.storage.path = db_path;
        }
    }

    /// Check the configuration before anything starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.websites.is_empty() {
            return Err(ConfigError::Invalid("no websites configured".to_string()));
        }

        let mut seen = HashSet::new();
        for (i, website) in self.websites.iter().enumerate() {
            if website.name.is_empty() {
                return Err(ConfigError::Invalid(format!("website {}: name is required", i)));
            }
            if website.url.is_empty() {
                return Err(ConfigError::Invalid(format!("website {}: URL is required", i)));
            }
            if !seen.insert(website.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "website {}: duplicate name {:?}",
                    i, website.name
                )));
            }
        }

        seconds("monitoring interval", self.monitoring.interval)?;
        seconds("monitoring timeout", self.monitoring.timeout)?;
        if self.monitoring.summary_interval != 0.0 {
            seconds("summary interval", self.monitoring.summary_interval)?;
        }
        for website in &self.websites {
            seconds(&format!("timeout for {}", website.name), website.timeout)?;
        }

        let telegram = &self.notifications.telegram;
        if telegram.enabled {
            if telegram.bot_token.is_empty() {
                return Err(ConfigError::Invalid(
                    "telegram notifications enabled but bot_token not configured".to_string(),
                ));
            }
            if telegram.chat_id.is_empty() {
                return Err(ConfigError::Invalid(
                    "telegram notifications enabled but chat_id not configured".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.monitoring.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.monitoring.timeout)
    }

    /// `None` when summary reports are disabled.
    pub fn summary_interval(&self) -> Option<Duration> {
        (self.monitoring.summary_interval > 0.0)
            .then(|| Duration::from_secs_f64(self.monitoring.summary_interval))
    }

    /// The probe targets described by this configuration.
    pub fn targets(&self) -> Vec<TargetSpec> {
        self.websites.iter().map(TargetSpec::from).collect()
    }
}

impl From<&WebsiteConfig> for TargetSpec {
    fn from(website: &WebsiteConfig) -> Self {
        Self {
            name: website.name.clone(),
            url: website.url.clone(),
            method: website.method.clone(),
            headers: website.headers.clone(),
            expected_status: website.expected_status,
            check_content: website.check_content.clone().filter(|c| !c.is_empty()),
            timeout: Duration::try_from_secs_f64(website.timeout)
                .ok()
                .filter(|d| !d.is_zero()),
        }
    }
}

impl WebsiteConfig {
    /// Fill unset fields. `default_timeout` is the monitoring timeout.
    pub fn apply_defaults(&mut self, default_timeout: f64) {
        if self.method.is_empty() {
            self.method = "GET".to_string();
        }
        if self.expected_status == 0 {
            self.expected_status = DEFAULT_EXPECTED_STATUS;
        }
        if self.timeout <= 0.0 {
            self.timeout = default_timeout;
        }
    }
}

/// A duration in seconds must be finite, representable and at least 1ns.
fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::Invalid(format!("{} must be a finite number of seconds", field)));
    }

    match Duration::try_from_secs_f64(value) {
        Ok(d) if !d.is_zero() => Ok(d),
        Ok(_) => Err(ConfigError::Invalid(format!("{} is too small: {}s", field, value))),
        Err(e) => Err(ConfigError::Invalid(format!("{} is out of range: {}", field, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
monitoring:
  interval: 60
  workers: 3
websites:
  - name: Example
    url: https://example.com
    check_content: "Example Domain"
  - name: API
    url: https://api.example.com/health
    method: HEAD
    expected_status: 204
    timeout: 5
    headers:
      Authorization: Bearer token
notifications:
  telegram:
    enabled: true
    bot_token: "123:abc"
    chat_id: "42"
"#;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.monitoring.interval, 300.0);
        assert_eq!(cfg.monitoring.timeout, 30.0);
        assert_eq!(cfg.monitoring.workers, 5);
        assert_eq!(cfg.storage.path, "data/vigil.db");
        assert_eq!(cfg.storage.retention_days, 30);
        assert_eq!(cfg.web.port, 8080);
        assert!(cfg.web.enabled);
    }

    #[test]
    fn test_parse_sample() {
        let cfg = Config::from_yaml(SAMPLE).unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.interval(), Duration::from_secs(60));
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.monitoring.workers, 3);
        assert_eq!(cfg.summary_interval(), None);

        let targets = cfg.targets();
        assert_eq!(targets.len(), 2);

        assert_eq!(targets[0].method, "GET");
        assert_eq!(targets[0].expected_status, 200);
        assert_eq!(targets[0].check_content.as_deref(), Some("Example Domain"));
        assert_eq!(targets[0].timeout, Some(Duration::from_secs(30)));

        assert_eq!(targets[1].method, "HEAD");
        assert_eq!(targets[1].expected_status, 204);
        assert_eq!(targets[1].timeout, Some(Duration::from_secs(5)));
        assert_eq!(targets[1].headers["Authorization"], "Bearer token");
    }

    #[test]
    fn test_validate_requires_websites() {
        let cfg = Config::from_yaml("monitoring:\n  interval: 10\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_requires_name_and_url() {
        let cfg = Config::from_yaml("websites:\n  - url: https://example.com\n").unwrap();
        assert!(cfg.validate().unwrap_err().to_string().contains("name is required"));

        let cfg = Config::from_yaml("websites:\n  - name: Example\n").unwrap();
        assert!(cfg.validate().unwrap_err().to_string().contains("URL is required"));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let cfg = Config::from_yaml(
            "websites:\n  - name: a\n    url: https://a.example\n  - name: a\n    url: https://b.example\n",
        )
        .unwrap();
        assert!(cfg.validate().unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_telegram() {
        let cfg = Config::from_yaml(
            "websites:\n  - name: a\n    url: https://a.example\nnotifications:\n  telegram:\n    enabled: true\n    chat_id: \"1\"\n",
        )
        .unwrap();
        assert!(cfg.validate().unwrap_err().to_string().contains("bot_token"));
    }

    #[test]
    fn test_validate_rejects_unusable_durations() {
        let site = "websites:\n  - name: a\n    url: https://a.example\n";
        let cases = [
            ("interval", ".nan"),
            ("interval", "1.0e-12"),
            ("interval", "1.0e+300"),
            ("interval", "-5"),
            ("timeout", ".nan"),
            ("timeout", "1.0e+300"),
            ("summary_interval", ".nan"),
            ("summary_interval", "1.0e-12"),
            ("summary_interval", "1.0e+300"),
            ("summary_interval", "-1"),
        ];

        for (field, value) in cases {
            let yaml = format!("monitoring:\n  {}: {}\n{}", field, value, site);
            let cfg = Config::from_yaml(&yaml).unwrap();
            assert!(
                matches!(cfg.validate(), Err(ConfigError::Invalid(_))),
                "{} = {} should be rejected",
                field,
                value
            );
        }
    }

    #[test]
    fn test_validate_rejects_unusable_website_timeout() {
        for value in [".nan", "1.0e-12", "1.0e+300"] {
            let yaml = format!(
                "websites:\n  - name: a\n    url: https://a.example\n    timeout: {}\n",
                value
            );
            let cfg = Config::from_yaml(&yaml).unwrap();
            let err = cfg.validate().unwrap_err().to_string();
            assert!(err.contains("timeout for a"), "{}: {}", value, err);
        }
    }

    #[test]
    fn test_validated_durations_are_usable() {
        let cfg = Config::from_yaml(
            "monitoring:\n  interval: 0.5\n  summary_interval: 0\nwebsites:\n  - name: a\n    url: https://a.example\n",
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.interval(), Duration::from_millis(500));
        assert_eq!(cfg.summary_interval(), None);
    }

    #[test]
    fn test_save_round_trips_without_env() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut cfg = Config::from_yaml(SAMPLE).unwrap();
        cfg.websites.remove(0);
        cfg.save(tmp.path()).unwrap();

        let reread = Config::read(tmp.path()).unwrap();
        reread.validate().unwrap();
        assert_eq!(reread.websites.len(), 1);
        assert_eq!(reread.websites[0].name, "API");
        assert_eq!(reread.monitoring.workers, 3);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("websites: [oops"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/vigil.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
