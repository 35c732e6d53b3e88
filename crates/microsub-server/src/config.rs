//! Runtime configuration (§6 "Configuration").
//!
//! Loaded from a TOML file (or the documented defaults if no file exists),
//! with paths resolved through `~` expansion the same way the rest of the
//! ambient stack does it.

use super::*;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/microsub";
pub const DEFAULT_PORT: u16 = 8008;

fn default_mount_path() -> String {
    "/microsub".to_string()
}
fn default_batch_concurrency() -> usize {
    5
}
fn default_scheduler_interval() -> std::time::Duration {
    std::time::Duration::from_millis(60_000)
}
fn default_fetch_timeout() -> std::time::Duration {
    std::time::Duration::from_millis(30_000)
}
fn default_discovery_timeout() -> std::time::Duration {
    std::time::Duration::from_millis(10_000)
}
fn default_max_full_read_items() -> u32 {
    200
}
fn default_unread_retention_days() -> i64 {
    30
}
fn default_websub_lease_seconds() -> i64 {
    604_800
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_database_path() -> String {
    "~/.local/share/microsub/microsub.sqlite3".to_string()
}
fn default_external_base_url() -> String {
    format!("http://localhost:{DEFAULT_PORT}")
}

/// Top-level server configuration, deserialized from TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Publicly reachable base URL, used to build WebSub callback URLs.
    #[serde(default = "default_external_base_url")]
    pub external_base_url: String,
    #[serde(default = "default_database_path")]
    pub database: String,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub microsub: MicrosubConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            external_base_url: default_external_base_url(),
            database: default_database_path(),
            log: LogConfig::default(),
            microsub: MicrosubConfig::default(),
        }
    }
}

/// The §6 "Configuration" named options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MicrosubConfig {
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    #[serde(default = "default_scheduler_interval", with = "humantime_serde")]
    pub scheduler_interval: std::time::Duration,
    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: std::time::Duration,
    #[serde(default = "default_discovery_timeout", with = "humantime_serde")]
    pub discovery_timeout: std::time::Duration,
    #[serde(default = "default_max_full_read_items")]
    pub max_full_read_items_per_channel: u32,
    #[serde(default = "default_unread_retention_days")]
    pub unread_retention_days: i64,
    #[serde(default = "default_websub_lease_seconds")]
    pub websub_lease_seconds: i64,
}

impl Default for MicrosubConfig {
    fn default() -> Self {
        Self {
            mount_path: default_mount_path(),
            batch_concurrency: default_batch_concurrency(),
            scheduler_interval: default_scheduler_interval(),
            fetch_timeout: default_fetch_timeout(),
            discovery_timeout: default_discovery_timeout(),
            max_full_read_items_per_channel: default_max_full_read_items(),
            unread_retention_days: default_unread_retention_days(),
            websub_lease_seconds: default_websub_lease_seconds(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// `error`, `warn`, `info`, `debug`, or `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional path to also mirror logs to a file.
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file: None }
    }
}

impl Config {
    /// Load from `path`, falling back to built-in defaults when the file
    /// does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path.unwrap_or(&format!("{DEFAULT_CONFIG_DIR}/config.toml")).to_string();
        let resolved = std::path::PathBuf::from(path).resolve().into_owned();
        if !resolved.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&resolved)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn database_path(&self) -> String {
        self.database.clone()
    }

    /// Build the publicly reachable WebSub callback URL for `feed_id`.
    pub fn websub_callback_url(&self, feed_id: i64) -> String {
        format!(
            "{}{}/websub/{}",
            self.external_base_url.trim_end_matches('/'),
            self.microsub.mount_path,
            feed_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_well_formed() {
        let config = Config::default();
        assert_eq!(config.microsub.mount_path, "/microsub");
        assert_eq!(config.microsub.batch_concurrency, 5);
        assert_eq!(config.microsub.websub_lease_seconds, 604_800);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str("port = 9000\n[microsub]\nbatch_concurrency = 10\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.microsub.batch_concurrency, 10);
        assert_eq!(config.microsub.mount_path, "/microsub");
    }

    #[test]
    fn builds_websub_callback_url() {
        let config = Config::default();
        assert_eq!(
            config.websub_callback_url(42),
            format!("http://localhost:{DEFAULT_PORT}/microsub/websub/42")
        );
    }
}
