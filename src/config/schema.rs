//! Configuration schema, loading, and validation.

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::sessions::SessionLimits;

// ── Top-level config ──────────────────────────────────────────────

/// Top-level maitre configuration, loaded from `config.toml`.
///
/// Resolution order: `--config-dir` flag → `MAITRE_CONFIG_DIR` env → `~/.maitre/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Service name surfaced by the health endpoint. Default: `"maitre"`.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Capacity, quota, and expiry limits (`[limits]`).
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Gateway server configuration (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_service_name() -> String {
    "maitre".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            service_name: default_service_name(),
            limits: LimitsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

// ── Limits ────────────────────────────────────────────────────────

/// Capacity, quota, and expiry limits (`[limits]` section).
///
/// Supplied once at construction; the core never re-reads ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum live sessions across all clients. Default: `1024`.
    #[serde(default = "default_max_sessions_total")]
    pub max_sessions_total: usize,

    /// Maximum live sessions per client identity. Default: `8`.
    #[serde(default = "default_max_sessions_per_client")]
    pub max_sessions_per_client: usize,

    /// Session time-to-live in seconds. Default: `3600`.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Maximum messages retained per session. Default: `200`.
    #[serde(default = "default_max_messages_per_session")]
    pub max_messages_per_session: usize,

    /// Requests allowed per rate-limit window per client. Default: `30`.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    /// Rate-limit window in seconds. Default: `60`.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Seconds between reclaimer sweeps. Default: `3600`.
    #[serde(default = "default_reclaim_interval_secs")]
    pub reclaim_interval_secs: u64,
}

fn default_max_sessions_total() -> usize {
    1024
}

fn default_max_sessions_per_client() -> usize {
    8
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_max_messages_per_session() -> usize {
    200
}

fn default_rate_limit_requests() -> u32 {
    30
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_reclaim_interval_secs() -> u64 {
    3600
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions_total: default_max_sessions_total(),
            max_sessions_per_client: default_max_sessions_per_client(),
            session_ttl_secs: default_session_ttl_secs(),
            max_messages_per_session: default_max_messages_per_session(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            reclaim_interval_secs: default_reclaim_interval_secs(),
        }
    }
}

impl LimitsConfig {
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_sessions_total: self.max_sessions_total,
            max_sessions_per_client: self.max_sessions_per_client,
            max_messages_per_session: self.max_messages_per_session,
            session_ttl: chrono::Duration::seconds(self.session_ttl_secs as i64),
        }
    }

    pub fn rate_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rate_limit_window_secs as i64)
    }

    pub fn reclaim_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reclaim_interval_secs)
    }
}

// ── Gateway ───────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Gateway port (default: 8700)
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Trust proxy-forwarded client IP headers (`X-Forwarded-For`,
    /// `X-Real-IP`). Disabled by default; enable only behind a trusted
    /// reverse proxy.
    #[serde(default)]
    pub trust_forwarded_headers: bool,

    /// Per-request timeout in seconds. Default: `30`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes. Default: `65536`.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8700
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            trust_forwarded_headers: false,
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ── Loading and validation ────────────────────────────────────────

impl Config {
    /// Load the config from disk, writing a default file on first run.
    ///
    /// `config_dir` overrides the `MAITRE_CONFIG_DIR` env var, which in
    /// turn overrides `~/.maitre`.
    pub async fn load_or_init(config_dir: Option<&Path>) -> Result<Self> {
        let dir = match config_dir {
            Some(dir) => dir.to_path_buf(),
            None => match std::env::var("MAITRE_CONFIG_DIR") {
                Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
                _ => default_config_dir()?,
            },
        };
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;

        let config_path = dir.join("config.toml");
        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            let serialized =
                toml::to_string_pretty(&config).context("Failed to serialize default config")?;
            fs::write(&config_path, serialized)
                .await
                .context("Failed to write default config file")?;
            config
        };
        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MAITRE_GATEWAY_HOST") {
            if !host.trim().is_empty() {
                self.gateway.host = host;
            }
        }
        if let Ok(port) = std::env::var("MAITRE_GATEWAY_PORT") {
            if let Ok(port) = port.parse() {
                self.gateway.port = port;
            }
        }
    }

    /// Reject obviously invalid values before any traffic is accepted,
    /// instead of failing at arbitrary runtime points.
    pub fn validate(&self) -> Result<()> {
        // Gateway
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.gateway.request_timeout_secs == 0 {
            anyhow::bail!("gateway.request_timeout_secs must be greater than 0");
        }
        if self.gateway.max_body_bytes == 0 {
            anyhow::bail!("gateway.max_body_bytes must be greater than 0");
        }

        // Limits
        if self.limits.max_sessions_total == 0 {
            anyhow::bail!("limits.max_sessions_total must be greater than 0");
        }
        if self.limits.max_sessions_per_client == 0 {
            anyhow::bail!("limits.max_sessions_per_client must be greater than 0");
        }
        if self.limits.session_ttl_secs == 0 {
            anyhow::bail!("limits.session_ttl_secs must be greater than 0");
        }
        if self.limits.max_messages_per_session == 0 {
            anyhow::bail!("limits.max_messages_per_session must be greater than 0");
        }
        if self.limits.rate_limit_requests == 0 {
            anyhow::bail!("limits.rate_limit_requests must be greater than 0");
        }
        if self.limits.rate_limit_window_secs == 0 {
            anyhow::bail!("limits.rate_limit_window_secs must be greater than 0");
        }
        if self.limits.reclaim_interval_secs == 0 {
            anyhow::bail!("limits.reclaim_interval_secs must be greater than 0");
        }

        Ok(())
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let user_dirs = UserDirs::new().context("Could not find home directory")?;
    Ok(user_dirs.home_dir().join(".maitre"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.limits.max_sessions_total, 1024);
        assert_eq!(config.gateway.port, 8700);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut config = Config::default();
        config.limits.session_ttl_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("session_ttl_secs"));
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let mut config = Config::default();
        config.limits.rate_limit_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = Config::default();
        config.limits.max_sessions_total = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_host_is_rejected() {
        let mut config = Config::default();
        config.gateway.host = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [limits]
            max_sessions_total = 5

            [gateway]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.max_sessions_total, 5);
        assert_eq!(config.limits.max_sessions_per_client, 8);
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn limits_convert_to_session_limits() {
        let limits = LimitsConfig::default().session_limits();
        assert_eq!(limits.max_sessions_total, 1024);
        assert_eq!(limits.session_ttl, chrono::Duration::seconds(3600));
    }

    #[tokio::test]
    async fn first_run_writes_a_default_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_init(Some(dir.path())).await.unwrap();
        assert!(config.config_path.exists());

        // Second load reads the file back.
        let reloaded = Config::load_or_init(Some(dir.path())).await.unwrap();
        assert_eq!(reloaded.service_name, "maitre");
    }

    #[tokio::test]
    async fn existing_file_wins_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.toml"),
            "service_name = \"front-desk\"\n",
        )
        .await
        .unwrap();

        let config = Config::load_or_init(Some(dir.path())).await.unwrap();
        assert_eq!(config.service_name, "front-desk");
    }

    #[tokio::test]
    async fn invalid_file_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.toml"),
            "[limits]\nsession_ttl_secs = 0\n",
        )
        .await
        .unwrap();

        assert!(Config::load_or_init(Some(dir.path())).await.is_err());
    }
}
