//! Configuration management for Turnstile.
//!
//! Settings are layered: built-in defaults, then an optional config file
//! (any format the `config` crate understands, usually YAML), then
//! `TURNSTILE__*` environment variables. Command-line flags are applied on
//! top by the binary.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Prefix for environment overrides, e.g. `TURNSTILE__SERVER__HTTP_ADDR`.
pub const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Path to the rate limit rules file. The built-in table is used when unset.
    #[serde(default)]
    pub rules_path: Option<String>,

    /// Rules file reload interval in seconds (0 disables reloading)
    #[serde(default = "default_reload_interval")]
    pub rules_reload_interval_secs: u64,

    /// How often expired records are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            rules_reload_interval_secs: default_reload_interval(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_reload_interval() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    300
}

impl RateLimitingConfig {
    /// Interval between sweeps of expired records.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Interval between rule file reloads, if reloading is enabled.
    pub fn reload_interval(&self) -> Option<Duration> {
        match self.rules_reload_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl TurnstileConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TurnstileConfig::default();
        assert_eq!(config.server.http_addr, "127.0.0.1:8080".parse().unwrap());
        assert!(config.rate_limiting.rules_path.is_none());
        assert_eq!(config.rate_limiting.sweep_interval(), Duration::from_secs(300));
        assert_eq!(
            config.rate_limiting.reload_interval(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
server:
  http_addr: 0.0.0.0:9000
rate_limiting:
  rules_path: /etc/turnstile/rules.yaml
  rules_reload_interval_secs: 0
"#;
        let config: TurnstileConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(
            config.rate_limiting.rules_path.as_deref(),
            Some("/etc/turnstile/rules.yaml")
        );
        assert_eq!(config.rate_limiting.reload_interval(), None);
        assert_eq!(config.rate_limiting.sweep_interval_secs, 300);
    }

    #[test]
    fn test_zero_sweep_interval_is_clamped() {
        let config = RateLimitingConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = TurnstileConfig::load(None).unwrap();
        assert_eq!(config.rate_limiting.sweep_interval_secs, 300);
    }
}
