//! Connection configuration handed over by the host settings layer.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// MPD connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpdConfig {
  /// Server hostname or address.
  #[serde(default = "default_host")]
  pub host: String,

  #[serde(default = "default_port")]
  pub port: u16,

  /// Sent with `password` right after the greeting.
  #[serde(default)]
  pub password: Option<String>,

  /// TCP connect timeout in milliseconds.
  #[serde(default = "default_connect_timeout_ms")]
  pub connect_timeout_ms: u64,

  /// Bound on every response read, in milliseconds.
  #[serde(default = "default_read_timeout_ms")]
  pub read_timeout_ms: u64,

  /// How long an `idle` may stay outstanding before `noidle` probes the
  /// server, in milliseconds.
  #[serde(default = "default_idle_timeout_ms")]
  pub idle_timeout_ms: u64,

  /// Delays between reconnect attempts in milliseconds; the last one repeats.
  #[serde(default = "default_reconnect_delays_ms")]
  pub reconnect_delays_ms: Vec<u64>,

  /// Worker tasks running submitted commands.
  #[serde(default = "default_workers")]
  pub workers: usize,

  /// Overrides keyed by network name (e.g. Wi-Fi SSID).
  #[serde(default)]
  pub profiles: HashMap<String, ProfileOverride>,
}

/// Per-network overrides of the connection target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOverride {
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub port: Option<u16>,
  #[serde(default)]
  pub password: Option<String>,
}

fn default_host() -> String {
  "localhost".to_string()
}

fn default_port() -> u16 {
  6600
}

fn default_connect_timeout_ms() -> u64 {
  10_000
}

fn default_read_timeout_ms() -> u64 {
  30_000
}

fn default_idle_timeout_ms() -> u64 {
  60_000
}

fn default_reconnect_delays_ms() -> Vec<u64> {
  vec![1_000, 2_000, 5_000, 10_000, 30_000, 60_000]
}

fn default_workers() -> usize {
  4
}

impl Default for MpdConfig {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      password: None,
      connect_timeout_ms: default_connect_timeout_ms(),
      read_timeout_ms: default_read_timeout_ms(),
      idle_timeout_ms: default_idle_timeout_ms(),
      reconnect_delays_ms: default_reconnect_delays_ms(),
      workers: default_workers(),
      profiles: HashMap::new(),
    }
  }
}

impl MpdConfig {
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    Self {
      host: host.into(),
      port,
      ..Self::default()
    }
  }

  /// Load settings stored as JSON by the host application.
  pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
    let config: Self = serde_json::from_value(value).map_err(|e| e.to_string())?;
    config.validate()?;
    Ok(config)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.host.trim().is_empty() {
      return Err("Host cannot be empty".to_string());
    }
    if self.port == 0 {
      return Err("Port must be between 1 and 65535".to_string());
    }
    if self.read_timeout_ms == 0 || self.connect_timeout_ms == 0 {
      return Err("Timeouts must be greater than zero".to_string());
    }
    if self.idle_timeout_ms == 0 {
      return Err("Idle timeout must be greater than zero".to_string());
    }
    if self.workers == 0 {
      return Err("At least one worker is required".to_string());
    }
    Ok(())
  }

  /// Effective configuration on the named network.
  pub fn for_network(&self, network: &str) -> Self {
    let mut config = self.clone();
    if let Some(profile) = self.profiles.get(network) {
      log::debug!("Applying connection profile for network {}", network);
      if let Some(host) = &profile.host {
        config.host = host.clone();
      }
      if let Some(port) = profile.port {
        config.port = port;
      }
      if profile.password.is_some() {
        config.password = profile.password.clone();
      }
    }
    config
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_millis(self.connect_timeout_ms)
  }

  pub fn read_timeout(&self) -> Duration {
    Duration::from_millis(self.read_timeout_ms)
  }

  pub fn idle_timeout(&self) -> Duration {
    Duration::from_millis(self.idle_timeout_ms)
  }

  /// Delay before reconnect attempt number `attempt` (0-based).
  pub fn reconnect_delay(&self, attempt: usize) -> Duration {
    let delays = &self.reconnect_delays_ms;
    match delays.last() {
      Some(last) => Duration::from_millis(*delays.get(attempt).unwrap_or(last)),
      None => Duration::from_secs(1),
    }
  }

  /// `host:port` for logging.
  pub fn address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_from_empty_json() {
    let config = MpdConfig::from_value(serde_json::json!({})).unwrap();
    assert_eq!(config, MpdConfig::default());
    assert_eq!(config.port, 6600);
  }

  #[test]
  fn test_camel_case_fields() {
    let config = MpdConfig::from_value(serde_json::json!({
      "host": "music.lan",
      "readTimeoutMs": 500,
      "reconnectDelaysMs": [10, 20]
    }))
    .unwrap();
    assert_eq!(config.host, "music.lan");
    assert_eq!(config.read_timeout(), Duration::from_millis(500));
    assert_eq!(config.reconnect_delay(0), Duration::from_millis(10));
    assert_eq!(config.reconnect_delay(7), Duration::from_millis(20));
  }

  #[test]
  fn test_validation() {
    assert!(MpdConfig::new("", 6600).validate().is_err());
    assert!(MpdConfig::new("host", 0).validate().is_err());
    let mut config = MpdConfig::default();
    config.workers = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_network_profile_override() {
    let mut config = MpdConfig::new("home.lan", 6600);
    config.profiles.insert(
      "office".into(),
      ProfileOverride {
        host: Some("10.0.0.5".into()),
        port: None,
        password: Some("secret".into()),
      },
    );
    let office = config.for_network("office");
    assert_eq!(office.host, "10.0.0.5");
    assert_eq!(office.port, 6600);
    assert_eq!(office.password.as_deref(), Some("secret"));
    assert_eq!(config.for_network("cafe").host, "home.lan");
  }
}
