//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    service = %config.service.name,
    admins = config.admin.user_ids.len(),
    flow_ttl = config.flows.ttl_seconds,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - At least one admin identity
/// - Positive flow expiry
/// - Sensible price limits
/// - Non-empty addresses and paths
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.is_empty(),
    "Service name must not be empty"
  );

  anyhow::ensure!(
    !config.admin.user_ids.is_empty(),
    "At least one admin user id must be configured"
  );

  anyhow::ensure!(
    config.flows.ttl_seconds > 0,
    "Flow ttl_seconds must be positive, got {}",
    config.flows.ttl_seconds
  );

  anyhow::ensure!(
    config.deals.min_price > 0.0,
    "min_price must be positive, got {}",
    config.deals.min_price
  );
  anyhow::ensure!(
    config.deals.max_price > config.deals.min_price,
    "max_price ({}) must exceed min_price ({})",
    config.deals.max_price,
    config.deals.min_price
  );

  anyhow::ensure!(
    !config.persistence.data_dir.is_empty(),
    "Persistence data_dir must not be empty"
  );
  anyhow::ensure!(
    config.persistence.snapshot_interval_seconds > 0,
    "snapshot_interval_seconds must be positive"
  );

  anyhow::ensure!(
    !config.health.bind_address.is_empty(),
    "Health bind_address must not be empty"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_minimal_config() {
    let config: AppConfig = toml::from_str(
      r#"
        [service]
        name = "gift-escrow"

        [admin]
        user_ids = [1001]
      "#,
    )
    .unwrap();

    assert!(validate_config(&config).is_ok());
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.flows.ttl_seconds, 900);
    assert_eq!(config.admin.notify_recipient(), Some(1001));
  }

  #[test]
  fn test_reject_empty_admins() {
    let config: AppConfig = toml::from_str(
      r#"
        [service]
        name = "gift-escrow"

        [admin]
        user_ids = []
      "#,
    )
    .unwrap();

    assert!(validate_config(&config).is_err());
  }
}
