//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Admin identities, flow expiry, and price limits are externalized
//! here - nothing is hardcoded in the domain layer.

pub mod loader;

use serde::Deserialize;

use crate::domain::deal::UserId;

/// Top-level escrow service configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the service begins operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Admin identities and the manual-fulfillment notify channel.
  pub admin: AdminConfig,
  /// Deal listing limits.
  #[serde(default)]
  pub deals: DealConfig,
  /// Multi-step conversation flow settings.
  #[serde(default)]
  pub flows: FlowConfig,
  /// Durability configuration.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// Health endpoint configuration.
  #[serde(default)]
  pub health: HealthConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Admin configuration.
///
/// Privilege is enforced at the service boundary against `user_ids`;
/// the transport layer no longer holds the only check.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
  /// Actors allowed to invoke AdminService operations.
  pub user_ids: Vec<UserId>,
  /// Recipient of operational notices (paid deals, withdrawal
  /// requests, disputes). Defaults to the first admin.
  pub notify_user_id: Option<UserId>,
}

impl AdminConfig {
  /// The admin recipient for operational notices.
  pub fn notify_recipient(&self) -> Option<UserId> {
    self.notify_user_id.or_else(|| self.user_ids.first().copied())
  }
}

/// Deal listing limits.
#[derive(Debug, Clone, Deserialize)]
pub struct DealConfig {
  /// Smallest accepted listing price.
  #[serde(default = "default_min_price")]
  pub min_price: f64,
  /// Largest accepted listing price.
  #[serde(default = "default_max_price")]
  pub max_price: f64,
}

impl Default for DealConfig {
  fn default() -> Self {
    Self {
      min_price: default_min_price(),
      max_price: default_max_price(),
    }
  }
}

/// Multi-step flow settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
  /// Seconds a pending flow accepts input before expiring.
  #[serde(default = "default_flow_ttl")]
  pub ttl_seconds: i64,
}

impl Default for FlowConfig {
  fn default() -> Self {
    Self {
      ttl_seconds: default_flow_ttl(),
    }
  }
}

/// Durability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the JSONL ledger journal and snapshots.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
  /// State snapshot interval (seconds).
  #[serde(default = "default_snapshot_interval")]
  pub snapshot_interval_seconds: u64,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      snapshot_interval_seconds: default_snapshot_interval(),
    }
  }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
  /// Bind address for the /live and /ready endpoints.
  #[serde(default = "default_health_addr")]
  pub bind_address: String,
}

impl Default for HealthConfig {
  fn default() -> Self {
    Self {
      bind_address: default_health_addr(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_min_price() -> f64 {
  1.0
}

fn default_max_price() -> f64 {
  1_000_000.0
}

fn default_flow_ttl() -> i64 {
  900
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_snapshot_interval() -> u64 {
  60
}

fn default_health_addr() -> String {
  "0.0.0.0:8080".to_string()
}
