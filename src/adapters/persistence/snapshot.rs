//! Snapshot Store - Atomic JSON Escrow State Persistence
//!
//! Saves escrow state snapshots to `snapshot.json` using atomic writes
//! (write to tmp file, then rename). This guarantees crash safety
//! and prevents partial writes from corrupting state.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, instrument};

use crate::ports::repository::EscrowSnapshot;

/// Atomic JSON snapshot store for crash recovery.
///
/// State is written to a temporary file first, then atomically
/// renamed to `snapshot.json`. This ensures the file is always
/// either the old or new version, never a partial write.
pub struct SnapshotStore {
    /// Path to snapshot.json.
    snapshot_path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl SnapshotStore {
    /// Create a new snapshot store in the given data directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            snapshot_path: dir.join("snapshot.json"),
            tmp_path: dir.join("snapshot.json.tmp"),
        })
    }

    /// Save a snapshot atomically (tmp → rename).
    #[instrument(skip(self, snapshot))]
    pub async fn save(&self, snapshot: &EscrowSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize snapshot")?;

        // Write to tmp file
        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;

        // Atomic rename
        fs::rename(&self.tmp_path, &self.snapshot_path)
            .await
            .context("Failed to rename snapshot file")?;

        info!(
            path = %self.snapshot_path.display(),
            deals = snapshot.deals.len(),
            accounts = snapshot.accounts.len(),
            "Snapshot saved"
        );

        Ok(())
    }

    /// Load the most recent snapshot.
    ///
    /// Returns `None` if no snapshot file exists (first startup).
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<EscrowSnapshot>> {
        if !self.snapshot_path.exists() {
            info!("No snapshot file found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.snapshot_path)
            .await
            .context("Failed to read snapshot file")?;

        let snapshot: EscrowSnapshot =
            serde_json::from_str(&json).context("Failed to parse snapshot JSON")?;

        info!(
            version = %snapshot.version,
            deals = snapshot.deals.len(),
            accounts = snapshot.accounts.len(),
            "Snapshot loaded"
        );

        Ok(Some(snapshot))
    }

    /// Check if the snapshot file exists and is readable.
    pub async fn is_healthy(&self) -> bool {
        if !self.snapshot_path.exists() {
            return true; // First run is OK
        }
        fs::metadata(&self.snapshot_path).await.is_ok()
    }
}
