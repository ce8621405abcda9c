//! Ledger Journal - Append-only JSONL Transaction Records
//!
//! Persists committed ledger movements to daily JSONL files in the
//! format `ledger/YYYY-MM-DD.jsonl`. Each line is a self-contained
//! JSON record for easy parsing, streaming, and audits.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use crate::ports::repository::LedgerRecord;

/// Append-only JSONL ledger journal with daily file rotation.
///
/// Journal files are named `ledger/YYYY-MM-DD.jsonl` and each line
/// is a complete JSON object. This format is optimized for:
/// - Append-only writes (no read-modify-write)
/// - Line-by-line streaming for audits
/// - Natural daily partitioning
pub struct LedgerJournal {
    /// Base directory for journal files.
    ledger_dir: PathBuf,
}

impl LedgerJournal {
    /// Create a new journal in the given data directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let ledger_dir = Path::new(data_dir).join("ledger");

        fs::create_dir_all(&ledger_dir)
            .await
            .context("Failed to create ledger directory")?;

        Ok(Self { ledger_dir })
    }

    /// Append a ledger record to today's JSONL file.
    #[instrument(skip(self, record), fields(tx_id = %record.id))]
    pub async fn append(&self, record: &LedgerRecord) -> Result<()> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = self.ledger_dir.join(format!("{date}.jsonl"));

        let mut json = serde_json::to_string(record)
            .context("Failed to serialize ledger record")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open ledger journal file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write ledger record")?;

        file.flush().await.context("Failed to flush ledger journal")?;

        Ok(())
    }

    /// Load all ledger records from all daily files, oldest first.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Vec<LedgerRecord>> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.ledger_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                let content = fs::read_to_string(&path).await?;
                for line in content.lines() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<LedgerRecord>(line) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            tracing::warn!(
                                file = %path.display(),
                                error = %e,
                                "Skipping malformed ledger record"
                            );
                        }
                    }
                }
            }
        }

        records.sort_by_key(|r| r.timestamp_ms);
        info!(count = records.len(), "Loaded ledger records");
        Ok(records)
    }

    /// Check if the journal directory is writable.
    pub async fn is_healthy(&self) -> bool {
        let test_path = self.ledger_dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        result.is_ok()
    }
}
