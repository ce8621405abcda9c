//! Repository Implementation — Concrete Adapter for the Repository Port
//!
//! Wraps `SnapshotStore` (atomic JSON snapshots) and `LedgerJournal`
//! (JSONL append-only files) into a single struct that implements the
//! `Repository` trait from `crate::ports::repository`.
//!
//! This is the hexagonal architecture glue: the usecases layer only
//! knows about the `Repository` trait, never about files or JSON.

use anyhow::Result;
use async_trait::async_trait;

use super::journal::LedgerJournal;
use super::snapshot::SnapshotStore;
use crate::ports::repository::{EscrowSnapshot, LedgerRecord, Repository};

/// Concrete repository adapter combining snapshot and journal persistence.
///
/// Delegates to `SnapshotStore` for crash-recovery snapshots and
/// `LedgerJournal` for append-only transaction records.
pub struct RepositoryImpl {
    /// Atomic JSON snapshot store.
    snapshot_store: SnapshotStore,
    /// JSONL ledger journal.
    journal: LedgerJournal,
}

impl RepositoryImpl {
    /// Create a new repository from existing store and journal instances.
    pub fn new(snapshot_store: SnapshotStore, journal: LedgerJournal) -> Self {
        Self {
            snapshot_store,
            journal,
        }
    }

    /// Create a new repository with a data directory path.
    ///
    /// Initializes both the snapshot store and the journal in the
    /// given directory, creating subdirectories as needed.
    pub async fn from_data_dir(data_dir: &str) -> Result<Self> {
        let snapshot_store = SnapshotStore::new(data_dir).await?;
        let journal = LedgerJournal::new(data_dir).await?;
        Ok(Self::new(snapshot_store, journal))
    }
}

#[async_trait]
impl Repository for RepositoryImpl {
    async fn append_ledger_record(&self, record: &LedgerRecord) -> Result<()> {
        self.journal.append(record).await
    }

    async fn load_ledger_records(&self) -> Result<Vec<LedgerRecord>> {
        self.journal.load_all().await
    }

    async fn save_snapshot(&self, snapshot: &EscrowSnapshot) -> Result<()> {
        self.snapshot_store.save(snapshot).await
    }

    async fn load_latest_snapshot(&self) -> Result<Option<EscrowSnapshot>> {
        self.snapshot_store.load().await
    }

    async fn is_healthy(&self) -> bool {
        self.snapshot_store.is_healthy().await && self.journal.is_healthy().await
    }
}
