//! Persistence Adapters - In-Memory Store + JSONL Durability
//!
//! The `MemoryStore` is the reference implementation of the
//! `DealStore`/`LedgerStore` ports; `RepositoryImpl` combines the
//! append-only ledger journal with atomic snapshot recovery behind
//! the `Repository` port.

pub mod journal;
pub mod memory;
pub mod repository_impl;
pub mod snapshot;

pub use journal::LedgerJournal;
pub use memory::MemoryStore;
pub use repository_impl::RepositoryImpl;
pub use snapshot::SnapshotStore;
