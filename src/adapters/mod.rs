//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! technology: in-memory entity maps, JSONL files, and outbound
//! message delivery.

pub mod notify;
pub mod persistence;
