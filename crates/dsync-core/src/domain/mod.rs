//! Domain types
//!
//! This module contains the core domain types for DSync:
//! - Newtypes for remote identifiers, local sync paths and logical remote paths
//! - Directory entry types shared by both sides of a sync
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod newtypes;

// Re-export commonly used types
pub use entry::{EntryKind, LocalEntry, RemoteEntry, SyncDirection};
pub use errors::DomainError;
pub use newtypes::*;
