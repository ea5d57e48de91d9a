//! DSync Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemoteEntry`, `LocalEntry`, `EntryKind`, `RemoteId`, `LogicalPath`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ISessionProvider`,
//!   `ILocalFileSystem`
//! - **Configuration** - YAML user configuration and the per-project `.dsync` layout
//!
//! # Architecture
//!
//! The domain module has no I/O. Ports define the trait interfaces that the
//! sync engine consumes and that adapter crates (`dsync-drive`, the local
//! filesystem adapter in `dsync-sync`) implement.

pub mod config;
pub mod domain;
pub mod ports;
