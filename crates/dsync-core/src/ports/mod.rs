//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces that the sync engine depends on, but whose
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Folder-level operations on the remote tree
//! - [`ISessionProvider`] - Produces an authenticated [`IRemoteStore`]
//! - [`ILocalFileSystem`] - Local directory listing and file I/O

pub mod local_filesystem;
pub mod remote_store;

pub use local_filesystem::ILocalFileSystem;
pub use remote_store::{IRemoteStore, ISessionProvider, Tokens};
