//! Integration tests for dsync-sync
//!
//! Runs the engine against a real temporary directory and the in-memory
//! remote store, covering both directions, ignore rules, newer-wins
//! decisions and dry runs.


mod test_pull;
mod test_push;
