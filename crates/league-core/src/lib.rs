// Library root: re-exports all modules so the CLI and integration tests can
// reach the crate's public API.

pub mod config;
pub mod db;
pub mod draft;
pub mod protocol;
pub mod schedule;
pub mod stats;
pub mod store;
