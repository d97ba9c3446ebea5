//! Collaborator backends for the agentwatch compliance engine.
//!
//! - [`file`] reads sessions, event logs, and precomputed reports from a
//!   directory of JSON files.
//! - [`memory`] keeps everything in process and supports failure injection.

pub mod file;
pub mod memory;

pub use file::{FileEventLog, FileReportStore, FileSessionStore, FileStore, StoreLayout};
pub use memory::{InMemoryEventLog, InMemoryReportingService, InMemorySessionStore};
