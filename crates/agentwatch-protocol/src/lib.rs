//! # agentwatch-protocol
//!
//! Shared types and collaborator ports for the agentwatch compliance engine.
//! This crate carries no runtime dependency so it can be used as a pure
//! contract crate by stores, the engine, and presentation layers.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (SessionId, EventId)
//! - [`session`] — Session metadata and lifecycle status
//! - [`event`] — ExecutionEvent with its flag tags
//! - [`report`] — ComplianceReport, ComplianceStatus, RiskLevel
//! - [`ports`] — Session store, reporting service, and event log ports
//! - [`error`] — PortError, PortResult

pub mod error;
pub mod event;
pub mod ids;
pub mod ports;
pub mod report;
pub mod session;

pub use error::{PortError, PortResult};
pub use event::ExecutionEvent;
pub use ids::{EventId, SessionId};
pub use ports::{EventLogPort, ReportingPort, SessionStorePort};
pub use report::{ComplianceReport, ComplianceStatus, ReportDefect, RiskLevel};
pub use session::{Session, SessionStatus};
