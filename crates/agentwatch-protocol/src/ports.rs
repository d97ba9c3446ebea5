//! Boundary ports between the compliance engine and its collaborators.
//!
//! Every read the engine performs goes through one of these traits. They use
//! `async-trait` so implementations can be held as `Arc<dyn _>`.

use crate::error::PortResult;
use crate::event::ExecutionEvent;
use crate::ids::SessionId;
use crate::report::ComplianceReport;
use crate::session::Session;
use async_trait::async_trait;

#[async_trait]
pub trait SessionStorePort: Send + Sync {
    /// Returns `PortError::NotFound` for unknown ids.
    async fn get_session(&self, session_id: &SessionId) -> PortResult<Session>;
    async fn list_sessions(&self) -> PortResult<Vec<Session>>;
}

#[async_trait]
pub trait ReportingPort: Send + Sync {
    /// Returns the precomputed report, or an error when none can be supplied.
    async fn get_report(&self, session_id: &SessionId) -> PortResult<ComplianceReport>;
}

#[async_trait]
pub trait EventLogPort: Send + Sync {
    /// Events in emission order.
    async fn get_events(&self, session_id: &SessionId) -> PortResult<Vec<ExecutionEvent>>;
}
