//! In-memory collaborator backends.
//!
//! Each backend can be told to fail, either for every request or for one
//! session, and counts the requests it serves. The reporting service can
//! also delay individual sessions to reorder completions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agentwatch_protocol::{
    ComplianceReport, EventLogPort, ExecutionEvent, PortError, PortResult, ReportingPort, Session,
    SessionId, SessionStorePort,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct FailurePlan {
    all: Option<PortError>,
    sessions: HashMap<SessionId, PortError>,
}

impl FailurePlan {
    fn check(&self, session_id: Option<&SessionId>) -> PortResult<()> {
        if let Some(error) = &self.all {
            return Err(error.clone());
        }
        match session_id.and_then(|id| self.sessions.get(id)) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<IndexMap<SessionId, Session>>,
    failures: RwLock<FailurePlan>,
    requests: AtomicUsize,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let store = Self::new();
        for session in sessions {
            store.insert(session);
        }
        store
    }

    /// Insert or replace a session. Listing order is first-insertion order.
    pub fn insert(&self, session: Session) {
        self.sessions
            .write()
            .insert(session.session_id.clone(), session);
    }

    pub fn fail_with(&self, error: PortError) {
        self.failures.write().all = Some(error);
    }

    pub fn fail_session(&self, session_id: impl Into<SessionId>, error: PortError) {
        self.failures
            .write()
            .sessions
            .insert(session_id.into(), error);
    }

    pub fn clear_failures(&self) {
        *self.failures.write() = FailurePlan::default();
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStorePort for InMemorySessionStore {
    async fn get_session(&self, session_id: &SessionId) -> PortResult<Session> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.failures.read().check(Some(session_id))?;
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("session {session_id}")))
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.failures.read().check(None)?;
        Ok(self.sessions.read().values().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: RwLock<HashMap<SessionId, Vec<ExecutionEvent>>>,
    failures: RwLock<FailurePlan>,
    requests: AtomicUsize,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole event log of a session. An empty list registers the
    /// session with no events.
    pub fn insert(&self, session_id: impl Into<SessionId>, events: Vec<ExecutionEvent>) {
        self.events.write().insert(session_id.into(), events);
    }

    /// Append one event to its session's log.
    pub fn record(&self, event: ExecutionEvent) {
        self.events
            .write()
            .entry(event.session_id.clone())
            .or_default()
            .push(event);
    }

    pub fn fail_with(&self, error: PortError) {
        self.failures.write().all = Some(error);
    }

    pub fn fail_session(&self, session_id: impl Into<SessionId>, error: PortError) {
        self.failures
            .write()
            .sessions
            .insert(session_id.into(), error);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventLogPort for InMemoryEventLog {
    async fn get_events(&self, session_id: &SessionId) -> PortResult<Vec<ExecutionEvent>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.failures.read().check(Some(session_id))?;
        self.events
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("event log for session {session_id}")))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReportingService {
    reports: RwLock<HashMap<SessionId, ComplianceReport>>,
    delays: RwLock<HashMap<SessionId, Duration>>,
    failures: RwLock<FailurePlan>,
    requests: AtomicUsize,
}

impl InMemoryReportingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, report: ComplianceReport) {
        self.reports
            .write()
            .insert(report.session_id.clone(), report);
    }

    /// Serve `report` for `session_id` whatever session the report names.
    pub fn publish_for(&self, session_id: impl Into<SessionId>, report: ComplianceReport) {
        self.reports.write().insert(session_id.into(), report);
    }

    pub fn withdraw(&self, session_id: &SessionId) -> Option<ComplianceReport> {
        self.reports.write().remove(session_id)
    }

    pub fn delay_session(&self, session_id: impl Into<SessionId>, delay: Duration) {
        self.delays.write().insert(session_id.into(), delay);
    }

    pub fn fail_with(&self, error: PortError) {
        self.failures.write().all = Some(error);
    }

    pub fn fail_session(&self, session_id: impl Into<SessionId>, error: PortError) {
        self.failures
            .write()
            .sessions
            .insert(session_id.into(), error);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportingPort for InMemoryReportingService {
    async fn get_report(&self, session_id: &SessionId) -> PortResult<ComplianceReport> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.read().get(session_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.failures.read().check(Some(session_id))?;
        self.reports
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("no precomputed report for {session_id}")))
    }
}
