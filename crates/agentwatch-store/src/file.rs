//! JSON-on-disk collaborator backends.
//!
//! Layout under the root directory:
//!
//! ```text
//! sessions/<session_id>.json   one Session
//! events/<session_id>.jsonl    one ExecutionEvent per line
//! reports/<session_id>.json    one precomputed ComplianceReport
//! ```

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentwatch_protocol::{
    ComplianceReport, EventId, EventLogPort, ExecutionEvent, PortError, PortResult, ReportingPort,
    Session, SessionId, SessionStorePort,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn session_path(&self, session_id: &SessionId) -> PortResult<PathBuf> {
        Ok(self
            .sessions_dir()
            .join(format!("{}.json", file_stem(session_id)?)))
    }

    pub fn events_path(&self, session_id: &SessionId) -> PortResult<PathBuf> {
        Ok(self
            .root
            .join("events")
            .join(format!("{}.jsonl", file_stem(session_id)?)))
    }

    pub fn report_path(&self, session_id: &SessionId) -> PortResult<PathBuf> {
        Ok(self
            .root
            .join("reports")
            .join(format!("{}.json", file_stem(session_id)?)))
    }
}

/// Session ids become file names, so anything that could escape the
/// directory is refused.
fn file_stem(session_id: &SessionId) -> PortResult<&str> {
    let raw = session_id.as_str();
    let invalid = raw.is_empty()
        || raw.starts_with('.')
        || raw.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        || raw.contains("..");
    if invalid {
        return Err(PortError::Malformed(format!(
            "session id {raw:?} is not usable as a file name"
        )));
    }
    Ok(raw)
}

async fn ensure_parent(path: &Path) -> PortResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|error| PortError::Io(format!("failed to create {parent:?}: {error}")))?;
    }
    Ok(())
}

async fn read_file(path: &Path, what: &str) -> PortResult<String> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            Err(PortError::NotFound(format!("{what} at {path:?}")))
        }
        Err(error) => Err(PortError::Io(format!("failed reading {path:?}: {error}"))),
    }
}

async fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> PortResult<()> {
    ensure_parent(path).await?;
    let content = serde_json::to_vec_pretty(value)?;
    fs::write(path, content)
        .await
        .map_err(|error| PortError::Io(format!("failed writing {path:?}: {error}")))
}

fn parse_json<T: serde::de::DeserializeOwned>(content: &str, path: &Path) -> PortResult<T> {
    serde_json::from_str(content)
        .map_err(|error| PortError::Malformed(format!("failed parsing {path:?}: {error}")))
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    layout: StoreLayout,
}

impl FileSessionStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn save(&self, session: &Session) -> PortResult<()> {
        let path = self.layout.session_path(&session.session_id)?;
        write_pretty_json(&path, session).await?;
        debug!("session saved");
        Ok(())
    }
}

#[async_trait]
impl SessionStorePort for FileSessionStore {
    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn get_session(&self, session_id: &SessionId) -> PortResult<Session> {
        let path = self.layout.session_path(session_id)?;
        let content = read_file(&path, "session").await?;
        parse_json(&content, &path)
    }

    /// Sessions ordered by start time, then id. Sessions without a start
    /// time sort first.
    #[instrument(skip(self))]
    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        let dir = self.layout.sessions_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(PortError::Io(format!("failed listing {dir:?}: {error}"))),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let content = read_file(&path, "session").await?;
            sessions.push(parse_json::<Session>(&content, &path)?);
        }

        sessions.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        debug!(count = sessions.len(), "sessions listed");
        Ok(sessions)
    }
}

#[derive(Debug)]
pub struct FileEventLog {
    layout: StoreLayout,
    write_locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileEventLog {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, session_id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.write_locks.lock();
        guard
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the session's lock once no appender holds or awaits it.
    fn release(&self, session_id: &SessionId) {
        let mut guard = self.write_locks.lock();
        if guard
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            guard.remove(session_id);
        }
    }

    /// Create an empty log so the session is known with zero events.
    pub async fn touch(&self, session_id: &SessionId) -> PortResult<()> {
        let path = self.layout.events_path(session_id)?;
        ensure_parent(&path).await?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|error| PortError::Io(format!("failed opening event log {path:?}: {error}")))?;
        Ok(())
    }

    #[instrument(
        skip(self, event),
        fields(session_id = %event.session_id, event_type = %event.event_type)
    )]
    pub async fn append(&self, event: &ExecutionEvent) -> PortResult<()> {
        let path = self.layout.events_path(&event.session_id)?;
        ensure_parent(&path).await?;

        let lock = self.lock_for(&event.session_id);
        let written = {
            let _guard = lock.lock().await;
            write_line(&path, event).await
        };
        drop(lock);
        self.release(&event.session_id);

        written?;
        debug!("event appended to log");
        Ok(())
    }
}

async fn write_line(path: &Path, event: &ExecutionEvent) -> PortResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|error| PortError::Io(format!("failed opening event log {path:?}: {error}")))?;

    let line = serde_json::to_string(event)?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl EventLogPort for FileEventLog {
    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn get_events(&self, session_id: &SessionId) -> PortResult<Vec<ExecutionEvent>> {
        let path = self.layout.events_path(session_id)?;
        let file = match OpenOptions::new().read(true).open(&path).await {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(PortError::NotFound(format!("event log at {path:?}")));
            }
            Err(error) => {
                return Err(PortError::Io(format!("failed opening {path:?}: {error}")));
            }
        };

        let mut reader = BufReader::new(file).lines();
        let mut events = Vec::new();
        let mut line_number = 0_usize;
        while let Some(line) = reader.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let mut event: ExecutionEvent = serde_json::from_str(&line).map_err(|error| {
                PortError::Malformed(format!("{path:?} line {line_number}: {error}"))
            })?;
            // The file is per session, so records may omit their ids.
            if event.session_id.as_str().is_empty() {
                event.session_id = session_id.clone();
            }
            if event.event_id.as_str().is_empty() {
                event.event_id = EventId::from(format!("{session_id}:{line_number}"));
            }
            events.push(event);
        }
        debug!(count = events.len(), "events loaded from log");
        Ok(events)
    }
}

#[derive(Debug, Clone)]
pub struct FileReportStore {
    layout: StoreLayout,
}

impl FileReportStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    #[instrument(skip(self, report), fields(session_id = %report.session_id))]
    pub async fn save(&self, report: &ComplianceReport) -> PortResult<()> {
        let path = self.layout.report_path(&report.session_id)?;
        write_pretty_json(&path, report).await
    }
}

#[async_trait]
impl ReportingPort for FileReportStore {
    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn get_report(&self, session_id: &SessionId) -> PortResult<ComplianceReport> {
        let path = self.layout.report_path(session_id)?;
        let content = read_file(&path, "precomputed report").await?;
        parse_json(&content, &path)
    }
}

/// All three file backends over one root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    pub sessions: Arc<FileSessionStore>,
    pub events: Arc<FileEventLog>,
    pub reports: Arc<FileReportStore>,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let layout = StoreLayout::new(root);
        Self {
            sessions: Arc::new(FileSessionStore::new(layout.clone())),
            events: Arc::new(FileEventLog::new(layout.clone())),
            reports: Arc::new(FileReportStore::new(layout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use agentwatch_protocol::{ComplianceStatus, RiskLevel, SessionStatus};
    use chrono::{TimeZone, Utc};

    use super::*;

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    #[tokio::test]
    async fn event_log_appends_and_reads_in_order() -> PortResult<()> {
        let root = unique_test_root("agentwatch-events");
        let store = FileStore::open(&root);
        let id = SessionId::from("s1");

        store
            .events
            .append(&ExecutionEvent::new("s1", "call_api", ["external_api"]))
            .await?;
        store
            .events
            .append(&ExecutionEvent::new("s1", "query", Vec::<String>::new()))
            .await?;

        let events = store.events.get_events(&id).await?;
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["call_api", "query"]);

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn missing_event_log_is_not_found_but_touched_log_is_empty() -> PortResult<()> {
        let root = unique_test_root("agentwatch-events-missing");
        let store = FileStore::open(&root);
        let id = SessionId::from("quiet");

        assert!(store.events.get_events(&id).await.unwrap_err().is_not_found());
        store.events.touch(&id).await?;
        assert!(store.events.get_events(&id).await?.is_empty());

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn lenient_flags_and_blank_lines_in_event_log() -> PortResult<()> {
        let root = unique_test_root("agentwatch-events-lenient");
        let layout = StoreLayout::new(&root);
        let log = FileEventLog::new(layout.clone());
        let path = layout.events_path(&SessionId::from("s1"))?;
        ensure_parent(&path).await?;
        fs::write(
            &path,
            concat!(
                r#"{"event_id":1,"session_id":"s1","event_type":"query"}"#,
                "\n\n",
                r#"{"event_id":2,"session_id":"s1","event_type":"store","flags":null}"#,
                "\n",
            ),
        )
        .await?;

        let events = log.get_events(&SessionId::from("s1")).await?;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.flags.is_empty()));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn records_without_ids_take_them_from_the_log() -> PortResult<()> {
        let root = unique_test_root("agentwatch-events-bare");
        let layout = StoreLayout::new(&root);
        let path = layout.events_path(&SessionId::from("s1"))?;
        ensure_parent(&path).await?;
        fs::write(
            &path,
            concat!(
                r#"{"event_type":"call_api","flags":["external_api"]}"#,
                "\n",
                r#"{"event_id":"e2","session_id":"s1","event_type":"query"}"#,
                "\n",
            ),
        )
        .await?;

        let events = FileEventLog::new(layout)
            .get_events(&SessionId::from("s1"))
            .await?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].session_id.as_str(), "s1");
        assert_eq!(events[0].event_id.as_str(), "s1:1");
        assert_eq!(events[0].flags, vec!["external_api"]);
        assert_eq!(events[1].event_id.as_str(), "e2");

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn append_locks_are_released_after_writing() -> PortResult<()> {
        let root = unique_test_root("agentwatch-events-locks");
        let store = FileStore::open(&root);
        for session in ["a", "b", "a"] {
            store
                .events
                .append(&ExecutionEvent::new(session, "query", Vec::<String>::new()))
                .await?;
        }
        assert!(store.events.write_locks.lock().is_empty());
        assert_eq!(store.events.get_events(&SessionId::from("a")).await?.len(), 2);

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_event_line_is_malformed() -> PortResult<()> {
        let root = unique_test_root("agentwatch-events-corrupt");
        let layout = StoreLayout::new(&root);
        let path = layout.events_path(&SessionId::from("s1"))?;
        ensure_parent(&path).await?;
        fs::write(&path, "{not json}\n").await?;

        let error = FileEventLog::new(layout)
            .get_events(&SessionId::from("s1"))
            .await
            .unwrap_err();
        assert!(matches!(error, PortError::Malformed(message) if message.contains("line 1")));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn sessions_list_by_start_time() -> PortResult<()> {
        let root = unique_test_root("agentwatch-sessions");
        let store = FileStore::open(&root);
        let late = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

        store
            .sessions
            .save(&Session::new("late", SessionStatus::Running).with_started_at(late))
            .await?;
        store
            .sessions
            .save(
                &Session::new("early", SessionStatus::Completed)
                    .with_agent_name("indexer")
                    .with_started_at(early),
            )
            .await?;

        let listed = store.sessions.list_sessions().await?;
        let ids: Vec<&str> = listed.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);

        let fetched = store.sessions.get_session(&SessionId::from("early")).await?;
        assert_eq!(fetched.agent_name.as_deref(), Some("indexer"));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn empty_root_lists_no_sessions() -> PortResult<()> {
        let root = unique_test_root("agentwatch-sessions-empty");
        let store = FileStore::open(&root);
        assert!(store.sessions.list_sessions().await?.is_empty());
        assert!(
            store
                .sessions
                .get_session(&SessionId::from("nobody"))
                .await
                .unwrap_err()
                .is_not_found()
        );
        Ok(())
    }

    #[tokio::test]
    async fn reports_round_trip_and_reject_garbage() -> PortResult<()> {
        let root = unique_test_root("agentwatch-reports");
        let store = FileStore::open(&root);
        let report = ComplianceReport {
            session_id: SessionId::from("s1"),
            compliance_status: ComplianceStatus::Pending,
            risk_level: RiskLevel::Low,
            policy_violations: Vec::new(),
            flagged_events_count: 0,
            total_events: 0,
            agent_name: None,
            session_status: None,
        };
        store.reports.save(&report).await?;
        assert_eq!(store.reports.get_report(&SessionId::from("s1")).await?, report);

        let garbage = StoreLayout::new(&root).report_path(&SessionId::from("s2"))?;
        fs::write(&garbage, "[1, 2, 3]").await?;
        assert!(matches!(
            store.reports.get_report(&SessionId::from("s2")).await,
            Err(PortError::Malformed(_))
        ));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[test]
    fn path_like_session_ids_are_refused() {
        let layout = StoreLayout::new("/tmp/agentwatch");
        for raw in ["", "../etc/passwd", "a/b", ".hidden", "a\\b"] {
            assert!(
                layout.session_path(&SessionId::from(raw)).is_err(),
                "{raw:?} should be refused"
            );
        }
        assert!(layout.session_path(&SessionId::from("42")).is_ok());
    }
}
