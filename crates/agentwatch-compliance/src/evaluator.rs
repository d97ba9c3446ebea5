use std::sync::Arc;

use agentwatch_protocol::{
    ComplianceReport, EventLogPort, PortError, ReportDefect, ReportingPort, Session, SessionId,
    SessionStorePort,
};
use futures_util::future::try_join;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::EvaluatorConfig;
use crate::error::{Collaborator, EvaluationError, EvaluationResult, FlaggedSessionsError};
use crate::reconstruct::reconstruct_report;

/// Where the report inside an assessment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    Precomputed,
    Reconstructed,
}

/// Why the precomputed report was not used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    MissingReport(String),
    ServiceError(String),
    MalformedReport(String),
    InconsistentReport(String),
}

impl From<PortError> for FallbackReason {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound(detail) => Self::MissingReport(detail),
            PortError::Malformed(detail) => Self::MalformedReport(detail),
            PortError::Unavailable(detail) | PortError::Io(detail) => Self::ServiceError(detail),
        }
    }
}

impl From<ReportDefect> for FallbackReason {
    fn from(defect: ReportDefect) -> Self {
        Self::InconsistentReport(defect.to_string())
    }
}

/// Result envelope returned by [`ComplianceEvaluator::evaluate`].
///
/// `session` carries the metadata fetched alongside the report so callers can
/// show agent name and status without another round trip. It is `None` when
/// the session store could not supply it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceAssessment {
    pub report: ComplianceReport,
    pub session: Option<Session>,
    pub source: ReportSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl ComplianceAssessment {
    pub fn is_non_compliant(&self) -> bool {
        self.report.is_non_compliant()
    }

    pub fn agent_name(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.agent_name.as_deref())
            .or(self.report.agent_name.as_deref())
    }
}

/// Outcome of the single attempt to use the reporting service.
#[derive(Debug)]
enum PrimaryOutcome {
    Accepted {
        report: ComplianceReport,
        session: Option<Session>,
    },
    Reconstruct(FallbackReason),
}

/// Turns a session's event stream into a compliance verdict.
///
/// Holds no mutable state. Every call re-reads its collaborators, so calls
/// for different sessions can run concurrently without coordination.
#[derive(Clone)]
pub struct ComplianceEvaluator {
    sessions: Arc<dyn SessionStorePort>,
    reports: Arc<dyn ReportingPort>,
    events: Arc<dyn EventLogPort>,
    config: EvaluatorConfig,
}

impl ComplianceEvaluator {
    pub fn new(
        sessions: Arc<dyn SessionStorePort>,
        reports: Arc<dyn ReportingPort>,
        events: Arc<dyn EventLogPort>,
    ) -> Self {
        Self {
            sessions,
            reports,
            events,
            config: EvaluatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Produce a compliance assessment for `session_id`.
    ///
    /// A missing or unusable precomputed report is never an error; it
    /// triggers local reconstruction. Only a failing event log or session
    /// store during reconstruction is surfaced.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn evaluate(&self, session_id: &SessionId) -> EvaluationResult<ComplianceAssessment> {
        match self.attempt_primary(session_id).await {
            PrimaryOutcome::Accepted { report, session } => {
                debug!(
                    status = %report.compliance_status,
                    risk = %report.risk_level,
                    "precomputed report accepted"
                );
                Ok(ComplianceAssessment {
                    report,
                    session,
                    source: ReportSource::Precomputed,
                    fallback_reason: None,
                })
            }
            PrimaryOutcome::Reconstruct(reason) => {
                warn!(?reason, "precomputed report unusable, reconstructing from events");
                let (report, session) = self.reconstruct(session_id).await?;
                Ok(ComplianceAssessment {
                    report,
                    session,
                    source: ReportSource::Reconstructed,
                    fallback_reason: Some(reason),
                })
            }
        }
    }

    /// Sessions from `sessions` whose assessment is non-compliant, in input order.
    ///
    /// Sessions are evaluated concurrently up to the configured limit. The
    /// first terminal failure aborts the whole listing.
    #[instrument(skip(self, sessions), fields(count = sessions.len()))]
    pub async fn list_flagged(&self, sessions: &[Session]) -> EvaluationResult<Vec<Session>> {
        let ids: Vec<SessionId> = sessions
            .iter()
            .map(|session| session.session_id.clone())
            .collect();
        let verdicts: Vec<bool> = stream::iter(ids)
            .map(|session_id| async move {
                self.evaluate(&session_id)
                    .await
                    .map(|assessment| assessment.is_non_compliant())
            })
            .buffered(self.config.effective_list_concurrency())
            .try_collect()
            .await?;

        let flagged: Vec<Session> = sessions
            .iter()
            .zip(verdicts)
            .filter_map(|(session, non_compliant)| non_compliant.then(|| session.clone()))
            .collect();
        debug!(flagged = flagged.len(), "flagged sessions resolved");
        Ok(flagged)
    }

    /// [`Self::list_flagged`] over the session store's full listing.
    pub async fn flagged_sessions(&self) -> Result<Vec<Session>, FlaggedSessionsError> {
        let sessions = self
            .sessions
            .list_sessions()
            .await
            .map_err(FlaggedSessionsError::Listing)?;
        Ok(self.list_flagged(&sessions).await?)
    }

    async fn attempt_primary(&self, session_id: &SessionId) -> PrimaryOutcome {
        let report = self.reports.get_report(session_id);
        let metadata = async { Ok::<_, PortError>(self.sessions.get_session(session_id).await) };

        let (report, metadata) = match try_join(report, metadata).await {
            Ok(pair) => pair,
            Err(error) => return PrimaryOutcome::Reconstruct(error.into()),
        };

        if let Err(defect) = report.check_subject(session_id) {
            return PrimaryOutcome::Reconstruct(defect.into());
        }
        if let Err(defect) = report.check_invariants(session_id) {
            warn!(%defect, "precomputed report is internally inconsistent, keeping its verdict");
        }

        let session = match metadata {
            Ok(session) => Some(session),
            Err(error) => {
                debug!(%error, "session metadata unavailable for precomputed report");
                None
            }
        };
        PrimaryOutcome::Accepted { report, session }
    }

    async fn reconstruct(
        &self,
        session_id: &SessionId,
    ) -> EvaluationResult<(ComplianceReport, Option<Session>)> {
        let events = async {
            self.events.get_events(session_id).await.map_err(|source| {
                EvaluationError::collaborator(Collaborator::EventLog, session_id, source)
            })
        };
        let metadata = async {
            match self.sessions.get_session(session_id).await {
                Ok(session) => Ok(Some(session)),
                Err(error) if error.is_not_found() => {
                    warn!("session metadata not found, reconstructing without it");
                    Ok(None)
                }
                Err(source) => Err(EvaluationError::collaborator(
                    Collaborator::SessionStore,
                    session_id,
                    source,
                )),
            }
        };

        let (events, session) = try_join(events, metadata).await?;
        let report = reconstruct_report(session_id, session.as_ref(), &events);
        debug!(
            total = report.total_events,
            flagged = report.flagged_events_count,
            risk = %report.risk_level,
            "report reconstructed"
        );
        Ok((report, session))
    }
}
