//! Terminal evaluation failures.

use agentwatch_protocol::{PortError, SessionId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The collaborator whose failure ended an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    EventLog,
    SessionStore,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EventLog => "event log",
            Self::SessionStore => "session store",
        })
    }
}

/// Raised only once both the precomputed and the reconstruction paths are exhausted.
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    #[error("{collaborator} failed for session {session_id}: {source}")]
    Collaborator {
        collaborator: Collaborator,
        session_id: SessionId,
        #[source]
        source: PortError,
    },
}

impl EvaluationError {
    pub(crate) fn collaborator(
        collaborator: Collaborator,
        session_id: &SessionId,
        source: PortError,
    ) -> Self {
        Self::Collaborator {
            collaborator,
            session_id: session_id.clone(),
            source,
        }
    }

    pub fn failing_collaborator(&self) -> Collaborator {
        match self {
            Self::Collaborator { collaborator, .. } => *collaborator,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Collaborator { session_id, .. } => session_id,
        }
    }

    pub fn port_error(&self) -> &PortError {
        match self {
            Self::Collaborator { source, .. } => source,
        }
    }
}

pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Failure of [`crate::ComplianceEvaluator::flagged_sessions`].
#[derive(Debug, Clone, Error)]
pub enum FlaggedSessionsError {
    #[error("failed to list sessions: {0}")]
    Listing(#[source] PortError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
