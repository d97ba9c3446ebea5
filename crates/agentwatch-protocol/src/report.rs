//! Compliance report types shared by the reporting service and the engine.

use crate::ids::SessionId;
use crate::session::SessionStatus;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Binary compliance verdict. `Pending` only ever comes from the reporting
/// service; local reconstruction always decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Pending,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non-compliant",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-tier severity derived from the number of flagged events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub session_id: SessionId,
    pub compliance_status: ComplianceStatus,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub policy_violations: Vec<String>,
    pub flagged_events_count: u64,
    pub total_events: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_status: Option<SessionStatus>,
}

/// A structural defect that makes a report unusable as a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportDefect {
    #[error("report belongs to session {actual}, expected {expected}")]
    SessionMismatch {
        expected: SessionId,
        actual: SessionId,
    },
    #[error("flagged events ({flagged}) exceed total events ({total})")]
    FlaggedExceedsTotal { flagged: u64, total: u64 },
    #[error("status {status} contradicts {flagged} flagged events")]
    StatusContradictsCount {
        status: ComplianceStatus,
        flagged: u64,
    },
}

impl ComplianceReport {
    pub fn is_non_compliant(&self) -> bool {
        self.compliance_status == ComplianceStatus::NonCompliant
    }

    /// Verify the report is about `expected`.
    pub fn check_subject(&self, expected: &SessionId) -> Result<(), ReportDefect> {
        if self.session_id != *expected {
            return Err(ReportDefect::SessionMismatch {
                expected: expected.clone(),
                actual: self.session_id.clone(),
            });
        }
        Ok(())
    }

    /// Verify the report is about `expected` and is internally consistent.
    pub fn check_invariants(&self, expected: &SessionId) -> Result<(), ReportDefect> {
        self.check_subject(expected)?;

        if self.flagged_events_count > self.total_events {
            return Err(ReportDefect::FlaggedExceedsTotal {
                flagged: self.flagged_events_count,
                total: self.total_events,
            });
        }

        let consistent = match self.compliance_status {
            ComplianceStatus::Compliant => self.flagged_events_count == 0,
            ComplianceStatus::NonCompliant => self.flagged_events_count > 0,
            ComplianceStatus::Pending => true,
        };
        if !consistent {
            return Err(ReportDefect::StatusContradictsCount {
                status: self.compliance_status,
                flagged: self.flagged_events_count,
            });
        }

        Ok(())
    }

    /// SHA-256 hex digest of the report's canonical JSON encoding.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: ComplianceStatus, flagged: u64, total: u64) -> ComplianceReport {
        ComplianceReport {
            session_id: SessionId::from("s1"),
            compliance_status: status,
            risk_level: RiskLevel::Low,
            policy_violations: Vec::new(),
            flagged_events_count: flagged,
            total_events: total,
            agent_name: None,
            session_status: None,
        }
    }

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&ComplianceStatus::NonCompliant).unwrap();
        assert_eq!(json, "\"non-compliant\"");
        let back: ComplianceStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(back, ComplianceStatus::Pending);
    }

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::High.to_string(), "high");
    }

    #[test]
    fn consistent_reports_pass_invariants() {
        let id = SessionId::from("s1");
        assert!(report(ComplianceStatus::Compliant, 0, 4).check_invariants(&id).is_ok());
        assert!(report(ComplianceStatus::NonCompliant, 2, 4).check_invariants(&id).is_ok());
        assert!(report(ComplianceStatus::Pending, 0, 0).check_invariants(&id).is_ok());
    }

    #[test]
    fn invariant_violations_are_reported() {
        let id = SessionId::from("s1");
        assert_eq!(
            report(ComplianceStatus::NonCompliant, 5, 3).check_invariants(&id),
            Err(ReportDefect::FlaggedExceedsTotal {
                flagged: 5,
                total: 3
            })
        );
        assert!(matches!(
            report(ComplianceStatus::Compliant, 1, 3).check_invariants(&id),
            Err(ReportDefect::StatusContradictsCount { .. })
        ));
        assert!(matches!(
            report(ComplianceStatus::NonCompliant, 0, 3).check_invariants(&id),
            Err(ReportDefect::StatusContradictsCount { .. })
        ));
        assert!(matches!(
            report(ComplianceStatus::Compliant, 0, 3).check_invariants(&SessionId::from("s2")),
            Err(ReportDefect::SessionMismatch { .. })
        ));
    }

    #[test]
    fn subject_check_ignores_count_contradictions() {
        let id = SessionId::from("s1");
        let verdict = report(ComplianceStatus::NonCompliant, 0, 0);
        assert!(verdict.check_subject(&id).is_ok());
        assert!(verdict.check_invariants(&id).is_err());
        assert!(matches!(
            verdict.check_subject(&SessionId::from("s2")),
            Err(ReportDefect::SessionMismatch { .. })
        ));
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = report(ComplianceStatus::Compliant, 0, 3);
        let b = a.clone();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);

        let c = report(ComplianceStatus::Compliant, 0, 4);
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }
}
