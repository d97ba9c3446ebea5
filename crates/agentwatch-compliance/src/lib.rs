//! # agentwatch-compliance
//!
//! Turns a session's raw event stream into a compliance verdict. A
//! precomputed report from the reporting service is used when one can be
//! obtained; otherwise the report is reconstructed locally from the event log
//! using the fixed flag taxonomy and risk thresholds in [`policy`].

pub mod config;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod reconstruct;

pub use config::EvaluatorConfig;
pub use error::{Collaborator, EvaluationError, EvaluationResult, FlaggedSessionsError};
pub use evaluator::{ComplianceAssessment, ComplianceEvaluator, FallbackReason, ReportSource};
pub use policy::{
    ComplianceFlag, FLAG_TAXONOMY, HIGH_RISK_ABOVE, MEDIUM_RISK_FROM, classify_risk,
    classify_status,
};
pub use reconstruct::{is_flagged, matched_flags, reconstruct_report};
