//! Local reconstruction of a compliance report from a raw event log.

use agentwatch_protocol::{ComplianceReport, ExecutionEvent, Session, SessionId};
use indexmap::IndexSet;

use crate::policy::{ComplianceFlag, classify_risk, classify_status};

/// Taxonomy flags carried by `event`, in the event's own order, without repeats.
pub fn matched_flags(event: &ExecutionEvent) -> IndexSet<ComplianceFlag> {
    event
        .flags
        .iter()
        .filter_map(|tag| tag.parse::<ComplianceFlag>().ok())
        .collect()
}

pub fn is_flagged(event: &ExecutionEvent) -> bool {
    event
        .flags
        .iter()
        .any(|tag| tag.parse::<ComplianceFlag>().is_ok())
}

fn violation_line(event_type: &str, flags: &IndexSet<ComplianceFlag>) -> String {
    let names: Vec<&str> = flags.iter().map(ComplianceFlag::as_str).collect();
    format!("{event_type} with flags: {}", names.join(", "))
}

/// Build a report for `session_id` from its events and (possibly missing) metadata.
///
/// Output depends only on the inputs, so two calls over the same event log
/// produce identical reports.
pub fn reconstruct_report(
    session_id: &SessionId,
    session: Option<&Session>,
    events: &[ExecutionEvent],
) -> ComplianceReport {
    let policy_violations: Vec<String> = events
        .iter()
        .filter_map(|event| {
            let flags = matched_flags(event);
            (!flags.is_empty()).then(|| violation_line(&event.event_type, &flags))
        })
        .collect();

    let flagged_events_count = policy_violations.len() as u64;

    ComplianceReport {
        session_id: session_id.clone(),
        compliance_status: classify_status(flagged_events_count),
        risk_level: classify_risk(flagged_events_count),
        policy_violations,
        flagged_events_count,
        total_events: events.len() as u64,
        agent_name: session.and_then(|session| session.agent_name.clone()),
        session_status: session.map(|session| session.status),
    }
}
