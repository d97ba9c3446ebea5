//! Fixed compliance policy: the flag taxonomy and risk thresholds.
//!
//! These values are part of the audit contract. Changing them is a policy
//! change, so they are constants rather than configuration.

use agentwatch_protocol::{ComplianceStatus, RiskLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A flag tag recognised as compliance-relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceFlag {
    HighCost,
    SensitiveData,
    ExternalApi,
    SecurityViolation,
}

/// Every recognised flag. Events carrying any of these are flagged.
pub const FLAG_TAXONOMY: [ComplianceFlag; 4] = [
    ComplianceFlag::HighCost,
    ComplianceFlag::SensitiveData,
    ComplianceFlag::ExternalApi,
    ComplianceFlag::SecurityViolation,
];

/// Flagged-event counts strictly above this are `High` risk.
pub const HIGH_RISK_ABOVE: u64 = 2;

/// Flagged-event counts from this value up to `HIGH_RISK_ABOVE` are `Medium` risk.
pub const MEDIUM_RISK_FROM: u64 = 1;

impl ComplianceFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighCost => "high_cost",
            Self::SensitiveData => "sensitive_data",
            Self::ExternalApi => "external_api",
            Self::SecurityViolation => "security_violation",
        }
    }
}

impl fmt::Display for ComplianceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceFlag {
    type Err = ();

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        FLAG_TAXONOMY
            .into_iter()
            .find(|flag| flag.as_str() == tag)
            .ok_or(())
    }
}

pub fn classify_risk(flagged_events: u64) -> RiskLevel {
    if flagged_events > HIGH_RISK_ABOVE {
        RiskLevel::High
    } else if flagged_events >= MEDIUM_RISK_FROM {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn classify_status(flagged_events: u64) -> ComplianceStatus {
    if flagged_events > 0 {
        ComplianceStatus::NonCompliant
    } else {
        ComplianceStatus::Compliant
    }
}
