//! # Decision Codes
//!
//! The closed set of outcomes a compliance check can produce. Code `0` is
//! always "permit"; every other code is a denial. Tokens must treat any
//! non-permit result as "do not mutate balances" without raising a fault.

use serde::{Deserialize, Serialize};

use crate::error::ComplianceError;

/// Outcome of a single compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
#[repr(u8)]
pub enum CheckResult {
    /// The action is compliant.
    Permit = 0,
    /// The action is not compliant.
    Deny = 1,
}

impl CheckResult {
    /// Numeric wire code.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Map a wire code to a result. Unknown non-zero codes are denials.
    pub fn from_code(code: u8) -> Self {
        if code == 0 {
            Self::Permit
        } else {
            Self::Deny
        }
    }

    /// Whether the action may proceed.
    pub fn is_permitted(&self) -> bool {
        matches!(self, Self::Permit)
    }

    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Deny => "deny",
        }
    }
}

impl From<CheckResult> for u8 {
    fn from(result: CheckResult) -> u8 {
        result.code()
    }
}

impl From<u8> for CheckResult {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl std::str::FromStr for CheckResult {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permit" | "0" => Ok(Self::Permit),
            "deny" | "1" => Ok(Self::Deny),
            other => Err(ComplianceError::InvalidInput(format!(
                "unknown check result {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
