//! Expectation recorder
//!
//! Hard checks abort the case through `?`; soft checks are logged and the
//! case continues. Every check, passed or not, is kept so the case can be
//! reported as passed, degraded or failed instead of only surfacing hard
//! failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Hard,
    Soft,
}

/// Value observed by a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Observed {
    Flag(bool),
    Count(usize),
    Text(String),
}

impl Observed {
    /// Falsy values fail the check: `false`, zero, empty text
    pub fn is_truthy(&self) -> bool {
        match self {
            Observed::Flag(flag) => *flag,
            Observed::Count(n) => *n > 0,
            Observed::Text(text) => !text.trim().is_empty(),
        }
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Flag(flag) => write!(f, "{flag}"),
            Observed::Count(n) => write!(f, "{n}"),
            Observed::Text(text) => write!(f, "{text:?}"),
        }
    }
}

impl From<bool> for Observed {
    fn from(value: bool) -> Self {
        Observed::Flag(value)
    }
}

impl From<usize> for Observed {
    fn from(value: usize) -> Self {
        Observed::Count(value)
    }
}

impl From<String> for Observed {
    fn from(value: String) -> Self {
        Observed::Text(value)
    }
}

impl From<&str> for Observed {
    fn from(value: &str) -> Self {
        Observed::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

/// One recorded check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub description: String,
    pub severity: Severity,
    pub observed: Option<Observed>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Case-level status computed from every recorded check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    /// No hard failure, but soft failures (or skips) were recorded
    Degraded,
    Failed,
    /// Never ran, e.g. because a dependency did not pass
    Skipped,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaseStatus::Passed => "passed",
            CaseStatus::Degraded => "degraded",
            CaseStatus::Failed => "failed",
            CaseStatus::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ExpectationRecorder {
    case: String,
    checks: Vec<Expectation>,
    skips_degrade: bool,
}

impl ExpectationRecorder {
    pub fn new(case: impl Into<String>) -> Self {
        Self {
            case: case.into(),
            checks: Vec::new(),
            skips_degrade: true,
        }
    }

    /// Whether a skipped verification turns a passing case into degraded
    pub fn skips_degrade(mut self, degrade: bool) -> Self {
        self.skips_degrade = degrade;
        self
    }

    pub fn case(&self) -> &str {
        &self.case
    }

    /// Record a check. A falsy hard check returns
    /// [`E2eError::HardCheckFailed`]; a falsy soft check only warns.
    pub fn record(
        &mut self,
        description: impl Into<String>,
        severity: Severity,
        observed: impl Into<Observed>,
    ) -> E2eResult<()> {
        let description = description.into();
        let observed = observed.into();
        let passed = observed.is_truthy();

        if passed {
            debug!(case = %self.case, check = %description, %observed, "Check passed");
        } else {
            match severity {
                Severity::Hard => {
                    error!(case = %self.case, check = %description, %observed, "Hard check failed")
                }
                Severity::Soft => warn!(
                    case = %self.case,
                    check = %description,
                    %observed,
                    "Soft check failed, continuing"
                ),
            }
        }

        self.checks.push(Expectation {
            description: description.clone(),
            severity,
            observed: Some(observed),
            outcome: if passed { Outcome::Passed } else { Outcome::Failed },
            note: None,
        });

        if !passed && severity == Severity::Hard {
            return Err(E2eError::HardCheckFailed(description));
        }
        Ok(())
    }

    pub fn hard(
        &mut self,
        description: impl Into<String>,
        observed: impl Into<Observed>,
    ) -> E2eResult<()> {
        self.record(description, Severity::Hard, observed)
    }

    pub fn soft(&mut self, description: impl Into<String>, observed: impl Into<Observed>) {
        // soft checks never return an error
        let _ = self.record(description, Severity::Soft, observed);
    }

    /// Record a verification that was deliberately not performed
    pub fn skip(&mut self, description: impl Into<String>, reason: impl Into<String>) {
        let description = description.into();
        let reason = reason.into();
        info!(case = %self.case, check = %description, %reason, "Skipping verification");
        self.checks.push(Expectation {
            description,
            severity: Severity::Soft,
            observed: None,
            outcome: Outcome::Skipped,
            note: Some(reason),
        });
    }

    /// Record the error that aborted the case, if it was not a hard check
    pub fn abort(&mut self, err: &E2eError) {
        if matches!(err, E2eError::HardCheckFailed(_)) {
            return;
        }
        self.checks.push(Expectation {
            description: "case aborted".to_string(),
            severity: Severity::Hard,
            observed: None,
            outcome: Outcome::Failed,
            note: Some(err.to_string()),
        });
    }

    pub fn checks(&self) -> &[Expectation] {
        &self.checks
    }

    pub fn failures(&self) -> impl Iterator<Item = &Expectation> {
        self.checks.iter().filter(|c| c.outcome == Outcome::Failed)
    }

    pub fn status(&self) -> CaseStatus {
        let failed = |severity: Severity| {
            self.checks
                .iter()
                .any(|c| c.outcome == Outcome::Failed && c.severity == severity)
        };
        let skipped = self.checks.iter().any(|c| c.outcome == Outcome::Skipped);

        if failed(Severity::Hard) {
            CaseStatus::Failed
        } else if failed(Severity::Soft) || (skipped && self.skips_degrade) {
            CaseStatus::Degraded
        } else {
            CaseStatus::Passed
        }
    }

    pub fn into_checks(self) -> Vec<Expectation> {
        self.checks
    }
}
