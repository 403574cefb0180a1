// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run report representation.
//!
//! One reconciliation run produces one [`Report`]: an ordered sequence of
//! [`Outcome`] values, one per resource, in the order the resources were
//! declared. The report is appended to as the run proceeds and frozen when
//! the run ends, normally or via early abort. Nothing here persists across
//! runs.
//!
//! Rendering is left to a [`Reporter`] collaborator. The reconciler core only
//! defines the report shape; translating failure outcomes into log lines and
//! a process exit code is the reporter's job.

use crate::resource::ApplyError;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// Result of reconciling one resource.
#[derive(Debug)]
pub enum OutcomeStatus {
    /// Probe found the desired condition already holding. No action ran.
    AlreadySatisfied,

    /// Action ran and verification confirmed the condition now holds.
    Applied,

    /// Action claimed success, but the re-probe disagreed. Indicates either
    /// a buggy action or a race with an external actor; never swallowed.
    AppliedButVerificationFailed,

    /// Action reported failure.
    ActionFailed(ApplyError),

    /// Dry run: probe was unsatisfied, action deliberately not invoked.
    WouldApply,

    /// Earlier required resource aborted the run before this one was reached.
    Skipped,
}

impl OutcomeStatus {
    /// Whether this outcome counts as a failure for exit-code purposes.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::ActionFailed(_) | OutcomeStatus::AppliedButVerificationFailed
        )
    }
}

impl Display for OutcomeStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            OutcomeStatus::AlreadySatisfied => write!(fmt, "already satisfied"),
            OutcomeStatus::Applied => write!(fmt, "applied"),
            OutcomeStatus::AppliedButVerificationFailed => {
                write!(fmt, "applied, but verification failed")
            }
            OutcomeStatus::ActionFailed(error) => write!(fmt, "action failed: {error}"),
            OutcomeStatus::WouldApply => write!(fmt, "would apply"),
            OutcomeStatus::Skipped => write!(fmt, "skipped"),
        }
    }
}

/// Outcome of one resource within one run.
#[derive(Debug)]
pub struct Outcome {
    pub resource_name: String,
    pub status: OutcomeStatus,
    pub duration: Duration,
}

/// Ordered outcomes of one reconciliation run.
#[derive(Debug, Default)]
pub struct Report {
    outcomes: Vec<Outcome>,
}

impl Report {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    /// Outcomes in resource declaration order.
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Whether every resource ended up satisfied this run.
    pub fn is_converged(&self) -> bool {
        self.outcomes.iter().all(|outcome| {
            matches!(
                outcome.status,
                OutcomeStatus::AlreadySatisfied | OutcomeStatus::Applied
            )
        })
    }

    /// Whether any resource failed or flunked verification.
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| outcome.status.is_failure())
    }
}

/// Consumer of a finalized run report.
///
/// Responsible for rendering outcomes and for translating the report into a
/// process exit status. The reconciler itself never exits the process.
pub trait Reporter {
    /// Render a finalized report.
    fn report(&self, report: &Report);

    /// Translate a finalized report into a process exit code.
    fn exit_code(&self, report: &Report) -> i32 {
        if report.has_failures() {
            1
        } else {
            0
        }
    }
}

/// Reporter that renders each outcome through the tracing pipeline.
///
/// Log level tracks outcome severity: failures at error, skips at warn,
/// applied work at info, and already-satisfied resources at debug so that
/// converged runs stay quiet under the default filter.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TracingReporter {
    /// Construct new tracing reporter.
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for TracingReporter {
    fn report(&self, report: &Report) {
        for outcome in report.outcomes() {
            let name = outcome.resource_name.as_str();
            let status = &outcome.status;
            match status {
                OutcomeStatus::ActionFailed(_) | OutcomeStatus::AppliedButVerificationFailed => {
                    error!("{name}: {status}")
                }
                OutcomeStatus::Skipped => warn!("{name}: {status}"),
                OutcomeStatus::Applied | OutcomeStatus::WouldApply => {
                    info!("{name}: {status} ({:.1?})", outcome.duration)
                }
                OutcomeStatus::AlreadySatisfied => debug!("{name}: {status}"),
            }
        }

        if report.is_converged() {
            info!("run converged: {} resource(s)", report.outcomes().len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: OutcomeStatus) -> Outcome {
        Outcome {
            resource_name: name.into(),
            status,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn converged_report_has_clean_exit_code() {
        let mut report = Report::new();
        report.push(outcome("a", OutcomeStatus::AlreadySatisfied));
        report.push(outcome("b", OutcomeStatus::Applied));

        assert!(report.is_converged());
        assert!(!report.has_failures());
        assert_eq!(TracingReporter::new().exit_code(&report), 0);
    }

    #[test]
    fn failure_outcomes_drive_nonzero_exit_code() {
        let mut report = Report::new();
        report.push(outcome("a", OutcomeStatus::Applied));
        report.push(outcome(
            "b",
            OutcomeStatus::ActionFailed(ApplyError::Other("boom".into())),
        ));
        report.push(outcome("c", OutcomeStatus::Skipped));

        assert!(!report.is_converged());
        assert!(report.has_failures());
        assert_eq!(TracingReporter::new().exit_code(&report), 1);
    }

    #[test]
    fn verification_mismatch_counts_as_failure() {
        let mut report = Report::new();
        report.push(outcome("a", OutcomeStatus::AppliedButVerificationFailed));

        assert!(report.has_failures());
    }

    #[test]
    fn dry_run_outcomes_are_not_failures() {
        let mut report = Report::new();
        report.push(outcome("a", OutcomeStatus::WouldApply));

        assert!(!report.has_failures());
        assert!(!report.is_converged());
    }

    #[test]
    fn status_rendering_is_human_readable() {
        assert_eq!(OutcomeStatus::AlreadySatisfied.to_string(), "already satisfied");
        assert_eq!(
            OutcomeStatus::ActionFailed(ApplyError::Other("boom".into())).to_string(),
            "action failed: boom"
        );
    }
}
