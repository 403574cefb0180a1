// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconciliation engine.
//!
//! Walks an ordered sequence of resources, strictly in declared order, and
//! converges each one: probe first, act only when the probe is unsatisfied,
//! then re-probe once to verify the action actually established the desired
//! condition. Ordering is significant because later resources may depend on
//! earlier ones' side effects, e.g., formatting a device before mounting it.
//! For the same reason processing is single-threaded and synchronous; shared
//! system state like a mount table is not safely mutated concurrently.
//!
//! # Retry By Rerun
//!
//! No retries happen inside a single run. Since probes re-read the live
//! system every time, simply invoking reconciliation again is the retry
//! mechanism: converged resources are skipped for free, and only the ones
//! that still disagree get re-acted on. This deliberately replaces ad hoc
//! backoff loops around each corrective command.
//!
//! # Failure Policy
//!
//! Individual resource failures never fail the whole call. A failed required
//! resource aborts the remainder of the run (recorded as skipped); a failed
//! optional one does not. The run itself only errors on caller-input
//! problems, caught before any action runs.

use crate::{
    report::{Outcome, OutcomeStatus, Report},
    resource::{Criticality, Resource, Verdict},
};

use std::{collections::HashSet, time::Instant};
use tracing::{debug, info, instrument, warn};

/// Behavioral switches for one reconciliation run.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Never invoke actions; record unsatisfied probes as would-apply.
    pub dry_run: bool,

    /// Abort on the first failure regardless of per-resource criticality.
    pub stop_on_first_failure: bool,
}

/// Engine that sequentially converges resources toward their desired state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reconciler {
    options: RunOptions,
}

impl Reconciler {
    /// Construct new reconciler with given run options.
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Reconcile resources in declared order.
    ///
    /// Returns the finalized report of per-resource outcomes, one per
    /// resource, in declaration order. The report is returned even when
    /// resources fail; only malformed input fails the call itself.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::EmptyRun`] if `resources` is empty.
    /// - Return [`ReconcileError::UnnamedResource`] if any name is empty.
    /// - Return [`ReconcileError::DuplicateName`] if two resources share a
    ///   name. All validation happens before any action runs, with no
    ///   partial report produced.
    #[instrument(skip(self, resources), level = "debug")]
    pub fn run(&self, resources: &[Resource]) -> Result<Report> {
        validate(resources)?;

        let mut report = Report::new();
        let mut abort_reason: Option<String> = None;

        for resource in resources {
            if let Some(reason) = &abort_reason {
                debug!("skip {:?}: {reason}", resource.name());
                report.push(Outcome {
                    resource_name: resource.name().to_owned(),
                    status: OutcomeStatus::Skipped,
                    duration: std::time::Duration::ZERO,
                });
                continue;
            }

            let start = Instant::now();
            let status = self.converge(resource);

            if status.is_failure() && self.should_abort(resource) {
                abort_reason = Some(format!("{:?} failed earlier in the run", resource.name()));
            }

            report.push(Outcome {
                resource_name: resource.name().to_owned(),
                status,
                duration: start.elapsed(),
            });
        }

        Ok(report)
    }

    /// Converge a single resource: probe, maybe act, verify.
    fn converge(&self, resource: &Resource) -> OutcomeStatus {
        match self.verdict_of(resource) {
            Verdict::Satisfied => {
                debug!("{:?} already satisfied", resource.name());
                return OutcomeStatus::AlreadySatisfied;
            }
            Verdict::Unsatisfied { detail } => {
                info!("{:?} unsatisfied: {detail}", resource.name())
            }
        }

        if self.options.dry_run {
            return OutcomeStatus::WouldApply;
        }

        if let Err(error) = resource.apply() {
            warn!("{:?} action failed: {error}", resource.name());
            return OutcomeStatus::ActionFailed(error);
        }

        // INVARIANT: An action claiming success must convince its own probe.
        match self.verdict_of(resource) {
            Verdict::Satisfied => OutcomeStatus::Applied,
            Verdict::Unsatisfied { detail } => {
                warn!(
                    "{:?} action claimed success, but probe disagrees: {detail}",
                    resource.name()
                );
                OutcomeStatus::AppliedButVerificationFailed
            }
        }
    }

    /// Probe a resource, folding inconclusive probes into unsatisfied.
    ///
    /// An inconclusive probe never blocks progress on its own. The action is
    /// optimistically attempted, and fails explicitly if conditions truly
    /// disallow it.
    fn verdict_of(&self, resource: &Resource) -> Verdict {
        match resource.check() {
            Ok(verdict) => verdict,
            Err(error) => {
                warn!("{:?} probe inconclusive: {error}", resource.name());
                Verdict::unsatisfied(format!("probe inconclusive: {error}"))
            }
        }
    }

    fn should_abort(&self, resource: &Resource) -> bool {
        self.options.stop_on_first_failure || resource.criticality() == Criticality::Required
    }
}

/// Reconcile resources in declared order with given options.
///
/// Convenience front door over [`Reconciler::run`].
///
/// # Errors
///
/// - Return [`ReconcileError`] if the resource list is malformed.
pub fn reconcile(resources: &[Resource], options: RunOptions) -> Result<Report> {
    Reconciler::new(options).run(resources)
}

fn validate(resources: &[Resource]) -> Result<()> {
    if resources.is_empty() {
        return Err(ReconcileError::EmptyRun);
    }

    let mut seen = HashSet::new();
    for resource in resources {
        if resource.name().is_empty() {
            return Err(ReconcileError::UnnamedResource);
        }

        if !seen.insert(resource.name()) {
            return Err(ReconcileError::DuplicateName(resource.name().to_owned()));
        }
    }

    Ok(())
}

/// Caller-input errors caught before any action runs.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// Nothing to reconcile.
    #[error("resource list is empty")]
    EmptyRun,

    /// Resource declared without a name.
    #[error("resource declared with an empty name")]
    UnnamedResource,

    /// Two resources share one name within a single run.
    #[error("duplicate resource name {0:?}")]
    DuplicateName(String),
}

/// Friendly result alias :3
type Result<T, E = ReconcileError> = std::result::Result<T, E>;
