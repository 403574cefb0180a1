// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Resource domain representation.
//!
//! A __resource__ is a named desired-state assertion about the host, e.g.,
//! "this line is present in /etc/fstab", or "this device carries an ext4
//! filesystem". Every resource pairs exactly two capabilities:
//!
//! - A [`Probe`]: a side-effect-free check of whether the desired condition
//!   already holds on the live system.
//! - An [`Action`]: a state-mutating operation that establishes the desired
//!   condition when the probe says it does not hold.
//!
//! # Probe + Action Pairing
//!
//! Shell scripts typically express this pairing inline as a conditional
//! guard, e.g., `grep -q marker file || echo line >> file`, or
//! `mountpoint -q dir || mount dev dir`. Hoisting the guard out of each call
//! site into an explicit capability pair is what lets the reconciler apply
//! one uniform policy for dry-run, verification, and reporting instead of
//! duplicating the idiom everywhere.
//!
//! Probes are re-evaluated from the live system on every run. Nothing is
//! cached between runs, which is the mechanism that gives reconciliation its
//! idempotence guarantee: a fully-converged host produces zero mutating calls
//! on any subsequent run.
//!
//! # See Also
//!
//! 1. [`reconcile`](crate::reconcile)
//! 2. [`file`], [`volume`], [`command`] for the built-in resource kinds.

pub mod command;
pub mod file;
pub mod volume;

/// Verdict of a probe over current system state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Desired condition already holds.
    Satisfied,

    /// Desired condition does not hold, with diagnostic detail.
    Unsatisfied {
        detail: String,
    },
}

impl Verdict {
    /// Construct unsatisfied verdict with diagnostic detail.
    pub fn unsatisfied(detail: impl Into<String>) -> Self {
        Self::Unsatisfied {
            detail: detail.into(),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, Verdict::Satisfied)
    }
}

/// Side-effect-free check of whether a desired condition already holds.
///
/// Implementations must not mutate system state, and must be safe to call
/// arbitrarily many times. The reconciler calls a probe at least once per
/// resource, and once more after a successful action to verify it.
pub trait Probe {
    /// Inspect current system state.
    ///
    /// # Errors
    ///
    /// - Return [`ProbeError`] if status cannot be determined at all, e.g.,
    ///   permission denied reading a path. The reconciler treats this as
    ///   unsatisfied rather than as a hard failure.
    fn check(&self) -> Result<Verdict, ProbeError>;
}

impl<F> Probe for F
where
    F: Fn() -> Result<Verdict, ProbeError>,
{
    fn check(&self) -> Result<Verdict, ProbeError> {
        (self)()
    }
}

/// State-mutating operation that establishes a desired condition.
///
/// An action is permitted to assume its paired probe returned
/// [`Verdict::Unsatisfied`] immediately before invocation, but must not
/// corrupt state if that assumption is violated. Destructive actions refuse
/// outright instead (see [`ApplyError::Refused`]).
pub trait Action {
    /// Mutate system state to satisfy the paired probe.
    ///
    /// # Errors
    ///
    /// - Return [`ApplyError`] if the corrective operation fails. The
    ///   reconciler never retries within one run; rerunning reconciliation
    ///   is the retry mechanism.
    fn apply(&self) -> Result<(), ApplyError>;
}

impl<F> Action for F
where
    F: Fn() -> Result<(), ApplyError>,
{
    fn apply(&self) -> Result<(), ApplyError> {
        (self)()
    }
}

/// How a resource failure affects the rest of a reconciliation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Criticality {
    /// Failure aborts the remaining run.
    #[default]
    Required,

    /// Failure is recorded, and the run continues.
    Optional,
}

/// A named desired-state assertion.
///
/// Owns exactly one probe and one action. Immutable once constructed. Names
/// must be unique within the resource sequence given to one reconciliation
/// run; the reconciler validates this before any action runs.
pub struct Resource {
    name: String,
    criticality: Criticality,
    probe: Box<dyn Probe>,
    action: Box<dyn Action>,
}

impl Resource {
    /// Construct new resource from a probe and action pair.
    pub fn new(
        name: impl Into<String>,
        criticality: Criticality,
        probe: impl Probe + 'static,
        action: impl Action + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            criticality,
            probe: Box::new(probe),
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    /// Run this resource's probe.
    ///
    /// # Errors
    ///
    /// - Return [`ProbeError`] if status cannot be determined.
    pub fn check(&self) -> Result<Verdict, ProbeError> {
        self.probe.check()
    }

    /// Run this resource's corrective action.
    ///
    /// # Errors
    ///
    /// - Return [`ApplyError`] if the corrective operation fails.
    pub fn apply(&self) -> Result<(), ApplyError> {
        self.action.apply()
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Resource")
            .field("name", &self.name)
            .field("criticality", &self.criticality)
            .finish_non_exhaustive()
    }
}

/// Probe cannot determine current status.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Underlying system read failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Status cannot be decided from what was read.
    #[error("{0}")]
    Inconclusive(String),
}

/// Corrective action failed to establish the desired condition.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Underlying system mutation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// External command reported failure.
    #[error("command {command:?} failed:\n{detail}")]
    Syscall {
        command: String,
        detail: String,
    },

    /// Destructive action refused to run without a fresh unsatisfied probe.
    #[error("refused destructive action: {reason}")]
    Refused {
        reason: String,
    },

    /// Caller-supplied action failed for its own reasons.
    #[error("{0}")]
    Other(String),
}
