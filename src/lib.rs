// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Idempotent state reconciliation for a single host.
//!
//! Converge takes an ordered list of declarative __resources__, each pairing
//! a side-effect-free probe with a corrective action, and applies them
//! safely: probe first, act only on disagreement, re-probe to verify. Because
//! probes re-read the live system on every run, re-running the same
//! reconciliation produces no further change and no error. This is the same
//! guarantee provisioning scripts reach for with inline guards, e.g.,
//! `grep -q marker file || echo line >> file`, made uniform across dry-run,
//! verification, failure policy, and reporting.
//!
//! The public API is organised into four layers:
//!
//! - [`resource`]: the Probe/Action abstraction and the built-in resource
//!   kinds (file contents, marker lines, filesystem signatures, mount
//!   points, command availability).
//! - [`reconcile`]: the engine that converges resources in declared order.
//! - [`report`]: per-resource outcomes, the aggregate run report, and the
//!   reporter seam that turns a report into logs and an exit code.
//! - [`manifest`]: the declarative TOML layout that drives the `converge`
//!   binary.

pub mod manifest;
pub mod path;
pub mod reconcile;
pub mod report;
pub mod resource;

pub use crate::{
    manifest::{Manifest, ManifestError, ResourceEntry, ResourceKind},
    path::default_manifest_path,
    reconcile::{reconcile, ReconcileError, Reconciler, RunOptions},
    report::{Outcome, OutcomeStatus, Report, Reporter, TracingReporter},
    resource::{
        command::{CommandAvailable, ShellInstall},
        file::{FilePresent, LineInFile},
        volume::{FilesystemFormatted, Mounted},
        Action, ApplyError, Criticality, Probe, ProbeError, Resource, Verdict,
    },
};
