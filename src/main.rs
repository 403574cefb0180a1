// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use converge::{
    default_manifest_path, reconcile, Manifest, Report, Reporter, RunOptions, TracingReporter,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  converge apply [options]\n  converge plan [options]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<Report> {
        match self.command {
            Command::Apply(opts) => run_apply(opts),
            Command::Plan(opts) => run_plan(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Reconcile the manifest against the live system.
    #[command(override_usage = "converge apply [options]")]
    Apply(ApplyOptions),

    /// Show what apply would change without mutating anything.
    #[command(override_usage = "converge plan [options]")]
    Plan(PlanOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyOptions {
    /// Manifest to reconcile instead of the default location.
    #[arg(short = 'f', long, value_name = "path")]
    pub manifest: Option<PathBuf>,

    /// Probe only; record unsatisfied resources without acting on them.
    #[arg(long)]
    pub dry_run: bool,

    /// Abort on the first failure regardless of per-resource criticality.
    #[arg(long)]
    pub stop_on_first_failure: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PlanOptions {
    /// Manifest to plan against instead of the default location.
    #[arg(short = 'f', long, value_name = "path")]
    pub manifest: Option<PathBuf>,
}

fn main() {
    let layer = fmt::layer().compact();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry().with(layer).with(filter).init();

    match run() {
        Ok(report) => {
            let reporter = TracingReporter::new();
            reporter.report(&report);
            exit(reporter.exit_code(&report));
        }
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

fn run() -> Result<Report> {
    Cli::parse().run()
}

fn run_apply(opts: ApplyOptions) -> Result<Report> {
    let options = RunOptions {
        dry_run: opts.dry_run,
        stop_on_first_failure: opts.stop_on_first_failure,
    };

    run_manifest(opts.manifest, options)
}

fn run_plan(opts: PlanOptions) -> Result<Report> {
    let options = RunOptions {
        dry_run: true,
        ..Default::default()
    };

    run_manifest(opts.manifest, options)
}

fn run_manifest(path: Option<PathBuf>, options: RunOptions) -> Result<Report> {
    let path = match path {
        Some(path) => path,
        None => default_manifest_path()?,
    };

    let manifest: Manifest = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read manifest at {:?}", path.display()))?
        .parse()?;
    let resources = manifest.resources()?;

    Ok(reconcile(&resources, options)?)
}
