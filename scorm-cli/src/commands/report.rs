//! Run reporting tasks from the command line

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use scorm_core::reporting::tasks;
use scorm_core::{AttemptId, ReportingPipeline, ResourceId, TaskOutcome};

use super::{collaborators, open_store};
use crate::config::ScormConfig;

#[derive(Args)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommands,

    /// Ledger database path (overrides config)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Send one attempt's outcome to the grade endpoint
    Outcome { attempt: i64 },
    /// Send every user's relevant outcome for a resource
    Scores { resource: i64 },
    /// Send the completion receipt for an attempt
    Receipt { attempt: i64 },
}

pub async fn run(args: ReportArgs, config: &ScormConfig) -> Result<()> {
    let database = args
        .database
        .unwrap_or_else(|| config.storage.database.clone());
    let store = open_store(&database)?;
    let collaborators = collaborators(&config.reporting);
    let pipeline = ReportingPipeline::new(
        store.clone(),
        store,
        collaborators.grades,
        collaborators.receipts,
    );

    let outcome = match args.command {
        ReportCommands::Outcome { attempt } => {
            tasks::attempt_report_outcome(&pipeline, AttemptId(attempt)).await
        }
        ReportCommands::Scores { resource } => {
            tasks::resource_report_scores(&pipeline, ResourceId(resource)).await
        }
        ReportCommands::Receipt { attempt } => {
            tasks::send_attempt_completion_receipt(&pipeline, AttemptId(attempt)).await
        }
    };

    finish(outcome)
}

/// Print a task outcome and turn failures into a non-zero exit
pub fn finish(outcome: TaskOutcome) -> Result<()> {
    match outcome {
        TaskOutcome::Success => {
            println!("Done");
            Ok(())
        }
        TaskOutcome::ReportingFailure(reason) => bail!("Reporting failed: {}", reason),
        TaskOutcome::Failed(reason) => bail!("Task failed: {}", reason),
    }
}
