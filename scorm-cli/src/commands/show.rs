//! Inspect an attempt's recorded data

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Args;
use scorm_core::{AttemptId, AttemptStore, Ledger, ReportingPipeline, Timeline};

use super::{collaborators, open_store};
use crate::config::ScormConfig;

/// Longest value printed before truncation
const MAX_VALUE_CHARS: usize = 80;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Attempt to show
    pub attempt: i64,

    /// Print every recorded element of this key instead of current values
    #[arg(long)]
    pub history: Option<String>,

    /// Ledger database path (overrides config)
    #[arg(long)]
    pub database: Option<PathBuf>,
}

pub fn run(args: ShowArgs, config: &ScormConfig) -> Result<()> {
    let database = args
        .database
        .unwrap_or_else(|| config.storage.database.clone());
    let store = open_store(&database)?;
    let attempt = AttemptId(args.attempt);
    let record = store
        .attempt(attempt)?
        .ok_or_else(|| anyhow!("Attempt {} not found", attempt))?;

    println!("Attempt:  {}", record.id);
    println!("Resource: {}", record.resource);
    println!("User:     {}", record.user);
    println!("Status:   {}", record.status.as_str());
    println!("Started:  {}", record.created_at.to_rfc3339());

    if let Some(key) = args.history {
        let timeline = Timeline::new(store.elements(attempt, &key)?);
        println!("\n{} ({} elements)", key, timeline.len());
        for element in timeline.elements() {
            let value = timeline.materialize(element.id)?;
            let stored = match element.diff_of {
                Some(base) => format!("diff of {}", base),
                None => "full".to_string(),
            };
            println!(
                "  {}  {}  [{}]  {}",
                element.id,
                element.timestamp.to_rfc3339(),
                stored,
                truncate(&value)
            );
        }
        return Ok(());
    }

    println!();
    for (key, value) in store.current_values(attempt)? {
        println!("  {} = {}", key, truncate(&value));
    }

    let collaborators = collaborators(&config.reporting);
    let pipeline = ReportingPipeline::new(
        store.clone(),
        store,
        collaborators.grades,
        collaborators.receipts,
    );
    let outcome = pipeline.outcome(attempt)?;
    println!("\nOutcome:  {}", serde_json::to_string(&outcome)?);
    Ok(())
}

fn truncate(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_CHARS {
        value.to_string()
    } else {
        let head: String = value.chars().take(MAX_VALUE_CHARS).collect();
        format!("{head}... ({} bytes)", value.len())
    }
}
