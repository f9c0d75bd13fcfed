//! One-off compaction pass over the ledger

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use scorm_core::{CompactionReport, Compactor, SystemClock};

use super::open_store;
use crate::config::ScormConfig;

#[derive(Debug, Args)]
pub struct CompactArgs {
    /// Ledger database path (overrides config)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Time budget for the pass, e.g. "2m" (overrides config)
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    pub budget: Option<Duration>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CompactArgs, config: &ScormConfig) -> Result<()> {
    let database = args
        .database
        .unwrap_or_else(|| config.storage.database.clone());
    let mut compaction = config.compaction.clone();
    if let Some(budget) = args.budget {
        compaction.budget = budget;
    }

    let store = open_store(&database)?;
    let compactor = Compactor::new(store, Arc::new(SystemClock), compaction);
    let report = compactor.run_compaction_pass()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &CompactionReport) {
    println!("Examined:   {}", report.examined);
    println!("Compacted:  {}", report.compacted);
    println!("Rewritten:  {}", report.rewritten);
    println!("Failed:     {}", report.failed);
    println!("Bytes saved: {}", report.bytes_saved);
    if report.budget_exhausted {
        println!("Budget exhausted; remaining candidates wait for the next pass");
    }
}
