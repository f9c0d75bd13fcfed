//! Refresh a cached external exam definition

use anyhow::Result;
use clap::Args;
use scorm_core::reporting::{HttpExamCache, tasks};

use super::report::finish;
use crate::config::ScormConfig;

#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Link to the exam definition
    pub link: String,
}

pub async fn run(args: CacheArgs, config: &ScormConfig) -> Result<()> {
    let cache = HttpExamCache::new(config.reporting.timeout);
    finish(tasks::exam_update_cache(&cache, &args.link).await)
}
