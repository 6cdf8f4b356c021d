//! Explore command handler.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::explore;

pub async fn run(concept: &str, config: &Config) -> Result<()> {
    explore::run_explore(concept, config)
        .await
        .context("explain concept")?;

    Ok(())
}
