//! Chat command handler.

use anyhow::{Context, Result};

use crate::chat;
use crate::config::Config;
use crate::persona::parse_persona;

pub async fn run(config: &Config, persona_override: Option<&str>) -> Result<()> {
    let persona = match persona_override {
        Some(name) => parse_persona(name)?,
        None => config.default_persona()?,
    };

    chat::run_interactive_chat(config, persona)
        .await
        .context("interactive chat failed")?;

    Ok(())
}
