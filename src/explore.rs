//! Single-shot concept explainer.
//!
//! One concept in, one complete formatted answer out. The call is
//! non-streaming; a progress line on stderr covers the wait, keeping stdout
//! reserved for the answer itself.

use std::io::Write;

use anyhow::Result;

use crate::config::Config;
use crate::prompts;
use crate::providers::gemini::{GeminiClient, GeminiConfig};
use crate::transcript::Turn;

/// Sends one concept to the model and prints the complete answer.
///
/// Empty concepts are rejected before any client is constructed, so no
/// request is issued. Returns the rendered answer text.
pub async fn run_explore(concept: &str, config: &Config) -> Result<String> {
    let concept = concept.trim();
    if concept.is_empty() {
        anyhow::bail!("Concept cannot be empty. Tell me what to explain.");
    }

    let gemini_config = GeminiConfig::from_env(
        config.model.clone(),
        config.max_output_tokens,
        config.effective_gemini_base_url(),
    )?;
    let client = GeminiClient::new(gemini_config);

    let prompt = prompts::concept_prompt(concept);

    eprint!("⚙ Asking {}...", client.model());
    let _ = std::io::stderr().flush();

    let result = client.generate(&[Turn::user(prompt)]).await;
    match &result {
        Ok(_) => eprintln!(" Done."),
        Err(_) => eprintln!(),
    }
    let text = result?;

    println!("{}", text);
    Ok(text)
}
