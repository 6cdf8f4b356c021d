//! Interactive chat with the psychology tutor.
//!
//! A REPL-style loop that keeps the conversation transcript for the life of
//! the session. Replies are streamed fragment-by-fragment; switching persona
//! resets the transcript to the new persona's seed turn.

use anyhow::{Result, bail};
use futures_util::StreamExt;
use std::io::{BufRead, IsTerminal, Write};

use crate::config::Config;
use crate::persona::{Persona, parse_persona};
use crate::providers::StreamEvent;
use crate::providers::gemini::{GeminiClient, GeminiConfig};
use crate::renderer::StreamRenderer;
use crate::transcript::{ChatSession, Turn};

const QUIT_COMMAND: &str = ":q";
const PROMPT_PREFIX: &str = "you> ";
const REPLY_PREFIX: &str = "psique> ";

/// Runs the chat loop with a provided client (for testing).
///
/// Reads user input from `input`, writes the conversation to `output`.
/// Exits on `:q` or EOF.
pub async fn run_chat<R, W>(
    input: R,
    output: &mut W,
    client: &GeminiClient,
    session: &mut ChatSession,
    show_cursor: bool,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();

        // Handle quit command
        if trimmed == QUIT_COMMAND {
            writeln!(output, "Goodbye!")?;
            break;
        }

        // Skip empty lines
        if trimmed.is_empty() {
            write!(output, "{}", PROMPT_PREFIX)?;
            output.flush()?;
            continue;
        }

        // Persona switches and other REPL commands
        if let Some(command) = trimmed.strip_prefix(':') {
            handle_command(command, output, session)?;
            write!(output, "{}", PROMPT_PREFIX)?;
            output.flush()?;
            continue;
        }

        // Append the user turn first, then build the outbound history.
        // The typed prompt line is the echo.
        session.push_user(trimmed);

        match stream_reply(output, client, session.outbound_history(), show_cursor).await {
            Ok(reply) => {
                if !reply.is_empty() {
                    session.push_model(reply);
                }
            }
            Err(e) => {
                // The user's turn stays in the transcript; no partial model
                // turn is appended. The user may retry by submitting again.
                writeln!(output, "Error: {:#}", e)?;
            }
        }

        write!(output, "{}", PROMPT_PREFIX)?;
        output.flush()?;
    }

    Ok(())
}

fn handle_command<W: Write>(
    command: &str,
    output: &mut W,
    session: &mut ChatSession,
) -> Result<()> {
    let persona = match parse_persona(command) {
        Ok(p) => p,
        Err(_) => {
            writeln!(
                output,
                "Unknown command :{}. Available: :student, :debate, :q",
                command
            )?;
            return Ok(());
        }
    };

    if session.switch_persona(persona) {
        writeln!(
            output,
            "Persona: {}. Conversation reset.",
            persona.label()
        )?;
    } else {
        writeln!(output, "Persona {} is already active.", persona.label())?;
    }
    Ok(())
}

/// Streams a single reply, returning the complete text.
async fn stream_reply<W: Write>(
    output: &mut W,
    client: &GeminiClient,
    history: &[Turn],
    show_cursor: bool,
) -> Result<String> {
    let mut stream = client.generate_stream(history).await?;

    let mut renderer = StreamRenderer::new(&mut *output, show_cursor);
    let mut full_text = String::new();
    let mut printed_prefix = false;

    while let Some(event_result) = stream.next().await {
        let event = match event_result {
            Ok(event) => event,
            Err(e) => {
                renderer.finish()?;
                return Err(e);
            }
        };

        match event {
            StreamEvent::TextDelta { text } => {
                if !text.is_empty() {
                    if !printed_prefix {
                        renderer.prefix(REPLY_PREFIX)?;
                        printed_prefix = true;
                    }
                    renderer.delta(&text)?;
                    full_text.push_str(&text);
                }
            }
            StreamEvent::Error {
                error_type,
                message,
            } => {
                renderer.finish()?;
                bail!("API error ({}): {}", error_type, message);
            }
            // Ignore bookkeeping events (MessageDelta, MessageStop)
            _ => {}
        }
    }

    renderer.finish()?;
    Ok(full_text)
}

/// Runs the chat loop with stdin/stdout.
pub async fn run_interactive_chat(config: &Config, persona: Persona) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    let gemini_config = GeminiConfig::from_env(
        config.model.clone(),
        config.max_output_tokens,
        config.effective_gemini_base_url(),
    )?;
    let client = GeminiClient::new(gemini_config);
    let mut session = ChatSession::new(persona);
    let show_cursor = stdout.is_terminal();

    writeln!(stdout, "Psique Chat (type :q to quit)")?;
    writeln!(
        stdout,
        "Persona: {}. Switch with :student / :debate.",
        persona.label()
    )?;
    write!(stdout, "{}", PROMPT_PREFIX)?;
    stdout.flush()?;

    run_chat(stdin.lock(), &mut stdout, &client, &mut session, show_cursor).await
}
