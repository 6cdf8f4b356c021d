//! Conversation transcript and per-session state.
//!
//! A session owns the ordered list of turns plus the active persona. The
//! transcript always starts with a single seed turn carrying the persona's
//! instruction; switching to a different persona replaces the transcript
//! with the new seed.

use serde::{Deserialize, Serialize};

use crate::persona::Persona;

/// Who produced a turn. Matches the Gemini role vocabulary on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Wire name for the Gemini `contents` array.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// Per-session conversation state: ordered turns plus the active persona.
#[derive(Debug, Clone)]
pub struct ChatSession {
    turns: Vec<Turn>,
    persona: Persona,
}

impl ChatSession {
    /// Creates a session seeded with the persona's instruction turn.
    pub fn new(persona: Persona) -> Self {
        Self {
            turns: vec![persona.seed_turn()],
            persona,
        }
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    /// Full transcript, seed included.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Switches the active persona.
    ///
    /// A different persona replaces the transcript with that persona's seed
    /// turn and returns true; re-selecting the active persona leaves the
    /// transcript untouched and returns false.
    pub fn switch_persona(&mut self, persona: Persona) -> bool {
        if persona == self.persona {
            return false;
        }
        self.persona = persona;
        self.turns = vec![persona.seed_turn()];
        true
    }

    /// Appends a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    /// Appends a model turn.
    pub fn push_model(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::model(content));
    }

    /// History to send to the model for the next reply.
    ///
    /// The seed turn is included only when it is the whole transcript;
    /// otherwise everything after it, in order. Callers append the pending
    /// user turn before asking for this.
    pub fn outbound_history(&self) -> &[Turn] {
        if self.turns.len() == 1 {
            &self.turns
        } else {
            &self.turns[1..]
        }
    }
}
