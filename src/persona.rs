//! The two fixed interaction personas.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::transcript::Turn;

const STUDENT_INSTRUCTION: &str = "Act as a psychology tutor called 'Psique'. \
You are patient, didactic, and love using analogies and practical examples. \
Your goal is to help undergraduate students understand complex concepts in \
simple terms. Start by introducing yourself and asking what today's topic is.";

const DEBATE_INSTRUCTION: &str = "Act as an academic colleague specialized in \
psychology. You are precise, technical, and able to debate theoretical \
nuances, compare authors, and suggest research material. Assume the user has \
prior knowledge. Start by introducing yourself professionally and making \
yourself available for debate.";

/// Behavioral preset for the conversation: tutor vs. peer-debate tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// "I'm here to learn": patient tutor for undergraduates.
    Student,
    /// "I'm here to debate": technical academic peer.
    Debate,
}

impl Persona {
    pub fn label(self) -> &'static str {
        match self {
            Persona::Student => "Student",
            Persona::Debate => "Debate",
        }
    }

    /// Instruction text seeding the transcript for this persona.
    pub fn instruction(self) -> &'static str {
        match self {
            Persona::Student => STUDENT_INSTRUCTION,
            Persona::Debate => DEBATE_INSTRUCTION,
        }
    }

    /// The seed turn: a model-role turn carrying the instruction, not a real
    /// model reply.
    pub fn seed_turn(self) -> Turn {
        Turn::model(self.instruction())
    }
}

/// Parses a persona name as given on the command line or in config.
pub fn parse_persona(s: &str) -> Result<Persona> {
    match s.trim().to_lowercase().as_str() {
        "student" => Ok(Persona::Student),
        "debate" => Ok(Persona::Debate),
        _ => anyhow::bail!("Invalid persona '{}'. Valid options: student, debate", s),
    }
}
