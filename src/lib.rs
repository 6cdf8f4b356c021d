//! Psique library.
//!
//! This module exports public APIs for the binary and for tests.

pub mod chat;
pub mod cli;
pub mod config;
pub mod explore;
pub mod persona;
pub mod prompts;
pub mod providers;
pub mod renderer;
pub mod transcript;
