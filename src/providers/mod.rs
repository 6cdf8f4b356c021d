//! Model service clients.

pub mod gemini;
pub mod shared;

pub use shared::{ProviderError, ProviderErrorKind, StreamEvent, Usage};
