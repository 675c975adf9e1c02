//! Incremental markup tokenizer.
//!
//! A push tokenizer: callers feed byte chunks as they arrive and drain
//! events after each feed. Constructs split across chunk boundaries are
//! buffered until complete, so event content never depends on how the
//! input was chunked. memchr does the delimiter scanning.

use serde::{Deserialize, Serialize};

pub mod cursor;
pub mod entities;
pub mod events;
pub mod tokenizer;

pub use events::ScanEvent;
pub use tokenizer::Tokenizer;

/// Tokenizer configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Treat stray `<` as literal text instead of failing. Bare `&` and
    /// unknown entities pass through as literal text either way.
    pub permissive: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions { permissive: true }
    }
}
