//! Lyrics module - parsing and timing adjustment
//!
//! - `parser`: LRC document parsing with encoding fallback
//! - `adjust`: whole-file timestamp shifting

pub mod adjust;
pub mod parser;

// Re-export commonly used items
pub use adjust::{shift_lyrics, shifted_file_path};
pub use parser::*;
