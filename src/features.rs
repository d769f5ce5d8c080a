//! Feature modules
//!
//! Each feature module contains the core logic for a specific functionality.

pub mod import;
pub mod lyrics;
pub mod media;
pub mod pipeline;
pub mod settings;

pub use settings::Settings;
