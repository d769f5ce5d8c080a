//! Cover art preparation and file inspection
//!
//! - `cover`: resolves local, remote and inline cover specifiers into an
//!   image file the media tool can attach
//! - `inspect`: probe-based report of streams, pictures and tags

pub mod cover;
pub mod inspect;

pub use cover::{CoverNormalizer, CoverSpec};
pub use inspect::{inspect, render_report};
