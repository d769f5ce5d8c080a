//! Text document ingestion
//!
//! Handles:
//! - Multi-encoding decoding of user-supplied text files
//! - Metadata record (tag definition) parsing

pub mod encoding;
pub mod metadata;

pub use encoding::{DEFAULT_ENCODINGS, TextError, read_text_file, resolve_encodings};
pub use metadata::{MetadataRecord, parse_metadata_file};
