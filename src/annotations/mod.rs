//! Annotation module
//!
//! The persisted highlight model and the key→value store it lives in.
//!
//! # Features
//!
//! - Durable anchors made of two parts:
//!   - TextPosition - char offsets into the linearized page text
//!   - TextQuote - up to 40 chars of context on either side
//!
//! - A closed highlight palette with translucent backgrounds
//!
//! - Sanitization of untrusted records (storage reads, imports)
//!
//! - Storage backends: in-memory and SQLite

mod store;
mod types;

pub use store::{AnnotationStore, MemoryStore, SqliteAnnotationStore};
pub use types::{
    now_iso, url_key, Annotation, HighlightColor, MissingId, TextPosition, TextQuote,
    UnknownColor,
};
