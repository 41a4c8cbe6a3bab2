//! HTML preprocessing for submitted pages

mod sanitize;

pub use sanitize::{sanitize_html, SanitizeError};
