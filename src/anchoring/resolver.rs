//! Anchor resolution
//!
//! Re-locates a stored annotation in a fresh snapshot. The stored offsets are
//! tried first and accepted when the text they cover still matches (modulo
//! whitespace). Otherwise the exact text is searched for, using the quote to
//! pick between repeated occurrences. The first qualifying occurrence in
//! document order wins.

use crate::annotations::{Annotation, TextQuote};

use super::linearize::TextSnapshot;

/// How a span was recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMethod {
    /// Stored offsets still cover the same text
    ExactOffset,
    /// Found by text search guided by the quote
    QuoteSearch,
}

/// A resolved char span in the current snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSpan {
    pub start: usize,
    pub end: usize,
    pub method: ResolveMethod,
}

/// Collapse whitespace runs to single spaces and trim
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve an annotation against the current text, or `None` when orphaned
pub fn resolve(annotation: &Annotation, snapshot: &TextSnapshot) -> Option<ResolvedSpan> {
    if annotation.text.is_empty() {
        return None;
    }

    if let Some(position) = annotation.position.filter(|p| p.is_valid()) {
        let candidate = snapshot.slice(position.start, position.end);
        if normalize_whitespace(candidate) == normalize_whitespace(&annotation.text) {
            tracing::debug!(
                id = %annotation.id,
                start = position.start,
                end = position.end,
                "Resolved annotation at stored offsets"
            );
            return Some(ResolvedSpan {
                start: position.start,
                end: position.end.min(snapshot.char_len()),
                method: ResolveMethod::ExactOffset,
            });
        }
    }

    let Some(byte) = find_text_match(snapshot.full_text(), &annotation.text, &annotation.quote) else {
        tracing::debug!(id = %annotation.id, "Annotation is orphaned in the current document");
        return None;
    };

    let start = snapshot.char_at_byte(byte);
    let end = start + annotation.text.chars().count();
    tracing::debug!(id = %annotation.id, start, end, "Resolved annotation by text search");

    Some(ResolvedSpan {
        start,
        end,
        method: ResolveMethod::QuoteSearch,
    })
}

/// Byte index of the first occurrence of `text` whose surroundings match the quote.
///
/// An empty prefix or suffix always matches, so an empty quote accepts the
/// first occurrence.
pub fn find_text_match(full_text: &str, text: &str, quote: &TextQuote) -> Option<usize> {
    if text.is_empty() {
        return None;
    }
    if quote.is_empty() {
        return full_text.find(text);
    }

    let mut from = 0;
    while let Some(found) = full_text[from..].find(text) {
        let index = from + found;
        let prefix_ok = full_text[..index].ends_with(quote.prefix.as_str());
        let suffix_ok = full_text[index + text.len()..].starts_with(quote.suffix.as_str());
        if prefix_ok && suffix_ok {
            return Some(index);
        }

        // Step one char so overlapping occurrences are still visited.
        let step = full_text[index..].chars().next().map(char::len_utf8).unwrap_or(1);
        from = index + step;
    }

    None
}
