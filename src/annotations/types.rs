//! Annotation types
//!
//! The persisted unit of the system. The JSON shape (camelCase `createdAt`,
//! `position`/`createdAt` as `null` when absent) is also the import/export
//! wire format, so it must stay stable.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Highlight palette
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    GreenYellow,
    Cyan,
    Magenta,
    Red,
}

impl HighlightColor {
    /// Every palette entry, in toolbar order
    pub const PALETTE: [HighlightColor; 5] = [
        HighlightColor::Yellow,
        HighlightColor::GreenYellow,
        HighlightColor::Cyan,
        HighlightColor::Magenta,
        HighlightColor::Red,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::GreenYellow => "greenyellow",
            HighlightColor::Cyan => "cyan",
            HighlightColor::Magenta => "magenta",
            HighlightColor::Red => "red",
        }
    }

    /// sRGB channels of the CSS named color
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            HighlightColor::Yellow => (255, 255, 0),
            HighlightColor::GreenYellow => (173, 255, 47),
            HighlightColor::Cyan => (0, 255, 255),
            HighlightColor::Magenta => (255, 0, 255),
            HighlightColor::Red => (255, 0, 0),
        }
    }

    /// Translucent CSS background for this color
    pub fn background(&self, alpha: f32) -> String {
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let (r, g, b) = self.rgb();
        format!("rgba({}, {}, {}, {})", r, g, b, alpha)
    }

    /// Parse a stored color, falling back to the first palette entry
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for colors outside the palette
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown highlight color: {0}")]
pub struct UnknownColor(pub String);

impl FromStr for HighlightColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        HighlightColor::PALETTE
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownColor(s.to_string()))
    }
}

/// Linear char offsets into the page's linearized text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPosition {
    pub start: usize,
    pub end: usize,
}

impl TextPosition {
    /// A position is only meaningful when it covers at least one char
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Context captured around the selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQuote {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl TextQuote {
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.suffix.is_empty()
    }
}

/// A persisted highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Opaque identity, immutable after creation
    pub id: String,
    #[serde(default)]
    pub color: HighlightColor,
    /// Exact selected text at creation time
    pub text: String,
    #[serde(default)]
    pub comment: String,
    /// Offsets at creation time; absent when they could not be captured
    #[serde(default)]
    pub position: Option<TextPosition>,
    #[serde(default)]
    pub quote: TextQuote,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

/// What to do with a stored record that has no usable `id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingId {
    /// Skip the record (page loads)
    Reject,
    /// Generate a fallback id (imports)
    Synthesize,
}

impl Annotation {
    /// Create a new annotation with a fresh id and timestamp
    pub fn new(
        text: &str,
        color: HighlightColor,
        position: Option<TextPosition>,
        quote: TextQuote,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            color,
            text: text.to_string(),
            comment: String::new(),
            position: position.filter(TextPosition::is_valid),
            quote,
            created_at: Some(now_iso()),
        }
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Stored start offset used for repaint ordering (0 when absent)
    pub fn sort_offset(&self) -> usize {
        self.position.map(|p| p.start).unwrap_or(0)
    }

    /// Rebuild an annotation from an untrusted JSON record.
    ///
    /// Returns `None` for records that cannot be salvaged: non-objects, blank
    /// `text`, or (with [`MissingId::Reject`]) a missing id. Everything else is
    /// normalized to its documented default.
    pub fn sanitize(candidate: &Value, missing_id: MissingId) -> Option<Self> {
        let object = candidate.as_object()?;

        let text = object.get("text")?.as_str()?;
        if text.trim().is_empty() {
            return None;
        }

        let id = match object.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => match missing_id {
                MissingId::Reject => return None,
                MissingId::Synthesize => fallback_id(),
            },
        };

        let color = HighlightColor::parse_or_default(object.get("color").and_then(Value::as_str));

        let position = object.get("position").and_then(|p| {
            let start = as_offset(p.get("start")?)?;
            let end = as_offset(p.get("end")?)?;
            TextPosition::new(start, end)
        });

        let quote = match object.get("quote").and_then(Value::as_object) {
            Some(quote) => TextQuote {
                prefix: string_field(quote.get("prefix")),
                suffix: string_field(quote.get("suffix")),
            },
            None => TextQuote::default(),
        };

        Some(Self {
            id,
            color,
            text: text.to_string(),
            comment: string_field(object.get("comment")),
            position,
            quote,
            created_at: object
                .get("createdAt")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Sanitize every record of a stored list, dropping the unusable ones
    pub fn sanitize_list(value: &Value, missing_id: MissingId) -> Vec<Self> {
        let Some(items) = value.as_array() else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| {
                let sanitized = Self::sanitize(item, missing_id);
                if sanitized.is_none() {
                    tracing::warn!("Skipping malformed annotation record");
                }
                sanitized
            })
            .collect()
    }
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Non-negative integral JSON number
fn as_offset(value: &Value) -> Option<usize> {
    if let Some(n) = value.as_u64() {
        return usize::try_from(n).ok();
    }
    let f = value.as_f64()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64).then(|| f as usize)
}

fn fallback_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("imp-{}-{}", Utc::now().timestamp_millis(), &random[..12])
}

/// Current time as an ISO 8601 UTC timestamp with millisecond precision
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Storage key for a page: the URL without its fragment
pub fn url_key(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split('#').next().unwrap_or_default().to_string(),
    }
}
